use crate::application_port::SessionTokens;
use chrono::{DateTime, Utc};
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::reply::Response;

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// How session cookies are written. `secure` is off only for plain-HTTP development.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    fn render(&self, name: &str, value: &str, max_age: i64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!("{name}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Strict{secure}")
    }

    pub fn session_cookie(&self, name: &str, value: &str, expires_at: DateTime<Utc>) -> String {
        let max_age = (expires_at - Utc::now()).num_seconds().max(0);
        self.render(name, value, max_age)
    }

    pub fn expired_cookie(&self, name: &str) -> String {
        self.render(name, "", 0)
    }

    pub fn set_session(&self, response: &mut Response, tokens: &SessionTokens) {
        append_cookie(
            response,
            self.session_cookie(
                ACCESS_COOKIE_NAME,
                &tokens.access_token.0,
                tokens.access_token_expires_at,
            ),
        );
        append_cookie(
            response,
            self.session_cookie(
                REFRESH_COOKIE_NAME,
                &tokens.refresh_token.0,
                tokens.refresh_token_expires_at,
            ),
        );
    }

    pub fn clear_session(&self, response: &mut Response) {
        append_cookie(response, self.expired_cookie(ACCESS_COOKIE_NAME));
        append_cookie(response, self.expired_cookie(REFRESH_COOKIE_NAME));
    }
}

fn append_cookie(response: &mut Response, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!("dropping unencodable cookie: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn secure_flag_follows_policy() {
        let exp = Utc::now() + Duration::minutes(15);
        let dev = CookiePolicy { secure: false }.session_cookie("accessToken", "abc", exp);
        let prod = CookiePolicy { secure: true }.session_cookie("accessToken", "abc", exp);

        assert!(dev.starts_with("accessToken=abc; Max-Age="));
        assert!(dev.contains("HttpOnly"));
        assert!(!dev.contains("Secure"));
        assert!(prod.ends_with("; Secure"));
    }

    #[test]
    fn expired_cookie_has_zero_max_age() {
        let cookie = CookiePolicy { secure: true }.expired_cookie(REFRESH_COOKIE_NAME);
        assert!(cookie.starts_with("refreshToken=; Max-Age=0;"));
    }
}
