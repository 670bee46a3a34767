use super::cookie::{ACCESS_COOKIE_NAME, CookiePolicy, REFRESH_COOKIE_NAME};
use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::UserId;
use crate::server::Server;
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use warp::hyper::body::Buf;
use warp::{Filter, reject};

const JSON_BODY_LIMIT: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
    cookies: CookiePolicy,
) -> impl Filter<Extract = (warp::reply::Response,), Error = warp::Rejection> + Clone {
    let register = warp::path!("users" / "register")
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path!("users" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and(with_cookies(cookies))
        .and_then(handler::login);

    let logout = warp::path!("users" / "logout")
        .and(warp::post())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and(with_cookies(cookies))
        .and_then(handler::logout);

    let refresh_token = warp::path!("users" / "refresh-token")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE_NAME))
        .and(optional_body())
        .and(with(server.auth_service.clone()))
        .and(with_cookies(cookies))
        .and_then(handler::refresh_token);

    let change_password = warp::path!("users" / "change-password")
        .and(warp::post())
        .and(json_body())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::change_password);

    let current_user = warp::path!("users" / "current-user")
        .and(warp::get())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::current_user);

    register
        .or(login)
        .unify()
        .or(logout)
        .unify()
        .or(refresh_token)
        .unify()
        .or(change_password)
        .unify()
        .or(current_user)
        .unify()
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

/// Raw body that may be absent entirely. The cap holds whether or not a
/// `content-length` is declared.
fn optional_body()
-> impl Filter<Extract = (warp::hyper::body::Bytes,), Error = warp::Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(|len: Option<u64>| async move {
            match len {
                Some(n) if n > JSON_BODY_LIMIT => Err(payload_too_large()),
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(warp::body::stream())
        .and_then(read_capped_body)
}

async fn read_capped_body<S, B>(body: S) -> Result<warp::hyper::body::Bytes, warp::Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    futures_util::pin_mut!(body);
    let mut collected = Vec::new();
    while let Some(chunk) = body.next().await {
        let mut chunk = chunk
            .map_err(|e| reject::custom(ApiError::new(ApiErrorCode::InvalidRequest, e.to_string())))?;
        if (collected.len() + chunk.remaining()) as u64 > JSON_BODY_LIMIT {
            return Err(payload_too_large());
        }
        while chunk.has_remaining() {
            let read = {
                let bytes = chunk.chunk();
                collected.extend_from_slice(bytes);
                bytes.len()
            };
            chunk.advance(read);
        }
    }
    Ok(collected.into())
}

fn payload_too_large() -> warp::Rejection {
    reject::custom(ApiError::new(ApiErrorCode::InvalidRequest, "payload too large"))
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_cookies(
    cookies: CookiePolicy,
) -> impl Filter<Extract = (CookiePolicy,), Error = Infallible> + Clone {
    warp::any().map(move || cookies)
}

/// Resolves the caller from the `accessToken` cookie or an `Authorization: Bearer` header.
fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(ACCESS_COOKIE_NAME)
        .and(warp::header::optional::<String>("authorization"))
        .and_then(move |cookie: Option<String>, header: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let token = cookie.filter(|t| !t.is_empty()).or_else(|| {
                    header.and_then(|h| h.strip_prefix("Bearer ").map(str::to_owned))
                });
                let Some(token) = token else {
                    return Err(reject::custom(ApiError::from(ApiErrorCode::Unauthorized)));
                };

                auth_service
                    .verify_token(&token)
                    .await
                    .map_err(|e| reject::custom(ApiError::from(e)))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::hyper::body::Bytes;

    fn chunks(count: usize) -> impl Stream<Item = Result<Bytes, warp::Error>> {
        let chunk = Bytes::from(vec![b'x'; 4096]);
        futures_util::stream::iter((0..count).map(move |_| Ok::<_, warp::Error>(chunk.clone())))
    }

    #[tokio::test]
    async fn undeclared_body_within_the_cap_is_read() {
        let body = read_capped_body(chunks(2)).await.unwrap();
        assert_eq!(body.len(), 8192);
    }

    #[tokio::test]
    async fn undeclared_body_over_the_cap_is_rejected() {
        let err = read_capped_body(chunks(5)).await.unwrap_err();
        let error = err.find::<ApiError>().unwrap();
        assert_eq!(error.code, ApiErrorCode::InvalidRequest);
        assert_eq!(error.message, "payload too large");
    }
}
