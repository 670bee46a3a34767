use super::cookie::CookiePolicy;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::{IdentityProfile, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError::new(code, message)),
        }
    }
}

#[derive(Debug, Serialize)]
struct Empty {}

fn rejection(error: impl Into<ApiError>) -> warp::Rejection {
    reject::custom(error.into())
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, warp::Rejection> {
    let register_input = RegisterInput {
        fullname: body.fullname,
        username: body.username,
        email: body.email,
        password: body.password,
    };
    let profile = auth_service
        .register(register_input)
        .await
        .map_err(rejection)?;

    let json = warp::reply::json(&ApiResponse::ok(profile));
    Ok(warp::reply::with_status(json, StatusCode::CREATED).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: IdentityProfile,
    #[serde(flatten)]
    pub tokens: SessionTokens,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let login_input = LoginInput {
        username: body.username,
        email: body.email,
        password: body.password,
    };
    let login_result = auth_service.login(login_input).await.map_err(rejection)?;

    let login_response = LoginResponse {
        user: login_result.user,
        tokens: login_result.tokens,
    };
    let mut response = warp::reply::json(&ApiResponse::ok(&login_response)).into_response();
    cookies.set_session(&mut response, &login_response.tokens);
    Ok(response)
}

pub async fn logout(
    user_id: UserId,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    auth_service.logout(user_id).await.map_err(rejection)?;

    let mut response = warp::reply::json(&ApiResponse::ok(Empty {})).into_response();
    cookies.clear_session(&mut response);
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The refresh token comes from the cookie, or failing that from a JSON body.
pub async fn refresh_token(
    cookie: Option<String>,
    body: warp::hyper::body::Bytes,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let from_body = || {
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|r| r.refresh_token)
    };
    let presented = cookie
        .filter(|t| !t.is_empty())
        .or_else(from_body)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| rejection(ApiErrorCode::Unauthorized))?;

    let tokens = auth_service
        .refresh_token(&presented)
        .await
        .map_err(rejection)?;

    let mut response = warp::reply::json(&ApiResponse::ok(&tokens)).into_response();
    cookies.set_session(&mut response, &tokens);
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    body: ChangePasswordRequest,
    user_id: UserId,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, warp::Rejection> {
    let input = ChangePasswordInput {
        old_password: body.old_password,
        new_password: body.new_password,
    };
    auth_service
        .change_password(user_id, input)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&ApiResponse::ok(Empty {})).into_response())
}

pub async fn current_user(
    user_id: UserId,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, warp::Rejection> {
    let profile = auth_service
        .current_user(user_id)
        .await
        .map_err(|e| match e {
            // The access token outlived its identity.
            AuthError::UserNotFound => rejection(ApiErrorCode::InvalidToken),
            e => rejection(e),
        })?;

    Ok(warp::reply::json(&ApiResponse::ok(profile)).into_response())
}
