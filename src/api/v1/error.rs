use super::cookie::CookiePolicy;
use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply, reject};

/// Turns every rejection into the JSON envelope. Unauthorized replies also
/// expire both session cookies so the client cannot keep presenting them.
pub async fn recover_error(err: Rejection, cookies: CookiePolicy) -> Result<Response, Infallible> {
    let error = if let Some(err) = err.find::<ApiError>() {
        err.clone()
    } else if err.is_not_found() {
        ApiErrorCode::NotFound.into()
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::new(ApiErrorCode::InvalidRequest, e.to_string())
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        ApiError::new(ApiErrorCode::InvalidRequest, "payload too large")
    } else if err.find::<reject::LengthRequired>().is_some() {
        ApiError::new(ApiErrorCode::InvalidRequest, "content-length required")
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::MethodNotAllowed.into()
    } else {
        warn!("Unhandled rejection: {:?}", err);
        ApiErrorCode::InternalError.into()
    };

    let status = error.code.status();
    debug!(%status, code = ?error.code, "request rejected");

    let body = warp::reply::json(&ApiResponse::<()>::err(error.code, error.message));
    let mut response = warp::reply::with_status(body, status).into_response();
    if status == StatusCode::UNAUTHORIZED {
        cookies.clear_session(&mut response);
    }
    Ok(response)
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }
}

impl From<ApiErrorCode> for ApiError {
    fn from(code: ApiErrorCode) -> Self {
        ApiError::new(code, code.to_string())
    }
}

impl reject::Reject for ApiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid old password")]
    InvalidOldPassword,
    #[error("Username or email already taken")]
    UserExists,
    #[error("User not found")]
    UserNotFound,
    #[error("unauthorized request")]
    Unauthorized,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("refresh token is expired or used")]
    RefreshTokenReused,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiError {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError.into()
    }

    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidRequest | ApiErrorCode::InvalidOldPassword => {
                StatusCode::BAD_REQUEST
            }
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::Unauthorized
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::InvalidRefreshToken
            | ApiErrorCode::RefreshTokenReused => StatusCode::UNAUTHORIZED,
            ApiErrorCode::UserNotFound | ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::UserExists => StatusCode::CONFLICT,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Validation(message) => {
                ApiError::new(ApiErrorCode::InvalidRequest, message)
            }
            SessionError::InvalidRefreshToken => ApiErrorCode::InvalidRefreshToken.into(),
            SessionError::RefreshTokenReused => ApiErrorCode::RefreshTokenReused.into(),
            SessionError::InvalidAccessToken => ApiErrorCode::InvalidToken.into(),
            SessionError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Validation(message) => ApiError::new(ApiErrorCode::InvalidRequest, message),
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials.into(),
            AuthError::InvalidOldPassword => ApiErrorCode::InvalidOldPassword.into(),
            AuthError::UserExists => ApiErrorCode::UserExists.into(),
            AuthError::UserNotFound => ApiErrorCode::UserNotFound.into(),
            AuthError::Session(e) => e.into(),
            AuthError::Store(e) => ApiErrorCode::internal(e),
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}
