mod cookie;
mod error;
mod handler;
mod router;

pub use cookie::*;
pub use error::recover_error;
pub use error::{ApiError, ApiErrorCode};
pub use handler::ApiResponse;
pub use router::routes;
