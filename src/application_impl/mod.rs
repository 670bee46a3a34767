mod argon2_hasher;
mod auth_service_fake;
mod auth_service_impl;
mod jwt_token_codec;
mod session_token_manager_impl;

pub use argon2_hasher::*;
pub use auth_service_fake::*;
pub use auth_service_impl::*;
pub use jwt_token_codec::*;
pub use session_token_manager_impl::*;

#[cfg(test)]
pub(crate) use jwt_token_codec::tests::test_config;
