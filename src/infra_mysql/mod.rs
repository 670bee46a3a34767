mod identity_store_mysql;
mod util;

pub use identity_store_mysql::*;
