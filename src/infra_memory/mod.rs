#[cfg(test)]
mod identity_store_broken;
mod identity_store_memory;

#[cfg(test)]
pub use identity_store_broken::*;
pub use identity_store_memory::*;
