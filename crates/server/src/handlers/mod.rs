//! HTTP request handlers.

pub mod health;
pub mod packages;

pub use health::*;
pub use packages::*;
