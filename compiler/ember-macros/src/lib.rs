#[cfg(feature = "assertion-macros")]
pub mod assertions;
pub mod error;
