//! Library crate for port-reach: a concurrent TCP connect scanner and a TLS
//! certificate expiry check.
pub mod cert;
pub mod error;
pub mod logging;
pub mod ports;
pub mod probe;
pub mod progress;
pub mod resolver;
pub mod scanner;
pub mod services;
pub mod types;

pub use error::{Error, Result};
