//! Dashcam Common
//!
//! Pieces every Dashcam crate leans on: the shared error type, the
//! JSON configuration file, the recording clock, and tracing setup.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
