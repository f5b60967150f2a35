//! Core types, validation, and significance testing for the split engine.

pub mod error;
pub mod events;
pub mod limits;
pub mod session;
pub mod significance;

pub use error::{Error, Result};
pub use events::*;
pub use session::*;
pub use significance::SignificanceResult;
