//! Core types shared across the crate.
//!
//! Currently this is the error taxonomy; see [`error`] for the full
//! catalogue of failure modes and how they propagate.

pub mod error;

pub use error::{CodeSwapError, Result};
