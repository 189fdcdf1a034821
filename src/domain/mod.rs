//! Domain error and result types for Veil.
//!
//! All fallible library operations return [`Result<T, VeilError>`]:
//!
//! ```rust
//! use veil::domain::{VeilError, Result};
//!
//! fn example() -> Result<()> {
//!     Err(VeilError::Configuration("missing encryption key".to_string()))
//! }
//! ```

pub mod errors;
pub mod result;

pub use errors::VeilError;
pub use result::Result;
