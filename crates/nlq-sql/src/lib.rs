//! Text-level SQL stages: candidate extraction from free-form generated
//! text, and layered safety/correctness validation of a candidate.
//!
//! Both stages are pure functions over strings. Extraction never trusts its
//! input; validation is the only gate between generated text and the
//! execution layer.

pub mod extract;
pub mod validate;

pub use extract::{extract_sql, Extraction};
pub use validate::{validate_sql, ValidationError};
