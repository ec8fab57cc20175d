//! Request validation
//!
//! Request types derive `validator::Validate`; the [`Validated`] extractor
//! runs those rules and turns violations into field errors.

pub mod extractor;
pub mod validators;

pub use extractor::{PathParams, QueryParams, Validated, flatten_errors};
