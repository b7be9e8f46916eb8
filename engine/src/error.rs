//! The error type of the engine's fallible surfaces.
//!
//! Only construction-time surfaces (the named-term builder, the JSON codec) return errors;
//! evaluation failures are signal terms, and invariant violations abort. The per-module
//! [`ErrorKind`](crate::json::ErrorKind) enums carry the detail; this type aggregates them.

use derive_more::{Display, From};

/// An error raised while building or decoding terms.
#[non_exhaustive]
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
pub enum Error {
    /// An error from the named-term builder.
    #[display(fmt = "{_0}")]
    Builder(crate::memory::term::builder::ErrorKind),

    /// An error from the JSON codec.
    #[display(fmt = "{_0}")]
    Json(crate::json::ErrorKind),
}

impl std::error::Error for Error {}

/// The result type of the engine's fallible surfaces.
pub type Result<T> = core::result::Result<T, Error>;

/// The result type of operations yielding a term.
pub type ResultTerm = Result<crate::memory::term::Term>;
