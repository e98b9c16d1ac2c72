//! Shared error taxonomy (spec.md §7). Every crate's own `snafu`-derived
//! `Error` exposes a `kind() -> ErrorKind` accessor so the REST layer can map
//! to a status code without matching on concrete variants, mirroring the
//! teacher's `ReplyErrorKind` -> `RestJsonError` translation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse error kind, independent of which layer raised it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Named resource unknown, or no candidate matches an Acquire.
    NotFound,
    /// State mismatch on Update, not-head-of-queue on Acquire, or a lost
    /// optimistic lock in the Store.
    Conflict,
    /// Release/Update presented an owner that doesn't match the current one.
    Unauthorized,
    /// Missing/invalid params, malformed duration, unknown type.
    BadRequest,
    /// Store I/O error or invariant violation.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}
