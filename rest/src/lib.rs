//! Boskos REST surface: HTTP/JSON handlers (spec.md §6) and the shared
//! application state they're mounted against. The `boskos` binary
//! (`main.rs`) owns process bootstrap; this library is also what the
//! integration tests under `tests/` exercise directly against an
//! in-process `actix-web` test server.

pub mod error;
pub mod handlers;
pub mod state;
