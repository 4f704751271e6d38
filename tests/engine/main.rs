//! Engine-level integration tests.

mod classification;
mod path_roundtrip;
mod scenarios;
mod schema_fallback;
