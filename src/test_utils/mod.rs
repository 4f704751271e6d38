//! Shared test utilities: sample documents and temporary workspaces.

pub mod fixtures;

pub use fixtures::{PolicyFixture, shipped_schemas_dir};
