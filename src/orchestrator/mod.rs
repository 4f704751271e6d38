//! Document orchestration: result cache, debounced re-validation and fix
//! dispatch on top of the per-type validators.

pub mod cache;
pub mod debounce;
pub mod service;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, ResultCache};
pub use debounce::Debouncer;
pub use service::{AppliedFix, FixAllOutcome, MAX_FIX_PASSES, ValidationService};
