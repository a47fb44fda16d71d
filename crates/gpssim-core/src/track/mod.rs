//! Recorded track playback source
//!
//! This module turns a recorded CSV track export into typed navigation fixes:
//! - Immutable fix values ([`fix`])
//! - Position-addressed field schema and line parser ([`schema`])
//! - Sequential file reader with explicit end-of-data ([`store`])

pub mod fix;
pub mod schema;
pub mod store;

pub use fix::NavigationFix;
pub use schema::parse_line;
pub use store::{TrackError, TrackRead, TrackStore};
