//! Index staleness checking
//!
//! Indexed change documents record the refs they were built from. A
//! document whose recorded refs no longer match the live ref store is stale
//! and should be reindexed before it is trusted.
//!
//! # Wire formats
//!
//! - Ref state: `<project>:<ref>:<sha1-hex>`, absent refs use the zero id
//! - Pattern: `<project>:<glob>`, `*` matches across `/`
//!
//! Malformed wire data is an error when parsed directly and "stale" when
//! found on a stored document.

mod checker;
mod errors;
mod pattern;
mod ref_state;

pub use checker::{RefReader, StalenessChecker, REF_STATE_FIELD, REF_STATE_PATTERN_FIELD};
pub use errors::{StalenessError, StalenessResult};
pub use pattern::{is_valid_ref_name, RefStatePattern};
pub use ref_state::{ObjectId, RefState};
