//! Temporal store: path → current content, path → complete
//! ordered change log. Content-addressed only in the sense that every
//! write is immutably recorded; "current" is always whatever the most
//! recent record says.

mod error;
mod path;
mod store;

pub use error::TemporalError;
pub use path::{Path, PathPolicy};
pub use store::{ChangeRecord, ChangeRecordSnapshot, TemporalSnapshot, TemporalStore};
