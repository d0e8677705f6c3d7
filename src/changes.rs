//! Change-log records: normalization and session grouping.

pub mod entry;
pub mod grouping;
pub mod normalizer;
pub mod schema;
pub mod session;

pub use entry::{ChangeEntry, UNKNOWN_ACTOR};
pub use grouping::{SessionBreak, SessionGrouper};
pub use normalizer::{normalize, normalize_batch, MalformedRow, NormalizationReport, RawRow};
pub use schema::{TableSchema, SUPPORTED_TABLES};
pub use session::ChangeSession;
