pub mod document;
pub mod matching;
pub mod message;
pub mod profile;

pub use document::DocumentRecord;
pub use matching::MatchRecord;
pub use message::MessageRecord;
pub use profile::ProfileRecord;

use time::OffsetDateTime;

/// Server timestamps are stored as microseconds since the Unix epoch.
pub(crate) fn timestamp_from_micros(micros: Option<i64>) -> Option<OffsetDateTime> {
    micros.and_then(|m| OffsetDateTime::from_unix_timestamp_nanos(i128::from(m) * 1_000).ok())
}
