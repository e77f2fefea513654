use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::state::tournament::Timestamp;

pub mod archive;
pub mod health;
pub mod sse;
pub mod tournament;

fn format_timestamp(millis: Timestamp) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|time| time.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
