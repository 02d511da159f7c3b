use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Game payloads and summaries.
pub mod game;
/// Store health report.
pub mod health;
/// Field validators shared by the payloads.
pub mod validation;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
