use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A stored document failed boundary validation and was quarantined.
    #[error("malformed page event {id}: {reason}")]
    MalformedEvent { id: String, reason: &'static str },

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid hour key (expected YYYY-MM-DD-HH): {0}")]
    InvalidHourKey(String),
}
