//! Channel name validation
//!
//! Channel names come from a fixed catalog chosen by the operator, so the
//! rules are permissive: display names like "Project Alpha" or "Music Room"
//! are valid, but names must still be printable and bounded so they survive
//! the wire format and the persisted membership file.

/// Maximum length for channel names in characters
pub const MAX_CHANNEL_LENGTH: usize = 64;

/// Validation error for channel names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Channel name is empty
    Empty,
    /// Channel name is only whitespace
    Blank,
    /// Channel name exceeds maximum length
    TooLong,
    /// Channel name contains control characters
    InvalidCharacters,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Empty => write!(f, "channel name is empty"),
            ChannelError::Blank => write!(f, "channel name is only whitespace"),
            ChannelError::TooLong => {
                write!(f, "channel name exceeds {MAX_CHANNEL_LENGTH} characters")
            }
            ChannelError::InvalidCharacters => {
                write!(f, "channel name contains control characters")
            }
        }
    }
}

impl std::error::Error for ChannelError {}

/// Validate a channel name
///
/// Checks:
/// - Not empty and not only whitespace
/// - Does not exceed maximum length (64 characters)
/// - No control characters (tabs, newlines, NUL); interior spaces are fine
///
/// # Errors
///
/// Returns a `ChannelError` variant describing the validation failure.
///
/// # Examples
///
/// ```
/// use squawk_common::validators::{validate_channel, ChannelError};
///
/// // Valid channel names
/// assert!(validate_channel("General").is_ok());
/// assert!(validate_channel("Project Alpha").is_ok());
/// assert!(validate_channel("日本語").is_ok());
///
/// // Invalid channel names
/// assert_eq!(validate_channel(""), Err(ChannelError::Empty));
/// assert_eq!(validate_channel("   "), Err(ChannelError::Blank));
/// assert_eq!(validate_channel("a\tb"), Err(ChannelError::InvalidCharacters));
/// ```
pub fn validate_channel(channel: &str) -> Result<(), ChannelError> {
    if channel.is_empty() {
        return Err(ChannelError::Empty);
    }

    if channel.chars().all(char::is_whitespace) {
        return Err(ChannelError::Blank);
    }

    if channel.chars().count() > MAX_CHANNEL_LENGTH {
        return Err(ChannelError::TooLong);
    }

    for ch in channel.chars() {
        if ch.is_control() || (ch.is_whitespace() && ch != ' ') {
            return Err(ChannelError::InvalidCharacters);
        }
    }

    Ok(())
}
