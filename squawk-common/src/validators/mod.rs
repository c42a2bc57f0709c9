//! Input validation functions
//!
//! Validators shared between the client and any future server component.
//! The client validates catalog entries at startup; a server would use the
//! same rules for enforcement.

mod channel;

pub use channel::{ChannelError, MAX_CHANNEL_LENGTH, validate_channel};
