//! Squawk client core
//!
//! Push-to-talk voice client: join any subset of named channels, hold to
//! record a short clip into one channel, and hear clips other members send.
//! The session manager in [`session`] owns all coordination state; the
//! other modules are the pieces it drives.

pub mod capture;
pub mod channels;
pub mod constants;
pub mod membership;
pub mod pcm;
pub mod playback;
pub mod recorder;
pub mod session;
