//! Client-wide constants

use std::time::Duration;

/// Directory name under the platform config directory
pub const APP_DIR_NAME: &str = "squawk";

/// File name for the persisted channel membership
pub const CHANNELS_FILE_NAME: &str = "channels.json";

/// Default channel catalog used when no catalog is supplied
pub const DEFAULT_CATALOG: &[&str] = &["General", "Project Alpha", "Emergency", "Music Room"];

/// Delay between reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Sample rate for voice clips (48kHz)
pub const CLIP_SAMPLE_RATE: u32 = 48_000;

/// Number of audio channels in a clip (mono)
pub const CLIP_CHANNELS: u16 = 1;

/// Samples per capture fragment (~26ms at 48kHz)
pub const FRAGMENT_SAMPLES: usize = 1280;
