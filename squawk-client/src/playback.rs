//! Clip playback
//!
//! The session plays inbound clips through the [`ClipPlayer`] trait so tests
//! can observe and script playback. The production implementation is
//! [`RodioPlayer`], which mixes each clip on its own rodio sink; overlapping
//! clips from different channels (or the same one) simply play together.
//!
//! Completion is reported back into the session loop as a
//! [`PlaybackEvent::Finished`], which is what drives the per-channel
//! receiving counts. Replays carry `replay: true` so they never touch those
//! counts.

use std::sync::Arc;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tokio::sync::mpsc;
use tracing::debug;

use crate::constants::{CLIP_CHANNELS, CLIP_SAMPLE_RATE};
use crate::pcm;

/// Events a player emits into the session loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A clip finished playing
    Finished { channel: String, replay: bool },
}

/// Plays one clip and reports completion
pub trait ClipPlayer {
    /// Start playing `clip`; emit [`PlaybackEvent::Finished`] on `events`
    /// when it ends. `replay` is echoed back in the completion event.
    fn play(
        &mut self,
        channel: &str,
        clip: Arc<Vec<u8>>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
        replay: bool,
    ) -> Result<(), String>;
}

// ============================================================================
// rodio implementation
// ============================================================================

/// Playback through the default output device via rodio
///
/// The output stream is opened lazily on the first clip so a machine with no
/// audio output can still run the client; each failed open is retried on the
/// next clip.
pub struct RodioPlayer {
    output: Option<(OutputStream, OutputStreamHandle)>,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self { output: None }
    }

    fn handle(&mut self) -> Result<&OutputStreamHandle, String> {
        if self.output.is_none() {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| format!("failed to open audio output: {e}"))?;
            self.output = Some((stream, handle));
        }
        // Just populated above if it was empty
        match &self.output {
            Some((_, handle)) => Ok(handle),
            None => Err("audio output unavailable".to_string()),
        }
    }
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipPlayer for RodioPlayer {
    fn play(
        &mut self,
        channel: &str,
        clip: Arc<Vec<u8>>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
        replay: bool,
    ) -> Result<(), String> {
        let samples = pcm::decode_samples(&clip);
        let channel = channel.to_string();

        if samples.is_empty() {
            // Nothing audible; complete immediately so counts stay balanced
            let _ = events.send(PlaybackEvent::Finished { channel, replay });
            return Ok(());
        }

        let handle = self.handle()?;
        let sink = Sink::try_new(handle).map_err(|e| format!("failed to create sink: {e}"))?;
        sink.append(SamplesBuffer::new(CLIP_CHANNELS, CLIP_SAMPLE_RATE, samples));

        debug!(channel = %channel, bytes = clip.len(), replay, "Playing clip");

        // The sink is blocking, so completion is watched from a helper
        // thread rather than the session's runtime.
        std::thread::spawn(move || {
            sink.sleep_until_end();
            let _ = events.send(PlaybackEvent::Finished { channel, replay });
        });

        Ok(())
    }
}

// ============================================================================
// Test double
// ============================================================================
