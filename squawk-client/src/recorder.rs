//! Recording controller
//!
//! At most one recording exists process-wide. The controller owns the
//! capture device and a small state machine; every invalid request (busy,
//! device unavailable, channel not eligible) is a silent no-op so rapid or
//! contradictory user input can never wedge the session.
//!
//! Stopping is two-phase: `request_stop` tells the device to flush, and the
//! session calls `finalize` once the device's `Flushed` marker arrives, so
//! no tail audio is lost even though the flush is asynchronous.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::debug;

use crate::capture::{CaptureDevice, CaptureEvent, DeviceError};

/// A finished clip ready to publish
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// Result of finalizing a recording
#[derive(Debug, Clone, PartialEq)]
pub enum Finalized {
    /// A non-empty clip to publish
    Clip(Clip),
    /// The recording produced no audio; nothing to publish
    Empty { channel: String },
}

/// One in-flight recording
#[derive(Debug)]
struct RecordingSession {
    channel: String,
    fragments: Vec<Vec<u8>>,
    started_at: Instant,
}

#[derive(Debug)]
enum RecorderState {
    Idle,
    Recording {
        session: RecordingSession,
        /// Stop requested; waiting for the device's flush marker
        finalizing: bool,
    },
    /// Device acquisition failed; recording is permanently off
    Unavailable,
}

/// Single-slot recording state machine
pub struct Recorder {
    state: RecorderState,
    device: Box<dyn CaptureDevice>,
}

impl Recorder {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            state: RecorderState::Idle,
            device,
        }
    }

    /// Begin recording into a channel
    ///
    /// Returns `Ok(true)` if a recording started, `Ok(false)` if the request
    /// was ignored (already recording, or the device is unavailable), and
    /// `Err` exactly once when device acquisition first fails; after that
    /// the controller is `Unavailable` and further starts return `Ok(false)`.
    ///
    /// Channel eligibility is checked by the session before calling this.
    pub fn request_start(
        &mut self,
        channel: &str,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<bool, DeviceError> {
        match &self.state {
            RecorderState::Unavailable => {
                debug!(channel, "Ignoring record request: capture unavailable");
                Ok(false)
            }
            RecorderState::Recording { session, .. } => {
                debug!(
                    requested = channel,
                    active = %session.channel,
                    "Ignoring record request: already recording"
                );
                Ok(false)
            }
            RecorderState::Idle => {
                if let Err(e) = self.device.start(events) {
                    self.state = RecorderState::Unavailable;
                    return Err(e);
                }
                self.state = RecorderState::Recording {
                    session: RecordingSession {
                        channel: channel.to_string(),
                        fragments: Vec::new(),
                        started_at: Instant::now(),
                    },
                    finalizing: false,
                };
                Ok(true)
            }
        }
    }

    /// Append a captured fragment to the active recording
    ///
    /// Fragments arriving with no active recording (after a cancel, for
    /// example) are dropped.
    pub fn push_fragment(&mut self, bytes: Vec<u8>) {
        if let RecorderState::Recording { session, .. } = &mut self.state {
            session.fragments.push(bytes);
        }
    }

    /// Request the end of the active recording
    ///
    /// Stops the device, which flushes its buffer and emits
    /// [`CaptureEvent::Flushed`]; call [`finalize`](Self::finalize) when that
    /// arrives. Returns false if there was nothing to stop or a stop is
    /// already in flight.
    pub fn request_stop(&mut self) -> bool {
        if let RecorderState::Recording { finalizing, .. } = &mut self.state
            && !*finalizing
        {
            *finalizing = true;
            self.device.stop();
            return true;
        }
        false
    }

    /// Complete a stop once the device has flushed
    ///
    /// Returns `None` if no stop was in flight (a stray flush marker).
    /// An all-empty recording is reported as [`Finalized::Empty`] so the
    /// caller can clear indicators without publishing anything.
    pub fn finalize(&mut self) -> Option<Finalized> {
        let RecorderState::Recording { finalizing: true, .. } = &self.state else {
            return None;
        };

        let RecorderState::Recording { session, .. } =
            std::mem::replace(&mut self.state, RecorderState::Idle)
        else {
            unreachable!();
        };

        let payload: Vec<u8> = session.fragments.into_iter().flatten().collect();
        debug!(
            channel = %session.channel,
            bytes = payload.len(),
            elapsed_ms = session.started_at.elapsed().as_millis() as u64,
            "Recording finalized"
        );

        if payload.is_empty() {
            Some(Finalized::Empty {
                channel: session.channel,
            })
        } else {
            Some(Finalized::Clip(Clip {
                channel: session.channel,
                payload,
            }))
        }
    }

    /// Discard the active recording without publishing
    ///
    /// Used when the user leaves the channel mid-recording and when the
    /// transport drops. Returns the cancelled channel's name, if any.
    pub fn cancel(&mut self) -> Option<String> {
        if let RecorderState::Recording { .. } = &self.state {
            let RecorderState::Recording { session, .. } =
                std::mem::replace(&mut self.state, RecorderState::Idle)
            else {
                unreachable!();
            };
            self.device.stop();
            debug!(channel = %session.channel, "Recording cancelled");
            return Some(session.channel);
        }
        None
    }

    /// The channel currently being recorded into, if any
    pub fn recording_channel(&self) -> Option<&str> {
        match &self.state {
            RecorderState::Recording { session, .. } => Some(&session.channel),
            _ => None,
        }
    }

    /// Whether the capture device has permanently failed
    pub fn is_unavailable(&self) -> bool {
        matches!(self.state, RecorderState::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::mock::MockDevice;

    fn recorder() -> (Recorder, crate::capture::mock::MockDeviceControl) {
        let (device, control) = MockDevice::new();
        (Recorder::new(Box::new(device)), control)
    }

    fn events() -> mpsc::UnboundedSender<CaptureEvent> {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn test_start_from_idle() {
        let (mut recorder, control) = recorder();

        assert_eq!(recorder.request_start("General", events()), Ok(true));
        assert_eq!(recorder.recording_channel(), Some("General"));
        assert_eq!(control.starts(), 1);
    }

    #[test]
    fn test_start_while_recording_same_channel_is_noop() {
        let (mut recorder, control) = recorder();

        recorder.request_start("General", events()).expect("start");
        assert_eq!(recorder.request_start("General", events()), Ok(false));
        assert_eq!(control.starts(), 1);
    }

    #[test]
    fn test_start_different_channel_while_recording_is_rejected() {
        let (mut recorder, _control) = recorder();

        recorder.request_start("General", events()).expect("start");
        assert_eq!(recorder.request_start("Emergency", events()), Ok(false));
        // The original recording is untouched
        assert_eq!(recorder.recording_channel(), Some("General"));
    }

    #[test]
    fn test_device_failure_reported_once_then_silent() {
        let (device, control) = MockDevice::failing(DeviceError::NotFound);
        let mut recorder = Recorder::new(Box::new(device));

        assert_eq!(
            recorder.request_start("General", events()),
            Err(DeviceError::NotFound)
        );
        assert!(recorder.is_unavailable());

        // Every later attempt is a silent no-op, not a repeated error
        assert_eq!(recorder.request_start("General", events()), Ok(false));
        assert_eq!(recorder.request_start("Emergency", events()), Ok(false));
        assert_eq!(control.starts(), 1);
    }

    #[test]
    fn test_stop_and_finalize_produces_clip() {
        let (mut recorder, control) = recorder();

        recorder.request_start("General", events()).expect("start");
        recorder.push_fragment(vec![1, 2]);
        recorder.push_fragment(vec![3, 4]);

        assert!(recorder.request_stop());
        assert_eq!(control.stops(), 1);

        let finalized = recorder.finalize().expect("finalized");
        assert_eq!(
            finalized,
            Finalized::Clip(Clip {
                channel: "General".to_string(),
                payload: vec![1, 2, 3, 4],
            })
        );
        assert_eq!(recorder.recording_channel(), None);
    }

    #[test]
    fn test_fragments_during_flush_are_kept() {
        let (mut recorder, _control) = recorder();

        recorder.request_start("General", events()).expect("start");
        recorder.push_fragment(vec![1]);
        recorder.request_stop();
        // Tail audio flushed by the device after the stop request
        recorder.push_fragment(vec![2]);

        let finalized = recorder.finalize().expect("finalized");
        assert_eq!(
            finalized,
            Finalized::Clip(Clip {
                channel: "General".to_string(),
                payload: vec![1, 2],
            })
        );
    }

    #[test]
    fn test_empty_recording_is_discarded() {
        let (mut recorder, _control) = recorder();

        recorder.request_start("General", events()).expect("start");
        recorder.request_stop();

        assert_eq!(
            recorder.finalize(),
            Some(Finalized::Empty {
                channel: "General".to_string(),
            })
        );
    }

    #[test]
    fn test_stop_without_recording_is_noop() {
        let (mut recorder, control) = recorder();
        assert!(!recorder.request_stop());
        assert_eq!(control.stops(), 0);
    }

    #[test]
    fn test_double_stop_is_noop() {
        let (mut recorder, control) = recorder();

        recorder.request_start("General", events()).expect("start");
        assert!(recorder.request_stop());
        assert!(!recorder.request_stop());
        assert_eq!(control.stops(), 1);
    }

    #[test]
    fn test_finalize_without_stop_is_noop() {
        let (mut recorder, _control) = recorder();

        recorder.request_start("General", events()).expect("start");
        assert_eq!(recorder.finalize(), None);
        assert_eq!(recorder.recording_channel(), Some("General"));
    }

    #[test]
    fn test_cancel_discards_fragments() {
        let (mut recorder, control) = recorder();

        recorder.request_start("General", events()).expect("start");
        recorder.push_fragment(vec![1, 2, 3]);

        assert_eq!(recorder.cancel(), Some("General".to_string()));
        assert_eq!(control.stops(), 1);
        assert_eq!(recorder.recording_channel(), None);

        // A flush marker after cancel finalizes nothing
        assert_eq!(recorder.finalize(), None);
    }

    #[test]
    fn test_cancel_without_recording_is_noop() {
        let (mut recorder, control) = recorder();
        assert_eq!(recorder.cancel(), None);
        assert_eq!(control.stops(), 0);
    }

    #[test]
    fn test_fragments_ignored_when_idle() {
        let (mut recorder, _control) = recorder();

        recorder.push_fragment(vec![1, 2, 3]);
        recorder.request_start("General", events()).expect("start");
        recorder.request_stop();

        // The pre-start fragment never entered the session
        assert_eq!(
            recorder.finalize(),
            Some(Finalized::Empty {
                channel: "General".to_string(),
            })
        );
    }

    #[test]
    fn test_restart_after_finalize() {
        let (mut recorder, control) = recorder();

        recorder.request_start("General", events()).expect("start");
        recorder.request_stop();
        recorder.finalize();

        assert_eq!(recorder.request_start("Emergency", events()), Ok(true));
        assert_eq!(recorder.recording_channel(), Some("Emergency"));
        assert_eq!(control.starts(), 2);
    }
}
