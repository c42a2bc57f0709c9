//! Microphone capture
//!
//! The recorder talks to the microphone through the [`CaptureDevice`] trait
//! so tests can substitute a scripted device. The production implementation
//! is [`CpalCapture`], which opens the default input device at its native
//! configuration and normalizes everything to mono f32 at
//! [`CLIP_SAMPLE_RATE`] fragments.
//!
//! cpal streams are not `Send`, which is why the whole session runs on a
//! dedicated thread (see [`crate::session`]).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, Stream, StreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::constants::{CLIP_SAMPLE_RATE, FRAGMENT_SAMPLES};
use crate::pcm;

/// Errors from acquiring or driving the capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No input device is available
    NotFound,
    /// The device's format is not usable
    Unsupported(String),
    /// The stream could not be built or started
    Stream(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound => write!(f, "no input device available"),
            DeviceError::Unsupported(msg) => write!(f, "unsupported input format: {msg}"),
            DeviceError::Stream(msg) => write!(f, "input stream error: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Events a capture device emits into the session loop
#[derive(Debug)]
pub enum CaptureEvent {
    /// One fragment of raw audio (little-endian f32 mono samples)
    Fragment(Vec<u8>),
    /// All buffered audio has been delivered after a stop request
    Flushed,
    /// The device failed mid-capture
    Error(String),
}

/// A source of audio fragments
///
/// `start` begins emitting [`CaptureEvent::Fragment`]s into `events`.
/// `stop` must deliver any partially buffered audio as a final fragment and
/// then emit [`CaptureEvent::Flushed`], so the caller knows the clip is
/// complete before finalizing it.
pub trait CaptureDevice {
    fn start(&mut self, events: mpsc::UnboundedSender<CaptureEvent>) -> Result<(), DeviceError>;
    fn stop(&mut self);
}

// ============================================================================
// cpal implementation
// ============================================================================

/// Capture from the system default input device via cpal
pub struct CpalCapture {
    stream: Option<Stream>,
    active: Arc<AtomicBool>,
    /// Samples accumulated but not yet emitted as a full fragment
    pending: Arc<Mutex<Vec<f32>>>,
    events: Option<mpsc::UnboundedSender<CaptureEvent>>,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self {
            stream: None,
            active: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(Mutex::new(Vec::new())),
            events: None,
        }
    }

    fn open_stream(
        &self,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Stream, DeviceError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(DeviceError::NotFound)?;

        if let Ok(desc) = device.description() {
            info!(device = %desc.name(), "Opening input device");
        }

        let default_config = device
            .default_input_config()
            .map_err(|e| DeviceError::Unsupported(e.to_string()))?;

        let sample_format = default_config.sample_format();
        let channels = default_config.channels();
        let native_rate = default_config.sample_rate();

        let config = StreamConfig {
            channels,
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        debug!(native_rate, channels, ?sample_format, "Input device config");

        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(&device, &config, events),
            SampleFormat::I16 => self.build_stream::<i16>(&device, &config, events),
            SampleFormat::U16 => self.build_stream::<u16>(&device, &config, events),
            other => {
                return Err(DeviceError::Unsupported(format!(
                    "sample format {other:?}"
                )));
            }
        }?;

        Ok(stream)
    }

    /// Build an input stream for the given sample type
    ///
    /// The callback converts to f32, downmixes to mono, resamples to the
    /// clip rate, and emits full fragments as they accumulate.
    fn build_stream<T>(
        &self,
        device: &Device,
        config: &StreamConfig,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Stream, DeviceError>
    where
        T: Sample + cpal::SizedSample,
        f32: FromSample<T>,
    {
        let active = Arc::clone(&self.active);
        let pending = Arc::clone(&self.pending);
        let channels = config.channels;
        let native_rate = config.sample_rate;
        let error_tx = events.clone();

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    let raw: Vec<f32> = data.iter().map(|s| f32::from_sample(*s)).collect();
                    let mono = pcm::to_mono(&raw, channels);
                    let resampled = pcm::resample_linear(&mono, native_rate, CLIP_SAMPLE_RATE);

                    if let Ok(mut buf) = pending.lock() {
                        buf.extend_from_slice(&resampled);
                        while buf.len() >= FRAGMENT_SAMPLES {
                            let fragment: Vec<f32> = buf.drain(..FRAGMENT_SAMPLES).collect();
                            let _ = events
                                .send(CaptureEvent::Fragment(pcm::encode_samples(&fragment)));
                        }
                    }
                },
                move |err| {
                    // Ignore send failure if the session is gone
                    let _ = error_tx.send(CaptureEvent::Error(err.to_string()));
                },
                None,
            )
            .map_err(|e| DeviceError::Stream(e.to_string()))
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for CpalCapture {
    fn start(&mut self, events: mpsc::UnboundedSender<CaptureEvent>) -> Result<(), DeviceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        if let Ok(mut buf) = self.pending.lock() {
            buf.clear();
        }

        let stream = self.open_stream(events.clone())?;
        stream.play().map_err(|e| DeviceError::Stream(e.to_string()))?;

        self.active.store(true, Ordering::SeqCst);
        self.stream = Some(stream);
        self.events = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);

        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause input stream: {e}");
            }
            drop(stream);
        }

        // With the stream gone the callback can't run, so draining here
        // cannot race a concurrent append.
        let remaining: Vec<f32> = match self.pending.lock() {
            Ok(mut buf) => buf.drain(..).collect(),
            Err(_) => Vec::new(),
        };

        if let Some(events) = self.events.take() {
            if !remaining.is_empty() {
                let _ = events.send(CaptureEvent::Fragment(pcm::encode_samples(&remaining)));
            }
            let _ = events.send(CaptureEvent::Flushed);
        }
    }
}

// ============================================================================
// Test double
// ============================================================================
