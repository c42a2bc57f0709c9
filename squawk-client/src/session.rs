//! Session manager
//!
//! Owns every piece of coordination state: the channel registry, the
//! recording controller, the playback dispatcher, and the connection
//! lifecycle. One `tokio::select!` loop serializes user commands, transport
//! events, capture fragments, and playback completions, so no state needs
//! locking and no two handlers ever race.
//!
//! The loop runs on a dedicated OS thread with a current-thread runtime
//! because cpal's streams are not Send-safe and cannot cross async task
//! boundaries.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use squawk_common::io::{read_server_message, send_client_message};
use squawk_common::protocol::{ClientMessage, ServerMessage};
use squawk_common::validators::validate_channel;

use crate::capture::{CaptureDevice, CaptureEvent};
use crate::channels::ChannelRegistry;
use crate::constants::RECONNECT_DELAY;
use crate::membership::MembershipStore;
use crate::playback::{ClipPlayer, PlaybackEvent};
use crate::recorder::{Finalized, Recorder};

// =============================================================================
// Session Configuration
// =============================================================================

/// Configuration for starting a session
pub struct SessionConfig {
    /// Server address as `host:port`
    pub server_addr: String,
    /// Fixed channel catalog, in display order
    pub catalog: Vec<String>,
    /// Identity announced in `Hello`, echoed back for echo suppression
    pub client_id: Uuid,
    /// Persisted membership store
    pub membership: MembershipStore,
}

// =============================================================================
// Session Events and Commands
// =============================================================================

/// Events emitted by the session for the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Transport connected and the subscription set was resynced
    Connected,
    /// Transport lost; reconnection continues in the background
    Disconnected,
    /// Recording into a channel began
    RecordingStarted(String),
    /// Recording ended (published, discarded, or cancelled)
    RecordingStopped(String),
    /// The capture device failed; recording is permanently off
    RecorderUnavailable(String),
    /// A channel became audible (first in-flight clip started)
    ReceivingStarted(String),
    /// A channel became quiet (last in-flight clip finished)
    ReceivingStopped(String),
    /// A clip was sent to the server
    ClipPublished(String),
    /// A subscription toggle took effect
    SubscriptionChanged { channel: String, subscribed: bool },
}

/// Commands to control the session
#[derive(Debug)]
pub enum SessionCommand {
    /// Join or leave a channel
    SetSubscribed { channel: String, subscribed: bool },
    /// Push-to-talk pressed for a channel
    StartRecording(String),
    /// Push-to-talk released
    StopRecording,
    /// Replay the last clip heard on a channel
    Replay(String),
    /// Shut the session down
    Stop,
}

// =============================================================================
// Transport Task
// =============================================================================

/// Events from the transport task into the dispatch loop
#[derive(Debug)]
enum TransportEvent {
    Connected,
    Disconnected,
    Message(ServerMessage),
}

/// Connection lifecycle: connect, split into reader task + writer loop,
/// report up, reconnect forever on failure.
///
/// Outbound messages received while the link is down are dropped, not
/// queued; the dispatch loop resyncs the subscription set on every
/// `Connected`, which is what heals the server's view.
async fn run_transport(
    addr: String,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
) {
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                let (read_half, write_half) = stream.into_split();
                if transport_tx.send(TransportEvent::Connected).is_err() {
                    return;
                }

                // Reader runs as its own task so a pending read is never
                // cancelled mid-message by writer activity.
                let reader_tx = transport_tx.clone();
                let mut reader_task = tokio::spawn(async move {
                    let mut reader = BufReader::new(read_half);
                    loop {
                        match read_server_message(&mut reader).await {
                            Ok(Some(message)) => {
                                if reader_tx.send(TransportEvent::Message(message)).is_err() {
                                    break;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                debug!("Transport read error: {e}");
                                break;
                            }
                        }
                    }
                });

                let mut writer = write_half;
                loop {
                    tokio::select! {
                        outbound = outbound_rx.recv() => match outbound {
                            Some(message) => {
                                if let Err(e) = send_client_message(&mut writer, &message).await {
                                    debug!("Transport write error: {e}");
                                    break;
                                }
                            }
                            // Session is gone; shut down quietly
                            None => {
                                reader_task.abort();
                                return;
                            }
                        },
                        _ = &mut reader_task => break,
                    }
                }

                reader_task.abort();
                if transport_tx.send(TransportEvent::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!("Connect to {addr} failed: {e}");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            outbound = outbound_rx.recv() => {
                if outbound.is_none() {
                    return;
                }
                // Message sent while down: dropped by design of the resync
            }
        }
    }
}

// =============================================================================
// Session Runner
// =============================================================================

/// Everything the dispatch handlers touch, grouped so the select! arms
/// stay readable
struct Session {
    client_id: Uuid,
    registry: ChannelRegistry,
    recorder: Recorder,
    player: Box<dyn ClipPlayer>,
    membership: MembershipStore,
    connected: bool,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    outbound_tx: mpsc::UnboundedSender<ClientMessage>,
    capture_tx: mpsc::UnboundedSender<CaptureEvent>,
    playback_tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl Session {
    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn send(&self, message: ClientMessage) {
        let _ = self.outbound_tx.send(message);
    }

    /// Returns false when the session should shut down
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::SetSubscribed {
                channel,
                subscribed,
            } => self.set_subscribed(channel, subscribed),
            SessionCommand::StartRecording(channel) => self.start_recording(channel),
            SessionCommand::StopRecording => {
                self.recorder.request_stop();
            }
            SessionCommand::Replay(channel) => self.replay(channel),
            SessionCommand::Stop => return false,
        }
        true
    }

    fn set_subscribed(&mut self, channel: String, subscribed: bool) {
        if !self.registry.set_subscribed(&channel, subscribed) {
            return;
        }

        // Leaving the channel being recorded into kills the recording;
        // the clip is discarded, never published.
        if !subscribed
            && self.recorder.recording_channel() == Some(channel.as_str())
            && let Some(cancelled) = self.recorder.cancel()
        {
            self.emit(SessionEvent::RecordingStopped(cancelled));
        }

        let subscribed_set: HashSet<String> =
            self.registry.subscribed_names().into_iter().collect();
        if let Err(e) = self.membership.save(&subscribed_set) {
            warn!("Failed to persist membership: {e}");
        }

        if self.connected {
            let message = if subscribed {
                ClientMessage::JoinChannel {
                    channel: channel.clone(),
                }
            } else {
                ClientMessage::LeaveChannel {
                    channel: channel.clone(),
                }
            };
            self.send(message);
        }

        self.emit(SessionEvent::SubscriptionChanged {
            channel,
            subscribed,
        });
    }

    fn start_recording(&mut self, channel: String) {
        if !self.registry.recording_allowed(&channel) {
            debug!(channel, "Ignoring record request: not subscribed");
            return;
        }
        match self
            .recorder
            .request_start(&channel, self.capture_tx.clone())
        {
            Ok(true) => self.emit(SessionEvent::RecordingStarted(channel)),
            Ok(false) => {}
            Err(e) => {
                warn!("Capture device unavailable: {e}");
                self.emit(SessionEvent::RecorderUnavailable(e.to_string()));
            }
        }
    }

    fn replay(&mut self, channel: String) {
        let Some(clip) = self.registry.clip(&channel) else {
            debug!(channel, "Nothing to replay");
            return;
        };
        // Replays don't touch the receiving counts, so the completion
        // event is tagged and ignored by the playback handler.
        if let Err(e) = self
            .player
            .play(&channel, clip, self.playback_tx.clone(), true)
        {
            warn!(channel, "Replay failed: {e}");
        }
    }

    fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Fragment(bytes) => self.recorder.push_fragment(bytes),
            CaptureEvent::Flushed => self.finish_recording(),
            CaptureEvent::Error(message) => {
                warn!("Capture error: {message}");
                if let Some(cancelled) = self.recorder.cancel() {
                    self.emit(SessionEvent::RecordingStopped(cancelled));
                }
            }
        }
    }

    fn finish_recording(&mut self) {
        match self.recorder.finalize() {
            Some(Finalized::Clip(clip)) => {
                if self.connected {
                    self.send(ClientMessage::AudioMessage {
                        channel: clip.channel.clone(),
                        payload: clip.payload,
                    });
                    self.emit(SessionEvent::ClipPublished(clip.channel.clone()));
                } else {
                    debug!(channel = %clip.channel, "Dropping clip: transport down");
                }
                self.emit(SessionEvent::RecordingStopped(clip.channel));
            }
            Some(Finalized::Empty { channel }) => {
                debug!(channel, "Discarding empty clip");
                self.emit(SessionEvent::RecordingStopped(channel));
            }
            None => {}
        }
    }

    fn handle_playback_event(&mut self, event: PlaybackEvent) {
        let PlaybackEvent::Finished { channel, replay } = event;
        if replay {
            return;
        }
        if self.registry.end_receiving(&channel) {
            self.emit(SessionEvent::ReceivingStopped(channel));
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.connected = true;
                self.resync();
                self.emit(SessionEvent::Connected);
            }
            TransportEvent::Disconnected => {
                self.connected = false;
                if let Some(cancelled) = self.recorder.cancel() {
                    self.emit(SessionEvent::RecordingStopped(cancelled));
                }
                self.emit(SessionEvent::Disconnected);
            }
            TransportEvent::Message(ServerMessage::AudioMessage {
                channel,
                payload,
                sender_id,
            }) => self.handle_inbound_clip(channel, payload, sender_id),
        }
    }

    /// Announce identity and replay the full current subscription set.
    ///
    /// Sent on every connect, so a server that lost this client's state
    /// (restart, missed leaves while down) converges immediately.
    fn resync(&mut self) {
        self.send(ClientMessage::Hello {
            client_id: self.client_id,
        });
        for channel in self.registry.subscribed_names() {
            self.send(ClientMessage::JoinChannel { channel });
        }
    }

    fn handle_inbound_clip(&mut self, channel: String, payload: Vec<u8>, sender_id: Uuid) {
        if sender_id == self.client_id {
            trace!(channel, "Discarding echo of own clip");
            return;
        }
        if !self.registry.contains(&channel) {
            warn!(channel, "Dropping clip for unknown channel");
            return;
        }

        // Cache before playing: replay works even if playback fails.
        let clip = Arc::new(payload);
        self.registry.cache_clip(&channel, Arc::clone(&clip));

        match self
            .player
            .play(&channel, clip, self.playback_tx.clone(), false)
        {
            Ok(()) => {
                if self.registry.begin_receiving(&channel) {
                    self.emit(SessionEvent::ReceivingStarted(channel));
                }
            }
            Err(e) => warn!(channel, "Playback failed: {e}"),
        }
    }
}

/// Run a session to completion
///
/// Drives the dispatch loop until a [`SessionCommand::Stop`] arrives or the
/// command channel closes. The capture device and player are injected so
/// tests can run the full loop against scripted audio.
pub async fn run_session(
    config: SessionConfig,
    device: Box<dyn CaptureDevice>,
    player: Box<dyn ClipPlayer>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
) {
    let catalog: Vec<String> = config
        .catalog
        .into_iter()
        .filter(|name| match validate_channel(name) {
            Ok(()) => true,
            Err(e) => {
                warn!(channel = %name, "Dropping invalid catalog entry: {e}");
                false
            }
        })
        .collect();

    let saved = config.membership.load();
    let registry = ChannelRegistry::new(&catalog, &saved);

    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();
    let (playback_tx, mut playback_rx) = mpsc::unbounded_channel();
    let (transport_tx, mut transport_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let transport_task = tokio::spawn(run_transport(
        config.server_addr,
        transport_tx,
        outbound_rx,
    ));

    let mut session = Session {
        client_id: config.client_id,
        registry,
        recorder: Recorder::new(device),
        player,
        membership: config.membership,
        connected: false,
        event_tx,
        outbound_tx,
        capture_tx,
        playback_tx,
    };

    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(command) => {
                    if !session.handle_command(command) {
                        break;
                    }
                }
                None => break,
            },
            Some(event) = capture_rx.recv() => session.handle_capture_event(event),
            Some(event) = playback_rx.recv() => session.handle_playback_event(event),
            event = transport_rx.recv() => match event {
                Some(event) => session.handle_transport_event(event),
                None => break,
            },
        }
    }

    session.recorder.cancel();
    transport_task.abort();
}

// =============================================================================
// Session Handle
// =============================================================================

/// Handle for controlling a running session
pub struct SessionHandle {
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Join handle for the session thread
    /// Using std::thread instead of tokio::spawn because cpal's Stream is not Send
    handle: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Start a session with the real capture and playback devices
    ///
    /// Returns a handle for controlling the session and a receiver for
    /// events. Spawns a dedicated OS thread running its own current-thread
    /// runtime; audio devices are created on that thread.
    pub fn start(config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let handle = std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("Failed to create session runtime: {e}");
                    return;
                }
            };

            let device = Box::new(crate::capture::CpalCapture::new());
            let player = Box::new(crate::playback::RodioPlayer::new());
            rt.block_on(run_session(config, device, player, event_tx, command_rx));
        });

        (
            Self {
                command_tx,
                handle: Some(handle),
            },
            event_rx,
        )
    }

    /// Join or leave a channel
    pub fn set_subscribed(&self, channel: &str, subscribed: bool) {
        let _ = self.command_tx.send(SessionCommand::SetSubscribed {
            channel: channel.to_string(),
            subscribed,
        });
    }

    /// Push-to-talk pressed for a channel
    pub fn start_recording(&self, channel: &str) {
        let _ = self
            .command_tx
            .send(SessionCommand::StartRecording(channel.to_string()));
    }

    /// Push-to-talk released
    pub fn stop_recording(&self) {
        let _ = self.command_tx.send(SessionCommand::StopRecording);
    }

    /// Replay the last clip heard on a channel
    pub fn replay(&self, channel: &str) {
        let _ = self
            .command_tx
            .send(SessionCommand::Replay(channel.to_string()));
    }

    /// Stop the session
    ///
    /// Sends the stop command without waiting for the thread, so a stuck
    /// audio driver can't hang the caller.
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(SessionCommand::Stop);
        self.handle.take();
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
