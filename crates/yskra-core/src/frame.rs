//! PlayerJS frame - remote control of a player embedded in a cross-origin frame
//!
//! Coordinates:
//! - Swapping the media element for a frame and back
//! - Source loading and the two readiness signals (frame load, peer `inited`)
//! - Outbound commands, queued until the peer is live
//! - Request/response commands matched by name
//! - Mirroring peer events into [`MediaControls`] without echoing them back

use crate::{
    config::AdapterConfig,
    controls::{
        FieldUpdate, MediaControls, Origin, PlaybackError, Quality, SourceError, TimeRange,
    },
    hook::{EventHook, HookHandle},
    host::{FrameHost, MessageEnvelope},
    pending::PendingCommands,
    protocol::{self, Command, InboundMessage, PeerEvent},
    Error, Result,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;
use uuid::Uuid;

/// Unique identifier for an adapter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterId(pub Uuid);

impl AdapterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AdapterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AdapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commands waiting for the peer to become live
#[derive(Debug, Default)]
struct Outbox {
    live: bool,
    flushing: bool,
    queue: Vec<Command>,
}

impl Outbox {
    /// Queue a command; a newer command for the same slot replaces the queued one
    fn enqueue(&mut self, command: Command) {
        if let Some(slot) = command.slot() {
            if let Some(queued) = self.queue.iter_mut().find(|c| c.slot() == Some(slot)) {
                *queued = command;
                return;
            }
        }
        self.queue.push(command);
    }
}

struct Inner<H: FrameHost> {
    id: AdapterId,
    host: H,
    config: AdapterConfig,
    capability: Option<Error>,
    controls: watch::Sender<MediaControls>,
    frame_loaded: watch::Sender<bool>,
    peer_ready: watch::Sender<bool>,
    destroyed: watch::Sender<bool>,
    outbox: Mutex<Outbox>,
    pending: Mutex<PendingCommands>,
    source: Mutex<Option<Url>>,
    source_error: EventHook<SourceError>,
    playback_error: EventHook<PlaybackError>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Media controls backed by a PlayerJS instance living in a frame
///
/// Reads come from a local mirror; writes go to the mirror and, when they
/// change something, to the peer. Peer events update the mirror without
/// being sent back.
pub struct PlayerJsFrame<H: FrameHost> {
    inner: Arc<Inner<H>>,
}

impl<H: FrameHost> PlayerJsFrame<H> {
    /// Take over the host's element and start mirroring
    ///
    /// Must be called from within a tokio runtime. A host without
    /// messaging support or a failed mount does not abort construction;
    /// the reason is kept in [`capability_error`](Self::capability_error).
    pub fn new(host: H, config: AdapterConfig) -> Self {
        let id = AdapterId::new();

        let mut capability = None;
        if !host.supports_messaging() {
            warn!(adapter = %id, "Cross-document messaging unavailable, frame control degraded");
            capability = Some(Error::MessagingUnsupported);
        }

        match host.mount_frame() {
            Ok(()) => info!(adapter = %id, "Frame mounted"),
            Err(err) => {
                warn!(adapter = %id, error = %err, "Failed to mount frame");
                capability.get_or_insert(err);
            }
        }

        let (controls, _) = watch::channel(MediaControls::default());
        let (frame_loaded, _) = watch::channel(false);
        let (peer_ready, _) = watch::channel(false);
        let (destroyed, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            id,
            host,
            config,
            capability,
            controls,
            frame_loaded,
            peer_ready,
            destroyed,
            outbox: Mutex::new(Outbox::default()),
            pending: Mutex::new(PendingCommands::new()),
            source: Mutex::new(None),
            source_error: EventHook::new(),
            playback_error: EventHook::new(),
            tasks: Mutex::new(Vec::new()),
        });

        let poller = Arc::clone(&inner);
        inner.spawn(poller.poll_buffered());

        Self { inner }
    }

    /// Get adapter ID
    pub fn id(&self) -> AdapterId {
        self.inner.id
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    /// Why the adapter runs degraded, if it does
    pub fn capability_error(&self) -> Option<&Error> {
        self.inner.capability.as_ref()
    }

    /// Both readiness signals have fired
    pub fn is_ready(&self) -> bool {
        *self.inner.frame_loaded.borrow() && *self.inner.peer_ready.borrow()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Load a player page into the frame and wait until the peer is live
    ///
    /// There is no built-in timeout; wrap the call in one if needed.
    #[instrument(skip(self), fields(adapter = %self.inner.id))]
    pub async fn load(&self, source: &str) -> Result<()> {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return Err(Error::Destroyed);
        }

        let url = Url::parse(source).map_err(|e| Error::InvalidSource {
            url: source.to_string(),
            source: e,
        })?;

        info!(url = %url, "Loading source");

        inner
            .host
            .set_frame_attribute("allow", &inner.config.allow_attribute())?;
        inner.host.set_frame_attribute("frameborder", "0")?;
        *inner.source() = Some(url.clone());
        inner.host.navigate_frame(&url)?;

        inner.wait_until_ready().await?;

        info!(url = %url, "Source loaded");
        Ok(())
    }

    /// The frame document finished loading
    ///
    /// Only the first call counts towards readiness; later calls come from
    /// navigation inside the frame.
    pub fn notify_frame_loaded(&self) {
        self.inner.frame_loaded();
    }

    /// The frame failed to load its source
    pub fn notify_source_error(&self, message: impl Into<String>) {
        let error = SourceError {
            url: self.inner.source().clone(),
            message: message.into(),
            at: Utc::now(),
        };
        warn!(adapter = %self.inner.id, message = %error.message, "Source error");
        self.inner.source_error.trigger(&error);
    }

    /// Feed a message received by the host window
    pub fn handle_message(&self, envelope: MessageEnvelope) {
        self.inner.handle_message(envelope);
    }

    /// Restore the original element and stop mirroring
    ///
    /// Safe to call more than once. Pending commands fail with
    /// [`Error::CommandCancelled`].
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// Snapshot of all control fields
    pub fn controls(&self) -> MediaControls {
        self.inner.controls.borrow().clone()
    }

    /// Subscribe to control changes
    pub fn subscribe(&self) -> watch::Receiver<MediaControls> {
        self.inner.controls.subscribe()
    }

    /// End of the buffered range
    pub fn end_buffer(&self) -> f64 {
        self.inner.controls.borrow().end_buffer()
    }

    /// Seek; non-finite positions are ignored
    pub fn set_current_time(&self, seconds: f64) {
        if self.inner.finite("current_time", seconds) {
            self.inner.write(FieldUpdate::CurrentTime(seconds), Origin::Local);
        }
    }

    pub fn set_playing(&self, playing: bool) {
        self.inner.write(FieldUpdate::Playing(playing), Origin::Local);
    }

    pub fn set_rate(&self, rate: f64) {
        if self.inner.finite("rate", rate) {
            self.inner.write(FieldUpdate::Rate(rate), Origin::Local);
        }
    }

    /// Set volume, clamped to `0.0..=1.0`; non-finite levels are ignored
    pub fn set_volume(&self, volume: f64) {
        if self.inner.finite("volume", volume) {
            self.inner
                .write(FieldUpdate::Volume(volume.clamp(0.0, 1.0)), Origin::Local);
        }
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.write(FieldUpdate::Muted(muted), Origin::Local);
    }

    pub fn set_looping(&self, looping: bool) {
        self.inner.write(FieldUpdate::Looping(looping), Origin::Local);
    }

    /// Select a rendition by its index in `qualities`
    pub fn set_quality(&self, index: Option<usize>) {
        self.inner.write(FieldUpdate::Quality(index), Origin::Local);
    }

    pub fn toggle_play(&self) {
        let playing = self.inner.controls.borrow().playing;
        self.set_playing(!playing);
    }

    pub fn toggle_mute(&self) {
        let muted = self.inner.controls.borrow().muted;
        self.set_muted(!muted);
    }

    /// Text tracks are not exposed by the peer
    pub fn enable_track(&self, _index: usize) {}

    pub fn disable_track(&self, _index: Option<usize>) {}

    pub fn supports_picture_in_picture(&self) -> bool {
        false
    }

    /// Picture-in-picture is not exposed by the peer
    pub async fn toggle_picture_in_picture(&self) -> Result<()> {
        Ok(())
    }

    /// Listen for source load failures
    pub fn on_source_error<F>(&self, listener: F) -> HookHandle
    where
        F: Fn(&SourceError) + Send + Sync + 'static,
    {
        self.inner.source_error.on(listener)
    }

    /// Listen for playback errors reported by the peer
    pub fn on_playback_error<F>(&self, listener: F) -> HookHandle
    where
        F: Fn(&PlaybackError) + Send + Sync + 'static,
    {
        self.inner.playback_error.on(listener)
    }

    /// Send an arbitrary command, argument passed through as given
    pub fn command(&self, name: &str, arg: Option<Value>) {
        self.inner.send(Command::raw(name, arg));
    }

    /// Send an arbitrary command and wait for the peer's answer
    #[instrument(skip(self, arg), fields(adapter = %self.inner.id))]
    pub async fn command_with_answer(&self, name: &str, arg: Option<Value>) -> Result<Value> {
        self.inner.request(Command::raw(name, arg)).await
    }
}

impl<H: FrameHost> Drop for PlayerJsFrame<H> {
    fn drop(&mut self) {
        self.inner.destroy();
    }
}

impl<H: FrameHost> Inner<H> {
    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, PendingCommands> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn source(&self) -> MutexGuard<'_, Option<Url>> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_destroyed(&self) -> bool {
        *self.destroyed.borrow()
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        if self.is_destroyed() {
            return;
        }
        tasks.retain(|t| !t.is_finished());
        tasks.push(tokio::spawn(task));
    }

    /// Write a mirrored field; only changed local writes reach the peer
    fn write(&self, update: FieldUpdate, origin: Origin) -> bool {
        if !self.controls.send_if_modified(|c| update.apply_to(c)) {
            return false;
        }

        trace!(adapter = %self.id, ?update, ?origin, "Control changed");

        if origin == Origin::Local {
            if let Some(command) = self.command_for(&update) {
                self.send(command);
            }
        }
        true
    }

    fn command_for(&self, update: &FieldUpdate) -> Option<Command> {
        let command = match *update {
            FieldUpdate::CurrentTime(t) => Command::Seek(t),
            FieldUpdate::Playing(true) => Command::Play,
            FieldUpdate::Playing(false) => Command::Pause,
            FieldUpdate::Rate(r) => Command::Speed(r),
            FieldUpdate::Volume(v) => Command::Volume(v),
            FieldUpdate::Muted(true) => Command::Mute,
            FieldUpdate::Muted(false) => Command::Unmute,
            FieldUpdate::Looping(l) => Command::Loop(l),
            FieldUpdate::Quality(index) => {
                let name = index.and_then(|i| {
                    self.controls
                        .borrow()
                        .qualities
                        .get(i)
                        .map(|q| q.name.clone())
                });
                match name {
                    Some(name) => Command::Quality(name),
                    None => {
                        warn!(adapter = %self.id, ?index, "No rendition at quality index, not sent");
                        return None;
                    }
                }
            }
        };
        Some(command)
    }

    fn finite(&self, field: &str, value: f64) -> bool {
        if !value.is_finite() {
            warn!(adapter = %self.id, field, value, "Ignored non-finite write");
        }
        value.is_finite()
    }

    /// Post now if the peer is live, otherwise queue
    ///
    /// The host is never called with the outbox locked, so it may feed
    /// replies back through `handle_message` synchronously.
    fn send(&self, command: Command) {
        if self.is_destroyed() {
            trace!(adapter = %self.id, command = command.name(), "Dropped command after destroy");
            return;
        }

        {
            let mut outbox = self.outbox();
            if !outbox.live {
                debug!(adapter = %self.id, command = command.name(), "Queued command until peer is live");
                outbox.enqueue(command);
                return;
            }
        }
        self.post(&command);
    }

    fn post(&self, command: &Command) {
        match self.host.post_to_frame(&command.to_message()) {
            Ok(()) => debug!(adapter = %self.id, command = command.name(), arg = ?command.argument(), "Command sent"),
            Err(err) => warn!(adapter = %self.id, command = command.name(), error = %err, "Failed to post command"),
        }
    }

    /// Flush queued commands once both readiness signals have fired
    fn refresh_readiness(&self) {
        if !(*self.frame_loaded.borrow() && *self.peer_ready.borrow()) {
            return;
        }

        let mut outbox = self.outbox();
        if outbox.live || outbox.flushing {
            return;
        }
        outbox.flushing = true;
        info!(adapter = %self.id, queued = outbox.queue.len(), "Peer is live");

        // commands queued while a batch is posted go out in the next one
        loop {
            let batch = std::mem::take(&mut outbox.queue);
            if batch.is_empty() {
                outbox.flushing = false;
                outbox.live = true;
                return;
            }
            drop(outbox);
            for command in &batch {
                self.post(command);
            }
            outbox = self.outbox();
        }
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let mut frame = self.frame_loaded.subscribe();
        let mut peer = self.peer_ready.subscribe();
        let mut destroyed = self.destroyed.subscribe();

        tokio::select! {
            ready = async { latched(&mut frame).await && latched(&mut peer).await } => {
                if ready { Ok(()) } else { Err(Error::Destroyed) }
            }
            _ = latched(&mut destroyed) => Err(Error::Destroyed),
        }
    }

    async fn request(&self, command: Command) -> Result<Value> {
        let name = command.name().to_string();

        let (id, answer) = {
            let mut pending = self.pending();
            if self.is_destroyed() {
                return Err(Error::Destroyed);
            }
            pending.register(&name)
        };
        self.send(command);

        let answer = match self.config.command_timeout() {
            Some(limit) => match tokio::time::timeout(limit, answer).await {
                Ok(answer) => answer,
                Err(_) => {
                    self.pending().remove(&name, id);
                    warn!(adapter = %self.id, command = %name, timeout = ?limit, "Command timed out");
                    return Err(Error::CommandTimeout {
                        command: name,
                        timeout: limit,
                    });
                }
            },
            None => answer.await,
        };

        answer.map_err(|_| Error::CommandCancelled { command: name })
    }

    fn frame_loaded(&self) {
        if self.is_destroyed() {
            return;
        }
        let first = self.frame_loaded.send_if_modified(latch);
        if first {
            info!(adapter = %self.id, "Frame document loaded");
            self.refresh_readiness();
        } else {
            debug!(adapter = %self.id, "Frame reloaded, readiness already latched");
        }
    }

    fn handle_message(self: &Arc<Self>, envelope: MessageEnvelope) {
        if self.is_destroyed() {
            return;
        }

        let frame_window = self.host.frame_window();
        if envelope.source.is_none() || envelope.source != frame_window {
            trace!(adapter = %self.id, source = ?envelope.source, "Dropped message from foreign window");
            return;
        }

        let Some(payload) = envelope.payload.filter(|p| !p.is_null()) else {
            trace!(adapter = %self.id, "Dropped empty message");
            return;
        };

        let message = match InboundMessage::from_value(payload) {
            Ok(message) => message,
            Err(err) => {
                trace!(adapter = %self.id, error = %err, "Dropped undecodable message");
                return;
            }
        };

        if let Some(answer) = &message.answer {
            let resolved = self.pending().resolve(&message.event, answer);
            if resolved > 0 {
                debug!(adapter = %self.id, command = %message.event, waiters = resolved, "Command answered");
            }
        }

        match PeerEvent::parse(&message.event, message.data.as_ref()) {
            Ok(event) => self.dispatch(event),
            Err(err) => debug!(adapter = %self.id, error = %err, "Dropped peer event"),
        }
    }

    fn dispatch(self: &Arc<Self>, event: PeerEvent) {
        trace!(adapter = %self.id, ?event, "Peer event");

        match event {
            PeerEvent::Inited => self.peer_inited(),
            PeerEvent::Time(t) => {
                self.write(FieldUpdate::CurrentTime(t), Origin::Remote);
            }
            PeerEvent::Duration(d) => {
                self.controls.send_if_modified(|c| replace(&mut c.duration, d));
            }
            PeerEvent::Speed(r) => {
                self.write(FieldUpdate::Rate(r), Origin::Remote);
            }
            PeerEvent::Quality(name) => {
                let index = self
                    .controls
                    .borrow()
                    .qualities
                    .iter()
                    .position(|q| q.name == name);
                self.write(FieldUpdate::Quality(index), Origin::Remote);
            }
            PeerEvent::AudioTrack => {
                trace!(adapter = %self.id, "Audio track switch not mirrored");
            }
            PeerEvent::End => {
                self.controls.send_if_modified(|c| replace(&mut c.ended, true));
            }
            PeerEvent::Loop(l) => {
                self.write(FieldUpdate::Looping(l), Origin::Remote);
            }
            PeerEvent::Play => {
                self.controls.send_if_modified(|c| {
                    let waiting = replace(&mut c.waiting, false);
                    let ended = replace(&mut c.ended, false);
                    waiting || ended
                });
                self.write(FieldUpdate::Playing(true), Origin::Remote);
            }
            PeerEvent::Paused => {
                self.write(FieldUpdate::Playing(false), Origin::Remote);
            }
            // The peer may send `waiting` after `play` while it keeps
            // playing, so waiting never pauses.
            PeerEvent::Waiting => {
                self.controls.send_if_modified(|c| replace(&mut c.waiting, true));
            }
            PeerEvent::Buffered => {
                self.controls.send_if_modified(|c| replace(&mut c.waiting, false));
            }
            PeerEvent::Mute => {
                self.write(FieldUpdate::Muted(true), Origin::Remote);
            }
            PeerEvent::Unmute => {
                self.write(FieldUpdate::Muted(false), Origin::Remote);
            }
            PeerEvent::Volume(v) => {
                self.write(FieldUpdate::Volume(v), Origin::Remote);
            }
            PeerEvent::Error(message) => {
                warn!(adapter = %self.id, message = %message, "Peer playback error");
                self.playback_error.trigger(&PlaybackError {
                    message,
                    at: Utc::now(),
                });
            }
            PeerEvent::Unknown(name) => {
                trace!(adapter = %self.id, event = %name, "Ignored unknown peer event");
            }
        }
    }

    fn peer_inited(self: &Arc<Self>) {
        if !self.peer_ready.send_if_modified(latch) {
            debug!(adapter = %self.id, "Peer initialized again");
            return;
        }

        info!(adapter = %self.id, "Peer initialized");

        if self.config.hide_peer_ui {
            self.send(Command::Ui(false));
            self.send(Command::ShowPlaylist(false));
        }
        self.refresh_readiness();

        let inner = Arc::clone(self);
        self.spawn(async move {
            match inner.request(Command::Qualities).await {
                Ok(answer) => inner.store_qualities(answer),
                Err(err) => debug!(adapter = %inner.id, error = %err, "Qualities request abandoned"),
            }
        });
    }

    fn store_qualities(&self, answer: Value) {
        let Value::Array(names) = answer else {
            warn!(adapter = %self.id, ?answer, "Qualities answer is not a list");
            return;
        };

        let qualities: Vec<Quality> = names
            .into_iter()
            .map(|name| Quality {
                name: match name {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
            })
            .collect();

        info!(adapter = %self.id, count = qualities.len(), "Qualities received");
        self.controls.send_modify(|c| c.qualities = qualities);
    }

    /// Poll buffered ranges once the position has been still for the debounce period
    async fn poll_buffered(self: Arc<Self>) {
        let debounce = self.config.buffered_poll_debounce();
        let mut controls = self.controls.subscribe();
        let mut last = controls.borrow_and_update().current_time;

        loop {
            // wait for a position change
            loop {
                if controls.changed().await.is_err() {
                    return;
                }
                let now = controls.borrow_and_update().current_time;
                if now != last {
                    last = now;
                    break;
                }
            }

            // then for the position to settle
            let quiet = tokio::time::sleep(debounce);
            tokio::pin!(quiet);
            loop {
                tokio::select! {
                    _ = &mut quiet => break,
                    changed = controls.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let now = controls.borrow_and_update().current_time;
                        if now != last {
                            last = now;
                            quiet.as_mut().reset(Instant::now() + debounce);
                        }
                    }
                }
            }

            let inner = Arc::clone(&self);
            self.spawn(async move { inner.refresh_buffered().await });
        }
    }

    async fn refresh_buffered(self: Arc<Self>) {
        match self.request(Command::Buffered).await {
            Ok(answer) => match protocol::number(&answer) {
                Some(end) => {
                    debug!(adapter = %self.id, end, "Buffered range updated");
                    self.controls
                        .send_modify(|c| c.buffered = vec![TimeRange::new(0.0, end)]);
                }
                None => debug!(adapter = %self.id, ?answer, "Ignored non-numeric buffered answer"),
            },
            Err(err) => debug!(adapter = %self.id, error = %err, "Buffered poll abandoned"),
        }
    }

    #[instrument(skip(self), fields(adapter = %self.id))]
    fn destroy(&self) {
        if self.destroyed.send_replace(true) {
            return;
        }

        let cancelled = self.pending().cancel_all();
        for task in self.tasks().drain(..) {
            task.abort();
        }
        self.outbox().queue.clear();

        if let Err(err) = self.host.unmount_frame() {
            warn!(error = %err, "Failed to restore media element");
        }

        info!(cancelled, "Adapter destroyed");
    }
}

/// Set a one-shot flag, reporting whether this call set it
fn latch(flag: &mut bool) -> bool {
    !std::mem::replace(flag, true)
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Resolve once the flag is set; false if its sender is gone
async fn latched(rx: &mut watch::Receiver<bool>) -> bool {
    rx.wait_for(|set| *set).await.is_ok()
}
