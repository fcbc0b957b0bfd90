//! The player task and its handle.
//!
//! All state lives in a single Tokio task. Caller actions and engine
//! feedback both arrive as messages, so transitions never interleave.
//! Every applied message publishes a fresh [`AssetPlayerProperties`]
//! snapshot through a watch channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use reelkit_common::config::PlaybackDefaults;
use reelkit_common::error::{ReelkitError, ReelkitResult};
use reelkit_media::{Asset, MediaEngine, PlaybackCallback, PlaybackEvent, PlaybackSession};

use crate::action::{PlayerAction, SetupOptions};
use crate::properties::{AssetPlayerProperties, SessionFields};
use crate::state::PlaybackState;

/// Positions within this distance of the loop end count as reaching it.
const END_TOLERANCE_SECS: f64 = 1e-6;

enum Command {
    Perform(PlayerAction, Option<oneshot::Sender<()>>),
}

/// Engine events tagged with the session generation that produced them.
type TaggedEvent = (u64, PlaybackEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanDirection {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy)]
struct Scan {
    direction: ScanDirection,
    restore_rate: f32,
}

/// Handle to a player task.
///
/// Dropping the handle closes the command channel; the task then releases
/// its playback session and exits.
pub struct AssetPlayer {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<AssetPlayerProperties>,
    task: JoinHandle<()>,
}

impl AssetPlayer {
    /// Spawn a player on the current Tokio runtime.
    pub fn spawn(engine: Arc<dyn MediaEngine>, defaults: PlaybackDefaults) -> ReelkitResult<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| ReelkitError::playback("AssetPlayer needs a Tokio runtime"))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let fields = SessionFields::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(fields.properties());

        let core = PlayerCore {
            engine,
            defaults,
            fields,
            session: None,
            generation: 0,
            scan: None,
            events: event_tx,
        };
        let task = handle.spawn(run(core, command_rx, event_rx, snapshot_tx));

        Ok(Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            task,
        })
    }

    /// Apply `action` and wait until its state change is visible.
    ///
    /// Returns the snapshot published right after the action.
    pub async fn perform(&self, action: PlayerAction) -> AssetPlayerProperties {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Perform(action, Some(ack_tx))).is_err() {
            tracing::warn!("Player task is gone; action dropped");
            return self.properties();
        }
        if ack_rx.await.is_err() {
            tracing::warn!("Player task exited before acknowledging action");
        }
        self.properties()
    }

    /// Queue `action` without waiting for it.
    pub fn dispatch(&self, action: PlayerAction) {
        if self.commands.send(Command::Perform(action, None)).is_err() {
            tracing::warn!("Player task is gone; action dropped");
        }
    }

    /// Latest published snapshot.
    pub fn properties(&self) -> AssetPlayerProperties {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AssetPlayerProperties> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `pred`, or fail after `timeout`.
    pub async fn wait_until(
        &self,
        mut pred: impl FnMut(&AssetPlayerProperties) -> bool,
        timeout: Duration,
    ) -> ReelkitResult<AssetPlayerProperties> {
        let mut rx = self.snapshots.clone();
        let outcome = tokio::time::timeout(timeout, rx.wait_for(|p| pred(p))).await;
        match outcome {
            Ok(Ok(props)) => Ok(props.clone()),
            Ok(Err(_)) => Err(ReelkitError::playback("player task stopped")),
            Err(_) => Err(ReelkitError::playback(format!(
                "timed out after {timeout:?}; last state {}",
                self.properties().state
            ))),
        }
    }

    /// Wait until the coarse state satisfies `pred`.
    pub async fn wait_for_state(
        &self,
        mut pred: impl FnMut(&PlaybackState) -> bool,
        timeout: Duration,
    ) -> ReelkitResult<AssetPlayerProperties> {
        self.wait_until(|p| pred(&p.state), timeout).await
    }

    /// Close the player and wait for its session to be released.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Player task ended abnormally");
        }
    }
}

async fn run(
    mut core: PlayerCore,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<TaggedEvent>,
    snapshots: watch::Sender<AssetPlayerProperties>,
) {
    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::Perform(action, ack)) => {
                    core.apply(action).await;
                    snapshots.send_replace(core.fields.properties());
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                None => break,
            },
            Some((generation, event)) = events.recv() => {
                if core.handle_event(generation, event) {
                    snapshots.send_replace(core.fields.properties());
                }
            }
        }
    }

    core.teardown();
    tracing::debug!("Player task exited");
}

struct PlayerCore {
    engine: Arc<dyn MediaEngine>,
    defaults: PlaybackDefaults,
    fields: SessionFields,
    session: Option<Box<dyn PlaybackSession>>,
    generation: u64,
    scan: Option<Scan>,
    events: mpsc::UnboundedSender<TaggedEvent>,
}

impl PlayerCore {
    async fn apply(&mut self, action: PlayerAction) {
        if self.fields.state.is_failed() && !matches!(action, PlayerAction::Setup { .. }) {
            tracing::debug!(action = action.name(), "Ignoring action in failed state");
            return;
        }
        tracing::debug!(action = action.name(), state = %self.fields.state, "Applying action");

        let result = match action {
            PlayerAction::Setup { asset, options } => {
                self.setup(asset, options).await;
                Ok(())
            }
            PlayerAction::Play => self.play(),
            PlayerAction::Pause => self.pause(),
            PlayerAction::Stop => self.stop(),
            PlayerAction::ChangeIsMuted(muted) => self.change_is_muted(muted),
            PlayerAction::ChangeVolume(volume) => self.change_volume(volume),
            PlayerAction::ChangePlaybackRate(rate) => self.change_rate(rate),
            PlayerAction::SeekToTimeInSeconds(secs) => self.seek(secs),
            PlayerAction::Skip(by) => self.seek(self.fields.current_time + by),
            PlayerAction::BeginFastForward => {
                self.begin_scan(ScanDirection::Forward, self.defaults.fast_forward_rate)
            }
            PlayerAction::EndFastForward => self.end_scan(ScanDirection::Forward),
            PlayerAction::BeginRewind => {
                self.begin_scan(ScanDirection::Backward, self.defaults.rewind_rate)
            }
            PlayerAction::EndRewind => self.end_scan(ScanDirection::Backward),
            PlayerAction::ChangeShouldLoop(should_loop) => {
                self.fields.should_loop = should_loop;
                Ok(())
            }
            PlayerAction::ChangeLoopRange { start, end } => {
                self.change_loop_range(start, end);
                Ok(())
            }
        };

        if let Err(e) = result {
            self.fail(e);
        }
    }

    fn session(&mut self) -> ReelkitResult<&mut (dyn PlaybackSession + 'static)> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| ReelkitError::playback("no active playback session"))
    }

    async fn setup(&mut self, asset: Asset, options: SetupOptions) {
        self.teardown();
        self.fields = self.fields.for_asset(asset.clone(), options);

        if !asset.is_playable() {
            self.fail(ReelkitError::asset_open(asset.locator(), "asset is not playable"));
            return;
        }

        let generation = self.generation;
        let events = self.events.clone();
        let callback: PlaybackCallback = Box::new(move |event| {
            let _ = events.send((generation, event));
        });

        let engine = self.engine.clone();
        let opened = asset.clone();
        let started = tokio::task::spawn_blocking(move || engine.start_playback(&opened, callback))
            .await
            .map_err(|e| ReelkitError::playback(format!("playback setup task failed: {e}")))
            .and_then(|result| result);

        let mut session = match started {
            Ok(session) => session,
            Err(e) => {
                self.fail(e);
                return;
            }
        };
        if options.start_muted {
            if let Err(e) = session.set_muted(true) {
                self.session = Some(session);
                self.fail(e);
                return;
            }
        }
        if let Err(e) = session.set_volume(self.fields.volume) {
            self.session = Some(session);
            self.fail(e);
            return;
        }

        self.session = Some(session);
        tracing::info!(
            locator = %asset.locator(),
            duration_secs = asset.duration(),
            generation,
            "Player set up"
        );
    }

    fn play(&mut self) -> ReelkitResult<()> {
        let from_finished = match self.fields.state {
            PlaybackState::Setup(_) | PlaybackState::Paused => false,
            PlaybackState::Finished => true,
            _ => {
                tracing::debug!(state = %self.fields.state, "Play ignored");
                return Ok(());
            }
        };

        // A seek made after finishing is kept; otherwise replay from the loop start.
        let restart = from_finished
            && self.fields.current_time >= self.fields.loop_end_secs() - END_TOLERANCE_SECS;
        let rate = self.fields.rate;
        let loop_start = self.fields.loop_start;
        let session = self.session()?;
        if restart {
            session.seek(loop_start)?;
        }
        session.play(rate)?;

        if restart {
            self.fields.current_time = loop_start;
        }
        self.fields.state = PlaybackState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> ReelkitResult<()> {
        if !matches!(
            self.fields.state,
            PlaybackState::Playing | PlaybackState::Setup(_)
        ) {
            tracing::debug!(state = %self.fields.state, "Pause ignored");
            return Ok(());
        }
        self.session()?.pause()?;
        self.fields.state = PlaybackState::Paused;
        Ok(())
    }

    fn stop(&mut self) -> ReelkitResult<()> {
        if !matches!(
            self.fields.state,
            PlaybackState::Playing | PlaybackState::Paused
        ) {
            tracing::debug!(state = %self.fields.state, "Stop ignored");
            return Ok(());
        }
        let Some(asset) = self.fields.asset.clone() else {
            return Ok(());
        };

        let loop_start = self.fields.loop_start;
        let session = self.session()?;
        session.pause()?;
        session.seek(loop_start)?;

        self.fields.current_time = loop_start;
        self.fields.state = PlaybackState::Setup(asset);
        Ok(())
    }

    fn change_is_muted(&mut self, muted: bool) -> ReelkitResult<()> {
        if let Some(session) = self.session.as_deref_mut() {
            session.set_muted(muted)?;
        }
        self.fields.is_muted = muted;
        Ok(())
    }

    fn change_volume(&mut self, volume: f32) -> ReelkitResult<()> {
        if !volume.is_finite() {
            tracing::warn!(volume, "Ignoring non-finite volume");
            return Ok(());
        }
        let volume = volume.clamp(0.0, 1.0);
        if let Some(session) = self.session.as_deref_mut() {
            session.set_volume(volume)?;
        }
        self.fields.volume = volume;
        Ok(())
    }

    fn change_rate(&mut self, rate: f32) -> ReelkitResult<()> {
        if rate == 0.0 || !rate.is_finite() {
            tracing::warn!(rate, "Ignoring invalid playback rate");
            return Ok(());
        }
        if let Some(session) = self.session.as_deref_mut() {
            session.set_rate(rate)?;
        }
        self.fields.rate = rate;
        Ok(())
    }

    fn seek(&mut self, secs: f64) -> ReelkitResult<()> {
        if self.fields.asset.is_none() || !secs.is_finite() {
            tracing::debug!(secs, "Seek ignored");
            return Ok(());
        }
        let target = secs.clamp(0.0, self.fields.duration());
        self.session()?.seek(target)?;
        self.fields.current_time = target;
        Ok(())
    }

    fn begin_scan(&mut self, direction: ScanDirection, rate: f32) -> ReelkitResult<()> {
        let restore_rate = match self.scan {
            Some(scan) => scan.restore_rate,
            None => self.fields.rate,
        };
        self.change_rate(rate)?;
        self.scan = Some(Scan {
            direction,
            restore_rate,
        });
        Ok(())
    }

    fn end_scan(&mut self, direction: ScanDirection) -> ReelkitResult<()> {
        match self.scan {
            Some(scan) if scan.direction == direction => {
                self.scan = None;
                self.change_rate(scan.restore_rate)
            }
            _ => {
                tracing::debug!(?direction, "No matching scan to end");
                Ok(())
            }
        }
    }

    fn change_loop_range(&mut self, start: f64, end: Option<f64>) {
        let duration = self.fields.duration();
        let effective_end = end.unwrap_or(duration);
        let valid = self.fields.asset.is_some()
            && start.is_finite()
            && effective_end.is_finite()
            && start >= 0.0
            && start < effective_end
            && effective_end <= duration;
        if !valid {
            tracing::warn!(start, ?end, duration, "Ignoring invalid loop range");
            return;
        }
        self.fields.loop_start = start;
        self.fields.loop_end = end;
    }

    /// Returns whether the event was applied.
    fn handle_event(&mut self, generation: u64, event: PlaybackEvent) -> bool {
        if generation != self.generation {
            tracing::trace!(generation, current = self.generation, "Dropping stale engine event");
            return false;
        }
        if self.fields.state.is_failed() {
            return false;
        }

        let result = match event {
            PlaybackEvent::Position {
                current_secs,
                buffered_secs,
            } => {
                self.fields.current_time = current_secs;
                self.fields.buffered_time = buffered_secs;
                self.check_boundaries()
            }
            PlaybackEvent::Ended => {
                if self.fields.state != PlaybackState::Playing {
                    Ok(())
                } else if self.fields.rate < 0.0 {
                    self.rewind_reached_start()
                } else {
                    self.reach_end()
                }
            }
            PlaybackEvent::Failed { message } => Err(ReelkitError::playback(message)),
        };

        if let Err(e) = result {
            self.fail(e);
        }
        true
    }

    fn check_boundaries(&mut self) -> ReelkitResult<()> {
        if self.fields.state != PlaybackState::Playing {
            return Ok(());
        }
        if self.fields.rate > 0.0
            && self.fields.current_time >= self.fields.loop_end_secs() - END_TOLERANCE_SECS
        {
            return self.reach_end();
        }
        if self.fields.rate < 0.0 && self.fields.current_time <= self.fields.loop_start {
            return self.rewind_reached_start();
        }
        Ok(())
    }

    fn reach_end(&mut self) -> ReelkitResult<()> {
        let loop_start = self.fields.loop_start;
        let end = self.fields.loop_end_secs();
        let rate = self.fields.rate;
        let should_loop = self.fields.should_loop;

        let session = self.session()?;
        if should_loop {
            session.seek(loop_start)?;
            session.play(rate)?;
            self.fields.current_time = loop_start;
            tracing::debug!(loop_start, "Looping back");
        } else {
            session.pause()?;
            self.fields.current_time = end;
            self.fields.state = PlaybackState::Finished;
            tracing::info!(end, "Playback finished");
        }
        Ok(())
    }

    fn rewind_reached_start(&mut self) -> ReelkitResult<()> {
        let loop_start = self.fields.loop_start;
        let restore_rate = self.scan.take().map(|s| s.restore_rate).unwrap_or(1.0);

        let session = self.session()?;
        session.pause()?;
        session.seek(loop_start)?;
        session.set_rate(restore_rate)?;

        self.fields.current_time = loop_start;
        self.fields.rate = restore_rate;
        self.fields.state = PlaybackState::Paused;
        tracing::debug!(loop_start, "Rewind reached loop start");
        Ok(())
    }

    fn fail(&mut self, error: ReelkitError) {
        tracing::warn!(error = %error, state = %self.fields.state, "Player failed");
        self.teardown();
        self.fields.state = PlaybackState::Failed(Some(error.shared()));
    }

    /// Release the current session; events it already queued become stale.
    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.stop() {
                tracing::warn!(error = %e, "Failed to stop playback session");
            }
        }
        self.generation += 1;
        self.scan = None;
    }
}
