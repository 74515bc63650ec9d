//! Session Controller: owns the boards and the session lifecycle.
//!
//! [`SessionController`] is a cheap, cloneable handle. Two sources feed it
//! snapshots: a background poll task that refreshes every
//! [`SessionConfig::poll_interval`] while the session is `Active`, and the
//! [`CommandDispatcher`](crate::CommandDispatcher), which refreshes after each
//! command. Both funnel into the same reconciliation path, which runs under
//! one lock and checks the session state at the moment of mutation.
//!
//! Events are emitted on a bounded channel
//! ([`tokio::sync::mpsc::Receiver<SessionEvent>`]) returned from
//! [`SessionController::new`].
//!
//! # Example
//!
//! ```rust,ignore
//! let service = HttpGameService::new(HttpConfig::new("127.0.0.1:8080"))?;
//! let (controller, mut events) = SessionController::new(service, SessionConfig::new());
//! controller.initialize().await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::BoardsUpdated { own, enemy } => { /* draw */ }
//!         SessionEvent::GameOver { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::board::{Board, BoardOwner, Coordinate, DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_SIDE};
use crate::effects::{apply_effects, derive_effects, ShotResult};
use crate::error::{Result, SalvoError};
use crate::event::SessionEvent;
use crate::protocol::Winner;
use crate::service::GameService;
use crate::session::{Session, SessionId, SessionState, Transition};
use crate::snapshot::{RawSnapshot, Snapshot};

/// Default period of the background refresh.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default pause between a command reply and the follow-up refresh.
const DEFAULT_POST_COMMAND_DELAY: Duration = Duration::from_millis(300);

/// Default pause before announcing the end of the game.
const DEFAULT_GAME_OVER_DELAY: Duration = Duration::from_millis(1000);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shortest accepted poll period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`SessionController`].
///
/// # Example
///
/// ```
/// use salvo_client::controller::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new()
///     .with_poll_interval(Duration::from_millis(500))
///     .with_board_size(8, 8);
/// assert_eq!(config.width, 8);
/// assert_eq!(config.game_over_delay, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period of the background refresh while `Active`.
    ///
    /// Defaults to **1 second**. Values below 1 ms are clamped to 1 ms.
    pub poll_interval: Duration,
    /// Pause between a command reply and the refresh that follows it, giving
    /// the service time to settle the state the command changed.
    ///
    /// Defaults to **300 ms**.
    pub post_command_delay: Duration,
    /// Pause between detecting game over and emitting
    /// [`SessionEvent::GameOver`], so the final shot is drawn first.
    ///
    /// Defaults to **1 second**.
    pub game_over_delay: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped with a warning.
    /// `GameOver` is always delivered. Defaults to **256**; values below 1
    /// are clamped to 1.
    pub event_channel_capacity: usize,
    /// Board width, fixed for the session. Defaults to **10**.
    pub width: usize,
    /// Board height, fixed for the session. Defaults to **10**.
    pub height: usize,
}

impl SessionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            post_command_delay: DEFAULT_POST_COMMAND_DELAY,
            game_over_delay: DEFAULT_GAME_OVER_DELAY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    /// Set the background refresh period. Values below 1 ms are clamped.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Set the pause before the post-command refresh.
    #[must_use]
    pub fn with_post_command_delay(mut self, delay: Duration) -> Self {
        self.post_command_delay = delay;
        self
    }

    /// Set the pause before the game-over event.
    #[must_use]
    pub fn with_game_over_delay(mut self, delay: Duration) -> Self {
        self.game_over_delay = delay;
        self
    }

    /// Set the event channel capacity. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the board dimensions, each clamped to `1..=`[`MAX_SIDE`].
    #[must_use]
    pub fn with_board_size(mut self, width: usize, height: usize) -> Self {
        self.width = width.clamp(1, MAX_SIDE);
        self.height = height.clamp(1, MAX_SIDE);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// What a reconciliation did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The boards were replaced.
    Applied,
    /// The boards were replaced and this call ended the session.
    GameOver(Option<Winner>),
    /// The session was not `Active`; nothing changed.
    Ignored(SessionState),
    /// A newer snapshot had already been applied; nothing changed.
    Stale,
}

// ── Shared state ────────────────────────────────────────────────────

/// Everything guarded by the model lock.
struct Model {
    session: Session,
    own: Board,
    enemy: Board,
    /// Locally derived shot results, re-applied after every projection.
    pending: Vec<ShotResult>,
    /// Ticket of the last applied snapshot.
    last_applied: u64,
    poller: Option<Poller>,
}

impl Model {
    /// Stop the background refresh. In-flight requests run to completion.
    fn cancel_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            let _ = poller.shutdown_tx.send(());
        }
    }
}

/// Handle to the background poll task.
struct Poller {
    shutdown_tx: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

struct Shared {
    service: Arc<dyn GameService>,
    config: SessionConfig,
    model: Mutex<Model>,
    next_ticket: AtomicU64,
    event_tx: mpsc::Sender<SessionEvent>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // No executor context here; abort rather than signal.
        if let Some(poller) = self.model.get_mut().poller.take() {
            poller.task.abort();
        }
    }
}

// ── Controller handle ───────────────────────────────────────────────

/// Cloneable handle to a session's boards and lifecycle.
///
/// The boards and session can only be changed through [`start`](Self::start),
/// [`stop`](Self::stop), [`reconcile`](Self::reconcile) and
/// [`apply_shot`](Self::apply_shot); readers get copies.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    /// Create an `Idle` controller and its event receiver.
    ///
    /// No request is made until [`initialize`](Self::initialize),
    /// [`start`](Self::start) or [`refresh`](Self::refresh) is called.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn new(
        service: impl GameService,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        Self::with_shared_service(Arc::new(service), config)
    }

    /// Like [`new`](Self::new), for a service that is shared elsewhere.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn with_shared_service(
        service: Arc<dyn GameService>,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        // Fields are public; re-apply the builder clamps.
        let (width, height) = (config.width, config.height);
        let config = config.with_board_size(width, height);
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let model = Model {
            session: Session::new(),
            own: Board::new(BoardOwner::Own, config.width, config.height),
            enemy: Board::new(BoardOwner::Enemy, config.width, config.height),
            pending: Vec::new(),
            last_applied: 0,
            poller: None,
        };
        let shared = Shared {
            service,
            config,
            model: Mutex::new(model),
            next_ticket: AtomicU64::new(0),
            event_tx,
        };
        (
            Self {
                shared: Arc::new(shared),
            },
            event_rx,
        )
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// `Idle → Active`: start the periodic refresh.
    ///
    /// Starting an already active session is a no-op. Starting from `Idle`
    /// discards locally derived effects from the previous game.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::SessionOver`] once the session has ended.
    pub async fn start(&self) -> Result<()> {
        let mut model = self.shared.model.lock().await;
        if model.session.start()? == Transition::Unchanged {
            return Ok(());
        }
        model.pending.clear();
        model.cancel_poller();
        model.poller = Some(self.spawn_poller());
        let session_id = model.session.id();
        info!(session = %session_id, "session started");
        self.emit(SessionEvent::Started { session_id });
        Ok(())
    }

    /// `Active → Idle`: stop the periodic refresh. The boards are kept.
    ///
    /// Requests already in flight complete, but their snapshots are ignored
    /// until the session is started again.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::SessionOver`] once the session has ended.
    pub async fn stop(&self) -> Result<()> {
        let mut model = self.shared.model.lock().await;
        if model.session.stop()? == Transition::Unchanged {
            return Ok(());
        }
        model.cancel_poller();
        let session_id = model.session.id();
        info!(session = %session_id, "session stopped");
        self.emit(SessionEvent::Stopped { session_id });
        Ok(())
    }

    /// Fetch the first snapshot and, if that succeeds, start the session
    /// and apply it.
    ///
    /// # Errors
    ///
    /// Returns the fetch or decode error (the session stays `Idle`), or
    /// [`SalvoError::SessionOver`] if the session has already ended.
    pub async fn initialize(&self) -> Result<ReconcileOutcome> {
        let ticket = self.take_ticket();
        let raw = self.reported(self.shared.service.fetch_state().await, "initial fetch")?;
        // Validate before starting so a bad first snapshot leaves us Idle.
        let snapshot = self.reported(self.validate(raw), "initial state")?;
        self.reported(self.start().await, "start")?;
        self.reported(self.apply_snapshot(snapshot, ticket).await, "initial state")
    }

    // ── Reconciliation ──────────────────────────────────────────────

    /// Fetch a snapshot from the service and reconcile it.
    ///
    /// Failures are reported on the event log and returned; session state
    /// and boards are left as they were.
    ///
    /// # Errors
    ///
    /// Returns any transport or [`SalvoError::MalformedSnapshot`] error.
    pub async fn refresh(&self) -> Result<ReconcileOutcome> {
        let ticket = self.take_ticket();
        let raw = self.reported(self.shared.service.fetch_state().await, "refresh")?;
        self.reported(self.reconcile_ticket(raw, ticket).await, "refresh")
    }

    /// Merge a snapshot into the local boards.
    ///
    /// The snapshot is projected, locally derived effects are re-applied on
    /// top of it, and if it reports game over while the session is `Active`
    /// the session ends. Only the call that performs that transition
    /// returns [`ReconcileOutcome::GameOver`].
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::MalformedSnapshot`] if the snapshot cannot be
    /// decoded or its boards do not match the configured size. The previous
    /// boards are kept.
    pub async fn reconcile(&self, raw: RawSnapshot) -> Result<ReconcileOutcome> {
        let ticket = self.take_ticket();
        self.reported(self.reconcile_ticket(raw, ticket).await, "reconcile")
    }

    async fn reconcile_ticket(&self, raw: RawSnapshot, ticket: u64) -> Result<ReconcileOutcome> {
        let snapshot = self.validate(raw)?;
        self.apply_snapshot(snapshot, ticket).await
    }

    /// Decode `raw` and check it against the configured board size.
    fn validate(&self, raw: RawSnapshot) -> Result<Snapshot> {
        let snapshot = raw.decode()?;
        self.check_shape(&snapshot)?;
        Ok(snapshot)
    }

    async fn apply_snapshot(&self, snapshot: Snapshot, ticket: u64) -> Result<ReconcileOutcome> {
        let mut model = self.shared.model.lock().await;
        let state = model.session.state();
        if !state.is_active() {
            debug!(session = %model.session.id(), %state, "ignoring snapshot");
            return Ok(ReconcileOutcome::Ignored(state));
        }
        if ticket < model.last_applied {
            debug!(ticket, last_applied = model.last_applied, "discarding stale snapshot");
            return Ok(ReconcileOutcome::Stale);
        }

        let Snapshot {
            own,
            mut enemy,
            game_over,
            winner,
        } = snapshot;
        for shot in &model.pending {
            apply_effects(&mut enemy, shot, false)?;
        }
        model.last_applied = ticket;
        model.own = own;
        model.enemy = enemy;
        self.emit(SessionEvent::BoardsUpdated {
            own: model.own.clone(),
            enemy: model.enemy.clone(),
        });

        if !(game_over && model.session.finish(winner)) {
            return Ok(ReconcileOutcome::Applied);
        }
        model.cancel_poller();
        info!(session = %model.session.id(), ?winner, "game over");
        drop(model);

        tokio::time::sleep(self.shared.config.game_over_delay).await;
        self.emit_game_over(winner).await;
        Ok(ReconcileOutcome::GameOver(winner))
    }

    fn check_shape(&self, snapshot: &Snapshot) -> Result<()> {
        let (width, height) = (self.shared.config.width, self.shared.config.height);
        for board in [&snapshot.own, &snapshot.enemy] {
            if board.width() != width || board.height() != height {
                return Err(SalvoError::MalformedSnapshot(format!(
                    "{:?} board is {}x{}, expected {width}x{height}",
                    board.owner(),
                    board.width(),
                    board.height()
                )));
            }
        }
        Ok(())
    }

    /// Fold a shot outcome into the enemy board and keep it for re-application
    /// after later snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::NotActive`] or [`SalvoError::SessionOver`] if the
    /// session is not `Active`, or [`SalvoError::OutOfBounds`].
    pub async fn apply_shot(&self, shot: ShotResult) -> Result<()> {
        let mut model = self.shared.model.lock().await;
        require_active(model.session.state())?;
        model.enemy = derive_effects(&model.enemy, &shot)?;
        if !model.pending.contains(&shot) {
            model.pending.push(shot);
        }
        debug!(coordinate = %shot.coordinate, outcome = %shot.outcome, "shot applied");
        self.emit(SessionEvent::ShotApplied(shot));
        self.emit(SessionEvent::BoardsUpdated {
            own: model.own.clone(),
            enemy: model.enemy.clone(),
        });
        Ok(())
    }

    pub(crate) fn service(&self) -> &Arc<dyn GameService> {
        &self.shared.service
    }

    /// Check that a shot at `coord` may be fired now.
    pub(crate) async fn check_shot(&self, coord: Coordinate) -> Result<()> {
        let model = self.shared.model.lock().await;
        require_active(model.session.state())?;
        model.enemy.check(coord)
    }

    // ── State accessors ─────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub async fn state(&self) -> SessionState {
        self.shared.model.lock().await.session.state()
    }

    pub async fn session_id(&self) -> SessionId {
        self.shared.model.lock().await.session.id()
    }

    /// The recorded winner, once the session is over.
    pub async fn winner(&self) -> Option<Winner> {
        self.shared.model.lock().await.session.winner()
    }

    /// Copies of the `(own, enemy)` boards.
    pub async fn boards(&self) -> (Board, Board) {
        let model = self.shared.model.lock().await;
        (model.own.clone(), model.enemy.clone())
    }

    /// Returns `true` while the background refresh is scheduled.
    pub async fn is_polling(&self) -> bool {
        self.shared.model.lock().await.poller.is_some()
    }

    // ── Reporting ───────────────────────────────────────────────────

    /// Append a line to the user-visible log.
    pub fn log(&self, line: impl Into<String>) {
        self.emit(SessionEvent::Log(line.into()));
    }

    /// Trace and log `result` if it failed, then pass it through.
    pub(crate) fn reported<T>(&self, result: Result<T>, context: &str) -> Result<T> {
        if let Err(e) = &result {
            warn!("{context} failed: {e}");
            self.log(format!("Error: {e}"));
        }
        result
    }

    /// Emit an event. If the channel is full, log a warning and drop the
    /// event rather than block the caller.
    fn emit(&self, event: SessionEvent) {
        match self.shared.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    "event channel full, dropping event: {:?}",
                    std::mem::discriminant(&dropped)
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    /// Emit [`SessionEvent::GameOver`] and its console line.
    ///
    /// Uses `send().await` because the game-over event must never be dropped.
    async fn emit_game_over(&self, winner: Option<Winner>) {
        if self
            .shared
            .event_tx
            .send(SessionEvent::GameOver { winner })
            .await
            .is_err()
        {
            debug!("event channel closed, receiver dropped");
        }
        self.log(match winner {
            Some(Winner::Player) => "Game Over - You Won!",
            Some(Winner::Enemy) => "Game Over - You Lost!",
            None => "Game Over",
        });
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Tickets are taken before a request is issued, so their order is the
    /// order the requests were made in.
    fn take_ticket(&self) -> u64 {
        self.shared.next_ticket.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn spawn_poller(&self) -> Poller {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(poll_loop(
            Arc::downgrade(&self.shared),
            shutdown_rx,
            self.shared.config.poll_interval,
        ));
        Poller { shutdown_tx, task }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

fn require_active(state: SessionState) -> Result<()> {
    match state {
        SessionState::Active => Ok(()),
        SessionState::Idle => Err(SalvoError::NotActive),
        SessionState::Over { .. } => Err(SalvoError::SessionOver),
    }
}

// ── Poll loop ───────────────────────────────────────────────────────

/// Background refresh, one tick per `period`, first tick one period after
/// start.
///
/// Exits when:
/// - the shutdown signal fires or its sender is dropped (stop, game over)
/// - every controller handle has been dropped
///
/// A failed tick is reported by `refresh` and never ends the loop.
async fn poll_loop(shared: Weak<Shared>, mut shutdown_rx: oneshot::Receiver<()>, period: Duration) {
    debug!(?period, "poll loop started");
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("poll loop shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                let Some(shared) = shared.upgrade() else {
                    debug!("controller dropped, ending poll loop");
                    break;
                };
                let controller = SessionController { shared };
                // Errors were already reported on the event log.
                let _ = controller.refresh().await;
            }
        }
    }

    debug!("poll loop exited");
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::board::CellState;
    use crate::effects::ShotOutcome;
    use crate::protocol::{CellCode, CommandRequest, CommandResponse, GameStateResponse};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    // ── Mock service ────────────────────────────────────────────────

    /// Serves whatever snapshot is currently stored; counts fetches.
    struct FixedService {
        state: Arc<StdMutex<Result<GameStateResponse>>>,
        fetches: Arc<AtomicU64>,
    }

    impl FixedService {
        fn new(
            state: GameStateResponse,
        ) -> (Self, Arc<StdMutex<Result<GameStateResponse>>>, Arc<AtomicU64>) {
            let shared = Arc::new(StdMutex::new(Ok(state)));
            let fetches = Arc::new(AtomicU64::new(0));
            (
                Self {
                    state: Arc::clone(&shared),
                    fetches: Arc::clone(&fetches),
                },
                shared,
                fetches,
            )
        }
    }

    #[async_trait]
    impl GameService for FixedService {
        async fn fetch_state(&self) -> Result<RawSnapshot> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            match &*self.state.lock().unwrap() {
                Ok(state) => Ok(RawSnapshot::Structured(state.clone())),
                Err(_) => Err(SalvoError::Transport("connection refused".into())),
            }
        }

        async fn send_command(&self, _request: CommandRequest) -> Result<CommandResponse> {
            Ok(CommandResponse::default())
        }
    }

    fn empty_grid() -> Vec<Vec<CellCode>> {
        vec![vec![CellCode::Numeric(0); 10]; 10]
    }

    fn state(game_over: bool, winner: Option<Winner>) -> GameStateResponse {
        GameStateResponse {
            my_board: empty_grid(),
            enemy_board: empty_grid(),
            game_over,
            winner,
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig::new()
            .with_poll_interval(Duration::from_millis(1000))
            .with_post_command_delay(Duration::ZERO)
            .with_game_over_delay(Duration::ZERO)
    }

    // ── Config ──────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.post_command_delay, Duration::from_millis(300));
        assert_eq!(config.game_over_delay, Duration::from_secs(1));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!((config.width, config.height), (10, 10));
    }

    #[test]
    fn config_builders_clamp() {
        let config = SessionConfig::new()
            .with_poll_interval(Duration::ZERO)
            .with_event_channel_capacity(0)
            .with_board_size(0, 4);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!((config.width, config.height), (1, 4));

        let config = SessionConfig::new().with_board_size(usize::MAX, 2);
        assert_eq!((config.width, config.height), (MAX_SIDE, 2));
    }

    #[tokio::test]
    async fn oversized_board_fields_are_clamped() {
        let (service, _state, _fetches) = FixedService::new(state(false, None));
        let mut config = fast_config();
        config.width = usize::MAX;
        config.height = usize::MAX;
        let (controller, _events) = SessionController::new(service, config);
        let (own, enemy) = controller.boards().await;
        assert_eq!((own.width(), own.height()), (MAX_SIDE, MAX_SIDE));
        assert!(own.same_shape(&enemy));
        assert_eq!(controller.config().width, MAX_SIDE);
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    #[tokio::test]
    async fn controller_starts_idle_without_polling() {
        let (service, _state, fetches) = FixedService::new(state(false, None));
        let (controller, _events) = SessionController::new(service, fast_config());
        assert_eq!(controller.state().await, SessionState::Idle);
        assert!(!controller.is_polling().await);
        assert_eq!(fetches.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn start_and_stop_toggle_polling() {
        let (service, _state, _fetches) = FixedService::new(state(false, None));
        let (controller, mut events) = SessionController::new(service, fast_config());

        controller.start().await.unwrap();
        assert!(controller.is_polling().await);
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Started { .. }
        ));

        controller.stop().await.unwrap();
        assert!(!controller.is_polling().await);
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Stopped { .. }
        ));
        assert_eq!(controller.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn snapshots_are_ignored_while_idle() {
        let (service, _state, _fetches) = FixedService::new(state(false, None));
        let (controller, _events) = SessionController::new(service, fast_config());
        let outcome = controller
            .reconcile(RawSnapshot::Structured(state(true, Some(Winner::Player))))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ignored(SessionState::Idle));
        assert_eq!(controller.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn concurrent_game_over_fires_once() {
        let (service, _state, _fetches) = FixedService::new(state(false, None));
        let (controller, mut events) = SessionController::new(service, fast_config());
        controller.start().await.unwrap();

        let over = RawSnapshot::Structured(state(true, Some(Winner::Player)));
        let (a, b) = tokio::join!(
            controller.reconcile(over.clone()),
            controller.reconcile(over)
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        let finished = outcomes
            .iter()
            .filter(|o| matches!(o, ReconcileOutcome::GameOver(_)))
            .count();
        assert_eq!(finished, 1, "outcomes: {outcomes:?}");
        assert!(outcomes.contains(&ReconcileOutcome::Ignored(SessionState::Over {
            winner: Some(Winner::Player)
        })));
        assert_eq!(controller.winner().await, Some(Winner::Player));
        assert!(!controller.is_polling().await);

        drop(controller);
        let mut game_overs = 0;
        while let Some(event) = events.recv().await {
            if matches!(event, SessionEvent::GameOver { .. }) {
                game_overs += 1;
            }
        }
        assert_eq!(game_overs, 1);
    }

    #[tokio::test]
    async fn stale_snapshot_is_discarded() {
        let (service, _state, _fetches) = FixedService::new(state(false, None));
        let (controller, _events) = SessionController::new(service, fast_config());
        controller.start().await.unwrap();

        let old_ticket = controller.take_ticket();
        let mut newer = state(false, None);
        newer.enemy_board[0][0] = CellCode::Numeric(3);
        controller
            .reconcile(RawSnapshot::Structured(newer))
            .await
            .unwrap();

        let mut older = state(false, None);
        older.enemy_board[0][0] = CellCode::Numeric(0);
        let outcome = controller
            .reconcile_ticket(RawSnapshot::Structured(older), old_ticket)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Stale);
        let (_, enemy) = controller.boards().await;
        assert_eq!(enemy.get(Coordinate::new(0, 0)).unwrap(), CellState::Miss);
    }

    #[tokio::test]
    async fn pending_effects_survive_a_snapshot() {
        let (service, _state, _fetches) = FixedService::new(state(false, None));
        let (controller, _events) = SessionController::new(service, fast_config());
        controller.start().await.unwrap();
        controller
            .apply_shot(ShotResult::new((4, 4), ShotOutcome::Destroyed))
            .await
            .unwrap();

        let outcome = controller.refresh().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied);
        let (_, enemy) = controller.boards().await;
        assert_eq!(
            enemy.get(Coordinate::new(4, 4)).unwrap(),
            CellState::Destroyed
        );
        assert_eq!(enemy.count(CellState::Surrounding), 8);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_boards_and_state() {
        let (service, served, _fetches) = FixedService::new(state(false, None));
        let (controller, _events) = SessionController::new(service, fast_config());
        controller.start().await.unwrap();
        controller
            .apply_shot(ShotResult::new((1, 1), ShotOutcome::Hit))
            .await
            .unwrap();

        *served.lock().unwrap() = Err(SalvoError::Timeout);
        let err = controller.refresh().await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(controller.state().await, SessionState::Active);
        let (_, enemy) = controller.boards().await;
        assert_eq!(enemy.get(Coordinate::new(1, 1)).unwrap(), CellState::Hit);
    }

    #[tokio::test]
    async fn wrong_size_snapshot_is_malformed() {
        let (service, _state, _fetches) = FixedService::new(state(false, None));
        let (controller, _events) =
            SessionController::new(service, fast_config().with_board_size(8, 8));
        controller.start().await.unwrap();
        let err = controller
            .reconcile(RawSnapshot::Structured(state(false, None)))
            .await
            .unwrap_err();
        assert!(matches!(err, SalvoError::MalformedSnapshot(_)));
        let (own, _) = controller.boards().await;
        assert_eq!(own.width(), 8);
    }

    #[tokio::test]
    async fn dropping_the_controller_ends_the_poll_loop() {
        let (service, _state, _fetches) = FixedService::new(state(false, None));
        let (controller, mut events) = SessionController::new(service, fast_config());
        controller.start().await.unwrap();
        drop(controller);
        // Started was queued; after that the channel closes once the
        // controller (and its poll task) are gone.
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::Started { .. })
        ));
        assert!(events.recv().await.is_none());
    }
}
