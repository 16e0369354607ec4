//! The push session state machine.
//!
//! `PushManager` owns everything with a lifetime: it authenticates, arms the
//! token-expiration timer, opens the streaming connection, starts the update
//! workers, and then watches transport status, publisher presence, and
//! control instructions all at once, translating them into the lifecycle
//! signals its owner uses to flip between streaming and polling.
//!
//! Each `start` builds a fresh session: new keeper, new queues, new signal
//! channels, and a new cancellation token shared (as child tokens) by every
//! task the session spawns.  That is what guarantees a restart can never see
//! a leftover signal from the previous session.

mod backoff;
mod err;
mod handler;
mod keeper;
mod processor;
mod worker;

pub use err::ProcessErr;
pub use handler::EventHandler;
pub use keeper::{Keeper, PublisherPresence};
pub use processor::{ControlSignal, Processor};
pub use worker::{SegmentUpdateWorker, SplitUpdateWorker};

use crate::auth::Authenticator;
use crate::config::Config;
use crate::err::Error;
use crate::storage::SplitStorage;
use crate::sync::Synchronizer;
use crate::transport::{EventSource, TransportStatus};
use backoff::Backoff;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The primary control channel; resuming consults its publisher count.
const CONTROL_PRI: &str = "control_pri";

/// Lifecycle signals emitted to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    /// Streaming is live; the owner may suspend polling.
    Ready,
    /// Publishers present; updates arrive over the stream.
    PushIsUp,
    /// No publishers (or streaming paused); the owner should poll.
    PushIsDown,
    /// Authentication hit a 5xx; the manager is retrying.
    BackoffAuth,
    /// The SSE connect hit a 5xx; the manager is retrying.
    BackoffSse,
    /// The token deadline elapsed; the owner should restart push.
    TokenExpiration,
    StreamingPaused,
    StreamingResumed,
    /// The control plane disabled streaming permanently.
    StreamingDisabled,
    /// Recoverable transport fault; the owner should restart push.
    Reconnect,
    /// Give up on streaming and stay in polling.
    NonRetriableError,
}

pub struct PushManager {
    cfg: Config,
    authenticator: Arc<dyn Authenticator>,
    event_source: Arc<dyn EventSource>,
    split_storage: Arc<dyn SplitStorage>,
    synchronizer: Arc<dyn Synchronizer>,
    status_tx: mpsc::Sender<PushStatus>,
    running: AtomicBool,
    paused: AtomicBool,
    shutdown: Mutex<Option<CancellationToken>>,
}

/// Everything built fresh for one start/stop cycle.
struct Session {
    keeper: Arc<Keeper>,
    handler: Arc<EventHandler>,
    split_worker: SplitUpdateWorker,
    segment_worker: SegmentUpdateWorker,
    presence_rx: mpsc::Receiver<PublisherPresence>,
    control_rx: mpsc::Receiver<ControlSignal>,
}

impl PushManager {
    pub fn new(
        cfg: Config,
        authenticator: Arc<dyn Authenticator>,
        event_source: Arc<dyn EventSource>,
        split_storage: Arc<dyn SplitStorage>,
        synchronizer: Arc<dyn Synchronizer>,
        status_tx: mpsc::Sender<PushStatus>,
    ) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            authenticator,
            event_source,
            split_storage,
            synchronizer,
            status_tx,
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            shutdown: Mutex::new(None),
        })
    }

    /// Begin a push session.  Returns immediately; progress is reported on
    /// the status channel.  A no-op while a session is already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("Push manager is already running");
            return;
        }
        self.paused.store(false, Ordering::SeqCst);
        let shutdown = CancellationToken::new();
        *lock(&self.shutdown) = Some(shutdown.clone());

        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run(shutdown).await });
    }

    /// End the session.  Idempotent, and prompt no matter which phase the
    /// session is in: cancellation covers backoff sleeps, the token timer,
    /// the watcher, and the workers.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            log::debug!("Push manager is not running");
            return;
        }
        log::info!("Stopping push");
        if let Some(shutdown) = lock(&self.shutdown).take() {
            shutdown.cancel();
        }
        self.event_source.stop_streaming(false).await;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let session = match self.build_session() {
            Ok(session) => session,
            Err(e) => {
                log::error!("Could not build push session: {}", e);
                return self.abort().await;
            }
        };

        // Authenticate, backing off on 5xx only.
        let mut backoff = Backoff::new(self.cfg.backoff_base, self.cfg.backoff_max);
        let token = loop {
            match self.authenticator.authenticate().await {
                Ok(token) if !token.push_enabled() => {
                    log::warn!("Streaming is disabled for this account");
                    return self.abort().await;
                }
                Ok(token) => break token,
                Err(e) if e.is_retryable() => {
                    log::warn!("{}; backing off", e);
                    self.emit(PushStatus::BackoffAuth).await;
                    if !self.backoff_sleep(&mut backoff, &shutdown).await {
                        return;
                    }
                }
                Err(e) => {
                    log::error!("{}", e);
                    return self.abort().await;
                }
            }
        };

        let channels = match token.channel_list() {
            Ok(channels) => channels,
            Err(e) => {
                log::error!("Could not derive channel grants: {}", e);
                return self.abort().await;
            }
        };
        match token.calculate_next_token_expiration() {
            Ok(deadline) => self.arm_token_timer(deadline, &shutdown),
            Err(e) => {
                log::error!("Could not derive the token deadline: {}", e);
                return self.abort().await;
            }
        }

        // Connect, on the same backoff schedule.  The first status on the
        // transport channel is the verdict on the attempt.
        let (transport_tx, mut transport_rx) = mpsc::channel(self.cfg.status_buffer);
        backoff.reset();
        loop {
            self.event_source
                .connect_streaming(
                    token.raw(),
                    &channels,
                    transport_tx.clone(),
                    session.handler.clone(),
                )
                .await;
            let verdict = tokio::select! {
                _ = shutdown.cancelled() => return,
                status = transport_rx.recv() => status,
            };
            match verdict {
                Some(TransportStatus::Ok) => break,
                Some(TransportStatus::RetryableError) => {
                    log::warn!("Streaming connect failed; backing off");
                    self.emit(PushStatus::BackoffSse).await;
                    if !self.backoff_sleep(&mut backoff, &shutdown).await {
                        return;
                    }
                }
                other => {
                    log::error!("Streaming connect failed for good: {:?}", other);
                    return self.abort().await;
                }
            }
        }

        session.split_worker.start();
        session.segment_worker.start();
        self.emit(PushStatus::Ready).await;
        log::info!("Streaming is live");

        self.watch(session, transport_rx, shutdown).await;
    }

    /// Steady state: translate transport, presence, and control signals into
    /// lifecycle signals until the session is cancelled.
    async fn watch(
        &self,
        session: Session,
        mut transport_rx: mpsc::Receiver<TransportStatus>,
        shutdown: CancellationToken,
    ) {
        let Session {
            keeper,
            split_worker,
            segment_worker,
            mut presence_rx,
            mut control_rx,
            handler: _handler,
        } = session;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(status) = transport_rx.recv() => match status {
                    TransportStatus::Ok => {}
                    TransportStatus::ErrorKeepAlive
                    | TransportStatus::ErrorInternal
                    | TransportStatus::ErrorReadingStream => {
                        log::warn!("Transport fault ({:?}); asking for a reconnect", status);
                        self.emit(PushStatus::Reconnect).await;
                    }
                    TransportStatus::RetryableError | TransportStatus::NonRetryableError => {
                        log::error!("Fatal transport fault ({:?})", status);
                        self.emit(PushStatus::NonRetriableError).await;
                    }
                },
                Some(presence) = presence_rx.recv() => {
                    if self.paused.load(Ordering::SeqCst) {
                        log::debug!("Streaming is paused; ignoring occupancy");
                        continue;
                    }
                    match presence {
                        PublisherPresence::Present => self.emit(PushStatus::PushIsUp).await,
                        PublisherPresence::Absent => self.emit(PushStatus::PushIsDown).await,
                    }
                }
                Some(signal) = control_rx.recv() => match signal {
                    ControlSignal::StreamingPaused => {
                        if !self.paused.swap(true, Ordering::SeqCst) {
                            self.emit(PushStatus::StreamingPaused).await;
                            self.emit(PushStatus::PushIsDown).await;
                        }
                    }
                    ControlSignal::StreamingResumed => {
                        if self.paused.swap(false, Ordering::SeqCst) {
                            self.emit(PushStatus::StreamingResumed).await;
                            if keeper.publishers(CONTROL_PRI).unwrap_or(0) > 0 {
                                self.emit(PushStatus::PushIsUp).await;
                            }
                        }
                    }
                    ControlSignal::StreamingDisabled => {
                        log::warn!("The control plane disabled streaming");
                        self.emit(PushStatus::StreamingDisabled).await;
                    }
                },
            }
        }

        split_worker.stop();
        segment_worker.stop();
    }

    fn build_session(&self) -> Result<Session, Error> {
        let (presence_tx, presence_rx) = mpsc::channel(self.cfg.presence_buffer);
        let (split_tx, split_rx) = mpsc::channel(self.cfg.split_queue);
        let (segment_tx, segment_rx) = mpsc::channel(self.cfg.segment_queue);
        let (control_tx, control_rx) = mpsc::channel(1);

        let keeper = Arc::new(Keeper::new(presence_tx));
        let processor = Arc::new(Processor::new(
            split_tx,
            segment_tx,
            control_tx,
            self.split_storage.clone(),
        )?);
        let handler = Arc::new(EventHandler::new(keeper.clone(), processor));
        let split_worker = SplitUpdateWorker::new(split_rx, self.synchronizer.clone());
        let segment_worker = SegmentUpdateWorker::new(segment_rx, self.synchronizer.clone());

        Ok(Session {
            keeper,
            handler,
            split_worker,
            segment_worker,
            presence_rx,
            control_rx,
        })
    }

    fn arm_token_timer(&self, deadline: std::time::Duration, shutdown: &CancellationToken) {
        let cancelled = shutdown.child_token();
        let status_tx = self.status_tx.clone();
        log::debug!("Auth token expires in {:?}", deadline);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    log::info!("Auth token expired");
                    if let Err(e) = status_tx.send(PushStatus::TokenExpiration).await {
                        log::debug!("Owner is gone: {}", e);
                    }
                }
            }
        });
    }

    /// Sleep out one backoff step; `false` means the session was cancelled.
    async fn backoff_sleep(&self, backoff: &mut Backoff, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(backoff.next_delay()) => true,
        }
    }

    /// Give up on this session before it went live.  Cancels the session
    /// token so the expiration timer cannot fire into a later session.
    async fn abort(&self) {
        self.emit(PushStatus::NonRetriableError).await;
        if let Some(shutdown) = lock(&self.shutdown).take() {
            shutdown.cancel();
        }
        self.running.store(false, Ordering::SeqCst);
    }

    async fn emit(&self, status: PushStatus) {
        if let Err(e) = self.status_tx.send(status).await {
            log::debug!("Owner is gone: {}", e);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
