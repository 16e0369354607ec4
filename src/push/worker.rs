//! One task per notification kind, draining its bounded queue in FIFO order
//! and calling the owner's synchronizer.  The worker is what decouples SSE
//! reading from the synchronizer's network I/O: the transport only ever pays
//! the cost of a `try_send`.

use crate::event::{SegmentChangeNotification, SplitChangeNotification};
use crate::sync::Synchronizer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Serializes split-change fetches.  `start`/`stop` are idempotent; the queue
/// survives a stop, so a later start picks up where the last task left off
/// (residual entries from a finished session are simply dropped with it).
pub struct SplitUpdateWorker {
    queue: Arc<Mutex<Option<mpsc::Receiver<SplitChangeNotification>>>>,
    synchronizer: Arc<dyn Synchronizer>,
    running: Arc<AtomicBool>,
    shutdown: Mutex<Option<CancellationToken>>,
}

impl SplitUpdateWorker {
    pub fn new(
        queue: mpsc::Receiver<SplitChangeNotification>,
        synchronizer: Arc<dyn Synchronizer>,
    ) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Some(queue))),
            synchronizer,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("Split update worker is already running");
            return;
        }
        let mut queue = match take(&self.queue) {
            Some(queue) => queue,
            None => {
                log::error!("Split update worker queue unavailable; not starting");
                self.running.store(false, Ordering::SeqCst);
                return;
            }
        };
        let token = CancellationToken::new();
        *lock(&self.shutdown) = Some(token.clone());

        let synchronizer = self.synchronizer.clone();
        let running = self.running.clone();
        let slot = self.queue.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    item = queue.recv() => match item {
                        Some(update) => {
                            log::debug!(
                                "Fetching splits up to change number {}",
                                update.change_number
                            );
                            if let Err(e) = synchronizer
                                .synchronize_splits(Some(update.change_number))
                                .await
                            {
                                log::error!("Split synchronization failed: {}", e);
                            }
                        }
                        None => break, // producer gone; the session is over
                    },
                }
            }
            *lock(&slot) = Some(queue);
            running.store(false, Ordering::SeqCst);
        });
    }

    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            log::debug!("Split update worker is not running");
            return;
        }
        if let Some(token) = lock(&self.shutdown).take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Segment counterpart of `SplitUpdateWorker`.
pub struct SegmentUpdateWorker {
    queue: Arc<Mutex<Option<mpsc::Receiver<SegmentChangeNotification>>>>,
    synchronizer: Arc<dyn Synchronizer>,
    running: Arc<AtomicBool>,
    shutdown: Mutex<Option<CancellationToken>>,
}

impl SegmentUpdateWorker {
    pub fn new(
        queue: mpsc::Receiver<SegmentChangeNotification>,
        synchronizer: Arc<dyn Synchronizer>,
    ) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Some(queue))),
            synchronizer,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("Segment update worker is already running");
            return;
        }
        let mut queue = match take(&self.queue) {
            Some(queue) => queue,
            None => {
                log::error!("Segment update worker queue unavailable; not starting");
                self.running.store(false, Ordering::SeqCst);
                return;
            }
        };
        let token = CancellationToken::new();
        *lock(&self.shutdown) = Some(token.clone());

        let synchronizer = self.synchronizer.clone();
        let running = self.running.clone();
        let slot = self.queue.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    item = queue.recv() => match item {
                        Some(update) => {
                            log::debug!(
                                "Fetching segment {} up to change number {}",
                                update.segment_name,
                                update.change_number
                            );
                            if let Err(e) = synchronizer
                                .synchronize_segment(
                                    &update.segment_name,
                                    Some(update.change_number),
                                )
                                .await
                            {
                                log::error!("Segment synchronization failed: {}", e);
                            }
                        }
                        None => break,
                    },
                }
            }
            *lock(&slot) = Some(queue);
            running.store(false, Ordering::SeqCst);
        });
    }

    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            log::debug!("Segment update worker is not running");
            return;
        }
        if let Some(token) = lock(&self.shutdown).take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    lock(slot).take()
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
