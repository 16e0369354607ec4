//! Tracks, per channel, how many publishers the streaming service reports and
//! the most recent observation, and boils the counts down to the two-state
//! presence signal the watcher consumes.

use crate::event::OCCUPANCY_PREFIX;

use hashbrown::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherPresence {
    Present,
    Absent,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct LastNotification {
    manager: String,
    timestamp: i64,
}

/// Publisher occupancy per channel.  `managers` and `last` sit behind
/// independent locks so occupancy updates never block last-notification
/// reads.
#[derive(Debug)]
pub struct Keeper {
    managers: RwLock<HashMap<String, i64>>,
    last: RwLock<Option<LastNotification>>,
    active_region: String,
    presence_tx: mpsc::Sender<PublisherPresence>,
}

impl Keeper {
    /// `presence_tx` must have generous headroom (the manager sizes it at
    /// 1000); emission never blocks, a full channel drops the signal with an
    /// error log.
    pub fn new(presence_tx: mpsc::Sender<PublisherPresence>) -> Self {
        Self {
            managers: RwLock::new(HashMap::new()),
            last: RwLock::new(None),
            active_region: DEFAULT_REGION.to_string(),
            presence_tx,
        }
    }

    pub fn publishers(&self, channel: &str) -> Option<i64> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(strip_occupancy_prefix(channel))
            .copied()
    }

    /// Record a new publisher count and emit the resulting presence signal.
    pub fn update_managers(&self, channel: &str, publishers: i64) {
        let mut managers = self
            .managers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        managers.insert(strip_occupancy_prefix(channel).to_string(), publishers);
        let presence = if managers.values().any(|&count| count > 0) {
            PublisherPresence::Present
        } else {
            PublisherPresence::Absent
        };
        // Emitted while holding the lock; fine, the channel has headroom.
        if let Err(e) = self.presence_tx.try_send(presence) {
            log::error!("Could not emit publisher presence: {}", e);
        }
    }

    pub fn last_notification(&self) -> Option<(String, i64)> {
        self.last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|last| (last.manager.clone(), last.timestamp))
    }

    pub fn update_last_notification(&self, channel: &str, timestamp: i64) {
        let mut last = self.last.write().unwrap_or_else(PoisonError::into_inner);
        *last = Some(LastNotification {
            manager: strip_occupancy_prefix(channel).to_string(),
            timestamp,
        });
    }

    pub fn active_region(&self) -> &str {
        &self.active_region
    }
}

fn strip_occupancy_prefix(channel: &str) -> &str {
    channel.strip_prefix(OCCUPANCY_PREFIX).unwrap_or(channel)
}
