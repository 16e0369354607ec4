//! Tunables for a push session.  The defaults match the reference deployment;
//! construction of a `PushManager` rejects values below the minimums that keep
//! the transport reader from ever blocking on a full queue.

use crate::err::Error;
use std::time::Duration;

/// Smallest split/segment queue the design allows.
pub const MIN_UPDATE_QUEUE: usize = 5000;
/// Smallest presence buffer the design allows.
pub const MIN_PRESENCE_BUFFER: usize = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the split-update worker queue.
    pub split_queue: usize,
    /// Capacity of the segment-update worker queue.
    pub segment_queue: usize,
    /// Capacity of the publisher-presence channel fed by the `Keeper`.
    pub presence_buffer: usize,
    /// Capacity of the transport status channel.
    pub status_buffer: usize,
    /// First delay of the auth/SSE backoff schedules.
    pub backoff_base: Duration,
    /// Ceiling of the auth/SSE backoff schedules.
    pub backoff_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            split_queue: MIN_UPDATE_QUEUE,
            segment_queue: MIN_UPDATE_QUEUE,
            presence_buffer: MIN_PRESENCE_BUFFER,
            status_buffer: 100,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let check = |name, min, got| {
            if got < min {
                Err(Error::UndersizedQueue { name, min, got })
            } else {
                Ok(())
            }
        };
        check("split", MIN_UPDATE_QUEUE, self.split_queue)?;
        check("segment", MIN_UPDATE_QUEUE, self.segment_queue)?;
        check("presence", MIN_PRESENCE_BUFFER, self.presence_buffer)?;
        check("status", 1, self.status_buffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn undersized_split_queue_is_rejected() {
        let cfg = Config {
            split_queue: 10,
            ..Config::default()
        };
        match cfg.validate() {
            Err(Error::UndersizedQueue { name, min, got }) => {
                assert_eq!((name, min, got), ("split", MIN_UPDATE_QUEUE, 10));
            }
            other => panic!("expected an undersized-queue error, got {:?}", other),
        }
    }

    #[test]
    fn undersized_segment_queue_is_rejected() {
        let cfg = Config {
            segment_queue: 4999,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
