//! Dispatches parsed update notifications: typed change notifications onto
//! the worker queues, kill side effects straight into local storage, and
//! control instructions onto the watcher's one-slot control channel.

use super::err::ProcessErr;
use crate::err::Error;
use crate::event::{
    ControlType, IncomingNotification, NotificationType, SegmentChangeNotification,
    SplitChangeNotification,
};
use crate::storage::SplitStorage;

use std::sync::Arc;
use tokio::sync::mpsc;

type Result<T> = std::result::Result<T, ProcessErr>;

/// Instruction for the watcher, translated from a CONTROL notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    StreamingPaused,
    StreamingResumed,
    StreamingDisabled,
}

pub struct Processor {
    split_tx: mpsc::Sender<SplitChangeNotification>,
    segment_tx: mpsc::Sender<SegmentChangeNotification>,
    control_tx: mpsc::Sender<ControlSignal>,
    split_storage: Arc<dyn SplitStorage>,
}

impl Processor {
    /// Queue capacities are preconditions, not tunables: a burst of
    /// notifications must never block the transport reader, so the split and
    /// segment queues hold at least 5000 entries each.  The manager sizes the
    /// control channel at one slot; any bounded channel is accepted here.
    pub fn new(
        split_tx: mpsc::Sender<SplitChangeNotification>,
        segment_tx: mpsc::Sender<SegmentChangeNotification>,
        control_tx: mpsc::Sender<ControlSignal>,
        split_storage: Arc<dyn SplitStorage>,
    ) -> std::result::Result<Self, Error> {
        let check = |name, min, got| {
            if got < min {
                Err(Error::UndersizedQueue { name, min, got })
            } else {
                Ok(())
            }
        };
        check("split", crate::config::MIN_UPDATE_QUEUE, split_tx.max_capacity())?;
        check(
            "segment",
            crate::config::MIN_UPDATE_QUEUE,
            segment_tx.max_capacity(),
        )?;
        Ok(Self {
            split_tx,
            segment_tx,
            control_tx,
            split_storage,
        })
    }

    pub fn process(&self, notification: IncomingNotification) -> Result<()> {
        use NotificationType::*;
        match notification.notification_type {
            SplitUpdate => {
                let change_number = notification
                    .change_number
                    .ok_or(ProcessErr::MissingChangeNumber)?;
                self.enqueue_split(SplitChangeNotification {
                    channel: notification.channel,
                    change_number,
                })
            }
            SegmentUpdate => {
                let change_number = notification
                    .change_number
                    .ok_or(ProcessErr::MissingChangeNumber)?;
                let segment_name = notification
                    .segment_name
                    .ok_or(ProcessErr::MissingSegmentName)?;
                self.segment_tx
                    .try_send(SegmentChangeNotification {
                        channel: notification.channel,
                        change_number,
                        segment_name,
                    })
                    .map_err(|_| ProcessErr::QueueFull { queue: "segment" })
            }
            SplitKill => {
                let change_number = notification
                    .change_number
                    .ok_or(ProcessErr::MissingChangeNumber)?;
                let split_name = notification
                    .split_name
                    .ok_or(ProcessErr::MissingSplitName)?;
                let default_treatment = notification
                    .default_treatment
                    .ok_or(ProcessErr::MissingDefaultTreatment)?;
                // Kill in the local cache first; the queued notification then
                // makes the synchronizer reconcile the real definition.
                self.split_storage
                    .kill_locally(&split_name, &default_treatment, change_number);
                self.enqueue_split(SplitChangeNotification {
                    channel: notification.channel,
                    change_number,
                })
            }
            Control => {
                let control_type = notification
                    .control_type
                    .ok_or(ProcessErr::MissingControlType)?;
                let signal = match control_type {
                    ControlType::StreamingPaused => ControlSignal::StreamingPaused,
                    ControlType::StreamingResumed => ControlSignal::StreamingResumed,
                    ControlType::StreamingDisabled => ControlSignal::StreamingDisabled,
                    ControlType::Unknown => {
                        log::debug!("Dropping control notification of unknown type");
                        return Ok(());
                    }
                };
                if let Err(e) = self.control_tx.try_send(signal) {
                    log::debug!("Could not emit control signal: {}", e);
                }
                Ok(())
            }
            Unknown => Err(ProcessErr::UnsupportedType),
        }
    }

    fn enqueue_split(&self, notification: SplitChangeNotification) -> Result<()> {
        self.split_tx
            .try_send(notification)
            .map_err(|_| ProcessErr::QueueFull { queue: "split" })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStorage {
        kills: Mutex<Vec<(String, String, i64)>>,
    }

    impl SplitStorage for RecordingStorage {
        fn kill_locally(&self, split_name: &str, default_treatment: &str, change_number: i64) {
            self.kills.lock().expect("in test").push((
                split_name.to_string(),
                default_treatment.to_string(),
                change_number,
            ));
        }
    }

    struct Fixture {
        processor: Processor,
        storage: Arc<RecordingStorage>,
        split_rx: mpsc::Receiver<SplitChangeNotification>,
        segment_rx: mpsc::Receiver<SegmentChangeNotification>,
        control_rx: mpsc::Receiver<ControlSignal>,
    }

    fn fixture() -> Fixture {
        let (split_tx, split_rx) = mpsc::channel(5000);
        let (segment_tx, segment_rx) = mpsc::channel(5000);
        let (control_tx, control_rx) = mpsc::channel(1);
        let storage = Arc::new(RecordingStorage::default());
        let processor = Processor::new(split_tx, segment_tx, control_tx, storage.clone())
            .expect("in test");
        Fixture {
            processor,
            storage,
            split_rx,
            segment_rx,
            control_rx,
        }
    }

    fn notification(json: &str) -> IncomingNotification {
        let mut n: IncomingNotification = serde_json::from_str(json).expect("in test");
        n.channel = "splits".to_string();
        n
    }

    #[test]
    fn undersized_queues_fail_construction() {
        let (split_tx, _split_rx) = mpsc::channel(10);
        let (segment_tx, _segment_rx) = mpsc::channel(5000);
        let (control_tx, _control_rx) = mpsc::channel(1);
        let storage = Arc::new(RecordingStorage::default());
        assert!(Processor::new(split_tx, segment_tx, control_tx, storage).is_err());
    }

    #[test]
    fn any_bounded_control_channel_is_accepted() {
        let (split_tx, _split_rx) = mpsc::channel(5000);
        let (segment_tx, _segment_rx) = mpsc::channel(5000);
        let (control_tx, _control_rx) = mpsc::channel(2);
        let storage = Arc::new(RecordingStorage::default());
        assert!(Processor::new(split_tx, segment_tx, control_tx, storage).is_ok());
    }

    #[test]
    fn split_update_is_enqueued() {
        let mut fx = fixture();
        fx.processor
            .process(notification(r#"{"type":"SPLIT_UPDATE","changeNumber":42}"#))
            .expect("in test");
        assert_eq!(
            fx.split_rx.try_recv().expect("in test"),
            SplitChangeNotification {
                channel: "splits".to_string(),
                change_number: 42
            }
        );
    }

    #[test]
    fn split_update_without_change_number_is_rejected() {
        let mut fx = fixture();
        let result = fx
            .processor
            .process(notification(r#"{"type":"SPLIT_UPDATE"}"#));
        assert_eq!(result, Err(ProcessErr::MissingChangeNumber));
        assert!(fx.split_rx.try_recv().is_err());
    }

    #[test]
    fn segment_update_is_enqueued() {
        let mut fx = fixture();
        fx.processor
            .process(notification(
                r#"{"type":"SEGMENT_UPDATE","changeNumber":9,"segmentName":"beta_users"}"#,
            ))
            .expect("in test");
        assert_eq!(
            fx.segment_rx.try_recv().expect("in test"),
            SegmentChangeNotification {
                channel: "splits".to_string(),
                change_number: 9,
                segment_name: "beta_users".to_string()
            }
        );
    }

    #[test]
    fn segment_update_without_name_is_rejected() {
        let fx = fixture();
        let result = fx
            .processor
            .process(notification(r#"{"type":"SEGMENT_UPDATE","changeNumber":9}"#));
        assert_eq!(result, Err(ProcessErr::MissingSegmentName));
    }

    #[test]
    fn split_kill_hits_storage_before_the_queue() {
        let mut fx = fixture();
        fx.processor
            .process(notification(
                r#"{"type":"SPLIT_KILL","changeNumber":7,"splitName":"flag_a","defaultTreatment":"off"}"#,
            ))
            .expect("in test");
        assert_eq!(
            *fx.storage.kills.lock().expect("in test"),
            vec![("flag_a".to_string(), "off".to_string(), 7)]
        );
        assert_eq!(
            fx.split_rx.try_recv().expect("in test").change_number,
            7
        );
    }

    #[test]
    fn split_kill_without_treatment_touches_nothing() {
        let mut fx = fixture();
        let result = fx.processor.process(notification(
            r#"{"type":"SPLIT_KILL","changeNumber":7,"splitName":"flag_a"}"#,
        ));
        assert_eq!(result, Err(ProcessErr::MissingDefaultTreatment));
        assert!(fx.storage.kills.lock().expect("in test").is_empty());
        assert!(fx.split_rx.try_recv().is_err());
    }

    #[test]
    fn control_notifications_become_signals() {
        let mut fx = fixture();
        fx.processor
            .process(notification(
                r#"{"type":"CONTROL","controlType":"STREAMING_PAUSED"}"#,
            ))
            .expect("in test");
        assert_eq!(
            fx.control_rx.try_recv(),
            Ok(ControlSignal::StreamingPaused)
        );
    }

    #[test]
    fn unknown_control_type_is_dropped_without_error() {
        let mut fx = fixture();
        fx.processor
            .process(notification(
                r#"{"type":"CONTROL","controlType":"STREAMING_SLOWER"}"#,
            ))
            .expect("in test");
        assert!(fx.control_rx.try_recv().is_err());
    }

    #[test]
    fn unknown_notification_type_is_an_error() {
        let fx = fixture();
        let result = fx
            .processor
            .process(notification(r#"{"type":"MY_UPDATE","changeNumber":1}"#));
        assert_eq!(result, Err(ProcessErr::UnsupportedType));
    }

    #[test]
    fn a_full_queue_fails_the_enqueue_instead_of_blocking() {
        let mut fx = fixture();
        for i in 0..5000 {
            fx.processor
                .process(notification(&format!(
                    r#"{{"type":"SPLIT_UPDATE","changeNumber":{}}}"#,
                    i
                )))
                .expect("in test");
        }
        let overflow = fx
            .processor
            .process(notification(r#"{"type":"SPLIT_UPDATE","changeNumber":5000}"#));
        assert_eq!(overflow, Err(ProcessErr::QueueFull { queue: "split" }));
        // FIFO is preserved for everything that fit
        assert_eq!(fx.split_rx.try_recv().expect("in test").change_number, 0);
    }
}
