//! Single entry point for the transport: classifies each envelope and routes
//! it to the `Keeper` or the `Processor`.  Errors here are local to one event
//! and never propagate: log, drop, move on.

use super::keeper::Keeper;
use super::processor::Processor;
use crate::event::{EventKind, IncomingEvent, RawEvent};
use crate::transport::EventSink;

use std::sync::Arc;

pub struct EventHandler {
    keeper: Arc<Keeper>,
    processor: Arc<Processor>,
}

impl EventHandler {
    pub fn new(keeper: Arc<Keeper>, processor: Arc<Processor>) -> Self {
        Self { keeper, processor }
    }
}

impl EventSink for EventHandler {
    fn handle_incoming_message(&self, event: RawEvent) {
        let event = IncomingEvent::from(event);
        match event.kind {
            EventKind::Update => {
                let notification = match event.notification() {
                    Ok(notification) => notification,
                    Err(e) => {
                        log::debug!("Could not decode update notification: {}", e);
                        return;
                    }
                };
                if let Err(e) = self.processor.process(notification) {
                    log::error!("Could not process update notification: {}", e);
                }
            }
            EventKind::Occupancy => {
                let payload = match event.occupancy() {
                    Ok(payload) => payload,
                    Err(e) => {
                        log::debug!("Could not decode occupancy payload: {}", e);
                        return;
                    }
                };
                match payload.metrics.publishers {
                    Some(publishers) => {
                        self.keeper.update_managers(event.channel(), publishers);
                        if let Some(timestamp) = event.timestamp() {
                            self.keeper
                                .update_last_notification(event.channel(), timestamp);
                        }
                    }
                    None => log::debug!("Occupancy payload carries no publisher count"),
                }
            }
            EventKind::Error => {
                log::error!("Streaming error event: {:?}", event.raw());
            }
        }
    }
}
