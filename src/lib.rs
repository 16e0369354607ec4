//! Streaming push client for feature-flag SDKs
//!
//! This library keeps an SDK's local feature-flag and segment cache in sync
//! with a control plane over a server-sent-events stream, and tells its owner
//! when streaming cannot be trusted so the owner can fall back to polling.
//!
//! # Notes on data flow
//! * **Transport → EventHandler**:
//! The SSE transport (an external collaborator behind the `EventSource`
//! trait) decodes each wire event into a `RawEvent` envelope and hands it to
//! the `EventHandler`, the single entry point into this crate.  The handler
//! classifies the envelope as an update, an occupancy meta-event, or an
//! error, and routes it accordingly.
//!
//! * **EventHandler → Keeper | Processor**:
//! Occupancy events feed the `Keeper`, which tracks publisher counts per
//! channel and boils them down to a two-state presence signal.  Update
//! events are decoded lazily and handed to the `Processor`, which validates
//! them, applies split-kill side effects to local storage, and places typed
//! change notifications on the bounded worker queues.
//!
//! * **Workers → Synchronizer**:
//! One worker per notification kind drains its queue in FIFO order and calls
//! the owner-supplied `Synchronizer` with the advertised change number, so
//! synchronizer network I/O can never stall the transport reader.
//!
//! * **PushManager → owner**:
//! The `PushManager` runs the session: authentication with bounded backoff,
//! the token-expiration timer, the streaming connect, and a watcher that
//! folds transport status, publisher presence, and control instructions into
//! the `PushStatus` lifecycle signals the owner consumes.

pub mod auth;
pub mod config;
pub mod err;
pub mod event;
pub mod push;
pub mod storage;
pub mod sync;
pub mod transport;

pub use auth::{AuthErr, Authenticator, Token};
pub use config::Config;
pub use err::Error;
pub use event::{IncomingNotification, RawEvent};
pub use push::{PushManager, PushStatus};
pub use storage::SplitStorage;
pub use sync::{SyncErr, Synchronizer};
pub use transport::{EventSink, EventSource, TransportStatus};
