//! The wire format consumed from the streaming transport.
//!
//! Every message the transport yields is one envelope: a flat JSON object with
//! optional string and numeric fields.  A raw envelope might look like this
//! (line breaks added between fields):
//!
//! ```text
//! {"id":"gsQvb:0:0",
//!  "timestamp":1591996685108,
//!  "encoding":"json",
//!  "channel":"[?occupancy=metrics.publishers]control_pri",
//!  "name":"[meta]occupancy",
//!  "data":"{\"metrics\":{\"publishers\":1}}"}
//! ```
//!
//! Classification into update / occupancy / error looks only at the envelope;
//! the `data` field is decoded lazily, and only for the kinds that carry one.

mod err;
mod notification;

pub use err::EventErr;
pub use notification::{
    ControlType, IncomingNotification, NotificationType, SegmentChangeNotification,
    SplitChangeNotification,
};

use serde::{Deserialize, Deserializer};

/// Prefix carried by occupancy channel names; stripped before storage.
pub const OCCUPANCY_PREFIX: &str = "[?occupancy=metrics.publishers]";

/// The `name` that marks an envelope as an occupancy meta-event.
const META_OCCUPANCY: &str = "[meta]occupancy";

/// A decoded event envelope, exactly as the transport delivers it.
///
/// JSON decoding may surface numeric fields as floats; the deserializers
/// below truncate them to integers.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "clientId")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default, deserialize_with = "de_truncated_i64")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "de_truncated_i64")]
    pub code: Option<i64>,
    #[serde(default, rename = "statusCode", deserialize_with = "de_truncated_i32")]
    pub status_code: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Update,
    Occupancy,
    Error,
}

/// An envelope after classification.  Produced by a pure function of the
/// `RawEvent`; never fails, missing fields stay absent.
#[derive(Debug, Clone)]
pub struct IncomingEvent {
    pub kind: EventKind,
    raw: RawEvent,
}

impl From<RawEvent> for IncomingEvent {
    fn from(raw: RawEvent) -> Self {
        let kind = if raw.code.is_some() && raw.status_code.is_some() {
            EventKind::Error
        } else if raw.name.as_deref() == Some(META_OCCUPANCY) {
            EventKind::Occupancy
        } else {
            EventKind::Update
        };
        Self { kind, raw }
    }
}

impl IncomingEvent {
    pub fn channel(&self) -> &str {
        self.raw.channel.as_deref().unwrap_or_default()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.raw.timestamp
    }

    pub fn raw(&self) -> &RawEvent {
        &self.raw
    }

    /// Decode `data` as an update notification, filling in `channel` from the
    /// envelope.
    pub fn notification(&self) -> Result<IncomingNotification, EventErr> {
        let data = self.raw.data.as_deref().ok_or(EventErr::MissingData)?;
        let mut notification: IncomingNotification = serde_json::from_str(data)?;
        notification.channel = self.channel().to_string();
        Ok(notification)
    }

    /// Decode `data` as an occupancy payload.
    pub fn occupancy(&self) -> Result<OccupancyPayload, EventErr> {
        let data = self.raw.data.as_deref().ok_or(EventErr::MissingData)?;
        Ok(serde_json::from_str(data)?)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct OccupancyPayload {
    pub metrics: OccupancyMetrics,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OccupancyMetrics {
    #[serde(default, deserialize_with = "de_truncated_i64")]
    pub publishers: Option<i64>,
}

fn de_truncated_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let n = Option::<serde_json::Number>::deserialize(d)?;
    Ok(n.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))))
}

fn de_truncated_i32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
    let n = Option::<serde_json::Number>::deserialize(d)?;
    Ok(n.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)))
        .map(|i| i as i32))
}
