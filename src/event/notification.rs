//! The payloads carried inside the `data` field of an update event, decoded
//! lazily once the envelope has been classified.

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    #[serde(rename = "SPLIT_UPDATE")]
    SplitUpdate,
    #[serde(rename = "SEGMENT_UPDATE")]
    SegmentUpdate,
    #[serde(rename = "SPLIT_KILL")]
    SplitKill,
    #[serde(rename = "CONTROL")]
    Control,
    /// Any type this version of the subsystem does not know.  Kept so the
    /// `Processor` can reject it with a descriptive error instead of the
    /// whole payload failing to decode.
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    #[serde(rename = "STREAMING_PAUSED")]
    StreamingPaused,
    #[serde(rename = "STREAMING_RESUMED")]
    StreamingResumed,
    #[serde(rename = "STREAMING_DISABLED")]
    StreamingDisabled,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IncomingNotification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    #[serde(default, deserialize_with = "super::de_truncated_i64")]
    pub change_number: Option<i64>,
    #[serde(default)]
    pub segment_name: Option<String>,
    #[serde(default)]
    pub split_name: Option<String>,
    #[serde(default)]
    pub default_treatment: Option<String>,
    #[serde(default)]
    pub control_type: Option<ControlType>,
    /// Not on the wire; copied from the envelope by the `EventHandler`.
    #[serde(skip)]
    pub channel: String,
}

/// What the split worker dequeues: the channel that announced the change and
/// the change number to hand the synchronizer as a lower bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitChangeNotification {
    pub channel: String,
    pub change_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentChangeNotification {
    pub channel: String,
    pub change_number: i64,
    pub segment_name: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_update_decodes() {
        let n: IncomingNotification =
            serde_json::from_str(r#"{"type":"SPLIT_UPDATE","changeNumber":42}"#)
                .expect("in test");
        assert_eq!(n.notification_type, NotificationType::SplitUpdate);
        assert_eq!(n.change_number, Some(42));
        assert_eq!(n.channel, "");
    }

    #[test]
    fn split_kill_decodes() {
        let n: IncomingNotification = serde_json::from_str(
            r#"{"type":"SPLIT_KILL","changeNumber":7,"splitName":"flag_a","defaultTreatment":"off"}"#,
        )
        .expect("in test");
        assert_eq!(n.notification_type, NotificationType::SplitKill);
        assert_eq!(n.split_name.as_deref(), Some("flag_a"));
        assert_eq!(n.default_treatment.as_deref(), Some("off"));
    }

    #[test]
    fn unknown_type_still_decodes() {
        let n: IncomingNotification =
            serde_json::from_str(r#"{"type":"MY_UPDATE","changeNumber":1}"#).expect("in test");
        assert_eq!(n.notification_type, NotificationType::Unknown);
    }

    #[test]
    fn unknown_control_type_still_decodes() {
        let n: IncomingNotification =
            serde_json::from_str(r#"{"type":"CONTROL","controlType":"STREAMING_SLOWER"}"#)
                .expect("in test");
        assert_eq!(n.control_type, Some(ControlType::Unknown));
    }

    #[test]
    fn float_change_number_is_truncated() {
        let n: IncomingNotification =
            serde_json::from_str(r#"{"type":"SPLIT_UPDATE","changeNumber":42.9}"#)
                .expect("in test");
        assert_eq!(n.change_number, Some(42));
    }
}
