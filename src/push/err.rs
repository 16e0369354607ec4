use std::fmt;

/// Why the `Processor` refused a notification.  Each of these drops exactly
/// one event: retrying a malformed message would not help, and a full queue
/// is reconciled by the synchronizer's next run.
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessErr {
    MissingChangeNumber,
    MissingSegmentName,
    MissingSplitName,
    MissingDefaultTreatment,
    MissingControlType,
    UnsupportedType,
    QueueFull { queue: &'static str },
}

impl std::error::Error for ProcessErr {}

impl fmt::Display for ProcessErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use ProcessErr::*;
        match self {
            MissingChangeNumber => write!(f, "the notification carries no changeNumber"),
            MissingSegmentName => write!(f, "the segment notification carries no segmentName"),
            MissingSplitName => write!(f, "the kill notification carries no splitName"),
            MissingDefaultTreatment => {
                write!(f, "the kill notification carries no defaultTreatment")
            }
            MissingControlType => write!(f, "the control notification carries no controlType"),
            UnsupportedType => write!(f, "unsupported incoming notification type"),
            QueueFull { queue } => write!(f, "the {} queue is full; notification dropped", queue),
        }?;
        Ok(())
    }
}
