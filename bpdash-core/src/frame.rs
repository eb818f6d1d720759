use crate::status::FrameStatus;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

/// One observed status interval of a business process or KPI timeline.
///
/// Frames are immutable once fetched; a reload replaces the whole timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FrameWire", into = "FrameWire")]
pub struct FrameModel {
    pub status: FrameStatus,
    pub duration_percent: f64,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    /// Empty string on the wire when absent.
    pub annotation: Option<String>,
    /// Code as read when it is not the canonical code of `status` (any
    /// unmapped code reads as `unknown`). Written back unchanged.
    pub raw_status: Option<i64>,
}

#[derive(Serialize, Deserialize)]
struct FrameWire {
    status: i64,
    duration_percent: f64,
    #[serde(with = "time::serde::rfc3339")]
    start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    end: OffsetDateTime,
    #[serde(
        default,
        serialize_with = "serialize_annotation",
        deserialize_with = "deserialize_annotation"
    )]
    annotation: Option<String>,
}

impl From<FrameWire> for FrameModel {
    fn from(wire: FrameWire) -> Self {
        let status = FrameStatus::from_code(wire.status);
        Self {
            status,
            duration_percent: wire.duration_percent,
            start: wire.start,
            end: wire.end,
            annotation: wire.annotation,
            raw_status: (wire.status != status.code()).then_some(wire.status),
        }
    }
}

impl From<FrameModel> for FrameWire {
    fn from(frame: FrameModel) -> Self {
        let status = frame
            .raw_status
            .filter(|code| FrameStatus::from_code(*code) == frame.status)
            .unwrap_or_else(|| frame.status.code());
        Self {
            status,
            duration_percent: frame.duration_percent,
            start: frame.start,
            end: frame.end,
            annotation: frame.annotation,
        }
    }
}

impl FrameModel {
    /// Event id used to address this frame when annotating it: the start
    /// instant in unix nanoseconds. Unique within one timeline.
    pub fn event_id(&self) -> String {
        self.start.unix_timestamp_nanos().to_string()
    }

    pub fn duration(&self) -> time::Duration {
        self.end - self.start
    }
}

/// Orders a timeline by start. Stable, so equal starts keep their order.
pub fn sort_timeline(frames: &mut [FrameModel]) {
    frames.sort_by_key(|f| f.start);
}

/// Non-decreasing starts and no frame starting before its predecessor ended.
pub fn is_well_formed(frames: &[FrameModel]) -> bool {
    frames
        .windows(2)
        .all(|w| w[0].start <= w[1].start && w[0].end <= w[1].start)
}

pub fn total_percent(frames: &[FrameModel]) -> f64 {
    frames.iter().map(|f| f.duration_percent).sum()
}

fn serialize_annotation<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(value.as_deref().unwrap_or(""))
}

fn deserialize_annotation<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}
