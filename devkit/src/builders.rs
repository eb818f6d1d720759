/*!
Fixture builders producing data in the exact shapes exchanged on the wire.
*/

use bpdash_core::protocol::{FIELD_ACKNOWLEDGEMENT, FIELD_DOWNTIME, FIELD_STATE};
use bpdash_core::{Attrs, Delta, FrameModel, FrameStatus};
use serde_json::Value;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

/// Builds a contiguous timeline from segment lengths; percentages are
/// computed over the total length, the way the store reports them.
pub struct TimelineBuilder {
    start: OffsetDateTime,
    segments: Vec<(i64, Duration, Option<String>)>,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self::starting_at(datetime!(2024-01-01 00:00 UTC))
    }

    pub fn starting_at(start: OffsetDateTime) -> Self {
        Self {
            start,
            segments: Vec::new(),
        }
    }

    pub fn frame(mut self, code: i64, minutes: i64) -> Self {
        self.segments.push((code, Duration::minutes(minutes), None));
        self
    }

    pub fn ok(self, minutes: i64) -> Self {
        self.frame(0, minutes)
    }

    pub fn nok(self, minutes: i64) -> Self {
        self.frame(1, minutes)
    }

    pub fn unknown(self, minutes: i64) -> Self {
        self.frame(2, minutes)
    }

    pub fn inexisting(self, minutes: i64) -> Self {
        self.frame(9, minutes)
    }

    /// Annotates the last segment added.
    pub fn annotated(mut self, text: &str) -> Self {
        if let Some(last) = self.segments.last_mut() {
            last.2 = Some(text.to_string());
        }
        self
    }

    pub fn build(self) -> Vec<FrameModel> {
        let total: i64 = self.segments.iter().map(|(_, d, _)| d.whole_seconds()).sum();
        let mut cursor = self.start;
        self.segments
            .into_iter()
            .map(|(code, length, annotation)| {
                let start = cursor;
                cursor += length;
                let percent = if total > 0 {
                    100.0 * length.whole_seconds() as f64 / total as f64
                } else {
                    0.0
                };
                FrameModel {
                    status: FrameStatus::from_code(code),
                    duration_percent: percent,
                    start,
                    end: cursor,
                    annotation,
                    raw_status: None,
                }
            })
            .collect()
    }

    /// Frames with given (status code, percent) pairs, one hour apart.
    pub fn from_percents(pairs: &[(i64, f64)]) -> Vec<FrameModel> {
        let origin = datetime!(2024-01-01 00:00 UTC);
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(code, percent))| FrameModel {
                status: FrameStatus::from_code(code),
                duration_percent: percent,
                start: origin + Duration::hours(i as i64),
                end: origin + Duration::hours(i as i64 + 1),
                annotation: None,
                raw_status: None,
            })
            .collect()
    }
}

impl Default for TimelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds hub deltas, including malformed ones.
pub struct DeltaBuilder {
    env: Option<String>,
    host: String,
    service: String,
    attrs: Attrs,
    id: Option<String>,
}

impl DeltaBuilder {
    pub fn new(host: &str, service: &str) -> Self {
        Self {
            env: None,
            host: host.to_string(),
            service: service.to_string(),
            attrs: Attrs::new(),
            id: None,
        }
    }

    pub fn state(self, code: i64) -> Self {
        self.field(FIELD_STATE, code)
    }

    pub fn downtime(self, on: bool) -> Self {
        self.field(FIELD_DOWNTIME, on)
    }

    pub fn acknowledgement(self, on: bool) -> Self {
        self.field(FIELD_ACKNOWLEDGEMENT, on)
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn env(mut self, env: &str) -> Self {
        self.env = Some(env.to_string());
        self
    }

    pub fn build(self) -> Delta {
        Delta {
            env: self.env,
            host: self.host,
            service: self.service,
            attrs: self.attrs,
            id: self.id,
        }
    }

    pub fn json(self) -> String {
        serde_json::to_string(&self.build()).unwrap_or_default()
    }
}
