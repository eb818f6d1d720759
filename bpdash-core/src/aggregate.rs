use crate::frame::FrameModel;
use crate::status::FrameStatus;
use std::collections::BTreeMap;

/// Reduction of one timeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregate {
    pub per_status: BTreeMap<FrameStatus, f64>,
    /// `ok` share rounded to 3 decimals. `None` when no frame is `ok`, which
    /// is not the same as 0% available.
    pub availability: Option<f64>,
}

impl Aggregate {
    pub fn percent(&self, status: FrameStatus) -> Option<f64> {
        self.per_status.get(&status).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.per_status.is_empty()
    }
}

/// Accumulates every frame's `duration_percent` into the bucket of its status.
///
/// Each bucket is summed in ascending order of its contributions, so two
/// timelines holding the same (status, percent) pairs in a different order
/// give bit-identical results.
pub fn aggregate(frames: &[FrameModel]) -> Aggregate {
    let mut buckets: BTreeMap<FrameStatus, Vec<f64>> = BTreeMap::new();
    for frame in frames {
        buckets.entry(frame.status).or_default().push(frame.duration_percent);
    }

    let per_status: BTreeMap<FrameStatus, f64> = buckets
        .into_iter()
        .map(|(status, mut parts)| {
            parts.sort_by(f64::total_cmp);
            (status, parts.iter().sum())
        })
        .collect();

    let availability = per_status.get(&FrameStatus::Ok).copied().map(round3);
    Aggregate {
        per_status,
        availability,
    }
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
