/*!
Display fairness for timeline bars.

A frame covering a few seconds of a month would vanish on a fixed-width bar.
Before rendering, every frame below `MIN_DISPLAY_PERCENT` borrows exactly that
amount from the first frame (in timeline order) holding more than twice the
minimum. One left-to-right pass, at most one transfer per deficient frame:

- a donor that drops under the minimum after donating is not revisited
- a large frame may donate to several recipients in the same pass
- a deficient frame with no eligible donor stays deficient

Only `display_percent` moves; `duration_percent` keeps the measured value for
tooltips. Every transfer is balanced so the total weight is unchanged.
*/

use crate::frame::FrameModel;
use crate::status::FrameStatus;
use time::macros::format_description;
use time::OffsetDateTime;

pub const MIN_DISPLAY_PERCENT: f64 = 0.2;

/// Rendering view of one frame, rebuilt on every render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    pub status: FrameStatus,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub duration_percent: f64,
    pub display_percent: f64,
    pub annotation: Option<String>,
    pub tooltip: String,
}

impl DisplayFrame {
    pub fn from_frame(frame: &FrameModel) -> Self {
        Self {
            status: frame.status,
            start: frame.start,
            end: frame.end,
            duration_percent: frame.duration_percent,
            display_percent: frame.duration_percent,
            annotation: frame.annotation.clone(),
            tooltip: tooltip(frame),
        }
    }
}

/// Display frames for a timeline with fairness already applied.
pub fn display_frames(frames: &[FrameModel]) -> Vec<DisplayFrame> {
    let mut out: Vec<DisplayFrame> = frames.iter().map(DisplayFrame::from_frame).collect();
    adjust(&mut out);
    out
}

/// Applies the redistribution to `display_percent` in place.
pub fn adjust(frames: &mut [DisplayFrame]) {
    let mut weights: Vec<f64> = frames.iter().map(|f| f.display_percent).collect();
    redistribute(&mut weights, MIN_DISPLAY_PERCENT);
    for (frame, weight) in frames.iter_mut().zip(weights) {
        frame.display_percent = weight;
    }
}

/// The single-pass donor/recipient move on raw weights. Returns the number of
/// transfers made.
pub fn redistribute(weights: &mut [f64], min: f64) -> usize {
    let mut transfers = 0;
    for i in 0..weights.len() {
        if weights[i] >= min {
            continue;
        }
        if let Some(j) = weights.iter().position(|&w| w > 2.0 * min) {
            weights[j] -= min;
            weights[i] += min;
            transfers += 1;
        }
    }
    transfers
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default()
}

fn tooltip(frame: &FrameModel) -> String {
    let mut text = format!(
        "{} from {} to {} ({:.3}%)",
        frame.status,
        format_timestamp(frame.start),
        format_timestamp(frame.end),
        frame.duration_percent
    );
    if let Some(annotation) = &frame.annotation {
        text.push_str(": ");
        text.push_str(annotation);
    }
    text
}
