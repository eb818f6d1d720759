/*!
BP and KPI panels: everything a front end needs to draw one timeline.
*/

use crate::notify::Notifier;
use crate::readmodel::ReadModelClient;
use crate::error::FetchError;
use bpdash_core::fairness::format_timestamp;
use bpdash_core::frame::sort_timeline;
use bpdash_core::{aggregate, display_frames, Aggregate, DisplayFrame, FrameModel, FrameStatus};
use time::{Duration, OffsetDateTime};

/// A `nok` frame listed under its business process.
#[derive(Debug, Clone, PartialEq)]
pub struct Interruption {
    pub event_id: String,
    pub start: OffsetDateTime,
    pub duration: Duration,
    /// Annotation text, `-` when nobody explained the outage yet.
    pub annotation: String,
}

impl Interruption {
    pub fn start_label(&self) -> String {
        format_timestamp(self.start)
    }

    pub fn duration_label(&self) -> String {
        format_duration(self.duration)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePanel {
    pub id: String,
    pub name: String,
    pub is_kpi: bool,
    pub aggregate: Aggregate,
    pub frames: Vec<DisplayFrame>,
    pub interruptions: Vec<Interruption>,
}

impl TimelinePanel {
    pub fn build(id: impl Into<String>, name: impl Into<String>, mut frames: Vec<FrameModel>, is_kpi: bool) -> Self {
        sort_timeline(&mut frames);
        let interruptions = frames
            .iter()
            .filter(|f| f.status == FrameStatus::Nok)
            .map(|f| Interruption {
                event_id: f.event_id(),
                start: f.start,
                duration: f.duration(),
                annotation: f.annotation.clone().unwrap_or_else(|| "-".to_string()),
            })
            .collect();
        Self {
            id: id.into(),
            name: name.into(),
            is_kpi,
            aggregate: aggregate(&frames),
            frames: display_frames(&frames),
            interruptions,
        }
    }

    /// `80.000` for a BP, `~80.000` for a KPI, `no data` without any ok frame.
    pub fn availability_label(&self) -> String {
        match self.aggregate.availability {
            Some(value) if self.is_kpi => format!("~{value:.3}"),
            Some(value) => format!("{value:.3}"),
            None => "no data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BpPanel {
    pub panel: TimelinePanel,
    pub kpis: Vec<TimelinePanel>,
}

impl BpPanel {
    /// Fetches the BP timeline and every KPI timeline. A KPI that fails to
    /// load is reported to `notifier` and left out; a BP that fails is an
    /// error.
    pub async fn load(
        client: &ReadModelClient,
        bp_id: &str,
        name: &str,
        notifier: &mut Notifier,
    ) -> Result<Self, FetchError> {
        let frames = client.bp_timeline(bp_id).await?;
        let mut kpis = Vec::new();
        match client.kpis(bp_id).await {
            Ok(listing) => {
                for (kpi_id, kpi_name) in listing {
                    match client.kpi_timeline(bp_id, &kpi_id).await {
                        Ok(frames) => kpis.push(TimelinePanel::build(kpi_id, kpi_name, frames, true)),
                        Err(e) => {
                            notifier.fetch_failed(&e);
                        }
                    }
                }
            }
            Err(e) => {
                notifier.fetch_failed(&e);
            }
        }
        Ok(Self {
            panel: TimelinePanel::build(bp_id, name, frames, false),
            kpis,
        })
    }
}

/// Sends an annotation and reports any failure to `notifier` instead of
/// returning it. Blank text never reaches the hub.
pub async fn submit_annotation(
    client: &ReadModelClient,
    bp: &str,
    event: &str,
    text: &str,
    notifier: &mut Notifier,
) -> Option<FrameModel> {
    match client.annotate(bp, event, text).await {
        Ok(frame) => Some(frame),
        Err(e) => {
            notifier.failed(&e);
            None
        }
    }
}

fn format_duration(d: Duration) -> String {
    let total = d.whole_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, m) => format!("{m}m"),
        (h, m) => format!("{h}h {m:02}m"),
    }
}
