/**
 * TIMELINE PORT - read and annotate business process timelines
 *
 * A `TimelineSource` owns the BP -> KPI -> frames tree served by the read
 * model. The HTTP layer only talks to the trait; `FileTimelineStore` is the
 * JSON-file implementation used in production.
 */

pub mod file;

pub use file::FileTimelineStore;

use bpdash_core::FrameModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("business process {0} not found")]
    UnknownBusinessProcess(String),
    #[error("kpi {kpi} not found in business process {bp}")]
    UnknownKpi { bp: String, kpi: String },
    #[error("no event {event} in business process {bp}")]
    UnknownEvent { bp: String, event: String },
    #[error("annotation is empty")]
    EmptyAnnotation,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KpiRecord {
    pub name: String,
    #[serde(default)]
    pub frames: Vec<FrameModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessProcessRecord {
    pub name: String,
    #[serde(default)]
    pub frames: Vec<FrameModel>,
    #[serde(default)]
    pub kpis: BTreeMap<String, KpiRecord>,
}

/// bpId -> business process, the on-disk layout of the timelines file.
pub type TimelineCatalog = BTreeMap<String, BusinessProcessRecord>;

/// A `nok` frame still waiting for an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub bp: String,
    /// `None` for frames of the BP timeline itself.
    pub kpi: Option<String>,
    pub frame: FrameModel,
}

pub trait TimelineSource: Send + Sync {
    /// bpId -> display name
    fn business_processes(&self) -> BTreeMap<String, String>;

    /// Frames of one BP, ordered by start.
    fn bp_timeline(&self, bp: &str) -> Result<Vec<FrameModel>, TimelineError>;

    /// kpiId -> display name
    fn kpis(&self, bp: &str) -> Result<BTreeMap<String, String>, TimelineError>;

    fn kpi_timeline(&self, bp: &str, kpi: &str) -> Result<Vec<FrameModel>, TimelineError>;

    /// Sets the annotation of the frame whose event id is `event` and returns
    /// the updated frame. The BP timeline is searched before its KPIs.
    fn annotate(&self, bp: &str, event: &str, text: &str) -> Result<FrameModel, TimelineError>;

    /// Unannotated `nok` frames of the BP and its KPIs, BP frames first.
    fn unannotated_events(&self, bp: &str) -> Result<Vec<EventRecord>, TimelineError>;
}
