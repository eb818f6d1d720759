/**
 * FILE TIMELINE STORE - JSON-backed TimelineSource
 *
 * The whole catalog lives in memory behind a mutex and is written back to
 * disk after every annotation. A missing file starts an empty catalog.
 */

use super::{BusinessProcessRecord, EventRecord, TimelineCatalog, TimelineError, TimelineSource};
use bpdash_core::frame::{is_well_formed, sort_timeline, total_percent};
use bpdash_core::{FrameModel, FrameStatus};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct FileTimelineStore {
    storage_path: PathBuf,
    cache: Mutex<TimelineCatalog>,
}

impl FileTimelineStore {
    pub fn new<P: Into<PathBuf>>(storage_path: P) -> Result<Self, TimelineError> {
        let store = Self {
            storage_path: storage_path.into(),
            cache: Mutex::new(TimelineCatalog::new()),
        };
        store.load_from_disk()?;
        info!(target: "timelines", "loaded {} business processes from {}",
            store.cache.lock().len(), store.storage_path.display());
        Ok(store)
    }

    fn load_from_disk(&self) -> Result<(), TimelineError> {
        if !self.storage_path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.storage_path)?;
        let mut catalog: TimelineCatalog = if content.trim().is_empty() {
            TimelineCatalog::new()
        } else {
            serde_json::from_str(&content)?
        };
        for (id, bp) in catalog.iter_mut() {
            prepare_timeline(id, &mut bp.frames);
            for (kpi_id, kpi) in bp.kpis.iter_mut() {
                prepare_timeline(&format!("{id}/{kpi_id}"), &mut kpi.frames);
            }
        }
        *self.cache.lock() = catalog;
        Ok(())
    }

    fn save_to_disk(&self, catalog: &TimelineCatalog) -> Result<(), TimelineError> {
        if let Some(parent) = self.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(catalog)?;
        fs::write(&self.storage_path, json)?;
        Ok(())
    }

    fn with_bp<T>(&self, bp: &str, f: impl FnOnce(&BusinessProcessRecord) -> T) -> Result<T, TimelineError> {
        let cache = self.cache.lock();
        cache
            .get(bp)
            .map(f)
            .ok_or_else(|| TimelineError::UnknownBusinessProcess(bp.to_string()))
    }
}

impl TimelineSource for FileTimelineStore {
    fn business_processes(&self) -> BTreeMap<String, String> {
        self.cache
            .lock()
            .iter()
            .map(|(id, bp)| (id.clone(), bp.name.clone()))
            .collect()
    }

    fn bp_timeline(&self, bp: &str) -> Result<Vec<FrameModel>, TimelineError> {
        self.with_bp(bp, |record| record.frames.clone())
    }

    fn kpis(&self, bp: &str) -> Result<BTreeMap<String, String>, TimelineError> {
        self.with_bp(bp, |record| {
            record
                .kpis
                .iter()
                .map(|(id, kpi)| (id.clone(), kpi.name.clone()))
                .collect()
        })
    }

    fn kpi_timeline(&self, bp: &str, kpi: &str) -> Result<Vec<FrameModel>, TimelineError> {
        self.with_bp(bp, |record| record.kpis.get(kpi).map(|k| k.frames.clone()))?
            .ok_or_else(|| TimelineError::UnknownKpi {
                bp: bp.to_string(),
                kpi: kpi.to_string(),
            })
    }

    fn annotate(&self, bp: &str, event: &str, text: &str) -> Result<FrameModel, TimelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TimelineError::EmptyAnnotation);
        }

        let mut cache = self.cache.lock();
        // the cache only changes once the new catalog is on disk
        let mut catalog = cache.clone();
        let record = catalog
            .get_mut(bp)
            .ok_or_else(|| TimelineError::UnknownBusinessProcess(bp.to_string()))?;
        let frame = record
            .frames
            .iter_mut()
            .chain(record.kpis.values_mut().flat_map(|kpi| kpi.frames.iter_mut()))
            .find(|frame| frame.event_id() == event)
            .ok_or_else(|| TimelineError::UnknownEvent {
                bp: bp.to_string(),
                event: event.to_string(),
            })?;
        frame.annotation = Some(text.to_string());
        let updated = frame.clone();

        self.save_to_disk(&catalog)?;
        *cache = catalog;
        info!(target: "timelines", "annotated event {event} of {bp}");
        Ok(updated)
    }

    fn unannotated_events(&self, bp: &str) -> Result<Vec<EventRecord>, TimelineError> {
        self.with_bp(bp, |record| {
            let pending = |frame: &&FrameModel| frame.status == FrameStatus::Nok && frame.annotation.is_none();
            let own = record.frames.iter().filter(pending).map(|frame| EventRecord {
                bp: bp.to_string(),
                kpi: None,
                frame: frame.clone(),
            });
            let kpis = record.kpis.iter().flat_map(|(kpi_id, kpi)| {
                kpi.frames.iter().filter(pending).map(move |frame| EventRecord {
                    bp: bp.to_string(),
                    kpi: Some(kpi_id.clone()),
                    frame: frame.clone(),
                })
            });
            own.chain(kpis).collect()
        })
    }
}

/// Sorts a timeline read from disk and warns about overlapping frames or
/// percentages far from 100.
fn prepare_timeline(name: &str, frames: &mut [FrameModel]) {
    sort_timeline(frames);
    if !is_well_formed(frames) {
        warn!(target: "timelines", "timeline {name} has overlapping frames");
    }
    let total = total_percent(frames);
    if !frames.is_empty() && (total - 100.0).abs() > 0.5 {
        warn!(target: "timelines", "timeline {name} covers {total:.3}% instead of 100%");
    }
}
