//! Time windows over timelines, as requested with `?start=&end=` (unix
//! seconds) on the read model.

use crate::frame::FrameModel;
use time::{Date, Duration, Month, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl TimeWindow {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self { start, end }
    }

    /// One calendar month up to `now`.
    pub fn last_month(now: OffsetDateTime) -> Self {
        Self::new(month_before(now), now)
    }

    /// Bounds that are missing or out of range fall back to the last month
    /// before `now`, each independently.
    pub fn from_unix(start: Option<i64>, end: Option<i64>, now: OffsetDateTime) -> Self {
        let end = end
            .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok())
            .unwrap_or(now);
        let start = start
            .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok())
            .unwrap_or_else(|| month_before(end));
        Self::new(start, end)
    }

    pub fn overlaps(&self, frame: &FrameModel) -> bool {
        frame.end > self.start && frame.start < self.end
    }

    fn contains(&self, frame: &FrameModel) -> bool {
        frame.start >= self.start && frame.end <= self.end
    }

    /// Frames of `frames` overlapping the window.
    ///
    /// When the window cuts or drops any frame, `duration_percent` is
    /// recomputed over the visible part so the result still sums to 100.
    /// Starts and ends are kept as stored, event ids stay valid.
    pub fn select(&self, frames: &[FrameModel]) -> Vec<FrameModel> {
        if frames.iter().all(|f| self.contains(f)) {
            return frames.to_vec();
        }

        let visible: Vec<(FrameModel, Duration)> = frames
            .iter()
            .filter(|f| self.overlaps(f))
            .map(|f| {
                let from = f.start.max(self.start);
                let to = f.end.min(self.end);
                (f.clone(), to - from)
            })
            .collect();
        let total: f64 = visible.iter().map(|(_, d)| d.as_seconds_f64()).sum();

        visible
            .into_iter()
            .map(|(mut frame, length)| {
                frame.duration_percent = if total > 0.0 {
                    100.0 * length.as_seconds_f64() / total
                } else {
                    0.0
                };
                frame
            })
            .collect()
    }
}

// Same wall-clock time one month earlier, clamped to the last day of
// the shorter month (Mar 31 -> Feb 28).
fn month_before(t: OffsetDateTime) -> OffsetDateTime {
    let date = t.date();
    let (year, month) = match date.month() {
        Month::January => (date.year() - 1, Month::December),
        m => (date.year(), m.previous()),
    };
    let day = date.day().min(time::util::days_in_year_month(year, month));
    match Date::from_calendar_date(year, month, day) {
        Ok(d) => t.replace_date(d),
        Err(_) => t - Duration::days(30),
    }
}
