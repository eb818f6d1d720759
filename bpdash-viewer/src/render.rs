/*!
Plain-text rendering for the terminal.
*/

use crate::mirror::MirrorEntry;
use crate::notify::{Notification, NotificationKind};
use crate::panel::{BpPanel, TimelinePanel};
use bpdash_core::{DisplayFrame, FrameStatus, ObjectKey};
use std::fmt::Write;

pub fn glyph(status: FrameStatus) -> char {
    match status {
        FrameStatus::Ok => '=',
        FrameStatus::Nok => '#',
        FrameStatus::Unknown => '?',
        FrameStatus::Inexisting => '.',
    }
}

/// Splits `width` cells among `weights` proportionally. Largest remainder:
/// floors first, then the leftover cells go to the biggest fractional parts
/// (earliest first on ties), so the counts always add up to `width`.
///
/// When the bar is wide enough, every positive weight gets at least one
/// cell, taken from the most over-served frame that can spare one.
pub fn cell_counts(weights: &[f64], width: usize) -> Vec<usize> {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if weights.is_empty() || total <= 0.0 {
        return vec![0; weights.len()];
    }

    let exact: Vec<f64> = weights
        .iter()
        .map(|w| w.max(0.0) / total * width as f64)
        .collect();
    let mut counts: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let assigned: usize = counts.iter().sum();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });
    for &i in order.iter().take(width.saturating_sub(assigned)) {
        counts[i] += 1;
    }

    let visible = weights.iter().filter(|w| **w > 0.0).count();
    if width >= visible {
        for i in 0..weights.len() {
            if weights[i] <= 0.0 || counts[i] > 0 {
                continue;
            }
            let over = |j: usize| counts[j] as f64 - exact[j];
            let donor = (0..weights.len())
                .filter(|&j| counts[j] > 1)
                .max_by(|&a, &b| over(a).total_cmp(&over(b)).then(b.cmp(&a)));
            if let Some(j) = donor {
                counts[j] -= 1;
                counts[i] += 1;
            }
        }
    }
    counts
}

pub fn render_bar(frames: &[DisplayFrame], width: usize) -> String {
    let weights: Vec<f64> = frames.iter().map(|f| f.display_percent).collect();
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    if frames.is_empty() {
        bar.push_str(&" ".repeat(width));
    }
    for (frame, cells) in frames.iter().zip(cell_counts(&weights, width)) {
        bar.extend(std::iter::repeat(glyph(frame.status)).take(cells));
    }
    bar.push(']');
    bar
}

fn render_timeline(out: &mut String, panel: &TimelinePanel, width: usize, indent: &str) {
    let _ = writeln!(out, "{indent}{} ({})  {}", panel.name, panel.id, panel.availability_label());
    let _ = writeln!(out, "{indent}{}", render_bar(&panel.frames, width));
}

pub fn render_bp(bp: &BpPanel, width: usize) -> String {
    let mut out = String::new();
    render_timeline(&mut out, &bp.panel, width, "");
    if !bp.panel.interruptions.is_empty() {
        let _ = writeln!(out, "  interruptions:");
        for i in &bp.panel.interruptions {
            let _ = writeln!(
                out,
                "    {}  {:>8}  {}  [{}]",
                i.start_label(),
                i.duration_label(),
                i.annotation,
                i.event_id
            );
        }
    }
    for kpi in &bp.kpis {
        render_timeline(&mut out, kpi, width, "  ");
    }
    out
}

pub fn render_object(key: &ObjectKey, entry: &MirrorEntry) -> String {
    let flags: Vec<&str> = entry.view.flag_classes.iter().copied().collect();
    format!(
        "{:<40} {:<8} ({}) {}",
        key.to_string(),
        entry.view.label,
        entry.view.status_class,
        flags.join(" ")
    )
}

pub fn render_notification(n: &Notification) -> String {
    let tag = match n.kind {
        NotificationKind::Fetch => "fetch",
        NotificationKind::Protocol => "protocol",
        NotificationKind::ChannelClosed => "closed",
        NotificationKind::Validation => "invalid",
        NotificationKind::Unconfirmed => "unconfirmed",
    };
    match &n.payload {
        Some(raw) => format!("!{} [{tag}] {}\n    {raw}", n.id, n.message),
        None => format!("!{} [{tag}] {}", n.id, n.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpdash_core::{display_frames, ObjectState};
    use bpdash_devkit::TimelineBuilder;

    #[test]
    fn test_cell_counts_fill_width() {
        let counts = cell_counts(&[0.25, 0.25, 40.0, 59.5], 60);
        assert_eq!(counts.iter().sum::<usize>(), 60);
        assert_eq!(counts, vec![1, 1, 23, 35]);

        let thirds = cell_counts(&[1.0, 1.0, 1.0], 10);
        assert_eq!(thirds, vec![4, 3, 3]);
        assert_eq!(cell_counts(&[], 10), Vec::<usize>::new());
        assert_eq!(cell_counts(&[0.0, 0.0], 10), vec![0, 0]);
        assert_eq!(cell_counts(&[0.0, 100.0], 4), vec![0, 4]);
        // too narrow to show every frame
        assert_eq!(cell_counts(&[1.0, 1.0, 98.0], 2), vec![0, 0, 2]);
    }

    #[test]
    fn test_tiny_frame_keeps_a_cell() {
        let frames = display_frames(&TimelineBuilder::from_percents(&[(0, 99.95), (1, 0.05)]));
        let bar = render_bar(&frames, 60);
        assert_eq!(bar.chars().filter(|c| *c == '#').count(), 1);
        assert_eq!(bar.chars().count(), 62);
    }

    #[test]
    fn test_bar_uses_one_glyph_per_status() {
        let frames = display_frames(&TimelineBuilder::from_percents(&[(0, 50.0), (1, 25.0), (9, 25.0)]));
        assert_eq!(render_bar(&frames, 8), "[====##..]");
        assert_eq!(render_bar(&[], 4), "[    ]");

        let mixed = display_frames(&TimelineBuilder::new().ok(40).unknown(10).inexisting(10).build());
        assert_eq!(render_bar(&mixed, 6), "[====?.]");
    }

    #[test]
    fn test_object_line() {
        let key = ObjectKey::new("web01", "http");
        let entry = MirrorEntry::new(ObjectState {
            downtime: true,
            ..ObjectState::default()
        });
        let line = render_object(&key, &entry);
        assert!(line.starts_with("web01!http"));
        assert!(line.contains("ok"));
        assert!(line.contains("ack-off downtime-on"));
    }
}
