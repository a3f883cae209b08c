//! Segment selection — the `[start, end)` range used for cropping and
//! bounded preview.
//!
//! Invalid selections are never raised as errors. A drag that leaves the
//! clip is pulled back into range by [`constrain_drag`], and clicking an
//! invalid segment is ignored.

use serde::{Deserialize, Serialize};

use crate::params::{BitRate, OutputFormat};

pub const DEFAULT_SEGMENT_ID: &str = "default-segment";
pub const DEFAULT_SEGMENT_LABEL: &str = "Crop range";

/// A selected time range on the clip, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default = "default_editable")]
    pub editable: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

fn default_editable() -> bool {
    true
}

impl Segment {
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Segment { start_time, end_time, editable: true, label: None, id: None }
    }

    pub fn length(&self) -> f64 {
        self.end_time - self.start_time
    }

    fn with_bounds(&self, start_time: f64, end_time: f64) -> Self {
        Segment { start_time, end_time, ..self.clone() }
    }
}

/// True iff `0 <= start < end <= duration` and neither bound is NaN.
pub fn validate(segment: &Segment, duration: f64) -> bool {
    let (s, e) = (segment.start_time, segment.end_time);
    !s.is_nan() && !e.is_nan() && s >= 0.0 && e > s && e <= duration
}

/// Pull a proposed segment back into `[0, duration]` with at least some
/// length. Returns `None` when there is no clip to constrain against.
///
/// The result always satisfies [`validate`].
pub fn constrain_drag(proposed: &Segment, duration: f64, min_length: f64) -> Option<Segment> {
    if !duration.is_finite() || duration <= 0.0 {
        return None;
    }
    let min_length = if min_length.is_finite() && min_length > 0.0 { min_length.min(duration) } else { 0.1_f64.min(duration) };

    let mut start = if proposed.start_time.is_nan() { 0.0 } else { proposed.start_time };
    let mut end = if proposed.end_time.is_nan() { duration } else { proposed.end_time };

    start = start.max(0.0);
    // A start at or past the end leaves no room for any selection
    if start >= duration {
        start = duration - min_length;
    }
    end = end.min(duration);
    if end <= start {
        end = (start + min_length).min(duration);
    }
    Some(proposed.with_bounds(start, end))
}

/// Tracks the clip duration and the committed selection.
#[derive(Debug, Clone)]
pub struct SegmentManager {
    duration: f64,
    selected: Option<Segment>,
    default_length: f64,
    min_length: f64,
}

impl SegmentManager {
    pub fn new(default_length: f64, min_length: f64) -> Self {
        SegmentManager { duration: 0.0, selected: None, default_length, min_length }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn selected(&self) -> Option<&Segment> {
        self.selected.as_ref()
    }

    /// The selection, but only while it is valid for the current duration.
    pub fn valid_selection(&self) -> Option<&Segment> {
        self.selected.as_ref().filter(|s| validate(s, self.duration))
    }

    /// New clip loaded: replace the selection with the default range
    /// `[0, min(default_length, duration)]`, or clear it when the clip has
    /// no usable duration.
    pub fn reset(&mut self, duration: f64) -> Option<&Segment> {
        self.duration = if duration.is_finite() && duration > 0.0 { duration } else { 0.0 };
        self.selected = (self.duration > 0.0).then(|| Segment {
            start_time: 0.0,
            end_time: self.default_length.min(self.duration),
            editable: true,
            label: Some(DEFAULT_SEGMENT_LABEL.to_string()),
            id: Some(DEFAULT_SEGMENT_ID.to_string()),
        });
        self.selected.as_ref()
    }

    pub fn clear(&mut self) {
        self.duration = 0.0;
        self.selected = None;
    }

    /// Commit `segment` if it is valid; otherwise leave the selection alone.
    pub fn select(&mut self, segment: Segment) -> bool {
        if validate(&segment, self.duration) {
            self.selected = Some(segment);
            true
        } else {
            false
        }
    }

    /// Correct an in-progress drag. The selection is not changed.
    pub fn drag(&self, proposed: &Segment) -> Option<Segment> {
        constrain_drag(proposed, self.duration, self.min_length)
    }

    /// Finish a drag: correct once more and commit.
    pub fn end_drag(&mut self, proposed: &Segment) -> Option<&Segment> {
        let corrected = self.drag(proposed)?;
        self.select(corrected);
        self.selected.as_ref()
    }
}

/// `MM:SS`, truncating fractional seconds.
pub fn format_time(secs: f64) -> String {
    let secs = if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
    let minutes = (secs / 60.0).floor() as u64;
    let seconds = (secs % 60.0).floor() as u64;
    format!("{minutes:02}:{seconds:02}")
}

/// `MM:SS.mmm`. NaN and negative inputs render as `00:00.000`.
pub fn format_time_precise(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "00:00.000".to_string();
    }
    let whole = secs.floor();
    let mut total = whole as u64;
    let mut millis = ((secs - whole) * 1000.0).round() as u64;
    if millis >= 1000 {
        total += 1;
        millis -= 1000;
    }
    format!("{:02}:{:02}.{millis:03}", total / 60, total % 60)
}

/// Export name. Cropped exports encode the bounds and the quality label;
/// the extension is always `.wav` because that is what gets written.
pub fn crop_file_name(segment: Option<&Segment>, format: OutputFormat, bit_rate: BitRate) -> String {
    match segment {
        Some(seg) => format!(
            "cropped_audio_{}-{}_{}.wav",
            format_time(seg.start_time),
            format_time(seg.end_time),
            bit_rate.quality_label(format)
        ),
        None => "processed_audio.wav".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64) -> Segment {
        Segment::new(start, end)
    }

    #[test]
    fn validation_rules() {
        assert!(validate(&seg(0.0, 2.0), 10.0));
        assert!(validate(&seg(9.0, 10.0), 10.0));
        assert!(!validate(&seg(-0.1, 2.0), 10.0));
        assert!(!validate(&seg(2.0, 2.0), 10.0));
        assert!(!validate(&seg(1.0, 10.5), 10.0));
        assert!(!validate(&seg(f64::NAN, 1.0), 10.0));
    }

    #[test]
    fn drag_past_bounds_is_clamped() {
        let fixed = constrain_drag(&seg(-1.0, 12.0), 10.0, 0.1).unwrap();
        assert_eq!((fixed.start_time, fixed.end_time), (0.0, 10.0));
    }

    #[test]
    fn inverted_drag_gets_minimum_length() {
        let fixed = constrain_drag(&seg(4.0, 3.0), 10.0, 0.1).unwrap();
        assert_eq!(fixed.start_time, 4.0);
        assert!((fixed.end_time - 4.1).abs() < 1e-12);
    }

    #[test]
    fn start_near_the_end_is_kept() {
        for end in [10.0, 9.0] {
            let fixed = constrain_drag(&seg(9.95, end), 10.0, 0.1).unwrap();
            assert_eq!(fixed.start_time, 9.95, "start moved for end {end}");
            assert_eq!(fixed.end_time, 10.0);
        }
    }

    #[test]
    fn drag_at_the_end_stays_valid() {
        let fixed = constrain_drag(&seg(10.0, 10.0), 10.0, 0.1).unwrap();
        assert!(validate(&fixed, 10.0), "got {fixed:?}");
        let fixed = constrain_drag(&seg(25.0, 30.0), 10.0, 0.1).unwrap();
        assert!(validate(&fixed, 10.0), "got {fixed:?}");
    }

    #[test]
    fn constrain_always_validates() {
        let probes = [-5.0, -0.0, 0.0, 0.05, 1.0, 4.99, 5.0, 7.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY];
        for duration in [0.05, 0.1, 1.0, 5.0] {
            for &s in &probes {
                for &e in &probes {
                    let fixed = constrain_drag(&seg(s, e), duration, 0.1).unwrap();
                    assert!(validate(&fixed, duration), "({s}, {e}) in {duration} gave {fixed:?}");
                }
            }
        }
    }

    #[test]
    fn no_duration_means_nothing_to_constrain() {
        assert!(constrain_drag(&seg(0.0, 1.0), 0.0, 0.1).is_none());
        assert!(constrain_drag(&seg(0.0, 1.0), f64::NAN, 0.1).is_none());
    }

    #[test]
    fn manager_default_segment() {
        let mut m = SegmentManager::new(2.0, 0.1);
        let s = m.reset(10.0).unwrap();
        assert_eq!((s.start_time, s.end_time), (0.0, 2.0));
        assert_eq!(s.id.as_deref(), Some(DEFAULT_SEGMENT_ID));
        let s = m.reset(1.25).unwrap().clone();
        assert_eq!(s.end_time, 1.25);
        assert!(m.reset(0.0).is_none());
    }

    #[test]
    fn manager_ignores_invalid_clicks() {
        let mut m = SegmentManager::new(2.0, 0.1);
        m.reset(10.0);
        assert!(!m.select(seg(3.0, 11.0)));
        assert_eq!(m.selected().unwrap().end_time, 2.0);
        assert!(m.select(seg(3.0, 4.0)));
        assert_eq!(m.selected().unwrap().start_time, 3.0);
    }

    #[test]
    fn manager_drag_commits_only_at_end() {
        let mut m = SegmentManager::new(2.0, 0.1);
        m.reset(10.0);
        let preview = m.drag(&seg(8.0, 14.0)).unwrap();
        assert_eq!(preview.end_time, 10.0);
        assert_eq!(m.selected().unwrap().start_time, 0.0, "drag must not commit");
        let committed = m.end_drag(&seg(8.0, 14.0)).unwrap();
        assert_eq!((committed.start_time, committed.end_time), (8.0, 10.0));
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(65.9), "01:05");
        assert_eq!(format_time(f64::NAN), "00:00");
        assert_eq!(format_time_precise(65.25), "01:05.250");
        assert_eq!(format_time_precise(-1.0), "00:00.000");
        assert_eq!(format_time_precise(f64::NAN), "00:00.000");
        assert_eq!(format_time_precise(1.9996), "00:02.000");
    }

    #[test]
    fn file_names() {
        let br = BitRate::new(160).unwrap();
        let name = crop_file_name(Some(&seg(1.0, 5.0)), OutputFormat::Opus, br);
        assert_eq!(name, "cropped_audio_00:01-00:05_160kbps.wav");
        let wav = crop_file_name(Some(&seg(61.0, 75.5)), OutputFormat::Wav, BitRate::new(32).unwrap());
        assert_eq!(wav, "cropped_audio_01:01-01:15_32bit.wav");
        assert_eq!(crop_file_name(None, OutputFormat::Mp3, br), "processed_audio.wav");
    }

    #[test]
    fn segment_json_is_camel_case() {
        let s: Segment = serde_json::from_str(r#"{"startTime": 1.5, "endTime": 3}"#).unwrap();
        assert_eq!(s, seg(1.5, 3.0));
        assert!(s.editable);
    }
}
