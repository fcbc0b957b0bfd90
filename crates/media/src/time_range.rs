//! Half-open time ranges in seconds.

use serde::{Deserialize, Serialize};

use reelkit_common::error::{ReelkitError, ReelkitResult};

/// Relative tolerance applied to `duration / clip_length` when counting
/// clips. A remainder shorter than `CLIP_COUNT_EPSILON * clip_length` is
/// folded into the last clip instead of producing a sliver clip.
pub const CLIP_COUNT_EPSILON: f64 = 1e-9;

/// Upper bound on the number of clips a single split may produce.
pub const MAX_CLIPS: usize = 100_000;

/// An active `[start, end)` interval of an asset, in seconds.
///
/// Always satisfies `0 <= start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: f64,
    end: f64,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: f64,
    end: f64,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = ReelkitError;

    fn try_from(raw: RawTimeRange) -> Result<Self, Self::Error> {
        TimeRange::new(raw.start, raw.end)
    }
}

impl TimeRange {
    /// Build a range, rejecting `start < 0`, `start >= end` and non-finite bounds.
    pub fn new(start: f64, end: f64) -> ReelkitResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(ReelkitError::configuration(format!(
                "time range bounds must be finite (got {start}..{end})"
            )));
        }
        if start < 0.0 {
            return Err(ReelkitError::configuration(format!(
                "time range start must not be negative (got {start})"
            )));
        }
        if start >= end {
            return Err(ReelkitError::configuration(format!(
                "time range start must be before end (got {start}..{end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Length of the range in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, secs: f64) -> bool {
        secs >= self.start && secs < self.end
    }

    /// Clamp a position into `[start, end]`.
    pub fn clamp(&self, secs: f64) -> f64 {
        secs.clamp(self.start, self.end)
    }

    /// Partition the range into contiguous clips of `clip_length` seconds.
    ///
    /// Clip `i` covers `[start + i*L, min(start + (i+1)*L, end))`; only the
    /// last clip may be shorter. A clip length at or above the range length
    /// yields the range itself.
    ///
    /// The clip count is `ceil(duration / L - CLIP_COUNT_EPSILON)`, so the
    /// last clip may exceed `L` by at most `CLIP_COUNT_EPSILON * L`. Clip
    /// lengths that would produce more than [`MAX_CLIPS`] clips are rejected.
    pub fn split(&self, clip_length: f64) -> ReelkitResult<Vec<TimeRange>> {
        if !clip_length.is_finite() || clip_length <= 0.0 {
            return Err(ReelkitError::configuration(format!(
                "clip length must be a positive number of seconds (got {clip_length})"
            )));
        }

        let count = ((self.duration() / clip_length) - CLIP_COUNT_EPSILON)
            .ceil()
            .max(1.0);
        if !count.is_finite() || count > MAX_CLIPS as f64 {
            return Err(ReelkitError::configuration(format!(
                "clip length {clip_length}s splits {self} into too many clips (limit {MAX_CLIPS})"
            )));
        }
        let count = count as usize;

        let clips = (0..count)
            .map(|i| {
                let start = self.start + i as f64 * clip_length;
                let end = if i + 1 == count {
                    self.end
                } else {
                    (self.start + (i + 1) as f64 * clip_length).min(self.end)
                };
                TimeRange { start, end }
            })
            .collect();

        Ok(clips)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.3}s, {:.3}s)", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bounds(ranges: &[TimeRange]) -> Vec<(f64, f64)> {
        ranges.iter().map(|r| (r.start(), r.end())).collect()
    }

    #[test]
    fn test_rejects_inverted_and_negative_ranges() {
        assert!(TimeRange::new(5.0, 5.0).is_err());
        assert!(TimeRange::new(6.0, 5.0).is_err());
        assert!(TimeRange::new(-1.0, 5.0).is_err());
        assert!(TimeRange::new(0.0, f64::INFINITY).is_err());
        assert!(TimeRange::new(0.0, 0.001).is_ok());
    }

    #[test]
    fn test_split_sample_video_into_fifteen_second_clips() {
        let range = TimeRange::new(0.0, 29.568).unwrap();
        let clips = range.split(15.0).unwrap();
        assert_eq!(bounds(&clips), vec![(0.0, 15.0), (15.0, 29.568)]);
    }

    #[test]
    fn test_split_exact_multiple() {
        let range = TimeRange::new(0.0, 30.0).unwrap();
        let clips = range.split(10.0).unwrap();
        assert_eq!(
            bounds(&clips),
            vec![(0.0, 10.0), (10.0, 20.0), (20.0, 30.0)]
        );
    }

    #[test]
    fn test_split_offset_range_and_oversized_clip() {
        let range = TimeRange::new(5.0, 12.0).unwrap();
        assert_eq!(
            bounds(&range.split(3.0).unwrap()),
            vec![(5.0, 8.0), (8.0, 11.0), (11.0, 12.0)]
        );
        assert_eq!(bounds(&range.split(7.0).unwrap()), vec![(5.0, 12.0)]);
        assert_eq!(bounds(&range.split(100.0).unwrap()), vec![(5.0, 12.0)]);
    }

    #[test]
    fn test_split_rejects_non_positive_clip_length() {
        let range = TimeRange::new(0.0, 10.0).unwrap();
        for bad in [0.0, -3.0, f64::NAN] {
            let err = range.split(bad).unwrap_err();
            assert!(matches!(err, ReelkitError::Configuration { .. }));
        }
    }

    #[test]
    fn test_split_rejects_clip_lengths_that_explode_the_count() {
        let range = TimeRange::new(0.0, 30.0).unwrap();
        for tiny in [1e-300, 1e-9, f64::MIN_POSITIVE] {
            let err = range.split(tiny).unwrap_err();
            assert!(matches!(err, ReelkitError::Configuration { .. }));
        }
        let at_limit = 30.0 / MAX_CLIPS as f64;
        assert!(range.split(at_limit).unwrap().len() <= MAX_CLIPS);
    }

    #[test]
    fn test_split_folds_sub_tolerance_remainder_into_last_clip() {
        let range = TimeRange::new(0.0, 10.000000001).unwrap();
        assert_eq!(bounds(&range.split(10.0).unwrap()), vec![(0.0, 10.000000001)]);

        let range = TimeRange::new(0.0, 10.001).unwrap();
        assert_eq!(
            bounds(&range.split(10.0).unwrap()),
            vec![(0.0, 10.0), (10.0, 10.001)]
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: TimeRange = serde_json::from_str(r#"{"start":1.0,"end":2.5}"#).unwrap();
        assert_eq!(ok.duration(), 1.5);
        assert!(serde_json::from_str::<TimeRange>(r#"{"start":3.0,"end":2.0}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_split_partitions_range(
            duration in 0.01f64..600.0,
            clip_length in 0.01f64..120.0,
        ) {
            let range = TimeRange::new(0.0, duration).unwrap();
            let clips = range.split(clip_length).unwrap();

            let expected = ((duration / clip_length) - CLIP_COUNT_EPSILON).ceil().max(1.0) as usize;
            prop_assert_eq!(clips.len(), expected);
            prop_assert_eq!(clips[0].start(), 0.0);
            prop_assert_eq!(clips[clips.len() - 1].end(), duration);

            for pair in clips.windows(2) {
                prop_assert_eq!(pair[0].end(), pair[1].start());
            }
            for clip in &clips[..clips.len() - 1] {
                prop_assert!((clip.duration() - clip_length).abs() < 1e-6);
            }
            let last = clips[clips.len() - 1];
            prop_assert!(last.duration() > 0.0);
            prop_assert!(last.duration() <= clip_length * (1.0 + CLIP_COUNT_EPSILON) + 1e-9);
        }
    }
}
