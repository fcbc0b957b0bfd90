//! Time formatting and emission pacing.
//!
//! - Human-readable playback positions (`m:ss` / `h:mm:ss`)
//! - A throttle for callbacks that must not fire faster than a target rate

/// Format a position in seconds as `m:ss`, or `h:mm:ss` from one hour up.
///
/// Negative and non-finite inputs format as zero; fractions are truncated.
pub fn format_time_string(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Format the remaining time as `-m:ss`.
pub fn format_time_left(duration_secs: f64, current_secs: f64) -> String {
    format!("-{}", format_time_string(duration_secs - current_secs))
}

/// Convert seconds to nanoseconds.
pub fn secs_to_ns(secs: f64) -> u64 {
    (secs.max(0.0) * 1_000_000_000.0) as u64
}

/// Convert nanoseconds to seconds.
pub fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / 1_000_000_000.0
}

/// Caps how often a periodic report is emitted.
#[derive(Debug)]
pub struct EmitThrottle {
    min_interval_ns: u64,
    last_emit_ns: Option<u64>,
}

impl EmitThrottle {
    /// Create a throttle allowing at most `max_hz` emissions per second.
    /// Zero disables throttling.
    pub fn new(max_hz: u32) -> Self {
        Self {
            min_interval_ns: if max_hz == 0 {
                0
            } else {
                1_000_000_000 / max_hz as u64
            },
            last_emit_ns: None,
        }
    }

    /// Returns true and records the emission if enough time has passed.
    /// The first call always returns true.
    pub fn should_emit(&mut self, now_ns: u64) -> bool {
        match self.last_emit_ns {
            None => {
                self.last_emit_ns = Some(now_ns);
                true
            }
            Some(last) if now_ns >= last + self.min_interval_ns => {
                self.last_emit_ns = Some(now_ns);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_under_an_hour() {
        assert_eq!(format_time_string(0.0), "0:00");
        assert_eq!(format_time_string(5.9), "0:05");
        assert_eq!(format_time_string(29.568), "0:29");
        assert_eq!(format_time_string(754.0), "12:34");
    }

    #[test]
    fn test_format_hours_and_clamping() {
        assert_eq!(format_time_string(3723.0), "1:02:03");
        assert_eq!(format_time_string(-4.0), "0:00");
        assert_eq!(format_time_string(f64::NAN), "0:00");
        assert_eq!(format_time_left(30.0, 12.5), "-0:17");
        assert_eq!(format_time_left(10.0, 12.0), "-0:00");
    }

    #[test]
    fn test_ns_conversion() {
        assert_eq!(secs_to_ns(2.0), 2_000_000_000);
        assert!((ns_to_secs(1_500_000_000) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_emit_throttle() {
        let mut throttle = EmitThrottle::new(10);
        assert!(throttle.should_emit(0));
        assert!(!throttle.should_emit(50_000_000));
        assert!(throttle.should_emit(100_000_000));

        let mut unthrottled = EmitThrottle::new(0);
        assert!(unthrottled.should_emit(7));
        assert!(unthrottled.should_emit(7));
    }
}
