// src/parse/duration.rs

//! Lenient duration parsing and Go-compatible duration formatting.

use std::time::Duration;

const UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("us", 1e-6),
    ("µs", 1e-6),
    ("μs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
];

/// Parse a duration as printed by the test tool (`0.01s`, `(1.20s)`,
/// `150ms`, `1m2.5s`).
///
/// Never fails: empty, negative or malformed text yields zero.
pub fn parse_duration(text: &str) -> Duration {
    let trimmed = text.trim().trim_start_matches('(').trim_end_matches(')').trim();
    if trimmed.is_empty() {
        return Duration::ZERO;
    }

    parse_compound(trimmed)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(Duration::ZERO)
}

/// Strict variant for configuration values: `None` instead of zero when
/// the text is not a well-formed duration.
pub fn parse_duration_strict(text: &str) -> Option<Duration> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_compound(trimmed)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Elapsed seconds from a JSON event; same leniency as [`parse_duration`].
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

fn parse_compound(mut s: &str) -> Option<f64> {
    let mut total = 0.0;

    while !s.is_empty() {
        let num_len = s
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = s[..num_len].parse().ok()?;
        s = &s[num_len..];

        // Longest unit first so "ms" is not read as "m".
        let (unit, scale) = UNITS
            .iter()
            .filter(|(u, _)| s.starts_with(u))
            .max_by_key(|(u, _)| u.len())?;
        total += value * scale;
        s = &s[unit.len()..];
    }

    Some(total)
}

/// Render a duration the way Go's `time.Duration.String` does, so the
/// `-timeout=` flag is stable across runs (`30s`, `1m30s`, `250ms`).
pub fn format_go_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }

    if d < Duration::from_secs(1) {
        let nanos = u64::from(d.subsec_nanos());
        return if nanos >= 1_000_000 {
            format!("{}ms", fraction(nanos, 1_000_000))
        } else if nanos >= 1_000 {
            format!("{}µs", fraction(nanos, 1_000))
        } else {
            format!("{nanos}ns")
        };
    }

    let secs = d.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let sec_nanos = (secs % 60) * 1_000_000_000 + u64::from(d.subsec_nanos());

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h{minutes}m"));
    } else if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&fraction(sec_nanos, 1_000_000_000));
    out.push('s');
    out
}

/// `value / unit` as a decimal with trailing zeros trimmed.
fn fraction(value: u64, unit: u64) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{rem:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_durations() {
        assert_eq!(parse_duration("0.01s"), Duration::from_millis(10));
        assert_eq!(parse_duration("(1.50s)"), Duration::from_millis(1500));
        assert_eq!(parse_duration("150ms"), Duration::from_millis(150));
        assert_eq!(parse_duration("1m2.5s"), Duration::from_millis(62_500));
    }

    #[test]
    fn malformed_durations_fall_back_to_zero() {
        assert_eq!(parse_duration(""), Duration::ZERO);
        assert_eq!(parse_duration("()"), Duration::ZERO);
        assert_eq!(parse_duration("abc"), Duration::ZERO);
        assert_eq!(parse_duration("1.2.3s"), Duration::ZERO);
        assert_eq!(parse_duration("12"), Duration::ZERO);
        assert_eq!(parse_duration("-1s"), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs(-3.0), Duration::ZERO);
    }

    #[test]
    fn strict_parse_rejects_instead_of_zeroing() {
        assert_eq!(parse_duration_strict("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration_strict("0s"), Some(Duration::ZERO));
        assert_eq!(parse_duration_strict("soon"), None);
        assert_eq!(parse_duration_strict(""), None);
    }

    #[test]
    fn formats_like_go() {
        assert_eq!(format_go_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_go_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_go_duration(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_go_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_go_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_go_duration(Duration::ZERO), "0s");
    }
}
