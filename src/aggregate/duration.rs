//! Human readable duration breakdown.

const MS_PER_SEC: u64 = 1_000;
const MS_PER_MIN: u64 = 60 * MS_PER_SEC;
const MS_PER_HOUR: u64 = 60 * MS_PER_MIN;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Format nanoseconds as e.g. `"1 hour and 1 min and 1 sec"`.
///
/// Sub-millisecond remainders are dropped and zero-valued units are omitted;
/// a zero duration prints `"0 ms"`.
pub fn format_duration(duration_ns: u64) -> String {
    let mut remaining = duration_ns / 1_000_000;
    let units = [
        (MS_PER_DAY, "day", "days"),
        (MS_PER_HOUR, "hour", "hours"),
        (MS_PER_MIN, "min", "mins"),
        (MS_PER_SEC, "sec", "secs"),
        (1, "ms", "ms"),
    ];
    let mut parts = Vec::new();
    for (size, singular, plural) in units {
        let value = remaining / size;
        remaining %= size;
        if value == 0 {
            continue;
        }
        let label = if value == 1 { singular } else { plural };
        parts.push(format!("{value} {label}"));
    }
    if parts.is_empty() {
        return "0 ms".to_string();
    }
    parts.join(" and ")
}
