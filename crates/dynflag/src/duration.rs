//! Duration parsing and formatting with extended week and day units.
//!
//! The grammar is a concatenation of `<number><unit>` segments, e.g.
//! `3w2d4h`. Units are `w` (7 days), `d` (24 hours), `h`, `m`, `s`, `ms`,
//! `us` (or `µs`) and `ns`. Numbers may carry a fractional part. Formatting
//! is the greedy inverse: the largest units first, zero components omitted,
//! so a value expressible in weeks and days reads back the same way.

use std::time::Duration;

const NANOS_PER_US: u128 = 1_000;
const NANOS_PER_MS: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MIN: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MIN;
const NANOS_PER_DAY: u128 = 24 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: u128 = 7 * NANOS_PER_DAY;

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" => NANOS_PER_US,
        "ms" => NANOS_PER_MS,
        "s" => NANOS_PER_SEC,
        "m" => NANOS_PER_MIN,
        "h" => NANOS_PER_HOUR,
        "d" => NANOS_PER_DAY,
        "w" => NANOS_PER_WEEK,
        _ => return None,
    })
}

pub fn parse(input: &str) -> Result<Duration, String> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(String::from("empty duration"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.starts_with('-') {
        return Err(String::from("durations cannot be negative"));
    }
    rest = rest.strip_prefix('+').unwrap_or(rest);

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() {
            return Err(format!("expected a number at {rest:?}"));
        }
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err(format!("missing unit after {number:?}"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| format!("unknown unit {unit:?}"))?;
        let nanos = if number.contains('.') {
            let value: f64 = number
                .parse()
                .map_err(|_| format!("bad number {number:?}"))?;
            (value * scale as f64).round() as u128
        } else {
            let value: u128 = number
                .parse()
                .map_err(|_| format!("bad number {number:?}"))?;
            value
                .checked_mul(scale)
                .ok_or_else(|| String::from("duration overflows"))?
        };
        total = total
            .checked_add(nanos)
            .ok_or_else(|| String::from("duration overflows"))?;
        rest = next;
    }
    if total > u64::MAX as u128 {
        return Err(String::from("duration overflows"));
    }
    Ok(Duration::from_nanos(total as u64))
}

pub fn format(value: Duration) -> String {
    let mut nanos = value.as_nanos();
    if nanos == 0 {
        return String::from("0s");
    }
    const UNITS: [(u128, &str); 8] = [
        (NANOS_PER_WEEK, "w"),
        (NANOS_PER_DAY, "d"),
        (NANOS_PER_HOUR, "h"),
        (NANOS_PER_MIN, "m"),
        (NANOS_PER_SEC, "s"),
        (NANOS_PER_MS, "ms"),
        (NANOS_PER_US, "us"),
        (1, "ns"),
    ];
    let mut out = String::new();
    for (scale, label) in UNITS {
        let count = nanos / scale;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push_str(label);
            nanos %= scale;
        }
    }
    out
}
