//! Parsing of user-entered timestamps.
//!
//! Accepted forms:
//! - `""`, `-`, `none`, `null`: no timestamp
//! - `now`
//! - offsets from now: `+10m`, `-1h`, `+1h30m`, `+90s`, `+2d`
//! - `HH:MM` or `HH:MM:SS` (today)
//! - `YYYY-MM-DD HH:MM[:SS]` (a `T` separator also works)
//! - `DD/MM/YYYY HH:MM[:SS]`

use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Parse a timestamp relative to `now`. `Ok(None)` means "not configured".
pub fn parse(input: &str, now: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
    let s = input.trim();
    match s.to_lowercase().as_str() {
        "" | "-" | "none" | "null" => return Ok(None),
        "now" => return Ok(Some(now)),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix('+') {
        let shifted = now.checked_add_signed(parse_offset(rest, input)?);
        return shifted
            .map(Some)
            .ok_or_else(|| anyhow!("Offset '{}' is out of range", input));
    }
    if let Some(rest) = s.strip_prefix('-') {
        let shifted = now.checked_sub_signed(parse_offset(rest, input)?);
        return shifted
            .map(Some)
            .ok_or_else(|| anyhow!("Offset '{}' is out of range", input));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Some(dt));
        }
    }
    for fmt in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Ok(Some(now.date().and_time(t)));
        }
    }

    Err(anyhow!(
        "Invalid timestamp '{}'. Use 'YYYY-MM-DD HH:MM', 'DD/MM/YYYY HH:MM', 'HH:MM', 'now', '+10m' or 'none'",
        input
    ))
}

/// Parse a compound offset such as `1h30m` (units: d, h, m, s)
fn parse_offset(s: &str, original: &str) -> Result<TimeDelta> {
    if s.is_empty() {
        bail!("Invalid offset '{}': missing amount", original);
    }

    let out_of_range = || anyhow!("Invalid offset '{}': out of range", original);
    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            bail!(
                "Invalid offset '{}': expected a number before '{}'",
                original,
                c
            );
        }
        let Ok(n) = digits.parse::<i64>() else {
            bail!("Invalid offset '{}': amount too large", original);
        };
        digits.clear();
        let part = match c {
            'd' => TimeDelta::try_days(n),
            'h' => TimeDelta::try_hours(n),
            'm' => TimeDelta::try_minutes(n),
            's' => TimeDelta::try_seconds(n),
            _ => bail!("Invalid offset '{}': unknown unit '{}'", original, c),
        };
        let part = part.ok_or_else(out_of_range)?;
        total = total.checked_add(&part).ok_or_else(out_of_range)?;
    }
    if !digits.is_empty() {
        bail!(
            "Invalid offset '{}': missing unit after '{}' (use d, h, m or s)",
            original,
            digits
        );
    }
    Ok(total)
}
