//! Interval literals
//!
//! `1s`, `500ms`, `2m`, `0.5s` — used by `every`, `delay:`, `throttle:`
//! and the swap/settle delay modifiers.

/// Parse an interval literal into milliseconds
pub fn parse_interval(input: &str) -> Option<u64> {
    let input = input.trim();
    let (number, factor) = if let Some(n) = input.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = input.strip_suffix('s') {
        (n, 1000.0)
    } else if let Some(n) = input.strip_suffix('m') {
        (n, 60_000.0)
    } else {
        (input, 1.0)
    };
    let value: f64 = number.parse().ok()?;
    if value < 0.0 || !value.is_finite() {
        return None;
    }
    Some((value * factor) as u64)
}
