//! Rounding and decimal rendering primitives
//!
//! All presentation code in this workspace rounds half-up (half away from zero), never
//! banker's rounding. Binary floats cannot hold most decimal literals exactly (`1.005` is
//! stored as `1.00499999...`), so the scaled value is nudged by a few ULPs before rounding.

/// Round to the given number of decimals, half away from zero
///
/// Non-finite inputs are returned unchanged.
pub fn round_half_up(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10_f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    let nudged = scaled + scaled.abs() * 4.0 * f64::EPSILON * scaled.signum();
    nudged.round() / factor
}

/// Render with exactly `decimals` digits after the separator
pub fn render_fixed(value: f64, decimals: u32) -> String {
    normalize_negative_zero(format!("{:.*}", decimals as usize, value))
}

/// Render with at most `decimals` digits, trailing zeros removed (`15.50` -> `15.5`, `5.00` -> `5`)
pub fn render_trimmed(value: f64, decimals: u32) -> String {
    let mut s = format!("{:.*}", decimals as usize, value);
    if s.contains('.') {
        let trimmed_len = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed_len);
    }
    normalize_negative_zero(s)
}

/// Shortest round-trippable rendering, without a dangling `.0`
pub fn render_shortest(value: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    let s = buffer.format(value);
    let s = s.strip_suffix(".0").unwrap_or(s);
    normalize_negative_zero(s.to_string())
}

fn normalize_negative_zero(s: String) -> String {
    if s.starts_with('-') && s[1..].chars().all(|c| c == '0' || c == '.') {
        s[1..].to_string()
    } else {
        s
    }
}
