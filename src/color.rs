//! Fill color normalization.

const FALLBACK: &str = "#ffffff";

/// Normalize `rgb(..)`/`rgba(..)` or `#hex` input to lowercase `#rrggbb`.
///
/// Alpha is dropped. Anything unparsable becomes white.
pub fn normalize_hex(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    if lower.is_empty() {
        return FALLBACK.to_string();
    }
    if lower.starts_with('#') {
        return lower;
    }
    if !lower.starts_with("rgb") {
        return FALLBACK.to_string();
    }

    let cleaned: String = lower
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == ',' || *ch == '.')
        .collect();
    let channels: Vec<u8> = cleaned
        .split(',')
        .take(3)
        .filter_map(|part| {
            let whole = part.split('.').next().unwrap_or_default();
            whole.parse::<u32>().ok().map(|n| n.min(255) as u8)
        })
        .collect();

    match channels.as_slice() {
        [r, g, b] => format!("#{r:02x}{g:02x}{b:02x}"),
        _ => FALLBACK.to_string(),
    }
}
