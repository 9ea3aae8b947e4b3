//! Human-friendly byte formatting for log output.

/// Formats a byte count as a size string such as `10.00 MB` or `1.50 GB`.
/// Counts below 1 KiB are printed as plain bytes.
pub fn friendly_bytes(bytes: i64) -> String {
    const PREFIXES: [&str; 6] = ["K", "M", "G", "T", "P", "E"];
    let fbytes = bytes as f64;
    let base = 1024_f64;
    if fbytes < base {
        return format!("{} B", fbytes);
    }
    let exp = (fbytes.ln() / base.ln()) as usize;
    let index = (exp - 1).min(PREFIXES.len() - 1);
    format!("{:.2} {}B", fbytes / base.powi(exp as i32), PREFIXES[index])
}
