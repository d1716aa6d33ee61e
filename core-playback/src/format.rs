//! Display helpers for player screens.

/// Formats a millisecond position as `MM:SS`.
///
/// Minutes are not wrapped into hours, so long tracks render as `75:03`.
pub fn format_time(milliseconds: u64) -> String {
    let total_seconds = milliseconds / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
