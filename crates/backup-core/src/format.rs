use std::time::Duration;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count using the largest binary unit that keeps the value below 1024.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in SIZE_UNITS {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

/// Format a duration as seconds with 2 decimals, switching to minutes past one minute.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        return format!("{:.2}s", secs);
    }
    let minutes = (secs / 60.0).floor();
    format!("{}m {:.2}s", minutes as u64, secs - minutes * 60.0)
}
