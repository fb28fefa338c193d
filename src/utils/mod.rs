use anyhow::Result;
use std::time::Duration;

/// Parse a protobuf JSON duration such as `"1.500s"` into seconds
pub fn parse_proto_duration(value: &str) -> Result<f64> {
    let trimmed = value.trim();
    let number = trimmed
        .strip_suffix('s')
        .ok_or_else(|| anyhow::anyhow!("Invalid duration (missing 's' suffix): {}", value))?;

    let seconds: f64 = number
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid duration: {}", value))?;

    if !seconds.is_finite() || seconds < 0.0 {
        anyhow::bail!("Invalid duration: {}", value);
    }

    Ok(seconds)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Delay before status check number `check_count` (1-based): grows by 2s per check up to `max`
pub fn poll_delay(check_count: u32, initial: Duration, max: Duration) -> Duration {
    let step = Duration::from_secs(2).saturating_mul(check_count.saturating_sub(1));
    std::cmp::min(initial.saturating_add(step), max)
}
