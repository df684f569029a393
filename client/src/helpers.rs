use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};
use common::data::Millis;

pub fn now_ms() -> Millis {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Millis(ms)
}

/// Formats a wire timestamp in local time, `-` when absent.
pub fn local_time(ts: Option<Millis>) -> String {
    match ts {
        Some(Millis(ms)) => Local
            .timestamp_millis_opt(ms as i64)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| ms.to_string()),
        None => "-".to_string(),
    }
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
