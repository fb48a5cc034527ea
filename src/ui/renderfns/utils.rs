use chrono::{DateTime, Utc};
use ratatui::prelude::*;

use crate::cache::CacheEntry;

/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a Drone build status
pub fn status_color(status: &str) -> Color {
  match status {
    "success" => Color::Green,
    "failure" | "error" | "killed" => Color::Red,
    "running" | "pending" | "waiting_on_dependencies" => Color::Yellow,
    "declined" | "blocked" => Color::Magenta,
    _ => Color::White,
  }
}

/// "3m ago" style age of a unix timestamp relative to `now`
pub fn time_ago(timestamp: i64, now: DateTime<Utc>) -> String {
  if timestamp <= 0 {
    return "-".to_string();
  }
  let secs = (now.timestamp() - timestamp).max(0);
  match secs {
    0..=59 => "just now".to_string(),
    60..=3_599 => format!("{}m ago", secs / 60),
    3_600..=86_399 => format!("{}h ago", secs / 3_600),
    _ => format!("{}d ago", secs / 86_400),
  }
}

/// Block title for a cached list: name, count, and fetch state
pub fn list_title<V>(name: &str, entry: &CacheEntry<V>, count: usize) -> String {
  if entry.is_loading && entry.value.is_none() {
    format!(" {} (loading...) ", name)
  } else if entry.is_loading {
    // Restored from the previous session, network not back yet
    format!(" {} [{}] (cached) ", name, count)
  } else if entry.error.is_some() {
    format!(" {} [{}] (stale) ", name, count)
  } else if entry.is_validating {
    format!(" {} [{}] (refreshing) ", name, count)
  } else {
    format!(" {} [{}] ", name, count)
  }
}

/// A rect of at most `width` x `height` centered in `area`
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}
