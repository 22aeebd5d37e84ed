/// Progress indicators for long-running scans
pub mod progress {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();

        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
            pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }

        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

/// Time and formatting utilities
pub mod time {
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    /// Timestamp suffix for report file names, e.g. `20240131-142501`.
    pub fn file_stamp(now: DateTime<Utc>) -> String {
        now.format("%Y%m%d-%H%M%S").to_string()
    }

    /// Format duration as human readable string
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Command-line value parsing
pub mod ports {
    use crate::{Result, ScanError};

    /// Parses `22,80,8000-8003` into a sorted, de-duplicated port list.
    pub fn parse_port_list(list: &str) -> Result<Vec<u16>> {
        let mut ports = Vec::new();

        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_port(start)?;
                    let end = parse_port(end)?;
                    if start > end {
                        return Err(ScanError::InvalidInput(format!("invalid port range: {}", part)));
                    }
                    ports.extend(start..=end);
                }
                None => ports.push(parse_port(part)?),
            }
        }

        ports.sort_unstable();
        ports.dedup();
        Ok(ports)
    }

    fn parse_port(value: &str) -> Result<u16> {
        value
            .trim()
            .parse()
            .map_err(|_| ScanError::InvalidInput(format!("invalid port: {}", value)))
    }
}
