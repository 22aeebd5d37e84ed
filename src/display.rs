use crate::reporting::HostSummary;
use crate::types::{Host, HostState, Port, PortState, Service};
use colored::*;

/// Terminal output for scan results, colored unless `NO_COLOR` is set or the
/// terminal is dumb.
pub struct DisplayManager {
    use_colors: bool,
    quiet_mode: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::with_quiet(false)
    }

    pub fn with_quiet(quiet: bool) -> Self {
        let use_colors = std::env::var("NO_COLOR").is_err() &&
                        std::env::var("TERM").map_or(true, |term| term != "dumb");

        Self {
            use_colors,
            quiet_mode: quiet,
        }
    }

    pub fn print_banner(&self, title: &str, subtitle: Option<&str>) {
        if self.quiet_mode { return; }

        let width = title.chars().count();
        if self.use_colors {
            println!();
            println!("  {}", "┌─".bright_cyan().to_string() + &"─".repeat(width + 2) + "─┐");
            println!("  {} {} {}",
                "│".bright_cyan(),
                title.bright_white().bold(),
                "│".bright_cyan()
            );
            if let Some(sub) = subtitle {
                println!("  {} {} {}",
                    "│".bright_cyan(),
                    format!("{:^width$}", sub, width = width).bright_black(),
                    "│".bright_cyan()
                );
            }
            println!("  {}", "└─".bright_cyan().to_string() + &"─".repeat(width + 2) + "─┘");
            println!();
        } else {
            let border = "=".repeat(width + 4);
            println!("\n{}", border);
            println!("  {}  ", title);
            if let Some(sub) = subtitle {
                println!("  {}  ", sub);
            }
            println!("{}\n", border);
        }
    }

    pub fn print_section_header(&self, title: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("{}", title.bright_cyan().bold());
            println!("{}", "─".repeat(title.chars().count()).bright_cyan());
        } else {
            println!("{}", title);
            println!("{}", "=".repeat(title.chars().count()));
        }
    }

    pub fn print_success(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "✓".bright_green().bold(), message.green());
        } else {
            println!("[✓] {}", message);
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "!".bright_yellow().bold(), message.yellow());
        } else {
            println!("[!] {}", message);
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn print_error(&self, message: &str) {
        if self.use_colors {
            eprintln!("  {} {}", "✗".bright_red().bold(), message.red().bold());
        } else {
            eprintln!("[✗] {}", message);
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "i".bright_blue().bold(), message.blue());
        } else {
            println!("[i] {}", message);
        }
    }

    /// One block per host: addresses, hostnames, OS guess, ports and scripts.
    pub fn print_host(&self, host: &Host) {
        if self.quiet_mode { return; }

        let primary = host.primary_address();
        let title = primary
            .map(|a| a.address().to_string())
            .unwrap_or_else(|| "<no address>".to_string());

        if self.use_colors {
            let state = match host.state() {
                HostState::Up => host.state().as_str().bright_green().bold(),
                HostState::Down => host.state().as_str().red(),
                _ => host.state().as_str().bright_black(),
            };
            println!("  {} {} [{}]", "•".bright_green().bold(), title.cyan().bold(), state);
        } else {
            println!("  • {} [{}]", title, host.state());
        }

        for address in host.addresses().iter().filter(|a| Some(*a) != primary) {
            self.print_detail("address", &format!("{} ({})", address.address(), address.kind()));
        }
        for hostname in host.hostnames() {
            self.print_detail("hostname", &format!("{} ({})", hostname.name(), hostname.kind()));
        }
        if let Some(os) = host.os() {
            let os = match host.os_accuracy() {
                Some(accuracy) => format!("{} ({}%)", os, accuracy),
                None => os.to_string(),
            };
            self.print_detail("os", &os);
        }

        for port in host.ports() {
            let line = format_port(port);
            if self.use_colors {
                let marker = match port.state() {
                    PortState::Open => "→".bright_green(),
                    PortState::Closed => "→".bright_black(),
                };
                println!("    {} {}", marker, line);
            } else {
                println!("    → {}", line);
            }
            for script in port.scripts() {
                self.print_detail("  script", script.id());
            }
        }

        for script in host.scripts() {
            self.print_detail("script", script.id());
        }
    }

    /// Compact one-line-per-host listing.
    pub fn print_host_table(&self, summaries: &[HostSummary]) {
        if self.quiet_mode || summaries.is_empty() { return; }

        let header = format!(
            "{:<40} {:<30} {:<8} {:>5} {:>6}  {}",
            "ADDRESS", "HOSTNAME", "STATE", "OPEN", "CLOSED", "OS"
        );
        if self.use_colors {
            println!("  {}", header.bright_white().bold());
        } else {
            println!("  {}", header);
        }

        for summary in summaries {
            println!(
                "  {:<40} {:<30} {:<8} {:>5} {:>6}  {}",
                summary.address.truncate_with_ellipsis(40),
                summary.hostname.truncate_with_ellipsis(30),
                summary.state,
                summary.open_ports,
                summary.closed_ports,
                summary.os
            );
        }
    }

    fn print_detail(&self, label: &str, value: &str) {
        if self.use_colors {
            println!("    {} {}", format!("{}:", label).bright_black(), value.white());
        } else {
            println!("    {}: {}", label, value);
        }
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

fn format_port(port: &Port) -> String {
    let mut line = format!("{}/{} {}", port.number(), port.protocol(), port.state());
    let service = format_service(port.service());
    if !service.is_empty() {
        line.push(' ');
        line.push_str(&service);
    }
    line
}

fn format_service(service: &Service) -> String {
    [service.name(), service.product(), service.version()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

trait StringExt {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String;
}

impl StringExt for str {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String {
        if self.chars().count() <= max_len {
            self.to_string()
        } else {
            let kept: String = self.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_port() {
        let port = Port::new(
            22,
            "tcp",
            PortState::Open,
            Service::new(Some("ssh".to_string()), Some("OpenSSH".to_string()), None),
        );
        assert_eq!(format_port(&port), "22/tcp open ssh OpenSSH");

        let bare = Port::new(113, "tcp", PortState::Closed, Service::default());
        assert_eq!(format_port(&bare), "113/tcp closed");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!("short".truncate_with_ellipsis(10), "short");
        assert_eq!("williamdurand.fr".truncate_with_ellipsis(8), "willi...");
        assert_eq!("ééééé".truncate_with_ellipsis(4), "é...");
    }
}
