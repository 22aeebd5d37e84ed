use crate::config::ScanConfig;
use crate::executor::{ProcessExecutor, SystemExecutor};
use crate::parser;
use crate::types::Host;
use crate::{Result, ScanError};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Upper bound for the `-h` probe run at construction.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds nmap invocations, runs them and decodes the resulting report.
pub struct Nmap<E: ProcessExecutor = SystemExecutor> {
    executor: E,
    executable: String,
    output_file: PathBuf,
    // Keeps the temporary report alive (and removes it) with the scanner.
    _scratch: Option<NamedTempFile>,
    timeout: Duration,
    os_detection: bool,
    service_info: bool,
    verbose: bool,
    port_scan_disabled: bool,
    reverse_dns_disabled: bool,
    hosts_online: bool,
    extra_options: Vec<String>,
}

impl Nmap<SystemExecutor> {
    pub async fn new(config: &ScanConfig) -> Result<Self> {
        Self::with_executor(SystemExecutor, config).await
    }
}

impl<E: ProcessExecutor> Nmap<E> {
    /// Fails with [`ScanError::NotExecutable`] unless `<executable> -h`
    /// exits with status 0.
    pub async fn with_executor(executor: E, config: &ScanConfig) -> Result<Self> {
        let probe = vec![config.executable.clone(), "-h".to_string()];
        match executor.execute(&probe, PROBE_TIMEOUT).await {
            Ok(0) => {}
            Ok(code) => {
                debug!("`{} -h` exited with {}", config.executable, code);
                return Err(ScanError::NotExecutable(config.executable.clone()));
            }
            Err(e) => {
                debug!("`{} -h` failed: {}", config.executable, e);
                return Err(ScanError::NotExecutable(config.executable.clone()));
            }
        }

        let (output_file, scratch) = match &config.output_file {
            Some(path) => (path.clone(), None),
            None => {
                let file = tempfile::Builder::new()
                    .prefix("nmap-scan-output")
                    .suffix(".xml")
                    .tempfile()?;
                (file.path().to_path_buf(), Some(file))
            }
        };

        Ok(Self {
            executor,
            executable: config.executable.clone(),
            output_file,
            _scratch: scratch,
            timeout: config.timeout(),
            os_detection: config.os_detection,
            service_info: config.service_info,
            verbose: config.verbose,
            port_scan_disabled: config.disable_port_scan,
            reverse_dns_disabled: config.disable_reverse_dns,
            hosts_online: config.treat_hosts_as_online,
            extra_options: config.extra_options.clone(),
        })
    }

    pub fn set_extra_options(mut self, options: Vec<String>) -> Self {
        self.extra_options = options;
        self
    }

    pub fn enable_os_detection(mut self, enable: bool) -> Self {
        self.os_detection = enable;
        self
    }

    pub fn enable_service_info(mut self, enable: bool) -> Self {
        self.service_info = enable;
        self
    }

    pub fn enable_verbose(mut self, enable: bool) -> Self {
        self.verbose = enable;
        self
    }

    /// Ping scan only (`-sn`). Takes precedence over an explicit port list.
    pub fn disable_port_scan(mut self, disable: bool) -> Self {
        self.port_scan_disabled = disable;
        self
    }

    pub fn disable_reverse_dns(mut self, disable: bool) -> Self {
        self.reverse_dns_disabled = disable;
        self
    }

    pub fn treat_hosts_as_online(mut self, enable: bool) -> Self {
        self.hosts_online = enable;
        self
    }

    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Argument vector for a scan of `targets`, program name first.
    pub fn build_command(&self, targets: &[impl AsRef<str>], ports: &[u16]) -> Vec<String> {
        let mut command = vec![self.executable.clone()];
        command.extend(self.extra_options.iter().cloned());

        if self.os_detection {
            command.push("-O".to_string());
        }
        if self.service_info {
            command.push("-sV".to_string());
        }
        if self.verbose {
            command.push("-v".to_string());
        }
        if self.port_scan_disabled {
            command.push("-sn".to_string());
        } else if !ports.is_empty() {
            let list: Vec<String> = ports.iter().map(u16::to_string).collect();
            command.push("-p".to_string());
            command.push(list.join(","));
        }
        if self.reverse_dns_disabled {
            command.push("-n".to_string());
        }
        if self.hosts_online {
            command.push("-Pn".to_string());
        }

        command.push("-oX".to_string());
        command.push(self.output_file.to_string_lossy().into_owned());
        command.extend(targets.iter().map(|t| t.as_ref().to_string()));
        command
    }

    pub async fn scan(&self, targets: &[impl AsRef<str>], ports: &[u16]) -> Result<Vec<Host>> {
        if targets.is_empty() {
            return Err(ScanError::InvalidInput("no scan targets given".to_string()));
        }

        let command = self.build_command(targets, ports);
        info!("Scanning {} target(s)", targets.len());
        self.executor.execute(&command, self.timeout).await?;

        // The scratch file exists from construction, so an empty one means
        // nmap never wrote a report.
        let written = std::fs::metadata(&self.output_file)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(ScanError::ReportNotFound(self.output_file.clone()));
        }
        parser::parse_output_file(&self.output_file)
    }
}
