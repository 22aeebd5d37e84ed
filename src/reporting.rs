use crate::config::{OutputFormat, ReportingConfig};
use crate::types::Host;
use crate::{Result, ScanError};
use log::{debug, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct ReportGenerator {
    config: ReportingConfig,
}

impl ReportGenerator {
    pub fn new(config: ReportingConfig) -> Self {
        Self { config }
    }

    /// Writes one file per configured format, named `<base_name>.<ext>`.
    pub async fn generate_report(&self, hosts: &[Host], base_name: &str) -> Result<Vec<PathBuf>> {
        let mut generated_files = Vec::new();

        fs::create_dir_all(&self.config.output_dir).await
            .map_err(|e| ScanError::Reporting(format!("Failed to create output directory: {}", e)))?;

        for format in &self.config.formats {
            let path = self
                .config
                .output_dir
                .join(format!("{}.{}", base_name, format.extension()));
            match format {
                OutputFormat::Json => self.generate_json_report(hosts, &path).await?,
                OutputFormat::Csv => self.generate_csv_report(hosts, &path).await?,
            }
            generated_files.push(path);
        }

        info!("Generated {} report files", generated_files.len());
        Ok(generated_files)
    }

    async fn generate_json_report(&self, hosts: &[Host], path: &Path) -> Result<()> {
        debug!("Generating JSON report: {}", path.display());

        fs::write(path, to_json(hosts, self.config.pretty)?).await
            .map_err(|e| ScanError::Reporting(format!("Failed to write JSON report: {}", e)))?;

        Ok(())
    }

    async fn generate_csv_report(&self, hosts: &[Host], path: &Path) -> Result<()> {
        debug!("Generating CSV report: {}", path.display());

        fs::write(path, to_csv(hosts)?).await
            .map_err(|e| ScanError::Reporting(format!("Failed to write CSV report: {}", e)))?;

        Ok(())
    }
}

pub fn to_json(hosts: &[Host], pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(hosts)?
    } else {
        serde_json::to_string(hosts)?
    };
    Ok(json)
}

/// One row per port; hosts without ports get a single row with empty port
/// columns.
pub fn to_csv(hosts: &[Host]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for host in hosts {
        for row in PortRow::from_host(host) {
            writer.serialize(row)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ScanError::Reporting(format!("Failed to flush CSV report: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| ScanError::Reporting(format!("CSV report is not UTF-8: {}", e)))
}

/// Flattened view of a host used for tabular output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HostSummary {
    pub address: String,
    pub hostname: String,
    pub state: String,
    pub open_ports: usize,
    pub closed_ports: usize,
    pub os: String,
}

impl HostSummary {
    pub fn from_host(host: &Host) -> Self {
        Self {
            address: host
                .primary_address()
                .map(|a| a.address().to_string())
                .unwrap_or_default(),
            hostname: host
                .hostnames()
                .first()
                .map(|h| h.name().to_string())
                .unwrap_or_default(),
            state: host.state().to_string(),
            open_ports: host.open_ports().len(),
            closed_ports: host.closed_ports().len(),
            os: match (host.os(), host.os_accuracy()) {
                (Some(os), Some(accuracy)) => format!("{} ({}%)", os, accuracy),
                (Some(os), None) => os.to_string(),
                (None, _) => String::new(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct PortRow<'a> {
    address: &'a str,
    hostname: &'a str,
    host_state: &'static str,
    port: Option<u16>,
    protocol: &'a str,
    port_state: &'static str,
    service: &'a str,
    product: &'a str,
    version: &'a str,
    os: &'a str,
    os_accuracy: Option<u8>,
}

impl<'a> PortRow<'a> {
    fn from_host(host: &'a Host) -> Vec<Self> {
        let base = PortRow {
            address: host.primary_address().map(|a| a.address()).unwrap_or_default(),
            hostname: host.hostnames().first().map(|h| h.name()).unwrap_or_default(),
            host_state: host.state().as_str(),
            port: None,
            protocol: "",
            port_state: "",
            service: "",
            product: "",
            version: "",
            os: host.os().unwrap_or_default(),
            os_accuracy: host.os_accuracy(),
        };

        if host.ports().is_empty() {
            return vec![base];
        }

        host.ports()
            .iter()
            .map(|port| {
                let service = port.service();
                PortRow {
                    port: Some(port.number()),
                    protocol: port.protocol(),
                    port_state: port.state().as_str(),
                    service: service.name().unwrap_or_default(),
                    product: service.product().unwrap_or_default(),
                    version: service.version().unwrap_or_default(),
                    ..base
                }
            })
            .collect()
    }
}
