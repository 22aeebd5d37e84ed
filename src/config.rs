use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SCHEMA_PATH: &str = "/usr/share/nmap/nmap.dtd";
pub const DEFAULT_SCHEMA_URL: &str = "https://svn.nmap.org/nmap/docs/nmap.dtd";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub validation: ValidationConfig,
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub executable: String,
    pub timeout: u64, // seconds
    /// Report destination. A temporary file is used when unset.
    pub output_file: Option<PathBuf>,
    pub os_detection: bool,
    pub service_info: bool,
    pub verbose: bool,
    pub disable_port_scan: bool,
    pub disable_reverse_dns: bool,
    pub treat_hosts_as_online: bool,
    pub extra_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub validator: String,
    pub timeout: u64, // seconds
    pub default_schema: PathBuf,
    /// Fallback schema location, `None` disables the download.
    pub schema_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub output_dir: PathBuf,
    pub formats: Vec<OutputFormat>,
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            executable: "nmap".to_string(),
            timeout: 60,
            output_file: None,
            os_detection: false,
            service_info: false,
            verbose: false,
            disable_port_scan: false,
            disable_reverse_dns: false,
            treat_hosts_as_online: false,
            extra_options: Vec::new(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validator: "xmllint".to_string(),
            timeout: 300,
            default_schema: PathBuf::from(DEFAULT_SCHEMA_PATH),
            schema_url: Some(DEFAULT_SCHEMA_URL.to_string()),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./reports"),
            formats: vec![OutputFormat::Json],
            pretty: true,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn save_to_file(&self, path: &str) -> crate::Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| crate::ScanError::InvalidInput(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn scan_timeout(&self) -> Duration {
        self.scan.timeout()
    }

    pub fn validation_timeout(&self) -> Duration {
        self.validation.timeout()
    }
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
