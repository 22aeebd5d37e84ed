//! Schema validation of reports through an external validator (`xmllint`).
//!
//! The validator is run as `<validator> --noout --dtdvalid <schema> <report>`.
//! Candidate schemas are tried in order: the explicit one when given, otherwise
//! the installed nmap DTD, then the DTD published by the nmap project. The
//! first candidate that accepts the report wins, otherwise the last rejection
//! is returned. Validation has no effect on decoding.

use crate::config::ValidationConfig;
use crate::executor::{find_executable, run_with_timeout};
use crate::{Result, ScanError};
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// Diagnostic text produced by the validator.
    Invalid(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SchemaSource {
    Local(PathBuf),
    Remote(String),
}

pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub async fn validate(&self, report: &Path, schema: Option<&Path>) -> Result<Validation> {
        let validator = find_executable(&self.config.validator)
            .ok_or_else(|| ScanError::ValidatorNotFound(self.config.validator.clone()))?;
        if !report.is_file() {
            return Err(ScanError::ReportNotFound(report.to_path_buf()));
        }

        let mut rejection = None;
        let mut download_error = None;

        for source in self.candidates(schema) {
            let outcome = match &source {
                SchemaSource::Local(path) => {
                    if !path.is_file() {
                        debug!("Schema {} not found, trying next candidate", path.display());
                        continue;
                    }
                    self.run(&validator, path, report).await?
                }
                SchemaSource::Remote(url) => {
                    let schema_file = match self.download(url).await {
                        Ok(file) => file,
                        Err(e) => {
                            warn!("Failed to fetch schema from {}: {}", url, e);
                            download_error = Some(e);
                            continue;
                        }
                    };
                    self.run(&validator, schema_file.path(), report).await?
                }
            };

            match outcome {
                Validation::Valid => {
                    info!("{} is valid against {:?}", report.display(), source);
                    return Ok(Validation::Valid);
                }
                Validation::Invalid(reason) => {
                    debug!("{} rejected against {:?}", report.display(), source);
                    rejection = Some(reason);
                }
            }
        }

        match (rejection, download_error) {
            (Some(reason), _) => Ok(Validation::Invalid(reason)),
            (None, Some(e)) => Err(e),
            (None, None) => Err(ScanError::SchemaUnavailable),
        }
    }

    fn candidates(&self, schema: Option<&Path>) -> Vec<SchemaSource> {
        let local = schema
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.default_schema.clone());

        let mut candidates = vec![SchemaSource::Local(local)];
        if let Some(url) = &self.config.schema_url {
            candidates.push(SchemaSource::Remote(url.clone()));
        }
        candidates
    }

    async fn run(&self, validator: &Path, schema: &Path, report: &Path) -> Result<Validation> {
        let mut command = Command::new(validator);
        command
            .arg("--noout")
            .arg("--dtdvalid")
            .arg(schema)
            .arg(report);

        let operation = format!("validation of {}", report.display());
        let output = run_with_timeout(command, self.config.timeout(), &operation).await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim();

        if output.status.success() && text.is_empty() {
            Ok(Validation::Valid)
        } else if text.is_empty() {
            Ok(Validation::Invalid(format!("validator exited with {}", output.status)))
        } else {
            Ok(Validation::Invalid(text.to_string()))
        }
    }

    async fn download(&self, url: &str) -> Result<NamedTempFile> {
        debug!("Fetching schema from {}", url);
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout())
            .build()?;
        let body = client.get(url).send().await?.error_for_status()?.bytes().await?;

        let mut file = tempfile::Builder::new()
            .prefix("nmap-schema")
            .suffix(".dtd")
            .tempfile()?;
        file.write_all(&body)?;
        file.flush()?;
        Ok(file)
    }
}
