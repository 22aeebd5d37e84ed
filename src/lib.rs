//! nmap-report - run nmap scans and decode their XML reports
//!
//! The library builds nmap command lines, runs them as a subprocess and turns
//! the resulting `-oX` report into typed [`Host`] records with their ports,
//! services, scripts and operating-system guess. Reports cut short by an
//! interrupted scan can be repaired, and reports can be checked against the
//! nmap DTD with an external validator.
//!
//! # Warning
//! Only scan networks and systems you are authorized to assess.

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod executor;
pub mod nmap;
pub mod parser;
pub mod recovery;
pub mod reporting;
pub mod types;
pub mod utils;
pub mod validation;

pub use error::{Result, ScanError};
pub use nmap::Nmap;
pub use parser::{parse_output_file, DecodeStats};
pub use recovery::{needs_recovery, recover, Recovery};
pub use types::*;
pub use validation::{Validation, Validator};
