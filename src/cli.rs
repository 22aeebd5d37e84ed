use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nmap-report")]
#[command(about = "Run nmap scans and decode their XML reports")]
#[command(long_about = r#"
nmap-report drives nmap and turns its XML output (-oX) into hosts, ports,
services, scripts and OS guesses. Existing reports can be decoded, repaired
after an interrupted scan, or validated against the nmap DTD.

WARNING: Only scan networks and systems you own or have explicit permission
to test.

Usage Examples:
  nmap-report scan -t 192.168.1.1                   # Default nmap scan
  nmap-report scan -t host.lan -p 22,80,443 --os    # Ports plus OS detection
  nmap-report scan -t 10.0.0.0/24 --ping-only       # Host discovery only
  nmap-report parse scan.xml --format json          # Decode an existing report
  nmap-report parse partial.xml --recover           # Decode an interrupted report
  nmap-report validate scan.xml                     # Check against nmap.dtd
"#)]
#[command(version)]
#[command(author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run nmap against targets and decode the report
    Scan {
        /// Hostnames, IP addresses or networks passed to nmap
        #[arg(short, long, required = true, num_args = 1..)]
        target: Vec<String>,

        /// Ports to scan (e.g., 22,80,8000-8010)
        #[arg(short, long, value_name = "PORTS")]
        ports: Option<String>,

        /// Enable OS detection (-O)
        #[arg(long)]
        os: bool,

        /// Probe open ports for service and version info (-sV)
        #[arg(long)]
        service_info: bool,

        /// Host discovery only, no port scan (-sn)
        #[arg(long)]
        ping_only: bool,

        /// Never do reverse DNS resolution (-n)
        #[arg(long)]
        no_dns: bool,

        /// Treat all hosts as online (-Pn)
        #[arg(long)]
        no_ping: bool,

        /// Scan timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Keep nmap's XML report at this path
        #[arg(long, value_name = "FILE")]
        xml_output: Option<PathBuf>,

        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// Decode an existing nmap XML report
    Parse {
        /// Report file
        file: PathBuf,

        /// Repair the report first if the scan was interrupted
        #[arg(long)]
        recover: bool,

        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// Repair a report left incomplete by an interrupted scan
    Recover {
        /// Report file
        file: PathBuf,
    },

    /// Validate a report against the nmap DTD
    Validate {
        /// Report file
        file: PathBuf,

        /// DTD to validate against instead of the installed one
        #[arg(long, value_name = "FILE")]
        schema: Option<PathBuf>,
    },
}

#[derive(clap::Args, Clone)]
pub struct OutputArgs {
    /// Output format on stdout
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Also write report files, named `nmap-<timestamp>` unless NAME is given
    #[arg(long, value_name = "NAME", num_args = 0..=1)]
    pub save: Option<Option<String>>,

    /// Output directory for saved reports
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}
