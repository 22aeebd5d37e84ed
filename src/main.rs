use clap::Parser;
use env_logger::Env;
use log::info;
use nmap_report::{
    cli::{Cli, Commands, OutputArgs, OutputFormat},
    config::Config,
    display::DisplayManager,
    parser,
    recovery::{self, Recovery},
    reporting::{self, HostSummary, ReportGenerator},
    utils::{ports::parse_port_list, progress, time},
    validation::{Validation, Validator},
    Host, Nmap, Result,
};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

/// Exit code for a report the validator rejected.
const EXIT_INVALID: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    // Machine-readable output owns stdout.
    let quiet = cli.quiet || writes_data_to_stdout(&cli.command);
    let display = DisplayManager::with_quiet(quiet);

    display.print_banner("nmap-report", Some("Authorized Scanning Only"));

    let config = if let Some(config_path) = &cli.config {
        match Config::load_from_file(&config_path.to_string_lossy()) {
            Ok(config) => {
                display.print_success(&format!("Loaded configuration from {}", config_path.display()));
                config
            }
            Err(e) => {
                display.print_warning(&format!("Failed to load configuration: {}, using defaults", e));
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    let start_time = Instant::now();

    let result = match cli.command {
        Commands::Scan {
            target,
            ports,
            os,
            service_info,
            ping_only,
            no_dns,
            no_ping,
            timeout,
            xml_output,
            output_args,
        } => {
            let mut config = config;
            config.scan.os_detection |= os;
            config.scan.service_info |= service_info;
            config.scan.disable_port_scan |= ping_only;
            config.scan.disable_reverse_dns |= no_dns;
            config.scan.treat_hosts_as_online |= no_ping;
            if let Some(timeout) = timeout {
                config.scan.timeout = timeout;
            }
            if xml_output.is_some() {
                config.scan.output_file = xml_output;
            }
            execute_scan(&config, &display, &target, ports.as_deref(), &output_args).await
        }
        Commands::Parse { file, recover, output_args } => {
            execute_parse(&config, &display, &file, recover, &output_args).await
        }
        Commands::Recover { file } => execute_recover(&display, &file),
        Commands::Validate { file, schema } => {
            match execute_validate(&config, &display, &file, schema.as_deref()).await {
                Ok(Validation::Valid) => Ok(()),
                Ok(Validation::Invalid(reason)) => {
                    display.print_error(&format!("{} is not valid:\n{}", file.display(), reason));
                    process::exit(EXIT_INVALID);
                }
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(()) => {
            display.print_success(&format!(
                "Completed in {}",
                time::format_duration(start_time.elapsed())
            ));
        }
        Err(e) => {
            display.print_error(&format!("Failed: {}", e));
            if e.is_configuration_error() {
                display.print_info("Check the configured executable paths (see --config)");
            }
            process::exit(1);
        }
    }
}

fn writes_data_to_stdout(command: &Commands) -> bool {
    match command {
        Commands::Scan { output_args, .. } | Commands::Parse { output_args, .. } => {
            output_args.format != OutputFormat::Table
        }
        _ => false,
    }
}

async fn execute_scan(
    config: &Config,
    display: &DisplayManager,
    targets: &[String],
    ports: Option<&str>,
    output_args: &OutputArgs,
) -> Result<()> {
    display.print_section_header("NMAP SCAN");

    let ports = match ports {
        Some(list) => parse_port_list(list)?,
        None => Vec::new(),
    };

    let nmap = Nmap::new(&config.scan).await?;
    info!("Report will be written to {}", nmap.output_file().display());

    let spinner = (output_args.format == OutputFormat::Table)
        .then(|| progress::create_spinner(&format!("Scanning {}", targets.join(" "))));
    let scanned = nmap.scan(targets, &ports).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let hosts = scanned?;
    emit_hosts(config, display, &hosts, output_args).await
}

async fn execute_parse(
    config: &Config,
    display: &DisplayManager,
    file: &Path,
    recover: bool,
    output_args: &OutputArgs,
) -> Result<()> {
    display.print_section_header("NMAP REPORT");

    let path = if recover {
        match recovery::recover(file)? {
            Recovery::Recovered(path) => {
                display.print_warning(&format!(
                    "Report was incomplete, decoding repaired copy {}",
                    path.display()
                ));
                path
            }
            Recovery::NotNeeded => file.to_path_buf(),
        }
    } else {
        file.to_path_buf()
    };

    if !path.is_file() {
        return Err(nmap_report::ScanError::ReportNotFound(path));
    }
    let xml = tokio::fs::read_to_string(&path).await?;
    let document = parser::tokenize(&xml)?;
    let (hosts, stats) = parser::parse_document_with_stats(&document)?;
    if !stats.is_clean() {
        display.print_warning(&format!(
            "Skipped {} hosts and {} ports that could not be decoded",
            stats.hosts_dropped, stats.ports_dropped
        ));
    }

    emit_hosts(config, display, &hosts, output_args).await
}

fn execute_recover(display: &DisplayManager, file: &Path) -> Result<()> {
    display.print_section_header("REPORT RECOVERY");

    match recovery::recover(file)? {
        Recovery::Recovered(path) => {
            display.print_success(&format!("Recovered report written to {}", path.display()));
            display.print_warning("The recovered report may not pass schema validation");
        }
        Recovery::NotNeeded => {
            display.print_info(&format!("{} is already complete", file.display()));
        }
    }
    Ok(())
}

async fn execute_validate(
    config: &Config,
    display: &DisplayManager,
    file: &Path,
    schema: Option<&Path>,
) -> Result<Validation> {
    display.print_section_header("REPORT VALIDATION");

    let validator = Validator::new(config.validation.clone());
    let validation = validator.validate(file, schema).await?;
    if validation.is_valid() {
        display.print_success(&format!("{} is valid", file.display()));
    }
    Ok(validation)
}

async fn emit_hosts(
    config: &Config,
    display: &DisplayManager,
    hosts: &[Host],
    output_args: &OutputArgs,
) -> Result<()> {
    match output_args.format {
        OutputFormat::Table => {
            if hosts.is_empty() {
                display.print_warning("No hosts in report");
            } else {
                for host in hosts {
                    display.print_host(host);
                }
                let summaries: Vec<HostSummary> = hosts.iter().map(HostSummary::from_host).collect();
                display.print_host_table(&summaries);
            }
        }
        OutputFormat::Json => println!("{}", reporting::to_json(hosts, config.reporting.pretty)?),
        OutputFormat::Csv => print!("{}", reporting::to_csv(hosts)?),
    }

    if let Some(name) = &output_args.save {
        let mut reporting = config.reporting.clone();
        if let Some(dir) = &output_args.output {
            reporting.output_dir = dir.clone();
        }
        let base_name = name
            .clone()
            .unwrap_or_else(|| format!("nmap-{}", time::file_stamp(chrono::Utc::now())));

        let files: Vec<PathBuf> = ReportGenerator::new(reporting)
            .generate_report(hosts, &base_name)
            .await?;
        for file in files {
            display.print_success(&format!("Report saved to {}", file.display()));
        }
    }

    Ok(())
}
