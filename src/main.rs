use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use port_reach::cert::{self, CertCheckConfig};
use port_reach::logging::{self, LogConfig};
use port_reach::ports;
use port_reach::scanner;
use port_reach::services::{ServiceRegistry, DEFAULT_SERVICES_PATH};
use port_reach::types::{ScanConfig, ScanReport, ScanTarget};

use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// port-reach — concurrent TCP connect port scanner with a TLS certificate expiry check.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "port-reach",
    version,
    about = "Concurrent TCP connect port scanner with a TLS certificate expiry check.",
    long_about = None
)]
struct Cli {
    /// Log level for stderr diagnostics (RUST_LOG takes precedence).
    #[arg(long = "log-level", global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scan a host for open TCP ports.
    Scan(ScanArgs),
    /// Show when a host's TLS certificate expires.
    Cert(CertArgs),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Hostname or IP address to scan.
    host: String,

    /// Path to ports file (whitespace separated ports, `a-b` ranges, `#` comments).
    #[arg(long, default_value = "ports.txt")]
    ports: PathBuf,

    /// Number of workers; ports are split into this many contiguous chunks.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_WORKERS)]
    workers: usize,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 500)]
    timeout_ms: u64,

    /// Upper bound for the whole scan in seconds.
    #[arg(long = "scan-timeout-secs", default_value_t = 70)]
    scan_timeout_secs: u64,

    /// Print a live progress line.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Services file used to annotate open ports.
    #[arg(long, default_value = DEFAULT_SERVICES_PATH)]
    services: PathBuf,

    /// Write the scan report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CertArgs {
    /// Hostname whose certificate to check.
    host: String,

    #[arg(long, default_value_t = 443)]
    port: u16,

    /// Deadline for connect plus handshake in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 3000)]
    timeout_ms: u64,

    /// Accept self-signed or otherwise unverifiable certificates.
    #[arg(long, default_value_t = false)]
    insecure: bool,

    /// Print the result as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(LogConfig::new().level(cli.log_level.clone()));

    match cli.command {
        Command::Scan(args) => run_scan(args).await,
        Command::Cert(args) => run_cert(args).await,
    }
}

async fn run_scan(args: ScanArgs) -> Result<()> {
    // Everything that can be wrong with the input fails before any packet is sent.
    let port_list = ports::load_ports_from_path(&args.ports)
        .with_context(|| format!("invalid ports file {}", args.ports.display()))?;
    let config = ScanConfig::new(args.workers)?
        .connect_timeout(Duration::from_millis(args.timeout_ms))
        .scan_timeout(Duration::from_secs(args.scan_timeout_secs))
        .verbose(args.verbose);
    let target = ScanTarget::resolve(&args.host, port_list)
        .await
        .with_context(|| format!("cannot scan {}", args.host))?;

    print_banner(&target, &config);

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let report = scanner::scan_with_cancel(&target, &config, cancel).await;
    if !report.is_complete() {
        let reason = if report.timed_out {
            format!("scan deadline of {}s reached", args.scan_timeout_secs)
        } else {
            String::from("scan interrupted")
        };
        eprintln!(
            "Warning: {} after {} of {} ports; results are partial.",
            reason, report.scanned_done, report.scanned_total
        );
    }

    let services = ServiceRegistry::load(&args.services);
    if services.is_empty() {
        debug!(path = %args.services.display(), "no service names, ports left unannotated");
    } else {
        debug!(entries = services.len(), "loaded service names");
    }
    print_open_ports(&report, &services);

    if let Some(path) = args.output.as_deref() {
        if let Err(e) = write_report_json(path, &report) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON report to {}", path.display());
        }
    }
    Ok(())
}

async fn run_cert(args: CertArgs) -> Result<()> {
    let config = CertCheckConfig::default()
        .port(args.port)
        .timeout(Duration::from_millis(args.timeout_ms))
        .accept_invalid_certs(args.insecure);
    let info = cert::check_expiry_with(&args.host, &config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    println!("{info}");
    let left = info.remaining();
    if info.is_expired() {
        println!("Expired {} days ago", -left.whole_days());
    } else {
        println!(
            "Time remaining: {} days {} hours",
            left.whole_days(),
            left.whole_hours() % 24
        );
    }
    Ok(())
}

fn print_banner(target: &ScanTarget, config: &ScanConfig) {
    let started = OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("<unknown>"));
    println!("{}", "-".repeat(50));
    println!("  target       : {} ({})", target.hostname(), target.address());
    println!("  started at   : {}", started);
    println!("  total ports  : {}", target.ports().len());
    println!("  workers      : {}", config.worker_count());
    println!("  timeout_ms   : {}", config.per_connect_timeout().as_millis());
    println!("{}", "-".repeat(50));
}

fn print_open_ports(report: &ScanReport, services: &ServiceRegistry) {
    let port_w = 5usize;
    println!(
        "\nOpen ports: {} (scanned: {}/{})",
        report.open_ports.len(),
        report.scanned_done,
        report.scanned_total
    );
    for &port in &report.open_ports {
        match services.describe_tcp(port) {
            Some(service) => println!("{:<port_w$}  {}", port, service, port_w = port_w),
            None => println!("{}", port),
        }
    }
}

fn write_report_json(path: &Path, report: &ScanReport) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
