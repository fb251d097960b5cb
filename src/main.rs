use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use relic::devices::{device_selection_options, discover_block_devices};
use relic::error::RecoveryError;
use relic::ext::ExtCatalog;
use relic::io::DiskReader;
use relic::{allocation, extraction, scan, ExtentCatalog, ScanConfig};

#[derive(Parser)]
#[command(name = "relic")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recovers deleted JPEG images from unallocated filesystem clusters")]
struct Cli {
    /// Device node or image file to analyze
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Directory for recovered files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Bytes scanned per free cluster (default: one cluster)
    #[arg(short, long)]
    window: Option<u64>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = ScanConfig {
        window: cli.window,
        ..ScanConfig::default()
    };

    if let (Some(device), Some(output)) = (cli.device, cli.output) {
        run_recovery(&device, &output, &config)
    } else {
        run_interactive_wizard(cli.yes, &config)
    }
}

fn run_interactive_wizard(skip_confirm: bool, config: &ScanConfig) -> Result<()> {
    println!();
    println!("{}", style("Relic - Deleted JPEG Recovery").cyan().bold());
    println!("\n{}", style("Discovering block devices...").cyan());

    let devices = discover_block_devices();

    if devices.is_empty() {
        println!(
            "\n[!] {}",
            style("No block devices found. Are you running as root?").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Found Devices:").green().bold());
    println!();
    for device in &devices {
        println!(
            "{:<12} {:<8} {:>10} {}",
            device.name,
            format!("{}", device.device_type),
            device.size_human(),
            device.path
        );
    }
    println!();

    let theme = ColorfulTheme::default();
    let options = device_selection_options(&devices);

    let selection = Select::with_theme(&theme)
        .with_prompt("Select device for analysis")
        .items(&options)
        .default(0)
        .interact()
        .context("Failed to select device")?;

    let selected = &devices[selection];

    let output_dir: String = Input::with_theme(&theme)
        .with_prompt("Where do you want to save the recovered files?")
        .default("./recovered".to_string())
        .interact_text()
        .context("Failed to get output directory")?;

    println!();
    println!("{}", style("Operation Summary:").cyan().bold());
    println!("Target: {} ({})", selected.path, selected.size_human());
    println!("Output: {}", output_dir);
    println!();

    if !skip_confirm {
        let confirmed = Confirm::with_theme(&theme)
            .with_prompt("Confirm and start recovery?")
            .default(true)
            .interact()
            .context("Failed to confirm")?;

        if !confirmed {
            println!("\nOperation cancelled.");
            return Ok(());
        }
    }

    run_recovery(
        &PathBuf::from(&selected.path),
        &PathBuf::from(&output_dir),
        config,
    )
}

fn run_recovery(device_path: &PathBuf, output_path: &PathBuf, config: &ScanConfig) -> Result<()> {
    println!();

    let reader = DiskReader::open(device_path)?;

    let catalog = match ExtCatalog::open(&reader) {
        Ok(catalog) => catalog,
        Err(e) => {
            return Err(RecoveryError::NoMetadata(e.to_string()))
                .context("Cannot analyze this device")
        }
    };

    let sb = catalog.superblock();
    println!(
        "ext filesystem: {} clusters of {} bytes",
        sb.block_count, sb.block_size
    );

    let (map, report) = allocation::collect_allocation(&catalog)
        .map_err(|e| RecoveryError::NoMetadata(e.to_string()))?;

    if report.files_indexed == 0 && !report.failed_files.is_empty() {
        bail!("extent retrieval failed for every file; nothing to analyze");
    }

    println!(
        "Indexed {} files ({} unreadable), {} of {} clusters allocated",
        report.files_indexed,
        report.failed_files.len(),
        map.allocated_count(),
        map.total_clusters()
    );
    if report.rejected_extents > 0 {
        println!(
            "[!] {} out-of-range extents rejected",
            style(report.rejected_extents).yellow()
        );
    }

    let free_clusters: Vec<_> = map.free_clusters().collect();
    println!("Scanning {} free clusters...", free_clusters.len());

    let pb = ProgressBar::new(free_clusters.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} clusters {msg}")?
            .progress_chars("=>-"),
    );

    let progress = |current: usize, _total: usize| {
        pb.set_position(current as u64);
    };

    let scan_report = scan::scan_free_space(
        &reader,
        &free_clusters,
        catalog.cluster_size(),
        config,
        Some(&progress),
    );

    pb.finish_with_message(format!(
        "found {} artifacts",
        style(scan_report.artifacts.len()).green().bold()
    ));

    if !scan_report.skipped.is_empty() {
        println!(
            "\n[!] {} clusters skipped on read errors",
            style(scan_report.skipped.len()).yellow()
        );
    }

    if scan_report.artifacts.is_empty() {
        println!("\n[!] No recoverable JPEG images found.");
        return Ok(());
    }

    println!();
    println!(
        "Extracting {} artifacts to {:?}...",
        scan_report.artifacts.len(),
        output_path
    );

    let report = extraction::extract_all(&scan_report.artifacts, &reader, output_path)
        .context("Failed to write recovered files")?;

    println!();
    println!("{}", style("Recovery Complete!").green().bold());
    println!("Images extracted: {}", style(report.extracted.len()).green());
    if report.failed > 0 {
        println!("Failed:           {}", style(report.failed).yellow());
    }
    println!("Output folder:    {:?}", output_path);

    Ok(())
}
