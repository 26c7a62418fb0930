//! ipsync entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};

use ipsync::approval::{ApprovalGate, ForceApproval, InteractiveApproval};
use ipsync::config::Config;
use ipsync::device::{DeviceClient, DeviceMutator, RestconfDevice};
use ipsync::inventory::NautobotInventory;
use ipsync::reconcile::Reconciler;
use ipsync::report::CsvReport;
use ipsync::validate::Validator;

#[derive(Debug, Parser)]
#[command(name = "ipsync", version, about = "Sync device interface IPs with Nautobot")]
struct Cli {
    /// Apply changes without asking for confirmation
    #[arg(short, long)]
    force: bool,

    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validation rule file, overrides `rules_path`
    #[arg(long)]
    rules: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Load configuration
    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(rules) = cli.rules {
        cfg.rules_path = rules;
    }
    info!(
        "Starting ipsync against {} (inventory {}), force mode: {}",
        cfg.device.url, cfg.inventory.url, cli.force
    );

    // Rules are fatal before any device contact
    let validator = Validator::load(&cfg.rules_path)?;

    let inventory = NautobotInventory::new(&cfg.inventory, cfg.request_timeout())?;
    let device: Arc<dyn DeviceClient> =
        Arc::new(RestconfDevice::new(&cfg.device, cfg.request_timeout())?);

    let gate: Box<dyn ApprovalGate> = if cli.force {
        Box::new(ForceApproval)
    } else {
        Box::new(InteractiveApproval::stdio())
    };

    let (mut report, report_path) = CsvReport::create(&cfg.report_dir)?;

    let mut reconciler = Reconciler::new(validator, device.clone(), gate)
        .with_policy(cfg.policy.clone())
        .with_mutator(DeviceMutator::new(
            device,
            cfg.device.interface_description.clone(),
        ));

    let summary = reconciler.run(&inventory, &mut report).await?;

    if summary.cancelled {
        warn!("Run cancelled by operator");
    }
    info!(
        "{} devices: {} in sync, {} applied, {} failed, {} skipped, {} invalid",
        summary.devices,
        summary.in_sync,
        summary.applied,
        summary.failed,
        summary.skipped,
        summary.invalid
    );
    info!("Report with {} rows written to {}", report.rows(), report_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn force_flag_short_and_long() {
        assert!(Cli::try_parse_from(["ipsync", "-f"]).unwrap().force);
        assert!(Cli::try_parse_from(["ipsync", "--force"]).unwrap().force);
        assert!(!Cli::try_parse_from(["ipsync"]).unwrap().force);
    }

    #[test]
    fn unknown_flag_is_usage_error() {
        let err = Cli::try_parse_from(["ipsync", "-x"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn config_and_rules_paths() {
        let cli = Cli::try_parse_from([
            "ipsync",
            "--config",
            "/etc/ipsync.toml",
            "--rules",
            "rules.example.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/ipsync.toml")));
        assert_eq!(cli.rules, Some(PathBuf::from("rules.example.json")));
    }
}
