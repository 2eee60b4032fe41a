use std::path::{Path, PathBuf};
use std::sync::Arc;

use accessaudit_cli::{
    config::{load_config, CliConfig},
    metrics,
    report::{render_records, render_structured},
    Auditor, FixtureBackend, OutputFormat,
};
use accessaudit_core_types::SessionId;
use accessaudit_policy_center::{load_policy_with_options, AuditPolicy, LoadOptions};
use accessaudit_state_center::InMemorySessionStore;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use perceiver_hub::AuditRecord;
use perceiver_visual::crop_spotlight;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// AccessAudit - accessibility audits from what the page shows and what the DOM says
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Metrics server port (set to 0 to disable)
    #[arg(long, default_value_t = 0)]
    metrics_port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one or more URLs in a single session
    Audit(AuditArgs),

    /// Inspect the effective audit policy
    Policy(PolicyArgs),

    /// List the device profiles every audit runs on
    Devices(PolicyFileArgs),
}

#[derive(Args, Clone, Default)]
struct PolicyFileArgs {
    /// Policy file layered over the configured ones (repeatable)
    #[arg(long = "policy", value_name = "FILE")]
    policies: Vec<PathBuf>,
}

#[derive(Args)]
struct AuditArgs {
    /// Pages to audit, in order
    #[arg(required = true)]
    urls: Vec<String>,

    /// Directory of recorded captures (`<device>.json`, optional `<device>.png`)
    #[arg(long, value_name = "DIR")]
    fixtures: Option<PathBuf>,

    /// Session identifier; a fresh one is generated when omitted
    #[arg(long)]
    session: Option<String>,

    /// Print the whole session history instead of the last audit only
    #[arg(long)]
    history: bool,

    /// Write a spotlight crop per finding into this directory
    #[arg(long, value_name = "DIR")]
    spotlights: Option<PathBuf>,

    #[command(flatten)]
    policy: PolicyFileArgs,
}

#[derive(Args)]
struct PolicyArgs {
    #[command(subcommand)]
    command: PolicyCommand,
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Print the effective policy and where each overridden value came from
    Show(PolicyFileArgs),

    /// Check the effective policy without running anything
    Validate(PolicyFileArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_json)?;
    let _metrics_server = metrics::spawn_metrics_server(cli.metrics_port);

    info!("Starting AccessAudit v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref()).await?;

    let result = match cli.command {
        Commands::Audit(args) => cmd_audit(args, &config, cli.output).await,
        Commands::Policy(args) => cmd_policy(args, &config, cli.output),
        Commands::Devices(args) => cmd_devices(args, &config, cli.output),
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_effective_policy(config: &CliConfig, args: &PolicyFileArgs) -> Result<AuditPolicy> {
    let mut paths = config.policy_paths.clone();
    paths.extend(args.policies.iter().cloned());
    for path in &paths {
        if !path.exists() {
            warn!("Policy file not found, skipped: {}", path.display());
        }
    }
    let options = LoadOptions {
        paths,
        include_env: true,
    };
    load_policy_with_options(&options).context("Failed to load policy")
}

async fn cmd_audit(args: AuditArgs, config: &CliConfig, output: OutputFormat) -> Result<()> {
    let fixtures = match args.fixtures.as_ref().or(config.fixtures_dir.as_ref()) {
        Some(dir) => dir.clone(),
        None => bail!("No capture source: pass --fixtures or set fixtures_dir in the config file"),
    };
    if !fixtures.is_dir() {
        bail!("Fixture directory not found: {}", fixtures.display());
    }

    let policy = load_effective_policy(config, &args.policy)?;
    let backend = Arc::new(FixtureBackend::new(&fixtures));
    let auditor = Auditor::new(
        policy,
        backend.clone(),
        backend.clone(),
        backend,
        Arc::new(InMemorySessionStore::new()),
    )
    .context("Invalid audit policy")?;

    let session = args
        .session
        .as_deref()
        .map(SessionId::from)
        .unwrap_or_default();

    let mut last = None;
    for url in &args.urls {
        let record = auditor
            .run_audit(&session, url)
            .await
            .with_context(|| format!("Audit of {url} failed"))?;
        if let Some(dir) = &args.spotlights {
            write_spotlights(&record, &fixtures, dir).await?;
        }
        last = Some(record);
    }

    let records: Vec<Arc<AuditRecord>> = if args.history {
        auditor.get_history(&session)
    } else {
        last.into_iter().collect()
    };
    let refs: Vec<&AuditRecord> = records.iter().map(|r| r.as_ref()).collect();
    print!("{}", render_records(&refs, output, config.explain())?);
    if output != OutputFormat::Human {
        println!();
    }
    Ok(())
}

/// Crops one PNG per finding out of the recorded device screenshots.
async fn write_spotlights(record: &AuditRecord, fixtures: &Path, dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for report in &record.devices {
        let png_path = fixtures.join(format!("{}.png", report.device));
        if report.issues().is_empty() || !png_path.exists() {
            continue;
        }
        let png = tokio::fs::read(&png_path)
            .await
            .with_context(|| format!("Failed to read {}", png_path.display()))?;
        for (rank, issue) in report.issues().iter().enumerate() {
            let Some(region) = &issue.spotlight else {
                continue;
            };
            let crop = match crop_spotlight(&png, region) {
                Ok(crop) => crop,
                Err(err) => {
                    warn!(device = %report.device, %err, "spotlight crop failed");
                    continue;
                }
            };
            let name = format!("{}-{}-{:02}-{}.png", record.id, report.device, rank + 1, issue.kind);
            tokio::fs::write(dir.join(&name), crop)
                .await
                .with_context(|| format!("Failed to write spotlight {name}"))?;
        }
    }
    Ok(())
}

fn cmd_policy(args: PolicyArgs, config: &CliConfig, output: OutputFormat) -> Result<()> {
    match args.command {
        PolicyCommand::Show(files) => {
            let policy = load_effective_policy(config, &files)?;
            if let Some(text) = render_structured(&policy, output)? {
                println!("{text}");
                return Ok(());
            }
            println!("Policy Revision: {}", policy.rev);
            println!();
            println!(
                "Dedup → iou_threshold={}, confidence_floor={}",
                policy.dedup.iou_threshold, policy.dedup.confidence_floor
            );
            println!(
                "Matcher → match_threshold={}, spatial_weight={}, semantic_weight={}, containment_weight={}",
                policy.matcher.match_threshold,
                policy.matcher.spatial_weight,
                policy.matcher.semantic_weight,
                policy.matcher.containment_weight
            );
            let ghost: Vec<&str> = policy
                .classifier
                .ghost_classes
                .iter()
                .map(|class| class.as_str())
                .collect();
            println!(
                "Classifier → overlap_iou={}, min_spacing_css={}, dom_only_confidence={}, ghost_classes=[{}]",
                policy.classifier.overlap_iou,
                policy.classifier.min_spacing_css,
                policy.classifier.dom_only_confidence,
                ghost.join(", ")
            );
            println!(
                "Targets → nested_containment={}, size_mismatch_ratio={}, size_mismatch_max_area_css={}, max_target_css={}x{}",
                policy.classifier.nested_containment,
                policy.classifier.size_mismatch_ratio,
                policy.classifier.size_mismatch_max_area_css,
                policy.classifier.max_target_width_css,
                policy.classifier.max_target_height_css
            );
            println!(
                "Timeouts → device={}ms; Spotlight → padding_px={}; Session → idle_ttl_secs={}",
                policy.timeouts_ms.device, policy.spotlight.padding_px, policy.session.idle_ttl_secs
            );
            println!("Devices → {}", policy.devices.len());

            let mut overridden: Vec<_> = policy
                .provenance
                .values()
                .filter(|p| p.source != accessaudit_policy_center::PolicySource::Builtin)
                .collect();
            overridden.sort_by(|a, b| a.path.cmp(&b.path));
            if !overridden.is_empty() {
                println!();
                println!("Overrides:");
                for entry in overridden {
                    println!("  {} ← {:?}", entry.path, entry.source);
                }
            }
            Ok(())
        }
        PolicyCommand::Validate(files) => {
            let policy = load_effective_policy(config, &files)?;
            policy.validate().context("Policy is invalid")?;
            println!("Policy OK (rev {}, {} devices)", policy.rev, policy.devices.len());
            Ok(())
        }
    }
}

fn cmd_devices(args: PolicyFileArgs, config: &CliConfig, output: OutputFormat) -> Result<()> {
    let policy = load_effective_policy(config, &args)?;
    if let Some(text) = render_structured(&policy.devices, output)? {
        println!("{text}");
        return Ok(());
    }
    for device in &policy.devices {
        let frame = device.frame();
        println!(
            "{:<10} {}x{} css @{}x → {}x{} px, min target {}px",
            device.name,
            device.viewport_width,
            device.viewport_height,
            device.pixel_ratio,
            frame.width,
            frame.height,
            device.min_target_css
        );
    }
    Ok(())
}
