// src/main.rs
//! Route Handoff - multi-leg navigation runner

use anyhow::Context;
use clap::{Parser, Subcommand};
use route_handoff::{
    config::{NavConfig, RouterKind},
    display::{self, terminal::TerminalDisplay, DisplayMode},
    navigator::{Navigator, Outcome},
    plan::{PlanConfig, RoutePlanner},
    simulation::{BacktrackConfig, DeviationConfig},
    waypoint::{load_waypoints, ExportFormat, PlanExporter},
    RoutePlan,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "route-handoff", version, about = "Multi-leg turn-by-turn navigation with route handoff")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Routing service (overrides the config file)
    #[arg(long, global = true, value_enum)]
    router: Option<RouterKind>,

    /// OSRM base URL; selects the OSRM router
    #[arg(long, global = true)]
    osrm_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a plan and navigate it with simulated locations
    Navigate(NavigateArgs),
    /// Resolve a plan and print a summary of its legs
    Plan {
        plan: PathBuf,
    },
    /// Resolve a plan and write its legs to a file
    Export {
        plan: PathBuf,
        #[arg(long, value_enum, default_value = "geojson")]
        format: ExportFormat,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decode a serialized waypoint list and print it
    Waypoints {
        file: PathBuf,
    },
    /// Show or change the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct NavigateArgs {
    plan: PathBuf,

    #[arg(long)]
    speed_multiplier: Option<f64>,

    /// Real time between simulation steps, in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    #[arg(long, value_enum, default_value = "log")]
    display: DisplayMode,

    /// Report a backward jump once this far into a leg (meters)
    #[arg(long, requires = "backtrack_distance")]
    backtrack_at: Option<f64>,

    #[arg(long, requires = "backtrack_at")]
    backtrack_distance: Option<f64>,

    /// Leave the route once this far into a leg (meters)
    #[arg(long, requires = "deviate_offset")]
    deviate_at: Option<f64>,

    #[arg(long, requires = "deviate_at")]
    deviate_offset: Option<f64>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Store the routing service to use by default, with --osrm-url for OSRM
    SetRouter {
        #[arg(value_enum)]
        router: RouterKind,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Failures are reported here and nowhere else
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = NavConfig::load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable config: {}", e);
        NavConfig::default()
    });
    let osrm_url = cli.osrm_url.clone();
    config.apply_router_overrides(cli.router, cli.osrm_url)?;

    match cli.command {
        Command::Navigate(args) => navigate(config, args).await,
        Command::Plan { plan } => {
            let plan_config = load_plan_config(&plan, &config)?;
            let resolved = resolve(&plan_config, &config).await?;
            let summary = resolved.summary(plan_config.gap_tolerance());
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Export {
            plan,
            format,
            output,
        } => {
            let plan_config = load_plan_config(&plan, &config)?;
            let resolved = resolve(&plan_config, &config).await?;
            PlanExporter::new(&resolved)
                .export_to_file(&output, format)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Exported {} leg(s) as {} to {}",
                resolved.len(),
                format.display_name(),
                output.display()
            );
            Ok(())
        }
        Command::Waypoints { file } => {
            let waypoints = load_waypoints(&file)
                .with_context(|| format!("failed to load waypoints from {}", file.display()))?;
            for (i, wp) in waypoints.iter().enumerate() {
                println!(
                    "{:>3}  {:>11.6} {:>11.6}  accuracy: {:>6}  separates legs: {:<5}  {}",
                    i,
                    wp.location.latitude,
                    wp.location.longitude,
                    wp.coordinate_accuracy
                        .map_or_else(|| "-".to_string(), |a| format!("{:.0} m", a)),
                    wp.separates_legs,
                    wp.name.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", NavConfig::get_config_path()?.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::SetRouter { router } => {
                config.apply_router_overrides(Some(router), osrm_url)?;
                config.save()?;
                println!("Router set to {}", config.router);
                Ok(())
            }
        },
    }
}

fn load_plan_config(path: &Path, config: &NavConfig) -> anyhow::Result<PlanConfig> {
    config
        .load_plan(path)
        .with_context(|| format!("failed to load plan {}", path.display()))
}

async fn resolve(plan_config: &PlanConfig, config: &NavConfig) -> anyhow::Result<RoutePlan> {
    let router = config.build_router()?;
    info!("Resolving {} leg(s) via {}", plan_config.legs.len(), router.name());
    let plan = RoutePlanner::new(router.as_ref())
        .resolve(plan_config)
        .await
        .context("failed to resolve route plan")?;
    info!(
        "Resolved {} leg(s), {:.0} m {}",
        plan.len(),
        plan.total_distance_m(),
        plan.profile()
    );
    Ok(plan)
}

async fn navigate(mut config: NavConfig, args: NavigateArgs) -> anyhow::Result<()> {
    if let Some(multiplier) = args.speed_multiplier {
        config.simulation.speed_multiplier = multiplier;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.simulation.tick_ms = tick_ms;
    }
    if let (Some(at_m), Some(distance_m)) = (args.backtrack_at, args.backtrack_distance) {
        config.simulation.backtrack = Some(BacktrackConfig { at_m, distance_m });
    }
    if let (Some(at_m), Some(offset_m)) = (args.deviate_at, args.deviate_offset) {
        config.simulation.deviation = Some(DeviationConfig { at_m, offset_m });
    }

    let plan_config = load_plan_config(&args.plan, &config)?;
    let plan = resolve(&plan_config, &config).await?;

    let navigator = Navigator::new();

    // Set up Ctrl+C handler
    let running = navigator.running_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            running.store(false, Ordering::Relaxed);
        }
    });

    let display_task = match args.display {
        DisplayMode::Terminal if display::can_use_terminal() => {
            let status = navigator.status_handle();
            let running = navigator.running_handle();
            Some(tokio::spawn(async move {
                TerminalDisplay::new().run(status, running).await
            }))
        }
        DisplayMode::Terminal => {
            warn!("stdout is not a terminal; falling back to log output");
            None
        }
        DisplayMode::Log => None,
    };

    let report = navigator.run(plan, config.simulation.clone()).await;
    navigator.stop();
    if let Some(task) = display_task {
        task.await.context("display task panicked")??;
    }
    let report = report?;

    match report.outcome {
        Outcome::Arrived => println!(
            "Navigation {}: {}/{} leg(s), {} backward step(s)",
            report.outcome, report.legs_completed, report.leg_count, report.monotonicity_violations
        ),
        Outcome::Halted | Outcome::Interrupted => println!(
            "Navigation {} on leg {}/{}",
            report.outcome,
            report.legs_completed + 1,
            report.leg_count
        ),
    }
    Ok(())
}
