//! uiawait - wait for UI state in the host application from the shell

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use uia_harness::tree::{HostApplication, TreeScope};
use uia_harness::{
    ButtonExpectation, ButtonState, Harness, HarnessConfig, HarnessError, RibbonController,
    UiaBridge,
};

#[derive(Parser)]
#[command(name = "uiawait")]
#[command(
    author,
    version,
    about = "Wait for UI state in the host application"
)]
struct Cli {
    /// Harness configuration file (JSON); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Timeout in milliseconds (default: the configured timeout for the wait)
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Element to look for, by automation id or by name.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Automation id
    #[arg(long)]
    id: Option<String>,

    /// Element name (case-insensitive)
    #[arg(long)]
    name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for an element to appear anywhere under the main window
    Element {
        #[command(flatten)]
        target: Target,
    },

    /// Wait for a top-level window or pane to disappear
    Gone {
        #[command(flatten)]
        target: Target,
    },

    /// Wait until no modal dialog is open
    ModalGone,

    /// Wait for a grid to populate and settle, then print its row count
    Grid {
        /// Automation id of the grid
        id: String,
    },

    /// Check ribbon button states against a JSON file of name -> state
    States {
        /// e.g. {"Login": "NonVisible", "Logout": "Enabled"}
        expectations: PathBuf,
    },
}

fn main() -> Result<()> {
    init_log();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HarnessConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => HarnessConfig::default(),
    };
    let timeout = cli.timeout.map(Duration::from_millis);

    let bridge = UiaBridge::start(&config.bridge).context("Failed to start the bridge")?;
    let outcome = run(&cli.command, &bridge, config, timeout);
    if let Err(e) = bridge.shutdown() {
        warn!(error = %e, "bridge did not shut down cleanly");
    }
    outcome
}

fn init_log() {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("UIAWAIT_LOG")
                .from_env_lossy(),
        )
        .init();
}

fn run(
    command: &Commands,
    bridge: &UiaBridge,
    mut config: HarnessConfig,
    timeout: Option<Duration>,
) -> Result<()> {
    let root = bridge
        .app_root()
        .context("Failed to get the host's main window")?;
    let wait = timeout.unwrap_or(config.timeouts.web_service_populate);

    match command {
        Commands::Element { target } => {
            let harness = Harness::new(bridge, config.timeouts);
            let element = match (&target.id, &target.name) {
                (Some(id), _) => harness.find_by_id(root, id, TreeScope::Descendants, wait)?,
                (None, Some(name)) => {
                    harness.find_by_name(root, name, TreeScope::Descendants, wait)?
                }
                (None, None) => bail!("Either --id or --name is required"),
            };
            println!("{element}");
        }
        Commands::Gone { target } => {
            let harness = Harness::new(bridge, config.timeouts);
            match (&target.id, &target.name) {
                (Some(id), _) => harness.wait_for_gone_by_id(root, id, wait)?,
                (None, Some(name)) => harness.wait_for_gone_by_name(root, name, wait)?,
                (None, None) => bail!("Either --id or --name is required"),
            }
        }
        Commands::ModalGone => {
            let harness = Harness::new(bridge, config.timeouts);
            harness.wait_for_modal_gone(root, wait)?;
        }
        Commands::Grid { id } => {
            let harness = Harness::new(bridge, config.timeouts);
            let grid = harness.find_by_id(root, id, TreeScope::Descendants, wait)?;
            let rows = harness.wait_for_populated_grid(grid, wait)?;
            println!("{rows}");
        }
        Commands::States { expectations } => {
            let expected = load_expectations(expectations)?;
            if let Some(t) = timeout {
                config.timeouts.control_state_update = t;
            }
            let harness = Harness::new(bridge, config.timeouts);
            let ribbon = RibbonController::locate(&harness, root, config.ribbon)?;
            match ribbon.validate_states(&expected) {
                Ok(()) => println!("{} button states match", expected.len()),
                Err(HarnessError::ButtonStates(report)) => {
                    println!("{report}");
                    bail!("{} button(s) in the wrong state", report.mismatches.len());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn load_expectations(path: &Path) -> Result<ButtonExpectation> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let states: BTreeMap<String, ButtonState> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse '{}'", path.display()))?;
    Ok(ButtonExpectation::from(states))
}
