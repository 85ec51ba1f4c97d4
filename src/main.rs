use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use paydown_plan::plan::{plan_configs_in, plan_name, PlanConfig};
use paydown_plan::{BrowserBuilder, PlanRunner, ReplayConfig};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Generate debt pay-down plans from JSON plan files.
///
/// Each plan's results page is saved as `<output-dir>/<plan name>.html`,
/// where the plan name is the config file name without `.json`.
#[derive(Debug, Parser)]
struct Cli {
    /// Plan config files, or directories of them.
    #[arg(required = true)]
    plans: Vec<PathBuf>,

    /// How to talk to the calculator.
    #[arg(long, value_enum, default_value_t = Mode::Replay)]
    mode: Mode,

    /// Directory the results pages are written to.
    #[arg(long, default_value = "plans")]
    output_dir: PathBuf,

    /// Chrome/Chromium executable (browser mode).
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Show the browser window (browser mode).
    #[arg(long)]
    headed: bool,

    /// Emulate a phone viewport (browser mode).
    #[arg(long)]
    mobile: bool,

    /// Timeout in seconds for requests and element waits.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Post the calculator's form steps directly over HTTP.
    Replay,
    /// Fill the calculator in a Chromium browser.
    Browser,
}

// ─── tracing ─────────────────────────────────────────────────────────────────

/// Honours `RUST_LOG`, defaulting to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn collect_plans(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut plans = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = plan_configs_in(input)
                .with_context(|| format!("listing plan configs in {}", input.display()))?;
            debug!(dir = %input.display(), count = found.len(), "plan directory");
            plans.extend(found);
        } else {
            plans.push(input.clone());
        }
    }
    Ok(plans)
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout_secs);
    let runner = PlanRunner::new(&cli.output_dir);
    let replay = ReplayConfig {
        request_timeout: timeout,
        ..ReplayConfig::default()
    };

    let plans = collect_plans(&cli.plans)?;
    let mut failed = 0usize;
    for path in &plans {
        let name = plan_name(path);
        let plan = PlanConfig::from_path(path)?;
        let outcome = match cli.mode {
            Mode::Replay => runner.run_replay(&replay, &plan, &name).await,
            Mode::Browser => {
                let mut builder = BrowserBuilder::new()
                    .headless(!cli.headed)
                    .mobile(cli.mobile)
                    .timeout(timeout);
                if let Some(chrome) = &cli.chrome_path {
                    builder = builder.chrome_path(chrome);
                }
                runner.run_browser(builder.build_config(), &plan, &name).await
            }
        };
        match outcome {
            Ok(written) => info!(plan = %name, path = %written.display(), "saved"),
            Err(e) => {
                error!(plan = %name, error = %e, "plan failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} plans failed", plans.len());
    }
    Ok(())
}
