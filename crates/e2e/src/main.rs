//! JWT Pizza E2E runner - Main Entry Point
//!
//! Runs the declarative storefront scenarios against a mocked backend, lists
//! them, or serves one scenario's mocks for manual work.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use jwt_pizza_e2e::mocks;
use jwt_pizza_e2e::playwright::{Browser, PlaywrightConfig};
use jwt_pizza_e2e::runner::{RunnerConfig, TestRunner};
use jwt_pizza_e2e::server::AppServerConfig;
use jwt_pizza_e2e::Scenario;
use jwt_pizza_mock::{MockServerConfig, MockSession};

/// Mocked-backend browser tests for the JWT Pizza storefront
#[derive(Parser)]
#[command(name = "jwt-pizza-e2e")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding scenario YAML files
    #[arg(long, env = "PIZZA_E2E_SCENARIOS", default_value = "scenarios", global = true)]
    scenarios: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios in a browser
    Run(RunArgs),

    /// List scenarios with their tags and mock counts
    List,

    /// Serve one scenario's mocks until Ctrl-C
    ServeMocks {
        /// Scenario name
        #[arg(long)]
        name: String,

        /// Port to listen on (0 picks a free one)
        #[arg(long, env = "PIZZA_E2E_MOCK_PORT", default_value_t = 0)]
        port: u16,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Only run scenarios carrying this tag
    #[arg(long)]
    tag: Option<String>,

    /// Only run the scenario with this name
    #[arg(long, conflicts_with = "tag")]
    name: Option<String>,

    /// Storefront URL
    #[arg(long, env = "PIZZA_E2E_BASE_URL", default_value = "http://localhost:5173")]
    base_url: String,

    /// Command that starts the storefront; omit to attach to a running one
    #[arg(long, env = "PIZZA_E2E_APP_COMMAND")]
    app_command: Option<String>,

    /// Storefront checkout (working directory and node_modules)
    #[arg(long, env = "PIZZA_E2E_APP_DIR", default_value = ".")]
    app_dir: PathBuf,

    #[arg(long, env = "PIZZA_E2E_BROWSER", value_enum, default_value_t = Browser::Chromium)]
    browser: Browser,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Directory for test-results.json
    #[arg(long, env = "PIZZA_E2E_OUTPUT", default_value = "test-results")]
    output: PathBuf,

    /// Default timeout for each action and assertion
    #[arg(long, env = "PIZZA_E2E_STEP_TIMEOUT_MS", default_value_t = 5000)]
    step_timeout_ms: u64,

    /// Upper bound on a single mock handler
    #[arg(long, env = "PIZZA_E2E_HANDLER_TIMEOUT_MS", default_value_t = 5000)]
    handler_timeout_ms: u64,
}

impl RunArgs {
    fn runner_config(&self, scenarios_dir: PathBuf) -> RunnerConfig {
        RunnerConfig {
            app: AppServerConfig {
                base_url: self.base_url.clone(),
                command: self.app_command.clone(),
                working_dir: self.app_dir.clone(),
                ..Default::default()
            },
            playwright: PlaywrightConfig {
                base_url: self.base_url.clone(),
                project_dir: self.app_dir.clone(),
                browser: self.browser,
                headless: !self.headed,
                step_timeout_ms: self.step_timeout_ms,
                ..Default::default()
            },
            mock: MockServerConfig {
                handler_timeout: Duration::from_millis(self.handler_timeout_ms),
                ..Default::default()
            },
            scenarios_dir,
            output_dir: self.output.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every scenario passed
async fn execute(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run(args) => {
            let mut runner = TestRunner::with_config(args.runner_config(cli.scenarios));

            // An empty selection is a harness error, not a passing run
            let suite = match (&args.name, &args.tag) {
                (Some(name), _) => runner.run_named(name).await?,
                (None, Some(tag)) => runner.run_tagged(tag).await?,
                (None, None) => runner.run_all().await?,
            };

            runner.write_results(&suite)?;
            runner.stop_app()?;
            Ok(suite.success())
        }
        Commands::List => {
            let scenarios = Scenario::load_all(&cli.scenarios)?;
            println!("{:<24} {:<28} {:>5} {:>5}", "NAME", "TAGS", "MOCKS", "STEPS");
            for scenario in &scenarios {
                println!(
                    "{:<24} {:<28} {:>5} {:>5}",
                    scenario.name,
                    scenario.tags.join(","),
                    scenario.mocks.len(),
                    scenario.steps.len()
                );
            }
            Ok(true)
        }
        Commands::ServeMocks { name, port } => {
            let scenario = Scenario::load_all(&cli.scenarios)?
                .into_iter()
                .find(|s| s.name == name)
                .ok_or_else(|| anyhow::anyhow!("scenario not found: {}", name))?;

            mocks::validate_contract(&scenario)?;
            let routes = mocks::compile(&scenario)?;
            let config = MockServerConfig {
                bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
                ..Default::default()
            };
            let session = MockSession::start_with(config, routes).await?;

            println!("Serving mocks for '{}' at {}", scenario.name, session.base_url());
            println!("Send the page's original URL in the x-mock-original-url header. Ctrl-C to stop.");

            tokio::signal::ctrl_c().await?;

            for record in session.records() {
                info!(
                    "#{} {} {} -> {}",
                    record.request.seq,
                    record.request.method,
                    record.request.url,
                    record
                        .status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            let clean = session.verify().is_ok();
            session.shutdown().await;
            Ok(clean)
        }
    }
}
