use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use tracing::{error, warn};
use ui_scenario::config;
use ui_scenario::logging;
use ui_scenario::scenario;
use ui_scenario::session::{Session, cleanup_old_sessions, list_sessions};
use ui_scenario::{Runner, RunnerConfig, WebDriverClient, browser_capabilities};

/// ui-scenario - declarative browser UI scenarios over WebDriver
#[derive(Parser, Debug)]
#[command(
    name = "ui-scenario",
    about = "Run declarative UI scenarios against a WebDriver browser and collect screenshots",
    after_help = "ENVIRONMENT VARIABLES:\n\
        UI_SCENARIO_WEBDRIVER_URL            WebDriver endpoint URL\n\
        UI_SCENARIO_BROWSER (or BROWSER)     Browser name: chrome, firefox, edge\n\
        UI_SCENARIO_HEADLESS                 Request a headless browser (1/0)\n\
        UI_SCENARIO_SITE_ROOT                Root directory for page targets\n\
        UI_SCENARIO_SCENARIO_DIR             Directory searched for scenario names\n\
        UI_SCENARIO_ARTIFACT_DIR             Base directory for screenshot sessions\n\
        UI_SCENARIO_NAVIGATION_TIMEOUT_MS    Navigate step budget (ms)\n\
        UI_SCENARIO_ACTION_TIMEOUT_MS        Budget for other steps (ms)\n\
        UI_SCENARIO_CLICK_RETRY_BACKOFF_MS   Delay before a click retry (ms, max 500)\n\
        UI_SCENARIO_STRICT_SELECTORS         Fail on ambiguous selectors (1/0)\n\
        RUST_LOG                             Log filter (logs go to stderr)"
)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run scenarios against a browser
    Run {
        /// Scenario files, or names looked up in the scenario directory
        #[arg(required = true)]
        scenarios: Vec<String>,

        /// Browser to drive (chrome, firefox, edge)
        #[arg(long, short = 'b')]
        browser: Option<String>,

        /// Request a headless browser
        #[arg(long)]
        headless: bool,

        /// WebDriver endpoint URL
        #[arg(long)]
        webdriver_url: Option<String>,

        /// Root directory page targets resolve against
        #[arg(long)]
        site_root: Option<PathBuf>,

        /// Write screenshots directly into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail steps whose selector matches more than one element
        #[arg(long)]
        strict_selectors: bool,

        /// Print results as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Delete the session directory when the run ends
        #[arg(long)]
        discard: bool,
    },

    /// Load scenarios and print their steps without running them
    Validate {
        /// Scenario files, or names looked up in the scenario directory
        #[arg(required = true)]
        scenarios: Vec<String>,
    },

    /// List screenshot sessions, optionally removing old ones
    Sessions {
        /// Remove sessions older than this many hours
        #[arg(long)]
        clean_older_than: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_cli(args.verbose);

    match run_command(args.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_command(command: Commands) -> Result<ExitCode, Box<dyn Error>> {
    let cfg = config::get();

    match command {
        Commands::Run {
            scenarios,
            browser,
            headless,
            webdriver_url,
            site_root,
            output,
            strict_selectors,
            json,
            discard,
        } => {
            let scenarios = scenario::load_all(&scenarios, &cfg.paths.scenario_dir)?;

            let browser = browser
                .map(|b| b.to_lowercase())
                .unwrap_or_else(|| cfg.browser.browser.clone());
            let headless = headless || cfg.browser.headless;
            let webdriver_url = webdriver_url.unwrap_or_else(|| cfg.browser.webdriver_url.clone());

            let mut runner_config = RunnerConfig::from_config(cfg);
            if let Some(root) = site_root {
                runner_config = runner_config.site_root(root);
            }
            if strict_selectors {
                runner_config = runner_config.strict_selectors(true);
            }

            // Single scenarios name their session; batches share one
            let session = match output {
                Some(dir) => Session::in_dir(dir),
                None => {
                    let name = match scenarios.as_slice() {
                        [only] => only.name().to_string(),
                        _ => "batch".to_string(),
                    };
                    Session::with_name(&cfg.paths.artifact_dir, &name)
                }
            }
            .keep(!discard)
            .with_browser(&browser);
            session.init()?;

            let mut driver = match WebDriverClient::connect(
                &webdriver_url,
                browser_capabilities(&browser, headless),
            )
            .await
            {
                Ok(driver) => driver,
                Err(e) => {
                    eprintln!("Could not start {} via {}: {}", browser, webdriver_url, e);
                    return Ok(ExitCode::FAILURE);
                }
            };

            let runner = Runner::new(&session, runner_config);
            let batch = runner.run_batch(&scenarios, &mut driver).await;

            if let Err(e) = driver.close().await {
                warn!(error = %e, "failed to close WebDriver session");
            }
            session.write_manifest(&batch.results)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                for result in &batch.results {
                    println!("{}", result);
                    for artifact in result.artifacts() {
                        println!("  {}", artifact.display());
                    }
                }
                println!(
                    "\n{} passed, {} failed. Session: {}",
                    batch.passed(),
                    batch.failed(),
                    session.dir.display()
                );
            }

            Ok(ExitCode::from(batch.exit_code()))
        }

        Commands::Validate { scenarios } => {
            let scenarios = scenario::load_all(&scenarios, &cfg.paths.scenario_dir)?;
            for scenario in &scenarios {
                println!(
                    "{} ({}, {} steps)",
                    scenario.name(),
                    scenario.target_page(),
                    scenario.steps().len()
                );
                for (index, step) in scenario.steps().iter().enumerate() {
                    println!("  {:>2}. {}", index, step);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Sessions { clean_older_than } => {
            let base = &cfg.paths.artifact_dir;
            if let Some(hours) = clean_older_than {
                let removed = cleanup_old_sessions(base, Duration::from_secs(hours * 3600))?;
                println!("Removed {} session(s) older than {}h", removed, hours);
            }
            let sessions = list_sessions(base)?;
            if sessions.is_empty() {
                println!("No sessions under {}", base.display());
            }
            for session in sessions {
                println!("{}", session.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
