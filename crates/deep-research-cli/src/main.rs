use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use deep_research_cli::cli::args::{Args, Command, parse_args, print_help};
use deep_research_cli::config::paths::{self, API_URL_ENV, APP_NAME, VERSION};
use deep_research_cli::logging::init_logging;
use deep_research_cli::modes::PrintOutputMode;
use deep_research_cli::modes::config_mode::{set_config, show_config};
use deep_research_cli::modes::health_mode::render_health;
use deep_research_cli::modes::reports_mode::{run_list_reports, run_show_report};
use deep_research_cli::modes::research_mode::{ResearchModeOptions, Sinks, run_research_mode};
use deep_research_cli::settings::manager::{SettingsManager, load_project_settings};
use deep_research_cli::settings::resolved::{ResolvedSettings, resolve};
use deep_research_core::controller::ResearchController;
use deep_research_core::history::ReportHistory;
use deep_research_http::{ApiClient, ClientOptions, HttpTransport};

fn read_piped_stdin() -> Result<Option<String>, std::io::Error> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut content = String::new();
    stdin.lock().read_to_string(&mut content)?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

fn output_mode(args: &Args) -> PrintOutputMode {
    if args.json {
        PrintOutputMode::Json
    } else {
        PrintOutputMode::Text
    }
}

async fn run(args: Args, cwd: PathBuf) -> anyhow::Result<i32> {
    let base_dir = paths::resolve_base_dir(None);
    let project_dir = paths::project_dir(&cwd);

    let project_settings = load_project_settings(&cwd);
    let mut manager = SettingsManager::new(&base_dir);
    let settings = manager
        .load_and_merge(project_settings.as_ref())
        .context("Failed to load settings")?
        .clone();

    let mut resolved: ResolvedSettings = resolve(&settings, std::env::var(API_URL_ENV).ok(), &args);
    if args.verbose && args.log_level.is_none() {
        resolved.log_level = "debug".to_string();
    }
    init_logging(&resolved.log_level);
    tracing::debug!("Using backend {}", resolved.api_url);

    let mode = output_mode(&args);
    let mut stdout = std::io::stdout();

    if let Command::SetConfig { key, value } = &args.command {
        let dir = if args.local { &project_dir } else { &base_dir };
        set_config(dir, key, value)?;
        eprintln!("Saved {key} to {}", paths::settings_file(dir).display());
        return Ok(0);
    }
    if args.command == Command::ShowConfig {
        show_config(&resolved, &base_dir, &project_dir, mode, &mut stdout)?;
        return Ok(0);
    }

    let client = ApiClient::with_options(
        &resolved.api_url,
        ClientOptions {
            connect_timeout: resolved.connect_timeout,
        },
    )
    .with_context(|| format!("Invalid API URL: {}", resolved.api_url))?;

    match &args.command {
        Command::Health => {
            let health = client.check_health().await;
            let connectivity = render_health(health.as_ref(), mode, &mut stdout)?;
            Ok(if connectivity.is_connected() { 0 } else { 1 })
        }
        Command::ListReports => {
            let mut history = ReportHistory::new(client);
            run_list_reports(&mut history, mode, &mut stdout).await?;
            Ok(0)
        }
        Command::ShowReport(id) => {
            let mut history = ReportHistory::new(client);
            run_show_report(&mut history, id, mode, &mut stdout).await?;
            Ok(0)
        }
        Command::Research => {
            let save_dir = if args.save {
                Some(
                    resolved
                        .output_dir
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(paths::DEFAULT_OUTPUT_DIR_NAME)),
                )
            } else {
                None
            };

            let controller = ResearchController::new(Arc::new(HttpTransport::new(client)));
            let interrupt = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    // No signal handler; never interrupt
                    std::future::pending::<()>().await;
                }
            };

            let mut stderr = std::io::stderr();
            let outcome = run_research_mode(
                &controller,
                ResearchModeOptions {
                    mode,
                    query: args.query(),
                    save_dir,
                },
                interrupt,
                Sinks {
                    progress: &mut stderr,
                    report: &mut stdout,
                },
            )
            .await?;
            Ok(outcome.exit_code())
        }
        Command::ShowConfig | Command::SetConfig { .. } => Ok(0),
    }
}

#[tokio::main]
async fn main() {
    let raw_args = std::env::args().skip(1).collect::<Vec<_>>();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut args = parse_args(&raw_args);

    if args.help {
        print_help(APP_NAME);
        return;
    }
    if args.version {
        println!("{VERSION}");
        return;
    }
    if let Some(error) = &args.error {
        eprintln!("Error: {error}");
        eprintln!("Run '{APP_NAME} --help' for usage.");
        std::process::exit(2);
    }

    if args.command == Command::Research {
        match read_piped_stdin() {
            Ok(Some(stdin_content)) => args.messages.insert(0, stdin_content),
            Ok(None) => {}
            Err(e) => {
                eprintln!("Failed to read stdin: {e}");
                std::process::exit(1);
            }
        }
        if args.query().is_empty() {
            print_help(APP_NAME);
            std::process::exit(2);
        }
    }

    match run(args, cwd).await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
