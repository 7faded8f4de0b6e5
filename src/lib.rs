pub mod chat;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod http;
pub mod llm;
pub mod prompt;
pub mod python;
pub mod trace;

use anyhow::{Context, Result, anyhow, bail};
use chat::{ChatSession, add_dataset};
use cli::theme::Theme;
use cli::{AppState, CliArgs, run_repl};
use config::AppConfig;
use dataset::{Dataset, dataset_name_from_path};
use http::client::HttpClient;
use http::debug::HttpDebugConfig;
use llm::openai::OpenAiProvider;
use python::{ExecOutcome, PythonSession};
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;
use trace::{SessionTrace, resolve_state_dir_from_env};

const PLOT_DIR_NAME: &str = "plots";

pub async fn run(args: CliArgs) -> Result<()> {
    if args.smoke_python {
        return smoke_python();
    }

    let config = AppConfig::load_with_path(args.config.as_deref())?;
    let python = PythonSession::initialize()?
        .with_render_timeout(config.render_timeout_seconds as f64);
    let startup_message = run_startup_script(&python, &config)?;

    let mut chat = ChatSession::new();
    preload_datasets(&mut chat, &python, &config, &args.datasets)?;

    let session_id = generate_session_id();
    let trace = SessionTrace::create(&session_id)?;
    let http = HttpClient::new(
        reqwest::Client::new(),
        HttpDebugConfig::from_verbose(args.verbose),
    )
    .with_trace(trace.clone());
    let llm = OpenAiProvider::new(
        http,
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    )
    .ok();
    let plot_dir = match args.plot_dir.clone().or_else(|| config.plot_dir.clone()) {
        Some(dir) => dir,
        None => resolve_state_dir_from_env()?.join(PLOT_DIR_NAME),
    };

    let mut app_state = AppState {
        session_id,
        chat,
        python,
        llm,
        trace,
        theme: Theme::for_stdout(&config.theme),
        plot_dir,
        startup_message,
        plots_written: 0,
    };

    run_repl(&mut app_state).await
}

fn smoke_python() -> Result<()> {
    let python = PythonSession::initialize()?;
    println!("smoke-python: ok");
    if python.plotting_available()? {
        println!("smoke-python: plotting available");
    } else {
        println!("smoke-python: plotting unavailable (pandas and matplotlib must be importable)");
    }
    Ok(())
}

/// Config datasets first, then CLI datasets; the first one loaded is active.
/// Any failure here aborts startup.
fn preload_datasets(
    chat: &mut ChatSession,
    python: &PythonSession,
    config: &AppConfig,
    cli_paths: &[PathBuf],
) -> Result<()> {
    let mut sources: Vec<(String, PathBuf)> = config
        .datasets
        .iter()
        .map(|source| (source.name.clone(), source.path.clone()))
        .collect();
    for path in cli_paths {
        let name = dataset_name_from_path(path)
            .ok_or_else(|| anyhow!("Failed to load dataset {}: invalid file name", path.display()))?;
        sources.push((name, path.clone()));
    }

    for (name, path) in sources {
        let dataset = Dataset::from_path(name, &path)
            .map_err(|err| anyhow!("Failed to load dataset {}: {err}", path.display()))?;
        add_dataset(chat, python, dataset)?;
    }
    Ok(())
}

const IMPLICIT_STARTUP_FILE: &str = "startup.py";

/// The configured `startup_file`, else `startup.py` next to the default
/// config file. An explicit `--config` disables the implicit lookup.
fn startup_script_path(config: &AppConfig) -> Option<PathBuf> {
    if let Some(path) = &config.startup_file {
        return Some(path.clone());
    }
    if config.config_is_explicit {
        return None;
    }
    config
        .config_path
        .parent()
        .map(|dir| dir.join(IMPLICIT_STARTUP_FILE))
        .filter(|path| path.is_file())
}

fn run_startup_script(python: &PythonSession, config: &AppConfig) -> Result<Option<String>> {
    let Some(path) = startup_script_path(config) else {
        return Ok(None);
    };
    let source = fs::read_to_string(&path)
        .with_context(|| format!("Failed to load startup file {}", path.display()))?;

    if let ExecOutcome::Failed { exception, .. } = python.exec_code(&source)? {
        bail!(
            "Failed to execute startup file {}:\n{}",
            path.display(),
            exception.traceback
        );
    }
    Ok(Some(format!("Startup file {} was executed", path.display())))
}

/// `<unix millis>-<pid>`, both lowercase hex.
fn generate_session_id() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("{millis:x}-{:x}", std::process::id())
}
