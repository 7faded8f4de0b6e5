use super::commands::{Command, HELP_TEXT, is_command_line, parse_command};
use super::theme::Theme;
use crate::chat::{
    ChatSession, ConversationTurn, GREETING, NO_DATASET_NOTICE, RequestKind, TurnOutcome,
    TurnReport, UPLOAD_FAILED_NOTICE, handle_turn, upload_dataset,
};
use crate::config::ThemeToken;
use crate::dataset::{PREVIEW_ROWS, preview_table};
use crate::llm::openai::OpenAiProvider;
use crate::python::{PythonSession, RenderedPlot};
use crate::trace::SessionTrace;
use anyhow::{Result, anyhow};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::path::{Path, PathBuf};

pub const USER_PROMPT: &str = "you> ";

pub struct AppState {
    pub session_id: String,
    pub chat: ChatSession,
    pub python: PythonSession,
    pub llm: Option<OpenAiProvider>,
    pub trace: SessionTrace,
    pub theme: Theme,
    pub plot_dir: PathBuf,
    pub startup_message: Option<String>,
    pub plots_written: usize,
}

impl AppState {
    fn info(&self, text: &str) {
        println!("{}", self.theme.paint(ThemeToken::SystemInfo, text));
    }

    fn error(&self, text: &str) {
        println!("{}", self.theme.paint(ThemeToken::SystemError, text));
    }

    fn notice(&self, text: &str) {
        self.trace.log_notice(text);
        println!("{}", self.theme.paint(ThemeToken::Notice, text));
    }

    fn save_plot(&mut self, png: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.plot_dir).map_err(|err| {
            anyhow!(
                "Failed to create plot directory {}: {err}",
                self.plot_dir.display()
            )
        })?;
        let path = self
            .plot_dir
            .join(plot_file_name(&self.session_id, self.plots_written + 1));
        fs::write(&path, png)
            .map_err(|err| anyhow!("Failed to write plot {}: {err}", path.display()))?;
        self.plots_written += 1;
        Ok(path)
    }
}

pub async fn run_repl(state: &mut AppState) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    print_banner(state);

    loop {
        let prompt = state.theme.paint(ThemeToken::UserPrompt, USER_PROMPT);
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    break;
                }

                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if is_command_line(line) {
                    handle_command(state, line);
                } else {
                    handle_chat(state, line).await;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn print_banner(state: &AppState) {
    if let Some(message) = &state.startup_message {
        state.info(message);
    }
    if state.llm.is_none() {
        state.info(
            "Assistant unavailable until OPENAI_API_KEY is set in your shell, .env file or config.",
        );
    }
    match state.chat.active_dataset() {
        Some(dataset) => state.info(&format!("Active dataset: {}", dataset.name())),
        None => state.info("No dataset loaded. Use /load <file.csv> to add one."),
    }
    state.info("Type /help for commands and the prompt guide.");
    println!("{}", state.theme.paint(ThemeToken::AssistantText, GREETING));
}

async fn handle_chat(state: &mut AppState, line: &str) {
    state.trace.log_user_input(line);
    state.trace.log_route(RequestKind::classify(line).label());

    let report = handle_turn(&mut state.chat, state.llm.as_ref(), &state.python, line).await;
    let TurnReport { outcome, .. } = match report {
        Ok(report) => report,
        Err(err) => {
            state.trace.log_error(&format!("{err:#}"));
            state.error(&format!("Assistant request failed: {err}"));
            return;
        }
    };

    match outcome {
        TurnOutcome::Reply(text) => {
            state.trace.log_assistant(&text);
            println!("{}", state.theme.paint(ThemeToken::AssistantText, &text));
        }
        TurnOutcome::Plot { message, plot } => {
            state.trace.log_assistant(&message);
            println!("{}", state.theme.paint(ThemeToken::AssistantText, &message));
            show_plot(state, line, &plot);
        }
        TurnOutcome::Notice(text) => state.notice(&text),
        TurnOutcome::Failed { notice, detail } => {
            state.trace.log_error(&detail);
            state.notice(&notice);
        }
    }
}

fn show_plot(state: &mut AppState, prompt: &str, plot: &RenderedPlot) {
    if !plot.stdout.is_empty() {
        print!("{}", plot.stdout);
    }
    if !plot.stderr.is_empty() {
        eprint!("{}", plot.stderr);
    }

    let caption = plot_caption(&plot.plot_kind, prompt);
    println!("{}", state.theme.paint(ThemeToken::PlotCaption, &caption));

    match state.save_plot(&plot.png) {
        Ok(path) => {
            state.trace.log_plot(&path, plot.png.len());
            state.info(&format!("Plot saved to {}", path.display()));
        }
        Err(err) => {
            state.trace.log_error(&err.to_string());
            state.error(&err.to_string());
        }
    }

    if let Some(reasoning) = plot.reasoning.as_deref().filter(|r| !r.trim().is_empty()) {
        state.info(&format!("Reasoning: {reasoning}"));
    }
}

fn handle_command(state: &mut AppState, line: &str) {
    state.trace.log_command(line);

    let command = match parse_command(line) {
        Ok(command) => command,
        Err(err) => {
            state.error(err.message());
            return;
        }
    };

    match command {
        Command::Help => state.info(HELP_TEXT),
        Command::Datasets => state.info(&format_dataset_list(&state.chat)),
        Command::Use { name } => {
            if state.chat.use_dataset(&name) {
                state.info(&format!("Active dataset: {name}"));
            } else {
                state.error(&format!("unknown dataset '{name}'. Try /datasets"));
            }
        }
        Command::Load { path } => {
            match upload_dataset(&mut state.chat, &state.python, Path::new(&path)) {
                Ok(name) => {
                    let summary = state
                        .chat
                        .dataset(&name)
                        .map(|d| format!(" ({} rows, {} columns)", d.row_count(), d.column_count()))
                        .unwrap_or_default();
                    state.info(&format!("Loaded dataset {name}{summary}"));
                }
                Err(err) => {
                    state.trace.log_error(&format!("{err:#}"));
                    state.notice(UPLOAD_FAILED_NOTICE);
                }
            }
        }
        Command::Preview { name } => {
            let dataset = match &name {
                Some(name) => state.chat.dataset(name),
                None => state.chat.active_dataset(),
            };
            match (dataset, name) {
                (Some(dataset), _) => {
                    state.info(dataset.name());
                    println!("{}", preview_table(dataset, PREVIEW_ROWS));
                }
                (None, Some(name)) => {
                    state.error(&format!("unknown dataset '{name}'. Try /datasets"))
                }
                (None, None) => state.notice(NO_DATASET_NOTICE),
            }
        }
        Command::History(limit) => state.info(&format_history(state.chat.history(), limit)),
        Command::Trace => state.info(&format!(
            "Trace file: {}",
            state.trace.file_path().display()
        )),
        Command::Code => match state.chat.last_script() {
            Some(script) => println!("{}", state.theme.paint(ThemeToken::CodeBlock, script)),
            None => state.info("No plot has been generated yet."),
        },
    }
}

pub fn plot_file_name(session_id: &str, index: usize) -> String {
    format!("plot-{session_id}-{index}.png")
}

pub fn plot_caption(plot_kind: &str, prompt: &str) -> String {
    format!("[{plot_kind}] {prompt}")
}

fn format_dataset_list(chat: &ChatSession) -> String {
    if chat.datasets().is_empty() {
        return "No datasets loaded.".to_string();
    }

    let active = chat.active_dataset().map(|d| d.name());
    chat.datasets()
        .iter()
        .map(|dataset| {
            let marker = if Some(dataset.name()) == active { '*' } else { ' ' };
            format!(
                "{marker} {} ({} rows, {} columns)",
                dataset.name(),
                dataset.row_count(),
                dataset.column_count()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_history(turns: &[ConversationTurn], limit: Option<usize>) -> String {
    let skip = limit.map_or(0, |n| turns.len().saturating_sub(n));
    turns
        .iter()
        .skip(skip)
        .map(|turn| {
            let role = turn.role.label();
            match (&turn.image, &turn.prompt) {
                (Some(image), prompt) => format!(
                    "{role}: {} [plot: {} bytes, prompt: {}]",
                    turn.content,
                    image.len(),
                    prompt.as_deref().unwrap_or("")
                ),
                (None, _) => format!("{role}: {}", turn.content),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
