use anyhow::{Context, Result, bail};
use reqwest::header::HeaderMap;
use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::http::debug::Redactor;

const APP_STATE_DIR: &str = "vischat";
const TRACE_DIR_NAME: &str = "traces";
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

#[derive(Debug, Clone, Copy)]
enum Channel {
    UserInput,
    Command,
    Route,
    Assistant,
    Notice,
    Error,
    Plot,
    HttpRequest,
    HttpResponse,
    HttpError,
}

impl Channel {
    fn tag(self) -> &'static str {
        match self {
            Self::UserInput => "chat.in",
            Self::Command => "cmd.in",
            Self::Route => "chat.route",
            Self::Assistant => "chat.out",
            Self::Notice => "chat.notice",
            Self::Error => "chat.err",
            Self::Plot => "plot.out",
            Self::HttpRequest => "ai.http.in",
            Self::HttpResponse => "ai.http.out",
            Self::HttpError => "ai.http.err",
        }
    }
}

/// Append-only record of one chat session: inputs, routes, replies, plots
/// and the model HTTP exchanges. Cloning shares the same file.
#[derive(Clone)]
pub struct SessionTrace {
    shared: Arc<TraceFile>,
}

struct TraceFile {
    path: PathBuf,
    out: Mutex<LineWriter<File>>,
    warned: AtomicBool,
}

impl SessionTrace {
    pub fn create(session_id: &str) -> Result<Self> {
        let dir = resolve_state_dir_from_env()?.join(TRACE_DIR_NAME);
        Self::open_in(&dir, session_id)
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn create_in_temp_dir(session_id: &str, trace_dir: &Path) -> Result<Self> {
        Self::open_in(trace_dir, session_id)
    }

    fn open_in(dir: &Path, session_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create trace directory {}", dir.display()))?;
        let started = OffsetDateTime::now_utc().unix_timestamp();
        let path = dir.join(format!("session-{session_id}-{started}.log"));
        let file = open_private(&path)
            .with_context(|| format!("Failed to create trace file {}", path.display()))?;

        Ok(Self {
            shared: Arc::new(TraceFile {
                path,
                out: Mutex::new(LineWriter::new(file)),
                warned: AtomicBool::new(false),
            }),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.shared.path
    }

    pub fn log_user_input(&self, text: &str) {
        self.record_text(Channel::UserInput, text);
    }

    pub fn log_command(&self, text: &str) {
        self.record_text(Channel::Command, text);
    }

    pub fn log_route(&self, route: &str) {
        self.record(Channel::Route, route);
    }

    pub fn log_assistant(&self, text: &str) {
        self.record_text(Channel::Assistant, text);
    }

    pub fn log_notice(&self, text: &str) {
        self.record_text(Channel::Notice, text);
    }

    pub fn log_error(&self, text: &str) {
        self.record_text(Channel::Error, text);
    }

    pub fn log_plot(&self, path: &Path, byte_len: usize) {
        self.record(
            Channel::Plot,
            &format!("{} ({byte_len} bytes)", path.display()),
        );
    }

    /// `url` is expected to be redacted already. Secret headers are masked here.
    pub fn log_http_request(&self, method: &str, url: &str, headers: &HeaderMap, body: &str) {
        self.record(Channel::HttpRequest, &format!("{method} {url}"));
        self.record_exchange(Channel::HttpRequest, headers, body);
    }

    pub fn log_http_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        self.record(Channel::HttpResponse, &format!("HTTP {status}"));
        self.record_exchange(Channel::HttpResponse, headers, body);
    }

    pub fn log_http_error(&self, message: &str) {
        self.record(Channel::HttpError, message);
    }

    fn record_exchange(&self, channel: Channel, headers: &HeaderMap, body: &str) {
        for (name, value) in headers {
            let shown = Redactor::ALWAYS.header(name.as_str(), value);
            self.record(channel, &format!("{name}: {shown}"));
        }
        self.record_text(channel, body);
    }

    /// Multi-line text becomes one entry per line; empty text is marked.
    fn record_text(&self, channel: Channel, text: &str) {
        if text.is_empty() {
            self.record(channel, "<empty>");
        }
        text.lines().for_each(|line| self.record(channel, line));
    }

    fn record(&self, channel: Channel, line: &str) {
        let stamp = OffsetDateTime::now_utc()
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_default();
        let entry = format!("[{stamp}] [{:<11}] {line}\n", channel.tag());

        let written = match self.shared.out.lock() {
            Ok(mut out) => out.write_all(entry.as_bytes()).is_ok(),
            Err(_) => false,
        };
        if !written && !self.shared.warned.swap(true, Ordering::Relaxed) {
            eprintln!(
                "vischat trace warning: could not write to {}",
                self.shared.path.display()
            );
        }
    }
}

fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path)
}

/// Per-user state directory for traces and rendered plots:
/// `$XDG_STATE_HOME/vischat`, else `~/.local/state/vischat`.
pub fn resolve_state_dir_from_env() -> Result<PathBuf> {
    let xdg_state = std::env::var("XDG_STATE_HOME").ok();
    resolve_state_dir(xdg_state.as_deref(), dirs::home_dir().as_deref())
}

fn resolve_state_dir(xdg_state_home: Option<&str>, home_dir: Option<&Path>) -> Result<PathBuf> {
    let base = match (xdg_state_home.map(str::trim), home_dir) {
        (Some(""), _) => bail!("Failed to resolve state path: XDG_STATE_HOME is set but empty"),
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => home.join(".local").join("state"),
        (None, None) => bail!("Failed to resolve state path: HOME directory is unavailable"),
    };
    Ok(base.join(APP_STATE_DIR))
}
