#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Datasets,
    Use { name: String },
    Load { path: String },
    Preview { name: Option<String> },
    History(Option<usize>),
    Trace,
    Code,
}

/// A rejected slash command; the message is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandError(String);

impl CommandError {
    fn usage(form: &str) -> Self {
        Self(format!("usage: {form}"))
    }

    pub(crate) fn message(&self) -> &str {
        &self.0
    }
}

pub(crate) const HELP_TEXT: &str = "Available commands:
  /help                Show this command list
  /datasets            List loaded datasets (* marks the active one)
  /use <name>          Switch the active dataset
  /load <file.csv>     Load a CSV file as a new dataset
  /preview [name]      Show the first rows of a dataset
  /history [n]         Show the conversation (or last n turns)
  /trace               Show path to the current trace file
  /code                Show the script behind the last plot
  exit | quit          Leave the session

Prompt guide:
  Explore: ...         Get suggested prompts for the active dataset
  Show: ...            Generate a plot from your request
  Describe: ...        Describe the plot that was just generated";

pub(crate) fn parse_command(line: &str) -> Result<Command, CommandError> {
    let body = line
        .strip_prefix('/')
        .ok_or_else(|| CommandError("not a command".to_string()))?
        .trim_end();
    let (name, arg) = body
        .split_once(char::is_whitespace)
        .map_or((body, ""), |(name, arg)| (name, arg.trim()));
    if name.is_empty() {
        return Err(CommandError("empty command. Try /help".to_string()));
    }
    let name = name.to_ascii_lowercase();
    let arg = (!arg.is_empty()).then_some(arg);

    match (name.as_str(), arg) {
        ("help", None) => Ok(Command::Help),
        ("datasets", None) => Ok(Command::Datasets),
        ("trace", None) => Ok(Command::Trace),
        ("code", None) => Ok(Command::Code),
        ("help" | "datasets" | "trace" | "code", Some(_)) => {
            Err(CommandError::usage(&format!("/{name}")))
        }
        ("use", Some(dataset)) => Ok(Command::Use {
            name: dataset.to_string(),
        }),
        ("use", None) => Err(CommandError::usage("/use <name>")),
        ("preview", dataset) => Ok(Command::Preview {
            name: dataset.map(str::to_string),
        }),
        ("history", None) => Ok(Command::History(None)),
        ("history", Some(count)) => match count.parse::<usize>() {
            Ok(0) => Err(CommandError::usage("/history [n] (n must be >= 1)")),
            Ok(count) => Ok(Command::History(Some(count))),
            Err(_) => Err(CommandError::usage("/history [n]")),
        },
        ("load", Some(path)) if path.to_ascii_lowercase().ends_with(".csv") => {
            Ok(Command::Load {
                path: path.to_string(),
            })
        }
        ("load", Some(_)) => Err(CommandError::usage("/load <file.csv>")),
        ("load", None) => Err(CommandError(
            "missing file argument. usage: /load <file.csv>".to_string(),
        )),
        _ => Err(CommandError(format!("unknown command '/{name}'. Try /help"))),
    }
}

/// Only lines starting with `/` in the first column are commands.
pub(crate) fn is_command_line(line: &str) -> bool {
    line.starts_with('/')
}
