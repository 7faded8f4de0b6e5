use std::fmt;
use std::future::Future;

/// What gets sent for one turn. An empty `system_instruction` is still sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPrompt {
    pub system_instruction: String,
    pub user_message: String,
}

impl ModelPrompt {
    pub fn new(system_instruction: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            user_message: user_message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    MissingApiKey,
    /// Non-2xx answer; `body` is cut to a short prefix.
    Status { code: u16, body: String },
    Transport(String),
    Decode(String),
    /// No choice came back, or the choice had no `content`.
    BlankReply,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => f.write_str("no OpenAI API key configured"),
            Self::Status { code, body } => {
                write!(f, "model request failed with status {code}: {body}")
            }
            Self::Transport(msg) => write!(f, "could not reach model endpoint: {msg}"),
            Self::Decode(msg) => write!(f, "could not decode model response: {msg}"),
            Self::BlankReply => f.write_str("model reply contained no text"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type ModelResult<T> = Result<T, ModelError>;

pub trait ChatModel {
    fn complete(&self, prompt: ModelPrompt) -> impl Future<Output = ModelResult<ModelReply>> + Send;
}
