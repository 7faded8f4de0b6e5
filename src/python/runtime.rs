use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::dataset::Dataset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub exc_type: String,
    pub message: String,
    pub traceback: String,
}

/// A captured figure. `png` holds the complete PNG file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPlot {
    pub png: Vec<u8>,
    pub plot_kind: String,
    pub reasoning: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    PythonException(ExceptionInfo),
    InvalidResultShape(String),
    Internal(String),
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PythonException(exc) => write!(f, "{}: {}", exc.exc_type, exc.message),
            Self::InvalidResultShape(msg) => write!(f, "invalid runtime result shape: {msg}"),
            Self::Internal(msg) => write!(f, "internal runtime error: {msg}"),
        }
    }
}

impl Error for RenderError {}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// The execution side of a chat session: datasets become dataframes in a
/// shared namespace and generated scripts render against them.
pub trait PlotRuntime {
    fn register_dataset(&self, dataset: &Dataset) -> RenderResult<()>;
    fn render_plot(&self, script: &str) -> RenderResult<RenderedPlot>;
}
