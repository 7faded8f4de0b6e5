mod interpreter;
mod runtime;

pub use interpreter::{ExecOutcome, ExecResult, PythonSession};
pub use runtime::{ExceptionInfo, PlotRuntime, RenderError, RenderResult, RenderedPlot};
