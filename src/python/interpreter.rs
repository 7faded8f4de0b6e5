use anyhow::{Result, anyhow};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyAnyMethods, PyBytes, PyBytesMethods, PyDict, PyDictMethods, PyModule};
use std::ffi::CString;

use super::runtime::{ExceptionInfo, PlotRuntime, RenderError, RenderResult, RenderedPlot};
use crate::dataset::Dataset;

const DEFAULT_RENDER_TIMEOUT_SECONDS: f64 = crate::config::DEFAULT_RENDER_TIMEOUT_SECONDS as f64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Executed(ExecResult),
    Failed {
        stdout: String,
        stderr: String,
        exception: ExceptionInfo,
    },
}

/// Embedded interpreter whose `__main__` namespace is shared by every script
/// run in the session, so imports, `datasets` and figures persist.
pub struct PythonSession {
    main_module: Py<PyModule>,
    render_timeout_seconds: f64,
}

impl PythonSession {
    pub fn initialize() -> Result<Self> {
        Python::attach(|py| -> Result<Self> {
            let main_module = PyModule::import(py, "__main__")?;
            Self::install_runtime_helpers(py, &main_module)?;
            Self::health_check(py, &main_module)?;

            Ok(Self {
                main_module: main_module.unbind(),
                render_timeout_seconds: DEFAULT_RENDER_TIMEOUT_SECONDS,
            })
        })
    }

    /// Zero disables the limit.
    pub fn with_render_timeout(mut self, seconds: f64) -> Self {
        self.render_timeout_seconds = seconds.max(0.0);
        self
    }

    pub fn exec_code(&self, code: &str) -> Result<ExecOutcome> {
        Python::attach(|py| -> Result<ExecOutcome> {
            let main = self.main_module.bind(py);
            let result = Self::call_runtime_helper(main, "_vischat_exec_code", (code,))?;
            let stdout = Self::dict_string(&result, "stdout")?;
            let stderr = Self::dict_string(&result, "stderr")?;
            if Self::result_ok(&result)? {
                Ok(ExecOutcome::Executed(ExecResult { stdout, stderr }))
            } else {
                Ok(ExecOutcome::Failed {
                    stdout,
                    stderr,
                    exception: Self::dict_exception(&result)?,
                })
            }
        })
    }

    /// `repr()` of an expression evaluated in the session namespace.
    pub fn eval_repr(&self, expr: &str) -> Result<String> {
        Python::attach(|py| -> Result<String> {
            let main = self.main_module.bind(py);
            let result = Self::call_runtime_helper(main, "_vischat_eval_expr", (expr,))?;
            if !Self::result_ok(&result)? {
                let exception = Self::dict_exception(&result)?;
                anyhow::bail!("{}", exception.traceback)
            }
            Self::dict_string(&result, "value")
        })
    }

    /// Whether pandas and matplotlib can be imported.
    pub fn plotting_available(&self) -> Result<bool> {
        Python::attach(|py| -> Result<bool> {
            let main = self.main_module.bind(py);
            let result = Self::call_runtime_helper(main, "_vischat_plotting_available", ())?;
            Ok(result.extract()?)
        })
    }

    fn health_check(py: Python<'_>, main_module: &Bound<'_, PyModule>) -> PyResult<()> {
        let globals = main_module.dict();
        let _ = py.eval(c"1 + 1", Some(&globals), Some(&globals))?;
        Ok(())
    }

    fn install_runtime_helpers(py: Python<'_>, main_module: &Bound<'_, PyModule>) -> Result<()> {
        let globals = main_module.dict();
        let helper_code = CString::new(include_str!("runtime_helpers.py"))?;
        py.run(helper_code.as_c_str(), Some(&globals), Some(&globals))?;
        Ok(())
    }

    fn call_runtime_helper<'py, A>(
        main_module: &Bound<'py, PyModule>,
        helper_name: &str,
        args: A,
    ) -> Result<Bound<'py, PyAny>>
    where
        A: pyo3::call::PyCallArgs<'py>,
    {
        let helper = main_module.getattr(helper_name)?;
        Ok(helper.call1(args)?)
    }

    fn result_ok(result: &Bound<'_, PyAny>) -> Result<bool> {
        Ok(Self::dict_item(result, "ok")?.extract()?)
    }

    fn dict_string(result: &Bound<'_, PyAny>, key: &str) -> Result<String> {
        Ok(Self::dict_item(result, key)?.extract()?)
    }

    fn dict_exception(result: &Bound<'_, PyAny>) -> Result<ExceptionInfo> {
        let exception = Self::dict_item(result, "exception")?;
        Ok(ExceptionInfo {
            exc_type: Self::dict_string(&exception, "exc_type")?,
            message: Self::dict_string(&exception, "message")?,
            traceback: Self::dict_string(&exception, "traceback")?,
        })
    }

    fn dict_item<'py>(value: &Bound<'py, PyAny>, key: &str) -> Result<Bound<'py, PyAny>> {
        let dict = value
            .cast::<PyDict>()
            .map_err(|err| anyhow!(err.to_string()))?;
        dict.get_item(key)?
            .ok_or_else(|| anyhow!("missing {key} in helper result"))
    }

    fn read_rendered_plot(result: &Bound<'_, PyAny>) -> Result<RenderedPlot> {
        let value = Self::dict_item(result, "value")?;
        let png = Self::dict_item(&value, "png")?;
        let png = png
            .cast::<PyBytes>()
            .map_err(|err| anyhow!(err.to_string()))?
            .as_bytes()
            .to_vec();

        Ok(RenderedPlot {
            png,
            plot_kind: Self::dict_string(&value, "plot_kind")?,
            reasoning: Self::dict_item(&value, "reasoning")?.extract()?,
            stdout: Self::dict_string(result, "stdout")?,
            stderr: Self::dict_string(result, "stderr")?,
        })
    }

    fn check_ok(result: &Bound<'_, PyAny>) -> RenderResult<()> {
        if Self::result_ok(result).map_err(invalid_shape)? {
            return Ok(());
        }
        let exception = Self::dict_exception(result).map_err(invalid_shape)?;
        Err(RenderError::PythonException(exception))
    }
}

impl PlotRuntime for PythonSession {
    fn register_dataset(&self, dataset: &Dataset) -> RenderResult<()> {
        Python::attach(|py| -> RenderResult<()> {
            let main = self.main_module.bind(py);
            let result = Self::call_runtime_helper(
                main,
                "_vischat_register_dataset",
                (dataset.name(), dataset.source_csv()),
            )
            .map_err(internal)?;
            Self::check_ok(&result)
        })
    }

    fn render_plot(&self, script: &str) -> RenderResult<RenderedPlot> {
        Python::attach(|py| -> RenderResult<RenderedPlot> {
            let main = self.main_module.bind(py);
            let result = Self::call_runtime_helper(
                main,
                "_vischat_render_plot",
                (script, self.render_timeout_seconds),
            )
            .map_err(internal)?;
            Self::check_ok(&result)?;
            Self::read_rendered_plot(&result).map_err(invalid_shape)
        })
    }
}

fn internal(err: impl std::fmt::Display) -> RenderError {
    RenderError::Internal(err.to_string())
}

fn invalid_shape(err: impl std::fmt::Display) -> RenderError {
    RenderError::InvalidResultShape(err.to_string())
}
