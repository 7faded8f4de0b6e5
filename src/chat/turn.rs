use anyhow::{Result, anyhow};
use std::path::Path;

use super::route::RequestKind;
use super::session::{ChatSession, ConversationTurn};
use crate::dataset::{Dataset, dataset_name_from_path, exploration_summary};
use crate::llm::DESCRIBE_PLOT_PROMPT;
use crate::llm::provider::{ChatModel, ModelPrompt};
use crate::prompt::{assemble_question, build_primer, is_renderable, strip_data_loading_line};
use crate::python::{PlotRuntime, RenderedPlot};

pub const MISSING_API_KEY_NOTICE: &str = "Please add your OpenAI API key to continue.";
pub const NO_SCRIPT_NOTICE: &str = "You haven't created any visualization yet!";
pub const NO_DATASET_NOTICE: &str = "No dataset is loaded. Use /load <file.csv> to add one.";
pub const GENERATION_FAILED_NOTICE: &str = "The model failed to generate a plot. Please try again.";
pub const PLOT_CREATED_MESSAGE: &str = "A visualization has been created based on your prompt";
pub const UPLOAD_FAILED_NOTICE: &str = "File failed to load. Please select a valid CSV file.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Plain text answer, appended to the history.
    Reply(String),
    /// Rendered figure, appended to the history as an image turn.
    Plot { message: String, plot: RenderedPlot },
    /// Turn blocked before any model output was produced.
    Notice(String),
    /// The reply looked like plotting code but failed to render.
    Failed { notice: String, detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub route: RequestKind,
    pub outcome: TurnOutcome,
}

/// Runs one user message through routing, the model call and, when the reply
/// is plotting code, the renderer.
///
/// Notices and render failures come back as outcomes. Only a failed model
/// call is an `Err`.
pub async fn handle_turn<P, R>(
    session: &mut ChatSession,
    provider: Option<&P>,
    runtime: &R,
    message: &str,
) -> Result<TurnReport>
where
    P: ChatModel,
    R: PlotRuntime,
{
    let route = RequestKind::classify(message);
    let report = |outcome| TurnReport { route, outcome };

    let Some(provider) = provider else {
        return Ok(report(TurnOutcome::Notice(MISSING_API_KEY_NOTICE.to_string())));
    };

    session.push_turn(ConversationTurn::user(message));

    let Some(input) = build_input(session, route, message) else {
        let notice = match route {
            RequestKind::Describe => NO_SCRIPT_NOTICE,
            _ => NO_DATASET_NOTICE,
        };
        return Ok(report(TurnOutcome::Notice(notice.to_string())));
    };

    let reply = provider.complete(input.bundle).await?.text;
    let answer = match input.preamble {
        Some(preamble) => strip_data_loading_line(&format!("{preamble}{reply}")),
        None => reply,
    };

    if !is_renderable(&answer) {
        session.push_turn(ConversationTurn::assistant(answer.clone()));
        return Ok(report(TurnOutcome::Reply(answer)));
    }

    match runtime.render_plot(&answer) {
        Ok(plot) => {
            session.push_turn(ConversationTurn::assistant_image(
                PLOT_CREATED_MESSAGE,
                message,
                plot.png.clone(),
            ));
            session.set_last_script(answer);
            Ok(report(TurnOutcome::Plot {
                message: PLOT_CREATED_MESSAGE.to_string(),
                plot,
            }))
        }
        Err(err) => Ok(report(TurnOutcome::Failed {
            notice: GENERATION_FAILED_NOTICE.to_string(),
            detail: err.to_string(),
        })),
    }
}

struct PreparedInput {
    bundle: ModelPrompt,
    /// Code prepended to the reply before formatting (show path only).
    preamble: Option<String>,
}

/// `None` when the path's precondition is unmet.
fn build_input(session: &ChatSession, route: RequestKind, message: &str) -> Option<PreparedInput> {
    let (bundle, preamble) = match route {
        RequestKind::Describe => (
            ModelPrompt::new(DESCRIBE_PLOT_PROMPT, session.last_script()?),
            None,
        ),
        RequestKind::Show => {
            let primer = build_primer(session.active_dataset()?);
            let question = assemble_question(&primer, message);
            (ModelPrompt::new("", question), Some(primer.code))
        }
        RequestKind::Explore => (
            ModelPrompt::new(exploration_summary(session.active_dataset()?), message),
            None,
        ),
        RequestKind::Freeform => (ModelPrompt::new("", message), None),
    };
    Some(PreparedInput { bundle, preamble })
}

/// Registers the dataset with the runtime, then adds it to the catalog. The
/// active dataset only changes if none was active. Nothing changes when
/// registration fails.
pub fn add_dataset<R: PlotRuntime>(
    session: &mut ChatSession,
    runtime: &R,
    dataset: Dataset,
) -> Result<()> {
    register(runtime, &dataset)?;
    session.add_dataset(dataset);
    Ok(())
}

fn register<R: PlotRuntime>(runtime: &R, dataset: &Dataset) -> Result<()> {
    runtime
        .register_dataset(dataset)
        .map_err(|err| anyhow!("Failed to register dataset {}: {err}", dataset.name()))
}

/// Reads a delimited file into the catalog under its derived name, makes it
/// the active dataset and returns that name.
pub fn upload_dataset<R: PlotRuntime>(
    session: &mut ChatSession,
    runtime: &R,
    path: &Path,
) -> Result<String> {
    let name = dataset_name_from_path(path)
        .ok_or_else(|| anyhow!("cannot derive a dataset name from {}", path.display()))?;
    let dataset = Dataset::from_path(name.clone(), path)?;
    register(runtime, &dataset)?;
    session.add_and_activate(dataset);
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::{
        GENERATION_FAILED_NOTICE, MISSING_API_KEY_NOTICE, NO_DATASET_NOTICE, NO_SCRIPT_NOTICE,
        PLOT_CREATED_MESSAGE, TurnOutcome, add_dataset, handle_turn, upload_dataset,
    };
    use crate::chat::route::RequestKind;
    use crate::chat::session::{ChatSession, ConversationTurn, GREETING, Role};
    use crate::dataset::{Dataset, exploration_summary};
    use crate::llm::DESCRIBE_PLOT_PROMPT;
    use crate::llm::provider::{ChatModel, ModelError, ModelPrompt, ModelReply, ModelResult};
    use crate::python::{ExceptionInfo, PlotRuntime, RenderError, RenderResult, RenderedPlot};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::Mutex;

    struct ScriptedProvider {
        replies: Mutex<VecDeque<ModelResult<String>>>,
        calls: Mutex<Vec<ModelPrompt>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<ModelResult<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        fn calls(&self) -> Vec<ModelPrompt> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl ChatModel for ScriptedProvider {
        async fn complete(&self, input: ModelPrompt) -> ModelResult<ModelReply> {
            self.calls.lock().expect("calls lock").push(input);
            let reply = self
                .replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .expect("scripted reply");
            reply.map(|text| ModelReply { text })
        }
    }

    #[derive(Default)]
    struct FakeRuntime {
        fail_render: bool,
        fail_register: bool,
        rendered: RefCell<Vec<String>>,
        registered: RefCell<Vec<String>>,
    }

    impl PlotRuntime for FakeRuntime {
        fn register_dataset(&self, dataset: &Dataset) -> RenderResult<()> {
            if self.fail_register {
                return Err(RenderError::Internal("register refused".to_string()));
            }
            self.registered.borrow_mut().push(dataset.name().to_string());
            Ok(())
        }

        fn render_plot(&self, script: &str) -> RenderResult<RenderedPlot> {
            self.rendered.borrow_mut().push(script.to_string());
            if self.fail_render {
                return Err(RenderError::PythonException(ExceptionInfo {
                    exc_type: "NameError".to_string(),
                    message: "name 'x' is not defined".to_string(),
                    traceback: String::new(),
                }));
            }
            Ok(RenderedPlot {
                png: vec![0x89, b'P', b'N', b'G'],
                plot_kind: "Line Plot".to_string(),
                reasoning: None,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn session_with_sales() -> ChatSession {
        let mut session = ChatSession::new();
        session.add_dataset(
            Dataset::from_csv_str("Sales", "category,price\nA,1.5\nB,2.0\n").expect("csv"),
        );
        session
    }

    #[tokio::test]
    async fn missing_provider_blocks_every_path_without_touching_history() {
        let mut session = session_with_sales();
        let runtime = FakeRuntime::default();

        for message in ["show x", "describe", "explore", "hi"] {
            let report = handle_turn::<ScriptedProvider, _>(&mut session, None, &runtime, message)
                .await
                .expect("turn");
            assert_eq!(
                report.outcome,
                TurnOutcome::Notice(MISSING_API_KEY_NOTICE.to_string())
            );
        }
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn describe_without_script_is_blocked_with_zero_model_calls() {
        let mut session = session_with_sales();
        let provider = ScriptedProvider::new(Vec::new());
        let runtime = FakeRuntime::default();

        let report = handle_turn(&mut session, Some(&provider), &runtime, "describe the plot")
            .await
            .expect("turn");

        assert_eq!(report.route, RequestKind::Describe);
        assert_eq!(
            report.outcome,
            TurnOutcome::Notice(NO_SCRIPT_NOTICE.to_string())
        );
        assert!(provider.calls().is_empty());
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1], ConversationTurn::user("describe the plot"));
    }

    #[tokio::test]
    async fn freeform_sends_empty_system_instruction_and_appends_reply() {
        let mut session = ChatSession::new();
        let provider = ScriptedProvider::replying("Hello there");
        let runtime = FakeRuntime::default();

        let report = handle_turn(&mut session, Some(&provider), &runtime, "hi")
            .await
            .expect("turn");

        assert_eq!(report.route, RequestKind::Freeform);
        assert_eq!(report.outcome, TurnOutcome::Reply("Hello there".to_string()));
        assert_eq!(
            provider.calls(),
            vec![ModelPrompt {
                system_instruction: String::new(),
                user_message: "hi".to_string(),
            }]
        );
        let roles: Vec<Role> = session.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, [Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(session.history()[0].content, GREETING);
        assert!(runtime.rendered.borrow().is_empty());
    }

    #[tokio::test]
    async fn explore_uses_dataset_summary_as_system_instruction() {
        let mut session = session_with_sales();
        let provider = ScriptedProvider::replying("1. show price by category");
        let runtime = FakeRuntime::default();

        handle_turn(&mut session, Some(&provider), &runtime, "let's explore")
            .await
            .expect("turn");

        let expected = exploration_summary(session.active_dataset().expect("dataset"));
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system_instruction, expected);
        assert_eq!(calls[0].user_message, "let's explore");
    }

    #[tokio::test]
    async fn show_prepends_preamble_strips_loading_line_and_renders() {
        let mut session = session_with_sales();
        let provider = ScriptedProvider::replying(
            "df = pd.read_csv('data_file.csv')\nax.bar(df.category, df.price)\nplt.show()",
        );
        let runtime = FakeRuntime::default();

        let report = handle_turn(&mut session, Some(&provider), &runtime, "show price")
            .await
            .expect("turn");

        let calls = provider.calls();
        assert_eq!(calls[0].system_instruction, "");
        assert!(calls[0].user_message.starts_with("\"\"\"\nUse a dataframe called df"));
        assert!(calls[0].user_message.contains("show price\n\"\"\"\nimport pandas as pd"));

        let rendered = runtime.rendered.borrow();
        assert_eq!(rendered.len(), 1);
        assert!(!rendered[0].contains("read_csv"));
        assert!(rendered[0].starts_with("import pandas as pd\n"));
        assert!(rendered[0].contains("df=datasets[\"Sales\"].copy()\nax.bar(df.category, df.price)\nplt.show()"));

        match report.outcome {
            TurnOutcome::Plot { message, plot } => {
                assert_eq!(message, PLOT_CREATED_MESSAGE);
                assert_eq!(plot.plot_kind, "Line Plot");
            }
            other => panic!("expected Plot, got {other:?}"),
        }
        assert_eq!(session.last_script(), Some(rendered[0].as_str()));
        let last = session.history().last().expect("image turn");
        assert_eq!(last.content, PLOT_CREATED_MESSAGE);
        assert_eq!(last.prompt.as_deref(), Some("show price"));
        assert!(last.image.is_some());
    }

    #[tokio::test]
    async fn describe_after_plot_sends_stored_script() {
        let mut session = session_with_sales();
        let provider = ScriptedProvider::new(vec![
            Ok("ax.plot(df.price)\nplt.show()".to_string()),
            Ok("This plot shows prices.".to_string()),
        ]);
        let runtime = FakeRuntime::default();

        handle_turn(&mut session, Some(&provider), &runtime, "show prices")
            .await
            .expect("show turn");
        let script = session.last_script().expect("stored script").to_string();
        let report = handle_turn(&mut session, Some(&provider), &runtime, "Describe it")
            .await
            .expect("describe turn");

        assert_eq!(
            report.outcome,
            TurnOutcome::Reply("This plot shows prices.".to_string())
        );
        let calls = provider.calls();
        assert_eq!(calls[1].system_instruction, DESCRIBE_PLOT_PROMPT);
        assert_eq!(calls[1].user_message, script);
    }

    #[tokio::test]
    async fn render_failure_reports_notice_and_keeps_previous_state() {
        let mut session = session_with_sales();
        let provider = ScriptedProvider::replying("x.plot()\nplt.show()");
        let runtime = FakeRuntime {
            fail_render: true,
            ..FakeRuntime::default()
        };

        let report = handle_turn(&mut session, Some(&provider), &runtime, "show x")
            .await
            .expect("turn");

        match report.outcome {
            TurnOutcome::Failed { notice, detail } => {
                assert_eq!(notice, GENERATION_FAILED_NOTICE);
                assert!(detail.contains("NameError"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(session.last_script().is_none());
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1], ConversationTurn::user("show x"));
    }

    #[tokio::test]
    async fn freeform_reply_with_display_call_is_rendered_too() {
        let mut session = ChatSession::new();
        let provider = ScriptedProvider::replying("import matplotlib.pyplot as plt\nplt.show()");
        let runtime = FakeRuntime::default();

        let report = handle_turn(&mut session, Some(&provider), &runtime, "draw something")
            .await
            .expect("turn");

        assert!(matches!(report.outcome, TurnOutcome::Plot { .. }));
        assert_eq!(runtime.rendered.borrow().len(), 1);
    }

    #[tokio::test]
    async fn show_and_explore_without_dataset_make_no_model_call() {
        let mut session = ChatSession::new();
        let provider = ScriptedProvider::new(Vec::new());
        let runtime = FakeRuntime::default();

        for message in ["show sales", "explore"] {
            let report = handle_turn(&mut session, Some(&provider), &runtime, message)
                .await
                .expect("turn");
            assert_eq!(
                report.outcome,
                TurnOutcome::Notice(NO_DATASET_NOTICE.to_string())
            );
        }
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_propagates_as_error() {
        let mut session = ChatSession::new();
        let provider = ScriptedProvider::new(vec![Err(ModelError::Transport(
            "connection refused".to_string(),
        ))]);
        let runtime = FakeRuntime::default();

        let err = handle_turn(&mut session, Some(&provider), &runtime, "hi")
            .await
            .expect_err("transport failure");
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn add_dataset_leaves_catalog_untouched_when_registration_fails() {
        let mut session = session_with_sales();
        let runtime = FakeRuntime {
            fail_register: true,
            ..FakeRuntime::default()
        };

        let dataset = Dataset::from_csv_str("Cars", "mpg\n21\n").expect("csv");
        let err = add_dataset(&mut session, &runtime, dataset).expect_err("refused");
        assert!(err.to_string().contains("Failed to register dataset Cars"));
        assert_eq!(session.datasets().len(), 1);
        assert_eq!(session.active_dataset().map(Dataset::name), Some("Sales"));
    }

    #[test]
    fn add_dataset_keeps_the_current_active_dataset() {
        let mut session = session_with_sales();
        let runtime = FakeRuntime::default();

        let dataset = Dataset::from_csv_str("Cars", "mpg\n21\n").expect("csv");
        add_dataset(&mut session, &runtime, dataset).expect("registered");
        assert_eq!(session.datasets().len(), 2);
        assert_eq!(session.active_dataset().map(Dataset::name), Some("Sales"));
    }

    #[test]
    fn upload_derives_name_and_activates_dataset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("housing_DATA.csv");
        fs::write(&path, "rooms,price\n3,100\n4,150\n").expect("write csv");
        let mut session = session_with_sales();
        let runtime = FakeRuntime::default();

        let name = upload_dataset(&mut session, &runtime, &path).expect("upload");

        assert_eq!(name, "Housing_data");
        assert_eq!(session.active_dataset().map(Dataset::name), Some("Housing_data"));
        assert_eq!(*runtime.registered.borrow(), vec!["Housing_data".to_string()]);
    }

    #[test]
    fn malformed_upload_keeps_existing_datasets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.csv");
        fs::write(&path, "a,b\n1,2,3\n").expect("write csv");
        let mut session = session_with_sales();
        let runtime = FakeRuntime::default();

        upload_dataset(&mut session, &runtime, &path).expect_err("ragged row");

        assert_eq!(session.datasets().len(), 1);
        assert_eq!(session.active_dataset().map(Dataset::name), Some("Sales"));
        assert!(runtime.registered.borrow().is_empty());
    }
}
