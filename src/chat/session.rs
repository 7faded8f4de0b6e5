use crate::dataset::Dataset;

pub const GREETING: &str = "How can I help you?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub image: Option<Vec<u8>>,
    pub prompt: Option<String>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image: None,
            prompt: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image: None,
            prompt: None,
        }
    }

    pub fn assistant_image(
        content: impl Into<String>,
        prompt: impl Into<String>,
        image: Vec<u8>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image: Some(image),
            prompt: Some(prompt.into()),
        }
    }
}

/// State owned by one chat session and passed by reference into each turn:
/// the dataset catalog, the most recent rendered script and the history.
#[derive(Debug, Clone)]
pub struct ChatSession {
    datasets: Vec<Dataset>,
    active: Option<usize>,
    last_script: Option<String>,
    history: Vec<ConversationTurn>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            datasets: Vec::new(),
            active: None,
            last_script: None,
            history: vec![ConversationTurn::assistant(GREETING)],
        }
    }

    /// Adds a dataset; it only becomes active when nothing is active yet, so
    /// the first preloaded dataset wins. A dataset with the same name is
    /// replaced in place.
    pub fn add_dataset(&mut self, dataset: Dataset) {
        let index = self.insert_dataset(dataset);
        self.active.get_or_insert(index);
    }

    /// Adds a dataset and switches to it, as an upload does.
    pub fn add_and_activate(&mut self, dataset: Dataset) {
        let index = self.insert_dataset(dataset);
        self.active = Some(index);
    }

    fn insert_dataset(&mut self, dataset: Dataset) -> usize {
        match self
            .datasets
            .iter()
            .position(|existing| existing.name() == dataset.name())
        {
            Some(index) => {
                self.datasets[index] = dataset;
                index
            }
            None => {
                self.datasets.push(dataset);
                self.datasets.len() - 1
            }
        }
    }

    /// Returns false when no dataset has that name.
    pub fn use_dataset(&mut self, name: &str) -> bool {
        match self.datasets.iter().position(|d| d.name() == name) {
            Some(index) => {
                self.active = Some(index);
                true
            }
            None => false,
        }
    }

    pub fn active_dataset(&self) -> Option<&Dataset> {
        self.active.and_then(|index| self.datasets.get(index))
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name() == name)
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn last_script(&self) -> Option<&str> {
        self.last_script.as_deref()
    }

    pub fn set_last_script(&mut self, script: String) {
        self.last_script = Some(script);
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn push_turn(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }
}
