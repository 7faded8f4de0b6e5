/// Which of the four request paths a chat message takes. Decided once per
/// turn from the literal text, before any model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Describe,
    Show,
    Explore,
    Freeform,
}

impl RequestKind {
    /// Prefix checks for describe/show, substring check for explore. Both
    /// capitalizations are listed explicitly; matching is otherwise exact.
    pub fn classify(message: &str) -> Self {
        if message.starts_with("describe") || message.starts_with("Describe") {
            Self::Describe
        } else if message.starts_with("show") || message.starts_with("Show") {
            Self::Show
        } else if message.contains("explore") || message.contains("Explore") {
            Self::Explore
        } else {
            Self::Freeform
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Show => "show",
            Self::Explore => "explore",
            Self::Freeform => "freeform",
        }
    }
}
