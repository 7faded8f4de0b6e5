use reqwest::Url;
use reqwest::header::HeaderValue;
use serde_json::Value;

pub const REDACTED: &str = "***REDACTED***";

/// Header, query and JSON key names whose values never reach a log verbatim.
/// Compared ignoring ASCII case.
const SECRET_NAMES: &[&str] = &[
    "authorization",
    "x-api-key",
    "openai-organization",
    "api_key",
    "apikey",
    "key",
    "token",
    "access_token",
    "secret",
    "password",
];

fn is_secret_name(name: &str) -> bool {
    SECRET_NAMES.iter().any(|secret| secret.eq_ignore_ascii_case(name))
}

/// `--verbose` HTTP logging settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDebugConfig {
    pub enabled: bool,
    pub redact_secrets: bool,
    pub max_body_chars: usize,
}

impl HttpDebugConfig {
    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            enabled: verbose,
            redact_secrets: true,
            max_body_chars: 4_000,
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::from_verbose(false)
    }

    pub fn redactor(self) -> Redactor {
        Redactor {
            active: self.redact_secrets,
        }
    }
}

/// Masks secret values in URLs, headers and JSON bodies. An inactive
/// redactor returns its input unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redactor {
    active: bool,
}

impl Redactor {
    pub const ALWAYS: Self = Self { active: true };

    pub fn url(self, url: &Url) -> String {
        if !self.active || !url.query_pairs().any(|(name, _)| is_secret_name(&name)) {
            return url.to_string();
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(name, value)| {
                let value = if is_secret_name(&name) {
                    REDACTED.to_string()
                } else {
                    value.into_owned()
                };
                (name.into_owned(), value)
            })
            .collect();
        let mut masked = url.clone();
        masked.query_pairs_mut().clear().extend_pairs(pairs);
        masked.into()
    }

    pub fn header(self, name: &str, value: &HeaderValue) -> String {
        if self.active && is_secret_name(name) {
            return REDACTED.to_string();
        }
        match value.to_str() {
            Ok(text) => text.to_string(),
            Err(_) => "<non-utf8>".to_string(),
        }
    }

    /// JSON bodies are re-serialized compactly with secrets masked at any
    /// depth. Anything else passes through.
    pub fn body(self, raw: &str) -> String {
        if !self.active {
            return raw.to_string();
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(mut json) => {
                mask_secrets(&mut json);
                json.to_string()
            }
            Err(_) => raw.to_string(),
        }
    }
}

fn mask_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => map.iter_mut().for_each(|(name, item)| {
            if is_secret_name(name) {
                *item = Value::String(REDACTED.to_string());
            } else {
                mask_secrets(item);
            }
        }),
        Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}

/// Keeps the first `max_chars` characters and notes how many were dropped.
pub fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let dropped = text[cut..].chars().count();
            format!("{}... <truncated {dropped} chars>", &text[..cut])
        }
    }
}
