//! Environment values that embed the cache path inside a larger option string.
//!
//! Maven, for example, has no dedicated cache variable; the repository path is
//! passed as `-Dmaven.repo.local=<path>` inside `MAVEN_OPTS`. A [`ValueTemplate`]
//! knows how to put a path into such a value without clobbering the other
//! options, and how to get it back out again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

pub const PATH_PLACEHOLDER: &str = "{path}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ValueTemplate {
    prefix: String,
    suffix: String,
}

impl ValueTemplate {
    pub fn parse(template: &str) -> Result<Self, EngineError> {
        if template.matches(PATH_PLACEHOLDER).count() != 1 {
            return Err(EngineError::ConfigInvalid(format!(
                "value template '{}' must contain {} exactly once",
                template, PATH_PLACEHOLDER
            )));
        }
        if template.chars().any(char::is_whitespace) {
            return Err(EngineError::ConfigInvalid(format!(
                "value template '{}' must be a single option without whitespace",
                template
            )));
        }

        let (prefix, suffix) = template
            .split_once(PATH_PLACEHOLDER)
            .unwrap_or((template, ""));
        if prefix.is_empty() && suffix.is_empty() {
            return Err(EngineError::ConfigInvalid(
                "value template must add text around the path; omit it for bare paths".into(),
            ));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Build the new variable value for `path`, keeping every other option
    /// already present in `existing` exactly as it was written.
    pub fn render(&self, existing: Option<&str>, path: &Path) -> String {
        let option = quote(&format!("{}{}{}", self.prefix, path.display(), self.suffix));

        let mut parts = Vec::new();
        let mut replaced = false;
        for token in existing.map(tokenize).unwrap_or_default() {
            if !self.matches(&token.text) {
                parts.push(token.raw);
            } else if !replaced {
                parts.push(option.clone());
                replaced = true;
            }
            // Later duplicates of the option are dropped so the value stays unambiguous
        }
        if !replaced {
            parts.push(option);
        }

        parts.join(" ")
    }

    /// Pull the embedded path back out of a variable value.
    pub fn extract(&self, value: &str) -> Option<PathBuf> {
        tokenize(value)
            .into_iter()
            .map(|token| token.text)
            .filter(|text| self.matches(text))
            .find_map(|text| {
                let inner = &text[self.prefix.len()..text.len() - self.suffix.len()];
                (!inner.is_empty()).then(|| PathBuf::from(inner))
            })
    }

    fn matches(&self, token: &str) -> bool {
        token.len() >= self.prefix.len() + self.suffix.len()
            && token.starts_with(&self.prefix)
            && token.ends_with(&self.suffix)
    }
}

impl TryFrom<String> for ValueTemplate {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ValueTemplate> for String {
    fn from(template: ValueTemplate) -> Self {
        template.to_string()
    }
}

impl fmt::Display for ValueTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, PATH_PLACEHOLDER, self.suffix)
    }
}

/// One whitespace-separated option: as written, and with quotes removed.
struct Token {
    raw: String,
    text: String,
}

/// Split an option string on whitespace, honouring double quotes.
///
/// Backslashes are literal: these values routinely carry Windows paths.
fn tokenize(value: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut raw = String::new();
    let mut text = String::new();
    let mut in_quotes = false;

    for ch in value.chars() {
        if ch.is_whitespace() && !in_quotes {
            if !raw.is_empty() {
                tokens.push(Token {
                    raw: std::mem::take(&mut raw),
                    text: std::mem::take(&mut text),
                });
            }
            continue;
        }
        raw.push(ch);
        if ch == '"' {
            in_quotes = !in_quotes;
        } else {
            text.push(ch);
        }
    }
    if !raw.is_empty() {
        tokens.push(Token { raw, text });
    }
    tokens
}

fn quote(option: &str) -> String {
    if option.chars().any(char::is_whitespace) {
        format!("\"{}\"", option)
    } else {
        option.to_string()
    }
}
