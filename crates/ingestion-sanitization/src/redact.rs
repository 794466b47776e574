//! Sensitive-data redaction for log lines and structured log fields.

use blake3::Hasher;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{ValidationError, ValidationErrorKind};

pub const REDACTED: &str = "***REDACTED***";

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "token",
    "auth_token",
    "access_token",
    "api_key",
    "apikey",
    "secret",
    "authorization",
    "credentials",
];

/// Values already starting with `*` are treated as redacted.
const ASSIGNED_VALUE: &str = r#"["']?\s*[:=]\s*["']?[^"'}\s,*][^"'}\s,]*"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionRule {
    pub name: String,
    pub pattern: String,
    pub replacement: String,
}

impl RedactionRule {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    fn assignment(key: &str, label: &str) -> Self {
        Self::new(
            label,
            format!(r"\b{key}{ASSIGNED_VALUE}"),
            format!("{label}={REDACTED}"),
        )
    }

    /// Credentials, bearer material, secret-store ARNs, and common PII shapes.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "secret_arn",
                r#"arn:aws:secretsmanager:[^:\s]+:[^:\s]+:secret:[^"'}\s,/]+"#,
                format!("arn:aws:secretsmanager:REGION:ACCOUNT:secret:{REDACTED}"),
            ),
            Self::assignment("password", "password"),
            Self::assignment("passwd", "passwd"),
            Self::assignment("pwd", "pwd"),
            Self::assignment("auth_token", "auth_token"),
            Self::assignment("access_token", "access_token"),
            Self::assignment("token", "token"),
            Self::assignment("api[_-]?key", "api_key"),
            Self::assignment("secret", "secret"),
            Self::new(
                "url_credentials",
                r"://[^:/\s]+:[^@\s]+@",
                format!("://{REDACTED}:{REDACTED}@"),
            ),
            Self::new(
                "bearer",
                r"\bBearer\s+[A-Za-z0-9\-._~+/]+=*",
                format!("Bearer {REDACTED}"),
            ),
            Self::assignment("authorization", "Authorization"),
            Self::new(
                "email",
                r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b",
                "***EMAIL_REDACTED***",
            ),
            Self::new(
                "card_number",
                r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b",
                "***CC_REDACTED***",
            ),
            Self::new("ssn", r"\b\d{3}-\d{2}-\d{4}\b", "***SSN_REDACTED***"),
        ]
    }
}

/// One rule that fired: how often and a digest of what was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactionRecord {
    pub rule: String,
    pub count: usize,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redacted {
    pub text: String,
    pub log: Vec<RedactionRecord>,
}

#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<(RedactionRule, Regex)>,
}

impl Redactor {
    pub fn new(rules: Vec<RedactionRule>) -> Result<Self, ValidationError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| {
                        ValidationError::new(
                            ValidationErrorKind::Configuration,
                            format!("redaction rule {} failed to compile: {err}", rule.name),
                        )
                    })?;
                Ok((rule, regex))
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        debug!(rules = rules.len(), "redactor compiled");
        Ok(Self { rules })
    }

    pub fn standard() -> Result<Self, ValidationError> {
        Self::new(RedactionRule::defaults())
    }

    /// Applies every rule in order. The log never carries the matched text.
    #[must_use]
    pub fn redact(&self, text: &str) -> Redacted {
        let mut scrubbed = text.to_string();
        let mut log = Vec::new();
        for (rule, regex) in &self.rules {
            let matches: Vec<&str> = regex.find_iter(&scrubbed).map(|m| m.as_str()).collect();
            if matches.is_empty() {
                continue;
            }
            let mut hasher = Hasher::new();
            for found in &matches {
                hasher.update(found.as_bytes());
                hasher.update(&[0u8]);
            }
            log.push(RedactionRecord {
                rule: rule.name.clone(),
                count: matches.len(),
                digest: hasher.finalize().to_hex().to_string(),
            });
            scrubbed = regex
                .replace_all(&scrubbed, regex::NoExpand(&rule.replacement))
                .into_owned();
        }
        Redacted {
            text: scrubbed,
            log,
        }
    }

    /// Replaces the whole value under sensitive keys and redacts strings
    /// everywhere else.
    #[must_use]
    pub fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.redact(text).text),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_value(v)).collect()),
            Value::Object(map) => {
                let redacted: Map<String, Value> = map
                    .iter()
                    .map(|(key, value)| {
                        let value = if is_sensitive_key(key) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact_value(value)
                        };
                        (key.clone(), value)
                    })
                    .collect();
                Value::Object(redacted)
            }
            other => other.clone(),
        }
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
}
