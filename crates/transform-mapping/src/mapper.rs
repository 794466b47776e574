//! Source ERP product → canonical product.

use std::collections::BTreeMap;

use ingestion_sanitization::{sanitize_log_message, Redactor, SanitizationPolicy};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use transform_expression::Evaluator;

use crate::convert::convert;
use crate::{MappingDocument, MappingError, TransformConfig};

/// Canonical fields every product must carry after mapping.
pub const REQUIRED_CANONICAL_FIELDS: &[&str] = &["id", "external_id", "name", "sku"];

const CUSTOM_PREFIX: &str = "custom:";
const SOURCE_CUSTOM_PREFIX: &str = "f120_custom_";
const LOGGED_VALUE_CHARS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformedProduct {
    pub product: Map<String, Value>,
    /// Non-fatal problems found while mapping, already safe to log.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub products: Vec<Value>,
    /// First [`TransformConfig::max_reported_errors`] failures, in input order.
    pub errors: Vec<String>,
    pub error_count: usize,
}

#[derive(Debug)]
pub struct FieldMapper {
    document: MappingDocument,
    validations: BTreeMap<String, Regex>,
    policy: SanitizationPolicy,
    redactor: Redactor,
    evaluator: Evaluator,
    max_reported_errors: usize,
}

impl FieldMapper {
    /// Compiles validation patterns and checks transformation references.
    pub fn new(document: MappingDocument, config: &TransformConfig) -> Result<Self, MappingError> {
        config.validate()?;
        let mut validations = BTreeMap::new();
        for (field, rule) in &document.mappings.product {
            if let Some(pattern) = &rule.validation {
                let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|err| {
                    MappingError::InvalidPattern {
                        field: field.clone(),
                        detail: err.to_string(),
                    }
                })?;
                validations.insert(field.clone(), regex);
            }
            if let Some(name) = &rule.transformation {
                if !document.transformations.contains_key(name) {
                    return Err(MappingError::UnknownTransformation {
                        field: field.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
        debug!(
            fields = document.mappings.product.len(),
            transformations = document.transformations.len(),
            "field mapper ready"
        );
        Ok(Self {
            policy: SanitizationPolicy::new(config.sanitization.clone())?,
            redactor: Redactor::standard()?,
            evaluator: Evaluator::new(config.evaluator.clone()),
            max_reported_errors: config.max_reported_errors,
            validations,
            document,
        })
    }

    pub fn with_defaults(document: MappingDocument) -> Result<Self, MappingError> {
        Self::new(document, &TransformConfig::default())
    }

    #[must_use]
    pub const fn document(&self) -> &MappingDocument {
        &self.document
    }

    #[must_use]
    pub const fn policy(&self) -> &SanitizationPolicy {
        &self.policy
    }

    /// Maps one source product. Missing required fields fall back to the
    /// document defaults; conversion failures, sanitizer rejections included,
    /// skip the field. Both add a redacted warning rather than failing.
    #[must_use]
    pub fn transform_product(&self, source: &Map<String, Value>) -> TransformedProduct {
        let mut product = Map::new();
        let mut warnings = Vec::new();

        for (canonical, rule) in &self.document.mappings.product {
            let mut value = source.get(&rule.siesa_field).filter(|v| !v.is_null()).cloned();

            if rule.required && value.is_none() {
                self.note(
                    &mut warnings,
                    format!(
                        "Missing required field: {} -> {canonical}",
                        sanitize_log_message(&rule.siesa_field, LOGGED_VALUE_CHARS)
                    ),
                );
                value = self.document.defaults.get(canonical).cloned();
            }
            let Some(value) = value else {
                continue;
            };

            let mut value = match convert(&self.policy, &value, rule.field_type) {
                Ok(converted) => converted,
                Err(reason) => {
                    self.note(
                        &mut warnings,
                        format!("Type conversion failed for {canonical}: {reason}"),
                    );
                    continue;
                }
            };

            if let (Some(regex), Value::String(text)) = (self.validations.get(canonical), &value) {
                if !regex.is_match(text) {
                    self.note(
                        &mut warnings,
                        format!(
                            "Validation failed for {canonical}: {} does not match {}",
                            sanitize_log_message(text, LOGGED_VALUE_CHARS),
                            regex.as_str()
                        ),
                    );
                }
            }

            if let Some(transformation) = rule
                .transformation
                .as_ref()
                .and_then(|name| self.document.transformations.get(name))
            {
                value = transformation.apply(&value, &self.evaluator);
            }

            product.insert(canonical.clone(), value);
        }

        for (field, value) in source {
            if let Some(name) = field.strip_prefix(SOURCE_CUSTOM_PREFIX) {
                product.insert(format!("{CUSTOM_PREFIX}{name}"), value.clone());
            } else if field.starts_with(CUSTOM_PREFIX) {
                product.insert(field.clone(), value.clone());
            }
        }

        TransformedProduct { product, warnings }
    }

    /// Sanitizes, maps and checks each payload. A failing product is
    /// reported and skipped; the rest of the batch continues.
    #[must_use]
    pub fn transform_batch(&self, sources: &[Value]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, source) in sources.iter().enumerate() {
            match self.transform_one(source) {
                Ok(product) => outcome.products.push(Value::Object(product)),
                Err(reason) => {
                    let reason = self.redact(&reason);
                    warn!(index, reason = %reason, "product skipped");
                    outcome.error_count += 1;
                    if outcome.errors.len() < self.max_reported_errors {
                        outcome.errors.push(format!("Product {index}: {reason}"));
                    }
                }
            }
        }
        info!(
            transformed = outcome.products.len(),
            failed = outcome.error_count,
            "batch transformed"
        );
        outcome
    }

    fn transform_one(&self, source: &Value) -> Result<Map<String, Value>, String> {
        let sanitized = self
            .policy
            .sanitize_structure(source, self.policy.limits().max_depth)
            .map_err(|err| err.client_detail())?;
        let Value::Object(source) = sanitized else {
            return Err("expected a product mapping".to_string());
        };
        let transformed = self.transform_product(&source);
        let missing = validate_canonical_product(&transformed.product);
        if missing.is_empty() {
            Ok(transformed.product)
        } else {
            Err(missing.join(", "))
        }
    }

    fn note(&self, warnings: &mut Vec<String>, warning: String) {
        let warning = self.redact(&warning);
        warn!(warning = %warning, "field mapping warning");
        warnings.push(warning);
    }

    fn redact(&self, text: &str) -> String {
        let redacted = self.redactor.redact(text);
        for record in &redacted.log {
            debug!(
                rule = %record.rule,
                count = record.count,
                digest = %record.digest,
                "redacted mapping message"
            );
        }
        redacted.text
    }
}

/// Required canonical fields that are absent or null.
#[must_use]
pub fn validate_canonical_product(product: &Map<String, Value>) -> Vec<String> {
    REQUIRED_CANONICAL_FIELDS
        .iter()
        .filter(|field| product.get(**field).map_or(true, Value::is_null))
        .map(|field| format!("Missing required field: {field}"))
        .collect()
}
