use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field-level error messages in the order rules reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<(String, Vec<String>)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.errors.iter_mut().find(|(f, _)| f == field) {
            Some((_, messages)) => messages.push(message),
            None => self.errors.push((field.to_string(), vec![message])),
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|(f, _)| f == field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First message per field
    pub fn first_errors(&self) -> Vec<(&str, &str)> {
        self.errors
            .iter()
            .filter_map(|(field, messages)| messages.first().map(|m| (field.as_str(), m.as_str())))
            .collect()
    }

    pub fn required(&mut self, field: &str, present: bool) {
        if !present {
            self.add(field, format!("{} cannot be blank.", label(field)));
        }
    }

    pub fn required_text(&mut self, field: &str, value: &str) {
        self.required(field, !value.trim().is_empty());
    }

    pub fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("{} should contain at most {} characters.", label(field), max));
        }
    }

    pub fn check(&mut self, field: &str, ok: bool, message: impl Into<String>) {
        if !ok {
            self.add(field, message);
        }
    }
}

/// Human label for a column name: `account_id` → `Account Id`.
pub fn label(field: &str) -> String {
    field
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A write model with declared field rules.
pub trait Validate {
    /// Attributes a caller may assign. Everything else in a payload is ignored.
    fn safe_attributes() -> &'static [&'static str];

    fn validate(&self, errors: &mut FieldErrors);
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{message}")]
    Invalid {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    #[error("Write model could not be bound: {0}")]
    Model(#[from] serde_json::Error),
}

impl ValidationError {
    pub fn from_field_errors(errors: &FieldErrors) -> Self {
        let first = errors.first_errors();
        ValidationError::Invalid {
            message: first.iter().map(|(_, m)| *m).collect::<Vec<_>>().join(" "),
            field_errors: first.iter().map(|(f, m)| (f.to_string(), m.to_string())).collect(),
        }
    }
}

/// Assign the safe attributes present in `fields` onto `model`, then run its rules.
/// Unlisted attributes keep their current values. Every failing field is reported at once.
pub fn bind_and_validate<M>(model: M, fields: &Map<String, Value>) -> Result<M, ValidationError>
where
    M: Validate + Serialize + DeserializeOwned,
{
    let mut errors = FieldErrors::new();
    let mut target = serde_json::to_value(&model)?;
    if !target.is_object() {
        return Err(ValidationError::Model(serde::de::Error::custom(
            "write model must serialize to a JSON object",
        )));
    }

    for attribute in M::safe_attributes() {
        let Some(value) = fields.get(*attribute) else {
            continue;
        };

        let mut candidate = target.clone();
        candidate[*attribute] = value.clone();
        if serde_json::from_value::<M>(candidate).is_ok() {
            target[*attribute] = value.clone();
        } else {
            errors.add(attribute, format!("{} is invalid.", label(attribute)));
        }
    }

    let model: M = serde_json::from_value(target)?;
    model.validate(&mut errors);

    if errors.is_empty() {
        Ok(model)
    } else {
        let error = ValidationError::from_field_errors(&errors);
        tracing::debug!("Validation failed: {}", error);
        Err(error)
    }
}
