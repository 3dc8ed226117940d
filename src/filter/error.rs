use thiserror::Error;

use crate::resource::descriptor::AttributeKind;

/// Caller errors raised while compiling query parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid value '{token}' for {attribute}; expected one of: {allowed}")]
    InvalidEnumToken {
        attribute: String,
        token: String,
        allowed: String,
    },

    #[error("Invalid value '{value}' for {attribute}; expected {expected}")]
    InvalidValue {
        attribute: String,
        value: String,
        expected: AttributeKind,
    },
}

impl FilterError {
    pub fn attribute(&self) -> &str {
        match self {
            FilterError::InvalidEnumToken { attribute, .. } => attribute,
            FilterError::InvalidValue { attribute, .. } => attribute,
        }
    }
}
