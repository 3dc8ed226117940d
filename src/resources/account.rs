use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ACCOUNT_STATUS, ACCOUNT_STATUS_ACTIVE, ACCOUNT_TYPE};
use crate::auth::CallerIdentity;
use crate::filter::{QueryParams, SortDirection};
use crate::resource::{AttributeKind, DescriptorError, FieldErrors, Owned, Resource, ResourceDescriptor, Validate};

pub const NAME_MAX_LENGTH: usize = 120;

/// A money account (wallet, card, savings) owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub account_type: i64,
    pub status: i64,
    pub balance_cents: i64,
    pub currency_code: String,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            name: String::new(),
            account_type: 0,
            status: ACCOUNT_STATUS_ACTIVE,
            balance_cents: 0,
            currency_code: "USD".to_string(),
        }
    }
}

impl Owned for Account {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Validate for Account {
    fn safe_attributes() -> &'static [&'static str] {
        &["name", "account_type", "status", "balance_cents", "currency_code"]
    }

    fn validate(&self, errors: &mut FieldErrors) {
        errors.required_text("name", &self.name);
        errors.max_length("name", &self.name, NAME_MAX_LENGTH);

        errors.required("account_type", self.account_type != 0);
        if self.account_type != 0 {
            errors.check("account_type", ACCOUNT_TYPE.contains_code(self.account_type), "Account Type is invalid.");
        }
        errors.check("status", ACCOUNT_STATUS.contains_code(self.status), "Status is invalid.");

        errors.check(
            "currency_code",
            self.currency_code.len() == 3 && self.currency_code.chars().all(|c| c.is_ascii_uppercase()),
            "Currency Code must be a 3-letter ISO code.",
        );
    }
}

impl Resource for Account {
    fn descriptor() -> Result<ResourceDescriptor, DescriptorError> {
        ResourceDescriptor::builder("accounts")
            .attribute("id", AttributeKind::Uuid)
            .attribute("user_id", AttributeKind::Uuid)
            .attribute("name", AttributeKind::Text)
            .attribute("account_type", AttributeKind::Integer)
            .attribute("status", AttributeKind::Integer)
            .attribute("balance_cents", AttributeKind::Integer)
            .attribute("currency_code", AttributeKind::Text)
            .partial_match("name")
            .string_to_int("account_type", &ACCOUNT_TYPE)
            .string_to_int("status", &ACCOUNT_STATUS)
            .default_sort("name", SortDirection::Asc)
            .build()
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn assign(&mut self, id: Uuid, owner: &CallerIdentity) {
        self.id = id;
        self.user_id = owner.user_id();
    }

    /// `type` is the public name of `account_type`
    fn format_params(mut params: QueryParams) -> QueryParams {
        params.rename("type", "account_type");
        params
    }
}
