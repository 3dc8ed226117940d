use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ACCOUNT_TYPE, TRANSACTION_DIRECTION};
use crate::auth::CallerIdentity;
use crate::filter::{QueryParams, SortDirection};
use crate::resource::{
    AttributeKind, DescriptorError, FieldErrors, Owned, Relation, Resource, ResourceDescriptor, Validate,
};

/// A money movement booked against one of the caller's accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Option<Uuid>,
    pub description: String,
    pub direction: i64,
    pub amount_cents: i64,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl Owned for Transaction {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Validate for Transaction {
    fn safe_attributes() -> &'static [&'static str] {
        &["account_id", "description", "direction", "amount_cents", "occurred_at"]
    }

    fn validate(&self, errors: &mut FieldErrors) {
        errors.required("account_id", self.account_id.is_some());
        errors.max_length("description", &self.description, 255);

        errors.required("direction", self.direction != 0);
        if self.direction != 0 {
            errors.check("direction", TRANSACTION_DIRECTION.contains_code(self.direction), "Direction is invalid.");
        }
        errors.check("amount_cents", self.amount_cents > 0, "Amount Cents must be greater than 0.");
    }
}

impl Resource for Transaction {
    fn descriptor() -> Result<ResourceDescriptor, DescriptorError> {
        ResourceDescriptor::builder("transactions")
            .attribute("id", AttributeKind::Uuid)
            .attribute("user_id", AttributeKind::Uuid)
            .attribute("account_id", AttributeKind::Uuid)
            .attribute("description", AttributeKind::Text)
            .attribute("direction", AttributeKind::Integer)
            .attribute("amount_cents", AttributeKind::Integer)
            .attribute("occurred_at", AttributeKind::Timestamp)
            .relation(
                Relation::new("account", "accounts", "account_id")
                    .owned_by("user_id")
                    .attribute("name", AttributeKind::Text)
                    .attribute("account_type", AttributeKind::Integer)
                    .attribute("currency_code", AttributeKind::Text),
            )
            .partial_match("description")
            .partial_match("account.name")
            .string_to_int("direction", &TRANSACTION_DIRECTION)
            .string_to_int("account.account_type", &ACCOUNT_TYPE)
            .default_sort("occurred_at", SortDirection::Desc)
            .default_sort("id", SortDirection::Desc)
            .build()
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn assign(&mut self, id: Uuid, owner: &CallerIdentity) {
        self.id = id;
        self.user_id = owner.user_id();
        if self.occurred_at.is_none() {
            self.occurred_at = Some(Utc::now());
        }
    }

    fn format_params(mut params: QueryParams) -> QueryParams {
        params.rename("account.type", "account.account_type");
        params
    }
}
