use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::access::{check_access, AccessDecision, Action};
use super::descriptor::{DescriptorError, ResourceDescriptor};
use super::descriptor::AttributeKind;
use super::store::{Page, Store};
use super::validation::{bind_and_validate, label, FieldErrors, ValidationError};
use super::Resource;
use crate::auth::CallerIdentity;
use crate::error::ApiError;
use crate::filter::{normalize, AttributePath, FilterCompiler, FilterError, QueryParams, ScopedQuery};

/// Runs the CRUD actions of one resource: listing through the filter pipeline, single
/// records through the access gate, writes through the validation gate.
pub struct ResourceController<R, S> {
    descriptor: Arc<ResourceDescriptor>,
    store: Arc<S>,
    _resource: PhantomData<fn() -> R>,
}

impl<R, S> Clone for ResourceController<R, S> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            store: Arc::clone(&self.store),
            _resource: PhantomData,
        }
    }
}

impl<R, S> ResourceController<R, S>
where
    R: Resource,
    S: Store<R>,
{
    pub fn new(descriptor: ResourceDescriptor, store: S) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            store: Arc::new(store),
            _resource: PhantomData,
        }
    }

    /// Build and validate the resource's descriptor
    pub fn register(store: S) -> Result<Self, DescriptorError> {
        Ok(Self::new(R::descriptor()?, store))
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Raw parameters → owner-scoped query. Pure; no store access.
    pub fn prepare_query(&self, params: QueryParams, caller: &CallerIdentity) -> Result<ScopedQuery, FilterError> {
        let params = normalize(R::format_params(params));
        let filter = FilterCompiler::compile(params, &self.descriptor)?;
        Ok(ScopedQuery::build(filter, &self.descriptor, caller))
    }

    pub async fn index(&self, caller: &CallerIdentity, params: QueryParams) -> Result<Page<R>, ApiError> {
        let query = self.prepare_query(params, caller)?;
        let page = self.store.find_page(&query).await?;
        tracing::debug!(
            "Listed {} of {} '{}' records for {}",
            page.items.len(),
            page.total_count,
            self.descriptor.name(),
            caller.user_id()
        );
        Ok(page)
    }

    pub async fn view(&self, caller: &CallerIdentity, id: Uuid) -> Result<R, ApiError> {
        self.find_model(Action::View, caller, id).await
    }

    pub async fn create(&self, caller: &CallerIdentity, fields: &Map<String, Value>) -> Result<R, ApiError> {
        let mut model = bind_and_validate(R::default(), fields)?;
        model.assign(Uuid::new_v4(), caller);
        self.check_related_owners(&model, caller).await?;

        let saved = self.store.insert(&model).await?;
        tracing::info!("Created '{}' record {} for {}", self.descriptor.name(), saved.id(), caller.user_id());
        Ok(saved)
    }

    pub async fn update(&self, caller: &CallerIdentity, id: Uuid, fields: &Map<String, Value>) -> Result<R, ApiError> {
        let model = self.find_model(Action::Update, caller, id).await?;
        let model = bind_and_validate(model, fields)?;
        self.check_related_owners(&model, caller).await?;
        Ok(self.store.update(&model).await?)
    }

    pub async fn delete(&self, caller: &CallerIdentity, id: Uuid) -> Result<(), ApiError> {
        let model = self.find_model(Action::Delete, caller, id).await?;
        self.store.delete(model.id()).await?;
        tracing::info!("Deleted '{}' record {} for {}", self.descriptor.name(), id, caller.user_id());
        Ok(())
    }

    /// Keys written into owned relations must reference the caller's own rows. Anything
    /// else is reported as an invalid field, like any other failed rule.
    async fn check_related_owners(&self, model: &R, caller: &CallerIdentity) -> Result<(), ApiError> {
        let row = serde_json::to_value(model).map_err(ValidationError::Model)?;
        let mut errors = FieldErrors::new();

        for relation in self.descriptor.owned_relations() {
            let Some(key) = row.get(&relation.local_key).filter(|v| !v.is_null()) else {
                continue;
            };
            let kind = self
                .descriptor
                .attribute_kind(&AttributePath::local(relation.local_key.clone()))
                .unwrap_or(AttributeKind::Text);

            if !self.store.owns_related(relation, key, kind, caller).await? {
                tracing::warn!(
                    "Rejected '{}' {} = {} outside the caller's {} for {}",
                    self.descriptor.name(),
                    relation.local_key,
                    key,
                    relation.table,
                    caller.user_id()
                );
                errors.add(&relation.local_key, format!("{} is invalid.", label(&relation.local_key)));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::from_field_errors(&errors).into())
        }
    }

    /// Fetch by id, then run the access gate for `action`.
    async fn find_model(&self, action: Action, caller: &CallerIdentity, id: Uuid) -> Result<R, ApiError> {
        let model = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Object not found: {}", id)))?;

        match check_access(action, &model, caller) {
            AccessDecision::Allow => Ok(model),
            AccessDecision::Deny(reason) => {
                tracing::warn!(
                    "Denied {} on '{}' record {} to {}",
                    action,
                    self.descriptor.name(),
                    id,
                    caller.user_id()
                );
                Err(ApiError::forbidden(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resources::account::Account;
    use crate::resources::enums::{ACCOUNT_STATUS_ACTIVE, ACCOUNT_TYPE_CASH, ACCOUNT_TYPE_CREDIT_CARD};
    use crate::testing::{account, MemoryStore};

    type Accounts = ResourceController<Account, MemoryStore<Account>>;

    async fn controller(records: Vec<Account>) -> Accounts {
        let store = MemoryStore::new();
        store.seed(records).await;
        ResourceController::register(store).unwrap()
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_index_only_returns_callers_records() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let other = CallerIdentity::new(Uuid::new_v4());
        let ctl = controller(vec![
            account(&me, "Wallet", ACCOUNT_TYPE_CASH),
            account(&me, "Visa", ACCOUNT_TYPE_CREDIT_CARD),
            account(&other, "Other wallet", ACCOUNT_TYPE_CASH),
        ])
        .await;

        let page = ctl.index(&me, QueryParams::new()).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert!(page.items.iter().all(|a| a.user_id == me.user_id()));

        let spoofed = QueryParams::from_pairs(vec![("user_id", other.user_id().to_string())]);
        let page = ctl.index(&me, spoofed).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert!(page.items.iter().all(|a| a.user_id == me.user_id()));
    }

    #[tokio::test]
    async fn test_index_filters_with_enum_and_partial_match() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let ctl = controller(vec![
            account(&me, "Cash wallet", ACCOUNT_TYPE_CASH),
            account(&me, "Visa", ACCOUNT_TYPE_CREDIT_CARD),
        ])
        .await;

        let page = ctl
            .index(&me, QueryParams::from_pairs(vec![("type", "credit_card")]))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Visa");

        let page = ctl.index(&me, QueryParams::from_pairs(vec![("name", "wall")])).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Cash wallet");
    }

    #[tokio::test]
    async fn test_index_rejects_unknown_enum_token() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let ctl = controller(vec![]).await;
        let err = ctl
            .index(&me, QueryParams::from_pairs(vec![("status", "frozen")]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_view_of_foreign_record_is_forbidden() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let other = CallerIdentity::new(Uuid::new_v4());
        let theirs = account(&other, "Theirs", ACCOUNT_TYPE_CASH);
        let ctl = controller(vec![theirs.clone()]).await;

        let err = ctl.view(&me, theirs.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.message(), "You can only view data that you've created.");

        let missing = ctl.view(&me, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(missing.status_code(), 404);
    }

    #[tokio::test]
    async fn test_update_and_delete_of_foreign_record_do_not_mutate() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let other = CallerIdentity::new(Uuid::new_v4());
        let theirs = account(&other, "Theirs", ACCOUNT_TYPE_CASH);
        let ctl = controller(vec![theirs.clone()]).await;

        let err = ctl.update(&me, theirs.id, &fields(json!({"name": "Mine now"}))).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = ctl.delete(&me, theirs.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let stored = ctl.store().find_by_id(theirs.id).await.unwrap().unwrap();
        assert_eq!(stored, theirs);
    }

    #[tokio::test]
    async fn test_create_assigns_caller_as_owner() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let ctl = controller(vec![]).await;

        let created = ctl
            .create(
                &me,
                &fields(json!({
                    "name": "Savings",
                    "account_type": ACCOUNT_TYPE_CASH,
                    "user_id": Uuid::new_v4(),
                })),
            )
            .await
            .unwrap();

        assert_eq!(created.user_id, me.user_id());
        assert_eq!(created.status, ACCOUNT_STATUS_ACTIVE);
        assert!(ctl.store().find_by_id(created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_reports_all_missing_fields() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let ctl = controller(vec![]).await;

        let err = ctl.create(&me, &Map::new()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("Name cannot be blank."));
        assert!(err.message().contains("Account Type cannot be blank."));
        assert_eq!(ctl.store().len().await, 0);
    }

    #[tokio::test]
    async fn test_owner_updates_and_deletes() {
        let me = CallerIdentity::new(Uuid::new_v4());
        let mine = account(&me, "Wallet", ACCOUNT_TYPE_CASH);
        let ctl = controller(vec![mine.clone()]).await;

        let updated = ctl.update(&me, mine.id, &fields(json!({"name": "Pocket"}))).await.unwrap();
        assert_eq!(updated.name, "Pocket");
        assert_eq!(updated.account_type, ACCOUNT_TYPE_CASH);

        ctl.delete(&me, mine.id).await.unwrap();
        assert!(ctl.store().find_by_id(mine.id).await.unwrap().is_none());
    }
}
