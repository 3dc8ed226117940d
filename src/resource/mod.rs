pub mod access;
pub mod controller;
pub mod descriptor;
pub mod store;
pub mod validation;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::filter::QueryParams;

pub use access::{check_access, AccessDecision, Action, Owned};
pub use controller::ResourceController;
pub use descriptor::{AttributeKind, DescriptorError, EnumTable, Relation, ResourceDescriptor};
pub use store::{Page, PageMeta, Store};
pub use validation::{bind_and_validate, FieldErrors, Validate, ValidationError};

/// An owner-scoped entity exposed through CRUD endpoints.
pub trait Resource:
    Owned + Validate + Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    fn descriptor() -> Result<ResourceDescriptor, DescriptorError>;

    fn id(&self) -> Uuid;

    /// Stamp identity on a freshly validated record before it is first saved.
    fn assign(&mut self, id: Uuid, owner: &CallerIdentity);

    /// Rename or reshape query keys before filtering, e.g. a public alias onto a column.
    fn format_params(params: QueryParams) -> QueryParams {
        params
    }
}
