use axum::{
    extract::{rejection::JsonRejection, MatchedPath, Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::ApiError;
use crate::filter::QueryParams;
use crate::middleware::{collection, jwt_auth_middleware, ApiResponse, ApiResult, AuthPolicy};
use crate::resource::{Resource, ResourceController, Store};

const COLLECTION_METHODS: &str = "GET, POST, HEAD, OPTIONS";
const ITEM_METHODS: &str = "GET, PUT, PATCH, DELETE, HEAD, OPTIONS";

/// Mount a resource at `/api/<name>` and `/api/<name>/:id`
pub fn resource_routes<R, S>(controller: ResourceController<R, S>, policy: AuthPolicy) -> Router
where
    R: Resource,
    S: Store<R>,
{
    let base = format!("/api/{}", controller.descriptor().name());

    Router::new()
        .route(&base, get(index::<R, S>).post(create::<R, S>).options(preflight))
        .route(
            &format!("{}/:id", base),
            get(view::<R, S>)
                .put(update::<R, S>)
                .patch(update::<R, S>)
                .delete(delete::<R, S>)
                .options(preflight),
        )
        .route_layer(middleware::from_fn_with_state(policy, jwt_auth_middleware))
        .with_state(controller)
}

/// GET /api/:resource - owner-scoped, filtered, paginated listing
async fn index<R: Resource, S: Store<R>>(
    State(controller): State<ResourceController<R, S>>,
    caller: CallerIdentity,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Value> {
    let page = controller.index(&caller, QueryParams::from_pairs(pairs)).await?;
    let data = collection(controller.descriptor().collection_envelope(), &page).map_err(|e| {
        tracing::error!("Failed to serialize '{}' page: {}", controller.descriptor().name(), e);
        ApiError::internal_server_error("Failed to serialize response data")
    })?;
    Ok(ApiResponse::success(data))
}

/// GET /api/:resource/:id
async fn view<R: Resource, S: Store<R>>(
    State(controller): State<ResourceController<R, S>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> ApiResult<R> {
    let record = controller.view(&caller, parse_id(&id)?).await?;
    Ok(ApiResponse::success(record))
}

/// POST /api/:resource
async fn create<R: Resource, S: Store<R>>(
    State(controller): State<ResourceController<R, S>>,
    caller: CallerIdentity,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<R> {
    let Json(fields) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let record = controller.create(&caller, &fields).await?;
    Ok(ApiResponse::created(record))
}

/// PUT|PATCH /api/:resource/:id
async fn update<R: Resource, S: Store<R>>(
    State(controller): State<ResourceController<R, S>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<R> {
    let id = parse_id(&id)?;
    let Json(fields) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let record = controller.update(&caller, id, &fields).await?;
    Ok(ApiResponse::success(record))
}

/// DELETE /api/:resource/:id
async fn delete<R: Resource, S: Store<R>>(
    State(controller): State<ResourceController<R, S>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> ApiResult<()> {
    controller.delete(&caller, parse_id(&id)?).await?;
    Ok(ApiResponse::no_content())
}

/// OPTIONS on either route; never authenticated
async fn preflight(path: MatchedPath) -> impl IntoResponse {
    let allow = if path.as_str().ends_with("/:id") { ITEM_METHODS } else { COLLECTION_METHODS };
    (StatusCode::NO_CONTENT, [(header::ALLOW, allow)])
}

/// Ids that aren't UUIDs can't name a record
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(format!("Object not found: {}", raw)))
}
