pub mod auth;
pub mod response;

pub use auth::{jwt_auth_middleware, AuthPolicy};
pub use response::{collection, ApiResponse, ApiResult};
