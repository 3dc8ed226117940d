// HTTP surface: one generic route set per registered resource
pub mod resource;

pub use resource::resource_routes;
