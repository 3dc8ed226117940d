pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod resource;
pub mod resources;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
