pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod jsonapi;
pub mod middleware;
pub mod pagination;
pub mod resource;
pub mod testing;
pub mod validation;
