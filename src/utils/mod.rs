pub mod auth;
pub mod config;
pub mod http_client;
pub mod validators;
