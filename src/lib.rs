pub mod auth;
pub mod configuration;
pub mod email_client;
pub mod error;
pub mod middleware;
pub mod notifier;
pub mod routes;
pub mod service;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod templates;
pub mod user;
pub mod validators;
