// Authgate - Library root

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod nav;
pub mod store;
