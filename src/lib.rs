pub mod auth;
pub mod config;
pub mod cookies;
pub mod db;
pub mod error;
pub mod models;
pub mod password;
pub mod routes;
pub mod state;
pub mod store;
