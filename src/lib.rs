pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod events;
pub mod server;
