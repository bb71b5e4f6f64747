pub mod app;
pub mod auth;
pub mod config;
pub mod day;
pub mod model;
pub mod state;
pub mod sync;
pub mod tracking;
