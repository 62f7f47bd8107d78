pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod form;
pub mod highlight;
pub mod model;
pub mod search;
pub mod session;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
