pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod diary;
pub mod storage;
pub mod timefmt;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
