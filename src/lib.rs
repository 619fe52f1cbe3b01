#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod article;
pub mod config;
pub mod feed;
pub mod links;
pub mod markdown;
pub mod state;
pub mod text;
pub mod ui;
pub mod viewport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
