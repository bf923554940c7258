pub mod archetypes;
pub mod config;
pub mod content;
pub mod daemon;
pub mod domains;
pub mod emotion;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod metrics;
pub mod personalization;
pub mod providers;
pub mod runtime_paths;
pub mod scraper;
pub mod session;
pub mod store;
pub mod text;
pub mod vault;

pub type Result<T> = std::result::Result<T, error::StudioError>;

pub const GIT_SHA: &str = env!("STUDIO_GIT_SHA");
