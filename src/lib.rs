pub mod aggregate;
pub mod classifier;
pub mod db;
pub mod debounce;
pub mod error;
pub mod export;
pub mod heuristic;
pub mod models;
pub mod notify;
pub mod prefs;
pub mod report;
pub mod submit;
pub mod validate;
