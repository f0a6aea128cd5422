pub mod catalog;
pub mod config;
pub mod error;
pub mod images;
pub mod import;
pub mod logging;
pub mod maintenance;
pub mod reconcile;
pub mod runtime;
pub mod slug;
pub mod store;
pub mod sync;
pub mod tabular;
pub mod updater;
