pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod flags;
pub mod merge;
pub mod mutate;
pub mod store;
pub mod template;
