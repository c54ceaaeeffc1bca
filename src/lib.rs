//! Recommendation data preparation library - shared modules for all binaries.

pub mod events;
pub mod integrity;
pub mod interactions;
pub mod items;
pub mod loader;
pub mod metadata;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod progress;
pub mod reviews;
pub mod safety;
pub mod summary;
pub mod writer;
