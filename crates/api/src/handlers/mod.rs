//! Request handlers.
//!
//! Each submodule provides async handler functions for one resource.
//! Handlers delegate to the pipeline services in [`crate::state::AppState`]
//! and map errors via [`crate::error::AppError`].

pub mod bookshelf;
pub mod health;
