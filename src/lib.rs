pub mod api;
pub mod config;
pub mod id;
pub mod model;
pub mod repository;
pub mod service;

pub use service::ReviewService;

/// Shared state handed to every request handler.
pub struct AppState {
    pub service: ReviewService,
}
