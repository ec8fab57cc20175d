//! HTTP server: shared state, route table and the builder that serves it

pub mod admin;
pub mod builder;
pub mod exposure;
pub mod host;
pub mod router;

pub use builder::ServerBuilder;
pub use exposure::RestExposure;
pub use host::AppState;
