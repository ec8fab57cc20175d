//! Protocol exposures built on top of [`AppState`](super::host::AppState)

pub mod rest;

pub use rest::RestExposure;
