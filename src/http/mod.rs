//! REST API layer (feature `http-server`).
//!
//! A thin axum surface over the service layer: DTOs in, typed domain calls,
//! JSON out. Error mapping lives in [`error`]; all business rules stay in
//! `services`.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, AppError};
pub use router::create_router;
pub use state::AppState;
