//! Storage layer for scheduling data.
//!
//! Access goes through the repository traits in [`repository`], so business
//! logic in `services` never depends on a concrete backend:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  HTTP layer (http) / binaries                │
//! └───────────────────┬──────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────┐
//! │  Service layer (services) - business logic   │
//! │  - availability resolution                   │
//! │  - conflict detection                        │
//! │  - booking orchestration, expansion          │
//! └───────────────────┬──────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────┐
//! │  Repository traits (db::repository)          │
//! └───────┬──────────────────────────┬───────────┘
//!         │                          │
//!   LocalRepository          PostgresRepository
//!    (in-memory)              (Diesel + r2d2)
//! ```
//!
//! Backend selection happens once at startup through
//! [`factory::RepositoryFactory`], driven by environment variables or a
//! `scheduling.toml` file.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

pub use factory::{RepositoryFactory, RepositoryType};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    AvailabilityRepository, ErrorContext, FullRepository, RecurringRepository, RepositoryError,
    RepositoryResult, ScheduleRepository,
};
