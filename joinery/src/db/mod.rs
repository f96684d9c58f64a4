//! Database layer for data persistence and access.
//!
//! Data access uses SQLx with PostgreSQL and follows the Repository pattern:
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API and page request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries and ordering rules)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations, one per entity
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! ## Example Usage
//!
//! ```ignore
//! use joinery::db::handlers::{Projects, Repository};
//!
//! async fn example(pool: &sqlx::PgPool, id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut projects = Projects::new(&mut tx);
//!
//!     if let Some(project) = projects.get_by_id(id).await? {
//!         println!("Found project: {}", project.title);
//!     }
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! Repository methods that touch several rows open their own transaction (a savepoint when
//! the caller already holds one), so a day's display order is never left half-renumbered.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded via [`crate::migrator`]:
//!
//! ```ignore
//! joinery::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
