//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for persistence, messaging and caching.
//!
//! # Modules
//!
//! - [`cache`] - In-memory analytics cache
//! - [`messaging`] - Redis Streams producer and consumer
//! - [`persistence`] - PostgreSQL repository implementations

pub mod cache;
pub mod messaging;
pub mod persistence;
