//! Domain layer containing business entities and logic.
//!
//! This module implements the core domain logic following Clean Architecture principles.
//! It defines entities, repository and broker interfaces, and domain services
//! independent of infrastructure concerns.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`messaging`] - Broker producer/consumer trait definitions
//! - [`click_event`] - Click envelope carried through the broker
//! - [`circuit_breaker`] - Process-wide guard for broker publishing
//! - [`click_worker`] - Consumer loop persisting clicks
//!
//! # Click Processing Flow
//!
//! 1. HTTP handler validates the click and returns `202 Accepted`
//! 2. A detached task publishes the [`click_event::ClickEvent`] through the
//!    breaker-guarded publisher
//! 3. [`click_worker::run_consumer`] reads the envelope from the consumer group
//! 4. The click is stored via [`repositories::ClickRepository`]; redeliveries
//!    collapse on the event identity

pub mod circuit_breaker;
pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod messaging;
pub mod repositories;
