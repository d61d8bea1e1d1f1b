//! Helpers shared by the HTTP layer and the persistence adapters.
//!
//! - [`client_ip`] - Client address resolution (peer socket or proxy headers)
//! - [`db_error`] - PostgreSQL constraint violation detection
//! - [`duration`] - Relative time window parsing (`15m`, `1h30m`)

pub mod client_ip;
pub mod db_error;
pub mod duration;
