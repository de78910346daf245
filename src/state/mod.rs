//! State module for tracking request progress
//!
//! This module provides the per-request lifecycle used by the failover
//! controller.
//!
//! # Components
//!
//! - `RequestState`: The state of one logical request (pending, in flight,
//!   retrying, advancing to an alternative link, or terminal)

mod request_state;

pub use request_state::RequestState;
