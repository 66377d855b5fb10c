//! Session token codec.
//!
//! This module provides the reversible mapping between a [`SessionDescriptor`]
//! and the opaque token the client carries between calls. The gateway itself
//! is stateless: the token, reissued on every response, is the only durable
//! representation of a conversation's affinity state.
//!
//! # Example
//!
//! ```rust
//! use teneo_session_gateway::session::SessionDescriptor;
//!
//! let descriptor = SessionDescriptor::new_session("east", "demo.");
//! let token = descriptor.encode();
//! assert_eq!(SessionDescriptor::decode(&token).unwrap(), descriptor);
//! ```

mod token;

pub use token::{SessionDescriptor, TokenError};
