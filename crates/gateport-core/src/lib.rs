//! Registration orchestration for gateport
//!
//! The [`Gateway`] sequences each registration/deregistration across the
//! registry, the port pool and the two proxy control planes, compensating
//! on partial failure so that no operation leaves the registry pointing at
//! proxy state that does not exist.

pub mod error;
pub mod gateway;

pub use error::GatewayError;
pub use gateway::{
    Gateway, HttpRegistration, HttpUnregistration, SshRegistration, SshUnregistration,
};
