//! Bounded pool of public tunnel ports
//!
//! The frp server owns an inclusive range of TCP ports reachable from the
//! outside; this pool hands them out one per service. State is purely in
//! memory -- the caller serializes access (the orchestrator keeps the pool
//! behind a single mutex).

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

/// The free set was empty at assign time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no free external ports available in {start}-{end}")]
pub struct PoolExhausted {
    pub start: u16,
    pub end: u16,
}

/// Free-list port pool with a bidirectional service <-> port mapping
///
/// Invariants: an assigned port is never in the free set, a service holds
/// at most one port, and the free set plus the assigned mapping always
/// cover the whole configured range. Assignment is deterministic: the
/// lowest free port wins, so reuse after release is predictable.
#[derive(Debug)]
pub struct PortPool {
    start: u16,
    end: u16,
    free: BTreeSet<u16>,
    by_service: HashMap<String, u16>,
    by_port: HashMap<u16, String>,
}

impl PortPool {
    /// Pool over the inclusive range `start..=end`.
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            start,
            end,
            free: (start..=end).collect(),
            by_service: HashMap::new(),
            by_port: HashMap::new(),
        }
    }

    /// Assign a port to `service_name`.
    ///
    /// Idempotent: a service that already holds a port gets the same port
    /// back without consuming another one.
    pub fn assign(&mut self, service_name: &str) -> Result<u16, PoolExhausted> {
        if let Some(port) = self.by_service.get(service_name) {
            return Ok(*port);
        }

        let port = self.free.pop_first().ok_or(PoolExhausted {
            start: self.start,
            end: self.end,
        })?;
        self.by_service.insert(service_name.to_string(), port);
        self.by_port.insert(port, service_name.to_string());
        Ok(port)
    }

    /// Return the service's port to the free set.
    ///
    /// Releasing an unassigned service is a no-op; the freed port (if any)
    /// is returned for logging.
    pub fn release(&mut self, service_name: &str) -> Option<u16> {
        let port = self.by_service.remove(service_name)?;
        self.by_port.remove(&port);
        self.free.insert(port);
        Some(port)
    }

    pub fn port_for(&self, service_name: &str) -> Option<u16> {
        self.by_service.get(service_name).copied()
    }

    pub fn service_for(&self, port: u16) -> Option<&str> {
        self.by_port.get(&port).map(String::as_str)
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }
}
