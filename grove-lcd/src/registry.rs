//! Device-node registration.
//!
//! A logical device becomes visible to consumers when it is registered under
//! a name, and disappears when it is unregistered.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Identity of a registered device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

pub trait DeviceRegistry: Send + Sync {
    /// Create a device node called `name`.
    fn register_device_node(&self, name: &str) -> Result<DeviceId>;

    /// Remove a node created by `register_device_node`.
    fn unregister_device_node(&self, id: DeviceId);
}

/// In-process registry handing out minor numbers under one major.
pub struct LocalRegistry {
    major: u32,
    max_minors: u32,
    nodes: Mutex<BTreeMap<DeviceId, String>>,
}

impl LocalRegistry {
    pub fn new(major: u32, max_minors: u32) -> Self {
        Self {
            major,
            max_minors,
            nodes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<DeviceId> {
        self.nodes
            .lock()
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new(240, 8)
    }
}

impl DeviceRegistry for LocalRegistry {
    fn register_device_node(&self, name: &str) -> Result<DeviceId> {
        let mut nodes = self.nodes.lock();
        if nodes.values().any(|n| n == name) {
            return Err(Error::Registration(format!("{name} already registered")));
        }
        let minor = (0..self.max_minors)
            .find(|&minor| !nodes.contains_key(&DeviceId { major: self.major, minor }))
            .ok_or_else(|| Error::Registration(format!("no free minor for {name}")))?;

        let id = DeviceId {
            major: self.major,
            minor,
        };
        nodes.insert(id, name.to_string());
        debug!(name, %id, "Registered device node");
        Ok(id)
    }

    fn unregister_device_node(&self, id: DeviceId) {
        match self.nodes.lock().remove(&id) {
            Some(name) => debug!(name, %id, "Unregistered device node"),
            None => warn!(%id, "Unregistering unknown device node"),
        }
    }
}
