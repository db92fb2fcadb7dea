//! Boot descriptor: the output of emission.
//!
//! Emission flattens the statement tree into this structure, which a
//! flat-blob writer or source printer consumes downstream.

use crate::data::Data;

/// One reserved-memory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveEntry {
    /// Start address
    pub address: u64,
    /// Size in bytes
    pub size: u64,
    /// Optional label attached to the entry
    pub label: Option<String>,
}

/// One emitted property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name
    pub name: String,
    /// Optional label attached to the definition
    pub label: Option<String>,
    /// Flattened value
    pub value: Data,
}

/// One emitted device node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceNode {
    /// Node name
    pub name: String,
    /// Optional label attached to the definition
    pub label: Option<String>,
    /// Properties in emission order
    pub properties: Vec<Property>,
    /// Child nodes in emission order
    pub children: Vec<DeviceNode>,
}

impl DeviceNode {
    /// Creates an empty node with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        DeviceNode {
            name: name.into(),
            ..DeviceNode::default()
        }
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Looks up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&DeviceNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Complete output of one compilation session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootDescriptor {
    /// Reserved-memory entries in emission order
    pub reserves: Vec<ReserveEntry>,
    /// The tree root, if one was emitted
    pub root: Option<DeviceNode>,
}
