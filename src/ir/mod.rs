//! Intermediate representation: node kinds and the node arena.

pub mod node;

pub use node::{Arena, IrKind, Node, NodeId};
