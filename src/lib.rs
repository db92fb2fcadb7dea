//! # dtforge - Procedural Device Tree Compilation Core
//!
//! [![License: MIT](https://img.shields.io/badge/License-MIT-yellow.svg)](https://opensource.org/licenses/MIT)
//!
//! The semantic core of a device-tree-source compiler whose input
//! language carries a small procedural layer: constants, functions,
//! loops, conditionals, and string-building expressions. A front-end
//! parser builds an IR tree in the node arena; this crate simplifies
//! it, evaluates it, and emits a [`BootDescriptor`] holding the device
//! tree and its memory reservations, ready for a flat-blob writer.
//!
//! ## Pipeline
//!
//! - **Simplify** folds constant expressions, parses numeric literals
//!   in their width context, collapses conditionals with constant
//!   conditions, and resolves builtin calls to direct dispatch.
//! - **Emit** walks the statements, evaluates the remaining
//!   expressions against the scope stack, and accumulates nodes,
//!   properties, and reservations into the boot descriptor.
//!
//! Errors never abort mid-tree: each is reported once to the
//! diagnostic stream, the offending value turns into a silent null,
//! and [`Session::process`] fails at the end if anything was reported.
//!
//! ## Quick Start
//!
//! Compile `/ { model = "demo"; };` built directly as IR:
//!
//! ```rust
//! use dtforge::{IrKind, Session, SrcPos};
//!
//! # fn main() -> dtforge::Result<()> {
//! let mut s = Session::new();
//! let p = SrcPos::new("board.dts", 1);
//!
//! let prop = s.arena.alloc(IrKind::PropDef, &p);
//! let pname = s.arena.prop_node_name("model", &p);
//! let pvalue = s.arena.lit_str("demo", &p);
//! s.arena[prop].name = Some(pname);
//! s.arena[prop].expr1 = Some(pvalue);
//!
//! let node = s.arena.alloc(IrKind::Node, &p);
//! let nname = s.arena.prop_node_name("/", &p);
//! s.arena[node].name = Some(nname);
//! s.arena[node].statements = s.arena.list_append(None, Some(prop));
//!
//! let root = s.arena.alloc(IrKind::Root, &p);
//! s.arena[root].statements = Some(node);
//!
//! let boot = s.process(root)?;
//! let top = boot.root.unwrap();
//! assert_eq!(top.name, "/");
//! assert_eq!(top.properties[0].value.bytes, b"demo\0");
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod boot;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod nv;
pub mod runtime;
pub mod srcpos;

pub use blob::{BlobSource, FsBlobSource, MemBlobSource};
pub use boot::{BootDescriptor, DeviceNode, Property, ReserveEntry};
pub use data::{Data, Marker, MarkerKind};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, Result};
pub use ir::{Arena, IrKind, Node, NodeId};
pub use nv::{NvList, NvPair};
pub use runtime::{
    BuiltinId, EvalContext, ScopeMask, ScopeStack, Session, SessionConfig, SymbolKind,
};
pub use srcpos::SrcPos;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
