//! Lexical scope stack and symbol tables.
//!
//! Every frame carries a kind mask, a symbol table, and the side-effect
//! accumulators the emitter fills: properties and child nodes for node
//! frames, reservations for the root frame, and a return value slot for
//! function-call frames. Searches walk from the innermost frame
//! outward and only consider frames whose kind intersects the search
//! mask.

use bitflags::bitflags;
use tracing::trace;

use crate::boot::{DeviceNode, Property, ReserveEntry};
use crate::error::{Error, Result};
use crate::ir::NodeId;

bitflags! {
    /// Frame kinds, usable as a search mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScopeMask: u8 {
        /// Compilation-unit root frame
        const ROOT = 1 << 0;
        /// Device-node frame
        const NODE = 1 << 1;
        /// For-loop body frame
        const FOR_LOOP = 1 << 2;
        /// Function-call frame
        const FUNC_CALL = 1 << 3;
    }
}

impl ScopeMask {
    /// Mask matching any frame kind.
    pub const ANY: ScopeMask = ScopeMask::all();
}

/// What a symbol is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Mutable variable
    Var,
    /// Function definition
    FuncDef,
    /// Formal parameter
    Param,
    /// Constant; assignment to it is an error
    Const,
}

/// One symbol-table entry.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Symbol name
    pub name: String,
    /// Binding kind
    pub kind: SymbolKind,
    /// Bound value, if any
    pub value: Option<NodeId>,
}

/// Stable handle to a symbol, valid until its frame is popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRef {
    frame: usize,
    index: usize,
}

/// One scope frame.
#[derive(Debug)]
pub struct Frame {
    /// Frame kind (exactly one mask bit)
    pub kind: ScopeMask,
    /// Symbols declared in this frame
    pub symbols: Vec<Symbol>,
    /// Return value set by a `return` statement (function-call frames)
    pub return_value: Option<NodeId>,
    /// Reservations accumulated here (root frame)
    pub reserves: Vec<ReserveEntry>,
    /// Properties accumulated here (node frames)
    pub properties: Vec<Property>,
    /// Child nodes accumulated here (node and root frames)
    pub nodes: Vec<DeviceNode>,
}

impl Frame {
    fn new(kind: ScopeMask) -> Self {
        Frame {
            kind,
            symbols: Vec::new(),
            return_value: None,
            reserves: Vec::new(),
            properties: Vec::new(),
            nodes: Vec::new(),
        }
    }

    fn find_symbol(&self, name: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s.name == name)
    }
}

/// The scope stack of one compilation session.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        ScopeStack::default()
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a fresh frame of the given kind.
    pub fn push(&mut self, kind: ScopeMask) {
        trace!(?kind, depth = self.frames.len(), "push scope");
        self.frames.push(Frame::new(kind));
    }

    /// Pops the innermost frame, returning its accumulated contents.
    pub fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop();
        if let Some(frame) = &frame {
            trace!(kind = ?frame.kind, depth = self.frames.len(), "pop scope");
        }
        frame
    }

    /// Innermost frame matching the mask, if any.
    fn find(&self, mask: ScopeMask) -> Option<usize> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| f.kind.intersects(mask))
            .map(|(i, _)| i)
    }

    /// Searches every frame matching the mask, innermost first.
    pub fn lookup(&self, name: &str, mask: ScopeMask) -> Option<SymbolRef> {
        for (i, frame) in self.frames.iter().enumerate().rev() {
            if !frame.kind.intersects(mask) {
                continue;
            }
            if let Some(index) = frame.find_symbol(name) {
                return Some(SymbolRef { frame: i, index });
            }
        }
        None
    }

    /// Searches the frames a local name is visible in: the enclosing
    /// loop frames, the nearest function-call frame, and the root.
    /// The search never crosses a function-call boundary.
    pub fn lookup_local(&self, name: &str) -> Option<SymbolRef> {
        let visible = ScopeMask::FUNC_CALL | ScopeMask::FOR_LOOP | ScopeMask::ROOT;
        for (i, frame) in self.frames.iter().enumerate().rev() {
            if frame.kind.intersects(visible) {
                if let Some(index) = frame.find_symbol(name) {
                    return Some(SymbolRef { frame: i, index });
                }
            }
            if frame.kind.intersects(ScopeMask::FUNC_CALL) {
                break;
            }
        }
        None
    }

    /// Creates (or rebinds) a local in the nearest function-call or
    /// root frame. Loop frames are deliberately skipped, so a variable
    /// first assigned inside a loop survives the loop's exit.
    pub fn create_local(&mut self, name: &str, kind: SymbolKind) -> SymbolRef {
        let frame = self
            .find(ScopeMask::FUNC_CALL | ScopeMask::ROOT)
            .unwrap_or(0);
        self.install(frame, name, kind)
    }

    /// Creates a symbol in the nearest frame matching the mask, unless
    /// one with that name is already there. Returns the surviving
    /// symbol either way.
    pub fn create_symbol(&mut self, mask: ScopeMask, name: &str, kind: SymbolKind) -> SymbolRef {
        let frame = self.find(mask).unwrap_or(0);
        if let Some(index) = self.frames[frame].find_symbol(name) {
            return SymbolRef { frame, index };
        }
        self.install(frame, name, kind)
    }

    fn install(&mut self, frame: usize, name: &str, kind: SymbolKind) -> SymbolRef {
        let frm = &mut self.frames[frame];
        if let Some(index) = frm.find_symbol(name) {
            frm.symbols[index].kind = kind;
            return SymbolRef { frame, index };
        }
        frm.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            value: None,
        });
        SymbolRef {
            frame,
            index: frm.symbols.len() - 1,
        }
    }

    /// Bound value of a symbol.
    pub fn value_of(&self, sym: SymbolRef) -> Option<NodeId> {
        self.frames[sym.frame].symbols[sym.index].value
    }

    /// Rebinds a symbol's value.
    pub fn set_value(&mut self, sym: SymbolRef, value: Option<NodeId>) {
        self.frames[sym.frame].symbols[sym.index].value = value;
    }

    /// Binding kind of a symbol.
    pub fn kind_of(&self, sym: SymbolRef) -> SymbolKind {
        self.frames[sym.frame].symbols[sym.index].kind
    }

    /// Name of a symbol.
    pub fn name_of(&self, sym: SymbolRef) -> &str {
        &self.frames[sym.frame].symbols[sym.index].name
    }

    /// Sets the return value of the nearest function-call frame.
    pub fn set_return_value(&mut self, value: Option<NodeId>) -> Result<()> {
        match self.find(ScopeMask::FUNC_CALL) {
            Some(frame) => {
                self.frames[frame].return_value = value;
                Ok(())
            }
            None => Err(Error::ReturnOutsideFunction),
        }
    }

    /// Appends a reservation to the root frame.
    pub fn append_reserve(&mut self, entry: ReserveEntry) -> Result<()> {
        match self.find(ScopeMask::ROOT) {
            Some(frame) => {
                self.frames[frame].reserves.push(entry);
                Ok(())
            }
            None => Err(Error::NoEnclosingScope {
                scope: "root scope",
                emitted: "memory reservation",
            }),
        }
    }

    /// Appends a property to the nearest node frame.
    pub fn append_property(&mut self, prop: Property) -> Result<()> {
        match self.find(ScopeMask::NODE) {
            Some(frame) => {
                self.frames[frame].properties.push(prop);
                Ok(())
            }
            None => Err(Error::NoEnclosingScope {
                scope: "node",
                emitted: "property",
            }),
        }
    }

    /// Appends a child node to the nearest node or root frame.
    pub fn append_node(&mut self, node: DeviceNode) -> Result<()> {
        match self.find(ScopeMask::NODE | ScopeMask::ROOT) {
            Some(frame) => {
                self.frames[frame].nodes.push(node);
                Ok(())
            }
            None => Err(Error::NoEnclosingScope {
                scope: "node or root scope",
                emitted: "node",
            }),
        }
    }

    /// Splices properties accumulated by a function call into the
    /// nearest node frame.
    pub fn splice_properties(&mut self, props: Vec<Property>) -> Result<()> {
        if props.is_empty() {
            return Ok(());
        }
        match self.find(ScopeMask::NODE) {
            Some(frame) => {
                self.frames[frame].properties.extend(props);
                Ok(())
            }
            None => Err(Error::NoEnclosingScope {
                scope: "node",
                emitted: "properties",
            }),
        }
    }

    /// Dumps every frame and its symbols to the trace log, innermost
    /// first.
    pub fn dump(&self) {
        for (i, frame) in self.frames.iter().enumerate().rev() {
            trace!(frame = i, kind = ?frame.kind, "scope frame");
            for sym in &frame.symbols {
                trace!(
                    name = %sym.name,
                    kind = ?sym.kind,
                    bound = sym.value.is_some(),
                    "  symbol"
                );
            }
        }
    }

    /// Splices child nodes accumulated by a function call into the
    /// nearest node frame.
    pub fn splice_nodes(&mut self, nodes: Vec<DeviceNode>) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        match self.find(ScopeMask::NODE) {
            Some(frame) => {
                self.frames[frame].nodes.extend(nodes);
                Ok(())
            }
            None => Err(Error::NoEnclosingScope {
                scope: "node",
                emitted: "nodes",
            }),
        }
    }
}
