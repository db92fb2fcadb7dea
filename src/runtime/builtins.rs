//! Builtin function registry.
//!
//! Call sites are rewritten during simplification: a call whose target
//! name matches a registered builtin becomes a `Builtin` node carrying
//! the resolved [`BuiltinId`], and evaluation dispatches on that id
//! without any scope lookup.

use crate::data::unescape;
use crate::error::Error;
use crate::ir::{IrKind, NodeId};
use crate::runtime::session::Session;

/// Identity of a registered builtin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinId {
    /// `join(...)`: concatenates arguments into one string
    Join,
    /// `hexstr(...)`: formats constant arguments in hexadecimal
    Hexstr,
    /// `list(x)`: wraps a value in a list if it isn't one
    List,
    /// `cell(x)`: forces a value to 32-bit cell width
    Cell,
}

impl BuiltinId {
    /// Name the builtin is called by.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinId::Join => "join",
            BuiltinId::Hexstr => "hexstr",
            BuiltinId::List => "list",
            BuiltinId::Cell => "cell",
        }
    }

    /// Resolves a call-target name to a builtin, if one is registered
    /// under that name.
    pub fn lookup(name: &str) -> Option<BuiltinId> {
        match name {
            "join" => Some(BuiltinId::Join),
            "hexstr" => Some(BuiltinId::Hexstr),
            "list" => Some(BuiltinId::List),
            "cell" => Some(BuiltinId::Cell),
            _ => None,
        }
    }
}

impl Session {
    /// Dispatches an evaluated `Builtin` node to its implementation.
    pub(crate) fn eval_builtin(&mut self, ir: NodeId) -> Option<NodeId> {
        let builtin = self.arena[ir].builtin?;
        match builtin {
            BuiltinId::Join => self.builtin_join(ir),
            BuiltinId::Hexstr => self.builtin_hexstr(ir),
            BuiltinId::List => self.builtin_list(ir),
            BuiltinId::Cell => self.builtin_cell(ir),
        }
    }

    /// Argument nodes of a builtin call. A single non-list argument is
    /// treated as a one-element sequence.
    fn builtin_args(&self, ir: NodeId) -> Vec<NodeId> {
        match self.arena[ir].expr1 {
            Some(args) if self.arena[args].kind == IrKind::List => self.arena[args].elems.clone(),
            Some(arg) => vec![arg],
            None => Vec::new(),
        }
    }

    fn builtin_join(&mut self, ir: NodeId) -> Option<NodeId> {
        let mut out = String::new();
        for arg in self.builtin_args(ir) {
            let Some(v) = self.eval(Some(arg)) else {
                continue;
            };
            if self.arena.is_string(Some(v)) {
                let text = self.arena[v].text.as_deref().unwrap_or("");
                out.push_str(&String::from_utf8_lossy(&unescape(text)));
            } else if self.arena.is_constant(Some(v)) {
                out.push_str(&self.arena[v].literal.to_string());
            } else {
                let kind = self.arena[v].kind.name();
                self.error_at(
                    v,
                    Error::BadBuiltinArgument {
                        builtin: "join",
                        kind,
                    },
                );
            }
        }

        let pos = self.pos_of(ir);
        Some(self.arena.lit_str(out, &pos))
    }

    fn builtin_hexstr(&mut self, ir: NodeId) -> Option<NodeId> {
        let mut out = String::new();
        for arg in self.builtin_args(ir) {
            let Some(v) = self.eval(Some(arg)) else {
                continue;
            };
            if self.arena.is_constant(Some(v)) {
                out.push_str(&format!("{:x}", self.arena[v].literal));
            } else {
                let kind = self.arena[v].kind.name();
                self.error_at(
                    v,
                    Error::BadBuiltinArgument {
                        builtin: "hexstr",
                        kind,
                    },
                );
            }
        }

        let pos = self.pos_of(ir);
        Some(self.arena.lit_str(out, &pos))
    }

    fn builtin_list(&mut self, ir: NodeId) -> Option<NodeId> {
        let args = self.arena[ir].expr1;
        let v = self.eval(args)?;
        if self.arena[v].kind == IrKind::List {
            return Some(v);
        }

        let pos = self.pos_of(ir);
        let list = self.arena.alloc(IrKind::List, &pos);
        self.arena[list].elems.push(v);
        Some(list)
    }

    fn builtin_cell(&mut self, ir: NodeId) -> Option<NodeId> {
        let arg = self.builtin_args(ir).into_iter().next()?;
        let pos = self.pos_of(ir);
        let cell = self.arena.unop(IrKind::Cell, Some(arg), &pos);
        self.eval(Some(cell))
    }
}
