//! Statement emission.
//!
//! The second pass: walks the simplified statement tree, evaluates
//! expressions in place, and accumulates properties, nodes, and
//! reservations in the scope stack. The popped root frame becomes the
//! boot descriptor.

use tracing::debug;

use crate::boot::{BootDescriptor, DeviceNode, Property, ReserveEntry};
use crate::data::{Data, MarkerKind, PHANDLE_PLACEHOLDER};
use crate::error::Error;
use crate::ir::{IrKind, NodeId};
use crate::nv::NvPair;
use crate::runtime::scope::{ScopeMask, SymbolKind};
use crate::runtime::session::Session;
use crate::srcpos::SrcPos;

impl Session {
    /// Emits a compilation unit and builds its boot descriptor.
    pub(crate) fn emit_root(&mut self, ir: NodeId) -> Option<BootDescriptor> {
        if self.arena[ir].kind != IrKind::Root {
            let kind = self.arena[ir].kind.name();
            self.error_at(ir, Error::NotAStatement { kind });
            return None;
        }

        self.scopes.push(ScopeMask::ROOT);
        self.add_cmdline_constants();

        let decls = self.arena[ir].declarations;
        self.emit_declaration_list(decls);

        let stmt = self.arena[ir].statements;
        self.emit_statement_list(stmt);

        self.scopes.dump();
        let frame = self.scopes.pop()?;
        Some(BootDescriptor {
            reserves: frame.reserves,
            root: frame.nodes.into_iter().next(),
        })
    }

    /// Installs command-line definitions as root-scope constants.
    /// Their values stay unparsed literals; evaluation decides later
    /// whether each one is a number or a string.
    fn add_cmdline_constants(&mut self) {
        let pairs: Vec<NvPair> = self.defines.iter().cloned().collect();
        for pair in pairs {
            debug!(name = %pair.name, "command-line constant");
            let value = pair
                .value
                .map(|text| self.arena.literal(text, &SrcPos::none()));
            let sym = self
                .scopes
                .create_symbol(ScopeMask::ROOT, &pair.name, SymbolKind::Const);
            self.scopes.set_value(sym, value);
        }
    }

    fn emit_declaration_list(&mut self, ir: Option<NodeId>) {
        let Some(ir) = ir else {
            return;
        };
        if self.arena[ir].kind == IrKind::List {
            for decl in self.arena[ir].elems.clone() {
                self.emit_declaration(decl);
            }
        } else {
            self.emit_declaration(ir);
        }
    }

    fn emit_declaration(&mut self, ir: NodeId) {
        match self.arena[ir].kind {
            IrKind::ConstDef => self.emit_const_def(ir),
            IrKind::FuncDef => self.emit_func_def(ir),
            IrKind::MemReserve => self.emit_mem_reserve(ir),
            IrKind::List => self.emit_declaration_list(Some(ir)),
            kind => self.error_at(ir, Error::NotADeclaration { kind: kind.name() }),
        }
    }

    /// A constant definition evaluates its initializer once, at
    /// declaration time; a later definition of the same name anywhere
    /// in scope is dropped with a warning.
    fn emit_const_def(&mut self, ir: NodeId) {
        let Some(name) = self.arena[ir].text.clone() else {
            self.error_at(ir, Error::NoName { what: "constant" });
            return;
        };

        if self.scopes.lookup(&name, ScopeMask::ANY).is_some() {
            self.warn_at(ir, Error::Redefinition { name });
            return;
        }

        let value_e = self.arena[ir].expr1;
        let value = self.eval(value_e);
        let sym = self
            .scopes
            .create_symbol(ScopeMask::ROOT, &name, SymbolKind::Const);
        self.scopes.set_value(sym, value);
    }

    fn emit_func_def(&mut self, ir: NodeId) {
        let Some(name) = self.arena[ir].text.clone() else {
            self.error_at(ir, Error::NoName { what: "function" });
            return;
        };

        if self.scopes.lookup(&name, ScopeMask::ROOT).is_some() {
            self.error_at(ir, Error::Redefinition { name });
            return;
        }

        let sym = self
            .scopes
            .create_symbol(ScopeMask::ROOT, &name, SymbolKind::FuncDef);
        self.scopes.set_value(sym, Some(ir));
    }

    fn emit_mem_reserve(&mut self, ir: NodeId) {
        let addr_e = self.arena[ir].expr1;
        let size_e = self.arena[ir].expr2;
        let Some(address) = self.eval_for_addr(addr_e) else {
            return;
        };
        let Some(size) = self.eval_for_addr(size_e) else {
            return;
        };
        let label = self.statement_label(ir);

        if let Err(err) = self.scopes.append_reserve(ReserveEntry {
            address,
            size,
            label,
        }) {
            self.error_at(ir, err);
        }
    }

    /// Emits one statement list; a missing list is an empty one.
    pub(crate) fn emit_statement_list(&mut self, ir: Option<NodeId>) {
        if let Some(ir) = ir {
            self.emit_statement(ir);
        }
    }

    fn emit_statement(&mut self, ir: NodeId) {
        match self.arena[ir].kind {
            IrKind::Node => self.emit_node(ir),
            IrKind::PropDef => self.emit_prop_def(ir),
            IrKind::Assign => self.emit_assign(ir),
            IrKind::For => self.emit_for(ir),
            IrKind::If => self.emit_if(ir),
            IrKind::Return => self.emit_return(ir),
            IrKind::FuncCall => self.emit_func_call(ir),
            IrKind::List => {
                for stmt in self.arena[ir].elems.clone() {
                    self.emit_statement(stmt);
                }
            }
            kind => self.error_at(ir, Error::NotAStatement { kind: kind.name() }),
        }
    }

    fn emit_node(&mut self, ir: NodeId) {
        let name_e = self.arena[ir].name;
        let Some(name) = self.eval_for_name(name_e, "node") else {
            return;
        };
        let label = self.statement_label(ir);

        self.scopes.push(ScopeMask::NODE);
        let body = self.arena[ir].statements;
        self.emit_statement_list(body);
        let Some(frame) = self.scopes.pop() else {
            return;
        };

        let node = DeviceNode {
            name,
            label,
            properties: frame.properties,
            children: frame.nodes,
        };
        if let Err(err) = self.scopes.append_node(node) {
            self.error_at(ir, err);
        }
    }

    fn emit_prop_def(&mut self, ir: NodeId) {
        let name_e = self.arena[ir].name;
        let Some(name) = self.eval_for_name(name_e, "property") else {
            return;
        };
        let label = self.statement_label(ir);

        let mut value = Data::new();
        let value_e = self.arena[ir].expr1;
        if value_e.is_some() {
            self.eval_for_data(value_e, &mut value);
        }

        if let Err(err) = self.scopes.append_property(Property { name, label, value }) {
            self.error_at(ir, err);
        }
    }

    /// Resolves a statement's label: either attached directly or
    /// carried by a label-valued child expression.
    fn statement_label(&mut self, ir: NodeId) -> Option<String> {
        match self.arena[ir].label_name.clone() {
            Some(label) => Some(label),
            None => {
                let lab = self.arena[ir].label;
                let v = self.eval(lab);
                self.eval_for_label(v)
            }
        }
    }

    /// Flattens an evaluated value into property data.
    pub(crate) fn eval_for_data(&mut self, ir: Option<NodeId>, data: &mut Data) {
        let Some(v) = self.eval(ir) else {
            return;
        };

        match self.arena[v].kind {
            IrKind::LitStr => {
                let text = self.arena[v].text.clone().unwrap_or_default();
                data.append_escaped_string(&text);
            }
            IrKind::LitByte => data.append_byte(self.arena[v].literal as u8),
            IrKind::LitCell => data.append_cell(self.arena[v].literal as u32),
            IrKind::LitAddr => data.append_addr(self.arena[v].literal),
            IrKind::Label => {
                let label = self.eval_for_label(Some(v)).unwrap_or_default();
                data.add_marker(MarkerKind::Label, label);
            }
            IrKind::RefPath => {
                let label = self.eval_for_label(Some(v)).unwrap_or_default();
                data.add_marker(MarkerKind::RefPath, label);
            }
            IrKind::RefPhandle => {
                let label = self.eval_for_label(Some(v)).unwrap_or_default();
                data.add_marker(MarkerKind::RefPhandle, label);
                data.append_cell(PHANDLE_PLACEHOLDER);
            }
            IrKind::List => {
                for elem in self.arena[v].elems.clone() {
                    self.eval_for_data(Some(elem), data);
                }
            }
            IrKind::Incbin => self.emit_incbin(v, data),
            kind => self.error_at(v, Error::NotData { kind: kind.name() }),
        }
    }

    /// Splices a binary file (or a slice of it) into property data.
    /// A missing offset reads from the start; a missing length reads
    /// to the end of the file.
    fn emit_incbin(&mut self, ir: NodeId, data: &mut Data) {
        let file_e = self.arena[ir].expr1;
        let Some(file) = self.eval_for_string(file_e) else {
            return;
        };

        let offset = match self.arena[ir].expr2 {
            Some(e) => match self.eval_for_addr(Some(e)) {
                Some(offset) => offset,
                None => return,
            },
            None => 0,
        };
        let len = match self.arena[ir].expr3 {
            Some(e) => match self.eval_for_addr(Some(e)) {
                Some(len) => Some(len),
                None => return,
            },
            None => None,
        };

        match self.blobs.read(&file, offset, len) {
            Ok(bytes) => data.append_bytes(&bytes),
            Err(err) => self.error_at(ir, err),
        }
    }

    /// Assignment binds the evaluated value to the nearest visible
    /// local, creating one when the name is unbound. Constants keep
    /// their value; the assignment is reported and dropped.
    fn emit_assign(&mut self, ir: NodeId) {
        let Some(name) = self.arena[ir].text.clone() else {
            self.error_at(ir, Error::NoName { what: "variable" });
            return;
        };

        let value_e = self.arena[ir].expr1;
        let value = self.eval(value_e);

        match self.scopes.lookup_local(&name) {
            Some(sym) if self.scopes.kind_of(sym) == SymbolKind::Const => {
                self.error_at(ir, Error::AssignToConstant { name });
            }
            Some(sym) => self.scopes.set_value(sym, value),
            None => {
                let sym = self.scopes.create_local(&name, SymbolKind::Var);
                self.scopes.set_value(sym, value);
            }
        }
    }

    /// Runs the loop body once per value of the inclusive range. The
    /// bounds are evaluated once, before the first iteration; the loop
    /// variable is rebound in place each time around.
    fn emit_for(&mut self, ir: NodeId) {
        let Some(var) = self.arena[ir].text.clone() else {
            self.error_at(ir, Error::NoName { what: "loop variable" });
            return;
        };

        let (start_e, stop_e) = match self.arena[ir].expr1 {
            Some(r) if self.arena[r].kind == IrKind::Range => {
                (self.arena[r].expr1, self.arena[r].expr2)
            }
            other => {
                let got = self
                    .arena
                    .kind(other)
                    .map(IrKind::name)
                    .unwrap_or("nothing");
                self.error_at(
                    ir,
                    Error::TypeError {
                        expected: "range".to_string(),
                        got: got.to_string(),
                    },
                );
                return;
            }
        };
        let Some(start) = self.eval_for_addr(start_e) else {
            return;
        };
        let Some(stop) = self.eval_for_addr(stop_e) else {
            return;
        };

        self.scopes.push(ScopeMask::FOR_LOOP);
        let pos = self.pos_of(ir);
        let counter = self.arena.lit_addr(start, &pos);
        let sym = self.scopes.create_local(&var, SymbolKind::Var);
        self.scopes.set_value(sym, Some(counter));

        let body = self.arena[ir].statements;
        for i in start..=stop {
            self.arena[counter].literal = i;
            self.emit_statement_list(body);
        }
        self.scopes.pop();
    }

    fn emit_if(&mut self, ir: NodeId) {
        let cond_e = self.arena[ir].expr1;
        let Some(cond) = self.eval_for_addr(cond_e) else {
            return;
        };

        let branch = if cond != 0 {
            self.arena[ir].statements
        } else {
            self.arena[ir].statements2
        };
        self.emit_statement_list(branch);
    }

    fn emit_return(&mut self, ir: NodeId) {
        let value_e = self.arena[ir].expr1;
        let value = self.eval(value_e);
        if let Err(err) = self.scopes.set_return_value(value) {
            self.error_at(ir, err);
        }
    }

    /// A function call in statement position runs for its side
    /// effects: anything the body parked in the call frame is spliced
    /// into the surrounding node, and the return value is dropped.
    fn emit_func_call(&mut self, ir: NodeId) {
        let Some(frame) = self.eval_func_body(ir) else {
            return;
        };

        if let Err(err) = self.scopes.splice_properties(frame.properties) {
            self.error_at(ir, err);
        }
        if let Err(err) = self.scopes.splice_nodes(frame.nodes) {
            self.error_at(ir, err);
        }
    }
}
