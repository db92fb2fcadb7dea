//! Expression evaluation.
//!
//! `eval` reduces a simplified expression tree to a value node:
//! a resolved literal, a string, a list of values, or a marker-bearing
//! reference. Errors are reported to the diagnostic stream and produce
//! `None`, which callers propagate without further noise.

use crate::data::unescape;
use crate::error::{Error, Result};
use crate::ir::{IrKind, NodeId};
use crate::runtime::scope::{Frame, ScopeMask, SymbolKind};
use crate::runtime::session::Session;
use crate::runtime::simplify::parse_literal;

/// Folds a binary operator over two resolved numbers.
pub(crate) fn fold_binop(kind: IrKind, l: u64, r: u64) -> Result<u64> {
    Ok(match kind {
        IrKind::Add => l.wrapping_add(r),
        IrKind::Sub => l.wrapping_sub(r),
        IrKind::Mul => l.wrapping_mul(r),
        IrKind::Div => {
            if r == 0 {
                return Err(Error::DivisionByZero);
            }
            l / r
        }
        IrKind::Mod => {
            if r == 0 {
                return Err(Error::DivisionByZero);
            }
            l % r
        }
        IrKind::BitOr => l | r,
        IrKind::BitXor => l ^ r,
        IrKind::BitAnd => l & r,
        IrKind::Eq => u64::from(l == r),
        IrKind::Ne => u64::from(l != r),
        IrKind::Lt => u64::from(l < r),
        IrKind::Le => u64::from(l <= r),
        IrKind::Gt => u64::from(l > r),
        IrKind::Ge => u64::from(l >= r),
        IrKind::Lshift => {
            if r >= 64 {
                0
            } else {
                l << r
            }
        }
        IrKind::Rshift => {
            if r >= 64 {
                0
            } else {
                l >> r
            }
        }
        IrKind::Or => u64::from(l != 0 || r != 0),
        IrKind::And => u64::from(l != 0 && r != 0),
        _ => unreachable!("{} is not a binary operator", kind.name()),
    })
}

/// Folds a unary operator over a resolved number.
pub(crate) fn fold_unop(kind: IrKind, v: u64) -> u64 {
    match kind {
        IrKind::Neg => v.wrapping_neg(),
        IrKind::BitNot => !v,
        IrKind::Not => u64::from(v == 0),
        _ => unreachable!("{} is not a unary operator", kind.name()),
    }
}

impl Session {
    /// Reduces an expression to a value node.
    pub fn eval(&mut self, ir: Option<NodeId>) -> Option<NodeId> {
        let ir = ir?;
        if !self.enter(ir) {
            self.leave();
            return None;
        }
        let result = self.eval_node(ir);
        self.leave();
        result
    }

    fn eval_node(&mut self, ir: NodeId) -> Option<NodeId> {
        let kind = self.arena[ir].kind;
        match kind {
            // Already values
            IrKind::LitAddr
            | IrKind::LitCell
            | IrKind::LitByte
            | IrKind::LitStr
            | IrKind::PropNodeName
            | IrKind::Label
            | IrKind::RefPath => Some(ir),

            // A phandle reference over a string expression is promoted
            // to a direct reference.
            IrKind::RefPhandle => {
                let lab = self.arena[ir].label;
                let new = self.arena.copy(ir);
                if let Some(lab) = lab {
                    if let Some(v) = self.eval(Some(lab)) {
                        if self.arena.is_string(Some(v)) {
                            let text = self.arena[v].text.clone();
                            self.arena[new].label_name = text;
                        }
                    }
                }
                Some(new)
            }

            IrKind::Range => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let l = self.eval(e1);
                let r = self.eval(e2);
                let new = self.arena.copy(ir);
                self.arena[new].expr1 = l;
                self.arena[new].expr2 = r;
                Some(new)
            }

            IrKind::Incbin => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let e3 = self.arena[ir].expr3;
                let f = self.eval(e1);
                let off = self.eval(e2);
                let len = self.eval(e3);
                let new = self.arena.copy(ir);
                self.arena[new].expr1 = f;
                self.arena[new].expr2 = off;
                self.arena[new].expr3 = len;
                Some(new)
            }

            // Command-line constants arrive unparsed; a literal that
            // isn't a number is taken as a string.
            IrKind::Literal => {
                let text = self.arena[ir].text.clone().unwrap_or_default();
                let pos = self.pos_of(ir);
                match parse_literal(&text, 64) {
                    Ok(v) => Some(self.arena.lit_addr(v, &pos)),
                    Err(_) => Some(self.arena.lit_str(text, &pos)),
                }
            }

            IrKind::Add
            | IrKind::Sub
            | IrKind::Mul
            | IrKind::Div
            | IrKind::BitOr
            | IrKind::BitXor
            | IrKind::BitAnd
            | IrKind::Eq
            | IrKind::Ne
            | IrKind::Lt
            | IrKind::Le
            | IrKind::Gt
            | IrKind::Ge
            | IrKind::Lshift
            | IrKind::Rshift => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let l = self.eval_for_addr(e1)?;
                let r = self.eval_for_addr(e2)?;
                match fold_binop(kind, l, r) {
                    Ok(v) => {
                        let pos = self.pos_of(ir);
                        Some(self.arena.lit_addr(v, &pos))
                    }
                    Err(err) => {
                        self.error_at(ir, err);
                        None
                    }
                }
            }

            IrKind::Mod => self.eval_mod(ir),

            IrKind::Neg | IrKind::BitNot | IrKind::Not => {
                let e1 = self.arena[ir].expr1;
                let v = self.eval_for_addr(e1)?;
                let pos = self.pos_of(ir);
                Some(self.arena.lit_addr(fold_unop(kind, v), &pos))
            }

            IrKind::Or => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let l = self.eval_for_addr(e1)?;
                let v = if l != 0 {
                    1
                } else {
                    u64::from(self.eval_for_addr(e2)? != 0)
                };
                let pos = self.pos_of(ir);
                Some(self.arena.lit_addr(v, &pos))
            }

            IrKind::And => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let l = self.eval_for_addr(e1)?;
                let v = if l == 0 {
                    0
                } else {
                    u64::from(self.eval_for_addr(e2)? != 0)
                };
                let pos = self.pos_of(ir);
                Some(self.arena.lit_addr(v, &pos))
            }

            IrKind::Select => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let e3 = self.arena[ir].expr3;
                let c = self.eval_for_addr(e1)?;
                if c != 0 {
                    self.eval(e2)
                } else {
                    self.eval(e3)
                }
            }

            IrKind::Id => {
                let name = self.arena[ir].text.clone().unwrap_or_default();
                let bound = self
                    .scopes
                    .lookup(&name, ScopeMask::ANY)
                    .and_then(|sym| self.scopes.value_of(sym));
                match bound {
                    Some(value) => self.eval(Some(value)),
                    None => {
                        self.error_at(ir, Error::UnknownIdentifier { name });
                        None
                    }
                }
            }

            IrKind::Cell => {
                let e1 = self.arena[ir].expr1;
                let v = self.eval(e1)?;
                if self.arena.is_constant(Some(v)) {
                    let value = self.arena[v].literal;
                    let pos = self.pos_of(ir);
                    let cell = self.arena.alloc(IrKind::LitCell, &pos);
                    self.arena[cell].literal = value;
                    Some(cell)
                } else if self.arena.is_string(Some(v))
                    || self.arena[v].kind == IrKind::List
                {
                    // Strings and lists pass through unnarrowed.
                    Some(v)
                } else {
                    self.error_at(ir, Error::NoCellValue);
                    None
                }
            }

            IrKind::List => {
                let elems = self.arena[ir].elems.clone();
                let pos = self.pos_of(ir);
                let list = self.arena.alloc(IrKind::List, &pos);
                for elem in elems {
                    if let Some(v) = self.eval(Some(elem)) {
                        self.arena[list].elems.push(v);
                    }
                }
                Some(list)
            }

            IrKind::Builtin => self.eval_builtin(ir),

            IrKind::FuncCall => {
                let frame = self.eval_func_body(ir)?;
                frame.return_value
            }

            IrKind::CvtString => {
                let e1 = self.arena[ir].expr1;
                let v = self.eval(e1)?;
                let s = self.cvt_to_string(v)?;
                let pos = self.pos_of(ir);
                Some(self.arena.lit_str(s, &pos))
            }

            IrKind::CvtPropNodeName => {
                let e1 = self.arena[ir].expr1;
                let s = self.eval_for_name(e1, "property or node")?;
                let pos = self.pos_of(ir);
                Some(self.arena.prop_node_name(s, &pos))
            }

            _ => {
                self.error_at(
                    ir,
                    Error::StatementInExpression { kind: kind.name() },
                );
                None
            }
        }
    }

    /// The `%` operator: modulo over numbers, concatenation when
    /// either operand is a string.
    fn eval_mod(&mut self, ir: NodeId) -> Option<NodeId> {
        let e1 = self.arena[ir].expr1;
        let e2 = self.arena[ir].expr2;
        let l = self.eval(e1)?;
        let r = self.eval(e2)?;

        if self.arena.is_constant(Some(l)) && self.arena.is_constant(Some(r)) {
            let lv = self.arena[l].literal;
            let rv = self.arena[r].literal;
            return match fold_binop(IrKind::Mod, lv, rv) {
                Ok(v) => {
                    let pos = self.pos_of(ir);
                    Some(self.arena.lit_addr(v, &pos))
                }
                Err(err) => {
                    self.error_at(ir, err);
                    None
                }
            };
        }

        if self.arena.is_string(Some(l)) || self.arena.is_string(Some(r)) {
            let mut s = self.cvt_to_string(l)?;
            s.push_str(&self.cvt_to_string(r)?);
            let pos = self.pos_of(ir);
            return Some(self.arena.lit_str(s, &pos));
        }

        let got = self.arena[l].kind.name();
        self.error_at(
            ir,
            Error::TypeError {
                expected: "constants or strings".to_string(),
                got: got.to_string(),
            },
        );
        None
    }

    /// Reduces an expression to a resolved number.
    pub fn eval_for_addr(&mut self, ir: Option<NodeId>) -> Option<u64> {
        let v = self.eval(ir)?;
        if self.arena.is_constant(Some(v)) {
            return Some(self.arena[v].literal);
        }
        let got = self.arena[v].kind.name();
        self.error_at(
            v,
            Error::TypeError {
                expected: "constant".to_string(),
                got: got.to_string(),
            },
        );
        None
    }

    /// Reduces an expression to a property or node name.
    pub(crate) fn eval_for_name(
        &mut self,
        ir: Option<NodeId>,
        what: &'static str,
    ) -> Option<String> {
        let v = self.eval(ir)?;
        match self.arena[v].kind {
            IrKind::PropNodeName | IrKind::LitStr => self.arena[v].text.clone(),
            kind if kind.is_constant() => Some(self.arena[v].literal.to_string()),
            _ => {
                self.error_at(v, Error::NoName { what });
                None
            }
        }
    }

    /// Reduces an expression to an escape-processed string.
    pub(crate) fn eval_for_string(&mut self, ir: Option<NodeId>) -> Option<String> {
        let v = self.eval(ir)?;
        if !self.arena.is_string(Some(v)) {
            let kind = self.arena[v].kind.name();
            self.error_at(v, Error::NotAString { kind });
            return None;
        }
        let text = self.arena[v].text.as_deref().unwrap_or("");
        Some(String::from_utf8_lossy(&unescape(text)).into_owned())
    }

    /// Extracts a reference label from a value node, if it carries one.
    pub(crate) fn eval_for_label(&self, ir: Option<NodeId>) -> Option<String> {
        let ir = ir?;
        match self.arena[ir].kind {
            IrKind::Label | IrKind::RefPath | IrKind::RefPhandle => {
                self.arena[ir].label_name.clone()
            }
            IrKind::LitStr => self.arena[ir].text.clone(),
            _ => None,
        }
    }

    /// Converts an already-evaluated value to string form.
    pub(crate) fn cvt_to_string(&mut self, v: NodeId) -> Option<String> {
        match self.arena[v].kind {
            IrKind::LitStr | IrKind::PropNodeName => self.arena[v].text.clone(),
            kind if kind.is_constant() => Some(self.arena[v].literal.to_string()),
            kind => {
                self.error_at(v, Error::NotAString { kind: kind.name() });
                None
            }
        }
    }

    /// Runs a function call: resolves the callee, binds actuals to
    /// formals in a fresh function-call frame, runs the body, and
    /// returns the popped frame with its return value and emitted
    /// side effects.
    pub(crate) fn eval_func_body(&mut self, ir: NodeId) -> Option<Frame> {
        let name = match self.arena[ir].name {
            Some(n) if self.arena[n].kind == IrKind::Id => self.arena[n].text.clone(),
            _ => None,
        };
        let Some(name) = name else {
            self.error_at(ir, Error::NoFunctionName);
            return None;
        };

        let Some(sym) = self.scopes.lookup(&name, ScopeMask::ANY) else {
            self.error_at(ir, Error::UnknownIdentifier { name });
            return None;
        };
        let def = match self.scopes.value_of(sym) {
            Some(def) if self.arena[def].kind == IrKind::FuncDef => def,
            _ => {
                self.error_at(ir, Error::NotAFunction { name });
                return None;
            }
        };

        let formals: Vec<NodeId> = match self.arena[def].declarations {
            Some(list) => self.arena[list].elems.clone(),
            None => Vec::new(),
        };
        let actuals: Vec<NodeId> = match self.arena[ir].expr1 {
            Some(list) if self.arena[list].kind == IrKind::List => {
                self.arena[list].elems.clone()
            }
            Some(arg) => vec![arg],
            None => Vec::new(),
        };

        // Actuals are evaluated in the caller's scope.
        let values: Vec<Option<NodeId>> =
            actuals.iter().map(|&a| self.eval(Some(a))).collect();

        let defined_at = self.pos_of(def).to_string();
        if values.len() < formals.len() {
            self.error_at(ir, Error::NotEnoughParameters { name, defined_at });
        } else if values.len() > formals.len() {
            self.error_at(ir, Error::TooManyParameters { name, defined_at });
        }

        // An arity mismatch does not stop the call: extra actuals are
        // dropped, formals without an actual stay unbound.
        self.scopes.push(ScopeMask::FUNC_CALL);
        let mut values = values.into_iter();
        for formal in &formals {
            let value = values.next().flatten();
            if let Some(pname) = self.arena[*formal].text.clone() {
                let sym = self.scopes.create_local(&pname, SymbolKind::Param);
                self.scopes.set_value(sym, value);
            }
        }

        let body = self.arena[def].statements;
        self.emit_statement_list(body);
        self.scopes.pop()
    }
}
