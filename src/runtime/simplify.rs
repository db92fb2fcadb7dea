//! Tree simplification.
//!
//! The first of the two passes over a compilation unit. It parses
//! numeric literals in their width context, folds constant
//! subexpressions, collapses selects and ifs with constant conditions
//! without walking the dead branch, and rewrites calls to registered
//! builtins into direct dispatch nodes. Statements are rebuilt with
//! simplified children, never folded away.

use std::num::IntErrorKind;

use crate::error::{Error, Result};
use crate::ir::{IrKind, NodeId};
use crate::runtime::builtins::BuiltinId;
use crate::runtime::eval::{fold_binop, fold_unop};
use crate::runtime::session::Session;
use crate::srcpos::SrcPos;

/// Width context a subexpression is simplified in.
///
/// A cell wrapper narrows its subtree to 32 bits; statement boundaries
/// and include-binary arguments reset to the full address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalContext {
    /// Address-width (64-bit) context
    Any,
    /// 32-bit cell context
    Cell,
}

impl EvalContext {
    /// Number of value bits in this context.
    pub fn bits(self) -> u32 {
        match self {
            EvalContext::Any => 64,
            EvalContext::Cell => 32,
        }
    }
}

/// Parses a numeric literal in the usual C bases: `0x` hex, leading-`0`
/// octal, decimal otherwise. Rejects values that need more than `bits`
/// bits.
pub(crate) fn parse_literal(text: &str, bits: u32) -> Result<u64> {
    let (digits, radix) = if let Some(hex) =
        text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };

    let value = u64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::InvalidDigit => Error::BadCharsInLiteral {
            literal: text.to_string(),
        },
        IntErrorKind::PosOverflow => Error::LiteralOutOfRange {
            literal: text.to_string(),
            bits,
        },
        _ => Error::BadLiteral {
            literal: text.to_string(),
        },
    })?;

    if bits < 64 && value >> bits != 0 {
        return Err(Error::LiteralOutOfRange {
            literal: text.to_string(),
            bits,
        });
    }
    Ok(value)
}

impl Session {
    /// Simplifies a tree, returning the rebuilt root.
    pub fn simplify(&mut self, ir: Option<NodeId>, ctxt: EvalContext) -> Option<NodeId> {
        let ir = ir?;
        if !self.enter(ir) {
            self.leave();
            return None;
        }
        let result = self.simplify_node(ir, ctxt);
        self.leave();
        result
    }

    fn simplify_node(&mut self, ir: NodeId, ctxt: EvalContext) -> Option<NodeId> {
        let kind = self.arena[ir].kind;
        match kind {
            IrKind::Literal => {
                let text = self.arena[ir].text.clone().unwrap_or_default();
                let pos = self.pos_of(ir);
                match parse_literal(&text, ctxt.bits()) {
                    Ok(v) => Some(self.lit_in_ctxt(v, ctxt, &pos)),
                    Err(err) => {
                        self.error_at(ir, err);
                        None
                    }
                }
            }

            IrKind::LitStr
            | IrKind::LitAddr
            | IrKind::LitCell
            | IrKind::LitByte
            | IrKind::PropNodeName
            | IrKind::Id
            | IrKind::Label
            | IrKind::RefPath
            | IrKind::ParamDecl => Some(self.arena.copy(ir)),

            // The label of a phandle reference can itself be an
            // expression.
            IrKind::RefPhandle => {
                let lab = self.arena[ir].label;
                let new = self.arena.copy(ir);
                let lab_s = self.simplify(lab, EvalContext::Any);
                self.arena[new].label = lab_s;
                Some(new)
            }

            IrKind::Cell => {
                let e1 = self.arena[ir].expr1;
                let inner = self.simplify(e1, EvalContext::Cell);
                if self.arena.kind(inner) == Some(IrKind::LitCell) {
                    return inner;
                }
                let pos = self.pos_of(ir);
                Some(self.arena.unop(IrKind::Cell, inner, &pos))
            }

            IrKind::Add
            | IrKind::Sub
            | IrKind::Mul
            | IrKind::Div
            | IrKind::Mod
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
                let l = self.simplify(e1, ctxt);
                let r = self.simplify(e2, ctxt);

                if self.arena.is_constant(l) && self.arena.is_constant(r) {
                    let lv = self.arena[l.unwrap()].literal;
                    let rv = self.arena[r.unwrap()].literal;
                    return match fold_binop(kind, lv, rv) {
                        Ok(v) => {
                            let pos = self.pos_of(ir);
                            Some(self.lit_in_ctxt(v, ctxt, &pos))
                        }
                        Err(err) => {
                            self.error_at(ir, err);
                            None
                        }
                    };
                }

                let pos = self.pos_of(ir);
                Some(self.arena.binop(kind, l, r, &pos))
            }

            // Short-circuit folding: a decisive left side settles the
            // result before the right side is even simplified.
            IrKind::Or | IrKind::And => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let l = self.simplify(e1, ctxt);

                if self.arena.is_constant(l) {
                    let lv = self.arena[l.unwrap()].literal;
                    let decisive = match kind {
                        IrKind::Or => lv != 0,
                        _ => lv == 0,
                    };
                    if decisive {
                        let pos = self.pos_of(ir);
                        let v = u64::from(kind == IrKind::Or);
                        return Some(self.lit_in_ctxt(v, ctxt, &pos));
                    }
                    let r = self.simplify(e2, ctxt);
                    if self.arena.is_constant(r) {
                        let rv = self.arena[r.unwrap()].literal;
                        let pos = self.pos_of(ir);
                        return Some(self.lit_in_ctxt(u64::from(rv != 0), ctxt, &pos));
                    }
                    let pos = self.pos_of(ir);
                    return Some(self.arena.binop(kind, l, r, &pos));
                }

                let r = self.simplify(e2, ctxt);
                let pos = self.pos_of(ir);
                Some(self.arena.binop(kind, l, r, &pos))
            }

            IrKind::Neg | IrKind::BitNot | IrKind::Not => {
                let e1 = self.arena[ir].expr1;
                let e = self.simplify(e1, ctxt);
                if self.arena.is_constant(e) {
                    let v = fold_unop(kind, self.arena[e.unwrap()].literal);
                    let pos = self.pos_of(ir);
                    return Some(self.lit_in_ctxt(v, ctxt, &pos));
                }
                let pos = self.pos_of(ir);
                Some(self.arena.unop(kind, e, &pos))
            }

            IrKind::Select => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let e3 = self.arena[ir].expr3;
                let c = self.simplify(e1, ctxt);

                if self.arena.is_constant(c) {
                    let taken = if self.arena[c.unwrap()].literal != 0 { e2 } else { e3 };
                    return self.simplify(taken, ctxt);
                }

                let t = self.simplify(e2, ctxt);
                let f = self.simplify(e3, ctxt);
                let pos = self.pos_of(ir);
                Some(self.arena.triop(IrKind::Select, c, t, f, &pos))
            }

            IrKind::If => {
                let e1 = self.arena[ir].expr1;
                let then_b = self.arena[ir].statements;
                let else_b = self.arena[ir].statements2;
                let c = self.simplify(e1, EvalContext::Any);

                if self.arena.is_constant(c) {
                    let taken = if self.arena[c.unwrap()].literal != 0 {
                        then_b
                    } else {
                        else_b
                    };
                    return self.simplify(taken, EvalContext::Any);
                }

                let pos = self.pos_of(ir);
                let new = self.arena.alloc(IrKind::If, &pos);
                self.arena[new].expr1 = c;
                let then_s = self.simplify(then_b, EvalContext::Any);
                let else_s = self.simplify(else_b, EvalContext::Any);
                self.arena[new].statements = then_s;
                self.arena[new].statements2 = else_s;
                Some(new)
            }

            IrKind::For => {
                let range = self.arena[ir].expr1;
                let body = self.arena[ir].statements;
                let new = self.arena.copy(ir);
                let range_s = self.simplify(range, EvalContext::Any);
                let body_s = self.simplify(body, EvalContext::Any);
                self.arena[new].expr1 = range_s;
                self.arena[new].statements = body_s;
                Some(new)
            }

            IrKind::Range => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let l = self.simplify(e1, EvalContext::Any);
                let r = self.simplify(e2, EvalContext::Any);
                let pos = self.pos_of(ir);
                Some(self.arena.binop(IrKind::Range, l, r, &pos))
            }

            IrKind::FuncCall => {
                let name = self.arena[ir].name;
                let args = self.arena[ir].expr1;
                // Arguments always simplify at full width; a narrowing
                // context stops at the call boundary.
                let args_s = self.simplify(args, EvalContext::Any);
                let pos = self.pos_of(ir);

                let target = name
                    .filter(|&n| self.arena[n].kind == IrKind::Id)
                    .and_then(|n| self.arena[n].text.as_deref())
                    .and_then(BuiltinId::lookup);
                if let Some(builtin) = target {
                    let new = self.arena.alloc(IrKind::Builtin, &pos);
                    self.arena[new].builtin = Some(builtin);
                    self.arena[new].expr1 = args_s;
                    return Some(new);
                }

                let new = self.arena.alloc(IrKind::FuncCall, &pos);
                let name_s = name.map(|n| self.arena.copy(n));
                self.arena[new].name = name_s;
                self.arena[new].expr1 = args_s;
                Some(new)
            }

            IrKind::Builtin => {
                let args = self.arena[ir].expr1;
                let new = self.arena.copy(ir);
                let args_s = self.simplify(args, EvalContext::Any);
                self.arena[new].expr1 = args_s;
                Some(new)
            }

            IrKind::Incbin => {
                let e1 = self.arena[ir].expr1;
                let e2 = self.arena[ir].expr2;
                let e3 = self.arena[ir].expr3;
                let f = self.simplify(e1, EvalContext::Any);
                let off = self.simplify(e2, EvalContext::Any);
                let len = self.simplify(e3, EvalContext::Any);
                let pos = self.pos_of(ir);
                Some(self.arena.triop(IrKind::Incbin, f, off, len, &pos))
            }

            IrKind::CvtPropNodeName => {
                let e1 = self.arena[ir].expr1;
                let inner = self.simplify(e1, ctxt);
                if self.arena.kind(inner) == Some(IrKind::PropNodeName) {
                    return inner;
                }
                let pos = self.pos_of(ir);
                Some(self.arena.unop(IrKind::CvtPropNodeName, inner, &pos))
            }

            IrKind::CvtString => {
                let e1 = self.arena[ir].expr1;
                let inner = self.simplify(e1, ctxt);
                if self.arena.kind(inner) == Some(IrKind::LitStr) {
                    return inner;
                }
                let pos = self.pos_of(ir);
                Some(self.arena.unop(IrKind::CvtString, inner, &pos))
            }

            IrKind::List => {
                let elems = self.arena[ir].elems.clone();
                let pos = self.pos_of(ir);
                let new = self.arena.alloc(IrKind::List, &pos);
                for elem in elems {
                    if let Some(v) = self.simplify(Some(elem), ctxt) {
                        self.arena[new].elems.push(v);
                    }
                }
                Some(new)
            }

            IrKind::Root => {
                let decls = self.arena[ir].declarations;
                let stmts = self.arena[ir].statements;
                let new = self.arena.copy(ir);
                let decls_s = self.simplify(decls, EvalContext::Any);
                let stmts_s = self.simplify(stmts, EvalContext::Any);
                self.arena[new].declarations = decls_s;
                self.arena[new].statements = stmts_s;
                Some(new)
            }

            IrKind::Node => {
                let name = self.arena[ir].name;
                let stmts = self.arena[ir].statements;
                let new = self.arena.copy(ir);
                let name_s = self.simplify(name, EvalContext::Any);
                let stmts_s = self.simplify(stmts, EvalContext::Any);
                self.arena[new].name = name_s;
                self.arena[new].statements = stmts_s;
                Some(new)
            }

            IrKind::PropDef => {
                let name = self.arena[ir].name;
                let label = self.arena[ir].label;
                let value = self.arena[ir].expr1;
                let new = self.arena.copy(ir);
                let name_s = self.simplify(name, EvalContext::Any);
                let label_s = self.simplify(label, EvalContext::Any);
                let value_s = self.simplify(value, EvalContext::Any);
                self.arena[new].name = name_s;
                self.arena[new].label = label_s;
                self.arena[new].expr1 = value_s;
                Some(new)
            }

            IrKind::Assign | IrKind::ConstDef | IrKind::Return => {
                let value = self.arena[ir].expr1;
                let new = self.arena.copy(ir);
                let value_s = self.simplify(value, EvalContext::Any);
                self.arena[new].expr1 = value_s;
                Some(new)
            }

            IrKind::FuncDef => {
                let params = self.arena[ir].declarations;
                let body = self.arena[ir].statements;
                let new = self.arena.copy(ir);
                let params_s = self.simplify(params, EvalContext::Any);
                let body_s = self.simplify(body, EvalContext::Any);
                self.arena[new].declarations = params_s;
                self.arena[new].statements = body_s;
                Some(new)
            }

            IrKind::MemReserve => {
                let addr = self.arena[ir].expr1;
                let size = self.arena[ir].expr2;
                let new = self.arena.copy(ir);
                let addr_s = self.simplify(addr, EvalContext::Any);
                let size_s = self.simplify(size, EvalContext::Any);
                self.arena[new].expr1 = addr_s;
                self.arena[new].expr2 = size_s;
                Some(new)
            }
        }
    }

    fn lit_in_ctxt(&mut self, v: u64, ctxt: EvalContext, pos: &SrcPos) -> NodeId {
        match ctxt {
            EvalContext::Any => self.arena.lit_addr(v, pos),
            EvalContext::Cell => {
                let id = self.arena.alloc(IrKind::LitCell, pos);
                self.arena[id].literal = v;
                id
            }
        }
    }
}
