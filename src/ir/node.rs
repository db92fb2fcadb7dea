//! IR node model.
//!
//! Nodes live in an arena and refer to each other by index, so a
//! shallow copy can share its children with the original without any
//! aliasing hazard, and the whole tree is released in one move when the
//! session is dropped. List nodes own their element sequence directly
//! instead of threading an intrusive linked list through the elements.

use std::ops::{Index, IndexMut};

use crate::runtime::builtins::BuiltinId;
use crate::srcpos::SrcPos;

/// Kind tag for an IR node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrKind {
    /// Compilation-unit root: declarations plus one top-level node
    Root,
    /// Reserved-memory declaration (address, size)
    MemReserve,
    /// Variable assignment statement
    Assign,
    /// Property definition statement
    PropDef,
    /// Cross-reference by handle
    RefPhandle,
    /// Cross-reference by path
    RefPath,
    /// 32-bit cell wrapper around an expression
    Cell,
    /// Unresolved integer constant (source text)
    Literal,
    /// String literal
    LitStr,
    /// Single-byte literal
    LitByte,
    /// Label attached to a value position
    Label,
    /// Ordered list of nodes
    List,
    /// Include-binary-file form (file, offset, length)
    Incbin,
    /// Resolved builtin-function dispatch
    Builtin,
    /// Ternary select (`cond ? a : b`)
    Select,
    /// Logical or (short-circuit)
    Or,
    /// Logical and (short-circuit)
    And,
    /// Bitwise or
    BitOr,
    /// Bitwise xor
    BitXor,
    /// Bitwise and
    BitAnd,
    /// Equality comparison
    Eq,
    /// Less-than comparison
    Lt,
    /// Less-or-equal comparison
    Le,
    /// Greater-than comparison
    Gt,
    /// Greater-or-equal comparison
    Ge,
    /// Inequality comparison
    Ne,
    /// Left shift
    Lshift,
    /// Right shift
    Rshift,
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Modulo (overloaded: string concatenation when an operand is a string)
    Mod,
    /// Unary minus
    Neg,
    /// Bitwise complement
    BitNot,
    /// Logical not
    Not,
    /// Function definition declaration
    FuncDef,
    /// For-loop statement
    For,
    /// Return statement
    Return,
    /// Inclusive range (start, stop)
    Range,
    /// Identifier reference
    Id,
    /// If statement
    If,
    /// Formal-parameter declaration
    ParamDecl,
    /// Function-call expression or statement
    FuncCall,
    /// Device node definition
    Node,
    /// Property or node name
    PropNodeName,
    /// Resolved 32-bit cell integer
    LitCell,
    /// Resolved address-width (64-bit) integer
    LitAddr,
    /// Convert an expression to a property/node name
    CvtPropNodeName,
    /// Convert an expression to a string
    CvtString,
    /// Constant definition declaration
    ConstDef,
}

impl IrKind {
    /// Stable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            IrKind::Root => "root",
            IrKind::MemReserve => "mem-reserve",
            IrKind::Assign => "assign",
            IrKind::PropDef => "prop-def",
            IrKind::RefPhandle => "ref-phandle",
            IrKind::RefPath => "ref-path",
            IrKind::Cell => "cell",
            IrKind::Literal => "literal",
            IrKind::LitStr => "lit-str",
            IrKind::LitByte => "lit-byte",
            IrKind::Label => "label",
            IrKind::List => "list",
            IrKind::Incbin => "incbin",
            IrKind::Builtin => "builtin",
            IrKind::Select => "select",
            IrKind::Or => "or",
            IrKind::And => "and",
            IrKind::BitOr => "bit-or",
            IrKind::BitXor => "bit-xor",
            IrKind::BitAnd => "bit-and",
            IrKind::Eq => "eq",
            IrKind::Lt => "lt",
            IrKind::Le => "le",
            IrKind::Gt => "gt",
            IrKind::Ge => "ge",
            IrKind::Ne => "ne",
            IrKind::Lshift => "lshift",
            IrKind::Rshift => "rshift",
            IrKind::Add => "add",
            IrKind::Sub => "sub",
            IrKind::Mul => "mul",
            IrKind::Div => "div",
            IrKind::Mod => "mod",
            IrKind::Neg => "neg",
            IrKind::BitNot => "bit-not",
            IrKind::Not => "not",
            IrKind::FuncDef => "func-def",
            IrKind::For => "for",
            IrKind::Return => "return",
            IrKind::Range => "range",
            IrKind::Id => "id",
            IrKind::If => "if",
            IrKind::ParamDecl => "param-decl",
            IrKind::FuncCall => "func-call",
            IrKind::Node => "node",
            IrKind::PropNodeName => "prop-node-name",
            IrKind::LitCell => "lit-cell",
            IrKind::LitAddr => "lit-addr",
            IrKind::CvtPropNodeName => "cvt-prop-node-name",
            IrKind::CvtString => "cvt-string",
            IrKind::ConstDef => "const-def",
        }
    }

    /// True for the kinds that carry a resolved (or resolvable) number.
    pub fn is_constant(self) -> bool {
        matches!(
            self,
            IrKind::Literal | IrKind::LitByte | IrKind::LitCell | IrKind::LitAddr
        )
    }
}

/// Index of a node in its [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Raw index, for debug output.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One IR node.
///
/// Unused slots stay `None`/empty; which slots are meaningful depends
/// on the kind. A node with no children is a leaf only if its kind is a
/// literal, identifier, or label kind.
#[derive(Debug, Clone)]
pub struct Node {
    /// Kind tag
    pub kind: IrKind,
    /// Source position for diagnostics
    pub pos: SrcPos,
    /// Integer payload (resolved literals, byte values)
    pub literal: u64,
    /// Text payload (literal text, strings, identifier and param names)
    pub text: Option<String>,
    /// Label text payload (labels and cross-references)
    pub label_name: Option<String>,
    /// Resolved builtin id (`Builtin` kind only)
    pub builtin: Option<BuiltinId>,
    /// Name child (node and function definitions)
    pub name: Option<NodeId>,
    /// Label child (nodes, properties, reservations, phandle refs)
    pub label: Option<NodeId>,
    /// First expression child
    pub expr1: Option<NodeId>,
    /// Second expression child
    pub expr2: Option<NodeId>,
    /// Third expression child
    pub expr3: Option<NodeId>,
    /// Statement list (then-branch for `If`)
    pub statements: Option<NodeId>,
    /// Second statement list (else-branch for `If`)
    pub statements2: Option<NodeId>,
    /// Declarations list (root and function definitions)
    pub declarations: Option<NodeId>,
    /// Owned element sequence (`List` kind only)
    pub elems: Vec<NodeId>,
}

impl Node {
    fn new(kind: IrKind, pos: SrcPos) -> Self {
        Node {
            kind,
            pos,
            literal: 0,
            text: None,
            label_name: None,
            builtin: None,
            name: None,
            label: None,
            expr1: None,
            expr2: None,
            expr3: None,
            statements: None,
            statements2: None,
            declarations: None,
            elems: Vec::new(),
        }
    }
}

/// Arena holding every IR node of a compilation session.
///
/// Allocation never invalidates existing ids; the whole arena is
/// released at once when the session ends.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Arena::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no node was allocated yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocates a node of the given kind with an empty payload.
    pub fn alloc(&mut self, kind: IrKind, pos: &SrcPos) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind, pos.clone()));
        id
    }

    /// Shallow copy: duplicates the scalar and text payloads, shares
    /// all children with the source.
    pub fn copy(&mut self, src: NodeId) -> NodeId {
        let node = self[src].clone();
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Allocates a unary operator node.
    pub fn unop(&mut self, kind: IrKind, e1: Option<NodeId>, pos: &SrcPos) -> NodeId {
        let id = self.alloc(kind, pos);
        self[id].expr1 = e1;
        id
    }

    /// Allocates a binary operator node.
    pub fn binop(
        &mut self,
        kind: IrKind,
        e1: Option<NodeId>,
        e2: Option<NodeId>,
        pos: &SrcPos,
    ) -> NodeId {
        let id = self.alloc(kind, pos);
        self[id].expr1 = e1;
        self[id].expr2 = e2;
        id
    }

    /// Allocates a ternary operator node.
    pub fn triop(
        &mut self,
        kind: IrKind,
        e1: Option<NodeId>,
        e2: Option<NodeId>,
        e3: Option<NodeId>,
        pos: &SrcPos,
    ) -> NodeId {
        let id = self.alloc(kind, pos);
        self[id].expr1 = e1;
        self[id].expr2 = e2;
        self[id].expr3 = e3;
        id
    }

    /// Appends a node to a list, creating the list on demand.
    ///
    /// Appending `None` is a no-op that returns the list unchanged;
    /// appending to `None` allocates a fresh list first.
    pub fn list_append(
        &mut self,
        list: Option<NodeId>,
        node: Option<NodeId>,
    ) -> Option<NodeId> {
        let node = match node {
            Some(node) => node,
            None => return list,
        };

        let list = match list {
            Some(list) => list,
            None => {
                let pos = self[node].pos.clone();
                self.alloc(IrKind::List, &pos)
            }
        };

        self[list].elems.push(node);
        Some(list)
    }

    /// Allocates a resolved address-width integer literal.
    pub fn lit_addr(&mut self, value: u64, pos: &SrcPos) -> NodeId {
        let id = self.alloc(IrKind::LitAddr, pos);
        self[id].literal = value;
        id
    }

    /// Allocates a resolved 32-bit cell literal.
    pub fn lit_cell(&mut self, value: u32, pos: &SrcPos) -> NodeId {
        let id = self.alloc(IrKind::LitCell, pos);
        self[id].literal = u64::from(value);
        id
    }

    /// Allocates a string literal.
    pub fn lit_str(&mut self, text: impl Into<String>, pos: &SrcPos) -> NodeId {
        let id = self.alloc(IrKind::LitStr, pos);
        self[id].text = Some(text.into());
        id
    }

    /// Allocates a single-byte literal.
    pub fn lit_byte(&mut self, value: u8, pos: &SrcPos) -> NodeId {
        let id = self.alloc(IrKind::LitByte, pos);
        self[id].literal = u64::from(value);
        id
    }

    /// Allocates an unresolved integer literal from source text.
    pub fn literal(&mut self, text: impl Into<String>, pos: &SrcPos) -> NodeId {
        let id = self.alloc(IrKind::Literal, pos);
        self[id].text = Some(text.into());
        id
    }

    /// Allocates an identifier reference.
    pub fn id(&mut self, name: impl Into<String>, pos: &SrcPos) -> NodeId {
        let id = self.alloc(IrKind::Id, pos);
        self[id].text = Some(name.into());
        id
    }

    /// Allocates a property/node name.
    pub fn prop_node_name(&mut self, name: impl Into<String>, pos: &SrcPos) -> NodeId {
        let id = self.alloc(IrKind::PropNodeName, pos);
        self[id].text = Some(name.into());
        id
    }

    /// Kind of a node, with `None` treated as no kind at all.
    pub fn kind(&self, id: Option<NodeId>) -> Option<IrKind> {
        id.map(|id| self[id].kind)
    }

    /// True if the node is a constant-number kind.
    pub fn is_constant(&self, id: Option<NodeId>) -> bool {
        self.kind(id).is_some_and(IrKind::is_constant)
    }

    /// True if the node is a string literal.
    pub fn is_string(&self, id: Option<NodeId>) -> bool {
        self.kind(id) == Some(IrKind::LitStr)
    }
}

impl Index<NodeId> for Arena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_zeroed_payload() {
        let mut arena = Arena::new();
        let id = arena.alloc(IrKind::Add, &SrcPos::none());

        assert_eq!(arena[id].kind, IrKind::Add);
        assert_eq!(arena[id].literal, 0);
        assert!(arena[id].text.is_none());
        assert!(arena[id].expr1.is_none());
    }

    #[test]
    fn test_shallow_copy_shares_children() {
        let mut arena = Arena::new();
        let child = arena.lit_addr(7, &SrcPos::none());
        let op = arena.unop(IrKind::Neg, Some(child), &SrcPos::none());

        let copied = arena.copy(op);
        assert_eq!(arena[copied].expr1, Some(child));
        assert_ne!(copied, op);
    }

    #[test]
    fn test_shallow_copy_duplicates_text() {
        let mut arena = Arena::new();
        let s = arena.lit_str("hello", &SrcPos::none());
        let copied = arena.copy(s);

        arena[copied].text = Some("changed".to_string());
        assert_eq!(arena[s].text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_list_append_creates_list_on_demand() {
        let mut arena = Arena::new();
        let a = arena.lit_addr(1, &SrcPos::none());
        let b = arena.lit_addr(2, &SrcPos::none());

        let list = arena.list_append(None, Some(a));
        let list = arena.list_append(list, Some(b));

        let list = list.unwrap();
        assert_eq!(arena[list].kind, IrKind::List);
        assert_eq!(arena[list].elems, vec![a, b]);
    }

    #[test]
    fn test_list_append_null_node_is_noop() {
        let mut arena = Arena::new();
        let a = arena.lit_addr(1, &SrcPos::none());
        let list = arena.list_append(None, Some(a));

        let same = arena.list_append(list, None);
        assert_eq!(same, list);
        assert_eq!(arena[list.unwrap()].elems.len(), 1);

        assert_eq!(arena.list_append(None, None), None);
    }

    #[test]
    fn test_constant_and_string_queries() {
        let mut arena = Arena::new();
        let n = arena.lit_addr(1, &SrcPos::none());
        let c = arena.lit_cell(2, &SrcPos::none());
        let b = arena.lit_byte(3, &SrcPos::none());
        let t = arena.literal("4", &SrcPos::none());
        let s = arena.lit_str("x", &SrcPos::none());

        for id in [n, c, b, t] {
            assert!(arena.is_constant(Some(id)));
        }
        assert!(!arena.is_constant(Some(s)));
        assert!(!arena.is_constant(None));
        assert!(arena.is_string(Some(s)));
        assert!(!arena.is_string(Some(n)));
    }
}
