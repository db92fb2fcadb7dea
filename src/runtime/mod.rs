//! Evaluation runtime: scope stack, builtins, and the session driver
//! with its simplify, eval, and emit passes.

pub mod builtins;
pub mod emit;
pub mod eval;
pub mod scope;
pub mod session;
pub mod simplify;

pub use builtins::BuiltinId;
pub use scope::{ScopeMask, ScopeStack, SymbolKind, SymbolRef};
pub use session::{Session, SessionConfig};
pub use simplify::EvalContext;
