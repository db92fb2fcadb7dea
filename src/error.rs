//! Error types for the dtforge evaluation core.

use thiserror::Error;

/// Errors detected while simplifying, evaluating, or emitting the IR.
///
/// The evaluation core reports each error once through the diagnostic
/// stream and then continues with sibling work, so most of these never
/// travel up a call chain as `Err` values; they are formatted into
/// diagnostics at the point of detection. `Result` is used at the API
/// boundaries: literal parsing, blob access, and [`Session::process`].
///
/// [`Session::process`]: crate::Session::process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Type errors
    /// Operation expected one value kind but got another.
    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        /// Expected value kind
        expected: String,
        /// Actual value kind
        got: String,
    },

    /// A value could not be converted to a string.
    #[error("can't convert {kind} to a string")]
    NotAString {
        /// Kind of the offending value
        kind: &'static str,
    },

    /// A value could not be flattened into property data.
    #[error("can't convert {kind} to property data")]
    NotData {
        /// Kind of the offending value
        kind: &'static str,
    },

    /// A cell wrapper was applied to something with no cell value.
    #[error("can't determine cell value")]
    NoCellValue,

    /// An expression position needed a constant and did not get one.
    #[error("expected a constant expression")]
    ExpectedConstant,

    // Arity errors
    /// Function call supplied fewer actuals than the definition declares.
    #[error("not enough parameters to {name} (defined at {defined_at})")]
    NotEnoughParameters {
        /// Function name
        name: String,
        /// Position of the function definition
        defined_at: String,
    },

    /// Function call supplied more actuals than the definition declares.
    #[error("too many parameters to {name} (defined at {defined_at})")]
    TooManyParameters {
        /// Function name
        name: String,
        /// Position of the function definition
        defined_at: String,
    },

    // Literal-parse errors
    /// Numeric literal contains characters outside its base.
    #[error("bad characters in literal \"{literal}\"")]
    BadCharsInLiteral {
        /// Literal source text
        literal: String,
    },

    /// Numeric literal does not fit the width the context demands.
    #[error("literal \"{literal}\" out of range for {bits}-bit value")]
    LiteralOutOfRange {
        /// Literal source text
        literal: String,
        /// Width the context demanded
        bits: u32,
    },

    /// Numeric literal failed to parse for some other reason.
    #[error("bad literal \"{literal}\"")]
    BadLiteral {
        /// Literal source text
        literal: String,
    },

    // Lookup errors
    /// Identifier has no binding in any visible scope.
    #[error("unknown value for \"{name}\"")]
    UnknownIdentifier {
        /// Identifier text
        name: String,
    },

    /// Call target is not bound to a function definition.
    #[error("\"{name}\" isn't a function definition")]
    NotAFunction {
        /// Call target name
        name: String,
    },

    /// Callee expression did not reduce to a usable name.
    #[error("can't determine function name")]
    NoFunctionName,

    /// Assignment or declaration whose left side has no usable name.
    #[error("can't determine name of {what}")]
    NoName {
        /// What was being named (variable, constant, node)
        what: &'static str,
    },

    /// Duplicate definition of a root declaration or constant.
    #[error("redefinition of \"{name}\" ignored")]
    Redefinition {
        /// Redefined name
        name: String,
    },

    /// Assignment targets a constant.
    #[error("can't assign to constant \"{name}\"")]
    AssignToConstant {
        /// Constant name
        name: String,
    },

    // Domain errors
    /// Division or modulo by a constant zero.
    #[error("division by zero")]
    DivisionByZero,

    // Structural errors
    /// A statement kind reached the expression reducer.
    #[error("can't evaluate {kind} statements in expressions")]
    StatementInExpression {
        /// Offending node kind
        kind: &'static str,
    },

    /// A node kind invalid in statement position.
    #[error("unknown statement with kind {kind}")]
    NotAStatement {
        /// Offending node kind
        kind: &'static str,
    },

    /// A node kind invalid in declaration position.
    #[error("unknown declaration kind {kind}")]
    NotADeclaration {
        /// Offending node kind
        kind: &'static str,
    },

    /// `return` executed with no enclosing function call.
    #[error("return outside of a function call")]
    ReturnOutsideFunction,

    /// A side effect had no enclosing scope able to receive it.
    #[error("no enclosing {scope} to receive {emitted}")]
    NoEnclosingScope {
        /// Scope kind that was required
        scope: &'static str,
        /// What was being emitted
        emitted: &'static str,
    },

    /// A builtin received an argument kind it cannot format.
    #[error("can't handle {kind} in {builtin}()")]
    BadBuiltinArgument {
        /// Builtin name
        builtin: &'static str,
        /// Offending argument kind
        kind: &'static str,
    },

    // Resource errors
    /// Expression nesting exceeded the configured recursion limit.
    #[error("expression nesting too deep (limit {limit})")]
    TooDeep {
        /// Configured depth limit
        limit: usize,
    },

    /// Include-binary file could not be read.
    #[error("couldn't read \"{path}\": {reason}")]
    BlobRead {
        /// Requested path
        path: String,
        /// Underlying I/O failure
        reason: String,
    },

    // Boundary
    /// Reported by [`Session::process`] when the run produced errors.
    ///
    /// [`Session::process`]: crate::Session::process
    #[error("compilation failed with {errors} error(s)")]
    CompileFailed {
        /// Number of error-severity diagnostics emitted
        errors: usize,
    },

    /// Reported when emission finished without building a boot descriptor.
    #[error("no boot descriptor was produced")]
    NoBootDescriptor,
}

/// Result type for dtforge operations.
pub type Result<T> = std::result::Result<T, Error>;
