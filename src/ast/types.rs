//! AST node definitions.
//!
//! Nodes are immutable once built; evaluation only ever changes
//! environment bindings. Function bodies sit behind `Rc` so closures can
//! share them without copying the tree.

use std::rc::Rc;

/// How a string literal was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `"..."`: runs through parameter expansion
    Double,
    /// `'...'`: verbatim
    Single,
    /// `` `...` ``: verbatim
    Backtick,
    /// unquoted path or flag word (`/tmp`, `-la`): verbatim
    Bare,
}

impl QuoteStyle {
    pub fn interpolates(&self) -> bool {
        matches!(self, QuoteStyle::Double)
    }
}

/// Every node the parser can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // =========================================================================
    // Value nodes
    // =========================================================================
    Number(f64),
    Str { value: String, quote: QuoteStyle },
    Boolean(bool),
    /// Explicit null: missing call arguments, postfix operands, `unset` values.
    Null,
    Variable(VariableNode),
    ArrayLiteral(Vec<Expr>),
    BraceExpansion(String),
    ParamExpansion(String),

    // =========================================================================
    // Composite nodes
    // =========================================================================
    Binary(BinaryNode),
    Unary(UnaryNode),
    Assign(AssignNode),
    Function(FunctionNode),
    Call(CallNode),
    If(IfNode),
    Program(Program),
    For(ForNode),
    ForIn(ForInNode),
    While(WhileNode),
}

impl Expr {
    /// The node-kind discriminant, used in diagnostics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Number(_) => "number",
            Expr::Str { .. } => "string",
            Expr::Boolean(_) => "boolean",
            Expr::Null => "null",
            Expr::Variable(_) => "variable",
            Expr::ArrayLiteral(_) => "array",
            Expr::BraceExpansion(_) => "brace-expansion",
            Expr::ParamExpansion(_) => "param-expansion",
            Expr::Binary(_) => "binary",
            Expr::Unary(_) => "unary",
            Expr::Assign(_) => "assign",
            Expr::Function(_) => "function",
            Expr::Call(_) => "call",
            Expr::If(_) => "if",
            Expr::Program(_) => "program",
            Expr::For(_) => "for",
            Expr::ForIn(_) => "for-in",
            Expr::While(_) => "while",
        }
    }

    pub fn string(value: impl Into<String>, quote: QuoteStyle) -> Self {
        Expr::Str {
            value: value.into(),
            quote,
        }
    }

    pub fn variable(name: impl Into<String>, deref: bool) -> Self {
        Expr::Variable(VariableNode {
            name: name.into(),
            deref,
            index: None,
        })
    }

    /// A bare word with no index, e.g. `echo` or `x` in `x = 1`.
    pub fn as_bare_word(&self) -> Option<&str> {
        match self {
            Expr::Variable(VariableNode {
                name,
                deref: false,
                index: None,
            }) => Some(name),
            _ => None,
        }
    }
}

/// `$name`, `name`, `$name[index]`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub name: String,
    /// Written with a leading `$`
    pub deref: bool,
    pub index: Option<Box<Expr>>,
}

/// `left op right`; postfix `++`/`--` carry `Expr::Null` on the right.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryNode {
    pub operator: String,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

/// Prefix `!x`, `~x`, `-x`
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryNode {
    pub operator: String,
    pub operand: Box<Expr>,
}

/// `target = value`
#[derive(Debug, Clone, PartialEq)]
pub struct AssignNode {
    pub target: Box<Expr>,
    pub value: Box<Expr>,
}

/// `function name(a, b = 1) body`; anonymous when `name` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    pub name: Option<String>,
    /// Each parameter is a bare `Variable` or an `Assign` carrying a default.
    pub params: Vec<Expr>,
    pub body: Rc<Expr>,
}

/// `callee arg arg ...` or `callee(arg, arg)`
#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
}

impl CallNode {
    /// Name used to resolve the callee and to report undefined functions.
    pub fn callee_name(&self) -> String {
        match self.callee.as_ref() {
            Expr::Variable(v) => v.name.clone(),
            other => other.kind().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub condition: Box<Expr>,
    pub then_branch: Box<Expr>,
    pub else_branch: Option<Box<Expr>>,
}

/// An ordered statement list: the whole input, or a `{ ... }` / `do ... done` block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Expr>,
}

/// `for (init; condition; step) body`
#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub init: Vec<Expr>,
    pub condition: Vec<Expr>,
    pub step: Vec<Expr>,
    pub body: Box<Expr>,
}

/// `for name in range do ... done`
#[derive(Debug, Clone, PartialEq)]
pub struct ForInNode {
    pub variable: String,
    pub range: Box<Expr>,
    pub body: Box<Expr>,
}

/// `while cond... do ... done`, also `for cond... do ... done`
#[derive(Debug, Clone, PartialEq)]
pub struct WhileNode {
    pub condition: Vec<Expr>,
    pub body: Box<Expr>,
}
