use serde_json::Value;

/// Comparison and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// One step of a navigation chain.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Property access, `name`.
    Field(String),
    /// Wildcard over all values, `*`.
    Wildcard,
    /// Predicate or index filter, `[expr]`.
    Filter(Box<Expr>),
}

/// A parsed expression node. Every node carries its byte offset in the
/// source, which the debugger reports as the frame position.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub position: usize,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// A literal value.
    Literal(Value),
    /// `$` — the current evaluation context.
    Context,
    /// `$name` — a bound variable (`$root` is the evaluation root).
    Variable(String),
    /// A navigation chain starting from a head expression.
    Path { head: Box<Expr>, steps: Vec<Step> },
    /// A bare navigation chain starting from the current context.
    Relative(Vec<Step>),
    /// Binary operation.
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

impl Expr {
    pub fn new(position: usize, kind: ExprKind) -> Self {
        Self { position, kind }
    }
}
