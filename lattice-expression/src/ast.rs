//! Abstract syntax tree for the expression language.

use std::fmt;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal scalar value.
    Literal(Literal),
    /// A bare identifier, e.g. a declared resource id or a
    /// comprehension-bound variable.
    Ident(String),
    /// Member access: `object.field`.
    Member {
        /// Expression being accessed.
        object: Box<Expr>,
        /// Field name.
        field: String,
    },
    /// Index access: `object[index]`.
    Index {
        /// Expression being indexed.
        object: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// A function invocation, either global (`f(x)`) or as a method on a
    /// receiver (`x.f(y)`).
    Call {
        /// Receiver for method-style calls, `None` for global calls.
        target: Option<Box<Expr>>,
        /// Function name.
        function: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// A comprehension macro, e.g. `items.filter(i, i.enabled)`.
    Comprehension {
        /// Collection being iterated.
        target: Box<Expr>,
        /// Which macro.
        op: ComprehensionOp,
        /// Name bound to each element within `body`.
        var: String,
        /// Per-element expression.
        body: Box<Expr>,
    },
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left-hand side.
        lhs: Box<Expr>,
        /// Right-hand side.
        rhs: Box<Expr>,
    },
    /// The conditional operator `cond ? then : otherwise`.
    Ternary {
        /// Condition, must evaluate to a boolean.
        cond: Box<Expr>,
        /// Value when true.
        then: Box<Expr>,
        /// Value when false.
        otherwise: Box<Expr>,
    },
    /// A list literal.
    List(Vec<Expr>),
    /// A map literal with expression keys.
    Map(Vec<(Expr, Expr)>),
}

/// Literal scalar values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Signed 64-bit integer.
    Int(i64),
    /// Unsigned 64-bit integer (`u`-suffixed source form).
    UInt(u64),
    /// 64-bit float.
    Double(f64),
    /// String.
    String(String),
    /// Boolean.
    Bool(bool),
    /// Null.
    Null,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation `!`.
    Not,
    /// Arithmetic negation `-`.
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `in`
    In,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::In => "in",
        };
        write!(f, "{s}")
    }
}

/// Comprehension macros bound to an iteration variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionOp {
    /// Keep elements for which the body is true.
    Filter,
    /// Transform each element.
    Map,
    /// True when the body is true for every element.
    All,
    /// True when the body is true for at least one element.
    Exists,
    /// True when the body is true for exactly one element.
    ExistsOne,
}

impl ComprehensionOp {
    /// The macro's source-level name.
    pub fn name(&self) -> &'static str {
        match self {
            ComprehensionOp::Filter => "filter",
            ComprehensionOp::Map => "map",
            ComprehensionOp::All => "all",
            ComprehensionOp::Exists => "exists",
            ComprehensionOp::ExistsOne => "exists_one",
        }
    }

    /// Resolve a macro from its source-level name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "filter" => Some(ComprehensionOp::Filter),
            "map" => Some(ComprehensionOp::Map),
            "all" => Some(ComprehensionOp::All),
            "exists" => Some(ComprehensionOp::Exists),
            "exists_one" => Some(ComprehensionOp::ExistsOne),
            _ => None,
        }
    }
}
