//! Deferred expression trees.
//!
//! Operators on handles and literals build an [`Expr`] instead of
//! computing immediately. Each node can do both jobs of the engine:
//! [`Expr::value`] folds the tree to a concrete [`Value`] against the
//! engine's shadow state, and [`Expr::expand`] renders the
//! target-language text with minimal parenthesization.
//!
//! Type checks happen eagerly at construction, so a mismatch surfaces
//! at the call site that built the node, in either mode. An integer
//! literal mixed into a real expression is widened on the spot;
//! variables never widen implicitly.

use kscript_types::{floor_div, floor_mod, EngineError, EngineResult, PrimType, Value};

use crate::engine::{ArrVar, Engine, Var};

/// Unary operator nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Numeric negation, rendered `-x`.
    Neg,
    /// Bitwise complement, rendered `.not.x`.
    Not,
    /// `abs(x)`.
    Abs,
    /// `real_to_int(x)`.
    ToInt,
    /// `int_to_real(x)`.
    ToReal,
}

/// Binary operator nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    LogAnd,
    LogOr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Concat,
}

impl BinOp {
    /// Binding rank used for parenthesization; lower binds tighter.
    ///
    /// Bracket-rendered operators keep a rank so they never force
    /// parentheses around themselves when nested in infix parents.
    fn rank(self) -> u8 {
        match self {
            BinOp::Pow => 1,
            BinOp::Shl | BinOp::Shr => 2,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 3,
            BinOp::Add | BinOp::Sub | BinOp::Concat => 4,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 5,
            BinOp::Eq | BinOp::Ne => 6,
            BinOp::BitAnd | BinOp::LogAnd => 7,
            BinOp::BitOr | BinOp::LogOr => 8,
        }
    }

    fn infix_spelling(self) -> Option<&'static str> {
        match self {
            BinOp::Add => Some("+"),
            BinOp::Sub => Some("-"),
            BinOp::Mul => Some("*"),
            BinOp::Div => Some("/"),
            BinOp::Mod => Some("mod"),
            BinOp::BitAnd => Some(".and."),
            BinOp::BitOr => Some(".or."),
            BinOp::LogAnd => Some("and"),
            BinOp::LogOr => Some("or"),
            BinOp::Eq => Some("="),
            BinOp::Ne => Some("#"),
            BinOp::Lt => Some("<"),
            BinOp::Gt => Some(">"),
            BinOp::Le => Some("<="),
            BinOp::Ge => Some(">="),
            BinOp::Concat => Some("&"),
            BinOp::Pow | BinOp::Shl | BinOp::Shr => None,
        }
    }

    fn is_boolean(self) -> bool {
        matches!(
            self,
            BinOp::LogAnd
                | BinOp::LogOr
                | BinOp::Eq
                | BinOp::Ne
                | BinOp::Lt
                | BinOp::Gt
                | BinOp::Le
                | BinOp::Ge
        )
    }
}

/// A deferred expression over engine-declared entities.
#[derive(Debug, Clone)]
pub enum Expr {
    Lit(Value),
    Var(Var),
    Index { arr: ArrVar, idx: Box<Expr> },
    Unary { op: UnaryOp, arg: Box<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

impl From<Var> for Expr {
    fn from(v: Var) -> Self {
        Expr::Var(v)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::Lit(Value::Int(v))
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Lit(Value::Real(v))
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::Lit(Value::Str(v.to_string()))
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Lit(v)
    }
}

impl Expr {
    /// Primitive kind this node evaluates to.
    pub fn ty(&self) -> PrimType {
        match self {
            Expr::Lit(v) => v.ty(),
            Expr::Var(v) => v.ty,
            Expr::Index { arr, .. } => arr.ty,
            Expr::Unary { op, arg } => match op {
                UnaryOp::Neg | UnaryOp::Abs => arg.ty(),
                UnaryOp::Not | UnaryOp::ToInt => PrimType::Int,
                UnaryOp::ToReal => PrimType::Real,
            },
            Expr::Binary { op, lhs, .. } => {
                if op.is_boolean() {
                    PrimType::Int
                } else if *op == BinOp::Concat {
                    PrimType::Str
                } else {
                    lhs.ty()
                }
            }
        }
    }

    /// True for nodes usable as a condition.
    pub fn is_boolean(&self) -> bool {
        matches!(self, Expr::Binary { op, .. } if op.is_boolean())
    }

    fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn unary(op: UnaryOp, arg: Expr) -> Expr {
        Expr::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    /// Widen a bare integer literal paired with a real operand.
    fn widen_pair(lhs: Expr, rhs: Expr) -> (Expr, Expr) {
        match (&lhs, &rhs) {
            (Expr::Lit(Value::Int(v)), r) if r.ty() == PrimType::Real => {
                (Expr::Lit(Value::Real(*v as f64)), rhs)
            }
            (l, Expr::Lit(Value::Int(v))) if l.ty() == PrimType::Real => {
                let widened = Expr::Lit(Value::Real(*v as f64));
                (lhs, widened)
            }
            _ => (lhs, rhs),
        }
    }

    fn numeric_pair(op: &str, lhs: Expr, rhs: Expr) -> EngineResult<(Expr, Expr)> {
        let (lhs, rhs) = Expr::widen_pair(lhs, rhs);
        match (lhs.ty(), rhs.ty()) {
            (PrimType::Int, PrimType::Int) | (PrimType::Real, PrimType::Real) => Ok((lhs, rhs)),
            (l, r) => Err(EngineError::TypeMismatch(format!(
                "{op} needs matching numeric operands, got {l} and {r}"
            ))),
        }
    }

    fn int_pair(op: &str, lhs: Expr, rhs: Expr) -> EngineResult<(Expr, Expr)> {
        match (lhs.ty(), rhs.ty()) {
            (PrimType::Int, PrimType::Int) => Ok((lhs, rhs)),
            (l, r) => Err(EngineError::TypeMismatch(format!(
                "{op} needs int operands, got {l} and {r}"
            ))),
        }
    }

    pub fn add(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair("+", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Add, l, r))
    }

    pub fn sub(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair("-", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Sub, l, r))
    }

    pub fn mul(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair("*", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Mul, l, r))
    }

    pub fn div(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair("/", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Div, l, r))
    }

    /// Integer remainder, rendered with the `mod` keyword.
    pub fn modulo(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::int_pair("mod", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Mod, l, r))
    }

    /// Real exponentiation, rendered `pow(a, b)`.
    pub fn pow(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (lhs, rhs) = Expr::widen_pair(self, rhs.into());
        match (lhs.ty(), rhs.ty()) {
            (PrimType::Real, PrimType::Real) => Ok(Expr::binary(BinOp::Pow, lhs, rhs)),
            (l, r) => Err(EngineError::TypeMismatch(format!(
                "pow needs real operands, got {l} and {r}"
            ))),
        }
    }

    /// Left shift, rendered `sh_left(a, b)`.
    pub fn shl(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::int_pair("sh_left", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Shl, l, r))
    }

    /// Right shift, rendered `sh_right(a, b)`.
    pub fn shr(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::int_pair("sh_right", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Shr, l, r))
    }

    /// Bitwise and, rendered `.and.`.
    pub fn bit_and(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::int_pair(".and.", self, rhs.into())?;
        Ok(Expr::binary(BinOp::BitAnd, l, r))
    }

    /// Bitwise or, rendered `.or.`.
    pub fn bit_or(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::int_pair(".or.", self, rhs.into())?;
        Ok(Expr::binary(BinOp::BitOr, l, r))
    }

    /// Logical and over two conditions, rendered `and`.
    pub fn log_and(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let rhs = rhs.into();
        if !self.is_boolean() || !rhs.is_boolean() {
            return Err(EngineError::TypeMismatch(
                "logical and needs boolean operands".to_string(),
            ));
        }
        Ok(Expr::binary(BinOp::LogAnd, self, rhs))
    }

    /// Logical or over two conditions, rendered `or`.
    pub fn log_or(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let rhs = rhs.into();
        if !self.is_boolean() || !rhs.is_boolean() {
            return Err(EngineError::TypeMismatch(
                "logical or needs boolean operands".to_string(),
            ));
        }
        Ok(Expr::binary(BinOp::LogOr, self, rhs))
    }

    /// Equality test, rendered `=`.
    pub fn eq(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair("=", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Eq, l, r))
    }

    /// Inequality test, rendered `#`.
    pub fn ne(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair("#", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Ne, l, r))
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair("<", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Lt, l, r))
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair(">", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Gt, l, r))
    }

    pub fn le(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair("<=", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Le, l, r))
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let (l, r) = Expr::numeric_pair(">=", self, rhs.into())?;
        Ok(Expr::binary(BinOp::Ge, l, r))
    }

    /// String concatenation, rendered `&`. Never parenthesized.
    pub fn concat(self, rhs: impl Into<Expr>) -> EngineResult<Expr> {
        let rhs = rhs.into();
        match (self.ty(), rhs.ty()) {
            (PrimType::Str, PrimType::Str) => Ok(Expr::binary(BinOp::Concat, self, rhs)),
            (l, r) => Err(EngineError::TypeMismatch(format!(
                "& needs string operands, got {l} and {r}"
            ))),
        }
    }

    pub fn neg(self) -> EngineResult<Expr> {
        match self.ty() {
            PrimType::Int | PrimType::Real => Ok(Expr::unary(UnaryOp::Neg, self)),
            t => Err(EngineError::TypeMismatch(format!(
                "negation needs a numeric operand, got {t}"
            ))),
        }
    }

    /// Bitwise complement, rendered `.not.`.
    pub fn bit_not(self) -> EngineResult<Expr> {
        match self.ty() {
            PrimType::Int => Ok(Expr::unary(UnaryOp::Not, self)),
            t => Err(EngineError::TypeMismatch(format!(
                ".not. needs an int operand, got {t}"
            ))),
        }
    }

    pub fn abs(self) -> EngineResult<Expr> {
        match self.ty() {
            PrimType::Int | PrimType::Real => Ok(Expr::unary(UnaryOp::Abs, self)),
            t => Err(EngineError::TypeMismatch(format!(
                "abs needs a numeric operand, got {t}"
            ))),
        }
    }

    /// Truncating conversion, rendered `real_to_int(x)`.
    pub fn to_int(self) -> EngineResult<Expr> {
        match self.ty() {
            PrimType::Real => Ok(Expr::unary(UnaryOp::ToInt, self)),
            t => Err(EngineError::TypeMismatch(format!(
                "real_to_int needs a real operand, got {t}"
            ))),
        }
    }

    /// Widening conversion, rendered `int_to_real(x)`.
    pub fn to_real(self) -> EngineResult<Expr> {
        match self.ty() {
            PrimType::Int => Ok(Expr::unary(UnaryOp::ToReal, self)),
            t => Err(EngineError::TypeMismatch(format!(
                "int_to_real needs an int operand, got {t}"
            ))),
        }
    }

    /// Fold the tree to a concrete value against the engine's shadow
    /// state. Works identically in both modes.
    pub fn value(&self, e: &Engine) -> EngineResult<Value> {
        match self {
            Expr::Lit(v) => Ok(v.clone()),
            Expr::Var(v) => Ok(e.shadow(v.id)),
            Expr::Index { arr, idx } => {
                let i = expect_int(idx.value(e)?)?;
                e.shadow_elem(arr.id, i, arr.len)
            }
            Expr::Unary { op, arg } => {
                let v = arg.value(e)?;
                Ok(match (op, v) {
                    (UnaryOp::Neg, Value::Int(a)) => Value::Int(-a),
                    (UnaryOp::Neg, Value::Real(a)) => Value::Real(-a),
                    (UnaryOp::Not, Value::Int(a)) => Value::Int(!a),
                    (UnaryOp::Abs, Value::Int(a)) => Value::Int(a.abs()),
                    (UnaryOp::Abs, Value::Real(a)) => Value::Real(a.abs()),
                    (UnaryOp::ToInt, Value::Real(a)) => Value::Int(a.trunc() as i64),
                    (UnaryOp::ToReal, Value::Int(a)) => Value::Real(a as f64),
                    (op, v) => {
                        return Err(EngineError::TypeMismatch(format!(
                            "bad operand {v:?} for unary {op:?}"
                        )))
                    }
                })
            }
            Expr::Binary { op, lhs, rhs } => fold_binary(*op, lhs, rhs, e),
        }
    }

    /// Evaluate as a condition.
    pub fn truth(&self, e: &Engine) -> EngineResult<bool> {
        if !self.is_boolean() {
            return Err(EngineError::TypeMismatch(
                "condition must be a comparison or logical expression".to_string(),
            ));
        }
        Ok(self.value(e)? != Value::Int(0))
    }

    /// Render the node as target-language text.
    ///
    /// A child is wrapped in parentheses when its operator binds
    /// looser than the parent's; on equal rank only the right child
    /// is wrapped, preserving left-to-right evaluation.
    pub fn expand(&self, e: &Engine) -> String {
        match self {
            Expr::Lit(v) => v.literal(),
            Expr::Var(v) => e.render_name(v.id),
            Expr::Index { arr, idx } => {
                format!("{}[{}]", e.render_name(arr.id), idx.expand(e))
            }
            Expr::Unary { op, arg } => {
                let inner = arg.expand(e);
                match op {
                    UnaryOp::Neg => format!("-{inner}"),
                    UnaryOp::Not => format!(".not.{inner}"),
                    UnaryOp::Abs => format!("abs({inner})"),
                    UnaryOp::ToInt => format!("real_to_int({inner})"),
                    UnaryOp::ToReal => format!("int_to_real({inner})"),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let ls = lhs.expand(e);
                let rs = rhs.expand(e);
                match op {
                    BinOp::Pow => format!("pow({ls}, {rs})"),
                    BinOp::Shl => format!("sh_left({ls}, {rs})"),
                    BinOp::Shr => format!("sh_right({ls}, {rs})"),
                    BinOp::Concat => format!("{ls} & {rs}"),
                    _ => {
                        let spelling = op.infix_spelling().unwrap_or_default();
                        let ls = if op.rank() < node_rank(lhs) {
                            format!("({ls})")
                        } else {
                            ls
                        };
                        let rs = if op.rank() <= node_rank(rhs) {
                            format!("({rs})")
                        } else {
                            rs
                        };
                        format!("{ls} {spelling} {rs}")
                    }
                }
            }
        }
    }
}

/// Binding rank of a node seen as a child; atoms and bracket-rendered
/// forms never need wrapping.
fn node_rank(e: &Expr) -> u8 {
    match e {
        Expr::Binary { op, .. } => match op {
            BinOp::Pow | BinOp::Shl | BinOp::Shr | BinOp::Concat => 0,
            _ => op.rank(),
        },
        Expr::Unary { op, .. } => match op {
            UnaryOp::Neg | UnaryOp::Not => 2,
            _ => 0,
        },
        _ => 0,
    }
}

fn expect_int(v: Value) -> EngineResult<i64> {
    match v {
        Value::Int(i) => Ok(i),
        v => Err(EngineError::TypeMismatch(format!(
            "index must be an int, got {v:?}"
        ))),
    }
}

fn fold_binary(op: BinOp, lhs: &Expr, rhs: &Expr, e: &Engine) -> EngineResult<Value> {
    // Logical operators short-circuit like the oracle semantics ask.
    if op == BinOp::LogAnd {
        if !lhs.truth(e)? {
            return Ok(Value::Int(0));
        }
        return Ok(Value::Int(rhs.truth(e)? as i64));
    }
    if op == BinOp::LogOr {
        if lhs.truth(e)? {
            return Ok(Value::Int(1));
        }
        return Ok(Value::Int(rhs.truth(e)? as i64));
    }
    let l = lhs.value(e)?;
    let r = rhs.value(e)?;
    let out = match (op, l, r) {
        (BinOp::Add, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
        (BinOp::Add, Value::Real(a), Value::Real(b)) => Value::Real(a + b),
        (BinOp::Sub, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_sub(b)),
        (BinOp::Sub, Value::Real(a), Value::Real(b)) => Value::Real(a - b),
        (BinOp::Mul, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_mul(b)),
        (BinOp::Mul, Value::Real(a), Value::Real(b)) => Value::Real(a * b),
        (BinOp::Div, Value::Int(a), Value::Int(b)) => Value::Int(floor_div(a, b)),
        (BinOp::Div, Value::Real(a), Value::Real(b)) => {
            if b == 0.0 {
                Value::Real(0.0)
            } else {
                Value::Real(a / b)
            }
        }
        (BinOp::Mod, Value::Int(a), Value::Int(b)) => Value::Int(floor_mod(a, b)),
        (BinOp::Pow, Value::Real(a), Value::Real(b)) => Value::Real(a.powf(b)),
        (BinOp::Shl, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.checked_shl(b as u32).unwrap_or(0))
        }
        (BinOp::Shr, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.checked_shr(b as u32).unwrap_or(0))
        }
        (BinOp::BitAnd, Value::Int(a), Value::Int(b)) => Value::Int(a & b),
        (BinOp::BitOr, Value::Int(a), Value::Int(b)) => Value::Int(a | b),
        (BinOp::Concat, Value::Str(a), Value::Str(b)) => Value::Str(format!("{a}{b}")),
        (BinOp::Eq, a, b) => Value::Int(cmp_bool(numeric_cmp(a, b)? == std::cmp::Ordering::Equal)),
        (BinOp::Ne, a, b) => Value::Int(cmp_bool(numeric_cmp(a, b)? != std::cmp::Ordering::Equal)),
        (BinOp::Lt, a, b) => Value::Int(cmp_bool(numeric_cmp(a, b)? == std::cmp::Ordering::Less)),
        (BinOp::Gt, a, b) => {
            Value::Int(cmp_bool(numeric_cmp(a, b)? == std::cmp::Ordering::Greater))
        }
        (BinOp::Le, a, b) => Value::Int(cmp_bool(numeric_cmp(a, b)? != std::cmp::Ordering::Greater)),
        (BinOp::Ge, a, b) => Value::Int(cmp_bool(numeric_cmp(a, b)? != std::cmp::Ordering::Less)),
        (op, l, r) => {
            return Err(EngineError::TypeMismatch(format!(
                "bad operands {l:?}, {r:?} for {op:?}"
            )))
        }
    };
    Ok(out)
}

fn cmp_bool(b: bool) -> i64 {
    b as i64
}

fn numeric_cmp(a: Value, b: Value) -> EngineResult<std::cmp::Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(&b)),
        (Value::Real(a), Value::Real(b)) => {
            Ok(a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal))
        }
        (a, b) => Err(EngineError::TypeMismatch(format!(
            "comparison needs matching numeric operands, got {a:?} and {b:?}"
        ))),
    }
}
