//! The compilation engine.
//!
//! One [`Engine`] owns everything a single compilation touches: the
//! output sink, the name registry, the declared entities with their
//! shadow values, and the bookkeeping stacks of the structured
//! constructs. The evaluation [`Mode`] is fixed at construction and
//! threaded through every operation, so interpreted and generating
//! engines can coexist in one process.
//!
//! Shadow values are kept current in both modes. That is what lets a
//! generating engine iterate loops concretely and fold conditions
//! while it emits text.

use kscript_types::{EngineError, EngineResult, Mode, PrimType, Signal, Value};

use crate::expr::Expr;
use crate::func::FunctionDef;
use crate::loops::{LoopKind, LoopPool};
use crate::names::{NameRegistry, RegisteredName};
use crate::sink::Sink;

/// Construction options for an [`Engine`].
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub mode: Mode,
    /// Compact declared names to 5-character digest forms.
    pub compact_names: bool,
}

impl EngineOptions {
    pub fn new(mode: Mode) -> Self {
        EngineOptions {
            mode,
            compact_names: false,
        }
    }
}

/// Handle to a declared scalar. Cheap to copy; resolves against the
/// engine that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Var {
    pub(crate) id: usize,
    pub(crate) ty: PrimType,
}

impl Var {
    pub fn ty(self) -> PrimType {
        self.ty
    }

    /// The variable as an expression node.
    pub fn ex(self) -> Expr {
        Expr::Var(self)
    }
}

/// Handle to a declared array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrVar {
    pub(crate) id: usize,
    pub(crate) ty: PrimType,
    pub(crate) len: usize,
}

impl ArrVar {
    pub fn ty(self) -> PrimType {
        self.ty
    }

    pub fn len(self) -> usize {
        self.len
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

enum SlotData {
    Scalar { cur: Value, init: Value },
    Array { cur: Vec<Value>, init: Vec<Value> },
}

struct VarSlot {
    reg: RegisteredName,
    ty: PrimType,
    data: SlotData,
}

/// A named block of captured lines (callback or function body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlock {
    pub name: String,
    pub lines: Vec<String>,
}

pub struct Engine {
    options: EngineOptions,
    pub(crate) sink: Sink,
    names: NameRegistry,
    vars: Vec<VarSlot>,
    /// Branch outcome chains of open or just-closed conditionals.
    pub(crate) chains: Vec<Vec<bool>>,
    /// Subjects of open selects, innermost last.
    pub(crate) subjects: Vec<Expr>,
    /// Set while a case body runs; guards against nested cases.
    pub(crate) in_case: bool,
    pub(crate) loop_kinds: Vec<LoopKind>,
    pub(crate) pool: LoopPool,
    pub(crate) callbacks: Vec<NamedBlock>,
    pub(crate) functions: Vec<FunctionDef>,
}

impl Engine {
    pub fn new(mode: Mode) -> Self {
        Engine::with_options(EngineOptions::new(mode))
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Engine {
            options,
            sink: Sink::new(),
            names: NameRegistry::new(options.compact_names),
            vars: Vec::new(),
            chains: Vec::new(),
            subjects: Vec::new(),
            in_case: false,
            loop_kinds: Vec::new(),
            pool: LoopPool::default(),
            callbacks: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.options.mode
    }

    pub fn is_generate(&self) -> bool {
        self.options.mode.is_generate()
    }

    /// Skip the rest of the enclosing conditional or case body.
    pub fn skip_block(&self) -> EngineError {
        EngineError::Signal(Signal::SkipBlock)
    }

    // ---- statement plumbing -------------------------------------------

    /// Gate every statement through the sink's armed state: a pending
    /// error fires first, then a one-shot hook. Runs in both modes so
    /// sequencing defects surface identically.
    pub(crate) fn stmt_gate(&mut self) -> EngineResult<()> {
        if let Some(err) = self.sink.take_error() {
            return Err(err);
        }
        if let Some(mut hook) = self.sink.take_hook() {
            hook(self)?;
        }
        Ok(())
    }

    /// Gate, then append a line of target text.
    pub fn put(&mut self, line: impl Into<String>) -> EngineResult<()> {
        self.stmt_gate()?;
        self.sink.push_line(line);
        Ok(())
    }

    /// Append without gating; used by constructs that already gated.
    pub(crate) fn put_raw(&mut self, line: impl Into<String>) {
        self.sink.push_line(line);
    }

    /// Lines emitted to the main buffer so far.
    pub fn output(&self) -> &[String] {
        self.sink.lines()
    }

    // ---- declarations -------------------------------------------------

    /// Register a sigil-less name (functions share the namespace and
    /// the compaction rules of variables).
    pub(crate) fn register_plain(&mut self, name: &str) -> EngineResult<String> {
        Ok(self.names.register(name, "", false)?.body)
    }

    /// Declare a scalar of the value's kind.
    pub fn declare_scalar(
        &mut self,
        name: &str,
        init: impl Into<Value>,
        preserve: bool,
    ) -> EngineResult<Var> {
        let init = init.into();
        let ty = init.ty();
        let reg = self
            .names
            .register(name, &ty.sigil(false).to_string(), preserve)?;
        let id = self.vars.len();
        self.vars.push(VarSlot {
            reg,
            ty,
            data: SlotData::Scalar {
                cur: init.clone(),
                init,
            },
        });
        Ok(Var { id, ty })
    }

    pub fn int_var(&mut self, name: &str, init: i64) -> EngineResult<Var> {
        self.declare_scalar(name, init, false)
    }

    pub fn real_var(&mut self, name: &str, init: f64) -> EngineResult<Var> {
        self.declare_scalar(name, init, false)
    }

    pub fn str_var(&mut self, name: &str, init: &str) -> EngineResult<Var> {
        self.declare_scalar(name, init, false)
    }

    /// Declare an array. `size` beyond the initializer is padded with
    /// the kind's default.
    pub fn declare_array(
        &mut self,
        name: &str,
        ty: PrimType,
        mut init: Vec<Value>,
        size: usize,
        preserve: bool,
    ) -> EngineResult<ArrVar> {
        if init.len() > size {
            return Err(EngineError::TypeMismatch(format!(
                "array \"{name}\" initializer longer than its size {size}"
            )));
        }
        for v in &init {
            if v.ty() != ty {
                return Err(EngineError::TypeMismatch(format!(
                    "array \"{name}\" initializer mixes kinds"
                )));
            }
        }
        init.resize(size, Value::default_of(ty));
        let mut reg = self
            .names
            .register(name, &ty.sigil(true).to_string(), preserve)?;
        reg.postfix = format!("[{size}]");
        let id = self.vars.len();
        self.vars.push(VarSlot {
            reg,
            ty,
            data: SlotData::Array {
                cur: init.clone(),
                init,
            },
        });
        Ok(ArrVar { id, ty, len: size })
    }

    pub fn int_arr(&mut self, name: &str, init: Vec<i64>) -> EngineResult<ArrVar> {
        let size = init.len();
        let init = init.into_iter().map(Value::Int).collect();
        self.declare_array(name, PrimType::Int, init, size, false)
    }

    pub fn real_arr(&mut self, name: &str, init: Vec<f64>) -> EngineResult<ArrVar> {
        let size = init.len();
        let init = init.into_iter().map(Value::Real).collect();
        self.declare_array(name, PrimType::Real, init, size, false)
    }

    pub fn str_arr(&mut self, name: &str, init: Vec<&str>) -> EngineResult<ArrVar> {
        let size = init.len();
        let init = init.into_iter().map(Value::from).collect();
        self.declare_array(name, PrimType::Str, init, size, false)
    }

    /// Declare a zero-filled array of `size` slots.
    pub fn arr_sized(&mut self, name: &str, ty: PrimType, size: usize) -> EngineResult<ArrVar> {
        self.declare_array(name, ty, Vec::new(), size, false)
    }

    // ---- shadow state -------------------------------------------------

    pub(crate) fn shadow(&self, id: usize) -> Value {
        match &self.vars[id].data {
            SlotData::Scalar { cur, .. } => cur.clone(),
            SlotData::Array { .. } => Value::default_of(self.vars[id].ty),
        }
    }

    pub(crate) fn shadow_elem(&self, id: usize, idx: i64, len: usize) -> EngineResult<Value> {
        if idx < 0 || idx as usize >= len {
            return Err(EngineError::TypeMismatch(format!(
                "index {idx} out of bounds for {}[{len}]",
                self.render_name(id)
            )));
        }
        match &self.vars[id].data {
            SlotData::Array { cur, .. } => Ok(cur[idx as usize].clone()),
            SlotData::Scalar { .. } => Err(EngineError::TypeMismatch(format!(
                "{} is not an array",
                self.render_name(id)
            ))),
        }
    }

    fn shadow_write(&mut self, id: usize, v: Value) {
        if let SlotData::Scalar { cur, .. } = &mut self.vars[id].data {
            *cur = v;
        }
    }

    /// Shadow-only array write, no emission. Used by loops to advance
    /// their pool slot per concrete iteration.
    pub(crate) fn shadow_elem_write(&mut self, id: usize, idx: usize, v: Value) {
        if let SlotData::Array { cur, .. } = &mut self.vars[id].data {
            if idx < cur.len() {
                cur[idx] = v;
            }
        }
    }

    pub(crate) fn render_name(&self, id: usize) -> String {
        self.vars[id].reg.render()
    }

    /// Current concrete value of a scalar.
    pub fn get(&self, var: Var) -> Value {
        self.shadow(var.id)
    }

    /// Current concrete value of an array element.
    pub fn arr_get(&self, arr: ArrVar, idx: usize) -> EngineResult<Value> {
        self.shadow_elem(arr.id, idx as i64, arr.len)
    }

    // ---- statements ---------------------------------------------------

    fn coerce(&self, ty: PrimType, v: Value, what: &str) -> EngineResult<Value> {
        match (ty, v) {
            (PrimType::Real, Value::Int(i)) => Ok(Value::Real(i as f64)),
            (ty, v) if v.ty() == ty => Ok(v),
            (ty, v) => Err(EngineError::TypeMismatch(format!(
                "cannot assign {} to {what} of kind {ty}",
                v.ty()
            ))),
        }
    }

    /// Assign an expression to a scalar. Emits `name := expr` under
    /// generation; updates the shadow in both modes.
    pub fn assign(&mut self, var: Var, rhs: impl Into<Expr>) -> EngineResult<()> {
        self.stmt_gate()?;
        let rhs = rhs.into();
        let v = rhs.value(self)?;
        let v = self.coerce(var.ty, v, "variable")?;
        if self.is_generate() {
            let line = format!("{} := {}", self.render_name(var.id), rhs.expand(self));
            self.put_raw(line);
        }
        self.shadow_write(var.id, v);
        Ok(())
    }

    /// Assign to an array element addressed by an int expression.
    pub fn arr_set(
        &mut self,
        arr: ArrVar,
        idx: impl Into<Expr>,
        rhs: impl Into<Expr>,
    ) -> EngineResult<()> {
        self.stmt_gate()?;
        let idx = idx.into();
        if idx.ty() != PrimType::Int {
            return Err(EngineError::TypeMismatch(
                "array index must be an int expression".to_string(),
            ));
        }
        let rhs = rhs.into();
        let i = match idx.value(self)? {
            Value::Int(i) => i,
            _ => unreachable!("int expression folded to non-int"),
        };
        if i < 0 || i as usize >= arr.len {
            return Err(EngineError::TypeMismatch(format!(
                "index {i} out of bounds for {}[{}]",
                self.render_name(arr.id),
                arr.len
            )));
        }
        let v = rhs.value(self)?;
        let v = self.coerce(arr.ty, v, "array element")?;
        if self.is_generate() {
            let line = format!(
                "{}[{}] := {}",
                self.render_name(arr.id),
                idx.expand(self),
                rhs.expand(self)
            );
            self.put_raw(line);
        }
        self.shadow_elem_write(arr.id, i as usize, v);
        Ok(())
    }

    /// An array element as an expression node.
    pub fn elem(&self, arr: ArrVar, idx: impl Into<Expr>) -> EngineResult<Expr> {
        let idx = idx.into();
        if idx.ty() != PrimType::Int {
            return Err(EngineError::TypeMismatch(
                "array index must be an int expression".to_string(),
            ));
        }
        Ok(Expr::Index {
            arr,
            idx: Box::new(idx),
        })
    }

    /// Increment an int scalar, rendered `inc($x)`.
    pub fn inc(&mut self, var: Var) -> EngineResult<()> {
        self.step_scalar(var, 1, "inc")
    }

    /// Decrement an int scalar, rendered `dec($x)`.
    pub fn dec(&mut self, var: Var) -> EngineResult<()> {
        self.step_scalar(var, -1, "dec")
    }

    fn step_scalar(&mut self, var: Var, delta: i64, word: &str) -> EngineResult<()> {
        self.stmt_gate()?;
        let cur = match self.shadow(var.id) {
            Value::Int(i) => i,
            _ => {
                return Err(EngineError::TypeMismatch(format!(
                    "{word} needs an int variable"
                )))
            }
        };
        if self.is_generate() {
            let line = format!("{word}({})", self.render_name(var.id));
            self.put_raw(line);
        }
        self.shadow_write(var.id, Value::Int(cur.wrapping_add(delta)));
        Ok(())
    }

    pub fn add_assign(&mut self, var: Var, rhs: impl Into<Expr>) -> EngineResult<()> {
        let e = var.ex().add(rhs)?;
        self.assign(var, e)
    }

    pub fn sub_assign(&mut self, var: Var, rhs: impl Into<Expr>) -> EngineResult<()> {
        let e = var.ex().sub(rhs)?;
        self.assign(var, e)
    }

    pub fn mul_assign(&mut self, var: Var, rhs: impl Into<Expr>) -> EngineResult<()> {
        let e = var.ex().mul(rhs)?;
        self.assign(var, e)
    }

    pub fn div_assign(&mut self, var: Var, rhs: impl Into<Expr>) -> EngineResult<()> {
        let e = var.ex().div(rhs)?;
        self.assign(var, e)
    }

    // ---- declarations output ------------------------------------------

    /// Declaration lines for every registered entity, in declaration
    /// order. Initializers equal to the kind's default are omitted;
    /// string initializers become follow-up assignment lines.
    pub fn decl_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for slot in &self.vars {
            match &slot.data {
                SlotData::Scalar { init, .. } => {
                    let head = format!("declare {}", slot.reg.render_decl());
                    match init {
                        Value::Str(s) if !s.is_empty() => {
                            out.push(head);
                            out.push(format!("{} := \"{s}\"", slot.reg.render()));
                        }
                        v if *v == Value::default_of(slot.ty) => out.push(head),
                        v => out.push(format!("{head} := {}", v.literal())),
                    }
                }
                SlotData::Array { init, .. } => {
                    let head = format!("declare {}", slot.reg.render_decl());
                    let default = Value::default_of(slot.ty);
                    let any = init.iter().any(|v| *v != default);
                    if !any {
                        out.push(head);
                    } else if slot.ty == PrimType::Str {
                        out.push(head);
                        for (i, v) in init.iter().enumerate() {
                            if *v != default {
                                out.push(format!("{}[{i}] := {}", slot.reg.render(), v.literal()));
                            }
                        }
                    } else {
                        let items: Vec<String> = init.iter().map(Value::literal).collect();
                        out.push(format!("{head} := ({})", items.join(", ")));
                    }
                }
            }
        }
        out
    }

    /// Captured callback blocks, in definition order.
    pub fn callback_blocks(&self) -> &[NamedBlock] {
        &self.callbacks
    }

    /// Captured function blocks, in definition order.
    pub fn function_blocks(&self) -> Vec<NamedBlock> {
        self.functions
            .iter()
            .map(|f| NamedBlock {
                name: f.rendered.clone(),
                lines: f.lines.clone(),
            })
            .collect()
    }

    /// Drain the main buffer.
    pub fn take_output(&mut self) -> Vec<String> {
        self.sink.take_lines()
    }

    /// Drop every declaration and buffer; mode and options survive.
    pub fn reset(&mut self) {
        self.sink.reset();
        self.names.reset();
        self.vars.clear();
        self.chains.clear();
        self.subjects.clear();
        self.in_case = false;
        self.loop_kinds.clear();
        self.pool = LoopPool::default();
        self.callbacks.clear();
        self.functions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gen() -> Engine {
        Engine::new(Mode::Generate)
    }

    fn run() -> Engine {
        Engine::new(Mode::Interpreted)
    }

    #[test]
    fn test_scalar_declaration_lines() {
        let mut e = gen();
        e.int_var("x", 1).unwrap();
        e.int_var("y", 0).unwrap();
        e.real_var("r", 0.5).unwrap();
        e.str_var("s", "hi").unwrap();
        assert_eq!(
            e.decl_lines(),
            vec![
                "declare $x := 1",
                "declare $y",
                "declare ~r := 0.5",
                "declare @s",
                "@s := \"hi\"",
            ]
        );
    }

    #[test]
    fn test_array_declaration_lines() {
        let mut e = gen();
        e.int_arr("a", vec![1, 2, 3]).unwrap();
        e.arr_sized("b", PrimType::Int, 4).unwrap();
        e.str_arr("s", vec!["x", ""]).unwrap();
        assert_eq!(
            e.decl_lines(),
            vec![
                "declare %a[3] := (1, 2, 3)",
                "declare %b[4]",
                "declare !s[2]",
                "!s[0] := \"x\"",
            ]
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut e = gen();
        e.int_var("x", 0).unwrap();
        assert!(matches!(
            e.int_var("x", 1),
            Err(EngineError::DuplicateName(_))
        ));
        // Arrays share the namespace with scalars.
        assert!(matches!(
            e.int_arr("x", vec![0]),
            Err(EngineError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_assignment_emits_and_shadows() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        let y = e.int_var("y", 3).unwrap();
        e.assign(x, y.ex().add(2).unwrap()).unwrap();
        assert_eq!(e.output(), &["$x := $y + 2"]);
        assert_eq!(e.get(x), Value::Int(5));
    }

    #[test]
    fn test_interpreted_assignment_emits_nothing() {
        let mut e = run();
        let x = e.int_var("x", 0).unwrap();
        e.assign(x, 7).unwrap();
        assert!(e.output().is_empty());
        assert_eq!(e.get(x), Value::Int(7));
    }

    #[test]
    fn test_int_to_real_widening_on_assign() {
        let mut e = run();
        let r = e.real_var("r", 0.0).unwrap();
        e.assign(r, 3).unwrap();
        assert_eq!(e.get(r), Value::Real(3.0));
    }

    #[test]
    fn test_str_to_int_assignment_rejected() {
        let mut e = run();
        let x = e.int_var("x", 0).unwrap();
        assert!(matches!(
            e.assign(x, "oops"),
            Err(EngineError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_inc_dec() {
        let mut e = gen();
        let x = e.int_var("x", 5).unwrap();
        e.inc(x).unwrap();
        e.dec(x).unwrap();
        e.dec(x).unwrap();
        assert_eq!(e.output(), &["inc($x)", "dec($x)", "dec($x)"]);
        assert_eq!(e.get(x), Value::Int(4));
    }

    #[test]
    fn test_array_element_assignment() {
        let mut e = gen();
        let a = e.int_arr("a", vec![0, 0, 0]).unwrap();
        let i = e.int_var("i", 1).unwrap();
        e.arr_set(a, i.ex(), 9).unwrap();
        assert_eq!(e.output(), &["%a[$i] := 9"]);
        assert_eq!(e.arr_get(a, 1).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_out_of_bounds_index_rejected() {
        let mut e = run();
        let a = e.int_arr("a", vec![0, 0]).unwrap();
        assert!(matches!(
            e.arr_set(a, 5, 1),
            Err(EngineError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_precedence_parenthesization() {
        let mut e = gen();
        let a = e.int_var("a", 1).unwrap();
        let b = e.int_var("b", 2).unwrap();
        let c = e.int_var("c", 3).unwrap();
        // (a + b) * c keeps the parens; a + b * c does not need any.
        let grouped = a.ex().add(b.ex()).unwrap().mul(c.ex()).unwrap();
        assert_eq!(grouped.expand(&e), "($a + $b) * $c");
        let flat = a.ex().add(b.ex().mul(c.ex()).unwrap()).unwrap();
        assert_eq!(flat.expand(&e), "$a + $b * $c");
    }

    #[test]
    fn test_expand_is_idempotent() {
        let mut e = gen();
        let a = e.int_var("a", 1).unwrap();
        let b = e.int_var("b", 2).unwrap();
        let expr = a.ex().add(b.ex().mul(3).unwrap()).unwrap().shl(1).unwrap();
        let first = expr.expand(&e);
        assert_eq!(expr.expand(&e), first);
    }

    #[test]
    fn test_equal_rank_parenthesizes_right_child_only() {
        let mut e = gen();
        let a = e.int_var("a", 1).unwrap();
        let b = e.int_var("b", 2).unwrap();
        let c = e.int_var("c", 3).unwrap();
        let left = a.ex().sub(b.ex()).unwrap().sub(c.ex()).unwrap();
        assert_eq!(left.expand(&e), "$a - $b - $c");
        let right = a.ex().sub(b.ex().sub(c.ex()).unwrap()).unwrap();
        assert_eq!(right.expand(&e), "$a - ($b - $c)");
    }

    #[test]
    fn test_bracket_operators_render_as_calls() {
        let mut e = gen();
        let a = e.int_var("a", 4).unwrap();
        let shifted = a.ex().shl(2).unwrap().add(1).unwrap();
        assert_eq!(shifted.expand(&e), "sh_left($a, 2) + 1");
        assert_eq!(shifted.value(&e).unwrap(), Value::Int(17));
        let r = e.real_var("r", 2.0).unwrap();
        let p = r.ex().pow(3.0).unwrap();
        assert_eq!(p.expand(&e), "pow(~r, 3.0)");
        assert_eq!(p.value(&e).unwrap(), Value::Real(8.0));
    }

    #[test]
    fn test_logical_and_bitwise_spellings() {
        let mut e = gen();
        let a = e.int_var("a", 6).unwrap();
        let b = e.int_var("b", 3).unwrap();
        let bits = a.ex().bit_and(b.ex()).unwrap();
        assert_eq!(bits.expand(&e), "$a .and. $b");
        assert_eq!(bits.value(&e).unwrap(), Value::Int(2));
        let cond = a
            .ex()
            .gt(0)
            .unwrap()
            .log_and(b.ex().lt(10).unwrap())
            .unwrap();
        assert_eq!(cond.expand(&e), "$a > 0 and $b < 10");
        assert!(cond.truth(&e).unwrap());
    }

    #[test]
    fn test_logical_needs_boolean_operands() {
        let mut e = gen();
        let a = e.int_var("a", 1).unwrap();
        assert!(matches!(
            a.ex().log_and(a.ex()),
            Err(EngineError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_string_concat_and_comparison_spelling() {
        let mut e = gen();
        let s = e.str_var("s", "a").unwrap();
        let joined = s.ex().concat("b").unwrap().concat(s.ex()).unwrap();
        assert_eq!(joined.expand(&e), "@s & \"b\" & @s");
        assert_eq!(joined.value(&e).unwrap(), Value::Str("aba".into()));
        let a = e.int_var("a", 1).unwrap();
        assert_eq!(a.ex().eq(1).unwrap().expand(&e), "$a = 1");
        assert_eq!(a.ex().ne(2).unwrap().expand(&e), "$a # 2");
    }

    #[test]
    fn test_int_literal_widens_next_to_real() {
        let mut e = gen();
        let r = e.real_var("r", 1.5).unwrap();
        let sum = r.ex().add(2).unwrap();
        assert_eq!(sum.expand(&e), "~r + 2.0");
        assert_eq!(sum.value(&e).unwrap(), Value::Real(3.5));
    }

    #[test]
    fn test_division_by_zero_folds_to_zero() {
        let mut e = run();
        let a = e.int_var("a", 7).unwrap();
        let z = e.int_var("z", 0).unwrap();
        assert_eq!(a.ex().div(z.ex()).unwrap().value(&e).unwrap(), Value::Int(0));
        assert_eq!(
            a.ex().modulo(z.ex()).unwrap().value(&e).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn test_compacted_names_in_output() {
        let mut e = Engine::with_options(EngineOptions {
            mode: Mode::Generate,
            compact_names: true,
        });
        let x = e.int_var("my_variable", 0).unwrap();
        e.assign(x, 1).unwrap();
        let line = &e.output()[0];
        assert!(line.starts_with('$'));
        assert_eq!(line.len(), "$abcde := 1".len());
        assert!(!line.contains("my_variable"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        e.assign(x, 1).unwrap();
        e.reset();
        assert!(e.output().is_empty());
        assert!(e.decl_lines().is_empty());
        assert!(e.int_var("x", 0).is_ok());
    }
}
