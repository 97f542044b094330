//! Call-frame emulation over flat arrays.
//!
//! The target language has no local variables, so a [`CallStack`]
//! carves frames out of per-kind backing arrays. Each kind used gets
//! three entities, declared on first use: the backing array, a
//! pointer array holding one watermark per open frame, and a depth
//! index. The invariant is `ptr[idx]` = base of the next frame to
//! open; an open frame addresses its slots relative to
//! `ptr[idx - 1]`, which stays correct under recursion because every
//! push rebases on the current watermark.
//!
//! Popping only moves the depth index back. Slot contents are left in
//! place and overwritten by the next push.

use kscript_types::{EngineError, EngineResult, PrimType};

use crate::engine::{ArrVar, Engine, Var};
use crate::expr::Expr;

const KINDS: [PrimType; 3] = [PrimType::Int, PrimType::Real, PrimType::Str];

fn kind_slot(ty: PrimType) -> usize {
    match ty {
        PrimType::Int => 0,
        PrimType::Real => 1,
        PrimType::Str => 2,
    }
}

/// Arena entities of one primitive kind.
#[derive(Debug, Clone, Copy)]
struct KindStack {
    arr: ArrVar,
    ptr: ArrVar,
    idx: Var,
}

struct Frame {
    widths: [usize; 3],
}

/// One argument or local of a frame being pushed.
pub enum FrameArg<'a> {
    /// Copied-in scalar value.
    Value(&'a str, Expr),
    /// Copied-in array; emits an element-wise copy loop.
    Array(&'a str, ArrVar),
    /// Uninitialized scalar slot.
    Local(&'a str, PrimType),
    /// Uninitialized array slot of the given length.
    LocalArr(&'a str, PrimType, usize),
}

impl FrameArg<'_> {
    fn name(&self) -> &str {
        match self {
            FrameArg::Value(n, _)
            | FrameArg::Array(n, _)
            | FrameArg::Local(n, _)
            | FrameArg::LocalArr(n, _, _) => n,
        }
    }

    fn ty(&self) -> PrimType {
        match self {
            FrameArg::Value(_, e) => e.ty(),
            FrameArg::Array(_, a) => a.ty(),
            FrameArg::Local(_, t) => *t,
            FrameArg::LocalArr(_, t, _) => *t,
        }
    }

    fn width(&self) -> usize {
        match self {
            FrameArg::Value(..) | FrameArg::Local(..) => 1,
            FrameArg::Array(_, a) => a.len(),
            FrameArg::LocalArr(_, _, n) => *n,
        }
    }
}

/// A slot of the topmost open frame.
#[derive(Debug, Clone)]
pub struct FrameVar {
    kind: KindStack,
    ty: PrimType,
    offset: usize,
    width: usize,
}

impl FrameVar {
    pub fn ty(&self) -> PrimType {
        self.ty
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Base of the owning frame: `ptr[idx - 1]`.
    fn base(&self) -> EngineResult<Expr> {
        let at = self.kind.idx.ex().sub(1)?;
        Ok(Expr::Index {
            arr: self.kind.ptr,
            idx: Box::new(at),
        })
    }

    fn slot_at(&self, extra: Option<Expr>) -> EngineResult<Expr> {
        let mut at = self.base()?;
        if self.offset > 0 {
            at = at.add(self.offset as i64)?;
        }
        if let Some(extra) = extra {
            at = at.add(extra)?;
        }
        Ok(Expr::Index {
            arr: self.kind.arr,
            idx: Box::new(at),
        })
    }

    /// The scalar slot as an expression node.
    pub fn ex(&self) -> EngineResult<Expr> {
        self.slot_at(None)
    }

    /// Element `i` of an array slot.
    pub fn at(&self, i: impl Into<Expr>) -> EngineResult<Expr> {
        self.slot_at(Some(i.into()))
    }

    /// Assign to the scalar slot.
    pub fn set(&self, e: &mut Engine, rhs: impl Into<Expr>) -> EngineResult<()> {
        let target = self.slot_at(None)?;
        assign_slot(e, target, rhs.into())
    }

    /// Assign to element `i` of an array slot.
    pub fn set_at(
        &self,
        e: &mut Engine,
        i: impl Into<Expr>,
        rhs: impl Into<Expr>,
    ) -> EngineResult<()> {
        let target = self.slot_at(Some(i.into()))?;
        assign_slot(e, target, rhs.into())
    }
}

fn assign_slot(e: &mut Engine, target: Expr, rhs: Expr) -> EngineResult<()> {
    match target {
        Expr::Index { arr, idx } => e.arr_set(arr, *idx, rhs),
        _ => Err(EngineError::TypeMismatch(
            "frame slot target must be an array element".to_string(),
        )),
    }
}

/// Named slots of the frame a push opened.
pub struct FrameVars {
    inner: Vec<(String, FrameVar)>,
}

impl FrameVars {
    pub fn get(&self, name: &str) -> Option<&FrameVar> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FrameVar)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// A call stack backed by per-kind arenas.
pub struct CallStack {
    name: String,
    size: usize,
    max_depth: usize,
    kinds: [Option<KindStack>; 3],
    frames: Vec<Frame>,
}

impl CallStack {
    /// Create a stack named `name` with `size` slots per kind arena
    /// and at most `max_depth` open frames.
    pub fn new(name: &str, size: usize, max_depth: usize) -> CallStack {
        CallStack {
            name: name.to_string(),
            size,
            max_depth,
            kinds: [None; 3],
            frames: Vec::new(),
        }
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn kind_stack(&mut self, e: &mut Engine, ty: PrimType) -> EngineResult<KindStack> {
        let slot = kind_slot(ty);
        if let Some(k) = self.kinds[slot] {
            return Ok(k);
        }
        let arr = e.arr_sized(&format!("_{}_{ty}_arr_", self.name), ty, self.size)?;
        let ptr = e.arr_sized(
            &format!("_{}_{ty}_ptr_", self.name),
            PrimType::Int,
            self.max_depth + 1,
        )?;
        let idx = e.declare_scalar(&format!("_{}_{ty}_idx_", self.name), 0i64, false)?;
        let k = KindStack { arr, ptr, idx };
        self.kinds[slot] = Some(k);
        Ok(k)
    }

    fn used(&self, slot: usize) -> usize {
        self.frames.iter().map(|f| f.widths[slot]).sum()
    }

    /// Open a frame: copy values and arrays in, reserve locals, move
    /// the watermarks, and hand back addressable slots.
    pub fn push(&mut self, e: &mut Engine, args: Vec<FrameArg<'_>>) -> EngineResult<FrameVars> {
        if self.frames.len() >= self.max_depth {
            return Err(EngineError::StackOverflow(format!(
                "stack \"{}\" exceeded its depth of {}",
                self.name, self.max_depth
            )));
        }
        let mut widths = [0usize; 3];
        for arg in &args {
            widths[kind_slot(arg.ty())] += arg.width();
        }
        for (slot, &ty) in KINDS.iter().enumerate() {
            if widths[slot] > 0 && self.used(slot) + widths[slot] > self.size {
                return Err(EngineError::StackOverflow(format!(
                    "stack \"{}\" {ty} arena exceeded its size of {}",
                    self.name, self.size
                )));
            }
        }

        let mut vars = Vec::with_capacity(args.len());
        let mut offsets = [0usize; 3];
        for arg in &args {
            let name = arg.name();
            if vars.iter().any(|(n, _): &(String, FrameVar)| n == name) {
                return Err(EngineError::DuplicateName(name.to_string()));
            }
            let ty = arg.ty();
            let kind = self.kind_stack(e, ty)?;
            let offset = offsets[kind_slot(ty)];
            offsets[kind_slot(ty)] += arg.width();
            // Base of the frame being opened: the current watermark.
            let base = e.elem(kind.ptr, kind.idx.ex())?;
            match arg {
                FrameArg::Value(_, expr) => {
                    let at = offset_expr(base, offset)?;
                    e.arr_set(kind.arr, at, expr.clone())?;
                }
                FrameArg::Array(_, src) => {
                    let src = *src;
                    e.for_range(0, src.len() as i64, |e, i| {
                        let at = offset_expr(base.clone(), offset)?.add(i.clone())?;
                        let v = e.elem(src, i)?;
                        e.arr_set(kind.arr, at, v)
                    })?;
                }
                FrameArg::Local(..) | FrameArg::LocalArr(..) => {}
            }
            vars.push((
                name.to_string(),
                FrameVar {
                    kind,
                    ty,
                    offset,
                    width: arg.width(),
                },
            ));
        }

        for (slot, &ty) in KINDS.iter().enumerate() {
            if widths[slot] == 0 {
                continue;
            }
            let kind = self.kind_stack(e, ty)?;
            let base = e.elem(kind.ptr, kind.idx.ex())?;
            let next = kind.idx.ex().add(1)?;
            e.arr_set(kind.ptr, next, base.add(widths[slot] as i64)?)?;
            e.inc(kind.idx)?;
        }
        self.frames.push(Frame { widths });
        Ok(FrameVars { inner: vars })
    }

    /// Close the topmost frame. Arena contents are left as-is.
    pub fn pop(&mut self, e: &mut Engine) -> EngineResult<()> {
        let frame = self.frames.pop().ok_or(EngineError::StackUnderflow)?;
        for (slot, &ty) in KINDS.iter().enumerate() {
            if frame.widths[slot] == 0 {
                continue;
            }
            let kind = self.kind_stack(e, ty)?;
            e.dec(kind.idx)?;
        }
        Ok(())
    }
}

fn offset_expr(base: Expr, offset: usize) -> EngineResult<Expr> {
    if offset == 0 {
        Ok(base)
    } else {
        base.add(offset as i64)
    }
}
