//! Counted and conditional loops.
//!
//! The target language only has `while`, so every counted loop is
//! lowered to an index assignment, a `while` head, a step statement
//! and `end while`. Loop indices come from a shared pool: one lazily
//! declared int array with a slot per nesting depth, so generated
//! scripts never accumulate throwaway index variables.
//!
//! Both modes iterate concretely against shadow state. A generating
//! engine locks the sink after the first iteration, so the body's
//! text is captured exactly once while its shadow effects still
//! replay per iteration.

use kscript_types::{EngineError, EngineResult, PrimType, Signal, Value};

use crate::engine::{ArrVar, Engine};
use crate::expr::Expr;

/// Slots in the shared index pool; bounds loop nesting depth.
pub const LOOP_POOL_SLOTS: usize = 20;

/// Iteration ceiling for conditional loops.
const WHILE_LIMIT: u64 = 500_000;

const POOL_NAME: &str = "_for_idx_";

/// Kind of the innermost running loop; steers break validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopKind {
    For,
    While,
}

/// Shared loop-index pool state.
#[derive(Debug, Default)]
pub(crate) struct LoopPool {
    pub(crate) arr: Option<ArrVar>,
    pub(crate) depth: usize,
}

/// One element of an array being iterated, addressed by the loop's
/// pool slot. Valid in both modes for the current iteration.
#[derive(Debug, Clone)]
pub struct ArrSlot {
    arr: ArrVar,
    idx: Expr,
}

impl ArrSlot {
    /// The element as an expression node.
    pub fn ex(&self) -> Expr {
        Expr::Index {
            arr: self.arr,
            idx: Box::new(self.idx.clone()),
        }
    }
}

impl Engine {
    /// Loop from 0 up to (excluding) `stop` with step 1.
    pub fn for_count<F>(&mut self, stop: impl Into<Expr>, body: F) -> EngineResult<()>
    where
        F: FnMut(&mut Engine, Expr) -> EngineResult<()>,
    {
        self.for_range_step(0, stop, 1, body)
    }

    /// Loop from `start` up to (excluding) `stop` with step 1.
    pub fn for_range<F>(
        &mut self,
        start: impl Into<Expr>,
        stop: impl Into<Expr>,
        body: F,
    ) -> EngineResult<()>
    where
        F: FnMut(&mut Engine, Expr) -> EngineResult<()>,
    {
        self.for_range_step(start, stop, 1, body)
    }

    /// Loop from `start` toward (excluding) `stop` by `step`. A
    /// negative step counts down and emits a `>` head.
    pub fn for_range_step<F>(
        &mut self,
        start: impl Into<Expr>,
        stop: impl Into<Expr>,
        step: impl Into<Expr>,
        mut body: F,
    ) -> EngineResult<()>
    where
        F: FnMut(&mut Engine, Expr) -> EngineResult<()>,
    {
        let start = start.into();
        let stop = stop.into();
        let step = step.into();
        for (what, e) in [("start", &start), ("stop", &stop), ("step", &step)] {
            if e.ty() != PrimType::Int {
                return Err(EngineError::TypeMismatch(format!(
                    "loop {what} must be an int expression"
                )));
            }
        }
        self.stmt_gate()?;
        let (slot, pool) = self.pool_slot()?;
        let res = self.counted(slot, pool, &start, &stop, &step, &mut body);
        self.pool.depth -= 1;
        res
    }

    /// Iterate an array, handing the body each element in turn.
    pub fn for_each<F>(&mut self, arr: ArrVar, mut body: F) -> EngineResult<()>
    where
        F: FnMut(&mut Engine, ArrSlot) -> EngineResult<()>,
    {
        self.for_range_step(0, arr.len() as i64, 1, |e, idx| {
            body(e, ArrSlot { arr, idx })
        })
    }

    /// Iterate an array with the index alongside each element.
    pub fn for_each_enum<F>(&mut self, arr: ArrVar, mut body: F) -> EngineResult<()>
    where
        F: FnMut(&mut Engine, Expr, ArrSlot) -> EngineResult<()>,
    {
        self.for_range_step(0, arr.len() as i64, 1, |e, idx| {
            let slot = ArrSlot {
                arr,
                idx: idx.clone(),
            };
            body(e, idx, slot)
        })
    }

    /// Assign to the element behind an iteration slot.
    pub fn slot_set(&mut self, slot: &ArrSlot, rhs: impl Into<Expr>) -> EngineResult<()> {
        self.arr_set(slot.arr, slot.idx.clone(), rhs)
    }

    /// Conditional loop. The condition is rebuilt per iteration so it
    /// folds against current shadow state; its first rendering forms
    /// the emitted head.
    pub fn while_<C, F>(&mut self, mut cond: C, mut body: F) -> EngineResult<()>
    where
        C: FnMut(&mut Engine) -> EngineResult<Expr>,
        F: FnMut(&mut Engine) -> EngineResult<()>,
    {
        self.stmt_gate()?;
        self.loop_kinds.push(LoopKind::While);
        let mut locked_here = false;
        let mut head_done = false;
        let mut iterations: u64 = 0;
        let res = loop {
            let c = match cond(self) {
                Ok(c) => c,
                Err(err) => break Err(err),
            };
            let truth = match c.truth(self) {
                Ok(t) => t,
                Err(err) => break Err(err),
            };
            if self.is_generate() && !head_done {
                let head = format!("while({})", c.expand(self));
                self.put_raw(head);
                head_done = true;
            }
            if !truth {
                break Ok(());
            }
            if iterations >= 1 && self.is_generate() && !self.sink.is_locked() {
                self.sink.lock();
                locked_here = true;
            }
            let depth = self.chains.len();
            let r = body(self);
            self.sink.clear_hook();
            self.chains.truncate(depth);
            if let Err(err) = r {
                break Err(err);
            }
            iterations += 1;
            if iterations > WHILE_LIMIT {
                break Err(EngineError::OrderingError(
                    "while loop exceeded its iteration ceiling".to_string(),
                ));
            }
        };
        if locked_here {
            self.sink.unlock();
        }
        self.loop_kinds.pop();
        res?;
        if self.is_generate() {
            self.put_raw("end while");
        }
        Ok(())
    }

    /// Request an early exit from the innermost counted loop.
    ///
    /// Returns the signal to raise: `return Err(e.break_loop())`.
    /// Outside a loop, or inside a conditional loop, this is a
    /// sequencing error instead.
    pub fn break_loop(&self) -> EngineError {
        match self.loop_kinds.last() {
            None => EngineError::OrderingError("break outside a loop".to_string()),
            Some(LoopKind::While) => EngineError::OrderingError(
                "break inside a conditional loop is not supported".to_string(),
            ),
            Some(LoopKind::For) => EngineError::Signal(Signal::Break(Vec::new())),
        }
    }

    fn pool_slot(&mut self) -> EngineResult<(usize, ArrVar)> {
        let arr = match self.pool.arr {
            Some(arr) => arr,
            None => {
                let arr = self.arr_sized(POOL_NAME, PrimType::Int, LOOP_POOL_SLOTS)?;
                self.pool.arr = Some(arr);
                arr
            }
        };
        if self.pool.depth >= LOOP_POOL_SLOTS {
            return Err(EngineError::StackOverflow(
                "loop index pool exhausted".to_string(),
            ));
        }
        let slot = self.pool.depth;
        self.pool.depth += 1;
        Ok((slot, arr))
    }

    fn counted<F>(
        &mut self,
        slot: usize,
        pool: ArrVar,
        start: &Expr,
        stop: &Expr,
        step: &Expr,
        body: &mut F,
    ) -> EngineResult<()>
    where
        F: FnMut(&mut Engine, Expr) -> EngineResult<()>,
    {
        let start_v = expect_int(start.value(self)?)?;
        let stop_v = expect_int(stop.value(self)?)?;
        let step_v = expect_int(step.value(self)?)?;
        if step_v == 0 {
            return Err(EngineError::TypeMismatch(
                "loop step must not be zero".to_string(),
            ));
        }
        let idx = self.elem(pool, slot as i64)?;
        self.arr_set(pool, slot as i64, start.clone())?;
        if self.is_generate() {
            let cmp = if step_v > 0 { "<" } else { ">" };
            let head = format!("while({} {cmp} {})", idx.expand(self), stop.expand(self));
            self.put_raw(head);
        }
        self.loop_kinds.push(LoopKind::For);
        let mut locked_here = false;
        let mut first = true;
        let mut i = start_v;
        let res = loop {
            let more = if step_v > 0 { i < stop_v } else { i > stop_v };
            if !more {
                break Ok(());
            }
            self.shadow_elem_write(pool.id, slot, Value::Int(i));
            if !first && self.is_generate() && !self.sink.is_locked() {
                self.sink.lock();
                locked_here = true;
            }
            let depth = self.chains.len();
            let r = body(self, idx.clone());
            self.sink.clear_hook();
            self.chains.truncate(depth);
            match r {
                Ok(()) => {}
                Err(EngineError::Signal(Signal::Break(ends))) => {
                    // Forced exit: pin the index at the bound so the
                    // emitted while-head fails, then flush the block
                    // terminators the signal carried out.
                    if let Err(err) = self.arr_set(pool, slot as i64, stop.clone()) {
                        break Err(err);
                    }
                    for line in ends {
                        self.put_raw(line);
                    }
                    break Ok(());
                }
                Err(err) => break Err(err),
            }
            first = false;
            i = i.wrapping_add(step_v);
        };
        if locked_here {
            self.sink.unlock();
        }
        self.loop_kinds.pop();
        res?;
        if self.is_generate() {
            let idx_txt = idx.expand(self);
            // Literal negative steps flip to a subtraction; anything
            // else stays symbolic, matching the head's treatment of
            // `stop`.
            let step_line = match step {
                Expr::Lit(Value::Int(v)) if *v < 0 => {
                    format!("{idx_txt} := {idx_txt} - {}", v.unsigned_abs())
                }
                _ => format!("{idx_txt} := {idx_txt} + {}", step.expand(self)),
            };
            self.put_raw(step_line);
            self.put_raw("end while");
        }
        Ok(())
    }
}

fn expect_int(v: Value) -> EngineResult<i64> {
    match v {
        Value::Int(i) => Ok(i),
        v => Err(EngineError::TypeMismatch(format!(
            "loop bound folded to {v:?}, expected an int"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kscript_types::Mode;

    fn gen() -> Engine {
        Engine::new(Mode::Generate)
    }

    fn run() -> Engine {
        Engine::new(Mode::Interpreted)
    }

    #[test]
    fn test_interpreted_range_iterates_concretely() {
        let mut e = run();
        let sum = e.int_var("sum", 0).unwrap();
        e.for_range_step(2, 10, 3, |e, idx| e.add_assign(sum, idx))
            .unwrap();
        // 2 + 5 + 8
        assert_eq!(e.get(sum), Value::Int(15));
    }

    #[test]
    fn test_generated_range_emits_single_body() {
        let mut e = gen();
        let sum = e.int_var("sum", 0).unwrap();
        e.for_range_step(2, 10, 3, |e, idx| e.add_assign(sum, idx))
            .unwrap();
        assert_eq!(
            e.output(),
            &[
                "%_for_idx_[0] := 2",
                "while(%_for_idx_[0] < 10)",
                "$sum := $sum + %_for_idx_[0]",
                "%_for_idx_[0] := %_for_idx_[0] + 3",
                "end while",
            ]
        );
    }

    #[test]
    fn test_descending_range() {
        let mut e = run();
        let last = e.int_var("last", -1).unwrap();
        e.for_range_step(5, 0, -2, |e, idx| e.assign(last, idx))
            .unwrap();
        // 5, 3, 1
        assert_eq!(e.get(last), Value::Int(1));

        let mut g = gen();
        let last = g.int_var("last", 0).unwrap();
        g.for_range_step(5, 0, -2, |e, idx| e.assign(last, idx))
            .unwrap();
        assert_eq!(
            g.output(),
            &[
                "%_for_idx_[0] := 5",
                "while(%_for_idx_[0] > 0)",
                "$last := %_for_idx_[0]",
                "%_for_idx_[0] := %_for_idx_[0] - 2",
                "end while",
            ]
        );
    }

    #[test]
    fn test_variable_step_renders_symbolically() {
        let mut e = gen();
        let st = e.int_var("st", 2).unwrap();
        let sum = e.int_var("sum", 0).unwrap();
        e.for_range_step(0, 6, st.ex(), |e, idx| e.add_assign(sum, idx))
            .unwrap();
        assert_eq!(
            e.output(),
            &[
                "%_for_idx_[0] := 0",
                "while(%_for_idx_[0] < 6)",
                "$sum := $sum + %_for_idx_[0]",
                "%_for_idx_[0] := %_for_idx_[0] + $st",
                "end while",
            ]
        );
        // 0 + 2 + 4
        assert_eq!(e.get(sum), Value::Int(6));
    }

    #[test]
    fn test_empty_range_emits_head_and_exit_only() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        e.for_range(5, 5, |e, _| e.assign(x, 1)).unwrap();
        assert_eq!(
            e.output(),
            &[
                "%_for_idx_[0] := 5",
                "while(%_for_idx_[0] < 5)",
                "%_for_idx_[0] := %_for_idx_[0] + 1",
                "end while",
            ]
        );
        assert_eq!(e.get(x), Value::Int(0));
    }

    #[test]
    fn test_nested_loops_use_distinct_slots() {
        let mut e = gen();
        let sum = e.int_var("sum", 0).unwrap();
        e.for_count(2, |e, i| {
            e.for_count(3, |e, j| {
                let term = i.clone().add(j)?;
                e.add_assign(sum, term)
            })
        })
        .unwrap();
        let body_line = "$sum := $sum + (%_for_idx_[0] + %_for_idx_[1])";
        let occurrences = e.output().iter().filter(|l| *l == body_line).count();
        assert_eq!(occurrences, 1);
        assert_eq!(e.pool.depth, 0);
    }

    #[test]
    fn test_interpreted_nested_loops() {
        let mut e = run();
        let sum = e.int_var("sum", 0).unwrap();
        e.for_count(2, |e, i| {
            e.for_count(3, |e, j| {
                let term = i.clone().add(j)?;
                e.add_assign(sum, term)
            })
        })
        .unwrap();
        // (0+0)+(0+1)+(0+2)+(1+0)+(1+1)+(1+2)
        assert_eq!(e.get(sum), Value::Int(9));
    }

    #[test]
    fn test_break_stops_iteration() {
        let mut e = run();
        let seen = e.int_var("seen", 0).unwrap();
        e.for_count(10, |e, idx| {
            if e.get(seen) == Value::Int(3) {
                return Err(e.break_loop());
            }
            let _ = idx;
            e.add_assign(seen, 1)
        })
        .unwrap();
        assert_eq!(e.get(seen), Value::Int(3));
        // The slot was forced to the bound.
        let pool = e.pool.arr.unwrap();
        assert_eq!(e.arr_get(pool, 0).unwrap(), Value::Int(10));
    }

    #[test]
    fn test_generated_break_inside_if() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        e.for_count(10, |e, idx| {
            e.add_assign(x, 1)?;
            e.if_(idx.eq(4)?, |e| Err(e.break_loop()))
        })
        .unwrap();
        assert_eq!(
            e.output(),
            &[
                "%_for_idx_[0] := 0",
                "while(%_for_idx_[0] < 10)",
                "$x := $x + 1",
                "if(%_for_idx_[0] = 4)",
                "%_for_idx_[0] := 10",
                "end if",
                "%_for_idx_[0] := %_for_idx_[0] + 1",
                "end while",
            ]
        );
    }

    #[test]
    fn test_generated_break_inside_select() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        e.for_count(5, |e, idx| {
            e.select(idx, |e| {
                e.case(2, |e| {
                    e.assign(x, 1)?;
                    Err(e.break_loop())
                })
            })
        })
        .unwrap();
        assert_eq!(
            e.output(),
            &[
                "%_for_idx_[0] := 0",
                "while(%_for_idx_[0] < 5)",
                "select(%_for_idx_[0])",
                "case(2)",
                "$x := 1",
                "%_for_idx_[0] := 5",
                "end select",
                "%_for_idx_[0] := %_for_idx_[0] + 1",
                "end while",
            ]
        );

        let mut r = run();
        let x = r.int_var("x", 0).unwrap();
        r.for_count(5, |e, idx| {
            e.select(idx, |e| {
                e.case(2, |e| {
                    e.assign(x, 1)?;
                    Err(e.break_loop())
                })
            })
        })
        .unwrap();
        assert_eq!(r.get(x), Value::Int(1));
        let pool = r.pool.arr.unwrap();
        assert_eq!(r.arr_get(pool, 0).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_break_outside_loop_is_ordering_error() {
        let e = run();
        assert!(matches!(
            e.break_loop(),
            EngineError::OrderingError(_)
        ));
    }

    #[test]
    fn test_break_inside_while_is_rejected() {
        let mut e = run();
        let n = e.int_var("n", 0).unwrap();
        let res = e.while_(|_| n.ex().lt(3), |e| Err(e.break_loop()));
        assert!(matches!(res, Err(EngineError::OrderingError(_))));
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut e = run();
        e.pool.depth = LOOP_POOL_SLOTS;
        let res = e.for_count(1, |_, _| Ok(()));
        assert!(matches!(res, Err(EngineError::StackOverflow(_))));
    }

    #[test]
    fn test_for_each_reads_and_writes_elements() {
        let mut e = run();
        let a = e.int_arr("a", vec![1, 2, 3]).unwrap();
        e.for_each(a, |e, slot| {
            let doubled = slot.ex().mul(2)?;
            e.slot_set(&slot, doubled)
        })
        .unwrap();
        assert_eq!(e.arr_get(a, 0).unwrap(), Value::Int(2));
        assert_eq!(e.arr_get(a, 2).unwrap(), Value::Int(6));
    }

    #[test]
    fn test_generated_for_each() {
        let mut e = gen();
        let a = e.int_arr("a", vec![1, 2, 3]).unwrap();
        e.for_each(a, |e, slot| {
            let doubled = slot.ex().mul(2)?;
            e.slot_set(&slot, doubled)
        })
        .unwrap();
        assert_eq!(
            e.output(),
            &[
                "%_for_idx_[0] := 0",
                "while(%_for_idx_[0] < 3)",
                "%a[%_for_idx_[0]] := %a[%_for_idx_[0]] * 2",
                "%_for_idx_[0] := %_for_idx_[0] + 1",
                "end while",
            ]
        );
    }

    #[test]
    fn test_for_each_enum_passes_index() {
        let mut e = run();
        let a = e.int_arr("a", vec![0, 0, 0]).unwrap();
        e.for_each_enum(a, |e, idx, slot| {
            let v = idx.mul(10)?;
            e.slot_set(&slot, v)
        })
        .unwrap();
        assert_eq!(e.arr_get(a, 2).unwrap(), Value::Int(20));
    }

    #[test]
    fn test_while_interpreted() {
        let mut e = run();
        let n = e.int_var("n", 0).unwrap();
        e.while_(|_| n.ex().lt(5), |e| e.add_assign(n, 1)).unwrap();
        assert_eq!(e.get(n), Value::Int(5));
    }

    #[test]
    fn test_while_generated_emits_head_once() {
        let mut e = gen();
        let n = e.int_var("n", 0).unwrap();
        e.while_(|_| n.ex().lt(5), |e| e.add_assign(n, 1)).unwrap();
        assert_eq!(
            e.output(),
            &["while($n < 5)", "$n := $n + 1", "end while"]
        );
    }

    #[test]
    fn test_while_false_condition_still_emits_head() {
        let mut e = gen();
        let n = e.int_var("n", 9).unwrap();
        e.while_(|_| n.ex().lt(5), |e| e.add_assign(n, 1)).unwrap();
        assert_eq!(e.output(), &["while($n < 5)", "end while"]);
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut e = run();
        let res = e.for_range_step(0, 5, 0, |_, _| Ok(()));
        assert!(matches!(res, Err(EngineError::TypeMismatch(_))));
    }
}
