//! Structured conditionals.
//!
//! The target language has no `elif`, so an if/else-if/else chain is
//! emitted as nested `else` + `if` pairs, each owing one `end if`. A
//! construct emits every terminator it owes on exit; a successor in
//! the same chain pops them back off the sink and re-emits the full
//! set when it closes. Chain bookkeeping lives on the engine as a
//! stack of branch-outcome vectors, and a one-shot sink hook retires
//! a chain when the next unrelated statement arrives.
//!
//! In interpreted mode a branch body runs only when it is taken; in
//! generation mode every body runs so its text is captured, and the
//! recorded outcomes only steer terminator bookkeeping.

use kscript_types::{EngineError, EngineResult, Signal};

use crate::engine::Engine;
use crate::expr::Expr;

const END_IF: &str = "end if";

impl Engine {
    /// Open an if-chain.
    pub fn if_<F>(&mut self, cond: Expr, body: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Engine) -> EngineResult<()>,
    {
        self.stmt_gate()?;
        let taken = cond.truth(self)?;
        if self.is_generate() {
            let head = format!("if({})", cond.expand(self));
            self.put_raw(head);
        }
        self.chains.push(vec![taken]);
        self.finish_branch(taken, 1, true, body)
    }

    /// Continue the open chain with another condition.
    pub fn else_if<F>(&mut self, cond: Expr, body: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Engine) -> EngineResult<()>,
    {
        let prior = self.open_chain("else if")?;
        let truth = cond.truth(self)?;
        let taken = prior.iter().all(|b| !b) && truth;
        if self.is_generate() {
            self.pop_terminators(prior.len(), "else if")?;
            self.put_raw("else");
            let head = format!("if({})", cond.expand(self));
            self.put_raw(head);
        }
        let mut entry = prior;
        entry.push(taken);
        let owed = entry.len();
        self.chains.push(entry);
        self.finish_branch(taken, owed, true, body)
    }

    /// Close the open chain with a default branch.
    pub fn else_<F>(&mut self, body: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Engine) -> EngineResult<()>,
    {
        let prior = self.open_chain("else")?;
        let taken = prior.iter().all(|b| !b);
        if self.is_generate() {
            self.pop_terminators(prior.len(), "else")?;
            self.put_raw("else");
        }
        self.finish_branch(taken, prior.len(), false, body)
    }

    /// Open a select over a concrete int subject. Statements inside
    /// the body but outside any case are rejected.
    pub fn select<F>(&mut self, subject: Expr, body: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Engine) -> EngineResult<()>,
    {
        self.stmt_gate()?;
        subject.value(self)?;
        if self.is_generate() {
            let head = format!("select({})", subject.expand(self));
            self.put_raw(head);
        }
        self.subjects.push(subject);
        let was_in_case = std::mem::replace(&mut self.in_case, false);
        self.sink.arm_error(stray_in_select());
        let res = body(self);
        self.sink.clear_error();
        self.subjects.pop();
        self.in_case = was_in_case;
        match res {
            Ok(()) => {
                if self.is_generate() {
                    self.put_raw("end select");
                }
                Ok(())
            }
            Err(EngineError::Signal(Signal::Break(mut ends))) => {
                // A loop break unwinding through the select still owes
                // the terminator; the absorbing loop flushes it.
                if self.is_generate() {
                    ends.push("end select".to_string());
                }
                Err(EngineError::Signal(Signal::Break(ends)))
            }
            Err(err) => Err(err),
        }
    }

    /// One arm of the innermost select.
    pub fn case<F>(&mut self, value: i64, body: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Engine) -> EngineResult<()>,
    {
        let subject = self
            .subjects
            .last()
            .cloned()
            .ok_or_else(|| EngineError::OrderingError("case outside a select".to_string()))?;
        if self.in_case {
            return Err(EngineError::OrderingError(
                "case nested directly inside another case".to_string(),
            ));
        }
        self.sink.clear_error();
        let taken = subject.value(self)? == kscript_types::Value::Int(value);
        if self.is_generate() {
            self.put_raw(format!("case({value})"));
        }
        self.in_case = true;
        let depth = self.chains.len();
        let res = if self.is_generate() || taken {
            absorb_skip(body(self))
        } else {
            Ok(())
        };
        self.sink.clear_hook();
        self.chains.truncate(depth);
        self.in_case = false;
        self.sink.arm_error(stray_in_select());
        res
    }

    /// Take the chain a continuation attaches to.
    fn open_chain(&mut self, what: &str) -> EngineResult<Vec<bool>> {
        self.sink.clear_hook();
        let prior = self.chains.pop().ok_or_else(|| {
            EngineError::OrderingError(format!("{what} without a preceding if"))
        })?;
        if let Some(err) = self.sink.take_error() {
            return Err(err);
        }
        Ok(prior)
    }

    /// Pop the terminators the predecessor emitted. While the sink is
    /// locked the predecessor emitted nothing, so there is nothing to
    /// pop.
    fn pop_terminators(&mut self, n: usize, what: &str) -> EngineResult<()> {
        if self.sink.is_locked() {
            return Ok(());
        }
        for _ in 0..n {
            match self.sink.pop() {
                Some(l) if l == END_IF => {}
                _ => {
                    return Err(EngineError::OrderingError(format!(
                        "{what} did not follow a closed if"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Run a branch body and close the construct: emit the owed
    /// terminators, clean dangling nested chains, and on `keep_chain`
    /// leave the chain armed for a successor.
    fn finish_branch<F>(
        &mut self,
        taken: bool,
        owed: usize,
        keep_chain: bool,
        body: F,
    ) -> EngineResult<()>
    where
        F: FnOnce(&mut Engine) -> EngineResult<()>,
    {
        // Depth including our own entry if we keep one.
        let depth = self.chains.len();
        let res = if self.is_generate() || taken {
            absorb_skip(body(self))
        } else {
            Ok(())
        };
        self.sink.clear_hook();
        self.chains.truncate(depth);
        match res {
            Ok(()) => {
                if self.is_generate() {
                    for _ in 0..owed {
                        self.put_raw(END_IF);
                    }
                }
                if keep_chain {
                    self.sink.arm_hook(Box::new(|e: &mut Engine| {
                        e.chains.pop();
                        Ok(())
                    }));
                }
                Ok(())
            }
            Err(EngineError::Signal(Signal::Break(mut ends))) => {
                if keep_chain {
                    self.chains.pop();
                }
                if self.is_generate() {
                    for _ in 0..owed {
                        ends.push(END_IF.to_string());
                    }
                }
                Err(EngineError::Signal(Signal::Break(ends)))
            }
            Err(err) => {
                if keep_chain {
                    self.chains.pop();
                }
                Err(err)
            }
        }
    }
}

fn absorb_skip(res: EngineResult<()>) -> EngineResult<()> {
    match res {
        Err(EngineError::Signal(Signal::SkipBlock)) => Ok(()),
        other => other,
    }
}

fn stray_in_select() -> EngineError {
    EngineError::OrderingError("statement inside select but outside any case".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kscript_types::{Mode, Value};

    fn gen() -> Engine {
        Engine::new(Mode::Generate)
    }

    fn run() -> Engine {
        Engine::new(Mode::Interpreted)
    }

    #[test]
    fn test_generated_if_else() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        e.if_(x.ex().gt(0).unwrap(), |e| e.assign(x, 1)).unwrap();
        e.else_(|e| e.assign(x, 2)).unwrap();
        assert_eq!(
            e.output(),
            &["if($x > 0)", "$x := 1", "else", "$x := 2", "end if"]
        );
    }

    #[test]
    fn test_generated_elif_nests_else_if() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        let y = e.int_var("y", 0).unwrap();
        e.if_(x.ex().eq(1).unwrap(), |e| e.assign(y, 1)).unwrap();
        e.else_if(x.ex().eq(2).unwrap(), |e| e.assign(y, 2)).unwrap();
        e.else_(|e| e.assign(y, 3)).unwrap();
        assert_eq!(
            e.output(),
            &[
                "if($x = 1)",
                "$y := 1",
                "else",
                "if($x = 2)",
                "$y := 2",
                "else",
                "$y := 3",
                "end if",
                "end if",
            ]
        );
    }

    #[test]
    fn test_interpreted_chain_takes_first_true_branch() {
        let mut e = run();
        let x = e.int_var("x", 2).unwrap();
        let y = e.int_var("y", 0).unwrap();
        e.if_(x.ex().eq(1).unwrap(), |e| e.assign(y, 1)).unwrap();
        e.else_if(x.ex().eq(2).unwrap(), |e| e.assign(y, 2)).unwrap();
        e.else_(|e| e.assign(y, 3)).unwrap();
        assert_eq!(e.get(y), Value::Int(2));
    }

    #[test]
    fn test_interpreted_else_skipped_after_taken_if() {
        let mut e = run();
        let x = e.int_var("x", 1).unwrap();
        let y = e.int_var("y", 0).unwrap();
        e.if_(x.ex().eq(1).unwrap(), |e| e.assign(y, 1)).unwrap();
        // This condition is also true, but the chain already matched.
        e.else_if(x.ex().gt(0).unwrap(), |e| e.assign(y, 2)).unwrap();
        e.else_(|e| e.assign(y, 3)).unwrap();
        assert_eq!(e.get(y), Value::Int(1));
    }

    #[test]
    fn test_else_without_if_is_rejected() {
        let mut e = run();
        let x = e.int_var("x", 0).unwrap();
        assert!(matches!(
            e.else_(|e| e.assign(x, 1)),
            Err(EngineError::OrderingError(_))
        ));
    }

    #[test]
    fn test_chain_retires_at_next_statement() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        e.if_(x.ex().gt(0).unwrap(), |e| e.assign(x, 1)).unwrap();
        e.assign(x, 5).unwrap();
        // The chain was consumed by the assignment's gate.
        assert!(matches!(
            e.else_(|e| e.assign(x, 2)),
            Err(EngineError::OrderingError(_))
        ));
    }

    #[test]
    fn test_nested_if_closes_before_outer_else() {
        let mut e = gen();
        let x = e.int_var("x", 0).unwrap();
        let y = e.int_var("y", 0).unwrap();
        e.if_(x.ex().gt(0).unwrap(), |e| {
            e.if_(y.ex().gt(0).unwrap(), |e| e.assign(y, 1))
        })
        .unwrap();
        e.else_(|e| e.assign(y, 2)).unwrap();
        assert_eq!(
            e.output(),
            &[
                "if($x > 0)",
                "if($y > 0)",
                "$y := 1",
                "end if",
                "else",
                "$y := 2",
                "end if",
            ]
        );
    }

    #[test]
    fn test_non_boolean_condition_rejected() {
        let mut e = run();
        let x = e.int_var("x", 1).unwrap();
        assert!(matches!(
            e.if_(x.ex(), |_| Ok(())),
            Err(EngineError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_generated_select_case() {
        let mut e = gen();
        let x = e.int_var("x", 1).unwrap();
        let y = e.int_var("y", 0).unwrap();
        e.select(x.ex(), |e| {
            e.case(1, |e| e.assign(y, 10))?;
            e.case(2, |e| e.assign(y, 20))
        })
        .unwrap();
        assert_eq!(
            e.output(),
            &[
                "select($x)",
                "case(1)",
                "$y := 10",
                "case(2)",
                "$y := 20",
                "end select",
            ]
        );
    }

    #[test]
    fn test_interpreted_select_runs_matching_case_only() {
        let mut e = run();
        let x = e.int_var("x", 2).unwrap();
        let y = e.int_var("y", 0).unwrap();
        e.select(x.ex(), |e| {
            e.case(1, |e| e.assign(y, 10))?;
            e.case(2, |e| e.assign(y, 20))?;
            e.case(3, |e| e.assign(y, 30))
        })
        .unwrap();
        assert_eq!(e.get(y), Value::Int(20));
    }

    #[test]
    fn test_statement_outside_case_is_rejected() {
        let mut e = gen();
        let x = e.int_var("x", 1).unwrap();
        let y = e.int_var("y", 0).unwrap();
        let res = e.select(x.ex(), |e| e.assign(y, 5));
        assert!(matches!(res, Err(EngineError::OrderingError(_))));
    }

    #[test]
    fn test_case_outside_select_is_rejected() {
        let mut e = gen();
        let y = e.int_var("y", 0).unwrap();
        assert!(matches!(
            e.case(1, |e| e.assign(y, 1)),
            Err(EngineError::OrderingError(_))
        ));
    }

    #[test]
    fn test_nested_case_is_rejected() {
        let mut e = gen();
        let x = e.int_var("x", 1).unwrap();
        let res = e.select(x.ex(), |e| e.case(1, |e| e.case(2, |_| Ok(()))));
        assert!(matches!(res, Err(EngineError::OrderingError(_))));
    }

    #[test]
    fn test_if_inside_case_is_allowed() {
        let mut e = gen();
        let x = e.int_var("x", 1).unwrap();
        let y = e.int_var("y", 0).unwrap();
        e.select(x.ex(), |e| {
            e.case(1, |e| {
                e.if_(y.ex().eq(0).unwrap(), |e| e.assign(y, 1))
            })
        })
        .unwrap();
        assert_eq!(
            e.output(),
            &[
                "select($x)",
                "case(1)",
                "if($y = 0)",
                "$y := 1",
                "end if",
                "end select",
            ]
        );
    }

    #[test]
    fn test_skip_block_stops_rest_of_branch() {
        let mut e = run();
        let x = e.int_var("x", 1).unwrap();
        let y = e.int_var("y", 0).unwrap();
        e.if_(x.ex().eq(1).unwrap(), |e| {
            e.assign(y, 1)?;
            Err(e.skip_block())
        })
        .unwrap();
        assert_eq!(e.get(y), Value::Int(1));
    }
}
