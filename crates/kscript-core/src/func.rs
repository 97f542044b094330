//! Functions and callbacks.
//!
//! The target language dispatches through named callbacks and calls
//! user functions with a bare `call`, no arguments and no return
//! value; data moves through declared entities or a
//! [`crate::frame::CallStack`]. A function is defined once: in
//! generation mode its body runs immediately under a sink redirect to
//! capture its text, in interpreted mode the body closure is kept and
//! executed at every call site, which is what makes recursion work.
//!
//! Definitions must happen at the top level. Capturing a body while
//! another capture is open is a [`kscript_types::EngineError::SinkBusy`].

use std::rc::Rc;

use kscript_types::{EngineError, EngineResult};

use crate::engine::{Engine, NamedBlock};

type Body = Rc<dyn Fn(&mut Engine) -> EngineResult<()>>;

pub(crate) struct FunctionDef {
    pub(crate) name: String,
    pub(crate) rendered: String,
    pub(crate) body: Body,
    pub(crate) lines: Vec<String>,
}

impl Engine {
    /// Define a callback block. Runs the body now: under generation
    /// its lines are captured for the callback bucket, interpreted it
    /// simply executes.
    pub fn callback<F>(&mut self, name: &str, body: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Engine) -> EngineResult<()>,
    {
        if self.callbacks.iter().any(|c| c.name == name) {
            return Err(EngineError::DuplicateName(name.to_string()));
        }
        self.stmt_gate()?;
        let lines = if self.is_generate() {
            self.sink.set_redirect()?;
            let res = body(self);
            let lines = self.sink.release();
            res?;
            lines
        } else {
            body(self)?;
            Vec::new()
        };
        self.callbacks.push(NamedBlock {
            name: name.to_string(),
            lines,
        });
        Ok(())
    }

    /// Define a named function. The body is registered before it runs
    /// so it can call itself.
    pub fn function<F>(&mut self, name: &str, body: F) -> EngineResult<()>
    where
        F: Fn(&mut Engine) -> EngineResult<()> + 'static,
    {
        self.stmt_gate()?;
        let rendered = self.register_plain(name)?;
        let body: Body = Rc::new(body);
        let runner = Rc::clone(&body);
        self.functions.push(FunctionDef {
            name: name.to_string(),
            rendered,
            body,
            lines: Vec::new(),
        });
        if self.is_generate() {
            if let Err(err) = self.sink.set_redirect() {
                self.functions.pop();
                return Err(err);
            }
            let res = runner(self);
            let lines = self.sink.release();
            if let Err(err) = res {
                self.functions.pop();
                return Err(err);
            }
            if let Some(def) = self.functions.last_mut() {
                def.lines = lines;
            }
        }
        Ok(())
    }

    /// Call a previously defined function. Emits `call name` under
    /// generation; runs the stored body interpreted.
    pub fn call(&mut self, name: &str) -> EngineResult<()> {
        self.stmt_gate()?;
        let def = self
            .functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                EngineError::OrderingError(format!("call of undefined function \"{name}\""))
            })?;
        if self.is_generate() {
            let line = format!("call {}", def.rendered);
            self.put_raw(line);
            Ok(())
        } else {
            let body = Rc::clone(&def.body);
            body(self)
        }
    }
}
