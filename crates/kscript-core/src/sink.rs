//! Line-oriented output sink.
//!
//! Every piece of generated target text flows through one [`Sink`].
//! Besides appending, the sink supports temporary redirection into a
//! side buffer (used to capture callback and function bodies), a
//! blocked flag that silently swallows appends (used by loops to
//! replay iterations without duplicating text), a one-shot armed
//! error, and a one-shot hook that the engine fires ahead of the next
//! statement.

use kscript_types::{EngineError, EngineResult};

use crate::engine::Engine;

/// One-shot callback fired by the engine before the next statement.
pub type SinkHook = Box<dyn FnMut(&mut Engine) -> EngineResult<()>>;

/// Accumulates generated lines for one compilation.
#[derive(Default)]
pub struct Sink {
    lines: Vec<String>,
    redirect: Option<Vec<String>>,
    blocked: bool,
    pending: Option<EngineError>,
    hook: Option<SinkHook>,
}

impl Sink {
    pub fn new() -> Self {
        Sink::default()
    }

    /// Append a line to the active buffer. Silently dropped while the
    /// sink is locked.
    pub fn push_line(&mut self, line: impl Into<String>) {
        if self.blocked {
            return;
        }
        match &mut self.redirect {
            Some(side) => side.push(line.into()),
            None => self.lines.push(line.into()),
        }
    }

    /// Remove and return the most recent line of the active buffer.
    pub fn pop(&mut self) -> Option<String> {
        match &mut self.redirect {
            Some(side) => side.pop(),
            None => self.lines.pop(),
        }
    }

    /// Redirect subsequent appends into a fresh side buffer.
    pub fn set_redirect(&mut self) -> EngineResult<()> {
        if self.redirect.is_some() {
            return Err(EngineError::SinkBusy);
        }
        self.redirect = Some(Vec::new());
        Ok(())
    }

    /// End a redirection and hand back the captured lines.
    pub fn release(&mut self) -> Vec<String> {
        self.redirect.take().unwrap_or_default()
    }

    /// Swallow all appends until [`Sink::unlock`].
    pub fn lock(&mut self) {
        self.blocked = true;
    }

    pub fn unlock(&mut self) {
        self.blocked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.blocked
    }

    /// Arm an error that the next statement gate will raise.
    pub fn arm_error(&mut self, err: EngineError) {
        self.pending = Some(err);
    }

    pub fn clear_error(&mut self) {
        self.pending = None;
    }

    pub fn take_error(&mut self) -> Option<EngineError> {
        self.pending.take()
    }

    /// Arm a one-shot hook fired ahead of the next statement.
    pub fn arm_hook(&mut self, hook: SinkHook) {
        self.hook = Some(hook);
    }

    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    pub fn take_hook(&mut self) -> Option<SinkHook> {
        self.hook.take()
    }

    /// Lines of the main buffer, in emission order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Drain the main buffer.
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// Drop all buffered state. The sink is reusable afterwards.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.redirect = None;
        self.blocked = false;
        self.pending = None;
        self.hook = None;
    }
}
