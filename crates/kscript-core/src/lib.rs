//! Dual-mode compiler engine for a sampler-instrument scripting
//! target.
//!
//! Host code describes an instrument script through one [`Engine`]:
//! declarations, deferred [`Expr`] arithmetic, structured control
//! flow, loops and emulated call frames. The same description runs in
//! two modes. `Interpreted` executes it concretely and serves as the
//! test oracle; `Generate` lowers it to the target language's text,
//! line by line, through the output [`Sink`].

pub mod engine;
pub mod expr;
pub mod flow;
pub mod frame;
mod func;
pub mod loops;
pub mod names;
pub mod sink;

pub use engine::{ArrVar, Engine, EngineOptions, NamedBlock, Var};
pub use expr::{BinOp, Expr, UnaryOp};
pub use frame::{CallStack, FrameArg, FrameVar, FrameVars};
pub use loops::{ArrSlot, LOOP_POOL_SLOTS};
pub use names::{compact_name, NameRegistry, RegisteredName};
pub use sink::Sink;

pub use kscript_types::{EngineError, EngineResult, Mode, PrimType, Signal, Value};
