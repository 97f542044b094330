//! Script-level front end over the kscript engine.
//!
//! Wraps a host description into a [`Script`] that can be executed
//! interpreted or compiled into a bucketed [`GeneratedScript`].

pub mod script;

pub use script::{Block, GeneratedScript, Script, ScriptOptions};

pub use kscript_core::{Engine, EngineOptions};
pub use kscript_types::{EngineError, EngineResult, Mode};
