//! Shared types for the kscript engine.
//!
//! Everything the engine crates agree on lives here: the primitive
//! [`Value`] kinds of the target language, the [`Mode`] an engine runs
//! under, the pinned target arithmetic rules, and the error taxonomy.

pub mod error;
pub mod value;

pub use error::{EngineError, EngineResult, Signal};
pub use value::{floor_div, floor_mod, PrimType, Value};

use serde::{Deserialize, Serialize};

/// Evaluation mode of an engine, fixed for the lifetime of a run.
///
/// In `Interpreted` mode every construct computes concrete values and
/// acts as the test oracle; in `Generate` mode the same constructs
/// append target-language text to the output sink instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Interpreted,
    Generate,
}

impl Mode {
    /// True when the engine is emitting target text.
    pub fn is_generate(self) -> bool {
        matches!(self, Mode::Generate)
    }
}
