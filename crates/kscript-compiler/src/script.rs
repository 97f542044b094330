//! Whole-script assembly.
//!
//! A [`Script`] owns one host description and can replay it under
//! either mode: [`Script::run`] executes it interpreted and hands
//! back the engine for inspection, [`Script::compile`] generates the
//! target text and buckets it into a [`GeneratedScript`].

use kscript_core::{Engine, EngineOptions, NamedBlock};
use kscript_types::{EngineResult, Mode};
use serde::{Deserialize, Serialize};

/// Options applied to every engine a script creates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptOptions {
    /// Compact declared names to 5-character digest forms.
    pub compact_names: bool,
}

/// A named block of generated lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub lines: Vec<String>,
}

impl From<NamedBlock> for Block {
    fn from(b: NamedBlock) -> Self {
        Block {
            name: b.name,
            lines: b.lines,
        }
    }
}

/// The generated script, split into its three sections: the init
/// lines (declarations first, then top-level statements), callback
/// blocks, and function blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub init: Vec<String>,
    pub callbacks: Vec<Block>,
    pub functions: Vec<Block>,
}

impl GeneratedScript {
    /// Render the full script text: functions, then the init
    /// callback, then the remaining callbacks.
    pub fn render(&self) -> String {
        let mut out: Vec<String> = Vec::new();
        for f in &self.functions {
            out.push(format!("function {}", f.name));
            out.extend(f.lines.iter().cloned());
            out.push("end function".to_string());
        }
        out.push("on init".to_string());
        out.extend(self.init.iter().cloned());
        out.push("end on".to_string());
        for c in &self.callbacks {
            out.push(format!("on {}", c.name));
            out.extend(c.lines.iter().cloned());
            out.push("end on".to_string());
        }
        out.join("\n")
    }
}

/// One host description, replayable under both modes.
pub struct Script<F>
where
    F: Fn(&mut Engine) -> EngineResult<()>,
{
    main: F,
    options: ScriptOptions,
}

impl<F> Script<F>
where
    F: Fn(&mut Engine) -> EngineResult<()>,
{
    pub fn new(main: F) -> Self {
        Script {
            main,
            options: ScriptOptions::default(),
        }
    }

    pub fn with_options(main: F, options: ScriptOptions) -> Self {
        Script { main, options }
    }

    fn engine(&self, mode: Mode) -> Engine {
        Engine::with_options(EngineOptions {
            mode,
            compact_names: self.options.compact_names,
        })
    }

    /// Execute the description concretely and return the engine so
    /// callers can inspect the resulting state.
    pub fn run(&self) -> EngineResult<Engine> {
        let mut e = self.engine(Mode::Interpreted);
        (self.main)(&mut e)?;
        Ok(e)
    }

    /// Generate the target text and bucket it.
    pub fn compile(&self) -> EngineResult<GeneratedScript> {
        let mut e = self.engine(Mode::Generate);
        (self.main)(&mut e)?;
        let mut init = e.decl_lines();
        init.extend(e.take_output());
        let callbacks = e.callback_blocks().iter().cloned().map(Block::from).collect();
        let functions = e.function_blocks().into_iter().map(Block::from).collect();
        Ok(GeneratedScript {
            init,
            callbacks,
            functions,
        })
    }
}
