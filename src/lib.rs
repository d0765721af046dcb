//! # Forgescript - Compiler Core for a Stack-Based Game Scripting Language
//!
//! Symbol resolution and bytecode emission for a dynamically typed scripting
//! language embedded in a game engine, plus decompiler support for
//! relabeling raw literals with symbolic names from external configuration.
//!
//! ## Features
//!
//! - **Function scope trees** - nested function/closure scopes with
//!   forward-referencing function declarations and two selectable
//!   name-resolution policies
//! - **Deferred patching** - stack-machine instructions whose variable,
//!   function, string, and branch-offset operands are bound once the full
//!   scope tree and call graph are known
//! - **Macro types** - declarative, composable literal-relabeling rules
//!   (`Enum`, `Constants`, `Union`, `Intersect`, `Match`, `ArrayInit`,
//!   `FunctionArgs`) loaded from JSON and validated eagerly
//! - **Parallel batches** - independent code entries compile on a Rayon
//!   worker pool with per-entry failure isolation
//!
//! ## Architecture
//!
//! ```text
//! AST (external) → CompileContext → ScopeArena + CodeBuilder → instructions
//! bytecode (external) → Annotator + MacroRegistry → relabeled literals
//! ```
//!
//! Token grammar, AST shapes, the asset-container format, and front ends are
//! external collaborators; this crate implements the contracts they drive.
//!
//! ## Quick Start
//!
//! Compile-side: drive a [`CompileContext`] per code entry.
//!
//! ```
//! use std::sync::Arc;
//! use forgescript::{BuiltinTable, CompileContext, CompileSettings};
//!
//! # fn main() -> forgescript::Result<()> {
//! let builtins = Arc::new(BuiltinTable::with_defaults());
//! let mut ctx = CompileContext::new("gml_Script_hello", CompileSettings::default(), builtins);
//! ctx.builder_mut().push_int16(42);
//! ctx.builder_mut().ret(forgescript::compiler::DataType::Int16);
//! let instructions = ctx.finish()?;
//! assert_eq!(instructions.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! Decompile-side: build a [`MacroRegistry`] once, share it read-only.
//!
//! ```
//! use std::sync::Arc;
//! use forgescript::{Annotator, LiteralValue, MacroRegistry};
//!
//! # fn main() -> forgescript::Result<()> {
//! let registry = MacroRegistry::from_json(r#"{
//!     "Types": {"General": {"Direction": {
//!         "MacroType": "Enum", "Name": "Direction",
//!         "Values": {"0": "Right", "1": "Up"}
//!     }}},
//!     "GlobalNames": {"Variables": {"dir": "Direction"}}
//! }"#)?;
//! let annotator = Annotator::new(Arc::new(registry));
//! let label = annotator.annotate_assignment(None, "dir", &LiteralValue::Int(0));
//! assert_eq!(label.as_deref(), Some("Direction.Right"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure renders one line with best-available position context via
//! [`Error::generate_message`], degrading gracefully when no position is
//! available. Configuration problems fail at registry construction, never at
//! resolution time.

/// Version of the Forgescript crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod decompiler;
pub mod error;
pub mod parallel;

// Re-export main types
pub use compiler::{
    BuiltinTable, CodeBuilder, CompileContext, CompileSettings, FunctionEntry, Instruction,
    ScopeArena, ScopeId,
};
pub use decompiler::{Annotator, LiteralValue, MacroRegistry, MacroType};
pub use error::{Error, Result, SourcePositions};
pub use parallel::{compile_batch, BatchConfig, BatchReport};
