//! # Forgescript Compiler Core
//!
//! Symbol resolution and bytecode emission for a stack-based, dynamically
//! typed game scripting language.
//!
//! ## Architecture
//!
//! ```text
//! AST (external) → Scope Tree + Code Builder → patched instruction sequence
//! ```
//!
//! Token grammar and AST shapes live in external collaborators; this module
//! provides the contracts they drive: a per-entry [`CompileContext`] that
//! owns one [`ScopeArena`] and one [`CodeBuilder`], and finishes into an
//! instruction sequence ready for the container writer.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use forgescript::compiler::{CompileContext, CompileSettings};
//! use forgescript::compiler::builtins::BuiltinTable;
//!
//! # fn main() -> forgescript::Result<()> {
//! let builtins = Arc::new(BuiltinTable::with_defaults());
//! let mut ctx = CompileContext::new("gml_Object_player_Step", CompileSettings::default(), builtins);
//!
//! ctx.declare_local("dir");
//! ctx.builder_mut().push_int16(0);
//! let store = ctx.builder_mut().pop_variable_unpatched(
//!     forgescript::compiler::builder::DataType::Variable,
//!     forgescript::compiler::builder::DataType::Int16,
//!     forgescript::compiler::builder::InstanceKind::Local,
//! );
//! ctx.builder_mut().patch_variable(store, forgescript::compiler::builder::VariablePatch {
//!     name: "dir".to_string(),
//!     variable_instance: forgescript::compiler::builder::InstanceKind::Local,
//!     instruction_instance: forgescript::compiler::builder::InstanceKind::Local,
//!     is_builtin: false,
//!     keep_instance_type: false,
//! })?;
//! let instructions = ctx.finish()?;
//! assert_eq!(instructions.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod builtins;
pub mod scope;

pub use builder::{
    CodeBuilder, ComparisonKind, DataType, FunctionRef, InstanceKind, InstrRef, Instruction,
    Opcode, Operand, VariablePatch,
};
pub use builtins::{BuiltinFunction, BuiltinTable, BuiltinVariable};
pub use scope::{ControlFlowFrame, ControlFlowKind, FunctionEntry, FunctionScope, ScopeArena, ScopeId};

use std::sync::Arc;

use crate::error::{Error, Result};

/// Per-compile-unit settings
///
/// The single policy flag exists because two language generations differ on
/// whether unqualified function names resolve strictly locally or lexically
/// upward; the scope tree supports both without duplicating logic.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileSettings {
    /// Enable the newer upward function-name resolution policy
    pub new_function_resolution: bool,
}

/// Compilation driver for one code entry
///
/// Owns the scope tree and instruction builder of exactly one script, object
/// event, or other compiled unit. Entries never share mutable state, so a
/// batch may run one context per worker with no locking; the only shared
/// input is the read-only builtin table.
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// Name of the code entry being compiled
    name: String,
    settings: CompileSettings,
    scopes: ScopeArena,
    builder: CodeBuilder,
    /// Scope nesting path, root first
    scope_stack: Vec<ScopeId>,
    /// Source of unique indices for try/catch bookkeeping locals
    next_try_index: u32,
}

impl CompileContext {
    /// Creates a context for one code entry
    pub fn new(
        name: impl Into<String>,
        settings: CompileSettings,
        builtins: Arc<BuiltinTable>,
    ) -> Self {
        let scopes = ScopeArena::new();
        let root = scopes.root();
        CompileContext {
            name: name.into(),
            settings,
            scopes,
            builder: CodeBuilder::new(builtins),
            scope_stack: vec![root],
            next_try_index: 0,
        }
    }

    /// Name of the code entry being compiled
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The per-compile-unit settings
    pub fn settings(&self) -> CompileSettings {
        self.settings
    }

    /// Read access to the scope tree
    pub fn scopes(&self) -> &ScopeArena {
        &self.scopes
    }

    /// Mutable access to the scope tree
    pub fn scopes_mut(&mut self) -> &mut ScopeArena {
        &mut self.scopes
    }

    /// Read access to the instruction builder
    pub fn builder(&self) -> &CodeBuilder {
        &self.builder
    }

    /// Mutable access to the instruction builder
    pub fn builder_mut(&mut self) -> &mut CodeBuilder {
        &mut self.builder
    }

    /// The innermost scope currently being compiled
    pub fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack never empty")
    }

    /// Enters a nested function/closure scope and makes it current
    pub fn enter_function_scope(&mut self) -> ScopeId {
        let child = self.scopes.push_child(self.current_scope(), true);
        self.scope_stack.push(child);
        child
    }

    /// Leaves the current function scope
    ///
    /// Errors if called on the root scope or while control-flow frames are
    /// still open in the scope being left.
    pub fn exit_function_scope(&mut self) -> Result<()> {
        if self.scope_stack.len() == 1 {
            return Err(Error::compiler(format!(
                "cannot exit the root scope of \"{}\"",
                self.name
            )));
        }
        let leaving = self.current_scope();
        if self.scopes.control_flow_depth(leaving) != 0 {
            return Err(Error::compiler(format!(
                "function scope in \"{}\" closed with open control-flow frames",
                self.name
            )));
        }
        self.scope_stack.pop();
        Ok(())
    }

    /// Declares a local in the current scope; true if newly declared
    pub fn declare_local(&mut self, name: &str) -> bool {
        let scope = self.current_scope();
        self.scopes.declare_local(scope, name)
    }

    /// Declares a static in the current scope; true if newly declared
    pub fn declare_static(&mut self, name: &str) -> bool {
        let scope = self.current_scope();
        self.scopes.declare_static(scope, name)
    }

    /// Looks up a resolved function from the current scope under the
    /// configured resolution policy
    pub fn try_get_declared_function(&self, name: &str) -> Option<&FunctionEntry> {
        self.scopes
            .try_get_declared_function(&self.settings, self.current_scope(), name)
    }

    /// Unique id for the next compiler-synthesized try/catch local
    pub fn next_try_variable_id(&mut self) -> u32 {
        let index = self.next_try_index;
        self.next_try_index += 1;
        self.builder.generate_try_variable_id(index)
    }

    /// Finishes compilation of this entry
    ///
    /// Verifies every function scope was exited, no control-flow frame is
    /// dangling anywhere in the tree, and no instruction is left unpatched.
    /// Each violation aborts this entry only.
    pub fn finish(self) -> Result<Vec<Instruction>> {
        if self.scope_stack.len() != 1 {
            return Err(Error::compiler(format!(
                "code entry \"{}\" finished inside a nested function scope",
                self.name
            )));
        }
        if self.scopes.control_flow_depth(self.scopes.root()) != 0 {
            return Err(Error::compiler(format!(
                "code entry \"{}\" finished with open control-flow frames",
                self.name
            )));
        }
        let instructions = self.builder.finish().map_err(|cause| {
            Error::compiler_with_cause(
                format!("code entry \"{}\" failed to finalize", self.name),
                cause,
            )
        })?;
        tracing::debug!(
            entry = %self.name,
            instructions = instructions.len(),
            "code entry finalized"
        );
        Ok(instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CompileContext {
        CompileContext::new(
            "gml_Script_test",
            CompileSettings::default(),
            Arc::new(BuiltinTable::with_defaults()),
        )
    }

    #[test]
    fn test_scope_nesting() {
        let mut ctx = context();
        let root = ctx.current_scope();

        let inner = ctx.enter_function_scope();
        assert_ne!(inner, root);
        assert_eq!(ctx.scopes().parent(inner), Some(root));
        assert!(ctx.scopes().is_function_scope(inner));

        ctx.exit_function_scope().unwrap();
        assert_eq!(ctx.current_scope(), root);
        assert!(ctx.exit_function_scope().is_err());
    }

    #[test]
    fn test_try_variable_ids_are_sequential() {
        let mut ctx = context();
        assert_eq!(ctx.next_try_variable_id(), 0);
        assert_eq!(ctx.next_try_variable_id(), 1);
        assert_eq!(ctx.next_try_variable_id(), 2);
    }

    #[test]
    fn test_finish_rejects_unbalanced_scopes() {
        let mut ctx = context();
        ctx.enter_function_scope();
        assert!(ctx.finish().is_err());
    }

    #[test]
    fn test_finish_rejects_open_control_flow() {
        let mut ctx = context();
        let scope = ctx.current_scope();
        ctx.scopes_mut()
            .push_control_flow(scope, ControlFlowFrame::default());
        assert!(ctx.finish().is_err());
    }

    #[test]
    fn test_finish_wraps_unpatched_instruction_error() {
        let mut ctx = context();
        ctx.builder_mut().branch_unpatched();
        let err = ctx.finish().unwrap_err();
        match err {
            Error::Compiler { cause, .. } => assert!(cause.is_some()),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_function_lookup_threads_settings() {
        let mut ctx = CompileContext::new(
            "gml_Script_outer",
            CompileSettings {
                new_function_resolution: true,
            },
            Arc::new(BuiltinTable::with_defaults()),
        );
        let root = ctx.current_scope();
        ctx.scopes_mut().try_declare_function(root, "helper");
        ctx.scopes_mut()
            .assign_function_entry(
                root,
                "helper",
                FunctionEntry {
                    name: "helper".to_string(),
                    id: 11,
                    argument_count: 2,
                },
            )
            .unwrap();

        ctx.enter_function_scope();
        let found = ctx.try_get_declared_function("helper");
        assert_eq!(found.map(|e| e.id), Some(11));
    }
}
