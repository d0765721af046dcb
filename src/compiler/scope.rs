//! Function scope tree - hierarchical symbol tables per function/script/event
//!
//! Scopes are stored in an arena owned by the compile context; child scopes
//! hold a non-owning parent index used for lookup only. Functions may be
//! referenced before their bodies compile, so declaration and resolution are
//! split: a name is forward-declared first and its entry assigned exactly
//! once, later.

use std::collections::{HashMap, HashSet};

use crate::compiler::builder::InstrRef;
use crate::compiler::CompileSettings;
use crate::error::{Error, Result};

/// Index of a scope within its [`ScopeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// A resolved function known to the compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    /// Function name as referenced from scripts
    pub name: String,
    /// Identifier within the compiled asset bundle
    pub id: u32,
    /// Declared argument count
    pub argument_count: usize,
}

/// Declaration state of a function name within one scope
///
/// Explicit sum type instead of ambient nullable state: a name is either
/// forward-declared and still unassigned, or resolved to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FunctionSlot {
    /// Declared ahead of its body; no entry assigned yet
    Forward,
    /// Declaration filled with its compiled entry
    Resolved(FunctionEntry),
}

/// One control-flow frame open during compilation of a scope
///
/// Break/continue/finally branches are emitted unpatched while the frame is
/// open and bound to real offsets when it closes.
#[derive(Debug, Clone, Default)]
pub struct ControlFlowFrame {
    /// What construct opened this frame
    pub kind: ControlFlowKind,
    /// Branches to patch to the frame's exit address
    pub break_patches: Vec<InstrRef>,
    /// Branches to patch to the frame's continue address
    pub continue_patches: Vec<InstrRef>,
    /// Bookkeeping local id for try/finally lowering, if this is a try frame
    pub try_variable_id: Option<u32>,
}

/// Control-flow construct kinds that open a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlowKind {
    /// while/for/repeat loop body
    #[default]
    Loop,
    /// with-block body (instance iteration)
    With,
    /// try body whose exits must run the finally block first
    TryFinally,
}

/// Symbol tables for one function, script, or event scope
#[derive(Debug, Clone)]
pub struct FunctionScope {
    /// Parent scope index (None for a root scope); lookup only, non-owning
    parent: Option<ScopeId>,
    /// True for function/closure scopes, false for script/event roots
    is_function: bool,
    /// Locals in declaration order, used for slot assignment
    locals: Vec<String>,
    /// Fast membership check mirroring `locals`
    local_names: HashSet<String>,
    /// Per-definition static variables, separate namespace from locals
    statics: HashSet<String>,
    /// Argument name to positional index
    arguments: HashMap<String, usize>,
    /// Functions declared in this scope
    functions: HashMap<String, FunctionSlot>,
    /// Open control-flow frames, innermost last
    control_flow: Vec<ControlFlowFrame>,
    /// Sequence source for anonymous array-owner ids in this scope
    array_owner_counter: i64,
}

impl FunctionScope {
    fn new(parent: Option<ScopeId>, is_function: bool) -> Self {
        FunctionScope {
            parent,
            is_function,
            locals: Vec::new(),
            local_names: HashSet::new(),
            statics: HashSet::new(),
            arguments: HashMap::new(),
            functions: HashMap::new(),
            control_flow: Vec::new(),
            array_owner_counter: 0,
        }
    }
}

/// Arena owning every scope of one code entry
///
/// Created with a root script scope; function scopes are pushed beneath it as
/// the compile context walks the source. Never shared across code entries.
#[derive(Debug, Clone)]
pub struct ScopeArena {
    scopes: Vec<FunctionScope>,
}

impl ScopeArena {
    /// Creates an arena holding a single root script scope
    pub fn new() -> Self {
        ScopeArena {
            scopes: vec![FunctionScope::new(None, false)],
        }
    }

    /// Returns the root scope id
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Adds a child scope beneath `parent` and returns its id
    pub fn push_child(&mut self, parent: ScopeId, is_function: bool) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(FunctionScope::new(Some(parent), is_function));
        id
    }

    /// Returns the parent of `scope`, if it has one
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    /// True if `scope` is a function/closure scope rather than a script root
    pub fn is_function_scope(&self, scope: ScopeId) -> bool {
        self.scopes[scope.0].is_function
    }

    // =========================================================================
    // LOCALS, STATICS, ARGUMENTS
    // =========================================================================

    /// Declares a local variable; returns whether it was newly declared
    ///
    /// First declaration wins; redeclaring is not an error, the call just
    /// reports false and the local list is unchanged.
    pub fn declare_local(&mut self, scope: ScopeId, name: &str) -> bool {
        let s = &mut self.scopes[scope.0];
        if s.local_names.contains(name) {
            return false;
        }
        s.local_names.insert(name.to_string());
        s.locals.push(name.to_string());
        true
    }

    /// Declares a static variable; returns whether it was newly declared
    pub fn declare_static(&mut self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.0].statics.insert(name.to_string())
    }

    /// Bulk-assigns argument names to positional indices
    ///
    /// Argument names shadow outer locals when referenced.
    pub fn declare_arguments<I, S>(&mut self, scope: ScopeId, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let s = &mut self.scopes[scope.0];
        for (index, name) in names.into_iter().enumerate() {
            s.arguments.insert(name.into(), index);
        }
    }

    /// Locals of `scope` in declaration order (slot order)
    pub fn locals(&self, scope: ScopeId) -> &[String] {
        &self.scopes[scope.0].locals
    }

    /// Number of locals declared in `scope`
    pub fn local_count(&self, scope: ScopeId) -> usize {
        self.scopes[scope.0].locals.len()
    }

    /// True if `name` is a local of `scope` itself
    pub fn is_local_declared(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.0].local_names.contains(name)
    }

    /// True if `name` is a static of `scope` itself
    pub fn is_static_declared(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.0].statics.contains(name)
    }

    /// Positional index of argument `name`, if declared in `scope`
    pub fn try_get_argument_index(&self, scope: ScopeId, name: &str) -> Option<usize> {
        self.scopes[scope.0].arguments.get(name).copied()
    }

    // =========================================================================
    // FUNCTION DECLARATION AND RESOLUTION
    // =========================================================================

    /// Forward-declares a function name; false if already present in `scope`
    pub fn try_declare_function(&mut self, scope: ScopeId, name: &str) -> bool {
        let s = &mut self.scopes[scope.0];
        if s.functions.contains_key(name) {
            return false;
        }
        s.functions.insert(name.to_string(), FunctionSlot::Forward);
        true
    }

    /// Fills a previously forward-declared function with its entry
    ///
    /// Errors if the name was never declared in `scope` or was already
    /// assigned; each declaration is assigned exactly once.
    pub fn assign_function_entry(
        &mut self,
        scope: ScopeId,
        name: &str,
        entry: FunctionEntry,
    ) -> Result<()> {
        let s = &mut self.scopes[scope.0];
        match s.functions.get_mut(name) {
            Some(slot @ FunctionSlot::Forward) => {
                *slot = FunctionSlot::Resolved(entry);
                Ok(())
            }
            Some(FunctionSlot::Resolved(_)) => Err(Error::compiler(format!(
                "function \"{}\" was already assigned an entry",
                name
            ))),
            None => Err(Error::compiler(format!(
                "cannot assign entry for undeclared function \"{}\"",
                name
            ))),
        }
    }

    /// Looks up a resolved function entry by name
    ///
    /// Strictly local unless the settings enable the newer upward resolution
    /// policy, in which case an absent name recurses to the parent and the
    /// nearest ancestor's entry wins. A still-forward declaration resolves to
    /// nothing either way.
    pub fn try_get_declared_function(
        &self,
        settings: &CompileSettings,
        scope: ScopeId,
        name: &str,
    ) -> Option<&FunctionEntry> {
        let s = &self.scopes[scope.0];
        match s.functions.get(name) {
            Some(FunctionSlot::Resolved(entry)) => Some(entry),
            Some(FunctionSlot::Forward) => None,
            None if settings.new_function_resolution => s
                .parent
                .and_then(|p| self.try_get_declared_function(settings, p, name)),
            None => None,
        }
    }

    /// True if `name` is declared in `scope` or any ancestor
    pub fn is_function_declared(&self, scope: ScopeId, name: &str) -> bool {
        let s = &self.scopes[scope.0];
        if s.functions.contains_key(name) {
            return true;
        }
        match s.parent {
            Some(p) => self.is_function_declared(p, name),
            None => false,
        }
    }

    /// True if `name` is declared in `scope` itself, ignoring ancestors
    pub fn is_function_declared_immediately(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.0].functions.contains_key(name)
    }

    // =========================================================================
    // CONTROL FLOW FRAMES
    // =========================================================================

    /// Opens a control-flow frame on `scope`
    pub fn push_control_flow(&mut self, scope: ScopeId, frame: ControlFlowFrame) {
        self.scopes[scope.0].control_flow.push(frame);
    }

    /// Closes the innermost control-flow frame of `scope`
    pub fn pop_control_flow(&mut self, scope: ScopeId) -> Option<ControlFlowFrame> {
        self.scopes[scope.0].control_flow.pop()
    }

    /// Innermost open frame of `scope`, for recording break/continue patches
    pub fn current_control_flow_mut(&mut self, scope: ScopeId) -> Option<&mut ControlFlowFrame> {
        self.scopes[scope.0].control_flow.last_mut()
    }

    /// Number of frames still open on `scope`
    pub fn control_flow_depth(&self, scope: ScopeId) -> usize {
        self.scopes[scope.0].control_flow.len()
    }

    /// Next sequence value for anonymous array-owner ids in `scope`
    ///
    /// Feeds the code builder's owner-id generator when an array-producing
    /// expression has no associated variable name.
    pub fn next_array_owner_sequence(&mut self, scope: ScopeId) -> i64 {
        let s = &mut self.scopes[scope.0];
        let value = s.array_owner_counter;
        s.array_owner_counter += 1;
        value
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}
