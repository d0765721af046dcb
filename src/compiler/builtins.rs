//! Builtin lookup table - runtime-engine-defined functions and variables
//!
//! Consumed interface: the engine predefines these names; the compiler only
//! queries arity bounds, global-ness, and settability to classify bare
//! identifiers. A small default set ships for tests and tooling; front ends
//! load the full per-engine table.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Arity bounds and classification of one builtin function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFunction {
    /// Minimum accepted argument count
    pub min_arguments: usize,
    /// Maximum accepted argument count; None for variadic
    pub max_arguments: Option<usize>,
    /// Callable as a bare global name
    pub is_global: bool,
}

/// Classification of one builtin variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinVariable {
    /// Whether scripts may assign to it
    pub settable: bool,
    /// Global rather than per-instance
    pub is_global: bool,
}

lazy_static! {
    static ref DEFAULT_FUNCTIONS: Vec<(&'static str, BuiltinFunction)> = vec![
        ("array_length", BuiltinFunction { min_arguments: 1, max_arguments: Some(1), is_global: true }),
        ("array_create", BuiltinFunction { min_arguments: 1, max_arguments: Some(2), is_global: true }),
        ("string", BuiltinFunction { min_arguments: 1, max_arguments: None, is_global: true }),
        ("real", BuiltinFunction { min_arguments: 1, max_arguments: Some(1), is_global: true }),
        ("instance_destroy", BuiltinFunction { min_arguments: 0, max_arguments: Some(2), is_global: true }),
        ("show_debug_message", BuiltinFunction { min_arguments: 1, max_arguments: None, is_global: true }),
    ];
    static ref DEFAULT_VARIABLES: Vec<(&'static str, BuiltinVariable)> = vec![
        ("x", BuiltinVariable { settable: true, is_global: false }),
        ("y", BuiltinVariable { settable: true, is_global: false }),
        ("id", BuiltinVariable { settable: false, is_global: false }),
        ("sprite_index", BuiltinVariable { settable: true, is_global: false }),
        ("image_speed", BuiltinVariable { settable: true, is_global: false }),
        ("room", BuiltinVariable { settable: true, is_global: true }),
    ];
}

/// Name-indexed builtin functions and variables
///
/// Built once, shared read-only across every code entry of a batch.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTable {
    functions: HashMap<String, BuiltinFunction>,
    variables: HashMap<String, BuiltinVariable>,
}

impl BuiltinTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table seeded with the default engine entries
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (name, function) in DEFAULT_FUNCTIONS.iter() {
            table.functions.insert((*name).to_string(), function.clone());
        }
        for (name, variable) in DEFAULT_VARIABLES.iter() {
            table.variables.insert((*name).to_string(), variable.clone());
        }
        table
    }

    /// Registers a builtin function
    pub fn define_function(&mut self, name: impl Into<String>, function: BuiltinFunction) {
        self.functions.insert(name.into(), function);
    }

    /// Registers a builtin variable
    pub fn define_variable(&mut self, name: impl Into<String>, variable: BuiltinVariable) {
        self.variables.insert(name.into(), variable);
    }

    /// Looks up a builtin function by name
    pub fn function(&self, name: &str) -> Option<&BuiltinFunction> {
        self.functions.get(name)
    }

    /// Looks up a builtin variable by name
    pub fn variable(&self, name: &str) -> Option<&BuiltinVariable> {
        self.variables.get(name)
    }

    /// True if `name` is a builtin callable as a bare global function
    pub fn is_global_function(&self, name: &str) -> bool {
        self.functions.get(name).map(|f| f.is_global).unwrap_or(false)
    }

    /// True if scripts may assign to builtin variable `name`
    pub fn is_settable_variable(&self, name: &str) -> bool {
        self.variables.get(name).map(|v| v.settable).unwrap_or(false)
    }
}
