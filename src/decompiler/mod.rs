//! # Forgescript Decompiler Annotation
//!
//! Reconstructs symbolic meaning for raw literal values in disassembled
//! bytecode. A declarative macro-type system, driven by external JSON
//! configuration, relabels opaque literals (`0` becomes `Direction.Right`)
//! at their syntactic positions: variable assignments, call arguments, and
//! return values.
//!
//! ## Usage
//!
//! ```
//! use forgescript::decompiler::{Annotator, MacroRegistry};
//! use forgescript::decompiler::macro_types::LiteralValue;
//!
//! # fn main() -> forgescript::Result<()> {
//! let registry = MacroRegistry::from_json(r#"{
//!     "Types": {
//!         "General": {
//!             "Direction": {
//!                 "MacroType": "Enum",
//!                 "Name": "Direction",
//!                 "Values": {"0": "Right", "1": "Up"}
//!             }
//!         }
//!     },
//!     "GlobalNames": {"Variables": {"dir": "Direction"}}
//! }"#)?;
//!
//! let annotator = Annotator::new(std::sync::Arc::new(registry));
//! let label = annotator.annotate_assignment(None, "dir", &LiteralValue::Int(0));
//! assert_eq!(label.as_deref(), Some("Direction.Right"));
//! # Ok(())
//! # }
//! ```

pub mod macro_types;
pub mod preset;
pub mod registry;

pub use macro_types::{LiteralValue, MacroCondition, MacroType, ResolveContext};
pub use registry::{AnnotationConfig, MacroRegistry, MacroTypeConfig, MacroTypeRef, NameSetConfig};

use std::sync::Arc;

/// Literal relabeler over a shared read-only registry
///
/// One annotator may serve many decompiler workers concurrently; the registry
/// is immutable after construction and needs no locking.
#[derive(Debug, Clone)]
pub struct Annotator {
    registry: Arc<MacroRegistry>,
}

impl Annotator {
    /// Creates an annotator over a built registry
    pub fn new(registry: Arc<MacroRegistry>) -> Self {
        Annotator { registry }
    }

    /// The registry this annotator reads from
    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    /// Relabels a literal assigned to `variable`, if a rule matches
    pub fn annotate_assignment(
        &self,
        code_entry: Option<&str>,
        variable: &str,
        value: &LiteralValue,
    ) -> Option<String> {
        let ty = self.registry.variable_type(code_entry, variable)?;
        let ctx = ResolveContext {
            code_entry,
            assignment_target: Some(variable),
            ..Default::default()
        };
        ty.resolve(value, &ctx)
    }

    /// Relabels a literal passed as argument `index` of a call to `function`
    pub fn annotate_call_argument(
        &self,
        code_entry: Option<&str>,
        function: &str,
        index: usize,
        value: &LiteralValue,
    ) -> Option<String> {
        let ty = self.registry.function_argument_type(code_entry, function)?;
        let ctx = ResolveContext {
            code_entry,
            enclosing_function: Some(function),
            argument_index: Some(index),
            ..Default::default()
        };
        ty.resolve(value, &ctx)
    }

    /// Relabels a literal returned from `function`
    pub fn annotate_return(
        &self,
        code_entry: Option<&str>,
        function: &str,
        value: &LiteralValue,
    ) -> Option<String> {
        let ty = self.registry.function_return_type(code_entry, function)?;
        let ctx = ResolveContext {
            code_entry,
            enclosing_function: Some(function),
            ..Default::default()
        };
        ty.resolve(value, &ctx)
    }

    /// Display-only argument names configured for a code entry
    pub fn named_arguments(&self, code_entry: &str) -> Option<&[String]> {
        self.registry.named_arguments(code_entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator(json: &str) -> Annotator {
        Annotator::new(Arc::new(MacroRegistry::from_json(json).unwrap()))
    }

    #[test]
    fn test_unmatched_literal_renders_unchanged() {
        let a = annotator(r#"{}"#);
        assert_eq!(
            a.annotate_assignment(None, "dir", &LiteralValue::Int(0)),
            None
        );
    }

    #[test]
    fn test_function_args_annotation() {
        let a = annotator(
            r#"{
                "Types": {
                    "General": {
                        "MoveArgs": {
                            "MacroType": "FunctionArgs",
                            "Arguments": [
                                {"MacroType": "Enum", "Name": "Direction", "Values": {"0": "Right"}},
                                {"MacroType": "None"}
                            ]
                        }
                    }
                },
                "GlobalNames": {"FunctionArguments": {"move_towards": "MoveArgs"}}
            }"#,
        );

        assert_eq!(
            a.annotate_call_argument(None, "move_towards", 0, &LiteralValue::Int(0)),
            Some("Direction.Right".to_string())
        );
        assert_eq!(
            a.annotate_call_argument(None, "move_towards", 1, &LiteralValue::Int(0)),
            None
        );
        assert_eq!(
            a.annotate_call_argument(None, "unknown_fn", 0, &LiteralValue::Int(0)),
            None
        );
    }

    #[test]
    fn test_return_annotation() {
        let a = annotator(
            r#"{
                "Types": {
                    "General": {
                        "Status": {"MacroType": "Constants", "Values": {"-1": "STATUS_ERROR"}}
                    }
                },
                "GlobalNames": {"FunctionReturns": {"get_status": "Status"}}
            }"#,
        );
        assert_eq!(
            a.annotate_return(None, "get_status", &LiteralValue::Int(-1)),
            Some("STATUS_ERROR".to_string())
        );
    }
}
