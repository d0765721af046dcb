//! Macro type registry - configuration loading and name-based lookup
//!
//! Built once per decompilation run, single-threaded, and read-only
//! afterward; concurrent queries from decompiler workers need no locking.
//! Every configuration problem (unknown field, undefined or cyclic named
//! reference, malformed composite, duplicate key) fails eagerly at
//! construction, never at resolution time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;

use crate::decompiler::macro_types::{MacroCondition, MacroType};
use crate::decompiler::preset;
use crate::error::{Error, Result};

/// Top-level annotation configuration document
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AnnotationConfig {
    /// Group name → type name → definition
    #[serde(rename = "Types", default)]
    pub types: HashMap<String, HashMap<String, MacroTypeConfig>>,
    /// Seed the built-in engine-wide enums/constants before these types
    #[serde(rename = "BasicPreset", default)]
    pub basic_preset: bool,
    /// Names of already-registered types this document intentionally replaces
    #[serde(rename = "Overrides", default)]
    pub overrides: Vec<String>,
    /// Globally named variables/arguments/returns
    #[serde(rename = "GlobalNames", default)]
    pub global_names: NameSetConfig,
    /// Per-code-entry overrides of the same three namespaces
    #[serde(rename = "CodeEntryNames", default)]
    pub code_entry_names: HashMap<String, NameSetConfig>,
    /// Code entry name → ordered display-only argument names
    #[serde(rename = "NamedArguments", default)]
    pub named_arguments: HashMap<String, Vec<String>>,
}

/// The three independent name-to-type namespaces
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct NameSetConfig {
    /// Variable name → type name
    #[serde(rename = "Variables", default)]
    pub variables: HashMap<String, String>,
    /// Function name → type name applied to its arguments
    #[serde(rename = "FunctionArguments", default)]
    pub function_arguments: HashMap<String, String>,
    /// Function name → type name applied to its return literal
    #[serde(rename = "FunctionReturns", default)]
    pub function_returns: HashMap<String, String>,
}

/// One macro type definition as written in the document
///
/// A single struct with an explicit `MacroType` discriminator rather than a
/// serde-tagged enum: unknown fields must be a hard parse failure, and
/// fields that do not belong to the named tag are rejected during
/// materialization as malformed composites.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroTypeConfig {
    /// Discriminator: Enum, Constants, Union, Intersect, Match, MatchNot,
    /// ArrayInit, FunctionArgs, or None
    #[serde(rename = "MacroType")]
    pub macro_type: String,
    /// Enum name (Enum only)
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    /// Value-to-label map (Enum, Constants)
    #[serde(rename = "Values", default)]
    pub values: Option<HashMap<String, String>>,
    /// Member list (Union, Intersect)
    #[serde(rename = "Members", default)]
    pub members: Option<Vec<MacroTypeRef>>,
    /// Wrapped rule (Match, MatchNot, ArrayInit)
    #[serde(rename = "Inner", default)]
    pub inner: Option<Box<MacroTypeRef>>,
    /// Condition kind: Function, Variable, or CodeEntry (Match, MatchNot)
    #[serde(rename = "ConditionType", default)]
    pub condition_type: Option<String>,
    /// Condition operand (Match, MatchNot)
    #[serde(rename = "ConditionValue", default)]
    pub condition_value: Option<String>,
    /// Positional argument rules (FunctionArgs)
    #[serde(rename = "Arguments", default)]
    pub arguments: Option<Vec<MacroTypeRef>>,
}

/// Reference to a macro type: a registered name or an inline definition
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MacroTypeRef {
    /// Name of a registered type
    Named(String),
    /// Inline anonymous definition
    Inline(Box<MacroTypeConfig>),
}

/// Resolved name-to-type maps for one scope (global or one code entry)
#[derive(Debug, Clone, Default)]
struct NameSet {
    variables: HashMap<String, Arc<MacroType>>,
    function_arguments: HashMap<String, Arc<MacroType>>,
    function_returns: HashMap<String, Arc<MacroType>>,
}

/// Process-wide macro type registry
///
/// Owns all registered [`MacroType`] instances; resolvers hold non-owning
/// name-based lookups into it.
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    types: HashMap<String, Arc<MacroType>>,
    global: NameSet,
    code_entries: HashMap<String, NameSet>,
    named_arguments: HashMap<String, Vec<String>>,
}

impl MacroRegistry {
    /// Builds a registry from a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AnnotationConfig = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("invalid annotation document: {}", e)))?;
        Self::from_config(config)
    }

    /// Builds a registry from an already parsed configuration
    pub fn from_config(config: AnnotationConfig) -> Result<Self> {
        Builder::new(&config)?.build(&config)
    }

    /// Looks up a registered type by name
    pub fn get_type(&self, name: &str) -> Option<&MacroType> {
        self.types.get(name).map(Arc::as_ref)
    }

    /// Number of registered types
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Type of a named variable, code-entry override first
    pub fn variable_type(&self, code_entry: Option<&str>, name: &str) -> Option<&MacroType> {
        self.lookup(code_entry, name, |set| &set.variables)
    }

    /// Type applied to arguments of a named function, override first
    pub fn function_argument_type(
        &self,
        code_entry: Option<&str>,
        name: &str,
    ) -> Option<&MacroType> {
        self.lookup(code_entry, name, |set| &set.function_arguments)
    }

    /// Type applied to the return literal of a named function, override first
    pub fn function_return_type(
        &self,
        code_entry: Option<&str>,
        name: &str,
    ) -> Option<&MacroType> {
        self.lookup(code_entry, name, |set| &set.function_returns)
    }

    /// Display-only argument names for a code entry
    pub fn named_arguments(&self, code_entry: &str) -> Option<&[String]> {
        self.named_arguments.get(code_entry).map(Vec::as_slice)
    }

    fn lookup<F>(&self, code_entry: Option<&str>, name: &str, select: F) -> Option<&MacroType>
    where
        F: Fn(&NameSet) -> &HashMap<String, Arc<MacroType>>,
    {
        if let Some(entry) = code_entry {
            if let Some(set) = self.code_entries.get(entry) {
                if let Some(ty) = select(set).get(name) {
                    return Some(ty.as_ref());
                }
            }
        }
        select(&self.global).get(name).map(Arc::as_ref)
    }
}

/// Single-use registry builder carrying materialization state
struct Builder<'a> {
    /// All named definitions from the document, flattened across groups
    definitions: HashMap<&'a str, &'a MacroTypeConfig>,
    /// Fully materialized types
    cache: HashMap<String, Arc<MacroType>>,
    /// Names currently being materialized, for cycle detection
    in_progress: HashSet<String>,
}

impl<'a> Builder<'a> {
    fn new(config: &'a AnnotationConfig) -> Result<Self> {
        let mut definitions: HashMap<&str, &MacroTypeConfig> = HashMap::new();
        for group in config.types.values() {
            for (name, definition) in group {
                if definitions.insert(name.as_str(), definition).is_some() {
                    return Err(Error::config(format!(
                        "type \"{}\" is defined more than once",
                        name
                    )));
                }
            }
        }

        // Preset seeds are skipped for names the document redefines, so a
        // reference resolved mid-build never observes the stale built-in.
        let mut cache = HashMap::new();
        if config.basic_preset {
            for (name, ty) in preset::basic_types() {
                if !definitions.contains_key(name) {
                    cache.insert((*name).to_string(), Arc::new(ty.clone()));
                }
            }
        }

        // A definition colliding with a seeded built-in must be listed under
        // Overrides; silent overwrites are rejected.
        let overrides: HashSet<&str> = config.overrides.iter().map(String::as_str).collect();
        if config.basic_preset {
            let seeded: HashSet<&str> = preset::basic_types().iter().map(|(n, _)| *n).collect();
            for name in definitions.keys() {
                if seeded.contains(*name) && !overrides.contains(*name) {
                    return Err(Error::config(format!(
                        "type \"{}\" overwrites a built-in without an explicit override",
                        name
                    )));
                }
            }
            for name in &overrides {
                if !seeded.contains(*name) {
                    tracing::warn!(name, "override listed for a type that is not seeded");
                }
            }
        }

        Ok(Builder {
            definitions,
            cache,
            in_progress: HashSet::new(),
        })
    }

    fn build(mut self, config: &AnnotationConfig) -> Result<MacroRegistry> {
        // Materialize every named definition; preset seeds already in the
        // cache are replaced only for names the document overrides.
        let names: Vec<String> = self.definitions.keys().map(|n| n.to_string()).collect();
        for name in names {
            let definition = self.definitions[name.as_str()];
            let ty = self.materialize(definition)?;
            self.cache.insert(name, Arc::new(ty));
        }

        let mut registry = MacroRegistry {
            types: self.cache.clone(),
            global: self.resolve_name_set(&config.global_names)?,
            code_entries: HashMap::new(),
            named_arguments: config.named_arguments.clone(),
        };
        for (entry, set) in &config.code_entry_names {
            registry
                .code_entries
                .insert(entry.clone(), self.resolve_name_set(set)?);
        }

        tracing::debug!(
            types = registry.types.len(),
            code_entries = registry.code_entries.len(),
            "macro registry built"
        );
        Ok(registry)
    }

    fn resolve_name_set(&mut self, config: &NameSetConfig) -> Result<NameSet> {
        Ok(NameSet {
            variables: self.resolve_name_map(&config.variables)?,
            function_arguments: self.resolve_name_map(&config.function_arguments)?,
            function_returns: self.resolve_name_map(&config.function_returns)?,
        })
    }

    fn resolve_name_map(
        &mut self,
        map: &HashMap<String, String>,
    ) -> Result<HashMap<String, Arc<MacroType>>> {
        let mut resolved = HashMap::new();
        for (name, type_name) in map {
            resolved.insert(name.clone(), self.named(type_name)?);
        }
        Ok(resolved)
    }

    /// Resolves a named reference, materializing it on first use
    fn named(&mut self, name: &str) -> Result<Arc<MacroType>> {
        if let Some(ty) = self.cache.get(name) {
            return Ok(ty.clone());
        }
        if self.in_progress.contains(name) {
            return Err(Error::config(format!(
                "cyclic reference through type \"{}\"",
                name
            )));
        }
        let definition = *self.definitions.get(name).ok_or_else(|| {
            Error::config(format!("reference to undefined type \"{}\"", name))
        })?;

        self.in_progress.insert(name.to_string());
        let ty = self.materialize(definition);
        self.in_progress.remove(name);

        let ty = Arc::new(ty?);
        self.cache.insert(name.to_string(), ty.clone());
        Ok(ty)
    }

    fn reference(&mut self, reference: &MacroTypeRef) -> Result<MacroType> {
        match reference {
            MacroTypeRef::Named(name) => Ok(self.named(name)?.as_ref().clone()),
            MacroTypeRef::Inline(definition) => self.materialize(definition),
        }
    }

    /// Turns one definition into an owned macro type, validating its shape
    fn materialize(&mut self, definition: &MacroTypeConfig) -> Result<MacroType> {
        let tag = definition.macro_type.as_str();
        match tag {
            "None" => {
                self.reject_fields(definition, &[])?;
                Ok(MacroType::None)
            }
            "Enum" => {
                self.reject_fields(definition, &["Name", "Values"])?;
                let name = definition.name.clone().ok_or_else(|| {
                    Error::config("Enum definition is missing its Name".to_string())
                })?;
                let raw = definition.values.as_ref().ok_or_else(|| {
                    Error::config(format!("Enum \"{}\" is missing its Values", name))
                })?;
                let mut values = HashMap::new();
                for (key, label) in raw {
                    let key: i64 = key.trim().parse().map_err(|_| {
                        Error::config(format!("Enum \"{}\" has non-integer key \"{}\"", name, key))
                    })?;
                    if values.insert(key, label.clone()).is_some() {
                        return Err(Error::config(format!(
                            "Enum \"{}\" has duplicate key {}",
                            name, key
                        )));
                    }
                }
                Ok(MacroType::Enum { name, values })
            }
            "Constants" => {
                self.reject_fields(definition, &["Values"])?;
                let raw = definition.values.as_ref().ok_or_else(|| {
                    Error::config("Constants definition is missing its Values".to_string())
                })?;
                let mut values = HashMap::new();
                for (key, label) in raw {
                    let key: i32 = key.trim().parse().map_err(|_| {
                        Error::config(format!("Constants has non-integer key \"{}\"", key))
                    })?;
                    if values.insert(key, label.clone()).is_some() {
                        return Err(Error::config(format!(
                            "Constants has duplicate key {}",
                            key
                        )));
                    }
                }
                Ok(MacroType::Constants { values })
            }
            "Union" | "Intersect" => {
                self.reject_fields(definition, &["Members"])?;
                let members = definition.members.as_ref().ok_or_else(|| {
                    Error::config(format!("{} definition is missing its Members", tag))
                })?;
                if members.is_empty() {
                    return Err(Error::config(format!("{} has no members", tag)));
                }
                let members = members
                    .iter()
                    .map(|member| self.reference(member))
                    .collect::<Result<Vec<_>>>()?;
                Ok(if tag == "Union" {
                    MacroType::Union(members)
                } else {
                    MacroType::Intersect(members)
                })
            }
            "Match" | "MatchNot" => {
                self.reject_fields(definition, &["Inner", "ConditionType", "ConditionValue"])?;
                let inner = definition.inner.as_ref().ok_or_else(|| {
                    Error::config(format!("{} definition is missing its Inner", tag))
                })?;
                let inner = Box::new(self.reference(inner)?);
                let condition = self.condition(definition, tag)?;
                Ok(if tag == "Match" {
                    MacroType::Match { inner, condition }
                } else {
                    MacroType::MatchNot { inner, condition }
                })
            }
            "ArrayInit" => {
                self.reject_fields(definition, &["Inner"])?;
                let inner = definition.inner.as_ref().ok_or_else(|| {
                    Error::config("ArrayInit definition is missing its Inner".to_string())
                })?;
                Ok(MacroType::ArrayInit(Box::new(self.reference(inner)?)))
            }
            "FunctionArgs" => {
                self.reject_fields(definition, &["Arguments"])?;
                let arguments = definition.arguments.as_ref().ok_or_else(|| {
                    Error::config("FunctionArgs definition is missing its Arguments".to_string())
                })?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.reference(argument))
                    .collect::<Result<Vec<_>>>()?;
                Ok(MacroType::FunctionArgs(arguments))
            }
            other => Err(Error::config(format!(
                "unknown MacroType discriminator \"{}\"",
                other
            ))),
        }
    }

    fn condition(&self, definition: &MacroTypeConfig, tag: &str) -> Result<MacroCondition> {
        let kind = definition.condition_type.as_deref().ok_or_else(|| {
            Error::config(format!("{} definition is missing its ConditionType", tag))
        })?;
        let value = definition.condition_value.clone().ok_or_else(|| {
            Error::config(format!("{} definition is missing its ConditionValue", tag))
        })?;
        match kind {
            "Function" => Ok(MacroCondition::Function(value)),
            "Variable" => Ok(MacroCondition::Variable(value)),
            "CodeEntry" => Ok(MacroCondition::CodeEntry(value)),
            other => Err(Error::config(format!(
                "unknown ConditionType \"{}\"",
                other
            ))),
        }
    }

    /// Rejects fields that do not belong to the definition's tag
    fn reject_fields(&self, definition: &MacroTypeConfig, allowed: &[&str]) -> Result<()> {
        let present: [(&str, bool); 6] = [
            ("Name", definition.name.is_some()),
            ("Values", definition.values.is_some()),
            ("Members", definition.members.is_some()),
            ("Inner", definition.inner.is_some()),
            (
                "ConditionType",
                definition.condition_type.is_some() || definition.condition_value.is_some(),
            ),
            ("Arguments", definition.arguments.is_some()),
        ];
        for (field, is_present) in present {
            if is_present && !allowed.contains(&field) {
                return Err(Error::config(format!(
                    "field {} is not valid for MacroType {}",
                    field, definition.macro_type
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompiler::macro_types::{LiteralValue, ResolveContext};

    #[test]
    fn test_enum_round_trip_from_json() {
        let registry = MacroRegistry::from_json(
            r#"{
                "Types": {
                    "General": {
                        "Direction": {
                            "MacroType": "Enum",
                            "Name": "Direction",
                            "Values": {"0": "Right", "1": "Up"}
                        }
                    }
                },
                "GlobalNames": {"Variables": {"dir": "Direction"}}
            }"#,
        )
        .unwrap();

        let ty = registry.variable_type(None, "dir").unwrap();
        let label = ty.resolve(&LiteralValue::Int(0), &ResolveContext::default());
        assert_eq!(label, Some("Direction.Right".to_string()));
    }

    #[test]
    fn test_unknown_top_level_field_is_a_parse_failure() {
        let result = MacroRegistry::from_json(r#"{"Typo": {}}"#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_undefined_named_reference_fails_construction() {
        let result = MacroRegistry::from_json(
            r#"{"GlobalNames": {"Variables": {"dir": "Direction"}}}"#,
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_cyclic_reference_fails_construction() {
        let result = MacroRegistry::from_json(
            r#"{
                "Types": {
                    "General": {
                        "A": {"MacroType": "Union", "Members": ["B"]},
                        "B": {"MacroType": "Union", "Members": ["A"]}
                    }
                }
            }"#,
        );
        match result {
            Err(Error::Config { message }) => assert!(message.contains("cyclic")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_type_name_across_groups_fails() {
        let result = MacroRegistry::from_json(
            r#"{
                "Types": {
                    "A": {"T": {"MacroType": "None"}},
                    "B": {"T": {"MacroType": "None"}}
                }
            }"#,
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_duplicate_numeric_key_fails() {
        let result = MacroRegistry::from_json(
            r#"{
                "Types": {
                    "General": {
                        "T": {"MacroType": "Constants", "Values": {"1": "A", " 1": "B"}}
                    }
                }
            }"#,
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_malformed_composite_fails() {
        // Enum fields on a Union tag.
        let result = MacroRegistry::from_json(
            r#"{
                "Types": {
                    "General": {
                        "T": {"MacroType": "Union", "Members": [], "Name": "T"}
                    }
                }
            }"#,
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_preset_collision_requires_explicit_override() {
        let colliding = r#"{
            "BasicPreset": true,
            "Types": {
                "General": {
                    "BlendMode": {"MacroType": "Enum", "Name": "BlendMode", "Values": {"0": "Custom"}}
                }
            }
        }"#;
        assert!(MacroRegistry::from_json(colliding).is_err());

        let with_override = r#"{
            "BasicPreset": true,
            "Overrides": ["BlendMode"],
            "Types": {
                "General": {
                    "BlendMode": {"MacroType": "Enum", "Name": "BlendMode", "Values": {"0": "Custom"}}
                }
            }
        }"#;
        let registry = MacroRegistry::from_json(with_override).unwrap();
        let ty = registry.get_type("BlendMode").unwrap();
        let label = ty.resolve(&LiteralValue::Int(0), &ResolveContext::default());
        assert_eq!(label, Some("BlendMode.Custom".to_string()));
    }

    #[test]
    fn test_code_entry_override_shadows_global() {
        let registry = MacroRegistry::from_json(
            r#"{
                "Types": {
                    "General": {
                        "A": {"MacroType": "Enum", "Name": "A", "Values": {"1": "Global"}},
                        "B": {"MacroType": "Enum", "Name": "B", "Values": {"1": "Entry"}}
                    }
                },
                "GlobalNames": {"Variables": {"mode": "A"}},
                "CodeEntryNames": {
                    "gml_Object_door_Create": {"Variables": {"mode": "B"}}
                }
            }"#,
        )
        .unwrap();

        let global = registry.variable_type(None, "mode").unwrap();
        let ctx = ResolveContext::default();
        assert_eq!(
            global.resolve(&LiteralValue::Int(1), &ctx),
            Some("A.Global".to_string())
        );

        let entry = registry
            .variable_type(Some("gml_Object_door_Create"), "mode")
            .unwrap();
        assert_eq!(
            entry.resolve(&LiteralValue::Int(1), &ctx),
            Some("B.Entry".to_string())
        );

        // Unrelated entries fall back to the global namespace.
        let other = registry
            .variable_type(Some("gml_Object_key_Create"), "mode")
            .unwrap();
        assert_eq!(
            other.resolve(&LiteralValue::Int(1), &ctx),
            Some("A.Global".to_string())
        );
    }

    #[test]
    fn test_inline_members_and_named_arguments() {
        let registry = MacroRegistry::from_json(
            r#"{
                "Types": {
                    "General": {
                        "Speed": {
                            "MacroType": "Union",
                            "Members": [
                                {"MacroType": "Constants", "Values": {"-1": "SPEED_DEFAULT"}}
                            ]
                        }
                    }
                },
                "NamedArguments": {"gml_Script_walk": ["target", "speed"]}
            }"#,
        )
        .unwrap();

        let ty = registry.get_type("Speed").unwrap();
        assert_eq!(
            ty.resolve(&LiteralValue::Int(-1), &ResolveContext::default()),
            Some("SPEED_DEFAULT".to_string())
        );
        assert_eq!(
            registry.named_arguments("gml_Script_walk"),
            Some(&["target".to_string(), "speed".to_string()][..])
        );
    }
}
