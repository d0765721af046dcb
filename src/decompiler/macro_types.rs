//! Macro types - declarative, composable relabeling of raw literals
//!
//! After decompilation produces an expression tree, a literal operand may be
//! relabeled using externally supplied semantic knowledge. Macro types form a
//! closed variant set resolved by one dispatch function on the tag; the
//! configuration document cannot express further extension, so there is no
//! open hierarchy here.

use std::collections::HashMap;

/// A literal value as seen by the annotator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    /// Integer literal
    Int(i64),
    /// Array-literal initializer with element literals
    Array(Vec<LiteralValue>),
}

/// Syntactic position of the literal being annotated
///
/// The condition of `Match`/`MatchNot` is evaluated against this context of
/// the literal itself: the enclosing call for call arguments, the assignment
/// target for assignment sources, and the containing code entry. It never
/// inspects sibling arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext<'a> {
    /// Name of the containing code entry
    pub code_entry: Option<&'a str>,
    /// Function name when the literal is a call argument
    pub enclosing_function: Option<&'a str>,
    /// Positional index when the literal is a call argument
    pub argument_index: Option<usize>,
    /// Variable name when the literal is an assignment source
    pub assignment_target: Option<&'a str>,
}

/// Condition guarding a `Match`/`MatchNot` application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroCondition {
    /// Holds when the literal is an argument of the named function
    Function(String),
    /// Holds when the literal is assigned to the named variable
    Variable(String),
    /// Holds when the literal appears in the named code entry
    CodeEntry(String),
}

impl MacroCondition {
    /// Evaluates the condition against the literal's own resolve context
    pub fn holds(&self, ctx: &ResolveContext<'_>) -> bool {
        match self {
            MacroCondition::Function(name) => ctx.enclosing_function == Some(name.as_str()),
            MacroCondition::Variable(name) => ctx.assignment_target == Some(name.as_str()),
            MacroCondition::CodeEntry(name) => ctx.code_entry == Some(name.as_str()),
        }
    }
}

/// Closed variant set of literal-relabeling rules
#[derive(Debug, Clone, PartialEq)]
pub enum MacroType {
    /// Never matches
    None,
    /// Exact-key match rendering `name.label`
    Enum {
        /// Enum name prefixed onto labels
        name: String,
        /// Value-to-label map
        values: HashMap<i64, String>,
    },
    /// Exact-key match rendering the bare label
    Constants {
        /// Value-to-label map
        values: HashMap<i32, String>,
    },
    /// First matching member wins, evaluated in list order
    Union(Vec<MacroType>),
    /// Members applied in sequence over independent semantic axes
    ///
    /// Each member consumes the bits of the value it recognizes; the
    /// rendering joins member labels with `" | "` in application order and
    /// succeeds only when every bit of the value is accounted for. Order is
    /// significant when members overlap.
    Intersect(Vec<MacroType>),
    /// Applies `inner` only when the condition holds
    Match {
        /// Rule applied under the condition
        inner: Box<MacroType>,
        /// Guard evaluated against the literal's context
        condition: MacroCondition,
    },
    /// Applies `inner` only when the condition does not hold
    MatchNot {
        /// Rule applied under the negated condition
        inner: Box<MacroType>,
        /// Guard evaluated against the literal's context
        condition: MacroCondition,
    },
    /// Applies `inner` to every element of an array-literal initializer
    ArrayInit(Box<MacroType>),
    /// One rule per positional call argument; missing entries act as `None`
    FunctionArgs(Vec<MacroType>),
}

impl MacroType {
    /// Resolves a literal to its symbolic rendering, if any rule matches
    ///
    /// Walks the variant tree depth-first; the first satisfied variant
    /// supplies the label. Returns `None` when nothing matches, in which
    /// case the literal renders unchanged.
    pub fn resolve(&self, value: &LiteralValue, ctx: &ResolveContext<'_>) -> Option<String> {
        match self {
            MacroType::None => None,
            MacroType::Enum { name, values } => match value {
                LiteralValue::Int(v) => values.get(v).map(|label| format!("{}.{}", name, label)),
                LiteralValue::Array(_) => None,
            },
            MacroType::Constants { values } => match value {
                LiteralValue::Int(v) => i32::try_from(*v)
                    .ok()
                    .and_then(|v| values.get(&v))
                    .cloned(),
                LiteralValue::Array(_) => None,
            },
            MacroType::Union(members) => {
                members.iter().find_map(|member| member.resolve(value, ctx))
            }
            MacroType::Intersect(members) => match value {
                LiteralValue::Int(v) => resolve_intersect(members, *v, ctx),
                LiteralValue::Array(_) => None,
            },
            MacroType::Match { inner, condition } => {
                if condition.holds(ctx) {
                    inner.resolve(value, ctx)
                } else {
                    None
                }
            }
            MacroType::MatchNot { inner, condition } => {
                if condition.holds(ctx) {
                    None
                } else {
                    inner.resolve(value, ctx)
                }
            }
            MacroType::ArrayInit(inner) => match value {
                LiteralValue::Array(elements) => {
                    let labels: Option<Vec<String>> = elements
                        .iter()
                        .map(|element| inner.resolve(element, ctx))
                        .collect();
                    labels.map(|labels| format!("[{}]", labels.join(", ")))
                }
                LiteralValue::Int(_) => None,
            },
            MacroType::FunctionArgs(arguments) => {
                let index = ctx.argument_index?;
                arguments
                    .get(index)
                    .and_then(|argument| argument.resolve(value, ctx))
            }
        }
    }

    /// Matches against the remaining bits of an intersect walk
    ///
    /// Key-matching variants consume the bits of their matched key; other
    /// variants fall back to a full-value match consuming everything.
    fn resolve_masked(&self, remaining: i64, ctx: &ResolveContext<'_>) -> Option<(String, i64)> {
        match self {
            MacroType::Enum { name, values } => {
                best_subset_key(values.iter().map(|(k, v)| (*k, v)), remaining)
                    .map(|(key, label)| (format!("{}.{}", name, label), key))
            }
            MacroType::Constants { values } => {
                best_subset_key(values.iter().map(|(k, v)| (i64::from(*k), v)), remaining)
                    .map(|(key, label)| (label.clone(), key))
            }
            other => other
                .resolve(&LiteralValue::Int(remaining), ctx)
                .map(|label| (label, remaining)),
        }
    }
}

/// Intersect walk over independent bit axes
fn resolve_intersect(
    members: &[MacroType],
    value: i64,
    ctx: &ResolveContext<'_>,
) -> Option<String> {
    let mut remaining = value;
    let mut labels = Vec::new();
    for member in members {
        if let Some((label, consumed)) = member.resolve_masked(remaining, ctx) {
            labels.push(label);
            remaining &= !consumed;
        }
    }
    if labels.is_empty() || remaining != 0 {
        return None;
    }
    Some(labels.join(" | "))
}

/// Picks the widest key whose bits are a subset of `remaining`
///
/// Zero keys only match a fully consumed value, so `0` labels survive for
/// the literal `0` without swallowing real flags. Ties on bit count break
/// toward the larger key for determinism.
fn best_subset_key<'a, I>(entries: I, remaining: i64) -> Option<(i64, &'a String)>
where
    I: Iterator<Item = (i64, &'a String)>,
{
    let mut best: Option<(i64, &'a String)> = None;
    for (key, label) in entries {
        let matches = if key == 0 {
            remaining == 0
        } else {
            remaining & key == key
        };
        if !matches {
            continue;
        }
        let better = match best {
            Some((best_key, _)) => {
                (key.count_ones(), key) > (best_key.count_ones(), best_key)
            }
            None => true,
        };
        if better {
            best = Some((key, label));
        }
    }
    best
}
