//! Basic preset - engine-wide enums and constants seeded before project
//! configuration layers on top

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::decompiler::macro_types::MacroType;

fn enum_type(name: &str, pairs: &[(i64, &str)]) -> MacroType {
    MacroType::Enum {
        name: name.to_string(),
        values: pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect(),
    }
}

fn constants(pairs: &[(i32, &str)]) -> MacroType {
    MacroType::Constants {
        values: pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect(),
    }
}

lazy_static! {
    static ref BASIC_TYPES: Vec<(&'static str, MacroType)> = vec![
        (
            "Bool",
            constants(&[(0, "false"), (1, "true")]),
        ),
        (
            "Color",
            constants(&[
                (0, "c_black"),
                (255, "c_red"),
                (32768, "c_green"),
                (65535, "c_yellow"),
                (16711680, "c_blue"),
                (16777215, "c_white"),
            ]),
        ),
        (
            "BlendMode",
            enum_type(
                "BlendMode",
                &[(0, "Normal"), (1, "Add"), (2, "Max"), (3, "Subtract")],
            ),
        ),
        (
            "EventType",
            enum_type(
                "EventType",
                &[
                    (0, "Create"),
                    (1, "Destroy"),
                    (2, "Alarm"),
                    (3, "Step"),
                    (4, "Collision"),
                    (5, "Keyboard"),
                    (6, "Mouse"),
                    (7, "Other"),
                    (8, "Draw"),
                ],
            ),
        ),
        (
            "VirtualKey",
            constants(&[
                (13, "vk_enter"),
                (27, "vk_escape"),
                (32, "vk_space"),
                (37, "vk_left"),
                (38, "vk_up"),
                (39, "vk_right"),
                (40, "vk_down"),
            ]),
        ),
        (
            // Independent playback axes combined bitwise.
            "SpritePlayback",
            MacroType::Intersect(vec![
                constants(&[(0x1, "spr_loop")]),
                constants(&[(0x2, "spr_reverse")]),
            ]),
        ),
    ];
}

/// The built-in types seeded when a document sets `"BasicPreset": true`
pub(crate) fn basic_types() -> &'static [(&'static str, MacroType)] {
    &BASIC_TYPES
}

/// Names of every preset type, mostly useful for diagnostics
pub fn basic_type_names() -> Vec<&'static str> {
    BASIC_TYPES.iter().map(|(name, _)| *name).collect()
}

/// Convenience map form of the preset for external inspection
pub fn basic_type_map() -> HashMap<&'static str, MacroType> {
    BASIC_TYPES.iter().map(|(n, t)| (*n, t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompiler::macro_types::{LiteralValue, ResolveContext};

    #[test]
    fn test_preset_contains_core_types() {
        let names = basic_type_names();
        assert!(names.contains(&"Color"));
        assert!(names.contains(&"EventType"));
        assert!(names.contains(&"VirtualKey"));
    }

    #[test]
    fn test_preset_color_resolution() {
        let map = basic_type_map();
        let label = map["Color"].resolve(&LiteralValue::Int(16777215), &ResolveContext::default());
        assert_eq!(label, Some("c_white".to_string()));
    }

    #[test]
    fn test_preset_playback_flags_combine() {
        let map = basic_type_map();
        let label = map["SpritePlayback"].resolve(&LiteralValue::Int(0x3), &ResolveContext::default());
        assert_eq!(label, Some("spr_loop | spr_reverse".to_string()));
    }
}
