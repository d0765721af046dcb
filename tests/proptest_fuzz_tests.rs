//! Property-based tests for id generation and declaration invariants

use std::sync::Arc;

use proptest::prelude::*;

use forgescript::compiler::builtins::BuiltinTable;
use forgescript::compiler::CodeBuilder;
use forgescript::compiler::ScopeArena;

fn builder() -> CodeBuilder {
    CodeBuilder::new(Arc::new(BuiltinTable::with_defaults()))
}

proptest! {
    #[test]
    fn array_owner_id_is_always_in_unsigned_31_bit_range(
        name in proptest::option::of("[a-z_][a-z0-9_]{0,24}"),
        function_id in any::<i64>(),
        is_dot in any::<bool>(),
    ) {
        let b = builder();
        let id = b.generate_array_owner_id(name.as_deref(), function_id, is_dot);
        prop_assert!(id >= 0);
        prop_assert!(i64::from(id) < (1i64 << 31));
    }

    #[test]
    fn array_owner_id_wraps_modulo_two_pow_31(offset in 0i64..(1i64 << 31)) {
        let b = builder();
        // Adding 2^31 to the mathematical id never changes the wrapped id.
        let small = b.generate_array_owner_id(None, offset, false);
        let wrapped = b.generate_array_owner_id(None, offset + (1i64 << 31), false);
        prop_assert_eq!(small, wrapped);
        prop_assert_eq!(i64::from(small), offset);
    }

    #[test]
    fn try_variable_id_echoes_any_index(index in any::<u32>()) {
        let b = builder();
        prop_assert_eq!(b.generate_try_variable_id(index), index);
    }

    #[test]
    fn declare_local_is_idempotent_after_first(
        names in proptest::collection::vec("[a-z][a-z0-9_]{0,12}", 1..32),
    ) {
        let mut arena = ScopeArena::new();
        let root = arena.root();

        let mut unique = std::collections::HashSet::new();
        for name in &names {
            let newly = arena.declare_local(root, name);
            prop_assert_eq!(newly, unique.insert(name.clone()));
        }
        prop_assert_eq!(arena.local_count(root), unique.len());
        // Redeclaring everything changes nothing.
        for name in &names {
            prop_assert!(!arena.declare_local(root, name));
        }
        prop_assert_eq!(arena.local_count(root), unique.len());
    }
}
