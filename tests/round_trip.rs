//! Property tests for the build → reify round trip.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use relationalizer_kernel::{DataInstanceBuilder, HandlerRegistry, Value};

fn builder() -> DataInstanceBuilder {
    DataInstanceBuilder::with_registry(Arc::new(HandlerRegistry::with_builtins()))
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-zA-Z0-9 _-]{0,12}".prop_map(Value::from),
    ]
}

/// Values built only from scalars and built-in containers.
fn builtin_value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::list),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::tuple),
            prop::collection::vec(leaf(), 0..6).prop_map(Value::set),
            prop::collection::vec((leaf(), inner), 0..5).prop_map(Value::map),
        ]
    })
}

proptest! {
    #[test]
    fn prop_round_trip(value in builtin_value()) {
        let builder = builder();
        let json = builder.build(&value).unwrap().to_json().unwrap();
        prop_assert_eq!(builder.reify(&json).unwrap(), value);
    }

    #[test]
    fn prop_build_is_deterministic(value in builtin_value()) {
        let a = builder().build(&value).unwrap();
        let b = builder().build(&value).unwrap();
        prop_assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn prop_relations_are_well_formed(value in builtin_value()) {
        let instance = builder().build(&value).unwrap();
        let ids: HashSet<&str> = instance.atoms.iter().map(|a| a.id.as_str()).collect();
        prop_assert_eq!(ids.len(), instance.num_atoms());

        for relation in &instance.relations {
            for tuple in &relation.tuples {
                prop_assert!(tuple.atoms.len() >= 2);
                prop_assert_eq!(tuple.atoms.len(), tuple.types.len());
                for id in &tuple.atoms {
                    prop_assert!(ids.contains(id.as_str()), "dangling {}", id);
                }
            }
        }
    }
}
