use proptest::prelude::*;
use serde_json::{Map, Value};

use policy_lint::parser::{find_node_by_path, parse};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9 _\\-\\[\\]'()]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z$][a-zA-Z0-9]{0,8}", inner, 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

proptest! {
    #[test]
    fn test_every_reachable_node_round_trips(value in arb_json(), pretty in any::<bool>()) {
        let text = if pretty {
            serde_json::to_string_pretty(&value).unwrap()
        } else {
            serde_json::to_string(&value).unwrap()
        };
        let parsed = parse(&text);
        prop_assert!(parsed.is_clean());
        prop_assert_eq!(parsed.value.as_ref(), Some(&value));

        let tree = parsed.tree.as_ref().unwrap();
        for (path, node) in tree.walk() {
            let found = find_node_by_path(tree, &path);
            prop_assert!(found.is_some_and(|found| std::ptr::eq(found, node)), "path {:?}", path);
        }
    }

    #[test]
    fn test_parser_never_panics(text in ".{0,200}") {
        let parsed = parse(&text);
        if parsed.is_clean() {
            prop_assert!(parsed.tree.is_some());
        }
    }
}
