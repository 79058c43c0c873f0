//! Property tests for effective-value resolution.

use proptest::prelude::*;

use ucf_model::{SectionRecord, Snapshot, Value};
use ucf_overlay::Overlay;

#[derive(Debug, Clone)]
enum Op {
    Set(String),
    DeleteOption,
    DeleteSection,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[a-z0-9.]{1,12}".prop_map(Op::Set),
        Just(Op::DeleteOption),
        Just(Op::DeleteSection),
    ]
}

proptest! {
    /// Deletes dominate: once any delete touches the address, no later
    /// set revives it within the same overlay.
    #[test]
    fn deletes_dominate_and_last_set_wins(ops in prop::collection::vec(op_strategy(), 0..16)) {
        let mut lan = SectionRecord::new("lan", "interface");
        lan.options.insert("proto".into(), Value::from("dhcp"));
        let mut snapshot = Snapshot::new();
        snapshot.insert_config("network", vec![lan]);

        let mut overlay = Overlay::new();
        for op in &ops {
            match op {
                Op::Set(v) => overlay.stage_set("network", "lan", "proto", Some(Value::from(v.clone()))),
                Op::DeleteOption => overlay.stage_delete("network", "lan", Some("proto")),
                Op::DeleteSection => overlay.stage_remove_section("network", "lan"),
            }
        }

        let deleted = ops.iter().any(|op| !matches!(op, Op::Set(_)));
        let expected = if deleted {
            None
        } else {
            match ops.iter().rev().find_map(|op| match op {
                Op::Set(v) => Some(v.clone()),
                _ => None,
            }) {
                Some(v) => Some(Value::from(v)),
                None => Some(Value::from("dhcp")),
            }
        };

        prop_assert_eq!(
            overlay.resolve(&snapshot, "network", "lan", "proto").cloned(),
            expected
        );
    }

    /// Temp ids never collide with baseline ids and resolve exclusively
    /// from their create record.
    #[test]
    fn temp_sections_are_isolated(values in prop::collection::vec("[a-z]{1,8}", 1..8)) {
        let mut lan = SectionRecord::new("lan", "interface");
        lan.options.insert("proto".into(), Value::from("dhcp"));
        let mut snapshot = Snapshot::new();
        snapshot.insert_config("network", vec![lan]);

        let mut overlay = Overlay::new();
        let mut sids = Vec::new();
        for value in &values {
            let sid = overlay.stage_create("network", "interface", None);
            overlay.stage_set("network", &sid, "proto", Some(Value::from(value.clone())));
            sids.push(sid);
        }

        for (sid, value) in sids.iter().zip(&values) {
            prop_assert!(!snapshot.contains_section("network", sid));
            prop_assert_eq!(
                overlay.resolve(&snapshot, "network", sid, "proto"),
                Some(&Value::from(value.clone()))
            );
        }
        // Baseline stays untouched by temp-section edits.
        prop_assert_eq!(
            overlay.resolve(&snapshot, "network", "lan", "proto"),
            Some(&Value::from("dhcp"))
        );
    }
}
