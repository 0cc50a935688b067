#![forbid(unsafe_code)]

//! Property tests for error-key string forms.
//!
//! Ids and field names come from the server and may contain the separator
//! and escape characters; every key must still parse back to itself, and
//! purging one object must never touch another's entries.

use proptest::prelude::*;

use sensorcfg_core::{
    DeviceKind, ErrorIndex, ErrorKey, FieldErrorKey, ObjectErrorKey, ObjectRef,
};

fn id_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9|\\\\ .:-]{0,12}"
}

fn kind_strategy() -> impl Strategy<Value = DeviceKind> {
    prop::sample::select(DeviceKind::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn field_keys_parse_back(
        kind in kind_strategy(),
        id in id_strategy(),
        field in id_strategy(),
        index in prop::option::of(0usize..64),
    ) {
        let key = FieldErrorKey {
            target: ObjectRef::device(kind, id),
            field,
            index,
        };
        let parsed: FieldErrorKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn object_keys_parse_back(kind in kind_strategy(), id in id_strategy()) {
        let key = ObjectErrorKey { target: ObjectRef::device(kind, id) };
        let parsed: ObjectErrorKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn purge_leaves_no_dangling_keys(
        ids in prop::collection::vec(id_strategy(), 1..8),
        victim in 0usize..8,
    ) {
        let mut index = ErrorIndex::new();
        for id in &ids {
            let target = ObjectRef::device(DeviceKind::SensorZone, id.as_str());
            index.record(&ErrorKey::object(target.clone()), vec!["bad".into()]);
            index.record(&ErrorKey::field_at(target, "sensorIds", 1), vec!["bad".into()]);
        }
        let victim = ObjectRef::device(DeviceKind::SensorZone, ids[victim % ids.len()].as_str());
        index.purge_object(&victim);

        prop_assert!(!index.has_errors(&victim));
        for id in ids.iter().filter(|id| id.as_str() != victim.object_id.as_str()) {
            let other = ObjectRef::device(DeviceKind::SensorZone, id.as_str());
            prop_assert!(index.has_errors(&other));
        }
    }
}
