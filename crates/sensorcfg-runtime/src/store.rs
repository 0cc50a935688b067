#![forbid(unsafe_code)]

//! The central store: owns the state tree and error index, applies action
//! batches, and notifies subscribers.
//!
//! # Design
//!
//! The current state is an `Arc<StoreSnapshot>`. A batch is applied to a
//! clone of the snapshot (cheap: the tree uses persistent maps) and the
//! result is published in one step, so subscribers only ever see states
//! between whole batches.
//!
//! Subscribers are held as weak references; dropping the returned
//! [`Subscription`] guard unsubscribes. Dead entries are pruned on the next
//! publish.
//!
//! # Failure Modes
//!
//! - **Missing target**: UPDATE/DELETE on a record that is gone (a delete
//!   raced an in-flight edit). Logged at `warn`, skipped.
//! - **Duplicate ADD**: the record already exists. Logged, skipped.
//! - **Undecodable data**: a patch does not fit the record type. Logged,
//!   skipped; the record keeps its previous value.
//!
//! None of these abort the rest of the batch.

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use sensorcfg_core::{
    Action, ActionGroup, ErrorIndex, ErrorKey, Patch, StateTree, TreeError, UpdateType,
};
use tracing::{debug, debug_span, warn};

/// One published state: tree, error index, and a version that increments on
/// every publish.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreSnapshot {
    pub tree: StateTree,
    pub errors: ErrorIndex,
    pub version: u64,
}

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: usize,
}

type CallbackRc = Rc<dyn Fn(&StoreSnapshot)>;
type CallbackWeak = Weak<dyn Fn(&StoreSnapshot)>;

/// RAII guard for a store subscriber. Dropping it unsubscribes.
pub struct Subscription {
    _guard: CallbackRc,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Owner of the authoritative client state.
pub struct Store {
    current: Arc<StoreSnapshot>,
    subscribers: Vec<CallbackWeak>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.current.version)
            .field("devices", &self.current.tree.device_count())
            .field("errors", &self.current.errors.len())
            .field("subscriber_count", &self.subscribers.len())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StateTree::default())
    }
}

impl Store {
    /// Create a store around an initial tree (usually the startup snapshot).
    #[must_use]
    pub fn new(tree: StateTree) -> Self {
        Self {
            current: Arc::new(StoreSnapshot {
                tree,
                errors: ErrorIndex::new(),
                version: 0,
            }),
            subscribers: Vec::new(),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn read(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&self.current)
    }

    /// Borrow the current tree without taking a snapshot handle.
    #[must_use]
    pub fn tree(&self) -> &StateTree {
        &self.current.tree
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.version
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Apply `actions` as one atomic transition.
    pub fn apply(&mut self, actions: &[Action]) -> ApplyReport {
        self.apply_effective(actions).0
    }

    /// Like [`apply`](Self::apply), also returning the actions that took
    /// effect, in order. Skipped actions are left out.
    pub fn apply_effective(&mut self, actions: &[Action]) -> (ApplyReport, Vec<Action>) {
        let _span = debug_span!("store.apply", actions = actions.len()).entered();
        self.commit(actions)
    }

    /// Apply the inverse of `group`: each action reversed, last to first.
    pub fn reverse(&mut self, group: &ActionGroup) -> ApplyReport {
        let _span = debug_span!(
            "store.reverse",
            gesture = %group.description,
            actions = group.actions.len()
        )
        .entered();
        self.commit(&group.reversed_actions()).0
    }

    /// Record validation messages for `key`. An empty list clears it.
    pub fn record_error(&mut self, key: &ErrorKey, messages: Vec<String>) {
        let mut next = StoreSnapshot::clone(&self.current);
        next.errors.record(key, messages);
        if next.errors != self.current.errors {
            self.publish(next);
        }
    }

    /// Remove the messages recorded for `key`.
    pub fn clear_error(&mut self, key: &ErrorKey) -> bool {
        let mut next = StoreSnapshot::clone(&self.current);
        let cleared = next.errors.clear(key);
        if cleared {
            self.publish(next);
        }
        cleared
    }

    /// Replace the whole state (session start or logout). Errors are dropped.
    pub fn reset(&mut self, tree: StateTree) {
        let next = StoreSnapshot {
            tree,
            errors: ErrorIndex::new(),
            version: self.current.version,
        };
        self.publish(next);
    }

    fn commit(&mut self, actions: &[Action]) -> (ApplyReport, Vec<Action>) {
        let mut next = StoreSnapshot::clone(&self.current);
        let mut report = ApplyReport::default();
        let mut effective = Vec::with_capacity(actions.len());
        for action in actions {
            if apply_one(&mut next, action) {
                report.applied += 1;
                effective.push(action.clone());
            } else {
                report.skipped += 1;
            }
        }
        if report.applied > 0 {
            self.publish(next);
        }
        (report, effective)
    }

    fn publish(&mut self, mut next: StoreSnapshot) {
        next.version = self.current.version + 1;
        self.current = Arc::new(next);
        self.notify();
    }

    // ========================================================================
    // Subscribers
    // ========================================================================

    /// Register `callback` to run after every publish.
    pub fn subscribe(&mut self, callback: impl Fn(&StoreSnapshot) + 'static) -> Subscription {
        let strong: CallbackRc = Rc::new(callback);
        self.subscribers.push(Rc::downgrade(&strong));
        Subscription { _guard: strong }
    }

    /// Registered subscribers, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn notify(&mut self) {
        self.subscribers.retain(|w| w.strong_count() > 0);
        let callbacks: Vec<CallbackRc> = self.subscribers.iter().filter_map(Weak::upgrade).collect();
        if callbacks.is_empty() {
            return;
        }
        let _span = debug_span!(
            "store.publish",
            version = self.current.version,
            subscribers = callbacks.len()
        )
        .entered();
        let snapshot = Arc::clone(&self.current);
        for cb in &callbacks {
            cb(&snapshot);
        }
    }
}

/// Apply one action to the working snapshot. Returns whether it took effect.
fn apply_one(state: &mut StoreSnapshot, action: &Action) -> bool {
    let target = action.target();
    let result = match action.update_type() {
        UpdateType::Add => {
            let data = resolve_new_data(&state.tree, action);
            state.tree.insert(&target, &data)
        }
        UpdateType::Update => {
            let data = resolve_new_data(&state.tree, action);
            state.tree.merge(&target, &data)
        }
        UpdateType::Delete => state.tree.remove(&target).map(|()| {
            let purged = state.errors.purge_object(&target);
            if purged > 0 {
                debug!(object = %target, purged, "dropped validation errors of deleted record");
            }
        }),
    };
    match result {
        Ok(()) => true,
        Err(err) => {
            log_skip(action, &err);
            false
        }
    }
}

fn log_skip(action: &Action, err: &TreeError) {
    warn!(
        object = %action.target(),
        update_type = ?action.update_type(),
        error = %err,
        "skipping action"
    );
}

/// The action's new data with dynamic fields read from their live source.
fn resolve_new_data(tree: &StateTree, action: &Action) -> Patch {
    let mut data = action.new_data().cloned().unwrap_or_default();
    if let Some(dynamic) = action.new_data_dynamic_from() {
        match tree.fields(&dynamic.source) {
            Ok(live) => data.extend(&live.project(dynamic.fields.iter().map(String::as_str))),
            Err(err) => warn!(
                source = %dynamic.source,
                error = %err,
                "dynamic source unavailable; using recorded values"
            ),
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorcfg_core::{
        DeviceBase, DeviceKind, DevicePayload, DeviceRecord, DynamicFrom, ObjectId, ObjectRef,
        SensorZonePayload, UiKind,
    };
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use tracing_test::traced_test;

    fn zone_ref(id: &str) -> ObjectRef {
        ObjectRef::device(DeviceKind::SensorZone, id)
    }

    fn zone(name: &str, sensors: &[&str]) -> DeviceRecord {
        DeviceRecord::new(
            DeviceBase::default(),
            DevicePayload::SensorZone(SensorZonePayload {
                name: name.into(),
                sensor_ids: sensors.iter().map(|s| ObjectId::from(*s)).collect(),
                ..SensorZonePayload::default()
            }),
        )
    }

    fn store() -> Store {
        Store::new(StateTree::new().with_device("SZ5", zone("Zone 5", &["S1", "S2"])))
    }

    fn rotate(from: i32, to: i32) -> Action {
        Action::update(
            zone_ref("SZ5"),
            Patch::new().with("rotationDegrees", to),
            Patch::new().with("rotationDegrees", from),
        )
        .unwrap()
    }

    #[test]
    fn apply_then_reverse_restores_state() {
        let mut store = store();
        let before = store.read().tree.clone();
        let group = ActionGroup::new(
            "rotate and add",
            vec![
                rotate(0, 90),
                Action::add(zone_ref("SZ6"), Patch::new().with("name", "Zone 6")),
            ],
        );
        let report = store.apply(&group.actions);
        assert_eq!(report, ApplyReport { applied: 2, skipped: 0 });
        assert_eq!(store.tree().sensor_zone("SZ5").unwrap().rotation_degrees, 90);

        store.reverse(&group);
        assert_eq!(store.read().tree, before);
    }

    #[test]
    fn subscribers_see_whole_batches_only() {
        let mut store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = store.subscribe(move |snap| {
            let tree = &snap.tree;
            sink.borrow_mut().push((
                tree.sensor_zone("SZ5").map(|z| z.rotation_degrees),
                tree.sensor_zone("SZ6").is_some(),
            ));
        });

        store.apply(&[
            rotate(0, 90),
            Action::add(zone_ref("SZ6"), Patch::new()),
        ]);

        assert_eq!(*seen.borrow(), vec![(Some(90), true)]);
    }

    #[test]
    #[traced_test]
    fn missing_targets_are_skipped_not_fatal() {
        let mut store = store();
        let ghost = Action::update(
            zone_ref("ghost"),
            Patch::new().with("name", "x"),
            Patch::new().with("name", "y"),
        )
        .unwrap();
        let report = store.apply(&[ghost, rotate(0, 45)]);
        assert_eq!(report, ApplyReport { applied: 1, skipped: 1 });
        assert_eq!(store.tree().sensor_zone("SZ5").unwrap().rotation_degrees, 45);
        assert!(logs_contain("skipping action"));
    }

    #[test]
    fn duplicate_add_is_skipped() {
        let mut store = store();
        let report = store.apply(&[Action::add(zone_ref("SZ5"), Patch::new().with("name", "dup"))]);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.tree().sensor_zone("SZ5").unwrap().name, "Zone 5");
    }

    #[test]
    fn apply_effective_lists_only_applied_actions() {
        let mut store = store();
        let duplicate = Action::add(zone_ref("SZ5"), Patch::new().with("name", "dup"));
        let (report, effective) = store.apply_effective(&[duplicate, rotate(0, 30)]);
        assert_eq!(report, ApplyReport { applied: 1, skipped: 1 });
        assert_eq!(effective, vec![rotate(0, 30)]);
    }

    #[test]
    fn fully_skipped_batch_publishes_nothing() {
        let mut store = store();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let _sub = store.subscribe(move |_| counter.set(counter.get() + 1));
        let version = store.version();

        store.apply(&[Action::delete(zone_ref("ghost"), Patch::new())]);

        assert_eq!(store.version(), version);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn delete_purges_validation_errors() {
        let mut store = store();
        store.record_error(&ErrorKey::field(zone_ref("SZ5"), "name"), vec!["too long".into()]);
        store.record_error(&ErrorKey::object(zone_ref("SZ5")), vec!["no sensors".into()]);
        assert_eq!(store.read().errors.len(), 2);

        let orig = store.tree().fields(&zone_ref("SZ5")).unwrap();
        store.apply(&[Action::delete(zone_ref("SZ5"), orig)]);

        assert!(store.read().errors.is_empty());
        assert!(store.tree().sensor_zone("SZ5").is_none());
    }

    #[test]
    fn errors_survive_updates() {
        let mut store = store();
        let key = ErrorKey::field(zone_ref("SZ5"), "rotationDegrees");
        store.record_error(&key, vec!["out of range".into()]);
        store.apply(&[rotate(0, 400)]);
        assert_eq!(store.read().errors.get(&key).map(<[String]>::len), Some(1));
        assert!(store.clear_error(&key));
        assert!(!store.clear_error(&key));
    }

    #[test]
    fn dynamic_fields_read_live_values() {
        let mut store = store();
        let draft = ObjectRef::ui(UiKind::ChannelDraft);
        let copy_members = Action::update(
            draft.clone(),
            Patch::new().with("sensorIds", json!(["stale"])),
            Patch::new().with("sensorIds", json!([])),
        )
        .unwrap()
        .with_new_data_dynamic_from(DynamicFrom::new(zone_ref("SZ5"), ["sensorIds"]));

        store.apply(std::slice::from_ref(&copy_members));
        assert_eq!(
            store.tree().channel_draft().sensor_ids,
            vec![ObjectId::from("S1"), ObjectId::from("S2")]
        );

        // The source changes; a replay picks up the new membership.
        store.apply(&[Action::update(
            zone_ref("SZ5"),
            Patch::new().with("sensorIds", json!(["S9"])),
            Patch::new().with("sensorIds", json!(["S1", "S2"])),
        )
        .unwrap()]);
        store.apply(&[copy_members]);
        assert_eq!(store.tree().channel_draft().sensor_ids, vec![ObjectId::from("S9")]);
    }

    #[test]
    fn reverse_reads_dynamic_orig_values_at_undo_time() {
        let mut store = store();
        let draft = ObjectRef::ui(UiKind::ChannelDraft);
        let group = ActionGroup::new(
            "pick sensors",
            vec![Action::update(
                draft,
                Patch::new().with("sensorIds", json!(["S1"])),
                Patch::new().with("sensorIds", json!([])),
            )
            .unwrap()
            .with_orig_data_dynamic_from(DynamicFrom::new(zone_ref("SZ5"), ["sensorIds"]))],
        );
        store.apply(&group.actions);
        assert_eq!(store.tree().channel_draft().sensor_ids, vec![ObjectId::from("S1")]);

        // Membership changes after the gesture; undo restores the live value.
        store.apply(&[Action::update(
            zone_ref("SZ5"),
            Patch::new().with("sensorIds", json!(["S7"])),
            Patch::new().with("sensorIds", json!(["S1", "S2"])),
        )
        .unwrap()]);
        store.reverse(&group);
        assert_eq!(store.tree().channel_draft().sensor_ids, vec![ObjectId::from("S7")]);
    }

    #[test]
    fn dynamic_source_missing_falls_back_to_recorded_values() {
        let mut store = store();
        let draft = ObjectRef::ui(UiKind::ChannelDraft);
        let action = Action::update(
            draft,
            Patch::new().with("sensorIds", json!(["S7"])),
            Patch::new().with("sensorIds", json!([])),
        )
        .unwrap()
        .with_new_data_dynamic_from(DynamicFrom::new(zone_ref("gone"), ["sensorIds"]));
        store.apply(&[action]);
        assert_eq!(store.tree().channel_draft().sensor_ids, vec![ObjectId::from("S7")]);
    }

    #[test]
    fn dropped_subscription_stops_notifications() {
        let mut store = store();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let sub = store.subscribe(move |_| counter.set(counter.get() + 1));
        store.apply(&[rotate(0, 10)]);
        drop(sub);
        store.apply(&[rotate(10, 20)]);
        assert_eq!(calls.get(), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn reset_replaces_tree_and_clears_errors() {
        let mut store = store();
        store.record_error(&ErrorKey::object(zone_ref("SZ5")), vec!["x".into()]);
        let version = store.version();
        store.reset(StateTree::new());
        assert_eq!(store.tree().device_count(), 0);
        assert!(store.read().errors.is_empty());
        assert_eq!(store.version(), version + 1);
    }
}
