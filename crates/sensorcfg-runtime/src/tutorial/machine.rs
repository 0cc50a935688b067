#![forbid(unsafe_code)]

//! The running tutorial.
//!
//! [`TutorialMachine`] walks a [`TutorialGraph`] as gestures arrive and keeps
//! the help widgets for the current state in the store as
//! `overlay.helpWidget` records. Widget writes go straight to the store in a
//! single batch and never enter undo history.
//!
//! # Subject binding
//!
//! Entering a state with a subject type binds the subject from the
//! triggering gesture: the first action targeting that type. When a map
//! sensor is wanted and the gesture only names a sensor zone, the zone's
//! first member sensor is used. Button presses carry the current subject
//! forward if its type still fits.

use sensorcfg_core::{
    Action, DeviceKind, HelpWidget, ObjectId, ObjectRef, ObjectType, Patch,
};
use tracing::{debug, debug_span, info, warn};

use crate::store::Store;
use crate::undo::{Gesture, GestureObserver, ObserverMark};

use super::graph::{TutorialGraph, TutorialState};

/// Prefix of the ids the machine gives its widget records.
pub const WIDGET_ID_PREFIX: &str = "tutorial-";

/// Tutorial position plus the widgets it owns in the store.
#[derive(Debug, Clone)]
pub struct TutorialMachine {
    graph: TutorialGraph,
    enabled: bool,
    state: String,
    subject: Option<ObjectRef>,
    widget_ids: Vec<ObjectId>,
    next_widget: u64,
}

impl TutorialMachine {
    /// A disabled machine parked at the graph's initial state.
    #[must_use]
    pub fn new(graph: TutorialGraph) -> Self {
        let state = graph.initial().to_owned();
        Self {
            graph,
            enabled: false,
            state,
            subject: None,
            widget_ids: Vec::new(),
            next_widget: 0,
        }
    }

    #[must_use]
    pub fn graph(&self) -> &TutorialGraph {
        &self.graph
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn current_state(&self) -> &str {
        &self.state
    }

    #[must_use]
    pub fn subject(&self) -> Option<&ObjectRef> {
        self.subject.as_ref()
    }

    /// Ids of the widget records currently in the store.
    #[must_use]
    pub fn widget_ids(&self) -> &[ObjectId] {
        &self.widget_ids
    }

    fn current(&self) -> Option<&TutorialState> {
        self.graph.state(&self.state)
    }

    fn is_terminal(&self) -> bool {
        self.current().is_some_and(|s| s.terminal)
    }

    /// Gesture ids that would move the tutorial. Empty while disabled or in
    /// a terminal state.
    #[must_use]
    pub fn awaited_gestures(&self) -> Vec<String> {
        if !self.enabled || self.is_terminal() {
            return Vec::new();
        }
        self.graph.awaited(&self.state)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Show the tutorial. A finished tutorial starts over.
    pub fn enable(&mut self, store: &mut Store) {
        if self.is_terminal() {
            self.state = self.graph.initial().to_owned();
            self.subject = None;
        }
        self.enabled = true;
        info!(state = %self.state, "tutorial enabled");
        self.write_widgets(store);
    }

    /// Hide the tutorial, keeping its position.
    pub fn disable(&mut self, store: &mut Store) {
        self.enabled = false;
        info!(state = %self.state, "tutorial disabled");
        self.write_widgets(store);
    }

    /// Forget position and widgets without touching the store (the store
    /// is being reset as well).
    pub fn reset(&mut self) {
        self.state = self.graph.initial().to_owned();
        self.subject = None;
        self.widget_ids.clear();
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Follow the edge for `gesture`, if any. Returns whether the state
    /// changed.
    pub fn change_state(&mut self, store: &mut Store, gesture: Gesture<'_>) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(next) = self.graph.next(&self.state, gesture.id()) else {
            debug!(state = %self.state, gesture = gesture.id(), "no tutorial edge for gesture");
            return false;
        };
        let _span = debug_span!(
            "tutorial.transition",
            from = %self.state,
            to = %next.name,
            gesture = gesture.id()
        )
        .entered();
        let subject = next
            .subject
            .and_then(|expected| self.bind_subject(store, expected, gesture));
        self.state = next.name.clone();
        self.subject = subject;
        self.write_widgets(store);
        true
    }

    fn bind_subject(
        &self,
        store: &Store,
        expected: ObjectType,
        gesture: Gesture<'_>,
    ) -> Option<ObjectRef> {
        let bound = match gesture {
            Gesture::Data(group) => group
                .first_of_type(expected)
                .map(Action::target)
                .or_else(|| {
                    let zone = group.first_of_type(ObjectType::SENSOR_ZONE)?;
                    first_member_sensor(store, expected, zone.object_id())
                }),
            Gesture::Button(_) => self
                .subject
                .clone()
                .filter(|s| s.object_type == expected)
                .or_else(|| {
                    let zone = self.subject.as_ref()?;
                    if zone.object_type != ObjectType::SENSOR_ZONE {
                        return None;
                    }
                    first_member_sensor(store, expected, &zone.object_id)
                }),
        };
        if bound.is_none() {
            warn!(
                expected = %expected,
                gesture = gesture.id(),
                "could not bind tutorial subject"
            );
        }
        bound
    }

    // ========================================================================
    // Widgets
    // ========================================================================

    /// Replace the widget records in one batch: delete the old ones, add
    /// the ones for the current state (none while disabled).
    fn write_widgets(&mut self, store: &mut Store) {
        let mut actions = Vec::new();
        for id in self.widget_ids.drain(..) {
            let target = ObjectRef::new(ObjectType::HELP_WIDGET, id);
            match store.tree().fields(&target) {
                Ok(orig) => actions.push(Action::delete(target, orig)),
                Err(err) => debug!(error = %err, "tutorial widget already gone"),
            }
        }

        if self.enabled {
            let templates = self
                .current()
                .map(|s| s.widgets.clone())
                .unwrap_or_default();
            for template in &templates {
                let subject = self.subject.as_ref();
                let (Some(anchor), Some(text)) =
                    (template.resolve_anchor(subject), template.text.render(subject))
                else {
                    debug!(state = %self.state, "skipping widget without a bound subject");
                    continue;
                };
                let widget = HelpWidget {
                    anchor,
                    text,
                    placement: template.placement,
                };
                let data = match serde_json::to_value(&widget) {
                    Ok(serde_json::Value::Object(map)) => Patch::from(map),
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(error = %err, "failed to encode tutorial widget");
                        continue;
                    }
                };
                self.next_widget += 1;
                let id = ObjectId::new(format!("{WIDGET_ID_PREFIX}{}", self.next_widget));
                actions.push(Action::add(
                    ObjectRef::new(ObjectType::HELP_WIDGET, id.clone()),
                    data,
                ));
                self.widget_ids.push(id);
            }
        }

        if !actions.is_empty() {
            store.apply(&actions);
        }
    }
}

fn first_member_sensor(store: &Store, expected: ObjectType, zone: &ObjectId) -> Option<ObjectRef> {
    if expected != ObjectType::MAP_SENSOR {
        return None;
    }
    let sensor = store.tree().sensor_zone(zone.as_str())?.sensor_ids.first()?;
    Some(ObjectRef::device(DeviceKind::MapSensor, sensor.clone()))
}

impl GestureObserver for TutorialMachine {
    fn mark(&self) -> Option<ObserverMark> {
        self.enabled.then(|| ObserverMark {
            state: self.state.clone(),
            subject: self.subject.clone(),
        })
    }

    fn awaited(&self) -> Vec<String> {
        self.awaited_gestures()
    }

    fn on_gesture(&mut self, store: &mut Store, gesture: Gesture<'_>) {
        self.change_state(store, gesture);
    }

    fn rewind(&mut self, store: &mut Store, mark: &ObserverMark) {
        if !self.enabled || self.graph.state(&mark.state).is_none() {
            return;
        }
        debug!(from = %self.state, to = %mark.state, "tutorial rewound");
        self.state = mark.state.clone();
        self.subject = mark.subject.clone();
        self.write_widgets(store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorcfg_core::{
        ActionGroup, DeviceBase, DevicePayload, DeviceRecord, SensorZonePayload, StateTree,
        WidgetAnchor,
    };
    use tracing_test::traced_test;

    fn zone_ref(id: &str) -> ObjectRef {
        ObjectRef::device(DeviceKind::SensorZone, id)
    }

    fn store() -> Store {
        Store::new(StateTree::new().with_device(
            "SZ5",
            DeviceRecord::new(
                DeviceBase::default(),
                DevicePayload::SensorZone(SensorZonePayload {
                    sensor_ids: vec!["MS1".into(), "MS2".into()],
                    ..SensorZonePayload::default()
                }),
            ),
        ))
    }

    fn touching(description: &str, target: ObjectRef) -> ActionGroup {
        ActionGroup::new(
            description,
            vec![
                Action::update(
                    target,
                    Patch::new().with("rotationDegrees", 90),
                    Patch::new().with("rotationDegrees", 0),
                )
                .unwrap(),
            ],
        )
    }

    fn machine_at(state: &str, store: &mut Store) -> TutorialMachine {
        let mut machine = TutorialMachine::new(TutorialGraph::walkthrough());
        machine.enable(store);
        machine.rewind(
            store,
            &ObserverMark {
                state: state.into(),
                subject: Some(zone_ref("SZ5")),
            },
        );
        machine
    }

    fn widgets(store: &Store) -> Vec<HelpWidget> {
        store.tree().help_widgets().map(|(_, w)| w.clone()).collect()
    }

    #[test]
    fn starts_disabled_with_no_widgets() {
        let mut store = store();
        let machine = TutorialMachine::new(TutorialGraph::walkthrough());
        assert!(!machine.is_enabled());
        assert!(machine.awaited_gestures().is_empty());
        assert!(machine.mark().is_none());
        assert!(widgets(&store).is_empty());

        let mut machine = machine;
        machine.enable(&mut store);
        assert_eq!(machine.awaited_gestures(), vec!["startTutorial".to_string()]);
        assert_eq!(widgets(&store).len(), 1);
    }

    #[test]
    fn rotate_binds_zone_subject() {
        let mut store = store();
        let mut machine = machine_at("afterMoveSensorZone", &mut store);

        let group = touching("rotate Sensor Zone", zone_ref("SZ5"));
        assert!(machine.change_state(&mut store, Gesture::Data(&group)));
        assert_eq!(machine.current_state(), "afterRotateSensorZone");
        assert_eq!(machine.subject(), Some(&zone_ref("SZ5")));

        let widgets = widgets(&store);
        assert_eq!(widgets.len(), 2);
        assert!(widgets.iter().any(|w| {
            w.anchor == WidgetAnchor::Object(zone_ref("SZ5")) && w.text.contains("SZ5")
        }));
    }

    #[test]
    fn zone_gesture_falls_back_to_member_sensor() {
        let mut store = store();
        let mut machine = machine_at("afterRotateSensorZone", &mut store);

        let group = touching("change Sensor Zone type", zone_ref("SZ5"));
        assert!(machine.change_state(&mut store, Gesture::Data(&group)));
        assert_eq!(
            machine.subject(),
            Some(&ObjectRef::device(DeviceKind::MapSensor, "MS1"))
        );
    }

    #[test]
    #[traced_test]
    fn failed_binding_is_logged() {
        let mut store = store();
        let mut machine = machine_at("afterRotateSensorZone", &mut store);

        let group = touching("change Sensor Zone type", zone_ref("SZ404"));
        assert!(machine.change_state(&mut store, Gesture::Data(&group)));
        assert_eq!(machine.subject(), None);
        assert!(logs_contain("could not bind tutorial subject"));
        // Subject-anchored widgets are skipped; the save hint remains.
        assert_eq!(widgets(&store).len(), 1);
    }

    #[test]
    fn unknown_gesture_leaves_state() {
        let mut store = store();
        let mut machine = machine_at("afterMoveSensorZone", &mut store);
        let before = widgets(&store);

        let group = touching("move Sensor Zone", zone_ref("SZ5"));
        assert!(!machine.change_state(&mut store, Gesture::Data(&group)));
        assert_eq!(machine.current_state(), "afterMoveSensorZone");
        assert_eq!(widgets(&store), before);
    }

    #[test]
    fn widgets_are_replaced_not_accumulated() {
        let mut store = store();
        let mut machine = TutorialMachine::new(TutorialGraph::walkthrough());
        machine.enable(&mut store);
        let first = machine.widget_ids().to_vec();

        machine.change_state(&mut store, Gesture::Button("startTutorial"));
        assert_eq!(machine.current_state(), "placeSensorZone");
        assert_eq!(widgets(&store).len(), 1);
        assert_ne!(machine.widget_ids(), first.as_slice());
        assert!(store.tree().help_widget(first[0].as_str()).is_none());
    }

    #[test]
    fn button_carries_subject_and_terminal_awaits_nothing() {
        let mut store = store();
        let mut machine = machine_at("afterRotateSensorZone", &mut store);
        let group = touching("change Sensor Zone type", zone_ref("SZ5"));
        machine.change_state(&mut store, Gesture::Data(&group));

        assert!(machine.change_state(&mut store, Gesture::Button("saveButton")));
        assert_eq!(machine.current_state(), "tutorialComplete");
        assert!(machine.awaited_gestures().is_empty());
    }

    #[test]
    fn reenabling_a_finished_tutorial_restarts_it() {
        let mut store = store();
        let mut machine = machine_at("tutorialComplete", &mut store);
        machine.disable(&mut store);
        assert!(widgets(&store).is_empty());

        machine.enable(&mut store);
        assert_eq!(machine.current_state(), "welcome");
        assert_eq!(machine.awaited_gestures(), vec!["startTutorial".to_string()]);
    }

    #[test]
    fn disabling_keeps_position() {
        let mut store = store();
        let mut machine = machine_at("afterMoveSensorZone", &mut store);
        machine.disable(&mut store);
        assert!(machine.awaited_gestures().is_empty());
        machine.enable(&mut store);
        assert_eq!(machine.current_state(), "afterMoveSensorZone");
    }
}
