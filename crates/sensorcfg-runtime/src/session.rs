#![forbid(unsafe_code)]

//! Application root.
//!
//! A [`Session`] owns the store, the undo manager and the tutorial for one
//! logged-in user. UI code talks to the session; it never holds the store
//! directly.
//!
//! # Lifecycle
//!
//! ```text
//! login ──► Session::from_startup_json ──► enact / undo / redo / push ...
//!                                                      │
//! logout ◄─────────────── Session::reset ◄─────────────┘
//! ```

use std::sync::Arc;

use sensorcfg_core::{ActionGroup, ErrorKey, SnapshotError, StateTree};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::push::ServerPush;
use crate::store::{ApplyReport, Store, StoreSnapshot, Subscription};
use crate::tutorial::{GraphError, TutorialMachine};
use crate::undo::{EnactKind, Gesture, GestureBuilder, UndoManager};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("startup snapshot rejected: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("tutorial graph rejected: {0}")]
    Graph(#[from] GraphError),
}

/// One user's editing session.
#[derive(Debug)]
pub struct Session {
    store: Store,
    history: UndoManager,
    tutorial: TutorialMachine,
    config: EngineConfig,
}

impl Session {
    /// Start a session over `tree`.
    pub fn new(config: EngineConfig, tree: StateTree) -> Result<Self, SessionError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors).into());
        }
        let graph = config.tutorial.load_graph()?;
        let mut session = Self {
            store: Store::new(tree),
            history: UndoManager::new(config.history.clone()),
            tutorial: TutorialMachine::new(graph),
            config,
        };
        if session.config.tutorial.enabled {
            session.set_tutorial_enabled(true);
        }
        info!(
            devices = session.store.tree().device_count(),
            tutorial = session.tutorial.is_enabled(),
            "session started"
        );
        Ok(session)
    }

    /// Start a session from the server's startup snapshot.
    pub fn from_startup_json(config: EngineConfig, json: &str) -> Result<Self, SessionError> {
        let tree = StateTree::from_startup_json(json)?;
        Self::new(config, tree)
    }

    // ========================================================================
    // Gestures
    // ========================================================================

    /// Begin a gesture against the current tree.
    #[must_use]
    pub fn gesture(&self, description: impl Into<String>) -> GestureBuilder {
        GestureBuilder::new(self.store.tree(), description)
    }

    pub fn enact(&mut self, group: ActionGroup, kind: EnactKind) -> ApplyReport {
        self.history
            .enact(&mut self.store, &mut self.tutorial, group, kind)
    }

    pub fn undo(&mut self) -> Option<String> {
        self.history.undo(&mut self.store, &mut self.tutorial)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.history.redo(&mut self.store, &mut self.tutorial)
    }

    /// The server acknowledged a save.
    pub fn mark_saved(&mut self) {
        self.history.mark_saved();
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.history.has_unsaved_changes()
    }

    /// A UI button was pressed. Only the tutorial cares.
    pub fn press_button(&mut self, id: &str) {
        self.history
            .deliver(&mut self.store, &mut self.tutorial, Gesture::Button(id));
    }

    /// Translate and apply a server push. Pushes that no longer fit the
    /// tree are logged and dropped.
    pub fn apply_server_push(&mut self, push: &ServerPush) -> ApplyReport {
        match push.translate(self.store.tree()) {
            Ok(group) => self.enact(group, EnactKind::ServerPush),
            Err(err) => {
                warn!(object = %push.target(), error = %err, "dropping server push");
                ApplyReport {
                    applied: 0,
                    skipped: 1,
                }
            }
        }
    }

    // ========================================================================
    // Tutorial
    // ========================================================================

    pub fn set_tutorial_enabled(&mut self, enabled: bool) {
        if enabled {
            self.tutorial.enable(&mut self.store);
        } else {
            self.tutorial.disable(&mut self.store);
        }
        self.history.await_gestures(self.tutorial.awaited_gestures());
    }

    #[must_use]
    pub fn tutorial(&self) -> &TutorialMachine {
        &self.tutorial
    }

    // ========================================================================
    // Validation errors
    // ========================================================================

    pub fn record_error(&mut self, key: &ErrorKey, messages: Vec<String>) {
        self.store.record_error(key, messages);
    }

    pub fn clear_error(&mut self, key: &ErrorKey) -> bool {
        self.store.clear_error(key)
    }

    // ========================================================================
    // State access
    // ========================================================================

    #[must_use]
    pub fn read(&self) -> Arc<StoreSnapshot> {
        self.store.read()
    }

    #[must_use]
    pub fn tree(&self) -> &StateTree {
        self.store.tree()
    }

    pub fn subscribe(&mut self, callback: impl Fn(&StoreSnapshot) + 'static) -> Subscription {
        self.store.subscribe(callback)
    }

    #[must_use]
    pub fn history(&self) -> &UndoManager {
        &self.history
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drop all state and history (logout), continuing over `tree`.
    pub fn reset(&mut self, tree: StateTree) {
        info!("session reset");
        self.store.reset(tree);
        self.history.clear();
        self.tutorial.reset();
        let enabled = self.config.tutorial.enabled;
        self.set_tutorial_enabled(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorcfg_core::{DeviceKind, ObjectRef, Patch};
    use std::cell::Cell;
    use std::rc::Rc;
    use tracing_test::traced_test;

    const STARTUP: &str = r#"{
        "devices": {
            "sensorZone": {
                "SZ5": { "name": "Main St NB", "rotationDegrees": 0, "sensorIds": ["MS1"] }
            },
            "mapSensor": {
                "MS1": { "zoneId": "SZ5", "rssi": -60 }
            }
        }
    }"#;

    fn quiet() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.tutorial.enabled = false;
        config
    }

    fn zone() -> ObjectRef {
        ObjectRef::device(DeviceKind::SensorZone, "SZ5")
    }

    fn rotate(session: &Session, degrees: i32) -> ActionGroup {
        session
            .gesture("rotate Sensor Zone")
            .update(zone(), Patch::new().with("rotationDegrees", degrees))
            .unwrap()
            .build()
    }

    #[test]
    fn starts_from_snapshot() {
        let session = Session::from_startup_json(quiet(), STARTUP).unwrap();
        assert_eq!(session.tree().device_count(), 2);
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = quiet();
        config.history.max_depth = Some(0);
        assert!(matches!(
            Session::new(config, StateTree::new()),
            Err(SessionError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn enabled_tutorial_awaits_start_button() {
        let mut session = Session::from_startup_json(EngineConfig::default(), STARTUP).unwrap();
        assert!(session.history().is_awaited("startTutorial"));

        session.press_button("startTutorial");
        assert_eq!(session.tutorial().current_state(), "placeSensorZone");
        assert!(session.history().is_awaited("add Sensor Zone"));
        assert!(!session.history().has_undoable());
    }

    #[test]
    fn disabling_tutorial_stops_awaiting() {
        let mut session = Session::from_startup_json(EngineConfig::default(), STARTUP).unwrap();
        session.set_tutorial_enabled(false);
        assert_eq!(session.history().awaited().count(), 0);
        assert_eq!(session.tree().help_widgets().count(), 0);
    }

    #[test]
    fn server_push_for_unknown_device_is_skipped() {
        let mut session = Session::from_startup_json(quiet(), STARTUP).unwrap();
        let report = session.apply_server_push(&ServerPush::DeviceRemoved {
            kind: DeviceKind::Radio,
            id: "R1".into(),
        });
        assert_eq!(report.skipped, 1);
        assert_eq!(session.tree().device_count(), 2);
    }

    #[test]
    fn server_push_does_not_touch_history() {
        let mut session = Session::from_startup_json(quiet(), STARTUP).unwrap();
        let group = rotate(&session, 45);
        session.enact(group, EnactKind::UserUndoable);
        session.mark_saved();

        session.apply_server_push(&ServerPush::DeviceStatus {
            kind: DeviceKind::MapSensor,
            id: "MS1".into(),
            fields: Patch::new().with("rssi", -48),
        });
        assert_eq!(session.history().undo_depth(), 1);
        assert!(!session.has_unsaved_changes());
        assert_eq!(session.tree().map_sensor("MS1").unwrap().rssi, Some(-48));
    }

    #[test]
    fn subscribers_see_each_publish() {
        let mut session = Session::from_startup_json(quiet(), STARTUP).unwrap();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let _sub = session.subscribe(move |_| counter.set(counter.get() + 1));

        let group = rotate(&session, 90);
        session.enact(group, EnactKind::UserUndoable);
        session.undo();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn reset_drops_history_and_errors() {
        let mut session = Session::from_startup_json(quiet(), STARTUP).unwrap();
        let group = rotate(&session, 90);
        session.enact(group, EnactKind::UserUndoable);
        session.record_error(
            &ErrorKey::field(zone(), "name"),
            vec!["name is required".into()],
        );

        session.reset(StateTree::new());
        assert!(!session.history().has_undoable());
        assert!(session.read().errors.is_empty());
        assert_eq!(session.tree().device_count(), 0);
    }

    #[test]
    #[traced_test]
    fn unawaited_gesture_logs_and_applies() {
        let mut session = Session::from_startup_json(EngineConfig::default(), STARTUP).unwrap();
        let group = rotate(&session, 90);
        session.enact(group, EnactKind::UserUndoable);

        assert_eq!(session.tutorial().current_state(), "welcome");
        assert_eq!(session.tree().sensor_zone("SZ5").unwrap().rotation_degrees, 90);
        assert!(logs_contain("gesture is not awaited by the tutorial"));
    }
}
