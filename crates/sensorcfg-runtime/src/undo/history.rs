#![forbid(unsafe_code)]

//! Done/undone history of gestures.
//!
//! [`UndoManager::enact`] is the single entry point for every gesture. It
//! forwards the group to the [`Store`], decides from the [`EnactKind`]
//! whether the gesture enters history, and tells the [`GestureObserver`]
//! (the tutorial) about gestures it is waiting for.
//!
//! # Invariants
//!
//! 1. Only `UserUndoable` and `Redo` enacts push onto the done stack.
//! 2. A `UserUndoable` enact empties the undone stack (linear history).
//! 3. `ServerPush` and `UserNotUndoable` leave both stacks and the save
//!    checkpoint untouched.
//! 4. `done.len() <= config.max_depth` after any operation.
//! 5. An entry holds only the actions the store applied. A gesture whose
//!    actions were all skipped (it lost a race with a server push) is not
//!    recorded, so undoing never reverts something it did not do.
//!
//! ```text
//! enact(g3, UserUndoable)
//! ┌──────────────────────────────────────────┐
//! │ Done:   [g1, g2, g3]     checkpoint = 2  │
//! │ Undone: []                               │
//! └──────────────────────────────────────────┘
//!
//! undo()
//! ┌──────────────────────────────────────────┐
//! │ Done:   [g1, g2]         checkpoint = 2  │
//! │ Undone: [g3]                             │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Tutorial lockstep
//!
//! When a gesture moves the observer, its history entry keeps the
//! [`ObserverMark`] taken just before the gesture ran. Undoing that entry
//! rewinds the observer to the mark, so the tutorial steps back together
//! with the data. Entries for gestures the observer did not react to carry
//! no mark; undoing them leaves later tutorial progress alone.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use sensorcfg_core::{ActionGroup, ObjectRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::store::{ApplyReport, Store};

/// How a gesture reaches the undo manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnactKind {
    /// A user edit that can be undone.
    UserUndoable,
    /// A transient user edit (form drafts, hover state).
    UserNotUndoable,
    /// Authoritative state pushed by the server.
    ServerPush,
    /// Replay of an undone gesture. Does not clear the undone stack.
    Redo,
}

/// Something that triggers a tutorial transition.
#[derive(Debug, Clone, Copy)]
pub enum Gesture<'a> {
    /// A data gesture, identified by its description.
    Data(&'a ActionGroup),
    /// A button press, identified by the button id.
    Button(&'a str),
}

impl Gesture<'_> {
    /// The id used as the transition key.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Data(group) => &group.description,
            Self::Button(id) => id,
        }
    }
}

/// Observer position captured before a gesture, restored on undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverMark {
    pub state: String,
    pub subject: Option<ObjectRef>,
}

/// Receiver of gestures accepted by the undo manager.
pub trait GestureObserver {
    /// Current position, or `None` when the observer is inactive.
    fn mark(&self) -> Option<ObserverMark>;

    /// Gesture ids the observer can react to right now.
    fn awaited(&self) -> Vec<String>;

    /// React to an awaited gesture.
    fn on_gesture(&mut self, store: &mut Store, gesture: Gesture<'_>);

    /// Return to a previously captured position.
    fn rewind(&mut self, store: &mut Store, mark: &ObserverMark);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObserver;

impl GestureObserver for NoObserver {
    fn mark(&self) -> Option<ObserverMark> {
        None
    }

    fn awaited(&self) -> Vec<String> {
        Vec::new()
    }

    fn on_gesture(&mut self, _store: &mut Store, _gesture: Gesture<'_>) {}

    fn rewind(&mut self, _store: &mut Store, _mark: &ObserverMark) {}
}

/// Configuration for the history manager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of gestures kept on the done stack. `None` keeps
    /// everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl HistoryConfig {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self { max_depth: None }
    }
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    group: ActionGroup,
    mark: Option<ObserverMark>,
}

/// Undo/redo history over a [`Store`].
pub struct UndoManager {
    /// Newest at back.
    done: VecDeque<HistoryEntry>,
    /// Most recently undone at back.
    undone: VecDeque<HistoryEntry>,
    save_checkpoint: usize,
    awaited: BTreeSet<String>,
    config: HistoryConfig,
}

impl fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoManager")
            .field("done_depth", &self.done.len())
            .field("undone_depth", &self.undone.len())
            .field("save_checkpoint", &self.save_checkpoint)
            .field("awaited", &self.awaited)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl UndoManager {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            done: VecDeque::new(),
            undone: VecDeque::new(),
            save_checkpoint: 0,
            awaited: BTreeSet::new(),
            config,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Run a gesture through the store and record it according to `kind`.
    pub fn enact(
        &mut self,
        store: &mut Store,
        observer: &mut dyn GestureObserver,
        group: ActionGroup,
        kind: EnactKind,
    ) -> ApplyReport {
        let _span = debug_span!("undo.enact", gesture = %group.description, ?kind).entered();
        match kind {
            EnactKind::UserNotUndoable | EnactKind::ServerPush => store.apply(&group.actions),
            EnactKind::UserUndoable => {
                self.undone.clear();
                self.record(store, observer, group)
            }
            EnactKind::Redo => self.record(store, observer, group),
        }
    }

    /// Undo the newest gesture. Returns its description, or `None` when
    /// there is nothing to undo.
    pub fn undo(
        &mut self,
        store: &mut Store,
        observer: &mut dyn GestureObserver,
    ) -> Option<String> {
        let entry = self.done.pop_back()?;
        let _span = debug_span!("undo.undo", gesture = %entry.group.description).entered();
        store.reverse(&entry.group);
        if let Some(mark) = &entry.mark {
            if observer.mark().as_ref() != Some(mark) {
                observer.rewind(store, mark);
                self.sync_awaited(observer);
            }
        }
        let description = entry.group.description.clone();
        self.undone.push_back(entry);
        Some(description)
    }

    /// Redo the most recently undone gesture.
    pub fn redo(
        &mut self,
        store: &mut Store,
        observer: &mut dyn GestureObserver,
    ) -> Option<String> {
        let entry = self.undone.pop_back()?;
        let description = entry.group.description.clone();
        self.enact(store, observer, entry.group, EnactKind::Redo);
        Some(description)
    }

    fn record(
        &mut self,
        store: &mut Store,
        observer: &mut dyn GestureObserver,
        group: ActionGroup,
    ) -> ApplyReport {
        let (report, applied) = store.apply_effective(&group.actions);
        if applied.is_empty() {
            debug!(gesture = %group.description, "gesture had no effect; not recorded");
            return report;
        }
        let before = observer.mark();
        self.deliver(store, observer, Gesture::Data(&group));
        let mark = before.filter(|m| observer.mark().as_ref() != Some(m));
        self.done.push_back(HistoryEntry {
            group: ActionGroup::new(group.description, applied),
            mark,
        });
        self.enforce_depth();
        report
    }

    /// Hand `gesture` to the observer if it is awaited.
    pub fn deliver(
        &mut self,
        store: &mut Store,
        observer: &mut dyn GestureObserver,
        gesture: Gesture<'_>,
    ) {
        if !self.awaited.contains(gesture.id()) {
            debug!(gesture = gesture.id(), "gesture is not awaited by the tutorial");
            return;
        }
        observer.on_gesture(store, gesture);
        self.sync_awaited(observer);
    }

    fn sync_awaited(&mut self, observer: &dyn GestureObserver) {
        self.await_gestures(observer.awaited());
    }

    // ========================================================================
    // Save tracking
    // ========================================================================

    /// Record that the server acknowledged a save of the current state.
    ///
    /// History is kept; only the unsaved-changes indicator resets.
    pub fn mark_saved(&mut self) {
        self.save_checkpoint = self.done.len();
    }

    #[must_use]
    pub fn save_checkpoint(&self) -> usize {
        self.save_checkpoint
    }

    /// `true` when gestures were done since the last acknowledged save.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.done.len() > self.save_checkpoint
    }

    // ========================================================================
    // Tutorial hookup
    // ========================================================================

    /// Replace the set of gesture ids the tutorial is waiting for.
    pub fn await_gestures<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.awaited = ids.into_iter().map(Into::into).collect();
    }

    #[must_use]
    pub fn is_awaited(&self, id: &str) -> bool {
        self.awaited.contains(id)
    }

    pub fn awaited(&self) -> impl Iterator<Item = &str> {
        self.awaited.iter().map(String::as_str)
    }

    // ========================================================================
    // Info
    // ========================================================================

    #[must_use]
    pub fn has_undoable(&self) -> bool {
        !self.done.is_empty()
    }

    #[must_use]
    pub fn has_redoable(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Description of the gesture [`undo`](Self::undo) would revert.
    #[must_use]
    pub fn undo_label(&self) -> Option<&str> {
        self.done.back().map(|e| e.group.description.as_str())
    }

    /// Description of the gesture [`redo`](Self::redo) would replay.
    #[must_use]
    pub fn redo_label(&self) -> Option<&str> {
        self.undone.back().map(|e| e.group.description.as_str())
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.done.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    /// Descriptions on the done stack, most recent first.
    pub fn undo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.done
            .iter()
            .rev()
            .take(limit)
            .map(|e| e.group.description.as_str())
            .collect()
    }

    /// Descriptions on the undone stack, most recent first.
    pub fn redo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.undone
            .iter()
            .rev()
            .take(limit)
            .map(|e| e.group.description.as_str())
            .collect()
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop all history (session reset).
    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
        self.save_checkpoint = 0;
    }

    fn enforce_depth(&mut self) {
        let Some(max_depth) = self.config.max_depth else {
            return;
        };
        while self.done.len() > max_depth {
            self.done.pop_front();
            self.save_checkpoint = self.save_checkpoint.saturating_sub(1);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
