#![forbid(unsafe_code)]

//! Building gestures against the current tree.
//!
//! UI code knows the new values it wants; the builder looks up the values
//! being replaced so every UPDATE and DELETE carries complete inverse data.
//! Steps are applied to a scratch copy of the tree as they are added, so a
//! later step in the same gesture sees the effect of earlier ones (add a
//! zone, then select it).

use sensorcfg_core::{
    Action, ActionError, ActionGroup, ObjectRef, Patch, StateTree, TreeError, UpdateType,
};
use thiserror::Error;

/// Why a gesture step could not be built.
#[derive(Debug, Error)]
pub enum GestureError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Accumulates the actions of one gesture.
#[derive(Debug, Clone)]
pub struct GestureBuilder {
    scratch: StateTree,
    actions: Vec<Action>,
    description: String,
}

impl GestureBuilder {
    /// Start a gesture against `tree`.
    #[must_use]
    pub fn new(tree: &StateTree, description: impl Into<String>) -> Self {
        Self {
            scratch: tree.clone(),
            actions: Vec::new(),
            description: description.into(),
        }
    }

    /// Create `target` with `data`.
    ///
    /// UI singletons always exist, so "adding" one replaces its value. That
    /// becomes a full-record UPDATE whose inverse is the value it replaced.
    pub fn add(self, target: ObjectRef, data: Patch) -> Result<Self, GestureError> {
        if !target.object_type.is_singleton() {
            return self.push(Action::add(target, data));
        }
        let orig = self.scratch.fields(&target)?;
        let mut replaced = self.scratch.clone();
        replaced.insert(&target, &data)?;
        let new = replaced.fields(&target)?;
        let action = Action::update(target, new, orig)?;
        self.push(action)
    }

    /// Overwrite the fields in `data`; the current values become the
    /// inverse. Fields the record does not have are rejected.
    pub fn update(self, target: ObjectRef, data: Patch) -> Result<Self, GestureError> {
        let orig = self.scratch.fields(&target)?.project(data.fields());
        let action = Action::update(target, data, orig)?;
        self.push(action)
    }

    /// Remove `target`, capturing its full contents for undo.
    pub fn delete(self, target: ObjectRef) -> Result<Self, GestureError> {
        let orig = self.scratch.fields(&target)?;
        self.push(Action::delete(target, orig))
    }

    /// Append a prepared action (for example one with a dynamic source).
    pub fn push(mut self, action: Action) -> Result<Self, GestureError> {
        let target = action.target();
        match (action.new_data(), action.update_type()) {
            (Some(data), UpdateType::Add) => self.scratch.insert(&target, data)?,
            (Some(data), UpdateType::Update) => {
                self.scratch.merge(&target, data)?;
            }
            _ => self.scratch.remove(&target)?,
        }
        self.actions.push(action);
        Ok(self)
    }

    /// The tree as it will look once the gesture is applied.
    #[must_use]
    pub fn preview(&self) -> &StateTree {
        &self.scratch
    }

    #[must_use]
    pub fn build(self) -> ActionGroup {
        ActionGroup::new(self.description, self.actions)
    }
}
