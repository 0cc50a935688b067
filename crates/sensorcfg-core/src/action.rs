#![forbid(unsafe_code)]

//! Field-level mutations and the gestures that group them.
//!
//! An [`Action`] describes one record mutation together with the data
//! needed to invert it. An [`ActionGroup`] is one user gesture: an ordered
//! list of actions plus a description that doubles as the gesture id.
//!
//! # Invariants
//!
//! - `ADD` carries `new_data`; `DELETE` carries `orig_data` (the full record
//!   to restore); `UPDATE` carries both, over the same set of fields.
//! - [`Action::reverse`] is total: the reverse of a valid action is valid.
//! - `reverse(reverse(a)) == a`.
//!
//! These hold for every `Action` value; constructors and deserialization
//! reject inputs that would break them.

use serde::{Deserialize, Serialize};

use crate::object::{ObjectId, ObjectRef, ObjectType};
use crate::patch::Patch;

/// Kind of record mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    Add,
    Update,
    Delete,
}

impl UpdateType {
    /// ADD ↔ DELETE, UPDATE ↔ UPDATE.
    #[must_use]
    pub const fn invert(self) -> Self {
        match self {
            Self::Add => Self::Delete,
            Self::Update => Self::Update,
            Self::Delete => Self::Add,
        }
    }
}

/// Fields whose values are read from a live record each time the action is
/// applied, instead of the values frozen into the patch.
///
/// The frozen values stay in the patch and are used when the source record
/// or one of its fields is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFrom {
    pub source: ObjectRef,
    pub fields: Vec<String>,
}

impl DynamicFrom {
    #[must_use]
    pub fn new<I, S>(source: ObjectRef, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Construction contract violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("{update_type:?} on {target} requires newData")]
    MissingNewData {
        target: ObjectRef,
        update_type: UpdateType,
    },
    #[error("{update_type:?} on {target} requires origData")]
    MissingOrigData {
        target: ObjectRef,
        update_type: UpdateType,
    },
    #[error("{update_type:?} on singleton {target}; singletons only take UPDATE")]
    SingletonReplace {
        target: ObjectRef,
        update_type: UpdateType,
    },
    #[error("UPDATE on {target}: newData and origData disagree on fields {fields:?}")]
    FieldMismatch {
        target: ObjectRef,
        fields: Vec<String>,
    },
}

/// One field-level mutation and its inverse data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub struct Action {
    object_id: ObjectId,
    object_type: ObjectType,
    update_type: UpdateType,
    new_data: Option<Patch>,
    orig_data: Option<Patch>,
    new_data_dynamic_from: Option<DynamicFrom>,
    orig_data_dynamic_from: Option<DynamicFrom>,
}

impl Action {
    fn bare(target: ObjectRef, update_type: UpdateType) -> Self {
        Self {
            object_id: target.object_id,
            object_type: target.object_type,
            update_type,
            new_data: None,
            orig_data: None,
            new_data_dynamic_from: None,
            orig_data_dynamic_from: None,
        }
    }

    /// Insert a record built from `new_data`.
    #[must_use]
    pub fn add(target: ObjectRef, new_data: Patch) -> Self {
        let mut action = Self::bare(target, UpdateType::Add);
        action.new_data = Some(new_data);
        action
    }

    /// Merge `new_data` into an existing record. `orig_data` must hold the
    /// prior values of exactly the same fields.
    pub fn update(target: ObjectRef, new_data: Patch, orig_data: Patch) -> Result<Self, ActionError> {
        let mut action = Self::bare(target, UpdateType::Update);
        action.new_data = Some(new_data);
        action.orig_data = Some(orig_data);
        action.validate()?;
        Ok(action)
    }

    /// Remove a record. `orig_data` is the full record, restored on undo.
    #[must_use]
    pub fn delete(target: ObjectRef, orig_data: Patch) -> Self {
        let mut action = Self::bare(target, UpdateType::Delete);
        action.orig_data = Some(orig_data);
        action
    }

    #[must_use]
    pub fn with_new_data_dynamic_from(mut self, dynamic: DynamicFrom) -> Self {
        self.new_data_dynamic_from = Some(dynamic);
        self
    }

    #[must_use]
    pub fn with_orig_data_dynamic_from(mut self, dynamic: DynamicFrom) -> Self {
        self.orig_data_dynamic_from = Some(dynamic);
        self
    }

    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    #[must_use]
    pub fn target(&self) -> ObjectRef {
        ObjectRef::new(self.object_type, self.object_id.clone())
    }

    #[must_use]
    pub fn update_type(&self) -> UpdateType {
        self.update_type
    }

    #[must_use]
    pub fn new_data(&self) -> Option<&Patch> {
        self.new_data.as_ref()
    }

    #[must_use]
    pub fn orig_data(&self) -> Option<&Patch> {
        self.orig_data.as_ref()
    }

    #[must_use]
    pub fn new_data_dynamic_from(&self) -> Option<&DynamicFrom> {
        self.new_data_dynamic_from.as_ref()
    }

    #[must_use]
    pub fn orig_data_dynamic_from(&self) -> Option<&DynamicFrom> {
        self.orig_data_dynamic_from.as_ref()
    }

    /// The inverse action: data and dynamic sources swapped, update type
    /// inverted.
    #[must_use]
    pub fn reverse(&self) -> Action {
        Action {
            object_id: self.object_id.clone(),
            object_type: self.object_type,
            update_type: self.update_type.invert(),
            new_data: self.orig_data.clone(),
            orig_data: self.new_data.clone(),
            new_data_dynamic_from: self.orig_data_dynamic_from.clone(),
            orig_data_dynamic_from: self.new_data_dynamic_from.clone(),
        }
    }

    fn validate(&self) -> Result<(), ActionError> {
        let target = || self.target();
        if self.object_type.is_singleton() && self.update_type != UpdateType::Update {
            return Err(ActionError::SingletonReplace {
                target: target(),
                update_type: self.update_type,
            });
        }
        let needs_new = matches!(self.update_type, UpdateType::Add | UpdateType::Update);
        let needs_orig = matches!(self.update_type, UpdateType::Update | UpdateType::Delete);
        if needs_new && self.new_data.is_none() {
            return Err(ActionError::MissingNewData {
                target: target(),
                update_type: self.update_type,
            });
        }
        if needs_orig && self.orig_data.is_none() {
            return Err(ActionError::MissingOrigData {
                target: target(),
                update_type: self.update_type,
            });
        }
        if let (UpdateType::Update, Some(new), Some(orig)) =
            (self.update_type, &self.new_data, &self.orig_data)
        {
            let mut fields: Vec<String> = new
                .fields()
                .filter(|f| !orig.contains(f))
                .chain(orig.fields().filter(|f| !new.contains(f)))
                .map(str::to_owned)
                .collect();
            if !fields.is_empty() {
                fields.sort();
                return Err(ActionError::FieldMismatch {
                    target: target(),
                    fields,
                });
            }
        }
        Ok(())
    }
}

/// Wire shape of [`Action`]; validated on the way in.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAction {
    object_id: ObjectId,
    object_type: ObjectType,
    update_type: UpdateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_data: Option<Patch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    orig_data: Option<Patch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_data_dynamic_from: Option<DynamicFrom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    orig_data_dynamic_from: Option<DynamicFrom>,
}

impl TryFrom<RawAction> for Action {
    type Error = ActionError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let action = Action {
            object_id: raw.object_id,
            object_type: raw.object_type,
            update_type: raw.update_type,
            new_data: raw.new_data,
            orig_data: raw.orig_data,
            new_data_dynamic_from: raw.new_data_dynamic_from,
            orig_data_dynamic_from: raw.orig_data_dynamic_from,
        };
        action.validate()?;
        Ok(action)
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        RawAction {
            object_id: action.object_id,
            object_type: action.object_type,
            update_type: action.update_type,
            new_data: action.new_data,
            orig_data: action.orig_data,
            new_data_dynamic_from: action.new_data_dynamic_from,
            orig_data_dynamic_from: action.orig_data_dynamic_from,
        }
    }
}

/// One gesture: ordered actions plus the description that identifies it.
///
/// The description is the join key for the tutorial's transition table and
/// the label shown on undo/redo buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroup {
    pub actions: Vec<Action>,
    pub description: String,
}

impl ActionGroup {
    #[must_use]
    pub fn new(description: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            actions,
            description: description.into(),
        }
    }

    /// The inverse batch: every action reversed, in reverse order.
    #[must_use]
    pub fn reversed_actions(&self) -> Vec<Action> {
        self.actions.iter().rev().map(Action::reverse).collect()
    }

    /// First action targeting `object_type`.
    #[must_use]
    pub fn first_of_type(&self, object_type: ObjectType) -> Option<&Action> {
        self.actions.iter().find(|a| a.object_type == object_type)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }
}
