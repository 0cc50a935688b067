#![forbid(unsafe_code)]

//! sensorcfg core data model.
//!
//! Pure data for the configuration client: how records are addressed, what
//! a mutation looks like, the state tree mutations apply to, and the
//! validation error index. Nothing here logs, notifies, or keeps history;
//! that lives in `sensorcfg-runtime`.
//!
//! # Key types
//!
//! - [`Action`] / [`ActionGroup`]: one field-level mutation with its inverse
//!   data, and one gesture made of them.
//! - [`StateTree`]: typed records grouped by [`ObjectType`].
//! - [`ErrorIndex`]: field and object validation errors keyed by
//!   [`ErrorKey`].

pub mod action;
pub mod error_key;
pub mod object;
pub mod patch;
pub mod record;
pub mod tree;

pub use action::{Action, ActionError, ActionGroup, DynamicFrom, UpdateType};
pub use error_key::{ErrorIndex, ErrorKey, FieldErrorKey, KeyParseError, ObjectErrorKey};
pub use object::{DeviceKind, ObjectId, ObjectRef, ObjectType, OverlayKind, UiKind, UnknownObjectType};
pub use patch::Patch;
pub use record::{
    AccessPointPayload, CcCardPayload, CcChannel, ChannelDraft, DeviceBase, DevicePayload,
    DeviceRecord, HelpWidget, MapPosition, MapSensorPayload, MapSettings, Placement, RadioPayload,
    RepeaterPayload, Selection, SensorZonePayload, WidgetAnchor, ZoneType,
};
pub use tree::{SnapshotError, StartupSnapshot, StateTree, TreeError};
