#![forbid(unsafe_code)]

//! Server push messages and their translation into gestures.
//!
//! The transport hands over parsed messages; [`ServerPush::translate`] turns
//! each one into an [`ActionGroup`] built against the current tree, to be
//! enacted with [`EnactKind::ServerPush`](crate::undo::EnactKind::ServerPush).

use sensorcfg_core::{ActionGroup, DeviceKind, ObjectId, ObjectRef, Patch, StateTree};
use serde::{Deserialize, Serialize};

use crate::undo::{GestureBuilder, GestureError};

pub const DEVICE_STATUS: &str = "server device status";
pub const DEVICE_ADDED: &str = "server device added";
pub const DEVICE_REMOVED: &str = "server device removed";
pub const CONFIG_CHANGED: &str = "server config changed";

/// Authoritative update from the device-management server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerPush {
    /// Live status (signal strength, battery, heard/unheard).
    #[serde(rename_all = "camelCase")]
    DeviceStatus {
        kind: DeviceKind,
        id: ObjectId,
        fields: Patch,
    },
    /// A device joined the network. Replaces any record with the same id.
    #[serde(rename_all = "camelCase")]
    DeviceAdded {
        kind: DeviceKind,
        id: ObjectId,
        record: Patch,
    },
    #[serde(rename_all = "camelCase")]
    DeviceRemoved { kind: DeviceKind, id: ObjectId },
    /// Configuration written by another client or by the device itself.
    #[serde(rename_all = "camelCase")]
    ConfigChanged {
        kind: DeviceKind,
        id: ObjectId,
        fields: Patch,
    },
}

impl ServerPush {
    /// The record the message is about.
    #[must_use]
    pub fn target(&self) -> ObjectRef {
        match self {
            Self::DeviceStatus { kind, id, .. }
            | Self::DeviceAdded { kind, id, .. }
            | Self::DeviceRemoved { kind, id }
            | Self::ConfigChanged { kind, id, .. } => ObjectRef::device(*kind, id.clone()),
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::DeviceStatus { .. } => DEVICE_STATUS,
            Self::DeviceAdded { .. } => DEVICE_ADDED,
            Self::DeviceRemoved { .. } => DEVICE_REMOVED,
            Self::ConfigChanged { .. } => CONFIG_CHANGED,
        }
    }

    /// Build the group that brings `tree` in line with the message.
    pub fn translate(&self, tree: &StateTree) -> Result<ActionGroup, GestureError> {
        let target = self.target();
        let builder = GestureBuilder::new(tree, self.description());
        let builder = match self {
            Self::DeviceStatus { fields, .. } | Self::ConfigChanged { fields, .. } => {
                builder.update(target, fields.clone())?
            }
            Self::DeviceAdded { record, .. } => {
                let builder = if tree.contains(&target) {
                    builder.delete(target.clone())?
                } else {
                    builder
                };
                builder.add(target, record.clone())?
            }
            Self::DeviceRemoved { .. } => builder.delete(target)?,
        };
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorcfg_core::{
        DeviceBase, DevicePayload, DeviceRecord, MapSensorPayload, TreeError, UpdateType,
    };

    fn tree() -> StateTree {
        StateTree::new().with_device(
            "MS1",
            DeviceRecord::new(
                DeviceBase::default(),
                DevicePayload::MapSensor(MapSensorPayload {
                    rssi: Some(-70),
                    ..MapSensorPayload::default()
                }),
            ),
        )
    }

    #[test]
    fn status_becomes_update_with_current_values() {
        let push = ServerPush::DeviceStatus {
            kind: DeviceKind::MapSensor,
            id: "MS1".into(),
            fields: Patch::new().with("rssi", -55),
        };
        let group = push.translate(&tree()).unwrap();
        assert_eq!(group.description, DEVICE_STATUS);
        assert_eq!(group.actions[0].update_type(), UpdateType::Update);
        assert_eq!(
            group.actions[0].orig_data(),
            Some(&Patch::new().with("rssi", -70))
        );
    }

    #[test]
    fn added_over_existing_replaces() {
        let push = ServerPush::DeviceAdded {
            kind: DeviceKind::MapSensor,
            id: "MS1".into(),
            record: Patch::new().with("batteryLow", true),
        };
        let group = push.translate(&tree()).unwrap();
        let kinds: Vec<_> = group.actions.iter().map(|a| a.update_type()).collect();
        assert_eq!(kinds, vec![UpdateType::Delete, UpdateType::Add]);
    }

    #[test]
    fn removing_unknown_device_fails() {
        let push = ServerPush::DeviceRemoved {
            kind: DeviceKind::Radio,
            id: "R9".into(),
        };
        assert!(matches!(
            push.translate(&tree()),
            Err(GestureError::Tree(TreeError::Missing(_)))
        ));
    }

    #[test]
    fn parses_tagged_json() {
        let push: ServerPush = serde_json::from_str(
            r#"{"type":"configChanged","kind":"sensorZone","id":"SZ5","fields":{"zoneType":"count"}}"#,
        )
        .unwrap();
        assert_eq!(push.description(), CONFIG_CHANGED);
        assert_eq!(push.target().to_string(), "device.sensorZone:SZ5");
    }
}
