#![forbid(unsafe_code)]

//! The state tree: every record the client knows about.
//!
//! Device and overlay records live in persistent [`im::OrdMap`]s so a whole
//! tree clones in O(1). The store relies on that to build the next state
//! off to the side and publish it in one step.
//!
//! The mutation primitives here ([`StateTree::insert`], [`StateTree::merge`],
//! [`StateTree::remove`]) report failures as [`TreeError`]; deciding what to
//! do about them (log and skip) is the store's job.
//!
//! # Singletons
//!
//! UI kinds always exist. `insert` replaces the whole value, `merge`
//! overlays fields, `remove` resets to the default.

use std::collections::BTreeMap;

use im::OrdMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::object::{DeviceKind, ObjectId, ObjectRef, ObjectType, OverlayKind, UiKind};
use crate::patch::Patch;
use crate::record::{
    ChannelDraft, DeviceRecord, HelpWidget, MapSensorPayload, MapSettings, Selection,
    SensorZonePayload, from_fields, to_fields,
};

/// Failure to resolve or rebuild a record.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("{0} already exists")]
    AlreadyPresent(ObjectRef),
    #[error("{0} does not exist")]
    Missing(ObjectRef),
    #[error("{target} could not be decoded: {source}")]
    Decode {
        target: ObjectRef,
        #[source]
        source: serde_json::Error,
    },
    #[error("{target} could not be encoded: {source}")]
    Encode {
        target: ObjectRef,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to build a tree from the server's startup snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("startup snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("startup snapshot record rejected: {0}")]
    Record(#[from] TreeError),
}

/// Startup snapshot as delivered by the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartupSnapshot {
    pub devices: BTreeMap<DeviceKind, BTreeMap<ObjectId, Map<String, Value>>>,
    pub map_settings: MapSettings,
}

/// All client state for one session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateTree {
    devices: BTreeMap<DeviceKind, OrdMap<ObjectId, DeviceRecord>>,
    selection: Selection,
    map_settings: MapSettings,
    channel_draft: ChannelDraft,
    help_widgets: OrdMap<ObjectId, HelpWidget>,
}

impl StateTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a decoded startup snapshot.
    pub fn from_startup(snapshot: StartupSnapshot) -> Result<Self, SnapshotError> {
        let mut tree = Self {
            map_settings: snapshot.map_settings,
            ..Self::default()
        };
        for (kind, records) in snapshot.devices {
            for (id, fields) in records {
                let target = ObjectRef::device(kind, id);
                let record = DeviceRecord::decode(kind, &fields).map_err(|source| {
                    TreeError::Decode {
                        target: target.clone(),
                        source,
                    }
                })?;
                tree.insert_device(target.object_id, record);
            }
        }
        Ok(tree)
    }

    /// Parse and build a tree from the server's startup JSON.
    pub fn from_startup_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: StartupSnapshot = serde_json::from_str(json)?;
        Self::from_startup(snapshot)
    }

    /// Insert or replace a device record directly, bypassing the action
    /// pipeline. Used while assembling a tree.
    pub fn insert_device(&mut self, id: impl Into<ObjectId>, record: DeviceRecord) {
        self.devices
            .entry(record.kind())
            .or_default()
            .insert(id.into(), record);
    }

    /// Builder form of [`StateTree::insert_device`].
    #[must_use]
    pub fn with_device(mut self, id: impl Into<ObjectId>, record: DeviceRecord) -> Self {
        self.insert_device(id, record);
        self
    }

    // ========================================================================
    // Reads
    // ========================================================================

    #[must_use]
    pub fn device(&self, kind: DeviceKind, id: &str) -> Option<&DeviceRecord> {
        self.devices.get(&kind).and_then(|records| records.get(id))
    }

    /// Records of one kind, ordered by id.
    pub fn devices(&self, kind: DeviceKind) -> impl Iterator<Item = (&ObjectId, &DeviceRecord)> {
        self.devices.get(&kind).into_iter().flat_map(|records| records.iter())
    }

    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.values().map(OrdMap::len).sum()
    }

    #[must_use]
    pub fn sensor_zone(&self, id: &str) -> Option<&SensorZonePayload> {
        self.device(DeviceKind::SensorZone, id)
            .and_then(DeviceRecord::as_sensor_zone)
    }

    #[must_use]
    pub fn map_sensor(&self, id: &str) -> Option<&MapSensorPayload> {
        self.device(DeviceKind::MapSensor, id)
            .and_then(DeviceRecord::as_map_sensor)
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn map_settings(&self) -> &MapSettings {
        &self.map_settings
    }

    #[must_use]
    pub fn channel_draft(&self) -> &ChannelDraft {
        &self.channel_draft
    }

    #[must_use]
    pub fn help_widget(&self, id: &str) -> Option<&HelpWidget> {
        self.help_widgets.get(id)
    }

    pub fn help_widgets(&self) -> impl Iterator<Item = (&ObjectId, &HelpWidget)> {
        self.help_widgets.iter()
    }

    /// Whether `target` currently resolves. Singletons always do.
    #[must_use]
    pub fn contains(&self, target: &ObjectRef) -> bool {
        let id = target.object_id.as_str();
        match target.object_type {
            ObjectType::Device(kind) => self.device(kind, id).is_some(),
            ObjectType::Ui(_) => true,
            ObjectType::Overlay(OverlayKind::HelpWidget) => self.help_widgets.contains_key(id),
        }
    }

    /// Current fields of `target`.
    pub fn fields(&self, target: &ObjectRef) -> Result<Patch, TreeError> {
        let id = target.object_id.as_str();
        let missing = || TreeError::Missing(target.clone());
        let encoded = match target.object_type {
            ObjectType::Device(kind) => self.device(kind, id).ok_or_else(missing)?.encode(),
            ObjectType::Ui(UiKind::Selection) => to_fields(&self.selection),
            ObjectType::Ui(UiKind::MapSettings) => to_fields(&self.map_settings),
            ObjectType::Ui(UiKind::ChannelDraft) => to_fields(&self.channel_draft),
            ObjectType::Overlay(OverlayKind::HelpWidget) => {
                to_fields(self.help_widgets.get(id).ok_or_else(missing)?)
            }
        };
        encoded.map(Patch::from).map_err(|source| TreeError::Encode {
            target: target.clone(),
            source,
        })
    }

    // ========================================================================
    // Mutation primitives
    // ========================================================================

    /// ADD: create `target` from `data`.
    pub fn insert(&mut self, target: &ObjectRef, data: &Patch) -> Result<(), TreeError> {
        if !target.object_type.is_singleton() && self.contains(target) {
            return Err(TreeError::AlreadyPresent(target.clone()));
        }
        self.store_fields(target, data.as_map())
    }

    /// UPDATE: overwrite the fields present in `data`.
    pub fn merge(&mut self, target: &ObjectRef, data: &Patch) -> Result<(), TreeError> {
        let mut fields = self.fields(target)?.into_map();
        data.merge_into(&mut fields);
        self.store_fields(target, &fields)
    }

    /// DELETE: drop `target` (singletons reset to their defaults).
    pub fn remove(&mut self, target: &ObjectRef) -> Result<(), TreeError> {
        let id = target.object_id.as_str();
        let removed = match target.object_type {
            ObjectType::Device(kind) => {
                let Some(records) = self.devices.get_mut(&kind) else {
                    return Err(TreeError::Missing(target.clone()));
                };
                let removed = records.remove(id).is_some();
                // Empty kinds are dropped so trees compare equal after add/delete.
                if records.is_empty() {
                    self.devices.remove(&kind);
                }
                removed
            }
            ObjectType::Ui(UiKind::Selection) => {
                self.selection = Selection::default();
                true
            }
            ObjectType::Ui(UiKind::MapSettings) => {
                self.map_settings = MapSettings::default();
                true
            }
            ObjectType::Ui(UiKind::ChannelDraft) => {
                self.channel_draft = ChannelDraft::default();
                true
            }
            ObjectType::Overlay(OverlayKind::HelpWidget) => {
                self.help_widgets.remove(id).is_some()
            }
        };
        if removed {
            Ok(())
        } else {
            Err(TreeError::Missing(target.clone()))
        }
    }

    /// Decode `fields` as a record of `target`'s type and store it.
    fn store_fields(
        &mut self,
        target: &ObjectRef,
        fields: &Map<String, Value>,
    ) -> Result<(), TreeError> {
        let decode_err = |source| TreeError::Decode {
            target: target.clone(),
            source,
        };
        let id = target.object_id.clone();
        match target.object_type {
            ObjectType::Device(kind) => {
                let record = DeviceRecord::decode(kind, fields).map_err(decode_err)?;
                self.insert_device(id, record);
            }
            ObjectType::Ui(UiKind::Selection) => {
                self.selection = from_fields(fields).map_err(decode_err)?;
            }
            ObjectType::Ui(UiKind::MapSettings) => {
                self.map_settings = from_fields(fields).map_err(decode_err)?;
            }
            ObjectType::Ui(UiKind::ChannelDraft) => {
                self.channel_draft = from_fields(fields).map_err(decode_err)?;
            }
            ObjectType::Overlay(OverlayKind::HelpWidget) => {
                let widget = from_fields(fields).map_err(decode_err)?;
                self.help_widgets.insert(id, widget);
            }
        }
        Ok(())
    }
}
