#![forbid(unsafe_code)]

//! Object addressing: which sub-tree of the state an action targets.
//!
//! Every mutation names its target with an [`ObjectType`] and an [`ObjectId`].
//! Object types are grouped by what they describe:
//!
//! - [`DeviceKind`]: field hardware records keyed by id.
//! - [`UiKind`]: UI-only singletons (selection, map settings, drafts).
//! - [`OverlayKind`]: overlay lists such as tutorial help widgets.
//!
//! Each group is a closed enum so consumers match exhaustively.
//!
//! # Canonical form
//!
//! Object types render as `"<group>.<kind>"` (for example
//! `device.sensorZone` or `ui.selection`). [`ObjectType::from_str`] accepts
//! exactly the strings [`fmt::Display`] produces.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a record within its object type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Create an id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Field hardware and configuration records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceKind {
    AccessPoint,
    Radio,
    Repeater,
    MapSensor,
    SensorZone,
    CcCard,
}

impl DeviceKind {
    /// All device kinds, in canonical order.
    pub const ALL: [DeviceKind; 6] = [
        DeviceKind::AccessPoint,
        DeviceKind::Radio,
        DeviceKind::Repeater,
        DeviceKind::MapSensor,
        DeviceKind::SensorZone,
        DeviceKind::CcCard,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessPoint => "accessPoint",
            Self::Radio => "radio",
            Self::Repeater => "repeater",
            Self::MapSensor => "mapSensor",
            Self::SensorZone => "sensorZone",
            Self::CcCard => "ccCard",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// UI-only state. Each kind is a singleton that always exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UiKind {
    Selection,
    MapSettings,
    /// In-progress form for a new contact-closure channel.
    ChannelDraft,
}

impl UiKind {
    pub const ALL: [UiKind; 3] = [UiKind::Selection, UiKind::MapSettings, UiKind::ChannelDraft];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::MapSettings => "mapSettings",
            Self::ChannelDraft => "channelDraft",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Overlay lists drawn above the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayKind {
    HelpWidget,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 1] = [OverlayKind::HelpWidget];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HelpWidget => "helpWidget",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Closed tag selecting the sub-tree an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ObjectType {
    Device(DeviceKind),
    Ui(UiKind),
    Overlay(OverlayKind),
}

impl ObjectType {
    pub const SENSOR_ZONE: ObjectType = ObjectType::Device(DeviceKind::SensorZone);
    pub const MAP_SENSOR: ObjectType = ObjectType::Device(DeviceKind::MapSensor);
    pub const HELP_WIDGET: ObjectType = ObjectType::Overlay(OverlayKind::HelpWidget);

    /// Device kind, when this type addresses a device record.
    #[must_use]
    pub const fn device_kind(self) -> Option<DeviceKind> {
        match self {
            Self::Device(kind) => Some(kind),
            Self::Ui(_) | Self::Overlay(_) => None,
        }
    }

    /// Whether records of this type are singletons (always present, id ignored).
    #[must_use]
    pub const fn is_singleton(self) -> bool {
        matches!(self, Self::Ui(_))
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(kind) => write!(f, "device.{}", kind.as_str()),
            Self::Ui(kind) => write!(f, "ui.{}", kind.as_str()),
            Self::Overlay(kind) => write!(f, "overlay.{}", kind.as_str()),
        }
    }
}

/// Error returned when an object type string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown object type `{0}`")]
pub struct UnknownObjectType(pub String);

impl FromStr for ObjectType {
    type Err = UnknownObjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownObjectType(s.to_owned());
        let (group, kind) = s.split_once('.').ok_or_else(unknown)?;
        match group {
            "device" => DeviceKind::parse(kind).map(Self::Device),
            "ui" => UiKind::parse(kind).map(Self::Ui),
            "overlay" => OverlayKind::parse(kind).map(Self::Overlay),
            _ => None,
        }
        .ok_or_else(unknown)
    }
}

impl TryFrom<String> for ObjectType {
    type Error = UnknownObjectType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectType> for String {
    fn from(value: ObjectType) -> Self {
        value.to_string()
    }
}

/// A fully qualified record address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub object_type: ObjectType,
    pub object_id: ObjectId,
}

impl ObjectRef {
    #[must_use]
    pub fn new(object_type: ObjectType, object_id: impl Into<ObjectId>) -> Self {
        Self {
            object_type,
            object_id: object_id.into(),
        }
    }

    /// Address a device record.
    #[must_use]
    pub fn device(kind: DeviceKind, id: impl Into<ObjectId>) -> Self {
        Self::new(ObjectType::Device(kind), id)
    }

    /// Address a UI singleton. Singletons ignore the id; the kind name is used.
    #[must_use]
    pub fn ui(kind: UiKind) -> Self {
        Self::new(ObjectType::Ui(kind), kind.as_str())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_display_parses_back() {
        let all = DeviceKind::ALL
            .into_iter()
            .map(ObjectType::Device)
            .chain(UiKind::ALL.into_iter().map(ObjectType::Ui))
            .chain(OverlayKind::ALL.into_iter().map(ObjectType::Overlay));
        for ty in all {
            let text = ty.to_string();
            assert_eq!(text.parse::<ObjectType>(), Ok(ty), "{text}");
        }
    }

    #[test]
    fn sensor_zone_canonical_name() {
        assert_eq!(ObjectType::SENSOR_ZONE.to_string(), "device.sensorZone");
    }

    #[test]
    fn unknown_object_types_rejected() {
        for bad in ["", "device", "device.", "device.toaster", "widget.selection", "ui.Selection"] {
            assert!(bad.parse::<ObjectType>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn object_type_serde_uses_canonical_string() {
        let json = serde_json::to_string(&ObjectType::Ui(UiKind::MapSettings)).unwrap();
        assert_eq!(json, "\"ui.mapSettings\"");
        let back: ObjectType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ObjectType::Ui(UiKind::MapSettings));
    }

    #[test]
    fn singletons_are_ui_only() {
        assert!(ObjectType::Ui(UiKind::Selection).is_singleton());
        assert!(!ObjectType::SENSOR_ZONE.is_singleton());
        assert!(!ObjectType::HELP_WIDGET.is_singleton());
        assert_eq!(ObjectType::MAP_SENSOR.device_kind(), Some(DeviceKind::MapSensor));
    }
}
