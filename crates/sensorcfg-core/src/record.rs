#![forbid(unsafe_code)]

//! Typed records held by the state tree.
//!
//! Device records are composed of a [`DeviceBase`] shared by every kind and
//! a [`DevicePayload`] selected by [`DeviceKind`]. UI singletons and overlay
//! records are plain structs.
//!
//! Records travel as field maps (see [`Patch`](crate::Patch)); the encode
//! and decode helpers here convert between the two with serde. Field names
//! are camelCase. Missing fields fall back to their defaults, unknown
//! fields are ignored.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::object::{DeviceKind, ObjectId, ObjectRef};

pub(crate) fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "record serialized to a non-object value: {other}"
        ))),
    }
}

pub(crate) fn from_fields<T: DeserializeOwned>(
    fields: &Map<String, Value>,
) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(fields.clone()))
}

// ============================================================================
// Devices
// ============================================================================

/// Position on the map canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MapPosition {
    pub x: f64,
    pub y: f64,
}

impl MapPosition {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fields every device carries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceBase {
    /// `None` while the device sits in the tray.
    pub position: Option<MapPosition>,
    /// Set by the server when the device has stopped reporting.
    pub unheard: bool,
    pub firmware_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessPointPayload {
    pub name: String,
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RadioPayload {
    pub channel: u8,
    pub color_code: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepeaterPayload {
    pub upstream_channel: u8,
    pub downstream_channel: u8,
    pub upstream_device_id: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapSensorPayload {
    pub zone_id: Option<ObjectId>,
    pub rssi: Option<i32>,
    pub battery_low: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneType {
    #[default]
    StopBar,
    Count,
    Speed2,
    Speed3,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorZonePayload {
    pub name: String,
    pub zone_type: ZoneType,
    pub rotation_degrees: i32,
    /// Member sensors, in lane order.
    pub sensor_ids: Vec<ObjectId>,
}

/// One contact-closure output channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CcChannel {
    pub sensor_ids: Vec<ObjectId>,
    pub delay_secs: u16,
    pub extension_secs: u16,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CcCardPayload {
    pub slot: u8,
    /// Channel name → channel. Replaced wholesale by updates.
    pub channels: BTreeMap<String, CcChannel>,
}

/// Kind-specific part of a device record.
#[derive(Debug, Clone, PartialEq)]
pub enum DevicePayload {
    AccessPoint(AccessPointPayload),
    Radio(RadioPayload),
    Repeater(RepeaterPayload),
    MapSensor(MapSensorPayload),
    SensorZone(SensorZonePayload),
    CcCard(CcCardPayload),
}

impl DevicePayload {
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::AccessPoint(_) => DeviceKind::AccessPoint,
            Self::Radio(_) => DeviceKind::Radio,
            Self::Repeater(_) => DeviceKind::Repeater,
            Self::MapSensor(_) => DeviceKind::MapSensor,
            Self::SensorZone(_) => DeviceKind::SensorZone,
            Self::CcCard(_) => DeviceKind::CcCard,
        }
    }
}

/// A device: shared base plus kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub base: DeviceBase,
    pub payload: DevicePayload,
}

impl DeviceRecord {
    #[must_use]
    pub fn new(base: DeviceBase, payload: DevicePayload) -> Self {
        Self { base, payload }
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.payload.kind()
    }

    /// Decode a record of `kind` from its field map.
    pub fn decode(kind: DeviceKind, fields: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let base = from_fields(fields)?;
        let payload = match kind {
            DeviceKind::AccessPoint => DevicePayload::AccessPoint(from_fields(fields)?),
            DeviceKind::Radio => DevicePayload::Radio(from_fields(fields)?),
            DeviceKind::Repeater => DevicePayload::Repeater(from_fields(fields)?),
            DeviceKind::MapSensor => DevicePayload::MapSensor(from_fields(fields)?),
            DeviceKind::SensorZone => DevicePayload::SensorZone(from_fields(fields)?),
            DeviceKind::CcCard => DevicePayload::CcCard(from_fields(fields)?),
        };
        Ok(Self { base, payload })
    }

    /// Encode base and payload fields into one flat map.
    pub fn encode(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut fields = to_fields(&self.base)?;
        let payload = match &self.payload {
            DevicePayload::AccessPoint(p) => to_fields(p)?,
            DevicePayload::Radio(p) => to_fields(p)?,
            DevicePayload::Repeater(p) => to_fields(p)?,
            DevicePayload::MapSensor(p) => to_fields(p)?,
            DevicePayload::SensorZone(p) => to_fields(p)?,
            DevicePayload::CcCard(p) => to_fields(p)?,
        };
        fields.extend(payload);
        Ok(fields)
    }

    #[must_use]
    pub fn as_sensor_zone(&self) -> Option<&SensorZonePayload> {
        match &self.payload {
            DevicePayload::SensorZone(zone) => Some(zone),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map_sensor(&self) -> Option<&MapSensorPayload> {
        match &self.payload {
            DevicePayload::MapSensor(sensor) => Some(sensor),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_cc_card(&self) -> Option<&CcCardPayload> {
        match &self.payload {
            DevicePayload::CcCard(card) => Some(card),
            _ => None,
        }
    }
}

// ============================================================================
// UI singletons
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Selection {
    pub selected: Option<ObjectRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapSettings {
    pub zoom: f64,
    pub center: MapPosition,
    pub show_rf_links: bool,
    pub show_cc_links: bool,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            center: MapPosition::default(),
            show_rf_links: true,
            show_cc_links: false,
        }
    }
}

/// Unsaved new-channel form. Edits to it are never undoable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelDraft {
    pub card_id: Option<ObjectId>,
    pub channel: Option<String>,
    pub sensor_ids: Vec<ObjectId>,
}

// ============================================================================
// Overlays
// ============================================================================

/// What a help widget is positioned against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WidgetAnchor {
    /// A named UI element such as `undoButton`.
    Named(String),
    /// A record drawn on the map.
    Object(ObjectRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    Above,
    #[default]
    Below,
    Left,
    Right,
}

/// A tutorial annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpWidget {
    pub anchor: WidgetAnchor,
    pub text: String,
    #[serde(default)]
    pub placement: Placement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zone_record() -> DeviceRecord {
        DeviceRecord::new(
            DeviceBase {
                position: Some(MapPosition::new(10.0, 20.5)),
                ..DeviceBase::default()
            },
            DevicePayload::SensorZone(SensorZonePayload {
                name: "Northbound".into(),
                zone_type: ZoneType::Count,
                rotation_degrees: 45,
                sensor_ids: vec!["S1".into(), "S2".into()],
            }),
        )
    }

    #[test]
    fn device_fields_are_flat_camel_case() {
        let fields = zone_record().encode().unwrap();
        assert_eq!(fields["rotationDegrees"], json!(45));
        assert_eq!(fields["zoneType"], json!("count"));
        assert_eq!(fields["position"], json!({"x": 10.0, "y": 20.5}));
        assert_eq!(fields["unheard"], json!(false));
    }

    #[test]
    fn decode_restores_encoded_record() {
        let record = zone_record();
        let fields = record.encode().unwrap();
        let decoded = DeviceRecord::decode(DeviceKind::SensorZone, &fields).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn decode_fills_defaults_for_missing_fields() {
        let fields = json!({"name": "Z"}).as_object().cloned().unwrap();
        let decoded = DeviceRecord::decode(DeviceKind::SensorZone, &fields).unwrap();
        let zone = decoded.as_sensor_zone().unwrap();
        assert_eq!(zone.name, "Z");
        assert_eq!(zone.rotation_degrees, 0);
        assert_eq!(decoded.base.position, None);
    }

    #[test]
    fn decode_rejects_wrong_field_types() {
        let fields = json!({"rotationDegrees": "ninety"}).as_object().cloned().unwrap();
        assert!(DeviceRecord::decode(DeviceKind::SensorZone, &fields).is_err());
    }

    #[test]
    fn payload_kind_matches_decoded_kind() {
        let fields = Map::new();
        for kind in DeviceKind::ALL {
            let record = DeviceRecord::decode(kind, &fields).unwrap();
            assert_eq!(record.kind(), kind);
        }
    }

    #[test]
    fn help_widget_anchor_wire_shape() {
        let widget = HelpWidget {
            anchor: WidgetAnchor::Named("undoButton".into()),
            text: "Press undo".into(),
            placement: Placement::Above,
        };
        let value = serde_json::to_value(&widget).unwrap();
        assert_eq!(value["anchor"], json!({"named": "undoButton"}));
    }
}
