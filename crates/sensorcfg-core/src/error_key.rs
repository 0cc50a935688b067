#![forbid(unsafe_code)]

//! Validation error keys and the index that holds them.
//!
//! Errors are computed by an outside validator and recorded here as data.
//! There are two indexes:
//!
//! - field errors, keyed by `(objectType, objectId, fieldName[, fieldIndex])`
//! - object errors, keyed by `(objectType, objectId)`
//!
//! # Key format
//!
//! Keys serialize to `|`-separated strings, for example
//! `device.sensorZone|SZ5|rotationDegrees` or
//! `device.ccCard|CC1|channels|3`. A `\` escapes `|` and `\` inside ids and
//! field names, so every key parses back to exactly the value it came from.

use std::fmt;
use std::str::FromStr;

use im::OrdMap;

use crate::object::{ObjectId, ObjectRef, ObjectType, UnknownObjectType};

const SEP: char = '|';
const ESC: char = '\\';

fn escape_into(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        if ch == SEP || ch == ESC {
            out.push(ESC);
        }
        out.push(ch);
    }
}

fn split_escaped(s: &str) -> Result<Vec<String>, KeyParseError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        match ch {
            ESC => match chars.next() {
                Some(next @ (SEP | ESC)) => current.push(next),
                _ => return Err(KeyParseError::BadEscape(s.to_owned())),
            },
            SEP => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);
    Ok(parts)
}

/// Failure to parse an error key string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("error key `{0}` has a dangling or unknown escape")]
    BadEscape(String),
    #[error("error key `{key}` has {found} parts, expected {expected}")]
    WrongArity {
        key: String,
        found: usize,
        expected: &'static str,
    },
    #[error("error key `{key}` has a non-numeric field index")]
    BadIndex { key: String },
    #[error(transparent)]
    ObjectType(#[from] UnknownObjectType),
}

/// Key for errors that concern a whole record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectErrorKey {
    pub target: ObjectRef,
}

/// Key for errors on one field (or one element of a list field).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldErrorKey {
    pub target: ObjectRef,
    pub field: String,
    pub index: Option<usize>,
}

/// Either kind of error key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKey {
    Object(ObjectErrorKey),
    Field(FieldErrorKey),
}

impl ErrorKey {
    #[must_use]
    pub fn object(target: ObjectRef) -> Self {
        Self::Object(ObjectErrorKey { target })
    }

    #[must_use]
    pub fn field(target: ObjectRef, field: impl Into<String>) -> Self {
        Self::Field(FieldErrorKey {
            target,
            field: field.into(),
            index: None,
        })
    }

    #[must_use]
    pub fn field_at(target: ObjectRef, field: impl Into<String>, index: usize) -> Self {
        Self::Field(FieldErrorKey {
            target,
            field: field.into(),
            index: Some(index),
        })
    }

    #[must_use]
    pub fn target(&self) -> &ObjectRef {
        match self {
            Self::Object(key) => &key.target,
            Self::Field(key) => &key.target,
        }
    }
}

fn write_target(out: &mut String, target: &ObjectRef) {
    out.push_str(&target.object_type.to_string());
    out.push(SEP);
    escape_into(out, target.object_id.as_str());
}

fn parse_target(object_type: &str, object_id: String) -> Result<ObjectRef, KeyParseError> {
    let object_type: ObjectType = object_type.parse()?;
    Ok(ObjectRef::new(object_type, ObjectId::new(object_id)))
}

impl fmt::Display for ObjectErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_target(&mut out, &self.target);
        f.write_str(&out)
    }
}

impl fmt::Display for FieldErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_target(&mut out, &self.target);
        out.push(SEP);
        escape_into(&mut out, &self.field);
        if let Some(index) = self.index {
            out.push(SEP);
            out.push_str(&index.to_string());
        }
        f.write_str(&out)
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(key) => key.fmt(f),
            Self::Field(key) => key.fmt(f),
        }
    }
}

impl FromStr for ObjectErrorKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_escaped(s)?;
        let found = parts.len();
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ty), Some(id), None) => Ok(Self {
                target: parse_target(&ty, id)?,
            }),
            _ => Err(KeyParseError::WrongArity {
                key: s.to_owned(),
                found,
                expected: "2",
            }),
        }
    }
}

impl FromStr for FieldErrorKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_escaped(s)?;
        let found = parts.len();
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(ty), Some(id), Some(field), index, None) => {
                let index = index
                    .map(|raw| raw.parse::<usize>())
                    .transpose()
                    .map_err(|_| KeyParseError::BadIndex { key: s.to_owned() })?;
                Ok(Self {
                    target: parse_target(&ty, id)?,
                    field,
                    index,
                })
            }
            _ => Err(KeyParseError::WrongArity {
                key: s.to_owned(),
                found,
                expected: "3 or 4",
            }),
        }
    }
}

/// Recorded validation errors.
///
/// Keys are stored in their string form; an empty message list is never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorIndex {
    field_errors: OrdMap<String, Vec<String>>,
    object_errors: OrdMap<String, Vec<String>>,
}

impl ErrorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `messages` under `key`, replacing earlier messages. An empty
    /// list clears the key.
    pub fn record(&mut self, key: &ErrorKey, messages: Vec<String>) {
        if messages.is_empty() {
            self.clear(key);
            return;
        }
        let text = key.to_string();
        match key {
            ErrorKey::Object(_) => self.object_errors.insert(text, messages),
            ErrorKey::Field(_) => self.field_errors.insert(text, messages),
        };
    }

    /// Remove `key`. Returns whether anything was removed.
    pub fn clear(&mut self, key: &ErrorKey) -> bool {
        let text = key.to_string();
        match key {
            ErrorKey::Object(_) => self.object_errors.remove(&text).is_some(),
            ErrorKey::Field(_) => self.field_errors.remove(&text).is_some(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &ErrorKey) -> Option<&[String]> {
        let text = key.to_string();
        match key {
            ErrorKey::Object(_) => self.object_errors.get(&text),
            ErrorKey::Field(_) => self.field_errors.get(&text),
        }
        .map(Vec::as_slice)
    }

    /// Remove every entry that refers to `target`. Returns how many went.
    pub fn purge_object(&mut self, target: &ObjectRef) -> usize {
        let field_keys: Vec<String> = self
            .field_errors
            .keys()
            .filter(|k| {
                k.parse::<FieldErrorKey>()
                    .is_ok_and(|parsed| &parsed.target == target)
            })
            .cloned()
            .collect();
        let object_keys: Vec<String> = self
            .object_errors
            .keys()
            .filter(|k| {
                k.parse::<ObjectErrorKey>()
                    .is_ok_and(|parsed| &parsed.target == target)
            })
            .cloned()
            .collect();
        for key in &field_keys {
            self.field_errors.remove(key);
        }
        for key in &object_keys {
            self.object_errors.remove(key);
        }
        field_keys.len() + object_keys.len()
    }

    /// Whether any entry refers to `target`.
    #[must_use]
    pub fn has_errors(&self, target: &ObjectRef) -> bool {
        self.keys().any(|key| key.target() == target)
    }

    /// All recorded keys, parsed back into structured form.
    pub fn keys(&self) -> impl Iterator<Item = ErrorKey> + '_ {
        let fields = self
            .field_errors
            .keys()
            .filter_map(|k| k.parse::<FieldErrorKey>().ok().map(ErrorKey::Field));
        let objects = self
            .object_errors
            .keys()
            .filter_map(|k| k.parse::<ObjectErrorKey>().ok().map(ErrorKey::Object));
        objects.chain(fields)
    }

    pub fn field_errors(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.field_errors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn object_errors(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.object_errors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.field_errors.len() + self.object_errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
