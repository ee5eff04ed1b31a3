//! Decoding options and the tag-dispatch helpers shared by every config kind
//!
//! Strictness is passed explicitly as [`DecodeOptions`]. The process-wide flag
//! only provides the default for call sites that do not carry their own
//! options, and [`with_disallow_unknown_fields`] shadows it for one call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::ReentrantMutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Process-wide default for rejecting unknown fields
static DISALLOW_UNKNOWN_FIELDS: AtomicBool = AtomicBool::new(false);

/// Held for the whole span of an override, and while reading the flag,
/// so no thread observes another thread's transient value.
static DISALLOW_UNKNOWN_FIELDS_LOCK: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Options controlling how a config document is decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject fields that no part of the target type knows about
    pub strict: bool,
}

impl DecodeOptions {
    pub const fn strict() -> Self {
        Self { strict: true }
    }

    pub const fn lenient() -> Self {
        Self { strict: false }
    }

    pub const fn with_strict(strict: bool) -> Self {
        Self { strict }
    }

    /// Options derived from the process-wide default
    pub fn from_global() -> Self {
        Self {
            strict: disallow_unknown_fields(),
        }
    }
}

/// Current process-wide default for strict decoding
pub fn disallow_unknown_fields() -> bool {
    let _guard = DISALLOW_UNKNOWN_FIELDS_LOCK.lock();
    DISALLOW_UNKNOWN_FIELDS.load(Ordering::SeqCst)
}

/// Set the process-wide default for strict decoding
pub fn set_disallow_unknown_fields(value: bool) {
    let _guard = DISALLOW_UNKNOWN_FIELDS_LOCK.lock();
    DISALLOW_UNKNOWN_FIELDS.store(value, Ordering::SeqCst);
}

/// Run `f` with the process-wide default temporarily set to `value`
///
/// The previous value is restored when `f` returns or unwinds. Concurrent
/// overrides are serialized for their whole duration.
pub fn with_disallow_unknown_fields<T>(value: bool, f: impl FnOnce() -> T) -> T {
    let _guard = DISALLOW_UNKNOWN_FIELDS_LOCK.lock();
    let previous = DISALLOW_UNKNOWN_FIELDS.swap(value, Ordering::SeqCst);
    let _restore = RestoreFlag(previous);
    f()
}

struct RestoreFlag(bool);

impl Drop for RestoreFlag {
    fn drop(&mut self) {
        DISALLOW_UNKNOWN_FIELDS.store(self.0, Ordering::SeqCst);
    }
}

/// Borrow `value` as an object, failing with the config kind in the error
pub(crate) fn as_object<'a>(
    value: &'a Value,
    kind: &'static str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value.as_object().ok_or(ConfigError::NotAnObject { kind })
}

/// Read the `type` tag of a tagged document
pub(crate) fn read_tag<'a>(
    object: &'a Map<String, Value>,
    kind: &'static str,
) -> Result<&'a str, ConfigError> {
    match object.get("type") {
        None | Some(Value::Null) => Err(ConfigError::EmptyType { kind }),
        Some(Value::String(tag)) if tag.is_empty() => Err(ConfigError::EmptyType { kind }),
        Some(Value::String(tag)) => Ok(tag),
        Some(other) => Err(ConfigError::UnknownType {
            kind,
            tag: other.to_string(),
        }),
    }
}

/// Parse raw bytes into a JSON value
pub(crate) fn parse_json(bytes: &[u8]) -> Result<Value, ConfigError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes one document into several structs and tracks the fields none of
/// them claimed.
///
/// A top-level key is unknown when every part ignored it. A nested path is
/// reported only by the part that owns its parent, so any nested report is
/// unknown.
pub(crate) struct FieldTracker {
    kind: &'static str,
    reserved: &'static [&'static str],
    parts: usize,
    top_level: BTreeMap<String, usize>,
    nested: BTreeSet<String>,
}

impl FieldTracker {
    pub(crate) fn new(kind: &'static str, reserved: &'static [&'static str]) -> Self {
        Self {
            kind,
            reserved,
            parts: 0,
            top_level: BTreeMap::new(),
            nested: BTreeSet::new(),
        }
    }

    pub(crate) fn decode<T: DeserializeOwned>(&mut self, value: &Value) -> Result<T, ConfigError> {
        self.parts += 1;
        let top_level = &mut self.top_level;
        let nested = &mut self.nested;
        let decoded = serde_ignored::deserialize(value, |path| match path {
            serde_ignored::Path::Map {
                parent: serde_ignored::Path::Root,
                key,
            } => *top_level.entry(key).or_default() += 1,
            other => {
                nested.insert(other.to_string());
            }
        })?;
        Ok(decoded)
    }

    pub(crate) fn finish(self, options: DecodeOptions) -> Result<(), ConfigError> {
        if !options.strict {
            return Ok(());
        }
        let mut fields: Vec<String> = self
            .top_level
            .into_iter()
            .filter(|(key, ignored_by)| {
                *ignored_by == self.parts && !self.reserved.contains(&key.as_str())
            })
            .map(|(key, _)| key)
            .collect();
        fields.extend(self.nested);
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::UnknownFields {
                kind: self.kind,
                fields,
            })
        }
    }
}

/// Serialization shape of a tagged config: the tag followed by the flattened
/// fields of each part.
#[derive(Serialize)]
pub(crate) struct Tagged<'a, B: Serialize, S: Serialize> {
    #[serde(rename = "type")]
    pub tag: &'a str,
    #[serde(flatten)]
    pub base: &'a B,
    #[serde(flatten)]
    pub spec: &'a S,
}

/// Stand-in part for tagged configs that have a single body
#[derive(Serialize)]
pub(crate) struct NoFields {}
