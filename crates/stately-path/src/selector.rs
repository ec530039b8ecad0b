//! `InputPath` / `OutputPath` / `ResultPath` selectors.
//!
//! These fields accept either a path or an explicit JSON `null`. A `null`
//! is the DISCARD sentinel: it selects `{}` when reading and leaves the
//! document untouched when writing. An absent field is not the same thing
//! and behaves like `$`, so definitions keep `Option<Selector>` and use
//! [`nullable`] to tell the two apart.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::PathError;
use crate::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
  Discard,
  Path(Path),
}

impl Selector {
  /// Read through the selector. DISCARD yields an empty object.
  pub fn select(&self, input: &Value, context: &Value) -> Result<Value, PathError> {
    match self {
      Selector::Discard => Ok(Value::Object(Map::new())),
      Selector::Path(path) => path.evaluate(input, context),
    }
  }

  /// Write `result` into `document` through the selector. DISCARD returns the
  /// document unchanged.
  pub fn inject(&self, document: Value, result: Value) -> Result<Value, PathError> {
    match self {
      Selector::Discard => Ok(document),
      Selector::Path(path) => path.inject(document, result),
    }
  }

  pub fn path(&self) -> Option<&Path> {
    match self {
      Selector::Discard => None,
      Selector::Path(path) => Some(path),
    }
  }
}

impl Default for Selector {
  fn default() -> Self {
    Selector::Path(Path::root())
  }
}

impl Serialize for Selector {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Selector::Discard => serializer.serialize_unit(),
      Selector::Path(path) => path.serialize(serializer),
    }
  }
}

impl<'de> Deserialize<'de> for Selector {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Ok(match Option::<Path>::deserialize(deserializer)? {
      Some(path) => Selector::Path(path),
      None => Selector::Discard,
    })
  }
}

/// `deserialize_with` helper that maps an explicit `null` to
/// `Some(Selector::Discard)`. Pair it with `#[serde(default)]` so an absent
/// field stays `None`.
pub fn nullable<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Selector>, D::Error> {
  Selector::deserialize(deserializer).map(Some)
}

/// Resolve an optional selector, treating absence as `$`.
pub fn or_root(selector: Option<&Selector>) -> Selector {
  selector.cloned().unwrap_or_default()
}
