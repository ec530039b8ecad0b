//! Payload templates for `Parameters`, `ItemSelector` and `ResultSelector`.
//!
//! A template is any JSON value. Object keys ending in `.$` are dynamic: the
//! suffix is dropped and the string value is evaluated as a path (or as an
//! intrinsic function when it starts with `States.`). Everything else is
//! copied through as a literal. Templates are compiled when the definition is
//! loaded and keep their source so rendering gives back the original JSON.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::PathError;
use crate::intrinsics::IntrinsicCall;
use crate::path::Path;
use crate::random::RandomSource;

#[derive(Debug, Clone, PartialEq)]
enum Node {
  Literal(Value),
  Path(Path),
  Intrinsic(IntrinsicCall),
  Object(Vec<(String, Node)>),
  Array(Vec<Node>),
}

/// A compiled payload template.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadTemplate {
  source: Value,
  root: Node,
}

impl PayloadTemplate {
  pub fn compile(source: Value) -> Result<Self, PathError> {
    let root = compile(&source)?;
    Ok(Self { source, root })
  }

  /// The template as written in the definition.
  pub fn source(&self) -> &Value {
    &self.source
  }

  /// Build the payload from the effective input and context object.
  pub fn resolve(
    &self,
    input: &Value,
    context: &Value,
    random: &dyn RandomSource,
  ) -> Result<Value, PathError> {
    resolve(&self.root, input, context, random)
  }
}

fn compile(value: &Value) -> Result<Node, PathError> {
  match value {
    Value::Object(map) => {
      let mut fields = Vec::with_capacity(map.len());
      for (key, value) in map {
        match key.strip_suffix(".$") {
          Some(name) => {
            let Value::String(expression) = value else {
              return Err(PathError::invalid(
                key,
                "fields ending in '.$' must hold a path or intrinsic function string",
              ));
            };
            let node = if IntrinsicCall::is_intrinsic(expression) {
              Node::Intrinsic(IntrinsicCall::parse(expression)?)
            } else {
              Node::Path(Path::parse(expression)?)
            };
            fields.push((name.to_string(), node));
          }
          None => fields.push((key.clone(), compile(value)?)),
        }
      }
      Ok(Node::Object(fields))
    }
    Value::Array(items) => items
      .iter()
      .map(compile)
      .collect::<Result<Vec<_>, _>>()
      .map(Node::Array),
    literal => Ok(Node::Literal(literal.clone())),
  }
}

fn resolve(
  node: &Node,
  input: &Value,
  context: &Value,
  random: &dyn RandomSource,
) -> Result<Value, PathError> {
  match node {
    Node::Literal(value) => Ok(value.clone()),
    Node::Path(path) => path.evaluate(input, context),
    Node::Intrinsic(call) => call.evaluate(input, context, random),
    Node::Object(fields) => {
      let mut out = Map::new();
      for (key, node) in fields {
        out.insert(key.clone(), resolve(node, input, context, random)?);
      }
      Ok(Value::Object(out))
    }
    Node::Array(items) => items
      .iter()
      .map(|n| resolve(n, input, context, random))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::Array),
  }
}

impl Serialize for PayloadTemplate {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.source.serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for PayloadTemplate {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let source = Value::deserialize(deserializer)?;
    PayloadTemplate::compile(source).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::random::ThreadRandom;
  use serde_json::json;

  fn resolve_with(template: Value, input: Value, context: Value) -> Result<Value, PathError> {
    PayloadTemplate::compile(template)
      .unwrap()
      .resolve(&input, &context, &ThreadRandom)
  }

  #[test]
  fn test_static_and_dynamic_fields() {
    let out = resolve_with(
      json!({
        "static": "value",
        "name.$": "$.user.name",
        "token.$": "$$.Task.Token",
        "nested": {"ids.$": "$.items[*].id", "list": [1, {"first.$": "$.items[0].id"}]}
      }),
      json!({"user": {"name": "ada"}, "items": [{"id": 1}, {"id": 2}]}),
      json!({"Task": {"Token": "tok"}}),
    )
    .unwrap();

    assert_eq!(
      out,
      json!({
        "static": "value",
        "name": "ada",
        "token": "tok",
        "nested": {"ids": [1, 2], "list": [1, {"first": 1}]}
      })
    );
  }

  #[test]
  fn test_intrinsic_fields() {
    let out = resolve_with(
      json!({"greeting.$": "States.Format('hi {}', $.name)"}),
      json!({"name": "bo"}),
      json!({}),
    )
    .unwrap();
    assert_eq!(out, json!({"greeting": "hi bo"}));
  }

  #[test]
  fn test_missing_path_fails() {
    let err = resolve_with(json!({"x.$": "$.missing"}), json!({}), json!({})).unwrap_err();
    assert!(matches!(err, PathError::PathNotFound { .. }));
  }

  #[test]
  fn test_dynamic_field_must_be_string() {
    assert!(PayloadTemplate::compile(json!({"x.$": 5})).is_err());
    assert!(PayloadTemplate::compile(json!({"x.$": "not a path"})).is_err());
  }

  #[test]
  fn test_serializes_back_to_source() {
    let source = json!({"a.$": "$.a", "b": [1, 2]});
    let template: PayloadTemplate = serde_json::from_value(source.clone()).unwrap();
    assert_eq!(serde_json::to_value(&template).unwrap(), source);
  }
}
