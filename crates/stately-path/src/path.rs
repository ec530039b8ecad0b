//! JSONPath parsing and evaluation.
//!
//! Paths are parsed once into a small AST and evaluated against either the
//! state input (`$`) or the context object (`$$`). A path is *definite* when it
//! can select at most one value (children and indexes only); definite paths
//! yield that value or [`PathError::PathNotFound`], while indefinite paths
//! (wildcards, slices, unions, descent, filters) always yield an array of
//! every match.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::PathError;

/// Which document a path is rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
  /// `$`: the state input.
  Input,
  /// `$$`: the context object.
  Context,
}

/// Member of a bracket union such as `['a','b']` or `[0,2]`.
#[derive(Debug, Clone, PartialEq)]
pub enum UnionKey {
  Name(String),
  Index(i64),
}

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
  Child(String),
  Index(i64),
  Wildcard,
  Slice {
    start: Option<i64>,
    end: Option<i64>,
    step: i64,
  },
  Union(Vec<UnionKey>),
  /// `..name`, or `..*` when `None`.
  Descendant(Option<String>),
  Filter(Filter),
}

/// Comparison operator inside a filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

/// `[?(@.field)]` or `[?(@.field <op> literal)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  field: Vec<String>,
  comparison: Option<(FilterOp, Value)>,
}

/// A parsed path expression.
#[derive(Debug, Clone)]
pub struct Path {
  raw: String,
  root: Root,
  segments: Vec<Segment>,
}

impl PartialEq for Path {
  fn eq(&self, other: &Self) -> bool {
    self.raw == other.raw
  }
}

impl Path {
  /// Parse a path expression.
  pub fn parse(raw: &str) -> Result<Self, PathError> {
    Parser::new(raw).parse()
  }

  /// The `$` path.
  pub fn root() -> Self {
    Self {
      raw: "$".to_string(),
      root: Root::Input,
      segments: Vec::new(),
    }
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  pub fn root_kind(&self) -> Root {
    self.root
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// True when the path can select at most one value.
  pub fn is_definite(&self) -> bool {
    self
      .segments
      .iter()
      .all(|s| matches!(s, Segment::Child(_) | Segment::Index(_)))
  }

  /// True for reference paths: children and non-negative indexes only.
  ///
  /// `ResultPath` and Choice `Variable` fields must be reference paths.
  pub fn is_reference(&self) -> bool {
    self.segments.iter().all(|s| match s {
      Segment::Child(_) => true,
      Segment::Index(i) => *i >= 0,
      _ => false,
    })
  }

  /// Collect every value the path selects.
  pub fn select<'v>(&self, input: &'v Value, context: &'v Value) -> Vec<&'v Value> {
    let start = match self.root {
      Root::Input => input,
      Root::Context => context,
    };
    let mut nodes = vec![start];
    for segment in &self.segments {
      nodes = apply(segment, nodes);
      if nodes.is_empty() {
        break;
      }
    }
    nodes
  }

  /// Evaluate the path.
  ///
  /// Definite paths return the single selected value; indefinite paths
  /// return an array of all matches, possibly empty.
  pub fn evaluate(&self, input: &Value, context: &Value) -> Result<Value, PathError> {
    let nodes = self.select(input, context);
    if self.is_definite() {
      nodes
        .into_iter()
        .next()
        .cloned()
        .ok_or_else(|| PathError::PathNotFound {
          path: self.raw.clone(),
        })
    } else {
      Ok(Value::Array(nodes.into_iter().cloned().collect()))
    }
  }

  /// Whether the path selects anything at all.
  pub fn is_present(&self, input: &Value, context: &Value) -> bool {
    !self.select(input, context).is_empty()
  }

  /// Place `value` into `document` at this path, creating missing objects
  /// along the way.
  pub fn inject(&self, mut document: Value, value: Value) -> Result<Value, PathError> {
    if self.root != Root::Input || !self.is_reference() {
      return Err(PathError::ResultPathMatchFailure {
        path: self.raw.clone(),
        message: "only reference paths rooted at '$' can receive a result".to_string(),
      });
    }
    let Some((last, parents)) = self.segments.split_last() else {
      return Ok(value);
    };

    let mut slot = &mut document;
    for segment in parents {
      let current = slot;
      slot = match (segment, current) {
        (Segment::Child(name), Value::Object(map)) => map
          .entry(name.clone())
          .or_insert_with(|| Value::Object(Map::new())),
        (Segment::Index(index), Value::Array(items)) => {
          let len = items.len();
          items
            .get_mut(*index as usize)
            .ok_or_else(|| self.match_failure(format!("index {index} is out of bounds ({len})")))?
        }
        (_, other) => {
          return Err(self.match_failure(format!(
            "cannot descend into a {}",
            type_name(other)
          )));
        }
      };
    }

    match (last, slot) {
      (Segment::Child(name), Value::Object(map)) => {
        map.insert(name.clone(), value);
      }
      (Segment::Index(index), Value::Array(items)) => {
        let len = items.len();
        let item = items
          .get_mut(*index as usize)
          .ok_or_else(|| self.match_failure(format!("index {index} is out of bounds ({len})")))?;
        *item = value;
      }
      (_, other) => {
        return Err(self.match_failure(format!(
          "cannot set a field on a {}",
          type_name(other)
        )));
      }
    }
    Ok(document)
  }

  fn match_failure(&self, message: String) -> PathError {
    PathError::ResultPathMatchFailure {
      path: self.raw.clone(),
      message,
    }
  }
}

/// JSON type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

impl fmt::Display for Path {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

impl FromStr for Path {
  type Err = PathError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Path::parse(s)
  }
}

impl Serialize for Path {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.raw)
  }
}

impl<'de> Deserialize<'de> for Path {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Path::parse(&raw).map_err(serde::de::Error::custom)
  }
}

fn apply<'v>(segment: &Segment, nodes: Vec<&'v Value>) -> Vec<&'v Value> {
  let mut out = Vec::new();
  for node in nodes {
    match segment {
      Segment::Child(name) => {
        if let Some(v) = node.get(name.as_str()) {
          out.push(v);
        }
      }
      Segment::Index(index) => {
        if let Value::Array(items) = node
          && let Some(i) = normalize_index(*index, items.len())
        {
          out.push(&items[i]);
        }
      }
      Segment::Wildcard => out.extend(children(node)),
      Segment::Slice { start, end, step } => {
        if let Value::Array(items) = node {
          for i in slice_indices(items.len(), *start, *end, *step) {
            out.push(&items[i]);
          }
        }
      }
      Segment::Union(keys) => {
        for key in keys {
          match (key, node) {
            (UnionKey::Name(name), Value::Object(map)) => {
              if let Some(v) = map.get(name) {
                out.push(v);
              }
            }
            (UnionKey::Index(index), Value::Array(items)) => {
              if let Some(i) = normalize_index(*index, items.len()) {
                out.push(&items[i]);
              }
            }
            _ => {}
          }
        }
      }
      Segment::Descendant(name) => descend(node, name.as_deref(), &mut out),
      Segment::Filter(filter) => {
        out.extend(children(node).filter(|child| filter.accepts(child)));
      }
    }
  }
  out
}

fn children(node: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
  match node {
    Value::Array(items) => Box::new(items.iter()),
    Value::Object(map) => Box::new(map.values()),
    _ => Box::new(std::iter::empty()),
  }
}

fn descend<'v>(node: &'v Value, name: Option<&str>, out: &mut Vec<&'v Value>) {
  match name {
    Some(name) => {
      if let Some(v) = node.get(name).filter(|_| node.is_object()) {
        out.push(v);
      }
    }
    None => out.extend(children(node)),
  }
  for child in children(node) {
    descend(child, name, out);
  }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
  let len = len as i64;
  let i = if index < 0 { index + len } else { index };
  (0..len).contains(&i).then_some(i as usize)
}

fn slice_indices(len: usize, start: Option<i64>, end: Option<i64>, step: i64) -> Vec<usize> {
  let n = len as i64;
  let norm = |v: i64| if v < 0 { v + n } else { v };
  let mut indices = Vec::new();
  if step > 0 {
    let mut i = start.map(norm).unwrap_or(0).clamp(0, n);
    let stop = end.map(norm).unwrap_or(n).clamp(0, n);
    while i < stop {
      indices.push(i as usize);
      let Some(next) = i.checked_add(step) else {
        break;
      };
      i = next;
    }
  } else {
    let mut i = start.map(norm).unwrap_or(n - 1).clamp(-1, n - 1);
    let stop = end.map(norm).unwrap_or(-1).clamp(-1, n - 1);
    while i > stop {
      indices.push(i as usize);
      let Some(next) = i.checked_add(step) else {
        break;
      };
      i = next;
    }
  }
  indices
}

impl Filter {
  fn accepts(&self, candidate: &Value) -> bool {
    let mut current = candidate;
    for name in &self.field {
      match current.get(name.as_str()) {
        Some(v) => current = v,
        None => return false,
      }
    }
    let Some((op, literal)) = &self.comparison else {
      return true;
    };
    match op {
      FilterOp::Eq => values_equal(current, literal),
      FilterOp::Ne => !values_equal(current, literal),
      ordering => match compare(current, literal) {
        Some(ord) => match ordering {
          FilterOp::Lt => ord == Ordering::Less,
          FilterOp::Le => ord != Ordering::Greater,
          FilterOp::Gt => ord == Ordering::Greater,
          FilterOp::Ge => ord != Ordering::Less,
          FilterOp::Eq | FilterOp::Ne => false,
        },
        None => false,
      },
    }
  }
}

fn values_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
    _ => a == b,
  }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
    _ => None,
  }
}

struct Parser<'a> {
  raw: &'a str,
  chars: Vec<char>,
  pos: usize,
}

impl<'a> Parser<'a> {
  fn new(raw: &'a str) -> Self {
    Self {
      raw,
      chars: raw.chars().collect(),
      pos: 0,
    }
  }

  fn err(&self, message: impl Into<String>) -> PathError {
    PathError::invalid(self.raw, message)
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn peek_at(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek();
    if c.is_some() {
      self.pos += 1;
    }
    c
  }

  fn expect(&mut self, expected: char) -> Result<(), PathError> {
    match self.bump() {
      Some(c) if c == expected => Ok(()),
      Some(c) => Err(self.err(format!("expected '{expected}' but found '{c}'"))),
      None => Err(self.err(format!("expected '{expected}' but reached the end"))),
    }
  }

  fn skip_ws(&mut self) {
    while self.peek().is_some_and(char::is_whitespace) {
      self.pos += 1;
    }
  }

  fn parse(mut self) -> Result<Path, PathError> {
    self.expect('$')?;
    let root = if self.peek() == Some('$') {
      self.pos += 1;
      Root::Context
    } else {
      Root::Input
    };

    let mut segments = Vec::new();
    while let Some(c) = self.peek() {
      match c {
        '.' => {
          self.pos += 1;
          if self.peek() == Some('.') {
            self.pos += 1;
            if self.peek() == Some('*') {
              self.pos += 1;
              segments.push(Segment::Descendant(None));
            } else {
              let name = self.dotted_name()?;
              segments.push(Segment::Descendant(Some(name)));
            }
          } else if self.peek() == Some('*') {
            self.pos += 1;
            segments.push(Segment::Wildcard);
          } else {
            let name = self.dotted_name()?;
            segments.push(Segment::Child(name));
          }
        }
        '[' => {
          self.pos += 1;
          segments.push(self.bracket()?);
        }
        other => return Err(self.err(format!("unexpected character '{other}'"))),
      }
    }

    Ok(Path {
      raw: self.raw.to_string(),
      root,
      segments,
    })
  }

  fn dotted_name(&mut self) -> Result<String, PathError> {
    let start = self.pos;
    while self.peek().is_some_and(|c| c != '.' && c != '[') {
      self.pos += 1;
    }
    if start == self.pos {
      return Err(self.err("empty field name"));
    }
    Ok(self.chars[start..self.pos].iter().collect())
  }

  fn quoted(&mut self) -> Result<String, PathError> {
    let quote = self.bump().ok_or_else(|| self.err("unterminated string"))?;
    let mut out = String::new();
    loop {
      match self.bump() {
        Some('\\') => match self.bump() {
          Some(c) => out.push(c),
          None => return Err(self.err("unterminated string")),
        },
        Some(c) if c == quote => return Ok(out),
        Some(c) => out.push(c),
        None => return Err(self.err("unterminated string")),
      }
    }
  }

  fn bracket(&mut self) -> Result<Segment, PathError> {
    self.skip_ws();
    match self.peek() {
      Some('\'') | Some('"') => {
        let mut names = vec![self.quoted()?];
        loop {
          self.skip_ws();
          match self.bump() {
            Some(',') => {
              self.skip_ws();
              names.push(self.quoted()?);
            }
            Some(']') => break,
            _ => return Err(self.err("expected ',' or ']' after quoted name")),
          }
        }
        if names.len() == 1 {
          Ok(Segment::Child(names.remove(0)))
        } else {
          Ok(Segment::Union(names.into_iter().map(UnionKey::Name).collect()))
        }
      }
      Some('*') => {
        self.pos += 1;
        self.skip_ws();
        self.expect(']')?;
        Ok(Segment::Wildcard)
      }
      Some('?') => {
        self.pos += 1;
        self.expect('(')?;
        let body = self.filter_body()?;
        self.expect(']')?;
        Ok(Segment::Filter(self.filter(&body)?))
      }
      _ => {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ']') {
          self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.expect(']')?;
        self.numeric_bracket(text.trim())
      }
    }
  }

  fn numeric_bracket(&self, text: &str) -> Result<Segment, PathError> {
    let int = |s: &str| -> Result<i64, PathError> {
      s.trim()
        .parse::<i64>()
        .map_err(|_| self.err(format!("'{}' is not an integer", s.trim())))
    };
    let opt_int = |s: &str| -> Result<Option<i64>, PathError> {
      if s.trim().is_empty() {
        Ok(None)
      } else {
        int(s).map(Some)
      }
    };

    if text.contains(':') {
      let parts: Vec<&str> = text.split(':').collect();
      if parts.len() > 3 {
        return Err(self.err("slice takes at most three parts"));
      }
      let step = match parts.get(2) {
        Some(s) => opt_int(s)?.unwrap_or(1),
        None => 1,
      };
      if step == 0 {
        return Err(self.err("slice step cannot be zero"));
      }
      Ok(Segment::Slice {
        start: opt_int(parts[0])?,
        end: opt_int(parts[1])?,
        step,
      })
    } else if text.contains(',') {
      let keys = text
        .split(',')
        .map(|s| int(s).map(UnionKey::Index))
        .collect::<Result<Vec<_>, _>>()?;
      Ok(Segment::Union(keys))
    } else if text.is_empty() {
      Err(self.err("empty brackets"))
    } else {
      Ok(Segment::Index(int(text)?))
    }
  }

  /// Consume everything up to the `)` that closes a filter.
  fn filter_body(&mut self) -> Result<String, PathError> {
    let mut body = String::new();
    let mut quote: Option<char> = None;
    loop {
      let c = self.bump().ok_or_else(|| self.err("unterminated filter"))?;
      match (quote, c) {
        (Some(q), c) if c == q => quote = None,
        (None, '\'') | (None, '"') => quote = Some(c),
        (None, ')') if self.peek() == Some(']') => return Ok(body),
        _ => {}
      }
      body.push(c);
    }
  }

  fn filter(&self, body: &str) -> Result<Filter, PathError> {
    let body = body.trim();
    let rest = body
      .strip_prefix('@')
      .ok_or_else(|| self.err("filter expressions must start with '@'"))?;

    let chars: Vec<char> = rest.chars().collect();
    let mut pos = 0;
    let mut field = Vec::new();
    while pos < chars.len() {
      match chars[pos] {
        '.' => {
          pos += 1;
          let start = pos;
          while pos < chars.len() && !is_filter_break(chars[pos]) {
            pos += 1;
          }
          if start == pos {
            return Err(self.err("empty field name in filter"));
          }
          field.push(chars[start..pos].iter().collect());
        }
        '[' => {
          pos += 1;
          let quote = chars.get(pos).copied().filter(|c| *c == '\'' || *c == '"');
          let Some(quote) = quote else {
            return Err(self.err("filter brackets must hold a quoted name"));
          };
          pos += 1;
          let start = pos;
          while pos < chars.len() && chars[pos] != quote {
            pos += 1;
          }
          field.push(chars[start..pos].iter().collect());
          pos += 2;
        }
        _ => break,
      }
    }

    let remainder: String = chars[pos.min(chars.len())..].iter().collect();
    let remainder = remainder.trim();
    if remainder.is_empty() {
      return Ok(Filter {
        field,
        comparison: None,
      });
    }

    let (op, literal) = [
      ("==", FilterOp::Eq),
      ("!=", FilterOp::Ne),
      ("<=", FilterOp::Le),
      (">=", FilterOp::Ge),
      ("<", FilterOp::Lt),
      (">", FilterOp::Gt),
    ]
    .into_iter()
    .find_map(|(token, op)| remainder.strip_prefix(token).map(|rest| (op, rest.trim())))
    .ok_or_else(|| self.err(format!("unsupported filter operator in '{remainder}'")))?;

    let value = if let Some(inner) = literal
      .strip_prefix('\'')
      .and_then(|s| s.strip_suffix('\''))
    {
      Value::String(inner.to_string())
    } else {
      serde_json::from_str(literal)
        .map_err(|_| self.err(format!("invalid filter literal '{literal}'")))?
    };

    Ok(Filter {
      field,
      comparison: Some((op, value)),
    })
  }
}

fn is_filter_break(c: char) -> bool {
  c == '.' || c == '[' || c.is_whitespace() || matches!(c, '=' | '!' | '<' | '>')
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn eval(path: &str, input: &Value) -> Result<Value, PathError> {
    Path::parse(path).unwrap().evaluate(input, &Value::Null)
  }

  #[test]
  fn test_root_returns_whole_document() {
    let input = json!({"a": 1});
    assert_eq!(eval("$", &input).unwrap(), input);
  }

  #[test]
  fn test_child_and_index() {
    let input = json!({"a": {"b": [10, 20, 30]}, "odd key": true});
    assert_eq!(eval("$.a.b[1]", &input).unwrap(), json!(20));
    assert_eq!(eval("$.a.b[-1]", &input).unwrap(), json!(30));
    assert_eq!(eval("$['odd key']", &input).unwrap(), json!(true));
  }

  #[test]
  fn test_missing_definite_path_is_not_found() {
    let err = eval("$.missing", &json!({})).unwrap_err();
    assert_eq!(
      err,
      PathError::PathNotFound {
        path: "$.missing".to_string()
      }
    );
  }

  #[test]
  fn test_indefinite_paths_return_arrays() {
    let input = json!({"items": [{"n": 1}, {"n": 2}, {"n": 3}]});
    assert_eq!(eval("$.items[*].n", &input).unwrap(), json!([1, 2, 3]));
    assert_eq!(eval("$.items[0:2].n", &input).unwrap(), json!([1, 2]));
    assert_eq!(eval("$.items[::-1].n", &input).unwrap(), json!([3, 2, 1]));
    assert_eq!(eval("$.items[0,2].n", &input).unwrap(), json!([1, 3]));
    assert_eq!(eval("$..n", &input).unwrap(), json!([1, 2, 3]));
    assert_eq!(eval("$.nothing[*]", &input).unwrap(), json!([]));
  }

  #[test]
  fn test_slice_with_huge_step() {
    let input = json!({"a": [1, 2, 3]});
    assert_eq!(
      eval("$.a[1::9223372036854775807]", &input).unwrap(),
      json!([2])
    );
    assert_eq!(
      eval("$.a[::-9223372036854775808]", &input).unwrap(),
      json!([3])
    );
    assert_eq!(
      eval("$.a[-9223372036854775808:9223372036854775807:9223372036854775807]", &input).unwrap(),
      json!([1])
    );
  }

  #[test]
  fn test_filters() {
    let input = json!({"items": [
      {"name": "a", "price": 5},
      {"name": "b", "price": 15},
      {"name": "c"}
    ]});
    assert_eq!(
      eval("$.items[?(@.price > 10)].name", &input).unwrap(),
      json!(["b"])
    );
    assert_eq!(
      eval("$.items[?(@.price)].name", &input).unwrap(),
      json!(["a", "b"])
    );
    assert_eq!(
      eval("$.items[?(@.name == 'c')]", &input).unwrap(),
      json!([{"name": "c"}])
    );
  }

  #[test]
  fn test_context_root() {
    let context = json!({"Execution": {"Id": "exec-1"}});
    let path = Path::parse("$$.Execution.Id").unwrap();
    assert_eq!(path.root_kind(), Root::Context);
    assert_eq!(path.evaluate(&json!({}), &context).unwrap(), json!("exec-1"));
  }

  #[test]
  fn test_invalid_paths_are_rejected() {
    for raw in ["", "a.b", "$.", "$[", "$[1:2:0]", "$.a[?(b)]", "$.a[x]"] {
      assert!(Path::parse(raw).is_err(), "{raw} should not parse");
    }
  }

  #[test]
  fn test_reference_paths() {
    assert!(Path::parse("$.a.b[0]").unwrap().is_reference());
    assert!(!Path::parse("$.a[*]").unwrap().is_reference());
    assert!(!Path::parse("$.a[-1]").unwrap().is_reference());
  }

  #[test]
  fn test_inject_creates_intermediate_objects() {
    let path = Path::parse("$.result.detail").unwrap();
    let doc = path.inject(json!({"keep": 1}), json!("x")).unwrap();
    assert_eq!(doc, json!({"keep": 1, "result": {"detail": "x"}}));
  }

  #[test]
  fn test_inject_root_replaces_document() {
    let doc = Path::root().inject(json!({"a": 1}), json!([1])).unwrap();
    assert_eq!(doc, json!([1]));
  }

  #[test]
  fn test_inject_into_scalar_fails() {
    let path = Path::parse("$.a.b").unwrap();
    let err = path.inject(json!({"a": "text"}), json!(1)).unwrap_err();
    assert!(matches!(err, PathError::ResultPathMatchFailure { .. }));
  }

  #[test]
  fn test_inject_into_array_slot() {
    let path = Path::parse("$.list[1]").unwrap();
    let doc = path.inject(json!({"list": [0, 0]}), json!(9)).unwrap();
    assert_eq!(doc, json!({"list": [0, 9]}));
    assert!(path.inject(json!({"list": []}), json!(9)).is_err());
  }
}
