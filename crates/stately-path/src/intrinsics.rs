//! Intrinsic functions (`States.Format(...)`, `States.Array(...)`, ...).
//!
//! An intrinsic expression is parsed once into an [`IntrinsicCall`] tree whose
//! arguments are literals, paths, or nested calls. Evaluation is pure apart
//! from `States.UUID` and unseeded `States.MathRandom`, which draw from the
//! supplied [`RandomSource`].

use md5::Md5;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::PathError;
use crate::path::{Path, type_name};
use crate::random::RandomSource;

const MAX_RANGE_ITEMS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
  Format,
  StringToJson,
  JsonToString,
  Array,
  ArrayPartition,
  ArrayContains,
  ArrayRange,
  ArrayGetItem,
  ArrayLength,
  ArrayUnique,
  Base64Encode,
  Base64Decode,
  Hash,
  JsonMerge,
  MathRandom,
  MathAdd,
  StringSplit,
  Uuid,
}

impl Function {
  const ALL: [Function; 18] = [
    Function::Format,
    Function::StringToJson,
    Function::JsonToString,
    Function::Array,
    Function::ArrayPartition,
    Function::ArrayContains,
    Function::ArrayRange,
    Function::ArrayGetItem,
    Function::ArrayLength,
    Function::ArrayUnique,
    Function::Base64Encode,
    Function::Base64Decode,
    Function::Hash,
    Function::JsonMerge,
    Function::MathRandom,
    Function::MathAdd,
    Function::StringSplit,
    Function::Uuid,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      Function::Format => "States.Format",
      Function::StringToJson => "States.StringToJson",
      Function::JsonToString => "States.JsonToString",
      Function::Array => "States.Array",
      Function::ArrayPartition => "States.ArrayPartition",
      Function::ArrayContains => "States.ArrayContains",
      Function::ArrayRange => "States.ArrayRange",
      Function::ArrayGetItem => "States.ArrayGetItem",
      Function::ArrayLength => "States.ArrayLength",
      Function::ArrayUnique => "States.ArrayUnique",
      Function::Base64Encode => "States.Base64Encode",
      Function::Base64Decode => "States.Base64Decode",
      Function::Hash => "States.Hash",
      Function::JsonMerge => "States.JsonMerge",
      Function::MathRandom => "States.MathRandom",
      Function::MathAdd => "States.MathAdd",
      Function::StringSplit => "States.StringSplit",
      Function::Uuid => "States.UUID",
    }
  }

  fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|f| f.name() == name)
  }

  /// Minimum and maximum argument counts.
  fn arity(&self) -> (usize, Option<usize>) {
    match self {
      Function::Format => (1, None),
      Function::Array => (0, None),
      Function::Uuid => (0, Some(0)),
      Function::StringToJson
      | Function::JsonToString
      | Function::ArrayLength
      | Function::ArrayUnique
      | Function::Base64Encode
      | Function::Base64Decode => (1, Some(1)),
      Function::ArrayPartition
      | Function::ArrayContains
      | Function::ArrayGetItem
      | Function::Hash
      | Function::MathAdd
      | Function::StringSplit => (2, Some(2)),
      Function::MathRandom => (2, Some(3)),
      Function::ArrayRange | Function::JsonMerge => (3, Some(3)),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
enum Argument {
  Literal(Value),
  /// A `States.Format` template literal split at its unescaped `{}`.
  Template(Vec<String>),
  Path(Path),
  Call(IntrinsicCall),
}

/// A parsed intrinsic function call.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrinsicCall {
  function: Function,
  args: Vec<Argument>,
}

impl IntrinsicCall {
  /// Whether a `.$` value names an intrinsic rather than a path.
  pub fn is_intrinsic(expression: &str) -> bool {
    expression.trim_start().starts_with("States.")
  }

  pub fn parse(expression: &str) -> Result<Self, PathError> {
    let mut parser = CallParser {
      expression,
      chars: expression.chars().collect(),
      pos: 0,
    };
    let call = parser.call()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
      return Err(parser.err("unexpected trailing characters"));
    }
    Ok(call)
  }

  pub fn function(&self) -> Function {
    self.function
  }

  pub fn evaluate(
    &self,
    input: &Value,
    context: &Value,
    random: &dyn RandomSource,
  ) -> Result<Value, PathError> {
    let name = self.function.name();

    if self.function == Function::Format {
      return self.format(input, context, random);
    }

    let args = self
      .args
      .iter()
      .map(|arg| resolve(arg, input, context, random))
      .collect::<Result<Vec<_>, _>>()?;

    match self.function {
      Function::Format => self.format(input, context, random),
      Function::StringToJson => {
        let text = as_str(name, &args[0])?;
        serde_json::from_str(text)
          .map_err(|e| PathError::intrinsic(name, format!("input is not valid JSON: {e}")))
      }
      Function::JsonToString => serde_json::to_string(&args[0])
        .map(Value::String)
        .map_err(|e| PathError::intrinsic(name, e.to_string())),
      Function::Array => Ok(Value::Array(args)),
      Function::ArrayPartition => {
        let items = as_array(name, &args[0])?;
        let size = as_int(name, &args[1])?;
        if size <= 0 {
          return Err(PathError::intrinsic(name, "chunk size must be positive"));
        }
        Ok(Value::Array(
          items
            .chunks(size as usize)
            .map(|chunk| Value::Array(chunk.to_vec()))
            .collect(),
        ))
      }
      Function::ArrayContains => {
        let items = as_array(name, &args[0])?;
        Ok(Value::Bool(items.contains(&args[1])))
      }
      Function::ArrayRange => {
        let start = as_int(name, &args[0])?;
        let end = as_int(name, &args[1])?;
        let step = as_int(name, &args[2])?;
        range(name, start, end, step)
      }
      Function::ArrayGetItem => {
        let items = as_array(name, &args[0])?;
        let index = as_int(name, &args[1])?;
        usize::try_from(index)
          .ok()
          .and_then(|i| items.get(i))
          .cloned()
          .ok_or_else(|| {
            PathError::intrinsic(
              name,
              format!("index {index} is out of bounds ({})", items.len()),
            )
          })
      }
      Function::ArrayLength => Ok(Value::from(as_array(name, &args[0])?.len())),
      Function::ArrayUnique => {
        let mut unique: Vec<Value> = Vec::new();
        for item in as_array(name, &args[0])? {
          if !unique.contains(item) {
            unique.push(item.clone());
          }
        }
        Ok(Value::Array(unique))
      }
      Function::Base64Encode => Ok(Value::String(base64::encode(as_str(name, &args[0])?))),
      Function::Base64Decode => {
        let bytes = base64::decode(as_str(name, &args[0])?)
          .map_err(|e| PathError::intrinsic(name, format!("invalid base64: {e}")))?;
        String::from_utf8(bytes)
          .map(Value::String)
          .map_err(|_| PathError::intrinsic(name, "decoded data is not UTF-8"))
      }
      Function::Hash => {
        let data = as_str(name, &args[0])?;
        let digest = match as_str(name, &args[1])? {
          "MD5" => hex_digest::<Md5>(data),
          "SHA-1" => hex_digest::<Sha1>(data),
          "SHA-256" => hex_digest::<Sha256>(data),
          "SHA-384" => hex_digest::<Sha384>(data),
          "SHA-512" => hex_digest::<Sha512>(data),
          other => {
            return Err(PathError::intrinsic(
              name,
              format!("unsupported hash algorithm '{other}'"),
            ));
          }
        };
        Ok(Value::String(digest))
      }
      Function::JsonMerge => {
        let (Value::Object(left), Value::Object(right)) = (&args[0], &args[1]) else {
          return Err(PathError::intrinsic(name, "both arguments must be objects"));
        };
        if args[2] != Value::Bool(false) {
          return Err(PathError::intrinsic(
            name,
            "only shallow merges are supported; the third argument must be false",
          ));
        }
        let mut merged: Map<String, Value> = left.clone();
        for (key, value) in right {
          merged.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(merged))
      }
      Function::MathRandom => {
        let start = as_int(name, &args[0])?;
        let end = as_int(name, &args[1])?;
        if start >= end {
          return Err(PathError::intrinsic(name, "start must be less than end"));
        }
        let value = match args.get(2) {
          Some(seed) => {
            let seed = as_int(name, seed)?;
            StdRng::seed_from_u64(seed as u64).gen_range(start..end)
          }
          None => {
            let (start, end) = (i128::from(start), i128::from(end));
            let offset = (random.next_f64() * (end - start) as f64).floor() as i128;
            let value = (start + offset).clamp(start, end - 1);
            i64::try_from(value)
              .map_err(|_| PathError::intrinsic(name, "random value out of range"))?
          }
        };
        Ok(Value::from(value))
      }
      Function::MathAdd => {
        let a = as_int(name, &args[0])?;
        let b = as_int(name, &args[1])?;
        a.checked_add(b)
          .map(Value::from)
          .ok_or_else(|| PathError::intrinsic(name, "integer overflow"))
      }
      Function::StringSplit => {
        let text = as_str(name, &args[0])?;
        let delimiters: Vec<char> = as_str(name, &args[1])?.chars().collect();
        Ok(Value::Array(
          text
            .split(|c| delimiters.contains(&c))
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect(),
        ))
      }
      Function::Uuid => {
        let mut bytes = [0u8; 16];
        random.fill_bytes(&mut bytes);
        Ok(Value::String(
          uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string(),
        ))
      }
    }
  }

  fn format(
    &self,
    input: &Value,
    context: &Value,
    random: &dyn RandomSource,
  ) -> Result<Value, PathError> {
    let name = self.function.name();
    let pieces = match &self.args[0] {
      Argument::Template(pieces) => pieces.clone(),
      other => {
        let template = resolve(other, input, context, random)?;
        as_str(name, &template)?
          .split("{}")
          .map(str::to_string)
          .collect()
      }
    };

    let values = self.args[1..]
      .iter()
      .map(|arg| resolve(arg, input, context, random))
      .collect::<Result<Vec<_>, _>>()?;

    let placeholders = pieces.len() - 1;
    if placeholders != values.len() {
      return Err(PathError::intrinsic(
        name,
        format!(
          "template has {placeholders} placeholders but {} arguments were given",
          values.len()
        ),
      ));
    }

    let mut out = pieces[0].clone();
    for (value, piece) in values.iter().zip(&pieces[1..]) {
      match value {
        Value::String(s) => out.push_str(s),
        Value::Number(_) | Value::Bool(_) | Value::Null => out.push_str(&value.to_string()),
        other => {
          return Err(PathError::intrinsic(
            name,
            format!("cannot format a {}", type_name(other)),
          ));
        }
      }
      out.push_str(piece);
    }
    Ok(Value::String(out))
  }
}

fn resolve(
  arg: &Argument,
  input: &Value,
  context: &Value,
  random: &dyn RandomSource,
) -> Result<Value, PathError> {
  match arg {
    Argument::Literal(value) => Ok(value.clone()),
    Argument::Template(pieces) => Ok(Value::String(pieces.join("{}"))),
    Argument::Path(path) => path.evaluate(input, context),
    Argument::Call(call) => call.evaluate(input, context, random),
  }
}

fn hex_digest<D: Digest>(data: &str) -> String {
  D::digest(data.as_bytes())
    .iter()
    .map(|byte| format!("{byte:02x}"))
    .collect()
}

fn range(name: &str, start: i64, end: i64, step: i64) -> Result<Value, PathError> {
  if step == 0 {
    return Err(PathError::intrinsic(name, "step cannot be zero"));
  }
  let mut items = Vec::new();
  let mut i = start;
  while (step > 0 && i <= end) || (step < 0 && i >= end) {
    if items.len() == MAX_RANGE_ITEMS {
      return Err(PathError::intrinsic(
        name,
        format!("range exceeds {MAX_RANGE_ITEMS} items"),
      ));
    }
    items.push(Value::from(i));
    let Some(next) = i.checked_add(step) else {
      break;
    };
    i = next;
  }
  Ok(Value::Array(items))
}

fn as_str<'v>(function: &str, value: &'v Value) -> Result<&'v str, PathError> {
  value.as_str().ok_or_else(|| {
    PathError::intrinsic(function, format!("expected a string, got {}", type_name(value)))
  })
}

fn as_array<'v>(function: &str, value: &'v Value) -> Result<&'v Vec<Value>, PathError> {
  value.as_array().ok_or_else(|| {
    PathError::intrinsic(function, format!("expected an array, got {}", type_name(value)))
  })
}

fn as_int(function: &str, value: &Value) -> Result<i64, PathError> {
  let int = value.as_i64().or_else(|| {
    value
      .as_f64()
      .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
      .map(|f| f as i64)
  });
  int.ok_or_else(|| PathError::intrinsic(function, format!("expected an integer, got {value}")))
}

struct CallParser<'a> {
  expression: &'a str,
  chars: Vec<char>,
  pos: usize,
}

impl CallParser<'_> {
  fn err(&self, message: impl Into<String>) -> PathError {
    PathError::InvalidIntrinsic {
      expression: self.expression.to_string(),
      message: message.into(),
    }
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek();
    if c.is_some() {
      self.pos += 1;
    }
    c
  }

  fn skip_ws(&mut self) {
    while self.peek().is_some_and(char::is_whitespace) {
      self.pos += 1;
    }
  }

  fn rest_starts_with(&self, prefix: &str) -> bool {
    prefix
      .chars()
      .enumerate()
      .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
  }

  fn call(&mut self) -> Result<IntrinsicCall, PathError> {
    self.skip_ws();
    let start = self.pos;
    while self
      .peek()
      .is_some_and(|c| c.is_ascii_alphanumeric() || c == '.')
    {
      self.pos += 1;
    }
    let name: String = self.chars[start..self.pos].iter().collect();
    let function =
      Function::from_name(&name).ok_or_else(|| self.err(format!("unknown function '{name}'")))?;

    self.skip_ws();
    if self.bump() != Some('(') {
      return Err(self.err(format!("expected '(' after {name}")));
    }

    let mut args = Vec::new();
    self.skip_ws();
    if self.peek() == Some(')') {
      self.pos += 1;
    } else {
      loop {
        let template = function == Function::Format && args.is_empty();
        args.push(self.argument(template)?);
        self.skip_ws();
        match self.bump() {
          Some(',') => continue,
          Some(')') => break,
          _ => return Err(self.err("expected ',' or ')' between arguments")),
        }
      }
    }

    let (min, max) = function.arity();
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
      let expected = match max {
        Some(max) if max == min => format!("{min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
      };
      return Err(self.err(format!(
        "{name} takes {expected} arguments but {} were given",
        args.len()
      )));
    }

    Ok(IntrinsicCall { function, args })
  }

  fn argument(&mut self, template: bool) -> Result<Argument, PathError> {
    self.skip_ws();
    match self.peek() {
      Some('\'') => {
        let (value, pieces) = self.string_literal()?;
        if template {
          Ok(Argument::Template(pieces))
        } else {
          Ok(Argument::Literal(Value::String(value)))
        }
      }
      Some('$') => {
        let raw = self.path_text()?;
        Path::parse(raw.trim()).map(Argument::Path)
      }
      Some(c) if c == '-' || c.is_ascii_digit() => {
        let start = self.pos;
        while self
          .peek()
          .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
          self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        serde_json::from_str::<Value>(&text)
          .ok()
          .filter(Value::is_number)
          .map(Argument::Literal)
          .ok_or_else(|| self.err(format!("invalid number '{text}'")))
      }
      _ if self.rest_starts_with("States.") => self.call().map(Argument::Call),
      _ => {
        for (keyword, value) in [
          ("true", Value::Bool(true)),
          ("false", Value::Bool(false)),
          ("null", Value::Null),
        ] {
          if self.rest_starts_with(keyword) {
            self.pos += keyword.len();
            return Ok(Argument::Literal(value));
          }
        }
        Err(self.err("expected a string, number, boolean, null, path or function call"))
      }
    }
  }

  /// Parse a single-quoted literal. Returns the unescaped text along with the
  /// pieces around each unescaped `{}`.
  fn string_literal(&mut self) -> Result<(String, Vec<String>), PathError> {
    self.pos += 1;
    let mut value = String::new();
    let mut pieces = vec![String::new()];
    loop {
      let c = self.bump().ok_or_else(|| self.err("unterminated string literal"))?;
      match c {
        '\\' => {
          let escaped = self.bump().ok_or_else(|| self.err("unterminated escape"))?;
          value.push(escaped);
          if let Some(piece) = pieces.last_mut() {
            piece.push(escaped);
          }
        }
        '\'' => return Ok((value, pieces)),
        '{' if self.peek() == Some('}') => {
          self.pos += 1;
          value.push_str("{}");
          pieces.push(String::new());
        }
        c => {
          value.push(c);
          if let Some(piece) = pieces.last_mut() {
            piece.push(c);
          }
        }
      }
    }
  }

  /// Consume a path argument up to the `,` or `)` that ends it.
  fn path_text(&mut self) -> Result<String, PathError> {
    let start = self.pos;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    while let Some(c) = self.peek() {
      match (quote, c) {
        (Some(q), c) if c == q => quote = None,
        (Some(_), _) => {}
        (None, '\'') | (None, '"') => quote = Some(c),
        (None, '[') => depth += 1,
        (None, ']') => depth = depth.saturating_sub(1),
        (None, ',') | (None, ')') if depth == 0 => break,
        _ => {}
      }
      self.pos += 1;
    }
    if quote.is_some() {
      return Err(self.err("unterminated quote in path argument"));
    }
    Ok(self.chars[start..self.pos].iter().collect())
  }
}
