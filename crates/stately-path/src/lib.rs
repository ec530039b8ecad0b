//! Stately Path
//!
//! Data-flow primitives shared by the definition model and the interpreter:
//!
//! - [`Path`]: JSONPath parsing, evaluation and result injection
//! - [`Selector`]: path-or-DISCARD fields (`InputPath`, `OutputPath`, `ResultPath`)
//! - [`PayloadTemplate`]: `Parameters` / `ItemSelector` / `ResultSelector`
//! - [`IntrinsicCall`]: the `States.*` intrinsic function library
//! - [`context`]: well-known `$$` paths

pub mod context;
mod error;
mod intrinsics;
mod path;
mod payload;
mod random;
pub mod selector;

pub use error::PathError;
pub use intrinsics::{Function, IntrinsicCall};
pub use path::{Filter, FilterOp, Path, Root, Segment, UnionKey, type_name};
pub use payload::PayloadTemplate;
pub use random::{FixedRandom, RandomSource, SeededRandom, ThreadRandom};
pub use selector::Selector;
