//! Interpreter module
//!
//! This module contains the tree-walking evaluator, its environment model,
//! runtime values, errors, and the string expansion engine.

pub mod control_flow;
pub mod environment;
pub mod errors;
pub mod evaluator;
pub mod expansion;
pub mod functions;
pub mod operators;
pub mod types;

pub use environment::{Environment, WeakEnvironment};
pub use errors::{EngineError, EngineResult, LimitType};
pub use evaluator::{evaluate, Interpreter};
pub use expansion::{expand_braces, expand_string};
pub use types::{Builtin, CapturedEnv, Closure, ExecutionLimits, Value, WritebackMode};
