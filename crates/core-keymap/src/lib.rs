//! core-keymap: command vocabulary, built-in registry and remap resolution.
//!
//! - `command`: closed `Motion` / `Operator` enums with per-variant metadata.
//! - `registry`: per-mode tries over the built-in key table.
//! - `mappings`: default and user remaps, shadowing by scope.
//! - `resolver`: user remaps first, then the registry, reporting ambiguity.
//!
//! Everything here is pure; the only side effect is TRACE/DEBUG logging under
//! the `input.map` target.

pub mod command;
mod error;
pub mod mappings;
pub mod registry;
pub mod resolver;

pub use command::{
    CommandDef, InputClass, InputKind, InputSpec, InsertKind, Motion, Operator, OperatorKind,
    Scroll, VisualKind, WindowCommand,
};
pub use error::KeymapError;
pub use mappings::{DEFAULT_REMAPS, Mapping, MappingScope, MappingTarget, Mappings};
pub use registry::{CommandRegistry, Lookup, ModeSet};
pub use resolver::{MappingResolver, ResolvedCommand, to_bare_command_name};
