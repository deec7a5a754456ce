//! Named list definitions and their compilation
//!
//! Lists are declared in configuration, validated once into a
//! `ListRegistry`, and compiled per query by `ConditionCompiler`.

mod compiler;
mod definition;
mod registry;

pub use compiler::{CompiledList, ConditionCompiler};
pub use definition::{ConditionSpec, ListDefinition};
pub use registry::{ListRegistry, NamedSort, RegisteredList, TableLayout};
