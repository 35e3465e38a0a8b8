//! Standard library bindings.
//!
//! Each module registers the runtime counterparts of the declarations in
//! `celang-compiler`'s standard environment, keyed by the same overload
//! ids.

mod arith;
mod collections;
mod comparisons;
mod conversions;
mod datetime;
mod logic;
mod optional;
mod strings;

pub use datetime::{format_duration, parse_duration};

pub(crate) use arith::concat_overloads;

use crate::registry::{FunctionRegistry, RegistryError};

/// Register the whole standard library.
pub fn register_all(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    logic::register(registry)?;
    comparisons::register(registry)?;
    arith::register(registry)?;
    collections::register(registry)?;
    strings::register(registry)?;
    conversions::register(registry)?;
    datetime::register(registry)?;
    optional::register(registry)?;
    Ok(())
}
