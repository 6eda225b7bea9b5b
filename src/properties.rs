//! Bean-style property assignment for pluggable types.
//!
//! Data sources built from a type name are configured afterwards from a flat
//! string map. Types opt in by implementing [`Properties`], usually through
//! `#[derive(Properties)]`, which matches a property either by its field name or
//! by the camelCase form of it (`server_name` / `serverName`).

use crate::error::PropertyError;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Raw `name -> value` configuration handed to data sources and drivers.
pub type PropertyBag = BTreeMap<String, String>;

pub trait Properties {
    /// Assigns one property. Unknown names and unparsable values are errors.
    fn set_property(&mut self, name: &str, value: &str) -> Result<(), PropertyError>;
}

/// Applies every entry of `props` to `target`, stopping at the first failure.
pub fn apply_properties<P>(target: &mut P, props: &PropertyBag) -> Result<(), PropertyError>
where
    P: Properties + ?Sized,
{
    for (name, value) in props {
        target.set_property(name, value)?;
    }
    Ok(())
}

#[doc(hidden)]
pub fn parse_value<T>(name: &str, value: &str) -> Result<T, PropertyError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse::<T>().map_err(|e| PropertyError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
