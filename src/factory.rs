//! Type-name based instantiation.
//!
//! Pluggable implementations (data sources, strategies) register one or more
//! constructors under a string name, normally through the `#[constructor]`
//! attribute which runs the registration before `main`. Configuration then
//! names the type and [`instantiate`] picks the constructor whose parameter
//! types equal the runtime types of the supplied [`Args`].
//!
//! This is the only module that deals in `dyn Any`.

use crate::error::{BoxError, ProvisioningError};
use dashmap::DashMap;
use std::any::{Any, TypeId, type_name};
use std::collections::VecDeque;
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Returns the process-wide constructor registry.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Builds an instance of the type registered as `type_name`.
///
/// An empty name means nothing is configured and yields `Ok(None)`.
pub fn instantiate<T: Any>(type_name: &str, args: Args) -> Result<Option<T>, ProvisioningError> {
    registry().instantiate(type_name, args)
}

/// A constructor parameter type.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    id: TypeId,
    name: &'static str,
}

impl Param {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Positional constructor arguments, typed at runtime.
#[derive(Default)]
pub struct Args {
    values: VecDeque<(Param, Box<dyn Any + Send>)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send>(mut self, value: T) -> Self {
        self.values.push_back((Param::of::<T>(), Box::new(value)));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the next argument. Used by generated constructor glue.
    pub fn next<T: Any>(&mut self) -> Result<T, BoxError> {
        let (param, value) = self
            .values
            .pop_front()
            .ok_or_else(|| format!("missing argument of type {}", type_name::<T>()))?;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            format!(
                "argument of type {} where {} was expected",
                param.name,
                type_name::<T>()
            )
            .into()
        })
    }

    fn params(&self) -> impl Iterator<Item = &Param> {
        self.values.iter().map(|(p, _)| p)
    }

    fn signature(&self) -> String {
        signature(self.params())
    }
}

type BuildFn = dyn Fn(&mut Args) -> Result<Box<dyn Any + Send>, BoxError> + Send + Sync;

/// One way of building a registered type.
pub struct Constructor {
    params: Vec<Param>,
    produces: &'static str,
    build: Box<BuildFn>,
}

impl Constructor {
    pub fn new<T, F>(params: Vec<Param>, build: F) -> Self
    where
        T: Any + Send,
        F: Fn(&mut Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            params,
            produces: type_name::<T>(),
            build: Box::new(move |args: &mut Args| {
                build(args).map(|v| Box::new(v) as Box<dyn Any + Send>)
            }),
        }
    }

    /// A constructor without parameters.
    pub fn nullary<T, F>(build: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(Vec::new(), move |_| Ok(build()))
    }

    pub fn signature(&self) -> String {
        signature(self.params.iter())
    }

    pub fn produces(&self) -> &'static str {
        self.produces
    }

    fn accepts(&self, args: &Args) -> bool {
        self.params.len() == args.len() && self.params.iter().zip(args.params()).all(|(a, b)| a == b)
    }
}

fn signature<'a>(params: impl Iterator<Item = &'a Param>) -> String {
    params.map(|p| p.name).collect::<Vec<_>>().join(", ")
}

/// Maps type names to their constructors.
pub struct Registry {
    types: DashMap<String, Vec<Arc<Constructor>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
        }
    }

    /// Adds a constructor for `type_name`. A constructor with the same
    /// parameter signature replaces the earlier one.
    pub fn register(&self, type_name: &str, constructor: Constructor) {
        debug!(
            "registering constructor: type={}, params=({}), produces={}",
            type_name,
            constructor.signature(),
            constructor.produces
        );
        let mut entry = self.types.entry(type_name.to_string()).or_default();
        entry.retain(|c| c.params != constructor.params);
        entry.push(Arc::new(constructor));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn instantiate<T: Any>(
        &self,
        type_name: &str,
        mut args: Args,
    ) -> Result<Option<T>, ProvisioningError> {
        let type_name = type_name.trim();
        if type_name.is_empty() {
            return Ok(None);
        }

        // Clone the constructor out so the map guard is released before user code runs.
        let constructor = {
            let ctors = self
                .types
                .get(type_name)
                .ok_or_else(|| ProvisioningError::TypeNotFound(type_name.to_string()))?;
            ctors
                .iter()
                .find(|c| c.accepts(&args))
                .cloned()
                .ok_or_else(|| ProvisioningError::NoMatchingConstructor {
                    type_name: type_name.to_string(),
                    signature: args.signature(),
                })?
        };

        trace!("instantiating {}({})", type_name, constructor.signature());
        let instance =
            (constructor.build)(&mut args).map_err(|source| ProvisioningError::Construction {
                type_name: type_name.to_string(),
                source,
            })?;

        instance
            .downcast::<T>()
            .map(|v| Some(*v))
            .map_err(|_| ProvisioningError::TypeMismatch {
                type_name: type_name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct Backoff {
        attempts: u32,
        delay: Duration,
    }

    fn backoff_registry() -> Registry {
        let registry = Registry::new();
        registry.register(
            "retry.Backoff",
            Constructor::nullary(|| Backoff {
                attempts: 3,
                delay: Duration::from_millis(100),
            }),
        );
        registry.register(
            "retry.Backoff",
            Constructor::new(vec![Param::of::<u32>(), Param::of::<Duration>()], |args| {
                Ok(Backoff {
                    attempts: args.next::<u32>()?,
                    delay: args.next::<Duration>()?,
                })
            }),
        );
        registry
    }

    #[test]
    fn test_empty_name_is_not_configured() {
        let registry = backoff_registry();
        let result = registry.instantiate::<Backoff>("", Args::new()).unwrap();
        assert!(result.is_none());
        let result = registry.instantiate::<Backoff>("  ", Args::new()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_unknown_type() {
        let registry = backoff_registry();
        let err = registry
            .instantiate::<Backoff>("com.example.NoSuchType", Args::new())
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::TypeNotFound(name) if name == "com.example.NoSuchType"));
    }

    #[test]
    fn test_constructor_selected_by_argument_types() {
        let registry = backoff_registry();

        let default = registry
            .instantiate::<Backoff>("retry.Backoff", Args::new())
            .unwrap()
            .unwrap();
        assert_eq!(default.attempts, 3);

        let custom = registry
            .instantiate::<Backoff>(
                "retry.Backoff",
                Args::new().with(7u32).with(Duration::from_secs(1)),
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            custom,
            Backoff {
                attempts: 7,
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn test_no_matching_constructor() {
        let registry = backoff_registry();
        let err = registry
            .instantiate::<Backoff>("retry.Backoff", Args::new().with(7i64))
            .unwrap_err();
        match err {
            ProvisioningError::NoMatchingConstructor { type_name, signature } => {
                assert_eq!(type_name, "retry.Backoff");
                assert_eq!(signature, "i64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constructor_failure_keeps_cause() {
        let registry = Registry::new();
        registry.register(
            "broken.Type",
            Constructor::new(Vec::new(), |_| -> Result<u8, BoxError> {
                Err("refusing to build".into())
            }),
        );
        let err = registry.instantiate::<u8>("broken.Type", Args::new()).unwrap_err();
        assert!(matches!(&err, ProvisioningError::Construction { type_name, .. } if type_name == "broken.Type"));
        let cause = std::error::Error::source(&err).unwrap();
        assert_eq!(cause.to_string(), "refusing to build");
    }

    #[test]
    fn test_type_mismatch() {
        let registry = backoff_registry();
        let err = registry
            .instantiate::<String>("retry.Backoff", Args::new())
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::TypeMismatch { .. }));
    }

    #[test]
    fn test_same_signature_replaces() {
        let registry = Registry::new();
        registry.register("n", Constructor::nullary(|| 1u8));
        registry.register("n", Constructor::nullary(|| 2u8));
        assert_eq!(registry.instantiate::<u8>("n", Args::new()).unwrap(), Some(2));
        assert!(registry.contains("n"));
    }
}
