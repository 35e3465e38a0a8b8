//! Variable resolvers consulted by the interpreter.
//!
//! An activation maps names to values. Resolvers may return a present
//! value, an explicit unknown (partial state), or nothing; what a missing
//! name means (unknown sentinel vs unbound error) is a runtime option.
//!
//! Activations are not required to be thread-safe; evaluate a shared
//! program concurrently with distinct activations.

use indexmap::IndexMap;

use crate::value::Value;

/// A name-to-value binding provider.
pub trait Activation {
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// Resolver-function activation.
pub struct FnActivation<F>(pub F);

impl<F> Activation for FnActivation<F>
where
    F: Fn(&str) -> Option<Value>,
{
    fn resolve(&self, name: &str) -> Option<Value> {
        (self.0)(name)
    }
}

/// Resolves nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyActivation;

impl Activation for EmptyActivation {
    fn resolve(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Map-backed activation. Dotted names are bound as whole identifiers
/// (`resource.name` is one binding, not a nested lookup).
#[derive(Clone, Debug, Default)]
pub struct MapActivation {
    bindings: IndexMap<String, Value>,
}

impl MapActivation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Activation for MapActivation {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned()
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for MapActivation {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            bindings: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// Two-level activation: primary first, then secondary.
pub struct HierarchicalActivation<'a> {
    primary: &'a dyn Activation,
    secondary: &'a dyn Activation,
}

impl<'a> HierarchicalActivation<'a> {
    pub fn new(primary: &'a dyn Activation, secondary: &'a dyn Activation) -> Self {
        Self { primary, secondary }
    }
}

impl Activation for HierarchicalActivation<'_> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.primary
            .resolve(name)
            .or_else(|| self.secondary.resolve(name))
    }
}

/// Partial-state activation: names matching an unknown pattern resolve to
/// an unknown sentinel instead of being absent.
///
/// A pattern is either an exact name or a `prefix.*` wildcard covering the
/// prefix itself and everything under it.
pub struct PartialActivation<A> {
    inner: A,
    unknown_patterns: Vec<String>,
}

impl<A: Activation> PartialActivation<A> {
    pub fn new(inner: A, unknown_patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            inner,
            unknown_patterns: unknown_patterns.into_iter().map(Into::into).collect(),
        }
    }

    fn is_unknown(&self, name: &str) -> bool {
        self.unknown_patterns.iter().any(|pattern| {
            match pattern.strip_suffix(".*") {
                Some(prefix) => {
                    name == prefix || name.strip_prefix(prefix).is_some_and(|r| r.starts_with('.'))
                }
                None => name == pattern,
            }
        })
    }
}

impl<A: Activation> Activation for PartialActivation<A> {
    fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.inner.resolve(name) {
            return Some(value);
        }
        self.is_unknown(name).then(|| Value::unknown(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_activation_resolves_dotted_names() {
        let activation = MapActivation::new()
            .bind("x", Value::Int(1))
            .bind("resource.name", Value::string("/groups/admin"));
        assert_eq!(activation.resolve("x"), Some(Value::Int(1)));
        assert_eq!(
            activation.resolve("resource.name"),
            Some(Value::string("/groups/admin"))
        );
        assert_eq!(activation.resolve("resource"), None);
    }

    #[test]
    fn hierarchical_prefers_primary() {
        let primary = MapActivation::new().bind("x", Value::Int(1));
        let secondary = MapActivation::new()
            .bind("x", Value::Int(2))
            .bind("y", Value::Int(3));
        let activation = HierarchicalActivation::new(&primary, &secondary);
        assert_eq!(activation.resolve("x"), Some(Value::Int(1)));
        assert_eq!(activation.resolve("y"), Some(Value::Int(3)));
        assert_eq!(activation.resolve("z"), None);
    }

    #[test]
    fn closure_as_activation() {
        let activation = FnActivation(|name: &str| (name == "n").then_some(Value::Int(7)));
        assert_eq!(activation.resolve("n"), Some(Value::Int(7)));
        assert_eq!(activation.resolve("m"), None);
    }

    #[test]
    fn partial_activation_marks_unknowns() {
        let inner = MapActivation::new().bind("known", Value::Int(1));
        let partial = PartialActivation::new(inner, ["request.*", "flag"]);

        assert_eq!(partial.resolve("known"), Some(Value::Int(1)));
        assert!(partial.resolve("request.user").unwrap().is_unknown());
        assert!(partial.resolve("request").unwrap().is_unknown());
        assert!(partial.resolve("flag").unwrap().is_unknown());
        assert_eq!(partial.resolve("requestor"), None);
        assert_eq!(partial.resolve("other"), None);
    }
}
