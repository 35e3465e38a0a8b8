//! Namespace container for resolving unqualified identifiers.
//!
//! A container is the lexical namespace an expression is compiled in.
//! Resolution of `R.s` under container `a.b.c.M.N` tries the candidates
//! `a.b.c.M.N.R.s`, `a.b.c.M.R.s`, `a.b.c.R.s`, `a.b.R.s`, `a.R.s`, `R.s`
//! in that order. A leading dot makes a name absolute (single candidate),
//! and an alias on the first segment collapses resolution to one candidate.

use indexmap::IndexMap;

/// Errors reported by [`ContainerBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    #[error("container name '{0}' contains an empty segment")]
    InvalidContainerName(String),

    #[error("alias '{0}' must be a single non-empty identifier segment")]
    InvalidAliasName(String),

    #[error("alias target '{0}' must be qualified and must not start with '.'")]
    InvalidAliasTarget(String),

    #[error("alias '{0}' collides with the container prefix '{1}'")]
    AliasCollidesWithContainer(String, String),

    #[error("duplicate alias '{0}'")]
    DuplicateAlias(String),
}

/// Lexical namespace with aliases and abbreviations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Container {
    name: String,
    aliases: IndexMap<String, String>,
}

impl Container {
    /// The root (empty) container.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn builder(name: impl Into<String>) -> ContainerBuilder {
        ContainerBuilder {
            name: name.into(),
            aliases: IndexMap::new(),
            abbreviations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &IndexMap<String, String> {
        &self.aliases
    }

    /// Ordered candidate names for resolving `name` in this container,
    /// most specific first.
    pub fn resolve_candidate_names(&self, name: &str) -> Vec<String> {
        if let Some(absolute) = name.strip_prefix('.') {
            return vec![absolute.to_owned()];
        }

        let first_segment = name.split('.').next().unwrap_or(name);
        if let Some(target) = self.aliases.get(first_segment) {
            let rest = &name[first_segment.len()..];
            return vec![format!("{target}{rest}")];
        }

        let mut candidates = Vec::new();
        let mut prefix = self.name.as_str();
        while !prefix.is_empty() {
            candidates.push(format!("{prefix}.{name}"));
            prefix = match prefix.rfind('.') {
                Some(idx) => &prefix[..idx],
                None => "",
            };
        }
        candidates.push(name.to_owned());
        candidates
    }
}

/// Validating builder for [`Container`].
pub struct ContainerBuilder {
    name: String,
    aliases: IndexMap<String, String>,
    abbreviations: Vec<String>,
}

impl ContainerBuilder {
    /// Register `alias` as shorthand for the qualified name `target`.
    pub fn alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    /// Register an abbreviation: the last segment of `qualified` becomes an
    /// alias for the whole name.
    pub fn abbreviation(mut self, qualified: impl Into<String>) -> Self {
        self.abbreviations.push(qualified.into());
        self
    }

    pub fn build(self) -> Result<Container, ContainerError> {
        let name = self.name;
        if !name.is_empty() && name.split('.').any(|seg| !is_identifier(seg)) {
            return Err(ContainerError::InvalidContainerName(name));
        }

        let container_prefix = name.split('.').next().unwrap_or("").to_owned();
        let mut aliases: IndexMap<String, String> = IndexMap::new();

        let mut add = |alias: String, target: String| -> Result<(), ContainerError> {
            if !is_identifier(&alias) {
                return Err(ContainerError::InvalidAliasName(alias));
            }
            if target.starts_with('.') || !target.contains('.') {
                return Err(ContainerError::InvalidAliasTarget(target));
            }
            if !container_prefix.is_empty() && alias == container_prefix {
                return Err(ContainerError::AliasCollidesWithContainer(
                    alias,
                    container_prefix.clone(),
                ));
            }
            if aliases.contains_key(&alias) {
                return Err(ContainerError::DuplicateAlias(alias));
            }
            aliases.insert(alias, target);
            Ok(())
        };

        for (alias, target) in self.aliases {
            add(alias, target)?;
        }
        for qualified in self.abbreviations {
            let last = qualified.rsplit('.').next().unwrap_or("").to_owned();
            add(last, qualified)?;
        }

        Ok(Container { name, aliases })
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
