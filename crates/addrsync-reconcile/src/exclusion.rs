//! Exclusion sets: fields a human just typed that the reconciler must not touch.
//!
//! Keys use the `"{role}_{field}"` shape (e.g. `"shipping_city"`). A submitted
//! edit form uses the `"_{role}_{field}"` shape; [`ExclusionSet::from_submitted_form`]
//! turns every non-empty submitted address field into an exclusion.

use std::collections::BTreeSet;
use std::fmt;

use crate::{Field, Role};

/// A key that does not name a known (role, field) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionParseError {
    pub raw: String,
}

impl fmt::Display for ExclusionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exclusion key '{}' is not of the form <billing|shipping>_<field>",
            self.raw
        )
    }
}

impl std::error::Error for ExclusionParseError {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    pairs: BTreeSet<(Role, Field)>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: Role, field: Field) {
        self.pairs.insert((role, field));
    }

    pub fn contains(&self, role: Role, field: Field) -> bool {
        self.pairs.contains(&(role, field))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Keys in `"{role}_{field}"` form, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.pairs
            .iter()
            .map(|(r, f)| format!("{r}_{f}"))
            .collect()
    }

    /// Parse a single `"{role}_{field}"` key.
    pub fn parse_key(raw: &str) -> Result<(Role, Field), ExclusionParseError> {
        let t = raw.trim();
        let err = || ExclusionParseError { raw: raw.to_string() };

        let (role_str, field_str) = t.split_once('_').ok_or_else(err)?;
        let role: Role = role_str.parse().map_err(|_| err())?;
        let field: Field = field_str.parse().map_err(|_| err())?;
        Ok((role, field))
    }

    /// Parse every key; the first malformed key fails the whole set.
    pub fn parse<I, S>(keys: I) -> Result<Self, ExclusionParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for k in keys {
            let (role, field) = Self::parse_key(k.as_ref())?;
            set.insert(role, field);
        }
        Ok(set)
    }

    /// Derive exclusions from a submitted order-edit form.
    ///
    /// Only keys of the form `_{role}_{field}` with a non-empty value count;
    /// everything else in the form is ignored.
    pub fn from_submitted_form<'a, I>(form: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::new();
        for (key, value) in form {
            if value.is_empty() {
                continue;
            }
            let Some(stripped) = key.strip_prefix('_') else {
                continue;
            };
            if let Ok((role, field)) = Self::parse_key(stripped) {
                set.insert(role, field);
            }
        }
        set
    }
}

impl FromIterator<(Role, Field)> for ExclusionSet {
    fn from_iter<T: IntoIterator<Item = (Role, Field)>>(iter: T) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}
