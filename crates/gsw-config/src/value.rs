use std::collections::BTreeMap;
use std::fmt;

use gsw_core::errors::{ErrorInfo, SweepError};
use serde::{Deserialize, Serialize};

use crate::key::{to_storage_key, StorageKey};
use crate::schema::OptionKind;

/// Value of a single configuration option.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Integer scalar.
    Int(i64),
    /// String scalar.
    Str(String),
    /// Ordered list of strings.
    StrList(Vec<String>),
}

impl OptionValue {
    /// Kind of the value, as declared in schemas.
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Int(_) => OptionKind::Int,
            OptionValue::Str(_) => OptionKind::Str,
            OptionValue::StrList(_) => OptionKind::StrList,
        }
    }

    /// Integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(value) => Some(value),
            _ => None,
        }
    }

    /// List payload, if any.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::StrList(values) => Some(values),
            _ => None,
        }
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(values: Vec<String>) -> Self {
        OptionValue::StrList(values)
    }
}

/// One point of a sweep: an immutable, totally ordered map of option name to value.
///
/// Field order is the name order of the underlying `BTreeMap`, so two
/// configurations with equal fields are equal, hash equally and encode to
/// the same storage key regardless of how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    options: BTreeMap<String, OptionValue>,
}

impl Configuration {
    pub(crate) fn from_map(options: BTreeMap<String, OptionValue>) -> Self {
        Self { options }
    }

    /// Raw value of an option.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// Iterates options in canonical (name) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.options
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether the configuration has no options.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Integer option, failing if missing or of another kind.
    pub fn int(&self, name: &str) -> Result<i64, SweepError> {
        self.typed(name, OptionKind::Int, OptionValue::as_int)
    }

    /// String option, failing if missing or of another kind.
    pub fn str(&self, name: &str) -> Result<&str, SweepError> {
        self.typed(name, OptionKind::Str, OptionValue::as_str)
    }

    /// List option, failing if missing or of another kind.
    pub fn str_list(&self, name: &str) -> Result<&[String], SweepError> {
        self.typed(name, OptionKind::StrList, OptionValue::as_list)
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        kind: OptionKind,
        extract: impl FnOnce(&'a OptionValue) -> Option<T>,
    ) -> Result<T, SweepError> {
        let value = self.options.get(name).ok_or_else(|| {
            SweepError::ConfigInvalid(
                ErrorInfo::new("missing_option", format!("option `{name}` is not set"))
                    .with_context("option", name),
            )
        })?;
        let found = value.kind();
        extract(value).ok_or_else(|| {
            SweepError::ConfigInvalid(
                ErrorInfo::new(
                    "option_kind",
                    format!("option `{name}` is {found}, expected {kind}"),
                )
                .with_context("option", name),
            )
        })
    }

    /// Flat `--name value...` token stream for this configuration.
    pub fn to_arg_list(&self) -> ArgList {
        crate::codec::to_arg_list(self)
    }

    /// Canonical storage key for this configuration.
    pub fn storage_key(&self) -> StorageKey {
        to_storage_key(self)
    }
}

impl<K: Into<String>> FromIterator<(K, OptionValue)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, OptionValue)>>(iter: I) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }
}

/// Command-line style representation of a configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgList(Vec<String>);

impl ArgList {
    /// Creates an empty token stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps existing tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Appends `--name value`.
    pub fn with_scalar(mut self, name: &str, value: impl ToString) -> Self {
        self.0.push(format!("--{name}"));
        self.0.push(value.to_string());
        self
    }

    /// Appends `--name item...`.
    pub fn with_list<S: AsRef<str>>(mut self, name: &str, items: &[S]) -> Self {
        self.0.push(format!("--{name}"));
        self.0
            .extend(items.iter().map(|item| item.as_ref().to_string()));
        self
    }

    /// Appends the tokens for one option value.
    pub fn push_option(&mut self, name: &str, value: &OptionValue) {
        self.0.push(format!("--{name}"));
        match value {
            OptionValue::Int(value) => self.0.push(value.to_string()),
            OptionValue::Str(value) => self.0.push(value.clone()),
            OptionValue::StrList(values) => self.0.extend(values.iter().cloned()),
        }
    }

    /// Token slice.
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the stream is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the list, returning its tokens.
    pub fn into_tokens(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}
