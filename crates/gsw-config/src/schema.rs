use std::collections::BTreeMap;
use std::fmt;

use gsw_core::errors::{ErrorInfo, SweepError};
use serde::{Deserialize, Serialize};

use crate::codec::from_arg_list;
use crate::value::{ArgList, Configuration, OptionValue};

/// Declared type of a schema option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionKind {
    /// Integer scalar.
    Int,
    /// String scalar.
    Str,
    /// List of strings (zero or more tokens).
    StrList,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Int => write!(f, "int"),
            OptionKind::Str => write!(f, "string"),
            OptionKind::StrList => write!(f, "list"),
        }
    }
}

/// Default applied when an option is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// The option must be given explicitly.
    Required,
    /// Integer default.
    Int(i64),
    /// String default.
    Str(&'static str),
    /// Lists default to empty.
    EmptyList,
}

/// Declaration of one recognized option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Option name without the leading `--`.
    pub name: &'static str,
    /// Declared kind.
    pub kind: OptionKind,
    /// Value used when the option is omitted.
    pub default: DefaultValue,
    /// One-line help text.
    pub help: &'static str,
}

impl OptionSpec {
    /// Integer option with a default.
    pub const fn int(name: &'static str, default: i64, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Int,
            default: DefaultValue::Int(default),
            help,
        }
    }

    /// Integer option that must be supplied.
    pub const fn required_int(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Int,
            default: DefaultValue::Required,
            help,
        }
    }

    /// String option with a default.
    pub const fn string(name: &'static str, default: &'static str, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Str,
            default: DefaultValue::Str(default),
            help,
        }
    }

    /// List option, empty unless given.
    pub const fn list(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::StrList,
            default: DefaultValue::EmptyList,
            help,
        }
    }

    /// Materialized default, `None` for required options.
    pub fn default_value(&self) -> Option<OptionValue> {
        match self.default {
            DefaultValue::Required => None,
            DefaultValue::Int(value) => Some(OptionValue::Int(value)),
            DefaultValue::Str(value) => Some(OptionValue::Str(value.to_string())),
            DefaultValue::EmptyList => Some(OptionValue::StrList(Vec::new())),
        }
    }
}

/// Cross-field consistency step run after defaults are applied.
///
/// An arbiter may fill derived values into the draft; any inconsistency must be
/// reported as [`SweepError::ConfigInvalid`], never coerced away.
pub type Arbiter = fn(&mut BTreeMap<String, OptionValue>) -> Result<(), SweepError>;

/// Static table of recognized options plus an optional arbitration step.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    name: &'static str,
    options: &'static [OptionSpec],
    arbiter: Option<Arbiter>,
}

impl Schema {
    /// Creates a schema without arbitration.
    pub const fn new(name: &'static str, options: &'static [OptionSpec]) -> Self {
        Self {
            name,
            options,
            arbiter: None,
        }
    }

    /// Attaches an arbitration step.
    pub fn with_arbiter(mut self, arbiter: Arbiter) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Schema name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared options in declaration order.
    pub fn options(&self) -> &'static [OptionSpec] {
        self.options
    }

    /// Looks up an option by name.
    pub fn option(&self, name: &str) -> Option<&'static OptionSpec> {
        self.options.iter().find(|spec| spec.name == name)
    }

    /// Parses an argument list against this schema.
    pub fn parse(&self, args: &ArgList) -> Result<Configuration, SweepError> {
        from_arg_list(self, args)
    }

    /// `--help` style usage text.
    pub fn help(&self) -> String {
        let mut lines = vec![format!("{} options:", self.name)];
        for spec in self.options {
            let default = match spec.default {
                DefaultValue::Required => "required".to_string(),
                DefaultValue::Int(value) => format!("default: {value}"),
                DefaultValue::Str(value) => format!("default: {value}"),
                DefaultValue::EmptyList => "default: none".to_string(),
            };
            let metavar = match spec.kind {
                OptionKind::StrList => format!("--{} [{}...]", spec.name, spec.kind),
                _ => format!("--{} <{}>", spec.name, spec.kind),
            };
            lines.push(format!("  {metavar:<36} {} ({default})", spec.help));
        }
        lines.join("\n")
    }

    /// Validates a draft, applies defaults and arbitration, and freezes it.
    pub fn finalize(
        &self,
        mut draft: BTreeMap<String, OptionValue>,
    ) -> Result<Configuration, SweepError> {
        for (name, value) in &draft {
            let spec = self.option(name).ok_or_else(|| self.unknown_option(name))?;
            if spec.kind != value.kind() {
                return Err(SweepError::ConfigInvalid(
                    ErrorInfo::new(
                        "option_kind",
                        format!("option `{name}` is {}, expected {}", value.kind(), spec.kind),
                    )
                    .with_context("option", name.as_str())
                    .with_context("schema", self.name),
                ));
            }
        }
        for spec in self.options {
            if draft.contains_key(spec.name) {
                continue;
            }
            let value = spec.default_value().ok_or_else(|| {
                SweepError::ConfigInvalid(
                    ErrorInfo::new(
                        "missing_option",
                        format!("required option `--{}` was not given", spec.name),
                    )
                    .with_context("option", spec.name)
                    .with_context("schema", self.name),
                )
            })?;
            draft.insert(spec.name.to_string(), value);
        }
        if let Some(arbiter) = self.arbiter {
            arbiter(&mut draft)?;
        }
        for (name, value) in &draft {
            check_tokens(name, value)?;
        }
        Ok(Configuration::from_map(draft))
    }

    pub(crate) fn unknown_option(&self, name: &str) -> SweepError {
        SweepError::ConfigInvalid(
            ErrorInfo::new("unknown_option", format!("unrecognized option `--{name}`"))
                .with_context("option", name)
                .with_context("schema", self.name)
                .with_hint(format!(
                    "known options: {}",
                    self.options
                        .iter()
                        .map(|spec| spec.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
        )
    }
}

/// Rejects values that could not survive an ArgList round trip.
fn check_tokens(name: &str, value: &OptionValue) -> Result<(), SweepError> {
    let tokens: Vec<&str> = match value {
        OptionValue::Int(_) => return Ok(()),
        OptionValue::Str(value) => vec![value.as_str()],
        OptionValue::StrList(values) => values.iter().map(String::as_str).collect(),
    };
    match tokens.into_iter().find(|token| token.starts_with("--")) {
        Some(token) => Err(SweepError::ConfigInvalid(
            ErrorInfo::new(
                "flag_like_value",
                format!("option `{name}` has unusable value `{token}`"),
            )
            .with_context("option", name),
        )),
        None => Ok(()),
    }
}
