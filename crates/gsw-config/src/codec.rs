//! ArgList encoding and schema-driven decoding.

use std::collections::BTreeMap;

use gsw_core::errors::{ErrorInfo, SweepError};

use crate::schema::{OptionKind, Schema};
use crate::value::{ArgList, Configuration, OptionValue};

/// Flattens a configuration into `--name value...` tokens in name order.
pub fn to_arg_list(config: &Configuration) -> ArgList {
    let mut args = ArgList::new();
    for (name, value) in config.iter() {
        args.push_option(name, value);
    }
    args
}

/// Parses tokens against `schema`, applying defaults and arbitration.
pub fn from_arg_list(schema: &Schema, args: &ArgList) -> Result<Configuration, SweepError> {
    let tokens = args.tokens();
    let mut draft = BTreeMap::new();
    let mut idx = 0;
    while idx < tokens.len() {
        let token = &tokens[idx];
        let name = flag_name(token).ok_or_else(|| {
            SweepError::ConfigInvalid(
                ErrorInfo::new(
                    "unexpected_token",
                    format!("expected an option, found `{token}`"),
                )
                .with_context("position", idx.to_string()),
            )
        })?;
        let spec = schema
            .option(name)
            .ok_or_else(|| schema.unknown_option(name))?;
        if draft.contains_key(name) {
            return Err(SweepError::ConfigInvalid(
                ErrorInfo::new("duplicate_option", format!("option `--{name}` given twice"))
                    .with_context("option", name),
            ));
        }
        idx += 1;
        let value = match spec.kind {
            OptionKind::Int => {
                let raw = scalar_token(tokens, idx, name)?;
                idx += 1;
                let parsed = raw.parse::<i64>().map_err(|err| {
                    SweepError::ConfigInvalid(
                        ErrorInfo::new(
                            "invalid_int",
                            format!("option `--{name}` expects an integer, got `{raw}`"),
                        )
                        .with_context("option", name)
                        .with_context("cause", err.to_string()),
                    )
                })?;
                OptionValue::Int(parsed)
            }
            OptionKind::Str => {
                let raw = scalar_token(tokens, idx, name)?;
                idx += 1;
                OptionValue::Str(raw.to_string())
            }
            OptionKind::StrList => {
                let mut items = Vec::new();
                while let Some(item) = tokens.get(idx).filter(|token| !is_flag(token)) {
                    items.push(item.clone());
                    idx += 1;
                }
                OptionValue::StrList(items)
            }
        };
        draft.insert(name.to_string(), value);
    }
    schema.finalize(draft)
}

fn is_flag(token: &str) -> bool {
    token.starts_with("--")
}

fn flag_name(token: &str) -> Option<&str> {
    token.strip_prefix("--").filter(|name| !name.is_empty())
}

fn scalar_token<'a>(tokens: &'a [String], idx: usize, name: &str) -> Result<&'a str, SweepError> {
    tokens
        .get(idx)
        .filter(|token| !is_flag(token))
        .map(String::as_str)
        .ok_or_else(|| {
            SweepError::ConfigInvalid(
                ErrorInfo::new("missing_value", format!("option `--{name}` expects a value"))
                    .with_context("option", name),
            )
        })
}
