//! Option schema and arbitration for Geweke quality runs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use gsw_core::errors::{ErrorInfo, SweepError};
use serde::{Deserialize, Serialize};

use crate::schema::{OptionSpec, Schema};
use crate::value::{Configuration, OptionValue};

/// Column type name for normally distributed columns.
pub const CONTINUOUS: &str = "continuous";
/// Column type name for categorical columns.
pub const MULTINOMIAL: &str = "multinomial";

static GEWEKE_OPTIONS: [OptionSpec; 6] = [
    OptionSpec::int("gen_seed", 0, "seed for data and chain generation"),
    OptionSpec::int("num_rows", 10, "rows in the synthetic table"),
    OptionSpec::int("num_cols", 2, "columns in the synthetic table"),
    OptionSpec::int("num_iters", 1000, "forward and successive-conditional draws"),
    OptionSpec::int(
        "num_multinomial_values",
        2,
        "categories per multinomial column",
    ),
    OptionSpec::list("cctypes", "column types, one per column"),
];

/// Schema used for every Geweke configuration.
pub fn geweke_schema() -> Schema {
    Schema::new("geweke", &GEWEKE_OPTIONS).with_arbiter(arbitrate_geweke)
}

/// Data type of a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Real-valued column.
    Continuous,
    /// Categorical column.
    Multinomial,
}

impl ColumnType {
    /// Canonical name used in argument lists.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Continuous => CONTINUOUS,
            ColumnType::Multinomial => MULTINOMIAL,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            CONTINUOUS => Ok(ColumnType::Continuous),
            MULTINOMIAL => Ok(ColumnType::Multinomial),
            other => Err(SweepError::ConfigInvalid(
                ErrorInfo::new("unknown_cctype", format!("unknown column type `{other}`"))
                    .with_hint(format!("expected `{CONTINUOUS}` or `{MULTINOMIAL}`")),
            )),
        }
    }
}

/// Typed view of a Geweke configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GewekeParams {
    /// Seed for all randomness.
    pub gen_seed: u64,
    /// Rows in the synthetic table.
    pub num_rows: usize,
    /// Number of draws per chain.
    pub num_iters: usize,
    /// Categories per multinomial column.
    pub num_multinomial_values: usize,
    /// Column types, one per column.
    pub cctypes: Vec<ColumnType>,
}

impl GewekeParams {
    /// Extracts the typed parameters from an arbitrated configuration.
    pub fn from_config(config: &Configuration) -> Result<Self, SweepError> {
        let cctypes = config
            .str_list("cctypes")?
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<ColumnType>, _>>()?;
        Ok(Self {
            gen_seed: non_negative(config.int("gen_seed")?, "gen_seed")? as u64,
            num_rows: non_negative(config.int("num_rows")?, "num_rows")? as usize,
            num_iters: non_negative(config.int("num_iters")?, "num_iters")? as usize,
            num_multinomial_values: non_negative(
                config.int("num_multinomial_values")?,
                "num_multinomial_values",
            )? as usize,
            cctypes,
        })
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.cctypes.len()
    }
}

fn non_negative(value: i64, name: &str) -> Result<i64, SweepError> {
    if value < 0 {
        return Err(SweepError::ConfigInvalid(
            ErrorInfo::new("negative_value", format!("`{name}` must not be negative"))
                .with_context("option", name)
                .with_context("value", value.to_string()),
        ));
    }
    Ok(value)
}

fn draft_int(draft: &BTreeMap<String, OptionValue>, name: &str) -> Result<i64, SweepError> {
    draft
        .get(name)
        .and_then(OptionValue::as_int)
        .ok_or_else(|| SweepError::config("missing_option", format!("`{name}` is not set")))
}

/// Cross-field checks for Geweke configurations.
///
/// An empty `cctypes` becomes one `continuous` column followed by
/// `multinomial` columns, matching the requested column count.
pub fn arbitrate_geweke(draft: &mut BTreeMap<String, OptionValue>) -> Result<(), SweepError> {
    for name in ["num_rows", "num_cols", "num_iters"] {
        let value = draft_int(draft, name)?;
        if value <= 0 {
            return Err(SweepError::ConfigInvalid(
                ErrorInfo::new("non_positive", format!("`{name}` must be positive"))
                    .with_context("option", name)
                    .with_context("value", value.to_string()),
            ));
        }
    }
    non_negative(draft_int(draft, "gen_seed")?, "gen_seed")?;
    let num_values = draft_int(draft, "num_multinomial_values")?;
    if num_values < 2 {
        return Err(SweepError::ConfigInvalid(
            ErrorInfo::new(
                "too_few_values",
                "`num_multinomial_values` must be at least 2",
            )
            .with_context("value", num_values.to_string()),
        ));
    }

    let num_cols = draft_int(draft, "num_cols")? as usize;
    let cctypes = draft
        .get("cctypes")
        .and_then(OptionValue::as_list)
        .map(<[String]>::to_vec)
        .unwrap_or_default();
    let cctypes = if cctypes.is_empty() {
        std::iter::once(CONTINUOUS.to_string())
            .chain(std::iter::repeat(MULTINOMIAL.to_string()).take(num_cols - 1))
            .collect()
    } else {
        cctypes
    };
    if cctypes.len() != num_cols {
        return Err(SweepError::ConfigInvalid(
            ErrorInfo::new(
                "cctypes_len",
                format!("{} column types for {} columns", cctypes.len(), num_cols),
            )
            .with_context("num_cols", num_cols.to_string())
            .with_context("cctypes", cctypes.len().to_string()),
        ));
    }
    for name in &cctypes {
        name.parse::<ColumnType>()?;
    }
    draft.insert("cctypes".to_string(), OptionValue::StrList(cctypes));
    Ok(())
}
