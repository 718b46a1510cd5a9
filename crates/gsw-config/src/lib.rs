#![deny(missing_docs)]
#![doc = "Typed sweep configurations: option schemas, the ArgList codec, canonical storage keys and grid generation."]

pub mod codec;
/// Geweke run schema and arbitration.
pub mod geweke;
pub mod grid;
pub mod key;
/// Option schemas.
pub mod schema;
/// Configuration, option value and argument list types.
pub mod value;

pub use codec::{from_arg_list, to_arg_list};
pub use geweke::{arbitrate_geweke, geweke_schema, ColumnType, GewekeParams, CONTINUOUS, MULTINOMIAL};
pub use grid::{generate_arg_lists, generate_configs, GridSpec};
pub use key::{from_storage_key, to_storage_key, StorageKey, MAX_KEY_LEN};
pub use schema::{Arbiter, DefaultValue, OptionKind, OptionSpec, Schema};
pub use value::{ArgList, Configuration, OptionValue};
