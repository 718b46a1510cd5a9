use std::collections::BTreeSet;

use gsw_config::{from_arg_list, generate_configs, geweke_schema, GridSpec, StorageKey};

fn scenario() -> GridSpec {
    GridSpec::new(10, 200, vec!["continuous".into(), "multinomial".into()])
}

#[test]
fn default_grid_has_six_configurations() {
    let schema = geweke_schema();
    let configs = generate_configs(&schema, &scenario()).expect("grid");
    assert_eq!(configs.len(), 6);

    let keys: BTreeSet<StorageKey> = configs.iter().map(|config| config.storage_key()).collect();
    assert_eq!(keys.len(), 6);

    for config in &configs {
        let decoded = from_arg_list(&schema, &config.to_arg_list()).expect("round trip");
        assert_eq!(&decoded, config);
    }
}

#[test]
fn grid_is_reproducible() {
    let schema = geweke_schema();
    let first = generate_configs(&schema, &scenario()).expect("grid");
    let second = generate_configs(&schema, &scenario()).expect("grid");
    assert_eq!(first, second);
}

#[test]
fn extended_grid_adds_two_large_runs() {
    let schema = geweke_schema();
    let configs = generate_configs(&schema, &scenario().with_extended(true)).expect("grid");
    assert_eq!(configs.len(), 8);
    let long = &configs[7];
    assert_eq!(long.int("num_rows").expect("rows"), 100);
    assert_eq!(long.int("num_cols").expect("cols"), 100);
    assert_eq!(long.int("num_multinomial_values").expect("values"), 2);
    assert!(!long.storage_key().is_digest());
}

#[test]
fn pair_configs_split_columns_evenly() {
    let schema = geweke_schema();
    let configs = generate_configs(&schema, &scenario()).expect("grid");
    let pair = &configs[5];
    assert_eq!(pair.int("num_cols").expect("cols"), 20);
    let types = pair.str_list("cctypes").expect("types");
    assert_eq!(types.iter().filter(|t| *t == "continuous").count(), 10);
    assert_eq!(types.iter().filter(|t| *t == "multinomial").count(), 10);
}
