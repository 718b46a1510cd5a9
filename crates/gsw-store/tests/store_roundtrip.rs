use std::fs;

use gsw_config::{geweke_schema, ArgList, Configuration, CONTINUOUS, MULTINOMIAL};
use gsw_core::errors::SweepError;
use gsw_store::{ResultStore, StoredResult};
use serde_json::{json, Value};
use tempfile::tempdir;

fn config(rows: i64) -> Configuration {
    geweke_schema()
        .parse(
            &ArgList::new()
                .with_scalar("num_rows", rows)
                .with_scalar("num_cols", 1)
                .with_list("cctypes", &["continuous"]),
        )
        .expect("config")
}

#[test]
fn write_then_read_returns_envelope() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path().join("results")).expect("open");
    let config = config(10);
    let key = config.storage_key();

    assert!(!store.exists(&key));
    let path = store.write(&key, &config, &json!({"ks": [0.1, 0.2]})).expect("write");
    assert_eq!(path, store.path_for(&key));
    assert!(store.exists(&key));

    let stored: StoredResult<Value> = store.read(&key).expect("read");
    assert_eq!(stored.key, key);
    assert_eq!(stored.config, config);
    assert_eq!(stored.result, json!({"ks": [0.1, 0.2]}));
    assert!(stored.provenance.tool_versions.contains_key("gsw-store"));
}

#[test]
fn overwrite_replaces_previous_result() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("open");
    let config = config(10);
    let key = config.storage_key();

    store.write(&key, &config, &1u32).expect("first");
    store.write(&key, &config, &2u32).expect("second");
    let stored: StoredResult<u32> = store.read(&key).expect("read");
    assert_eq!(stored.result, 2);
    assert_eq!(store.list_keys().expect("list").len(), 1);
}

#[test]
fn missing_key_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("open");
    let err = store
        .read::<Value>(&config(3).storage_key())
        .expect_err("missing");
    assert!(matches!(err, SweepError::NotFound(_)));
    assert_eq!(err.info().code, "result_missing");
}

#[test]
fn listing_ignores_foreign_and_temporary_files() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("open");
    for rows in [4, 5] {
        let config = config(rows);
        store.write(&config.storage_key(), &config, &rows).expect("write");
    }
    fs::write(dir.path().join(".tmpAbC123"), b"partial").expect("temp");
    fs::write(dir.path().join("notes.txt"), b"hello").expect("notes");
    fs::write(dir.path().join("bad name.json"), b"{}").expect("bad");
    fs::create_dir(dir.path().join("plots")).expect("subdir");

    let keys = store.list_keys().expect("list");
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&config(4).storage_key()));
    assert!(keys.contains(&config(5).storage_key()));
}

#[test]
fn no_temporary_files_remain_after_write() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("open");
    let config = config(7);
    store.write(&config.storage_key(), &config, &"done").expect("write");

    let names: Vec<String> = fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![format!("{}.json", config.storage_key())]);
}

#[test]
fn configs_are_rebuilt_from_envelopes() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("open");
    let written: Vec<Configuration> = [2, 8, 6].into_iter().map(config).collect();
    for config in &written {
        store
            .write(&config.storage_key(), config, &json!({"rows": config.int("num_rows").expect("rows")}))
            .expect("write");
    }

    let mut read = store.read_all_configs().expect("configs");
    let mut expected = written.clone();
    read.sort();
    expected.sort();
    assert_eq!(read, expected);
}

#[test]
fn envelope_under_wrong_name_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("open");
    let (a, b) = (config(2), config(3));
    store.write(&a.storage_key(), &a, &0).expect("write");
    fs::copy(store.path_for(&a.storage_key()), store.path_for(&b.storage_key())).expect("copy");

    let err = store.read::<Value>(&b.storage_key()).expect_err("mismatch");
    assert_eq!(err.info().code, "key_mismatch");
}

#[test]
fn digest_keyed_results_read_back_from_envelope() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("open");
    let cctypes: Vec<&str> = (0..40)
        .map(|col| if col % 2 == 0 { CONTINUOUS } else { MULTINOMIAL })
        .collect();
    let wide = geweke_schema()
        .parse(
            &ArgList::new()
                .with_scalar("num_rows", 4)
                .with_scalar("num_cols", cctypes.len())
                .with_list("cctypes", &cctypes),
        )
        .expect("config");
    let key = wide.storage_key();
    assert!(key.is_digest());
    store.write(&key, &wide, &0).expect("write wide");
    let narrow = config(2);
    store.write(&narrow.storage_key(), &narrow, &0).expect("write narrow");

    assert_eq!(store.read_config(&key).expect("envelope"), wide);
    let mut read = store.read_all_configs().expect("configs");
    read.sort();
    let mut expected = vec![wide, narrow];
    expected.sort();
    assert_eq!(read, expected);
}
