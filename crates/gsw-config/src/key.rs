//! Canonical, path-safe storage keys.
//!
//! A key lists every field in name order as `name=value`, joined by `,`.
//! Integers are written in decimal, lists as `@` followed by run-length items
//! (`item*count`) joined by `+`, and strings are percent-escaped so that only
//! `[A-Za-z0-9_-]` appear verbatim. A string never starts with a digit or `-`
//! once escaped, so it cannot be mistaken for an integer, and the empty string
//! is written as a lone `%`. The key alphabet excludes `/` and `.`, so a key is
//! always a single path component.
//!
//! Keys longer than [`MAX_KEY_LEN`] are cut and suffixed with `~` and a digest
//! of the full text; such keys stay unique but cannot be decoded back.

use std::collections::BTreeMap;
use std::fmt;

use gsw_core::errors::{ErrorInfo, SweepError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::Schema;
use crate::value::{Configuration, OptionValue};

/// Longest key written verbatim.
pub const MAX_KEY_LEN: usize = 250;
const DIGEST_HEX: usize = 16;

/// Deterministic on-disk identifier for a configuration's result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Validates raw text (e.g. a file stem) as a storage key.
    pub fn parse(raw: &str) -> Result<Self, SweepError> {
        if raw.is_empty() || raw.len() > MAX_KEY_LEN || !raw.bytes().all(is_key_byte) {
            return Err(SweepError::ConfigInvalid(
                ErrorInfo::new("invalid_key", "text is not a storage key")
                    .with_context("key", raw),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    /// Key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key was shortened and can no longer be decoded.
    pub fn is_digest(&self) -> bool {
        self.0.contains('~')
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_plain_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}

fn is_key_byte(byte: u8) -> bool {
    is_plain_byte(byte) || b"%@*+=,~".contains(&byte)
}

/// Encodes `config` into its canonical storage key.
pub fn to_storage_key(config: &Configuration) -> StorageKey {
    let full = config
        .iter()
        .map(|(name, value)| format!("{}={}", escape(name), encode_value(value)))
        .collect::<Vec<_>>()
        .join(",");
    if full.len() <= MAX_KEY_LEN {
        return StorageKey(full);
    }
    let digest = format!("{:x}", Sha256::digest(full.as_bytes()));
    let keep = MAX_KEY_LEN - DIGEST_HEX - 1;
    StorageKey(format!("{}~{}", &full[..keep], &digest[..DIGEST_HEX]))
}

/// Decodes a readable key and validates it against `schema`.
pub fn from_storage_key(schema: &Schema, key: &StorageKey) -> Result<Configuration, SweepError> {
    if key.is_digest() {
        return Err(SweepError::ConfigInvalid(
            ErrorInfo::new("key_truncated", "digest keys cannot be decoded")
                .with_context("key", key.as_str())
                .with_hint("read the configuration from the stored envelope instead"),
        ));
    }
    let mut draft = BTreeMap::new();
    if !key.as_str().is_empty() {
        for field in key.as_str().split(',') {
            let (name, value) = field
                .split_once('=')
                .ok_or_else(|| malformed(key, "field without `=`"))?;
            let name = unescape(name).ok_or_else(|| malformed(key, "bad escape in name"))?;
            let value = decode_value(value).ok_or_else(|| malformed(key, "bad value"))?;
            draft.insert(name, value);
        }
    }
    let config = schema.finalize(draft)?;
    if &to_storage_key(&config) != key {
        return Err(malformed(key, "key is not canonical for its configuration"));
    }
    Ok(config)
}

fn malformed(key: &StorageKey, message: &str) -> SweepError {
    SweepError::ConfigInvalid(
        ErrorInfo::new("malformed_key", message).with_context("key", key.as_str()),
    )
}

fn encode_value(value: &OptionValue) -> String {
    match value {
        OptionValue::Int(value) => value.to_string(),
        OptionValue::Str(value) => escape(value),
        OptionValue::StrList(values) => {
            let mut runs: Vec<(&String, usize)> = Vec::new();
            for item in values {
                if let Some((last, count)) = runs.last_mut() {
                    if *last == item {
                        *count += 1;
                        continue;
                    }
                }
                runs.push((item, 1));
            }
            let body = runs
                .into_iter()
                .map(|(item, count)| match count {
                    1 => escape(item),
                    n => format!("{}*{}", escape(item), n),
                })
                .collect::<Vec<_>>()
                .join("+");
            format!("@{body}")
        }
    }
}

fn decode_value(raw: &str) -> Option<OptionValue> {
    if let Some(body) = raw.strip_prefix('@') {
        let mut items = Vec::new();
        if body.is_empty() {
            return Some(OptionValue::StrList(items));
        }
        for run in body.split('+') {
            let (item, count) = match run.rsplit_once('*') {
                Some((item, count)) => (item, count.parse::<usize>().ok().filter(|n| *n > 1)?),
                None => (run, 1),
            };
            let item = unescape(item)?;
            items.extend(std::iter::repeat(item).take(count));
        }
        return Some(OptionValue::StrList(items));
    }
    match raw.parse::<i64>() {
        Ok(value) if value.to_string() == raw => Some(OptionValue::Int(value)),
        _ => unescape(raw).map(OptionValue::Str),
    }
}

fn escape(text: &str) -> String {
    if text.is_empty() {
        return "%".to_string();
    }
    let mut out = String::with_capacity(text.len());
    for (idx, byte) in text.bytes().enumerate() {
        let leading_numeric = idx == 0 && (byte.is_ascii_digit() || byte == b'-');
        if is_plain_byte(byte) && !leading_numeric {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn unescape(text: &str) -> Option<String> {
    if text == "%" {
        return Some(String::new());
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'%' => {
                let hex = text.get(idx + 1..idx + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                idx += 3;
            }
            byte if is_plain_byte(byte) => {
                out.push(byte);
                idx += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}
