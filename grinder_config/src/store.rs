//! TOML-file backed settings store.
//!
//! Layout on disk is one table per namespace:
//!
//! ```toml
//! [scale]
//! calibration = 412.7
//! setWeight = 18.0
//! shotCount = 42
//! ```
use std::path::{Path, PathBuf};

use grinder_traits::{BoxError, SettingsStore};
use toml::{Table, Value};

use crate::atomic::write_atomic;

#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    table: Table,
}

impl TomlFileStore {
    /// Open the store at `path`. A missing file is an empty store; it is
    /// created on the first `put_*`.
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let table = match std::fs::read_to_string(&path) {
            Ok(s) => s
                .parse::<Table>()
                .map_err(|e| eyre::eyre!("settings file {} is not valid TOML: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::new(),
            Err(e) => {
                return Err(eyre::eyre!("reading settings file {}: {e}", path.display()));
            }
        };
        Ok(Self { path, table })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.table.get(namespace)?.as_table()?.get(key)
    }

    fn put(&mut self, namespace: &str, key: &str, value: Value) -> Result<(), BoxError> {
        let section = self
            .table
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        match section.as_table_mut() {
            Some(t) => {
                t.insert(key.to_string(), value);
            }
            None => {
                let mut t = Table::new();
                t.insert(key.to_string(), value);
                *section = Value::Table(t);
            }
        }
        self.flush()
    }

    fn flush(&self) -> Result<(), BoxError> {
        let text = toml::to_string(&self.table)?;
        write_atomic(&self.path, text.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "settings flushed");
        Ok(())
    }
}

impl SettingsStore for TomlFileStore {
    fn get_f64(&self, namespace: &str, key: &str) -> Option<f64> {
        match self.get(namespace, key)? {
            Value::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    fn get_bool(&self, namespace: &str, key: &str) -> Option<bool> {
        self.get(namespace, key)?.as_bool()
    }

    fn get_u32(&self, namespace: &str, key: &str) -> Option<u32> {
        self.get(namespace, key)?
            .as_integer()
            .and_then(|i| u32::try_from(i).ok())
    }

    fn get_i32(&self, namespace: &str, key: &str) -> Option<i32> {
        self.get(namespace, key)?
            .as_integer()
            .and_then(|i| i32::try_from(i).ok())
    }

    fn put_f64(&mut self, namespace: &str, key: &str, value: f64) -> Result<(), BoxError> {
        self.put(namespace, key, Value::Float(value))
    }

    fn put_bool(&mut self, namespace: &str, key: &str, value: bool) -> Result<(), BoxError> {
        self.put(namespace, key, Value::Boolean(value))
    }

    fn put_u32(&mut self, namespace: &str, key: &str, value: u32) -> Result<(), BoxError> {
        self.put(namespace, key, Value::Integer(i64::from(value)))
    }

    fn put_i32(&mut self, namespace: &str, key: &str, value: i32) -> Result<(), BoxError> {
        self.put(namespace, key, Value::Integer(i64::from(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlFileStore::open(dir.path().join("prefs.toml")).unwrap();
        assert_eq!(store.get_f64("scale", "calibration"), None);
        assert!(!dir.path().join("prefs.toml").exists());
    }

    #[test]
    fn integer_values_read_back_as_f64() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("prefs.toml");
        std::fs::write(&p, "[scale]\ncup = 200\n").unwrap();
        let store = TomlFileStore::open(&p).unwrap();
        assert_eq!(store.get_f64("scale", "cup"), Some(200.0));
    }

    #[test]
    fn negative_integer_is_not_a_u32() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("prefs.toml");
        std::fs::write(&p, "[scale]\nsleepTime = -5\n").unwrap();
        let store = TomlFileStore::open(&p).unwrap();
        assert_eq!(store.get_u32("scale", "sleepTime"), None);
        assert_eq!(store.get_i32("scale", "sleepTime"), Some(-5));
    }
}
