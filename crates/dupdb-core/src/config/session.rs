use crate::error::{DupDbError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a database session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DupDbConfig {
    /// Host database name
    pub name: String,

    /// Object stores the session expects; missing ones are created on upgrade
    #[serde(default)]
    pub stores: Vec<String>,

    /// Schema version requested at open (default: 1)
    ///
    /// Raising it triggers the upgrade path, which creates any store in
    /// `stores` that does not exist yet.
    #[serde(default = "default_version")]
    pub version: u64,

    /// Refuse read-write transactions (default: false)
    #[serde(default)]
    pub readonly: bool,

    /// Delete the host database when the session closes (default: false)
    #[serde(default)]
    pub temp: bool,
}

fn default_version() -> u64 {
    1
}

impl DupDbConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stores: Vec::new(),
            version: default_version(),
            readonly: false,
            temp: false,
        }
    }

    pub fn with_stores<I, S>(mut self, stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stores = stores.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.stores.push(store.into());
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Delete the database on close
    pub fn with_temp(mut self, temp: bool) -> Self {
        self.temp = temp;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DupDbError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DupDbError::Config("database name must not be empty".into()));
        }
        if self.version == 0 {
            return Err(DupDbError::Config("version must be at least 1".into()));
        }
        if let Some(store) = self.stores.iter().find(|store| store.is_empty()) {
            return Err(DupDbError::Config(format!(
                "store names must not be empty, got {:?}",
                store
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let config = DupDbConfig::from_json(r#"{"name": "keri", "stores": ["evts", "sigs"]}"#)
            .unwrap();
        assert_eq!(config.name, "keri");
        assert_eq!(config.stores, vec!["evts", "sigs"]);
        assert_eq!(config.version, 1);
        assert!(!config.readonly);
        assert!(!config.temp);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        assert!(DupDbConfig::from_json(r#"{"name": ""}"#).is_err());
        assert!(DupDbConfig::from_json(r#"{"name": "db", "version": 0}"#).is_err());
        assert!(DupDbConfig::from_json(r#"{"name": "db", "stores": [""]}"#).is_err());
        assert!(DupDbConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_builder() {
        let config = DupDbConfig::new("db")
            .with_stores(["a", "b"])
            .with_store("c")
            .with_version(3)
            .with_readonly(true)
            .with_temp(true);
        assert_eq!(config.stores, vec!["a", "b", "c"]);
        assert_eq!(config.version, 3);
        assert!(config.readonly && config.temp);
        assert!(config.validate().is_ok());
    }
}
