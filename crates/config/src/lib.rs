//! Layered configuration for ncmdrop.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults,
//! 2. `config.toml` in the platform configuration directory,
//! 3. an explicitly named file (TOML, or JSON/YAML by extension),
//! 4. `NCMDROP_`-prefixed environment variables.
//!
//! Command-line flags are applied on top by the binary.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "NCMDROP_";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File extensions treated as dumpable, without the leading dot.
    pub extensions: Vec<String>,
    /// Skip the output directory prompt and always dump here.
    pub output_dir: Option<PathBuf>,
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    pub log_level: String,
    pub completion_title: String,
    pub completion_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: vec!["ncm".to_string()],
            output_dir: None,
            log_level: "info".to_string(),
            completion_title: "Done".to_string(),
            completion_message: "All files have been dumped.".to_string(),
        }
    }
}

/// Platform location of the user configuration file, if the platform has one.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ncmdrop").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl Config {
    /// Load from every source, including the user configuration file.
    ///
    /// # Errors
    /// [`NotFound`](ErrorKind::NotFound) if `explicit` names a missing file,
    /// [`Parse`](ErrorKind::Parse) or [`Invalid`](ErrorKind::Invalid)
    /// otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(default_path().as_deref(), explicit)
    }

    /// Like [`load`](Self::load), with the user configuration file given
    /// explicitly. A missing `user` file is skipped.
    pub fn load_from(user: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = user {
            tracing::trace!(path = %path.display(), "Merging user configuration");
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            tracing::debug!(path = %path.display(), "Merging configuration file");
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => figment.merge(Json::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: Config = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.normalized()
    }

    /// Lowercase the extensions, strip leading dots and drop duplicates.
    fn normalized(mut self) -> Result<Self> {
        let mut extensions: Vec<String> = Vec::with_capacity(self.extensions.len());
        for extension in &self.extensions {
            let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
            if extension.is_empty() {
                exn::bail!(ErrorKind::Invalid("empty extension".to_string()));
            }
            if !extensions.contains(&extension) {
                extensions.push(extension);
            }
        }
        if extensions.is_empty() {
            exn::bail!(ErrorKind::Invalid("at least one extension is required".to_string()));
        }
        self.extensions = extensions;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = Config::load_from(None, None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_user_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(Some(&dir.path().join("config.toml")), None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = Config::load_from(None, Some(&path)).unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound(path));
    }

    #[test]
    fn test_explicit_overrides_user() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("config.toml");
        fs::write(&user, "completion_title = \"Finished\"\nlog_level = \"debug\"\n").unwrap();
        let explicit = dir.path().join("session.json");
        fs::write(&explicit, r#"{"log_level": "warn", "output_dir": "/tmp/out"}"#).unwrap();

        let config = Config::load_from(Some(&user), Some(&explicit)).unwrap();
        assert_eq!(config.completion_title, "Finished");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(config.completion_message, Config::default().completion_message);
    }

    #[test]
    fn test_extensions_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "extensions = [\".NCM\", \"ncm\", \" Flac \"]\n").unwrap();
        let config = Config::load_from(None, Some(&path)).unwrap();
        assert_eq!(config.extensions, vec!["ncm", "flac"]);
    }

    #[rstest]
    #[case("extensions = []\n")]
    #[case("extensions = [\".\"]\n")]
    fn test_invalid_extensions(#[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        let err = Config::load_from(None, Some(&path)).unwrap_err();
        assert!(matches!(*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "extensions = 3\n").unwrap();
        let err = Config::load_from(None, Some(&path)).unwrap_err();
        assert_eq!(*err, ErrorKind::Parse);
    }
}
