//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.client.validate()?;
        self.remote.validate()?;
        Ok(())
    }

    /// Create a configuration rooted at `root` with remote lookups off.
    ///
    /// **For testing only.**
    pub fn for_testing(root: impl Into<PathBuf>) -> Self {
        Self {
            client: ClientConfig {
                root: root.into(),
                ..ClientConfig::default()
            },
            remote: RemoteConfig {
                enabled: false,
                ..RemoteConfig::default()
            },
            catalog: CatalogConfig::default(),
        }
    }
}

/// Game client installation layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client install root.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Custom slot directory. Defaults to `<root>/AppList`.
    #[serde(default)]
    pub slot_dir: Option<PathBuf>,
    /// Extra library directories that may hold manifest records.
    #[serde(default)]
    pub libraries: Vec<PathBuf>,
    /// Client executable, relative to the root.
    #[serde(default = "default_launcher_exe")]
    pub launcher_exe: String,
    /// Language written into new manifest records.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_root() -> PathBuf {
    PathBuf::from(r"C:\Program Files (x86)\Steam")
}

fn default_launcher_exe() -> String {
    "steam.exe".to_string()
}

fn default_language() -> String {
    "english".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            slot_dir: None,
            libraries: Vec::new(),
            launcher_exe: default_launcher_exe(),
            language: default_language(),
        }
    }
}

impl ClientConfig {
    /// Directory holding the numbered slot files.
    pub fn slot_dir(&self) -> PathBuf {
        self.slot_dir
            .clone()
            .unwrap_or_else(|| self.root.join("AppList"))
    }

    /// Default library holding manifest records.
    pub fn steamapps_dir(&self) -> PathBuf {
        self.root.join("steamapps")
    }

    /// Shared depot manifest cache.
    pub fn depotcache_dir(&self) -> PathBuf {
        self.root.join("depotcache")
    }

    /// The key store file.
    pub fn key_store_path(&self) -> PathBuf {
        self.root.join("config").join("config.vdf")
    }

    /// Launcher path written into manifest records.
    pub fn launcher_path(&self) -> PathBuf {
        self.root.join(&self.launcher_exe)
    }

    /// Every directory that may hold manifest records, default first.
    pub fn manifest_dirs(&self) -> Vec<PathBuf> {
        let default = self.steamapps_dir();
        let mut dirs = vec![default.clone()];
        for lib in &self.libraries {
            let dir = library_manifest_dir(lib);
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.root.as_os_str().is_empty() {
            return Err("client.root cannot be empty".to_string());
        }
        if self.launcher_exe.trim().is_empty() {
            return Err("client.launcher_exe cannot be empty".to_string());
        }
        if self.language.trim().is_empty() {
            return Err("client.language cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Manifest directory of a library: libraries may be given either as the
/// library root or as its `steamapps` directory.
pub fn library_manifest_dir(library: &Path) -> PathBuf {
    if library
        .file_name()
        .is_some_and(|name| name.eq_ignore_ascii_case("steamapps"))
    {
        library.to_path_buf()
    } else {
        library.join("steamapps")
    }
}

/// How the resolver combines local and remote data.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// Query remote only when local data yields no dependents.
    #[default]
    Fallback,
    /// Always query remote and union with local data.
    Complete,
}

/// Remote metadata source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_enabled")]
    pub enabled: bool,
    /// Base URL; the item id is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub mode: ResolveMode,
}

fn default_remote_enabled() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.steamcmd.net/v1/info/".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: default_remote_enabled(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            mode: ResolveMode::default(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("remote.timeout_secs must be greater than 0".to_string());
        }
        let rest = self
            .base_url
            .strip_prefix("https://")
            .or_else(|| self.base_url.strip_prefix("http://"))
            .ok_or_else(|| format!("remote.base_url must be http(s): {}", self.base_url))?;
        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(format!("remote.base_url has no host: {}", self.base_url));
        }
        Ok(())
    }
}

/// Optional display-name catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to a `depots.ini` file.
    #[serde(default)]
    pub depot_names: Option<PathBuf>,
}
