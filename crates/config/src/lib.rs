//! Layered configuration.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults;
//! 2. the user configuration file (`config.toml` in the platform config
//!    directory), if it exists;
//! 3. an explicitly given file (TOML, YAML or JSON, by extension);
//! 4. `TETHER_*` environment variables, with `__` separating sections
//!    (`TETHER_ROUTING__PREFIX=docs` sets `routing.prefix`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "TETHER_";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub notion: NotionConfig,
    pub routing: RoutingConfig,
    pub sync: SyncConfig,
    pub hierarchy: HierarchyConfig,
    pub menu: MenuConfig,
    pub server: ServerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding the registry, batches and local content.
    pub path: PathBuf,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = project_dirs()
            .map(|dirs| dirs.data_dir().join("tether.sqlite"))
            .unwrap_or_else(|| PathBuf::from("tether.sqlite"));
        Self { path }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    /// Integration token. Only needed by commands that fetch.
    pub token: Option<String>,
    pub api_base: String,
    pub api_version: String,
}
impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://api.notion.com".to_string(),
            api_version: "2022-06-28".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// First path segment of public links, `/{prefix}/{slug}`.
    pub prefix: String,
    /// Where unsynced pages redirect to.
    pub remote_origin: String,
    /// Base of local permalinks.
    pub permalink_base: String,
}
impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            prefix: "notion".to_string(),
            remote_origin: "https://www.notion.so".to_string(),
            permalink_base: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How deep nested blocks are fetched.
    pub max_block_depth: usize,
    /// Fail conversion on unsupported blocks instead of skipping them.
    pub strict: bool,
}
impl Default for SyncConfig {
    fn default() -> Self {
        Self { max_block_depth: 8, strict: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub max_depth: usize,
    pub max_root_iterations: usize,
}
impl Default for HierarchyConfig {
    fn default() -> Self {
        Self { max_depth: 10, max_root_iterations: 50 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    pub name: String,
    /// Put the root page itself in the menu, not just its children.
    pub include_root: bool,
}
impl Default for MenuConfig {
    fn default() -> Self {
        Self { name: "Notion".to_string(), include_root: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8080".to_string() }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "tether")
}

/// The user configuration file, whether or not it exists.
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn file_provider(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string())),
    })
}

impl Config {
    /// Load from every source, with `explicit` as the optional `--config` file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user = user_config_path().filter(|p| p.exists());
        Self::from_figment(Self::figment(user.as_deref(), explicit)?)
    }

    /// The provider chain, without the platform lookup of the user file.
    pub fn figment(user: Option<&Path>, explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(user) = user {
            tracing::debug!(path = %user.display(), "merging user configuration");
            figment = file_provider(figment, user)?;
        }
        if let Some(explicit) = explicit {
            figment = file_provider(figment, explicit)?;
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().map_err(|e| exn::Exn::from(ErrorKind::Load(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.routing.prefix.trim_matches('/').trim().is_empty() {
            exn::bail!(invalid("routing.prefix", "must not be empty"));
        }
        for (field, url) in [
            ("routing.remote_origin", &self.routing.remote_origin),
            ("routing.permalink_base", &self.routing.permalink_base),
            ("notion.api_base", &self.notion.api_base),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                exn::bail!(invalid(field, format!("{url:?} is not an http(s) URL")));
            }
        }
        for (field, bound) in [
            ("sync.max_block_depth", self.sync.max_block_depth),
            ("hierarchy.max_depth", self.hierarchy.max_depth),
            ("hierarchy.max_root_iterations", self.hierarchy.max_root_iterations),
        ] {
            if bound == 0 {
                exn::bail!(invalid(field, "must be at least 1"));
            }
        }
        if self.menu.name.trim().is_empty() {
            exn::bail!(invalid("menu.name", "must not be empty"));
        }
        if self.server.bind.trim().is_empty() {
            exn::bail!(invalid("server.bind", "must not be empty"));
        }
        Ok(())
    }

    /// The routing prefix without surrounding slashes.
    pub fn route_prefix(&self) -> &str {
        self.routing.prefix.trim_matches('/')
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ErrorKind {
    ErrorKind::Invalid { field, reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn load(jail: &Jail, file: Option<&str>) -> Result<Config> {
        let path = file.map(|f| jail.directory().join(f));
        Config::from_figment(Config::figment(None, path.as_deref())?)
    }

    #[test]
    fn test_defaults_are_valid() {
        Jail::expect_with(|jail| {
            let config = load(jail, None).map_err(|e| e.to_string())?;
            assert_eq!(config.routing.prefix, "notion");
            assert_eq!(config.hierarchy.max_root_iterations, 50);
            assert!(config.notion.token.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tether.toml",
                r#"
                    [routing]
                    prefix = "/docs/"
                    remote_origin = "https://notion.example"

                    [menu]
                    include_root = true
                "#,
            )?;
            jail.set_env("TETHER_ROUTING__REMOTE_ORIGIN", "https://override.example");
            jail.set_env("TETHER_NOTION__TOKEN", "secret_abc");
            jail.set_env("TETHER_SYNC__STRICT", "true");
            let config = load(jail, Some("tether.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.route_prefix(), "docs");
            assert_eq!(config.routing.remote_origin, "https://override.example");
            assert_eq!(config.notion.token.as_deref(), Some("secret_abc"));
            assert!(config.sync.strict);
            assert!(config.menu.include_root);
            assert_eq!(config.menu.name, "Notion");
            Ok(())
        });
    }

    #[test]
    fn test_yaml_and_json() {
        Jail::expect_with(|jail| {
            jail.create_file("tether.yaml", "server:\n  bind: 0.0.0.0:9000\n")?;
            jail.create_file("tether.json", r#"{"database": {"path": "/tmp/t.sqlite"}}"#)?;
            let yaml = load(jail, Some("tether.yaml")).map_err(|e| e.to_string())?;
            assert_eq!(yaml.server.bind, "0.0.0.0:9000");
            let json = load(jail, Some("tether.json")).map_err(|e| e.to_string())?;
            assert_eq!(json.database.path, PathBuf::from("/tmp/t.sqlite"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_or_unknown_file() {
        Jail::expect_with(|jail| {
            assert!(matches!(*load(jail, Some("absent.toml")).unwrap_err(), ErrorKind::Load(_)));
            jail.create_file("tether.ini", "")?;
            assert!(matches!(*load(jail, Some("tether.ini")).unwrap_err(), ErrorKind::UnsupportedFormat(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("TETHER_ROUTING__PREFIX", "/", "routing.prefix")]
    #[case("TETHER_ROUTING__REMOTE_ORIGIN", "notion.so", "routing.remote_origin")]
    #[case("TETHER_HIERARCHY__MAX_DEPTH", "0", "hierarchy.max_depth")]
    #[case("TETHER_SYNC__MAX_BLOCK_DEPTH", "0", "sync.max_block_depth")]
    #[case("TETHER_MENU__NAME", " ", "menu.name")]
    fn test_validation(#[case] var: &str, #[case] value: &str, #[case] expected: &str) {
        Jail::expect_with(|jail| {
            jail.set_env(var, value);
            let err = load(jail, None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid { field, .. } if *field == expected), "{err:?}");
            Ok(())
        });
    }
}
