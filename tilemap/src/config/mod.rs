//! The configuration file: server settings, service properties and tile sources.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read as _, Write as _};
use std::path::Path;

use serde::{Deserialize, Serialize};
use subst::VariableMap;
use tilemap_core::config::{SourceConfig, UnrecognizedValues};
use tilemap_core::tiles::TileSources;
use tracing::{info, warn};

use crate::{TilemapError, TilemapResult};

mod env;
pub use env::{Env, FauxEnv, OsEnv};

mod error;
pub use error::{ConfigFileError, ConfigFileResult};

mod service;
pub use service::ServiceConfig;

mod srv;
pub use srv::{KEEP_ALIVE_DEFAULT, LISTEN_ADDRESSES_DEFAULT, SrvConfig};

/// Configuration keys that were not recognized, as dotted paths.
pub type UnrecognizedKeys = BTreeSet<String>;

#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub srv: SrvConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceConfig>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl Config {
    /// Validates the configuration and normalizes the base path.
    ///
    /// Unknown keys are logged and returned, they never fail the configuration.
    pub fn finalize(&mut self) -> TilemapResult<UnrecognizedKeys> {
        let mut res = UnrecognizedKeys::new();
        copy_unrecognized_keys(&mut res, "", &self.unrecognized);
        copy_unrecognized_keys(&mut res, "service.", &self.service.unrecognized);
        for (idx, src) in self.sources.iter().enumerate() {
            copy_unrecognized_keys(&mut res, &format!("sources[{idx}]."), &src.unrecognized);
        }

        if let Some(path) = &self.srv.base_path {
            self.srv.base_path = Some(parse_base_path(path)?);
        }
        self.service.validate()?;

        for key in &res {
            warn!(
                "Ignoring unrecognized configuration key '{key}'. Please check your configuration file for typos."
            );
        }

        if self.sources.is_empty() {
            Err(ConfigFileError::NoSources)?;
        }
        Ok(res)
    }

    /// Initializes every configured source. Fails if any of them fails.
    pub async fn resolve(&self) -> TilemapResult<TileSources> {
        Ok(TileSources::resolve(&self.sources, self.service.to_properties()).await?)
    }

    /// Writes the configuration as YAML, or prints it when `file_name` is `-`.
    pub fn save_to_file(&self, file_name: &Path) -> ConfigFileResult<()> {
        let yaml = serde_yaml::to_string(&self).map_err(ConfigFileError::ConfigSerializeError)?;
        if file_name.as_os_str() == OsStr::new("-") {
            info!("Current system configuration:");
            println!("\n\n{yaml}\n");
        } else {
            info!(
                "Saving config to {}, use --config to load it",
                file_name.display()
            );
            File::create(file_name)
                .and_then(|mut f| f.write_all(yaml.as_bytes()))
                .map_err(|e| ConfigFileError::ConfigWriteError(e, file_name.to_path_buf()))?;
        }
        Ok(())
    }
}

fn copy_unrecognized_keys(
    result: &mut UnrecognizedKeys,
    prefix: &str,
    unrecognized: &UnrecognizedValues,
) {
    result.extend(unrecognized.keys().map(|k| format!("{prefix}{k}")));
}

/// Reads a YAML configuration file, substituting `${VAR}` from `env`.
pub fn read_config<'a, M>(file_name: &Path, env: &'a M) -> ConfigFileResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    let mut contents = String::new();
    File::open(file_name)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|e| ConfigFileError::ConfigLoadError(e, file_name.into()))?;
    parse_config(&contents, env, file_name)
}

pub fn parse_config<'a, M>(contents: &str, env: &'a M, file_name: &Path) -> ConfigFileResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    subst::yaml::from_str(contents, env)
        .map_err(|e| ConfigFileError::ConfigParseError(e, file_name.into()))
}

/// Validates a `base_path`, returning it without a trailing slash.
pub fn parse_base_path(path: &str) -> TilemapResult<String> {
    if !path.starts_with('/') {
        return Err(TilemapError::BasePathError(path.to_string()));
    }
    if let Ok(uri) = path.parse::<actix_web::http::Uri>() {
        return Ok(uri.path().trim_end_matches('/').to_string());
    }
    Err(TilemapError::BasePathError(path.to_string()))
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tilemap_core::config::SourceType;

    use super::*;

    fn parse(yaml: &str) -> Config {
        parse_config(yaml, &FauxEnv::default(), Path::new("test.yaml")).unwrap()
    }

    #[test]
    fn parse_full_config() {
        let mut cfg = parse(indoc! {"
            listen_addresses: '127.0.0.1:8080'
            base_path: /tiles/
            service:
              title: Tile Service
              keywords: wmts,tiles
            sources:
              - id: world
                type: mbtiles
                location: /data/world.mbtiles
              - id: roads
                type: file
                location: /data/roads/{z}/{x}/{y}.png
                tms: false
                max_zoom: 12
        "});
        let res = cfg.finalize().unwrap();
        assert!(res.is_empty());
        assert_eq!(cfg.srv.listen_addresses.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(cfg.srv.base_path.as_deref(), Some("/tiles"));
        assert_eq!(cfg.service.title.as_deref(), Some("Tile Service"));
        assert_eq!(cfg.sources.len(), 2);
        assert_eq!(cfg.sources[0].source_type, SourceType::Mbtiles);
        assert_eq!(cfg.sources[1].id, "roads");
        assert_eq!(cfg.sources[1].tms, Some(false));
        assert_eq!(cfg.sources[1].max_zoom, Some(12));
    }

    #[test]
    #[tracing_test::traced_test]
    fn unrecognized_keys_are_reported() {
        let mut cfg = parse(indoc! {"
            keep_alive: 10
            colour: blue
            service:
              subtitle: none
            sources:
              - id: world
                type: mbtiles
                location: world.mbtiles
                shade: dark
        "});
        let res = cfg.finalize().unwrap();
        assert_eq!(
            res.into_iter().collect::<Vec<_>>(),
            vec!["colour", "service.subtitle", "sources[0].shade"]
        );
        assert_eq!(cfg.srv.keep_alive, Some(10));
        assert!(logs_contain(
            "Ignoring unrecognized configuration key 'sources[0].shade'"
        ));
    }

    #[test]
    fn environment_is_substituted() {
        let env = FauxEnv(
            vec![("TILE_DIR", OsString::from("/srv/tiles"))]
                .into_iter()
                .collect(),
        );
        let cfg = parse_config(
            indoc! {"
                sources:
                  - id: world
                    type: mbtiles
                    location: ${TILE_DIR}/world.mbtiles
                  - id: sat
                    type: mbtiles
                    location: ${SAT_FILE:-/default/sat.mbtiles}
            "},
            &env,
            Path::new("test.yaml"),
        )
        .unwrap();
        assert_eq!(cfg.sources[0].location, "/srv/tiles/world.mbtiles");
        assert_eq!(cfg.sources[1].location, "/default/sat.mbtiles");
    }

    #[test]
    fn no_sources_is_an_error() {
        let mut cfg = parse("listen_addresses: '0.0.0.0:3000'");
        assert!(matches!(
            cfg.finalize(),
            Err(TilemapError::ConfigFileError(ConfigFileError::NoSources))
        ));
    }

    #[test]
    fn bad_base_path() {
        assert_eq!(parse_base_path("/").unwrap(), "");
        assert_eq!(parse_base_path("/foo/bar/").unwrap(), "/foo/bar");
        assert!(parse_base_path("foo").is_err());
    }

    #[test]
    fn save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut cfg = parse(indoc! {"
            worker_processes: 2
            sources:
              - id: world
                type: mbtiles
                location: world.mbtiles
        "});
        cfg.finalize().unwrap();
        cfg.save_to_file(&path).unwrap();
        let loaded = read_config(&path, &FauxEnv::default()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file() {
        let err = read_config(Path::new("/surely/missing.yaml"), &FauxEnv::default()).unwrap_err();
        assert!(matches!(err, ConfigFileError::ConfigLoadError(..)));
    }
}
