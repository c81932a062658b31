use std::collections::HashMap;

use futures::future::try_join_all;
use tilemap_tile_utils::MAX_ZOOM;
use tracing::debug;

use crate::config::{ServiceProperties, SourceConfig, SourceType};
use crate::tiles::{BoxedSource, TileError, TileResult};

/// Immutable set of named tile sources plus the service wide properties.
///
/// Built once during startup and shared read-only by all request handlers.
#[derive(Debug, Clone, Default)]
pub struct TileSources {
    sources: Vec<BoxedSource>,
    index: HashMap<String, usize>,
    service: ServiceProperties,
}

impl TileSources {
    /// Creates a registry from already built sources, keeping their order.
    ///
    /// Fails if two sources share an id.
    pub fn new(sources: Vec<BoxedSource>, service: ServiceProperties) -> TileResult<Self> {
        let mut index = HashMap::with_capacity(sources.len());
        for (idx, src) in sources.iter().enumerate() {
            if index.insert(src.get_id().to_string(), idx).is_some() {
                return Err(TileError::DuplicateSourceId(src.get_id().to_string()));
            }
        }
        Ok(Self {
            sources,
            index,
            service,
        })
    }

    /// Validates every configuration, then builds all sources concurrently.
    ///
    /// Any failing source fails the whole registry.
    pub async fn resolve(configs: &[SourceConfig], service: ServiceProperties) -> TileResult<Self> {
        let mut seen = HashMap::new();
        for (idx, cfg) in configs.iter().enumerate() {
            validate(idx, cfg)?;
            if seen.insert(cfg.id.as_str(), idx).is_some() {
                return Err(TileError::DuplicateSourceId(cfg.id.clone()));
            }
        }

        let sources = try_join_all(configs.iter().map(build_source)).await?;
        for src in &sources {
            let info = src.get_info();
            if info.min_zoom > info.max_zoom || info.max_zoom > MAX_ZOOM {
                return Err(TileError::InvalidZoomRange(
                    info.id.clone(),
                    info.min_zoom,
                    info.max_zoom,
                ));
            }
        }
        debug!("Initialized {} tile sources", sources.len());
        Self::new(sources, service)
    }

    /// Whether a source with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Returns the source with `id`.
    ///
    /// # Panics
    /// Panics when no such source exists. Use [`contains`](Self::contains) first.
    #[must_use]
    #[expect(clippy::panic)]
    pub fn get(&self, id: &str) -> &BoxedSource {
        match self.index.get(id) {
            Some(idx) => &self.sources[*idx],
            None => panic!("Tile source {id} is not registered"),
        }
    }

    /// Returns the source with `id`, if any.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&BoxedSource> {
        self.index.get(id).map(|idx| &self.sources[*idx])
    }

    /// All sources in configuration order.
    pub fn sources(&self) -> impl Iterator<Item = &BoxedSource> {
        self.sources.iter()
    }

    /// Service wide properties.
    #[must_use]
    pub fn service(&self) -> &ServiceProperties {
        &self.service
    }

    /// Number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether there are no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn validate(idx: usize, cfg: &SourceConfig) -> TileResult<()> {
    if cfg.id.trim().is_empty() {
        return Err(TileError::MissingId(idx));
    }
    if cfg.location.trim().is_empty() {
        return Err(TileError::MissingLocation(cfg.id.clone()));
    }
    let min = cfg.min_zoom.unwrap_or(0);
    let max = cfg.max_zoom.unwrap_or(MAX_ZOOM);
    if min > max || min > MAX_ZOOM || max > MAX_ZOOM {
        return Err(TileError::InvalidZoomRange(cfg.id.clone(), min, max));
    }
    Ok(())
}

async fn build_source(cfg: &SourceConfig) -> TileResult<BoxedSource> {
    match cfg.source_type {
        #[cfg(feature = "mbtiles")]
        SourceType::Mbtiles => Ok(Box::new(super::mbtiles::MbtSource::new(cfg).await?)),
        #[cfg(feature = "postgis")]
        SourceType::Postgis => Ok(Box::new(super::postgis::PostgisSource::new(cfg).await?)),
        #[cfg(feature = "file")]
        SourceType::File => Ok(Box::new(super::file::FileSource::new(cfg).await?)),
        #[allow(unreachable_patterns)]
        other => Err(TileError::UnsupportedSourceType(cfg.id.clone(), other)),
    }
}
