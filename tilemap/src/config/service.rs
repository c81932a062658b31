use serde::{Deserialize, Serialize};
use tilemap_core::config::{DEFAULT_JPEG_QUALITY, ServiceProperties, UnrecognizedValues};

use crate::{TilemapError, TilemapResult};

/// The `service` section of the configuration file.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Comma separated keyword list, e.g. `wms,service,tile`.
    pub keywords: Option<String>,
    /// Quality of JPEG images produced by transcoding and map rendering.
    pub jpeg_quality: Option<u8>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl ServiceConfig {
    pub fn validate(&self) -> TilemapResult<()> {
        match self.jpeg_quality {
            Some(q) if !(1..=100).contains(&q) => Err(TilemapError::InvalidJpegQuality(q)),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn to_properties(&self) -> ServiceProperties {
        ServiceProperties {
            title: self.title.clone().unwrap_or_default(),
            abstract_text: self.abstract_text.clone().unwrap_or_default(),
            keywords: self
                .keywords
                .as_deref()
                .map(ServiceProperties::parse_keywords)
                .unwrap_or_default(),
            jpeg_quality: self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn keywords_become_a_list() {
        let cfg: ServiceConfig = serde_yaml::from_str(indoc! {"
            title: Tiles
            abstract: All the tiles
            keywords: wms, service,tile
            jpeg_quality: 75
        "})
        .unwrap();
        assert_eq!(
            cfg.to_properties(),
            ServiceProperties {
                title: "Tiles".to_string(),
                abstract_text: "All the tiles".to_string(),
                keywords: vec!["wms".to_string(), "service".to_string(), "tile".to_string()],
                jpeg_quality: 75,
            }
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn defaults() {
        let props = ServiceConfig::default().to_properties();
        assert_eq!(props, ServiceProperties::default());
        assert_eq!(props.jpeg_quality, DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn quality_out_of_range() {
        let cfg = ServiceConfig {
            jpeg_quality: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(TilemapError::InvalidJpegQuality(0))
        ));
    }
}
