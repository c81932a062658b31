use std::collections::HashMap;

use actix_web::web::Query;
use tilemap_core::ogc::{ExceptionCode, OgcException};

/// Query string parameters of an OGC request, matched by name case-insensitively.
///
/// Parameters given more than once keep their first value. Empty values count as absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OgcParams(HashMap<String, String>);

impl OgcParams {
    pub fn from_query(query: &str) -> Result<Self, OgcException> {
        let pairs = Query::<Vec<(String, String)>>::from_query(query).map_err(|e| {
            OgcException::new(
                ExceptionCode::InvalidParameterValue,
                format!("Unable to parse the query string: {e}"),
            )
        })?;
        let mut map = HashMap::with_capacity(pairs.len());
        for (key, value) in pairs.into_inner() {
            map.entry(key.to_ascii_lowercase()).or_insert(value);
        }
        Ok(Self(map))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(&key.to_ascii_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns the value of `key`, or a `MissingParameter` exception.
    pub fn require(&self, key: &str) -> Result<&str, OgcException> {
        self.get(key).ok_or_else(|| {
            OgcException::new(
                ExceptionCode::MissingParameter,
                format!("{} parameter is not defined", key.to_ascii_uppercase()),
            )
        })
    }

    /// Parses the integer value of `key`, which must be present.
    pub fn require_int(&self, key: &str) -> Result<i64, OgcException> {
        parse_int(key, self.require(key)?)
    }
}

pub fn parse_int(key: &str, value: &str) -> Result<i64, OgcException> {
    value.parse().map_err(|_| {
        OgcException::new(
            ExceptionCode::InvalidParameterValue,
            format!(
                "{} must be an integer, but is '{value}'",
                key.to_ascii_uppercase()
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_ignore_case() {
        let p = OgcParams::from_query("SERVICE=WMTS&Request=GetTile&layer=a&layer=b&style=").unwrap();
        assert_eq!(p.get("service"), Some("WMTS"));
        assert_eq!(p.get("REQUEST"), Some("GetTile"));
        assert_eq!(p.get("Layer"), Some("a"));
        assert_eq!(p.get("style"), None);
        assert_eq!(p.get("format"), None);
    }

    #[test]
    fn values_are_decoded() {
        let p = OgcParams::from_query("format=image%2Fpng&bbox=-1%2C-2,3,4").unwrap();
        assert_eq!(p.get("format"), Some("image/png"));
        assert_eq!(p.get("bbox"), Some("-1,-2,3,4"));
    }

    #[test]
    fn missing_and_invalid_values() {
        let p = OgcParams::from_query("tilematrix=x&tilerow=3").unwrap();
        let e = p.require("layer").unwrap_err();
        assert_eq!(e.code, ExceptionCode::MissingParameter);
        assert_eq!(e.message, "LAYER parameter is not defined");
        let e = p.require_int("tilematrix").unwrap_err();
        assert_eq!(e.code, ExceptionCode::InvalidParameterValue);
        assert_eq!(p.require_int("tilerow").unwrap(), 3);
    }
}
