//! Environment variable access for `${VAR}` substitution in configuration files.

use std::collections::HashMap;
use std::env::var_os;
use std::ffi::OsString;

use subst::VariableMap;
use tracing::warn;

/// Environment access that can be replaced in tests.
pub trait Env<'a>: VariableMap<'a> {
    /// Raw variable value, without Unicode validation.
    fn var_os(&self, key: &str) -> Option<OsString>;

    /// Variable value as UTF-8, `None` with a warning if it is not valid Unicode.
    #[must_use]
    fn get_env_str(&self, key: &str) -> Option<String> {
        match self.var_os(key)?.into_string() {
            Ok(v) => Some(v),
            Err(v) => {
                let v = v.to_string_lossy();
                warn!("Environment variable {key} has invalid unicode. Lossy representation: {v}");
                None
            }
        }
    }
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEnv;

impl Env<'_> for OsEnv {
    fn var_os(&self, key: &str) -> Option<OsString> {
        var_os(key)
    }
}

impl<'a> VariableMap<'a> for OsEnv {
    type Value = String;

    fn get(&'a self, key: &str) -> Option<Self::Value> {
        self.get_env_str(key)
    }
}

/// A fixed set of variables, used by tests.
#[derive(Debug, Default)]
pub struct FauxEnv(pub HashMap<&'static str, OsString>);

impl<'a> VariableMap<'a> for FauxEnv {
    type Value = String;

    fn get(&'a self, key: &str) -> Option<Self::Value> {
        self.get_env_str(key)
    }
}

impl Env<'_> for FauxEnv {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.0.get(key).map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faux_env_lookup() {
        let env = FauxEnv::default();
        assert_eq!(env.get_env_str("FOO"), None);

        let env = FauxEnv(vec![("FOO", OsString::from("bar"))].into_iter().collect());
        assert_eq!(env.get_env_str("FOO"), Some("bar".to_string()));
        assert_eq!(env.get("FOO"), Some("bar".to_string()));
    }

    #[test]
    #[cfg(unix)]
    fn invalid_unicode_is_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt as _;

        let bad_utf8 = [0x66, 0x6f, 0x80, 0x6f];
        let os_str = OsStr::from_bytes(&bad_utf8[..]);
        let env = FauxEnv(vec![("BAD", os_str.to_owned())].into_iter().collect());
        assert!(env.0.contains_key("BAD"));
        assert_eq!(env.get_env_str("BAD"), None);
        assert_eq!(env.get("BAD"), None);
    }

    #[test]
    fn os_env_misses_unset_variables() {
        assert_eq!(OsEnv.get("TILEMAP_SURELY_UNSET_VARIABLE"), None);
        assert_eq!(OsEnv.get_env_str("TILEMAP_SURELY_UNSET_VARIABLE"), None);
    }
}
