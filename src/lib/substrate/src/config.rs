//! Bootstrap configuration.
//!
//! Bootstrap never looks at the command line, since every argument belongs to the managed
//! runtime. The few knobs it has come from the environment instead.

use std::{ffi::OsString, path::PathBuf};

use tracing::Level;

use crate::{primordial::REFERENCE_BUFFER_SIZE, BootstrapError};

/// Name of the boot image file, looked for next to the executable.
pub const IMAGE_FILE_NAME: &str = "boot.vmi";

pub const IMAGE_VAR: &str = "SUBSTRATE_IMAGE";
pub const AUX_RESERVE_VAR: &str = "SUBSTRATE_AUX_RESERVE";
pub const LOG_VAR: &str = "SUBSTRATE_LOG";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootConfig {
    /// Full image path. When unset, the image is `IMAGE_FILE_NAME` in the executable's
    /// directory.
    pub image_path: Option<PathBuf>,
    /// Bytes added on top of the auxiliary space the image asks for.
    pub extra_reserve: usize,
    pub log_level: Level,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            image_path: None,
            extra_reserve: REFERENCE_BUFFER_SIZE,
            log_level: Level::WARN,
        }
    }
}

impl BootConfig {
    pub fn from_env() -> Result<Self, BootstrapError> {
        Self::from_lookup(|var| std::env::var_os(var))
    }

    /// Build a config from an arbitrary variable lookup. Unset variables keep their
    /// defaults. The image path may be any OS string; the other values must be UTF-8.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self, BootstrapError> {
        let mut config = Self::default();

        if let Some(path) = lookup(IMAGE_VAR).filter(|p| !p.is_empty()) {
            config.image_path = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup_str(&lookup, AUX_RESERVE_VAR)? {
            config.extra_reserve = parse_size(&value).ok_or_else(|| BootstrapError::Config {
                var: AUX_RESERVE_VAR,
                value: value.clone(),
                reason: "expected a decimal or 0x-prefixed hex byte count".to_string(),
            })?;
        }

        if let Some(value) = lookup_str(&lookup, LOG_VAR)? {
            config.log_level = value.trim().parse::<Level>().map_err(|e| BootstrapError::Config {
                var: LOG_VAR,
                value: value.clone(),
                reason: format!("{}", e),
            })?;
        }

        Ok(config)
    }
}

fn lookup_str(
    lookup: impl Fn(&str) -> Option<OsString>,
    var: &'static str,
) -> Result<Option<String>, BootstrapError> {
    lookup(var)
        .map(|value| {
            value.into_string().map_err(|value| BootstrapError::Config {
                var,
                value: value.to_string_lossy().into_owned(),
                reason: "not valid UTF-8".to_string(),
            })
        })
        .transpose()
}

fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, os::unix::ffi::OsStringExt};

    use super::*;

    fn lookup_os(pairs: Vec<(&str, OsString)>) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> =
            pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        move |k| map.get(k).cloned()
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        lookup_os(
            pairs
                .iter()
                .map(|(k, v)| (*k, OsString::from(*v)))
                .collect(),
        )
    }

    #[test]
    fn defaults() {
        let config = BootConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BootConfig::default());
        assert_eq!(config.image_path, None);
        assert_eq!(config.log_level, Level::WARN);
    }

    #[test]
    fn reads_all_vars() {
        let config = BootConfig::from_lookup(lookup(&[
            (IMAGE_VAR, "/opt/vm/other.vmi"),
            (AUX_RESERVE_VAR, "0x1000"),
            (LOG_VAR, "debug"),
        ]))
        .unwrap();
        assert_eq!(config.image_path, Some(PathBuf::from("/opt/vm/other.vmi")));
        assert_eq!(config.extra_reserve, 0x1000);
        assert_eq!(config.log_level, Level::DEBUG);

        let config = BootConfig::from_lookup(lookup(&[(AUX_RESERVE_VAR, "512")])).unwrap();
        assert_eq!(config.extra_reserve, 512);
    }

    #[test]
    fn empty_image_var_is_unset() {
        let config = BootConfig::from_lookup(lookup(&[(IMAGE_VAR, "")])).unwrap();
        assert_eq!(config.image_path, None);
    }

    #[test]
    fn bad_values() {
        let err = BootConfig::from_lookup(lookup(&[(AUX_RESERVE_VAR, "lots")])).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Config {
                var: AUX_RESERVE_VAR,
                ..
            }
        ));
        assert_eq!(err.exit_code(), 7);

        let err = BootConfig::from_lookup(lookup(&[(LOG_VAR, "chatty")])).unwrap_err();
        assert!(matches!(err, BootstrapError::Config { var: LOG_VAR, .. }));
    }

    #[test]
    fn non_utf8_values() {
        let raw = OsString::from_vec(b"/srv/images/\xffboot.vmi".to_vec());
        let config = BootConfig::from_lookup(lookup_os(vec![(IMAGE_VAR, raw.clone())])).unwrap();
        assert_eq!(config.image_path, Some(PathBuf::from(raw)));

        let bad = OsString::from_vec(b"0x\xff".to_vec());
        let err = BootConfig::from_lookup(lookup_os(vec![(AUX_RESERVE_VAR, bad)])).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Config {
                var: AUX_RESERVE_VAR,
                ..
            }
        ));
        assert_eq!(err.exit_code(), 7);
    }
}
