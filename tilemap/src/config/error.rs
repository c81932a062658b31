use std::path::PathBuf;

pub type ConfigFileResult<T> = Result<T, ConfigFileError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigFileError {
    #[error("Unable to load config file {1}: {0}")]
    ConfigLoadError(#[source] std::io::Error, PathBuf),

    #[error("Unable to parse config file {1}: {0}")]
    ConfigParseError(#[source] subst::yaml::Error, PathBuf),

    #[error("Unable to write config file {1}: {0}")]
    ConfigWriteError(#[source] std::io::Error, PathBuf),

    #[error("Unable to serialize the configuration: {0}")]
    ConfigSerializeError(#[source] serde_yaml::Error),

    #[error(
        "No tile sources found. Add sources to the config file or pass .mbtiles files on the command line."
    )]
    NoSources,

    #[error("Source path is not an .mbtiles file: {0}")]
    InvalidFilePath(PathBuf),
}
