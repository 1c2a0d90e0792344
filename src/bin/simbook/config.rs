use super::ThemeArg;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use simbook::types::FileId;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = if let Some(config_path) = path.as_ref() {
            if config_path.exists() {
                read_file(config_path)?
            } else {
                RawConfig::default()
            }
        } else {
            RawConfig::default()
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_image(&self) -> Option<&PathBuf> {
        self.data.card.image.as_ref()
    }

    pub fn pbr_fid(&self) -> Result<Option<FileId>, ConfigError> {
        self.data
            .card
            .pbr_fid
            .as_deref()
            .map(parse_file_id)
            .transpose()
    }

    pub fn theme(&self) -> Result<Option<ThemeArg>, ConfigError> {
        match self.data.output.theme.as_deref() {
            Some(value) => ThemeArg::from_str(value, true)
                .map(Some)
                .map_err(|_| ConfigError::InvalidTheme {
                    value: value.to_string(),
                }),
            None => Ok(None),
        }
    }
}

pub fn parse_file_id(value: &str) -> Result<FileId, ConfigError> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16)
        .map(FileId)
        .map_err(|_| ConfigError::InvalidFileId {
            value: value.to_string(),
        })
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    card: CardSection,
    #[serde(default)]
    output: OutputSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CardSection {
    image: Option<PathBuf>,
    pbr_fid: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct OutputSection {
    theme: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("file id '{value}' is not a 4-digit hex number")]
    InvalidFileId { value: String },
    #[error("theme '{value}' is invalid")]
    InvalidTheme { value: String },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("simbook").join("config.toml"))
}
