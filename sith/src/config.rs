use super::convert::UvConvention;
use super::errors::{ErrorKind, Result};
use super::geometry::DEFAULT_TEXTURE_SIZE;
use super::locator::PaletteRules;
use failchain::ResultExt;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Import settings. Every field may be omitted from the TOML text.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Normalizes UVs of materials without a decoded texture.
    pub default_texture_size: u32,
    /// Decode the materials of one asset on the rayon pool.
    pub parallel: bool,
    pub level: UvConvention,
    pub model: UvConvention,
    pub palette: PaletteRules,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            default_texture_size: DEFAULT_TEXTURE_SIZE,
            parallel: true,
            level: UvConvention::default(),
            model: UvConvention::default(),
            palette: PaletteRules::default(),
        }
    }
}

impl ImportConfig {
    pub fn from_file<P: AsRef<Path>>(path: &P) -> Result<ImportConfig> {
        let mut contents = String::new();
        let path = path.as_ref();
        File::open(path)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .chain_err(|| ErrorKind::on_file_read(path))?;
        ImportConfig::from_text(&contents)
    }

    pub fn from_text(text: &str) -> Result<ImportConfig> {
        toml::from_str(text).chain_err(ErrorKind::on_config_parse)
    }
}
