mod config;
mod errors;
mod import;
mod level;
mod model;
mod palette;
mod texture;
mod tokenizer;

pub mod convert;
pub mod geometry;
pub mod locator;

pub use self::config::ImportConfig;
pub use self::errors::{Error, ErrorKind, Result};
pub use self::import::{import_level, import_model, load_palette, LevelImport, ModelImport};
pub use self::level::{parse_params, Level, LevelMaterial, Surface, Template, Thing};
pub use self::model::{Face, Mesh, Model, Node};
pub use self::palette::{Palette, Rgba8, PALETTE_COLORS};
pub use self::texture::{read_material, read_material_file, Texture};
pub use self::tokenizer::Tokenizer;
