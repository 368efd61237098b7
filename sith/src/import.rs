//! Whole-asset imports: parse a level or model, find and decode its
//! colormap and materials, and build its geometry.

use super::config::ImportConfig;
use super::convert::TextureSize;
use super::errors::Result;
use super::geometry::{GeometryBuilder, MeshBuffers};
use super::level::Level;
use super::locator::{find_companion, find_palette, material_alias};
use super::model::Model;
use super::palette::Palette;
use super::texture::{read_material_file, Texture};
use log::{info, warn};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;

pub struct LevelImport {
    pub level: Level,
    pub palette: Option<Arc<Palette>>,
    /// One entry per level material; `None` where none could be decoded.
    pub textures: Vec<Option<Texture>>,
    pub geometry: MeshBuffers,
}

pub struct ModelImport {
    pub model: Model,
    pub palette: Option<Arc<Palette>>,
    pub textures: Vec<Option<Texture>>,
    /// Geometry of each mesh of the first geoset, in mesh order.
    pub meshes: Vec<MeshBuffers>,
}

pub fn import_level<P: AsRef<Path>>(path: &P, config: &ImportConfig) -> Result<LevelImport> {
    let path = path.as_ref();
    let level = Level::from_file(&path)?;
    let palette = load_palette(path, config, &level.colormaps);
    let names: Vec<&str> = level
        .materials
        .iter()
        .map(|material| material.name.as_str())
        .collect();
    let textures = load_materials(path, &names, palette.as_ref().map(|p| &**p), config);
    let sizes = texture_sizes(&textures);

    let geometry = GeometryBuilder::new(&level.name, &level.vertices, &level.texture_vertices)
        .materials(&sizes)
        .default_texture_size(config.default_texture_size)
        .uv_convention(config.level)
        .build(&level.surfaces)?;

    info!(
        "Imported level '{}': {} of {} materials decoded, {} triangles in {} submeshes.",
        level.name,
        textures.iter().filter(|texture| texture.is_some()).count(),
        textures.len(),
        geometry.triangle_count(),
        geometry.submeshes.len()
    );
    Ok(LevelImport {
        level,
        palette,
        textures,
        geometry,
    })
}

pub fn import_model<P: AsRef<Path>>(path: &P, config: &ImportConfig) -> Result<ModelImport> {
    let path = path.as_ref();
    let model = Model::from_file(&path)?;
    let palette = load_palette(path, config, &[]);
    let names: Vec<&str> = model.materials.iter().map(String::as_str).collect();
    let textures = load_materials(path, &names, palette.as_ref().map(|p| &**p), config);
    let sizes = texture_sizes(&textures);

    let meshes = model
        .meshes
        .iter()
        .map(|mesh| {
            let context = format!("{}:{}", model.name, mesh.name);
            GeometryBuilder::new(&context, &mesh.vertices, &mesh.uvs)
                .materials(&sizes)
                .default_texture_size(config.default_texture_size)
                .uv_convention(config.model)
                .build(&mesh.faces)
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Imported model '{}': {} of {} materials decoded, {} triangles in {} meshes.",
        model.name,
        textures.iter().filter(|texture| texture.is_some()).count(),
        textures.len(),
        meshes.iter().map(MeshBuffers::triangle_count).sum::<usize>(),
        meshes.len()
    );
    Ok(ModelImport {
        model,
        palette,
        textures,
        meshes,
    })
}

/// Finds and decodes the colormap for `asset`. A missing or unreadable
/// colormap is not an error; indexed textures then decode as grayscale.
pub fn load_palette(
    asset: &Path,
    config: &ImportConfig,
    preferred: &[String],
) -> Option<Arc<Palette>> {
    let path = match find_palette(asset, &config.palette, preferred) {
        Some(path) => path,
        None => {
            warn!(
                "No colormap for `{}`, decoding textures as grayscale.",
                asset.display()
            );
            return None;
        }
    };
    match Palette::from_file(&path) {
        Ok(palette) => palette.map(Arc::new),
        Err(error) => {
            warn!("Skipping colormap `{}`: {}", path.display(), error);
            None
        }
    }
}

fn load_materials(
    asset: &Path,
    names: &[&str],
    palette: Option<&Palette>,
    config: &ImportConfig,
) -> Vec<Option<Texture>> {
    if config.parallel {
        names
            .par_iter()
            .map(|name| load_material(asset, name, palette))
            .collect()
    } else {
        names
            .iter()
            .map(|name| load_material(asset, name, palette))
            .collect()
    }
}

fn load_material(asset: &Path, name: &str, palette: Option<&Palette>) -> Option<Texture> {
    let alias = material_alias(name);
    let path = match find_companion(asset, name, Some(&alias)) {
        Some(path) => path,
        None => {
            warn!("Material `{}` not found for `{}`.", name, asset.display());
            return None;
        }
    };
    match read_material_file(&path, palette) {
        Ok(textures) => {
            let texture = textures.into_iter().next();
            if texture.is_none() {
                warn!("Material `{}` has no texture.", path.display());
            }
            texture
        }
        Err(error) => {
            warn!("Skipping material `{}`: {}", path.display(), error);
            None
        }
    }
}

fn texture_sizes(textures: &[Option<Texture>]) -> Vec<Option<TextureSize>> {
    textures
        .iter()
        .map(|texture| texture.as_ref().map(Texture::size))
        .collect()
}

#[cfg(test)]
mod test {
    use super::{import_level, import_model};
    use crate::config::ImportConfig;
    use crate::locator::PaletteRules;
    use crate::model::test::MODEL;
    use crate::palette::test::colormap_bytes;
    use crate::texture::test::{material_bytes, MipSpec};
    use math::vec2;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const LEVEL: &str = "
World Colormaps 1
0: dflt.cmp

World vertices 4
0: 0 0 0
1: 1 0 0
2: 1 1 0
3: 0 1 0

World texture vertices 2
0: 0 0
1: 1 2

World materials 2
0: floor.mat 1 1
1: missing.mat 1 1
end

World surfaces 3
0: 0 0x0 0x0 4 3 4 -1 0 4 0,0 1,1 2,1 3,0 1 1 1 1
1: 1 0x0 0x0 4 3 4 -1 0 3 0,0 1,1 2,1 1 1 1
2: 999 0x0 0x0 4 3 4 -1 0 3 0,0 2,1 3,1 1 1 1
";

    fn write(root: &Path, relative: &str, bytes: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("test: no parent"))
            .expect("test: create_dir_all failed");
        fs::write(&path, bytes).expect("test: write failed");
    }

    fn small_material(index: u8) -> Vec<u8> {
        material_bytes(
            2,
            8,
            &[MipSpec {
                width: 2,
                height: 4,
                transparent: false,
                num_mips: 1,
                pixels: &[index; 8],
            }],
        )
    }

    fn config(root: &Path, parallel: bool) -> ImportConfig {
        ImportConfig {
            parallel,
            palette: PaletteRules {
                root_boundary: Some(root.to_path_buf()),
                ..PaletteRules::default()
            },
            ..ImportConfig::default()
        }
    }

    #[test]
    fn test_import_level() {
        let root = TempDir::new().expect("test: tempdir failed");
        write(root.path(), "game/jkl/test.jkl", LEVEL.as_bytes());
        write(root.path(), "game/cmp/dflt.cmp", &colormap_bytes(&[(5, [200, 100, 50])]));
        write(root.path(), "game/mat/floor.mat", &small_material(5));

        for &parallel in &[true, false] {
            let path = root.path().join("game/jkl/test.jkl");
            let import =
                import_level(&path, &config(root.path(), parallel)).expect("test: import failed");
            assert!(import.palette.is_some());
            assert_eq!(import.level.name, "test");
            assert_eq!(import.textures.len(), 2);
            let floor = import.textures[0].as_ref().expect("test: floor not decoded");
            assert_eq!((floor.width, floor.height), (2, 4));
            assert_eq!(floor.pixel(1, 3), Some([200, 100, 50, 255]));
            assert!(import.textures[1].is_none());

            let geometry = &import.geometry;
            let materials: Vec<_> = geometry
                .submeshes
                .iter()
                .map(|submesh| submesh.material)
                .collect();
            assert_eq!(materials, vec![None, Some(0), Some(1)]);
            assert_eq!(geometry.triangle_count(), 4);
            // The floor normalizes by its 2x4 texture, the others by 64.
            assert_eq!(geometry.uvs[1], vec2(0.5, 0.5));
            assert_eq!(geometry.uvs[5], vec2(1.0 / 64.0, 1.0 - 2.0 / 64.0));
        }
    }

    #[test]
    fn test_import_model() {
        let root = TempDir::new().expect("test: tempdir failed");
        write(root.path(), "mission/3do/ship.3do", MODEL.as_bytes());
        write(root.path(), "mission/mat/BODY.JMAT", &small_material(7));

        let path = root.path().join("mission/3do/ship.3do");
        let import = import_model(&path, &config(root.path(), true)).expect("test: import failed");
        assert!(import.palette.is_none());
        assert_eq!(import.model.name, "ship");
        let body = import.textures[0].as_ref().expect("test: body not decoded");
        assert_eq!(body.pixel(0, 0), Some([7, 7, 7, 255]));
        assert!(import.textures[1].is_none());

        assert_eq!(import.meshes.len(), 2);
        assert_eq!(import.meshes[0].triangle_count(), 3);
        assert_eq!(import.meshes[0].positions.len(), 7);
        assert!(import.meshes[1].is_empty());
    }

    #[test]
    fn test_import_missing_file() {
        let root = TempDir::new().expect("test: tempdir failed");
        let config = config(root.path(), false);
        assert!(import_level(&root.path().join("nope.jkl"), &config).is_err());
        assert!(import_model(&root.path().join("nope.3do"), &config).is_err());
    }
}
