use clap::{value_t, App, AppSettings, Arg};
use failchain::ResultExt;
use failure::Fail;
use log::{error, info};
use sith::convert::{node_placement, thing_placement};
use sith::{import_level, import_model, load_palette, read_material_file, ImportConfig, Palette};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

mod errors;

use self::errors::{ErrorKind, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AssetKind {
    Level,
    Model,
    Material,
    Colormap,
}

impl AssetKind {
    fn of(path: &Path) -> Option<AssetKind> {
        let extension = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match extension.as_str() {
            "jkl" => Some(AssetKind::Level),
            "3do" => Some(AssetKind::Model),
            "mat" | "jmat" => Some(AssetKind::Material),
            "cmp" => Some(AssetKind::Colormap),
            _ => None,
        }
    }
}

pub enum RunMode {
    Inspect { asset: PathBuf, config: ImportConfig },
    Check { root: PathBuf, config: ImportConfig },
}

impl RunMode {
    pub fn from_args() -> Result<RunMode> {
        let matches = App::new("Sith Import")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Imports Sith engine levels, models, materials and colormaps.")
            .settings(&[AppSettings::ColoredHelp, AppSettings::ArgRequiredElseHelp])
            .arg(
                Arg::with_name("asset")
                    .help("level, model, material or colormap to inspect")
                    .value_name("FILE")
                    .required_unless("root")
                    .index(1),
            )
            .arg(
                Arg::with_name("root")
                    .long("root")
                    .short("r")
                    .help("import every asset below this directory, then exit")
                    .value_name("DIR")
                    .conflicts_with("asset"),
            )
            .arg(
                Arg::with_name("config")
                    .long("config")
                    .short("c")
                    .help("path to TOML import config")
                    .value_name("FILE"),
            )
            .arg(
                Arg::with_name("serial")
                    .long("serial")
                    .help("decode materials on the calling thread"),
            )
            .get_matches();

        let mut config = match matches.value_of("config") {
            Some(path) => ImportConfig::from_file(&path)
                .chain_err(|| ErrorKind::Argument(format!("bad config `{}`", path)))?,
            None => ImportConfig::default(),
        };
        if matches.is_present("serial") {
            config.parallel = false;
        }

        Ok(if matches.is_present("root") {
            let root: PathBuf = value_t!(matches, "root", String)
                .chain_err(|| ErrorKind::Argument("missing --root".to_owned()))?
                .into();
            RunMode::Check { root, config }
        } else {
            let asset: PathBuf = value_t!(matches, "asset", String)
                .chain_err(|| ErrorKind::Argument("missing asset".to_owned()))?
                .into();
            RunMode::Inspect { asset, config }
        })
    }
}

fn inspect_level(path: &Path, config: &ImportConfig) -> Result<()> {
    let import = import_level(&path, config).chain_err(|| ErrorKind::on_import(path))?;
    let level = &import.level;
    println!("level {}", level.name);
    let colormap = if import.palette.is_some() {
        "found"
    } else {
        "missing"
    };
    println!("  colormap: {}", colormap);
    for (material, texture) in level.materials.iter().zip(&import.textures) {
        match texture {
            Some(texture) => println!(
                "  material {:16} {}x{}",
                material.name, texture.width, texture.height
            ),
            None => println!("  material {:16} missing", material.name),
        }
    }
    for submesh in &import.geometry.submeshes {
        let material = submesh
            .material
            .map_or_else(|| "fallback".to_owned(), |index| index.to_string());
        println!(
            "  submesh {:>8}: {:6} triangles",
            material,
            submesh.indices.len() / 3
        );
    }
    for thing in &level.things {
        let placement = thing_placement(thing);
        println!(
            "  thing {:16} {:16} model {:12} at ({:.3}, {:.3}, {:.3})",
            thing.name,
            thing.template_name,
            level.template_model(&thing.template_name).unwrap_or("-"),
            placement.position.x,
            placement.position.y,
            placement.position.z
        );
    }
    Ok(())
}

fn inspect_model(path: &Path, config: &ImportConfig) -> Result<()> {
    let import = import_model(&path, config).chain_err(|| ErrorKind::on_import(path))?;
    let model = &import.model;
    println!("model {} (radius {})", model.name, model.radius);
    for (mesh, buffers) in model.meshes.iter().zip(&import.meshes) {
        println!(
            "  mesh {:16} {:5} vertices {:5} triangles",
            mesh.name,
            buffers.positions.len(),
            buffers.triangle_count()
        );
    }
    for (index, node) in model.nodes.iter().enumerate() {
        let placement = node_placement(node);
        let parent = model
            .node_parent(index)
            .map_or_else(|| "root".to_owned(), |parent| model.nodes[parent].name.clone());
        println!(
            "  node {:16} parent {:16} mesh {:16} at ({:.3}, {:.3}, {:.3})",
            node.name,
            parent,
            model.node_mesh(index).map_or("-", |mesh| mesh.name.as_str()),
            placement.position.x,
            placement.position.y,
            placement.position.z
        );
    }
    Ok(())
}

fn inspect_material(path: &Path, config: &ImportConfig) -> Result<()> {
    let palette = load_palette(path, config, &[]);
    let textures = read_material_file(&path, palette.as_ref().map(|palette| &**palette))
        .chain_err(|| ErrorKind::on_import(path))?;
    println!("material {}", path.display());
    for texture in &textures {
        println!(
            "  texture {}x{}{}",
            texture.width,
            texture.height,
            if texture.transparent { " transparent" } else { "" }
        );
    }
    Ok(())
}

fn inspect_colormap(path: &Path) -> Result<()> {
    let palette = Palette::from_file(&path).chain_err(|| ErrorKind::on_import(path))?;
    match palette {
        Some(palette) => println!(
            "colormap {}: first color {:?}",
            path.display(),
            palette.color(0)
        ),
        None => println!("colormap {}: invalid", path.display()),
    }
    Ok(())
}

fn import(path: &Path, config: &ImportConfig) -> Result<()> {
    match AssetKind::of(path) {
        Some(AssetKind::Level) => inspect_level(path, config),
        Some(AssetKind::Model) => inspect_model(path, config),
        Some(AssetKind::Material) => inspect_material(path, config),
        Some(AssetKind::Colormap) => inspect_colormap(path),
        None => Err(ErrorKind::unsupported_asset(path).into()),
    }
}

fn check(root: &Path, config: &ImportConfig) -> Result<()> {
    info!("Importing every asset below `{}`...", root.display());
    let start = Instant::now();
    let (mut imported, mut failed) = (0, 0);
    let entries = WalkDir::new(root).sort_by(|left, right| left.file_name().cmp(right.file_name()));
    for entry in entries {
        let entry = entry
            .chain_err(|| ErrorKind::Argument(format!("cannot walk `{}`", root.display())))?;
        let path = entry.path();
        let result = match AssetKind::of(path) {
            Some(AssetKind::Level) => import_level(&path, config).map(|_| ()),
            Some(AssetKind::Model) => import_model(&path, config).map(|_| ()),
            Some(AssetKind::Material) => {
                let palette = load_palette(path, config, &[]);
                read_material_file(&path, palette.as_ref().map(|palette| &**palette)).map(|_| ())
            }
            _ => continue,
        };
        match result {
            Ok(()) => imported += 1,
            Err(error) => {
                failed += 1;
                error!("{}: {}", path.display(), error);
            }
        }
    }
    info!(
        "Imported {} assets ({} failed) in {:.4}s.",
        imported + failed,
        failed,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run() -> Result<()> {
    env_logger::init();

    match RunMode::from_args()? {
        RunMode::Inspect { asset, config } => import(&asset, &config),
        RunMode::Check { root, config } => check(&root, &config),
    }
}

fn main() {
    if let Err(error) = run() {
        error!("Fatal error: {}", error);
        for cause in (&error as &dyn Fail).iter_causes() {
            error!("    caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
