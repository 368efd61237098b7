//! Companion file lookup: materials next to levels and models, and the
//! colormap an asset's textures are decoded with.

use log::{debug, trace};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PALETTE_DIR: &str = "cmp";
const PALETTE_EXTENSION: &str = "cmp";
const MATERIAL_ALIAS_EXTENSION: &str = "jmat";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaletteRules {
    /// Palette searched for below a project root.
    pub canonical_name: String,
    /// Directory name marking a project root.
    pub project_marker: String,
    /// The upward walk never leaves this directory.
    pub root_boundary: Option<PathBuf>,
}

impl Default for PaletteRules {
    fn default() -> Self {
        PaletteRules {
            canonical_name: "dflt.cmp".to_owned(),
            project_marker: "resource".to_owned(),
            root_boundary: None,
        }
    }
}

fn asset_dir(asset: &Path) -> &Path {
    match asset.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Directories searched for an asset's companions, in priority order.
pub fn candidate_dirs(asset: &Path) -> Vec<PathBuf> {
    let dir = asset_dir(asset);
    let mut dirs = vec![
        dir.to_path_buf(),
        dir.join("mat"),
        dir.join("3do").join("mat"),
    ];
    if let Some(parent) = dir.parent() {
        dirs.push(parent.join("mat"));
        dirs.push(parent.join("3do").join("mat"));
    }
    dirs
}

/// Material file name under its renamed extension.
pub fn material_alias(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map_or_else(|| name.into(), |stem| stem.to_string_lossy());
    format!("{}.{}", stem, MATERIAL_ALIAS_EXTENSION)
}

/// Files of a directory sorted by name. Unreadable directories are empty.
fn dir_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect(),
        Err(_) => return Vec::new(),
    };
    files.sort();
    files
}

fn name_matches(path: &Path, name: &str) -> bool {
    path.file_name()
        .map_or(false, |file_name| file_name.to_string_lossy().eq_ignore_ascii_case(name))
}

fn extension_matches(path: &Path, extension: &str) -> bool {
    path.extension()
        .map_or(false, |ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

/// Finds `primary` or `alias` (ignoring case) in the candidate directories of
/// `asset`. Earlier directories win; within a directory `primary` wins.
pub fn find_companion(asset: &Path, primary: &str, alias: Option<&str>) -> Option<PathBuf> {
    for dir in candidate_dirs(asset) {
        let files = dir_files(&dir);
        let found = files
            .iter()
            .find(|path| name_matches(path, primary))
            .or_else(|| alias.and_then(|alias| files.iter().find(|path| name_matches(path, alias))));
        if let Some(found) = found {
            debug!("Found `{}` at `{}`", primary, found.display());
            return Some(found.clone());
        }
        trace!("`{}` not in `{}`", primary, dir.display());
    }
    None
}

fn find_child_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.is_dir() {
        return Some(exact);
    }
    fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| path.is_dir() && name_matches(path, name))
}

fn palette_in_dir(dir: &Path, preferred: &[String]) -> Option<PathBuf> {
    let palette_dir = find_child_dir(dir, PALETTE_DIR)?;
    let files = dir_files(&palette_dir);
    preferred
        .iter()
        .filter_map(|name| files.iter().find(|path| name_matches(path, name)))
        .chain(files.iter().filter(|path| extension_matches(path, PALETTE_EXTENSION)))
        .next()
        .cloned()
}

fn canonical_palette_below(dir: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by(|left, right| left.file_name().cmp(right.file_name()))
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && name_matches(entry.path(), name))
        .map(|entry| entry.into_path())
}

/// Absolute form of `path`, resolved against the working directory when it
/// cannot be canonicalized.
fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    })
}

/// Walks up from the asset's directory looking for a colormap. `preferred`
/// names (e.g. a level's own colormaps) are tried first in every `cmp`
/// directory. The walk ends at the filesystem root or on leaving
/// `rules.root_boundary`.
pub fn find_palette(asset: &Path, rules: &PaletteRules, preferred: &[String]) -> Option<PathBuf> {
    let start = absolute(asset_dir(asset));
    let boundary = rules.root_boundary.as_ref().map(|boundary| absolute(boundary));
    let mut dir = start.as_path();
    loop {
        if let Some(ref boundary) = boundary {
            if !dir.starts_with(boundary) {
                break;
            }
        }

        if let Some(palette) = palette_in_dir(dir, preferred) {
            debug!("Found colormap `{}`", palette.display());
            return Some(palette);
        }

        if name_matches(dir, &rules.project_marker) {
            if let Some(palette) = canonical_palette_below(dir, &rules.canonical_name) {
                debug!("Found project colormap `{}`", palette.display());
                return Some(palette);
            }
        }

        dir = match dir.parent() {
            Some(parent) => parent,
            None => break,
        };
    }
    debug!("No colormap found for `{}`", asset.display());
    None
}
