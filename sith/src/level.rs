use super::errors::{ErrorKind, Result};
use super::tokenizer::Tokenizer;
use failchain::ResultExt;
use indexmap::IndexMap;
use log::{debug, info};
use math::{vec2, vec3, EulerAngles, Vec2f, Vec3f};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub struct LevelMaterial {
    pub name: String,
    pub x_tile: f32,
    pub y_tile: f32,
}

/// A polygon of the level geometry. Corners index the shared vertex and
/// texture vertex pools.
#[derive(Clone, Debug, Default)]
pub struct Surface {
    pub material_index: i32,
    pub surface_flags: u32,
    pub face_flags: u32,
    pub geometry_mode: i32,
    pub lighting_mode: i32,
    pub texture_mode: i32,
    pub adjoin: i32,
    pub extra_light: f32,
    pub vertex_indices: Vec<i32>,
    pub texture_vertex_indices: Vec<i32>,
}

#[derive(Clone, Debug)]
pub struct Template {
    pub name: String,
    pub based_on: String,
    pub model_3d: Option<String>,
    pub params: IndexMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct Thing {
    pub template_name: String,
    pub name: String,
    pub position: Vec3f,
    pub rotation: EulerAngles,
    pub sector_index: i32,
    pub extras: String,
    pub params: IndexMap<String, String>,
}

#[derive(Clone, Debug, Default)]
pub struct Level {
    pub name: String,
    pub vertices: Vec<Vec3f>,
    pub texture_vertices: Vec<Vec2f>,
    pub materials: Vec<LevelMaterial>,
    pub colormaps: Vec<String>,
    pub surfaces: Vec<Surface>,
    /// Keyed by lowercased template name.
    pub templates: IndexMap<String, Template>,
    pub things: Vec<Thing>,
}

impl Level {
    pub fn from_file<P: AsRef<Path>>(path: &P) -> Result<Level> {
        let path = path.as_ref();
        let bytes = fs::read(path).chain_err(|| ErrorKind::on_file_read(path))?;
        let name = path
            .file_stem()
            .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
        Level::from_text(&name, &String::from_utf8_lossy(&bytes))
    }

    pub fn from_text(name: &str, text: &str) -> Result<Level> {
        let mut level = Level {
            name: name.to_owned(),
            ..Level::default()
        };
        let mut tokens = Tokenizer::new(name, text);
        while let Some(token) = tokens.next_token() {
            if !token.eq_ignore_ascii_case("world") {
                continue;
            }
            let section = match tokens.peek_token() {
                Some(section) => section.to_ascii_lowercase(),
                None => break,
            };
            match section.as_str() {
                "vertices" => {
                    tokens.next_token();
                    level.vertices = read_vertices(&mut tokens)?;
                }
                "texture" => {
                    tokens.next_token();
                    if tokens.peek_is("vertices") {
                        tokens.next_token();
                        level.texture_vertices = read_texture_vertices(&mut tokens)?;
                    }
                }
                "materials" => {
                    tokens.next_token();
                    level.materials = read_materials(&mut tokens)?;
                }
                "colormaps" => {
                    tokens.next_token();
                    level.colormaps = read_colormaps(&mut tokens)?;
                }
                "surfaces" => {
                    tokens.next_token();
                    level.surfaces = read_surfaces(&mut tokens)?;
                }
                "templates" => {
                    tokens.next_token();
                    level.templates = read_templates(&mut tokens)?;
                }
                "things" => {
                    tokens.next_token();
                    level.things = read_things(&mut tokens)?;
                }
                _ => debug!("{}: skipping `World {}`", name, section),
            }
        }

        info!("Loaded level '{}':", level.name);
        info!("    {:4} vertices", level.vertices.len());
        info!("    {:4} texture vertices", level.texture_vertices.len());
        info!("    {:4} materials", level.materials.len());
        info!("    {:4} surfaces", level.surfaces.len());
        info!("    {:4} templates", level.templates.len());
        info!("    {:4} things", level.things.len());
        Ok(level)
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(&name.to_ascii_lowercase())
    }

    /// The model of a template, inherited through `based_on` when the
    /// template does not set one itself.
    pub fn template_model(&self, name: &str) -> Option<&str> {
        let mut current = self.template(name)?;
        for _ in 0..self.templates.len() {
            if let Some(ref model) = current.model_3d {
                return Some(model);
            }
            current = self.template(&current.based_on)?;
        }
        None
    }
}

/// Whether a list with an unreliable count has ended.
fn at_list_end(tokens: &mut Tokenizer) -> bool {
    match tokens.peek_token() {
        Some(token) => token.eq_ignore_ascii_case("end") || token.eq_ignore_ascii_case("section"),
        None => true,
    }
}

fn read_vec3(tokens: &mut Tokenizer) -> Result<Vec3f> {
    Ok(vec3(
        tokens.next_float()?,
        tokens.next_float()?,
        tokens.next_float()?,
    ))
}

fn read_vertices(tokens: &mut Tokenizer) -> Result<Vec<Vec3f>> {
    let count = tokens.next_count("vertex")?;
    let mut vertices = Vec::new();
    for _ in 0..count {
        let _index = tokens.next_int()?;
        vertices.push(read_vec3(tokens)?);
    }
    Ok(vertices)
}

fn read_texture_vertices(tokens: &mut Tokenizer) -> Result<Vec<Vec2f>> {
    let count = tokens.next_count("texture vertex")?;
    let mut vertices = Vec::new();
    for _ in 0..count {
        let _index = tokens.next_int()?;
        vertices.push(vec2(tokens.next_float()?, tokens.next_float()?));
    }
    Ok(vertices)
}

fn read_materials(tokens: &mut Tokenizer) -> Result<Vec<LevelMaterial>> {
    let count = tokens.next_count("material")?;
    let mut materials = Vec::new();
    for _ in 0..count {
        if tokens.peek_is("end") {
            break;
        }
        let _index = tokens.next_int()?;
        let name = tokens.next_word("material name")?.to_owned();
        let x_tile = tokens.next_float()?;
        let y_tile = tokens.next_float()?;
        materials.push(LevelMaterial {
            name,
            x_tile,
            y_tile,
        });
    }
    Ok(materials)
}

fn read_colormaps(tokens: &mut Tokenizer) -> Result<Vec<String>> {
    let count = tokens.next_count("colormap")?;
    let mut colormaps = Vec::new();
    for _ in 0..count {
        if tokens.peek_is("end") {
            break;
        }
        let _index = tokens.next_int()?;
        colormaps.push(tokens.next_word("colormap name")?.to_owned());
    }
    Ok(colormaps)
}

fn read_surfaces(tokens: &mut Tokenizer) -> Result<Vec<Surface>> {
    let count = tokens.next_count("surface")?;
    let mut surfaces = Vec::new();
    for _ in 0..count {
        let _index = tokens.next_int()?;
        let material_index = tokens.next_int()?;
        let surface_flags = tokens.next_hex()?;
        let face_flags = tokens.next_hex()?;
        let geometry_mode = tokens.next_int()?;
        let lighting_mode = tokens.next_int()?;
        let texture_mode = tokens.next_int()?;
        let adjoin = tokens.next_int()?;
        let extra_light = tokens.next_float()?;
        let num_corners = tokens.next_count("surface vertex")?;

        let mut vertex_indices = Vec::new();
        let mut texture_vertex_indices = Vec::new();
        for _ in 0..num_corners {
            let (vertex, texture_vertex) = tokens.next_corner()?;
            vertex_indices.push(vertex);
            texture_vertex_indices.push(texture_vertex);
        }
        // Per-corner intensities.
        for _ in 0..num_corners {
            tokens.next_float()?;
        }

        surfaces.push(Surface {
            material_index,
            surface_flags,
            face_flags,
            geometry_mode,
            lighting_mode,
            texture_mode,
            adjoin,
            extra_light,
            vertex_indices,
            texture_vertex_indices,
        });
    }
    Ok(surfaces)
}

/// Splits `key=value` pairs, lowercasing keys. Words without `=` are ignored.
pub fn parse_params(text: &str) -> IndexMap<String, String> {
    text.split_whitespace()
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) if !key.is_empty() => {
                    Some((key.to_ascii_lowercase(), value.to_owned()))
                }
                _ => None,
            }
        })
        .collect()
}

fn read_templates(tokens: &mut Tokenizer) -> Result<IndexMap<String, Template>> {
    let count = tokens.next_count("template")?;
    let mut templates = IndexMap::new();
    for _ in 0..count {
        if at_list_end(tokens) {
            break;
        }
        let name = tokens.next_word("template name")?.to_owned();
        let based_on = tokens.next_word("template base")?.to_owned();
        let params = parse_params(tokens.rest_of_line());
        let model_3d = params.get("model3d").cloned();
        templates.insert(
            name.to_ascii_lowercase(),
            Template {
                name,
                based_on,
                model_3d,
                params,
            },
        );
    }
    Ok(templates)
}

fn read_things(tokens: &mut Tokenizer) -> Result<Vec<Thing>> {
    let declared = tokens.next_count("thing")?;
    let mut things = Vec::new();
    for _ in 0..declared {
        if at_list_end(tokens) {
            break;
        }
        let _index = tokens.next_int()?;
        let template_name = tokens.next_word("thing template")?.to_owned();
        let name = tokens.next_word("thing name")?.to_owned();
        let position = read_vec3(tokens)?;
        let rotation = EulerAngles::new(
            tokens.next_float()?,
            tokens.next_float()?,
            tokens.next_float()?,
        );
        let sector_index = tokens.next_int()?;
        let extras = tokens.rest_of_line().to_owned();
        let params = parse_params(&extras);
        things.push(Thing {
            template_name,
            name,
            position,
            rotation,
            sector_index,
            extras,
            params,
        });
    }
    if things.len() < declared {
        debug!(
            "{}: {} of {} declared things present",
            tokens.file(),
            things.len(),
            declared
        );
    }
    Ok(things)
}
