use super::convert::TextureSize;
use super::errors::{ErrorKind, Result};
use super::palette::{Palette, Rgba8};
use byteorder::{LittleEndian, ReadBytesExt};
use failchain::{bail, ensure, ResultExt};
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const MAX_MIP_LEVELS: i32 = 16;

const MAT_HEADER: &[u8; 4] = b"MAT ";
const TEXTURE_RECORD_TYPE: i32 = 2;
const TEXTURE_RECORD_SIZE: usize = 40;
const COLOR_RECORD_SIZE: usize = 24;

#[derive(Copy, Clone, Deserialize)]
struct MatHeader {
    identifier: [u8; 4],
    version: f32,
    record_type: i32,
    num_records: i32,
    num_textures: i32,
    color_format: [i32; 14],
}

impl MatHeader {
    fn bits_per_pixel(&self) -> i32 {
        self.color_format[1]
    }
}

struct MipHeader {
    width: i32,
    height: i32,
    transparent: bool,
    num_mips: i32,
}

/// A decoded texture. Rows are stored bottom row first.
#[derive(Clone, Debug)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgba8>,
    pub transparent: bool,
}

impl Texture {
    pub fn size(&self) -> TextureSize {
        TextureSize {
            width: self.width,
            height: self.height,
        }
    }

    /// Pixel at column `x` of row `y`, where row 0 is the bottom row.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .cloned()
    }

    pub fn rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|pixel| pixel.iter().cloned()).collect()
    }
}

pub fn read_material_file<P: AsRef<Path>>(
    path: &P,
    palette: Option<&Palette>,
) -> Result<Vec<Texture>> {
    let path = path.as_ref();
    let buffer = fs::read(path).chain_err(|| ErrorKind::on_file_read(path))?;
    let name = path
        .file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
    read_material(&name, &buffer, palette)
}

/// Decodes the first texture of a material container.
///
/// Containers with a bad signature, or whose records are flat colors rather
/// than textures, decode to no textures at all.
pub fn read_material(name: &str, buffer: &[u8], palette: Option<&Palette>) -> Result<Vec<Texture>> {
    if buffer.len() < MAT_HEADER.len() || &buffer[..MAT_HEADER.len()] != MAT_HEADER {
        warn!("Skipping `{}`: not a material file.", name);
        return Ok(Vec::new());
    }

    let mut reader = buffer;
    let header: MatHeader = bincode::deserialize_from(&mut reader)
        .chain_err(|| ErrorKind::truncated_texture(name, "header"))?;
    debug!(
        "Material `{}`: version {}, type {}, {} records, {} textures, {} bpp",
        name,
        header.version,
        header.record_type,
        header.num_records,
        header.num_textures,
        header.bits_per_pixel()
    );
    debug_assert_eq!(&header.identifier, MAT_HEADER);

    let record_size = if header.record_type == TEXTURE_RECORD_TYPE {
        TEXTURE_RECORD_SIZE
    } else {
        COLOR_RECORD_SIZE
    };
    let records_size = record_size * header.num_records.max(0) as usize;
    ensure!(
        skip(&mut reader, records_size),
        ErrorKind::truncated_texture(name, "records")
    );

    if header.record_type != TEXTURE_RECORD_TYPE {
        info!("Material `{}` holds colors, not textures.", name);
        return Ok(Vec::new());
    }

    let bpp = header.bits_per_pixel();
    ensure!(bpp == 8 || bpp == 16, ErrorKind::bad_bits_per_pixel(name, bpp));

    if header.num_textures <= 0 {
        return Ok(Vec::new());
    }

    let mip = read_mip_header(&mut reader)
        .chain_err(|| ErrorKind::truncated_texture(name, "texture header"))?;
    ensure!(
        mip.width > 0 && mip.height > 0,
        ErrorKind::bad_texture_size(name, mip.width, mip.height)
    );

    let (width, height) = (mip.width as usize, mip.height as usize);
    let num_bytes = level_bytes(width, height, bpp).unwrap_or(usize::MAX);
    if reader.len() < num_bytes {
        bail!(ErrorKind::truncated_texture(name, "pixel data"));
    }
    let (raw, rest) = reader.split_at(num_bytes);
    reader = rest;

    let top_down = match bpp {
        8 => decode_indexed(raw, palette, mip.transparent),
        _ => decode_rgb565(raw, mip.transparent),
    };
    let pixels = flip_rows(&top_down, width);

    if !skip_mips(&mut reader, width, height, bpp, mip.num_mips) {
        debug!("Material `{}` ends inside its mip levels.", name);
    }
    for i_texture in 1..header.num_textures {
        if !skip_texture(&mut reader, bpp) {
            debug!(
                "Material `{}` ends early, at texture {} of {}.",
                name, i_texture, header.num_textures
            );
            break;
        }
    }

    Ok(vec![Texture {
        name: name.to_owned(),
        width: mip.width as u32,
        height: mip.height as u32,
        pixels,
        transparent: mip.transparent,
    }])
}

fn read_mip_header(reader: &mut &[u8]) -> std::io::Result<MipHeader> {
    let width = reader.read_i32::<LittleEndian>()?;
    let height = reader.read_i32::<LittleEndian>()?;
    let transparent = reader.read_i32::<LittleEndian>()? != 0;
    let _reserved = (
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
    );
    let num_mips = reader.read_i32::<LittleEndian>()?;
    Ok(MipHeader {
        width,
        height,
        transparent,
        num_mips,
    })
}

/// Byte size of one mip level; `None` on overflow.
fn level_bytes(width: usize, height: usize, bpp: i32) -> Option<usize> {
    width
        .checked_mul(height)?
        .checked_mul(bpp as usize / 8)
}

fn skip(reader: &mut &[u8], num_bytes: usize) -> bool {
    if reader.len() < num_bytes {
        *reader = &reader[reader.len()..];
        false
    } else {
        *reader = &reader[num_bytes..];
        true
    }
}

/// Skips the reduced levels after a base level; the base level counts as
/// the first of `num_mips`.
fn skip_mips(reader: &mut &[u8], width: usize, height: usize, bpp: i32, num_mips: i32) -> bool {
    (1..num_mips.max(1).min(MAX_MIP_LEVELS)).all(|level| {
        let level_width = (width >> level).max(1);
        let level_height = (height >> level).max(1);
        skip(reader, level_bytes(level_width, level_height, bpp).unwrap_or(usize::MAX))
    })
}

fn skip_texture(reader: &mut &[u8], bpp: i32) -> bool {
    let mip = match read_mip_header(reader) {
        Ok(mip) => mip,
        Err(_) => return false,
    };
    if mip.width <= 0 || mip.height <= 0 {
        return false;
    }
    let (width, height) = (mip.width as usize, mip.height as usize);
    skip(reader, level_bytes(width, height, bpp).unwrap_or(usize::MAX))
        && skip_mips(reader, width, height, bpp, mip.num_mips)
}

fn decode_indexed(raw: &[u8], palette: Option<&Palette>, transparent: bool) -> Vec<Rgba8> {
    raw.iter()
        .map(|&index| {
            let mut color = match palette {
                Some(palette) => palette.color(index),
                None => [index, index, index, 255],
            };
            if transparent && index == 0 {
                color[3] = 0;
            }
            color
        })
        .collect()
}

fn decode_rgb565(raw: &[u8], transparent: bool) -> Vec<Rgba8> {
    raw.chunks_exact(2)
        .map(|pair| {
            let value = u16::from(pair[0]) | (u16::from(pair[1]) << 8);
            let red = (((value >> 11) & 0x1f) << 3) as u8;
            let green = (((value >> 5) & 0x3f) << 2) as u8;
            let blue = ((value & 0x1f) << 3) as u8;
            let alpha = if transparent && value == 0 { 0 } else { 255 };
            [red, green, blue, alpha]
        })
        .collect()
}

fn flip_rows(pixels: &[Rgba8], width: usize) -> Vec<Rgba8> {
    pixels.chunks(width).rev().flatten().cloned().collect()
}
