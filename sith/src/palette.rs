use super::errors::{ErrorKind, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use failchain::ResultExt;
use log::{debug, warn};
use std::fs;
use std::io::Read;
use std::path::Path;

pub type Rgba8 = [u8; 4];

pub const PALETTE_COLORS: usize = 256;

const CMP_HEADER: &[u8; 4] = b"CMP ";
const CMP_RESERVED_SIZE: usize = 52;

/// A 256 color palette from a colormap file. Every entry is opaque.
#[derive(Clone)]
pub struct Palette(pub [Rgba8; PALETTE_COLORS]);

impl Palette {
    pub fn from_file<P: AsRef<Path>>(path: &P) -> Result<Option<Palette>> {
        let path = path.as_ref();
        let bytes = fs::read(path).chain_err(|| ErrorKind::on_file_read(path))?;
        let palette = Palette::from_buffer(&bytes);
        if palette.is_none() {
            warn!("`{}` is not a valid colormap.", path.display());
        }
        Ok(palette)
    }

    /// Decodes the palette block of a colormap. Returns `None` on a bad
    /// signature or a short read; a partial palette is never returned.
    pub fn from_buffer(buffer: &[u8]) -> Option<Palette> {
        let mut reader = buffer;
        let mut identifier = [0u8; 4];
        reader.read_exact(&mut identifier).ok()?;
        if &identifier != CMP_HEADER {
            debug!("Bad colormap identifier {:?}", identifier);
            return None;
        }

        let version = reader.read_i32::<LittleEndian>().ok()?;
        let transparency = reader.read_i32::<LittleEndian>().ok()?;
        debug!("Colormap version {}, transparency {}", version, transparency);

        let mut reserved = [0u8; CMP_RESERVED_SIZE];
        reader.read_exact(&mut reserved).ok()?;

        let mut colors = [[0, 0, 0, 255]; PALETTE_COLORS];
        for color in colors.iter_mut() {
            let mut rgb = [0u8; 3];
            reader.read_exact(&mut rgb).ok()?;
            *color = [rgb[0], rgb[1], rgb[2], 255];
        }
        Some(Palette(colors))
    }

    #[inline]
    pub fn color(&self, index: u8) -> Rgba8 {
        self.0[usize::from(index)]
    }
}
