use failchain::{BoxedError, ChainErrorKind};
use failure::Fail;
use std::path::Path;
use std::result::Result as StdResult;

pub type Error = BoxedError<ErrorKind>;
pub type Result<T> = StdResult<T, Error>;

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "I/O error: {}", _0)]
    Io(String),

    #[fail(display = "Malformed `{}`: {}", _0, _1)]
    Parse(String, String),

    #[fail(display = "Truncated `{}`: {}", _0, _1)]
    Truncated(String, String),

    #[fail(display = "Bad index in `{}`: {}", _0, _1)]
    BadIndex(String, String),

    #[fail(display = "Unsupported texture in `{}`: {}", _0, _1)]
    UnsupportedTexture(String, String),

    #[fail(display = "Corrupt config file: {}", _0)]
    CorruptConfig(String),
}

impl ChainErrorKind for ErrorKind {
    type Error = Error;
}

impl ErrorKind {
    pub(crate) fn on_file_read(path: &Path) -> Self {
        ErrorKind::Io(format!("Failed to read `{}`.", path.display()))
    }

    pub(crate) fn on_config_parse() -> Self {
        ErrorKind::CorruptConfig("Failed to parse import config.".to_owned())
    }

    pub(crate) fn unexpected_end(file: &str, line: usize, expected: &str) -> Self {
        ErrorKind::Truncated(
            file.to_owned(),
            format!("line {}: end of input, expected {}", line, expected),
        )
    }

    pub(crate) fn expected_keyword(file: &str, line: usize, keyword: &str, found: &str) -> Self {
        ErrorKind::Parse(
            file.to_owned(),
            format!("line {}: expected `{}`, found `{}`", line, keyword, found),
        )
    }

    pub(crate) fn bad_count(file: &str, line: usize, section: &str, count: i32) -> Self {
        ErrorKind::Parse(
            file.to_owned(),
            format!("line {}: invalid {} count {}", line, section, count),
        )
    }

    pub(crate) fn truncated_texture(file: &str, what: &str) -> Self {
        ErrorKind::Truncated(file.to_owned(), format!("missing {}", what))
    }

    pub(crate) fn bad_texture_size(file: &str, width: i32, height: i32) -> Self {
        ErrorKind::UnsupportedTexture(file.to_owned(), format!("size {}x{}", width, height))
    }

    pub(crate) fn bad_bits_per_pixel(file: &str, bpp: i32) -> Self {
        ErrorKind::UnsupportedTexture(file.to_owned(), format!("{} bits per pixel", bpp))
    }

    pub(crate) fn vertex_out_of_range(context: &str, index: i32, len: usize) -> Self {
        ErrorKind::BadIndex(
            context.to_owned(),
            format!("vertex {} outside pool of {}", index, len),
        )
    }
}
