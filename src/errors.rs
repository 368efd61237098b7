use failchain::{BoxedError, ChainErrorKind};
use failure::Fail;
use std::path::Path;
use std::result::Result as StdResult;

pub type Error = BoxedError<ErrorKind>;
pub type Result<T> = StdResult<T, Error>;

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "Invalid arguments: {}", _0)]
    Argument(String),

    #[fail(display = "Failed to import `{}`.", _0)]
    Import(String),
}

impl ChainErrorKind for ErrorKind {
    type Error = Error;
}

impl ErrorKind {
    pub fn on_import(path: &Path) -> Self {
        ErrorKind::Import(path.display().to_string())
    }

    pub fn unsupported_asset(path: &Path) -> Self {
        ErrorKind::Argument(format!(
            "`{}` is not a level, model, material or colormap",
            path.display()
        ))
    }
}
