use std::io;

/// The closed set of error kinds raised anywhere in the transfer subsystem.
#[derive(Debug, derive_more::Display)]
pub enum Error {
    /// Operation attempted on a backend that is not open.
    #[display(fmt = "device is not opened: {_0}")]
    NotOpened(String),
    /// The requested capability is missing on this backend.
    #[display(fmt = "operation not implemented: {_0}")]
    NotImplemented(String),
    /// A size, alignment or value was invalid.
    #[display(fmt = "wrong parameter: {_0}")]
    WrongParameter(String),
    /// The accessor's dimension or type doesn't match the register.
    #[display(fmt = "wrong accessor: {_0}")]
    WrongAccessor(String),
    /// The path isn't present in the backend's register catalogue.
    #[display(fmt = "register does not exist: {_0}")]
    RegisterDoesNotExist(String),
    /// A wire-level failure, including a handshake timeout.
    #[display(fmt = "I/O error: {_0}")]
    IoError(String),
    /// A map file could not be read or parsed.
    #[display(fmt = "cannot open map file: {_0}")]
    CannotOpenMapFile(String),
}

impl std::error::Error for Error {}

impl Error {
    /// Convenience constructor for [`Error::IoError`], prefixing the failing register or
    /// backend-level operation onto the underlying reason.
    pub fn io(register: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Error::IoError(format!("{register}: {}", reason.into()))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_register_path() {
        let err = Error::RegisterDoesNotExist("/board/adc".to_string());
        assert!(err.to_string().contains("/board/adc"));
    }

    #[test]
    fn io_error_wraps_std_io_error() {
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
    }
}
