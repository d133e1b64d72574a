use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Profiler error: {0}")]
    Profiler(#[from] pprof::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGUMENTS: i32 = 2;
    pub const PROFILE_ERROR: i32 = 3;
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Profiler(_) => exit_code::PROFILE_ERROR,
            Error::InvalidArgument(_) => exit_code::INVALID_ARGUMENTS,
            _ => exit_code::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            Error::InvalidArgument("x".into()).exit_code(),
            exit_code::INVALID_ARGUMENTS
        );
        assert_eq!(
            Error::Worker("panicked".into()).exit_code(),
            exit_code::GENERAL_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(io).exit_code(), exit_code::GENERAL_ERROR);
    }
}
