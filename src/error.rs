use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors at the host level: reading files, parsing the command line and
/// writing reports. Errors in Lisp programs are values, not these.
#[derive(Debug, Error)]
pub enum LispError {
    /// A source file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing diagnostics or echoed results failed.
    #[error("cannot write output: {0}")]
    Output(#[from] io::Error),

    /// A flag that takes a value was given none.
    #[error("{flag} requires a value")]
    MissingValue { flag: String },

    /// A flag value did not parse.
    #[error("invalid value for {flag}: `{value}'")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    /// More than one source file was named.
    #[error("only one source file may be given (got `{first}' and `{second}')")]
    ExtraFile { first: String, second: String },
}

pub type LispResult<T> = Result<T, LispError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_messages() {
        let err = LispError::InvalidValue {
            flag: "--max-errors".into(),
            value: "many".into(),
        };
        assert_eq!(err.to_string(), "invalid value for --max-errors: `many'");

        let err = LispError::Io {
            path: PathBuf::from("missing.l"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "cannot read missing.l: not found");
    }
}
