use std::path::PathBuf;

use crate::error::{LispError, LispResult};

/// Failing top-level forms reported before a run gives up.
pub const DEFAULT_MAX_ERRORS: usize = 15;

pub const USAGE: &str = "\
Usage: lisp [OPTIONS] [FILE]

Runs FILE, or standard input when FILE is `-' or absent. With no file and
an interactive terminal, starts a REPL.

Options:
  --max-errors <N>  Stop after N failing top-level forms (default 15)
  --dump-tree       Print each top-level form as a tree before evaluating it
  --echo            Print the value of each top-level form
  --trace           Log every evaluation step to stderr
  --help, -h        Show this help message

Environment variables:
  LISP_LOG          Log filter, e.g. `lisp=debug' (falls back to RUST_LOG)";

/// How a run is configured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Source file; `None` reads standard input.
    pub file: Option<PathBuf>,
    pub max_errors: usize,
    pub dump_tree: bool,
    pub echo: bool,
    pub trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file: None,
            max_errors: DEFAULT_MAX_ERRORS,
            dump_tree: false,
            echo: false,
            trace: false,
        }
    }
}

/// What the command line asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Run(Config),
    Help,
}

impl Config {
    /// Parse command-line arguments, without the program name.
    pub fn from_args<I>(args: I) -> LispResult<Command>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut file: Option<String> = None;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--max-errors" => {
                    let value = args.next().ok_or_else(|| LispError::MissingValue {
                        flag: arg.clone(),
                    })?;
                    config.max_errors = match value.parse::<usize>() {
                        Ok(n) if n > 0 => n,
                        _ => {
                            return Err(LispError::InvalidValue {
                                flag: arg.clone(),
                                value,
                            });
                        }
                    };
                }
                "--dump-tree" => config.dump_tree = true,
                "--echo" => config.echo = true,
                "--trace" => config.trace = true,
                "-" => file = set_file(file, arg.clone())?,
                other if other.starts_with('-') => {
                    return Err(LispError::UnknownArgument(other.to_string()));
                }
                _ => file = set_file(file, arg.clone())?,
            }
        }

        config.file = file.filter(|f| f != "-").map(PathBuf::from);
        Ok(Command::Run(config))
    }

    /// The name diagnostics use for the input.
    pub fn source_name(&self) -> String {
        match &self.file {
            Some(path) => path.display().to_string(),
            None => "<stdin>".to_string(),
        }
    }
}

fn set_file(current: Option<String>, arg: String) -> LispResult<Option<String>> {
    match current {
        Some(first) => Err(LispError::ExtraFile { first, second: arg }),
        None => Ok(Some(arg)),
    }
}
