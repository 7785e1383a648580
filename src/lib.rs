//! A small Lisp interpreter.
//!
//! Source text is read into located values ([`reader`]), evaluated by
//! [`Interp`] against a chain of environment frames ([`env`]), with macros
//! re-expanded on every evaluation ([`expand`]) and a fixed set of native
//! builtins ([`builtins`]). Errors in programs are values carrying a source
//! span; [`diagnostic::print_error`] renders them with the offending line
//! and a caret underline.

pub mod builtins;
pub mod config;
pub mod diagnostic;
pub mod driver;
pub mod env;
pub mod error;
pub mod eval;
pub mod expand;
pub mod heap;
pub mod printer;
pub mod reader;
pub mod source;
pub mod symbol;
pub mod value;

use std::sync::Once;

pub use config::{Command, Config};
pub use diagnostic::{print_error, render_error};
pub use driver::{Driver, RunReport};
pub use error::{LispError, LispResult};
pub use eval::{EvalResult, Interp};
pub use printer::Output;
pub use value::{Kind, Value};

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber, once.
///
/// The filter comes from `LISP_LOG`, then `RUST_LOG`; with neither set
/// nothing is installed unless `force_trace` asks for `lisp=trace`.
/// Logs go to stderr.
pub fn init_tracing(force_trace: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let directives = if force_trace {
            Some("lisp=trace".to_string())
        } else {
            std::env::var("LISP_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .ok()
        };

        if let Some(directives) = directives {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(EnvFilter::new(directives))
                .init();
        }
    });
}
