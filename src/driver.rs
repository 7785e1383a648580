use std::io::Write;

use tracing::{info, warn};

use crate::config::Config;
use crate::diagnostic::print_error;
use crate::error::LispResult;
use crate::eval::Interp;
use crate::printer::{print_tree, print_val};
use crate::reader::Form;
use crate::value::Value;

/// What happened during one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Top-level forms evaluated, failed ones included.
    pub forms: usize,
    /// Top-level forms that produced an error.
    pub failures: usize,
    /// Value of the last form that succeeded.
    pub last: Option<Value>,
    /// The run stopped at the error cap.
    pub halted: bool,
}

impl RunReport {
    /// Process exit status: the number of failed forms, clamped to a byte.
    pub fn exit_code(&self) -> i32 {
        self.failures.min(255) as i32
    }
}

/// Read-eval-report loop over whole sources, all sharing one interpreter
/// and its global environment.
pub struct Driver {
    pub interp: Interp,
    pub config: Config,
}

impl Driver {
    pub fn new(interp: Interp, config: Config) -> Self {
        Driver { interp, config }
    }

    /// Evaluate every top-level form of `text` in the global environment.
    ///
    /// Each failing form has its diagnostic written to `report` and the run
    /// continues with the next form, until `max_errors` forms have failed.
    /// Tree dumps and echoed values go to the interpreter's output.
    pub fn run_source(
        &mut self,
        name: &str,
        text: &str,
        report: &mut dyn Write,
    ) -> LispResult<RunReport> {
        info!(source = name, bytes = text.len(), "loading source");
        let global = self.interp.global();
        let forms = self.interp.read_forms(name, text);
        let mut run = RunReport::default();

        for Form { open, value: form } in forms {
            run.forms += 1;
            if self.config.dump_tree {
                let tree = print_tree(&self.interp, form);
                self.interp.out.write_all(tree.as_bytes())?;
            }

            let result = if form.is_error() {
                form
            } else {
                self.interp.eval(global, form)
            };

            if result.is_error() {
                print_error(report, &self.interp.heap, &self.interp.sources, result)?;
                run.failures += 1;
                if run.failures >= self.config.max_errors {
                    warn!(failures = run.failures, "error limit reached, stopping");
                    let cap = self.interp.heap.error(open, "encountered too many errors");
                    print_error(report, &self.interp.heap, &self.interp.sources, cap)?;
                    run.halted = true;
                    break;
                }
                continue;
            }

            if self.config.echo {
                self.echo(result, report)?;
            }
            run.last = Some(result);
        }

        self.interp.out.flush()?;
        info!(forms = run.forms, failures = run.failures, "finished source");
        Ok(run)
    }

    fn echo(&mut self, value: Value, report: &mut dyn Write) -> LispResult<()> {
        match print_val(&self.interp, value) {
            Ok(text) => writeln!(self.interp.out, "{}", text)?,
            Err(bad) => {
                let message = format!(
                    "bug: unimplemented printer for expression of type `{}'",
                    bad.type_name()
                );
                let error = self.interp.heap.error(bad.span, message);
                print_error(report, &self.interp.heap, &self.interp.sources, error)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::Output;
    use pretty_assertions::assert_eq;

    fn driver(config: Config) -> Driver {
        Driver::new(Interp::with_output(Output::buffer()), config)
    }

    fn run(driver: &mut Driver, text: &str) -> (RunReport, String) {
        let mut report = Vec::new();
        let run = driver.run_source("t.l", text, &mut report).unwrap();
        (run, String::from_utf8(report).unwrap())
    }

    #[test]
    fn test_error_does_not_stop_later_forms() {
        let mut d = driver(Config::default());
        let (run, report) = run(&mut d, "(+ 1 \"x\")\n(+ 2 3)");
        assert_eq!(run.forms, 2);
        assert_eq!(run.failures, 1);
        assert_eq!(run.last.map(|v| v.kind), Some(crate::value::Kind::Int(5)));
        assert_eq!(
            report,
            "error: t.l:1:6: builtin `+' takes only numeric arguments (got `string')\n\
             \t(+ 1 \"x\")\n\
             \t     ^~~\n"
        );
    }

    #[test]
    fn test_error_cap_halts_run() {
        let mut d = driver(Config {
            max_errors: 2,
            ..Config::default()
        });
        let (run, report) = run(&mut d, "(a) (b) (c)");
        assert_eq!(run.forms, 2);
        assert!(run.halted);
        assert_eq!(run.exit_code(), 2);
        assert!(report.ends_with("error: t.l:1:5: encountered too many errors\n\t(a) (b) (c)\n\t    ^\n"));
    }

    #[test]
    fn test_echo_and_tree() {
        let mut d = driver(Config {
            echo: true,
            dump_tree: true,
            ..Config::default()
        });
        run(&mut d, "(quote x)");
        assert_eq!(
            d.interp.out.take(),
            "(cell)\n├───(symbol:quote)\n╰───(cell)\n    ├───(symbol:x)\n    ╰───(nil)\nx\n"
        );
    }

    #[test]
    fn test_globals_persist_across_sources() {
        let mut d = driver(Config::default());
        run(&mut d, "(setq x 40)");
        let (run, _) = run(&mut d, "(+ x 2)");
        assert_eq!(run.last.map(|v| v.kind), Some(crate::value::Kind::Int(42)));
    }
}
