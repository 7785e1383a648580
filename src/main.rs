use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::process::ExitCode;

use lisp::config::USAGE;
use lisp::{init_tracing, Command, Config, Driver, Interp, LispError, LispResult};

fn main() -> ExitCode {
    let command = match Config::from_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Try 'lisp --help' for usage information.");
            return ExitCode::from(2);
        }
    };

    let config = match command {
        Command::Help => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Command::Run(config) => config,
    };

    init_tracing(config.trace);

    match run(config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("lisp: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> LispResult<u8> {
    let mut driver = Driver::new(Interp::new(), config);

    if let Some(path) = driver.config.file.clone() {
        let text = std::fs::read_to_string(&path).map_err(|source| LispError::Io {
            path: path.clone(),
            source,
        })?;
        let name = driver.config.source_name();
        let report = driver.run_source(&name, &text, &mut io::stdout())?;
        return Ok(report.exit_code() as u8);
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        run_interactive(&mut driver)?;
        Ok(0)
    } else {
        run_piped(&mut driver)
    }
}

/// Piped mode: read all of stdin, then run it as one source.
fn run_piped(driver: &mut Driver) -> LispResult<u8> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|source| LispError::Io {
            path: "<stdin>".into(),
            source,
        })?;
    let report = driver.run_source("<stdin>", &input, &mut io::stdout())?;
    Ok(report.exit_code() as u8)
}

/// Interactive REPL: accumulate lines until brackets are balanced, then run
/// them and echo each value.
fn run_interactive(driver: &mut Driver) -> LispResult<()> {
    driver.config.echo = true;
    driver.config.max_errors = usize::MAX;

    println!("lisp interpreter");
    println!(
        "  Heap: {} cells used, {} builtins, {} symbols interned",
        driver.interp.heap.total_cells(),
        driver.interp.builtin_count(),
        driver.interp.symbols.count()
    );
    println!("Ready.\n");

    let stdin = io::stdin();
    let mut buf = String::new();
    let mut depth: i32 = 0;

    loop {
        if depth == 0 {
            print!("> ");
        } else {
            print!("  ");
        }
        io::stdout().flush()?;

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }

        // Naive bracket depth; good enough for well-formed input.
        for ch in line.chars() {
            match ch {
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                _ => {}
            }
        }

        buf.push_str(&line);

        if depth <= 0 {
            depth = 0;
            let input = std::mem::take(&mut buf);
            if input.trim().is_empty() {
                continue;
            }
            driver.run_source("<repl>", &input, &mut io::stdout())?;
        }
    }
    Ok(())
}
