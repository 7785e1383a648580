use std::io::{self, Write};

use crate::eval::Interp;
use crate::value::{Kind, Value};

/// Where `print` and `println` send their text.
pub enum Output {
    Stdout(io::Stdout),
    /// Captured in memory, for tests and embedding.
    Buffer(Vec<u8>),
}

impl Output {
    pub fn stdout() -> Self {
        Output::Stdout(io::stdout())
    }

    pub fn buffer() -> Self {
        Output::Buffer(Vec::new())
    }

    /// Drain everything captured so far. Always empty for stdout.
    pub fn take(&mut self) -> String {
        match self {
            Output::Stdout(_) => String::new(),
            Output::Buffer(buf) => String::from_utf8_lossy(&std::mem::take(buf)).into_owned(),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(out) => out.write(buf),
            Output::Buffer(v) => v.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(out) => out.flush(),
            Output::Buffer(_) => Ok(()),
        }
    }
}

/// Print a value to a string.
///
/// Environments and errors have no printed form; the offending value is
/// returned as the `Err` so the caller can report it where it was found.
pub fn print_val(interp: &Interp, val: Value) -> Result<String, Value> {
    let mut out = String::new();
    print_inner(interp, val, &mut out, 0)?;
    Ok(out)
}

fn print_inner(interp: &Interp, val: Value, out: &mut String, depth: usize) -> Result<(), Value> {
    if depth > 1000 {
        out.push_str("...");
        return Ok(());
    }

    match val.kind {
        Kind::Int(i) => out.push_str(&i.to_string()),
        Kind::Str(id) => out.push_str(interp.heap.string(id)),
        Kind::Symbol(id) => out.push_str(interp.symbols.name(id)),
        Kind::True => out.push_str("true"),
        Kind::Nil => out.push_str("nil"),
        Kind::Function(_) => out.push_str("<function>"),
        Kind::Macro(_) => out.push_str("<macro>"),
        Kind::Builtin(id) => {
            out.push_str("<builtin ");
            out.push_str(&interp.builtin(id).name);
            out.push('>');
        }
        Kind::Array(id) => {
            out.push('[');
            for (i, &item) in interp.heap.array(id).iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                print_inner(interp, item, out, depth + 1)?;
            }
            out.push(']');
        }
        Kind::Pair(_) => {
            out.push('(');
            let mut current = val;
            let mut first = true;
            while let Kind::Pair(id) = current.kind {
                if !first {
                    out.push(' ');
                }
                first = false;
                print_inner(interp, interp.heap.first(id), out, depth + 1)?;
                current = interp.heap.rest(id);
            }
            if !current.is_nil() {
                out.push_str(" . ");
                print_inner(interp, current, out, depth + 1)?;
            }
            out.push(')');
        }
        Kind::Env(_) | Kind::Error(_) => return Err(val),
    }
    Ok(())
}

/// Dump the structure of a value as a box-drawing tree, one node per line.
pub fn print_tree(interp: &Interp, val: Value) -> String {
    let mut out = String::new();
    let mut arms = Vec::new();
    tree_inner(interp, val, &mut arms, &mut out);
    out
}

// `arms[i]` is true while level `i` still has siblings below the current
// node, which decides between a continuing and a closing connector. The
// last child of a node is walked in the loop, so long lists do not recurse.
fn tree_inner(interp: &Interp, mut val: Value, arms: &mut Vec<bool>, out: &mut String) {
    let base = arms.len();
    loop {
        if let Some((&last, outer)) = arms.split_last() {
            for &open in outer {
                out.push_str(if open { "│   " } else { "    " });
            }
            out.push_str(if last { "├───" } else { "╰───" });
        }
        out.push_str(&tree_label(interp, val));
        out.push('\n');

        let mut children = match val.kind {
            Kind::Pair(id) => vec![interp.heap.first(id), interp.heap.rest(id)],
            Kind::Array(id) => interp.heap.array(id).to_vec(),
            _ => Vec::new(),
        };
        let Some(last) = children.pop() else {
            break;
        };
        for child in children {
            arms.push(true);
            tree_inner(interp, child, arms, out);
            arms.pop();
        }
        arms.push(false);
        val = last;
    }
    arms.truncate(base);
}

fn tree_label(interp: &Interp, val: Value) -> String {
    match val.kind {
        Kind::Pair(_) => "(cell)".to_string(),
        Kind::Array(_) => "(array)".to_string(),
        Kind::Symbol(id) => format!("(symbol:{})", interp.symbols.name(id)),
        Kind::Int(i) => format!("(int:{})", i),
        Kind::Str(id) => format!("\"{}\"", interp.heap.string(id)),
        Kind::Builtin(id) => format!("(builtin:{})", interp.builtin(id).name),
        Kind::Function(_) => "(function)".to_string(),
        Kind::Macro(_) => "(macro)".to_string(),
        Kind::Env(_) => "(env)".to_string(),
        Kind::Error(id) => format!("(error:{})", interp.heap.diagnostic(id).message),
        Kind::True => "(true)".to_string(),
        Kind::Nil => "(nil)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn printed(src: &str) -> String {
        let mut interp = Interp::with_output(Output::buffer());
        let value = interp.eval_source("t.l", src);
        print_val(&interp, value).unwrap_or_else(|_| "<unprintable>".into())
    }

    #[test]
    fn test_print_atoms() {
        assert_eq!(printed("(+ 40 2)"), "42");
        assert_eq!(printed("(quote t)"), "true");
        assert_eq!(printed("(quote nil)"), "nil");
        assert_eq!(printed("(quote \"raw text\")"), "raw text");
        assert_eq!(printed("(quote car)"), "car");
    }

    #[test]
    fn test_print_lists_and_arrays() {
        assert_eq!(printed("(quote (1 (2 3) x))"), "(1 (2 3) x)");
        assert_eq!(printed("(cons 1 2)"), "(1 . 2)");
        assert_eq!(printed("(quote [1 [2] \"s\"])"), "[1 [2] s]");
    }

    #[test]
    fn test_print_callables() {
        assert_eq!(printed("(fn (x) x)"), "<function>");
        assert_eq!(printed("(macro m () 1)"), "<macro>");
        assert_eq!(printed("(progn car)"), "<builtin car>");
    }

    #[test]
    fn test_env_is_unprintable() {
        let interp = Interp::with_output(Output::buffer());
        let env = Value::new(Kind::Env(interp.global()), crate::source::Span::NOWHERE);
        assert_eq!(print_val(&interp, env), Err(env));
    }

    #[test]
    fn test_tree_dump() {
        let mut interp = Interp::with_output(Output::buffer());
        let forms = interp.read_source("t.l", "(f 1 \"s\")");
        assert_eq!(
            print_tree(&interp, forms[0]),
            "(cell)\n\
             ├───(symbol:f)\n\
             ╰───(cell)\n\
             \x20   ├───(int:1)\n\
             \x20   ╰───(cell)\n\
             \x20       ├───\"s\"\n\
             \x20       ╰───(nil)\n"
        );
    }

    #[test]
    fn test_tree_dump_of_long_list_runs_on_small_stack() {
        let dump = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let mut interp = Interp::with_output(Output::buffer());
                let text = format!("({})", "7 ".repeat(2000));
                let forms = interp.read_source("t.l", &text);
                print_tree(&interp, forms[0])
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(dump.lines().count(), 4001);
        assert_eq!(dump.matches("(int:7)").count(), 2000);
        assert!(dump.ends_with("╰───(nil)\n"));
    }

    #[test]
    fn test_output_buffer_is_drained() {
        let mut out = Output::buffer();
        write!(out, "hello").unwrap();
        assert_eq!(out.take(), "hello");
        assert_eq!(out.take(), "");
    }
}
