use tracing::debug;

use crate::env;
use crate::eval::Interp;
use crate::value::{EnvId, Kind, Value};

impl Interp {
    /// Expand a macro call at the head of `form`, repeatedly, until the
    /// result no longer starts with a macro.
    ///
    /// Returns `None` when `form` is not a macro call, so callers can tell
    /// "unchanged" apart from "expanded to something". An error raised while
    /// running a macro body is returned as the expansion.
    ///
    /// The body of a macro runs in a frame extending the scope the macro was
    /// defined in, with its parameters bound to the call's unevaluated
    /// arguments. Nothing is cached: a call site is expanded again every time
    /// it is evaluated, so redefining a macro affects existing callers.
    /// A macro whose expansion is again a call to itself never terminates.
    pub fn expand(&mut self, env: EnvId, form: Value) -> Option<Value> {
        let mut current = form;
        let mut expanded = false;
        while let Some(next) = self.expand_once(env, current) {
            expanded = true;
            current = next;
            if current.is_error() {
                break;
            }
        }
        expanded.then_some(current)
    }

    fn expand_once(&mut self, env: EnvId, form: Value) -> Option<Value> {
        let Kind::Pair(id) = form.kind else {
            return None;
        };
        let head = self.heap.first(id);
        let name = head.as_symbol()?;
        let Kind::Macro(closure) = env::get(&self.heap, env, name)?.kind else {
            return None;
        };
        debug!(
            name = self.symbols.name(name),
            line = form.span.line,
            "expanding macro"
        );
        let args = self.heap.rest(id);
        let closure = self.heap.closure(closure);
        let (params, body, captured) = (closure.params, closure.body, closure.env);
        let frame = env::extend(&mut self.heap, captured, params, args);
        Some(self.progn(frame, body))
    }
}

#[cfg(test)]
mod tests {
    use crate::eval::Interp;
    use crate::printer::{print_val, Output};
    use crate::value::Kind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_non_macro_is_unchanged() {
        let mut interp = Interp::with_output(Output::buffer());
        let global = interp.global();
        let forms = interp.read_source("t.l", "(+ 1 2)");
        assert_eq!(interp.expand(global, forms[0]), None);
    }

    #[test]
    fn test_expansion_is_unevaluated_template() {
        let mut interp = Interp::with_output(Output::buffer());
        let global = interp.global();
        interp.eval_source("t.l", "(macro swap (a b) (list b a))");
        let forms = interp.read_source("u.l", "(swap 1 +)");
        let expanded = interp.expand(global, forms[0]).expect("macro call");
        assert_eq!(print_val(&interp, expanded).ok(), Some("(+ 1)".to_string()));
    }

    #[test]
    fn test_expands_to_fixed_point() {
        let mut interp = Interp::with_output(Output::buffer());
        let value = interp.eval_source(
            "t.l",
            "(macro inner (x) (list '+ x 1))
             (macro outer (x) (list 'inner x))
             (outer 41)",
        );
        assert_eq!(value.kind, Kind::Int(42));
    }

    #[test]
    fn test_redefinition_reaches_existing_callers() {
        let mut interp = Interp::with_output(Output::buffer());
        let value = interp.eval_source(
            "t.l",
            "(macro m () 1)
             (fn call () (m))
             (call)
             (macro m () 2)
             (call)",
        );
        assert_eq!(value.kind, Kind::Int(2));
    }

    #[test]
    fn test_body_sees_defining_scope_not_caller() {
        let mut interp = Interp::with_output(Output::buffer());
        let value = interp.eval_source(
            "t.l",
            "(setq v 1)
             (macro m () v)
             (fn g (v) (m))
             (g 2)",
        );
        assert_eq!(value.kind, Kind::Int(1));
    }

    #[test]
    fn test_error_in_body_is_the_expansion() {
        let mut interp = Interp::with_output(Output::buffer());
        let global = interp.global();
        interp.eval_source("t.l", "(macro broken () missing)");
        let forms = interp.read_source("u.l", "(broken)");
        let expanded = interp.expand(global, forms[0]).expect("macro call");
        assert_eq!(interp.heap.error_message(expanded), Some("undeclared identifier"));
    }
}
