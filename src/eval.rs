use tracing::trace;

use crate::env;
use crate::heap::Heap;
use crate::printer::Output;
use crate::reader::{Form, Reader};
use crate::source::{SourceMap, Span};
use crate::symbol::SymbolTable;
use crate::value::{describe, BuiltinId, EnvId, Kind, SymbolId, Value};

/// Result of an evaluation step that may stop early. The `Err` side is
/// always an Error value, ready to be handed back to the caller as-is.
pub type EvalResult<T> = Result<T, Value>;

/// A native operation. It receives the caller's environment and its
/// argument forms unevaluated, and decides itself what to evaluate.
pub type BuiltinFn = fn(&mut Interp, EnvId, Value) -> EvalResult<Value>;

/// A registered native operation.
pub struct Builtin {
    pub name: String,
    pub op: BuiltinFn,
}

/// The interpreter. All state lives here: the heap every value points
/// into, the symbol table, the source text diagnostics refer to, the
/// builtin registry and the stream `print` writes to.
pub struct Interp {
    pub heap: Heap,
    pub symbols: SymbolTable,
    pub sources: SourceMap,
    pub out: Output,
    pub(crate) builtins: Vec<Builtin>,
    global: EnvId,
}

impl Interp {
    /// An interpreter printing to stdout, with a seeded global environment.
    pub fn new() -> Self {
        Self::with_output(Output::stdout())
    }

    pub fn with_output(out: Output) -> Self {
        let mut interp = Interp {
            heap: Heap::new(),
            symbols: SymbolTable::new(),
            sources: SourceMap::new(),
            out,
            builtins: Vec::new(),
            global: EnvId(0),
        };
        interp.global = interp.new_environment();
        interp
    }

    /// The global environment created at startup.
    pub fn global(&self) -> EnvId {
        self.global
    }

    /// Create a fresh root environment holding every builtin.
    pub fn new_environment(&mut self) -> EnvId {
        let env = env::new_frame(&mut self.heap, None, Value::nil(Span::NOWHERE));
        self.load_builtins(env);
        env
    }

    pub fn builtin(&self, id: BuiltinId) -> &Builtin {
        &self.builtins[id.0 as usize]
    }

    pub fn builtin_count(&self) -> usize {
        self.builtins.len()
    }

    /// Register a piece of source text and read every top-level form in it.
    /// Syntax errors come back as Error values in place of the form.
    pub fn read_source(&mut self, name: &str, text: &str) -> Vec<Value> {
        self.read_forms(name, text)
            .into_iter()
            .map(|form| form.value)
            .collect()
    }

    /// Like `read_source`, keeping where each form's `(` is.
    pub fn read_forms(&mut self, name: &str, text: &str) -> Vec<Form> {
        let source = self.sources.add(name, text);
        let text = self.sources.text(source);
        let mut reader = Reader::new(source, text, &mut self.heap, &mut self.symbols);
        let mut forms = Vec::new();
        while let Some(form) = reader.next_form() {
            forms.push(form);
        }
        forms
    }

    /// Read and evaluate `text` in the global environment. Every form is
    /// evaluated even after an earlier one fails; the result of the last
    /// form is returned, or Nil if there were none.
    pub fn eval_source(&mut self, name: &str, text: &str) -> Value {
        let global = self.global;
        let mut last = Value::nil(Span::NOWHERE);
        for form in self.read_source(name, text) {
            last = self.eval(global, form);
        }
        last
    }

    // ========================================================================
    // Core evaluation
    // ========================================================================

    /// Evaluate a value in `env`.
    pub fn eval(&mut self, env: EnvId, value: Value) -> Value {
        trace!(kind = value.type_name(), line = value.span.line, "eval");
        match value.kind {
            Kind::Int(_)
            | Kind::Str(_)
            | Kind::Array(_)
            | Kind::Builtin(_)
            | Kind::Function(_)
            | Kind::Error(_)
            | Kind::True
            | Kind::Nil => value,
            Kind::Symbol(id) => self.eval_symbol(env, value, id),
            Kind::Pair(_) => self.eval_call(env, value),
            Kind::Macro(_) | Kind::Env(_) => {
                self.heap.error(value.span, "bug: unimplemented evaluator")
            }
        }
    }

    /// Evaluate and stop on error, for `?` in builtins.
    pub fn eval_checked(&mut self, env: EnvId, value: Value) -> EvalResult<Value> {
        let result = self.eval(env, value);
        if result.is_error() {
            Err(result)
        } else {
            Ok(result)
        }
    }

    /// A bound symbol evaluates to its value, reported at the reference.
    fn eval_symbol(&mut self, env: EnvId, symbol: Value, id: SymbolId) -> Value {
        match env::get(&self.heap, env, id) {
            Some(value) => value.at(symbol.span),
            None => self.heap.error(symbol.span, "undeclared identifier"),
        }
    }

    /// Evaluate a call form: expand macros to a fixed point, then apply the
    /// head to the unevaluated tail.
    fn eval_call(&mut self, env: EnvId, form: Value) -> Value {
        if let Some(expanded) = self.expand(env, form) {
            return self.eval(env, expanded);
        }
        let Kind::Pair(id) = form.kind else {
            return form;
        };
        let head = self.heap.first(id);
        let args = self.heap.rest(id);

        let (func, origin) = self.eval_head(env, head);
        if func.is_error() {
            return func;
        }
        self.apply_from(env, form.span, func, origin, args)
    }

    /// Evaluate the head of a call, also returning where the callee was
    /// defined: the binding's name for symbols, the value itself otherwise.
    fn eval_head(&mut self, env: EnvId, head: Value) -> (Value, Span) {
        if let Kind::Symbol(id) = head.kind {
            if let Some(binding) = env::lookup(&self.heap, env, id) {
                let origin = self.heap.first(binding).span;
                return (self.heap.rest(binding).at(head.span), origin);
            }
        }
        let func = self.eval(env, head);
        (func, func.span)
    }

    /// Apply `func` to the unevaluated argument list `args`.
    pub fn apply(&mut self, env: EnvId, span: Span, func: Value, args: Value) -> Value {
        self.apply_from(env, span, func, func.span, args)
    }

    fn apply_from(
        &mut self,
        env: EnvId,
        span: Span,
        func: Value,
        origin: Span,
        args: Value,
    ) -> Value {
        match func.kind {
            Kind::Builtin(id) => {
                let op = self.builtin(id).op;
                trace!(builtin = %self.builtin(id).name, "apply");
                match op(self, env, args) {
                    Ok(value) | Err(value) => value,
                }
            }
            Kind::Function(id) => {
                if !args.is_list() {
                    return self.heap.error(
                        args.span,
                        format!(
                            "function application requires a list of arguments (this is {})",
                            describe(args.kind)
                        ),
                    );
                }
                let evaluated = self.eval_list(env, args);
                if evaluated.is_error() {
                    return evaluated;
                }
                let closure = self.heap.closure(id);
                let (params, body, captured) = (closure.params, closure.body, closure.env);
                trace!(closure = id.0, "apply");
                let frame = env::extend(&mut self.heap, captured, params, evaluated);
                self.progn(frame, body)
            }
            Kind::Int(_)
            | Kind::Str(_)
            | Kind::Symbol(_)
            | Kind::Pair(_)
            | Kind::Array(_)
            | Kind::Macro(_)
            | Kind::Env(_)
            | Kind::True
            | Kind::Nil
            | Kind::Error(_) => {
                let error = self.heap.error(
                    span,
                    format!(
                        "function application requires a function value (this is {})",
                        describe(func.kind)
                    ),
                );
                if origin != span && !origin.is_synthetic() {
                    let note = self.heap.note(origin, "last defined here");
                    self.heap.chain(error, note)
                } else {
                    error
                }
            }
        }
    }

    /// Evaluate every element of `list` left to right into a new proper
    /// list. Stops at the first error and returns it instead. A dotted tail
    /// is not an element and is left out.
    pub fn eval_list(&mut self, env: EnvId, list: Value) -> Value {
        let mut values = Vec::new();
        let mut current = list;
        while let Kind::Pair(id) = current.kind {
            let value = self.eval(env, self.heap.first(id));
            if value.is_error() {
                return value;
            }
            values.push(value);
            current = self.heap.rest(id);
        }
        self.heap.list(&values, list.span)
    }

    /// Evaluate each form of `sequence` in order, returning the last value,
    /// or the first error. An empty sequence is Nil.
    pub fn progn(&mut self, env: EnvId, sequence: Value) -> Value {
        let mut result = Value::nil(sequence.span);
        let mut current = sequence;
        while let Kind::Pair(id) = current.kind {
            result = self.eval(env, self.heap.first(id));
            if result.is_error() {
                return result;
            }
            current = self.heap.rest(id);
        }
        result
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_val;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> (Interp, Value) {
        let mut interp = Interp::with_output(Output::buffer());
        let value = interp.eval_source("test.l", src);
        (interp, value)
    }

    fn message(interp: &Interp, value: Value) -> String {
        interp
            .heap
            .error_message(value)
            .unwrap_or("<not an error>")
            .to_string()
    }

    #[test]
    fn test_self_evaluating() {
        let mut interp = Interp::with_output(Output::buffer());
        let global = interp.global();
        for value in [
            Value::int(5, Span::NOWHERE),
            Value::truth(Span::NOWHERE),
            Value::nil(Span::NOWHERE),
        ] {
            assert_eq!(interp.eval(global, value), value);
        }
        let s = interp.heap.alloc_string("hi", Span::NOWHERE);
        assert_eq!(interp.eval(global, s), s);
    }

    #[test]
    fn test_env_value_is_not_evaluable() {
        let mut interp = Interp::with_output(Output::buffer());
        let global = interp.global();
        let env = Value::new(Kind::Env(global), Span::NOWHERE);
        let result = interp.eval(global, env);
        assert_eq!(message(&interp, result), "bug: unimplemented evaluator");
    }

    #[test]
    fn test_undeclared_identifier() {
        let (interp, value) = run("(+ 1 nope)");
        assert_eq!(message(&interp, value), "undeclared identifier");
        assert_eq!(value.span.column, 5);
    }

    #[test]
    fn test_symbol_reports_reference_site() {
        let (interp, value) = run("(setq x 1)\n(progn   x)");
        assert_eq!(interp.heap.error_message(value), None);
        assert_eq!(value.kind, Kind::Int(1));
        assert_eq!(value.span.line, 2);
        assert_eq!(value.span.column, 9);
    }

    #[test]
    fn test_function_call() {
        let (_, value) = run("(fn add (a b) (+ a b)) (add 2 3)");
        assert_eq!(value.kind, Kind::Int(5));
    }

    #[test]
    fn test_closure_sees_later_mutation() {
        let (_, value) = run("(setq n 1) (fn get () n) (setq n 2) (get)");
        assert_eq!(value.kind, Kind::Int(2));
    }

    #[test]
    fn test_argument_error_stops_application() {
        let (interp, value) = run("(fn f (a b) a) (f 1 missing)");
        assert_eq!(message(&interp, value), "undeclared identifier");
    }

    #[test]
    fn test_applying_non_function_chains_note() {
        let (interp, value) = run("(setq x 3)\n(x 1)");
        assert_eq!(
            message(&interp, value),
            "function application requires a function value (this is an int)"
        );
        let Kind::Error(id) = value.kind else {
            panic!("expected an error");
        };
        let note = interp.heap.diagnostic(id).next.expect("note");
        let note = interp.heap.diagnostic(note);
        assert_eq!(note.message, "last defined here");
        assert_eq!(note.span.line, 1);
    }

    #[test]
    fn test_dotted_argument_tail_is_not_an_argument() {
        let (interp, value) = run("(fn f (a . rest) (list a rest)) (f 1 2 . 3)");
        assert_eq!(print_val(&interp, value).ok(), Some("(1 (2))".to_string()));
        let (_, value) = run("(fn f (a . rest) rest) (f 1 . undefined-name)");
        assert_eq!(value.kind, Kind::Nil);
    }

    #[test]
    fn test_bare_argument_tail_is_rejected() {
        let (interp, value) = run("(fn f args args) (setq xs (list 1)) (f . xs)");
        assert_eq!(
            interp.heap.error_message(value),
            Some("function application requires a list of arguments (this is a symbol)")
        );
    }

    #[test]
    fn test_apply_builtin_gets_unevaluated_args() {
        let mut interp = Interp::with_output(Output::buffer());
        let global = interp.global();
        let plus = interp.eval_source("t.l", "(progn +)");
        let forms = interp.read_source("u.l", "(ignored 1 (* 2 3))");
        let args = interp.heap.rest(forms[0].as_pair().unwrap());
        let result = interp.apply(global, forms[0].span, plus, args);
        assert_eq!(result.kind, Kind::Int(7));
    }

    #[test]
    fn test_empty_body_is_nil() {
        let (_, value) = run("(fn f (x)) (f 1)");
        assert_eq!(value.kind, Kind::Nil);
    }
}
