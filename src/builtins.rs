use std::io::Write;

use tracing::debug;

use crate::env;
use crate::eval::{Builtin, BuiltinFn, EvalResult, Interp};
use crate::heap::Closure;
use crate::printer::print_val;
use crate::source::Span;
use crate::value::{describe, BuiltinId, EnvId, Kind, Value};

/// Every builtin, by the name it is bound to in a fresh environment.
const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("println", builtin_println),
    ("length", builtin_length),
    ("print", builtin_print),
    ("progn", builtin_progn),
    ("macro", builtin_macro),
    ("while", builtin_while),
    ("quote", builtin_quote),
    ("list", builtin_list),
    ("cons", builtin_cons),
    ("setq", builtin_setq),
    ("nth", builtin_nth),
    ("set", builtin_set),
    ("car", builtin_car),
    ("cdr", builtin_cdr),
    ("fn", builtin_fn),
    ("if", builtin_if),
    ("+", builtin_add),
    ("-", builtin_sub),
    ("*", builtin_mul),
    ("/", builtin_div),
    ("=", builtin_eq),
    ("<", builtin_less),
];

impl Interp {
    /// Register a native operation and bind it to `name` in `env`.
    pub fn add_builtin(&mut self, env: EnvId, name: &str, op: BuiltinFn) -> Value {
        let id = BuiltinId(self.builtins.len() as u32);
        self.builtins.push(Builtin {
            name: name.to_string(),
            op,
        });
        let symbol = self.symbols.make(name, Span::BUILTIN);
        let value = Value::new(Kind::Builtin(id), Span::BUILTIN);
        debug!(name, "registered builtin");
        env::define(&mut self.heap, env, symbol, value)
    }

    /// Bind every builtin in `env`.
    pub fn load_builtins(&mut self, env: EnvId) {
        for &(name, op) in BUILTINS {
            self.add_builtin(env, name, op);
        }
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

fn arity_message(name: &str, n: usize) -> String {
    let count = match n {
        1 => "one argument".to_string(),
        2 => "two arguments".to_string(),
        n => format!("{} arguments", n),
    };
    format!("builtin `{}' requires {}", name, count)
}

/// Split an unevaluated argument list that must have exactly `N` elements.
fn fixed<const N: usize>(interp: &mut Interp, name: &str, args: Value) -> EvalResult<[Value; N]> {
    let items = interp.heap.list_to_vec(args).unwrap_or_default();
    <[Value; N]>::try_from(items).map_err(|_| interp.heap.error(args.span, arity_message(name, N)))
}

/// Like [`fixed`], evaluating each argument left to right.
fn evaluated<const N: usize>(
    interp: &mut Interp,
    env: EnvId,
    name: &str,
    args: Value,
) -> EvalResult<[Value; N]> {
    let mut items = fixed::<N>(interp, name, args)?;
    for item in items.iter_mut() {
        *item = interp.eval_checked(env, *item)?;
    }
    Ok(items)
}

/// Evaluate all arguments and require each to be an integer.
fn numbers(interp: &mut Interp, env: EnvId, name: &str, args: Value) -> EvalResult<Vec<i64>> {
    let list = interp.eval_list(env, args);
    if list.is_error() {
        return Err(list);
    }
    let values: Vec<Value> = interp.heap.iter(list).collect();
    values
        .into_iter()
        .map(|v| match v.kind {
            Kind::Int(i) => Ok(i),
            other => Err(interp.heap.error(
                v.span,
                format!(
                    "builtin `{}' takes only numeric arguments (got `{}')",
                    name,
                    other.type_name()
                ),
            )),
        })
        .collect()
}

// ============================================================================
// Definitions
// ============================================================================

/// Build a Function or Macro from `(params . body)`, closing over `env`.
///
/// Every parameter must be a symbol; a dotted tail names the rest
/// parameter, and a bare symbol in place of the list collects all arguments.
fn make_closure(interp: &mut Interp, env: EnvId, def: Value, macro_: bool) -> EvalResult<Value> {
    let Kind::Pair(id) = def.kind else {
        return Err(interp.heap.error(def.span, "missing list of parameters"));
    };
    let params = interp.heap.first(id);
    let body = interp.heap.rest(id);

    let mut current = params;
    while let Kind::Pair(pid) = current.kind {
        let param = interp.heap.first(pid);
        check_param(interp, param)?;
        current = interp.heap.rest(pid);
    }
    if !current.is_nil() {
        check_param(interp, current)?;
    }

    if let Some(tail) = interp.heap.improper_tail(body) {
        return Err(interp.heap.error(tail.span, "a non-dotted list was expected here"));
    }

    let closure = interp.heap.alloc_closure(Closure { params, body, env });
    let kind = if macro_ {
        Kind::Macro(closure)
    } else {
        Kind::Function(closure)
    };
    Ok(Value::new(kind, def.span))
}

fn check_param(interp: &mut Interp, param: Value) -> EvalResult<()> {
    match param.kind {
        Kind::Symbol(_) => Ok(()),
        other => Err(interp.heap.error(
            param.span,
            format!("parameter name must be a symbol (this is {})", describe(other)),
        )),
    }
}

/// (fn name (params...) body...): define a named function in the current
/// scope. (fn (params...) body...): an anonymous function.
fn builtin_fn(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let Kind::Pair(id) = args.kind else {
        return Err(interp.heap.error(args.span, "missing list of parameters"));
    };
    let head = interp.heap.first(id);
    match head.kind {
        Kind::Symbol(_) => {
            let def = interp.heap.rest(id);
            if !def.is_pair() {
                return Err(interp.heap.error(args.span, "missing list of parameters"));
            }
            let function = make_closure(interp, env, def, false)?;
            Ok(env::define(&mut interp.heap, env, head, function))
        }
        _ => make_closure(interp, env, args, false),
    }
}

/// (macro name (params...) body...): define a macro in the current scope.
fn builtin_macro(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let Kind::Pair(id) = args.kind else {
        return Err(interp.heap.error(args.span, arity_message("macro", 2)));
    };
    let name = interp.heap.first(id);
    if name.as_symbol().is_none() {
        return Err(interp.heap.error(
            name.span,
            format!("macro name must be a symbol (this is {})", describe(name.kind)),
        ));
    }
    let def = interp.heap.rest(id);
    if !def.is_pair() {
        return Err(interp.heap.error(args.span, "missing list of parameters"));
    }
    let macro_ = make_closure(interp, env, def, true)?;
    Ok(env::define(&mut interp.heap, env, name, macro_))
}

// ============================================================================
// Assignment
// ============================================================================

fn assign(interp: &mut Interp, env: EnvId, name: &str, target: Value, value: Value) -> EvalResult<Value> {
    if target.as_symbol().is_none() {
        return Err(interp.heap.error(
            target.span,
            format!(
                "builtin `{}' requires a symbol as its first argument (this is {})",
                name,
                describe(target.kind)
            ),
        ));
    }
    Ok(env::assign(&mut interp.heap, env, target, value))
}

/// (set name-expr value): both arguments are evaluated.
fn builtin_set(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let [target, value] = evaluated::<2>(interp, env, "set", args)?;
    assign(interp, env, "set", target, value)
}

/// (setq name value): the name is taken literally.
fn builtin_setq(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let [target, value] = fixed::<2>(interp, "setq", args)?;
    if target.as_symbol().is_none() {
        return assign(interp, env, "setq", target, value);
    }
    let value = interp.eval_checked(env, value)?;
    assign(interp, env, "setq", target, value)
}

// ============================================================================
// Arithmetic and comparison
// ============================================================================

/// Fold `op` over the evaluated arguments. No arguments gives 0.
fn arithmetic(
    interp: &mut Interp,
    env: EnvId,
    args: Value,
    name: &str,
    op: fn(i64, i64) -> Option<i64>,
) -> EvalResult<Value> {
    let nums = numbers(interp, env, name, args)?;
    let mut iter = nums.into_iter();
    let mut acc = iter.next().unwrap_or(0);
    for n in iter {
        acc = match op(acc, n) {
            Some(v) => v,
            None => return Err(interp.heap.error(args.span, "division by zero")),
        };
    }
    Ok(Value::int(acc, args.span))
}

fn builtin_add(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    arithmetic(interp, env, args, "+", |a, b| Some(a.wrapping_add(b)))
}

fn builtin_sub(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    arithmetic(interp, env, args, "-", |a, b| Some(a.wrapping_sub(b)))
}

fn builtin_mul(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    arithmetic(interp, env, args, "*", |a, b| Some(a.wrapping_mul(b)))
}

fn builtin_div(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    arithmetic(interp, env, args, "/", |a, b| (b != 0).then(|| a.wrapping_div(b)))
}

/// True when `holds` is true of every adjacent pair of arguments.
fn compare(
    interp: &mut Interp,
    env: EnvId,
    args: Value,
    name: &str,
    holds: fn(i64, i64) -> bool,
) -> EvalResult<Value> {
    let nums = numbers(interp, env, name, args)?;
    let ok = nums.windows(2).all(|w| holds(w[0], w[1]));
    Ok(Value::boolean(ok, args.span))
}

fn builtin_eq(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    compare(interp, env, args, "=", |a, b| a == b)
}

fn builtin_less(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    compare(interp, env, args, "<", |a, b| a < b)
}

// ============================================================================
// Lists, arrays and strings
// ============================================================================

/// (cons a b): a new pair.
fn builtin_cons(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let [first, rest] = evaluated::<2>(interp, env, "cons", args)?;
    Ok(interp.heap.cons(first, rest))
}

fn pair_part(interp: &mut Interp, env: EnvId, args: Value, name: &str, first: bool) -> EvalResult<Value> {
    let [list] = evaluated::<1>(interp, env, name, args)?;
    match list.kind {
        Kind::Pair(id) if first => Ok(interp.heap.first(id)),
        Kind::Pair(id) => Ok(interp.heap.rest(id)),
        Kind::Nil => Ok(list),
        Kind::Int(_)
        | Kind::Str(_)
        | Kind::Symbol(_)
        | Kind::Array(_)
        | Kind::Function(_)
        | Kind::Macro(_)
        | Kind::Builtin(_)
        | Kind::Env(_)
        | Kind::True
        | Kind::Error(_) => Err(interp.heap.error(
            list.span,
            format!("builtin `{}' requires a list (this is {})", name, describe(list.kind)),
        )),
    }
}

/// (car list): first element, or nil for nil.
fn builtin_car(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    pair_part(interp, env, args, "car", true)
}

/// (cdr list): everything after the first element, or nil for nil.
fn builtin_cdr(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    pair_part(interp, env, args, "cdr", false)
}

/// (list a b ...): the evaluated arguments as a fresh list.
fn builtin_list(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let list = interp.eval_list(env, args);
    if list.is_error() {
        Err(list)
    } else {
        Ok(list)
    }
}

/// The elements of a proper list, or an error at its dotted tail.
fn proper_items(interp: &mut Interp, list: Value) -> EvalResult<Vec<Value>> {
    match interp.heap.improper_tail(list) {
        Some(tail) => Err(interp.heap.error(tail.span, "a non-dotted list was expected here")),
        None => Ok(interp.heap.iter(list).collect()),
    }
}

/// (nth index sequence): element `index` of an array, list or string.
/// Strings are indexed by character and yield a one-character string.
fn builtin_nth(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let [index, seq] = evaluated::<2>(interp, env, "nth", args)?;
    let Some(i) = index.as_int() else {
        return Err(interp.heap.error(
            index.span,
            format!(
                "builtin `nth' requires a numeric first argument (this is {})",
                describe(index.kind)
            ),
        ));
    };

    let position = usize::try_from(i).ok();
    let found = match seq.kind {
        Kind::Array(id) => {
            let items = interp.heap.array(id);
            position.and_then(|i| items.get(i).copied()).ok_or(items.len())
        }
        Kind::Nil | Kind::Pair(_) => {
            let items = proper_items(interp, seq)?;
            position.and_then(|i| items.get(i).copied()).ok_or(items.len())
        }
        Kind::Str(id) => {
            let text = interp.heap.string(id);
            let len = text.chars().count();
            match position.and_then(|i| text.chars().nth(i)) {
                Some(c) => Ok(interp.heap.alloc_string(c.to_string(), seq.span)),
                None => Err(len),
            }
        }
        Kind::Int(_)
        | Kind::Symbol(_)
        | Kind::Function(_)
        | Kind::Macro(_)
        | Kind::Builtin(_)
        | Kind::Env(_)
        | Kind::True
        | Kind::Error(_) => {
            return Err(interp.heap.error(
                seq.span,
                format!(
                    "builtin `nth' requires an array, list, or string argument (this is {})",
                    describe(seq.kind)
                ),
            ))
        }
    };

    found.map_err(|len| {
        interp.heap.error(
            index.span,
            format!(
                "index {} is out of range for {} of length {}",
                i,
                describe(seq.kind),
                len
            ),
        )
    })
}

/// (length sequence): element count of an array or list, character count
/// of a string.
fn builtin_length(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let [seq] = evaluated::<1>(interp, env, "length", args)?;
    let len = match seq.kind {
        Kind::Array(id) => interp.heap.array(id).len(),
        Kind::Nil | Kind::Pair(_) => proper_items(interp, seq)?.len(),
        Kind::Str(id) => interp.heap.string(id).chars().count(),
        Kind::Int(_)
        | Kind::Symbol(_)
        | Kind::Function(_)
        | Kind::Macro(_)
        | Kind::Builtin(_)
        | Kind::Env(_)
        | Kind::True
        | Kind::Error(_) => {
            return Err(interp.heap.error(
                seq.span,
                format!(
                    "builtin `length' takes a list, array, or string argument (this is {})",
                    describe(seq.kind)
                ),
            ))
        }
    };
    Ok(Value::int(len as i64, args.span))
}

// ============================================================================
// Control
// ============================================================================

/// (quote x): x, unevaluated.
fn builtin_quote(interp: &mut Interp, _env: EnvId, args: Value) -> EvalResult<Value> {
    let [quoted] = fixed::<1>(interp, "quote", args)?;
    Ok(quoted)
}

/// (if cond then else...): `then` when cond is exactly true, otherwise
/// the else forms in sequence.
fn builtin_if(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let Kind::Pair(id) = args.kind else {
        return Err(interp.heap.error(args.span, "builtin `if' requires a condition"));
    };
    let cond = interp.eval_checked(env, interp.heap.first(id))?;
    let branches = interp.heap.rest(id);
    let Kind::Pair(bid) = branches.kind else {
        return Ok(Value::nil(branches.span));
    };
    if cond.is_true() {
        interp.eval_checked(env, interp.heap.first(bid))
    } else {
        let rest = interp.heap.rest(bid);
        check(interp.progn(env, rest))
    }
}

/// (while cond body...): run body while cond is exactly true. The value is
/// that of the last body run, or nil if it never ran.
fn builtin_while(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let Kind::Pair(id) = args.kind else {
        return Err(interp.heap.error(args.span, "builtin `while' requires a condition"));
    };
    let cond = interp.heap.first(id);
    let body = interp.heap.rest(id);
    let mut result = Value::nil(args.span);
    while interp.eval_checked(env, cond)?.is_true() {
        result = check(interp.progn(env, body))?;
    }
    Ok(result)
}

/// (progn forms...): evaluate in order, yield the last.
fn builtin_progn(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    check(interp.progn(env, args))
}

fn check(value: Value) -> EvalResult<Value> {
    if value.is_error() {
        Err(value)
    } else {
        Ok(value)
    }
}

// ============================================================================
// Output
// ============================================================================

/// (print args...): evaluate and print each argument, no separators.
fn builtin_print(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let mut current = args;
    while let Kind::Pair(id) = current.kind {
        let value = interp.eval_checked(env, interp.heap.first(id))?;
        let text = match print_val(interp, value) {
            Ok(text) => text,
            Err(bad) => {
                return Err(interp.heap.error(
                    bad.span,
                    format!(
                        "bug: unimplemented printer for expression of type `{}'",
                        bad.type_name()
                    ),
                ))
            }
        };
        if let Err(e) = interp.out.write_all(text.as_bytes()) {
            return Err(interp.heap.error(value.span, format!("failed to write output: {}", e)));
        }
        current = interp.heap.rest(id);
    }
    Ok(Value::nil(args.span))
}

/// (println args...): like print, then a newline, even after an error.
fn builtin_println(interp: &mut Interp, env: EnvId, args: Value) -> EvalResult<Value> {
    let result = builtin_print(interp, env, args);
    if let Err(e) = interp.out.write_all(b"\n") {
        return Err(interp.heap.error(args.span, format!("failed to write output: {}", e)));
    }
    result
}
