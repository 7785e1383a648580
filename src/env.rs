use tracing::trace;

use crate::heap::Heap;
use crate::value::{EnvId, Kind, PairId, SymbolId, Value};

/// One scope level.
///
/// `bindings` is an association list of `(name . value)` pairs kept in the
/// heap, newest first. A frame never owns its parent; the parent is just
/// another id into the same heap.
pub struct Frame {
    pub bindings: Value,
    pub parent: Option<EnvId>,
}

/// Create a frame under `parent` holding `bindings`.
pub fn new_frame(heap: &mut Heap, parent: Option<EnvId>, bindings: Value) -> EnvId {
    heap.alloc_frame(Frame { bindings, parent })
}

/// Look up a binding by walking frames outward.
/// Returns the `(name . value)` pair, so callers can mutate the slot.
pub fn lookup(heap: &Heap, env: EnvId, name: SymbolId) -> Option<PairId> {
    let mut scope = Some(env);
    while let Some(id) = scope {
        let frame = heap.frame(id);
        for binding in heap.iter(frame.bindings) {
            if let Kind::Pair(bid) = binding.kind {
                if heap.first(bid).as_symbol() == Some(name) {
                    return Some(bid);
                }
            }
        }
        scope = frame.parent;
    }
    None
}

/// The bound value of `name`, if any frame has one.
pub fn get(heap: &Heap, env: EnvId, name: SymbolId) -> Option<Value> {
    lookup(heap, env, name).map(|b| heap.rest(b))
}

/// Prepend a binding to the current frame, shadowing any earlier binding of
/// the same name there. Outer frames are untouched. Returns `value`.
///
/// `name` is the symbol value itself; its span is remembered as the
/// definition site.
pub fn define(heap: &mut Heap, env: EnvId, name: Value, value: Value) -> Value {
    let binding = heap.cons(name, value);
    let bindings = heap.frame(env).bindings;
    let node = heap.cons(binding, bindings);
    heap.frame_mut(env).bindings = node;
    value
}

/// Mutate the nearest existing binding of `name`; if no frame binds it,
/// define it in the outermost frame of `env`'s chain.
pub fn assign(heap: &mut Heap, env: EnvId, name: Value, value: Value) -> Value {
    let Some(id) = name.as_symbol() else {
        return value;
    };
    match lookup(heap, env, id) {
        Some(binding) => {
            heap.set_rest(binding, value);
            value
        }
        None => {
            let global = root(heap, env);
            define(heap, global, name, value)
        }
    }
}

/// The outermost frame reachable from `env`.
pub fn root(heap: &Heap, env: EnvId) -> EnvId {
    let mut current = env;
    while let Some(parent) = heap.frame(current).parent {
        current = parent;
    }
    current
}

/// Build a child frame of `env` binding `params` to `args` positionally.
///
/// A dotted parameter list binds its tail symbol to whatever arguments
/// remain, as a list. Counts are not checked: binding stops when either
/// list runs out, missing parameters stay unbound and extra arguments are
/// ignored.
pub fn extend(heap: &mut Heap, env: EnvId, params: Value, args: Value) -> EnvId {
    let mut map = Value::nil(params.span);
    let mut p = params;
    let mut q = args;

    while let Kind::Pair(pid) = p.kind {
        let Kind::Pair(qid) = q.kind else {
            break;
        };
        let (name, arg) = (heap.first(pid), heap.first(qid));
        let binding = heap.cons(name, arg);
        map = heap.cons(binding, map);
        p = heap.rest(pid);
        q = heap.rest(qid);
    }

    if let Kind::Symbol(_) = p.kind {
        let binding = heap.cons(p, q);
        map = heap.cons(binding, map);
    }

    let frame = new_frame(heap, Some(env), map);
    trace!(frame = frame.0, parent = env.0, "extend");
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;
    use crate::symbol::SymbolTable;
    use pretty_assertions::assert_eq;

    fn setup() -> (Heap, SymbolTable, EnvId) {
        let mut heap = Heap::new();
        let global = new_frame(&mut heap, None, Value::nil(Span::NOWHERE));
        (heap, SymbolTable::new(), global)
    }

    fn int(i: i64) -> Value {
        Value::int(i, Span::NOWHERE)
    }

    #[test]
    fn test_define_shadows_in_same_frame() {
        let (mut heap, mut symbols, global) = setup();
        let x = symbols.make("x", Span::NOWHERE);
        define(&mut heap, global, x, int(1));
        define(&mut heap, global, x, int(2));
        let id = x.as_symbol().unwrap();
        assert_eq!(get(&heap, global, id).map(|v| v.kind), Some(Kind::Int(2)));
    }

    #[test]
    fn test_lookup_falls_through_to_parent() {
        let (mut heap, mut symbols, global) = setup();
        let x = symbols.make("x", Span::NOWHERE);
        define(&mut heap, global, x, int(7));
        let child = new_frame(&mut heap, Some(global), Value::nil(Span::NOWHERE));
        let id = x.as_symbol().unwrap();
        assert_eq!(get(&heap, child, id).map(|v| v.kind), Some(Kind::Int(7)));
        let y = symbols.intern("y");
        assert!(lookup(&heap, child, y).is_none());
    }

    #[test]
    fn test_assign_mutates_outer_binding_in_place() {
        let (mut heap, mut symbols, global) = setup();
        let x = symbols.make("x", Span::NOWHERE);
        define(&mut heap, global, x, int(1));
        let child = new_frame(&mut heap, Some(global), Value::nil(Span::NOWHERE));
        assign(&mut heap, child, x, int(5));
        let id = x.as_symbol().unwrap();
        assert_eq!(get(&heap, global, id).map(|v| v.kind), Some(Kind::Int(5)));
        assert!(heap.frame(child).bindings.is_nil());
    }

    #[test]
    fn test_assign_unbound_defines_globally() {
        let (mut heap, mut symbols, global) = setup();
        let child = new_frame(&mut heap, Some(global), Value::nil(Span::NOWHERE));
        let y = symbols.make("y", Span::NOWHERE);
        assign(&mut heap, child, y, int(3));
        let id = y.as_symbol().unwrap();
        assert_eq!(get(&heap, global, id).map(|v| v.kind), Some(Kind::Int(3)));
    }

    #[test]
    fn test_extend_binds_dotted_rest() {
        let (mut heap, mut symbols, global) = setup();
        let a = symbols.make("a", Span::NOWHERE);
        let rest = symbols.make("rest", Span::NOWHERE);
        let params = heap.list_with_tail(&[a], rest);
        let args = heap.list(&[int(1), int(2), int(3)], Span::NOWHERE);
        let frame = extend(&mut heap, global, params, args);

        let a_val = get(&heap, frame, a.as_symbol().unwrap()).unwrap();
        assert_eq!(a_val.kind, Kind::Int(1));
        let rest_val = get(&heap, frame, rest.as_symbol().unwrap()).unwrap();
        let items: Vec<Kind> = heap.iter(rest_val).map(|v| v.kind).collect();
        assert_eq!(items, vec![Kind::Int(2), Kind::Int(3)]);
    }

    #[test]
    fn test_extend_tolerates_count_mismatch() {
        let (mut heap, mut symbols, global) = setup();
        let a = symbols.make("a", Span::NOWHERE);
        let b = symbols.make("b", Span::NOWHERE);
        let params = heap.list(&[a, b], Span::NOWHERE);
        let args = heap.list(&[int(1)], Span::NOWHERE);
        let frame = extend(&mut heap, global, params, args);
        assert!(get(&heap, frame, a.as_symbol().unwrap()).is_some());
        assert!(get(&heap, frame, b.as_symbol().unwrap()).is_none());

        let params = heap.list(&[a], Span::NOWHERE);
        let args = heap.list(&[int(1), int(2)], Span::NOWHERE);
        let frame = extend(&mut heap, global, params, args);
        let a_val = get(&heap, frame, a.as_symbol().unwrap()).unwrap();
        assert_eq!(a_val.kind, Kind::Int(1));
    }
}
