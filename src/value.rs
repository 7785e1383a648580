use std::fmt;

use crate::source::Span;

/// Unique identifier for an interned symbol name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Index of a cons cell in the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId(pub u32);

/// Index of a string buffer in the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(pub u32);

/// Index of an array literal in the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayId(pub u32);

/// Index of a function or macro body in the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClosureId(pub u32);

/// Index of an environment frame in the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub u32);

/// Index of a native operation in the builtin registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinId(pub u32);

/// Index of an error or note in the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticId(pub u32);

/// What a value is. Copy semantics: compound payloads live in the heap and
/// are shared by every value holding the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Kind {
    Int(i64),
    Str(StringId),
    Symbol(SymbolId),
    Pair(PairId),
    Array(ArrayId),
    Function(ClosureId),
    Macro(ClosureId),
    Builtin(BuiltinId),
    Env(EnvId),
    True,
    Nil,
    Error(DiagnosticId),
}

impl Kind {
    /// The name used for this kind in diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            Kind::Int(_) => "int",
            Kind::Str(_) => "string",
            Kind::Symbol(_) => "symbol",
            Kind::Pair(_) => "cell",
            Kind::Array(_) => "array",
            Kind::Function(_) => "function",
            Kind::Macro(_) => "macro",
            Kind::Builtin(_) => "builtin",
            Kind::Env(_) => "env",
            Kind::True => "true",
            Kind::Nil => "nil",
            Kind::Error(_) => "error",
        }
    }
}

/// A runtime value together with the place in the source it belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Value {
    pub kind: Kind,
    pub span: Span,
}

impl Value {
    pub fn new(kind: Kind, span: Span) -> Self {
        Value { kind, span }
    }

    pub fn nil(span: Span) -> Self {
        Value::new(Kind::Nil, span)
    }

    pub fn truth(span: Span) -> Self {
        Value::new(Kind::True, span)
    }

    pub fn int(i: i64, span: Span) -> Self {
        Value::new(Kind::Int(i), span)
    }

    /// True or Nil, for predicates.
    pub fn boolean(b: bool, span: Span) -> Self {
        if b {
            Value::truth(span)
        } else {
            Value::nil(span)
        }
    }

    /// The same value, reported at a different place.
    pub fn at(self, span: Span) -> Self {
        Value { span, ..self }
    }

    pub fn type_name(self) -> &'static str {
        self.kind.type_name()
    }

    pub fn is_nil(self) -> bool {
        matches!(self.kind, Kind::Nil)
    }

    pub fn is_true(self) -> bool {
        matches!(self.kind, Kind::True)
    }

    pub fn is_pair(self) -> bool {
        matches!(self.kind, Kind::Pair(_))
    }

    pub fn is_error(self) -> bool {
        matches!(self.kind, Kind::Error(_))
    }

    /// Nil or a pair: something list operations may start walking.
    pub fn is_list(self) -> bool {
        matches!(self.kind, Kind::Nil | Kind::Pair(_))
    }

    pub fn as_pair(self) -> Option<PairId> {
        match self.kind {
            Kind::Pair(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_symbol(self) -> Option<SymbolId> {
        match self.kind {
            Kind::Symbol(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self.kind {
            Kind::Int(i) => Some(i),
            _ => None,
        }
    }
}

/// "a" or "an", whichever reads right before `word`.
pub fn article(word: &str) -> &'static str {
    match word.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

/// "a string", "an int", ... as used in "(this is ...)" diagnostics.
pub fn describe(kind: Kind) -> String {
    let name = kind.type_name();
    format!("{} {}", article(name), name)
}

macro_rules! id_debug {
    ($($name:ident),*) => {
        $(
            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }
        )*
    };
}

id_debug!(SymbolId, PairId, StringId, ArrayId, ClosureId, EnvId, BuiltinId, DiagnosticId);
