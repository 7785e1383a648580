use crate::diagnostic::Diagnostic;
use crate::env::Frame;
use crate::source::Span;
use crate::value::{
    ArrayId, ClosureId, DiagnosticId, EnvId, Kind, PairId, StringId, Value,
};

/// A single cons cell on the heap.
pub struct ConsCell {
    pub first: Value,
    pub rest: Value,
}

/// The parameters, body and defining scope shared by functions and macros.
pub struct Closure {
    /// Parameter list, possibly dotted.
    pub params: Value,
    /// Body forms, a proper list evaluated as an implicit `progn`.
    pub body: Value,
    pub env: EnvId,
}

/// Arena for everything a value can point at. Ids are indices into these
/// tables; nothing is freed while the heap lives, so every alias of a pair
/// or frame stays valid and observes mutation through it.
#[derive(Default)]
pub struct Heap {
    cells: Vec<ConsCell>,
    strings: Vec<String>,
    arrays: Vec<Vec<Value>>,
    closures: Vec<Closure>,
    frames: Vec<Frame>,
    diagnostics: Vec<Diagnostic>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            cells: Vec::with_capacity(1024),
            ..Default::default()
        }
    }

    // === Pairs ===

    /// Allocate a new cons cell. Returns a PairId.
    pub fn alloc(&mut self, first: Value, rest: Value) -> PairId {
        let id = PairId(self.cells.len() as u32);
        self.cells.push(ConsCell { first, rest });
        id
    }

    /// Allocate a pair located where its first element is.
    pub fn cons(&mut self, first: Value, rest: Value) -> Value {
        let span = first.span;
        Value::new(Kind::Pair(self.alloc(first, rest)), span)
    }

    #[inline]
    pub fn first(&self, id: PairId) -> Value {
        self.cells[id.0 as usize].first
    }

    #[inline]
    pub fn rest(&self, id: PairId) -> Value {
        self.cells[id.0 as usize].rest
    }

    #[inline]
    pub fn set_rest(&mut self, id: PairId, val: Value) {
        self.cells[id.0 as usize].rest = val;
    }

    /// Build a proper list from a slice of values. An empty slice is Nil at `span`.
    pub fn list(&mut self, values: &[Value], span: Span) -> Value {
        self.list_with_tail(values, Value::nil(span))
    }

    /// Build a list from a slice of values ending in `tail`.
    pub fn list_with_tail(&mut self, values: &[Value], tail: Value) -> Value {
        let mut result = tail;
        for &val in values.iter().rev() {
            result = self.cons(val, result);
        }
        result
    }

    /// The non-Nil atom a list ends in, if it is not proper.
    pub fn improper_tail(&self, val: Value) -> Option<Value> {
        let mut current = val;
        loop {
            match current.kind {
                Kind::Nil => return None,
                Kind::Pair(id) => current = self.rest(id),
                _ => return Some(current),
            }
        }
    }

    /// Collect a proper list into a Vec. Returns None if not a proper list.
    pub fn list_to_vec(&self, val: Value) -> Option<Vec<Value>> {
        let mut result = Vec::new();
        let mut current = val;
        loop {
            match current.kind {
                Kind::Nil => return Some(result),
                Kind::Pair(id) => {
                    result.push(self.first(id));
                    current = self.rest(id);
                }
                _ => return None,
            }
        }
    }

    /// Iterate over the elements of a list, stopping at its terminator.
    pub fn iter(&self, list: Value) -> ListIter<'_> {
        ListIter {
            heap: self,
            current: list,
        }
    }

    // === Atoms with payloads ===

    pub fn alloc_string(&mut self, s: impl Into<String>, span: Span) -> Value {
        let id = StringId(self.strings.len() as u32);
        self.strings.push(s.into());
        Value::new(Kind::Str(id), span)
    }

    pub fn string(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    pub fn alloc_array(&mut self, items: Vec<Value>, span: Span) -> Value {
        let id = ArrayId(self.arrays.len() as u32);
        self.arrays.push(items);
        Value::new(Kind::Array(id), span)
    }

    pub fn array(&self, id: ArrayId) -> &[Value] {
        &self.arrays[id.0 as usize]
    }

    pub fn alloc_closure(&mut self, closure: Closure) -> ClosureId {
        let id = ClosureId(self.closures.len() as u32);
        self.closures.push(closure);
        id
    }

    pub fn closure(&self, id: ClosureId) -> &Closure {
        &self.closures[id.0 as usize]
    }

    // === Environment frames ===

    pub fn alloc_frame(&mut self, frame: Frame) -> EnvId {
        let id = EnvId(self.frames.len() as u32);
        self.frames.push(frame);
        id
    }

    pub fn frame(&self, id: EnvId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    pub fn frame_mut(&mut self, id: EnvId) -> &mut Frame {
        &mut self.frames[id.0 as usize]
    }

    // === Diagnostics ===

    pub fn alloc_diagnostic(&mut self, diagnostic: Diagnostic) -> DiagnosticId {
        let id = DiagnosticId(self.diagnostics.len() as u32);
        self.diagnostics.push(diagnostic);
        id
    }

    pub fn diagnostic(&self, id: DiagnosticId) -> &Diagnostic {
        &self.diagnostics[id.0 as usize]
    }

    pub fn diagnostic_mut(&mut self, id: DiagnosticId) -> &mut Diagnostic {
        &mut self.diagnostics[id.0 as usize]
    }

    // === Statistics ===

    /// Returns the number of allocated cells.
    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }
}

/// Iterator over list elements. A dotted tail is not yielded; use
/// [`Heap::improper_tail`] to find it.
pub struct ListIter<'a> {
    heap: &'a Heap,
    current: Value,
}

impl Iterator for ListIter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let id = self.current.as_pair()?;
        self.current = self.heap.rest(id);
        Some(self.heap.first(id))
    }
}
