use std::fmt;

/// Identifier for a loaded source file.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({})", self.0)
    }
}

/// A region of source text. Every value carries one so diagnostics can
/// point back at the text it came from.
///
/// `line` is 1-based, `column` and `len` count characters, `offset` is the
/// byte offset of the first character in the file text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Span {
    pub source: SourceId,
    pub line: u32,
    pub column: u32,
    pub len: u32,
    pub offset: u32,
}

impl Span {
    /// Location of values synthesized with no textual origin.
    pub const NOWHERE: Span = Span {
        source: SourceId(0),
        line: 0,
        column: 0,
        len: 0,
        offset: 0,
    };

    /// Location of everything installed by the builtin registry.
    pub const BUILTIN: Span = Span {
        source: SourceId(1),
        line: 0,
        column: 0,
        len: 0,
        offset: 0,
    };

    pub fn new(source: SourceId, line: u32, column: u32, len: u32, offset: u32) -> Self {
        Span {
            source,
            line,
            column,
            len,
            offset,
        }
    }

    pub fn is_synthetic(self) -> bool {
        self.source == Span::NOWHERE.source || self.source == Span::BUILTIN.source
    }
}

/// A named body of source text.
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

/// All source text the interpreter has seen. Files are never dropped, so a
/// span stays renderable for as long as the interpreter lives.
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap {
            files: vec![
                SourceFile {
                    name: "*none*".into(),
                    text: "<none>".into(),
                },
                SourceFile {
                    name: "built-in-function".into(),
                    text: "<internal implementation>".into(),
                },
            ],
        }
    }

    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) -> SourceId {
        let id = SourceId(self.files.len() as u32);
        self.files.push(SourceFile {
            name: name.into(),
            text: text.into(),
        });
        id
    }

    pub fn get(&self, id: SourceId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn name(&self, id: SourceId) -> &str {
        &self.get(id).name
    }

    pub fn text(&self, id: SourceId) -> &str {
        &self.get(id).text
    }

    /// The full line of text containing `span`, without its newline.
    pub fn line_of(&self, span: Span) -> &str {
        let text = self.text(span.source);
        let offset = (span.offset as usize).min(text.len());
        let start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
        let end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
        &text[start..end]
    }
}

impl Default for SourceMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sentinel_sources() {
        let sources = SourceMap::new();
        assert_eq!(sources.name(Span::NOWHERE.source), "*none*");
        assert_eq!(sources.name(Span::BUILTIN.source), "built-in-function");
        assert!(Span::BUILTIN.is_synthetic());
    }

    #[test]
    fn test_line_of_span() {
        let mut sources = SourceMap::new();
        let id = sources.add("a.l", "(one)\n  (two 2)\n(three)");
        let span = Span::new(id, 2, 3, 3, 9);
        assert_eq!(sources.line_of(span), "  (two 2)");
        let last = Span::new(id, 3, 0, 1, 16);
        assert_eq!(sources.line_of(last), "(three)");
    }
}
