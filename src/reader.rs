use crate::heap::Heap;
use crate::source::{SourceId, Span};
use crate::symbol::{sym, SymbolTable};
use crate::value::{Kind, Value};

/// Result of reading one piece of syntax. A syntax error is an Error value.
type ReadResult = Result<Value, Value>;

/// A top-level form and the location of its opening `(`.
#[derive(Clone, Copy, Debug)]
pub struct Form {
    pub open: Span,
    pub value: Value,
}

/// Reader: turns source text into located values.
///
/// At the top level the reader is in prose mode: anything outside a form is
/// skipped, and each `(` starts a new top-level form. Inside a form it reads
/// integers, strings, identifiers, lists, dotted tails, `[...]` arrays,
/// `'x` quotes and `;` line comments.
pub struct Reader<'a> {
    source: SourceId,
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    /// Brackets opened and not yet closed in the current top-level form.
    depth: usize,
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
}

impl<'a> Reader<'a> {
    pub fn new(
        source: SourceId,
        input: &'a str,
        heap: &'a mut Heap,
        symbols: &'a mut SymbolTable,
    ) -> Self {
        Reader {
            source,
            input,
            pos: 0,
            line: 1,
            column: 0,
            depth: 0,
            heap,
            symbols,
        }
    }

    /// Read the next top-level form, skipping prose before it.
    /// Returns None once no `(` is left in the input.
    ///
    /// A form with a syntax error is consumed up to its closing bracket and
    /// comes back as a single Error value.
    pub fn next_form(&mut self) -> Option<Form> {
        loop {
            match self.peek()? {
                '(' => break,
                ';' => self.skip_line(),
                _ => {
                    self.advance();
                }
            }
        }
        let open = self.here(1);
        self.advance();
        self.depth = 1;
        let value = self.read_list(open).unwrap_or_else(|error| {
            self.recover();
            error
        });
        Some(Form { open, value })
    }

    /// Skip the rest of a broken form, until the brackets still open in it
    /// are closed or the input ends.
    fn recover(&mut self) {
        while self.depth > 0 {
            match self.advance() {
                None => break,
                Some('(' | '[') => self.depth += 1,
                Some(')' | ']') => self.depth -= 1,
                Some(';') => self.skip_line(),
                Some('"') => self.skip_string(),
                Some(_) => {}
            }
        }
        self.depth = 0;
    }

    fn skip_string(&mut self) {
        while let Some(ch) = self.advance() {
            match ch {
                '"' => break,
                '\\' => {
                    self.advance();
                }
                _ => {}
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// A span starting at the current position, `len` characters long.
    fn here(&self, len: u32) -> Span {
        Span::new(self.source, self.line, self.column, len, self.pos as u32)
    }

    fn error(&mut self, span: Span, message: &str) -> Value {
        self.heap.error(span, message)
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                self.skip_line();
            } else {
                break;
            }
        }
    }

    /// Read one expression; `open` is the bracket that must eventually be
    /// closed, blamed if the input ends first.
    fn read_expr(&mut self, open: Span, unmatched: &str) -> ReadResult {
        self.skip_whitespace_and_comments();
        let Some(ch) = self.peek() else {
            return Err(self.error(open, unmatched));
        };

        match ch {
            '(' => {
                let span = self.here(1);
                self.advance();
                self.depth += 1;
                self.read_list(span)
            }
            '[' => {
                let span = self.here(1);
                self.advance();
                self.depth += 1;
                self.read_array(span)
            }
            ')' | ']' | '.' if ch != '.' || self.is_dot_separator() => {
                let span = self.here(1);
                self.advance();
                Err(self.error(span, &format!("unexpected `{}'", ch)))
            }
            '\'' => {
                let span = self.here(1);
                self.advance();
                let quoted = self.read_expr(open, unmatched)?;
                let head = Value::new(Kind::Symbol(sym::QUOTE), span);
                let tail = self.heap.list(&[quoted], quoted.span);
                Ok(self.heap.cons(head, tail))
            }
            '"' => self.read_string(),
            _ => self.read_word(),
        }
    }

    /// Read the rest of a list whose `(` has been consumed.
    fn read_list(&mut self, open: Span) -> ReadResult {
        let mut elements = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(self.error(open, "unmatched `('")),
                Some(')') => {
                    let close = self.here(1);
                    self.advance();
                    self.depth -= 1;
                    let end = if elements.is_empty() { open } else { close };
                    return Ok(self.heap.list(&elements, end));
                }
                Some('.') if self.is_dot_separator() => {
                    let dot = self.here(1);
                    self.advance();
                    if elements.is_empty() {
                        return Err(self.error(dot, "unexpected `.'"));
                    }
                    let tail = self.read_expr(open, "unmatched `('")?;
                    self.skip_whitespace_and_comments();
                    if self.peek() != Some(')') {
                        let span = self.here(1);
                        return Err(self.error(span, "expected `)'"));
                    }
                    self.advance();
                    self.depth -= 1;
                    return Ok(self.heap.list_with_tail(&elements, tail));
                }
                Some(_) => elements.push(self.read_expr(open, "unmatched `('")?),
            }
        }
    }

    /// Check if a '.' is a dot separator (not part of a word).
    fn is_dot_separator(&self) -> bool {
        match self.peek_second() {
            None => true,
            Some(next) => is_delimiter(next),
        }
    }

    /// Read the rest of an array literal whose `[` has been consumed.
    fn read_array(&mut self, open: Span) -> ReadResult {
        let mut elements = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(self.error(open, "unmatched `['")),
                Some(']') => {
                    self.advance();
                    self.depth -= 1;
                    return Ok(self.heap.alloc_array(elements, open));
                }
                Some(_) => elements.push(self.read_expr(open, "unmatched `['")?),
            }
        }
    }

    /// Read a string literal: "..." with \n \t \" \\ escapes.
    fn read_string(&mut self) -> ReadResult {
        let start = self.here(0);
        self.advance();
        let mut len = 1;
        let mut s = String::new();
        loop {
            let Some(ch) = self.advance() else {
                let span = Span { len: 1, ..start };
                return Err(self.error(span, "unterminated string"));
            };
            len += 1;
            match ch {
                '"' => break,
                '\\' => {
                    let Some(esc) = self.advance() else {
                        continue;
                    };
                    len += 1;
                    s.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c => s.push(c),
            }
        }
        Ok(self.heap.alloc_string(s, Span { len, ..start }))
    }

    /// Read an integer or an identifier.
    fn read_word(&mut self) -> ReadResult {
        let start = self.here(0);
        let begin = self.pos;
        let mut len = 0;
        while let Some(ch) = self.peek() {
            if is_delimiter(ch) {
                break;
            }
            self.advance();
            len += 1;
        }
        let word = &self.input[begin..self.pos];
        let span = Span { len, ..start };

        if is_integer(word) {
            return match word.parse::<i64>() {
                Ok(i) => Ok(Value::int(i, span)),
                Err(_) => Err(self.error(span, "integer literal out of range")),
            };
        }
        Ok(self.symbols.make(word, span))
    }
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | '[' | ']' | '\'' | '"' | ';')
}

fn is_integer(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceMap;
    use pretty_assertions::assert_eq;

    struct Fixture {
        heap: Heap,
        symbols: SymbolTable,
        sources: SourceMap,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                heap: Heap::new(),
                symbols: SymbolTable::new(),
                sources: SourceMap::new(),
            }
        }

        fn read(&mut self, text: &str) -> Vec<Value> {
            let source = self.sources.add("t.l", text);
            let text = self.sources.text(source);
            let mut reader = Reader::new(source, text, &mut self.heap, &mut self.symbols);
            std::iter::from_fn(|| reader.next_form().map(|form| form.value)).collect()
        }

        fn kinds(&self, list: Value) -> Vec<Kind> {
            self.heap.iter(list).map(|v| v.kind).collect()
        }
    }

    #[test]
    fn test_prose_is_skipped() {
        let mut fx = Fixture::new();
        let forms = fx.read("Some words first.\n(1 2) more words (3)");
        assert_eq!(forms.len(), 2);
        assert_eq!(fx.kinds(forms[0]), vec![Kind::Int(1), Kind::Int(2)]);
        assert_eq!(fx.kinds(forms[1]), vec![Kind::Int(3)]);
    }

    #[test]
    fn test_atoms() {
        let mut fx = Fixture::new();
        let forms = fx.read("(-12 foo nil t \"a\\nb\" 1+)");
        let items: Vec<Value> = fx.heap.iter(forms[0]).collect();
        assert_eq!(items[0].kind, Kind::Int(-12));
        assert_eq!(items[1].as_symbol(), fx.symbols.lookup("foo"));
        assert_eq!(items[2].kind, Kind::Nil);
        assert_eq!(items[3].kind, Kind::True);
        let Kind::Str(id) = items[4].kind else {
            panic!("expected a string");
        };
        assert_eq!(fx.heap.string(id), "a\nb");
        assert_eq!(items[5].as_symbol(), fx.symbols.lookup("1+"));
    }

    #[test]
    fn test_spans() {
        let mut fx = Fixture::new();
        let forms = fx.read("\n  (add \"xy\" 10)");
        let items: Vec<Value> = fx.heap.iter(forms[0]).collect();
        assert_eq!(forms[0].span, items[0].span);
        assert_eq!((items[0].span.line, items[0].span.column, items[0].span.len), (2, 3, 3));
        assert_eq!((items[1].span.column, items[1].span.len), (7, 4));
        assert_eq!((items[2].span.column, items[2].span.len), (12, 2));
        assert_eq!(items[2].span.offset, 13);
    }

    #[test]
    fn test_dotted_and_quote() {
        let mut fx = Fixture::new();
        let forms = fx.read("(a . b) ('x)");
        let tail = fx.heap.improper_tail(forms[0]).expect("dotted");
        assert_eq!(tail.as_symbol(), fx.symbols.lookup("b"));

        let quoted = fx.heap.iter(forms[1]).next().expect("element");
        let items: Vec<Value> = fx.heap.iter(quoted).collect();
        assert_eq!(items[0].kind, Kind::Symbol(sym::QUOTE));
        assert_eq!(items[1].as_symbol(), fx.symbols.lookup("x"));
    }

    #[test]
    fn test_array_literal() {
        let mut fx = Fixture::new();
        let forms = fx.read("([1 2 (3)])");
        let array = fx.heap.iter(forms[0]).next().expect("element");
        let Kind::Array(id) = array.kind else {
            panic!("expected an array");
        };
        assert_eq!(fx.heap.array(id).len(), 3);
    }

    #[test]
    fn test_empty_list_is_nil() {
        let mut fx = Fixture::new();
        let forms = fx.read("(())");
        assert_eq!(fx.kinds(forms[0]), vec![Kind::Nil]);
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            ("(1 2", "unmatched `('"),
            ("(1 ])", "unexpected `]'"),
            ("(a . b c)", "expected `)'"),
            ("(\"open)", "unterminated string"),
            ("([1 2)", "unexpected `)'"),
            ("([1 2", "unmatched `['"),
            ("(99999999999999999999)", "integer literal out of range"),
        ];
        for (text, message) in cases {
            let mut fx = Fixture::new();
            let forms = fx.read(text);
            assert_eq!(fx.heap.error_message(forms[0]), Some(message), "{}", text);
        }
    }

    #[test]
    fn test_broken_form_is_consumed_whole() {
        let mut fx = Fixture::new();
        let forms = fx.read("(car ] (println \")\" ; )\n 7)) (after)");
        assert_eq!(forms.len(), 2);
        assert_eq!(fx.heap.error_message(forms[0]), Some("unexpected `]'"));
        assert_eq!(fx.kinds(forms[1]), vec![Kind::Symbol(fx.symbols.lookup("after").expect("interned"))]);
    }

    #[test]
    fn test_form_keeps_opening_bracket() {
        let mut fx = Fixture::new();
        let source = fx.sources.add("t.l", "text (a b)");
        let text = fx.sources.text(source);
        let mut reader = Reader::new(source, text, &mut fx.heap, &mut fx.symbols);
        let form = reader.next_form().expect("form");
        assert_eq!((form.open.column, form.open.len), (5, 1));
        assert_eq!(form.value.span.column, 6);
    }

    #[test]
    fn test_comments_inside_forms() {
        let mut fx = Fixture::new();
        let forms = fx.read("(1 ; one\n 2)");
        assert_eq!(fx.kinds(forms[0]), vec![Kind::Int(1), Kind::Int(2)]);
    }
}
