//! Minimal Python tokenizer for definition headers.
//!
//! Only what is needed to find the colon that terminates a `def` or
//! `class` header: string literals (with prefixes, triple quotes and
//! escapes), comments, bracket nesting and the walrus operator. The
//! input is the header text in isolation, never the whole file.

/// A colon token found at bracket depth zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeaderColon {
    /// 0-based line within the tokenized text.
    pub line: usize,
    /// Byte column just past the colon.
    pub end_column: usize,
}

/// All colons outside brackets, strings and comments, in source order.
pub(crate) fn top_level_colons(text: &str) -> Vec<HeaderColon> {
    let mut scanner = Scanner::new(text.as_bytes());
    let mut colons = Vec::new();
    let mut depth: usize = 0;

    while let Some(byte) = scanner.peek() {
        match byte {
            b'\n' => scanner.bump(),
            b'#' => scanner.skip_comment(),
            b'(' | b'[' | b'{' => {
                depth += 1;
                scanner.bump();
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                scanner.bump();
            }
            b':' => {
                scanner.bump();
                if scanner.peek() == Some(b'=') {
                    scanner.bump();
                } else if depth == 0 {
                    colons.push(HeaderColon {
                        line: scanner.line,
                        end_column: scanner.column(),
                    });
                }
            }
            b'"' | b'\'' => scanner.skip_string(),
            b if is_word_byte(b) => {
                let word = scanner.take_word();
                if matches!(scanner.peek(), Some(b'"' | b'\'')) && is_string_prefix(word) {
                    scanner.skip_string();
                }
            }
            _ => scanner.bump(),
        }
    }

    colons
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80
}

fn is_string_prefix(word: &[u8]) -> bool {
    if word.is_empty() || word.len() > 2 {
        return false;
    }
    let lower: Vec<u8> = word.iter().map(|b| b.to_ascii_lowercase()).collect();
    matches!(
        lower.as_slice(),
        b"r" | b"u" | b"b" | b"f" | b"t" | b"br" | b"rb" | b"fr" | b"rf" | b"tr" | b"rt"
    )
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            line: 0,
            line_start: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn column(&self) -> usize {
        self.pos - self.line_start
    }

    /// Advance one byte, tracking line starts.
    fn bump(&mut self) {
        if let Some(byte) = self.peek() {
            self.pos += 1;
            if byte == b'\n' {
                self.line += 1;
                self.line_start = self.pos;
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'\n' {
                break;
            }
            self.bump();
        }
    }

    fn take_word(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(is_word_byte) {
            self.bump();
        }
        let bytes = self.bytes;
        &bytes[start..self.pos]
    }

    /// Skip a string literal starting at the opening quote.
    ///
    /// Single-quoted strings end at their closing quote or, if
    /// unterminated, at the end of the line.
    fn skip_string(&mut self) {
        let Some(quote) = self.peek() else {
            return;
        };
        let triple = self.bytes.get(self.pos..self.pos + 3) == Some(&[quote, quote, quote][..]);

        if triple {
            for _ in 0..3 {
                self.bump();
            }
            while let Some(byte) = self.peek() {
                if byte == b'\\' {
                    self.bump();
                    self.bump();
                } else if byte == quote
                    && self.bytes.get(self.pos..self.pos + 3) == Some(&[quote, quote, quote][..])
                {
                    for _ in 0..3 {
                        self.bump();
                    }
                    return;
                } else {
                    self.bump();
                }
            }
        } else {
            self.bump();
            while let Some(byte) = self.peek() {
                match byte {
                    b'\\' => {
                        self.bump();
                        self.bump();
                    }
                    b'\n' => return,
                    b if b == quote => {
                        self.bump();
                        return;
                    }
                    _ => self.bump(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last(text: &str) -> Option<HeaderColon> {
        top_level_colons(text).last().copied()
    }

    #[test]
    fn finds_colon_after_simple_header() {
        assert_eq!(
            last("def f(x: int) -> int:"),
            Some(HeaderColon { line: 0, end_column: 21 })
        );
    }

    #[test]
    fn ignores_colons_inside_brackets_and_strings() {
        let header = "def f(a: dict = {'k': 1}, b=lambda: ':', c='#'):";
        let colons = top_level_colons(header);
        assert_eq!(colons.len(), 1);
        assert_eq!(colons[0].end_column, header.len());
    }

    #[test]
    fn ignores_colons_in_comments() {
        let header = "class A:  # note: here";
        assert_eq!(last(header), Some(HeaderColon { line: 0, end_column: 8 }));
    }

    #[test]
    fn tracks_lines_in_multiline_headers() {
        let header = "    def sum(self,\n            x: int,\n            y: int):";
        assert_eq!(last(header), Some(HeaderColon { line: 2, end_column: 20 }));
    }

    #[test]
    fn handles_prefixed_and_triple_quoted_strings() {
        let header = "def f(a=rb'x:y', b=\"\"\"multi\nline: text\"\"\") -> 'A:B':";
        let colon = last(header).expect("colon");
        assert_eq!(colon.line, 1);
        assert_eq!(colon.end_column, "line: text\"\"\") -> 'A:B':".len());
    }

    #[test]
    fn skips_walrus_operator() {
        assert!(top_level_colons("x := 1").is_empty());
    }

    #[test]
    fn returns_nothing_without_colon() {
        assert!(top_level_colons("def f(x)").is_empty());
    }
}
