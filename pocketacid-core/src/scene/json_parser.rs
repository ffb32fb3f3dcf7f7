//! Streaming character -> event JSON parser (spec §4.11 / §6), ported from
//! `json_evented.cpp`'s `JsonVisitor::parseImpl`. Pull-style here instead of
//! the original's push callbacks: `JsonEvent` values are produced one at a
//! time by `JsonStreamParser::next_event`, which a caller (the scene
//! observer) drives until `Eof` or `Error`.

#[derive(Debug, Clone, PartialEq)]
pub enum JsonNumber {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonEvent {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    ObjectKey(String),
    Number(JsonNumber),
    Bool(bool),
    Null,
    String(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonError {
    pub message: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Array,
}

/// Parse state: whether the next token in a container must be a comma or a
/// closer, a key (object only), or a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    ValueOrClose,
    Value,
    CommaOrClose,
    KeyOrClose,
    Colon,
}

pub struct JsonStreamParser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    stack: Vec<Frame>,
    expect: Expect,
    done: bool,
}

impl<'a> JsonStreamParser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            stack: Vec::new(),
            expect: Expect::Value,
            done: false,
        }
    }

    fn err(&mut self, offset: usize, message: &str) -> JsonError {
        self.done = true;
        JsonError {
            message: message.to_string(),
            offset,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn peek_offset(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    /// Returns the next event, or `Ok(Eof)` once the top-level value and any
    /// trailing whitespace have been fully consumed. `Err` sets the internal
    /// `hadError` flag permanently (spec §4.11/§6 failure model).
    pub fn next_event(&mut self) -> Result<JsonEvent, JsonError> {
        if self.done {
            return Err(self.err(self.peek_offset(), "parser already errored or finished"));
        }
        self.skip_whitespace();

        if self.stack.is_empty() && self.expect == Expect::CommaOrClose {
            let off = self.peek_offset();
            if self.chars.peek().is_some() {
                return Err(self.err(off, "trailing non-whitespace after top-level value"));
            }
            return Ok(JsonEvent::Eof);
        }

        match self.expect {
            Expect::Colon => {
                let off = self.peek_offset();
                match self.chars.next() {
                    Some((_, ':')) => {
                        self.expect = Expect::Value;
                        self.skip_whitespace();
                        self.read_value()
                    }
                    _ => Err(self.err(off, "expected ':'")),
                }
            }
            Expect::KeyOrClose => {
                let off = self.peek_offset();
                match self.chars.peek().copied() {
                    Some((_, '}')) => {
                        self.chars.next();
                        self.stack.pop();
                        self.expect = Expect::CommaOrClose;
                        Ok(JsonEvent::ObjectEnd)
                    }
                    Some((_, '"')) => {
                        let key = self.read_string_literal()?;
                        self.expect = Expect::Colon;
                        Ok(JsonEvent::ObjectKey(key))
                    }
                    _ => Err(self.err(off, "expected object key or '}'")),
                }
            }
            Expect::CommaOrClose => {
                let off = self.peek_offset();
                match self.stack.last() {
                    Some(Frame::Object) => match self.chars.peek().copied() {
                        Some((_, '}')) => {
                            self.chars.next();
                            self.stack.pop();
                            self.after_container_close();
                            Ok(JsonEvent::ObjectEnd)
                        }
                        Some((_, ',')) => {
                            self.chars.next();
                            self.skip_whitespace();
                            self.expect = Expect::KeyOrClose;
                            self.next_event()
                        }
                        _ => Err(self.err(off, "expected ',' or '}'")),
                    },
                    Some(Frame::Array) => match self.chars.peek().copied() {
                        Some((_, ']')) => {
                            self.chars.next();
                            self.stack.pop();
                            self.after_container_close();
                            Ok(JsonEvent::ArrayEnd)
                        }
                        Some((_, ',')) => {
                            self.chars.next();
                            self.skip_whitespace();
                            self.expect = Expect::Value;
                            self.read_value()
                        }
                        _ => Err(self.err(off, "expected ',' or ']'")),
                    },
                    None => Ok(JsonEvent::Eof),
                }
            }
            Expect::Value | Expect::ValueOrClose => self.read_value(),
        }
    }

    fn after_container_close(&mut self) {
        self.expect = Expect::CommaOrClose;
    }

    fn read_value(&mut self) -> Result<JsonEvent, JsonError> {
        self.skip_whitespace();
        let off = self.peek_offset();
        match self.chars.peek().copied() {
            Some((_, '{')) => {
                self.chars.next();
                self.stack.push(Frame::Object);
                self.skip_whitespace();
                self.expect = Expect::KeyOrClose;
                Ok(JsonEvent::ObjectStart)
            }
            Some((_, '[')) => {
                self.chars.next();
                self.stack.push(Frame::Array);
                self.skip_whitespace();
                self.expect = Expect::ValueOrClose;
                if let Some((_, ']')) = self.chars.peek().copied() {
                    self.chars.next();
                    self.stack.pop();
                    self.after_container_close();
                    return Ok(JsonEvent::ArrayEnd);
                }
                Ok(JsonEvent::ArrayStart)
            }
            Some((_, '"')) => {
                let s = self.read_string_literal()?;
                self.expect = Expect::CommaOrClose;
                Ok(JsonEvent::String(s))
            }
            Some((_, 't')) => {
                self.expect_literal("true", off)?;
                self.expect = Expect::CommaOrClose;
                Ok(JsonEvent::Bool(true))
            }
            Some((_, 'f')) => {
                self.expect_literal("false", off)?;
                self.expect = Expect::CommaOrClose;
                Ok(JsonEvent::Bool(false))
            }
            Some((_, 'n')) => {
                self.expect_literal("null", off)?;
                self.expect = Expect::CommaOrClose;
                Ok(JsonEvent::Null)
            }
            Some((_, c)) if c == '-' || c.is_ascii_digit() => {
                let n = self.read_number()?;
                self.expect = Expect::CommaOrClose;
                Ok(JsonEvent::Number(n))
            }
            _ => Err(self.err(off, "unexpected token while expecting a value")),
        }
    }

    fn expect_literal(&mut self, lit: &str, off: usize) -> Result<(), JsonError> {
        for want in lit.chars() {
            match self.chars.next() {
                Some((_, c)) if c == want => {}
                _ => return Err(self.err(off, "malformed literal")),
            }
        }
        Ok(())
    }

    fn read_number(&mut self) -> Result<JsonNumber, JsonError> {
        let start = self.peek_offset();
        let mut is_float = false;
        if let Some(&(_, '-')) = self.chars.peek() {
            self.chars.next();
        }
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.chars.next();
            } else {
                break;
            }
        }
        if let Some(&(_, '.')) = self.chars.peek() {
            is_float = true;
            self.chars.next();
            while let Some(&(_, c)) = self.chars.peek() {
                if c.is_ascii_digit() {
                    self.chars.next();
                } else {
                    break;
                }
            }
        }
        if let Some(&(_, e)) = self.chars.peek() {
            if e == 'e' || e == 'E' {
                is_float = true;
                self.chars.next();
                if let Some(&(_, sign)) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        self.chars.next();
                    }
                }
                while let Some(&(_, c)) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        self.chars.next();
                    } else {
                        break;
                    }
                }
            }
        }
        let end = self.peek_offset();
        let text = &self.src[start..end];
        if is_float {
            text.parse::<f64>()
                .map(JsonNumber::Float)
                .map_err(|_| self.err(start, "malformed float literal"))
        } else {
            text.parse::<i64>()
                .map(JsonNumber::Int)
                .map_err(|_| self.err(start, "malformed integer literal"))
        }
    }

    /// Decodes the JSON escape set, including `\uXXXX`, to UTF-8 (spec §6
    /// permits either a placeholder or real UTF-8 decode for `\u`; this
    /// decodes real UTF-8, including surrogate pairs).
    fn read_string_literal(&mut self) -> Result<String, JsonError> {
        let off = self.peek_offset();
        match self.chars.next() {
            Some((_, '"')) => {}
            _ => return Err(self.err(off, "expected opening '\"'")),
        }
        let mut out = String::new();
        loop {
            let off = self.peek_offset();
            match self.chars.next() {
                None => return Err(self.err(off, "unterminated string literal")),
                Some((_, '"')) => return Ok(out),
                Some((_, '\\')) => {
                    let esc_off = self.peek_offset();
                    match self.chars.next() {
                        Some((_, '"')) => out.push('"'),
                        Some((_, '\\')) => out.push('\\'),
                        Some((_, '/')) => out.push('/'),
                        Some((_, 'n')) => out.push('\n'),
                        Some((_, 't')) => out.push('\t'),
                        Some((_, 'r')) => out.push('\r'),
                        Some((_, 'b')) => out.push('\u{8}'),
                        Some((_, 'f')) => out.push('\u{c}'),
                        Some((_, 'u')) => {
                            let high = self.read_hex4(esc_off)?;
                            if (0xD800..=0xDBFF).contains(&high) {
                                let off2 = self.peek_offset();
                                if self.chars.next() != Some((off2, '\\')) {
                                    return Err(self.err(off2, "expected low surrogate"));
                                }
                                let off3 = self.peek_offset();
                                if self.chars.next() != Some((off3, 'u')) {
                                    return Err(self.err(off3, "expected low surrogate"));
                                }
                                let low = self.read_hex4(off3)?;
                                let c = 0x10000
                                    + (((high - 0xD800) as u32) << 10)
                                    + (low - 0xDC00) as u32;
                                if let Some(ch) = char::from_u32(c) {
                                    out.push(ch);
                                }
                            } else if let Some(ch) = char::from_u32(high as u32) {
                                out.push(ch);
                            }
                        }
                        _ => return Err(self.err(esc_off, "invalid escape sequence")),
                    }
                }
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn read_hex4(&mut self, off: usize) -> Result<u16, JsonError> {
        let mut v: u16 = 0;
        for _ in 0..4 {
            let d = match self.chars.next() {
                Some((_, c)) => c.to_digit(16).ok_or_else(|| self.err(off, "invalid \\u escape"))?,
                None => return Err(self.err(off, "truncated \\u escape")),
            };
            v = v * 16 + d as u16;
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(src: &str) -> Result<Vec<JsonEvent>, JsonError> {
        let mut p = JsonStreamParser::new(src);
        let mut out = Vec::new();
        loop {
            let ev = p.next_event()?;
            let is_eof = ev == JsonEvent::Eof;
            out.push(ev);
            if is_eof {
                return Ok(out);
            }
        }
    }

    #[test]
    fn parses_flat_object() {
        let events = collect(r#"{"bpm": 120.5, "songMode": true}"#).unwrap();
        assert_eq!(
            events,
            vec![
                JsonEvent::ObjectStart,
                JsonEvent::ObjectKey("bpm".into()),
                JsonEvent::Number(JsonNumber::Float(120.5)),
                JsonEvent::ObjectKey("songMode".into()),
                JsonEvent::Bool(true),
                JsonEvent::ObjectEnd,
                JsonEvent::Eof,
            ]
        );
    }

    #[test]
    fn parses_nested_arrays() {
        let events = collect("[[1,2],[3]]").unwrap();
        assert_eq!(
            events,
            vec![
                JsonEvent::ArrayStart,
                JsonEvent::ArrayStart,
                JsonEvent::Number(JsonNumber::Int(1)),
                JsonEvent::Number(JsonNumber::Int(2)),
                JsonEvent::ArrayEnd,
                JsonEvent::ArrayStart,
                JsonEvent::Number(JsonNumber::Int(3)),
                JsonEvent::ArrayEnd,
                JsonEvent::ArrayEnd,
                JsonEvent::Eof,
            ]
        );
    }

    #[test]
    fn decodes_unicode_escape() {
        let events = collect(r#""café""#).unwrap();
        assert_eq!(events, vec![JsonEvent::String("café".into()), JsonEvent::Eof]);
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut p = JsonStreamParser::new("{} x");
        assert_eq!(p.next_event().unwrap(), JsonEvent::ObjectStart);
        assert_eq!(p.next_event().unwrap(), JsonEvent::ObjectEnd);
        assert!(p.next_event().is_err());
    }

    #[test]
    fn empty_array_and_object() {
        let events = collect("{}").unwrap();
        assert_eq!(events, vec![JsonEvent::ObjectStart, JsonEvent::ObjectEnd, JsonEvent::Eof]);
        let events = collect("[]").unwrap();
        assert_eq!(events, vec![JsonEvent::ArrayStart, JsonEvent::ArrayEnd, JsonEvent::Eof]);
    }
}
