//! Tokenizer (spec §4.4). Whitespace/comment skipping, numeric and string
//! literal scanning, and the regex-vs-division disambiguation: the lexer
//! itself cannot tell `/` apart from the start of a regex literal without
//! knowing the grammatical context, so the parser calls
//! [`Lexer::next_token`] with an explicit `regex_allowed` flag every time
//! (grounded in the source's own "ctx->ungot ? ... : SEE_input_gettoken"
//! reentrant-lexer-call design in `libsee/lex.c`, where the parser, not the
//! lexer, decides the disambiguation before asking for the next token).

use crate::{
    exception::{RunError, RunResult},
    input::Input,
    intern::{Atom, Interner},
    loc::CodeLoc,
    token::{Keyword, Punct, Token, TokenKind},
};

pub struct Lexer<'a> {
    input: Input,
    interner: &'a mut Interner,
    sgml_comment: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: Input, interner: &'a mut Interner, sgml_comment: bool) -> Self {
        Self { input, interner, sgml_comment }
    }

    pub fn filename(&self) -> std::rc::Rc<str> {
        self.input.filename.clone()
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.input.filename.clone(), self.input.line)
    }

    fn syntax_error(&self, msg: impl Into<String>) -> RunError {
        RunError::throw(crate::value::Value::String(format!("{}: {}", self.loc(), msg.into()).into()))
    }

    /// Skips whitespace and comments, returning whether a line terminator
    /// was seen (ed.3 §7.4, needed for ASI).
    fn skip_trivia(&mut self) -> RunResult<bool> {
        let mut saw_newline = false;
        loop {
            match self.input.peek() {
                Some(c) if is_whitespace(c) => {
                    self.input.next();
                }
                Some(c) if is_line_terminator(c) => {
                    saw_newline = true;
                    self.input.next();
                }
                Some('/') if self.input.peek2() == Some('/') => {
                    self.input.next();
                    self.input.next();
                    while let Some(c) = self.input.peek() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.input.next();
                    }
                }
                Some('/') if self.input.peek2() == Some('*') => {
                    self.input.next();
                    self.input.next();
                    let mut closed = false;
                    while let Some(c) = self.input.next() {
                        if is_line_terminator(c) {
                            saw_newline = true;
                        }
                        if c == '*' && self.input.peek() == Some('/') {
                            self.input.next();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(self.syntax_error("unterminated comment"));
                    }
                }
                Some('<') if self.sgml_comment && self.starts_with("<!--") => {
                    for _ in 0..4 {
                        self.input.next();
                    }
                    while let Some(c) = self.input.peek() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.input.next();
                    }
                }
                _ => break,
            }
        }
        Ok(saw_newline)
    }

    fn starts_with(&self, s: &str) -> bool {
        // Only used for the 4-character "<!--" marker; a tiny two-codepoint
        // lookahead check suffices since `Input` only exposes peek/peek2.
        let mut chars = s.chars();
        let first = chars.next();
        let second = chars.next();
        self.input.peek() == first && self.input.peek2() == second
    }

    /// Scans the next token. `regex_allowed` is the parser's judgment of
    /// whether a leading `/` here could start a `RegExp` literal (true in
    /// any expression-starting position) or must be division/`/=`.
    pub fn next_token(&mut self, regex_allowed: bool) -> RunResult<Token> {
        let newline_before = self.skip_trivia()?;
        let loc = self.loc();
        let Some(c) = self.input.peek() else {
            return Ok(Token { kind: TokenKind::Eof, loc, newline_before });
        };

        let kind = if c.is_ascii_digit() || (c == '.' && self.input.peek2().is_some_and(|d| d.is_ascii_digit())) {
            self.scan_number()?
        } else if c == '"' || c == '\'' {
            self.scan_string(c)?
        } else if c == '/' && regex_allowed {
            self.scan_regex()?
        } else if is_ident_start(c) {
            self.scan_ident()
        } else {
            self.scan_punct()?
        };
        Ok(Token { kind, loc, newline_before })
    }

    fn scan_ident(&mut self) -> TokenKind {
        let mut s = String::new();
        while let Some(c) = self.input.peek() {
            if is_ident_part(c) {
                s.push(c);
                self.input.next();
            } else {
                break;
            }
        }
        if let Some(kw) = Keyword::lookup(&s) {
            TokenKind::Keyword(kw)
        } else {
            TokenKind::Ident(self.interner.intern(&s))
        }
    }

    fn scan_number(&mut self) -> RunResult<TokenKind> {
        let mut s = String::new();
        if self.input.peek() == Some('0') {
            let c0 = self.input.next().unwrap();
            s.push(c0);
            match self.input.peek() {
                Some('x' | 'X') => {
                    s.push(self.input.next().unwrap());
                    let mut digits = String::new();
                    while let Some(c) = self.input.peek() {
                        if c.is_ascii_hexdigit() {
                            digits.push(c);
                            self.input.next();
                        } else {
                            break;
                        }
                    }
                    if digits.is_empty() {
                        return Err(self.syntax_error("missing hex digits after 0x"));
                    }
                    let value = u64::from_str_radix(&digits, 16).map_or(f64::INFINITY, |v| v as f64);
                    return Ok(TokenKind::Number(value));
                }
                Some(d) if d.is_ascii_digit() => {
                    // Annex B legacy octal literal (spec §6 `ECMA_262_3B`).
                    let mut digits = String::new();
                    while let Some(c) = self.input.peek() {
                        if c.is_ascii_digit() {
                            digits.push(c);
                            self.input.next();
                        } else {
                            break;
                        }
                    }
                    if digits.chars().all(|c| ('0'..='7').contains(&c)) {
                        let value = u64::from_str_radix(&digits, 8).unwrap_or(0) as f64;
                        return Ok(TokenKind::Number(value));
                    }
                    s.push_str(&digits);
                }
                _ => {}
            }
        } else {
            while let Some(c) = self.input.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.input.next();
                } else {
                    break;
                }
            }
        }
        if self.input.peek() == Some('.') {
            s.push(self.input.next().unwrap());
            while let Some(c) = self.input.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.input.next();
                } else {
                    break;
                }
            }
        }
        if matches!(self.input.peek(), Some('e' | 'E')) {
            s.push(self.input.next().unwrap());
            if matches!(self.input.peek(), Some('+' | '-')) {
                s.push(self.input.next().unwrap());
            }
            let mut any = false;
            while let Some(c) = self.input.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.input.next();
                    any = true;
                } else {
                    break;
                }
            }
            if !any {
                return Err(self.syntax_error("missing exponent digits"));
            }
        }
        if let Some(c) = self.input.peek() {
            if is_ident_start(c) {
                return Err(self.syntax_error("identifier starts immediately after numeric literal"));
            }
        }
        s.parse::<f64>().map(TokenKind::Number).map_err(|_| self.syntax_error("invalid number literal"))
    }

    fn scan_string(&mut self, quote: char) -> RunResult<TokenKind> {
        self.input.next();
        let mut s = String::new();
        loop {
            match self.input.next() {
                None => return Err(self.syntax_error("unterminated string literal")),
                Some(c) if c == quote => break,
                Some(c) if is_line_terminator(c) => return Err(self.syntax_error("unterminated string literal")),
                Some('\\') => {
                    if let Some(c) = self.scan_escape()? {
                        s.push(c);
                    }
                }
                Some(c) => s.push(c),
            }
        }
        Ok(TokenKind::String(self.interner.intern(&s)))
    }

    /// Scans one escape sequence after the backslash has been consumed.
    /// `LineContinuation` (a backslash immediately followed by a line
    /// terminator, ed.3 §7.8.4) contributes no character at all.
    fn scan_escape(&mut self) -> RunResult<Option<char>> {
        match self.input.next() {
            None => Err(self.syntax_error("unterminated escape sequence")),
            Some('n') => Ok(Some('\n')),
            Some('t') => Ok(Some('\t')),
            Some('r') => Ok(Some('\r')),
            Some('b') => Ok(Some('\u{8}')),
            Some('f') => Ok(Some('\u{c}')),
            Some('v') => Ok(Some('\u{b}')),
            Some('0') => Ok(Some('\0')),
            Some('x') => self.scan_hex_escape(2).map(Some),
            Some('u') => self.scan_hex_escape(4).map(Some),
            Some(c) if is_line_terminator(c) => Ok(None),
            Some(c) => Ok(Some(c)),
        }
    }

    fn scan_hex_escape(&mut self, digits: usize) -> RunResult<char> {
        let mut value = 0u32;
        for _ in 0..digits {
            let Some(c) = self.input.next() else {
                return Err(self.syntax_error("truncated unicode/hex escape"));
            };
            let d = c.to_digit(16).ok_or_else(|| self.syntax_error("invalid hex digit in escape"))?;
            value = value * 16 + d;
        }
        char::from_u32(value).ok_or_else(|| self.syntax_error("escape does not name a valid code point"))
    }

    fn scan_regex(&mut self) -> RunResult<TokenKind> {
        self.input.next(); // leading '/'
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.input.next() {
                None => return Err(self.syntax_error("unterminated regular expression literal")),
                Some(c) if is_line_terminator(c) => return Err(self.syntax_error("unterminated regular expression literal")),
                Some('\\') => {
                    pattern.push('\\');
                    match self.input.next() {
                        Some(c) => pattern.push(c),
                        None => return Err(self.syntax_error("unterminated regular expression literal")),
                    }
                }
                Some('[') => {
                    in_class = true;
                    pattern.push('[');
                }
                Some(']') => {
                    in_class = false;
                    pattern.push(']');
                }
                Some('/') if !in_class => break,
                Some(c) => pattern.push(c),
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.input.peek() {
            if is_ident_part(c) {
                flags.push(c);
                self.input.next();
            } else {
                break;
            }
        }
        Ok(TokenKind::Regex {
            pattern: self.interner.intern(&pattern),
            flags: self.interner.intern(&flags),
        })
    }

    fn scan_punct(&mut self) -> RunResult<TokenKind> {
        macro_rules! two {
            ($second:expr, $then:expr, $else_:expr) => {{
                self.input.next();
                if self.input.peek() == Some($second) {
                    self.input.next();
                    $then
                } else {
                    $else_
                }
            }};
        }
        let c = self.input.peek().unwrap();
        let p = match c {
            '{' => {
                self.input.next();
                Punct::LBrace
            }
            '}' => {
                self.input.next();
                Punct::RBrace
            }
            '(' => {
                self.input.next();
                Punct::LParen
            }
            ')' => {
                self.input.next();
                Punct::RParen
            }
            '[' => {
                self.input.next();
                Punct::LBracket
            }
            ']' => {
                self.input.next();
                Punct::RBracket
            }
            '.' => {
                self.input.next();
                Punct::Dot
            }
            ';' => {
                self.input.next();
                Punct::Semi
            }
            ',' => {
                self.input.next();
                Punct::Comma
            }
            '~' => {
                self.input.next();
                Punct::Tilde
            }
            '?' => {
                self.input.next();
                Punct::Question
            }
            ':' => {
                self.input.next();
                Punct::Colon
            }
            '<' => {
                self.input.next();
                match self.input.peek() {
                    Some('<') => two!('=', Punct::ShlAssign, Punct::Shl),
                    Some('=') => {
                        self.input.next();
                        Punct::Le
                    }
                    _ => Punct::Lt,
                }
            }
            '>' => {
                self.input.next();
                match self.input.peek() {
                    Some('>') => {
                        self.input.next();
                        match self.input.peek() {
                            Some('>') => two!('=', Punct::UshrAssign, Punct::Ushr),
                            Some('=') => {
                                self.input.next();
                                Punct::ShrAssign
                            }
                            _ => Punct::Shr,
                        }
                    }
                    Some('=') => {
                        self.input.next();
                        Punct::Ge
                    }
                    _ => Punct::Gt,
                }
            }
            '=' => {
                self.input.next();
                match self.input.peek() {
                    Some('=') => two!('=', Punct::StrictEq, Punct::Eq),
                    _ => Punct::Assign,
                }
            }
            '!' => {
                self.input.next();
                match self.input.peek() {
                    Some('=') => two!('=', Punct::StrictNe, Punct::Ne),
                    _ => Punct::Not,
                }
            }
            '+' => {
                self.input.next();
                match self.input.peek() {
                    Some('+') => {
                        self.input.next();
                        Punct::PlusPlus
                    }
                    Some('=') => {
                        self.input.next();
                        Punct::PlusAssign
                    }
                    _ => Punct::Plus,
                }
            }
            '-' => {
                self.input.next();
                match self.input.peek() {
                    Some('-') => {
                        self.input.next();
                        Punct::MinusMinus
                    }
                    Some('=') => {
                        self.input.next();
                        Punct::MinusAssign
                    }
                    _ => Punct::Minus,
                }
            }
            '*' => {
                self.input.next();
                if self.input.peek() == Some('=') {
                    self.input.next();
                    Punct::StarAssign
                } else {
                    Punct::Star
                }
            }
            '%' => {
                self.input.next();
                if self.input.peek() == Some('=') {
                    self.input.next();
                    Punct::PercentAssign
                } else {
                    Punct::Percent
                }
            }
            '/' => {
                self.input.next();
                if self.input.peek() == Some('=') {
                    self.input.next();
                    Punct::SlashAssign
                } else {
                    Punct::Slash
                }
            }
            '&' => {
                self.input.next();
                match self.input.peek() {
                    Some('&') => {
                        self.input.next();
                        Punct::AndAnd
                    }
                    Some('=') => {
                        self.input.next();
                        Punct::AndAssign
                    }
                    _ => Punct::Amp,
                }
            }
            '|' => {
                self.input.next();
                match self.input.peek() {
                    Some('|') => {
                        self.input.next();
                        Punct::OrOr
                    }
                    Some('=') => {
                        self.input.next();
                        Punct::OrAssign
                    }
                    _ => Punct::Pipe,
                }
            }
            '^' => {
                self.input.next();
                if self.input.peek() == Some('=') {
                    self.input.next();
                    Punct::XorAssign
                } else {
                    Punct::Caret
                }
            }
            other => return Err(self.syntax_error(format!("unexpected character '{other}'"))),
        };
        Ok(TokenKind::Punct(p))
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{b}' | '\u{c}' | '\u{a0}' | '\u{feff}') || (c.is_whitespace() && !is_line_terminator(c))
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_ident_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

pub fn is_reserved(s: &str) -> bool {
    Keyword::lookup(s).is_some()
}

/// `Atom`-level equality check the parser uses for things like
/// `"use strict"` directive prologue detection -- unused by this engine
/// (no strict mode, Non-goals) but kept as a small helper other token
/// inspection sites reach for.
pub fn ident_eq(a: &Atom, s: &str) -> bool {
    a.as_str() == s
}
