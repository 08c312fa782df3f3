//! Statement-format rule files.
//!
//! ```text
//! ALERT <name> IF <expr> [FOR <duration>] [LABELS {..}] [ANNOTATIONS {..}]
//! <name>[{labels}] = <expr>
//! ```
//!
//! Keywords are case-insensitive and `#` comments run to end of line. The
//! extent of each `<expr>` is found by scanning tokens at nesting depth 0 up
//! to the next clause keyword or the start of the next recording rule; the
//! text in between is handed to the PromQL parser.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::CharIndices;

use super::{
    RuleSyntaxError, check_expr, is_valid_duration, is_valid_label_name, is_valid_metric_name,
};

/// One parsed rule statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Alert(AlertStatement),
    Record(RecordStatement),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertStatement {
    pub name: String,
    pub expr: String,
    pub for_duration: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordStatement {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub expr: String,
    pub line: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Str,
    Number,
    Assign,
    Comma,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Operator,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Keyword {
    Alert,
    If,
    For,
    Labels,
    Annotations,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        [
            ("ALERT", Keyword::Alert),
            ("IF", Keyword::If),
            ("FOR", Keyword::For),
            ("LABELS", Keyword::Labels),
            ("ANNOTATIONS", Keyword::Annotations),
        ]
        .into_iter()
        .find(|(text, _)| ident.eq_ignore_ascii_case(text))
        .map(|(_, keyword)| keyword)
    }
}

/// Byte span of a token in the source
#[derive(Clone, Copy, Debug)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

/// Parse statement-format rules, checking every expression
pub fn parse(src: &str) -> Result<Vec<Statement>, RuleSyntaxError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
    };

    let mut statements = Vec::new();
    while parser.peek().is_some() {
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

fn line_at(src: &str, offset: usize) -> usize {
    src.get(..offset)
        .map_or(0, |prefix| prefix.matches('\n').count())
        + 1
}

fn tokenize(src: &str) -> Result<Vec<Token>, RuleSyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let kind = match c {
            c if c.is_whitespace() => continue,
            '#' => {
                skip_while(&mut chars, |c| c != '\n');
                continue;
            }
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            '=' => match chars.peek() {
                Some(&(_, '=' | '~')) => {
                    chars.next();
                    TokenKind::Operator
                }
                _ => TokenKind::Assign,
            },
            '"' | '\'' | '`' => {
                lex_string(&mut chars, c).ok_or_else(|| {
                    RuleSyntaxError::at(line_at(src, start), "unterminated quoted string")
                })?;
                TokenKind::Str
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
                skip_while(&mut chars, |c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
                TokenKind::Ident
            }
            c if c.is_ascii_digit() || c == '.' => {
                skip_while(&mut chars, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                TokenKind::Number
            }
            _ => TokenKind::Operator,
        };

        let end = chars.peek().map_or(src.len(), |&(i, _)| i);
        tokens.push(Token { kind, start, end });
    }

    Ok(tokens)
}

fn skip_while(chars: &mut Peekable<CharIndices<'_>>, pred: impl Fn(char) -> bool) {
    while chars.next_if(|&(_, c)| pred(c)).is_some() {}
}

/// Consume a quoted string whose opening quote was already read.
/// Returns `None` if the input ends first.
fn lex_string(chars: &mut Peekable<CharIndices<'_>>, quote: char) -> Option<()> {
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' if quote != '`' => {
                chars.next()?;
            }
            c if c == quote => return Some(()),
            _ => {}
        }
    }
    None
}

/// Strip quotes and resolve escapes of a string token
fn unquote(raw: &str) -> String {
    let mut chars = raw.chars();
    let quote = chars.next();
    let inner: String = {
        let mut inner: Vec<char> = chars.collect();
        inner.pop();
        inner.into_iter().collect()
    };
    if quote == Some('`') {
        return inner;
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_at(&self, pos: usize) -> Option<Token> {
        self.tokens.get(pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn text(&self, token: Token) -> &'a str {
        self.src.get(token.start..token.end).unwrap_or_default()
    }

    fn line(&self, token: Token) -> usize {
        line_at(self.src, token.start)
    }

    fn keyword(&self, token: Token) -> Option<Keyword> {
        if token.kind == TokenKind::Ident {
            Keyword::from_ident(self.text(token))
        } else {
            None
        }
    }

    /// Error located at the current token, or at end of input
    fn error(&self, message: impl Into<String>) -> RuleSyntaxError {
        let line = match self.peek() {
            Some(token) => self.line(token),
            None => line_at(self.src, self.src.len()),
        };
        RuleSyntaxError::at(line, message)
    }

    fn describe(&self, token: Option<Token>) -> String {
        match token {
            Some(token) => format!("{:?}", self.text(token)),
            None => "end of input".to_string(),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, RuleSyntaxError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            other => Err(self.error(format!(
                "expected {}, found {}",
                what,
                self.describe(other)
            ))),
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        match self.peek() {
            Some(token) if self.keyword(token) == Some(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn statement(&mut self) -> Result<Statement, RuleSyntaxError> {
        let Some(first) = self.peek() else {
            return Err(self.error("expected rule statement"));
        };

        match self.keyword(first) {
            Some(Keyword::Alert) => {
                self.pos += 1;
                self.alert(first).map(Statement::Alert)
            }
            None if first.kind == TokenKind::Ident => self.record().map(Statement::Record),
            _ => Err(self.error(format!(
                "expected ALERT or recording rule, found {}",
                self.describe(Some(first))
            ))),
        }
    }

    fn alert(&mut self, alert: Token) -> Result<AlertStatement, RuleSyntaxError> {
        let name_token = self.expect(TokenKind::Ident, "alert name")?;
        let name = self.text(name_token);
        if self.keyword(name_token).is_some() || !is_valid_metric_name(name) {
            return Err(RuleSyntaxError::at(
                self.line(name_token),
                format!("invalid alert name {:?}", name),
            ));
        }

        if !self.eat_keyword(Keyword::If) {
            return Err(self.error(format!(
                "expected IF after alert name {}, found {}",
                name,
                self.describe(self.peek())
            )));
        }

        let expr = self.expression()?;

        let for_duration = if self.eat_keyword(Keyword::For) {
            let token = self.expect(TokenKind::Number, "duration after FOR")?;
            let duration = self.text(token);
            if !is_valid_duration(duration) {
                return Err(RuleSyntaxError::at(
                    self.line(token),
                    format!("invalid duration {:?}", duration),
                ));
            }
            Some(duration.to_string())
        } else {
            None
        };

        let labels = if self.eat_keyword(Keyword::Labels) {
            self.label_set()?
        } else {
            BTreeMap::new()
        };

        let annotations = if self.eat_keyword(Keyword::Annotations) {
            self.label_set()?
        } else {
            BTreeMap::new()
        };

        Ok(AlertStatement {
            name: name.to_string(),
            expr,
            for_duration,
            labels,
            annotations,
            line: self.line(alert),
        })
    }

    fn record(&mut self) -> Result<RecordStatement, RuleSyntaxError> {
        let name_token = self.expect(TokenKind::Ident, "recording rule name")?;
        let name = self.text(name_token);
        if !is_valid_metric_name(name) {
            return Err(RuleSyntaxError::at(
                self.line(name_token),
                format!("invalid recording rule name {:?}", name),
            ));
        }

        let labels = match self.peek() {
            Some(token) if token.kind == TokenKind::LeftBrace => self.label_set()?,
            _ => BTreeMap::new(),
        };

        self.expect(TokenKind::Assign, "'=' after recording rule name")?;
        let expr = self.expression()?;

        Ok(RecordStatement {
            name: name.to_string(),
            labels,
            expr,
            line: self.line(name_token),
        })
    }

    /// Consume tokens up to the end of the current expression and check it
    fn expression(&mut self) -> Result<String, RuleSyntaxError> {
        let start = self.pos;
        let mut depth: usize = 0;

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::LeftBrace | TokenKind::LeftParen | TokenKind::LeftBracket => depth += 1,
                TokenKind::RightBrace | TokenKind::RightParen | TokenKind::RightBracket => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        self.error(format!("unexpected {}", self.describe(Some(token))))
                    })?;
                }
                TokenKind::Ident
                    if depth == 0
                        && (self.keyword(token).is_some() || self.starts_record(self.pos)) =>
                {
                    break;
                }
                _ => {}
            }
            self.pos += 1;
        }

        let (Some(first), Some(last)) = (
            self.peek_at(start).filter(|_| self.pos > start),
            self.pos.checked_sub(1).and_then(|i| self.peek_at(i)),
        ) else {
            return Err(self.error(format!(
                "expected expression, found {}",
                self.describe(self.peek())
            )));
        };

        let expr = self
            .src
            .get(first.start..last.end)
            .unwrap_or_default()
            .trim();
        check_expr(expr).map_err(|e| RuleSyntaxError::at(self.line(first), e))?;
        Ok(expr.to_string())
    }

    /// Whether `pos` begins `<name> [{...}] =`
    fn starts_record(&self, pos: usize) -> bool {
        let mut next = pos + 1;
        if self
            .peek_at(next)
            .is_some_and(|t| t.kind == TokenKind::LeftBrace)
        {
            while let Some(token) = self.peek_at(next) {
                next += 1;
                if token.kind == TokenKind::RightBrace {
                    break;
                }
            }
        }
        self.peek_at(next)
            .is_some_and(|t| t.kind == TokenKind::Assign)
    }

    /// `{ name = "value", ... }` with an optional trailing comma
    fn label_set(&mut self) -> Result<BTreeMap<String, String>, RuleSyntaxError> {
        self.expect(TokenKind::LeftBrace, "'{'")?;
        let mut labels = BTreeMap::new();

        loop {
            if let Some(token) = self.peek()
                && token.kind == TokenKind::RightBrace
            {
                self.pos += 1;
                return Ok(labels);
            }

            let name_token = self.expect(TokenKind::Ident, "label name")?;
            let name = self.text(name_token);
            if !is_valid_label_name(name) {
                return Err(RuleSyntaxError::at(
                    self.line(name_token),
                    format!("invalid label name {:?}", name),
                ));
            }

            self.expect(TokenKind::Assign, "'=' after label name")?;
            let value_token = self.expect(TokenKind::Str, "quoted label value")?;
            let value = unquote(self.text(value_token));

            if labels.insert(name.to_string(), value).is_some() {
                return Err(RuleSyntaxError::at(
                    self.line(name_token),
                    format!("duplicate label {:?}", name),
                ));
            }

            match self.advance() {
                Some(token) if token.kind == TokenKind::Comma => {}
                Some(token) if token.kind == TokenKind::RightBrace => return Ok(labels),
                other => {
                    return Err(self.error(format!(
                        "expected ',' or '}}' in label set, found {}",
                        self.describe(other)
                    )));
                }
            }
        }
    }
}
