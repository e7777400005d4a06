//! Formula tokenizer
//!
//! Splits a formula string into [`Token`]s. Positions and lengths are counted in
//! characters, not bytes. The stream always ends with a single
//! [`TokenKind::EndOfInput`] token.

use crate::ast::LogicalOperator;
use crate::error::{FormulaError, FormulaResult};

/// Simple (non-comparison) operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Plus),
            '-' => Some(Operator::Minus),
            '*' => Some(Operator::Star),
            '/' => Some(Operator::Slash),
            '^' => Some(Operator::Caret),
            _ => None,
        }
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    /// Identifier not followed by `(`
    Variable(String),
    /// Identifier followed by `(`
    Function(String),
    Operator(Operator),
    LogicalOperator(LogicalOperator),
    LeftParen,
    RightParen,
    Comma,
    EndOfInput,
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The exact source text of the token
    pub raw: String,
    /// Character offset of the first character
    pub position: usize,
    /// Length in characters
    pub length: usize,
}

impl Token {
    /// Can a `-` right after this token start a negative number literal
    fn allows_signed_number(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Operator(_)
                | TokenKind::LogicalOperator(_)
                | TokenKind::Comma
                | TokenKind::LeftParen
        )
    }
}

/// Tokenize a formula
///
/// # Example
/// ```rust
/// use formulo::tokenizer::{tokenize, TokenKind};
///
/// let tokens = tokenize("4*-5").unwrap();
/// assert_eq!(tokens[2].kind, TokenKind::Number(-5.0));
/// ```
pub fn tokenize(input: &str) -> FormulaResult<Vec<Token>> {
    let tokens = Tokenizer::new(input).run()?;
    tracing::trace!(count = tokens.len(), "tokenized formula");
    Ok(tokens)
}

struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
}

impl Tokenizer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> FormulaResult<Vec<Token>> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek_char() else {
                break;
            };
            let start = self.pos;

            let kind = if c == '"' || c == '\'' {
                self.scan_string(c)?
            } else if let Some(op) = self.scan_logical_operator()? {
                TokenKind::LogicalOperator(op)
            } else if self.at_number_start(c) {
                self.scan_number()?
            } else if let Some(op) = Operator::from_char(c) {
                self.advance();
                TokenKind::Operator(op)
            } else if c == '(' {
                self.advance();
                TokenKind::LeftParen
            } else if c == ')' {
                self.advance();
                TokenKind::RightParen
            } else if c == ',' {
                self.advance();
                TokenKind::Comma
            } else if c == '[' {
                let name = self.scan_bracketed_identifier()?;
                self.classify_identifier(name)
            } else if c.is_ascii_alphabetic() || c == '_' {
                let name = self.scan_bare_identifier();
                self.classify_identifier(name)
            } else {
                return Err(FormulaError::UnexpectedCharacter {
                    character: c,
                    position: start,
                });
            };

            self.push(kind, start);
        }

        self.tokens.push(Token {
            kind: TokenKind::EndOfInput,
            raw: String::new(),
            position: self.chars.len(),
            length: 0,
        });
        Ok(self.tokens)
    }

    // === Scanners ===

    fn scan_string(&mut self, quote: char) -> FormulaResult<TokenKind> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => return Err(FormulaError::UnterminatedString { position: start }),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(TokenKind::String(s));
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        None => return Err(FormulaError::UnterminatedString { position: start }),
                        Some(escaped @ ('"' | '\'' | '\\')) => s.push(escaped),
                        Some(other) => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                    self.advance();
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    /// Two-character operators are checked before one-character ones
    fn scan_logical_operator(&mut self) -> FormulaResult<Option<LogicalOperator>> {
        let start = self.pos;
        let (op, width) = match (self.peek_char(), self.peek_char_at(1)) {
            (Some('<'), Some('=')) => (LogicalOperator::LessEqual, 2),
            (Some('>'), Some('=')) => (LogicalOperator::GreaterEqual, 2),
            (Some('!'), Some('=')) => (LogicalOperator::NotEqual, 2),
            (Some('!'), _) => return Err(FormulaError::InvalidOperator { position: start }),
            (Some('<'), _) => (LogicalOperator::Less, 1),
            (Some('>'), _) => (LogicalOperator::Greater, 1),
            (Some('='), _) => (LogicalOperator::Equal, 1),
            _ => return Ok(None),
        };
        self.pos += width;
        Ok(Some(op))
    }

    /// A digit, or a `-` directly followed by a digit where an operand is expected
    fn at_number_start(&self, c: char) -> bool {
        if c.is_ascii_digit() {
            return true;
        }
        c == '-'
            && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())
            && self.tokens.last().map_or(true, Token::allows_signed_number)
    }

    fn scan_number(&mut self) -> FormulaResult<TokenKind> {
        let start = self.pos;

        if self.peek_char() == Some('-') {
            self.advance();
        }

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.')
            && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())
        {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = self.text_from(start);
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| FormulaError::InvalidNumber {
                text,
                position: start,
            })
    }

    fn scan_bracketed_identifier(&mut self) -> FormulaResult<String> {
        let start = self.pos;
        self.advance(); // Skip '['

        let mut name = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(FormulaError::InvalidIdentifier {
                        position: start,
                        reason: "missing closing ']'".into(),
                    })
                }
                Some(']') => {
                    self.advance();
                    break;
                }
                Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                    name.push(c);
                    self.advance();
                }
                Some(c) => {
                    return Err(FormulaError::InvalidIdentifier {
                        position: self.pos,
                        reason: format!("character '{}' is not allowed in a name", c),
                    })
                }
            }
        }

        if name.is_empty() {
            return Err(FormulaError::InvalidIdentifier {
                position: start,
                reason: "empty name".into(),
            });
        }
        Ok(name)
    }

    fn scan_bare_identifier(&mut self) -> String {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }
        self.text_from(start)
    }

    /// An identifier followed by `(` (whitespace allowed in between) is a function
    fn classify_identifier(&self, name: String) -> TokenKind {
        let next = self.chars[self.pos..]
            .iter()
            .find(|c| !c.is_whitespace())
            .copied();
        if next == Some('(') {
            TokenKind::Function(name)
        } else {
            TokenKind::Variable(name)
        }
    }

    // === Helper methods ===

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            raw: self.text_from(start),
            position: start,
            length: self.pos - start,
        });
    }

    fn text_from(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if self.pos < self.chars.len() {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_minus() {
        assert_eq!(
            kinds("4-5"),
            vec![
                TokenKind::Number(4.0),
                TokenKind::Operator(Operator::Minus),
                TokenKind::Number(5.0),
                TokenKind::EndOfInput,
            ]
        );
        assert_eq!(
            kinds("4*-5"),
            vec![
                TokenKind::Number(4.0),
                TokenKind::Operator(Operator::Star),
                TokenKind::Number(-5.0),
                TokenKind::EndOfInput,
            ]
        );
        assert_eq!(kinds("-2")[0], TokenKind::Number(-2.0));
        assert_eq!(kinds("(-2)")[1], TokenKind::Number(-2.0));
        assert_eq!(kinds("f(1,-2)")[4], TokenKind::Number(-2.0));
        assert_eq!(kinds("x>-2")[2], TokenKind::Number(-2.0));

        // Not followed by a digit: stays an operator
        assert_eq!(kinds("-x")[0], TokenKind::Operator(Operator::Minus));
        // After an operand: subtraction
        assert_eq!(kinds("x -2")[1], TokenKind::Operator(Operator::Minus));
        assert_eq!(kinds(")-2")[1], TokenKind::Operator(Operator::Minus));
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(kinds("3.14")[0], TokenKind::Number(3.14));
        assert_eq!(kinds("42")[0], TokenKind::Number(42.0));

        // A dot without digits after it does not belong to the number
        let err = tokenize("1.").unwrap_err();
        assert!(matches!(
            err,
            FormulaError::UnexpectedCharacter {
                character: '.',
                position: 1
            }
        ));
    }

    #[test]
    fn test_tokenize_strings() {
        assert_eq!(kinds("\"foo\"")[0], TokenKind::String("foo".into()));
        assert_eq!(kinds("'foo'")[0], TokenKind::String("foo".into()));
        assert_eq!(
            kinds(r#""a \"b\" \\ c""#)[0],
            TokenKind::String(r#"a "b" \ c"#.into())
        );
        assert_eq!(kinds(r#"'it\'s'"#)[0], TokenKind::String("it's".into()));
        assert_eq!(kinds(r#""it's""#)[0], TokenKind::String("it's".into()));

        let err = tokenize("\"open").unwrap_err();
        assert!(matches!(err, FormulaError::UnterminatedString { position: 0 }));
    }

    #[test]
    fn test_tokenize_logical_operators() {
        assert_eq!(
            kinds("a<=b>=c!=d<e>f=g")
                .into_iter()
                .filter_map(|k| match k {
                    TokenKind::LogicalOperator(op) => Some(op),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            vec![
                LogicalOperator::LessEqual,
                LogicalOperator::GreaterEqual,
                LogicalOperator::NotEqual,
                LogicalOperator::Less,
                LogicalOperator::Greater,
                LogicalOperator::Equal,
            ]
        );

        let err = tokenize("a ! b").unwrap_err();
        assert!(matches!(err, FormulaError::InvalidOperator { position: 2 }));
        assert!(err.to_string().contains("did you mean '!='"));
    }

    #[test]
    fn test_tokenize_identifiers() {
        assert_eq!(
            kinds("sin (x) + a.b.c + [var1] + [my.var](2)"),
            vec![
                TokenKind::Function("sin".into()),
                TokenKind::LeftParen,
                TokenKind::Variable("x".into()),
                TokenKind::RightParen,
                TokenKind::Operator(Operator::Plus),
                TokenKind::Variable("a.b.c".into()),
                TokenKind::Operator(Operator::Plus),
                TokenKind::Variable("var1".into()),
                TokenKind::Operator(Operator::Plus),
                TokenKind::Function("my.var".into()),
                TokenKind::LeftParen,
                TokenKind::Number(2.0),
                TokenKind::RightParen,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_tokenize_bad_brackets() {
        let err = tokenize("[]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lexical);
        assert!(err.to_string().contains("empty name"));

        let err = tokenize("1 + [abc").unwrap_err();
        assert!(matches!(err, FormulaError::InvalidIdentifier { position: 4, .. }));

        let err = tokenize("[a b]").unwrap_err();
        assert!(matches!(err, FormulaError::InvalidIdentifier { position: 2, .. }));
    }

    #[test]
    fn test_tokenize_unexpected_character() {
        let err = tokenize("1 + @").unwrap_err();
        assert!(matches!(
            err,
            FormulaError::UnexpectedCharacter {
                character: '@',
                position: 4
            }
        ));
        assert!(tokenize("#").is_err());
    }

    #[test]
    fn test_token_positions() {
        let tokens = tokenize("  12.5 *  foo").unwrap();
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[0].length, 4);
        assert_eq!(tokens[0].raw, "12.5");
        assert_eq!(tokens[1].position, 7);
        assert_eq!(tokens[2].position, 10);
        assert_eq!(tokens[2].length, 3);

        let eof = tokens.last().unwrap();
        assert_eq!(eof.kind, TokenKind::EndOfInput);
        assert_eq!(eof.position, 13);
        assert_eq!(eof.length, 0);

        // Characters, not bytes
        let tokens = tokenize("\"é\" + x").unwrap();
        assert_eq!(tokens[2].position, 6);
    }
}
