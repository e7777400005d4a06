//! Formula parser
//!
//! A precedence-climbing (Pratt) parser over the token stream produced by
//! [`tokenize`].

use crate::ast::{
    ArithmeticOperator, BinaryOperator, Expression, FunctionCall, NamePath,
};
use crate::error::{FormulaError, FormulaResult};
use crate::tokenizer::{tokenize, Operator, Token, TokenKind};

/// The result of parsing a formula
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFormula {
    /// Root of the expression tree
    pub expression: Expression,
    /// Free variable names in first-occurrence order, without duplicates
    pub variables: Vec<String>,
}

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use formulo::parse_formula;
///
/// let parsed = parse_formula("x * sin(PI * y)").unwrap();
/// assert_eq!(parsed.variables, vec!["x", "PI", "y"]);
/// assert_eq!(parsed.expression.to_string(), "x * sin(PI * y)");
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<ParsedFormula> {
    let tokens = tokenize(formula)?;
    parse_tokens(&tokens)
}

/// Parse a complete token stream (ending in [`TokenKind::EndOfInput`])
pub fn parse_tokens(tokens: &[Token]) -> FormulaResult<ParsedFormula> {
    let mut parser = FormulaParser::new(tokens)?;
    let expression = parser.parse_expression(0)?;

    // Make sure we consumed all input
    let token = parser.current();
    if token.kind != TokenKind::EndOfInput {
        return Err(unexpected(token));
    }

    Ok(ParsedFormula {
        expression,
        variables: parser.variables,
    })
}

/// Formula parser
struct FormulaParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    variables: Vec<String>,
}

impl<'a> FormulaParser<'a> {
    fn new(tokens: &'a [Token]) -> FormulaResult<Self> {
        match tokens.last() {
            Some(token) if token.kind == TokenKind::EndOfInput => Ok(Self {
                tokens,
                pos: 0,
                variables: Vec::new(),
            }),
            _ => Err(FormulaError::UnexpectedEndOfInput {
                position: tokens.last().map_or(0, |t| t.position + t.length),
            }),
        }
    }

    // === Token access ===

    fn current(&self) -> &'a Token {
        // The stream ends with EndOfInput, which is never consumed
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn consume(&mut self) -> &'a Token {
        let token = self.current();
        if token.kind != TokenKind::EndOfInput {
            self.pos += 1;
        }
        token
    }

    fn peek_binary_operator(&self) -> Option<BinaryOperator> {
        match &self.current().kind {
            TokenKind::Operator(Operator::Plus) => {
                Some(BinaryOperator::Arithmetic(ArithmeticOperator::Add))
            }
            TokenKind::Operator(Operator::Minus) => {
                Some(BinaryOperator::Arithmetic(ArithmeticOperator::Subtract))
            }
            TokenKind::Operator(Operator::Star) => {
                Some(BinaryOperator::Arithmetic(ArithmeticOperator::Multiply))
            }
            TokenKind::Operator(Operator::Slash) => {
                Some(BinaryOperator::Arithmetic(ArithmeticOperator::Divide))
            }
            TokenKind::Operator(Operator::Caret) => Some(BinaryOperator::Power),
            TokenKind::LogicalOperator(op) => Some(BinaryOperator::Logical(*op)),
            _ => None,
        }
    }

    fn register_variable(&mut self, name: &str) {
        if !self.variables.iter().any(|v| v == name) {
            self.variables.push(name.to_string());
        }
    }

    // === Expression parsing with precedence ===

    fn parse_expression(&mut self, min_precedence: u8) -> FormulaResult<Expression> {
        let mut left = self.parse_primary()?;

        while let Some(op) = self.peek_binary_operator() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.consume();

            // Right associative operators recurse at their own level
            let next_min = if op.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let right = self.parse_expression(next_min)?;
            left = Expression::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> FormulaResult<Expression> {
        let token = self.consume();
        match &token.kind {
            // Unary minus binds to the next primary only: `-x^2` is `(-1 * x)^2`
            TokenKind::Operator(Operator::Minus) => {
                let operand = self.parse_primary()?;
                Ok(Expression::binary(
                    BinaryOperator::Arithmetic(ArithmeticOperator::Multiply),
                    Expression::number(-1.0),
                    operand,
                ))
            }

            // Prefix plus (no-op)
            TokenKind::Operator(Operator::Plus) => self.parse_primary(),

            TokenKind::Number(n) => Ok(Expression::number(*n)),

            TokenKind::String(s) => Ok(Expression::string(s.clone())),

            TokenKind::LeftParen => {
                let inner = self.parse_expression(0)?;
                let closing = self.consume();
                if closing.kind != TokenKind::RightParen {
                    return Err(FormulaError::UnclosedParenthesis {
                        position: closing.position,
                        open_position: token.position,
                    });
                }
                Ok(Expression::bracket(inner))
            }

            TokenKind::Function(name) => self.parse_function_call(name),

            TokenKind::Variable(name) => {
                self.register_variable(name);
                Ok(Expression::Variable(NamePath::parse(name)))
            }

            _ => Err(unexpected(token)),
        }
    }

    fn parse_function_call(&mut self, name: &str) -> FormulaResult<Expression> {
        let open = self.consume();
        if open.kind != TokenKind::LeftParen {
            return Err(unexpected(open));
        }

        let mut args = Vec::new();

        if self.current().kind == TokenKind::RightParen {
            self.consume();
        } else {
            loop {
                args.push(self.parse_expression(0)?);

                let separator = self.consume();
                match separator.kind {
                    TokenKind::Comma => {
                        if self.current().kind == TokenKind::RightParen {
                            return Err(FormulaError::MissingArgument {
                                position: self.current().position,
                                open_position: open.position,
                            });
                        }
                    }
                    TokenKind::RightParen => break,
                    _ => {
                        return Err(FormulaError::UnclosedParenthesis {
                            position: separator.position,
                            open_position: open.position,
                        })
                    }
                }
            }
        }

        Ok(Expression::FunctionCall(FunctionCall::new(
            NamePath::parse(name),
            args,
        )))
    }
}

fn unexpected(token: &Token) -> FormulaError {
    match token.kind {
        TokenKind::EndOfInput => FormulaError::UnexpectedEndOfInput {
            position: token.position,
        },
        _ => FormulaError::UnexpectedToken {
            token: token.raw.clone(),
            position: token.position,
        },
    }
}
