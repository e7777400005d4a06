//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Coarse classification of a [`FormulaError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input could not be split into tokens
    Lexical,
    /// The token stream does not form a valid expression
    Syntax,
    /// A variable or function name could not be resolved
    Resolution,
    /// An operand, argument or binding had the wrong type
    Type,
    /// A name is forbidden from being called
    Policy,
    /// The engine was used in an invalid state
    Usage,
    /// A function received an invalid argument list
    Argument,
}

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    // === Lexical ===
    /// A character that starts no token
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    /// A string literal without its closing quote
    #[error("Unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    /// A malformed `[bracketed]` identifier
    #[error("Invalid identifier at position {position}: {reason}")]
    InvalidIdentifier { position: usize, reason: String },

    /// A lone `!`
    #[error("Invalid operator '!' at position {position}, did you mean '!='?")]
    InvalidOperator { position: usize },

    /// A numeric literal that does not fit an f64
    #[error("Invalid number '{text}' at position {position}")]
    InvalidNumber { text: String, position: usize },

    // === Syntax ===
    /// A token that cannot appear where it was found
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    /// The input ended in the middle of an expression
    #[error("Unexpected end of input at position {position}")]
    UnexpectedEndOfInput { position: usize },

    /// A `(` that is never closed
    #[error("Missing closing parenthesis at position {position} for '(' at position {open_position}")]
    UnclosedParenthesis { position: usize, open_position: usize },

    /// A `,` in a call that is not followed by an argument
    #[error("Missing argument at position {position} in call opened at position {open_position}")]
    MissingArgument { position: usize, open_position: usize },

    // === Resolution ===
    /// No binding, member or constant carries this path
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// No tier provides a callable under this name
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    // === Type ===
    /// A math operator received a non-numeric operand
    #[error("Math operators require numeric operands: '{operator}' got {value}")]
    NonNumericOperand { operator: &'static str, value: String },

    /// A built-in math function received a non-numeric argument
    #[error("Math functions require numeric arguments: {function}() got {value}")]
    NonNumericArgument { function: String, value: String },

    /// A variable resolved to something that is not a plain value
    #[error("Variable '{path}' resolves to a {found}, not a value")]
    NotAValue { path: String, found: &'static str },

    /// A function name resolved to something that cannot be called
    #[error("'{0}' is not a function")]
    NotCallable(String),

    // === Policy ===
    /// The function name is reserved by the engine
    #[error("Function '{0}' is blacklisted")]
    Blacklisted(String),

    // === Usage ===
    /// `evaluate` was called before any formula was parsed
    #[error("No formula has been parsed")]
    NoExpression,

    // === Argument ===
    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// A host value that cannot be turned into a binding
    #[error("Invalid binding '{name}': {reason}")]
    InvalidBinding { name: String, reason: String },
}

impl FormulaError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::UnexpectedCharacter { .. }
            | FormulaError::UnterminatedString { .. }
            | FormulaError::InvalidIdentifier { .. }
            | FormulaError::InvalidOperator { .. }
            | FormulaError::InvalidNumber { .. } => ErrorKind::Lexical,

            FormulaError::UnexpectedToken { .. }
            | FormulaError::UnexpectedEndOfInput { .. }
            | FormulaError::UnclosedParenthesis { .. }
            | FormulaError::MissingArgument { .. } => ErrorKind::Syntax,

            FormulaError::VariableNotFound(_) | FormulaError::FunctionNotFound(_) => {
                ErrorKind::Resolution
            }

            FormulaError::NonNumericOperand { .. }
            | FormulaError::NonNumericArgument { .. }
            | FormulaError::NotAValue { .. }
            | FormulaError::NotCallable(_) => ErrorKind::Type,

            FormulaError::Blacklisted(_) => ErrorKind::Policy,

            FormulaError::NoExpression => ErrorKind::Usage,

            FormulaError::Argument(_)
            | FormulaError::ArgumentCount { .. }
            | FormulaError::InvalidBinding { .. } => ErrorKind::Argument,
        }
    }

    /// Source position for lexical and syntax errors
    pub fn position(&self) -> Option<usize> {
        match self {
            FormulaError::UnexpectedCharacter { position, .. }
            | FormulaError::UnterminatedString { position }
            | FormulaError::InvalidIdentifier { position, .. }
            | FormulaError::InvalidOperator { position }
            | FormulaError::InvalidNumber { position, .. }
            | FormulaError::UnexpectedToken { position, .. }
            | FormulaError::UnexpectedEndOfInput { position }
            | FormulaError::UnclosedParenthesis { position, .. }
            | FormulaError::MissingArgument { position, .. } => Some(*position),
            _ => None,
        }
    }
}
