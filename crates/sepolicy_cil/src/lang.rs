//! Incremental module language parser
//!
//! Modules are S-expressions. `;` starts a comment running to the end of
//! the line. The supported statements are:
//!
//! ```text
//! (type NAME)
//! (typeattribute NAME)
//! (typeattributeset ATTR (NAME ...))
//! ```
//!
//! The generated grammar only builds the S-expression tree; statement
//! shapes are checked here so errors can name the offending keyword.

use lalrpop_util::ParseError as GrammarError;
use lalrpop_util::lalrpop_mod;
use lalrpop_util::lexer::Token;
use std::fmt;

lalrpop_mod!(
    #[allow(clippy::all, missing_docs, unused_qualifications)]
    grammar
);

/// Source position, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Line number
    pub line: usize,
    /// Column number
    pub column: usize,
}

impl Span {
    /// Position of byte `offset` in `source`
    #[must_use]
    pub fn locate(source: &str, offset: usize) -> Self {
        let before = &source[..offset.min(source.len())];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A parsed module statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Declare a concrete type
    Type { name: String, span: Span },
    /// Declare an attribute
    TypeAttribute { name: String, span: Span },
    /// Add members to an attribute
    TypeAttributeSet {
        attr: String,
        members: Vec<String>,
        span: Span,
    },
}

impl Statement {
    /// Position of the statement's opening parenthesis
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Type { span, .. }
            | Self::TypeAttribute { span, .. }
            | Self::TypeAttributeSet { span, .. } => *span,
        }
    }
}

/// Parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Character not allowed in a module
    #[error("{span}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },

    /// `)` without a matching `(`
    #[error("{span}: unbalanced ')'")]
    UnbalancedClose { span: Span },

    /// Input ended inside a list
    #[error("{span}: unterminated list")]
    Unterminated { span: Span },

    /// Token the grammar does not allow here
    #[error("{span}: unexpected '{token}'")]
    UnexpectedToken { token: String, span: Span },

    /// A bare symbol at the top level
    #[error("{span}: expected a statement, found '{symbol}'")]
    TopLevelSymbol { symbol: String, span: Span },

    /// Statement keyword not recognized
    #[error("{span}: unknown statement '{keyword}'")]
    UnknownStatement { keyword: String, span: Span },

    /// Statement with the wrong shape
    #[error("{span}: invalid {keyword} statement: {reason}")]
    InvalidStatement {
        keyword: String,
        reason: String,
        span: Span,
    },
}

impl ParseError {
    fn from_grammar(source: &str, err: GrammarError<usize, Token<'_>, &'static str>) -> Self {
        match err {
            GrammarError::InvalidToken { location } => Self::UnexpectedChar {
                ch: source[location..]
                    .chars()
                    .next()
                    .unwrap_or(char::REPLACEMENT_CHARACTER),
                span: Span::locate(source, location),
            },
            GrammarError::UnrecognizedEof { location, .. } => Self::Unterminated {
                span: Span::locate(source, location),
            },
            GrammarError::UnrecognizedToken {
                token: (start, token, _),
                ..
            }
            | GrammarError::ExtraToken {
                token: (start, token, _),
            } => {
                let span = Span::locate(source, start);
                if token.1 == ")" {
                    Self::UnbalancedClose { span }
                } else {
                    Self::UnexpectedToken {
                        token: token.1.to_string(),
                        span,
                    }
                }
            }
            // The grammar has no fallible actions
            GrammarError::User { error } => Self::UnexpectedToken {
                token: error.to_string(),
                span: Span::locate(source, 0),
            },
        }
    }
}

/// Parsed S-expression, positioned by byte offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SExpr {
    Symbol(String, usize),
    List(Vec<SExpr>, usize),
}

/// Module language parser
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleParser;

impl ModuleParser {
    /// Create a new parser
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parse module source into statements, in source order
    ///
    /// # Errors
    ///
    /// Returns error on the first lexical or structural problem
    pub fn parse(&self, source: &str) -> Result<Vec<Statement>, ParseError> {
        let exprs = grammar::ExprsParser::new()
            .parse(source)
            .map_err(|e| ParseError::from_grammar(source, e))?;
        exprs
            .into_iter()
            .map(|expr| to_statement(source, expr))
            .collect()
    }
}

fn to_statement(source: &str, expr: SExpr) -> Result<Statement, ParseError> {
    let (items, span) = match expr {
        SExpr::List(items, start) => (items, Span::locate(source, start)),
        SExpr::Symbol(symbol, start) => {
            return Err(ParseError::TopLevelSymbol {
                symbol,
                span: Span::locate(source, start),
            });
        }
    };

    let mut items = items.into_iter();
    let keyword = match items.next() {
        Some(SExpr::Symbol(keyword, _)) => keyword,
        Some(SExpr::List(_, start)) => {
            return Err(ParseError::InvalidStatement {
                keyword: "()".to_string(),
                reason: "statement must start with a keyword".to_string(),
                span: Span::locate(source, start),
            });
        }
        None => {
            return Err(ParseError::InvalidStatement {
                keyword: "()".to_string(),
                reason: "empty statement".to_string(),
                span,
            });
        }
    };
    let args: Vec<SExpr> = items.collect();

    let invalid = |reason: &str| ParseError::InvalidStatement {
        keyword: keyword.clone(),
        reason: reason.to_string(),
        span,
    };

    match keyword.as_str() {
        "type" | "typeattribute" => {
            let [SExpr::Symbol(name, _)] = args.as_slice() else {
                return Err(invalid("expected exactly one name"));
            };
            let name = name.clone();
            Ok(if keyword == "type" {
                Statement::Type { name, span }
            } else {
                Statement::TypeAttribute { name, span }
            })
        }
        "typeattributeset" => {
            let [SExpr::Symbol(attr, _), SExpr::List(list, _)] = args.as_slice() else {
                return Err(invalid("expected an attribute and a list of names"));
            };
            let members = list
                .iter()
                .map(|item| match item {
                    SExpr::Symbol(name, _) => Ok(name.clone()),
                    SExpr::List(_, _) => Err(invalid("member lists cannot be nested")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Statement::TypeAttributeSet {
                attr: attr.clone(),
                members,
                span,
            })
        }
        _ => Err(ParseError::UnknownStatement {
            keyword: keyword.clone(),
            span,
        }),
    }
}
