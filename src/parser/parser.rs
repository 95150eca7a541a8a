//! Recursive Descent Parser for termscript
//!
//! This parser consumes tokens from a `TokenSource` and produces an AST.
//!
//! Grammar (simplified):
//!   program    ::= statement (';' statement)*
//!   statement  ::= expression            (a lone bare word becomes a call)
//!   expression ::= binary(call(atom))
//!   call       ::= word arg*  |  word '(' expression (',' expression)* ')'
//!   atom       ::= literal | '(' expression ')' | block | if | function
//!                | for | while | unset | ('!' | '~' | '-') atom
//!   block      ::= '{' statement* '}'  |  'do' statement* 'done'
//!
//! The key disambiguation lives in `maybe_call`: a bare word followed by a
//! value token (not an operator, punctuation, or keyword) is a command
//! invocation, so `foo bar` is a call while `foo + bar` is a binary node.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::ast::types::{
    AssignNode, BinaryNode, CallNode, Expr, ForInNode, ForNode, FunctionNode, IfNode, Program,
    QuoteStyle, UnaryNode, VariableNode, WhileNode,
};
use crate::parser::input::normalize;
use crate::parser::lexer::{Lexer, Token, TokenKind};
use crate::parser::types::{
    is_postfix, is_right_associative, precedence, LexError, ParseError, SyntaxError,
    UNARY_PRECEDENCE,
};

type PResult<T> = Result<T, SyntaxError>;

/// Anything the parser can pull tokens from.
pub trait TokenSource {
    fn peek_token(&mut self) -> Result<Option<&Token>, LexError>;
    fn next_token(&mut self) -> Result<Option<Token>, LexError>;
    /// Position used for errors when the next token is missing.
    fn position(&self) -> (usize, usize);
}

impl TokenSource for Lexer {
    fn peek_token(&mut self) -> Result<Option<&Token>, LexError> {
        self.peek()
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.next()
    }

    fn position(&self) -> (usize, usize) {
        Lexer::position(self)
    }
}

/// Already-lexed tokens, used to re-parse loop conditions.
#[derive(Debug, Clone)]
pub struct TokenBuffer {
    tokens: VecDeque<Token>,
    end: (usize, usize),
}

impl TokenBuffer {
    pub fn new(tokens: Vec<Token>, end: (usize, usize)) -> Self {
        Self {
            tokens: tokens.into(),
            end,
        }
    }
}

impl TokenSource for TokenBuffer {
    fn peek_token(&mut self) -> Result<Option<&Token>, LexError> {
        Ok(self.tokens.front())
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        Ok(self.tokens.pop_front())
    }

    fn position(&self) -> (usize, usize) {
        self.tokens
            .front()
            .map_or(self.end, |t| (t.line, t.column))
    }
}

/// Normalize, lex and parse a raw script.
pub fn parse(input: &str) -> PResult<Program> {
    parse_normalized(&normalize(input))
}

/// Parse text that already went through `normalize`.
pub fn parse_normalized(normalized: &str) -> PResult<Program> {
    Parser::new(Lexer::new(normalized)).parse_program()
}

/// Main parser struct
pub struct Parser<S: TokenSource> {
    source: S,
}

impl<S: TokenSource> Parser<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn peek(&mut self) -> PResult<Option<&Token>> {
        Ok(self.source.peek_token()?)
    }

    fn next(&mut self) -> PResult<Option<Token>> {
        Ok(self.source.next_token()?)
    }

    fn is_eof(&mut self) -> PResult<bool> {
        Ok(self.peek()?.is_none())
    }

    fn is_punctuation(&mut self, c: char) -> PResult<bool> {
        Ok(self.peek()?.map_or(false, |t| t.is_punctuation(c)))
    }

    fn is_keyword(&mut self, word: &str) -> PResult<bool> {
        Ok(self.peek()?.map_or(false, |t| t.is_keyword(word)))
    }

    /// Build a ParseError describing whatever comes next.
    fn unexpected(&mut self, expected: &str) -> SyntaxError {
        let fallback = self.source.position();
        match self.source.peek_token() {
            Ok(Some(token)) => {
                ParseError::new(expected, token.describe(), token.line, token.column).into()
            }
            Ok(None) => ParseError::new(expected, "end of input", fallback.0, fallback.1).into(),
            Err(err) => err.into(),
        }
    }

    fn skip_punctuation(&mut self, c: char) -> PResult<()> {
        if self.is_punctuation(c)? {
            self.next()?;
            Ok(())
        } else {
            Err(self.unexpected(&format!("\"{}\"", c)))
        }
    }

    fn skip_keyword(&mut self, word: &str) -> PResult<()> {
        if self.is_keyword(word)? {
            self.next()?;
            Ok(())
        } else {
            Err(self.unexpected(&format!("keyword \"{}\"", word)))
        }
    }

    fn skip_separators(&mut self) -> PResult<()> {
        while self.is_punctuation(';')? {
            self.next()?;
        }
        Ok(())
    }

    // =========================================================================
    // Programs and statements
    // =========================================================================

    /// Parse `;`-delimited statements until end of input.
    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut statements = Vec::new();
        self.skip_separators()?;
        while !self.is_eof()? {
            statements.push(self.parse_statement()?);
            if self.is_eof()? {
                break;
            }
            self.skip_punctuation(';')?;
            self.skip_separators()?;
        }
        Ok(Program { statements })
    }

    /// An expression in statement position. A lone bare word is a
    /// zero-argument command call.
    fn parse_statement(&mut self) -> PResult<Expr> {
        let expr = self.parse_expression()?;
        if expr.as_bare_word().is_some() {
            return Ok(Expr::Call(CallNode {
                callee: Box::new(expr),
                args: Vec::new(),
            }));
        }
        Ok(expr)
    }

    /// Statements up to (not including) the closing `}` or `done`.
    fn parse_statements_until(&mut self, closes: impl Fn(&Token) -> bool) -> PResult<Program> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators()?;
            match self.peek()? {
                Some(token) if closes(token) => break,
                Some(_) => {}
                None => return Err(self.unexpected("end of block")),
            }
            statements.push(self.parse_statement()?);
            match self.peek()? {
                Some(token) if closes(token) || token.is_punctuation(';') => {}
                _ => return Err(self.unexpected("\";\"")),
            }
        }
        Ok(Program { statements })
    }

    /// `{ statement; ... }`
    fn parse_block(&mut self) -> PResult<Expr> {
        self.skip_punctuation('{')?;
        let program = self.parse_statements_until(|t| t.is_punctuation('}'))?;
        self.skip_punctuation('}')?;
        Ok(Expr::Program(program))
    }

    /// `do statement; ... done`
    fn parse_do_block(&mut self) -> PResult<Expr> {
        self.skip_keyword("do")?;
        let program = self.parse_statements_until(|t| t.is_keyword("done"))?;
        self.skip_keyword("done")?;
        Ok(Expr::Program(program))
    }

    fn parse_loop_body(&mut self) -> PResult<Expr> {
        if self.is_keyword("do")? {
            self.parse_do_block()
        } else if self.is_punctuation('{')? {
            self.parse_block()
        } else {
            Err(self.unexpected("\"do\" or \"{\""))
        }
    }

    /// A branch of `if` or a function body: a block or a single statement.
    fn parse_branch(&mut self) -> PResult<Expr> {
        if self.is_punctuation('{')? {
            self.parse_block()
        } else {
            self.parse_statement()
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn parse_expression(&mut self) -> PResult<Expr> {
        let atom = self.parse_atom()?;
        let left = self.maybe_call(atom)?;
        self.maybe_binary(left, 0)
    }

    fn parse_operand(&mut self) -> PResult<Expr> {
        let atom = self.parse_atom()?;
        self.maybe_call(atom)
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let token = match self.peek()? {
            Some(token) => token.clone(),
            None => return Err(self.unexpected("expression")),
        };

        match &token.kind {
            TokenKind::Punctuation('(') => {
                self.next()?;
                let expr = self.parse_expression()?;
                self.skip_punctuation(')')?;
                Ok(expr)
            }
            TokenKind::Punctuation('{') => self.parse_block(),
            TokenKind::Keyword(word) => match word.as_str() {
                "if" => self.parse_if(),
                "function" => self.parse_function(),
                "for" => self.parse_for(),
                "while" => self.parse_while(),
                "unset" => self.parse_unset(),
                _ => Err(self.unexpected("expression")),
            },
            TokenKind::Operator(op) if matches!(op.as_str(), "!" | "~" | "-") => {
                self.next()?;
                let operand = self.parse_operand()?;
                let operand = self.maybe_binary(operand, UNARY_PRECEDENCE)?;
                Ok(Expr::Unary(UnaryNode {
                    operator: op.clone(),
                    operand: Box::new(operand),
                }))
            }
            TokenKind::Operator(_) | TokenKind::Punctuation(_) => {
                Err(self.unexpected("expression"))
            }
            _ => {
                self.next()?;
                token_to_expr(token)
            }
        }
    }

    /// Turn a bare word followed by arguments into a call node.
    fn maybe_call(&mut self, expr: Expr) -> PResult<Expr> {
        if expr.as_bare_word().is_none() {
            return Ok(expr);
        }

        if self.is_punctuation('(')? {
            self.next()?;
            let args = self.parse_list(')')?;
            self.skip_punctuation(')')?;
            return Ok(Expr::Call(CallNode {
                callee: Box::new(expr),
                args,
            }));
        }

        let mut args = Vec::new();
        while let Some(token) = self.peek()? {
            if !is_argument_token(token) {
                break;
            }
            if let Some(token) = self.next()? {
                args.push(argument_to_expr(token)?);
            }
        }
        if args.is_empty() {
            return Ok(expr);
        }
        Ok(Expr::Call(CallNode {
            callee: Box::new(expr),
            args,
        }))
    }

    /// Operator-precedence climbing over binary and postfix operators.
    fn maybe_binary(&mut self, mut left: Expr, my_precedence: u8) -> PResult<Expr> {
        loop {
            let (op, his_precedence) = match self.peek()? {
                Some(Token {
                    kind: TokenKind::Operator(op),
                    ..
                }) => match precedence(op) {
                    Some(p) if p > my_precedence => (op.clone(), p),
                    _ => return Ok(left),
                },
                _ => return Ok(left),
            };
            self.next()?;

            if is_postfix(&op) {
                left = Expr::Binary(BinaryNode {
                    operator: op,
                    left: Box::new(left),
                    right: Box::new(Expr::Null),
                });
                continue;
            }

            let next_precedence = if is_right_associative(&op) {
                his_precedence - 1
            } else {
                his_precedence
            };
            let operand = self.parse_operand()?;
            let right = self.maybe_binary(operand, next_precedence)?;

            left = if op == "=" {
                Expr::Assign(AssignNode {
                    target: Box::new(left),
                    value: Box::new(right),
                })
            } else {
                Expr::Binary(BinaryNode {
                    operator: op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            };
        }
    }

    /// Comma-separated expressions up to (not including) `stop`.
    fn parse_list(&mut self, stop: char) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.is_punctuation(stop)? {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if self.is_punctuation(',')? {
                self.next()?;
                continue;
            }
            return Ok(items);
        }
    }

    // =========================================================================
    // Compound constructs
    // =========================================================================

    /// `if cond [then] branch [else branch]`
    fn parse_if(&mut self) -> PResult<Expr> {
        self.skip_keyword("if")?;
        let condition = self.parse_expression()?;
        if self.is_keyword("then")? {
            self.next()?;
        }
        let then_branch = self.parse_branch()?;
        let else_branch = if self.is_keyword("else")? {
            self.next()?;
            Some(Box::new(self.parse_branch()?))
        } else {
            None
        };
        Ok(Expr::If(IfNode {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch,
        }))
    }

    /// `function [name](params) body`. Without a parameter list the rest is
    /// parsed as the body.
    fn parse_function(&mut self) -> PResult<Expr> {
        self.skip_keyword("function")?;

        let mut name = None;
        if let Some(token) = self.peek()? {
            if let TokenKind::Variable {
                name: word,
                deref: false,
                index: None,
            } = &token.kind
            {
                name = Some(word.clone());
                self.next()?;
            }
        }

        let params = match self.peek()?.map(|t| t.kind.clone()) {
            Some(TokenKind::ArrayLiteral(items)) => {
                self.next()?;
                items
                    .into_iter()
                    .map(token_to_expr)
                    .collect::<PResult<Vec<_>>>()?
            }
            Some(TokenKind::Punctuation('(')) => {
                self.next()?;
                let params = self.parse_list(')')?;
                self.skip_punctuation(')')?;
                params
            }
            _ => Vec::new(),
        };

        for param in &params {
            let valid = match param {
                Expr::Assign(assign) => assign.target.as_bare_word().is_some(),
                other => other.as_bare_word().is_some(),
            };
            if !valid {
                let (line, column) = self.source.position();
                return Err(
                    ParseError::new("parameter name", param.kind(), line, column).into()
                );
            }
        }

        let body = self.parse_branch()?;
        Ok(Expr::Function(FunctionNode {
            name,
            params,
            body: Rc::new(body),
        }))
    }

    /// Raw tokens up to `do` or `{`, skipping `;`.
    fn collect_condition_tokens(&mut self) -> PResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            match self.peek()? {
                None => return Err(self.unexpected("\"do\" or \"{\"")),
                Some(t) if t.is_keyword("do") || t.is_punctuation('{') => break,
                Some(t) if t.is_punctuation(';') => {
                    self.next()?;
                }
                Some(_) => {
                    if let Some(token) = self.next()? {
                        tokens.push(token);
                    }
                }
            }
        }
        if tokens.is_empty() {
            return Err(self.unexpected("loop condition"));
        }
        Ok(tokens)
    }

    /// Parse a raw token run as a list of condition expressions.
    fn parse_conditions(&self, tokens: Vec<Token>) -> PResult<Vec<Expr>> {
        let end = self.source.position();
        let mut parser = Parser::new(TokenBuffer::new(tokens, end));
        let mut conditions = Vec::new();
        while !parser.is_eof()? {
            conditions.push(parser.parse_expression()?);
            if parser.is_punctuation(',')? {
                parser.next()?;
            } else if !parser.is_eof()? {
                return Err(parser.unexpected("end of loop condition"));
            }
        }
        Ok(conditions)
    }

    /// C-style `for (init; cond; step)`, `for x in range`, or `for cond`.
    fn parse_for(&mut self) -> PResult<Expr> {
        self.skip_keyword("for")?;

        if self.is_punctuation('(')? {
            self.next()?;
            let init = self.parse_list(';')?;
            self.skip_punctuation(';')?;
            let condition = self.parse_list(';')?;
            self.skip_punctuation(';')?;
            let step = self.parse_list(')')?;
            self.skip_punctuation(')')?;
            let body = self.parse_loop_body()?;
            return Ok(Expr::For(ForNode {
                init,
                condition,
                step,
                body: Box::new(body),
            }));
        }

        let tokens = self.collect_condition_tokens()?;
        let is_for_in = tokens.len() >= 2
            && matches!(&tokens[0].kind, TokenKind::Variable { deref: false, index: None, .. })
            && tokens[1].is_keyword("in");

        if !is_for_in {
            let condition = self.parse_conditions(tokens)?;
            let body = self.parse_loop_body()?;
            return Ok(Expr::While(WhileNode {
                condition,
                body: Box::new(body),
            }));
        }

        let mut tokens = tokens.into_iter();
        let variable = match tokens.next().map(|t| t.kind) {
            Some(TokenKind::Variable { name, .. }) => name,
            _ => return Err(self.unexpected("loop variable")),
        };
        let range_tokens: Vec<Token> = tokens.skip(1).collect();
        let range = match range_tokens.len() {
            0 => return Err(self.unexpected("range after \"in\"")),
            1 => range_tokens
                .into_iter()
                .next()
                .map(token_to_expr)
                .unwrap_or(Ok(Expr::Null))?,
            _ => Expr::ArrayLiteral(
                range_tokens
                    .into_iter()
                    .map(token_to_expr)
                    .collect::<PResult<Vec<_>>>()?,
            ),
        };
        let body = self.parse_loop_body()?;
        Ok(Expr::ForIn(ForInNode {
            variable,
            range: Box::new(range),
            body: Box::new(body),
        }))
    }

    /// `while cond... do ... done`
    fn parse_while(&mut self) -> PResult<Expr> {
        self.skip_keyword("while")?;
        let tokens = self.collect_condition_tokens()?;
        let condition = self.parse_conditions(tokens)?;
        let body = self.parse_loop_body()?;
        Ok(Expr::While(WhileNode {
            condition,
            body: Box::new(body),
        }))
    }

    /// `unset a [b ...]` assigns null to each name.
    fn parse_unset(&mut self) -> PResult<Expr> {
        self.skip_keyword("unset")?;
        let mut assignments = Vec::new();
        while let Some(token) = self.peek()? {
            if !matches!(token.kind, TokenKind::Variable { .. }) {
                break;
            }
            if let Some(token) = self.next()? {
                let target = match token_to_expr(token)? {
                    Expr::Variable(v) => Expr::Variable(VariableNode { deref: false, ..v }),
                    other => other,
                };
                assignments.push(Expr::Assign(AssignNode {
                    target: Box::new(target),
                    value: Box::new(Expr::Null),
                }));
            }
        }
        match assignments.len() {
            0 => Err(self.unexpected("variable name after \"unset\"")),
            1 => Ok(assignments.remove(0)),
            _ => Ok(Expr::Program(Program {
                statements: assignments,
            })),
        }
    }
}

/// Keywords that close or open a branch; they always end an argument list.
const BLOCK_KEYWORDS: &[&str] = &["then", "else", "do", "done"];

/// Tokens that may follow a bare word as command arguments. Keywords other
/// than the block delimiters are plain words there (`echo in`).
fn is_argument_token(token: &Token) -> bool {
    match &token.kind {
        TokenKind::Keyword(word) => !BLOCK_KEYWORDS.contains(&word.as_str()),
        kind => matches!(
            kind,
            TokenKind::Number(_)
                | TokenKind::Str { .. }
                | TokenKind::Boolean(_)
                | TokenKind::Variable { .. }
                | TokenKind::ArrayLiteral(_)
                | TokenKind::BraceExpansion(_)
                | TokenKind::ParamExpansion(_)
        ),
    }
}

fn argument_to_expr(token: Token) -> PResult<Expr> {
    match token.kind {
        TokenKind::Keyword(value) => Ok(Expr::Str {
            value,
            quote: QuoteStyle::Bare,
        }),
        _ => token_to_expr(token),
    }
}

/// Parse the raw text between `[` and `]` as an expression.
fn parse_index(raw: &str, line: usize, column: usize) -> PResult<Expr> {
    let mut parser = Parser::new(Lexer::new(raw));
    if parser.is_eof()? {
        return Err(ParseError::new("index expression", "\"]\"", line, column).into());
    }
    let expr = parser.parse_expression()?;
    if !parser.is_eof()? {
        return Err(parser.unexpected("\"]\""));
    }
    Ok(expr)
}

/// Convert a value token into its AST node.
fn token_to_expr(token: Token) -> PResult<Expr> {
    let (line, column) = (token.line, token.column);
    match token.kind {
        TokenKind::Number(n) => Ok(Expr::Number(n)),
        TokenKind::Str { value, quote } => Ok(Expr::Str { value, quote }),
        TokenKind::Boolean(b) => Ok(Expr::Boolean(b)),
        TokenKind::Variable { name, deref, index } => {
            let index = match index {
                Some(raw) => Some(Box::new(parse_index(&raw, line, column)?)),
                None => None,
            };
            Ok(Expr::Variable(VariableNode { name, deref, index }))
        }
        TokenKind::ArrayLiteral(items) => Ok(Expr::ArrayLiteral(
            items
                .into_iter()
                .map(token_to_expr)
                .collect::<PResult<Vec<_>>>()?,
        )),
        TokenKind::BraceExpansion(raw) => Ok(Expr::BraceExpansion(raw)),
        TokenKind::ParamExpansion(raw) => Ok(Expr::ParamExpansion(raw)),
        TokenKind::Keyword(_) | TokenKind::Operator(_) | TokenKind::Punctuation(_) => {
            let found = Token::new(token.kind, line, column).describe();
            Err(ParseError::new("value", found, line, column).into())
        }
    }
}
