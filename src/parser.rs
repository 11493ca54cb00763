use std::mem;
use std::rc::Rc;

use crate::ast::{Block, Expr, InfixOp, PrefixOp, Program, Stmt};
use crate::ctx::Context;
use crate::diag::{FullParseError, ParseError, Position};
use crate::interner::Symbol;
use crate::scanner::Scanner;
use crate::token::Token;

/// Binding power of infix operators, weakest first.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn token_precedence(token: &Token) -> Precedence {
    match token {
        Token::Eq | Token::NotEq => Precedence::Equals,
        Token::Lt | Token::Gt => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Slash | Token::Asterisk => Precedence::Product,
        Token::LParen => Precedence::Call,
        Token::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

/// Recursive-descent parser with Pratt-style expression parsing.
///
/// Parsing is best-effort: a failed statement is recorded and the parser
/// skips ahead to the next semicolon, so one pass reports as many errors
/// as possible.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    cur_token: Token,
    cur_pos: Position,
    peek_token: Token,
    peek_pos: Position,
    errors: Vec<FullParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, ctx: Rc<Context>) -> Parser<'a> {
        let mut scanner = Scanner::new(input, ctx);
        let (cur_pos, cur_token) = scanner.next_token();
        let (peek_pos, peek_token) = scanner.next_token();
        Parser {
            scanner,
            cur_token,
            cur_pos,
            peek_token,
            peek_pos,
            errors: vec![],
        }
    }

    /// Parse statements until EOF.  Returns the program, or every error
    /// collected along the way.
    pub fn parse_program(&mut self) -> Result<Program, Vec<FullParseError>> {
        let mut stmts = vec![];
        while self.cur_token != Token::Eof {
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
            self.advance();
        }
        if self.errors.is_empty() {
            Ok(Program { stmts })
        } else {
            Err(mem::take(&mut self.errors))
        }
    }

    // Parse functions follow one convention: they are entered with
    // `cur_token` on their first token and leave it on their last one.
    // The caller advances past it.

    fn parse_statement(&mut self) -> Result<Stmt, FullParseError> {
        match self.cur_token {
            Token::Let => self.parse_let_statement(),
            Token::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Result<Stmt, FullParseError> {
        let name = match self.peek_token.clone() {
            Token::Ident(sym) => {
                self.advance();
                sym
            }
            _ => {
                return Err(FullParseError {
                    pos: self.peek_pos,
                    error: ParseError::ExpectedIdentifier,
                })
            }
        };
        self.expect_peek(Token::Assign)?;
        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();
        Ok(Stmt::Let(name, value))
    }

    fn parse_return_statement(&mut self) -> Result<Stmt, FullParseError> {
        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();
        Ok(Stmt::Return(value))
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, FullParseError> {
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();
        Ok(Stmt::Expr(expr))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expr, FullParseError> {
        let mut left = self.parse_prefix()?;

        while self.peek_token != Token::Semicolon
            && precedence < token_precedence(&self.peek_token)
        {
            left = match &self.peek_token {
                Token::Plus => self.parse_infix_expression(InfixOp::Plus, left)?,
                Token::Minus => self.parse_infix_expression(InfixOp::Minus, left)?,
                Token::Asterisk => self.parse_infix_expression(InfixOp::Asterisk, left)?,
                Token::Slash => self.parse_infix_expression(InfixOp::Slash, left)?,
                Token::Lt => self.parse_infix_expression(InfixOp::Lt, left)?,
                Token::Gt => self.parse_infix_expression(InfixOp::Gt, left)?,
                Token::Eq => self.parse_infix_expression(InfixOp::Eq, left)?,
                Token::NotEq => self.parse_infix_expression(InfixOp::NotEq, left)?,
                Token::LParen => {
                    self.advance();
                    self.parse_call_expression(left)?
                }
                Token::LBracket => {
                    self.advance();
                    self.parse_index_expression(left)?
                }
                _ => return Ok(left),
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, FullParseError> {
        match self.cur_token.clone() {
            Token::Ident(sym) => Ok(Expr::Ident(sym)),
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Bang => self.parse_prefix_expression(PrefixOp::Bang),
            Token::Minus => self.parse_prefix_expression(PrefixOp::Minus),
            Token::LParen => self.parse_grouped_expression(),
            Token::If => self.parse_if_expression(),
            Token::Function => self.parse_function_literal(),
            Token::LBracket => Ok(Expr::Array(self.parse_expression_list(Token::RBracket)?)),
            Token::LBrace => self.parse_hash_literal(),
            Token::Macro => self.parse_macro_literal(),
            other => Err(FullParseError {
                pos: self.cur_pos,
                error: ParseError::NoPrefixParseFn(other.to_string()),
            }),
        }
    }

    fn parse_prefix_expression(&mut self, op: PrefixOp) -> Result<Expr, FullParseError> {
        self.advance();
        let right = self.parse_expression(Precedence::Prefix)?;
        Ok(Expr::Prefix(op, Box::new(right)))
    }

    fn parse_infix_expression(&mut self, op: InfixOp, left: Expr) -> Result<Expr, FullParseError> {
        self.advance();
        let precedence = token_precedence(&self.cur_token);
        self.advance();
        let right = self.parse_expression(precedence)?;
        Ok(Expr::Infix(op, Box::new(left), Box::new(right)))
    }

    fn parse_grouped_expression(&mut self) -> Result<Expr, FullParseError> {
        self.advance();
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(Token::RParen)?;
        Ok(expr)
    }

    fn parse_if_expression(&mut self) -> Result<Expr, FullParseError> {
        self.expect_peek(Token::LParen)?;
        self.advance();
        let cond = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(Token::RParen)?;
        self.expect_peek(Token::LBrace)?;
        let consequence = self.parse_block()?;

        let alternative = if self.peek_token == Token::Else {
            self.advance();
            self.expect_peek(Token::LBrace)?;
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Expr::If {
            cond: Box::new(cond),
            consequence,
            alternative,
        })
    }

    fn parse_block(&mut self) -> Result<Block, FullParseError> {
        self.advance();
        let mut stmts = vec![];
        while self.cur_token != Token::RBrace {
            if self.cur_token == Token::Eof {
                return Err(FullParseError {
                    pos: self.cur_pos,
                    error: ParseError::UnexpectedToken(
                        Token::Eof.to_string(),
                        Token::RBrace.to_string(),
                    ),
                });
            }
            stmts.push(self.parse_statement()?);
            self.advance();
        }
        Ok(Block { stmts })
    }

    fn parse_function_literal(&mut self) -> Result<Expr, FullParseError> {
        self.expect_peek(Token::LParen)?;
        let params = self.parse_parameters()?;
        self.expect_peek(Token::LBrace)?;
        let body = self.parse_block()?;
        Ok(Expr::Function { params, body })
    }

    fn parse_macro_literal(&mut self) -> Result<Expr, FullParseError> {
        self.expect_peek(Token::LParen)?;
        let params = self.parse_parameters()?;
        self.expect_peek(Token::LBrace)?;
        let body = self.parse_block()?;
        Ok(Expr::MacroLit { params, body })
    }

    fn parse_parameters(&mut self) -> Result<Vec<Symbol>, FullParseError> {
        let mut params = vec![];
        if self.peek_token == Token::RParen {
            self.advance();
            return Ok(params);
        }

        self.advance();
        loop {
            match self.cur_token.clone() {
                Token::Ident(sym) => params.push(sym),
                _ => {
                    return Err(FullParseError {
                        pos: self.cur_pos,
                        error: ParseError::ExpectedIdentifier,
                    })
                }
            }
            if self.peek_token != Token::Comma {
                break;
            }
            self.advance();
            self.advance();
        }
        self.expect_peek(Token::RParen)?;
        Ok(params)
    }

    fn parse_call_expression(&mut self, callee: Expr) -> Result<Expr, FullParseError> {
        let args = self.parse_expression_list(Token::RParen)?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_expression_list(&mut self, end: Token) -> Result<Vec<Expr>, FullParseError> {
        let mut list = vec![];
        if self.peek_token == end {
            self.advance();
            return Ok(list);
        }

        self.advance();
        list.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek_token == Token::Comma {
            self.advance();
            self.advance();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }
        self.expect_peek(end)?;
        Ok(list)
    }

    fn parse_index_expression(&mut self, collection: Expr) -> Result<Expr, FullParseError> {
        self.advance();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(Token::RBracket)?;
        Ok(Expr::Index(Box::new(collection), Box::new(index)))
    }

    fn parse_hash_literal(&mut self) -> Result<Expr, FullParseError> {
        let mut pairs = vec![];
        while self.peek_token != Token::RBrace {
            self.advance();
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect_peek(Token::Colon)?;
            self.advance();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if self.peek_token != Token::RBrace {
                self.expect_peek(Token::Comma)?;
            }
        }
        self.expect_peek(Token::RBrace)?;
        Ok(Expr::Hash(pairs))
    }

    fn advance(&mut self) {
        self.cur_token = mem::replace(&mut self.peek_token, Token::Eof);
        self.cur_pos = self.peek_pos;
        let (pos, token) = self.scanner.next_token();
        self.peek_token = token;
        self.peek_pos = pos;
    }

    fn expect_peek(&mut self, expected: Token) -> Result<(), FullParseError> {
        if self.peek_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(FullParseError {
                pos: self.peek_pos,
                error: ParseError::UnexpectedToken(
                    self.peek_token.to_string(),
                    expected.to_string(),
                ),
            })
        }
    }

    fn skip_optional_semicolon(&mut self) {
        if self.peek_token == Token::Semicolon {
            self.advance();
        }
    }

    /// Skip ahead to the next statement boundary after an error.
    fn synchronize(&mut self) {
        while self.cur_token != Token::Semicolon && self.cur_token != Token::Eof {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Program, Vec<FullParseError>> {
        let ctx = Context::new();
        parse_with_ctx(ctx, input)
    }

    fn parse_with_ctx(ctx: Rc<Context>, input: &str) -> Result<Program, Vec<FullParseError>> {
        Parser::new(input, ctx).parse_program()
    }

    fn parse_single_expr(input: &str) -> Expr {
        let mut program = parse(input).expect("parse errors");
        assert_eq!(program.stmts.len(), 1, "want a single statement");
        match program.stmts.remove(0) {
            Stmt::Expr(e) => e,
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn let_statements() {
        let ctx = Context::new();
        let program = parse_with_ctx(ctx.clone(), "let x = 5; let y = 10; let foobar = 838383;")
            .expect("parse errors");
        assert_eq!(
            program.stmts,
            vec![
                Stmt::Let(ctx.symbol("x"), Expr::Int(5)),
                Stmt::Let(ctx.symbol("y"), Expr::Int(10)),
                Stmt::Let(ctx.symbol("foobar"), Expr::Int(838383)),
            ]
        );
    }

    #[test]
    fn return_statements() {
        let program = parse("return 5; return true;").expect("parse errors");
        assert_eq!(
            program.stmts,
            vec![Stmt::Return(Expr::Int(5)), Stmt::Return(Expr::Bool(true))]
        );
    }

    #[test]
    fn trailing_semicolon_is_optional() {
        let ctx = Context::new();
        let program = parse_with_ctx(ctx.clone(), "let x = 5").expect("parse errors");
        assert_eq!(program.stmts, vec![Stmt::Let(ctx.symbol("x"), Expr::Int(5))]);

        let program = parse("1 + 2").expect("parse errors");
        assert_eq!(program.to_string(), "(1 + 2)");
    }

    #[test]
    fn identifier_expression() {
        let ctx = Context::new();
        let program = parse_with_ctx(ctx.clone(), "foobar;").expect("parse errors");
        assert_eq!(
            program.stmts,
            vec![Stmt::Expr(Expr::Ident(ctx.symbol("foobar")))]
        );
    }

    #[test]
    fn literal_expressions() {
        assert_eq!(parse_single_expr("5;"), Expr::Int(5));
        assert_eq!(parse_single_expr("true;"), Expr::Bool(true));
        assert_eq!(parse_single_expr("false;"), Expr::Bool(false));
        assert_eq!(
            parse_single_expr("\"hello world\";"),
            Expr::Str("hello world".to_string())
        );
    }

    #[test]
    fn prefix_expressions() {
        assert_eq!(
            parse_single_expr("!5;"),
            Expr::Prefix(PrefixOp::Bang, Box::new(Expr::Int(5)))
        );
        assert_eq!(
            parse_single_expr("-15;"),
            Expr::Prefix(PrefixOp::Minus, Box::new(Expr::Int(15)))
        );
        assert_eq!(
            parse_single_expr("!true;"),
            Expr::Prefix(PrefixOp::Bang, Box::new(Expr::Bool(true)))
        );
    }

    #[test]
    fn infix_expressions() {
        let cases = vec![
            ("5 + 5;", InfixOp::Plus),
            ("5 - 5;", InfixOp::Minus),
            ("5 * 5;", InfixOp::Asterisk),
            ("5 / 5;", InfixOp::Slash),
            ("5 > 5;", InfixOp::Gt),
            ("5 < 5;", InfixOp::Lt),
            ("5 == 5;", InfixOp::Eq),
            ("5 != 5;", InfixOp::NotEq),
        ];
        for (input, op) in cases {
            assert_eq!(
                parse_single_expr(input),
                Expr::Infix(op, Box::new(Expr::Int(5)), Box::new(Expr::Int(5))),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn operator_precedence() {
        let cases = vec![
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a * b / c", "((a * b) / c)"),
            ("a + b / c", "(a + (b / c))"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("3 + 4; -5 * 5", "(3 + 4)((-5) * 5)"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
            (
                "3 + 4 * 5 == 3 * 1 + 4 * 5",
                "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))",
            ),
            ("true", "true"),
            ("false", "false"),
            ("3 > 5 == false", "((3 > 5) == false)"),
            ("3 < 5 == true", "((3 < 5) == true)"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("2 / (5 + 5)", "(2 / (5 + 5))"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            (
                "add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))",
                "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))",
            ),
            ("add(a + b + c * d / f + g)", "add((((a + b) + ((c * d) / f)) + g))"),
            (
                "a * [1, 2, 3, 4][b * c] * d",
                "((a * ([1, 2, 3, 4][(b * c)])) * d)",
            ),
            (
                "add(a * b[2], b[1], 2 * [1, 2][1])",
                "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))",
            ),
        ];
        for (input, want) in cases {
            let program = parse(input).expect("parse errors");
            assert_eq!(program.to_string(), want, "input: {}", input);
        }
    }

    #[test]
    fn rendering_round_trips() {
        // Block renderings drop their braces, so `if` and `fn` do not
        // round-trip; everything else does.
        let inputs = vec![
            "let x = 1 + 2 * 3;",
            "-a * b == !c",
            "{\"one\": 1, \"two\": 2 * 2}",
            "[1, 2, 3][1 + 1]",
            "add(a, b)(c)[d]",
        ];
        for input in inputs {
            let first = parse(input).expect("parse errors").to_string();
            let second = parse(&first).expect("parse errors").to_string();
            assert_eq!(first, second, "input: {}", input);
        }
    }

    #[test]
    fn if_expression() {
        let expr = parse_single_expr("if (x < y) { x }");
        match expr {
            Expr::If {
                cond,
                consequence,
                alternative,
            } => {
                assert_eq!(cond.to_string(), "(x < y)");
                assert_eq!(consequence.to_string(), "x");
                assert_eq!(alternative, None);
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn if_else_expression() {
        let expr = parse_single_expr("if (x < y) { x } else { y }");
        match expr {
            Expr::If { alternative, .. } => {
                assert_eq!(alternative.expect("missing else branch").to_string(), "y");
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn function_literal() {
        let expr = parse_single_expr("fn(x, y) { x + y; }");
        match expr {
            Expr::Function { params, body } => {
                assert_eq!(
                    params.iter().map(|p| p.name()).collect::<Vec<_>>(),
                    vec!["x", "y"]
                );
                assert_eq!(body.to_string(), "(x + y)");
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn function_parameter_lists() {
        let cases = vec![
            ("fn() {};", vec![]),
            ("fn(x) {};", vec!["x"]),
            ("fn(x, y, z) {};", vec!["x", "y", "z"]),
        ];
        for (input, want) in cases {
            match parse_single_expr(input) {
                Expr::Function { params, .. } => {
                    assert_eq!(params.iter().map(|p| p.name()).collect::<Vec<_>>(), want);
                }
                other => panic!("unexpected expression: {:?}", other),
            }
        }
    }

    #[test]
    fn call_expression() {
        let expr = parse_single_expr("add(1, 2 * 3, 4 + 5);");
        match expr {
            Expr::Call { callee, args } => {
                assert_eq!(callee.to_string(), "add");
                assert_eq!(args.len(), 3);
                assert_eq!(args[1].to_string(), "(2 * 3)");
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn array_literals() {
        assert_eq!(parse_single_expr("[]").to_string(), "[]");
        assert_eq!(
            parse_single_expr("[1, 2 * 2, 3 + 3]").to_string(),
            "[1, (2 * 2), (3 + 3)]"
        );
    }

    #[test]
    fn index_expression() {
        assert_eq!(
            parse_single_expr("myArray[1 + 1]").to_string(),
            "(myArray[(1 + 1)])"
        );
    }

    #[test]
    fn hash_literals() {
        assert_eq!(parse_single_expr("{}"), Expr::Hash(vec![]));
        assert_eq!(
            parse_single_expr(r#"{"one": 1, "two": 2, "three": 3}"#),
            Expr::Hash(vec![
                (Expr::Str("one".to_string()), Expr::Int(1)),
                (Expr::Str("two".to_string()), Expr::Int(2)),
                (Expr::Str("three".to_string()), Expr::Int(3)),
            ])
        );
        assert_eq!(
            parse_single_expr(r#"{"one": 0 + 1, 2: "two", true: 3}"#).to_string(),
            "{one:(0 + 1), 2:two, true:3}"
        );
    }

    #[test]
    fn macro_literal() {
        let expr = parse_single_expr("macro(x, y) { x + y; }");
        match expr {
            Expr::MacroLit { params, body } => {
                assert_eq!(
                    params.iter().map(|p| p.name()).collect::<Vec<_>>(),
                    vec!["x", "y"]
                );
                assert_eq!(body.to_string(), "(x + y)");
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn missing_value_in_let() {
        match parse("let x = ;") {
            Err(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(
                    errors[0].error,
                    ParseError::NoPrefixParseFn(";".to_string())
                );
            }
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn bare_return_is_rejected() {
        match parse("return;") {
            Err(errors) => {
                assert_eq!(
                    errors[0].error,
                    ParseError::NoPrefixParseFn(";".to_string())
                );
            }
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn errors_accumulate_across_statements() {
        match parse("let x 5; let = 10; let 838383;") {
            Err(errors) => {
                assert_eq!(errors.len(), 3, "errors: {:?}", errors);
                assert_eq!(
                    errors[0].error,
                    ParseError::UnexpectedToken("5".to_string(), "=".to_string())
                );
                assert_eq!(errors[1].error, ParseError::ExpectedIdentifier);
                assert_eq!(errors[2].error, ParseError::ExpectedIdentifier);
            }
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn error_carries_line_number() {
        match parse("let a = 1;\nlet b 2;") {
            Err(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].pos, 2);
            }
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn missing_closing_paren() {
        match parse("(1") {
            Err(errors) => {
                assert_eq!(
                    errors[0].error,
                    ParseError::UnexpectedToken("EOF".to_string(), ")".to_string())
                );
            }
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn illegal_token_is_reported() {
        match parse("1 + @;") {
            Err(errors) => {
                assert_eq!(
                    errors[0].error,
                    ParseError::NoPrefixParseFn("@".to_string())
                );
            }
            r => panic!("unexpected output: {:?}", r),
        }
    }
}
