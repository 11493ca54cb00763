use std::fmt;

use crate::interner::Symbol;

/// An ordered sequence of top-level statements.
#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Stmt {
    Let(Symbol, Expr),
    Return(Expr),
    Expr(Expr),
}

/// A brace-delimited statement list, the body of `if`, `fn` and `macro`
/// expressions.  Evaluates to the value of its last statement.
#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Ident(Symbol),
    Int(i64),
    Bool(bool),
    Str(String),
    Prefix(PrefixOp, Box<Expr>),
    Infix(InfixOp, Box<Expr>, Box<Expr>),
    If {
        cond: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },
    Function {
        params: Vec<Symbol>,
        body: Block,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Array(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    // Pairs in source order; duplicate keys are resolved at evaluation time.
    Hash(Vec<(Expr, Expr)>),
    MacroLit {
        params: Vec<Symbol>,
        body: Block,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PrefixOp {
    Bang,
    Minus,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InfixOp {
    Plus,
    Minus,
    Asterisk,
    Slash,
    Lt,
    Gt,
    Eq,
    NotEq,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Bang => write!(f, "!"),
            PrefixOp::Minus => write!(f, "-"),
        }
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfixOp::Plus => write!(f, "+"),
            InfixOp::Minus => write!(f, "-"),
            InfixOp::Asterisk => write!(f, "*"),
            InfixOp::Slash => write!(f, "/"),
            InfixOp::Lt => write!(f, "<"),
            InfixOp::Gt => write!(f, ">"),
            InfixOp::Eq => write!(f, "=="),
            InfixOp::NotEq => write!(f, "!="),
        }
    }
}

// The renderings below are canonical: prefix and infix expressions are
// fully parenthesized, so operator precedence is explicit in the output
// and parsing the rendering again yields the same tree.

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.stmts {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Let(name, value) => write!(f, "let {} = {};", name, value),
            Stmt::Return(value) => write!(f, "return {};", value),
            Stmt::Expr(value) => write!(f, "{}", value),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.stmts {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(sym) => write!(f, "{}", sym),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Str(s) => write!(f, "{}", s),
            Expr::Prefix(op, right) => write!(f, "({}{})", op, right),
            Expr::Infix(op, left, right) => write!(f, "({} {} {})", left, op, right),
            Expr::If {
                cond,
                consequence,
                alternative,
            } => {
                write!(f, "if{} {}", cond, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, "else {}", alt)?;
                }
                Ok(())
            }
            Expr::Function { params, body } => {
                write!(f, "fn({}){}", join(params), body)
            }
            Expr::Call { callee, args } => {
                write!(f, "{}({})", callee, join(args))
            }
            Expr::Array(elements) => write!(f, "[{}]", join(elements)),
            Expr::Index(collection, index) => write!(f, "({}[{}])", collection, index),
            Expr::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}:{}", key, value)?;
                }
                write!(f, "}}")
            }
            Expr::MacroLit { params, body } => {
                write!(f, "macro({}){}", join(params), body)
            }
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(T::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rebuilds a program bottom-up, applying `f` to every expression after its
/// children have been rebuilt.  Nothing is modified in place; quote
/// processing and macro expansion both splice subtrees through this.
pub fn modify_program<E, F>(program: Program, f: &mut F) -> Result<Program, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    let stmts = program
        .stmts
        .into_iter()
        .map(|s| modify_stmt(s, f))
        .collect::<Result<Vec<_>, E>>()?;
    Ok(Program { stmts })
}

pub fn modify_stmt<E, F>(stmt: Stmt, f: &mut F) -> Result<Stmt, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    Ok(match stmt {
        Stmt::Let(name, value) => Stmt::Let(name, modify_expr(value, f)?),
        Stmt::Return(value) => Stmt::Return(modify_expr(value, f)?),
        Stmt::Expr(value) => Stmt::Expr(modify_expr(value, f)?),
    })
}

fn modify_block<E, F>(block: Block, f: &mut F) -> Result<Block, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    let stmts = block
        .stmts
        .into_iter()
        .map(|s| modify_stmt(s, f))
        .collect::<Result<Vec<_>, E>>()?;
    Ok(Block { stmts })
}

pub fn modify_expr<E, F>(expr: Expr, f: &mut F) -> Result<Expr, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    let expr = match expr {
        Expr::Prefix(op, right) => Expr::Prefix(op, Box::new(modify_expr(*right, f)?)),
        Expr::Infix(op, left, right) => Expr::Infix(
            op,
            Box::new(modify_expr(*left, f)?),
            Box::new(modify_expr(*right, f)?),
        ),
        Expr::If {
            cond,
            consequence,
            alternative,
        } => Expr::If {
            cond: Box::new(modify_expr(*cond, f)?),
            consequence: modify_block(consequence, f)?,
            alternative: match alternative {
                Some(alt) => Some(modify_block(alt, f)?),
                None => None,
            },
        },
        Expr::Function { params, body } => Expr::Function {
            params,
            body: modify_block(body, f)?,
        },
        Expr::MacroLit { params, body } => Expr::MacroLit {
            params,
            body: modify_block(body, f)?,
        },
        Expr::Call { callee, args } => Expr::Call {
            callee: Box::new(modify_expr(*callee, f)?),
            args: args
                .into_iter()
                .map(|a| modify_expr(a, f))
                .collect::<Result<Vec<_>, E>>()?,
        },
        Expr::Array(elements) => Expr::Array(
            elements
                .into_iter()
                .map(|e| modify_expr(e, f))
                .collect::<Result<Vec<_>, E>>()?,
        ),
        Expr::Index(collection, index) => Expr::Index(
            Box::new(modify_expr(*collection, f)?),
            Box::new(modify_expr(*index, f)?),
        ),
        Expr::Hash(pairs) => Expr::Hash(
            pairs
                .into_iter()
                .map(|(k, v)| Ok((modify_expr(k, f)?, modify_expr(v, f)?)))
                .collect::<Result<Vec<_>, E>>()?,
        ),
        leaf @ (Expr::Ident(_) | Expr::Int(_) | Expr::Bool(_) | Expr::Str(_)) => leaf,
    };
    f(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Context;

    #[test]
    fn display_let_statement() {
        let ctx = Context::new();
        let program = Program {
            stmts: vec![Stmt::Let(
                ctx.symbol("myVar"),
                Expr::Ident(ctx.symbol("anotherVar")),
            )],
        };
        assert_eq!(program.to_string(), "let myVar = anotherVar;");
    }

    #[test]
    fn display_literals_and_operators() {
        let expr = Expr::Infix(
            InfixOp::Plus,
            Box::new(Expr::Int(1)),
            Box::new(Expr::Prefix(PrefixOp::Minus, Box::new(Expr::Int(2)))),
        );
        assert_eq!(expr.to_string(), "(1 + (-2))");
    }

    #[test]
    fn display_collections() {
        let array = Expr::Array(vec![Expr::Int(1), Expr::Int(2), Expr::Int(3)]);
        assert_eq!(array.to_string(), "[1, 2, 3]");

        let hash = Expr::Hash(vec![
            (Expr::Str("one".to_string()), Expr::Int(1)),
            (Expr::Str("two".to_string()), Expr::Int(2)),
        ]);
        assert_eq!(hash.to_string(), "{one:1, two:2}");

        let index = Expr::Index(Box::new(array), Box::new(Expr::Int(0)));
        assert_eq!(index.to_string(), "([1, 2, 3][0])");
    }

    #[test]
    fn display_function_literal() {
        let ctx = Context::new();
        let func = Expr::Function {
            params: vec![ctx.symbol("x"), ctx.symbol("y")],
            body: Block {
                stmts: vec![Stmt::Expr(Expr::Infix(
                    InfixOp::Plus,
                    Box::new(Expr::Ident(ctx.symbol("x"))),
                    Box::new(Expr::Ident(ctx.symbol("y"))),
                ))],
            },
        };
        assert_eq!(func.to_string(), "fn(x, y)(x + y)");
    }

    // One-to-two rewriting through every container shape, checking that
    // the rewriter reaches children before replacing them.
    #[test]
    fn modify_reaches_every_expression() -> Result<(), ()> {
        let ctx = Context::new();
        let one = || Expr::Int(1);
        let two = || Expr::Int(2);
        let mut turn_one_into_two = |e: Expr| -> Result<Expr, ()> {
            match e {
                Expr::Int(1) => Ok(Expr::Int(2)),
                other => Ok(other),
            }
        };

        let cases: Vec<(Expr, Expr)> = vec![
            (one(), two()),
            (
                Expr::Infix(InfixOp::Plus, Box::new(one()), Box::new(one())),
                Expr::Infix(InfixOp::Plus, Box::new(two()), Box::new(two())),
            ),
            (
                Expr::Prefix(PrefixOp::Minus, Box::new(one())),
                Expr::Prefix(PrefixOp::Minus, Box::new(two())),
            ),
            (
                Expr::Index(Box::new(one()), Box::new(one())),
                Expr::Index(Box::new(two()), Box::new(two())),
            ),
            (
                Expr::If {
                    cond: Box::new(one()),
                    consequence: Block {
                        stmts: vec![Stmt::Expr(one())],
                    },
                    alternative: Some(Block {
                        stmts: vec![Stmt::Expr(one())],
                    }),
                },
                Expr::If {
                    cond: Box::new(two()),
                    consequence: Block {
                        stmts: vec![Stmt::Expr(two())],
                    },
                    alternative: Some(Block {
                        stmts: vec![Stmt::Expr(two())],
                    }),
                },
            ),
            (
                Expr::Function {
                    params: vec![],
                    body: Block {
                        stmts: vec![Stmt::Return(one())],
                    },
                },
                Expr::Function {
                    params: vec![],
                    body: Block {
                        stmts: vec![Stmt::Return(two())],
                    },
                },
            ),
            (
                Expr::Array(vec![one(), one()]),
                Expr::Array(vec![two(), two()]),
            ),
            (
                Expr::Hash(vec![(one(), one())]),
                Expr::Hash(vec![(two(), two())]),
            ),
            (
                Expr::Call {
                    callee: Box::new(Expr::Ident(ctx.symbol("f"))),
                    args: vec![one()],
                },
                Expr::Call {
                    callee: Box::new(Expr::Ident(ctx.symbol("f"))),
                    args: vec![two()],
                },
            ),
        ];

        for (input, want) in cases {
            assert_eq!(modify_expr(input, &mut turn_one_into_two)?, want);
        }
        Ok(())
    }

    #[test]
    fn modify_rewrites_statements() -> Result<(), ()> {
        let ctx = Context::new();
        let program = Program {
            stmts: vec![Stmt::Let(ctx.symbol("x"), Expr::Int(1))],
        };
        let got = modify_program(program, &mut |e: Expr| -> Result<Expr, ()> {
            match e {
                Expr::Int(1) => Ok(Expr::Int(2)),
                other => Ok(other),
            }
        })?;
        assert_eq!(
            got,
            Program {
                stmts: vec![Stmt::Let(ctx.symbol("x"), Expr::Int(2))],
            }
        );
        Ok(())
    }
}
