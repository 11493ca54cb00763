//! Tree-walking evaluator.

use std::collections::HashMap;
use std::io::prelude::*;
use std::process;
use std::rc::Rc;

use crate::ast::{self, Block, Expr, InfixOp, PrefixOp, Program, Stmt};
use crate::ctx::Context;
use crate::interner::Symbol;
use crate::object::{Builtin, Env, Function, HashPair, Macro, Object, ObjectKind, RuntimeError};

/// Walks an AST and produces objects.
///
/// Output produced by `puts` goes to the borrowed sink, the globals frame
/// persists across programs, and `is_returning` carries the value of a
/// `return` outward until a function (or program) boundary drains it.
#[derive(Debug)]
pub struct Evaluator<'t, W: Write> {
    output: &'t mut W,
    globals: Rc<Env>,
    builtins: HashMap<Symbol, Builtin>,
    is_returning: Option<Object>,
    quote_sym: Symbol,
    unquote_sym: Symbol,
}

impl<'a, W: Write> Evaluator<'a, W> {
    pub fn new(output: &'a mut W, ctx: Rc<Context>) -> Evaluator<'a, W> {
        let mut builtins = HashMap::new();
        for b in BUILTINS {
            builtins.insert(ctx.symbol(b.name), b);
        }
        Evaluator {
            output,
            globals: Env::new(),
            builtins,
            is_returning: None,
            quote_sym: ctx.symbol("quote"),
            unquote_sym: ctx.symbol("unquote"),
        }
    }

    /// Evaluate a program in the global environment and return the value of
    /// its last statement.  A top-level `return` ends the program early.
    pub fn eval_program(&mut self, program: &Program) -> Result<Object, RuntimeError> {
        let mut result = Object::Null;
        for stmt in &program.stmts {
            result = self.eval_stmt(stmt, self.globals.clone())?;
            if let Some(v) = self.is_returning.take() {
                return Ok(v);
            }
        }
        Ok(result)
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: Rc<Env>) -> Result<Object, RuntimeError> {
        if self.is_returning.is_some() {
            return Ok(Object::Null);
        }

        match stmt {
            Stmt::Let(name, value) => {
                let val = self.eval_expr(value, env.clone())?;
                if self.is_returning.is_none() {
                    env.set(name, val);
                }
                Ok(Object::Null)
            }
            Stmt::Return(value) => {
                let val = self.eval_expr(value, env)?;
                if self.is_returning.is_none() {
                    self.is_returning = Some(val);
                }
                Ok(Object::Null)
            }
            Stmt::Expr(expr) => self.eval_expr(expr, env),
        }
    }

    fn eval_block(&mut self, block: &Block, env: Rc<Env>) -> Result<Object, RuntimeError> {
        let mut result = Object::Null;
        for stmt in &block.stmts {
            result = self.eval_stmt(stmt, env.clone())?;
            if self.is_returning.is_some() {
                break;
            }
        }
        Ok(result)
    }

    /// Evaluate a function or macro body: the block's value, unless a
    /// `return` fired inside, in which case its value is unwrapped here.
    pub(crate) fn eval_body(&mut self, body: &Block, env: Rc<Env>) -> Result<Object, RuntimeError> {
        let result = self.eval_block(body, env)?;
        Ok(match self.is_returning.take() {
            Some(v) => v,
            None => result,
        })
    }

    fn eval_expr(&mut self, expr: &Expr, env: Rc<Env>) -> Result<Object, RuntimeError> {
        if self.is_returning.is_some() {
            return Ok(Object::Null);
        }

        match expr {
            Expr::Int(n) => Ok(Object::Integer(*n)),
            Expr::Bool(b) => Ok(Object::Boolean(*b)),
            Expr::Str(s) => Ok(Object::Str(s.clone())),
            Expr::Ident(sym) => {
                if let Some(val) = env.get(sym) {
                    Ok(val)
                } else if let Some(b) = self.builtins.get(sym) {
                    Ok(Object::Builtin(*b))
                } else {
                    Err(RuntimeError::IdentifierNotFound(sym.name().to_owned()))
                }
            }
            Expr::Prefix(op, right) => {
                let right = self.eval_expr(right, env)?;
                self.eval_prefix(*op, right)
            }
            Expr::Infix(op, left, right) => {
                let left = self.eval_expr(left, env.clone())?;
                let right = self.eval_expr(right, env)?;
                self.eval_infix(*op, left, right)
            }
            Expr::If {
                cond,
                consequence,
                alternative,
            } => {
                // Blocks share the surrounding scope; only calls enclose.
                if self.eval_expr(cond, env.clone())?.is_truthy() {
                    self.eval_block(consequence, env)
                } else if let Some(alt) = alternative {
                    self.eval_block(alt, env)
                } else {
                    Ok(Object::Null)
                }
            }
            Expr::Function { params, body } => Ok(Object::Function(Function {
                params: params.clone(),
                body: body.clone(),
                env,
            })),
            Expr::MacroLit { params, body } => Ok(Object::Macro(Macro {
                params: params.clone(),
                body: body.clone(),
                env,
            })),
            Expr::Call { callee, args } => {
                if let Expr::Ident(sym) = callee.as_ref() {
                    if *sym == self.quote_sym {
                        return self.eval_quote(args, env);
                    }
                }
                let callee = self.eval_expr(callee, env.clone())?;
                let args = args
                    .iter()
                    .map(|a| self.eval_expr(a, env.clone()))
                    .collect::<Result<Vec<Object>, RuntimeError>>()?;
                self.apply(callee, args)
            }
            Expr::Array(elements) => {
                let elements = elements
                    .iter()
                    .map(|e| self.eval_expr(e, env.clone()))
                    .collect::<Result<Vec<Object>, RuntimeError>>()?;
                Ok(Object::Array(elements))
            }
            Expr::Index(collection, index) => {
                let collection = self.eval_expr(collection, env.clone())?;
                let index = self.eval_expr(index, env)?;
                self.eval_index(collection, index)
            }
            Expr::Hash(pairs) => {
                let mut map = HashMap::new();
                for (key_expr, value_expr) in pairs {
                    let key = self.eval_expr(key_expr, env.clone())?;
                    let hash_key = key
                        .hash_key()
                        .ok_or_else(|| RuntimeError::UnusableAsHashKey(key.kind()))?;
                    let value = self.eval_expr(value_expr, env.clone())?;
                    map.insert(hash_key, HashPair { key, value });
                }
                Ok(Object::Hash(map))
            }
        }
    }

    fn eval_prefix(&self, op: PrefixOp, right: Object) -> Result<Object, RuntimeError> {
        match op {
            PrefixOp::Bang => Ok(Object::Boolean(!right.is_truthy())),
            PrefixOp::Minus => match right {
                Object::Integer(n) => Ok(Object::Integer(-n)),
                other => Err(RuntimeError::UnknownPrefixOperator(op, other.kind())),
            },
        }
    }

    fn eval_infix(&self, op: InfixOp, left: Object, right: Object) -> Result<Object, RuntimeError> {
        match (left, right) {
            (Object::Integer(l), Object::Integer(r)) => self.eval_integer_infix(op, l, r),
            (Object::Str(l), Object::Str(r)) => match op {
                InfixOp::Plus => Ok(Object::Str(l + &r)),
                InfixOp::Eq => Ok(Object::Boolean(l == r)),
                InfixOp::NotEq => Ok(Object::Boolean(l != r)),
                _ => Err(RuntimeError::UnknownInfixOperator(
                    ObjectKind::Str,
                    op,
                    ObjectKind::Str,
                )),
            },
            (Object::Boolean(l), Object::Boolean(r)) => match op {
                InfixOp::Eq => Ok(Object::Boolean(l == r)),
                InfixOp::NotEq => Ok(Object::Boolean(l != r)),
                _ => Err(RuntimeError::UnknownInfixOperator(
                    ObjectKind::Boolean,
                    op,
                    ObjectKind::Boolean,
                )),
            },
            // Values of different kinds are never equal to each other.
            (l, r) if l.kind() != r.kind() => match op {
                InfixOp::Eq => Ok(Object::Boolean(false)),
                InfixOp::NotEq => Ok(Object::Boolean(true)),
                _ => Err(RuntimeError::TypeMismatch(l.kind(), op, r.kind())),
            },
            (l, r) => Err(RuntimeError::UnknownInfixOperator(l.kind(), op, r.kind())),
        }
    }

    fn eval_integer_infix(&self, op: InfixOp, l: i64, r: i64) -> Result<Object, RuntimeError> {
        match op {
            InfixOp::Plus => Ok(Object::Integer(l + r)),
            InfixOp::Minus => Ok(Object::Integer(l - r)),
            InfixOp::Asterisk => Ok(Object::Integer(l * r)),
            InfixOp::Slash => {
                if r == 0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(Object::Integer(l / r))
                }
            }
            InfixOp::Lt => Ok(Object::Boolean(l < r)),
            InfixOp::Gt => Ok(Object::Boolean(l > r)),
            InfixOp::Eq => Ok(Object::Boolean(l == r)),
            InfixOp::NotEq => Ok(Object::Boolean(l != r)),
        }
    }

    fn apply(&mut self, callee: Object, args: Vec<Object>) -> Result<Object, RuntimeError> {
        match callee {
            Object::Function(func) => {
                // Parameters bind positionally; arity is not checked, so
                // extra arguments drop and missing ones stay unbound.
                let call_env = Env::with_parent(Some(func.env.clone()));
                for (param, arg) in func.params.iter().zip(args) {
                    call_env.set(param, arg);
                }
                self.eval_body(&func.body, call_env)
            }
            Object::Builtin(b) => (b.func)(&args, &mut *self.output),
            other => Err(RuntimeError::NotAFunction(other.kind())),
        }
    }

    fn eval_index(&self, collection: Object, index: Object) -> Result<Object, RuntimeError> {
        match (collection, index) {
            (Object::Array(elements), Object::Integer(i)) => {
                if i < 0 || i as usize >= elements.len() {
                    Ok(Object::Null)
                } else {
                    Ok(elements[i as usize].clone())
                }
            }
            (Object::Hash(pairs), key) => {
                let hash_key = key
                    .hash_key()
                    .ok_or_else(|| RuntimeError::UnusableAsHashKey(key.kind()))?;
                Ok(pairs
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Object::Null))
            }
            (other, _) => Err(RuntimeError::IndexNotSupported(other.kind())),
        }
    }

    // `quote` is intercepted before its argument is evaluated: instead of
    // producing a value the argument is captured as syntax, with embedded
    // `unquote(e)` calls replaced by the literal image of `e`'s value.
    fn eval_quote(&mut self, args: &[Expr], env: Rc<Env>) -> Result<Object, RuntimeError> {
        if args.len() != 1 {
            return Err(RuntimeError::Builtin(format!(
                "`quote` accepts 1 argument, got {}",
                args.len()
            )));
        }
        let node = self.process_unquotes(args[0].clone(), env)?;
        Ok(Object::Quote(node))
    }

    fn process_unquotes(&mut self, expr: Expr, env: Rc<Env>) -> Result<Expr, RuntimeError> {
        let unquote_sym = self.unquote_sym.clone();
        ast::modify_expr(expr, &mut |e| {
            if let Expr::Call { callee, args } = &e {
                if let Expr::Ident(sym) = callee.as_ref() {
                    if *sym == unquote_sym && args.len() == 1 {
                        let value = self.eval_expr(&args[0], env.clone())?;
                        return object_to_node(value);
                    }
                }
            }
            Ok(e)
        })
    }
}

/// Turn a runtime value back into the syntax that would produce it.
fn object_to_node(obj: Object) -> Result<Expr, RuntimeError> {
    match obj {
        Object::Integer(n) => Ok(Expr::Int(n)),
        Object::Boolean(b) => Ok(Expr::Bool(b)),
        Object::Str(s) => Ok(Expr::Str(s)),
        Object::Quote(node) => Ok(node),
        other => Err(RuntimeError::Unspliceable(other.kind())),
    }
}

const BUILTINS: [Builtin; 7] = [
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "exit",
        func: builtin_exit,
    },
];

fn builtin_len(args: &[Object], _out: &mut dyn Write) -> Result<Object, RuntimeError> {
    if args.len() != 1 {
        return Err(RuntimeError::Builtin(format!(
            "wrong number of arguments, want 1, got {}",
            args.len()
        )));
    }
    match &args[0] {
        Object::Str(s) => Ok(Object::Integer(s.len() as i64)),
        Object::Array(elements) => Ok(Object::Integer(elements.len() as i64)),
        other => Err(RuntimeError::Builtin(format!(
            "argument to `len` not supported, got {}",
            other.kind()
        ))),
    }
}

fn single_array_arg<'o>(
    name: &str,
    args: &'o [Object],
) -> Result<&'o [Object], RuntimeError> {
    if args.len() != 1 {
        return Err(RuntimeError::Builtin(format!(
            "`{}` accepts 1 argument, got {}",
            name,
            args.len()
        )));
    }
    match &args[0] {
        Object::Array(elements) => Ok(elements),
        other => Err(RuntimeError::Builtin(format!(
            "argument to `{}` should be ARRAY, got {}",
            name,
            other.kind()
        ))),
    }
}

fn builtin_first(args: &[Object], _out: &mut dyn Write) -> Result<Object, RuntimeError> {
    let elements = single_array_arg("first", args)?;
    Ok(elements.first().cloned().unwrap_or(Object::Null))
}

fn builtin_last(args: &[Object], _out: &mut dyn Write) -> Result<Object, RuntimeError> {
    let elements = single_array_arg("last", args)?;
    Ok(elements.last().cloned().unwrap_or(Object::Null))
}

fn builtin_rest(args: &[Object], _out: &mut dyn Write) -> Result<Object, RuntimeError> {
    let elements = single_array_arg("rest", args)?;
    if elements.is_empty() {
        Ok(Object::Null)
    } else {
        Ok(Object::Array(elements[1..].to_vec()))
    }
}

fn builtin_push(args: &[Object], _out: &mut dyn Write) -> Result<Object, RuntimeError> {
    if args.len() != 2 {
        return Err(RuntimeError::Builtin(format!(
            "`push` accepts 2 arguments, got {}",
            args.len()
        )));
    }
    match &args[0] {
        Object::Array(elements) => {
            let mut appended = elements.clone();
            appended.push(args[1].clone());
            Ok(Object::Array(appended))
        }
        other => Err(RuntimeError::Builtin(format!(
            "first argument to `push` should be ARRAY, got {}",
            other.kind()
        ))),
    }
}

fn builtin_puts(args: &[Object], out: &mut dyn Write) -> Result<Object, RuntimeError> {
    for arg in args {
        writeln!(out, "{}", arg)?;
    }
    Ok(Object::Null)
}

fn builtin_exit(args: &[Object], _out: &mut dyn Write) -> Result<Object, RuntimeError> {
    if !args.is_empty() {
        return Err(RuntimeError::Builtin(
            "`exit()` doesn't accept arguments".to_string(),
        ));
    }
    process::exit(0);
}
