//! API to control the interpreter.

use std::error::Error;
use std::fmt;
use std::io::prelude::*;
use std::rc::Rc;

use crate::ctx::Context;
use crate::diag::FullParseError;
use crate::eval::Evaluator;
use crate::expand::{define_macros, expand_macros};
use crate::object::{Env, Object, RuntimeError};
use crate::parser::Parser;

/// Tree-walk interpreter session.
///
/// Each call to [`eval`](Interpreter::eval) runs the full pipeline — parse,
/// collect and expand macros, evaluate — against state that persists across
/// calls: the global environment, the macro environment and the interned
/// names all live as long as the session.
///
/// # Example
///
/// Invoke the interpreter a first time to define a function then again to
/// call it:
///
/// ```
/// # use monkey::interpreter::Interpreter;
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// let max_def = r#"
///     let max = fn(x, y) {
///         if (x > y) { x } else { y }
///     };
/// "#;
/// interp.eval(max_def).expect("interpreter error");
///
/// let result = interp.eval("max(10, 20)").expect("interpreter error");
/// assert_eq!(result.to_string(), "20");
/// ```
#[derive(Debug)]
pub struct Interpreter<'t, W: Write> {
    ctx: Rc<Context>,
    macro_env: Rc<Env>,
    evaluator: Evaluator<'t, W>,
}

/// Errors the interpreter can raise.
#[derive(Debug)]
pub enum MonkeyError {
    /// Everything the parser collected while reading the input.
    Parse(Vec<FullParseError>),

    /// Error occurring during macro expansion or evaluation.
    Runtime(RuntimeError),
}

impl fmt::Display for MonkeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonkeyError::Parse(errors) => {
                write!(f, "parser errors:")?;
                for e in errors {
                    write!(f, "\n\t{}", e)?;
                }
                Ok(())
            }
            MonkeyError::Runtime(e) => write!(f, "ERROR: {}", e),
        }
    }
}

impl Error for MonkeyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MonkeyError::Parse(_) => None,
            MonkeyError::Runtime(e) => Some(e),
        }
    }
}

impl From<RuntimeError> for MonkeyError {
    fn from(e: RuntimeError) -> MonkeyError {
        MonkeyError::Runtime(e)
    }
}

impl<W: Write> Interpreter<'_, W> {
    pub fn new(output: &mut W) -> Interpreter<'_, W> {
        let ctx = Context::new();
        Interpreter {
            ctx: ctx.clone(),
            macro_env: Env::new(),
            evaluator: Evaluator::new(output, ctx),
        }
    }

    /// Run `input` through parse → macro definition → macro expansion →
    /// evaluation and return the resulting object.
    pub fn eval(&mut self, input: &str) -> Result<Object, MonkeyError> {
        let mut parser = Parser::new(input, self.ctx.clone());
        let program = parser.parse_program().map_err(MonkeyError::Parse)?;
        let program = define_macros(program, &self.macro_env);
        let program = expand_macros(program, &self.macro_env, &mut self.evaluator)?;
        Ok(self.evaluator.eval_program(&program)?)
    }
}
