//! Macro collection and call-site expansion, run between parsing and
//! evaluation.

use std::io::prelude::*;
use std::rc::Rc;

use crate::ast::{self, Expr, Program, Stmt};
use crate::eval::Evaluator;
use crate::object::{Env, Macro, Object, RuntimeError};

/// First pass: collect top-level `let NAME = macro(...) {...}` statements
/// into `env` and return the program without them.  Macro definitions
/// nested inside blocks are not collected.
pub fn define_macros(program: Program, env: &Rc<Env>) -> Program {
    let stmts = program
        .stmts
        .into_iter()
        .filter_map(|stmt| match stmt {
            Stmt::Let(name, Expr::MacroLit { params, body }) => {
                env.set(
                    &name,
                    Object::Macro(Macro {
                        params,
                        body,
                        env: env.clone(),
                    }),
                );
                None
            }
            other => Some(other),
        })
        .collect();
    Program { stmts }
}

/// Second pass: rewrite every call whose callee resolves in `env` to a
/// macro.  The macro body runs with its parameters bound to the *quoted*
/// argument expressions and must itself produce quoted syntax, which is
/// spliced into the tree at the call site.
pub fn expand_macros<W: Write>(
    program: Program,
    env: &Rc<Env>,
    evaluator: &mut Evaluator<'_, W>,
) -> Result<Program, RuntimeError> {
    ast::modify_program(program, &mut |expr| match expr {
        Expr::Call { callee, args } => {
            let mac = match callee.as_ref() {
                Expr::Ident(sym) => match env.get(sym) {
                    Some(Object::Macro(mac)) => mac,
                    _ => return Ok(Expr::Call { callee, args }),
                },
                _ => return Ok(Expr::Call { callee, args }),
            };

            let expand_env = Env::with_parent(Some(mac.env.clone()));
            for (param, arg) in mac.params.iter().zip(args) {
                expand_env.set(param, Object::Quote(arg));
            }

            match evaluator.eval_body(&mac.body, expand_env)? {
                Object::Quote(node) => Ok(node),
                other => Err(RuntimeError::MacroResultNotQuote(other.kind())),
            }
        }
        other => Ok(other),
    })
}
