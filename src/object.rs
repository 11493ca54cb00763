//! Runtime values and the environments that bind them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
use std::rc::Rc;

use crate::ast::{Block, Expr, InfixOp, PrefixOp};
use crate::interner::Symbol;

#[derive(Debug, PartialEq, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    Str(String),
    Null,
    Array(Vec<Object>),
    Hash(HashMap<HashKey, HashPair>),
    Function(Function),
    Builtin(Builtin),
    Quote(Expr),
    Macro(Macro),
}

/// Hash entries keep the original key object around so inspection can show
/// it; lookups go through the fingerprint only.
#[derive(Debug, PartialEq, Clone)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// A user-defined function together with the environment it closed over.
#[derive(Clone)]
pub struct Function {
    pub params: Vec<Symbol>,
    pub body: Block,
    pub env: Rc<Env>,
}

// The captured environment can reach back to this function, so both Debug
// and equality stop at the signature.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish()
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.body == other.body
    }
}

/// Like [`Function`], but applied to unevaluated syntax during expansion.
#[derive(Clone)]
pub struct Macro {
    pub params: Vec<Symbol>,
    pub body: Block,
    pub env: Rc<Env>,
}

impl fmt::Debug for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Macro")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish()
    }
}

impl PartialEq for Macro {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.body == other.body
    }
}

/// Native function exposed to the language.  Receives the evaluator's
/// output sink so printing builtins stay capturable in tests.
pub type BuiltinFn = fn(&[Object], &mut dyn io::Write) -> Result<Object, RuntimeError>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Tag identifying an [`Object`]'s kind, as it appears in error messages.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ObjectKind {
    Integer,
    Boolean,
    Str,
    Null,
    Array,
    Hash,
    Function,
    Builtin,
    Quote,
    Macro,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ObjectKind::Integer => "INTEGER",
            ObjectKind::Boolean => "BOOLEAN",
            ObjectKind::Str => "STRING",
            ObjectKind::Null => "NULL",
            ObjectKind::Array => "ARRAY",
            ObjectKind::Hash => "HASH",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Builtin => "BUILTIN",
            ObjectKind::Quote => "QUOTE",
            ObjectKind::Macro => "MACRO",
        };
        write!(f, "{}", tag)
    }
}

/// Content fingerprint equating hashable values independently of identity.
/// Kinds never collide with each other.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct HashKey {
    kind: ObjectKind,
    value: u64,
}

// FNV-1a, 64 bit.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Integer(_) => ObjectKind::Integer,
            Object::Boolean(_) => ObjectKind::Boolean,
            Object::Str(_) => ObjectKind::Str,
            Object::Null => ObjectKind::Null,
            Object::Array(_) => ObjectKind::Array,
            Object::Hash(_) => ObjectKind::Hash,
            Object::Function(_) => ObjectKind::Function,
            Object::Builtin(_) => ObjectKind::Builtin,
            Object::Quote(_) => ObjectKind::Quote,
            Object::Macro(_) => ObjectKind::Macro,
        }
    }

    /// `null` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Boolean(false))
    }

    /// Fingerprint for use as a hash key; `None` for unhashable kinds.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Integer(n) => Some(HashKey {
                kind: ObjectKind::Integer,
                value: *n as u64,
            }),
            Object::Boolean(b) => Some(HashKey {
                kind: ObjectKind::Boolean,
                value: u64::from(*b),
            }),
            Object::Str(s) => Some(HashKey {
                kind: ObjectKind::Str,
                value: fnv1a_64(s.as_bytes()),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(n) => write!(f, "{}", n),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::Str(s) => write!(f, "{}", s),
            Object::Null => write!(f, "null"),
            Object::Array(elements) => {
                write!(f, "[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            Object::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, pair) in pairs.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Object::Function(func) => {
                write!(f, "fn({}) {{\n{}\n}}", join(&func.params), func.body)
            }
            Object::Builtin(_) => write!(f, "builtin function"),
            Object::Quote(node) => write!(f, "QUOTE({})", node),
            Object::Macro(mac) => {
                write!(f, "macro({}) {{\n{}\n}}", join(&mac.params), mac.body)
            }
        }
    }
}

fn join(params: &[Symbol]) -> String {
    params
        .iter()
        .map(|p| p.name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Nested name→value scopes with parent-pointer lookup.
///
/// Environments are shared: every closure created in a scope keeps that
/// scope alive through its `Rc`.  Children point at parents only.
#[derive(Debug)]
pub struct Env {
    parent: Option<Rc<Env>>,
    bindings: RefCell<HashMap<Symbol, Object>>,
}

impl Env {
    pub fn new() -> Rc<Env> {
        Self::with_parent(None)
    }

    pub fn with_parent(parent: Option<Rc<Env>>) -> Rc<Env> {
        Rc::new(Env {
            parent,
            bindings: RefCell::new(HashMap::new()),
        })
    }

    /// Look `sym` up here, then through the parent chain.
    pub fn get(&self, sym: &Symbol) -> Option<Object> {
        match self.bindings.borrow().get(sym) {
            Some(v) => Some(v.clone()),
            None => self.parent.as_ref().and_then(|p| p.get(sym)),
        }
    }

    /// Bind `sym` in this frame.  Rebinding an existing name overwrites it;
    /// a binding in an inner frame shadows the outer one.
    pub fn set(&self, sym: &Symbol, val: Object) {
        self.bindings.borrow_mut().insert(sym.clone(), val);
    }
}

/// Failures raised while evaluating a program.
///
/// These propagate outward unchanged: whichever operation sees one as a
/// sub-result abandons its own work and passes it along.
#[derive(Debug)]
pub enum RuntimeError {
    IdentifierNotFound(String),
    TypeMismatch(ObjectKind, InfixOp, ObjectKind),
    UnknownInfixOperator(ObjectKind, InfixOp, ObjectKind),
    UnknownPrefixOperator(PrefixOp, ObjectKind),
    DivisionByZero,
    NotAFunction(ObjectKind),
    IndexNotSupported(ObjectKind),
    UnusableAsHashKey(ObjectKind),
    /// A value that has no literal form came back from `unquote`.
    Unspliceable(ObjectKind),
    /// A macro body evaluated to something other than quoted syntax.
    MacroResultNotQuote(ObjectKind),
    /// Preformatted message from a builtin function.
    Builtin(String),
    Io(io::Error),
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::IdentifierNotFound(name) => {
                write!(f, "identifier not found: {}", name)
            }
            RuntimeError::TypeMismatch(left, op, right) => {
                write!(f, "type mismatch: {} {} {}", left, op, right)
            }
            RuntimeError::UnknownInfixOperator(left, op, right) => {
                write!(f, "unknown operator: {} {} {}", left, op, right)
            }
            RuntimeError::UnknownPrefixOperator(op, right) => {
                write!(f, "unknown operator: {}{}", op, right)
            }
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::NotAFunction(kind) => write!(f, "not a function: {}", kind),
            RuntimeError::IndexNotSupported(kind) => {
                write!(f, "index operator not supported: {}", kind)
            }
            RuntimeError::UnusableAsHashKey(kind) => {
                write!(f, "unusable as hash key: {}", kind)
            }
            RuntimeError::Unspliceable(kind) => {
                write!(f, "cannot convert {} into an expression node", kind)
            }
            RuntimeError::MacroResultNotQuote(_) => {
                write!(f, "we only support returning AST-nodes from macros")
            }
            RuntimeError::Builtin(msg) => write!(f, "{}", msg),
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> RuntimeError {
        RuntimeError::Io(e)
    }
}
