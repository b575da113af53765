//! Common error type.

use crate::stack::Stack;
use crate::symbol::Symbol;
use crate::term::RTerm;
use std::fmt;

/// Common error type.
#[derive(Clone, Debug)]
pub enum Error {
    Signature(SignatureError),
    Pattern(PatternError),
    Tree(TreeError),
    Reduce(ReduceError),
    Typing(TypingError),
    Env(EnvError),
}

/// Error in the symbol-to-declaration mapping.
#[derive(Clone, Debug)]
pub enum SignatureError {
    SymbolNotFound(Symbol),
    AlreadyDefined(Symbol),
    CannotRewriteStaticSymbol(Symbol),
    ConfluenceCheckFailed,
}

/// Violation of the pattern restrictions at rule admission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PatternError {
    /// a pattern variable is applied to something that is not
    /// a variable bound inside the pattern
    BoundVariableExpected,
    /// a pattern variable is applied to the same variable twice
    DistinctBoundVariablesExpected,
    /// repeated occurrences of a pattern variable with
    /// different argument lists
    NonLinearNonEqArguments,
    /// a context variable does not occur in the left-hand side
    UnboundVariable(String),
    /// the left-hand side is headed by a variable
    AVariableIsNotAPattern,
    /// a bracket guard mentions a variable bound inside the pattern
    VariableBoundOutsideTheGuard,
}

/// Failure to compile a rule set into a rewrite tree.
#[derive(Clone, Debug)]
pub enum TreeError {
    /// the rules do not share their head symbol
    HeadSymbolMismatch,
    /// a definable symbol occurs at the same position with
    /// different numbers of arguments across rules
    ArityInnerMismatch(Symbol),
}

/// Failure during rewriting.
#[derive(Clone, Debug)]
pub enum ReduceError {
    /// a matched sub-term is not convertible with its bracket guard;
    /// the pair holds the found and the expected term
    GuardNotSatisfied(Box<(RTerm, RTerm)>),
}

/// Failure of the typing judgement.
#[derive(Clone, Debug)]
pub enum TypingError {
    KindNotTypable,
    SortExpected,
    ProductExpected,
    UnexpectedKind,
    DomainFreeAbstraction,
    VariableNotFound(usize),
    BindNoType,
    Unconvertible(Box<Conflict>),
    CannotInferTypeOfPattern,
    UnsatisfiableConstraints,
    NotEnoughArguments {
        var: String,
        declared: usize,
        used: usize,
    },
    KindLevelDefinition,
}

/// Expected and inferred type of a term that failed checking,
/// together with the types of the bound variables in scope,
/// so that the indices in the three terms can be resolved.
#[derive(Clone, Debug)]
pub struct Conflict {
    pub term: RTerm,
    pub ctx: Stack<RTerm>,
    pub expected: RTerm,
    pub inferred: RTerm,
}

/// Failure raised by the command façade.
#[derive(Clone, Debug)]
pub enum EnvError {
    AssertionFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Signature(err) => err.fmt(f),
            Self::Pattern(err) => err.fmt(f),
            Self::Tree(err) => err.fmt(f),
            Self::Reduce(err) => err.fmt(f),
            Self::Typing(err) => err.fmt(f),
            Self::Env(err) => err.fmt(f),
        }
    }
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SymbolNotFound(s) => write!(f, "symbol {} not found", s),
            Self::AlreadyDefined(s) => write!(f, "symbol {} already defined", s),
            Self::CannotRewriteStaticSymbol(s) => {
                write!(f, "cannot add rewrite rules to static symbol {}", s)
            }
            Self::ConfluenceCheckFailed => write!(f, "confluence check failed"),
        }
    }
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BoundVariableExpected => {
                write!(f, "pattern variables may be applied to bound variables only")
            }
            Self::DistinctBoundVariablesExpected => {
                write!(f, "pattern variables may be applied to distinct variables only")
            }
            Self::NonLinearNonEqArguments => {
                write!(f, "nonlinear variable occurs with different arguments")
            }
            Self::UnboundVariable(x) => {
                write!(f, "variable {} does not occur in the pattern", x)
            }
            Self::AVariableIsNotAPattern => write!(f, "a variable is not a pattern"),
            Self::VariableBoundOutsideTheGuard => {
                write!(f, "guard mentions a variable bound outside of it")
            }
        }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::HeadSymbolMismatch => write!(f, "rules do not share their head symbol"),
            Self::ArityInnerMismatch(s) => {
                write!(f, "symbol {} occurs with different arities across rules", s)
            }
        }
    }
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::GuardNotSatisfied(pair) => {
                let (found, expected) = &**pair;
                write!(f, "guard not satisfied: {} is not {}", found, expected)
            }
        }
    }
}

impl fmt::Display for TypingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::KindNotTypable => write!(f, "Kind is not typable"),
            Self::SortExpected => write!(f, "sort expected"),
            Self::ProductExpected => write!(f, "product expected"),
            Self::UnexpectedKind => write!(f, "unexpected Kind"),
            Self::DomainFreeAbstraction => write!(f, "domain-free abstraction"),
            Self::VariableNotFound(x) => write!(f, "variable β{} not found", x),
            Self::BindNoType => write!(f, "bound type is not a type"),
            Self::Unconvertible(c) => write!(
                f,
                "term {} has type {}, but {} was expected when {}",
                c.term, c.inferred, c.expected, c.ctx
            ),
            Self::CannotInferTypeOfPattern => write!(f, "cannot infer type of pattern"),
            Self::UnsatisfiableConstraints => write!(f, "unsatisfiable typing constraints"),
            Self::NotEnoughArguments {
                var,
                declared,
                used,
            } => write!(
                f,
                "variable {} occurs with {} arguments, but at least {} are required",
                var, used, declared
            ),
            Self::KindLevelDefinition => write!(f, "cannot define a symbol at the level of Kind"),
        }
    }
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::AssertionFailed => write!(f, "assertion failed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<SignatureError> for Error {
    fn from(err: SignatureError) -> Self {
        Self::Signature(err)
    }
}

impl From<PatternError> for Error {
    fn from(err: PatternError) -> Self {
        Self::Pattern(err)
    }
}

impl From<TreeError> for Error {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<ReduceError> for Error {
    fn from(err: ReduceError) -> Self {
        Self::Reduce(err)
    }
}

impl From<TypingError> for Error {
    fn from(err: TypingError) -> Self {
        Self::Typing(err)
    }
}

impl From<EnvError> for Error {
    fn from(err: EnvError) -> Self {
        Self::Env(err)
    }
}
