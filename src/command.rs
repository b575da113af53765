//! Commands accepted by the environment façade.

use crate::reduce::Config;
use crate::rule::Untyped;
use crate::signature::Staticity;
use crate::symbol::Symbol;
use crate::term::RTerm;
use std::fmt;

/// A command, as delivered by the surface-syntax scoping.
pub enum Command {
    /// introduce a symbol without a body
    Decl(Symbol, Staticity, RTerm),
    /// introduce a symbol with a body;
    /// unless opaque, the body is registered as an unfolding rule
    Def {
        name: Symbol,
        opaque: bool,
        ty: Option<RTerm>,
        tm: RTerm,
    },
    /// add rewrite rules
    Rules(Vec<Untyped>),
    /// reduce a term
    Eval(Config, RTerm),
    /// infer the type of a term, then reduce it
    Infer(Config, RTerm),
    /// test a judgement, optionally negated,
    /// optionally failing the entry stream
    Check {
        assert: bool,
        neg: bool,
        test: Test,
    },
    /// show the rewrite tree of a symbol
    DTree(Symbol),
    /// output a message
    Print(String),
    /// set the name of the current module
    Name(String),
    /// record a dependency on another module
    Require(String),
}

/// Judgement tested by [`Command::Check`].
pub enum Test {
    Convert(RTerm, RTerm),
    HasType(RTerm, RTerm),
}

/// Result of a query command; introductions produce no output.
#[derive(Debug)]
pub enum Output {
    Evaled(RTerm),
    Inferred(RTerm),
    Checked(bool),
    Tree(String),
    Printed(String),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Evaled(tm) | Self::Inferred(tm) => tm.fmt(f),
            Self::Checked(ok) => ok.fmt(f),
            Self::Tree(s) | Self::Printed(s) => s.fmt(f),
        }
    }
}
