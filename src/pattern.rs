//! Rewrite patterns.

use crate::fmt::application as fmt_appl;
use crate::symbol::Symbol;
use crate::term::{DeBruijn, RTerm, Term};
use std::fmt;

/// Miller variable.
///
/// This refers to the variables appearing in a rewrite pattern
/// bound by the rewrite rule's context. A Miller variable may be
/// applied to distinct variables bound by abstractions inside the
/// pattern; such applications admit unique most general solutions.
///
/// Reference:
/// Dale Miller:
/// A Logic Programming Language with Lambda-Abstraction,
/// Function Variables, and Simple Unification.
/// J. Log. Comput. 1(4): 497-536 (1991).
/// doi: [10.1093/logcom/1.4.497](https://doi.org/10.1093/logcom/1.4.497)
pub type Miller = usize;

/// Rewrite pattern.
///
/// This may be nonlinear; e.g. `eq X X` is a valid pattern.
/// Variables bound by the rule context appear as [`Pattern::MVar`],
/// variables bound by abstractions inside the pattern as
/// [`Pattern::BVar`]; the latter match rigidly.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// matches an application of a symbol
    Symb(Symbol, Vec<Pattern>),
    /// matches an application of a variable bound inside the pattern
    BVar(DeBruijn, Vec<Pattern>),
    /// matches any term; the variable may be applied to
    /// distinct pattern-bound variables and may appear multiple times
    MVar(Miller, Vec<DeBruijn>),
    /// matches under an abstraction
    Abst(Box<Pattern>),
    /// matches any term convertible with the enclosed term
    Bracket(RTerm),
    /// matches any term, without binding it
    Joker(usize),
}

/// Pattern at the left-hand side of a rewrite rule.
///
/// The top pattern of a rule must be an application of patterns to a
/// symbol. This is to exclude rules matching any term, such as
/// `[X] X --> f`.
#[derive(Clone, Debug)]
pub struct TopPattern {
    pub symbol: Symbol,
    pub args: Vec<Pattern>,
}

impl From<Symbol> for TopPattern {
    fn from(symbol: Symbol) -> Self {
        let args = Vec::new();
        Self { symbol, args }
    }
}

impl From<TopPattern> for Pattern {
    fn from(tp: TopPattern) -> Self {
        Self::Symb(tp.symbol, tp.args)
    }
}

impl TryFrom<Pattern> for TopPattern {
    type Error = ();

    fn try_from(p: Pattern) -> Result<Self, Self::Error> {
        match p {
            Pattern::Symb(symbol, args) => Ok(TopPattern { symbol, args }),
            _ => Err(()),
        }
    }
}

impl Pattern {
    /// An unapplied pattern variable.
    pub fn var(m: Miller) -> Self {
        Self::MVar(m, Vec::new())
    }

    /// Is this a pattern that matches without inspecting the term?
    pub(crate) fn is_wildcard(&self) -> bool {
        matches!(self, Self::MVar(..) | Self::Joker(_) | Self::Bracket(_))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Symb(s, pats) => fmt_appl(&Term::Symb(s.clone()), pats, f),
            Self::BVar(x, pats) => fmt_appl(&Term::BVar(*x), pats, f),
            Self::MVar(m, args) => {
                write!(f, "μ{}", m)?;
                for a in args {
                    write!(f, " β{}", a)?;
                }
                Ok(())
            }
            Self::Abst(body) => write!(f, "(λ {})", body),
            Self::Bracket(tm) => write!(f, "{{{}}}", tm),
            Self::Joker(_) => write!(f, "_"),
        }
    }
}

impl fmt::Display for TopPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_appl(&Term::Symb(self.symbol.clone()), &self.args, f)
    }
}
