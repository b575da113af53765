//! Rewrite rules.

use crate::error::{Error, PatternError};
use crate::pattern::{Pattern, TopPattern};
use crate::symbol::Symbol;
use crate::term::{Name, RTerm};
use std::fmt;

/// Name of a rewrite rule, as seen by rule selectors and the
/// reduction logger.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum RuleName {
    /// unfolding rule of a definition
    Delta(Symbol),
    /// user rule, numbered per head symbol in order of admission
    Gamma(Symbol, usize),
}

impl RuleName {
    /// The head symbol whose rewrite tree contains this rule.
    pub fn symbol(&self) -> &Symbol {
        match self {
            Self::Delta(s) | Self::Gamma(s, _) => s,
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Delta(s) => write!(f, "δ({})", s),
            Self::Gamma(s, i) => write!(f, "{}.{}", s, i),
        }
    }
}

/// Rewrite rule as delivered by the scoping of the surface syntax:
/// the context lists the pattern variables with optional type
/// annotations, and nothing has been verified yet.
#[derive(Clone, Debug)]
pub struct Untyped {
    /// pattern variables bound by the rule, innermost last
    pub ctx: Vec<(Name, Option<RTerm>)>,
    /// left-hand side (pattern to match with)
    pub lhs: Pattern,
    /// right-hand side (term to replace with)
    pub rhs: RTerm,
}

/// Type-checked rewrite rule, ready for tree compilation.
///
/// Pattern variables appear in the left- and right-hand sides as
/// bound variables; variable `i` of the context corresponds to the
/// de Bruijn index `i` at the root of the rule.
#[derive(Clone, Debug)]
pub struct Rule {
    pub name: RuleName,
    /// pattern variables with their inferred types
    pub ctx: Vec<(Name, RTerm)>,
    pub lhs: TopPattern,
    pub rhs: RTerm,
    /// number of arguments each pattern variable carries on the
    /// left-hand side; right-hand side occurrences must apply at
    /// least as many
    pub arities: Vec<usize>,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ⟶ {}", self.lhs, self.rhs)
    }
}

/// Outcome of admitting an untyped rule:
/// the left-hand side is a proper top pattern, jokers are numbered,
/// brackets are expressed in the rule frame, and
/// the per-variable arities are known.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub ctx: Vec<(Name, Option<RTerm>)>,
    pub lhs: TopPattern,
    pub rhs: RTerm,
    pub arities: Vec<usize>,
}

impl Untyped {
    /// Validate the rule's pattern restrictions.
    ///
    /// This enforces the Miller fragment:
    /// pattern variables may be applied only to distinct variables
    /// bound inside the pattern, repeated occurrences of a variable
    /// must agree on their arguments, every context variable must
    /// occur in the left-hand side, and bracket guards may mention
    /// context variables only.
    pub fn prepare(self) -> Result<Prepared, Error> {
        let lhs = TopPattern::try_from(self.lhs)
            .map_err(|_| PatternError::AVariableIsNotAPattern)?;

        let mut st = Occurrences {
            ctx_len: self.ctx.len(),
            seen: vec![None; self.ctx.len()],
            jokers: 0,
        };
        let args = lhs.args.into_iter().map(|p| st.walk(p, 0));
        let args = args.collect::<Result<Vec<_>, _>>()?;
        let lhs = TopPattern { symbol: lhs.symbol, args };

        let mut arities = Vec::with_capacity(self.ctx.len());
        for (m, occ) in st.seen.into_iter().enumerate() {
            match occ {
                Some(args) => arities.push(args.len()),
                None => {
                    let name = self.ctx[m].0.to_string();
                    return Err(PatternError::UnboundVariable(name).into());
                }
            }
        }

        Ok(Prepared {
            ctx: self.ctx,
            lhs,
            rhs: self.rhs,
            arities,
        })
    }
}

/// Traversal state for pattern validation.
struct Occurrences {
    ctx_len: usize,
    /// argument list of the first occurrence of each pattern variable
    seen: Vec<Option<Vec<usize>>>,
    jokers: usize,
}

impl Occurrences {
    fn walk(&mut self, p: Pattern, depth: usize) -> Result<Pattern, Error> {
        match p {
            Pattern::MVar(m, args) => {
                if m >= self.ctx_len {
                    return Err(PatternError::UnboundVariable(format!("μ{}", m)).into());
                }
                if args.iter().any(|a| *a >= depth) {
                    return Err(PatternError::BoundVariableExpected.into());
                }
                let distinct = args
                    .iter()
                    .enumerate()
                    .all(|(i, a)| !args[..i].contains(a));
                if !distinct {
                    return Err(PatternError::DistinctBoundVariablesExpected.into());
                }
                match &self.seen[m] {
                    None => self.seen[m] = Some(args.clone()),
                    Some(prev) if *prev == args => (),
                    Some(_) => return Err(PatternError::NonLinearNonEqArguments.into()),
                }
                Ok(Pattern::MVar(m, args))
            }
            Pattern::Symb(s, args) => {
                let args = args.into_iter().map(|p| self.walk(p, depth));
                Ok(Pattern::Symb(s, args.collect::<Result<_, _>>()?))
            }
            Pattern::BVar(n, args) => {
                if n >= depth {
                    return Err(PatternError::AVariableIsNotAPattern.into());
                }
                let args = args.into_iter().map(|p| self.walk(p, depth));
                Ok(Pattern::BVar(n, args.collect::<Result<_, _>>()?))
            }
            Pattern::Abst(body) => {
                let body = self.walk(*body, depth + 1)?;
                Ok(Pattern::Abst(Box::new(body)))
            }
            Pattern::Bracket(tm) => {
                // guards may mention rule variables, but nothing
                // bound by an abstraction inside the pattern
                let tm = tm
                    .try_unshift(depth)
                    .map_err(|_| PatternError::VariableBoundOutsideTheGuard)?;
                Ok(Pattern::Bracket(tm))
            }
            Pattern::Joker(_) => {
                let i = self.jokers;
                self.jokers += 1;
                Ok(Pattern::Joker(i))
            }
        }
    }
}

/// Number of jokers occurring in a pattern, used by the tree
/// compiler to continue the numbering when padding columns.
pub(crate) fn joker_count(pats: &[Pattern]) -> usize {
    pats.iter()
        .map(|p| match p {
            Pattern::Joker(_) => 1,
            Pattern::Symb(_, args) | Pattern::BVar(_, args) => joker_count(args),
            Pattern::Abst(body) => joker_count(std::slice::from_ref(&**body)),
            _ => 0,
        })
        .sum()
}
