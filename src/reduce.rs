//! Reduction to weak head normal form, including rewriting.

use crate::dtree::{Atom, Case, DTree, Guard, Problem};
use crate::error::{Error, ReduceError};
use crate::matching;
use crate::rule::RuleName;
use crate::signature::Signature;
use crate::state::{Bindings, LazyTerm, Machine, MachineRef, Stack};
use crate::term::{RTerm, Term};
use std::cell::Cell;
use std::rc::Rc;

/// Predicate deciding which rules may fire.
pub type Selector = Rc<dyn Fn(&RuleName) -> bool>;

/// Callback invoked on every rule firing with
/// the ordinal of the firing, the rule's name, and
/// the contractum as a lazy term.
pub type Logger = Rc<dyn Fn(usize, &RuleName, &LazyTerm)>;

/// Normal form targeted by a reduction query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Target {
    #[default]
    Whnf,
    Snf,
}

/// How eagerly the machine treats arguments of an application.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Strategy {
    /// push argument states unevaluated (call-by-need)
    #[default]
    ByName,
    /// reduce argument states to whnf when unloading an application
    ByValue,
    /// reduce arguments to snf when unloading an application
    ByStrongValue,
}

/// Reduction configuration, recognised at query level and
/// carried by the signature.
///
/// The signature is cloned per query to overlay a config, so that
/// re-entrant reduction (guard evaluation during rewriting)
/// sees the same flags and draws from the same step budget.
#[derive(Clone)]
pub struct Config {
    /// fire only rules admitted by this predicate
    pub select: Option<Selector>,
    /// enable beta reduction
    pub beta: bool,
    pub target: Target,
    pub strategy: Strategy,
    /// overall bound on beta and gamma firings;
    /// when it is exhausted, the current state is returned as is
    pub limit: Option<Rc<Cell<usize>>>,
    pub logger: Option<Logger>,
    /// ordinal of the next firing, reported to the logger
    pub fired: Rc<Cell<usize>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            select: None,
            beta: true,
            target: Target::default(),
            strategy: Strategy::default(),
            limit: None,
            logger: None,
            fired: Rc::new(Cell::new(0)),
        }
    }
}

impl Config {
    /// Bound the number of beta and gamma firings.
    pub fn with_limit(mut self, n: usize) -> Self {
        self.limit = Some(Rc::new(Cell::new(n)));
        self
    }
}

/// Take one step from the budget; false if it is exhausted.
fn spend(sig: &Signature) -> bool {
    match &sig.cfg.limit {
        None => true,
        Some(steps) => {
            let n = steps.get();
            if n == 0 {
                false
            } else {
                steps.set(n - 1);
                true
            }
        }
    }
}

impl Machine {
    /// Evaluate the machine to its weak head normal form.
    ///
    /// The machine loops over the following steps:
    /// sorts, products, and unapplied abstractions are returned as is;
    /// a bound variable is replaced by its environment entry
    /// (or lowered past the environment if it is free);
    /// an abstraction applied to a stack consumes its topmost element
    /// (beta); an application unloads its arguments onto the stack;
    /// and for a symbol, the signature's rewrite tree is walked
    /// on the topmost pivot-many stack elements (gamma).
    pub fn whnf(&mut self, sig: &Signature) -> Result<(), Error> {
        loop {
            trace!("whnf: {}", self.term);
            match &*self.term.clone() {
                Term::Type | Term::Kind | Term::Prod(_, _) => break,
                Term::BVar(x) => match self.env.get(*x) {
                    Some(value) => {
                        self.term = value.force().clone();
                        self.env.clear()
                    }
                    None => {
                        if !self.env.is_empty() {
                            self.term = RTerm::new(Term::BVar(x - self.env.len()));
                            self.env.clear();
                        }
                        break;
                    }
                },
                Term::Abst(_, t) => {
                    if !sig.cfg.beta || self.stack.is_empty() || !spend(sig) {
                        break;
                    }
                    match self.stack.pop() {
                        None => break,
                        Some(p) => {
                            self.term = t.clone();
                            self.env.push(LazyTerm::new(p));
                        }
                    }
                }
                Term::Appl(head, tail) => {
                    for t in tail.iter().rev() {
                        let arg = match sig.cfg.strategy {
                            Strategy::ByStrongValue => {
                                let t = t.clone().psubst(&self.env).snf(sig)?;
                                Machine::new(t)
                            }
                            _ => Machine {
                                env: self.env.clone(),
                                term: t.clone(),
                                stack: Stack::new(),
                            },
                        };
                        let arg = MachineRef::new(arg);
                        if sig.cfg.strategy == Strategy::ByValue {
                            arg.whnf(sig)?;
                        }
                        self.stack.push(arg);
                    }
                    self.term = head.clone();
                }
                Term::Symb(s) => match sig.get_tree(s) {
                    None => break,
                    Some((pivot, tree)) => {
                        if pivot > self.stack.len() {
                            break;
                        }
                        let cols = match self.stack.peek_many(pivot) {
                            Some(cols) => cols,
                            None => break,
                        };
                        match gamma_rewrite(cols, &tree, sig)? {
                            None => break,
                            Some((rule, subst, rhs)) => {
                                if !spend(sig) {
                                    break;
                                }
                                trace!("rewrite: {} ... ⟶ {}", s, rule);
                                if let Some(log) = &sig.cfg.logger {
                                    let pos = sig.cfg.fired.get();
                                    sig.cfg.fired.set(pos + 1);
                                    let contractum = Machine {
                                        env: subst.clone(),
                                        term: rhs.clone(),
                                        stack: Stack::new(),
                                    };
                                    let lazy = LazyTerm::new(MachineRef::new(contractum));
                                    log(pos, &rule, &lazy);
                                }
                                self.env = subst;
                                self.term = rhs;
                                self.stack.pop_many(pivot);
                            }
                        }
                    }
                },
            }
        }

        if let Term::BVar(_) = &*self.term {
            assert!(self.env.is_empty())
        }
        Ok(())
    }
}

/// Walk a rewrite tree over the given stack columns.
///
/// Return the name, matched substitution, and right-hand side of the
/// first rule whose matching problem and guards succeed.
fn gamma_rewrite(
    mut cols: Vec<MachineRef>,
    tree: &DTree,
    sig: &Signature,
) -> Result<Option<(RuleName, Bindings, RTerm)>, Error> {
    let mut node = tree;
    loop {
        match node {
            DTree::Switch {
                col,
                cases,
                default,
            } => {
                let st = cols[*col].clone();
                st.whnf(sig)?;
                let mut found = None;
                {
                    let machine = st.machine();
                    let arity = machine.stack.len();
                    match &*machine.term {
                        Term::Symb(s) => {
                            let case = cases.iter().find(
                                |(c, _)| matches!(c, Case::Symb(s2, k) if s2 == s && *k == arity),
                            );
                            if let Some((_, tr)) = case {
                                let args = machine.stack.iter().cloned().collect();
                                found = Some((tr, args));
                            }
                        }
                        Term::BVar(n) => {
                            let case = cases.iter().find(
                                |(c, _)| matches!(c, Case::BVar(n2, k) if n2 == n && *k == arity),
                            );
                            if let Some((_, tr)) = case {
                                let args = machine.stack.iter().cloned().collect();
                                found = Some((tr, args));
                            }
                        }
                        Term::Abst(_, _) if arity == 0 => {
                            let case = cases.iter().find(|(c, _)| matches!(c, Case::Abst));
                            if let Some((_, tr)) = case {
                                // go under the binder: the crossed
                                // variable stays dangling at index 0
                                if let Term::Abst(_, body) =
                                    &*machine.term.clone().psubst(&machine.env)
                                {
                                    let body = MachineRef::new(Machine::new(body.clone()));
                                    found = Some((tr, vec![body]));
                                }
                            }
                        }
                        _ => (),
                    }
                }
                match found {
                    Some((tr, ext)) => {
                        cols.extend(ext);
                        node = tr;
                    }
                    None => match default {
                        Some(d) => node = d,
                        None => return Ok(None),
                    },
                }
            }
            DTree::Test {
                rule,
                problem,
                guards,
                rhs,
                ctx_len,
                default,
            } => {
                if let Some(subst) = match_problem(problem, *ctx_len, &cols, sig)? {
                    if check_guards(guards, &subst, &cols, sig)? {
                        return Ok(Some((rule.clone(), subst, rhs.clone())));
                    }
                }
                match default {
                    Some(d) => node = d,
                    None => return Ok(None),
                }
            }
        }
    }
}

/// Solve the matching problem of a test leaf, producing the
/// environment for the rule's right-hand side.
fn match_problem(
    problem: &Problem,
    ctx_len: usize,
    cols: &[MachineRef],
    sig: &Signature,
) -> Result<Option<Bindings>, Error> {
    let syntactic = matches!(problem, Problem::Syntactic(_));
    let mut slots: Vec<Option<LazyTerm>> = vec![None; ctx_len];
    for atom in problem.atoms() {
        match solve_atom(atom, syntactic, cols, sig)? {
            Some(v) => slots[atom.var] = Some(v),
            None => return Ok(None),
        }
    }
    let mut subst = Bindings::new();
    for slot in slots.into_iter().rev() {
        match slot {
            Some(v) => subst.push(v),
            // a pattern variable was not bound by the match
            None => return Ok(None),
        }
    }
    Ok(Some(subst))
}

/// Read the value of one pattern variable from its column.
///
/// Syntactic positions are adjusted for abstraction depth by
/// unshifting; higher-order positions are handed to the matching
/// kernel. Both are retried once on the strongly normalised term,
/// since reduction may erase an offending variable occurrence.
fn solve_atom(
    atom: &Atom,
    syntactic: bool,
    cols: &[MachineRef],
    sig: &Signature,
) -> Result<Option<LazyTerm>, Error> {
    let st = cols[atom.col].clone();
    if atom.depth == 0 && atom.args.is_empty() {
        return Ok(Some(LazyTerm::new(st)));
    }
    let t = st.read_back();
    let solve = |t: &RTerm| {
        if syntactic {
            t.try_unshift(atom.depth).ok()
        } else {
            matching::solve(atom.depth, &atom.args, t).ok()
        }
    };
    match solve(&t) {
        Some(u) => Ok(Some(LazyTerm::from_term(u))),
        None => Ok(solve(&t.snf(sig)?).map(LazyTerm::from_term)),
    }
}

/// Evaluate the guards of a test leaf under the matched context.
///
/// A failing linearity guard makes the test fall through to its
/// default; a failing bracket guard is a hard error, since silently
/// skipping it would let rewriting diverge from the typed rule.
fn check_guards(
    guards: &[Guard],
    subst: &Bindings,
    cols: &[MachineRef],
    sig: &Signature,
) -> Result<bool, Error> {
    for guard in guards {
        match guard {
            Guard::Linearity(atom) => {
                let v = match solve_atom(atom, atom.args.is_empty(), cols, sig)? {
                    Some(v) => v,
                    None => return Ok(false),
                };
                let prev = match subst.get(atom.var) {
                    Some(prev) => prev.force().clone(),
                    None => return Ok(false),
                };
                if !RTerm::convertible(prev, v.force().clone(), sig)? {
                    return Ok(false);
                }
            }
            Guard::Bracket { col, depth, term } => {
                let expected = term.clone().psubst(subst);
                let atom = Atom {
                    var: 0,
                    col: *col,
                    depth: *depth,
                    args: Vec::new(),
                };
                let found = match solve_atom(&atom, true, cols, sig)? {
                    Some(v) => v.force().clone(),
                    None => cols[*col].read_back(),
                };
                if !RTerm::convertible(found.clone(), expected.clone(), sig)? {
                    let pair = Box::new((found, expected));
                    return Err(ReduceError::GuardNotSatisfied(pair).into());
                }
            }
        }
    }
    Ok(true)
}

impl RTerm {
    /// Return the weak head normal form of the term.
    pub fn whnf(self, sig: &Signature) -> Result<Self, Error> {
        trace!("whnf of {}", self);
        let mut machine = Machine::new(self);
        machine.whnf(sig)?;
        Ok(machine.readback())
    }

    /// Return the strong normal form of the term:
    /// no sub-term contains a beta or gamma redex.
    pub fn snf(self, sig: &Signature) -> Result<Self, Error> {
        let t = self.whnf(sig)?;
        Ok(match &*t {
            Term::Appl(f, args) => {
                let args = args.iter().map(|a| a.clone().snf(sig));
                f.clone().snf(sig)?.apply(args.collect::<Result<_, _>>()?)
            }
            Term::Abst(arg, tm) => {
                let ty = match &arg.ty {
                    None => None,
                    Some(ty) => Some(ty.clone().snf(sig)?),
                };
                let arg = crate::term::Arg { id: arg.id.clone(), ty };
                RTerm::new(Term::Abst(arg, tm.clone().snf(sig)?))
            }
            Term::Prod(arg, tm) => {
                let ty = arg.ty.clone().snf(sig)?;
                let arg = crate::term::Arg { id: arg.id.clone(), ty };
                RTerm::new(Term::Prod(arg, tm.clone().snf(sig)?))
            }
            _ => t.clone(),
        })
    }

    /// Return the head normal form of the term:
    /// the root is not a redex, and neither is any argument.
    pub fn hnf(self, sig: &Signature) -> Result<Self, Error> {
        let t = self.whnf(sig)?;
        Ok(match &*t {
            Term::Appl(f, args) => {
                let args = args.iter().map(|a| a.clone().hnf(sig));
                f.clone().apply(args.collect::<Result<_, _>>()?)
            }
            _ => t.clone(),
        })
    }

    /// Reduce with a budget of at most `n` beta and gamma firings,
    /// returning the partially normalised term when it runs out.
    pub fn nsteps(self, sig: &Signature, n: usize) -> Result<Self, Error> {
        let cfg = sig.cfg.clone().with_limit(n);
        self.snf(&sig.with_cfg(cfg))
    }

    /// Reduce according to the given configuration.
    pub fn reduce(self, cfg: Config, sig: &Signature) -> Result<Self, Error> {
        let sig = sig.with_cfg(cfg);
        match sig.cfg.target {
            Target::Whnf => self.whnf(&sig),
            Target::Snf => self.snf(&sig),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Arg;

    fn var(n: usize) -> RTerm {
        RTerm::new(Term::BVar(n))
    }

    fn lam(body: RTerm) -> RTerm {
        RTerm::new(Term::Abst(Arg::new("x", None), body))
    }

    fn ty() -> RTerm {
        RTerm::new(Term::Type)
    }

    #[test]
    fn beta_reduction() {
        let sig = Signature::new();
        // (λ x. x) Type ⟶ Type
        let redex = lam(var(0)).apply(vec![ty()]);
        assert_eq!(redex.whnf(&sig).unwrap(), ty());
    }

    #[test]
    fn whnf_stops_at_the_head() {
        let sig = Signature::new();
        // λ y. (λ x. x) Type  is already in whnf
        let t = lam(lam(var(0)).apply(vec![ty()]));
        assert_eq!(t.clone().whnf(&sig).unwrap(), t);
        // … but not in snf
        assert_eq!(t.snf(&sig).unwrap(), lam(ty()));
    }

    #[test]
    fn free_variables_survive() {
        let sig = Signature::new();
        // (λ x. β3) Type ⟶ β2
        let t = lam(var(3)).apply(vec![ty()]);
        assert_eq!(t.whnf(&sig).unwrap(), var(2));
    }

    #[test]
    fn beta_can_be_disabled() {
        let mut sig = Signature::new();
        sig.cfg.beta = false;
        let redex = lam(var(0)).apply(vec![ty()]);
        assert_eq!(redex.clone().whnf(&sig).unwrap(), redex);
    }

    #[test]
    fn step_limit_bounds_firings() {
        let sig = Signature::new();
        // (λ x. x) ((λ x. x) Type) needs two beta steps
        let inner = lam(var(0)).apply(vec![ty()]);
        let redex = lam(var(0)).apply(vec![inner.clone()]);

        assert_eq!(redex.clone().nsteps(&sig, 0).unwrap(), redex);
        assert_eq!(redex.clone().nsteps(&sig, 1).unwrap(), inner);
        assert_eq!(redex.clone().nsteps(&sig, 2).unwrap(), ty());
        assert_eq!(redex.nsteps(&sig, 17).unwrap(), ty());
    }

    #[test]
    fn strategies_agree_on_the_result() {
        for strategy in [Strategy::ByName, Strategy::ByValue, Strategy::ByStrongValue] {
            let mut sig = Signature::new();
            sig.cfg.strategy = strategy;
            let redex = lam(var(0)).apply(vec![lam(var(0)).apply(vec![ty()])]);
            assert_eq!(redex.snf(&sig).unwrap(), ty());
        }
    }

    #[test]
    fn hnf_reduces_arguments() {
        let sig = Signature::new();
        // β9 ((λ x. x) Type)  has a redex below the head
        let t = var(9).apply(vec![lam(var(0)).apply(vec![ty()])]);
        assert_eq!(t.hnf(&sig).unwrap(), var(9).apply(vec![ty()]));
    }
}
