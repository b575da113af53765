//! Type checking and type inference for terms and rewrite rules.

use crate::error::{Conflict, Error, TypingError};
use crate::matching;
use crate::pattern::Pattern;
use crate::rule::{Rule, RuleName, Untyped};
use crate::signature::Signature;
use crate::stack::Stack;
use crate::term::{Arg, RTerm, Term};
use std::cell::Cell;
use std::fmt;

/// Map from de Bruijn indices to associated types.
///
/// Each entry is stored as it was at its binding point;
/// [`LCtx::get_type`] shifts it to the current frame.
pub type LCtx = Stack<RTerm>;

impl LCtx {
    fn get_type(&self, n: usize) -> Option<RTerm> {
        Some(self.get(n)?.clone().shift(n + 1))
    }

    fn bind<A, F>(&mut self, arg: RTerm, f: F) -> Result<A, Error>
    where
        F: FnOnce(&mut LCtx) -> Result<A, Error>,
    {
        self.with_pushed(arg, f)
    }

    fn bind_of_type<A, F>(&mut self, sig: &Signature, arg: RTerm, f: F) -> Result<A, Error>
    where
        F: FnOnce(&mut LCtx) -> Result<A, Error>,
    {
        match &*arg.clone().infer(sig, self)? {
            Term::Type => self.bind(arg, f),
            _ => Err(TypingError::BindNoType.into()),
        }
    }
}

impl fmt::Display for LCtx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, x) in self.iter().enumerate() {
            write!(f, "{} : {}, ", Term::BVar(i), x.clone().shift(i + 1))?;
        }
        write!(f, "]")
    }
}

impl RTerm {
    /// Infer the type of a term using supplied types of bound variables.
    pub fn infer(&self, sig: &Signature, lc: &mut LCtx) -> Result<RTerm, Error> {
        debug!("infer type of {}", self);
        match &**self {
            Term::Kind => Err(TypingError::KindNotTypable.into()),
            Term::Type => Ok(RTerm::new(Term::Kind)),
            Term::Symb(s) => Ok(sig.get_type(s)?),
            Term::BVar(x) => lc
                .get_type(*x)
                .ok_or_else(|| TypingError::VariableNotFound(*x).into()),
            Term::Appl(f, args) => {
                args.iter().try_fold(f.infer(sig, lc)?, |ty, arg| {
                    match &*ty.whnf(sig)? {
                        Term::Prod(Arg { ty: a, .. }, b) => {
                            arg.check(sig, lc, a.clone())?;
                            Ok(b.clone().subst(arg))
                        }
                        _ => Err(TypingError::ProductExpected.into()),
                    }
                })
            }
            Term::Abst(Arg { id, ty: Some(ty) }, tm) => {
                let tm_ty = lc.bind_of_type(sig, ty.clone(), |lc| tm.infer(sig, lc))?;
                match &*tm_ty {
                    Term::Kind => Err(TypingError::UnexpectedKind.into()),
                    _ => {
                        let arg = Arg {
                            id: id.clone(),
                            ty: ty.clone(),
                        };
                        Ok(RTerm::new(Term::Prod(arg, tm_ty)))
                    }
                }
            }
            Term::Prod(Arg { ty, .. }, tm) => {
                let tm_ty = lc.bind_of_type(sig, ty.clone(), |lc| tm.infer(sig, lc))?;
                match &*tm_ty {
                    Term::Kind | Term::Type => Ok(tm_ty),
                    _ => Err(TypingError::SortExpected.into()),
                }
            }
            Term::Abst(Arg { ty: None, .. }, _) => {
                Err(TypingError::DomainFreeAbstraction.into())
            }
        }
    }

    /// Check whether a term is of the given type,
    /// using supplied types of bound variables.
    pub fn check(&self, sig: &Signature, lc: &mut LCtx, ty_exp: RTerm) -> Result<(), Error> {
        debug!("check {} is of type {} when {}", self, ty_exp, lc);
        if let Term::Abst(arg, tm) = &**self {
            let whnf = ty_exp.clone().whnf(sig)?;
            match &*whnf {
                Term::Prod(Arg { ty: ty_a, .. }, ty_b) => {
                    if let Some(ty) = &arg.ty {
                        let _ = ty.infer(sig, lc)?;
                        if !RTerm::convertible(ty.clone(), ty_a.clone(), sig)? {
                            return Err(unconvertible(self, lc, ty_a.clone(), ty.clone()));
                        }
                    }
                    lc.bind(ty_a.clone(), |lc| tm.check(sig, lc, ty_b.clone()))
                }
                _ => Err(TypingError::ProductExpected.into()),
            }
        } else {
            let ty_inf = self.infer(sig, lc)?;
            trace!("checking convertibility: {} ~ {}", ty_inf, ty_exp);
            if RTerm::convertible(ty_inf.clone(), ty_exp.clone(), sig)? {
                Ok(())
            } else {
                Err(unconvertible(self, lc, ty_exp, ty_inf))
            }
        }
    }
}

/// A conflict keeps the types in scope at the failure site, so that
/// the indices in the reported terms stay resolvable.
fn unconvertible(term: &RTerm, lc: &LCtx, expected: RTerm, inferred: RTerm) -> Error {
    TypingError::Unconvertible(Box::new(Conflict {
        term: term.clone(),
        ctx: lc.clone(),
        expected,
        inferred,
    }))
    .into()
}

/// Verified introduction of a new symbol.
pub struct Typing {
    pub typ: RTerm,
    pub term: Option<RTerm>,
}

impl Typing {
    /// Verify a declaration: its type must be a sort.
    pub fn declare(typ: RTerm, sig: &Signature) -> Result<Self, Error> {
        match &*typ.infer(sig, &mut LCtx::new())? {
            Term::Kind | Term::Type => Ok(Self { typ, term: None }),
            _ => Err(TypingError::SortExpected.into()),
        }
    }

    /// Verify a definition: check the body against the declared type,
    /// or infer the type from the body.
    ///
    /// Definitions at the level of `Kind` are rejected, since the
    /// delta rule unfolding them would rewrite inside sorts.
    pub fn define(oty: Option<RTerm>, tm: RTerm, sig: &Signature) -> Result<Self, Error> {
        let typ = match oty {
            None => tm.infer(sig, &mut LCtx::new())?,
            Some(ty) => {
                let _ = ty.infer(sig, &mut LCtx::new())?;
                tm.check(sig, &mut LCtx::new(), ty.clone())?;
                ty
            }
        };
        match &*typ {
            Term::Kind => Err(TypingError::KindLevelDefinition.into()),
            _ => Ok(Self {
                typ,
                term: Some(tm),
            }),
        }
    }
}

/// Type-check a rewrite rule and produce its typed form.
///
/// The pattern variables' types are obtained by folding the
/// left-hand side against the head symbol's type, collecting
/// equations that a first-order unifier then solves; the refined
/// types form the context in which the right-hand side is checked
/// against the left-hand side's type.
pub fn check_rule(sig: &Signature, name: RuleName, rule: Untyped) -> Result<Rule, Error> {
    let prep = rule.prepare()?;
    let k = prep.ctx.len();

    let mut pt = PatternTyping {
        sig,
        cands: vec![Vec::new(); k],
        eqs: Vec::new(),
        brackets: Vec::new(),
    };
    let head_ty = sig.get_type(&prep.lhs.symbol)?;
    let mut delta = LCtx::new();
    let lhs_ty = pt.infer_args(head_ty, &prep.lhs.args, &mut delta, 0)?;

    // declared types must agree with the use sites,
    // and so must repeated uses of the same variable
    for (m, (_, oty)) in prep.ctx.iter().enumerate() {
        if let (Some(ty), Some(c0)) = (oty, pt.cands[m].first()) {
            pt.eqs.push((0, ty.clone(), c0.clone()));
        }
    }
    for cands in &pt.cands {
        for c in cands.iter().skip(1) {
            pt.eqs.push((0, cands[0].clone(), c.clone()));
        }
    }

    let mut uni = Unifier::new(k);
    for (depth, a, b) in pt.eqs.clone() {
        uni.unify(sig, depth, &a, &b)?;
    }

    let mut ctx = Vec::with_capacity(k);
    for (m, (id, oty)) in prep.ctx.iter().enumerate() {
        let ty = oty
            .clone()
            .or_else(|| pt.cands[m].first().cloned())
            .ok_or(TypingError::CannotInferTypeOfPattern)?;
        let ty = uni.apply(&ty);
        if occurs(m, &ty, 0) {
            return Err(TypingError::UnsatisfiableConstraints.into());
        }
        ctx.push((id.clone(), ty));
    }
    let lhs_ty = uni.apply(&lhs_ty);

    // build the typing context, verifying each type in sequence;
    // a type may mention the variables declared before it
    let mut gamma = LCtx::new();
    for m in (0..k).rev() {
        let ty = ctx[m]
            .1
            .clone()
            .try_unshift(m + 1)
            .map_err(|_| TypingError::UnsatisfiableConstraints)?;
        match &*ty.clone().infer(sig, &mut gamma)? {
            Term::Type => (),
            _ => return Err(TypingError::BindNoType.into()),
        }
        gamma.push(ty);
    }

    for (tm, ty) in &pt.brackets {
        tm.check(sig, &mut gamma, uni.apply(ty))?;
    }

    prep.rhs.check(sig, &mut gamma, lhs_ty)?;
    check_arities(&prep.rhs, 0, &prep.arities, &prep.ctx)?;

    Ok(Rule {
        name,
        ctx,
        lhs: prep.lhs,
        rhs: prep.rhs,
        arities: prep.arities,
    })
}

/// Verify that right-hand side occurrences of each pattern variable
/// carry at least as many arguments as on the left-hand side, so
/// that substituted solutions are always fully applied.
fn check_arities(
    t: &RTerm,
    k: usize,
    arities: &[usize],
    ctx: &[(crate::term::Name, Option<RTerm>)],
) -> Result<(), Error> {
    let occurrence = |n: usize, used: usize| -> Result<(), Error> {
        if n < k {
            return Ok(());
        }
        let m = n - k;
        if let Some(declared) = arities.get(m).copied() {
            if used < declared {
                return Err(TypingError::NotEnoughArguments {
                    var: ctx[m].0.to_string(),
                    declared,
                    used,
                }
                .into());
            }
        }
        Ok(())
    };
    match &**t {
        Term::BVar(n) => occurrence(*n, 0),
        Term::Appl(f, args) => {
            if let Term::BVar(n) = &**f {
                occurrence(*n, args.len())?;
            } else {
                check_arities(f, k, arities, ctx)?;
            }
            args.iter().try_for_each(|a| check_arities(a, k, arities, ctx))
        }
        Term::Abst(arg, tm) => {
            if let Some(ty) = &arg.ty {
                check_arities(ty, k, arities, ctx)?;
            }
            check_arities(tm, k + 1, arities, ctx)
        }
        Term::Prod(arg, tm) => {
            check_arities(&arg.ty, k, arities, ctx)?;
            check_arities(tm, k + 1, arities, ctx)
        }
        _ => Ok(()),
    }
}

/// State of the left-hand side type inference.
struct PatternTyping<'s> {
    sig: &'s Signature,
    /// computed types of each pattern variable, in the rule frame
    cands: Vec<Vec<RTerm>>,
    /// equations `(depth, lhs, rhs)` for the unifier
    eqs: Vec<(usize, RTerm, RTerm)>,
    /// bracket bodies with their expected types, in the rule frame
    brackets: Vec<(RTerm, RTerm)>,
}

impl<'s> PatternTyping<'s> {
    /// Fold patterns against a product type,
    /// checking each pattern against the domain and
    /// substituting it into the codomain.
    fn infer_args(
        &mut self,
        head_ty: RTerm,
        args: &[Pattern],
        delta: &mut LCtx,
        depth: usize,
    ) -> Result<RTerm, Error> {
        let mut expected = head_ty;
        for p in args {
            expected = expected.whnf(self.sig)?;
            match &*expected.clone() {
                Term::Prod(Arg { ty: a, .. }, b) => {
                    self.check_pattern(p, a, delta, depth)?;
                    expected = match pattern_term(p, depth) {
                        Some(u) => b.clone().subst(&u),
                        // a joker may not flow into a dependent type
                        None if occurs(0, b, 0) => {
                            return Err(TypingError::CannotInferTypeOfPattern.into())
                        }
                        None => b.clone().subst(&RTerm::new(Term::Type)),
                    };
                }
                _ => return Err(TypingError::ProductExpected.into()),
            }
        }
        Ok(expected)
    }

    fn check_pattern(
        &mut self,
        p: &Pattern,
        expected: &RTerm,
        delta: &mut LCtx,
        depth: usize,
    ) -> Result<(), Error> {
        match p {
            Pattern::Joker(_) => Ok(()),
            Pattern::MVar(m, args) => {
                let ty = self.pi_close(delta, depth, args, expected)?;
                self.cands[*m].push(ty);
                Ok(())
            }
            Pattern::Abst(body) => {
                let e = expected.clone().whnf(self.sig)?;
                match &*e.clone() {
                    Term::Prod(Arg { ty: a, .. }, b) => delta
                        .with_pushed(a.clone(), |delta| {
                            self.check_pattern(body, b, delta, depth + 1)
                        }),
                    _ => Err(TypingError::ProductExpected.into()),
                }
            }
            Pattern::Bracket(tm) => {
                let ty = self.to_rule_frame(depth, &[], expected)?;
                self.brackets.push((tm.clone(), ty));
                Ok(())
            }
            Pattern::Symb(s, args) => {
                let head_ty = self.sig.get_type(s)?;
                let inferred = self.infer_args(head_ty, args, delta, depth)?;
                self.eqs.push((depth, expected.clone(), inferred));
                Ok(())
            }
            Pattern::BVar(n, args) => {
                let head_ty = delta
                    .get_type(*n)
                    .ok_or(TypingError::VariableNotFound(*n))?;
                let inferred = self.infer_args(head_ty, args, delta, depth)?;
                self.eqs.push((depth, expected.clone(), inferred));
                Ok(())
            }
        }
    }

    /// Compute the type of a pattern variable applied to the bound
    /// variables `args` under `depth` abstractions: the expected type
    /// of the application, closed over the arguments' domains.
    fn pi_close(
        &mut self,
        delta: &LCtx,
        depth: usize,
        args: &[usize],
        expected: &RTerm,
    ) -> Result<RTerm, Error> {
        let mut doms = Vec::with_capacity(args.len());
        for (i, x) in args.iter().enumerate() {
            let dom = delta
                .get_type(*x)
                .ok_or(TypingError::VariableNotFound(*x))?;
            doms.push(self.to_rule_frame(depth, &args[..i], &dom)?);
        }
        let mut ty = self.to_rule_frame(depth, args, expected)?;
        for dom in doms.into_iter().rev() {
            ty = RTerm::new(Term::Prod(Arg::new("x", dom), ty));
        }
        Ok(ty)
    }

    /// Express a term from under `depth` abstractions in the rule
    /// frame extended by binders for `args`, retrying once on the
    /// normalised term.
    fn to_rule_frame(
        &self,
        depth: usize,
        args: &[usize],
        t: &RTerm,
    ) -> Result<RTerm, Error> {
        match matching::translate(depth, args, t) {
            Ok(u) => Ok(u),
            Err(_) => {
                let t = t.clone().snf(self.sig)?;
                matching::translate(depth, args, &t)
                    .map_err(|_| TypingError::CannotInferTypeOfPattern.into())
            }
        }
    }
}

/// The term matched by a pattern, used to substitute into dependent
/// codomains; `None` for patterns containing jokers.
fn pattern_term(p: &Pattern, depth: usize) -> Option<RTerm> {
    match p {
        Pattern::MVar(m, args) => {
            let var = RTerm::new(Term::BVar(depth + m));
            let args = args.iter().map(|a| RTerm::new(Term::BVar(*a))).collect();
            Some(var.apply(args))
        }
        Pattern::Symb(s, args) => {
            let head = RTerm::new(Term::Symb(s.clone()));
            let args: Option<Vec<_>> = args.iter().map(|a| pattern_term(a, depth)).collect();
            Some(head.apply(args?))
        }
        Pattern::BVar(n, args) => {
            let head = RTerm::new(Term::BVar(*n));
            let args: Option<Vec<_>> = args.iter().map(|a| pattern_term(a, depth)).collect();
            Some(head.apply(args?))
        }
        Pattern::Abst(body) => {
            let body = pattern_term(body, depth + 1)?;
            Some(RTerm::new(Term::Abst(Arg::new("x", None), body)))
        }
        Pattern::Bracket(tm) => Some(tm.clone().shift(depth)),
        Pattern::Joker(_) => None,
    }
}

/// Does the rule-frame variable `m` occur in `t` under `k` binders?
fn occurs(m: usize, t: &RTerm, k: usize) -> bool {
    match &**t {
        Term::BVar(n) => *n >= k && n - k == m,
        Term::Appl(f, args) => occurs(m, f, k) || args.iter().any(|a| occurs(m, a, k)),
        Term::Abst(arg, tm) => {
            arg.ty.as_ref().map_or(false, |ty| occurs(m, ty, k)) || occurs(m, tm, k + 1)
        }
        Term::Prod(arg, tm) => occurs(m, &arg.ty, k) || occurs(m, tm, k + 1),
        _ => false,
    }
}

/// First-order unification of type equations.
///
/// The unknowns are the rule's pattern variables, seen as terms;
/// solutions live in the rule frame. Binding resolves the candidate
/// through the current substitution and rejects self-referential
/// solutions, so the substitution stays acyclic.
struct Unifier {
    subst: Vec<Option<RTerm>>,
}

impl Unifier {
    fn new(k: usize) -> Self {
        Self {
            subst: vec![None; k],
        }
    }

    /// Apply the substitution to a rule-frame term.
    fn apply(&self, t: &RTerm) -> RTerm {
        self.resolve(t, 0).0
    }

    /// Replace solved variables under `depth` abstractions;
    /// report whether any replacement happened.
    fn resolve(&self, t: &RTerm, depth: usize) -> (RTerm, bool) {
        let hit = Cell::new(false);
        let r = t.clone().apply_subst(
            &|n, k| {
                let rel = n - k;
                if rel >= depth {
                    if let Some(Some(u)) = self.subst.get(rel - depth) {
                        hit.set(true);
                        return u.clone().shift(depth + k);
                    }
                }
                RTerm::new(Term::BVar(n))
            },
            0,
        );
        (r, hit.get())
    }

    fn unify(&mut self, sig: &Signature, depth: usize, t1: &RTerm, t2: &RTerm) -> Result<(), Error> {
        let w1 = t1.clone().whnf(sig)?;
        let (r1, hit1) = self.resolve(&w1, depth);
        if hit1 {
            return self.unify(sig, depth, &r1, t2);
        }
        let w2 = t2.clone().whnf(sig)?;
        let (r2, hit2) = self.resolve(&w2, depth);
        if hit2 {
            return self.unify(sig, depth, &w1, &r2);
        }

        let vars = self.subst.len();
        let unknown = |t: &RTerm| match &**t {
            Term::BVar(n) if *n >= depth && n - depth < vars => Some(n - depth),
            _ => None,
        };

        match (&*w1, &*w2) {
            (Term::BVar(n1), Term::BVar(n2)) if n1 == n2 => Ok(()),
            _ => {
                if let Some(m) = unknown(&w1) {
                    return self.bind(sig, depth, m, &w2);
                }
                if let Some(m) = unknown(&w2) {
                    return self.bind(sig, depth, m, &w1);
                }
                self.decompose(sig, depth, &w1, &w2)
            }
        }
    }

    fn decompose(
        &mut self,
        sig: &Signature,
        depth: usize,
        t1: &RTerm,
        t2: &RTerm,
    ) -> Result<(), Error> {
        match (&**t1, &**t2) {
            (Term::Kind, Term::Kind) | (Term::Type, Term::Type) => Ok(()),
            (Term::Symb(s1), Term::Symb(s2)) if s1 == s2 => Ok(()),
            (Term::Appl(f1, args1), Term::Appl(f2, args2)) if args1.len() == args2.len() => {
                self.unify(sig, depth, f1, f2)?;
                args1
                    .iter()
                    .zip(args2)
                    .try_for_each(|(a1, a2)| self.unify(sig, depth, a1, a2))
            }
            (Term::Abst(_, b1), Term::Abst(_, b2)) => self.unify(sig, depth + 1, b1, b2),
            (Term::Prod(arg1, b1), Term::Prod(arg2, b2)) => {
                self.unify(sig, depth, &arg1.ty, &arg2.ty)?;
                self.unify(sig, depth + 1, b1, b2)
            }
            _ => {
                // e.g. an applied pattern variable: accept whatever
                // is already convertible, refuse to solve beyond
                if RTerm::convertible(t1.clone(), t2.clone(), sig)? {
                    Ok(())
                } else {
                    Err(TypingError::UnsatisfiableConstraints.into())
                }
            }
        }
    }

    fn bind(&mut self, sig: &Signature, depth: usize, m: usize, t: &RTerm) -> Result<(), Error> {
        if let Some(u) = &self.subst[m] {
            let u = u.clone().shift(depth);
            return self.unify(sig, depth, &u, t);
        }
        let (t, _) = self.resolve(t, depth);
        let u = match t.try_unshift(depth) {
            Ok(u) => u,
            Err(_) => {
                let t = self.resolve(&t.snf(sig)?, depth).0;
                t.try_unshift(depth)
                    .map_err(|_| TypingError::UnsatisfiableConstraints)?
            }
        };
        if occurs(m, &u, 0) {
            return Err(TypingError::UnsatisfiableConstraints.into());
        }
        self.subst[m] = Some(u);
        Ok(())
    }
}
