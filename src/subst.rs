//! Substitution and shifting for terms.

use crate::term::{RTerm, Term};

/// Raised when unshifting meets a free variable that would become negative.
///
/// This is control flow for the rewrite machinery, which retries after
/// normalisation; it never reaches the user directly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnshiftError;

impl RTerm {
    /// Apply a substitution to all variables under a cutoff of `k` binders.
    ///
    /// The substitution receives the index of the variable and
    /// the number of binders between the variable and the root.
    /// Sub-terms left unchanged by the substitution are shared
    /// with the input term.
    pub fn apply_subst<S>(self, subst: &S, k: usize) -> Self
    where
        S: Fn(usize, usize) -> RTerm,
    {
        match &*self {
            Term::BVar(n) if *n >= k => subst(*n, k),
            Term::Appl(f, args) => {
                let f2 = f.clone().apply_subst(subst, k);
                let args2: Vec<RTerm> = args
                    .iter()
                    .map(|a| a.clone().apply_subst(subst, k))
                    .collect();
                if f.ptr_eq(&f2) && args.iter().zip(args2.iter()).all(|(a, a2)| a.ptr_eq(a2)) {
                    self
                } else {
                    Self::new(Term::Appl(f2, args2))
                }
            }
            Term::Abst(arg, tm) => {
                let arg2 = arg
                    .clone()
                    .map_ty(|o| o.map(|ty| ty.apply_subst(subst, k)));
                let tm2 = tm.clone().apply_subst(subst, k + 1);
                if arg.ty.iter().zip(arg2.ty.iter()).all(|(t, t2)| t.ptr_eq(t2)) && tm.ptr_eq(&tm2)
                {
                    self
                } else {
                    Self::new(Term::Abst(arg2, tm2))
                }
            }
            Term::Prod(arg, tm) => {
                let arg2 = arg.clone().map_ty(|ty| ty.apply_subst(subst, k));
                let tm2 = tm.clone().apply_subst(subst, k + 1);
                if arg.ty.ptr_eq(&arg2.ty) && tm.ptr_eq(&tm2) {
                    self
                } else {
                    Self::new(Term::Prod(arg2, tm2))
                }
            }
            _ => self,
        }
    }

    /// Add `n` to all free variables.
    pub fn shift(self, n: usize) -> Self {
        self.shift_above(n, 0)
    }

    /// Add `n` to all variables with index at least `cutoff`.
    pub fn shift_above(self, n: usize, cutoff: usize) -> Self {
        if n == 0 {
            self
        } else {
            self.apply_subst(&|i, _k| RTerm::new(Term::BVar(i + n)), cutoff)
        }
    }

    /// Substitute the outermost bound variable by `u`,
    /// lowering the remaining free variables.
    pub fn subst(self, u: &RTerm) -> Self {
        self.apply_subst(&psubst_single(u), 0)
    }

    /// Subtract `n` from all free variables.
    ///
    /// Fail if a free variable with index less than `n` occurs,
    /// since it would be captured by the removed binders.
    pub fn try_unshift(&self, n: usize) -> Result<Self, UnshiftError> {
        if n == 0 {
            return Ok(self.clone());
        }
        unshift(self, n, 0)
    }
}

fn psubst_single<'t>(u: &'t RTerm) -> impl Fn(usize, usize) -> RTerm + 't {
    move |n, k| {
        if n == k {
            u.clone().shift(k)
        } else {
            RTerm::new(Term::BVar(n - 1))
        }
    }
}

fn unshift(t: &RTerm, n: usize, k: usize) -> Result<RTerm, UnshiftError> {
    match &**t {
        Term::BVar(m) if *m >= k => {
            if m - k < n {
                Err(UnshiftError)
            } else {
                Ok(RTerm::new(Term::BVar(m - n)))
            }
        }
        Term::Appl(f, args) => {
            let f = unshift(f, n, k)?;
            let args = args.iter().map(|a| unshift(a, n, k));
            Ok(f.apply(args.collect::<Result<_, _>>()?))
        }
        Term::Abst(arg, tm) => {
            let ty = arg.ty.as_ref().map(|ty| unshift(ty, n, k)).transpose()?;
            let arg = crate::term::Arg { id: arg.id.clone(), ty };
            Ok(RTerm::new(Term::Abst(arg, unshift(tm, n, k + 1)?)))
        }
        Term::Prod(arg, tm) => {
            let ty = unshift(&arg.ty, n, k)?;
            let arg = crate::term::Arg { id: arg.id.clone(), ty };
            Ok(RTerm::new(Term::Prod(arg, unshift(tm, n, k + 1)?)))
        }
        _ => Ok(t.clone()),
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

    #[test]
    fn subst_under_binder_shifts() {
        // (λ. β0 β2) [β0 ↦ β1]  =  λ. β0 β2
        let body = lam(var(0).apply(vec![var(2)]));
        let r = body.subst(&var(1));
        assert_eq!(r, lam(var(0).apply(vec![var(2)])));
        // (λ. β1) [β0 ↦ u]  =  λ. u shifted under one binder
        let body = lam(var(1));
        let r = body.subst(&var(3));
        assert_eq!(r, lam(var(4)));
    }

    #[test]
    fn shift_commutes_with_subst() {
        // shift(1, 0, subst(b, u)) = subst(shift(1, 1, b), shift(1, 0, u))
        let cases = [
            (var(0).apply(vec![var(1)]), var(2)),
            (lam(var(0).apply(vec![var(1), var(3)])), var(0)),
            (lam(lam(var(2))), var(1).apply(vec![var(0)])),
        ];
        for (b, u) in cases {
            let lhs = b.clone().subst(&u).shift(1);
            let rhs = b.shift_above(1, 1).subst(&u.shift(1));
            assert_eq!(lhs, rhs);
        }
    }

    #[test]
    fn unshift_fails_on_captured_variable() {
        assert_eq!(var(0).try_unshift(1), Err(UnshiftError));
        assert_eq!(var(2).try_unshift(1), Ok(var(1)));
        // the bound occurrence under a binder is not free
        assert_eq!(lam(var(0)).try_unshift(1), Ok(lam(var(0))));
        assert_eq!(lam(var(1)).try_unshift(1), Err(UnshiftError));
    }
}
