//! Shared terms for the lambda-Pi calculus.

use crate::fmt::application as fmt_appl;
use crate::symbol::Symbol;
use std::fmt;
use std::rc::Rc;

/// Pointer to a shared term.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RTerm(Rc<Term>);

/// De Bruijn variable.
pub type DeBruijn = usize;

/// Display hint for a bound variable.
pub type Name = Rc<str>;

/// Argument of a binder.
///
/// For example, the `x` and `A` in the term `\ x : A => t`.
/// The identifier is a display hint only; it is ignored by equality.
#[derive(Clone, Debug)]
pub struct Arg<Ty> {
    pub id: Name,
    pub ty: Ty,
}

impl<Ty: PartialEq> PartialEq for Arg<Ty> {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl<Ty: Eq> Eq for Arg<Ty> {}

impl<Ty> Arg<Ty> {
    pub fn new(id: &str, ty: Ty) -> Self {
        let id = Rc::from(id);
        Self { id, ty }
    }

    pub fn map_ty<U>(self, f: impl FnOnce(Ty) -> U) -> Arg<U> {
        let ty = f(self.ty);
        Arg { id: self.id, ty }
    }
}

/// Shared term for the lambda-Pi calculus.
///
/// Applications are kept flat: the head of an `Appl` is never itself
/// an `Appl`, and its argument list is nonempty. [`RTerm::apply`]
/// maintains this shape.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Term {
    /// sort of `Type`; appears only as an inferred type
    Kind,
    /// sort of types
    Type,
    /// reference to a signature symbol
    Symb(Symbol),
    /// bound variable
    BVar(DeBruijn),
    /// application of at least one argument to a non-application head
    Appl(RTerm, Vec<RTerm>),
    /// abstraction; the domain may be omitted on rule right-hand sides
    Abst(Arg<Option<RTerm>>, RTerm),
    /// dependent product
    Prod(Arg<RTerm>, RTerm),
}

impl Default for Term {
    fn default() -> Self {
        Self::Type
    }
}

impl RTerm {
    /// Create a term pointer from a term.
    pub fn new(t: Term) -> Self {
        Self(Rc::new(t))
    }

    /// Apply some terms to the term, keeping applications flat.
    pub fn apply(self, mut args: Vec<RTerm>) -> Self {
        if args.is_empty() {
            self
        } else {
            match &*self {
                Term::Appl(head, args1) => {
                    let mut args1 = args1.clone();
                    args1.append(&mut args);
                    Self::new(Term::Appl(head.clone(), args1))
                }
                _ => Self::new(Term::Appl(self, args)),
            }
        }
    }

    /// Compare the memory addresses of two term pointers.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Term> for RTerm {
    fn from(t: Term) -> Self {
        Self::new(t)
    }
}

impl std::ops::Deref for RTerm {
    type Target = Term;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for RTerm {
    fn default() -> Self {
        Self::new(Term::default())
    }
}

impl fmt::Display for Arg<Option<RTerm>> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(ty) = self.ty.as_ref() {
            write!(f, " : {}", ty)?;
        }
        Ok(())
    }
}

impl fmt::Display for Arg<RTerm> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} : {}", self.id, self.ty)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Kind => write!(f, "Kind"),
            Self::Type => write!(f, "Type"),
            Self::Symb(s) => s.fmt(f),
            Self::BVar(x) => write!(f, "β{}", x),
            Self::Appl(head, tail) => fmt_appl(head, tail, f),
            Self::Abst(arg, tm) => write!(f, "(λ {}. {})", arg, tm),
            Self::Prod(arg, tm) => write!(f, "(Π {}. {})", arg, tm),
        }
    }
}

impl fmt::Display for RTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (**self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Symbols;

    #[test]
    fn applications_stay_flat() {
        let mut syms = Symbols::new();
        let f = RTerm::new(Term::Symb(syms.intern("f")));
        let a = RTerm::new(Term::Symb(syms.intern("a")));
        let b = RTerm::new(Term::Symb(syms.intern("b")));

        let fa = f.clone().apply(vec![a.clone()]);
        let fab = fa.apply(vec![b.clone()]);
        match &*fab {
            Term::Appl(head, args) => {
                assert_eq!(head, &f);
                assert_eq!(args, &[a, b]);
            }
            _ => panic!("expected application"),
        }
    }

    #[test]
    fn apply_nothing_is_identity() {
        let t = RTerm::new(Term::Type);
        assert!(t.clone().apply(Vec::new()).ptr_eq(&t));
    }

    #[test]
    fn equality_ignores_name_hints() {
        let ty = RTerm::new(Term::Type);
        let l1 = Term::Abst(Arg::new("x", Some(ty.clone())), RTerm::new(Term::BVar(0)));
        let l2 = Term::Abst(Arg::new("y", Some(ty)), RTerm::new(Term::BVar(0)));
        assert_eq!(l1, l2);
    }
}
