//! Compilation of rewrite rules into rewrite trees.
//!
//! All rules attached to a symbol are compiled into a single tree
//! that the reducer walks to decide which rule fires on a given
//! argument stack. Inner nodes ([`DTree::Switch`]) discriminate on
//! the head shape of one stack column; leaves ([`DTree::Test`])
//! carry the matching problem and guards of one rule.
//!
//! Columns are numbered in argument order. Specialising a column
//! appends the arguments of the inspected term as new columns at the
//! right end, mirrored at runtime by the reducer pushing the
//! destructed sub-terms; a consumed column is replaced by a joker so
//! that column indices remain stable.

use crate::error::TreeError;
use crate::pattern::{Miller, Pattern};
use crate::rule::{joker_count, Rule, RuleName};
use crate::signature::{Signature, Staticity};
use crate::symbol::Symbol;
use crate::term::{DeBruijn, RTerm};
use std::fmt;

/// Head shape of one column, discriminated by a [`DTree::Switch`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Case {
    /// a symbol applied to exactly the given number of arguments
    Symb(Symbol, usize),
    /// a bound variable applied to exactly the given number of arguments
    BVar(DeBruijn, usize),
    /// an abstraction
    Abst,
}

/// Where and how to read the value of one pattern variable.
#[derive(Clone, Debug)]
pub struct Atom {
    pub var: Miller,
    /// column holding the matched sub-term
    pub col: usize,
    /// number of abstractions crossed above the column
    pub depth: usize,
    /// bound variables the pattern variable is applied to
    pub args: Vec<DeBruijn>,
}

/// Matching problem of one rule.
#[derive(Clone, Debug)]
pub enum Problem {
    /// all variables are read directly from their column,
    /// adjusted for abstraction depth
    Syntactic(Vec<Atom>),
    /// at least one variable requires higher-order matching
    Pattern(Vec<Atom>),
}

impl Problem {
    pub fn atoms(&self) -> &[Atom] {
        match self {
            Self::Syntactic(atoms) | Self::Pattern(atoms) => atoms,
        }
    }
}

/// Conditions to verify after a successful match.
#[derive(Clone, Debug)]
pub enum Guard {
    /// a repeated occurrence of a variable;
    /// its value must be convertible with the primary occurrence
    Linearity(Atom),
    /// a bracket: the value at the column must be convertible with
    /// the enclosed term under the matched substitution
    Bracket {
        col: usize,
        depth: usize,
        term: RTerm,
    },
}

/// Rewrite tree, walked by the reducer.
#[derive(Clone, Debug)]
pub enum DTree {
    /// inspect a column and branch on its head shape
    Switch {
        col: usize,
        cases: Vec<(Case, DTree)>,
        default: Option<Box<DTree>>,
    },
    /// try to fire one rule, falling through to `default` if
    /// matching or a linearity guard fails
    Test {
        rule: RuleName,
        problem: Problem,
        guards: Vec<Guard>,
        rhs: RTerm,
        /// number of pattern variables bound by the rule
        ctx_len: usize,
        default: Option<Box<DTree>>,
    },
}

/// Compile the rules of one symbol into a tree.
///
/// Return the pivot (the widest rule arity, to which all rules are
/// padded) together with the tree.
pub fn compile(sig: &Signature, rules: &[Rule]) -> Result<(usize, DTree), TreeError> {
    let head = match rules.first() {
        Some(rule) => &rule.lhs.symbol,
        None => return Err(TreeError::HeadSymbolMismatch),
    };
    if rules.iter().any(|r| r.lhs.symbol != *head) {
        return Err(TreeError::HeadSymbolMismatch);
    }

    let pivot = rules.iter().map(|r| r.lhs.args.len()).max().unwrap_or(0);
    let mut fresh = rules
        .iter()
        .map(|r| joker_count(&r.lhs.args))
        .max()
        .unwrap_or(0);

    let rows = rules
        .iter()
        .map(|rule| {
            let mut pats = rule.lhs.args.clone();
            pats.resize_with(pivot, || {
                fresh += 1;
                Pattern::Joker(fresh - 1)
            });
            Row { rule, pats }
        })
        .collect();

    let matrix = Matrix {
        rows,
        depths: vec![0; pivot],
        fresh,
    };
    Ok((pivot, matrix.compile(sig)?))
}

/// One surviving rule with its remaining column patterns.
#[derive(Clone)]
struct Row<'r> {
    rule: &'r Rule,
    pats: Vec<Pattern>,
}

/// Pattern matrix: one row per surviving rule,
/// one abstraction depth per column.
struct Matrix<'r> {
    rows: Vec<Row<'r>>,
    depths: Vec<usize>,
    fresh: usize,
}

impl<'r> Matrix<'r> {
    fn compile(self, sig: &Signature) -> Result<DTree, TreeError> {
        // leftmost column in which some row wants to inspect the term
        let col = (0..self.depths.len())
            .find(|j| self.rows.iter().any(|r| !r.pats[*j].is_wildcard()));
        match col {
            None => Ok(self.leaves()),
            Some(col) => self.switch(col, sig),
        }
    }

    /// Emit the surviving rows as a chain of tests in source order.
    fn leaves(self) -> DTree {
        let mut tree = None;
        for row in self.rows.iter().rev() {
            tree = Some(Box::new(make_test(row, &self.depths, tree.take())));
        }
        // compilation never starts from an empty rule set
        *tree.unwrap_or_else(|| {
            Box::new(DTree::Switch {
                col: 0,
                cases: Vec::new(),
                default: None,
            })
        })
    }

    fn switch(self, col: usize, sig: &Signature) -> Result<DTree, TreeError> {
        let depth = self.depths[col];

        // case shapes in order of first appearance
        let mut cases: Vec<Case> = Vec::new();
        for row in &self.rows {
            let case = match &row.pats[col] {
                Pattern::Symb(s, args) => Case::Symb(s.clone(), args.len()),
                Pattern::BVar(n, args) => Case::BVar(*n, args.len()),
                Pattern::Abst(_) => Case::Abst,
                _ => continue,
            };
            if !cases.contains(&case) {
                cases.push(case);
            }
        }

        // a definable symbol under two arities could reduce away
        // from under the switch, so refuse to compile it
        for (i, case) in cases.iter().enumerate() {
            if let Case::Symb(s, k) = case {
                let clash = cases[..i]
                    .iter()
                    .any(|c| matches!(c, Case::Symb(s2, k2) if s2 == s && k2 != k));
                if clash && matches!(sig.staticity(s), Ok(Staticity::Definable)) {
                    return Err(TreeError::ArityInnerMismatch(s.clone()));
                }
            }
        }

        let mut branches = Vec::with_capacity(cases.len());
        for case in cases {
            let (arity, sub_depth) = match &case {
                Case::Symb(_, k) | Case::BVar(_, k) => (*k, depth),
                Case::Abst => (1, depth + 1),
            };

            let mut fresh = self.fresh;
            let mut rows = Vec::new();
            for row in &self.rows {
                let mut row = row.clone();
                match (&row.pats[col], &case) {
                    (Pattern::Symb(s, args), Case::Symb(s2, k))
                        if s == s2 && args.len() == *k =>
                    {
                        let args = args.clone();
                        row.pats[col] = joker(&mut fresh);
                        row.pats.extend(args);
                    }
                    (Pattern::BVar(n, args), Case::BVar(n2, k))
                        if n == n2 && args.len() == *k =>
                    {
                        let args = args.clone();
                        row.pats[col] = joker(&mut fresh);
                        row.pats.extend(args);
                    }
                    (Pattern::Abst(body), Case::Abst) => {
                        let body = (**body).clone();
                        row.pats[col] = joker(&mut fresh);
                        row.pats.push(body);
                    }
                    (p, _) if p.is_wildcard() => {
                        // a wildcard joins every case, padded to the
                        // width of the specialised matrix
                        row.pats
                            .extend(std::iter::repeat_with(|| joker(&mut fresh)).take(arity));
                    }
                    _ => continue,
                }
                rows.push(row);
            }

            let mut depths = self.depths.clone();
            depths.extend(std::iter::repeat(sub_depth).take(arity));
            let matrix = Matrix {
                rows,
                depths,
                fresh,
            };
            branches.push((case, matrix.compile(sig)?));
        }

        let defaults: Vec<Row> = self
            .rows
            .iter()
            .filter(|r| r.pats[col].is_wildcard())
            .cloned()
            .collect();
        let default = if defaults.is_empty() {
            None
        } else {
            let matrix = Matrix {
                rows: defaults,
                depths: self.depths.clone(),
                fresh: self.fresh,
            };
            Some(Box::new(matrix.compile(sig)?))
        };

        Ok(DTree::Switch {
            col,
            cases: branches,
            default,
        })
    }
}

fn joker(fresh: &mut usize) -> Pattern {
    *fresh += 1;
    Pattern::Joker(*fresh - 1)
}

/// Emit the test leaf of one row.
fn make_test(row: &Row, depths: &[usize], default: Option<Box<DTree>>) -> DTree {
    let k = row.rule.ctx.len();
    let mut primary: Vec<Option<Atom>> = vec![None; k];
    let mut guards = Vec::new();
    let mut syntactic = true;

    for (col, pat) in row.pats.iter().enumerate() {
        match pat {
            Pattern::MVar(m, args) => {
                let atom = Atom {
                    var: *m,
                    col,
                    depth: depths[col],
                    args: args.clone(),
                };
                syntactic = syntactic && atom.args.is_empty();
                match &primary[*m] {
                    None => primary[*m] = Some(atom),
                    Some(_) => guards.push(Guard::Linearity(atom)),
                }
            }
            Pattern::Bracket(term) => guards.push(Guard::Bracket {
                col,
                depth: depths[col],
                term: term.clone(),
            }),
            Pattern::Joker(_) => (),
            // rigid patterns cannot survive to a leaf
            Pattern::Symb(..) | Pattern::BVar(..) | Pattern::Abst(_) => (),
        }
    }

    let atoms: Vec<Atom> = primary.into_iter().flatten().collect();
    let problem = if syntactic {
        Problem::Syntactic(atoms)
    } else {
        Problem::Pattern(atoms)
    };

    DTree::Test {
        rule: row.rule.name.clone(),
        problem,
        guards,
        rhs: row.rule.rhs.clone(),
        ctx_len: k,
        default,
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Symb(s, k) => write!(f, "{}/{}", s, k),
            Self::BVar(n, k) => write!(f, "β{}/{}", n, k),
            Self::Abst => write!(f, "λ"),
        }
    }
}

impl DTree {
    fn fmt_indent(&self, f: &mut fmt::Formatter, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Self::Switch {
                col,
                cases,
                default,
            } => {
                writeln!(f, "{}switch column {}", pad, col)?;
                for (case, tree) in cases {
                    writeln!(f, "{}case {}:", pad, case)?;
                    tree.fmt_indent(f, indent + 1)?;
                }
                if let Some(tree) = default {
                    writeln!(f, "{}default:", pad)?;
                    tree.fmt_indent(f, indent + 1)?;
                }
                Ok(())
            }
            Self::Test {
                rule,
                guards,
                rhs,
                default,
                ..
            } => {
                writeln!(f, "{}{} ⟶ {} ({} guards)", pad, rule, rhs, guards.len())?;
                if let Some(tree) = default {
                    writeln!(f, "{}default:", pad)?;
                    tree.fmt_indent(f, indent + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for DTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_indent(f, 0)
    }
}
