//! Maps from symbols to their types and associated rewrite rules.

use crate::dtree::{self, DTree};
use crate::error::{Error, SignatureError, TreeError};
use crate::reduce::Config;
use crate::rule::Rule;
use crate::symbol::Symbol;
use crate::term::RTerm;
use std::rc::Rc;

/// Immutable HashMap for fast signature cloning.
type FnvHashMap<K, V> = im::HashMap<K, V, fnv::FnvBuildHasher>;

/// May a symbol be rewritten by user rules?
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Staticity {
    /// no rewrite rules may be attached
    Static,
    /// rewrite rules may be attached
    Definable,
}

/// External judge of the rewrite system;
/// rule addition fails when it returns false.
pub type Confluence = Rc<dyn Fn(&[Rule]) -> bool>;

/// Map from symbols to their types, staticity, and rewrite rules.
///
/// Rules sharing a head symbol are merged into a single rewrite tree,
/// stored along the pivot arity that tells the reducer how many stack
/// elements the tree inspects.
///
/// The signature also carries the active reduction [`Config`];
/// queries overlay it on a clone of the signature, which is cheap
/// thanks to the persistent maps.
#[derive(Clone, Default)]
pub struct Signature {
    types: FnvHashMap<Symbol, (Staticity, RTerm)>,
    rules: FnvHashMap<Symbol, Vec<Rule>>,
    trees: FnvHashMap<Symbol, (usize, Rc<DTree>)>,
    pub cfg: Config,
    confluence: Option<Confluence>,
}

impl Signature {
    /// Construct an empty signature with the default reduction config.
    pub fn new() -> Self {
        Default::default()
    }

    /// Return a clone of the signature with the given reduction config.
    pub fn with_cfg(&self, cfg: Config) -> Self {
        let mut sig = self.clone();
        sig.cfg = cfg;
        sig
    }

    /// Install the external confluence checker consulted on rule addition.
    pub fn set_confluence(&mut self, check: Confluence) {
        self.confluence = Some(check);
    }

    /// Return the type of a symbol.
    pub fn get_type(&self, sym: &Symbol) -> Result<RTerm, SignatureError> {
        let (_, ty) = self
            .types
            .get(sym)
            .ok_or_else(|| SignatureError::SymbolNotFound(sym.clone()))?;
        Ok(ty.clone())
    }

    /// Return whether a symbol admits rewrite rules.
    pub fn staticity(&self, sym: &Symbol) -> Result<Staticity, SignatureError> {
        let (st, _) = self
            .types
            .get(sym)
            .ok_or_else(|| SignatureError::SymbolNotFound(sym.clone()))?;
        Ok(*st)
    }

    /// Return the rewrite rules attached to a symbol, in admission order.
    pub fn get_rules(&self, sym: &Symbol) -> &[Rule] {
        self.rules.get(sym).map_or(&[], |rs| rs)
    }

    /// Return the rewrite tree of a symbol, restricted to the rules
    /// admitted by the active rule selector.
    pub fn get_tree(&self, sym: &Symbol) -> Option<(usize, Rc<DTree>)> {
        match &self.cfg.select {
            None => self.trees.get(sym).cloned(),
            Some(pred) => {
                let rules = self.rules.get(sym)?;
                let kept: Vec<Rule> = rules.iter().filter(|r| pred(&r.name)).cloned().collect();
                if kept.is_empty() {
                    return None;
                }
                match dtree::compile(self, &kept) {
                    Ok((pivot, tree)) => Some((pivot, Rc::new(tree))),
                    Err(err) => {
                        // a subset of an already compiled rule set
                        // compiles unless the selector is unlucky
                        warn!("selector yields uncompilable rules for {}: {}", sym, err);
                        None
                    }
                }
            }
        }
    }

    /// Introduce a new symbol with the given staticity and type.
    pub fn add_declaration(
        &mut self,
        sym: Symbol,
        staticity: Staticity,
        typ: RTerm,
    ) -> Result<(), SignatureError> {
        if self.types.contains_key(&sym) {
            return Err(SignatureError::AlreadyDefined(sym));
        }
        self.types.insert(sym, (staticity, typ));
        Ok(())
    }

    /// Attach rewrite rules to a definable symbol,
    /// recompiling the symbol's rewrite tree.
    ///
    /// All rules must share their head symbol.
    /// After a successful recompilation, the external confluence
    /// checker (if any) is consulted with the merged rule set.
    pub fn add_rules(&mut self, rules: Vec<Rule>) -> Result<(), Error> {
        let head = match rules.first() {
            Some(rule) => rule.lhs.symbol.clone(),
            None => return Ok(()),
        };
        if rules.iter().any(|r| r.lhs.symbol != head) {
            return Err(TreeError::HeadSymbolMismatch.into());
        }
        if self.staticity(&head)? == Staticity::Static {
            return Err(SignatureError::CannotRewriteStaticSymbol(head).into());
        }

        let mut merged = self.rules.get(&head).cloned().unwrap_or_default();
        merged.extend(rules);

        let (pivot, tree) = dtree::compile(self, &merged)?;
        if let Some(check) = &self.confluence {
            if !check(&merged) {
                return Err(SignatureError::ConfluenceCheckFailed.into());
            }
        }

        for rule in merged.iter().skip(self.get_rules(&head).len()) {
            debug!("adding rule {}", rule);
        }
        self.rules.insert(head.clone(), merged);
        self.trees.insert(head, (pivot, Rc::new(tree)));
        Ok(())
    }
}
