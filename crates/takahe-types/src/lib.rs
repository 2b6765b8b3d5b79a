//! Type representations for Takahē.
//!
//! This crate defines the semantic types consumed by the subtype constraint
//! solver: structured types over variables, base atoms, and constructor
//! applications; equality and subtype constraints; substitutions and their
//! atom-ranged specialization; and the caller-supplied table describing the
//! type structure (constructor variances and the base-type order).
//!
//! The solver itself lives in `takahe-solve`. Nothing here performs
//! unification; this crate is pure data plus the algebra of applying and
//! composing substitutions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a type variable during inference.
///
/// Freshness is guaranteed by a monotonic counter in the solver; identities
/// are never reused within one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(pub u32);

impl fmt::Display for TypeVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Name of a base type drawn from the caller-supplied order.
///
/// Uses String for now; can switch to interned strings later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseName(pub String);

impl BaseName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a type constructor (e.g. `List`, `Fn`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConName(pub String);

impl ConName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Variance
// ---------------------------------------------------------------------------

/// Per-position polarity of a type constructor.
///
/// Controls whether subtyping recurses in the same direction (covariant) or
/// the reversed direction (contravariant) at that argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variance {
    Covariant,
    Contravariant,
}

impl fmt::Display for Variance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variance::Covariant => write!(f, "+"),
            Variance::Contravariant => write!(f, "-"),
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A structured type.
///
/// The solver only ever sees these three shapes; user-defined structure is
/// encoded through constructor names whose variances live in [`TypeTable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// Unresolved type variable. Never appears in fully solved types except
    /// as the representative of a variable-only component.
    Var(TypeVarId),
    /// A base type from the caller-supplied order.
    Base(BaseName),
    /// Constructor application with ordered arguments: `C(T1, ..., Tn)`.
    Con(ConName, Vec<Type>),
}

impl Type {
    /// Convenience constructor for a variable type.
    pub fn var(id: u32) -> Type {
        Type::Var(TypeVarId(id))
    }

    /// Convenience constructor for a base type.
    pub fn base(name: impl Into<String>) -> Type {
        Type::Base(BaseName::new(name))
    }

    /// Convenience constructor for a constructor application.
    pub fn con(name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Con(ConName::new(name), args)
    }

    /// Whether `var` occurs anywhere in this type.
    pub fn mentions(&self, var: TypeVarId) -> bool {
        match self {
            Type::Var(v) => *v == var,
            Type::Base(_) => false,
            Type::Con(_, args) => args.iter().any(|arg| arg.mentions(var)),
        }
    }

    /// View this type as an atom, if it is one.
    pub fn as_atom(&self) -> Option<Atom> {
        match self {
            Type::Var(v) => Some(Atom::Var(*v)),
            Type::Base(b) => Some(Atom::Base(b.clone())),
            Type::Con(_, _) => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(v) => write!(f, "{v}"),
            Type::Base(b) => write!(f, "{b}"),
            Type::Con(c, args) => {
                if args.is_empty() {
                    return write!(f, "{c}");
                }
                write!(f, "{c}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Atoms
// ---------------------------------------------------------------------------

/// A leaf in the type structure: a variable or a base type.
///
/// Constraint graphs carry atoms as node labels, so variables and base types
/// share one sum here rather than being distinguished structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    Var(TypeVarId),
    Base(BaseName),
}

impl Atom {
    pub fn is_var(&self) -> bool {
        matches!(self, Atom::Var(_))
    }

    pub fn is_base(&self) -> bool {
        matches!(self, Atom::Base(_))
    }

    /// The variable identity, if this atom is a variable.
    pub fn as_var(&self) -> Option<TypeVarId> {
        match self {
            Atom::Var(v) => Some(*v),
            Atom::Base(_) => None,
        }
    }

    /// The base name, if this atom is a base type.
    pub fn as_base(&self) -> Option<&BaseName> {
        match self {
            Atom::Var(_) => None,
            Atom::Base(b) => Some(b),
        }
    }

    /// Embed this atom back into the type language.
    pub fn to_type(&self) -> Type {
        match self {
            Atom::Var(v) => Type::Var(*v),
            Atom::Base(b) => Type::Base(b.clone()),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Var(v) => write!(f, "{v}"),
            Atom::Base(b) => write!(f, "{b}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// A constraint between two types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The two types must be equal.
    Equal(Type, Type),
    /// The left type must be a subtype of the right type.
    Subtype(Type, Type),
}

impl Constraint {
    /// Left-hand side of the constraint.
    pub fn lhs(&self) -> &Type {
        match self {
            Constraint::Equal(l, _) | Constraint::Subtype(l, _) => l,
        }
    }

    /// Right-hand side of the constraint.
    pub fn rhs(&self) -> &Type {
        match self {
            Constraint::Equal(_, r) | Constraint::Subtype(_, r) => r,
        }
    }

    /// Forget the subtype direction, yielding the equational relaxation.
    pub fn as_equation(&self) -> (Type, Type) {
        match self {
            Constraint::Equal(l, r) | Constraint::Subtype(l, r) => (l.clone(), r.clone()),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Equal(l, r) => write!(f, "{l} = {r}"),
            Constraint::Subtype(l, r) => write!(f, "{l} <: {r}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Free variable computation
// ---------------------------------------------------------------------------

/// Collect all type variables occurring in a type.
pub fn free_type_vars(ty: &Type) -> BTreeSet<TypeVarId> {
    let mut vars = BTreeSet::new();
    collect_free_type_vars(ty, &mut vars);
    vars
}

/// Collect all type variables occurring in a list of constraints.
pub fn constraint_free_vars(constraints: &[Constraint]) -> BTreeSet<TypeVarId> {
    let mut vars = BTreeSet::new();
    for c in constraints {
        collect_free_type_vars(c.lhs(), &mut vars);
        collect_free_type_vars(c.rhs(), &mut vars);
    }
    vars
}

fn collect_free_type_vars(ty: &Type, vars: &mut BTreeSet<TypeVarId>) {
    match ty {
        Type::Var(v) => {
            vars.insert(*v);
        }
        Type::Base(_) => {}
        Type::Con(_, args) => {
            for arg in args {
                collect_free_type_vars(arg, vars);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Maps type variables to their resolved types.
///
/// `apply` resolves chains: if the map sends `t0` to `t1` and `t1` to `Int`,
/// applying to `t0` yields `Int`. The solver maintains the invariant that the
/// map is acyclic (the occurs check rejects direct cycles and every stage
/// binds variables only to types not containing them), so resolution
/// terminates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    map: BTreeMap<TypeVarId, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// A substitution with a single binding.
    pub fn singleton(var: TypeVarId, ty: Type) -> Self {
        let mut subst = Self::new();
        subst.bind(var, ty);
        subst
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn bind(&mut self, var: TypeVarId, ty: Type) {
        self.map.insert(var, ty);
    }

    pub fn lookup(&self, var: TypeVarId) -> Option<&Type> {
        self.map.get(&var)
    }

    pub fn bindings(&self) -> &BTreeMap<TypeVarId, Type> {
        &self.map
    }

    /// The set of variables this substitution binds.
    pub fn domain(&self) -> BTreeSet<TypeVarId> {
        self.map.keys().copied().collect()
    }

    /// Apply this substitution to a type, replacing all bound variables.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Var(v) => match self.lookup(*v) {
                Some(resolved) => self.apply(resolved),
                None => ty.clone(),
            },
            Type::Base(_) => ty.clone(),
            Type::Con(c, args) => {
                Type::Con(c.clone(), args.iter().map(|arg| self.apply(arg)).collect())
            }
        }
    }

    /// Apply this substitution to both sides of a constraint.
    pub fn apply_constraint(&self, constraint: &Constraint) -> Constraint {
        match constraint {
            Constraint::Equal(l, r) => Constraint::Equal(self.apply(l), self.apply(r)),
            Constraint::Subtype(l, r) => Constraint::Subtype(self.apply(l), self.apply(r)),
        }
    }

    /// Compose with a substitution applied before this one.
    ///
    /// `later.compose(&earlier)` produces the substitution equivalent to
    /// applying `earlier` first and `later` second: `later` is applied to
    /// `earlier`'s range, and bindings of `later` for variables outside
    /// `earlier`'s domain are kept as-is.
    pub fn compose(&self, earlier: &Substitution) -> Substitution {
        let mut map = BTreeMap::new();
        for (var, ty) in earlier.bindings() {
            map.insert(*var, self.apply(ty));
        }
        for (var, ty) in self.bindings() {
            map.entry(*var).or_insert_with(|| ty.clone());
        }
        Substitution { map }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, ty)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var} := {ty}")?;
        }
        write!(f, "}}")
    }
}

// ---------------------------------------------------------------------------
// Atom substitution
// ---------------------------------------------------------------------------

/// A substitution whose range contains only atoms.
///
/// Bound resolution assigns base types (and occasionally representative
/// variables) to variables; keeping the atom range explicit lets that stage
/// rewrite graph node sets without round-tripping through full types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomSubstitution {
    map: BTreeMap<TypeVarId, Atom>,
}

impl AtomSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn bind(&mut self, var: TypeVarId, atom: Atom) {
        self.map.insert(var, atom);
    }

    pub fn lookup(&self, var: TypeVarId) -> Option<&Atom> {
        self.map.get(&var)
    }

    /// Apply to an atom, resolving chains of variable bindings.
    pub fn apply_atom(&self, atom: &Atom) -> Atom {
        match atom {
            Atom::Var(v) => match self.lookup(*v) {
                Some(resolved) => self.apply_atom(resolved),
                None => atom.clone(),
            },
            Atom::Base(_) => atom.clone(),
        }
    }

    /// Embed into a full substitution by wrapping each atom as a type.
    pub fn to_substitution(&self) -> Substitution {
        let mut subst = Substitution::new();
        for (var, atom) in &self.map {
            subst.bind(*var, atom.to_type());
        }
        subst
    }
}

// ---------------------------------------------------------------------------
// Type-structure table
// ---------------------------------------------------------------------------

/// Caller-supplied description of the type structure.
///
/// Registers constructor variance rows and the base-type order. The order is
/// stored as its reflexive-transitive closure, recomputed on registration, so
/// `is_subtype` stays a set lookup and `sup`/`inf` are decided by scanning
/// the (finite) base universe for unique least/greatest bounds.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    constructors: BTreeMap<ConName, Vec<Variance>>,
    bases: BTreeSet<BaseName>,
    le: BTreeSet<(BaseName, BaseName)>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor with its per-position variances.
    ///
    /// The length of `variances` is the constructor's arity.
    pub fn register_constructor(&mut self, name: impl Into<String>, variances: Vec<Variance>) {
        self.constructors.insert(ConName::new(name), variances);
    }

    /// Register a base type with no order relations beyond reflexivity.
    pub fn register_base(&mut self, name: impl Into<String>) {
        let base = BaseName::new(name);
        self.le.insert((base.clone(), base.clone()));
        self.bases.insert(base);
    }

    /// Register `sub <= sup` in the base order.
    ///
    /// Both bases are registered if they were not already. The stored
    /// relation is closed under transitivity after every insertion.
    pub fn register_subtype(&mut self, sub: impl Into<String>, sup: impl Into<String>) {
        let sub = BaseName::new(sub);
        let sup = BaseName::new(sup);
        self.le.insert((sub.clone(), sub.clone()));
        self.le.insert((sup.clone(), sup.clone()));
        self.le.insert((sub.clone(), sup.clone()));
        self.bases.insert(sub);
        self.bases.insert(sup);
        self.close();
    }

    fn close(&mut self) {
        loop {
            let mut derived = Vec::new();
            for (a, b) in &self.le {
                for (b2, c) in &self.le {
                    if b == b2 && !self.le.contains(&(a.clone(), c.clone())) {
                        derived.push((a.clone(), c.clone()));
                    }
                }
            }
            if derived.is_empty() {
                break;
            }
            self.le.extend(derived);
        }
    }

    /// The variance row of a constructor, if registered.
    pub fn variances(&self, name: &ConName) -> Option<&[Variance]> {
        self.constructors.get(name).map(Vec::as_slice)
    }

    /// Whether `a <= b` in the base order. Reflexive and transitive.
    pub fn is_subtype(&self, a: &BaseName, b: &BaseName) -> bool {
        a == b || self.le.contains(&(a.clone(), b.clone()))
    }

    /// Least upper bound of a set of bases, if a unique one exists.
    pub fn sup(&self, bases: &BTreeSet<BaseName>) -> Option<BaseName> {
        if bases.is_empty() {
            return None;
        }
        let uppers: Vec<&BaseName> = self
            .bases
            .iter()
            .filter(|u| bases.iter().all(|b| self.is_subtype(b, u)))
            .collect();
        uppers
            .iter()
            .find(|u| uppers.iter().all(|v| self.is_subtype(u, v)))
            .map(|u| (*u).clone())
    }

    /// Greatest lower bound of a set of bases, if a unique one exists.
    pub fn inf(&self, bases: &BTreeSet<BaseName>) -> Option<BaseName> {
        if bases.is_empty() {
            return None;
        }
        let lowers: Vec<&BaseName> = self
            .bases
            .iter()
            .filter(|l| bases.iter().all(|b| self.is_subtype(l, b)))
            .collect();
        lowers
            .iter()
            .find(|l| lowers.iter().all(|m| self.is_subtype(m, l)))
            .map(|l| (*l).clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
