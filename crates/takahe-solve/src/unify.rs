//! First-order unification over structured types.
//!
//! Three entry points, all returning `Option<Substitution>` so callers can
//! attach the error category appropriate to their stage:
//!
//! - [`unify`] solves a list of equations with an occurs check.
//! - [`equate`] unifies an arbitrary list of types simultaneously; cycle
//!   elimination uses it to collapse strongly connected components.
//! - [`weak_unify`] solves the equational relaxation of a constraint list,
//!   forgetting the subtype direction. Distinct base atoms are compatible
//!   there: subtype solvability needs them related in the base order, not
//!   equal, so only constructor structure and the occurs check can fail.

use takahe_types::{Constraint, Substitution, Type};

/// Shared worklist loop for strict and relaxed unification.
///
/// `bases_compatible` controls the base/base rule: strict unification fails
/// on distinct bases, the weak relaxation treats them as compatible leaves.
fn unify_with(mut work: Vec<(Type, Type)>, bases_compatible: bool) -> Option<Substitution> {
    let mut subst = Substitution::new();
    while let Some((left, right)) = work.pop() {
        let left = subst.apply(&left);
        let right = subst.apply(&right);
        match (left, right) {
            (l, r) if l == r => {}
            (Type::Base(_), Type::Base(_)) if bases_compatible => {}
            (Type::Var(v), ty) | (ty, Type::Var(v)) => {
                // Occurs check: binding a variable to a type containing it
                // would build an infinite type.
                if ty.mentions(v) {
                    return None;
                }
                subst.bind(v, ty);
            }
            (Type::Con(c1, args1), Type::Con(c2, args2)) => {
                if c1 != c2 || args1.len() != args2.len() {
                    return None;
                }
                work.extend(args1.into_iter().zip(args2));
            }
            _ => return None,
        }
    }
    Some(subst)
}

/// Solve a list of equations by standard first-order unification.
///
/// Returns the most general unifier, or `None` on a constructor clash, an
/// arity mismatch, a base clash, or an occurs-check violation. Equations are
/// processed LIFO; decomposed argument equations rejoin the same worklist.
pub fn unify(equations: Vec<(Type, Type)>) -> Option<Substitution> {
    unify_with(equations, false)
}

/// Unify every type in the list with every other.
///
/// Folds the list against its first element; the empty and singleton lists
/// unify trivially.
pub fn equate(types: &[Type]) -> Option<Substitution> {
    let Some((first, rest)) = types.split_first() else {
        return Some(Substitution::new());
    };
    unify(rest.iter().map(|ty| (first.clone(), ty.clone())).collect())
}

/// Unify the equational relaxation of a constraint list.
///
/// Every subtype constraint is treated as an equation. A solution here is a
/// necessary condition for subtype solvability, because subtyping between
/// constructed types requires identical head constructors and recurses. The
/// resulting substitution only witnesses solvability; callers discard it.
pub fn weak_unify(constraints: &[Constraint]) -> Option<Substitution> {
    unify_with(
        constraints.iter().map(Constraint::as_equation).collect(),
        true,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
