//! Property tests for the solver using proptest.
//!
//! These tests stress invariants that must hold for ANY input constraints,
//! not just hand-picked examples. Key properties:
//!
//! 1. Soundness: when solving succeeds, the substitution satisfies every
//!    input constraint (equalities syntactically, subtypes structurally).
//! 2. Idempotence: applying a solution twice equals applying it once.
//! 3. Weak-unifier necessity: inputs with no equational unifier always fail
//!    with the structural category.
//! 4. Unification reflexivity and consistency.
//! 5. The occurs check rejects variables facing types containing them.
//! 6. Determinism: solving the same input twice gives the same answer.

use proptest::prelude::*;

use crate::{
    solve_constraints, unify, Category, Constraint, Substitution, Type, TypeTable, Variance,
};

// ---------------------------------------------------------------------------
// Fixed table and satisfaction checking
// ---------------------------------------------------------------------------

const BASE_POOL: &[&str] = &["Nat", "Int", "Num", "Bool"];

/// Base order: Nat <= Int <= Num, Bool unrelated.
fn table() -> TypeTable {
    let mut table = TypeTable::new();
    table.register_subtype("Nat", "Int");
    table.register_subtype("Int", "Num");
    table.register_base("Bool");
    table.register_constructor("List", vec![Variance::Covariant]);
    table.register_constructor(
        "Fn",
        vec![Variance::Contravariant, Variance::Covariant],
    );
    table.register_constructor("Pair", vec![Variance::Covariant, Variance::Covariant]);
    table
}

/// Structural subtype check: reflexive on variables, the base order on
/// bases, and positional recursion respecting variance on constructors.
fn subtype_holds(table: &TypeTable, left: &Type, right: &Type) -> bool {
    match (left, right) {
        (Type::Var(a), Type::Var(b)) => a == b,
        (Type::Base(a), Type::Base(b)) => table.is_subtype(a, b),
        (Type::Con(c1, args1), Type::Con(c2, args2)) => {
            if c1 != c2 || args1.len() != args2.len() {
                return false;
            }
            let Some(variances) = table.variances(c1) else {
                return false;
            };
            args1
                .iter()
                .zip(args2)
                .zip(variances)
                .all(|((a, b), variance)| match variance {
                    Variance::Covariant => subtype_holds(table, a, b),
                    Variance::Contravariant => subtype_holds(table, b, a),
                })
        }
        _ => false,
    }
}

fn constraint_holds(table: &TypeTable, solution: &Substitution, constraint: &Constraint) -> bool {
    match constraint {
        Constraint::Equal(l, r) => solution.apply(l) == solution.apply(r),
        Constraint::Subtype(l, r) => {
            subtype_holds(table, &solution.apply(l), &solution.apply(r))
        }
    }
}

// ---------------------------------------------------------------------------
// Strategies for generating types and constraints
// ---------------------------------------------------------------------------

fn arb_type() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![
        (0u32..6).prop_map(Type::var),
        prop::sample::select(BASE_POOL).prop_map(Type::base),
    ];
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| Type::con("List", vec![t])),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Type::con("Fn", vec![a, b])),
            (inner.clone(), inner).prop_map(|(a, b)| Type::con("Pair", vec![a, b])),
        ]
    })
}

fn arb_constraint() -> impl Strategy<Value = Constraint> {
    (arb_type(), arb_type(), any::<bool>()).prop_map(|(l, r, is_eq)| {
        if is_eq {
            Constraint::Equal(l, r)
        } else {
            Constraint::Subtype(l, r)
        }
    })
}

fn arb_constraints() -> impl Strategy<Value = Vec<Constraint>> {
    prop::collection::vec(arb_constraint(), 0..5)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn solver_is_sound(cs in arb_constraints()) {
        let table = table();
        if let Ok(solution) = solve_constraints(&cs, &table) {
            for constraint in &cs {
                prop_assert!(
                    constraint_holds(&table, &solution, constraint),
                    "solution {solution} does not satisfy {constraint}"
                );
            }
        }
    }

    #[test]
    fn solutions_are_idempotent(cs in arb_constraints(), probe in arb_type()) {
        let table = table();
        if let Ok(solution) = solve_constraints(&cs, &table) {
            let once = solution.apply(&probe);
            prop_assert_eq!(solution.apply(&once), once);
        }
    }

    #[test]
    fn weak_unifier_is_necessary(cs in arb_constraints()) {
        let table = table();
        match (unify::weak_unify(&cs), solve_constraints(&cs, &table)) {
            // No equational unifier: the solver must fail structurally.
            (None, result) => {
                let err = result.expect_err("weakly non-unifiable input must fail");
                prop_assert_eq!(err.category, Category::NoWeakUnifier);
            }
            // An equational unifier exists: any failure is a subtype failure.
            (Some(_), Err(err)) => {
                prop_assert_eq!(err.category, Category::NoUnify);
            }
            (Some(_), Ok(_)) => {}
        }
    }

    #[test]
    fn unify_is_reflexive(ty in arb_type()) {
        let unifier = unify::unify(vec![(ty.clone(), ty)]).expect("unifies with itself");
        prop_assert!(unifier.is_empty());
    }

    #[test]
    fn unify_makes_both_sides_equal(a in arb_type(), b in arb_type()) {
        if let Some(unifier) = unify::unify(vec![(a.clone(), b.clone())]) {
            prop_assert_eq!(unifier.apply(&a), unifier.apply(&b));
        }
    }

    #[test]
    fn occurs_check_rejects_self_containment(var_id in 0u32..6, ty in arb_type()) {
        let var = Type::var(var_id);
        // Wrap so the variable occurs strictly inside a constructor.
        let containing = Type::con("Pair", vec![var.clone(), ty]);
        prop_assert!(unify::unify(vec![(var, containing)]).is_none());
    }

    #[test]
    fn solving_is_deterministic(cs in arb_constraints()) {
        let table = table();
        let first = solve_constraints(&cs, &table);
        let second = solve_constraints(&cs, &table);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn equalities_alone_match_plain_unification(
        pairs in prop::collection::vec((arb_type(), arb_type()), 0..4)
    ) {
        let table = table();
        let cs: Vec<Constraint> = pairs
            .iter()
            .map(|(l, r)| Constraint::Equal(l.clone(), r.clone()))
            .collect();
        let solved = solve_constraints(&cs, &table);
        let unified = unify::unify(pairs.clone());
        match (solved, unified) {
            (Ok(solution), Some(_)) => {
                for (l, r) in &pairs {
                    prop_assert_eq!(solution.apply(l), solution.apply(r));
                }
            }
            (Err(_), None) => {}
            (Ok(_), None) => prop_assert!(false, "solver accepted what unification rejects"),
            (Err(err), Some(_)) => {
                prop_assert!(false, "solver rejected unifiable equalities: {}", err)
            }
        }
    }
}
