//! Subtype constraint solving for Takahē.
//!
//! This crate implements constraint solving for Hindley-Milner type
//! inference extended with coercive subtyping. Given equality and subtype
//! constraints over structured types, [`solve_constraints`] either produces
//! a substitution satisfying all of them or reports why none exists.
//!
//! Solving is a strict pipeline; each stage consumes the previous stage's
//! output and grows the accumulated substitution:
//!
//! 1. Weak unification: treat every constraint as an equation and unify.
//!    Failure here is a proof that no subtype solution exists either.
//! 2. Simplification: unify equalities and decompose subtypes between
//!    constructed types until only atomic pairs (variable against variable
//!    or base) remain.
//! 3. Graph construction: atomic pairs become edges of a directed graph on
//!    atoms.
//! 4. Cycle elimination: each strongly connected component forces mutual
//!    subtyping, hence equality; unify it down to one representative.
//! 5. Bound resolution: assign base types to variables from their
//!    predecessors (lower bounds) and successors (upper bounds), one
//!    variable per pass.
//! 6. Residual merge: unify the variable-only components that never met a
//!    base bound, so no subtype chains survive into the result.
//!
//! The solver is single-threaded and synchronous; all state lives in the
//! call frame. Fresh variables come from a per-invocation monotonic counter
//! seeded above every variable visible in the input.

pub mod graph;
pub mod trace;
pub mod unify;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

// Re-export for convenience.
pub use takahe_diag::{Category, SolveError};
pub use takahe_types::{
    constraint_free_vars, free_type_vars, Atom, AtomSubstitution, BaseName, ConName, Constraint,
    Substitution, Type, TypeTable, TypeVarId, Variance,
};

use crate::graph::ConstraintGraph;
use crate::trace::{SolveAction, SolveStep};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Solve a constraint list against a type table.
///
/// On success the returned substitution satisfies every constraint: applied
/// to both sides, equalities become syntactically equal and subtypes hold
/// structurally. On failure the error category records whether the
/// constraints clash even as equations ([`Category::NoWeakUnifier`]) or are
/// structurally consistent but unsolvable ([`Category::NoUnify`]).
pub fn solve_constraints(
    constraints: &[Constraint],
    table: &TypeTable,
) -> Result<Substitution, SolveError> {
    Solver::new(table).solve(constraints)
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Tuning knobs for a solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Upper bound on simplification steps. Termination is guaranteed by the
    /// weak unification check, so this only backstops very large constraint
    /// sets; exceeding it surfaces as an ordinary solve error.
    pub max_simplify_steps: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            // High default guard to catch accidental non-termination without
            // affecting any realistic constraint set.
            max_simplify_steps: 1_000_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Solves subtype constraint lists against a type table.
///
/// Owns the fresh-variable counter and the optional step trace. Each call to
/// [`Solver::solve`] is independent: the counter is reseeded from the input
/// and no state carries over between calls except accumulated trace steps.
pub struct Solver<'t> {
    table: &'t TypeTable,
    options: SolveOptions,
    next_var: u32,
    /// When true, solver decisions are recorded for observability tools.
    tracing: bool,
    steps: Vec<SolveStep>,
}

impl<'t> Solver<'t> {
    pub fn new(table: &'t TypeTable) -> Self {
        Self::with_options(table, SolveOptions::default())
    }

    pub fn with_options(table: &'t TypeTable, options: SolveOptions) -> Self {
        Self {
            table,
            options,
            next_var: 0,
            tracing: false,
            steps: Vec::new(),
        }
    }

    /// Enable step-by-step tracing for observability tools.
    pub fn enable_tracing(&mut self) {
        self.tracing = true;
    }

    /// Whether tracing is currently enabled.
    pub fn is_tracing(&self) -> bool {
        self.tracing
    }

    /// The recorded solver steps (empty unless tracing is enabled).
    pub fn trace(&self) -> &[SolveStep] {
        &self.steps
    }

    fn push_step(&mut self, action: SolveAction, detail: String) {
        if !self.tracing {
            return;
        }
        self.steps.push(SolveStep {
            step: self.steps.len(),
            action,
            detail,
        });
    }

    fn fresh_var(&mut self) -> TypeVarId {
        let id = TypeVarId(self.next_var);
        self.next_var += 1;
        id
    }

    fn fresh_type(&mut self) -> Type {
        Type::Var(self.fresh_var())
    }

    fn variance_row(&self, name: &ConName) -> Result<&'t [Variance], SolveError> {
        self.table.variances(name).ok_or_else(|| {
            SolveError::no_unify(format!("unknown constructor `{name}` in subtype constraint"))
                .with_help("register the constructor and its variances in the type table")
        })
    }

    /// Run the full pipeline.
    pub fn solve(&mut self, constraints: &[Constraint]) -> Result<Substitution, SolveError> {
        // Fresh variables generated during simplification must be distinct
        // from every variable visible in the input.
        self.next_var = constraint_free_vars(constraints)
            .last()
            .map_or(0, |var| var.0 + 1);

        if unify::weak_unify(constraints).is_none() {
            return Err(SolveError::no_weak_unifier(
                "the constraints have no unifier even with subtype direction ignored",
            )
            .with_help(
                "two positions forced together carry different head constructors, \
                 or a variable would have to contain itself",
            ));
        }
        self.push_step(
            SolveAction::WeakUnifyCheck,
            format!("{} constraints are weakly unifiable", constraints.len()),
        );

        let (atomic, theta_simp) = self.simplify(constraints.to_vec())?;
        let graph = ConstraintGraph::from_pairs(&atomic);
        let (dag, theta_cyc) = self.eliminate_cycles(&graph)?;
        let (residual, theta_sol) = self.resolve_bounds(&dag)?;
        let theta_wcc = self.merge_residual(&residual);

        // Rightmost applied first: simplification, then cycle elimination,
        // then bound resolution, then the residual merge.
        let mut solution = theta_cyc.compose(&theta_simp);
        if !theta_sol.is_empty() {
            solution = theta_sol.to_substitution().compose(&solution);
        }
        if !theta_wcc.is_empty() {
            solution = theta_wcc.to_substitution().compose(&solution);
        }
        // Idempotence: nothing a binding resolves to mentions a bound
        // variable.
        debug_assert!(
            solution
                .bindings()
                .values()
                .all(|ty| free_type_vars(ty).is_disjoint(&solution.domain())),
            "solution substitution must be idempotent"
        );
        Ok(solution)
    }

    // -----------------------------------------------------------------------
    // Stage 2: simplification to atomic constraints
    // -----------------------------------------------------------------------

    /// Reduce constraints to atomic subtype pairs plus an equality
    /// substitution.
    ///
    /// Worklist fixpoint: equalities are unified into the running
    /// substitution; constructor/constructor subtypes decompose by variance;
    /// a variable facing a constructor is expanded with fresh arguments;
    /// base/base subtypes are checked against the table and dropped. A
    /// constraint survives only when both sides are atoms and at least one
    /// is a variable.
    fn simplify(
        &mut self,
        constraints: Vec<Constraint>,
    ) -> Result<(Vec<(Atom, Atom)>, Substitution), SolveError> {
        let mut theta = Substitution::new();
        let mut work: VecDeque<Constraint> = constraints.into();
        let mut atomic: Vec<(Atom, Atom)> = Vec::new();
        let mut steps = 0usize;

        while let Some(constraint) = work.pop_front() {
            steps += 1;
            if steps > self.options.max_simplify_steps {
                return Err(SolveError::no_unify(
                    "constraint simplification exceeded its step budget",
                )
                .with_help(format!(
                    "stopped at `{constraint}` after {} steps; raise `max_simplify_steps` \
                     for very large constraint sets",
                    self.options.max_simplify_steps
                )));
            }
            match constraint {
                Constraint::Equal(left, right) => {
                    let binding =
                        unify::unify(vec![(left.clone(), right.clone())]).ok_or_else(|| {
                            SolveError::no_unify(format!("cannot unify `{left}` with `{right}`"))
                        })?;
                    self.push_step(
                        SolveAction::UnifyEquality,
                        format!("{left} = {right} via {binding}"),
                    );
                    if !binding.is_empty() {
                        rewrite_pending(&binding, &mut work, &mut atomic);
                        theta = binding.compose(&theta);
                    }
                }
                Constraint::Subtype(left, right) => match (left, right) {
                    (Type::Con(c1, args1), Type::Con(c2, args2)) => {
                        if c1 != c2 {
                            return Err(SolveError::no_unify(format!(
                                "subtype constraint relates distinct constructors \
                                 `{c1}` and `{c2}`"
                            )));
                        }
                        let variances = self.variance_row(&c1)?;
                        if variances.len() != args1.len() || variances.len() != args2.len() {
                            return Err(SolveError::no_unify(format!(
                                "constructor `{c1}` is registered with arity {} but applied \
                                 to {} arguments",
                                variances.len(),
                                args1.len().max(args2.len())
                            )));
                        }
                        self.push_step(
                            SolveAction::Decompose,
                            format!("{c1} arguments split into positional subtypes"),
                        );
                        // Prepend argument constraints, preserving position
                        // order at the front of the worklist.
                        for ((a1, a2), variance) in
                            args1.into_iter().zip(args2).zip(variances.iter().copied()).rev()
                        {
                            let argument = match variance {
                                Variance::Covariant => Constraint::Subtype(a1, a2),
                                Variance::Contravariant => Constraint::Subtype(a2, a1),
                            };
                            work.push_front(argument);
                        }
                    }
                    (Type::Var(var), Type::Con(con, args)) => {
                        let expansion = self.expand_variable(var, &con)?;
                        let binding = Substitution::singleton(var, expansion.clone());
                        rewrite_pending(&binding, &mut work, &mut atomic);
                        // Reinsert the current constraint with the binding
                        // applied; the expansion faces the rewritten original.
                        let rewritten = binding.apply(&Type::Con(con, args));
                        work.push_front(Constraint::Subtype(expansion, rewritten));
                        theta = binding.compose(&theta);
                    }
                    (Type::Con(con, args), Type::Var(var)) => {
                        let expansion = self.expand_variable(var, &con)?;
                        let binding = Substitution::singleton(var, expansion.clone());
                        rewrite_pending(&binding, &mut work, &mut atomic);
                        let rewritten = binding.apply(&Type::Con(con, args));
                        work.push_front(Constraint::Subtype(rewritten, expansion));
                        theta = binding.compose(&theta);
                    }
                    (Type::Base(b1), Type::Base(b2)) => {
                        if !self.table.is_subtype(&b1, &b2) {
                            return Err(SolveError::no_unify(format!(
                                "base type `{b1}` is not a subtype of `{b2}`"
                            ))
                            .with_help(
                                "declare the relation in the type table if it should hold",
                            ));
                        }
                        self.push_step(
                            SolveAction::DiscardBasePair,
                            format!("{b1} <: {b2} holds in the base order"),
                        );
                    }
                    (left @ (Type::Var(_) | Type::Base(_)), right @ (Type::Var(_) | Type::Base(_))) => {
                        let src = left.as_atom().expect("checked atom shape");
                        let dst = right.as_atom().expect("checked atom shape");
                        debug_assert!(
                            src.is_var() || dst.is_var(),
                            "base/base pairs are handled before reaching atomic form"
                        );
                        self.push_step(SolveAction::EmitAtomic, format!("{src} <: {dst}"));
                        atomic.push((src, dst));
                    }
                    (left @ (Type::Base(_) | Type::Con(_, _)), right) => {
                        // Defensive only: a base/constructor head mismatch is a
                        // structural clash that the weak-unification pre-check
                        // (stage 1) already rejects with `NoWeakUnifier` before
                        // simplification ever sees it.
                        return Err(SolveError::no_unify(format!(
                            "subtype constraint relates incompatible type shapes \
                             `{left}` and `{right}`"
                        )));
                    }
                },
            }
        }
        Ok((atomic, theta))
    }

    /// Fresh expansion of a variable facing a constructor: `C(t_i, ...)`
    /// with one fresh variable per argument position.
    fn expand_variable(&mut self, var: TypeVarId, con: &ConName) -> Result<Type, SolveError> {
        let arity = self.variance_row(con)?.len();
        let args: Vec<Type> = (0..arity).map(|_| self.fresh_type()).collect();
        let expansion = Type::Con(con.clone(), args);
        self.push_step(SolveAction::ExpandVariable, format!("{var} := {expansion}"));
        Ok(expansion)
    }

    // -----------------------------------------------------------------------
    // Stage 4: cycle elimination
    // -----------------------------------------------------------------------

    /// Collapse every strongly connected component to one representative.
    ///
    /// A directed cycle in the subtype graph forces mutual subtyping, hence
    /// equality; each component's atoms are unified simultaneously. Returns
    /// the condensed graph (a DAG over representatives) and the composed
    /// per-component unifiers.
    fn eliminate_cycles(
        &mut self,
        graph: &ConstraintGraph,
    ) -> Result<(ConstraintGraph, Substitution), SolveError> {
        let mut theta = Substitution::new();
        let mut representatives: BTreeMap<Atom, Atom> = BTreeMap::new();

        for mut component in graph.sccs() {
            component.sort();
            assert!(
                !component.is_empty(),
                "strongly connected components are never empty"
            );
            let members = component
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let types: Vec<Type> = component.iter().map(Atom::to_type).collect();
            let binding = unify::equate(&types).ok_or_else(|| {
                SolveError::no_unify(format!(
                    "subtype cycle {{{members}}} forces equality between incompatible atoms"
                ))
            })?;
            let representative = binding
                .apply(&types[0])
                .as_atom()
                .expect("equating atoms yields an atom");
            if component.len() > 1 {
                self.push_step(
                    SolveAction::CollapseCycle,
                    format!("{{{members}}} -> {representative}"),
                );
            }
            for atom in &component {
                representatives.insert(atom.clone(), representative.clone());
            }
            theta = binding.compose(&theta);
        }

        let dag = graph.map_atoms(|atom| {
            representatives
                .get(atom)
                .cloned()
                .unwrap_or_else(|| atom.clone())
        });
        debug_assert!(!dag.has_cycle(), "condensation leaves an acyclic graph");

        // Collapsing can surface an edge between two base representatives;
        // bound resolution only inspects variables, so check such edges now.
        for (src, dst) in dag.edge_pairs() {
            if let (Atom::Base(b1), Atom::Base(b2)) = (&src, &dst) {
                if !self.table.is_subtype(b1, b2) {
                    return Err(SolveError::no_unify(format!(
                        "collapsed constraints require `{b1}` <: `{b2}`, which does not hold"
                    )));
                }
            }
        }
        Ok((dag, theta))
    }

    // -----------------------------------------------------------------------
    // Stage 5: bound resolution
    // -----------------------------------------------------------------------

    /// Assign base types to variables from their lower and upper bounds.
    ///
    /// Strictly one variable per pass: each assignment rewrites the remaining
    /// bound sets before the next candidate is chosen. Assigning several
    /// candidates against the same snapshot can pick bounds that contradict
    /// each other once the substitution propagates through shared edges.
    ///
    /// When a variable has bounds on both sides, the lower end of the valid
    /// interval is kept.
    fn resolve_bounds(
        &mut self,
        dag: &ConstraintGraph,
    ) -> Result<(ConstraintGraph, AtomSubstitution), SolveError> {
        let mut succs: BTreeMap<TypeVarId, BTreeSet<Atom>> = BTreeMap::new();
        let mut preds: BTreeMap<TypeVarId, BTreeSet<Atom>> = BTreeMap::new();
        for atom in dag.atoms() {
            if let Atom::Var(var) = atom {
                succs.insert(*var, dag.successors(atom));
                preds.insert(*var, dag.predecessors(atom));
            }
        }

        let mut assigned = AtomSubstitution::new();
        loop {
            let candidate = succs.keys().copied().find(|var| {
                succs[var].iter().any(Atom::is_base) || preds[var].iter().any(Atom::is_base)
            });
            let Some(var) = candidate else {
                break;
            };
            let upper: BTreeSet<BaseName> = succs[&var]
                .iter()
                .filter_map(|atom| atom.as_base().cloned())
                .collect();
            let lower: BTreeSet<BaseName> = preds[&var]
                .iter()
                .filter_map(|atom| atom.as_base().cloned())
                .collect();
            let base = self.pick_bound(var, &lower, &upper)?;
            self.push_step(SolveAction::AssignBound, format!("{var} := {base}"));

            succs.remove(&var);
            preds.remove(&var);
            assigned.bind(var, Atom::Base(base));
            // Propagate the assignment into every remaining bound set.
            for bounds in succs.values_mut().chain(preds.values_mut()) {
                *bounds = bounds.iter().map(|atom| assigned.apply_atom(atom)).collect();
            }
        }

        // What remains never met a base bound; rebuild it as a graph for the
        // final merge of variable-only components.
        let mut residual = ConstraintGraph::new();
        for (var, bounds) in &succs {
            let atom = Atom::Var(*var);
            residual.add_atom(&atom);
            for successor in bounds {
                debug_assert!(
                    successor.is_var(),
                    "base bound survived resolution for {successor}"
                );
                residual.add_edge(&atom, successor);
            }
        }
        Ok((residual, assigned))
    }

    fn pick_bound(
        &self,
        var: TypeVarId,
        lower: &BTreeSet<BaseName>,
        upper: &BTreeSet<BaseName>,
    ) -> Result<BaseName, SolveError> {
        match (lower.is_empty(), upper.is_empty()) {
            (true, false) => self.table.inf(upper).ok_or_else(|| {
                SolveError::no_unify(format!(
                    "the upper bounds of {var} have no greatest lower bound"
                ))
            }),
            (false, true) => self.table.sup(lower).ok_or_else(|| {
                SolveError::no_unify(format!(
                    "the lower bounds of {var} have no least upper bound"
                ))
            }),
            (false, false) => {
                let ub = self.table.inf(upper).ok_or_else(|| {
                    SolveError::no_unify(format!(
                        "the upper bounds of {var} have no greatest lower bound"
                    ))
                })?;
                let lb = self.table.sup(lower).ok_or_else(|| {
                    SolveError::no_unify(format!(
                        "the lower bounds of {var} have no least upper bound"
                    ))
                })?;
                if !self.table.is_subtype(&lb, &ub) {
                    return Err(SolveError::no_unify(format!(
                        "the bounds of {var} are incompatible: `{lb}` is not a subtype of `{ub}`"
                    )));
                }
                // Both ends of the interval satisfy the constraints; keep
                // the lower one.
                Ok(lb)
            }
            (true, true) => unreachable!("candidate selection guarantees a base bound"),
        }
    }

    // -----------------------------------------------------------------------
    // Stage 6: residual merge
    // -----------------------------------------------------------------------

    /// Unify each weakly connected variable-only component.
    ///
    /// Preserving these chains would mean inferring qualified types carrying
    /// subtype predicates; collapsing them is sound and yields plain
    /// Hindley-Milner schemes.
    fn merge_residual(&mut self, residual: &ConstraintGraph) -> AtomSubstitution {
        let mut merged = AtomSubstitution::new();
        for component in residual.weak_components() {
            if component.len() > 1 {
                let members = component
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                self.push_step(
                    SolveAction::MergeResidual,
                    format!("{{{members}}} -> {}", component[0]),
                );
            }
            let mut members = component.into_iter();
            let Some(representative) = members.next() else {
                continue;
            };
            for atom in members {
                let var = atom
                    .as_var()
                    .expect("residual components contain only variables");
                merged.bind(var, representative.clone());
            }
        }
        merged
    }
}

/// Apply a fresh binding to every pending constraint.
///
/// Atomic pairs are routed back through the worklist: a pair stops being
/// atomic when its variable gains structure, so survivors must be
/// re-examined rather than kept aside.
fn rewrite_pending(
    binding: &Substitution,
    work: &mut VecDeque<Constraint>,
    atomic: &mut Vec<(Atom, Atom)>,
) {
    for constraint in work.iter_mut() {
        *constraint = binding.apply_constraint(constraint);
    }
    for (src, dst) in atomic.drain(..) {
        work.push_back(Constraint::Subtype(
            binding.apply(&src.to_type()),
            binding.apply(&dst.to_type()),
        ));
    }
}


#[cfg(test)]
mod prop_tests;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TypeTable {
        let mut table = TypeTable::new();
        table.register_subtype("Nat", "Int");
        table.register_base("Bool");
        table.register_constructor("List", vec![Variance::Covariant]);
        table
    }

    #[test]
    fn empty_constraints_solve_to_identity() {
        let table = table();
        let solution = solve_constraints(&[], &table).expect("solves");
        assert!(solution.is_empty());
    }

    #[test]
    fn weak_unifier_failure_reports_its_own_category() {
        let table = table();
        let cs = vec![Constraint::Subtype(
            Type::con("List", vec![Type::var(0)]),
            Type::base("Int"),
        )];
        let err = solve_constraints(&cs, &table).expect_err("fails");
        assert_eq!(err.category, Category::NoWeakUnifier);
    }

    #[test]
    fn fresh_variables_avoid_the_input() {
        let table = table();
        // t7 <: List(Nat) forces an expansion; the fresh argument variable
        // must not collide with t7 or anything below it.
        let cs = vec![Constraint::Subtype(
            Type::var(7),
            Type::con("List", vec![Type::base("Nat")]),
        )];
        let solution = solve_constraints(&cs, &table).expect("solves");
        let resolved = solution.apply(&Type::var(7));
        assert_eq!(resolved, Type::con("List", vec![Type::base("Nat")]));
    }

    #[test]
    fn tracing_records_steps_only_when_enabled() {
        let table = table();
        let cs = vec![Constraint::Equal(Type::var(0), Type::base("Int"))];

        let mut silent = Solver::new(&table);
        silent.solve(&cs).expect("solves");
        assert!(silent.trace().is_empty());

        let mut traced = Solver::new(&table);
        traced.enable_tracing();
        assert!(traced.is_tracing());
        traced.solve(&cs).expect("solves");
        assert!(!traced.trace().is_empty());
    }

    #[test]
    fn exhausting_the_step_budget_is_a_recoverable_error() {
        let table = table();
        // Expansion plus decomposition plus the atomic pair takes three
        // steps; a budget of two must fail as data, not panic.
        let cs = vec![Constraint::Subtype(
            Type::var(0),
            Type::con("List", vec![Type::base("Nat")]),
        )];
        let mut solver = Solver::with_options(
            &table,
            SolveOptions {
                max_simplify_steps: 2,
            },
        );
        let err = solver.solve(&cs).expect_err("budget exhausted");
        assert_eq!(err.category, Category::NoUnify);
        assert!(err.message.contains("step budget"));
        assert!(err.help.is_some());
    }

    #[test]
    fn solver_reuse_reseeds_the_counter() {
        let table = table();
        let mut solver = Solver::new(&table);
        let first = vec![Constraint::Subtype(
            Type::var(0),
            Type::con("List", vec![Type::base("Nat")]),
        )];
        solver.solve(&first).expect("solves");

        let second = vec![Constraint::Equal(Type::var(3), Type::base("Bool"))];
        let solution = solver.solve(&second).expect("solves");
        assert_eq!(solution.apply(&Type::var(3)), Type::base("Bool"));
    }
}
