use enumset::EnumSet;
use fnv::FnvHashSet;
use itertools::Itertools;
use log::debug;
use log::info;

use crate::basic_types::moving_averages::CumulativeMovingAverage;
use crate::basic_types::moving_averages::MovingAverage;
use crate::basic_types::ClauseReference;
use crate::basic_types::ConstraintOperationError;
use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::basic_types::SmtExecutionFlag;
use crate::basic_types::Solution;
use crate::containers::KeyedVec;
use crate::engine::sat::clausal_propagator::arrange_for_watches;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::sat::ClausalPropagator;
use crate::engine::sat::ClauseAllocator;
use crate::engine::sat::ClauseDatabaseOptions;
use crate::engine::sat::ClauseKind;
use crate::engine::sat::GlucoseRestartStrategy;
use crate::engine::sat::LearnedClauseManager;
use crate::engine::sat::LearnedClauseMinimiser;
use crate::engine::sat::PropositionalValueSelector;
use crate::engine::sat::PropositionalVariableSelector;
use crate::engine::sat::RestartOptions;
use crate::quince_assert_advanced;
use crate::quince_assert_extreme;
use crate::quince_assert_moderate;
use crate::quince_assert_simple;
use crate::termination::TerminationCondition;
use crate::theory::Atom;
use crate::theory::AtomLiteral;
use crate::theory::AtomPool;
use crate::theory::BackendId;
use crate::theory::BooleanAbstraction;
use crate::theory::FormulaProperty;
use crate::theory::Origin;
use crate::theory::Strategy;
use crate::theory::TheoryBackend;
use crate::theory::TheoryDispatcher;
use crate::theory::TheoryModel;
use crate::theory::TheoryVerdict;

/// The DPLL(T) search core: a CDCL propositional engine over the lazy
/// Boolean abstraction of theory atoms, consulting the configured theory
/// backends through the [`TheoryDispatcher`] whenever the set of entailed
/// atoms changed since the previous check.
///
/// The solver owns the clause storage exclusively; the watch lists and the
/// trail are mutated only by the propagator and the assignment structure
/// respectively, and backend answers are copied across the module boundary.
#[derive(Debug)]
pub struct SmtSolver {
    state: SmtSolverState,
    assignments: AssignmentsPropositional,
    clause_allocator: ClauseAllocator,
    clausal_propagator: ClausalPropagator,
    learned_clause_manager: LearnedClauseManager,
    learned_clause_minimiser: LearnedClauseMinimiser,
    restart_strategy: GlucoseRestartStrategy,
    variable_selector: PropositionalVariableSelector,
    value_selector: PropositionalValueSelector,
    atom_pool: AtomPool,
    boolean_abstraction: BooleanAbstraction,
    theory_dispatcher: TheoryDispatcher,
    /// Signatures of lemma clauses absorbed so far; a backend handing the
    /// same lemma twice is a no-op.
    learned_lemma_signatures: FnvHashSet<Vec<Literal>>,
    /// The number of branches abandoned with an inconclusive theory verdict.
    /// While positive, a root-level conflict proves Unknown, not
    /// Unsatisfiable.
    num_unknown_branch_exclusions: u64,
    seen: KeyedVec<PropositionalVariable, bool>,
    analysis_result: ConflictAnalysisResult,
    counters: Counters,
    internal_parameters: SmtSolverOptions,
    /// The verdict of the most recent theory check, i.e. whether the current
    /// branch is still believed consistent.
    last_theory_verdict: TheoryVerdict,
    solution: Option<Solution>,
}

#[derive(Debug, Clone, Copy)]
pub struct SmtSolverOptions {
    pub restart_options: RestartOptions,
    pub clause_database_options: ClauseDatabaseOptions,
    pub learning_clause_minimisation: bool,
    /// Whether the search keeps exploring after a backend answered Unknown
    /// for some branch. When set, the branch is excluded through a learned
    /// clause over its passed atoms; a subsequent Unsatisfiable answer
    /// degrades to Unknown.
    pub continue_after_unknown: bool,
    pub random_seed: u64,
    /// Probability that a decision uses a random polarity instead of the
    /// saved phase.
    pub random_polarity_probability: f64,
    /// The fraction of wasted clause storage above which a relocation pass
    /// runs.
    pub garbage_collection_wasted_ratio: f64,
}

impl Default for SmtSolverOptions {
    fn default() -> Self {
        SmtSolverOptions {
            restart_options: RestartOptions::default(),
            clause_database_options: ClauseDatabaseOptions::default(),
            learning_clause_minimisation: true,
            continue_after_unknown: false,
            random_seed: 42,
            random_polarity_probability: 0.0,
            garbage_collection_wasted_ratio: 0.2,
        }
    }
}

/// The outcome of synchronising the passed formula with the theory side.
enum TheorySyncOutcome {
    /// Nothing stands in the way of taking the next decision. The state may
    /// have been declared conflicting in which case conflict resolution runs
    /// first.
    Proceed,
    /// New clauses were stored, unit literals enqueued, or a terminal state
    /// was declared; the loop has to come back around before deciding.
    PropagationRequired,
}

// methods that offer basic functionality
impl SmtSolver {
    pub fn new(options: SmtSolverOptions) -> SmtSolver {
        SmtSolver::with_strategy(Strategy::new(), options)
    }

    pub fn with_strategy(strategy: Strategy, options: SmtSolverOptions) -> SmtSolver {
        let mut solver = SmtSolver {
            state: SmtSolverState::default(),
            assignments: AssignmentsPropositional::default(),
            clause_allocator: ClauseAllocator::default(),
            clausal_propagator: ClausalPropagator::default(),
            learned_clause_manager: LearnedClauseManager::new(options.clause_database_options),
            learned_clause_minimiser: LearnedClauseMinimiser::default(),
            restart_strategy: GlucoseRestartStrategy::new(&options.restart_options),
            variable_selector: PropositionalVariableSelector::new(),
            value_selector: PropositionalValueSelector::new(
                options.random_seed,
                options.random_polarity_probability,
            ),
            atom_pool: AtomPool::default(),
            boolean_abstraction: BooleanAbstraction::default(),
            theory_dispatcher: TheoryDispatcher::new(strategy),
            learned_lemma_signatures: FnvHashSet::default(),
            num_unknown_branch_exclusions: 0,
            seen: KeyedVec::default(),
            analysis_result: ConflictAnalysisResult::default(),
            counters: Counters::default(),
            internal_parameters: options,
            last_theory_verdict: TheoryVerdict::Consistent,
            solution: None,
        };

        // A dummy variable set to true at the root; useful whenever a fact
        // that always holds needs a literal.
        let root_variable = solver.create_new_propositional_variable();
        let true_literal = Literal::new(root_variable, true);

        solver.assignments.true_literal = true_literal;
        solver.assignments.false_literal = !true_literal;
        solver.assignments.enqueue_decision_literal(true_literal);

        solver
    }

    /// Registers a theory backend; the returned id is what the strategy tree
    /// refers to.
    pub fn register_theory_backend(&mut self, backend: Box<dyn TheoryBackend>) -> BackendId {
        self.theory_dispatcher.register_backend(backend)
    }

    pub fn theory_backend(&self, backend_id: BackendId) -> &dyn TheoryBackend {
        self.theory_dispatcher.backend(backend_id)
    }

    pub fn theory_backend_mut(&mut self, backend_id: BackendId) -> &mut dyn TheoryBackend {
        self.theory_dispatcher.backend_mut(backend_id)
    }

    pub fn create_new_propositional_variable(&mut self) -> PropositionalVariable {
        let variable = PropositionalVariable::new(self.assignments.num_propositional_variables());

        self.assignments.grow();
        self.clausal_propagator.grow();
        self.variable_selector.grow();
        self.value_selector.grow();
        self.boolean_abstraction.grow();

        variable
    }

    /// A fresh, purely Boolean literal.
    pub fn new_literal(&mut self) -> Literal {
        Literal::new(self.create_new_propositional_variable(), true)
    }

    pub fn intern_atom(
        &mut self,
        canonical_form: &str,
        properties: EnumSet<FormulaProperty>,
    ) -> Atom {
        self.atom_pool.intern_atom(canonical_form, properties)
    }

    pub fn intern_origin(&mut self, name: &str) -> Origin {
        self.atom_pool.intern_origin(name)
    }

    /// The literal abstracting the given atom, created lazily on first use.
    /// The polarity is only consulted at creation time: it decides which
    /// assignment of the fresh variable entails the atom. An atom bound at
    /// negative polarity is passed to the theory when its variable is
    /// assigned false.
    pub fn abstraction_literal(&mut self, atom: Atom, origin: Origin, polarity: bool) -> Literal {
        if let Some(literal) = self.boolean_abstraction.literal_of_atom(atom) {
            return literal;
        }

        let variable = self.create_new_propositional_variable();
        let literal = Literal::new(variable, polarity);
        self.boolean_abstraction
            .bind_atom(literal, atom, Some(origin));
        literal
    }

    pub fn get_abstraction_literal(&self, atom: Atom) -> Option<Literal> {
        self.boolean_abstraction.literal_of_atom(atom)
    }

    pub fn atom_pool(&self) -> &AtomPool {
        &self.atom_pool
    }

    pub fn state(&self) -> &SmtSolverState {
        &self.state
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// The satisfying assignment of the last [`SmtSolver::solve`] call that
    /// returned [`SmtExecutionFlag::Satisfiable`].
    pub fn solution(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }

    pub fn get_propositional_assignments(&self) -> &AssignmentsPropositional {
        &self.assignments
    }

    pub fn log_statistics(&self) {
        self.counters.log_statistics();
    }

    /// Writes every stored clause as one line of signed variable indices
    /// terminated by `0`, similar to the DIMACS format. A tracing aid, not a
    /// stable interface.
    pub fn debug_write_clauses<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for clause_reference in self.clause_allocator.clause_references() {
            let line = self.clause_allocator[clause_reference]
                .get_literal_slice()
                .iter()
                .map(|literal| literal.to_signed_code())
                .join(" ");
            writeln!(writer, "{line} 0")?;
        }
        Ok(())
    }
}

// methods for adding constraints
impl SmtSolver {
    /// Adds a clause of the input formula. Returns the reference of the
    /// stored clause so that the caller can later retract it; absorbed
    /// clauses (satisfied at the root, tautologies, units) yield `None`.
    pub fn add_permanent_clause(
        &mut self,
        literals: Vec<Literal>,
    ) -> Result<Option<ClauseReference>, ConstraintOperationError> {
        quince_assert_simple!(self.assignments.is_at_the_root_level());

        if self.state.is_infeasible() {
            return Err(ConstraintOperationError::InfeasibleState);
        }

        let result = self.clausal_propagator.add_permanent_clause(
            literals,
            &mut self.assignments,
            &mut self.clause_allocator,
        );

        match result {
            Ok(clause_reference) => {
                self.propagate_enqueued();
                if self.state.conflicting() {
                    self.state.declare_infeasible_from_conflict();
                    return Err(ConstraintOperationError::InfeasibleClause);
                }
                Ok(clause_reference)
            }
            Err(error) => {
                self.state.declare_infeasible();
                Err(error)
            }
        }
    }

    pub fn add_unit_clause(&mut self, unit_clause: Literal) -> Result<(), ConstraintOperationError> {
        self.add_permanent_clause(vec![unit_clause]).map(|_| ())
    }

    /// Retracts a clause of the input formula. Retracting a clause that was
    /// already removed is a no-op.
    pub fn remove_permanent_clause(&mut self, clause_reference: ClauseReference) {
        quince_assert_simple!(self.assignments.is_at_the_root_level());

        if self.clause_allocator.is_clause_deleted(clause_reference) {
            return;
        }

        quince_assert_moderate!(
            self.clause_allocator[clause_reference].kind() == ClauseKind::Original
        );

        self.clausal_propagator.remove_clause_from_consideration(
            self.clause_allocator[clause_reference].get_literal_slice(),
            clause_reference,
        );
        self.clause_allocator.delete_clause(clause_reference);
    }
}

// the search loop
impl SmtSolver {
    pub fn solve(&mut self, termination: &mut impl TerminationCondition) -> SmtExecutionFlag {
        if self.state.is_infeasible() {
            return SmtExecutionFlag::Unsatisfiable;
        }

        self.initialise();
        let flag = self.solve_internal(termination);

        debug!("Search finished: {flag:?}");
        flag
    }

    fn initialise(&mut self) {
        if self.assignments.get_decision_level() > 0 {
            self.backtrack(0);
        }
        self.solution = None;
        self.state.declare_solving();
        self.last_theory_verdict = TheoryVerdict::Consistent;

        self.seen.resize(
            self.assignments.num_propositional_variables() as usize,
            false,
        );

        self.theory_dispatcher
            .initialise(self.atom_pool.formula_properties());
        for atom in self.boolean_abstraction.drain_atoms_to_inform() {
            let consistent = self
                .theory_dispatcher
                .inform(atom, self.atom_pool.atom_data(atom));
            if !consistent {
                // The atom can never hold, so its owning literal is pinned
                // to false at the root.
                let literal = self
                    .boolean_abstraction
                    .literal_of_atom(atom)
                    .expect("Informed atoms are abstracted.");
                if self.assignments.is_literal_unassigned(literal) {
                    self.assignments.enqueue_decision_literal(!literal);
                } else if self.assignments.is_literal_assigned_true(literal) {
                    self.declare_root_infeasibility();
                }
            }
        }
    }

    fn solve_internal(&mut self, termination: &mut impl TerminationCondition) -> SmtExecutionFlag {
        loop {
            if self.state.is_infeasible() {
                return SmtExecutionFlag::Unsatisfiable;
            }
            if self.state.is_unknown() {
                return SmtExecutionFlag::Unknown;
            }

            if termination.should_stop() {
                self.state.declare_timeout();
                return SmtExecutionFlag::Timeout;
            }

            if self.state.no_conflict() {
                self.learned_clause_manager
                    .shrink_learned_clause_database_if_needed(
                        &self.assignments,
                        &mut self.clause_allocator,
                        &mut self.clausal_propagator,
                    );
                self.garbage_collect_if_needed();

                self.propagate_enqueued();
            }

            if self.state.no_conflict() {
                match self.synchronise_with_theory() {
                    TheorySyncOutcome::Proceed => {}
                    TheorySyncOutcome::PropagationRequired => continue,
                }
            }

            if self.state.conflicting() {
                if self.assignments.is_at_the_root_level() {
                    if self.num_unknown_branch_exclusions > 0 {
                        // Some branch was given up on, so unsatisfiability
                        // cannot be claimed.
                        self.state.declare_unknown_from_conflict();
                        return SmtExecutionFlag::Unknown;
                    }
                    self.state.declare_infeasible_from_conflict();
                    return SmtExecutionFlag::Unsatisfiable;
                }

                self.resolve_conflict();

                self.learned_clause_manager.decay_clause_activities();
                self.variable_selector.decay_activities();
                // Conflict resolution changed the assignment, so the branch
                // is treated as consistent until the theory says otherwise.
                self.last_theory_verdict = TheoryVerdict::Consistent;
                continue;
            }

            if self.restart_strategy.should_restart() {
                self.restart_during_search();
                continue;
            }

            self.declare_new_decision_level();
            if !self.enqueue_next_decision() {
                // Every decision variable is assigned and the theory
                // accepted the final atom set when it was consulted last.
                return match self.last_theory_verdict {
                    TheoryVerdict::Consistent => {
                        let mut theory_model = TheoryModel::default();
                        self.theory_dispatcher.update_model(&mut theory_model);
                        self.solution = Some(Solution::new(&self.assignments, theory_model));
                        self.state.declare_solution_found();
                        SmtExecutionFlag::Satisfiable
                    }
                    TheoryVerdict::Unknown => {
                        self.state.declare_unknown();
                        SmtExecutionFlag::Unknown
                    }
                    TheoryVerdict::Inconsistent => {
                        unreachable!("An inconsistent verdict is handled as a conflict.")
                    }
                };
            }
        }
    }

    fn declare_new_decision_level(&mut self) {
        self.assignments.increase_decision_level();
    }

    /// Picks the next branching literal by activity and saved polarity.
    /// Returns false when every decision variable is assigned.
    fn enqueue_next_decision(&mut self) -> bool {
        if let Some(variable) = self.variable_selector.peek_next_variable(&self.assignments) {
            self.counters.num_decisions += 1;
            let truth_value = self.value_selector.select_value(variable);
            self.assignments
                .enqueue_decision_literal(Literal::new(variable, truth_value));
            true
        } else {
            false
        }
    }

    fn propagate_enqueued(&mut self) {
        quince_assert_simple!(self.state.no_conflict());

        let num_trail_entries_before = self.assignments.num_trail_entries();

        let propagation_status = self
            .clausal_propagator
            .propagate(&mut self.assignments, &mut self.clause_allocator);

        if let Err(conflict_reference) = propagation_status {
            self.state.declare_conflict(conflict_reference);
        }

        self.counters.num_propagations +=
            (self.assignments.num_trail_entries() - num_trail_entries_before) as u64;

        // Only check fixed point propagation if there was no conflict.
        quince_assert_extreme!(
            self.state.conflicting()
                || self
                    .clausal_propagator
                    .debug_check_state(&self.assignments, &self.clause_allocator)
        );
    }

    fn backtrack(&mut self, backtrack_level: usize) {
        quince_assert_simple!(backtrack_level < self.assignments.get_decision_level());

        let SmtSolver {
            assignments,
            variable_selector,
            value_selector,
            boolean_abstraction,
            ..
        } = self;

        assignments.synchronise(backtrack_level).for_each(|literal| {
            let variable = literal.get_propositional_variable();
            variable_selector.restore(variable);
            // Phase saving: remember the polarity the variable held.
            value_selector.update(variable, literal.is_positive());
            boolean_abstraction.notify_unassigned(literal);
        });

        // The trail's theory watermark clamps itself during the
        // synchronisation above; only the propagation queue head needs
        // resetting.
        self.clausal_propagator
            .synchronise(self.assignments.num_trail_entries());
    }

    /// A restart backtracks to the root and adjusts the restart schedule;
    /// learned clauses and activities survive.
    fn restart_during_search(&mut self) {
        if self.assignments.is_at_the_root_level() {
            return;
        }

        self.counters.num_restarts += 1;
        self.backtrack(0);
        self.restart_strategy.notify_restart();
    }

    fn garbage_collect_if_needed(&mut self) {
        if self.clause_allocator.wasted_ratio()
            > self.internal_parameters.garbage_collection_wasted_ratio
        {
            self.garbage_collect();
        }
    }

    /// Relocates the clause storage and rewrites every held reference (the
    /// watch lists, the trail reasons and the learned clause registries) in
    /// one bulk operation. No holder is patched piecemeal anywhere else.
    pub fn garbage_collect(&mut self) {
        quince_assert_simple!(self.state.no_conflict());

        let relocation_map = self.clause_allocator.relocate();

        self.clausal_propagator
            .remap_clause_references(&relocation_map);
        self.assignments.remap_clause_references(&relocation_map);
        self.learned_clause_manager
            .remap_clause_references(&relocation_map);

        self.counters.num_garbage_collections += 1;
        debug!(
            "Relocated the clause storage; {} live clauses remain.",
            self.clause_allocator.num_live_clauses()
        );
    }
}

// the theory integration
impl SmtSolver {
    /// Synchronises the passed formula with the Boolean assignment and, if
    /// it changed, consults the backends. Consulting the theory only on a
    /// changed atom set is a correctness requirement as much as an
    /// optimisation: the verdict of the previous check still covers an
    /// unchanged set, while a changed set must not be skipped.
    fn synchronise_with_theory(&mut self) -> TheorySyncOutcome {
        self.boolean_abstraction
            .synchronise_with_trail(&mut self.assignments);
        let changed = self
            .boolean_abstraction
            .apply_pending_updates(&mut self.theory_dispatcher);

        if !changed {
            return TheorySyncOutcome::Proceed;
        }

        self.counters.num_theory_checks += 1;
        let full = self.is_boolean_assignment_complete();
        let verdict = self.theory_dispatcher.check(full);
        self.last_theory_verdict = verdict;

        match verdict {
            TheoryVerdict::Consistent => {
                if self.process_lemmas() {
                    TheorySyncOutcome::PropagationRequired
                } else {
                    TheorySyncOutcome::Proceed
                }
            }
            TheoryVerdict::Inconsistent => {
                self.counters.num_theory_conflicts += 1;
                if self.learn_theory_conflict() {
                    // The conflict clause is installed; resolution runs
                    // next.
                    TheorySyncOutcome::Proceed
                } else {
                    // A singleton subset was deposited as a root unit (or
                    // infeasibility was established); the loop has to come
                    // back around before deciding.
                    if self.state.no_conflict() && !self.state.is_infeasible() {
                        let _ = self.process_lemmas();
                    }
                    TheorySyncOutcome::PropagationRequired
                }
            }
            TheoryVerdict::Unknown => {
                if !self.internal_parameters.continue_after_unknown {
                    self.state.declare_unknown();
                    TheorySyncOutcome::PropagationRequired
                } else if self.learn_unknown_exclusion() {
                    TheorySyncOutcome::PropagationRequired
                } else {
                    // The exclusion was already known (or inexpressible);
                    // keep searching with a degraded verdict.
                    TheorySyncOutcome::Proceed
                }
            }
        }
    }

    /// Reached root infeasibility during search. While some branch has been
    /// excluded with an inconclusive verdict, unsatisfiability cannot be
    /// claimed and the outcome degrades to Unknown.
    fn declare_root_infeasibility(&mut self) {
        if self.num_unknown_branch_exclusions > 0 {
            self.state.declare_unknown();
        } else {
            self.state.declare_infeasible();
        }
    }

    fn is_boolean_assignment_complete(&self) -> bool {
        self.assignments
            .get_propositional_variables()
            .all(|variable| self.assignments.is_variable_assigned(variable))
    }

    /// Turns the infeasible subsets reported by the backends into clauses
    /// and keeps only the one forcing the furthest backtrack as the conflict
    /// driver; the rest are discarded. Returns true if a conflict clause was
    /// installed. A singleton subset becomes a unit clause deposited at the
    /// root instead.
    fn learn_theory_conflict(&mut self) -> bool {
        let infeasible_subsets = self.theory_dispatcher.collect_infeasible_subsets();
        quince_assert_simple!(
            !infeasible_subsets.is_empty(),
            "An inconsistent verdict must be justified by an infeasible subset."
        );

        // The best subset is the one whose clause asserts at the lowest
        // level.
        let mut best: Option<(usize, Vec<Literal>)> = None;
        for subset in infeasible_subsets {
            quince_assert_simple!(!subset.is_empty());

            let literals: Vec<Literal> = subset
                .iter()
                .map(|&atom| {
                    !self
                        .boolean_abstraction
                        .literal_of_atom(atom)
                        .expect("Infeasible subsets contain only abstracted atoms.")
                })
                .collect();
            let clause_level = literals
                .iter()
                .map(|&literal| self.assignments.get_literal_assignment_level(literal))
                .max()
                .unwrap();

            if best
                .as_ref()
                .map_or(true, |(best_level, _)| clause_level < *best_level)
            {
                best = Some((clause_level, literals));
            }
        }

        let (clause_level, mut literals) = best.unwrap();

        if literals.len() == 1 {
            // Deposited at level 0 for immediate propagation.
            self.counters.num_unit_clauses_learned += 1;
            if !self.assignments.is_at_the_root_level() {
                self.backtrack(0);
            }
            if self.assignments.is_literal_unassigned(literals[0]) {
                self.assignments.enqueue_decision_literal(literals[0]);
            } else if self.assignments.is_literal_assigned_false(literals[0]) {
                self.declare_root_infeasibility();
            }
            return false;
        }

        // Backtrack until the clause is genuinely conflicting at the current
        // level, then install it as the conflict driver.
        if clause_level < self.assignments.get_decision_level() {
            self.backtrack(clause_level);
        }

        arrange_for_watches(&mut literals, &self.assignments);
        let clause_reference = self.clausal_propagator.attach_arranged_clause(
            literals,
            ClauseKind::TheoryConflict,
            &mut self.clause_allocator,
        );
        self.learned_clause_manager.register_learned_clause(
            clause_reference,
            &self.assignments,
            &mut self.clause_allocator,
        );

        self.state.declare_conflict(clause_reference);
        true
    }

    /// Stores the lemmas reported by the backends as clauses. Returns true
    /// if anything new was learned (including a conflict to resolve).
    fn process_lemmas(&mut self) -> bool {
        let lemmas = self.theory_dispatcher.take_lemmas();
        let mut learned_anything = false;

        for lemma in lemmas {
            quince_assert_simple!(!lemma.literals().is_empty());

            let literals: Vec<Literal> = lemma
                .literals()
                .iter()
                .map(|&atom_literal| self.literal_for_atom_literal(atom_literal))
                .collect();

            let mut signature = literals.clone();
            signature.sort_unstable_by_key(|literal| literal.to_u32());
            if !self.learned_lemma_signatures.insert(signature) {
                continue;
            }

            self.counters.num_theory_lemmas += 1;
            learned_anything = true;

            if let Some(conflict_reference) =
                self.add_theory_clause(literals, ClauseKind::TheoryLemma)
            {
                // A lemma may falsify the current assignment outright. The
                // remaining lemmas are dropped; they are theory-valid, so
                // losing them costs completeness of propagation, not
                // soundness.
                self.state.declare_conflict(conflict_reference);
                break;
            }
            if self.state.is_infeasible() {
                break;
            }
        }

        learned_anything
    }

    /// The propositional literal of an atom literal, interning a fresh
    /// abstraction for atoms the Boolean layer has not seen yet. Lemma atoms
    /// carry no user-level origin.
    fn literal_for_atom_literal(&mut self, atom_literal: AtomLiteral) -> Literal {
        let literal = match self.boolean_abstraction.literal_of_atom(atom_literal.atom) {
            Some(literal) => literal,
            None => {
                let variable = self.create_new_propositional_variable();
                self.seen.resize(
                    self.assignments.num_propositional_variables() as usize,
                    false,
                );
                let literal = Literal::new(variable, true);
                self.boolean_abstraction
                    .bind_atom(literal, atom_literal.atom, None);
                // The backends learn about the fresh atom right away; the
                // advisory result is superseded by the next check. Draining
                // here keeps the atom from being informed again on the next
                // solve call.
                for informed_atom in self.boolean_abstraction.drain_atoms_to_inform() {
                    let _ = self
                        .theory_dispatcher
                        .inform(informed_atom, self.atom_pool.atom_data(informed_atom));
                }
                literal
            }
        };

        if atom_literal.is_positive {
            literal
        } else {
            !literal
        }
    }

    /// Excludes the current passed formula by learning the disjunction of
    /// the negated passed-atom literals. Used when a backend answered
    /// Unknown and the search is configured to explore other branches.
    fn learn_unknown_exclusion(&mut self) -> bool {
        let passed_literals = self.boolean_abstraction.passed_literals();
        if passed_literals.len() <= 1 {
            return false;
        }

        let literals: Vec<Literal> = passed_literals.iter().map(|&literal| !literal).collect();

        let mut signature = literals.clone();
        signature.sort_unstable_by_key(|literal| literal.to_u32());
        if !self.learned_lemma_signatures.insert(signature) {
            return false;
        }

        self.num_unknown_branch_exclusions += 1;
        if let Some(conflict_reference) = self.add_theory_clause(literals, ClauseKind::TheoryLemma)
        {
            self.state.declare_conflict(conflict_reference);
        }
        true
    }

    /// Stores a theory-provided clause which, unlike a learned clause from
    /// conflict analysis, may be satisfied, unit or conflicting under the
    /// current assignment. If the clause is unit somewhere below the current
    /// level, the solver backtracks so that the propagation is not missed.
    /// Returns the clause when it is conflicting even then.
    fn add_theory_clause(
        &mut self,
        literals: Vec<Literal>,
        kind: ClauseKind,
    ) -> Option<ClauseReference> {
        quince_assert_simple!(!literals.is_empty());

        // Duplicate literals are dropped; a clause containing a literal and
        // its negation is valid on its own and carries no information.
        let mut literals = literals;
        literals.sort_unstable_by_key(|literal| literal.to_u32());
        literals.dedup();
        for pair in literals.windows(2) {
            if pair[0].is_negation_of(pair[1]) {
                return None;
            }
        }

        if literals.len() == 1 {
            if !self.assignments.is_at_the_root_level() {
                self.backtrack(0);
            }
            if self.assignments.is_literal_unassigned(literals[0]) {
                self.assignments.enqueue_decision_literal(literals[0]);
            } else if self.assignments.is_literal_assigned_false(literals[0]) {
                self.declare_root_infeasibility();
            }
            return None;
        }

        arrange_for_watches(&mut literals, &self.assignments);

        // If the second watch is falsified below the current level, the
        // clause became unit earlier on the trail; backtrack to that point
        // so the propagation happens at the right level.
        if self.assignments.is_literal_assigned_false(literals[1]) {
            let second_watch_level = self.assignments.get_literal_assignment_level(literals[1]);
            if second_watch_level < self.assignments.get_decision_level() {
                self.backtrack(second_watch_level);
                arrange_for_watches(&mut literals, &self.assignments);
            }
        }

        let clause_reference = self.clausal_propagator.attach_arranged_clause(
            literals,
            kind,
            &mut self.clause_allocator,
        );
        self.learned_clause_manager.register_learned_clause(
            clause_reference,
            &self.assignments,
            &mut self.clause_allocator,
        );

        let first_watch = self.clause_allocator[clause_reference][0];
        let second_watch = self.clause_allocator[clause_reference][1];

        if self.assignments.is_literal_assigned_false(first_watch) {
            return Some(clause_reference);
        }

        if self.assignments.is_literal_unassigned(first_watch)
            && self.assignments.is_literal_assigned_false(second_watch)
        {
            let conflict = self
                .assignments
                .enqueue_propagated_literal(first_watch, clause_reference);
            quince_assert_simple!(conflict.is_none());
        }

        None
    }
}

// methods for conflict analysis
impl SmtSolver {
    /// Resolves the current conflict: computes the first-UIP learned clause,
    /// backtracks and stores the clause (or enqueues it at the root when it
    /// is unit).
    fn resolve_conflict(&mut self) {
        quince_assert_moderate!(self.state.conflicting());

        self.counters.num_conflicts += 1;
        self.compute_1uip();
        self.process_learned_clause();

        self.state.declare_solving();
    }

    /// Computes the first-UIP clause and stores it in `analysis_result`. The
    /// asserting literal ends up at index 0 and, for clauses with more than
    /// one literal, index 1 carries the second-highest decision level.
    fn compute_1uip(&mut self) {
        quince_assert_simple!(self.debug_conflict_analysis_preconditions());

        // Index 0 is reserved for the asserting literal, which is written
        // once the first unique implication point is identified.
        self.analysis_result
            .learned_literals
            .resize(1, self.assignments.true_literal);
        self.analysis_result.backjump_level = 0;

        let mut num_current_decision_level_literals_to_inspect: usize = 0;
        let mut next_trail_index = self.assignments.num_trail_entries() - 1;
        let mut next_literal: Option<Literal> = None;

        loop {
            quince_assert_moderate!(Self::debug_1uip_conflict_analysis_check_next_literal(
                next_literal,
                &self.assignments
            ));

            // 'next_literal' is None only in the first iteration, where the
            // conflicting clause itself is resolved.
            let clause_reference = if let Some(propagated_literal) = next_literal {
                let reason = self
                    .assignments
                    .get_literal_reason(propagated_literal)
                    .expect("A propagated literal carries its reason clause.");
                quince_assert_moderate!(
                    self.clause_allocator[reason][0] == propagated_literal,
                    "The propagated literal of a reason clause is at position 0."
                );
                reason
            } else {
                let conflict = self.state.get_conflict_clause();
                self.counters
                    .average_conflict_size
                    .add_term(self.clause_allocator[conflict].len() as u64);
                conflict
            };

            self.learned_clause_manager.update_clause_lbd_and_bump_activity(
                clause_reference,
                &self.assignments,
                &mut self.clause_allocator,
            );

            // Perform resolution: position 0 is skipped when the clause is
            // the reason of a propagation.
            let start_index = next_literal.is_some() as usize;
            for &reason_literal in
                &self.clause_allocator[clause_reference].get_literal_slice()[start_index..]
            {
                let is_root_assignment = self.assignments.is_literal_root_assignment(reason_literal);
                let seen = self.seen[reason_literal.get_propositional_variable()];

                if !is_root_assignment && !seen {
                    self.seen[reason_literal.get_propositional_variable()] = true;

                    self.variable_selector
                        .bump_activity(reason_literal.get_propositional_variable());

                    let literal_decision_level =
                        self.assignments.get_literal_assignment_level(reason_literal);

                    let is_current_level_assignment =
                        literal_decision_level == self.assignments.get_decision_level();

                    num_current_decision_level_literals_to_inspect +=
                        is_current_level_assignment as usize;

                    // Literals from previous decision levels go into the
                    // learned clause, with the highest level kept at index 1
                    // to prepare the clause for watching.
                    if !is_current_level_assignment {
                        self.analysis_result.learned_literals.push(reason_literal);

                        if literal_decision_level > self.analysis_result.backjump_level {
                            self.analysis_result.backjump_level = literal_decision_level;

                            let last_index = self.analysis_result.learned_literals.len() - 1;
                            self.analysis_result.learned_literals[last_index] =
                                self.analysis_result.learned_literals[1];
                            self.analysis_result.learned_literals[1] = reason_literal;
                        }
                    }
                }
            }

            // Find the next literal on the trail relevant for the conflict;
            // only literals seen so far are relevant.
            while !self.seen[self
                .assignments
                .get_trail_entry(next_trail_index)
                .get_propositional_variable()]
            {
                next_trail_index -= 1;
                quince_assert_advanced!(
                    self.assignments.get_literal_assignment_level(
                        self.assignments.get_trail_entry(next_trail_index)
                    ) == self.assignments.get_decision_level(),
                    "The current-level portion of the trail was overrun, most likely because of a faulty reason clause."
                );
            }

            let relevant_literal = self.assignments.get_trail_entry(next_trail_index);
            // The same literal cannot occur twice on the trail, so the flag
            // can be cleared immediately.
            self.seen[relevant_literal.get_propositional_variable()] = false;
            next_literal = Some(relevant_literal);
            num_current_decision_level_literals_to_inspect -= 1;

            // Once the counter hits zero the first unique implication point
            // is found and its negation becomes the asserting literal.
            if num_current_decision_level_literals_to_inspect == 0 {
                self.analysis_result.learned_literals[0] = !relevant_literal;
                break;
            }

            next_trail_index -= 1;
        }

        // Clear the seen flags of the learned clause; the flags of resolved
        // literals were already cleared above.
        for index in 1..self.analysis_result.learned_literals.len() {
            let literal = self.analysis_result.learned_literals[index];
            self.seen[literal.get_propositional_variable()] = false;
        }

        if self.internal_parameters.learning_clause_minimisation {
            quince_assert_moderate!(self.debug_check_conflict_analysis_result());

            self.learned_clause_minimiser.remove_dominated_literals(
                &mut self.analysis_result,
                &self.assignments,
                &self.clause_allocator,
            );
        }

        quince_assert_moderate!(self.debug_check_conflict_analysis_result());
    }

    /// Adds the learned clause to the database, backtracks and enqueues the
    /// asserting literal. Unit clauses are deposited at the root instead.
    fn process_learned_clause(&mut self) {
        let num_trail_entries_before_backtrack = self.assignments.num_trail_entries();

        if self.analysis_result.learned_literals.len() == 1 {
            self.restart_strategy
                .notify_conflict(1, num_trail_entries_before_backtrack);

            self.backtrack(0);

            let unit_clause = self.analysis_result.learned_literals[0];
            self.assignments.enqueue_decision_literal(unit_clause);

            self.counters.num_unit_clauses_learned += 1;
        } else {
            self.counters
                .average_learned_clause_length
                .add_term(self.analysis_result.learned_literals.len() as u64);
            self.counters.average_backtrack_amount.add_term(
                (self.assignments.get_decision_level() - self.analysis_result.backjump_level)
                    as u64,
            );

            self.backtrack(self.analysis_result.backjump_level);

            let clause_reference = self.learned_clause_manager.add_learned_clause(
                self.analysis_result.learned_literals.clone(),
                ClauseKind::Learned,
                &mut self.clausal_propagator,
                &mut self.assignments,
                &mut self.clause_allocator,
            );

            let lbd = self.learned_clause_manager.compute_lbd_for_literals(
                self.clause_allocator[clause_reference].get_literal_slice(),
                &self.assignments,
            );
            self.restart_strategy
                .notify_conflict(lbd, num_trail_entries_before_backtrack);
        }
    }

    fn debug_conflict_analysis_preconditions(&self) -> bool {
        quince_assert_simple!(self.state.conflicting());
        quince_assert_simple!(
            self.seen.len() as u32 == self.assignments.num_propositional_variables()
        );
        quince_assert_simple!(!self.assignments.is_at_the_root_level());
        quince_assert_advanced!(self.seen.iter().all(|seen| !seen));
        true
    }

    fn debug_1uip_conflict_analysis_check_next_literal(
        next_literal: Option<Literal>,
        assignments: &AssignmentsPropositional,
    ) -> bool {
        // Literals are examined in reverse trail order and the examined
        // literals must be from the current decision level, must not be root
        // assignments, and must be propagated unless it is the decision of
        // the current level.
        match next_literal {
            None => true,
            Some(next_literal) => {
                if assignments.is_literal_root_assignment(next_literal) {
                    return false;
                }

                let is_propagated = assignments.is_literal_propagated(next_literal);
                let is_decision = assignments.is_literal_decision(next_literal);
                let is_assigned_at_current_level = assignments
                    .get_literal_assignment_level(next_literal)
                    == assignments.get_decision_level();

                (is_propagated || is_decision) && is_assigned_at_current_level
            }
        }
    }

    fn debug_check_conflict_analysis_result(&self) -> bool {
        let assignments = &self.assignments;
        let learned_literals = &self.analysis_result.learned_literals;

        assert!(
            self.analysis_result.backjump_level < assignments.get_decision_level(),
            "The backjump level must be lower than the current level."
        );

        assert!(
            learned_literals
                .iter()
                .all(|&literal| !assignments.is_literal_root_assignment(literal)),
            "No root-level literals may be present in a learned clause."
        );

        assert_eq!(
            assignments.get_decision_level(),
            assignments.get_literal_assignment_level(!learned_literals[0]),
            "The asserting literal must be at the highest level."
        );

        assert!(
            learned_literals[1..].iter().all(|&literal| {
                assignments.get_literal_assignment_level(literal) != assignments.get_decision_level()
            }),
            "There may be only one literal at the highest decision level."
        );

        assert!(
            learned_literals[1..]
                .iter()
                .all(|&literal| assignments.is_literal_assigned_false(literal)),
            "All literals apart from the asserting literal must be assigned false."
        );

        if learned_literals.len() >= 2 {
            let second_max_level = assignments.get_literal_assignment_level(learned_literals[1]);

            assert_eq!(
                self.analysis_result.backjump_level, second_max_level,
                "The backjump level is the level of the literal at position 1."
            );

            assert!(
                learned_literals[1..].iter().all(|&literal| {
                    assignments.get_literal_assignment_level(literal) <= second_max_level
                }),
                "The literal at position 1 must carry the second-highest level."
            );
        }
        true
    }
}

impl Default for SmtSolver {
    fn default() -> Self {
        SmtSolver::new(SmtSolverOptions::default())
    }
}

/// The result of conflict analysis: the learned clause with the asserting
/// literal at index 0, plus the level to backtrack to.
#[derive(Clone, Default, Debug)]
pub(crate) struct ConflictAnalysisResult {
    pub(crate) learned_literals: Vec<Literal>,
    pub(crate) backjump_level: usize,
}

#[derive(Default, Debug, Copy, Clone)]
pub struct Counters {
    pub num_decisions: u64,
    pub num_conflicts: u64,
    pub num_propagations: u64,
    pub num_restarts: u64,
    pub num_unit_clauses_learned: u64,
    pub num_theory_checks: u64,
    pub num_theory_conflicts: u64,
    pub num_theory_lemmas: u64,
    pub num_garbage_collections: u64,
    average_conflict_size: CumulativeMovingAverage,
    average_learned_clause_length: CumulativeMovingAverage,
    average_backtrack_amount: CumulativeMovingAverage,
}

const STATISTIC_PREFIX: &str = "x";

impl Counters {
    fn log_statistics(&self) {
        info!("{STATISTIC_PREFIX} Number of Decisions: {}", self.num_decisions);
        info!("{STATISTIC_PREFIX} Number of Conflicts: {}", self.num_conflicts);
        info!(
            "{STATISTIC_PREFIX} Number of Propagations: {}",
            self.num_propagations
        );
        info!("{STATISTIC_PREFIX} Number of Restarts: {}", self.num_restarts);
        info!(
            "{STATISTIC_PREFIX} Number of Learned Unit Clauses: {}",
            self.num_unit_clauses_learned
        );
        info!(
            "{STATISTIC_PREFIX} Number of Theory Checks: {}",
            self.num_theory_checks
        );
        info!(
            "{STATISTIC_PREFIX} Number of Theory Conflicts: {}",
            self.num_theory_conflicts
        );
        info!(
            "{STATISTIC_PREFIX} Number of Theory Lemmas: {}",
            self.num_theory_lemmas
        );
        info!(
            "{STATISTIC_PREFIX} Number of Garbage Collections: {}",
            self.num_garbage_collections
        );
        info!(
            "{STATISTIC_PREFIX} Average Size of Conflict Explanation: {}",
            self.average_conflict_size.value()
        );
        info!(
            "{STATISTIC_PREFIX} Average Learned Clause Length: {}",
            self.average_learned_clause_length.value()
        );
        info!(
            "{STATISTIC_PREFIX} Average Backtrack Amount: {}",
            self.average_backtrack_amount.value()
        );
    }
}

#[derive(Default, Debug)]
enum SmtSolverStateInternal {
    #[default]
    Ready,
    Solving,
    Conflict {
        conflict_clause: ClauseReference,
    },
    ContainsSolution,
    Infeasible,
    Unknown,
    Timeout,
}

/// The externally observable state of the solver. Global unsatisfiability
/// ([`SmtSolverState::is_infeasible`]) is persistent: once proven at the
/// root, every further solve call reports it immediately. A per-branch
/// Unknown is a different state and does not poison future solve calls.
#[derive(Default, Debug)]
pub struct SmtSolverState {
    internal_state: SmtSolverStateInternal,
}

impl SmtSolverState {
    pub fn is_ready(&self) -> bool {
        matches!(self.internal_state, SmtSolverStateInternal::Ready)
    }

    pub fn no_conflict(&self) -> bool {
        !self.conflicting()
    }

    pub fn conflicting(&self) -> bool {
        matches!(
            self.internal_state,
            SmtSolverStateInternal::Conflict { .. }
        )
    }

    pub fn is_infeasible(&self) -> bool {
        matches!(self.internal_state, SmtSolverStateInternal::Infeasible)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.internal_state, SmtSolverStateInternal::Unknown)
    }

    pub fn has_solution(&self) -> bool {
        matches!(
            self.internal_state,
            SmtSolverStateInternal::ContainsSolution
        )
    }

    pub fn timeout(&self) -> bool {
        matches!(self.internal_state, SmtSolverStateInternal::Timeout)
    }

    fn get_conflict_clause(&self) -> ClauseReference {
        if let SmtSolverStateInternal::Conflict { conflict_clause } = self.internal_state {
            conflict_clause
        } else {
            panic!("Cannot extract the conflict clause without a conflict.");
        }
    }

    fn declare_solving(&mut self) {
        // Entered from Ready, from a resolved conflict, or when a new solve
        // call starts over; never out of proven infeasibility.
        quince_assert_simple!(!self.is_infeasible());
        self.internal_state = SmtSolverStateInternal::Solving;
    }

    fn declare_conflict(&mut self, conflict_clause: ClauseReference) {
        quince_assert_simple!(!self.conflicting());
        self.internal_state = SmtSolverStateInternal::Conflict { conflict_clause };
    }

    fn declare_infeasible(&mut self) {
        self.internal_state = SmtSolverStateInternal::Infeasible;
    }

    fn declare_infeasible_from_conflict(&mut self) {
        quince_assert_simple!(self.conflicting());
        self.internal_state = SmtSolverStateInternal::Infeasible;
    }

    fn declare_unknown(&mut self) {
        quince_assert_simple!(!self.is_infeasible());
        self.internal_state = SmtSolverStateInternal::Unknown;
    }

    fn declare_unknown_from_conflict(&mut self) {
        quince_assert_simple!(self.conflicting());
        self.internal_state = SmtSolverStateInternal::Unknown;
    }

    fn declare_solution_found(&mut self) {
        quince_assert_simple!(!self.is_infeasible());
        self.internal_state = SmtSolverStateInternal::ContainsSolution;
    }

    fn declare_timeout(&mut self) {
        quince_assert_simple!(!self.is_infeasible());
        self.internal_state = SmtSolverStateInternal::Timeout;
    }
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;
    use fnv::FnvHashSet;

    use super::*;
    use crate::termination::Indefinite;
    use crate::theory::InfeasibleSubset;
    use crate::theory::ModelValue;
    use crate::theory::TheoryLemma;

    /// A backend with scripted behaviour: configured atom combinations are
    /// inconsistent, configured atoms force an inconclusive answer, and
    /// pending lemmas are handed out on the first opportunity.
    #[derive(Debug, Default)]
    struct ScriptedBackend {
        asserted: FnvHashSet<Atom>,
        infeasible_combinations: Vec<Vec<Atom>>,
        unknown_triggers: FnvHashSet<Atom>,
        pending_lemmas: Vec<TheoryLemma>,
        current_infeasible: Vec<InfeasibleSubset>,
        num_checks: usize,
        model_entries: Vec<(&'static str, ModelValue)>,
    }

    impl TheoryBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn assert_atom(&mut self, atom: Atom, _origin: Option<Origin>) -> bool {
            let _ = self.asserted.insert(atom);
            true
        }

        fn retract_atom(&mut self, atom: Atom) {
            let _ = self.asserted.remove(&atom);
        }

        fn check(&mut self, _full: bool) -> TheoryVerdict {
            self.num_checks += 1;

            self.current_infeasible = self
                .infeasible_combinations
                .iter()
                .filter(|combination| {
                    combination.iter().all(|atom| self.asserted.contains(atom))
                })
                .cloned()
                .collect();
            if !self.current_infeasible.is_empty() {
                return TheoryVerdict::Inconsistent;
            }

            if self
                .asserted
                .iter()
                .any(|atom| self.unknown_triggers.contains(atom))
            {
                return TheoryVerdict::Unknown;
            }

            TheoryVerdict::Consistent
        }

        fn infeasible_subsets(&self) -> &[InfeasibleSubset] {
            &self.current_infeasible
        }

        fn take_lemmas(&mut self) -> Vec<TheoryLemma> {
            std::mem::take(&mut self.pending_lemmas)
        }

        fn update_model(&mut self, model: &mut TheoryModel) {
            for (variable, value) in &self.model_entries {
                model.assign(variable, value.clone());
            }
        }
    }

    fn scripted_backend(solver: &SmtSolver) -> &ScriptedBackend {
        solver
            .theory_backend(BackendId::new(0))
            .downcast_ref::<ScriptedBackend>()
            .unwrap()
    }

    #[test]
    fn an_empty_formula_is_satisfiable_with_an_empty_model() {
        let mut solver = SmtSolver::default();

        let flag = solver.solve(&mut Indefinite);

        assert_eq!(flag, SmtExecutionFlag::Satisfiable);
        let solution = solver.solution().unwrap();
        assert!(solution.theory_model().is_empty());
        assert_eq!(solver.counters().num_decisions, 0);
    }

    #[test]
    fn complementary_unit_clauses_are_unsatisfiable_at_the_root() {
        let mut solver = SmtSolver::default();
        let x = solver.new_literal();

        assert!(solver.add_permanent_clause(vec![x]).is_ok());
        assert_eq!(
            solver.add_permanent_clause(vec![!x]),
            Err(ConstraintOperationError::InfeasibleClause)
        );

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Unsatisfiable);
        assert_eq!(solver.counters().num_decisions, 0);
        assert_eq!(solver.get_propositional_assignments().get_decision_level(), 0);
    }

    #[test]
    fn a_propositional_model_satisfies_every_clause() {
        let mut solver = SmtSolver::default();
        let x = solver.new_literal();
        let y = solver.new_literal();
        let z = solver.new_literal();

        let clauses = [vec![x, y, z], vec![!x, y], vec![!y, z], vec![x, !z]];
        for clause in &clauses {
            assert!(solver.add_permanent_clause(clause.clone()).is_ok());
        }

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Satisfiable);

        let solution = solver.solution().unwrap();
        for clause in &clauses {
            assert!(clause
                .iter()
                .any(|&literal| solution.get_literal_value(literal)));
        }
    }

    #[test]
    fn conflict_analysis_proves_a_small_unsatisfiable_instance() {
        let mut solver = SmtSolver::default();
        let x = solver.new_literal();
        let y = solver.new_literal();

        assert!(solver.add_permanent_clause(vec![x, y]).is_ok());
        assert!(solver.add_permanent_clause(vec![x, !y]).is_ok());
        assert!(solver.add_permanent_clause(vec![!x, y]).is_ok());
        // Infeasibility may already surface while adding this clause; the
        // verdict of the search is the same either way.
        let _ = solver.add_permanent_clause(vec![!x, !y]);

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Unsatisfiable);
    }

    #[test]
    fn learned_clauses_prove_unsatisfiability_with_decisions_involved() {
        let mut solver = SmtSolver::default();
        let a = solver.new_literal();
        let b = solver.new_literal();
        let c = solver.new_literal();
        let d = solver.new_literal();
        let e = solver.new_literal();

        // An unsatisfiable core over c, d and e, padded with extra variables
        // so that decisions and non-trivial backjumps take place.
        assert!(solver.add_permanent_clause(vec![a, b, c]).is_ok());
        assert!(solver.add_permanent_clause(vec![c, d]).is_ok());
        assert!(solver.add_permanent_clause(vec![c, !d]).is_ok());
        assert!(solver.add_permanent_clause(vec![!c, e]).is_ok());
        assert!(solver.add_permanent_clause(vec![!c, !e]).is_ok());

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Unsatisfiable);
        assert!(solver.counters().num_conflicts >= 1);
    }

    #[test]
    fn the_theory_conflict_clause_is_the_negated_infeasible_subset() {
        let mut solver = SmtSolver::default();

        let c1 = solver.intern_atom("x <= 0", EnumSet::empty());
        let c2 = solver.intern_atom("x >= 1", EnumSet::empty());
        let origin = solver.intern_origin("f0");

        // c1 is owned by the negative polarity of its variable: the literal
        // of c1 is ~a, the literal of c2 is b.
        let not_a = solver.abstraction_literal(c1, origin, false);
        let b = solver.abstraction_literal(c2, origin, true);
        assert!(not_a.is_negative());
        assert!(b.is_positive());

        let backend = ScriptedBackend {
            infeasible_combinations: vec![vec![c1, c2]],
            ..ScriptedBackend::default()
        };
        let _ = solver.register_theory_backend(Box::new(backend));

        // b is forced at the root; the search then tries the saved phase
        // a = false, which entails c1 and triggers the theory conflict.
        assert!(solver.add_permanent_clause(vec![b]).is_ok());

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Satisfiable);
        assert!(solver.counters().num_theory_conflicts >= 1);

        // The derived conflict clause is exactly (a \/ ~b), so the model
        // cannot have a = false and b = true.
        let solution = solver.solution().unwrap();
        assert!(solution.get_literal_value(!not_a));
        assert!(solution.get_literal_value(b));

        // The clause is stored verbatim in the clause database.
        let mut dump = Vec::new();
        solver.debug_write_clauses(&mut dump).unwrap();
        let dump = String::from_utf8(dump).unwrap();
        assert!(
            dump.lines().any(|line| {
                let mut entries: Vec<i64> = line
                    .split_whitespace()
                    .map(|entry| entry.parse().unwrap())
                    .collect();
                entries.sort_unstable();
                entries == vec![-2, 0, 1]
            }),
            "expected the clause (a \\/ ~b) in the dump: {dump}"
        );
    }

    #[test]
    fn a_singleton_infeasible_subset_becomes_a_root_unit() {
        let mut solver = SmtSolver::default();

        let c1 = solver.intern_atom("x < x", EnumSet::empty());
        let origin = solver.intern_origin("f0");
        // The owning polarity is negative, so the initial saved phase walks
        // straight into the inconsistent atom at decision level 1.
        let atom_literal = solver.abstraction_literal(c1, origin, false);

        let backend = ScriptedBackend {
            infeasible_combinations: vec![vec![c1]],
            ..ScriptedBackend::default()
        };
        let _ = solver.register_theory_backend(Box::new(backend));

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Satisfiable);

        let solution = solver.solution().unwrap();
        assert!(!solution.get_literal_value(atom_literal));
        // The negation of the atom literal was deposited at level 0.
        assert!(solver
            .get_propositional_assignments()
            .is_literal_root_assignment(!atom_literal));
        assert_eq!(solver.counters().num_unit_clauses_learned, 1);
    }

    #[test]
    fn a_unit_theory_lemma_is_propagated_without_a_new_decision() {
        let mut solver = SmtSolver::default();

        let trigger = solver.intern_atom("x >= 0", EnumSet::empty());
        let deduced = solver.intern_atom("x >= -1", EnumSet::empty());
        let origin = solver.intern_origin("f0");
        let trigger_literal = solver.abstraction_literal(trigger, origin, true);
        let deduced_literal = solver.abstraction_literal(deduced, origin, true);

        let backend = ScriptedBackend {
            pending_lemmas: vec![TheoryLemma::new(vec![AtomLiteral::positive(deduced)])],
            ..ScriptedBackend::default()
        };
        let _ = solver.register_theory_backend(Box::new(backend));

        assert!(solver.add_permanent_clause(vec![trigger_literal]).is_ok());

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Satisfiable);

        assert_eq!(solver.counters().num_theory_lemmas, 1);
        // The deduction was available to propagation before any decision
        // touched it: it holds at the root.
        assert!(solver
            .get_propositional_assignments()
            .is_literal_root_assignment(deduced_literal));
        assert!(solver.solution().unwrap().get_literal_value(deduced_literal));
    }

    #[test]
    fn an_unknown_verdict_degrades_the_result_to_unknown() {
        let mut solver = SmtSolver::default();

        let hard = solver.intern_atom("x^x = 27", EnumSet::empty());
        let origin = solver.intern_origin("f0");
        let literal = solver.abstraction_literal(hard, origin, true);

        let backend = ScriptedBackend {
            unknown_triggers: [hard].into_iter().collect(),
            ..ScriptedBackend::default()
        };
        let _ = solver.register_theory_backend(Box::new(backend));

        assert!(solver.add_permanent_clause(vec![literal]).is_ok());

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Unknown);
        assert!(solver.state().is_unknown());
        // Unknown is not conflated with unsatisfiability: a fresh solve is
        // still allowed to try again.
        assert!(!solver.state().is_infeasible());
    }

    #[test]
    fn the_theory_is_only_consulted_when_the_atom_set_changed() {
        let mut solver = SmtSolver::default();

        let atom = solver.intern_atom("x = 3", EnumSet::empty());
        let origin = solver.intern_origin("f0");
        let literal = solver.abstraction_literal(atom, origin, true);

        let _ = solver.register_theory_backend(Box::new(ScriptedBackend::default()));

        assert!(solver.add_permanent_clause(vec![literal]).is_ok());
        // Plenty of purely Boolean decisions that never touch the atom.
        for _ in 0..8 {
            let _ = solver.new_literal();
        }

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Satisfiable);

        assert_eq!(scripted_backend(&solver).num_checks, 1);
    }

    #[test]
    fn the_theory_model_is_copied_into_the_solution() {
        let mut solver = SmtSolver::default();

        let atom = solver.intern_atom("x = 3", EnumSet::empty());
        let origin = solver.intern_origin("f0");
        let literal = solver.abstraction_literal(atom, origin, true);

        let backend = ScriptedBackend {
            model_entries: vec![("x", ModelValue::Integer(3))],
            ..ScriptedBackend::default()
        };
        let _ = solver.register_theory_backend(Box::new(backend));

        assert!(solver.add_permanent_clause(vec![literal]).is_ok());

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Satisfiable);
        assert_eq!(
            solver.solution().unwrap().theory_model().value_of("x"),
            Some(&ModelValue::Integer(3))
        );
    }

    #[test]
    fn relocation_keeps_the_clause_database_usable() {
        let mut solver = SmtSolver::default();
        let x = solver.new_literal();
        let y = solver.new_literal();
        let z = solver.new_literal();

        let removable = solver
            .add_permanent_clause(vec![x, y])
            .unwrap()
            .unwrap();
        assert!(solver.add_permanent_clause(vec![!x, z]).is_ok());
        assert!(solver.add_permanent_clause(vec![!y, !z, x]).is_ok());

        solver.remove_permanent_clause(removable);
        // Removing twice is a no-op, not an error.
        solver.remove_permanent_clause(removable);

        solver.garbage_collect();
        assert_eq!(solver.counters().num_garbage_collections, 1);

        assert_eq!(solver.solve(&mut Indefinite), SmtExecutionFlag::Satisfiable);
        let solution = solver.solution().unwrap();
        assert!(!solution.get_literal_value(x) || solution.get_literal_value(z));
    }

    #[test]
    fn the_clause_dump_is_dimacs_like() {
        let mut solver = SmtSolver::default();
        let x = solver.new_literal();
        let y = solver.new_literal();

        assert!(solver.add_permanent_clause(vec![x, !y]).is_ok());

        let mut dump = Vec::new();
        solver.debug_write_clauses(&mut dump).unwrap();
        let dump = String::from_utf8(dump).unwrap();

        assert_eq!(dump.trim(), "1 -2 0");
    }
}
