use super::ClauseAllocator;
use super::ClauseKind;
use crate::basic_types::ClauseReference;
use crate::basic_types::ConstraintOperationError;
use crate::basic_types::Literal;
use crate::engine::sat::clause_allocator::ClauseRelocationMap;
use crate::engine::AssignmentsPropositional;
use crate::quince_assert_moderate;
use crate::quince_assert_simple;

/// A watch list entry: the watched clause plus a cached literal of that
/// clause. The cached literal is an optimisation hint, not ground truth; if
/// it is true the clause is satisfied and need not be touched in memory.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ClauseWatcher {
    cached_literal: Literal,
    clause_reference: ClauseReference,
}

/// Unit propagation with the two-watched-literal scheme: once all but one
/// literal in a clause are falsified, the remaining literal is propagated to
/// true. Each clause is watched through the literals at positions 0 and 1,
/// and the watch lists are keyed by the negation of the watched literal.
#[derive(Default, Debug)]
pub struct ClausalPropagator {
    watch_lists: Vec<Vec<ClauseWatcher>>,
    next_position_on_trail_to_propagate: usize,
}

impl ClausalPropagator {
    pub fn grow(&mut self) {
        // One watch list for each polarity.
        self.watch_lists.push(vec![]);
        self.watch_lists.push(vec![]);
    }

    pub(crate) fn start_watching_clause_unchecked(
        &mut self,
        clause: &[Literal],
        clause_reference: ClauseReference,
    ) {
        quince_assert_simple!(clause.len() >= 2);

        self.watch_lists[clause[0]].push(ClauseWatcher {
            cached_literal: clause[1],
            clause_reference,
        });

        self.watch_lists[clause[1]].push(ClauseWatcher {
            cached_literal: clause[0],
            clause_reference,
        });
    }

    /// Adds a clause of the input formula. The clause is preprocessed at the
    /// root: satisfied clauses and tautologies are absorbed, falsified and
    /// duplicate literals are removed, and a remaining unit literal is
    /// enqueued at the root. Returns the reference of the stored clause, or
    /// `None` if no clause needed storing.
    pub fn add_permanent_clause(
        &mut self,
        literals: Vec<Literal>,
        assignments: &mut AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) -> Result<Option<ClauseReference>, ConstraintOperationError> {
        quince_assert_simple!(
            assignments.is_at_the_root_level(),
            "Permanent clauses are added at the root level."
        );

        let mut literals = literals;
        literals.sort_unstable_by_key(|literal| literal.to_u32());

        let mut preprocessed: Vec<Literal> = Vec::with_capacity(literals.len());
        for &literal in &literals {
            if assignments.is_literal_assigned_true(literal) {
                // Satisfied at the root, nothing to store.
                return Ok(None);
            }
            if preprocessed
                .last()
                .map_or(false, |&kept| kept.is_negation_of(literal))
            {
                // A tautology; complementary literals are adjacent after
                // sorting by code.
                return Ok(None);
            }
            if preprocessed.last() == Some(&literal)
                || assignments.is_literal_assigned_false(literal)
            {
                continue;
            }
            preprocessed.push(literal);
        }

        match preprocessed.len() {
            0 => Err(ConstraintOperationError::InfeasibleClause),
            1 => {
                assignments.enqueue_decision_literal(preprocessed[0]);
                Ok(None)
            }
            _ => {
                let clause_reference =
                    clause_allocator.create_clause(preprocessed, ClauseKind::Original);
                self.start_watching_clause_unchecked(
                    clause_allocator[clause_reference].get_literal_slice(),
                    clause_reference,
                );
                Ok(Some(clause_reference))
            }
        }
    }

    /// Adds a learned clause that is asserting after the backtrack performed
    /// by conflict resolution: the literal at position 0 is unassigned, all
    /// others are false, and position 1 carries the highest remaining level.
    /// The asserting literal is enqueued with the new clause as its reason.
    pub fn add_asserting_clause(
        &mut self,
        literals: Vec<Literal>,
        kind: ClauseKind,
        assignments: &mut AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) -> ClauseReference {
        quince_assert_simple!(literals.len() >= 2);
        quince_assert_moderate!(assignments.is_literal_unassigned(literals[0]));
        quince_assert_moderate!(literals[1..]
            .iter()
            .all(|&literal| assignments.is_literal_assigned_false(literal)));

        let asserting_literal = literals[0];
        let clause_reference = clause_allocator.create_clause(literals, kind);
        self.start_watching_clause_unchecked(
            clause_allocator[clause_reference].get_literal_slice(),
            clause_reference,
        );

        let conflict = assignments.enqueue_propagated_literal(asserting_literal, clause_reference);
        quince_assert_simple!(conflict.is_none());

        clause_reference
    }

    /// Stores and watches a clause without touching the assignment; the
    /// literals are expected to already be arranged for watching (see
    /// [`arrange_for_watches`]).
    pub(crate) fn attach_arranged_clause(
        &mut self,
        literals: Vec<Literal>,
        kind: ClauseKind,
        clause_allocator: &mut ClauseAllocator,
    ) -> ClauseReference {
        quince_assert_simple!(literals.len() >= 2);

        let clause_reference = clause_allocator.create_clause(literals, kind);
        self.start_watching_clause_unchecked(
            clause_allocator[clause_reference].get_literal_slice(),
            clause_reference,
        );
        clause_reference
    }

    /// Propagates all trail entries that have not been processed yet. On
    /// conflict the falsified clause is returned; the remaining watchers of
    /// the literal under consideration are kept unmodified.
    pub fn propagate(
        &mut self,
        assignments: &mut AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) -> Result<(), ClauseReference> {
        // This function is implemented as one long function on purpose: it
        // is the performance hotspot of the solver and splitting it into
        // parts that do not get inlined degrades it notably.
        while self.next_position_on_trail_to_propagate < assignments.num_trail_entries() {
            let true_literal = assignments.get_trail_entry(self.next_position_on_trail_to_propagate);
            quince_assert_simple!(assignments.is_literal_assigned_true(true_literal));

            if self.watch_lists[!true_literal].is_empty() {
                self.next_position_on_trail_to_propagate += 1;
                continue;
            }

            // The watch list of the falsified literal is traversed with two
            // indices: entries that remain watches are compacted to
            // [0, end_index), the rest re-register elsewhere.
            let mut end_index: usize = 0;
            let mut current_index: usize = 0;
            while current_index < self.watch_lists[!true_literal].len() {
                // If the cached literal is already true the clause is
                // satisfied without accessing it in memory.
                let cached_literal = self.watch_lists[!true_literal][current_index].cached_literal;
                if assignments.is_literal_assigned_true(cached_literal) {
                    self.watch_lists[!true_literal][end_index] =
                        self.watch_lists[!true_literal][current_index];
                    current_index += 1;
                    end_index += 1;
                    continue;
                }

                let watched_clause_reference =
                    self.watch_lists[!true_literal][current_index].clause_reference;
                let watched_clause = clause_allocator.get_mutable_clause(watched_clause_reference);

                // Normalise so that the falsified watched literal is at
                // position 1.
                if watched_clause[0] == !true_literal {
                    let other_watcher = watched_clause[1];
                    watched_clause[0] = other_watcher;
                    watched_clause[1] = !true_literal;
                }

                // The other watched literal may already satisfy the clause.
                if assignments.is_literal_assigned_true(watched_clause[0]) {
                    self.watch_lists[!true_literal][current_index].cached_literal =
                        watched_clause[0];
                    self.watch_lists[!true_literal][end_index] =
                        self.watch_lists[!true_literal][current_index];
                    current_index += 1;
                    end_index += 1;
                    continue;
                }

                // Look for a non-falsified literal to take over the watch.
                let mut found_new_watch = false;
                for i in 2..watched_clause.len() {
                    if !assignments.is_literal_assigned_false(watched_clause[i]) {
                        let replacement = watched_clause[i];
                        watched_clause[1] = replacement;
                        watched_clause[i] = !true_literal;

                        self.watch_lists[replacement].push(ClauseWatcher {
                            cached_literal: watched_clause[0],
                            clause_reference: watched_clause_reference,
                        });

                        found_new_watch = true;
                        break;
                    }
                }

                if found_new_watch {
                    // The clause left this watch list; only the current
                    // index moves.
                    current_index += 1;
                    continue;
                }

                // The clause stays in this watch list.
                self.watch_lists[!true_literal][end_index] =
                    self.watch_lists[!true_literal][current_index];
                end_index += 1;
                current_index += 1;

                // All literals except watched_clause[0] are false: the
                // clause is unit or conflicting under the assignment.
                if assignments.is_literal_unassigned(watched_clause[0]) {
                    let propagated_literal = watched_clause[0];
                    let conflict = assignments
                        .enqueue_propagated_literal(propagated_literal, watched_clause_reference);
                    quince_assert_moderate!(conflict.is_none());
                } else {
                    quince_assert_moderate!(
                        assignments.is_literal_assigned_false(watched_clause[0])
                    );
                    // Conflict: stop examining watches for this literal but
                    // copy the remaining watcher entries back unmodified.
                    while current_index < self.watch_lists[!true_literal].len() {
                        self.watch_lists[!true_literal][end_index] =
                            self.watch_lists[!true_literal][current_index];
                        current_index += 1;
                        end_index += 1;
                    }
                    self.watch_lists[!true_literal].truncate(end_index);
                    return Err(watched_clause_reference);
                }
            }
            self.watch_lists[!true_literal].truncate(end_index);
            self.next_position_on_trail_to_propagate += 1;
        }

        Ok(())
    }

    pub fn synchronise(&mut self, trail_size: usize) {
        quince_assert_simple!(self.next_position_on_trail_to_propagate >= trail_size);
        self.next_position_on_trail_to_propagate = trail_size;
    }

    pub fn is_propagation_complete(&self, trail_size: usize) -> bool {
        self.next_position_on_trail_to_propagate == trail_size
    }

    /// Eagerly removes both watchers of the clause.
    pub fn remove_clause_from_consideration(
        &mut self,
        clause: &[Literal],
        clause_reference: ClauseReference,
    ) {
        let remove_clause_from_watchers =
            |watchers: &mut Vec<ClauseWatcher>, clause_reference: ClauseReference| {
                let index = watchers
                    .iter()
                    .position(|watcher| watcher.clause_reference == clause_reference)
                    .expect("The clause to remove is watched.");
                let _ = watchers.swap_remove(index);
            };

        remove_clause_from_watchers(&mut self.watch_lists[clause[0]], clause_reference);
        remove_clause_from_watchers(&mut self.watch_lists[clause[1]], clause_reference);
    }

    /// Rewrites every watcher after the clause storage was relocated.
    pub(crate) fn remap_clause_references(&mut self, map: &ClauseRelocationMap) {
        for watch_list in self.watch_lists.iter_mut() {
            for watcher in watch_list.iter_mut() {
                watcher.clause_reference = map.get(watcher.clause_reference);
            }
        }
    }
}

// methods for debugging
impl ClausalPropagator {
    pub fn debug_check_state(
        &self,
        assignments: &AssignmentsPropositional,
        clause_allocator: &ClauseAllocator,
    ) -> bool {
        assert!(
            self.watch_lists.len() as u32 == 2 * assignments.num_propositional_variables(),
            "Watch list length is not in sync with the number of variables."
        );

        // Each watched clause appears exactly twice in the watch lists.
        let mut clause_occurrences: fnv::FnvHashMap<ClauseReference, usize> =
            fnv::FnvHashMap::default();
        self.watch_lists.iter().flatten().for_each(|watcher| {
            *clause_occurrences.entry(watcher.clause_reference).or_insert(0) += 1;
        });
        assert!(
            clause_occurrences.values().all(|&count| count == 2),
            "A clause in the watch lists does not appear exactly twice."
        );

        for literal_code in 0..self.watch_lists.len() {
            let literal = Literal::u32_to_literal(literal_code as u32);
            assert!(
                self.watch_lists[literal].iter().all(|watcher| {
                    let clause = clause_allocator.get_clause(watcher.clause_reference);
                    clause[0] == literal || clause[1] == literal
                }),
                "A clause is in the watch list of a literal that is not one of its watched literals."
            );
        }

        // No falsified clause and no missed propagation may be present.
        clause_occurrences.keys().for_each(|&clause_reference| {
            let clause = clause_allocator.get_clause(clause_reference);
            assert!(
                !clause
                    .get_literal_slice()
                    .iter()
                    .all(|&literal| assignments.is_literal_assigned_false(literal)),
                "The clausal propagator missed a falsified clause."
            );

            let num_falsified_literals = clause
                .get_literal_slice()
                .iter()
                .filter(|&&literal| assignments.is_literal_assigned_false(literal))
                .count();

            if num_falsified_literals + 1 == clause.len() as usize {
                let remaining_literal = clause
                    .get_literal_slice()
                    .iter()
                    .find(|&&literal| !assignments.is_literal_assigned_false(literal))
                    .unwrap();
                assert!(
                    assignments.is_literal_assigned_true(*remaining_literal),
                    "The clausal propagator missed a propagation."
                );
            }
        });
        true
    }
}

/// Whether the clause is the reason of the propagation of its first literal.
/// The convention of the propagator is that the propagated literal of a
/// clause is at position 0.
pub(crate) fn is_clause_propagating(
    assignments: &AssignmentsPropositional,
    clause_allocator: &ClauseAllocator,
    clause_reference: ClauseReference,
) -> bool {
    let propagated_literal = clause_allocator[clause_reference][0];

    assignments.is_literal_assigned_true(propagated_literal)
        && assignments.get_literal_reason(propagated_literal) == Some(clause_reference)
}

/// Moves two literals that are not assigned false to the watched positions.
/// If only one such literal exists it is moved to position 0 and position 1
/// receives the falsified literal with the highest decision level; if all
/// literals are false, positions 0 and 1 carry the two highest levels. This
/// makes a freshly stored clause satisfy the watch invariant immediately.
pub(crate) fn arrange_for_watches(literals: &mut [Literal], assignments: &AssignmentsPropositional) {
    quince_assert_simple!(literals.len() >= 2);

    // Rank: any literal that is not false beats every falsified one, and
    // falsified literals are ranked by assignment level.
    let watch_quality = |literal: Literal| -> (u8, usize) {
        if assignments.is_literal_assigned_false(literal) {
            (0, assignments.get_literal_assignment_level(literal))
        } else {
            (1, usize::MAX)
        }
    };

    let mut best_index = 0;
    let mut second_index = 1;
    if watch_quality(literals[1]) > watch_quality(literals[0]) {
        best_index = 1;
        second_index = 0;
    }

    for index in 2..literals.len() {
        let quality = watch_quality(literals[index]);
        if quality > watch_quality(literals[best_index]) {
            second_index = best_index;
            best_index = index;
        } else if quality > watch_quality(literals[second_index]) {
            second_index = index;
        }
    }

    literals.swap(0, best_index);
    // The swap above may have moved the literal selected for position 1.
    if second_index == 0 {
        second_index = best_index;
    }
    literals.swap(1, second_index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::PropositionalVariable;

    fn setup(
        num_variables: u32,
    ) -> (ClausalPropagator, AssignmentsPropositional, ClauseAllocator) {
        let mut propagator = ClausalPropagator::default();
        let mut assignments = AssignmentsPropositional::default();
        for _ in 0..num_variables {
            propagator.grow();
            assignments.grow();
        }
        (propagator, assignments, ClauseAllocator::default())
    }

    fn literal(index: u32, is_positive: bool) -> Literal {
        Literal::new(PropositionalVariable::new(index), is_positive)
    }

    #[test]
    fn propagating_a_unit_suffix_assigns_the_remaining_literal() {
        let (mut propagator, mut assignments, mut allocator) = setup(4);
        let x = literal(1, true);
        let y = literal(2, true);
        let z = literal(3, true);

        let _ = propagator
            .add_permanent_clause(vec![x, y, z], &mut assignments, &mut allocator)
            .unwrap();

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!x);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!y);

        assert!(propagator.propagate(&mut assignments, &mut allocator).is_ok());
        assert!(assignments.is_literal_assigned_true(z));
        assert!(assignments.is_literal_propagated(z));
        assert!(propagator.is_propagation_complete(assignments.num_trail_entries()));
        assert!(propagator.debug_check_state(&assignments, &allocator));
    }

    #[test]
    fn a_falsified_clause_is_reported_as_the_conflict() {
        let (mut propagator, mut assignments, mut allocator) = setup(3);
        let x = literal(1, true);
        let y = literal(2, true);

        let _ = propagator
            .add_permanent_clause(vec![x, y], &mut assignments, &mut allocator)
            .unwrap()
            .unwrap();
        let second = propagator
            .add_permanent_clause(vec![x, !y], &mut assignments, &mut allocator)
            .unwrap()
            .unwrap();

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!x);

        let conflict = propagator.propagate(&mut assignments, &mut allocator);
        assert_eq!(conflict, Err(second));
        // The watcher lists stay consistent in the conflicting case as well.
        assert!(assignments.is_literal_assigned_true(y));
    }

    #[test]
    fn root_satisfied_clauses_are_absorbed() {
        let (mut propagator, mut assignments, mut allocator) = setup(3);
        let x = literal(1, true);
        let y = literal(2, true);

        assignments.enqueue_decision_literal(x);
        let result = propagator
            .add_permanent_clause(vec![x, y], &mut assignments, &mut allocator)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn tautologies_are_absorbed() {
        let (mut propagator, mut assignments, mut allocator) = setup(3);
        let x = literal(1, true);
        let y = literal(2, true);

        let result = propagator
            .add_permanent_clause(vec![x, !x, y], &mut assignments, &mut allocator)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn a_clause_false_at_the_root_is_infeasible() {
        let (mut propagator, mut assignments, mut allocator) = setup(3);
        let x = literal(1, true);

        assignments.enqueue_decision_literal(!x);
        let result = propagator.add_permanent_clause(vec![x], &mut assignments, &mut allocator);
        assert_eq!(result, Err(ConstraintOperationError::InfeasibleClause));
    }

    #[test]
    fn arrange_for_watches_prefers_unfalsified_literals() {
        let (_, mut assignments, _) = setup(4);
        let x = literal(1, true);
        let y = literal(2, true);
        let z = literal(3, true);

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!x);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!z);

        let mut literals = vec![x, z, y];
        arrange_for_watches(&mut literals, &assignments);

        assert_eq!(literals[0], y);
        // Position 1 receives the falsified literal with the highest level.
        assert_eq!(literals[1], z);
    }

    #[test]
    fn arrange_for_watches_uses_the_two_highest_levels_when_all_false() {
        let (_, mut assignments, _) = setup(4);
        let x = literal(1, true);
        let y = literal(2, true);
        let z = literal(3, true);

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!y);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!x);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!z);

        let mut literals = vec![y, x, z];
        arrange_for_watches(&mut literals, &assignments);

        assert_eq!(literals[0], z);
        assert_eq!(literals[1], x);
    }
}
