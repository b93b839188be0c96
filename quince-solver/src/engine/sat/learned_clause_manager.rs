use itertools::Itertools;

use super::clausal_propagator::is_clause_propagating;
use super::clause_allocator::ClauseRelocationMap;
use super::AssignmentsPropositional;
use super::ClausalPropagator;
use super::ClauseAllocator;
use super::ClauseKind;
use crate::basic_types::ClauseReference;
use crate::basic_types::Literal;
use crate::quince_assert_moderate;

#[derive(Debug, Clone, Copy)]
pub enum LearnedClauseSortingStrategy {
    Activity,
    Lbd,
}

#[derive(Debug, Clone, Copy)]
pub struct ClauseDatabaseOptions {
    pub max_clause_activity: f32,
    pub clause_activity_decay_factor: f32,
    pub num_high_lbd_learned_clauses_max: u64,
    pub high_lbd_learned_clause_sorting_strategy: LearnedClauseSortingStrategy,
    pub lbd_threshold: u32,
}

impl Default for ClauseDatabaseOptions {
    fn default() -> Self {
        Self {
            max_clause_activity: 1e20,
            clause_activity_decay_factor: 0.99,
            num_high_lbd_learned_clauses_max: 4000,
            high_lbd_learned_clause_sorting_strategy: LearnedClauseSortingStrategy::Activity,
            lbd_threshold: 5,
        }
    }
}

#[derive(Default, Debug)]
struct LearnedClauses {
    low_lbd: Vec<ClauseReference>,
    high_lbd: Vec<ClauseReference>,
}

/// Manages the learned clause database: clauses are partitioned by LBD into
/// a protected low tier and a reducible high tier, and roughly half of the
/// high tier is deleted once it outgrows its budget. Clauses currently
/// serving as a propagation reason are never deleted.
#[derive(Debug)]
pub struct LearnedClauseManager {
    learned_clauses: LearnedClauses,
    parameters: ClauseDatabaseOptions,
    clause_bump_increment: f32,
}

impl LearnedClauseManager {
    pub fn new(options: ClauseDatabaseOptions) -> Self {
        LearnedClauseManager {
            learned_clauses: LearnedClauses::default(),
            parameters: options,
            clause_bump_increment: 1.0,
        }
    }

    /// Adds an asserting learned clause (see
    /// [`ClausalPropagator::add_asserting_clause`]) and registers it for
    /// database reduction.
    pub fn add_learned_clause(
        &mut self,
        learned_clause_literals: Vec<Literal>,
        kind: ClauseKind,
        clausal_propagator: &mut ClausalPropagator,
        assignments: &mut AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) -> ClauseReference {
        let clause_reference = clausal_propagator.add_asserting_clause(
            learned_clause_literals,
            kind,
            assignments,
            clause_allocator,
        );
        self.register_learned_clause(clause_reference, assignments, clause_allocator);
        clause_reference
    }

    /// Registers an already stored non-original clause for database
    /// reduction, updating its LBD tier.
    pub fn register_learned_clause(
        &mut self,
        clause_reference: ClauseReference,
        assignments: &AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) {
        quince_assert_moderate!(clause_allocator[clause_reference].is_learned());

        // Theory lemmas may contain unassigned literals, for which the LBD
        // is not defined; those keep their pessimistic initial score.
        let all_literals_assigned = clause_allocator[clause_reference]
            .get_literal_slice()
            .iter()
            .all(|&literal| assignments.is_literal_assigned(literal));
        if all_literals_assigned {
            self.update_lbd(clause_reference, assignments, clause_allocator);
        }

        if clause_allocator[clause_reference].lbd() <= self.parameters.lbd_threshold {
            self.learned_clauses.low_lbd.push(clause_reference);
        } else {
            self.learned_clauses.high_lbd.push(clause_reference);
        }
    }

    /// Deletes roughly half of the high-LBD learned clauses once the tier
    /// exceeds its budget. Clauses that achieved a low LBD in the meantime
    /// are promoted first, protected clauses consume their protection
    /// instead of being deleted, and propagating clauses are skipped so that
    /// no reason ever dangles.
    pub fn shrink_learned_clause_database_if_needed(
        &mut self,
        assignments: &AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
        clausal_propagator: &mut ClausalPropagator,
    ) {
        if self.learned_clauses.high_lbd.len()
            <= self.parameters.num_high_lbd_learned_clauses_max as usize
        {
            return;
        }

        self.promote_high_lbd_clauses(clause_allocator);

        self.remove_high_lbd_clauses(assignments, clause_allocator, clausal_propagator);
    }

    fn remove_high_lbd_clauses(
        &mut self,
        assignments: &AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
        clausal_propagator: &mut ClausalPropagator,
    ) {
        self.sort_high_lbd_clauses_by_quality_decreasing_order(clause_allocator);

        let mut num_clauses_to_remove = self.learned_clauses.high_lbd.len() as u64
            - self.parameters.num_high_lbd_learned_clauses_max / 2;
        // The 'rev' gives priority to poor clauses for deletion; fewer
        // clauses than intended may be removed if many are protected or
        // propagating.
        for &clause_reference in self.learned_clauses.high_lbd.iter().rev() {
            if num_clauses_to_remove == 0 {
                break;
            }

            if clause_allocator[clause_reference].is_protected_against_deletion() {
                clause_allocator[clause_reference].clear_protection_against_deletion();
                continue;
            }

            if is_clause_propagating(assignments, clause_allocator, clause_reference) {
                continue;
            }

            clausal_propagator.remove_clause_from_consideration(
                clause_allocator[clause_reference].get_literal_slice(),
                clause_reference,
            );
            clause_allocator.delete_clause(clause_reference);

            num_clauses_to_remove -= 1;
        }

        self.learned_clauses
            .high_lbd
            .retain(|&clause_reference| !clause_allocator[clause_reference].is_deleted());
    }

    fn sort_high_lbd_clauses_by_quality_decreasing_order(
        &mut self,
        clause_allocator: &mut ClauseAllocator,
    ) {
        // The better clauses are sorted towards the front.
        self.learned_clauses
            .high_lbd
            .sort_unstable_by(|reference_1, reference_2| {
                let clause_1 = clause_allocator.get_clause(*reference_1);
                let clause_2 = clause_allocator.get_clause(*reference_2);

                match self.parameters.high_lbd_learned_clause_sorting_strategy {
                    LearnedClauseSortingStrategy::Activity => clause_2
                        .get_activity()
                        .partial_cmp(&clause_1.get_activity())
                        .unwrap(),
                    LearnedClauseSortingStrategy::Lbd => {
                        if clause_1.lbd() != clause_2.lbd() {
                            clause_1.lbd().cmp(&clause_2.lbd())
                        } else {
                            clause_2
                                .get_activity()
                                .partial_cmp(&clause_1.get_activity())
                                .unwrap()
                        }
                    }
                }
            });
    }

    fn promote_high_lbd_clauses(&mut self, clause_allocator: &mut ClauseAllocator) {
        for &clause_reference in &self.learned_clauses.high_lbd {
            let lbd = clause_allocator[clause_reference].lbd();
            if lbd <= self.parameters.lbd_threshold {
                self.learned_clauses.low_lbd.push(clause_reference);
            }
        }
        self.learned_clauses.high_lbd.retain(|&clause_reference| {
            clause_allocator[clause_reference].lbd() > self.parameters.lbd_threshold
        });
    }

    /// Called during conflict analysis for every clause taking part in the
    /// resolution.
    pub fn update_clause_lbd_and_bump_activity(
        &mut self,
        clause_reference: ClauseReference,
        assignments: &AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) {
        if clause_allocator.get_clause(clause_reference).is_learned()
            && clause_allocator.get_clause(clause_reference).lbd() > self.parameters.lbd_threshold
        {
            self.bump_clause_activity(clause_reference, clause_allocator);
            self.update_lbd(clause_reference, assignments, clause_allocator);
        }
    }

    pub fn update_lbd(
        &mut self,
        clause_reference: ClauseReference,
        assignments: &AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) {
        let new_lbd = self.compute_lbd_for_literals(
            clause_allocator[clause_reference].get_literal_slice(),
            assignments,
        );
        if new_lbd < clause_allocator[clause_reference].lbd() {
            clause_allocator[clause_reference].update_lbd(new_lbd);
            if new_lbd <= 30 {
                clause_allocator[clause_reference].mark_protection_against_deletion();
            }
        }
    }

    /// The LBD of a set of literals is the number of distinct decision
    /// levels among them; root assignments do not count.
    pub fn compute_lbd_for_literals(
        &self,
        literals: &[Literal],
        assignments: &AssignmentsPropositional,
    ) -> u32 {
        quince_assert_moderate!(
            literals
                .iter()
                .all(|lit| assignments.is_literal_assigned(*lit)),
            "Cannot compute LBD if not all literals are assigned."
        );

        literals
            .iter()
            .filter_map(|lit| {
                let level = assignments.get_literal_assignment_level(*lit);
                (level > 0).then_some(level)
            })
            .unique()
            .count() as u32
    }

    pub fn bump_clause_activity(
        &mut self,
        clause_reference: ClauseReference,
        clause_allocator: &mut ClauseAllocator,
    ) {
        if clause_allocator.get_clause(clause_reference).get_activity() + self.clause_bump_increment
            > self.parameters.max_clause_activity
        {
            self.rescale_clause_activities(clause_allocator);
        }
        clause_allocator
            .get_mutable_clause(clause_reference)
            .increase_activity(self.clause_bump_increment);
    }

    pub fn rescale_clause_activities(&mut self, clause_allocator: &mut ClauseAllocator) {
        self.learned_clauses
            .high_lbd
            .iter()
            .for_each(|clause_reference| {
                let clause = clause_allocator.get_mutable_clause(*clause_reference);
                clause.divide_activity(self.parameters.max_clause_activity);
            });
        self.clause_bump_increment /= self.parameters.max_clause_activity;
    }

    pub fn decay_clause_activities(&mut self) {
        self.clause_bump_increment /= self.parameters.clause_activity_decay_factor;
    }

    /// Rewrites the tier registries after the clause storage was relocated.
    pub(crate) fn remap_clause_references(&mut self, map: &ClauseRelocationMap) {
        for clause_reference in self
            .learned_clauses
            .low_lbd
            .iter_mut()
            .chain(self.learned_clauses.high_lbd.iter_mut())
        {
            *clause_reference = map.get(*clause_reference);
        }
    }
}

impl Default for LearnedClauseManager {
    fn default() -> Self {
        LearnedClauseManager::new(ClauseDatabaseOptions::default())
    }
}
