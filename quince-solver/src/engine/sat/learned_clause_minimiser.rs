use fnv::FnvHashMap;
use fnv::FnvHashSet;

use super::AssignmentsPropositional;
use super::ClauseAllocator;
use crate::basic_types::Literal;
use crate::engine::smt_solver::ConflictAnalysisResult;
use crate::quince_assert_moderate;
use crate::quince_assert_simple;

/// Removes literals from a freshly learned clause that are dominated in the
/// implication graph: a literal is redundant when a subset of the other
/// literals of the clause implies it through reason chains. The recursion is
/// bounded by the set of decision levels present in the original clause
/// (levels outside that set poison the search early) and by a maximum
/// depth.
///
/// The implementation follows the algorithm of "Minimizing learned clauses"
/// (Sörensson and Biere, SAT'09) and "Improved conflict-clause minimization
/// leads to improved propositional proof traces" (Van Gelder, SAT'09).
#[derive(Default, Debug)]
pub struct LearnedClauseMinimiser {
    current_depth: usize,
    allowed_decision_levels: FnvHashSet<usize>,
    label_assignments: FnvHashMap<Literal, Option<Label>>,
    num_minimisation_calls: usize,
    num_literals_removed_total: usize,
    num_literals_seen_total: usize,
}

impl LearnedClauseMinimiser {
    /// Assumes the asserting literal is at position 0; it is never removed.
    /// The literal at position 1 keeps the highest assignment level among
    /// the remaining literals so that the clause stays ready for watching.
    pub fn remove_dominated_literals(
        &mut self,
        analysis_result: &mut ConflictAnalysisResult,
        assignments: &AssignmentsPropositional,
        clause_allocator: &ClauseAllocator,
    ) {
        self.num_minimisation_calls += 1;
        self.num_literals_seen_total += analysis_result.learned_literals.len();
        let num_literals_before_minimisation = analysis_result.learned_literals.len();

        self.initialise(analysis_result, assignments);

        // The asserting literal at position 0 must stay, so the scan starts
        // at position 1.
        let mut end_position: usize = 1;
        for i in 1..analysis_result.learned_literals.len() {
            let learned_literal = analysis_result.learned_literals[i];

            self.compute_label(!learned_literal, assignments, clause_allocator);

            let label = self.get_literal_label(!learned_literal);
            // Literals that are not deemed redundant are kept; otherwise
            // end_position is not incremented, which removes the literal.
            if label == Label::Poison || label == Label::Keep {
                analysis_result.learned_literals[end_position] = learned_literal;
                end_position += 1;
                // Keep the literal with the highest assignment level at
                // position 1; this invariant is relied upon when the clause
                // is attached.
                let literal_at_index_1 = analysis_result.learned_literals[1];
                if assignments.get_literal_assignment_level(literal_at_index_1)
                    < assignments.get_literal_assignment_level(learned_literal)
                {
                    // Note the minus one, since end_position was just
                    // incremented.
                    analysis_result.learned_literals.swap(1, end_position - 1);
                }
            }
        }
        analysis_result.learned_literals.truncate(end_position);

        self.clean_up();

        let num_literals_removed =
            num_literals_before_minimisation - analysis_result.learned_literals.len();
        self.num_literals_removed_total += num_literals_removed;

        if analysis_result.learned_literals.len() > 1 {
            analysis_result.backjump_level =
                assignments.get_literal_assignment_level(analysis_result.learned_literals[1]);
        } else {
            analysis_result.backjump_level = 0;
        }
    }

    fn compute_label(
        &mut self,
        input_literal: Literal,
        assignments: &AssignmentsPropositional,
        clause_allocator: &ClauseAllocator,
    ) {
        quince_assert_moderate!(assignments.is_literal_assigned_true(input_literal));

        self.current_depth += 1;

        if self.is_literal_label_already_computed(input_literal) {
            self.current_depth -= 1;
            return;
        }

        // For performance reasons the analysis stops at a fixed recursion
        // depth.
        if self.is_at_max_allowed_depth() {
            self.assign_literal_label(input_literal, Label::Poison);
            self.current_depth -= 1;
            return;
        }

        // A decision literal that has not been labelled during
        // initialisation is not part of the original learned clause and can
        // never be implied away.
        if assignments.is_literal_decision(input_literal) {
            self.assign_literal_label(input_literal, Label::Poison);
            self.current_depth -= 1;
            return;
        }

        // Literals from decision levels that do not appear in the original
        // learned clause cannot be removed either; this level abstraction is
        // what makes the search terminate early.
        if !self.is_decision_level_allowed(assignments.get_literal_assignment_level(input_literal))
        {
            self.assign_literal_label(input_literal, Label::Poison);
            self.current_depth -= 1;
            return;
        }

        let reason_reference = assignments
            .get_literal_reason(input_literal)
            .expect("A propagated non-root literal carries its reason clause.");

        for i in 1..clause_allocator.get_clause(reason_reference).len() {
            let antecedent_literal = !clause_allocator.get_clause(reason_reference)[i];

            // Root assignments hold unconditionally and can be ignored.
            if assignments.is_literal_root_assignment(antecedent_literal) {
                continue;
            }

            self.compute_label(antecedent_literal, assignments, clause_allocator);

            if self.get_literal_label(antecedent_literal) == Label::Poison {
                // If the input literal is part of the original learned
                // clause it is kept, otherwise it is poisoned as well.
                if self.is_literal_assigned_seen(input_literal) {
                    self.assign_literal_label(input_literal, Label::Keep);
                } else {
                    self.assign_literal_label(input_literal, Label::Poison);
                }
                self.current_depth -= 1;
                return;
            }
        }

        // All antecedents are Keep or Removable, so the input literal is
        // implied by the rest of the clause and can be removed.
        self.assign_literal_label(input_literal, Label::Removable);
        self.current_depth -= 1;
    }

    fn is_decision_level_allowed(&self, decision_level: usize) -> bool {
        self.allowed_decision_levels.contains(&decision_level)
    }

    fn mark_decision_level_as_allowed(&mut self, decision_level: usize) {
        let _ = self.allowed_decision_levels.insert(decision_level);
    }

    fn is_literal_assigned_seen(&self, literal: Literal) -> bool {
        let entry = self.label_assignments.get(&literal);
        if let Some(label) = entry {
            label.expect("Stored label is None, error?") == Label::Seen
        } else {
            false
        }
    }

    fn get_literal_label(&self, literal: Literal) -> Label {
        self.label_assignments
            .get(&literal)
            .expect("Cannot ask for a label of an unlabelled literal?")
            .expect("Stored label is None, error?")
    }

    fn assign_literal_label(&mut self, literal: Literal, label: Label) {
        quince_assert_moderate!(
            !self.label_assignments.contains_key(&literal)
                || self.is_literal_assigned_seen(literal),
            "Cannot assign the label of an already labelled literal"
        );
        let _ = self.label_assignments.insert(literal, Some(label));
    }

    fn is_literal_label_already_computed(&self, literal: Literal) -> bool {
        let entry = self.label_assignments.get(&literal);
        if let Some(label) = entry {
            label.expect("Stored label is None, error?") != Label::Seen
        } else {
            false
        }
    }

    fn initialise(
        &mut self,
        analysis_result: &ConflictAnalysisResult,
        assignments: &AssignmentsPropositional,
    ) {
        quince_assert_simple!(self.current_depth == 0);

        // The asserting literal is always kept.
        let _ = self
            .label_assignments
            .insert(analysis_result.learned_literals[0], Some(Label::Keep));

        for i in 1..analysis_result.learned_literals.len() {
            let literal = !analysis_result.learned_literals[i];
            // Decision literals must be kept.
            if assignments.is_literal_decision(literal) {
                self.assign_literal_label(literal, Label::Keep);
            } else {
                self.assign_literal_label(literal, Label::Seen);
            }

            self.mark_decision_level_as_allowed(assignments.get_literal_assignment_level(literal));
        }
    }

    fn clean_up(&mut self) {
        quince_assert_simple!(self.current_depth == 0);

        self.allowed_decision_levels.clear();
        self.label_assignments.clear();
    }

    fn is_at_max_allowed_depth(&self) -> bool {
        quince_assert_moderate!(self.current_depth <= 500);
        self.current_depth == 500
    }
}

impl LearnedClauseMinimiser {
    pub fn num_literals_removed_total(&self) -> usize {
        self.num_literals_removed_total
    }

    pub fn num_minimisation_calls(&self) -> usize {
        self.num_minimisation_calls
    }

    pub fn percentage_num_removed_literals_per_clause(&self) -> f64 {
        if self.num_literals_seen_total > 0 {
            self.num_literals_removed_total as f64 / self.num_literals_seen_total as f64
        } else {
            0.0
        }
    }
}

#[derive(PartialEq, Copy, Clone, Debug)]
enum Label {
    /// Present in the original learned clause, not yet classified.
    Seen,
    /// Cannot be removed, and neither can anything that reaches it.
    Poison,
    /// Implied by the remaining literals of the clause.
    Removable,
    /// Must stay in the learned clause.
    Keep,
}
