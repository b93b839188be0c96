use super::Clause;
use super::ClauseKind;
use crate::basic_types::ClauseReference;
use crate::basic_types::Literal;
use crate::quince_assert_moderate;
use crate::quince_assert_simple;

/// Arena storage for clauses, addressed through opaque [`ClauseReference`]s.
///
/// Deletion is lazy: a deleted clause only has its mark set and its space
/// accounted as wasted. Reclamation happens through [`ClauseAllocator::relocate`],
/// which compacts the storage into fresh slots and reports the old-to-new
/// reference mapping. Every component holding references must be rewritten
/// through that mapping before the allocator is used again; the solver owns
/// the single entry point that does so for all holders at once.
#[derive(Default, Debug)]
pub struct ClauseAllocator {
    allocated_clauses: Vec<Clause>,
    num_deleted_clauses: usize,
    /// Literal storage held by deleted clauses, used to decide when a
    /// relocation pass pays off.
    wasted_literal_space: usize,
    total_literal_space: usize,
}

impl ClauseAllocator {
    pub(crate) fn create_clause(
        &mut self,
        literals: Vec<Literal>,
        kind: ClauseKind,
    ) -> ClauseReference {
        quince_assert_simple!(literals.len() >= 2);

        // Clause identifiers start at one, keeping zero as a sentinel that
        // is never handed out.
        let clause_reference =
            ClauseReference::create_allocated_clause_reference(self.allocated_clauses.len() as u32 + 1);

        self.total_literal_space += literals.len();
        self.allocated_clauses.push(Clause::new(literals, kind));

        clause_reference
    }

    pub(crate) fn get_clause(&self, clause_reference: ClauseReference) -> &Clause {
        let clause = &self.allocated_clauses[clause_reference.get_index()];
        quince_assert_moderate!(
            !clause.is_deleted(),
            "Dereferencing a reference to a deleted clause."
        );
        clause
    }

    pub(crate) fn get_mutable_clause(&mut self, clause_reference: ClauseReference) -> &mut Clause {
        let clause = &mut self.allocated_clauses[clause_reference.get_index()];
        quince_assert_moderate!(
            !clause.is_deleted(),
            "Dereferencing a reference to a deleted clause."
        );
        clause
    }

    /// Marks the clause as deleted; the slot is reclaimed by the next
    /// relocation pass.
    pub(crate) fn delete_clause(&mut self, clause_reference: ClauseReference) {
        let clause = &mut self.allocated_clauses[clause_reference.get_index()];
        quince_assert_moderate!(!clause.is_deleted(), "Cannot delete an already deleted clause.");

        self.wasted_literal_space += clause.get_literal_slice().len();
        self.num_deleted_clauses += 1;
        clause.mark_deleted();
    }

    /// Whether the slot of the reference holds a deleted clause. Unlike the
    /// dereference operations this is allowed on dead references.
    pub(crate) fn is_clause_deleted(&self, clause_reference: ClauseReference) -> bool {
        self.allocated_clauses[clause_reference.get_index()].is_deleted()
    }

    pub(crate) fn num_live_clauses(&self) -> usize {
        self.allocated_clauses.len() - self.num_deleted_clauses
    }

    /// The fraction of literal storage currently held by deleted clauses.
    pub(crate) fn wasted_ratio(&self) -> f64 {
        if self.total_literal_space == 0 {
            0.0
        } else {
            self.wasted_literal_space as f64 / self.total_literal_space as f64
        }
    }

    /// References to all live clauses, in storage order.
    pub(crate) fn clause_references(&self) -> impl Iterator<Item = ClauseReference> + '_ {
        self.allocated_clauses
            .iter()
            .enumerate()
            .filter(|(_, clause)| !clause.is_deleted())
            .map(|(index, _)| ClauseReference::create_allocated_clause_reference(index as u32 + 1))
    }

    /// Compacts the storage by copying all live clauses into fresh slots.
    ///
    /// Returns the mapping from old references to new ones. The caller is
    /// responsible for rewriting every held reference through the map in one
    /// bulk operation; the old references are invalid the moment this
    /// returns.
    pub(crate) fn relocate(&mut self) -> ClauseRelocationMap {
        let old_clauses = std::mem::take(&mut self.allocated_clauses);
        self.num_deleted_clauses = 0;
        self.wasted_literal_space = 0;
        self.total_literal_space = 0;

        let mut new_references = vec![None; old_clauses.len()];
        for (old_index, clause) in old_clauses.into_iter().enumerate() {
            if clause.is_deleted() {
                continue;
            }

            let new_reference = ClauseReference::create_allocated_clause_reference(
                self.allocated_clauses.len() as u32 + 1,
            );
            self.total_literal_space += clause.get_literal_slice().len();
            self.allocated_clauses.push(clause);
            new_references[old_index] = Some(new_reference);
        }

        ClauseRelocationMap { new_references }
    }
}

impl std::ops::Index<ClauseReference> for ClauseAllocator {
    type Output = Clause;
    fn index(&self, clause_reference: ClauseReference) -> &Clause {
        self.get_clause(clause_reference)
    }
}

impl std::ops::IndexMut<ClauseReference> for ClauseAllocator {
    fn index_mut(&mut self, clause_reference: ClauseReference) -> &mut Clause {
        self.get_mutable_clause(clause_reference)
    }
}

impl std::fmt::Display for ClauseAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clauses_string = self
            .allocated_clauses
            .iter()
            .filter(|clause| !clause.is_deleted())
            .fold(String::new(), |acc, clause| format!("{acc}{clause}\n"));

        let num_clauses = self.num_live_clauses();
        write!(f, "Num clauses: {num_clauses}\n{clauses_string}")
    }
}

/// The old-to-new reference mapping produced by a relocation pass.
#[derive(Debug)]
pub(crate) struct ClauseRelocationMap {
    new_references: Vec<Option<ClauseReference>>,
}

impl ClauseRelocationMap {
    /// The relocated counterpart of an old reference. Asking for a clause
    /// that was deleted before the relocation is a programmer error: holders
    /// must drop dead references before the storage is compacted.
    pub(crate) fn get(&self, old_reference: ClauseReference) -> ClauseReference {
        self.new_references[old_reference.get_index()]
            .expect("Relocating a reference to a deleted clause.")
    }
}
