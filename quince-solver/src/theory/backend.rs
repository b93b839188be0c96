use downcast_rs::impl_downcast;
use downcast_rs::Downcast;
use fnv::FnvHashMap;

use super::Atom;
use super::AtomData;
use super::Origin;

/// The answer of a backend to a consistency check.
///
/// An [`TheoryVerdict::Unknown`] answer degrades only the current branch of
/// the search; it must never be conflated with [`TheoryVerdict::Inconsistent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TheoryVerdict {
    /// The asserted atoms are jointly satisfiable in the theory.
    Consistent,
    /// The asserted atoms are jointly unsatisfiable; infeasible subsets are
    /// available.
    Inconsistent,
    /// The backend cannot decide the current atom set.
    Unknown,
}

impl std::fmt::Display for TheoryVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TheoryVerdict::Consistent => write!(f, "consistent"),
            TheoryVerdict::Inconsistent => write!(f, "inconsistent"),
            TheoryVerdict::Unknown => write!(f, "unknown"),
        }
    }
}

/// An atom or its negation, as used in theory lemmas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomLiteral {
    pub atom: Atom,
    pub is_positive: bool,
}

impl AtomLiteral {
    pub fn positive(atom: Atom) -> AtomLiteral {
        AtomLiteral {
            atom,
            is_positive: true,
        }
    }

    pub fn negative(atom: Atom) -> AtomLiteral {
        AtomLiteral {
            atom,
            is_positive: false,
        }
    }
}

/// A theory-valid disjunction of atom literals, produced by a backend and
/// turned into a stored clause by the dispatcher ("theory propagation").
#[derive(Debug, Clone)]
pub struct TheoryLemma {
    literals: Vec<AtomLiteral>,
}

impl TheoryLemma {
    pub fn new(literals: Vec<AtomLiteral>) -> TheoryLemma {
        TheoryLemma { literals }
    }

    pub fn literals(&self) -> &[AtomLiteral] {
        &self.literals
    }
}

/// A set of asserted atoms whose conjunction a backend proved unsatisfiable.
///
/// The atoms are listed without duplicates; their origins provide the
/// user-level provenance of the conflict.
pub type InfeasibleSubset = Vec<Atom>;

/// A value assigned to a theory variable in a satisfying model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValue {
    Bool(bool),
    Integer(i64),
    Rational { numerator: i64, denominator: u64 },
}

/// A theory-variable assignment populated by backends after a
/// [`TheoryVerdict::Consistent`] answer. The model is copied out of the
/// backend, it never aliases backend internals.
#[derive(Debug, Clone, Default)]
pub struct TheoryModel {
    values: FnvHashMap<Box<str>, ModelValue>,
}

impl TheoryModel {
    pub fn assign(&mut self, variable: &str, value: ModelValue) {
        let _ = self.values.insert(variable.into(), value);
    }

    pub fn value_of(&self, variable: &str) -> Option<&ModelValue> {
        self.values.get(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelValue)> {
        self.values.iter().map(|(name, value)| (&**name, value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// A pluggable theory decision procedure.
///
/// Backends receive atoms incrementally and answer consistency checks for
/// the conjunction of the currently asserted atoms. The dispatcher
/// guarantees the calling discipline: [`TheoryBackend::inform`] happens once
/// per atom before its first assert, retracts only ever name previously
/// asserted atoms (retracting anything else must be a no-op), and
/// [`TheoryBackend::infeasible_subsets`] is read only immediately after an
/// [`TheoryVerdict::Inconsistent`] answer.
///
/// The trait supports downcasting so that an embedder can recover a concrete
/// backend after solving, e.g. to inspect theory-specific state.
pub trait TheoryBackend: Downcast {
    /// A short name used for logging.
    fn name(&self) -> &str;

    /// Pre-registers an atom before its first use. Returning `false` states
    /// that the atom is trivially inconsistent on its own.
    fn inform(&mut self, _atom: Atom, _data: &AtomData) -> bool {
        true
    }

    /// Asserts an atom with its provenance; atoms introduced through theory
    /// lemmas carry no user-level origin. Returning `false` signals that the
    /// assertion is immediately conflicting; the answer is advisory and the
    /// next [`TheoryBackend::check`] remains authoritative.
    fn assert_atom(&mut self, atom: Atom, origin: Option<Origin>) -> bool;

    /// Retracts a previously asserted atom and everything derived solely
    /// from it. Retracting an atom that was never asserted is a no-op.
    fn retract_atom(&mut self, atom: Atom);

    /// Decides the conjunction of the currently asserted atoms. With
    /// `full = false` the backend is permitted to answer
    /// [`TheoryVerdict::Unknown`] instead of doing expensive work.
    fn check(&mut self, full: bool) -> TheoryVerdict;

    /// The infeasible subsets proving the last
    /// [`TheoryVerdict::Inconsistent`] answer. Each subset is a minimal set
    /// of asserted atoms whose conjunction is unsatisfiable.
    fn infeasible_subsets(&self) -> &[InfeasibleSubset];

    /// Theory-propagated lemmas; consumed once and then cleared.
    fn take_lemmas(&mut self) -> Vec<TheoryLemma> {
        Vec::new()
    }

    /// Populates the theory-variable assignment; valid only after a
    /// [`TheoryVerdict::Consistent`] answer.
    fn update_model(&mut self, _model: &mut TheoryModel) {}
}

impl_downcast!(TheoryBackend);
