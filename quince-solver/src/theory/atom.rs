use enumset::EnumSet;
use enumset::EnumSetType;
use fnv::FnvHashMap;

use crate::containers::KeyedVec;
use crate::containers::StorageKey;

/// A theory atom, interned in the [`AtomPool`].
///
/// The kernel treats atoms as opaque: their meaning lives in the theory
/// backends. Two atoms are the same entity exactly when their canonical
/// forms coincide, which makes equality and hashing O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    id: u32,
}

impl StorageKey for Atom {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        Atom { id: index as u32 }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atom{}", self.id)
    }
}

/// Provenance of an atom: the user-level formula it was produced from.
/// Origins are interned like atoms and referenced by index, so origin sets
/// carry no ownership of the formulas themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin {
    id: u32,
}

impl StorageKey for Origin {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        Origin { id: index as u32 }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "origin{}", self.id)
    }
}

/// Structural properties of atoms, aggregated over the whole formula and
/// used by the strategy gates to decide which backends participate.
#[derive(EnumSetType, Debug)]
pub enum FormulaProperty {
    LinearPolynomial,
    NonlinearPolynomial,
    IntegerVariables,
    RealVariables,
    Equations,
    Inequalities,
}

/// The interned payload of an atom: its canonical textual form plus its
/// structural properties.
#[derive(Debug, Clone)]
pub struct AtomData {
    name: Box<str>,
    properties: EnumSet<FormulaProperty>,
}

impl AtomData {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> EnumSet<FormulaProperty> {
        self.properties
    }
}

/// Hash-consing pool for atoms and origins.
///
/// Interning the same canonical form twice yields the same [`Atom`]; the
/// properties of repeated interns are merged. The pool also maintains the
/// union of all atom properties, which is the property set the strategy
/// gates are evaluated against.
#[derive(Debug, Default)]
pub struct AtomPool {
    atom_data: KeyedVec<Atom, AtomData>,
    atom_ids: FnvHashMap<Box<str>, Atom>,
    origin_names: KeyedVec<Origin, Box<str>>,
    origin_ids: FnvHashMap<Box<str>, Origin>,
    formula_properties: EnumSet<FormulaProperty>,
}

impl AtomPool {
    pub fn intern_atom(
        &mut self,
        canonical_form: &str,
        properties: EnumSet<FormulaProperty>,
    ) -> Atom {
        self.formula_properties |= properties;

        if let Some(&atom) = self.atom_ids.get(canonical_form) {
            self.atom_data[atom].properties |= properties;
            return atom;
        }

        let atom = self.atom_data.push(AtomData {
            name: canonical_form.into(),
            properties,
        });
        let _ = self.atom_ids.insert(canonical_form.into(), atom);
        atom
    }

    pub fn get_atom(&self, canonical_form: &str) -> Option<Atom> {
        self.atom_ids.get(canonical_form).copied()
    }

    pub fn atom_data(&self, atom: Atom) -> &AtomData {
        &self.atom_data[atom]
    }

    pub fn num_atoms(&self) -> usize {
        self.atom_data.len()
    }

    pub fn intern_origin(&mut self, name: &str) -> Origin {
        if let Some(&origin) = self.origin_ids.get(name) {
            return origin;
        }

        let origin = self.origin_names.push(name.into());
        let _ = self.origin_ids.insert(name.into(), origin);
        origin
    }

    pub fn origin_name(&self, origin: Origin) -> &str {
        &self.origin_names[origin]
    }

    /// The union of the properties of every interned atom.
    pub fn formula_properties(&self) -> EnumSet<FormulaProperty> {
        self.formula_properties
    }
}
