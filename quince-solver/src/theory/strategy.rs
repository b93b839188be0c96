use enumset::EnumSet;

use super::FormulaProperty;
use crate::containers::KeyedVec;
use crate::containers::StorageKey;

/// Identifies a backend registered with the
/// [`TheoryDispatcher`](super::TheoryDispatcher); ids are handed out in
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId {
    id: u32,
}

impl BackendId {
    /// The id of the `index`-th registered backend. Useful when the strategy
    /// tree is built before the backends are registered.
    pub fn new(index: u32) -> BackendId {
        BackendId { id: index }
    }
}

impl StorageKey for BackendId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        BackendId { id: index as u32 }
    }
}

/// A predicate over the formula property bitset deciding whether a strategy
/// node participates for the current formula.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatingCondition {
    /// Properties the formula must have for the node to apply.
    pub requires: EnumSet<FormulaProperty>,
    /// Properties the formula must not have for the node to apply.
    pub forbids: EnumSet<FormulaProperty>,
}

impl GatingCondition {
    /// The condition that accepts every formula.
    pub fn always() -> GatingCondition {
        GatingCondition::default()
    }

    pub fn applies_to(&self, properties: EnumSet<FormulaProperty>) -> bool {
        properties.is_superset(self.requires) && properties.is_disjoint(self.forbids)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrategyNodeId {
    id: u32,
}

impl StorageKey for StrategyNodeId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        StrategyNodeId { id: index as u32 }
    }
}

#[derive(Debug, Clone)]
struct StrategyNode {
    backend: BackendId,
    condition: GatingCondition,
    /// Deeper composition below this node; how a child tree picks among its
    /// siblings is the business of the backends, not of the search core.
    #[allow(dead_code, reason = "children document the tree shape for embedders")]
    children: Vec<StrategyNodeId>,
}

/// A statically configured tree of backends with gating predicates.
///
/// The tree is plain data: it is built once before search, never mutated
/// afterwards, and contains no executable code. The search core only ever
/// inspects the roots; each root whose gate accepts the formula property
/// set contributes one backend of the module protocol.
#[derive(Debug, Clone, Default)]
pub struct Strategy {
    nodes: KeyedVec<StrategyNodeId, StrategyNode>,
    roots: Vec<StrategyNodeId>,
}

impl Strategy {
    pub fn new() -> Strategy {
        Strategy::default()
    }

    /// A strategy with a single, unconditionally active backend.
    pub fn single_backend(backend: BackendId) -> Strategy {
        let mut strategy = Strategy::new();
        let node = strategy.add_node(backend, GatingCondition::always(), vec![]);
        strategy.add_root(node);
        strategy
    }

    pub fn add_node(
        &mut self,
        backend: BackendId,
        condition: GatingCondition,
        children: Vec<StrategyNodeId>,
    ) -> StrategyNodeId {
        self.nodes.push(StrategyNode {
            backend,
            condition,
            children,
        })
    }

    pub fn add_root(&mut self, node: StrategyNodeId) {
        self.roots.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The backends of the root nodes whose gates accept `properties`, in
    /// root order and without duplicates.
    pub(crate) fn active_backends(&self, properties: EnumSet<FormulaProperty>) -> Vec<BackendId> {
        let mut active = Vec::new();
        for &root in &self.roots {
            let node = &self.nodes[root];
            if node.condition.applies_to(properties) && !active.contains(&node.backend) {
                active.push(node.backend);
            }
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_empty_condition_accepts_everything() {
        let condition = GatingCondition::always();
        assert!(condition.applies_to(EnumSet::empty()));
        assert!(condition.applies_to(FormulaProperty::NonlinearPolynomial.into()));
    }

    #[test]
    fn required_properties_gate_nodes() {
        let condition = GatingCondition {
            requires: FormulaProperty::NonlinearPolynomial.into(),
            forbids: EnumSet::empty(),
        };

        assert!(!condition.applies_to(FormulaProperty::LinearPolynomial.into()));
        assert!(condition.applies_to(
            FormulaProperty::LinearPolynomial | FormulaProperty::NonlinearPolynomial
        ));
    }

    #[test]
    fn forbidden_properties_exclude_nodes() {
        let condition = GatingCondition {
            requires: EnumSet::empty(),
            forbids: FormulaProperty::NonlinearPolynomial.into(),
        };

        assert!(condition.applies_to(FormulaProperty::LinearPolynomial.into()));
        assert!(!condition.applies_to(FormulaProperty::NonlinearPolynomial.into()));
    }

    #[test]
    fn only_gated_roots_contribute_backends() {
        let linear = BackendId::new(0);
        let nonlinear = BackendId::new(1);

        let mut strategy = Strategy::new();
        let linear_node = strategy.add_node(
            linear,
            GatingCondition {
                requires: EnumSet::empty(),
                forbids: FormulaProperty::NonlinearPolynomial.into(),
            },
            vec![],
        );
        let nonlinear_node = strategy.add_node(
            nonlinear,
            GatingCondition {
                requires: FormulaProperty::NonlinearPolynomial.into(),
                forbids: EnumSet::empty(),
            },
            vec![],
        );
        strategy.add_root(linear_node);
        strategy.add_root(nonlinear_node);

        assert_eq!(
            strategy.active_backends(FormulaProperty::LinearPolynomial.into()),
            vec![linear]
        );
        assert_eq!(
            strategy.active_backends(FormulaProperty::NonlinearPolynomial.into()),
            vec![nonlinear]
        );
    }
}
