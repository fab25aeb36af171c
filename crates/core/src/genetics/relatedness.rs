use std::collections::HashSet;

use serde::Serialize;

use super::memo::{MemoEntry, MemoKey, MemoScope, MemoScopeKind, UnitMemo};
use super::paths::PathEnumerator;
use super::pedigree::PedigreeGraph;

/// How path pairs through a common ancestor are combined.
///
/// Both modes count a pair of paths only when the two paths meet at the
/// common ancestor and nowhere else. A pair that meets lower down is already
/// counted through the lower meeting point, whose own inbreeding enters via
/// its `(1 + F_A)` factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathMode {
    /// Weight every pair by `(1 + F_A)`, the common ancestor's own
    /// inbreeding computed recursively. Exact for inbred ancestors.
    #[default]
    FullAccumulation,
    /// Count the path pairs alone (`F_A` taken as zero). Equal to full
    /// accumulation unless a common ancestor is inbred, where it is lower.
    IndependentPaths,
}

/// An individual's own inbreeding, or the marker that the cycle guard fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Computed(f64),
    /// The individual was already being computed further up the stack.
    CycleDetected,
}

impl Outcome {
    /// Numeric value used in path sums. A cycle contributes no inbreeding.
    pub fn value(self) -> f64 {
        match self {
            Outcome::Computed(f) => f,
            Outcome::CycleDetected => 0.0,
        }
    }

    pub fn is_cycle(self) -> bool {
        matches!(self, Outcome::CycleDetected)
    }
}

/// Offspring inbreeding of one pairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub coefficient: f64,
    /// Mode that produced `coefficient`.
    pub mode: PathMode,
    /// Whether any ancestor's inbreeding was short-circuited by the cycle
    /// guard while computing this value.
    pub cycle_detected: bool,
}

/// Wright path-coefficient engine over one [`PedigreeGraph`].
///
/// For parents `p1` and `p2`, the offspring coefficient is
///
///   F = sum over common ancestors A, sum over path pairs (p, q)
///       of 0.5^(n1 + n2 + 1) * (1 + F_A)
///
/// where `p` runs from `p1` up to `A` (`n1` edges), `q` from `p2` up to `A`
/// (`n2` edges), `p` and `q` share no individual other than `A`, and `F_A`
/// is the ancestor's own coefficient, computed recursively with the same
/// rule. [`PathMode::IndependentPaths`] drops the `F_A` term.
///
/// On an acyclic pedigree the full-accumulation value lies in `[0, 1]`.
///
/// The engine mutates its memo and its in-progress guard on every query,
/// so it is used from one thread at a time; independent units each own an
/// engine.
#[derive(Debug)]
pub struct RelatednessEngine<'g> {
    graph: &'g PedigreeGraph,
    paths: PathEnumerator<'g>,
    memo: Box<dyn MemoScope>,
    mode: PathMode,
    /// Individuals whose own coefficient is currently being computed.
    in_progress: HashSet<usize>,
    /// Running count of cycle-guard hits, including tainted memo hits.
    cycle_hits: usize,
}

impl<'g> RelatednessEngine<'g> {
    /// Engine with a fresh per-unit memo.
    pub fn new(graph: &'g PedigreeGraph, mode: PathMode) -> Self {
        Self::with_memo(graph, mode, Box::new(UnitMemo::new()))
    }

    /// Engine writing to the given memo scope.
    pub fn with_memo(graph: &'g PedigreeGraph, mode: PathMode, memo: Box<dyn MemoScope>) -> Self {
        Self {
            graph,
            paths: PathEnumerator::new(graph),
            memo,
            mode,
            in_progress: HashSet::new(),
            cycle_hits: 0,
        }
    }

    /// The pedigree this engine walks.
    pub fn graph(&self) -> &'g PedigreeGraph {
        self.graph
    }

    /// Mode stamped on every [`Estimate`] this engine returns.
    pub fn mode(&self) -> PathMode {
        self.mode
    }

    /// Lifetime of the memo this engine writes to.
    pub fn memo_kind(&self) -> MemoScopeKind {
        self.memo.kind()
    }

    /// Number of memoized entries currently visible to this engine.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Total cycle-guard hits since the engine was created.
    pub fn cycles_detected(&self) -> usize {
        self.cycle_hits
    }

    /// The individual's own inbreeding coefficient: the offspring coefficient
    /// of its sire and dam, or `0.0` unless both are known.
    pub fn inbreeding_of(&mut self, individual: usize) -> Outcome {
        let key = MemoKey::individual(self.graph.id(individual));
        if let Some(entry) = self.memo.get(&key) {
            if entry.cycle_detected {
                self.cycle_hits += 1;
            }
            return Outcome::Computed(entry.value);
        }

        if self.in_progress.contains(&individual) {
            log::warn!(
                "Cycle through '{}' while computing inbreeding; counting it as 0",
                self.graph.id(individual)
            );
            self.cycle_hits += 1;
            return Outcome::CycleDetected;
        }

        self.in_progress.insert(individual);
        let hits_before = self.cycle_hits;

        let value = match (self.graph.sire(individual), self.graph.dam(individual)) {
            (Some(sire), Some(dam)) => self.pair_coefficient(sire, dam),
            _ => 0.0,
        };

        self.in_progress.remove(&individual);
        self.memo.insert(
            key,
            MemoEntry {
                value,
                cycle_detected: self.cycle_hits > hits_before,
            },
        );

        Outcome::Computed(value)
    }

    /// Inbreeding of a hypothetical offspring of `parent1` x `parent2`.
    ///
    /// Returns `0.0` when either parent is unknown. The result does not
    /// depend on argument order.
    pub fn offspring_inbreeding(&mut self, parent1: Option<usize>, parent2: Option<usize>) -> Estimate {
        let (Some(p1), Some(p2)) = (parent1, parent2) else {
            return Estimate {
                coefficient: 0.0,
                mode: self.mode,
                cycle_detected: false,
            };
        };

        let hits_before = self.cycle_hits;
        let coefficient = self.pair_coefficient(p1, p2);

        Estimate {
            coefficient,
            mode: self.mode,
            cycle_detected: self.cycle_hits > hits_before,
        }
    }

    /// Identifier-based variant of [`RelatednessEngine::offspring_inbreeding`].
    /// Identifiers absent from the graph count as unknown parents.
    pub fn offspring_inbreeding_by_id(&mut self, parent1: &str, parent2: &str) -> Estimate {
        let p1 = self.graph.index_of(parent1);
        let p2 = self.graph.index_of(parent2);
        self.offspring_inbreeding(p1, p2)
    }

    fn pair_coefficient(&mut self, a: usize, b: usize) -> f64 {
        // Fix the summation order so (a, b) and (b, a) are bit-identical.
        let (a, b) = if self.graph.id(a) <= self.graph.id(b) {
            (a, b)
        } else {
            (b, a)
        };

        let key = MemoKey::pair(self.graph.id(a), self.graph.id(b));
        if let Some(entry) = self.memo.get(&key) {
            if entry.cycle_detected {
                self.cycle_hits += 1;
            }
            return entry.value;
        }

        let hits_before = self.cycle_hits;
        let closure_a = self.paths.closure_of(a);
        let closure_b = self.paths.closure_of(b);
        let common: Vec<usize> = closure_a
            .iter()
            .copied()
            .filter(|node| closure_b.contains(node))
            .collect();

        let mut total = 0.0;
        for ancestor in common {
            let weight = match self.mode {
                PathMode::FullAccumulation => 1.0 + self.inbreeding_of(ancestor).value(),
                PathMode::IndependentPaths => 1.0,
            };
            let from_a = self.paths.simple_paths(a, ancestor);
            let from_b = self.paths.simple_paths(b, ancestor);

            for p in &from_a {
                for q in &from_b {
                    // Pairs meeting below the ancestor are counted at that
                    // lower meeting point.
                    if !p.is_independent_of(q, ancestor) {
                        continue;
                    }
                    let generations = (p.len() + q.len() + 1) as i32;
                    total += 0.5_f64.powi(generations) * weight;
                }
            }
        }

        self.memo.insert(
            key,
            MemoEntry {
                value: total,
                cycle_detected: self.cycle_hits > hits_before,
            },
        );
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::memo::{NoMemo, SharedMemo};
    use crate::genetics::pedigree::AttachPolicy;
    use crate::genetics::records::{AncestorRecord, AncestorSlot};

    fn graph_of(records: &[AncestorRecord]) -> PedigreeGraph {
        PedigreeGraph::from_records(records, AttachPolicy::FirstWins)
    }

    /// Assert two f64 values are approximately equal.
    fn assert_approx(actual: f64, expected: f64, msg: &str) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "{}: expected {}, got {}",
            msg,
            expected,
            actual
        );
    }

    /// P1 and P2 are full sibs out of founders S x D.
    fn full_sibs() -> Vec<AncestorRecord> {
        vec![
            AncestorRecord::new("P1").with_parents("S", "D"),
            AncestorRecord::new("P2").with_parents("S", "D"),
        ]
    }

    /// H1 and H2 share sire A; dams M1 and M2 are unrelated founders.
    fn half_sibs() -> Vec<AncestorRecord> {
        vec![
            AncestorRecord::new("H1").with_parents("A", "M1"),
            AncestorRecord::new("H2").with_parents("A", "M2"),
        ]
    }

    /// Half sibs H1, H2 by sire A, where A itself is out of full sibs
    /// P1 x P2 (F_A = 0.25).
    fn half_sibs_by_inbred_sire() -> Vec<AncestorRecord> {
        let mut records = vec![AncestorRecord::new("A")
            .with_parents("P1", "P2")
            .with(AncestorSlot::SireSire, "S")
            .with(AncestorSlot::SireDam, "D")
            .with(AncestorSlot::DamSire, "S")
            .with(AncestorSlot::DamDam, "D")];
        records.extend(half_sibs());
        records
    }

    /// Record for `id` out of `sire` x `dam`, with every grandparent and
    /// great-grandparent slot filled. Ancestors are named after the parent
    /// they descend through (`S_D` is the sire's dam), so records sharing a
    /// parent share that parent's whole ancestry.
    fn deep_record(id: &str, sire: &str, dam: &str) -> AncestorRecord {
        let mut record = AncestorRecord::new(id).with_parents(sire, dam);
        for slot in &AncestorSlot::ALL[3..] {
            let (side, rest) = slot.code().split_at(1);
            let owner = if side == "S" { sire } else { dam };
            record = record.with(*slot, &format!("{}_{}", owner, rest));
        }
        record
    }

    /// A1, B1 are full sibs out of founders S x D; Ak, Bk are full sibs
    /// out of A(k-1) x B(k-1).
    fn full_sib_chain(generations: usize) -> Vec<AncestorRecord> {
        let mut records = vec![
            AncestorRecord::new("A1").with_parents("S", "D"),
            AncestorRecord::new("B1").with_parents("S", "D"),
        ];
        for k in 2..=generations {
            let (sire, dam) = (format!("A{}", k - 1), format!("B{}", k - 1));
            records.push(AncestorRecord::new(&format!("A{}", k)).with_parents(&sire, &dam));
            records.push(AncestorRecord::new(&format!("B{}", k)).with_parents(&sire, &dam));
        }
        records
    }

    #[test]
    fn test_unrelated_pair_is_zero() {
        let graph = graph_of(&[
            AncestorRecord::new("X").with_parents("S1", "D1"),
            AncestorRecord::new("Y").with_parents("S2", "D2"),
        ]);
        let mut engine = RelatednessEngine::new(&graph, PathMode::FullAccumulation);
        let estimate = engine.offspring_inbreeding_by_id("X", "Y");
        assert_eq!(estimate.coefficient, 0.0);
        assert!(!estimate.cycle_detected);
    }

    #[test]
    fn test_full_sib_mating() {
        let graph = graph_of(&full_sibs());
        for mode in [PathMode::FullAccumulation, PathMode::IndependentPaths] {
            let mut engine = RelatednessEngine::new(&graph, mode);
            let estimate = engine.offspring_inbreeding_by_id("P1", "P2");
            assert_approx(estimate.coefficient, 0.25, "full sibs");
            assert_eq!(estimate.mode, mode);
        }
    }

    #[test]
    fn test_half_sib_mating() {
        let graph = graph_of(&half_sibs());
        let mut engine = RelatednessEngine::new(&graph, PathMode::FullAccumulation);
        assert_approx(
            engine.offspring_inbreeding_by_id("H1", "H2").coefficient,
            0.125,
            "half sibs",
        );
    }

    #[test]
    fn test_parent_offspring_mating() {
        let graph = graph_of(&[AncestorRecord::new("C").with_parents("F", "M")]);
        let mut engine = RelatednessEngine::new(&graph, PathMode::IndependentPaths);
        assert_approx(
            engine.offspring_inbreeding_by_id("C", "F").coefficient,
            0.25,
            "parent x offspring",
        );
    }

    #[test]
    fn test_order_independent() {
        let graph = graph_of(&half_sibs_by_inbred_sire());
        let mut engine = RelatednessEngine::with_memo(&graph, PathMode::FullAccumulation, Box::new(NoMemo));
        let ab = engine.offspring_inbreeding_by_id("H1", "H2");
        let ba = engine.offspring_inbreeding_by_id("H2", "H1");
        assert_eq!(ab.coefficient.to_bits(), ba.coefficient.to_bits());
    }

    #[test]
    fn test_unknown_parent_is_zero() {
        let graph = graph_of(&full_sibs());
        let mut engine = RelatednessEngine::new(&graph, PathMode::FullAccumulation);
        let p1 = graph.index_of("P1");
        assert_eq!(engine.offspring_inbreeding(p1, None).coefficient, 0.0);
        assert_eq!(engine.offspring_inbreeding(None, p1).coefficient, 0.0);
        assert_eq!(engine.offspring_inbreeding_by_id("P1", "nobody").coefficient, 0.0);
        assert_eq!(engine.offspring_inbreeding_by_id("P1", "NA").coefficient, 0.0);
    }

    #[test]
    fn test_own_inbreeding() {
        let graph = graph_of(&half_sibs_by_inbred_sire());
        let mut engine = RelatednessEngine::new(&graph, PathMode::FullAccumulation);

        let a = graph.index_of("A").unwrap();
        assert_eq!(engine.inbreeding_of(a), Outcome::Computed(0.25));

        // Founders and half-known individuals are not inbred.
        let s = graph.index_of("S").unwrap();
        assert_eq!(engine.inbreeding_of(s), Outcome::Computed(0.0));
        let h1 = graph.index_of("H1").unwrap();
        assert_eq!(engine.inbreeding_of(h1), Outcome::Computed(0.0));
    }

    #[test]
    fn test_inbred_common_ancestor_modes() {
        let graph = graph_of(&half_sibs_by_inbred_sire());

        let mut independent = RelatednessEngine::new(&graph, PathMode::IndependentPaths);
        let mut full = RelatednessEngine::new(&graph, PathMode::FullAccumulation);

        let f_independent = independent.offspring_inbreeding_by_id("H1", "H2").coefficient;
        let f_full = full.offspring_inbreeding_by_id("H1", "H2").coefficient;

        // Only H1-A-H2 meets at a single point: 0.5^3.
        assert_approx(f_independent, 0.125, "independent paths");
        // Same pair weighted by A's own inbreeding: 0.5^3 * (1 + 0.25).
        assert_approx(f_full, 0.15625, "full accumulation");
        assert!(f_full > f_independent);
    }

    #[test]
    fn test_sib_matings_with_recorded_ancestry() {
        let full_sibs = graph_of(&[deep_record("P1", "S", "D"), deep_record("P2", "S", "D")]);
        let half_sibs = graph_of(&[deep_record("H1", "A", "M1"), deep_record("H2", "A", "M2")]);
        assert_eq!(full_sibs.n_individuals(), 2 + 2 + 4 + 8);

        for mode in [PathMode::FullAccumulation, PathMode::IndependentPaths] {
            let mut engine = RelatednessEngine::new(&full_sibs, mode);
            assert_approx(
                engine.offspring_inbreeding_by_id("P1", "P2").coefficient,
                0.25,
                "full sibs with grandparents",
            );

            let mut engine = RelatednessEngine::new(&half_sibs, mode);
            assert_approx(
                engine.offspring_inbreeding_by_id("H1", "H2").coefficient,
                0.125,
                "half sibs with grandparents",
            );
        }
    }

    #[test]
    fn test_parent_offspring_with_recorded_ancestry() {
        // F's ancestors are known, so every path to them runs through F on
        // both sides.
        let graph = graph_of(&[deep_record("C", "F", "M")]);
        let mut engine = RelatednessEngine::new(&graph, PathMode::FullAccumulation);
        assert_approx(
            engine.offspring_inbreeding_by_id("C", "F").coefficient,
            0.25,
            "parent x offspring",
        );
    }

    #[test]
    fn test_parent_reached_through_another_common_ancestor() {
        // X = B x N and Y = A x C with B = A x M1 and C = B x M2. A reaches X
        // through B, yet X-B-A and Y-A still meet only at A.
        let graph = graph_of(&[
            AncestorRecord::new("X").with_parents("B", "N"),
            AncestorRecord::new("Y").with_parents("A", "C"),
            AncestorRecord::new("B").with_parents("A", "M1"),
            AncestorRecord::new("C").with_parents("B", "M2"),
        ]);
        for mode in [PathMode::FullAccumulation, PathMode::IndependentPaths] {
            let mut engine = RelatednessEngine::new(&graph, mode);
            // B: 0.5^4, A: 0.5^4.
            assert_approx(
                engine.offspring_inbreeding_by_id("X", "Y").coefficient,
                0.125,
                "ancestor behind another common ancestor",
            );
        }
    }

    #[test]
    fn test_repeated_full_sib_mating_stays_bounded() {
        let generations = 8;
        let graph = graph_of(&full_sib_chain(generations));
        let mut full = RelatednessEngine::new(&graph, PathMode::FullAccumulation);
        let mut independent = RelatednessEngine::new(&graph, PathMode::IndependentPaths);

        // F_t = (1 + 2 F_(t-1) + F_(t-2)) / 4 for repeated full-sib mating.
        let (mut older, mut previous) = (0.0, 0.0);
        for k in 1..=generations {
            let expected = 0.25 * (1.0 + 2.0 * previous + older);
            let (a, b) = (format!("A{}", k), format!("B{}", k));

            let f_full = full.offspring_inbreeding_by_id(&a, &b).coefficient;
            let f_independent = independent.offspring_inbreeding_by_id(&a, &b).coefficient;

            assert_approx(f_full, expected, &format!("generation {}", k));
            assert!((0.0..=1.0).contains(&f_full));
            assert!((0.0..=1.0).contains(&f_independent));
            if k <= 2 {
                // No common ancestor is inbred yet.
                assert_approx(f_independent, f_full, &format!("generation {}", k));
            } else {
                assert!(f_independent < f_full, "generation {}", k);
            }

            older = previous;
            previous = expected;
        }
        assert_eq!(full.cycles_detected(), 0);
    }

    #[test]
    fn test_memo_scopes_agree() {
        let graph = graph_of(&half_sibs_by_inbred_sire());
        let pairs = [("H1", "H2"), ("H2", "H1"), ("P1", "P2"), ("A", "M1"), ("H1", "A")];

        for mode in [PathMode::FullAccumulation, PathMode::IndependentPaths] {
            let mut uncached = RelatednessEngine::with_memo(&graph, mode, Box::new(NoMemo));
            let mut unit = RelatednessEngine::with_memo(&graph, mode, Box::new(UnitMemo::new()));
            let mut shared = RelatednessEngine::with_memo(&graph, mode, Box::new(SharedMemo::new()));

            for (x, y) in pairs {
                let expected = uncached.offspring_inbreeding_by_id(x, y).coefficient;
                assert_eq!(unit.offspring_inbreeding_by_id(x, y).coefficient.to_bits(), expected.to_bits());
                assert_eq!(shared.offspring_inbreeding_by_id(x, y).coefficient.to_bits(), expected.to_bits());
            }
            assert_eq!(uncached.memo_len(), 0);
            assert!(unit.memo_len() > 0);
            assert_eq!(shared.memo_kind(), MemoScopeKind::ProcessWide);
        }
    }

    #[test]
    fn test_cycle_is_flagged_not_raised() {
        // A's parents B and C both list A as their sire.
        let graph = graph_of(&[
            AncestorRecord::new("A").with_parents("B", "C"),
            AncestorRecord::new("B").with(AncestorSlot::Sire, "A"),
            AncestorRecord::new("C").with(AncestorSlot::Sire, "A"),
        ]);
        assert!(graph.has_cycle());

        let memos: Vec<Box<dyn MemoScope>> = vec![Box::new(NoMemo), Box::new(UnitMemo::new())];
        for memo in memos {
            let mut engine = RelatednessEngine::with_memo(&graph, PathMode::FullAccumulation, memo);
            let estimate = engine.offspring_inbreeding_by_id("B", "C");
            assert!(estimate.cycle_detected);
            assert!(estimate.coefficient.is_finite());
            assert!(engine.cycles_detected() > 0);
        }
    }

    #[test]
    fn test_acyclic_never_flags_cycle() {
        let graph = graph_of(&half_sibs_by_inbred_sire());
        let mut engine = RelatednessEngine::new(&graph, PathMode::FullAccumulation);
        assert!(!engine.offspring_inbreeding_by_id("H1", "H2").cycle_detected);
        assert_eq!(engine.cycles_detected(), 0);
    }

    #[test]
    fn test_cycle_outcome_value() {
        assert_eq!(Outcome::CycleDetected.value(), 0.0);
        assert!(Outcome::CycleDetected.is_cycle());
        assert!(!Outcome::Computed(0.0).is_cycle());
    }
}
