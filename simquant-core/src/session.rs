//! Review session: the toggle state machine the embedded engine runs
//!
//! Each scan is `included` (initial) or `excluded`; a toggle flips it and
//! fully recomputes every aggregate in the scan's impact list over the
//! currently included members. The embedded script implements the same
//! transitions; this type is the reference used by the renderer for
//! recomputed initial values and by the tests.

use crate::graph::DependencyGraph;
use crate::hierarchy::{Hierarchy, ScanIdx};
use crate::index::AggregateRef;
use crate::stats::Aggregate;

/// One [`Aggregate`] per spot, peptide and protein
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTable {
    spots: Vec<Aggregate>,
    peptides: Vec<Aggregate>,
    proteins: Vec<Aggregate>,
}

impl AggregateTable {
    /// Every node set to the sentinel
    pub fn empty(hierarchy: &Hierarchy) -> Self {
        AggregateTable {
            spots: vec![Aggregate::NO_DATA; hierarchy.spots.len()],
            peptides: vec![Aggregate::NO_DATA; hierarchy.peptides.len()],
            proteins: vec![Aggregate::NO_DATA; hierarchy.proteins.len()],
        }
    }

    /// Producer `mergedResults` of every node
    pub fn baseline(hierarchy: &Hierarchy) -> Self {
        AggregateTable {
            spots: hierarchy.spots.iter().map(|s| s.baseline).collect(),
            peptides: hierarchy.peptides.iter().map(|p| p.baseline).collect(),
            proteins: hierarchy.proteins.iter().map(|p| p.baseline).collect(),
        }
    }

    /// Every node recomputed with all scans included
    pub fn recomputed(hierarchy: &Hierarchy, graph: &DependencyGraph) -> Self {
        ReviewSession::recomputed_baseline(hierarchy, graph)
    }

    pub fn get(&self, agg: AggregateRef) -> Aggregate {
        match agg {
            AggregateRef::Spot(i) => self.spots[i.index()],
            AggregateRef::Peptide(i) => self.peptides[i.index()],
            AggregateRef::Protein(i) => self.proteins[i.index()],
        }
    }

    fn get_mut(&mut self, agg: AggregateRef) -> &mut Aggregate {
        match agg {
            AggregateRef::Spot(i) => &mut self.spots[i.index()],
            AggregateRef::Peptide(i) => &mut self.peptides[i.index()],
            AggregateRef::Protein(i) => &mut self.proteins[i.index()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewSession<'a> {
    hierarchy: &'a Hierarchy,
    graph: &'a DependencyGraph,
    included: Vec<bool>,
    displayed: AggregateTable,
}

impl<'a> ReviewSession<'a> {
    /// Start with every scan included and every aggregate recomputed
    pub fn new(hierarchy: &'a Hierarchy, graph: &'a DependencyGraph) -> Self {
        let mut session = ReviewSession {
            hierarchy,
            graph,
            included: vec![true; hierarchy.scans.len()],
            displayed: AggregateTable::empty(hierarchy),
        };
        for agg in graph.aggregates() {
            let value = session.expected(agg);
            *session.displayed.get_mut(agg) = value;
        }
        session
    }

    /// Aggregates of a fresh session, before any toggle
    pub fn recomputed_baseline(hierarchy: &Hierarchy, graph: &DependencyGraph) -> AggregateTable {
        ReviewSession::new(hierarchy, graph).displayed
    }

    /// Flip one scan and recompute its impacted aggregates.
    ///
    /// Returns the aggregates that were recomputed.
    pub fn toggle(&mut self, scan: ScanIdx) -> &'a [AggregateRef] {
        let flag = &mut self.included[scan.index()];
        *flag = !*flag;
        let impacted = self.graph.impact(scan);
        for &agg in impacted {
            let value = self.expected(agg);
            *self.displayed.get_mut(agg) = value;
        }
        impacted
    }

    pub fn is_included(&self, scan: ScanIdx) -> bool {
        self.included[scan.index()]
    }

    /// Currently displayed value of an aggregate
    pub fn displayed(&self, agg: AggregateRef) -> Aggregate {
        self.displayed.get(agg)
    }

    /// Fresh recompute over the included members of an aggregate
    pub fn expected(&self, agg: AggregateRef) -> Aggregate {
        Aggregate::from_measurements(
            self.graph
                .membership(agg)
                .iter()
                .filter(|scan| self.included[scan.index()])
                .map(|&scan| {
                    let s = self.hierarchy.scan(scan);
                    (s.ratio, s.snr)
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{PeptideIdx, ProteinIdx, SpotIdx};
    use crate::results::parse_results_json;

    const MERGED: &str =
        r#""mergedResults": {"ratioMean": 2, "ratioStdDev": 1, "snrMean": 6, "snrStdDev": 1}"#;

    fn scenario() -> Hierarchy {
        let json = format!(
            r#"{{"peptideResults": {{"PEP1": {{"spots": {{"S1": {{"scanResults": [
                {{"id": "A", "charge": 2, "ratio": 1.0, "snr": 5.0, "retentionTime": 1.0}},
                {{"id": "B", "charge": 2, "ratio": 3.0, "snr": 7.0, "retentionTime": 2.0}}
            ], {MERGED}}}}}, {MERGED}}}}},
            "proteinResults": {{"P": {{"peptides": ["PEP1"], {MERGED}}}}}}}"#
        );
        Hierarchy::from_results(&parse_results_json(&json).unwrap()).unwrap()
    }

    const LEVELS: [AggregateRef; 3] = [
        AggregateRef::Spot(SpotIdx(0)),
        AggregateRef::Peptide(PeptideIdx(0)),
        AggregateRef::Protein(ProteinIdx(0)),
    ];

    #[test]
    fn test_exclude_and_reinclude_scan_b() {
        let h = scenario();
        let graph = DependencyGraph::build(&h);
        let mut session = ReviewSession::new(&h, &graph);

        let initial = Aggregate {
            ratio_mean: Some(2.0),
            ratio_std_dev: Some(1.0),
            snr_mean: Some(6.0),
            snr_std_dev: Some(1.0),
        };
        for agg in LEVELS {
            assert_eq!(session.displayed(agg), initial);
        }

        let touched = session.toggle(ScanIdx(1));
        assert_eq!(touched, &LEVELS);
        assert!(!session.is_included(ScanIdx(1)));
        let excluded = Aggregate {
            ratio_mean: Some(1.0),
            ratio_std_dev: Some(0.0),
            snr_mean: Some(5.0),
            snr_std_dev: Some(0.0),
        };
        for agg in LEVELS {
            assert_eq!(session.displayed(agg), excluded);
        }

        session.toggle(ScanIdx(1));
        assert!(session.is_included(ScanIdx(1)));
        for agg in LEVELS {
            assert_eq!(session.displayed(agg), initial);
        }
    }

    #[test]
    fn test_all_excluded_shows_sentinel() {
        let h = scenario();
        let graph = DependencyGraph::build(&h);
        let mut session = ReviewSession::new(&h, &graph);
        session.toggle(ScanIdx(0));
        session.toggle(ScanIdx(1));
        for agg in LEVELS {
            assert!(session.displayed(agg).is_no_data());
        }
    }

    #[test]
    fn test_recomputed_baseline_matches_producer() {
        let h = scenario();
        let graph = DependencyGraph::build(&h);
        let recomputed = AggregateTable::recomputed(&h, &graph);
        let baseline = AggregateTable::baseline(&h);
        for agg in graph.aggregates() {
            assert!(
                recomputed.get(agg).approx_eq(&baseline.get(agg), 1e-9),
                "{:?}",
                agg
            );
        }
    }

    mod props {
        use super::*;
        use crate::results::parse_results_json;
        use proptest::prelude::*;
        use serde_json::{json, Map, Value};

        /// `(ratio, snr, spot)` scans; spot `s` belongs to peptide `PEP{s % 2}`
        /// and only `PEP0` is assigned to a protein
        fn build(scans: &[(f64, f64, usize)]) -> Hierarchy {
            let merged = json!({"ratioMean": 0, "ratioStdDev": 0, "snrMean": 0, "snrStdDev": 0});
            let mut peptides = Map::new();
            for (i, &(ratio, snr, spot)) in scans.iter().enumerate() {
                let peptide = peptides
                    .entry(format!("PEP{}", spot % 2))
                    .or_insert_with(|| json!({"spots": {}, "mergedResults": merged}));
                let spot_entry = peptide["spots"]
                    .as_object_mut()
                    .unwrap()
                    .entry(format!("S{}", spot))
                    .or_insert_with(|| json!({"scanResults": [], "mergedResults": merged}));
                spot_entry["scanResults"].as_array_mut().unwrap().push(json!({
                    "id": i, "charge": 2, "ratio": ratio, "snr": snr, "retentionTime": i
                }));
            }
            let proteins = if peptides.contains_key("PEP0") {
                json!({"P": {"peptides": ["PEP0"], "mergedResults": merged}})
            } else {
                json!({})
            };
            let doc = json!({"peptideResults": Value::Object(peptides), "proteinResults": proteins});
            Hierarchy::from_results(&parse_results_json(&doc.to_string()).unwrap()).unwrap()
        }

        fn scans() -> impl Strategy<Value = Vec<(f64, f64, usize)>> {
            prop::collection::vec((-1e3f64..1e3, 0f64..1e4, 0usize..4), 1..24)
        }

        proptest! {
            #[test]
            fn displayed_matches_fresh_recompute(
                scans in scans(),
                toggles in prop::collection::vec(0usize..64, 0..40),
            ) {
                let h = build(&scans);
                let graph = DependencyGraph::build(&h);
                let mut session = ReviewSession::new(&h, &graph);
                for t in toggles {
                    session.toggle(ScanIdx(t % h.scans.len()));
                    for agg in graph.aggregates() {
                        prop_assert_eq!(session.displayed(agg), session.expected(agg));
                    }
                }
            }

            #[test]
            fn double_toggle_restores_display(
                scans in scans(),
                prefix in prop::collection::vec(0usize..64, 0..10),
                pick in 0usize..64,
            ) {
                let h = build(&scans);
                let graph = DependencyGraph::build(&h);
                let mut session = ReviewSession::new(&h, &graph);
                for t in prefix {
                    session.toggle(ScanIdx(t % h.scans.len()));
                }
                let before: Vec<Aggregate> =
                    graph.aggregates().map(|agg| session.displayed(agg)).collect();
                let scan = ScanIdx(pick % h.scans.len());
                session.toggle(scan);
                session.toggle(scan);
                let after: Vec<Aggregate> =
                    graph.aggregates().map(|agg| session.displayed(agg)).collect();
                prop_assert_eq!(before, after);
            }

            #[test]
            fn membership_and_impact_agree(scans in scans()) {
                let h = build(&scans);
                let graph = DependencyGraph::build(&h);
                prop_assert!(graph.check_consistency().is_ok());
                for scan in graph.scans() {
                    let expected = if h.protein_of(h.scan(scan).peptide).is_some() { 3 } else { 2 };
                    prop_assert_eq!(graph.impact(scan).len(), expected);
                }
            }
        }
    }
}
