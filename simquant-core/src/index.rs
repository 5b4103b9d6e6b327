//! Identity index: stable, compact labels for every hierarchy node
//!
//! Labels are `scan-N`, `spot-N`, `peptide-N` and `protein-N`, numbered per
//! kind in arena order. Indexing identical input twice yields identical
//! labels.

use crate::hierarchy::{Hierarchy, PeptideIdx, ProteinIdx, ScanIdx, SpotIdx};
use std::collections::HashMap;
use std::fmt;

/// Any node of the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    Scan(ScanIdx),
    Spot(SpotIdx),
    Peptide(PeptideIdx),
    Protein(ProteinIdx),
}

/// A node that carries an aggregate (everything except scans)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateRef {
    Spot(SpotIdx),
    Peptide(PeptideIdx),
    Protein(ProteinIdx),
}

impl From<AggregateRef> for NodeRef {
    fn from(agg: AggregateRef) -> Self {
        match agg {
            AggregateRef::Spot(s) => NodeRef::Spot(s),
            AggregateRef::Peptide(p) => NodeRef::Peptide(p),
            AggregateRef::Protein(p) => NodeRef::Protein(p),
        }
    }
}

impl NodeRef {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeRef::Scan(_) => "scan",
            NodeRef::Spot(_) => "spot",
            NodeRef::Peptide(_) => "peptide",
            NodeRef::Protein(_) => "protein",
        }
    }

    fn ordinal(&self) -> usize {
        match self {
            NodeRef::Scan(i) => i.index(),
            NodeRef::Spot(i) => i.index(),
            NodeRef::Peptide(i) => i.index(),
            NodeRef::Protein(i) => i.index(),
        }
    }

    pub fn as_aggregate(&self) -> Option<AggregateRef> {
        match *self {
            NodeRef::Scan(_) => None,
            NodeRef::Spot(s) => Some(AggregateRef::Spot(s)),
            NodeRef::Peptide(p) => Some(AggregateRef::Peptide(p)),
            NodeRef::Protein(p) => Some(AggregateRef::Protein(p)),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind(), self.ordinal())
    }
}

/// Bijection between nodes and their labels, scoped to one report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityIndex {
    scans: Vec<String>,
    spots: Vec<String>,
    peptides: Vec<String>,
    proteins: Vec<String>,
    by_label: HashMap<String, NodeRef>,
}

impl IdentityIndex {
    /// Assign a label to every node of the hierarchy
    pub fn build(hierarchy: &Hierarchy) -> Self {
        let mut index = IdentityIndex::default();
        // Same traversal as the arena: peptides, their spots, their scans; then proteins
        for (p, peptide) in hierarchy.peptides.iter().enumerate() {
            index.insert(NodeRef::Peptide(PeptideIdx(p)));
            for spot in &peptide.spots {
                index.insert(NodeRef::Spot(*spot));
                for scan in &hierarchy.spot(*spot).scans {
                    index.insert(NodeRef::Scan(*scan));
                }
            }
        }
        for p in 0..hierarchy.proteins.len() {
            index.insert(NodeRef::Protein(ProteinIdx(p)));
        }
        index
    }

    fn insert(&mut self, node: NodeRef) {
        let label = node.to_string();
        let slot = match node {
            NodeRef::Scan(i) => (&mut self.scans, i.index()),
            NodeRef::Spot(i) => (&mut self.spots, i.index()),
            NodeRef::Peptide(i) => (&mut self.peptides, i.index()),
            NodeRef::Protein(i) => (&mut self.proteins, i.index()),
        };
        let (labels, pos) = slot;
        if labels.len() <= pos {
            labels.resize(pos + 1, String::new());
        }
        labels[pos] = label.clone();
        self.by_label.insert(label, node);
    }

    /// Label of a node. Panics if the node is not part of the indexed hierarchy.
    pub fn label(&self, node: NodeRef) -> &str {
        match node {
            NodeRef::Scan(i) => &self.scans[i.index()],
            NodeRef::Spot(i) => &self.spots[i.index()],
            NodeRef::Peptide(i) => &self.peptides[i.index()],
            NodeRef::Protein(i) => &self.proteins[i.index()],
        }
    }

    pub fn scan_label(&self, scan: ScanIdx) -> &str {
        self.label(NodeRef::Scan(scan))
    }

    pub fn aggregate_label(&self, agg: AggregateRef) -> &str {
        self.label(agg.into())
    }

    pub fn resolve(&self, label: &str) -> Option<NodeRef> {
        self.by_label.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Every node in deterministic order: scans, spots, peptides, proteins
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        let scans = (0..self.scans.len()).map(|i| NodeRef::Scan(ScanIdx(i)));
        let spots = (0..self.spots.len()).map(|i| NodeRef::Spot(SpotIdx(i)));
        let peptides = (0..self.peptides.len()).map(|i| NodeRef::Peptide(PeptideIdx(i)));
        let proteins = (0..self.proteins.len()).map(|i| NodeRef::Protein(ProteinIdx(i)));
        scans.chain(spots).chain(peptides).chain(proteins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::parse_results_json;

    fn hierarchy() -> Hierarchy {
        let merged = r#"{"ratioMean": 0, "ratioStdDev": 0, "snrMean": 0, "snrStdDev": 0}"#;
        let scan = |id: u32| {
            format!(r#"{{"id": {id}, "charge": 2, "ratio": 1, "snr": 1, "retentionTime": {id}}}"#)
        };
        let json = format!(
            r#"{{"peptideResults": {{
                "AAK": {{"spots": {{
                    "s1": {{"scanResults": [{}, {}], "mergedResults": {merged}}},
                    "s2": {{"scanResults": [{}], "mergedResults": {merged}}}
                }}, "mergedResults": {merged}}},
                "CCK": {{"spots": {{
                    "s1": {{"scanResults": [{}], "mergedResults": {merged}}}
                }}, "mergedResults": {merged}}}
            }},
            "proteinResults": {{
                "P2": {{"peptides": ["AAK"], "mergedResults": {merged}}},
                "P1": {{"peptides": ["CCK"], "mergedResults": {merged}}}
            }}}}"#,
            scan(1),
            scan(2),
            scan(3),
            scan(4)
        );
        Hierarchy::from_results(&parse_results_json(&json).unwrap()).unwrap()
    }

    #[test]
    fn test_every_node_gets_one_label() {
        let h = hierarchy();
        let index = IdentityIndex::build(&h);
        assert_eq!(
            index.len(),
            h.scans.len() + h.spots.len() + h.peptides.len() + h.proteins.len()
        );
        assert_eq!(index.nodes().count(), index.len());
    }

    #[test]
    fn test_labels_follow_traversal_order() {
        let index = IdentityIndex::build(&hierarchy());
        assert_eq!(index.scan_label(ScanIdx(0)), "scan-0");
        assert_eq!(index.scan_label(ScanIdx(3)), "scan-3");
        assert_eq!(index.label(NodeRef::Spot(SpotIdx(2))), "spot-2");
        assert_eq!(index.label(NodeRef::Peptide(PeptideIdx(1))), "peptide-1");
        // Proteins keep producer order, not display order
        assert_eq!(index.label(NodeRef::Protein(ProteinIdx(0))), "protein-0");
    }

    #[test]
    fn test_resolve_is_inverse_of_label() {
        let index = IdentityIndex::build(&hierarchy());
        for node in index.nodes() {
            assert_eq!(index.resolve(index.label(node)), Some(node));
        }
        assert_eq!(index.resolve("scan-99"), None);
    }

    #[test]
    fn test_indexing_is_deterministic() {
        assert_eq!(IdentityIndex::build(&hierarchy()), IdentityIndex::build(&hierarchy()));
    }

    #[test]
    fn test_empty_hierarchy() {
        let index = IdentityIndex::build(&Hierarchy::default());
        assert!(index.is_empty());
    }
}
