//! Dependency graph between leaf scans and the aggregates they feed
//!
//! Two adjacency structures keyed by arena index:
//! - membership: aggregate -> ordered scans it is computed from
//! - impact: scan -> ordered aggregates it affects (spot, peptide, protein)
//!
//! Global invariants enforced:
//! - Scan `s` is in membership(a) iff `a` is in impact(s)
//! - Built once; inclusion state never lives here
//! - Linear in scan count: each scan is registered at most three times

use crate::hierarchy::{Hierarchy, PeptideIdx, ProteinIdx, ScanIdx, SpotIdx};
use crate::index::AggregateRef;
use anyhow::{bail, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    spot_members: Vec<Vec<ScanIdx>>,
    peptide_members: Vec<Vec<ScanIdx>>,
    protein_members: Vec<Vec<ScanIdx>>,
    impact: Vec<Vec<AggregateRef>>,
}

impl DependencyGraph {
    pub fn build(hierarchy: &Hierarchy) -> Self {
        let mut graph = DependencyGraph {
            spot_members: vec![Vec::new(); hierarchy.spots.len()],
            peptide_members: vec![Vec::new(); hierarchy.peptides.len()],
            protein_members: vec![Vec::new(); hierarchy.proteins.len()],
            impact: vec![Vec::new(); hierarchy.scans.len()],
        };

        for (p, peptide) in hierarchy.peptides.iter().enumerate() {
            let peptide_idx = PeptideIdx(p);
            let protein = hierarchy.protein_of(peptide_idx);
            for &spot in &peptide.spots {
                for &scan in &hierarchy.spot(spot).scans {
                    graph.register(scan, AggregateRef::Spot(spot));
                    graph.register(scan, AggregateRef::Peptide(peptide_idx));
                    if let Some(protein) = protein {
                        graph.register(scan, AggregateRef::Protein(protein));
                    }
                }
            }
        }

        graph
    }

    fn register(&mut self, scan: ScanIdx, agg: AggregateRef) {
        self.members_mut(agg).push(scan);
        self.impact[scan.index()].push(agg);
    }

    fn members_mut(&mut self, agg: AggregateRef) -> &mut Vec<ScanIdx> {
        match agg {
            AggregateRef::Spot(i) => &mut self.spot_members[i.index()],
            AggregateRef::Peptide(i) => &mut self.peptide_members[i.index()],
            AggregateRef::Protein(i) => &mut self.protein_members[i.index()],
        }
    }

    /// Scans an aggregate is computed from, in traversal order
    pub fn membership(&self, agg: AggregateRef) -> &[ScanIdx] {
        match agg {
            AggregateRef::Spot(i) => &self.spot_members[i.index()],
            AggregateRef::Peptide(i) => &self.peptide_members[i.index()],
            AggregateRef::Protein(i) => &self.protein_members[i.index()],
        }
    }

    /// Aggregates a scan feeds: its spot, its peptide, and its protein when
    /// the peptide is uniquely assigned
    pub fn impact(&self, scan: ScanIdx) -> &[AggregateRef] {
        &self.impact[scan.index()]
    }

    pub fn scan_count(&self) -> usize {
        self.impact.len()
    }

    /// Every aggregate node: spots, then peptides, then proteins
    pub fn aggregates(&self) -> impl Iterator<Item = AggregateRef> + '_ {
        let spots = (0..self.spot_members.len()).map(|i| AggregateRef::Spot(SpotIdx(i)));
        let peptides =
            (0..self.peptide_members.len()).map(|i| AggregateRef::Peptide(PeptideIdx(i)));
        let proteins =
            (0..self.protein_members.len()).map(|i| AggregateRef::Protein(ProteinIdx(i)));
        spots.chain(peptides).chain(proteins)
    }

    pub fn scans(&self) -> impl Iterator<Item = ScanIdx> {
        (0..self.impact.len()).map(ScanIdx)
    }

    /// Verify the membership/impact bijection
    pub fn check_consistency(&self) -> Result<()> {
        for agg in self.aggregates() {
            for &scan in self.membership(agg) {
                if !self.impact(scan).contains(&agg) {
                    bail!("{:?} lists {:?} but the scan does not list it back", agg, scan);
                }
            }
        }
        for scan in self.scans() {
            for &agg in self.impact(scan) {
                if !self.membership(agg).contains(&scan) {
                    bail!("{:?} impacts {:?} which is not computed from it", scan, agg);
                }
            }
        }
        Ok(())
    }
}
