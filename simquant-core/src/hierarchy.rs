//! In-memory result hierarchy (protein -> peptide -> spot -> scan)
//!
//! Nodes live in flat arenas addressed by typed indices. Arena order is the
//! producer's first-seen order: peptides, then each peptide's spots, then each
//! spot's scans; proteins follow in `proteinResults` order. Everything
//! downstream (ids, maps, embedded payload) inherits this order.

use crate::natural::{sort_natural, NaturalKey};
use crate::results::{QuantResults, ScanResult};
use crate::stats::Aggregate;
use anyhow::{bail, Result};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

macro_rules! arena_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_index!(
    /// Position of a scan in [`Hierarchy::scans`]
    ScanIdx
);
arena_index!(
    /// Position of a spot in [`Hierarchy::spots`]
    SpotIdx
);
arena_index!(
    /// Position of a peptide in [`Hierarchy::peptides`]
    PeptideIdx
);
arena_index!(
    /// Position of a protein in [`Hierarchy::proteins`]
    ProteinIdx
);

/// Leaf measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub peptide: PeptideIdx,
    pub spot: SpotIdx,
    /// Scan number within the spectra file
    pub number: String,
    pub charge: i32,
    pub ratio: f64,
    pub snr: f64,
    pub retention_time: f64,
    pub filter_line: Option<String>,
    pub visual_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    pub label: String,
    pub peptide: PeptideIdx,
    pub scans: Vec<ScanIdx>,
    /// Producer aggregate with every scan included
    pub baseline: Aggregate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Peptide {
    pub sequence: String,
    pub spots: Vec<SpotIdx>,
    pub baseline: Aggregate,
    pub assignment: PeptideAssignment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Protein {
    pub name: String,
    /// Uniquely assigned peptides, in listing order
    pub peptides: Vec<PeptideIdx>,
    /// Every peptide the producer listed, ambiguous ones included, in listing order
    pub listed: Vec<PeptideIdx>,
    pub baseline: Aggregate,
}

/// How a peptide relates to the protein level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeptideAssignment {
    /// Exactly one protein; the peptide feeds that protein's aggregate
    Unique(ProteinIdx),
    /// Zero or several candidate proteins; excluded from protein aggregation
    Ambiguous(Vec<String>),
    /// Not listed under any protein and not reported as ambiguous
    Unassigned,
}

/// Entry of the ambiguous-assignment set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousPeptide {
    pub sequence: String,
    /// Candidate proteins; empty means the peptide matched no protein
    pub candidates: Vec<String>,
    /// Arena position when the peptide was quantified
    pub peptide: Option<PeptideIdx>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    pub scans: Vec<Scan>,
    pub spots: Vec<Spot>,
    pub peptides: Vec<Peptide>,
    pub proteins: Vec<Protein>,
    pub ambiguous: Vec<AmbiguousPeptide>,
}

impl Hierarchy {
    /// Build the arena from producer output.
    ///
    /// Fails on structural inconsistencies: a protein listing an unknown
    /// peptide, or two scans in one spot sharing (scan number, charge).
    pub fn from_results(results: &QuantResults) -> Result<Self> {
        let mut hierarchy = Hierarchy::default();

        for (sequence, peptide_result) in &results.peptide_results {
            let peptide_idx = PeptideIdx(hierarchy.peptides.len());
            let mut spot_ids = Vec::with_capacity(peptide_result.spots.len());

            for (label, spot_result) in &peptide_result.spots {
                let spot_idx = SpotIdx(hierarchy.spots.len());
                let scans = hierarchy.push_scans(
                    sequence,
                    label,
                    peptide_idx,
                    spot_idx,
                    &spot_result.scan_results,
                )?;
                hierarchy.spots.push(Spot {
                    label: label.clone(),
                    peptide: peptide_idx,
                    scans,
                    baseline: spot_result.merged_results.into(),
                });
                spot_ids.push(spot_idx);
            }

            hierarchy.peptides.push(Peptide {
                sequence: sequence.clone(),
                spots: spot_ids,
                baseline: peptide_result.merged_results.into(),
                assignment: PeptideAssignment::Unassigned,
            });
        }

        hierarchy.assign_proteins(results)?;
        Ok(hierarchy)
    }

    fn push_scans(
        &mut self,
        sequence: &str,
        label: &str,
        peptide: PeptideIdx,
        spot: SpotIdx,
        scan_results: &[ScanResult],
    ) -> Result<Vec<ScanIdx>> {
        let mut seen: HashSet<(&str, i32)> = HashSet::new();
        let mut ids = Vec::with_capacity(scan_results.len());
        for scan in scan_results {
            if !scan.ratio.is_finite() || !scan.snr.is_finite() {
                bail!(
                    "scan #{} (charge {}+) for peptide {} in spot {} has a non-finite value (ratio {}, snr {})",
                    scan.id,
                    scan.charge,
                    sequence,
                    label,
                    scan.ratio,
                    scan.snr
                );
            }
            if !seen.insert((scan.id.as_str(), scan.charge)) {
                bail!(
                    "duplicate scan #{} (charge {}+) for peptide {} in spot {}",
                    scan.id,
                    scan.charge,
                    sequence,
                    label
                );
            }
            ids.push(ScanIdx(self.scans.len()));
            self.scans.push(Scan {
                peptide,
                spot,
                number: scan.id.clone(),
                charge: scan.charge,
                ratio: scan.ratio,
                snr: scan.snr,
                retention_time: scan.retention_time,
                filter_line: scan.filter_line.clone(),
                visual_ref: scan.visual_ref.clone(),
            });
        }
        Ok(ids)
    }

    fn assign_proteins(&mut self, results: &QuantResults) -> Result<()> {
        // Arena order equals `peptideResults` order
        let peptide_by_sequence: HashMap<&str, PeptideIdx> = results
            .peptide_results
            .keys()
            .enumerate()
            .map(|(i, seq)| (seq.as_str(), PeptideIdx(i)))
            .collect();

        // Peptide sequence -> proteins listing it, in listing order
        let mut listings: IndexMap<&str, Vec<ProteinIdx>> = IndexMap::new();
        for (i, (name, protein)) in results.protein_results.iter().enumerate() {
            for sequence in &protein.peptides {
                if !peptide_by_sequence.contains_key(sequence.as_str()) {
                    bail!(
                        "protein {} lists peptide {} which has no quantification result",
                        name,
                        sequence
                    );
                }
                let entry = listings.entry(sequence.as_str()).or_default();
                if !entry.contains(&ProteinIdx(i)) {
                    entry.push(ProteinIdx(i));
                }
            }
        }

        let protein_names: Vec<&str> = results.protein_results.keys().map(String::as_str).collect();

        let mut ambiguous: IndexMap<String, Vec<String>> = results
            .ambiguous_peptides
            .iter()
            .map(|(seq, candidates)| (seq.clone(), candidates.clone().unwrap_or_default()))
            .collect();

        for (sequence, proteins) in &listings {
            if proteins.len() < 2 {
                continue;
            }
            let names: Vec<&str> = proteins.iter().map(|p| protein_names[p.index()]).collect();
            tracing::warn!(
                peptide = *sequence,
                proteins = ?names,
                "peptide matches multiple proteins; excluding it from protein-level aggregation"
            );
            let candidates = ambiguous.entry(sequence.to_string()).or_default();
            for name in names {
                if !candidates.iter().any(|c| c == name) {
                    candidates.push(name.to_string());
                }
            }
        }

        for (sequence, idx) in &peptide_by_sequence {
            let peptide = &mut self.peptides[idx.index()];
            peptide.assignment = if let Some(candidates) = ambiguous.get(*sequence) {
                PeptideAssignment::Ambiguous(candidates.clone())
            } else {
                match listings.get(*sequence).map(Vec::as_slice) {
                    Some([protein]) => PeptideAssignment::Unique(*protein),
                    _ => PeptideAssignment::Unassigned,
                }
            };
        }

        self.ambiguous = ambiguous
            .into_iter()
            .map(|(sequence, candidates)| AmbiguousPeptide {
                peptide: peptide_by_sequence.get(sequence.as_str()).copied(),
                sequence,
                candidates,
            })
            .collect();

        for (i, (name, protein)) in results.protein_results.iter().enumerate() {
            let me = ProteinIdx(i);
            let mut listed: Vec<PeptideIdx> = Vec::with_capacity(protein.peptides.len());
            for idx in protein
                .peptides
                .iter()
                .filter_map(|seq| peptide_by_sequence.get(seq.as_str()).copied())
            {
                if !listed.contains(&idx) {
                    listed.push(idx);
                }
            }
            let peptides = listed
                .iter()
                .copied()
                .filter(|p| self.peptides[p.index()].assignment == PeptideAssignment::Unique(me))
                .collect();
            self.proteins.push(Protein {
                name: name.clone(),
                peptides,
                listed,
                baseline: protein.merged_results.into(),
            });
        }

        Ok(())
    }

    pub fn scan(&self, idx: ScanIdx) -> &Scan {
        &self.scans[idx.index()]
    }

    pub fn spot(&self, idx: SpotIdx) -> &Spot {
        &self.spots[idx.index()]
    }

    pub fn peptide(&self, idx: PeptideIdx) -> &Peptide {
        &self.peptides[idx.index()]
    }

    pub fn protein(&self, idx: ProteinIdx) -> &Protein {
        &self.proteins[idx.index()]
    }

    /// The protein a peptide feeds, if it is uniquely assigned
    pub fn protein_of(&self, peptide: PeptideIdx) -> Option<ProteinIdx> {
        match self.peptide(peptide).assignment {
            PeptideAssignment::Unique(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.peptides.is_empty()
    }

    /// Peptides in natural display order
    pub fn peptides_for_display(&self) -> Vec<PeptideIdx> {
        let mut ids: Vec<PeptideIdx> = (0..self.peptides.len()).map(PeptideIdx).collect();
        sort_natural(&mut ids, |p| self.peptide(*p).sequence.as_str());
        ids
    }

    /// Proteins in natural display order
    pub fn proteins_for_display(&self) -> Vec<ProteinIdx> {
        let mut ids: Vec<ProteinIdx> = (0..self.proteins.len()).map(ProteinIdx).collect();
        sort_natural(&mut ids, |p| self.protein(*p).name.as_str());
        ids
    }

    /// A peptide's spots in natural display order
    pub fn spots_for_display(&self, peptide: PeptideIdx) -> Vec<SpotIdx> {
        let mut ids = self.peptide(peptide).spots.clone();
        ids.sort_by_key(|s| NaturalKey(self.spot(*s).label.as_str()));
        ids
    }

    /// A spot's scans by ascending retention time (stable for ties)
    pub fn scans_for_display(&self, spot: SpotIdx) -> Vec<ScanIdx> {
        let mut ids = self.spot(spot).scans.clone();
        ids.sort_by(|a, b| {
            self.scan(*a)
                .retention_time
                .total_cmp(&self.scan(*b).retention_time)
        });
        ids
    }
}
