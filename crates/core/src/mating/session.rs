use rayon::prelude::*;
use serde::Serialize;

use crate::error::{InbreedingError, Result};
use crate::genetics::memo::{MemoScope, MemoScopeKind, NoMemo, SharedMemo, UnitMemo};
use crate::genetics::pedigree::{AttachPolicy, PedigreeGraph};
use crate::genetics::records::AncestorRecord;
use crate::genetics::relatedness::{PathMode, RelatednessEngine};
use crate::types::round_coefficient;

/// What one computation unit covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitGranularity {
    /// One graph and engine for the subject and all of its partners.
    #[default]
    PerBatch,
    /// One graph and engine per subject x partner pair.
    PerPair,
}

/// Configuration of a [`PedigreeSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub path_mode: PathMode,
    pub memo_scope: MemoScopeKind,
    pub attach_policy: AttachPolicy,
    pub granularity: UnitGranularity,
}

impl SessionConfig {
    /// Defaults: full accumulation, per-unit memo, first-wins parents, one
    /// unit per batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how path pairs are combined (default: full accumulation).
    pub fn path_mode(mut self, mode: PathMode) -> Self {
        self.path_mode = mode;
        self
    }

    /// Set the memo lifetime (default: per unit).
    pub fn memo_scope(mut self, scope: MemoScopeKind) -> Self {
        self.memo_scope = scope;
        self
    }

    /// Set the parent attachment policy (default: first wins).
    pub fn attach_policy(mut self, policy: AttachPolicy) -> Self {
        self.attach_policy = policy;
        self
    }

    /// Set what one computation unit covers (default: per batch).
    pub fn granularity(mut self, granularity: UnitGranularity) -> Self {
        self.granularity = granularity;
        self
    }
}

/// One female candidate with her male candidates.
#[derive(Debug, Clone, Default)]
pub struct MatingBatch {
    /// Record of the subject (female side).
    pub subject: AncestorRecord,
    /// One record per candidate partner (male side).
    pub partners: Vec<AncestorRecord>,
    /// Extra records that extend either side's ancestry beyond the three
    /// generations a single record carries. Loaded after subject and partners.
    pub ancestry: Vec<AncestorRecord>,
}

impl MatingBatch {
    pub fn new(subject: AncestorRecord, partners: Vec<AncestorRecord>) -> Self {
        Self {
            subject,
            partners,
            ancestry: Vec::new(),
        }
    }

    /// Add records that only extend ancestry.
    pub fn with_ancestry(mut self, ancestry: Vec<AncestorRecord>) -> Self {
        self.ancestry = ancestry;
        self
    }
}

/// Expected offspring inbreeding of one subject x partner pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatingResult {
    pub subject_id: String,
    pub partner_id: String,
    /// Offspring coefficient rounded to 8 decimal places.
    pub coefficient: f64,
    pub mode: PathMode,
    pub cycle_detected: bool,
}

/// Own inbreeding of one record subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualInbreeding {
    pub id: String,
    pub coefficient: f64,
    pub cycle_detected: bool,
}

/// Entry point for pairing queries.
///
/// Each call builds its own computation units: a fresh [`PedigreeGraph`]
/// and [`RelatednessEngine`] that are dropped when the call returns. Only a
/// [`MemoScopeKind::ProcessWide`] session keeps state between units, in a
/// [`SharedMemo`] owned by the session.
#[derive(Debug, Clone, Default)]
pub struct PedigreeSession {
    config: SessionConfig,
    shared: SharedMemo,
}

impl PedigreeSession {
    pub fn new(config: SessionConfig) -> Self {
        log::debug!(
            "Session: mode={:?}, memo={:?}, attach={:?}, granularity={:?}",
            config.path_mode,
            config.memo_scope,
            config.attach_policy,
            config.granularity
        );
        Self {
            config,
            shared: SharedMemo::new(),
        }
    }

    /// Configuration this session runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Entries held by the process-wide memo (always 0 for other scopes).
    pub fn shared_memo_len(&self) -> usize {
        self.shared.len()
    }

    /// Forget everything the process-wide memo learned.
    pub fn clear_shared_memo(&self) {
        self.shared.clear();
    }

    fn memo(&self) -> Box<dyn MemoScope> {
        match self.config.memo_scope {
            MemoScopeKind::None => Box::new(NoMemo),
            MemoScopeKind::PerUnit => Box::new(UnitMemo::new()),
            MemoScopeKind::ProcessWide => Box::new(self.shared.clone()),
        }
    }

    /// Pair `subject` with every partner, skipping bad input with a logged
    /// diagnostic. Never fails; see [`PedigreeSession::try_mate`].
    pub fn mate(&self, subject: &AncestorRecord, partners: &[AncestorRecord]) -> Vec<MatingResult> {
        self.mate_batch(&MatingBatch::new(subject.clone(), partners.to_vec()))
    }

    /// Like [`PedigreeSession::mate`] for a prepared batch.
    pub fn mate_batch(&self, batch: &MatingBatch) -> Vec<MatingResult> {
        match self.try_mate_batch(batch) {
            Ok(results) => results,
            Err(e) => {
                log::error!("Skipping mating batch: {}", e);
                Vec::new()
            }
        }
    }

    /// Pair `subject` with every partner.
    ///
    /// # Errors
    /// Returns an input error if the subject has no usable identifier or no
    /// partner records were given. Individual partners without a usable
    /// identifier are skipped, not reported as errors.
    pub fn try_mate(
        &self,
        subject: &AncestorRecord,
        partners: &[AncestorRecord],
    ) -> Result<Vec<MatingResult>> {
        self.try_mate_batch(&MatingBatch::new(subject.clone(), partners.to_vec()))
    }

    /// Evaluate one batch, surfacing input errors.
    pub fn try_mate_batch(&self, batch: &MatingBatch) -> Result<Vec<MatingResult>> {
        let subject_id = batch.subject.subject().ok_or_else(|| {
            InbreedingError::Input("subject record has no usable identifier".to_string())
        })?;

        if batch.partners.is_empty() {
            return Err(InbreedingError::Input(format!(
                "no partner records for subject '{}'",
                subject_id
            )));
        }

        let partners: Vec<&AncestorRecord> = batch
            .partners
            .iter()
            .enumerate()
            .filter_map(|(i, record)| {
                if record.subject().is_none() {
                    log::warn!(
                        "Partner record {} for subject '{}' has no usable identifier; skipped",
                        i,
                        subject_id
                    );
                    None
                } else {
                    Some(record)
                }
            })
            .collect();

        let results = match self.config.granularity {
            UnitGranularity::PerBatch => self.run_unit(&batch.subject, &partners, &batch.ancestry),
            UnitGranularity::PerPair => partners
                .iter()
                .flat_map(|&partner| self.run_unit(&batch.subject, &[partner], &batch.ancestry))
                .collect(),
        };

        Ok(results)
    }

    /// Evaluate independent batches on the rayon pool. Output order follows
    /// input order.
    pub fn mate_batches(&self, batches: &[MatingBatch]) -> Vec<Vec<MatingResult>> {
        batches
            .par_iter()
            .map(|batch| self.mate_batch(batch))
            .collect()
    }

    /// Own inbreeding of every identifiable record subject, computed in a
    /// single unit over all `records`. Subjects are reported once, in first
    /// appearance order.
    pub fn inbreeding_report(&self, records: &[AncestorRecord]) -> Vec<IndividualInbreeding> {
        let graph = PedigreeGraph::from_records(records, self.config.attach_policy);
        let mut engine = RelatednessEngine::with_memo(&graph, self.config.path_mode, self.memo());

        let mut seen = std::collections::HashSet::new();
        let mut report = Vec::new();
        for id in records.iter().filter_map(AncestorRecord::subject) {
            if !seen.insert(id) {
                continue;
            }
            // Subjects without known parents never enter the graph.
            let estimate = engine.offspring_inbreeding(
                graph.index_of(id).and_then(|i| graph.sire(i)),
                graph.index_of(id).and_then(|i| graph.dam(i)),
            );
            report.push(IndividualInbreeding {
                id: id.to_string(),
                coefficient: round_coefficient(estimate.coefficient),
                cycle_detected: estimate.cycle_detected,
            });
        }
        report
    }

    /// Build one graph and one engine, then query `subject` against every
    /// partner in order.
    fn run_unit(
        &self,
        subject: &AncestorRecord,
        partners: &[&AncestorRecord],
        ancestry: &[AncestorRecord],
    ) -> Vec<MatingResult> {
        let mut graph = PedigreeGraph::with_policy(self.config.attach_policy);
        graph.load(std::slice::from_ref(subject));
        for &partner in partners {
            graph.load(std::slice::from_ref(partner));
        }
        graph.load(ancestry);

        if graph.has_cycle() {
            log::warn!("Pedigree contains a cycle; affected coefficients are flagged");
        }

        let Some(subject_idx) = subject.subject().and_then(|id| graph.get_or_create(id).ok()) else {
            return Vec::new();
        };
        let partner_idx: Vec<(String, usize)> = partners
            .iter()
            .filter_map(|record| {
                let id = record.subject()?;
                let idx = graph.get_or_create(id).ok()?;
                Some((id.to_string(), idx))
            })
            .collect();

        let subject_id = graph.id(subject_idx).to_string();
        let mut engine = RelatednessEngine::with_memo(&graph, self.config.path_mode, self.memo());

        let results: Vec<MatingResult> = partner_idx
            .into_iter()
            .map(|(partner_id, idx)| {
                let estimate = engine.offspring_inbreeding(Some(subject_idx), Some(idx));
                MatingResult {
                    subject_id: subject_id.clone(),
                    partner_id,
                    coefficient: round_coefficient(estimate.coefficient),
                    mode: estimate.mode,
                    cycle_detected: estimate.cycle_detected,
                }
            })
            .collect();

        log::debug!(
            "Unit for '{}': {} individuals, {} partners, {} memo entries",
            subject_id,
            graph.n_individuals(),
            results.len(),
            engine.memo_len()
        );

        results
    }
}

/// Sort results ascending by coefficient (least inbred offspring first).
/// Ties keep their input order.
pub fn rank_by_coefficient(results: &mut [MatingResult]) {
    results.sort_by(|a, b| a.coefficient.total_cmp(&b.coefficient));
}
