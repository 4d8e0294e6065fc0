// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Vortex Decision Ledger
// ─────────────────────────────────────────────────────────────────────
//! Cross-repository record of ATOM decisions.
//!
//! The ledger keeps every recorded atom, a per-repository coherence
//! summary, each contributor's trail of tags, and an ecosystem-wide
//! running average. Averages are whole percentages (integer division),
//! matching the on-chain representation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use spiralsafe_types::{Marker, Phase, SpiralError, SpiralResult};

use crate::trail::TrailRecord;

/// Default coherence (percent) at which an atom counts as a snap-in.
pub const DEFAULT_SNAP_IN_THRESHOLD: u8 = 70;

/// One decision as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAtom {
    pub atom_tag: String,
    pub repo: String,
    /// 0-100.
    pub coherence_score: u8,
    pub phases_passed: Vec<Phase>,
    pub markers: BTreeSet<Marker>,
    pub contributor: String,
    pub timestamp: String,
    pub commit_hash: String,
    #[serde(default)]
    pub pr_number: Option<u32>,
}

impl LedgerAtom {
    /// Lift a trail record into a ledger atom; the score is rounded.
    pub fn from_trail(
        record: &TrailRecord,
        repo: impl Into<String>,
        contributor: impl Into<String>,
        commit_hash: impl Into<String>,
    ) -> Self {
        Self {
            atom_tag: record.atom_tag.clone(),
            repo: repo.into(),
            coherence_score: record.coherence.score.round().clamp(0.0, 100.0) as u8,
            phases_passed: record.gates_passed.clone(),
            markers: record.markers.clone(),
            contributor: contributor.into(),
            timestamp: record.timestamp.clone(),
            commit_hash: commit_hash.into(),
            pr_number: None,
        }
    }

    pub fn with_pr(mut self, pr_number: u32) -> Self {
        self.pr_number = Some(pr_number);
        self
    }

    fn validate(&self) -> SpiralResult<()> {
        if self.coherence_score > 100 {
            return Err(SpiralError::Validation(format!(
                "invalid coherence score {} for {}",
                self.coherence_score, self.atom_tag
            )));
        }
        if self.atom_tag.is_empty() {
            return Err(SpiralError::Validation("ATOM tag required".into()));
        }
        Ok(())
    }
}

/// Ecosystem-wide summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VortexState {
    pub total_atoms: u64,
    pub average_coherence: u8,
    pub snap_in_count: u64,
    pub last_update: String,
}

/// Per-repository summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    pub repo: String,
    pub atom_count: u64,
    pub total_coherence: u64,
    pub average_coherence: u8,
    pub last_snap_in: Option<String>,
}

impl RepoState {
    fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            atom_count: 0,
            total_coherence: 0,
            average_coherence: 0,
            last_snap_in: None,
        }
    }
}

/// A contributor's footprint across the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub atom_count: u64,
    pub average_coherence: u8,
    pub markers: Vec<Marker>,
}

/// Sink for finished decisions.
pub trait DecisionRecorder {
    /// Store one atom, returning a receipt.
    fn record(&mut self, atom: LedgerAtom) -> SpiralResult<String>;

    /// Store several atoms. The default records them one by one.
    fn batch_record(&mut self, atoms: Vec<LedgerAtom>) -> SpiralResult<Vec<String>> {
        atoms.into_iter().map(|atom| self.record(atom)).collect()
    }
}

/// In-process ledger with owner governance.
pub struct VortexLedger {
    owner: String,
    snap_in_threshold: u8,
    atoms: HashMap<String, LedgerAtom>,
    order: Vec<String>,
    repos: BTreeMap<String, RepoState>,
    contributors: HashMap<String, Vec<String>>,
    state: VortexState,
    height: u64,
}

impl VortexLedger {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            snap_in_threshold: DEFAULT_SNAP_IN_THRESHOLD,
            atoms: HashMap::new(),
            order: Vec::new(),
            repos: BTreeMap::new(),
            contributors: HashMap::new(),
            state: VortexState {
                total_atoms: 0,
                average_coherence: 0,
                snap_in_count: 0,
                last_update: chrono::Utc::now().to_rfc3339(),
            },
            height: 0,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn snap_in_threshold(&self) -> u8 {
        self.snap_in_threshold
    }

    fn require_owner(&self, caller: &str) -> SpiralResult<()> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(SpiralError::Validation(format!(
                "{caller} is not the ledger owner"
            )))
        }
    }

    /// Owner only.
    pub fn set_snap_in_threshold(&mut self, caller: &str, threshold: u8) -> SpiralResult<()> {
        self.require_owner(caller)?;
        if threshold > 100 {
            return Err(SpiralError::Validation(format!("invalid threshold {threshold}")));
        }
        self.snap_in_threshold = threshold;
        Ok(())
    }

    /// Owner only: overwrite a repository's average coherence.
    pub fn update_coherence(&mut self, caller: &str, repo: &str, coherence: u8) -> SpiralResult<()> {
        self.require_owner(caller)?;
        if coherence > 100 {
            return Err(SpiralError::Validation(format!("invalid coherence {coherence}")));
        }
        let state = self
            .repos
            .get_mut(repo)
            .ok_or_else(|| SpiralError::Validation(format!("unknown repo {repo}")))?;
        state.average_coherence = coherence;
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────

    pub fn get_atom(&self, atom_tag: &str) -> Option<&LedgerAtom> {
        self.atoms.get(atom_tag)
    }

    pub fn vortex_state(&self) -> &VortexState {
        &self.state
    }

    pub fn repo_state(&self, repo: &str) -> Option<&RepoState> {
        self.repos.get(repo)
    }

    /// `(repo, average_coherence)` for every known repository.
    pub fn repo_coherence(&self) -> Vec<(String, u8)> {
        self.repos
            .values()
            .map(|s| (s.repo.clone(), s.average_coherence))
            .collect()
    }

    /// Up to `limit` atoms for `repo`, oldest first.
    pub fn repo_atoms(&self, repo: &str, limit: usize) -> Vec<&LedgerAtom> {
        self.order
            .iter()
            .filter_map(|tag| self.atoms.get(tag))
            .filter(|a| a.repo == repo)
            .take(limit)
            .collect()
    }

    pub fn contributor_atoms(&self, contributor: &str) -> Vec<&LedgerAtom> {
        self.contributors
            .get(contributor)
            .map(|tags| tags.iter().filter_map(|t| self.atoms.get(t)).collect())
            .unwrap_or_default()
    }

    /// Whether the ecosystem average has reached the snap-in threshold.
    pub fn check_ecosystem_snap_in(&self) -> (bool, u8) {
        let avg = self.state.average_coherence;
        (self.state.total_atoms > 0 && avg >= self.snap_in_threshold, avg)
    }

    pub fn attribution(&self, contributor: &str) -> Attribution {
        let atoms = self.contributor_atoms(contributor);
        let count = atoms.len() as u64;
        if count == 0 {
            return Attribution::default();
        }
        let sum: u64 = atoms.iter().map(|a| u64::from(a.coherence_score)).sum();
        Attribution {
            atom_count: count,
            average_coherence: (sum / count) as u8,
            markers: atoms.iter().flat_map(|a| a.markers.iter().copied()).collect(),
        }
    }

    // ── Internal ──────────────────────────────────────────────────

    fn check(&self, atom: &LedgerAtom) -> SpiralResult<()> {
        atom.validate()?;
        if self.atoms.contains_key(&atom.atom_tag) {
            return Err(SpiralError::Validation(format!(
                "{} already recorded",
                atom.atom_tag
            )));
        }
        Ok(())
    }

    fn apply(&mut self, atom: LedgerAtom) -> String {
        let snapped = atom.coherence_score >= self.snap_in_threshold;
        let score = u64::from(atom.coherence_score);

        let repo = self
            .repos
            .entry(atom.repo.clone())
            .or_insert_with(|| RepoState::new(&atom.repo));
        repo.atom_count += 1;
        repo.total_coherence += score;
        repo.average_coherence = (repo.total_coherence / repo.atom_count) as u8;
        if snapped {
            repo.last_snap_in = Some(atom.timestamp.clone());
        }

        self.contributors
            .entry(atom.contributor.clone())
            .or_default()
            .push(atom.atom_tag.clone());

        let prev_total = self.state.total_atoms * u64::from(self.state.average_coherence);
        self.state.total_atoms += 1;
        self.state.average_coherence = ((prev_total + score) / self.state.total_atoms) as u8;
        self.state.last_update = chrono::Utc::now().to_rfc3339();
        if snapped {
            self.state.snap_in_count += 1;
            log::info!(
                "SNAP-IN: {} achieved {}% coherence",
                atom.atom_tag,
                atom.coherence_score
            );
        }

        self.height += 1;
        let receipt = format!("{}:{}", self.height, atom.atom_tag);
        self.order.push(atom.atom_tag.clone());
        self.atoms.insert(atom.atom_tag.clone(), atom);
        receipt
    }
}

impl DecisionRecorder for VortexLedger {
    fn record(&mut self, atom: LedgerAtom) -> SpiralResult<String> {
        self.check(&atom)?;
        Ok(self.apply(atom))
    }

    /// All-or-nothing: nothing is stored if any atom is invalid.
    fn batch_record(&mut self, atoms: Vec<LedgerAtom>) -> SpiralResult<Vec<String>> {
        let mut seen = BTreeSet::new();
        for atom in &atoms {
            self.check(atom)?;
            if !seen.insert(atom.atom_tag.as_str()) {
                return Err(SpiralError::Validation(format!(
                    "{} appears twice in batch",
                    atom.atom_tag
                )));
            }
        }
        Ok(atoms.into_iter().map(|atom| self.apply(atom)).collect())
    }
}
