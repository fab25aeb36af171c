use std::collections::HashMap;

use crate::error::{InbreedingError, Result};

use super::records::{normalize_id, AncestorRecord, ParentRelation};

/// How [`PedigreeGraph::load`] treats a parent link that is already set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachPolicy {
    /// Keep the first parent learned for a slot; later records never replace it.
    #[default]
    FirstWins,
    /// Later records replace earlier links. A missing slot never erases a
    /// known parent.
    Overwrite,
}

/// A single individual: identifier with optional sire and dam.
#[derive(Debug, Clone)]
pub struct Individual {
    /// Trimmed, case-sensitive identifier.
    id: String,
    /// Index of the sire in the graph, or `None` if unknown.
    sire: Option<usize>,
    /// Index of the dam in the graph, or `None` if unknown.
    dam: Option<usize>,
}

impl Individual {
    /// Identifier as given in the input, trimmed.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Index of the sire, or `None` if unknown.
    pub fn sire(&self) -> Option<usize> {
        self.sire
    }

    /// Index of the dam, or `None` if unknown.
    pub fn dam(&self) -> Option<usize> {
        self.dam
    }

    /// An individual with no known parent.
    pub fn is_founder(&self) -> bool {
        self.sire.is_none() && self.dam.is_none()
    }
}

/// Ancestor graph of one computation unit.
///
/// Individuals live in an arena and refer to their parents by 0-based index.
/// Every identifier maps to exactly one individual; nodes are created the
/// first time an identifier is seen, either as a subject or as someone's
/// parent.
#[derive(Debug, Clone)]
pub struct PedigreeGraph {
    individuals: Vec<Individual>,
    id_to_index: HashMap<String, usize>,
    policy: AttachPolicy,
}

impl PedigreeGraph {
    /// Create an empty graph with the default [`AttachPolicy::FirstWins`].
    pub fn new() -> Self {
        Self::with_policy(AttachPolicy::default())
    }

    /// Create an empty graph that attaches parents under `policy`.
    pub fn with_policy(policy: AttachPolicy) -> Self {
        Self {
            individuals: Vec::new(),
            id_to_index: HashMap::new(),
            policy,
        }
    }

    /// Build a graph from records in one go.
    pub fn from_records(records: &[AncestorRecord], policy: AttachPolicy) -> Self {
        let mut graph = Self::with_policy(policy);
        graph.load(records);
        graph
    }

    /// Policy applied when a record names a parent that is already set.
    pub fn policy(&self) -> AttachPolicy {
        self.policy
    }

    /// Number of individuals in the graph.
    pub fn n_individuals(&self) -> usize {
        self.individuals.len()
    }

    /// Whether the graph holds no individuals.
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Look up the index of an individual by identifier.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_to_index.get(id.trim()).copied()
    }

    /// The individual at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn individual(&self, index: usize) -> &Individual {
        &self.individuals[index]
    }

    /// Checked variant of [`PedigreeGraph::individual`].
    pub fn try_individual(&self, index: usize) -> Result<&Individual> {
        self.individuals
            .get(index)
            .ok_or(InbreedingError::UnknownIndividual {
                index,
                size: self.individuals.len(),
            })
    }

    /// Identifier of the individual at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn id(&self, index: usize) -> &str {
        &self.individuals[index].id
    }

    /// Sire of `index`, if known.
    pub fn sire(&self, index: usize) -> Option<usize> {
        self.individuals[index].sire
    }

    /// Dam of `index`, if known.
    pub fn dam(&self, index: usize) -> Option<usize> {
        self.individuals[index].dam
    }

    /// Known parents of `index`, sire first.
    pub fn parents(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let ind = &self.individuals[index];
        ind.sire.into_iter().chain(ind.dam)
    }

    /// Return the individual for `id`, creating it if needed.
    ///
    /// # Errors
    /// Returns a validation error if `id` is empty or a missing-value token.
    pub fn get_or_create(&mut self, id: &str) -> Result<usize> {
        let id = normalize_id(id).ok_or_else(|| {
            InbreedingError::Validation(format!(
                "'{}' is empty or a missing-value marker",
                id
            ))
        })?;
        Ok(self.insert_normalized(id))
    }

    /// Parent-slot variant of [`PedigreeGraph::get_or_create`]: absent and
    /// missing values mean "no ancestor" rather than an error.
    pub fn get_or_create_slot(&mut self, id: Option<&str>) -> Option<usize> {
        let id = id.and_then(normalize_id)?;
        Some(self.insert_normalized(id))
    }

    fn insert_normalized(&mut self, id: String) -> usize {
        if let Some(&index) = self.id_to_index.get(&id) {
            return index;
        }
        let index = self.individuals.len();
        self.individuals.push(Individual {
            id: id.clone(),
            sire: None,
            dam: None,
        });
        self.id_to_index.insert(id, index);
        index
    }

    /// Load flattened records in order, attaching parents under the graph's
    /// [`AttachPolicy`].
    ///
    /// Records without a usable subject still contribute their ancestor
    /// relations; only the subject link is lost.
    pub fn load(&mut self, records: &[AncestorRecord]) {
        let before = self.individuals.len();
        let mut n_relations = 0usize;

        for record in records {
            if record.subject().is_none() {
                log::debug!("Record without subject identifier; loading ancestors only");
            }
            for relation in record.relations() {
                self.attach(&relation);
                n_relations += 1;
            }
        }

        log::debug!(
            "Loaded {} records ({} parent relations, {} new individuals, policy={:?})",
            records.len(),
            n_relations,
            self.individuals.len() - before,
            self.policy
        );
    }

    /// Attach one derived relation. Returns without change if the child slot
    /// is unusable.
    fn attach(&mut self, relation: &ParentRelation<'_>) {
        let Some(child) = self.get_or_create_slot(Some(relation.child)) else {
            return;
        };
        let sire = self.get_or_create_slot(relation.sire);
        let dam = self.get_or_create_slot(relation.dam);

        if let Some(s) = sire {
            if s == child {
                log::warn!("Individual '{}' listed as its own sire; link ignored", relation.child);
            } else {
                self.set_sire(child, s);
            }
        }
        if let Some(d) = dam {
            if d == child {
                log::warn!("Individual '{}' listed as its own dam; link ignored", relation.child);
            } else {
                self.set_dam(child, d);
            }
        }
    }

    fn set_sire(&mut self, child: usize, sire: usize) {
        match (self.policy, self.individuals[child].sire) {
            (AttachPolicy::FirstWins, Some(existing)) => {
                if existing != sire {
                    log::debug!(
                        "Keeping first sire of '{}' ({}); ignoring '{}'",
                        self.id(child),
                        self.id(existing),
                        self.id(sire)
                    );
                }
            }
            _ => self.individuals[child].sire = Some(sire),
        }
    }

    fn set_dam(&mut self, child: usize, dam: usize) {
        match (self.policy, self.individuals[child].dam) {
            (AttachPolicy::FirstWins, Some(existing)) => {
                if existing != dam {
                    log::debug!(
                        "Keeping first dam of '{}' ({}); ignoring '{}'",
                        self.id(child),
                        self.id(existing),
                        self.id(dam)
                    );
                }
            }
            _ => self.individuals[child].dam = Some(dam),
        }
    }

    /// Whether the dam/sire links form a cycle.
    ///
    /// Flattened records cannot encode a cycle on their own, but inconsistent
    /// records combined under [`AttachPolicy::Overwrite`] can.
    pub fn has_cycle(&self) -> bool {
        // Kahn's algorithm over parent -> offspring edges. If not every node
        // is consumed, the remainder sits on a cycle.
        let n = self.individuals.len();
        let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0u32; n];

        for (i, ind) in self.individuals.iter().enumerate() {
            for parent in ind.sire.into_iter().chain(ind.dam) {
                children_of[parent].push(i);
                in_degree[i] += 1;
            }
        }

        let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0usize;

        while let Some(node) = queue.pop() {
            visited += 1;
            for &child in &children_of[node] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    queue.push(child);
                }
            }
        }

        visited != n
    }
}

impl Default for PedigreeGraph {
    fn default() -> Self {
        Self::new()
    }
}
