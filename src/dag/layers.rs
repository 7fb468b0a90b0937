// src/dag/layers.rs

//! Kahn-style layering of the parsed job graph.
//!
//! Jobs with no unresolved parents form the next layer; the layer is removed
//! together with its outgoing edges and the process repeats. If at some point
//! unresolved jobs remain but none is ready, the graph has a cycle and a
//! witness path is reported instead of layers.
//!
//! The witness search starts close to the top of the graph: from a child of
//! the last completed layer (walking back through earlier layers if needed),
//! or, when no layer leads into the blocked jobs, from the unresolved job
//! with the fewest unresolved parents. Ties go to the job declared last.

use std::collections::HashMap;

use tracing::debug;

use crate::dag::job::{BuildJob, BuildStatus};
use crate::dsl::ParsedBuildJob;
use crate::errors::{BuildGraphError, Result};

/// Upper bound on witness search steps before giving up.
const MAX_CYCLE_SEARCH_STEPS: usize = 10_000;

/// Job table plus either ordered layers or a cycle witness, never both.
///
/// An empty job table is the one case with neither: no layers and no cycle.
#[derive(Debug, Clone)]
pub struct BuildLayers {
    jobs: Vec<BuildJob>,
    index: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
    layers: Vec<Vec<usize>>,
    cycle: Vec<String>,
}

/// Sort `parsed` into build layers, or detect a cycle.
///
/// Fails if two jobs share an id or a child refers to an undeclared job.
pub fn topological_sort(parsed: &[ParsedBuildJob]) -> Result<BuildLayers> {
    let mut jobs = Vec::with_capacity(parsed.len());
    let mut index = HashMap::with_capacity(parsed.len());
    for job in parsed {
        if index.insert(job.id.clone(), jobs.len()).is_some() {
            return Err(BuildGraphError::DuplicateJob(job.id.clone()));
        }
        jobs.push(BuildJob::new(job.id.clone(), job.settings.clone()));
    }

    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); jobs.len()];
    for (parent, job) in parsed.iter().enumerate() {
        let mut children = Vec::with_capacity(job.children.len());
        for child in &job.children {
            let Some(&child_idx) = index.get(child) else {
                return Err(BuildGraphError::JobNotFound(format!(
                    "'{child}' (child of '{}')",
                    job.id
                )));
            };
            children.push(child_idx);
        }
        children.sort_unstable();
        for &child in &children {
            parents[child].push(parent);
        }
        jobs[parent].children = children;
    }

    let mut layers = BuildLayers {
        jobs,
        index,
        parents,
        layers: Vec::new(),
        cycle: Vec::new(),
    };
    layers.peel()?;
    Ok(layers)
}

impl BuildLayers {
    fn peel(&mut self) -> Result<()> {
        let n = self.jobs.len();
        let mut remaining: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut resolved = vec![false; n];
        let mut resolved_count = 0;

        while resolved_count < n {
            let ready: Vec<usize> = (0..n)
                .filter(|&idx| !resolved[idx] && remaining[idx] == 0)
                .collect();

            if ready.is_empty() {
                let start = self.cycle_start(&remaining, &resolved)?;
                let witness = self.cycle_from(start, &resolved)?;
                self.cycle = witness
                    .into_iter()
                    .map(|idx| self.jobs[idx].id.clone())
                    .collect();
                self.layers.clear();
                debug!(cycle = ?self.cycle, "build cycle detected");
                return Ok(());
            }

            for &idx in &ready {
                resolved[idx] = true;
                for &child in &self.jobs[idx].children {
                    remaining[child] -= 1;
                }
            }
            resolved_count += ready.len();
            self.layers.push(ready);
        }

        debug!(
            jobs = n,
            layers = self.layers.len(),
            "layered build graph"
        );
        Ok(())
    }

    fn cycle_start(&self, remaining: &[usize], resolved: &[bool]) -> Result<usize> {
        let unresolved = |idx: &usize| !resolved[*idx];

        for layer in self.layers.iter().rev() {
            let mut is_child = vec![false; self.jobs.len()];
            for &parent in layer {
                for &child in &self.jobs[parent].children {
                    is_child[child] = true;
                }
            }
            let candidates = (0..self.jobs.len()).filter(|idx| is_child[*idx] && unresolved(idx));
            if let Some(start) = fewest_parents(candidates, remaining) {
                return Ok(start);
            }
        }

        // No layer yet, or the cycle sits in a component no layer feeds into.
        fewest_parents((0..self.jobs.len()).filter(unresolved), remaining).ok_or_else(|| {
            BuildGraphError::Internal("cycle detected but every job is resolved".into())
        })
    }

    /// Follow unresolved parent edges from `start` until a job repeats.
    ///
    /// Returns the cycle in child -> parent order reversed (so it reads along
    /// the edges) with the first id repeated at the end.
    fn cycle_from(&self, start: usize, resolved: &[bool]) -> Result<Vec<usize>> {
        let mut path = vec![start];
        let mut position: Vec<Option<usize>> = vec![None; self.jobs.len()];
        position[start] = Some(0);
        let mut current = start;

        for _ in 0..MAX_CYCLE_SEARCH_STEPS {
            let Some(&next) = self.parents[current].iter().find(|p| !resolved[**p]) else {
                return Err(BuildGraphError::Internal(format!(
                    "job '{}' is blocked but has no unresolved parent",
                    self.jobs[current].id
                )));
            };

            if let Some(pos) = position[next] {
                let mut cycle = path.split_off(pos);
                cycle.reverse();
                cycle.push(cycle[0]);
                return Ok(cycle);
            }

            position[next] = Some(path.len());
            path.push(next);
            current = next;
        }

        Err(BuildGraphError::Internal(format!(
            "cycle search from '{}' exceeded {MAX_CYCLE_SEARCH_STEPS} steps",
            self.jobs[start].id
        )))
    }

    pub fn has_cycle(&self) -> bool {
        !self.cycle.is_empty()
    }

    /// Witness path, first id repeated last. Empty when acyclic.
    pub fn cycle(&self) -> &[String] {
        &self.cycle
    }

    /// `Err(BuildCycle("A -> B -> A"))` if a cycle was found.
    pub fn ensure_acyclic(&self) -> Result<()> {
        if self.has_cycle() {
            return Err(BuildGraphError::BuildCycle(self.cycle.join(" -> ")));
        }
        Ok(())
    }

    pub fn layers(&self) -> &[Vec<usize>] {
        &self.layers
    }

    pub fn ordered_layer_ids(&self) -> Vec<Vec<&str>> {
        self.layers
            .iter()
            .map(|layer| layer.iter().map(|&idx| self.jobs[idx].id.as_str()).collect())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[BuildJob] {
        &self.jobs
    }

    pub fn job(&self, idx: usize) -> &BuildJob {
        &self.jobs[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn parents(&self, idx: usize) -> &[usize] {
        &self.parents[idx]
    }

    pub fn status(&self, idx: usize) -> BuildStatus {
        self.jobs[idx].status
    }

    pub(crate) fn set_status(&mut self, idx: usize, status: BuildStatus) {
        self.jobs[idx].status = status;
    }
}

/// Candidate with the fewest unresolved parents; the last one wins ties.
fn fewest_parents(candidates: impl Iterator<Item = usize>, remaining: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for idx in candidates {
        match best {
            Some(b) if remaining[idx] > remaining[b] => {}
            _ => best = Some(idx),
        }
    }
    best
}
