//! Candidate generation strategies
//!
//! Candidates are produced lazily, one assignment at a time, so large
//! parameter spaces can be explored under a budget without materializing
//! the full cartesian product. The strategy seam is the optimizer's key
//! extensibility point: full enumeration is the default, sampling and
//! pruning strategies plug in behind the same trait.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

use pipeline_optimizer_types::{ParamValue, ParameterAssignment, StepSpec};

use crate::pareto::{ObjectiveWeights, ParetoFrontier};

/// One dimension of the parameter space
#[derive(Debug, Clone)]
struct Dimension {
    step: String,
    param: String,
    values: Vec<ParamValue>,
}

fn dimensions(specs: &[StepSpec]) -> Vec<Dimension> {
    specs
        .iter()
        .flat_map(|spec| {
            spec.params.iter().map(|(param, domain)| Dimension {
                step: spec.name.clone(),
                param: param.clone(),
                values: domain.values(),
            })
        })
        .collect()
}

fn assemble(dims: &[Dimension], pick: impl Fn(usize, &Dimension) -> usize) -> ParameterAssignment {
    let mut assignment = ParameterAssignment::empty();
    for (i, dim) in dims.iter().enumerate() {
        let value = dim.values[pick(i, dim)].clone();
        assignment = assignment.set(dim.step.clone(), dim.param.clone(), value);
    }
    assignment
}

/// Produces candidate assignments for the optimizer
///
/// Implementations may consult the current frontier (for pruning-style
/// strategies) and signal exhaustion by returning `None`.
pub trait CandidateStrategy: Send {
    /// Next candidate, or `None` when the strategy is exhausted
    fn next_candidate(&mut self, frontier: &ParetoFrontier) -> Option<ParameterAssignment>;

    /// Upper bound on candidates still to come, when known
    fn remaining_hint(&self) -> Option<u64>;
}

/// Lazy full cartesian enumeration over every step's declared domains
///
/// A pipeline with no declared parameters yields exactly one empty
/// assignment.
pub struct GridEnumerator {
    dims: Vec<Dimension>,
    indices: Vec<usize>,
    total: u64,
    emitted: u64,
    done: bool,
}

impl GridEnumerator {
    pub fn new(specs: &[StepSpec]) -> Self {
        let dims = dimensions(specs);
        let total: u64 = dims.iter().map(|d| d.values.len() as u64).product();
        Self {
            indices: vec![0; dims.len()],
            // a domain with no values empties the whole grid
            done: total == 0,
            dims,
            total,
            emitted: 0,
        }
    }

    /// Total size of the grid
    pub fn total(&self) -> u64 {
        self.total
    }

    fn advance(&mut self) {
        // mixed-radix odometer; wrapping the most significant digit
        // exhausts the grid
        for i in (0..self.indices.len()).rev() {
            self.indices[i] += 1;
            if self.indices[i] < self.dims[i].values.len() {
                return;
            }
            self.indices[i] = 0;
        }
        self.done = true;
    }
}

impl CandidateStrategy for GridEnumerator {
    fn next_candidate(&mut self, _frontier: &ParetoFrontier) -> Option<ParameterAssignment> {
        if self.done {
            return None;
        }

        let indices = self.indices.clone();
        let assignment = assemble(&self.dims, |i, _| indices[i]);

        self.emitted += 1;
        if self.dims.is_empty() {
            // the empty grid has exactly one assignment
            self.done = true;
        } else {
            self.advance();
        }

        Some(assignment)
    }

    fn remaining_hint(&self) -> Option<u64> {
        Some(self.total.saturating_sub(self.emitted))
    }
}

/// Independent uniform draws from every dimension
pub struct RandomSampler {
    dims: Vec<Dimension>,
    num_samples: u64,
    emitted: u64,
    rng: StdRng,
}

impl RandomSampler {
    pub fn new(specs: &[StepSpec], num_samples: u64) -> Self {
        Self::with_rng(specs, num_samples, StdRng::from_entropy())
    }

    /// Seeded sampler for reproducible sweeps
    pub fn with_seed(specs: &[StepSpec], num_samples: u64, seed: u64) -> Self {
        Self::with_rng(specs, num_samples, StdRng::seed_from_u64(seed))
    }

    fn with_rng(specs: &[StepSpec], num_samples: u64, rng: StdRng) -> Self {
        let dims = dimensions(specs);
        let num_samples = if dims.iter().any(|d| d.values.is_empty()) {
            0
        } else {
            num_samples
        };
        Self {
            dims,
            num_samples,
            emitted: 0,
            rng,
        }
    }
}

impl CandidateStrategy for RandomSampler {
    fn next_candidate(&mut self, _frontier: &ParetoFrontier) -> Option<ParameterAssignment> {
        if self.emitted >= self.num_samples {
            return None;
        }

        let picks: Vec<usize> = self
            .dims
            .iter()
            .map(|d| self.rng.gen_range(0..d.values.len()))
            .collect();
        let assignment = assemble(&self.dims, |i, _| picks[i]);

        self.emitted += 1;
        Some(assignment)
    }

    fn remaining_hint(&self) -> Option<u64> {
        Some(self.num_samples.saturating_sub(self.emitted))
    }
}

/// Bandit-style pruning over an inner strategy
///
/// Rung zero drains up to `seed_candidates` assignments from the inner
/// strategy; each later rung re-proposes the strongest frontier
/// survivors, halving their number per rung, so promising assignments
/// accumulate deeper evaluation while weak ones stop consuming budget.
pub struct SuccessiveHalving {
    inner: Box<dyn CandidateStrategy>,
    seed_candidates: u64,
    seeded: u64,
    rungs: u32,
    rung: u32,
    queue: VecDeque<ParameterAssignment>,
    weights: ObjectiveWeights,
}

impl SuccessiveHalving {
    pub fn new(inner: Box<dyn CandidateStrategy>, seed_candidates: u64, rungs: u32) -> Self {
        Self {
            inner,
            seed_candidates,
            seeded: 0,
            rungs,
            rung: 0,
            queue: VecDeque::new(),
            weights: ObjectiveWeights::default(),
        }
    }

    /// Rank survivors with custom weights
    pub fn with_weights(mut self, weights: ObjectiveWeights) -> Self {
        self.weights = weights;
        self
    }

    fn refill(&mut self, frontier: &ParetoFrontier) {
        self.rung += 1;
        let survivors = (self.seeded >> self.rung).max(1) as usize;

        let mut points: Vec<_> = frontier.points().to_vec();
        points.sort_by(|a, b| {
            b.composite_score(&self.weights)
                .partial_cmp(&a.composite_score(&self.weights))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.queue = points
            .into_iter()
            .take(survivors)
            .map(|p| p.assignment)
            .collect();
    }
}

impl CandidateStrategy for SuccessiveHalving {
    fn next_candidate(&mut self, frontier: &ParetoFrontier) -> Option<ParameterAssignment> {
        if self.seeded < self.seed_candidates {
            match self.inner.next_candidate(frontier) {
                Some(candidate) => {
                    self.seeded += 1;
                    return Some(candidate);
                }
                None => self.seed_candidates = self.seeded,
            }
        }

        while self.queue.is_empty() && self.rung < self.rungs {
            self.refill(frontier);
            if frontier.is_empty() {
                // nothing survived seeding; no rungs to run
                self.rung = self.rungs;
            }
        }

        self.queue.pop_front()
    }

    fn remaining_hint(&self) -> Option<u64> {
        // later rungs depend on frontier contents
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_optimizer_types::ParamDomain;
    use std::collections::BTreeSet;

    fn two_step_specs() -> Vec<StepSpec> {
        vec![
            StepSpec::new("extract")
                .with_param("model", ParamDomain::strings(["cheap", "expensive"])),
            StepSpec::new("classify")
                .with_param("prompt", ParamDomain::strings(["short", "long", "cot"])),
        ]
    }

    fn drain(strategy: &mut dyn CandidateStrategy) -> Vec<ParameterAssignment> {
        let frontier = ParetoFrontier::new();
        let mut out = Vec::new();
        while let Some(candidate) = strategy.next_candidate(&frontier) {
            out.push(candidate);
        }
        out
    }

    #[test]
    fn test_grid_enumerates_full_cartesian_product() {
        let mut grid = GridEnumerator::new(&two_step_specs());
        assert_eq!(grid.total(), 6);
        assert_eq!(grid.remaining_hint(), Some(6));

        let candidates = drain(&mut grid);
        assert_eq!(candidates.len(), 6);

        let unique: BTreeSet<String> = candidates.iter().map(|c| c.key()).collect();
        assert_eq!(unique.len(), 6);
        assert_eq!(grid.remaining_hint(), Some(0));
    }

    #[test]
    fn test_grid_candidates_validate_against_specs() {
        let specs = two_step_specs();
        let mut grid = GridEnumerator::new(&specs);
        for candidate in drain(&mut grid) {
            assert!(candidate.validate_against(&specs).is_ok());
        }
    }

    #[test]
    fn test_parameterless_specs_yield_one_empty_assignment() {
        let specs = vec![StepSpec::new("normalize")];
        let mut grid = GridEnumerator::new(&specs);

        let candidates = drain(&mut grid);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0], ParameterAssignment::empty());
    }

    #[test]
    fn test_empty_domain_empties_the_grid() {
        let specs = vec![StepSpec::new("s").with_param("model", ParamDomain::Discrete(vec![]))];
        let mut grid = GridEnumerator::new(&specs);
        assert!(drain(&mut grid).is_empty());
    }

    #[test]
    fn test_random_sampler_count_and_membership() {
        let specs = two_step_specs();
        let mut sampler = RandomSampler::with_seed(&specs, 20, 42);

        let candidates = drain(&mut sampler);
        assert_eq!(candidates.len(), 20);
        for candidate in &candidates {
            assert!(candidate.validate_against(&specs).is_ok());
        }
    }

    #[test]
    fn test_random_sampler_is_reproducible_with_seed() {
        let specs = two_step_specs();
        let a = drain(&mut RandomSampler::with_seed(&specs, 10, 7));
        let b = drain(&mut RandomSampler::with_seed(&specs, 10, 7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_successive_halving_seeds_then_reproposes_survivors() {
        use crate::pareto::ParetoPoint;
        use uuid::Uuid;

        let specs = two_step_specs();
        let mut strategy =
            SuccessiveHalving::new(Box::new(GridEnumerator::new(&specs)), 4, 2);

        let mut frontier = ParetoFrontier::new();

        // seeding rung: candidates come from the inner grid
        let mut seeded = Vec::new();
        for _ in 0..4 {
            let candidate = strategy.next_candidate(&frontier).unwrap();
            seeded.push(candidate);
        }

        // pretend two of the seeds landed on the frontier
        for (i, assignment) in seeded.iter().take(2).enumerate() {
            frontier.insert(ParetoPoint {
                run_id: Uuid::new_v4(),
                assignment: assignment.clone(),
                accuracy: 0.9 - i as f64 * 0.1,
                cost: 1.0 + i as f64,
                latency_ms: 100.0,
                scored: 3,
                records: 3,
            });
        }

        // rung 1 re-proposes the strongest survivors
        let reproposed = strategy.next_candidate(&frontier).unwrap();
        assert!(seeded.contains(&reproposed));
    }

    #[test]
    fn test_successive_halving_stops_with_empty_frontier() {
        let specs = vec![StepSpec::new("s")
            .with_param("model", ParamDomain::strings(["a", "b"]))];
        let mut strategy =
            SuccessiveHalving::new(Box::new(GridEnumerator::new(&specs)), 2, 3);

        let frontier = ParetoFrontier::new();
        assert!(strategy.next_candidate(&frontier).is_some());
        assert!(strategy.next_candidate(&frontier).is_some());
        // frontier never fed; later rungs have nothing to re-propose
        assert!(strategy.next_candidate(&frontier).is_none());
    }
}
