use microprofile::scope;
use rayon::prelude::*;

use super::equations::{Accumulator, Equation, Group, Pair};
use super::error::PipelineError;
use super::neighborhood_search::NeighborhoodSearch;
use super::particles::{find_set, ParticleSet};
use super::smoothing_kernel::Kernel;

/// Evaluates a fixed list of equation groups on a list of particle arrays.
///
/// Groups run strictly in order; within a group all particles of a destination array are computed
/// in parallel from a read-only view and committed afterwards.
pub struct Evaluator<K: Kernel> {
    kernel: K,
    groups: Vec<Group>,
    neighborhood_search: NeighborhoodSearch,
}

// Equations of one destination array that read from a given source array (indices into the destination's equation list).
struct SourceEquations {
    source: usize,
    equations: Vec<usize>,
}

impl<K: Kernel + Sync> Evaluator<K> {
    pub fn new(kernel: K, groups: Vec<Group>) -> Evaluator<K> {
        let neighborhood_search = NeighborhoodSearch::new(kernel.support_radius());
        Evaluator {
            kernel,
            groups,
            neighborhood_search,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn neighborhood_search(&self) -> &NeighborhoodSearch {
        &self.neighborhood_search
    }

    /// Evaluates all groups.
    pub fn evaluate(&mut self, particle_sets: &mut [ParticleSet]) -> Result<(), PipelineError> {
        self.evaluate_filtered(particle_sets, |_, _| true)
    }

    /// Evaluates all groups for which `include(group_index, group)` holds.
    pub fn evaluate_filtered(
        &mut self,
        particle_sets: &mut [ParticleSet],
        include: impl Fn(usize, &Group) -> bool,
    ) -> Result<(), PipelineError> {
        microprofile::scope!("Evaluator", "evaluate");
        self.neighborhood_search.update(particle_sets);

        for (group_index, group) in self.groups.iter().enumerate() {
            if include(group_index, group) {
                evaluate_group(group_index, group, particle_sets, &self.kernel, &self.neighborhood_search)?;
            }
        }
        Ok(())
    }
}

fn resolve(particle_sets: &[ParticleSet], group_index: usize, equation: &Equation, name: &str) -> Result<usize, PipelineError> {
    find_set(particle_sets, name).ok_or_else(|| PipelineError::UnknownArray {
        group: group_index,
        equation: equation.name(),
        array: name.to_owned(),
    })
}

fn evaluate_group(
    group_index: usize,
    group: &Group,
    particle_sets: &mut [ParticleSet],
    kernel: &(impl Kernel + Sync),
    neighborhood_search: &NeighborhoodSearch,
) -> Result<(), PipelineError> {
    microprofile::scope!("Evaluator", "group");

    for dest_name in group.destinations() {
        let equations: Vec<&Equation> = group.equations().iter().filter(|e| e.dest() == dest_name).collect();
        let dest_index = resolve(particle_sets, group_index, equations[0], dest_name)?;

        for equation in equations.iter() {
            equation.check(&particle_sets[dest_index]).map_err(|source| PipelineError::InvalidInput {
                group: group_index,
                equation: equation.name(),
                array: dest_name.to_owned(),
                source,
            })?;
        }

        let mut sources: Vec<SourceEquations> = Vec::new();
        for (equation_index, equation) in equations.iter().enumerate() {
            for source_name in equation.sources() {
                let source = resolve(particle_sets, group_index, equation, source_name)?;
                match sources.iter_mut().find(|s| s.source == source) {
                    Some(entry) => entry.equations.push(equation_index),
                    None => sources.push(SourceEquations {
                        source,
                        equations: vec![equation_index],
                    }),
                }
            }
        }

        let accumulators: Vec<Accumulator> = {
            let particle_sets: &[ParticleSet] = particle_sets;
            let dest = &particle_sets[dest_index];
            (0..dest.len())
                .into_par_iter()
                .map(|i| {
                    let mut acc = Accumulator::default();
                    for equation in equations.iter() {
                        equation.initialize(dest, i, &mut acc);
                    }

                    let ri = dest.positions[i];
                    let hi = dest.smoothing_lengths[i];
                    for entry in sources.iter() {
                        let source = &particle_sets[entry.source];
                        neighborhood_search.foreach_neighbor(
                            entry.source,
                            &source.positions,
                            ri,
                            #[inline(always)]
                            |j, ri_to_rj, r_sq| {
                                let r = r_sq.sqrt();
                                let mut pair = Pair {
                                    ri_to_rj,
                                    r_sq,
                                    r,
                                    h: 0.5 * (hi + source.smoothing_lengths[j]),
                                    w: kernel.evaluate(r_sq, r),
                                    grad_w: kernel.gradient(ri_to_rj, r_sq, r),
                                };
                                for &equation_index in entry.equations.iter() {
                                    equations[equation_index].interact(dest, i, source, j, &mut pair, &mut acc);
                                }
                            },
                        );
                    }

                    for equation in equations.iter() {
                        equation.post_loop(dest, i, &mut acc);
                    }
                    acc
                })
                .collect()
        };

        let dest = &mut particle_sets[dest_index];
        for equation in equations.iter() {
            equation.commit(dest, &accumulators).map_err(|source| PipelineError::InvalidInput {
                group: group_index,
                equation: equation.name(),
                array: dest_name.to_owned(),
                source,
            })?;
        }
    }
    Ok(())
}
