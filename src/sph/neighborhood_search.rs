use microprofile::scope;
use crate::units::*;
use cgmath::prelude::*;

use super::particles::ParticleSet;

pub type ParticleIndex = u32;
pub type CellIndex = u32;

#[derive(Copy, Clone)]
struct Particle {
    pidx: ParticleIndex,
    cidx: CellIndex,
}

#[derive(Copy, Clone)]
struct CellPos {
    x: u16,
    y: u16,
}
impl CellPos {
    #[inline]
    fn to_cidx(self) -> CellIndex {
        super::morton::encode(self.x, self.y)
    }
}

#[derive(Copy, Clone)]
struct Cell {
    first_particle: ParticleIndex,
    cidx: CellIndex,
}

struct GridProperties {
    radius: Real,
    cell_size_inv: Real,
    grid_min: Point,
}
impl GridProperties {
    // Float to int casts saturate, so positions outside of the grid land in the border cells.
    // Queries saturate the same way, which keeps them correct, just slower.
    #[inline]
    fn position_to_cellpos(&self, position: Point) -> CellPos {
        let cellspace = (position - self.grid_min) * self.cell_size_inv;
        CellPos {
            x: cellspace.x as u16,
            y: cellspace.y as u16,
        }
    }

    #[inline]
    fn position_to_cidx(&self, position: Point) -> CellIndex {
        self.position_to_cellpos(position).to_cidx()
    }
}

#[derive(Default)]
struct PointSet {
    particles: Vec<Particle>,
    cells: Vec<Cell>,
}

impl PointSet {
    fn update(&mut self, grid: &GridProperties, positions: &[Point]) {
        // Particle count is fixed during a run, so this only happens on first use.
        if self.particles.len() != positions.len() {
            self.particles = (0..positions.len())
                .map(|pidx| Particle {
                    pidx: pidx as ParticleIndex,
                    cidx: 0,
                })
                .collect();
        }

        for p in self.particles.iter_mut() {
            p.cidx = grid.position_to_cidx(positions[p.pidx as usize]);
        }

        // Sorting by particle index as well makes the neighbor order independent of the previous step.
        self.particles.sort_unstable_by_key(|a| (a.cidx, a.pidx));

        self.cells.clear();
        let mut prev_cidx = CellIndex::max_value();
        for (pidx, p) in self.particles.iter().enumerate() {
            if p.cidx != prev_cidx || self.cells.is_empty() {
                self.cells.push(Cell {
                    first_particle: pidx as ParticleIndex,
                    cidx: p.cidx,
                });
                prev_cidx = p.cidx;
            }
        }
        self.cells.push(Cell {
            first_particle: self.particles.len() as ParticleIndex,
            cidx: CellIndex::max_value(),
        }); // sentinel cell
    }

    fn foreach_potential_neighbor(&self, grid: &GridProperties, position: Point, mut f: impl FnMut(ParticleIndex)) {
        let min = grid.position_to_cellpos(position - Vector::new(grid.radius, grid.radius));
        let max = grid.position_to_cellpos(position + Vector::new(grid.radius, grid.radius));

        // Last entry is the sentinel, it must never be found.
        let cells = &self.cells[..self.cells.len() - 1];
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let cidx = CellPos { x, y }.to_cidx();
                if let Ok(cell_arrayidx) = cells.binary_search_by_key(&cidx, |cell| cell.cidx) {
                    let first_particle = self.cells[cell_arrayidx].first_particle;
                    let last_particle = self.cells[cell_arrayidx + 1].first_particle;
                    for p in first_particle..last_particle {
                        f(self.particles[p as usize].pidx);
                    }
                }
            }
        }
    }
}

/// Uniform grid neighbor search with cells sorted along a morton curve.
///
/// Keeps one sorted point set per particle array, queries are always against a single source array.
pub struct NeighborhoodSearch {
    grid: GridProperties,
    point_sets: Vec<PointSet>,
}

impl NeighborhoodSearch {
    /// * radius:               Radius that determines if a point is a neighbor
    pub fn new(radius: Real) -> NeighborhoodSearch {
        let cell_size = radius;
        NeighborhoodSearch {
            grid: GridProperties {
                radius,
                cell_size_inv: 1.0 / cell_size,
                // morton codes are only 16 bit per axis, so the grid can't be infinite.
                grid_min: Point::new(-100.0, -100.0),
            },
            point_sets: Vec::new(),
        }
    }

    pub fn radius(&self) -> Real {
        self.grid.radius
    }

    /// Rebuilds the grid for all particle arrays. Needs to be called whenever positions changed.
    pub fn update(&mut self, particle_sets: &[ParticleSet]) {
        microprofile::scope!("NeighborhoodSearch", "update");
        self.point_sets.resize_with(particle_sets.len(), Default::default);
        for (point_set, particles) in self.point_sets.iter_mut().zip(particle_sets.iter()) {
            point_set.update(&self.grid, &particles.positions);
        }
    }

    /// Calls `f` for every particle of array `source` whose cell is close to `position`. Does not check the distance.
    pub fn foreach_potential_neighbor(&self, source: usize, position: Point, f: impl FnMut(ParticleIndex)) {
        self.point_sets[source].foreach_potential_neighbor(&self.grid, position, f)
    }

    /// Calls `f` with index, `ri_to_rj` and squared distance for every particle of `source` within the search radius.
    /// A particle at `position` itself is included.
    #[inline(always)]
    pub fn foreach_neighbor(&self, source: usize, source_positions: &[Point], position: Point, mut f: impl FnMut(usize, Vector, Real)) {
        let radius_sq = self.grid.radius * self.grid.radius;
        self.foreach_potential_neighbor(source, position, |j| {
            let j = j as usize;
            let ri_to_rj = source_positions[j] - position;
            let r_sq = ri_to_rj.magnitude2();
            if r_sq <= radius_sq {
                f(j, ri_to_rj, r_sq);
            }
        });
    }
}
