use crate::units::*;
use cgmath::prelude::*;
use std::collections::BTreeMap;

use super::error::ParticleError;

/// A named array of particles carrying the fields a weakly compressible SPH scheme works on.
///
/// Extra per-particle fields (`add_property`) and per-array buffers (`add_constant`) are looked up by name.
/// Particles are never added or removed once the array is built, so every buffer keeps its length for the whole run.
#[derive(Clone, Debug)]
pub struct ParticleSet {
    name: String,

    pub positions: Vec<Point>,
    pub velocities: Vec<Vector>,
    pub accelerations: Vec<Vector>,
    pub xsph_velocities: Vec<Vector>, // velocity used to advect positions, smoothed by XSPH
    pub smoothing_lengths: Vec<Real>, // typically expressed as 'h'
    pub masses: Vec<Real>,
    pub densities: Vec<Real>, // Local densities ρ
    pub pressures: Vec<Real>,
    pub sound_speeds: Vec<Real>,
    pub density_rates: Vec<Real>, // dρ/dt

    // state at the start of a time step, used by the predictor-corrector integrator
    pub(super) initial_positions: Vec<Point>,
    pub(super) initial_velocities: Vec<Vector>,
    pub(super) initial_densities: Vec<Real>,

    properties: BTreeMap<String, Vec<Real>>,
    constants: BTreeMap<String, Vec<Real>>,
}

impl ParticleSet {
    /// Builds a particle array from coordinate columns as produced by the geometry generators.
    ///
    /// All columns need to have the same length, otherwise the geometry is malformed and nothing is truncated.
    pub fn wcsph(name: &str, x: &[Real], y: &[Real], h: &[Real], rho: &[Real], m: &[Real]) -> Result<ParticleSet, ParticleError> {
        let expected = x.len();
        for (field, len) in [("y", y.len()), ("h", h.len()), ("rho", rho.len()), ("m", m.len())] {
            if len != expected {
                return Err(ParticleError::LengthMismatch {
                    array: name.to_owned(),
                    field,
                    len,
                    expected,
                });
            }
        }
        for (field, values) in [("h", h), ("rho", rho), ("m", m)] {
            if let Some(index) = values.iter().position(|v| !(*v > 0.0)) {
                return Err(ParticleError::NonPositive {
                    array: name.to_owned(),
                    field,
                    index,
                });
            }
        }

        let positions: Vec<Point> = x.iter().zip(y.iter()).map(|(&x, &y)| Point::new(x, y)).collect();
        let num_particles = positions.len();
        Ok(ParticleSet {
            name: name.to_owned(),
            initial_positions: positions.clone(),
            positions,
            velocities: vec![Vector::zero(); num_particles],
            accelerations: vec![Vector::zero(); num_particles],
            xsph_velocities: vec![Vector::zero(); num_particles],
            smoothing_lengths: h.to_vec(),
            masses: m.to_vec(),
            densities: rho.to_vec(),
            pressures: vec![0.0; num_particles],
            sound_speeds: vec![0.0; num_particles],
            density_rates: vec![0.0; num_particles],
            initial_velocities: vec![Vector::zero(); num_particles],
            initial_densities: rho.to_vec(),
            properties: BTreeMap::new(),
            constants: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Volume m/ρ of a particle.
    #[inline(always)]
    pub fn volume(&self, i: usize) -> Real {
        self.masses[i] / self.densities[i]
    }

    /// Declares a zero initialized per-particle field. Declaring an existing field again keeps its values.
    pub fn add_property(&mut self, name: &str) {
        let num_particles = self.len();
        self.properties.entry(name.to_owned()).or_insert_with(|| vec![0.0; num_particles]);
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn property(&self, name: &str) -> Result<&[Real], ParticleError> {
        self.properties.get(name).map(Vec::as_slice).ok_or_else(|| self.missing_property(name))
    }

    pub fn property_mut(&mut self, name: &str) -> Result<&mut [Real], ParticleError> {
        match self.properties.get_mut(name) {
            Some(values) => Ok(values.as_mut_slice()),
            None => Err(ParticleError::MissingProperty {
                array: self.name.clone(),
                property: name.to_owned(),
            }),
        }
    }

    /// Declares a fixed length per-array buffer. Replaces a previous buffer of the same name.
    pub fn add_constant(&mut self, name: &str, values: Vec<Real>) {
        self.constants.insert(name.to_owned(), values);
    }

    pub fn constant(&self, name: &str) -> Result<&[Real], ParticleError> {
        self.constants.get(name).map(Vec::as_slice).ok_or_else(|| self.missing_constant(name))
    }

    /// Mutable access to a constant. Handing out a slice keeps the buffer length fixed.
    pub fn constant_mut(&mut self, name: &str) -> Result<&mut [Real], ParticleError> {
        match self.constants.get_mut(name) {
            Some(values) => Ok(values.as_mut_slice()),
            None => Err(ParticleError::MissingConstant {
                array: self.name.clone(),
                constant: name.to_owned(),
            }),
        }
    }

    /// Fails unless the constant exists and holds exactly `expected` values.
    pub fn check_constant_len(&self, name: &str, expected: usize) -> Result<(), ParticleError> {
        let len = self.constant(name)?.len();
        if len != expected {
            return Err(ParticleError::ConstantLength {
                array: self.name.clone(),
                constant: name.to_owned(),
                len,
                expected,
            });
        }
        Ok(())
    }

    pub fn max_smoothing_length(&self) -> Real {
        self.smoothing_lengths.iter().cloned().fold(0.0, Real::max)
    }

    pub fn total_mass(&self) -> Real {
        self.masses.iter().sum()
    }

    pub fn kinetic_energy(&self) -> Real {
        self.masses.iter().zip(self.velocities.iter()).map(|(m, v)| 0.5 * m * v.magnitude2()).sum()
    }

    fn missing_property(&self, name: &str) -> ParticleError {
        ParticleError::MissingProperty {
            array: self.name.clone(),
            property: name.to_owned(),
        }
    }

    fn missing_constant(&self, name: &str) -> ParticleError {
        ParticleError::MissingConstant {
            array: self.name.clone(),
            constant: name.to_owned(),
        }
    }
}

/// Index of the array with the given name.
pub fn find_set(sets: &[ParticleSet], name: &str) -> Option<usize> {
    sets.iter().position(|set| set.name() == name)
}
