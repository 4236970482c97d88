//! Builds the equation groups of a gradient corrected WCSPH run from the groups of a base scheme.
//!
//! The assembled pipeline always looks like
//! `[pre-step group] → [GradientCorrection, group 1 ...] → [GradientCorrection, group 2 ...] → ...`
//! so every group computes corrected gradients before its own equations read them.

use serde::Deserialize;

use super::equations::{Equation, Group};
use super::error::PipelineError;
use crate::units::Real;

/// How often the correction matrices are rebuilt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMatrixUpdate {
    /// Rebuild on every evaluation, particles move after all.
    #[default]
    EveryStep,
    /// Build once on the first evaluation and keep them for the rest of the run (quasi static geometry).
    Once,
}

/// Which arrays get their gradients corrected and against which sources.
#[derive(Clone, Debug)]
pub struct CorrectionConfig {
    pub dest: String,
    pub sources: Vec<String>,
    pub tolerance: Option<Real>,
    /// Also scale kernel values with the one-shot kernel sum correction.
    pub kernel_sum_correction: bool,
}

impl CorrectionConfig {
    pub fn new(dest: &str, sources: &[&str]) -> CorrectionConfig {
        CorrectionConfig {
            dest: dest.to_owned(),
            sources: sources.iter().map(|s| (*s).to_owned()).collect(),
            tolerance: None,
            kernel_sum_correction: false,
        }
    }

    fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(String::as_str).collect()
    }
}

/// Returns a new list of groups with the correction stage injected. `scheme_groups` is left untouched.
pub fn assemble_equations(scheme_groups: &[Group], correction: &CorrectionConfig) -> Vec<Group> {
    let sources = correction.source_names();

    let mut groups = Vec::with_capacity(scheme_groups.len() + 1);
    groups.push(Group::new(
        vec![Equation::gradient_correction_pre_step(&correction.dest, &sources)],
        false,
    ));

    for group in scheme_groups.iter() {
        let mut equations = Vec::with_capacity(group.equations().len() + 2);
        equations.push(Equation::gradient_correction(&correction.dest, &sources, correction.tolerance));
        if correction.kernel_sum_correction {
            equations.push(Equation::kernel_correction(&correction.dest, &sources));
        }
        equations.extend(group.equations().iter().cloned());
        groups.push(Group::new(equations, group.is_real()));
    }

    debug_assert!(check_ordering(&groups).is_ok(), "assembled pipeline violates the correction ordering");
    groups
}

/// Validates that correction matrices are built before anything uses them and that
/// every group corrects gradients before any of its equations reads one.
///
/// Only arrays with a pre-step are corrected. Equations on other destinations (walls) read raw gradients.
pub fn check_ordering(groups: &[Group]) -> Result<(), PipelineError> {
    let leading = groups.first().ok_or(PipelineError::Empty)?;
    if leading.is_real() || !leading.contains_gradient_correction_pre_step() {
        return Err(PipelineError::MissingPreStep);
    }
    let prepared = |array: &str| {
        leading
            .equations()
            .iter()
            .any(|e| e.is_gradient_correction_pre_step() && e.dest() == array)
    };

    for (group_index, group) in groups.iter().enumerate().skip(1) {
        match group.equations().first() {
            Some(first) if first.is_gradient_correction() => (),
            Some(first) => {
                return Err(PipelineError::MissingCorrection {
                    group: group_index,
                    found: first.name(),
                })
            }
            None => {
                return Err(PipelineError::MissingCorrection {
                    group: group_index,
                    found: "nothing",
                })
            }
        }

        for (position, equation) in group.equations().iter().enumerate() {
            if equation.is_gradient_correction() && !prepared(equation.dest()) {
                return Err(PipelineError::UnpreparedCorrection {
                    group: group_index,
                    array: equation.dest().to_owned(),
                });
            }
            if !equation.reads_kernel_gradient() || !prepared(equation.dest()) {
                continue;
            }
            // corrections only act on pairs of their own destination and listed sources
            let earlier = &group.equations()[..position];
            for source in equation.sources() {
                let corrected = earlier
                    .iter()
                    .any(|e| e.is_gradient_correction() && e.dest() == equation.dest() && e.has_source(source));
                if !corrected {
                    return Err(PipelineError::UncorrectedGradient {
                        group: group_index,
                        equation: equation.name(),
                        array: source.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sph::equations::{Momentum, TaitEos};
    use crate::units::Vector;

    fn scheme_groups() -> Vec<Group> {
        let eos = TaitEos::new(100.0, 60.0, 7.0);
        let momentum = Momentum {
            alpha: 0.2,
            beta: 0.0,
            gravity: Vector::new(0.0, -9.81),
        };
        vec![
            Group::new(
                vec![Equation::tait_eos("fluid", eos), Equation::tait_eos_hg_correction("dam", eos)],
                false,
            ),
            Group::new(
                vec![
                    Equation::continuity("fluid", &["fluid", "dam"]),
                    Equation::momentum("fluid", &["fluid", "dam"], momentum),
                    Equation::xsph_correction("fluid", &["fluid"], 0.5),
                    Equation::continuity("dam", &["fluid"]),
                ],
                true,
            ),
        ]
    }

    #[test]
    fn every_group_starts_with_a_correction() {
        let scheme = scheme_groups();
        let groups = assemble_equations(&scheme, &CorrectionConfig::new("fluid", &["fluid", "dam"]));

        assert_eq!(groups.len(), scheme.len() + 1);
        assert!(!groups[0].is_real());
        assert_eq!(groups[0].equations().len(), 1);
        assert!(groups[0].equations()[0].is_gradient_correction_pre_step());

        for (assembled, original) in groups[1..].iter().zip(scheme.iter()) {
            assert!(assembled.equations()[0].is_gradient_correction());
            assert_eq!(assembled.equations().len(), original.equations().len() + 1);
            assert_eq!(assembled.is_real(), original.is_real());
            let names: Vec<&str> = assembled.equations()[1..].iter().map(Equation::name).collect();
            let expected: Vec<&str> = original.equations().iter().map(Equation::name).collect();
            assert_eq!(names, expected);
        }
        assert!(check_ordering(&groups).is_ok());
    }

    #[test]
    fn scheme_groups_are_not_modified() {
        let scheme = scheme_groups();
        let _ = assemble_equations(&scheme, &CorrectionConfig::new("fluid", &["fluid", "dam"]));
        assert_eq!(scheme[1].equations()[0].name(), "Continuity");
        assert_eq!(scheme[0].equations().len(), 2);
    }

    #[test]
    fn kernel_correction_follows_gradient_correction() {
        let mut config = CorrectionConfig::new("fluid", &["fluid", "dam"]);
        config.kernel_sum_correction = true;
        let groups = assemble_equations(&scheme_groups(), &config);
        for group in groups[1..].iter() {
            assert_eq!(group.equations()[0].name(), "GradientCorrection");
            assert_eq!(group.equations()[1].name(), "KernelCorrection");
        }
        assert!(check_ordering(&groups).is_ok());
    }

    #[test]
    fn unassembled_scheme_is_rejected() {
        assert!(matches!(check_ordering(&[]), Err(PipelineError::Empty)));
        assert!(matches!(check_ordering(&scheme_groups()), Err(PipelineError::MissingPreStep)));
    }

    #[test]
    fn correction_in_a_later_position_is_rejected() {
        let mut groups = assemble_equations(&scheme_groups(), &CorrectionConfig::new("fluid", &["fluid", "dam"]));
        let mut equations = groups[2].equations().to_vec();
        equations.rotate_left(1);
        groups[2] = Group::new(equations, true);

        match check_ordering(&groups) {
            Err(PipelineError::MissingCorrection { group, found }) => {
                assert_eq!(group, 2);
                assert_eq!(found, "Continuity");
            }
            other => panic!("expected a missing correction, got {:?}", other),
        }
    }

    #[test]
    fn uncorrected_source_is_rejected() {
        let mut groups = assemble_equations(&scheme_groups(), &CorrectionConfig::new("fluid", &["fluid", "dam"]));
        let mut equations = groups[2].equations().to_vec();
        equations[0] = Equation::gradient_correction("fluid", &["fluid"], None);
        groups[2] = Group::new(equations, true);

        match check_ordering(&groups) {
            Err(PipelineError::UncorrectedGradient { group, equation, array }) => {
                assert_eq!(group, 2);
                assert_eq!(equation, "Continuity");
                assert_eq!(array, "dam");
            }
            other => panic!("expected an uncorrected gradient, got {:?}", other),
        }
    }

    #[test]
    fn correction_without_pre_step_is_rejected() {
        let mut groups = assemble_equations(&scheme_groups(), &CorrectionConfig::new("fluid", &["fluid", "dam"]));
        groups[0] = Group::new(vec![Equation::gradient_correction_pre_step("dam", &["fluid", "dam"])], false);
        assert!(matches!(
            check_ordering(&groups),
            Err(PipelineError::UnpreparedCorrection { group: 1, .. })
        ));
    }

    #[test]
    fn walls_without_pre_step_read_raw_gradients() {
        let groups = assemble_equations(&scheme_groups(), &CorrectionConfig::new("fluid", &["fluid", "dam"]));
        assert!(groups[2].equations().iter().any(|e| e.dest() == "dam" && e.reads_kernel_gradient()));
        assert!(check_ordering(&groups).is_ok());

        // once the wall gets matrices, its gradients have to be corrected as well
        let mut prepared = groups.clone();
        prepared[0] = Group::new(
            vec![
                Equation::gradient_correction_pre_step("fluid", &["fluid", "dam"]),
                Equation::gradient_correction_pre_step("dam", &["fluid"]),
            ],
            false,
        );
        match check_ordering(&prepared) {
            Err(PipelineError::UncorrectedGradient { group, equation, array }) => {
                assert_eq!(group, 2);
                assert_eq!(equation, "Continuity");
                assert_eq!(array, "fluid");
            }
            other => panic!("expected an uncorrected gradient, got {:?}", other),
        }
    }

    #[test]
    fn update_policy_parses_from_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: CorrectionMatrixUpdate,
        }
        let parsed: Wrapper = toml::from_str("policy = \"once\"").unwrap();
        assert_eq!(parsed.policy, CorrectionMatrixUpdate::Once);
        assert_eq!(CorrectionMatrixUpdate::default(), CorrectionMatrixUpdate::EveryStep);
    }
}
