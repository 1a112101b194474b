use interstab::core::models::composition::{Composition, CompositionError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Invalid phase '{spec}': {source}")]
    InvalidComposition {
        spec: String,
        #[source]
        source: CompositionError,
    },

    #[error("Invalid energy '{value}' for phase '{spec}'. Expected 'FORMULA@ENERGY' (e.g., 'Li2O@-14.3').")]
    InvalidEnergy { spec: String, value: String },

    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidAssignment(String),
}

/// A phase named on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseSpec {
    /// Placed on the convex hull of its chemical system.
    OnHull(Composition),
    /// Total energy in eV per formula unit as written.
    WithEnergy(Composition, f64),
}

/// Parses `FORMULA` or `FORMULA@ENERGY`.
pub fn parse_phase(spec: &str) -> Result<PhaseSpec, ParseError> {
    let (formula, energy) = match spec.split_once('@') {
        Some((formula, energy)) => (formula, Some(energy)),
        None => (spec, None),
    };
    let composition: Composition =
        formula
            .trim()
            .parse()
            .map_err(|source| ParseError::InvalidComposition {
                spec: spec.to_string(),
                source,
            })?;
    match energy {
        None => Ok(PhaseSpec::OnHull(composition)),
        Some(value) => {
            let energy: f64 = value
                .trim()
                .parse()
                .ok()
                .filter(|e: &f64| e.is_finite())
                .ok_or_else(|| ParseError::InvalidEnergy {
                    spec: spec.to_string(),
                    value: value.to_string(),
                })?;
            Ok(PhaseSpec::WithEnergy(composition, energy))
        }
    }
}

/// Splits a `KEY=VALUE` override.
pub fn parse_assignment(pair: &str) -> Result<(&str, &str), ParseError> {
    pair.split_once('=')
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| ParseError::InvalidAssignment(pair.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_formula_is_placed_on_the_hull() {
        let PhaseSpec::OnHull(composition) = parse_phase("LiCoO2").unwrap() else {
            panic!("expected a phase on the hull");
        };
        assert_eq!(composition.reduced_formula(), "LiCoO2");
    }

    #[test]
    fn explicit_energy_is_parsed() {
        let spec = parse_phase("Li2O@-14.3").unwrap();
        let PhaseSpec::WithEnergy(composition, energy) = spec else {
            panic!("expected an explicit energy");
        };
        assert_eq!(composition.reduced_formula(), "Li2O");
        assert_eq!(energy, -14.3);
    }

    #[test]
    fn malformed_phases_are_rejected() {
        assert!(matches!(
            parse_phase("Xq2O"),
            Err(ParseError::InvalidComposition { .. })
        ));
        assert!(matches!(
            parse_phase("Li2O@low"),
            Err(ParseError::InvalidEnergy { .. })
        ));
        assert!(matches!(
            parse_phase("Li2O@inf"),
            Err(ParseError::InvalidEnergy { .. })
        ));
    }

    #[test]
    fn assignments_split_on_the_first_equals_sign() {
        assert_eq!(
            parse_assignment("cache-dir=/data/a=b").unwrap(),
            ("cache-dir", "/data/a=b")
        );
        assert_eq!(
            parse_assignment("novalue"),
            Err(ParseError::InvalidAssignment("novalue".to_string()))
        );
        assert!(parse_assignment("=1").is_err());
    }
}
