use crate::core::models::composition::Composition;
use nalgebra::{DMatrix, SymmetricEigen};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

const NULL_SPACE_TOLERANCE: f64 = 1e-9;
const COEFFICIENT_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BalanceError {
    #[error("No balanced reaction exists: {reason}")]
    NoBalance { reason: String },

    #[error("Species {species} has a vanishing coefficient in the balanced reaction")]
    DegenerateCoefficient { species: String },
}

/// A named composition taking part in a reaction, with its energy per formula unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub name: String,
    pub composition: Composition,
    pub energy: f64,
}

impl Species {
    pub fn new(name: impl Into<String>, composition: Composition, energy: f64) -> Self {
        Self {
            name: name.into(),
            composition,
            energy,
        }
    }
}

/// A balanced reaction. Coefficients are aligned with `species`; reactants are negative and
/// products positive, so `Σ cᵢ·compositionᵢ = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    species: Vec<Species>,
    coefficients: Vec<f64>,
}

impl Reaction {
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn coefficient(&self, index: usize) -> f64 {
        self.coefficients[index]
    }

    /// Rescales the reaction so species `index` has coefficient magnitude `amount`.
    pub fn normalized_to(&self, index: usize, amount: f64) -> Self {
        let current = self.coefficients[index].abs();
        if current < COEFFICIENT_TOLERANCE {
            return self.clone();
        }
        let factor = amount / current;
        Self {
            species: self.species.clone(),
            coefficients: self.coefficients.iter().map(|c| c * factor).collect(),
        }
    }

    /// `Σ cᵢ·Eᵢ`: products minus reactants.
    pub fn energy(&self) -> f64 {
        self.species
            .iter()
            .zip(&self.coefficients)
            .map(|(s, c)| c * s.energy)
            .sum()
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |sign: f64| {
            self.species
                .iter()
                .zip(&self.coefficients)
                .filter(|&(_, &c)| c * sign > COEFFICIENT_TOLERANCE)
                .map(|(s, &c)| format_term(c.abs(), &s.name))
                .collect::<Vec<_>>()
                .join(" + ")
        };
        write!(f, "{} -> {}", side(-1.0), side(1.0))
    }
}

fn format_term(coefficient: f64, name: &str) -> String {
    if (coefficient - 1.0).abs() < 1e-4 {
        name.to_string()
    } else {
        let text = format!("{:.4}", coefficient);
        format!("{} {}", text.trim_end_matches('0').trim_end_matches('.'), name)
    }
}

/// Balances reactions between species.
pub trait ReactionBalancer {
    /// Finds coefficients with reactants consumed and products formed that conserve every
    /// element. The first reactant is normalized to a coefficient of `-1`.
    ///
    /// # Errors
    ///
    /// [`BalanceError::NoBalance`] if no unique balance exists or the first reactant cannot be
    /// consumed.
    fn balance(&self, reactants: &[Species], products: &[Species]) -> Result<Reaction, BalanceError>;
}

/// Balances reactions from the null space of the element-by-species composition matrix,
/// obtained as the zero-eigenvalue eigenvectors of `AᵀA`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpaceBalancer;

impl ReactionBalancer for NullSpaceBalancer {
    fn balance(&self, reactants: &[Species], products: &[Species]) -> Result<Reaction, BalanceError> {
        if reactants.is_empty() || products.is_empty() {
            return Err(BalanceError::NoBalance {
                reason: "a reaction needs at least one reactant and one product".to_string(),
            });
        }

        let species: Vec<Species> = reactants.iter().chain(products).cloned().collect();
        let elements: Vec<&str> = species
            .iter()
            .flat_map(|s| s.composition.elements())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let n = species.len();
        let matrix = DMatrix::from_fn(elements.len(), n, |r, c| {
            species[c].composition.get(elements[r])
        });

        let gram = matrix.transpose() * &matrix;
        let scale = gram.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
        let eigen = SymmetricEigen::new(gram);
        let null: Vec<usize> = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value.abs() < NULL_SPACE_TOLERANCE * scale)
            .map(|(i, _)| i)
            .collect();

        let column = match null.as_slice() {
            [single] => *single,
            [] => {
                return Err(BalanceError::NoBalance {
                    reason: "the compositions are linearly independent".to_string(),
                });
            }
            _ => {
                return Err(BalanceError::NoBalance {
                    reason: format!("{} independent reactions exist", null.len()),
                });
            }
        };

        let vector = eigen.eigenvectors.column(column);
        let first = vector[0];
        if first.abs() < COEFFICIENT_TOLERANCE {
            return Err(BalanceError::NoBalance {
                reason: format!("{} does not take part in any balance", species[0].name),
            });
        }
        let factor = -1.0 / first;
        let coefficients = vector
            .iter()
            .map(|&v| {
                let c = v * factor;
                if c.abs() < COEFFICIENT_TOLERANCE { 0.0 } else { c }
            })
            .collect();

        Ok(Reaction {
            species,
            coefficients,
        })
    }
}
