use phf::phf_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

/// Amounts below this value are treated as absent from a composition.
pub const AMOUNT_TOLERANCE: f64 = 1e-10;

const INTEGER_TOLERANCE: f64 = 1e-6;

/// Reduced formulas conventionally written as a multiple of themselves: diatomic gases and
/// the alkali (and hydrogen) peroxides.
static SPECIAL_FORMULAS: phf::Map<&'static str, f64> = phf_map! {
    "H" => 2.0, "N" => 2.0, "O" => 2.0, "F" => 2.0, "Cl" => 2.0,
    "HO" => 2.0, "LiO" => 2.0, "NaO" => 2.0, "KO" => 2.0, "RbO" => 2.0, "CsO" => 2.0,
};

/// Atomic number and Pauling electronegativity of every supported element.
///
/// Noble gases without a tabulated electronegativity sort last in formulas.
static PERIODIC_TABLE: phf::Map<&'static str, (u8, f64)> = phf_map! {
    "H" => (1, 2.20), "He" => (2, f64::INFINITY), "Li" => (3, 0.98), "Be" => (4, 1.57),
    "B" => (5, 2.04), "C" => (6, 2.55), "N" => (7, 3.04), "O" => (8, 3.44),
    "F" => (9, 3.98), "Ne" => (10, f64::INFINITY), "Na" => (11, 0.93), "Mg" => (12, 1.31),
    "Al" => (13, 1.61), "Si" => (14, 1.90), "P" => (15, 2.19), "S" => (16, 2.58),
    "Cl" => (17, 3.16), "Ar" => (18, f64::INFINITY), "K" => (19, 0.82), "Ca" => (20, 1.00),
    "Sc" => (21, 1.36), "Ti" => (22, 1.54), "V" => (23, 1.63), "Cr" => (24, 1.66),
    "Mn" => (25, 1.55), "Fe" => (26, 1.83), "Co" => (27, 1.88), "Ni" => (28, 1.91),
    "Cu" => (29, 1.90), "Zn" => (30, 1.65), "Ga" => (31, 1.81), "Ge" => (32, 2.01),
    "As" => (33, 2.18), "Se" => (34, 2.55), "Br" => (35, 2.96), "Kr" => (36, 3.00),
    "Rb" => (37, 0.82), "Sr" => (38, 0.95), "Y" => (39, 1.22), "Zr" => (40, 1.33),
    "Nb" => (41, 1.60), "Mo" => (42, 2.16), "Tc" => (43, 1.90), "Ru" => (44, 2.20),
    "Rh" => (45, 2.28), "Pd" => (46, 2.20), "Ag" => (47, 1.93), "Cd" => (48, 1.69),
    "In" => (49, 1.78), "Sn" => (50, 1.96), "Sb" => (51, 2.05), "Te" => (52, 2.10),
    "I" => (53, 2.66), "Xe" => (54, 2.60), "Cs" => (55, 0.79), "Ba" => (56, 0.89),
    "La" => (57, 1.10), "Ce" => (58, 1.12), "Pr" => (59, 1.13), "Nd" => (60, 1.14),
    "Pm" => (61, 1.13), "Sm" => (62, 1.17), "Eu" => (63, 1.20), "Gd" => (64, 1.20),
    "Tb" => (65, 1.10), "Dy" => (66, 1.22), "Ho" => (67, 1.23), "Er" => (68, 1.24),
    "Tm" => (69, 1.25), "Yb" => (70, 1.10), "Lu" => (71, 1.27), "Hf" => (72, 1.30),
    "Ta" => (73, 1.50), "W" => (74, 2.36), "Re" => (75, 1.90), "Os" => (76, 2.20),
    "Ir" => (77, 2.20), "Pt" => (78, 2.28), "Au" => (79, 2.54), "Hg" => (80, 2.00),
    "Tl" => (81, 1.62), "Pb" => (82, 2.33), "Bi" => (83, 2.02), "Po" => (84, 2.00),
    "At" => (85, 2.20), "Rn" => (86, 2.20), "Fr" => (87, 0.70), "Ra" => (88, 0.90),
    "Ac" => (89, 1.10), "Th" => (90, 1.30), "Pa" => (91, 1.50), "U" => (92, 1.38),
    "Np" => (93, 1.36), "Pu" => (94, 1.28),
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompositionError {
    #[error("Unknown element symbol: '{0}'")]
    UnknownElement(String),

    #[error("Invalid amount {amount} for element '{element}': amounts must be finite and non-negative")]
    InvalidAmount { element: String, amount: f64 },

    #[error("Invalid formula '{formula}': {reason}")]
    InvalidFormula { formula: String, reason: String },
}

/// Returns `true` if `symbol` is a known element symbol.
pub fn is_element(symbol: &str) -> bool {
    PERIODIC_TABLE.contains_key(symbol)
}

fn formula_order(symbol: &str) -> (f64, u8) {
    PERIODIC_TABLE
        .get(symbol)
        .map(|&(z, x)| (x, z))
        .unwrap_or((f64::INFINITY, u8::MAX))
}

/// An amount of each element, keyed by element symbol.
///
/// Amounts are always strictly positive; zero (or negligible) amounts are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    amounts: BTreeMap<String, f64>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a composition from `(symbol, amount)` pairs, accumulating repeated symbols.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::UnknownElement`] for symbols outside the periodic table and
    /// [`CompositionError::InvalidAmount`] for negative or non-finite amounts.
    pub fn from_amounts<I, S>(amounts: I) -> Result<Self, CompositionError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut composition = Self::new();
        for (symbol, amount) in amounts {
            let symbol = symbol.as_ref();
            if !is_element(symbol) {
                return Err(CompositionError::UnknownElement(symbol.to_string()));
            }
            if !amount.is_finite() || amount < 0.0 {
                return Err(CompositionError::InvalidAmount {
                    element: symbol.to_string(),
                    amount,
                });
            }
            composition.accumulate(symbol, amount);
        }
        Ok(composition)
    }

    fn accumulate(&mut self, symbol: &str, amount: f64) {
        let total = self.amounts.get(symbol).copied().unwrap_or(0.0) + amount;
        if total.abs() > AMOUNT_TOLERANCE {
            self.amounts.insert(symbol.to_string(), total);
        } else {
            self.amounts.remove(symbol);
        }
    }

    pub fn get(&self, symbol: &str) -> f64 {
        self.amounts.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.amounts.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(el, &amt)| (el.as_str(), amt))
    }

    /// Element symbols in alphabetical order.
    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.amounts.keys().map(String::as_str)
    }

    pub fn chemical_system(&self) -> Vec<String> {
        self.amounts.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn is_element(&self) -> bool {
        self.amounts.len() == 1
    }

    pub fn num_atoms(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Returns a copy with every amount multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        let mut scaled = Self::new();
        for (el, &amt) in &self.amounts {
            scaled.accumulate(el, amt * factor);
        }
        scaled
    }

    /// Atomic fractions; the result sums to one (empty compositions stay empty).
    pub fn fractional(&self) -> Self {
        let total = self.num_atoms();
        if total <= AMOUNT_TOLERANCE {
            return self.clone();
        }
        self.scaled(1.0 / total)
    }

    pub fn fraction(&self, symbol: &str) -> f64 {
        let total = self.num_atoms();
        if total <= AMOUNT_TOLERANCE {
            0.0
        } else {
            self.get(symbol) / total
        }
    }

    /// Returns a copy without the given elements.
    pub fn without<S: AsRef<str>>(&self, elements: &[S]) -> Self {
        let amounts = self
            .amounts
            .iter()
            .filter(|(el, _)| !elements.iter().any(|e| e.as_ref() == el.as_str()))
            .map(|(el, &amt)| (el.clone(), amt))
            .collect();
        Self { amounts }
    }

    /// Compares element by element within `tolerance`.
    pub fn almost_equals(&self, other: &Self, tolerance: f64) -> bool {
        let symbols: BTreeSet<&str> = self.elements().chain(other.elements()).collect();
        symbols
            .into_iter()
            .all(|el| (self.get(el) - other.get(el)).abs() <= tolerance)
    }

    /// The composition divided by its greatest common integer factor, together with that
    /// factor. Non-integral compositions are returned unchanged with a factor of one.
    ///
    /// Diatomic gases reduce to their molecule (`O2`, `Cl2`) and peroxides keep their
    /// conventional unit (`Li2O2`, `H2O2`).
    pub fn reduced_composition_and_factor(&self) -> (Self, f64) {
        let integral: Option<Vec<u64>> = self
            .amounts
            .values()
            .map(|&amt| {
                let rounded = amt.round();
                ((amt - rounded).abs() < INTEGER_TOLERANCE && rounded >= 1.0).then_some(rounded as u64)
            })
            .collect();
        let (reduced, factor) = match integral {
            Some(counts) if !counts.is_empty() => {
                let factor = counts.into_iter().reduce(gcd).unwrap_or(1) as f64;
                (self.scaled(1.0 / factor), factor)
            }
            _ => return (self.clone(), 1.0),
        };
        match SPECIAL_FORMULAS.get(reduced.formula().as_str()) {
            Some(&multiple) => (reduced.scaled(multiple), factor / multiple),
            None => (reduced, factor),
        }
    }

    pub fn reduced_composition(&self) -> Self {
        self.reduced_composition_and_factor().0
    }

    pub fn reduced_formula(&self) -> String {
        self.reduced_composition().formula()
    }

    /// Formula with elements ordered by electronegativity (`LiCoO2`, `Li3PS4`).
    pub fn formula(&self) -> String {
        let mut symbols: Vec<&str> = self.elements().collect();
        symbols.sort_by(|a, b| {
            formula_order(a)
                .partial_cmp(&formula_order(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        symbols
            .into_iter()
            .map(|el| format!("{}{}", el, format_amount(self.get(el))))
            .collect()
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn format_amount(amount: f64) -> String {
    if (amount - 1.0).abs() < INTEGER_TOLERANCE {
        String::new()
    } else if (amount - amount.round()).abs() < INTEGER_TOLERANCE {
        format!("{}", amount.round() as i64)
    } else {
        let text = format!("{:.4}", amount);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

impl Add<&Composition> for &Composition {
    type Output = Composition;

    fn add(self, rhs: &Composition) -> Composition {
        let mut sum = self.clone();
        for (el, amt) in rhs.iter() {
            sum.accumulate(el, amt);
        }
        sum
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formula())
    }
}

impl FromStr for Composition {
    type Err = CompositionError;

    fn from_str(formula: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = formula.chars().filter(|c| !c.is_whitespace()).collect();
        let mut parser = FormulaParser {
            formula,
            chars: &chars,
            pos: 0,
        };
        let composition = parser.parse_group()?;
        if parser.pos != chars.len() {
            return Err(parser.error("unbalanced closing parenthesis"));
        }
        if composition.is_empty() {
            return Err(parser.error("formula contains no elements"));
        }
        Ok(composition)
    }
}

struct FormulaParser<'a> {
    formula: &'a str,
    chars: &'a [char],
    pos: usize,
}

impl FormulaParser<'_> {
    fn error(&self, reason: &str) -> CompositionError {
        CompositionError::InvalidFormula {
            formula: self.formula.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse_group(&mut self) -> Result<Composition, CompositionError> {
        let mut composition = Composition::new();
        while let Some(c) = self.peek() {
            match c {
                '(' | '[' => {
                    self.pos += 1;
                    let inner = self.parse_group()?;
                    match self.peek() {
                        Some(')') | Some(']') => self.pos += 1,
                        _ => return Err(self.error("missing closing parenthesis")),
                    }
                    let count = self.parse_count()?;
                    composition = &composition + &inner.scaled(count);
                }
                ')' | ']' => break,
                c if c.is_ascii_uppercase() => {
                    let mut symbol = c.to_string();
                    self.pos += 1;
                    while let Some(next) = self.peek().filter(char::is_ascii_lowercase) {
                        symbol.push(next);
                        self.pos += 1;
                    }
                    if !is_element(&symbol) {
                        return Err(CompositionError::UnknownElement(symbol));
                    }
                    let count = self.parse_count()?;
                    composition.accumulate(&symbol, count);
                }
                other => {
                    return Err(self.error(&format!("unexpected character '{}'", other)));
                }
            }
        }
        Ok(composition)
    }

    fn parse_count(&mut self) -> Result<f64, CompositionError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(1.0);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| self.error(&format!("invalid amount '{}'", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(formula: &str) -> Composition {
        formula.parse().unwrap()
    }

    #[test]
    fn parses_simple_formula() {
        let c = comp("Li3PS4");
        assert_eq!(c.get("Li"), 3.0);
        assert_eq!(c.get("P"), 1.0);
        assert_eq!(c.get("S"), 4.0);
        assert_eq!(c.num_atoms(), 8.0);
    }

    #[test]
    fn parses_parenthesised_groups_and_repeated_elements() {
        let c = comp("Ca3(PO4)2");
        assert_eq!(c.get("Ca"), 3.0);
        assert_eq!(c.get("P"), 2.0);
        assert_eq!(c.get("O"), 8.0);

        let repeated = comp("CH3COOH");
        assert_eq!(repeated.get("C"), 2.0);
        assert_eq!(repeated.get("H"), 4.0);
        assert_eq!(repeated.get("O"), 2.0);
    }

    #[test]
    fn parses_fractional_amounts() {
        let c = comp("Li0.5Co0.5O");
        assert!((c.get("Li") - 0.5).abs() < 1e-12);
        assert!((c.num_atoms() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_unknown_elements_and_bad_syntax() {
        assert_eq!(
            "Xx2O".parse::<Composition>(),
            Err(CompositionError::UnknownElement("Xx".to_string()))
        );
        assert!(matches!(
            "Li2(O".parse::<Composition>(),
            Err(CompositionError::InvalidFormula { .. })
        ));
        assert!(matches!(
            "Li2O)".parse::<Composition>(),
            Err(CompositionError::InvalidFormula { .. })
        ));
        assert!(matches!(
            "".parse::<Composition>(),
            Err(CompositionError::InvalidFormula { .. })
        ));
    }

    #[test]
    fn from_amounts_rejects_negative_amounts() {
        let result = Composition::from_amounts([("Li", -1.0)]);
        assert!(matches!(result, Err(CompositionError::InvalidAmount { .. })));
    }

    #[test]
    fn zero_amounts_are_dropped() {
        let c = Composition::from_amounts([("Li", 1.0), ("O", 0.0)]).unwrap();
        assert_eq!(c.chemical_system(), vec!["Li".to_string()]);
        assert!(c.is_element());
    }

    #[test]
    fn formula_orders_by_electronegativity() {
        assert_eq!(comp("O2CoLi").formula(), "LiCoO2");
        assert_eq!(comp("S4PLi3").formula(), "Li3PS4");
    }

    #[test]
    fn reduced_formula_divides_by_gcd() {
        assert_eq!(comp("Li4O2").reduced_formula(), "Li2O");
        assert_eq!(comp("Li4O4").reduced_formula(), "Li2O2");
        let (reduced, factor) = comp("Li6P2S8").reduced_composition_and_factor();
        assert_eq!(factor, 2.0);
        assert_eq!(reduced, comp("Li3PS4"));
    }

    #[test]
    fn diatomic_gases_reduce_to_the_molecule() {
        assert_eq!(comp("O2").reduced_formula(), "O2");
        assert_eq!(comp("Cl6").reduced_formula(), "Cl2");
        let (reduced, factor) = comp("O").reduced_composition_and_factor();
        assert_eq!(reduced, comp("O2"));
        assert_eq!(factor, 0.5);
        assert_eq!(comp("Li2").reduced_formula(), "Li");
    }

    #[test]
    fn peroxides_keep_their_conventional_unit() {
        assert_eq!(comp("Li2O2").reduced_formula(), "Li2O2");
        assert_eq!(comp("NaO").reduced_formula(), "Na2O2");
        assert_eq!(comp("H4O4").reduced_formula(), "H2O2");
        let (reduced, factor) = comp("K4O4").reduced_composition_and_factor();
        assert_eq!(reduced, comp("K2O2"));
        assert_eq!(factor, 2.0);
        assert_eq!(comp("Li2O").reduced_formula(), "Li2O");
        assert_eq!(comp("KO2").reduced_formula(), "KO2");
    }

    #[test]
    fn fractional_composition_sums_to_one() {
        let frac = comp("Li2O").fractional();
        assert!((frac.num_atoms() - 1.0).abs() < 1e-12);
        assert!((frac.get("Li") - 2.0 / 3.0).abs() < 1e-12);
        assert!((comp("Li2O").fraction("O") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn addition_and_removal_of_elements() {
        let sum = &comp("Li2O") + &comp("CoO");
        assert_eq!(sum.get("O"), 2.0);
        assert_eq!(sum.chemical_system(), vec!["Co", "Li", "O"]);
        let reduced = sum.without(&["Li"]);
        assert_eq!(reduced.chemical_system(), vec!["Co", "O"]);
    }

    #[test]
    fn almost_equals_uses_tolerance() {
        let a = comp("Li2O");
        let b = Composition::from_amounts([("Li", 2.0 + 1e-9), ("O", 1.0)]).unwrap();
        assert!(a.almost_equals(&b, 1e-8));
        assert!(!a.almost_equals(&comp("Li2O2"), 1e-8));
    }
}
