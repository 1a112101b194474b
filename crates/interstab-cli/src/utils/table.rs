use crate::error::{CliError, Result};
use interstab::engine::profile::ScanResult;
use interstab::workflows::pseudo_binary::ProfileRow;
use interstab::workflows::single_phase::{ElementProfile, PhaseEquilibrium};
use std::fmt::Write as _;
use std::path::Path;

const RULE_WIDTH: usize = 60;

/// Plain-text table with columns padded to their widest cell.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn render(&self) -> String {
        let widths: Vec<usize> = (0..self.headers.len())
            .map(|col| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .chain(std::iter::once(&self.headers[col]))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:^width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = line(&self.headers);
        for row in &self.rows {
            out.push('\n');
            out.push_str(&line(row));
        }
        out
    }
}

fn profile_headers(name1: &str, name2: &str) -> Vec<String> {
    vec![
        format!("x({name1})"),
        format!("x({name2})"),
        "Rxn. E. (meV/atom)".to_string(),
        "Mutual Rxn. E. (meV/atom)".to_string(),
        "Phase Equilibria".to_string(),
        "Comment".to_string(),
    ]
}

/// The mixing profile of `name1` and `name2` as an aligned table under `title`.
pub fn render_profile(title: &str, name1: &str, name2: &str, rows: &[ProfileRow]) -> String {
    let table = Table {
        headers: profile_headers(name1, name2),
        rows: rows
            .iter()
            .map(|row| {
                vec![
                    format!("{:.4}", row.x_entry1),
                    format!("{:.4}", row.x_entry2),
                    format!("{:.2}", row.reaction_energy),
                    format!("{:.2}", row.mutual_reaction_energy),
                    row.phases.clone(),
                    row.comment.to_string(),
                ]
            })
            .collect(),
    };
    format!(" ===  {title}  === \n{}", table.render())
}

/// Windows and transition energetics of a chemical potential scan.
pub fn render_scan(result: &ScanResult, name1: &str, name2: &str) -> String {
    let element = &result.open_element;
    let windows = Table {
        headers: vec![
            format!("mu_{element} low (eV)"),
            format!("mu_{element} high (eV)"),
            "Phase Equilibria at Min. Mutual Rxn. E.".to_string(),
        ],
        rows: result
            .windows
            .iter()
            .map(|w| {
                vec![
                    format!("{:.4}", w.mu_low),
                    format!("{:.4}", w.mu_high),
                    w.label.clone(),
                ]
            })
            .collect(),
    };
    let transitions = Table {
        headers: vec![
            format!("mu_{element} (eV)"),
            "Rxn. E. (meV/atom)".to_string(),
            "Mutual Rxn. E. (meV/atom)".to_string(),
        ],
        rows: result
            .transitions
            .iter()
            .map(|t| {
                vec![
                    format!("{:.4}", t.mu),
                    format!("{:.2}", t.reaction_energy * 1000.0),
                    format!("{:.2}", t.mutual_reaction_energy * 1000.0),
                ]
            })
            .collect(),
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(
        out,
        "Pseudo-binary {name1} / {name2}, open element {element}, chemical potentials relative to the elemental phase."
    );
    let _ = writeln!(out, " ===  Phase equilibria windows  === \n{}", windows.render());
    let _ = write!(out, " ===  Reaction energies at window boundaries  === \n{}", transitions.render());
    out
}

/// Phase equilibria and decomposition reaction of one composition.
pub fn render_equilibrium(equilibrium: &PhaseEquilibrium, open: Option<(&str, f64)>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(out, "Reduced formula of the given composition: {}", equilibrium.formula);
    if let Some((element, mu)) = open {
        let _ = writeln!(
            out,
            "Chemical potential mu_{element} = {mu} eV, referenced to the elemental phase."
        );
    }
    let _ = writeln!(out, "Calculated phase equilibria: {}", equilibrium.phases.join("\t"));
    let _ = writeln!(
        out,
        "Energy above hull: {:.2} meV/atom",
        equilibrium.energy_above_hull * 1000.0
    );
    let _ = writeln!(out, "Decomposition reaction: {}", equilibrium.reaction);
    let _ = write!(
        out,
        "Reaction energy: {:.4} eV per formula unit",
        equilibrium.reaction_energy()
    );
    out
}

/// Stages of an element evolution profile, their reaction energies and the stability window.
pub fn render_element_profile(profile: &ElementProfile) -> String {
    let element = &profile.element;
    let stages = Table {
        headers: vec![
            "mu_high (eV)".to_string(),
            "mu_low (eV)".to_string(),
            format!("d(n_{element})"),
            "Phase equilibria".to_string(),
            "Reaction".to_string(),
        ],
        rows: profile
            .stages
            .iter()
            .map(|stage| {
                vec![
                    format!("{:.2}", stage.mu_high),
                    format!("{:.2}", stage.mu_low),
                    format!("{:.2}", stage.evolution),
                    stage.phases.join(", "),
                    stage.reaction.to_string(),
                ]
            })
            .collect(),
    };
    let energies = Table {
        headers: vec![
            format!("mu_{element} (eV)"),
            "Rxn. E. (eV/atom)".to_string(),
        ],
        rows: profile
            .stages
            .iter()
            .filter(|stage| stage.mu_high.is_finite())
            .map(|stage| {
                vec![
                    format!("{:.2}", stage.mu_high),
                    format!("{:.4}", stage.reaction_energy_at(stage.mu_high) / profile.atoms),
                ]
            })
            .collect(),
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(out, "Reduced formula of the given composition: {}", profile.formula);
    let _ = writeln!(out, " ===  Evolution profile  === \n{}", stages.render());
    let _ = writeln!(out, " ===  Reaction energy  === \n{}", energies.render());
    match profile.stability_window() {
        Some((low, high)) => {
            let _ = writeln!(out, "Stability window: {low:.4} eV <= mu_{element} <= {high:.4} eV");
        }
        None => {
            let _ = writeln!(out, "Stability window: none");
        }
    }
    let _ = write!(
        out,
        "Chemical potentials are referenced to the elemental phase; reaction energies are per atom of {}.",
        profile.formula
    );
    out
}

/// Writes the profile rows as CSV with the same columns as [`render_profile`].
pub fn write_profile_csv(path: &Path, name1: &str, name2: &str, rows: &[ProfileRow]) -> Result<()> {
    let csv_error = |e: csv::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer
        .write_record(profile_headers(name1, name2))
        .map_err(csv_error)?;
    for row in rows {
        writer
            .write_record([
                row.x_entry1.to_string(),
                row.x_entry2.to_string(),
                row.reaction_energy.to_string(),
                row.mutual_reaction_energy.to_string(),
                row.phases.clone(),
                row.comment.to_string(),
            ])
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}
