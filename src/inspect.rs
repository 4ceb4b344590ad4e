//! Inspection of gridded output files
//!
//! Prints the global attributes, dimensions and per-band statistics of a
//! file written by [`crate::netcdf_io::GridWriter`]. NaN cells are treated as
//! masked and left out of every statistic.

use crate::errors::Result;
use netcdf::{AttributeValue, File, Variable};

/// Quick statistics of one band variable
#[derive(Debug, Clone, PartialEq)]
pub struct BandSummary {
    pub variable: String,
    /// Band identifier from the `band` attribute
    pub band: Option<String>,
    pub units: Option<String>,
    pub shape: Vec<usize>,
    pub valid: usize,
    pub total: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub mean: Option<f64>,
}

impl BandSummary {
    pub fn masked(&self) -> usize {
        self.total - self.valid
    }
}

fn string_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// WKT strings run to hundreds of characters
fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

/// Summaries of every two-dimensional variable, in file order.
pub fn summarize_bands(file: &File) -> Result<Vec<BandSummary>> {
    let mut summaries = Vec::new();
    for var in file.variables() {
        if var.dimensions().len() != 2 {
            continue;
        }

        let data: Vec<f32> = var.get_values::<f32, _>(..)?;
        let (mut min, mut max, mut sum, mut valid) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f64, 0);
        for &v in data.iter().filter(|v| !v.is_nan()) {
            min = min.min(v);
            max = max.max(v);
            sum += f64::from(v);
            valid += 1;
        }

        summaries.push(BandSummary {
            variable: var.name(),
            band: string_attribute(&var, "band"),
            units: string_attribute(&var, "units"),
            shape: var.dimensions().iter().map(|d| d.len()).collect(),
            valid,
            total: data.len(),
            min: (valid > 0).then_some(min),
            max: (valid > 0).then_some(max),
            mean: (valid > 0).then(|| sum / valid as f64),
        });
    }
    Ok(summaries)
}

/// Prints global attributes, dimensions and band statistics of an output file.
pub fn print_metadata(file: &File) -> Result<()> {
    println!("\n===== Global Attributes =====");
    for attr in file.attributes() {
        match attr.value()? {
            AttributeValue::Str(s) => println!("- {}: {}", attr.name(), shorten(&s, 80)),
            other => println!("- {}: {:?}", attr.name(), other),
        }
    }

    println!("\n===== Dimensions =====");
    for dim in file.dimensions() {
        println!("- {} = {}", dim.name(), dim.len());
    }

    println!("\n===== Bands =====");
    let summaries = summarize_bands(file)?;
    if summaries.is_empty() {
        println!("   (No band variables found)");
    }
    for s in &summaries {
        println!(
            "- {} [{}] ({})",
            s.variable,
            s.band.as_deref().unwrap_or("?"),
            s.units.as_deref().unwrap_or("-")
        );
        match (s.min, s.mean, s.max) {
            (Some(min), Some(mean), Some(max)) => println!(
                "    valid {}/{}  min {:.4}  mean {:.4}  max {:.4}",
                s.valid, s.total, min, mean, max
            ),
            _ => println!("    all {} cells masked", s.total),
        }
    }

    Ok(())
}
