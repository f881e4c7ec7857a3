//! Specimen markers and their CSV exchange format.
//!
//! CSV layout: a `Label,Position` header, then one marker per row.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub label: String,
    /// Position in °2θ
    pub position: f64,
    pub visible: bool,
    pub color: String,
}

impl Marker {
    pub fn new(label: &str, position: f64) -> Self {
        Self {
            label: label.to_string(),
            position,
            visible: true,
            color: "#000000".to_string(),
        }
    }
}

/// One CSV row; style fields are not exchanged
#[derive(Debug, Serialize, Deserialize)]
struct MarkerRow {
    #[serde(rename = "Label")]
    label: String,
    #[serde(rename = "Position")]
    position: f64,
}

/// Write markers as CSV with a `Label,Position` header
pub fn write_markers<W: io::Write>(writer: W, markers: &[Marker]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for m in markers {
        wtr.serialize(MarkerRow {
            label: m.label.clone(),
            position: m.position,
        })?;
    }
    if markers.is_empty() {
        wtr.write_record(["Label", "Position"])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read markers from CSV; the first record is the header
pub fn read_markers<R: io::Read>(reader: R) -> Result<Vec<Marker>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut markers = Vec::new();
    for row in rdr.deserialize::<MarkerRow>() {
        let row = row?;
        markers.push(Marker::new(&row.label, row.position));
    }
    Ok(markers)
}

pub fn save_markers_csv(markers: &[Marker], path: &Path) -> Result<()> {
    write_markers(std::fs::File::create(path)?, markers)?;
    log::info!("Saved {} markers to {}", markers.len(), path.display());
    Ok(())
}

pub fn load_markers_csv(path: &Path) -> Result<Vec<Marker>> {
    let markers = read_markers(std::fs::File::open(path)?)?;
    log::info!("Loaded {} markers from {}", markers.len(), path.display());
    Ok(markers)
}
