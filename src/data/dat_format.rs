//! Headered two-column text format (`.dat`, `.xy`, `.txt`).
//!
//! Layout:
//!   - optional first line: free-form header (usually `<specimen> <sample>`)
//!   - one `x y` pair per line, whitespace separated
//!   - blank lines are ignored
//!
//! The writer emits the header line followed by `%.8f %.8f` rows.

use std::io::{self, BufRead, Write};
use std::path::Path;

use super::pattern::XyPattern;
use crate::error::{Result, XrdError};

/// Parsed text file: header line (if any) and the pattern
#[derive(Debug, Clone)]
pub struct DatFile {
    pub header: Option<String>,
    pub pattern: XyPattern,
}

/// Read a text pattern file
pub fn read_dat_file(path: &Path, has_header: bool) -> Result<DatFile> {
    let file = std::fs::File::open(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    read_dat(io::BufReader::new(file), &name, has_header)
}

/// Parse text pattern data from any buffered reader
pub fn read_dat<R: BufRead>(reader: R, name: &str, has_header: bool) -> Result<DatFile> {
    let mut header = None;
    let mut x = Vec::new();
    let mut y = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i == 0 && has_header {
            header = Some(line.trim().to_string());
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (xv, yv) = parse_xy_line(trimmed).ok_or_else(|| XrdError::MalformedLine {
            line: i + 1,
            content: trimmed.to_string(),
        })?;
        x.push(xv);
        y.push(yv);
    }

    let pattern = XyPattern::from_xy(name, x, y)?;
    log::debug!(
        "Parsed {} points from text pattern '{}'",
        pattern.len(),
        name
    );
    Ok(DatFile { header, pattern })
}

fn parse_xy_line(line: &str) -> Option<(f64, f64)> {
    let mut fields = line.split_whitespace();
    let x = fields.next()?.parse::<f64>().ok()?;
    let y = fields.next()?.parse::<f64>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((x, y))
}

/// Write a pattern with a single header line
pub fn write_dat<W: Write>(writer: &mut W, header: &str, pattern: &XyPattern) -> Result<()> {
    writeln!(writer, "{}", header)?;
    for (x, y) in pattern.points() {
        writeln!(writer, "{:.8} {:.8}", x, y)?;
    }
    Ok(())
}

pub fn write_dat_file(path: &Path, header: &str, pattern: &XyPattern) -> Result<()> {
    let mut out = io::BufWriter::new(std::fs::File::create(path)?);
    write_dat(&mut out, header, pattern)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header() {
        let text = "Specimen 1 AD\n2.0 100\n2.02 110.5\n\n2.04 98\n";
        let dat = read_dat(text.as_bytes(), "s1", true).unwrap();
        assert_eq!(dat.header.as_deref(), Some("Specimen 1 AD"));
        assert_eq!(dat.pattern.len(), 3);
        assert_eq!(dat.pattern.y()[1], 110.5);
    }

    #[test]
    fn test_parse_without_header() {
        let text = "1 10\n2 20\n";
        let dat = read_dat(text.as_bytes(), "s", false).unwrap();
        assert!(dat.header.is_none());
        assert_eq!(dat.pattern.x(), &[1.0, 2.0]);
    }

    #[test]
    fn test_malformed_line_reports_number() {
        let text = "header\n1 10\n2 twenty\n";
        let err = read_dat(text.as_bytes(), "s", true).unwrap_err();
        match err {
            XrdError::MalformedLine { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_format() {
        let p = XyPattern::from_xy("s", vec![1.0, 2.5], vec![3.0, 4.125]).unwrap();
        let mut buf = Vec::new();
        write_dat(&mut buf, "Name Sample", &p).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Name Sample\n1.00000000 3.00000000\n2.50000000 4.12500000\n"
        );
    }
}
