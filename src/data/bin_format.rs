//! Fixed-offset binary diffractometer format (`.raw`, `.bin`).
//!
//! Layout (little-endian):
//!   - bytes 214..238: step, min and max 2θ as three f64
//!   - bytes 250..    : u16 intensity samples
//!
//! The sample count is `floor((max - min) / step)` and sample `i` sits at
//! `min + i * step`. Everything else in the header is ignored on read and
//! zero-filled on write.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::pattern::XyPattern;
use crate::error::{Result, XrdError};

/// Offset of the step/min/max block
pub const LIMITS_OFFSET: u64 = 214;
/// Offset of the first intensity sample
pub const DATA_OFFSET: u64 = 250;

/// Tolerance for float rounding in the sample count
const COUNT_EPSILON: f64 = 1e-9;
/// Largest deviation from the regular grid accepted on write, as a fraction of the step
const GRID_TOLERANCE: f64 = 1e-6;

/// Scan limits stored in the header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinLimits {
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

impl BinLimits {
    /// Number of samples the header promises; saturates for absurd headers
    pub fn sample_count(&self) -> usize {
        self.span() as usize
    }

    fn span(&self) -> f64 {
        ((self.max - self.min) / self.step + COUNT_EPSILON).floor()
    }

    fn validate(&self) -> Result<()> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(XrdError::InvalidHeader(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if !(self.max >= self.min) || !self.min.is_finite() || !self.max.is_finite() {
            return Err(XrdError::InvalidHeader(format!(
                "invalid range {} .. {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Read a binary pattern file
pub fn read_bin_file(path: &Path) -> Result<XyPattern> {
    let file = std::fs::File::open(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    read_bin(&mut io::BufReader::new(file), &name)
}

/// Read a binary pattern from any seekable source
pub fn read_bin<R: Read + Seek>(reader: &mut R, name: &str) -> Result<XyPattern> {
    reader.seek(SeekFrom::Start(LIMITS_OFFSET))?;
    let limits = BinLimits {
        step: reader.read_f64::<LittleEndian>()?,
        min: reader.read_f64::<LittleEndian>()?,
        max: reader.read_f64::<LittleEndian>()?,
    };
    limits.validate()?;

    // the header alone must not decide how much we allocate
    let end = reader.seek(SeekFrom::End(0))?;
    let available = (end.saturating_sub(DATA_OFFSET) / 2) as usize;
    if limits.span() > available as f64 {
        return Err(XrdError::Truncated {
            expected: limits.sample_count(),
            got: available,
        });
    }
    let n = limits.sample_count();

    reader.seek(SeekFrom::Start(DATA_OFFSET))?;
    let mut samples = vec![0u16; n];
    reader.read_u16_into::<LittleEndian>(&mut samples)?;
    let x = (0..n).map(|i| limits.min + limits.step * i as f64).collect();
    let y = samples.into_iter().map(f64::from).collect();

    log::debug!(
        "Read binary pattern '{}': {} samples, {:.3}..{:.3} step {:.4}",
        name,
        n,
        limits.min,
        limits.max,
        limits.step
    );

    XyPattern::from_xy(name, x, y)
}

/// Write a pattern in the binary layout.
///
/// The pattern must be on a regular grid, otherwise `IrregularGrid` is
/// returned and nothing is written. Intensities are rounded and clamped to
/// the u16 range. The stored max is `min + n * step` so that the reader
/// recovers exactly `n` samples.
pub fn write_bin<W: Write>(writer: &mut W, pattern: &XyPattern) -> Result<()> {
    let n = pattern.len();
    let x = pattern.x();
    let (min, step) = match x {
        [] => (0.0, 1.0),
        [only] => (*only, 1.0),
        [first, second, ..] => (*first, *second - *first),
    };
    for (i, &got) in x.iter().enumerate().skip(2) {
        let expected = min + step * i as f64;
        if (got - expected).abs() > GRID_TOLERANCE * step {
            return Err(XrdError::IrregularGrid {
                index: i,
                expected,
                got,
            });
        }
    }
    let limits = BinLimits {
        step,
        min,
        max: min + n as f64 * step,
    };

    let mut header = vec![0u8; DATA_OFFSET as usize];
    {
        let mut block = &mut header[LIMITS_OFFSET as usize..LIMITS_OFFSET as usize + 24];
        block.write_f64::<LittleEndian>(limits.step)?;
        block.write_f64::<LittleEndian>(limits.min)?;
        block.write_f64::<LittleEndian>(limits.max)?;
    }
    writer.write_all(&header)?;

    for &v in pattern.y() {
        let clamped = v.round().clamp(0.0, u16::MAX as f64) as u16;
        writer.write_u16::<LittleEndian>(clamped)?;
    }
    Ok(())
}

pub fn write_bin_file(path: &Path, pattern: &XyPattern) -> Result<()> {
    let mut out = io::BufWriter::new(std::fs::File::create(path)?);
    write_bin(&mut out, pattern)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_file(step: f64, min: f64, max: f64, samples: &[u16]) -> Vec<u8> {
        let mut buf = vec![0u8; DATA_OFFSET as usize];
        let mut block = &mut buf[214..238];
        block.write_f64::<LittleEndian>(step).unwrap();
        block.write_f64::<LittleEndian>(min).unwrap();
        block.write_f64::<LittleEndian>(max).unwrap();
        for &s in samples {
            buf.write_u16::<LittleEndian>(s).unwrap();
        }
        buf
    }

    #[test]
    fn test_ten_samples_from_zero() {
        let samples: Vec<u16> = (0..10).map(|i| i * 100).collect();
        let data = build_file(1.0, 0.0, 10.0, &samples);
        let p = read_bin(&mut Cursor::new(data), "ten").unwrap();
        assert_eq!(p.len(), 10);
        assert_eq!(p.x()[0], 0.0);
        assert_eq!(p.x()[9], 9.0);
        assert_eq!(p.y()[3], 300.0);
    }

    #[test]
    fn test_fractional_step_count() {
        // (45 - 3) / 0.02 is not exact in binary floating point
        let n = BinLimits { step: 0.02, min: 3.0, max: 45.0 }.sample_count();
        assert_eq!(n, 2100);
    }

    #[test]
    fn test_truncated_samples() {
        let data = build_file(1.0, 0.0, 10.0, &[1, 2, 3]);
        let err = read_bin(&mut Cursor::new(data), "short").unwrap_err();
        assert!(matches!(err, XrdError::Truncated { expected: 10, got: 3 }));
    }

    #[test]
    fn test_header_promising_more_than_the_file_holds() {
        // a tiny step makes the count astronomically large
        let data = build_file(1e-300, 0.0, 10.0, &[]);
        let err = read_bin(&mut Cursor::new(data), "huge").unwrap_err();
        assert!(matches!(err, XrdError::Truncated { got: 0, .. }));

        let data = build_file(1e-3, 0.0, 1e12, &[7; 4]);
        let err = read_bin(&mut Cursor::new(data), "huge").unwrap_err();
        assert!(matches!(err, XrdError::Truncated { got: 4, .. }));
    }

    #[test]
    fn test_invalid_step() {
        let data = build_file(0.0, 0.0, 10.0, &[]);
        let err = read_bin(&mut Cursor::new(data), "bad").unwrap_err();
        assert!(matches!(err, XrdError::InvalidHeader(_)));
    }

    #[test]
    fn test_header_too_short() {
        let err = read_bin(&mut Cursor::new(vec![0u8; 100]), "tiny").unwrap_err();
        assert!(matches!(err, XrdError::Io(_)));
    }

    #[test]
    fn test_written_file_reads_back() {
        let p = XyPattern::from_xy(
            "w",
            vec![5.0, 5.5, 6.0, 6.5],
            vec![10.0, 20.4, 70000.0, -3.0],
        )
        .unwrap();
        let mut buf = Vec::new();
        write_bin(&mut buf, &p).unwrap();
        let back = read_bin(&mut Cursor::new(buf), "w").unwrap();
        assert_eq!(back.x(), p.x());
        assert_eq!(back.y(), &[10.0, 20.0, 65535.0, 0.0]);
    }

    #[test]
    fn test_irregular_grid_is_not_written() {
        let p = XyPattern::from_xy("g", vec![10.0, 10.5, 12.0, 20.0], vec![1.0; 4]).unwrap();
        let mut buf = Vec::new();
        let err = write_bin(&mut buf, &p).unwrap_err();
        assert!(matches!(err, XrdError::IrregularGrid { index: 2, .. }));
        assert!(buf.is_empty());

        // accumulated rounding on a fine grid is accepted
        let x: Vec<f64> = (0..2100).map(|i| 3.0 + i as f64 * 0.02).collect();
        let fine = XyPattern::from_xy("fine", x, vec![5.0; 2100]).unwrap();
        write_bin(&mut buf, &fine).unwrap();
        assert_eq!(read_bin(&mut Cursor::new(buf), "fine").unwrap().len(), 2100);
    }
}
