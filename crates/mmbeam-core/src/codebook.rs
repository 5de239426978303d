//! Beam codebooks
//!
//! A codebook is an immutable matrix of complex antenna weights with one row
//! per beam index. Codebooks are read from plain-text files where each line
//! is one beam and holds comma-separated complex literals:
//!
//! ```text
//! 0.125,0.125-0.0i,0.0884+0.0884i,-0.125i
//! 0.125,0.0884-0.0884i,0.125i,...
//! ```
//!
//! Accepted literal forms are `re`, `re+imi`, `re-imi` and `imi`. Tokens that
//! do not parse are read as `0` so a single bad value never aborts loading.
//!
//! ## Kronecker Codebooks
//!
//! [`Codebook::kronecker_dft`] builds the codebook of a planar array directly:
//! beam `v * h_beams + h` is the Kronecker product of the `v`-th vertical and
//! `h`-th horizontal DFT vector, elements ordered with the vertical index in
//! the outer loop.
//!
//! ```rust
//! use mmbeam_core::codebook::{parse_complex, Codebook};
//!
//! assert_eq!(parse_complex("3-2i"), num_complex::Complex64::new(3.0, -2.0));
//!
//! let cb = Codebook::kronecker_dft(8, 2);
//! assert_eq!(cb.len(), 16);
//! assert_eq!(cb.vector(0).unwrap().len(), 16);
//! ```

use crate::error::{BeamError, BeamResult};
use crate::types::{BeamId, BeamVector, ComplexWeight};
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// Parse one complex literal, falling back to `0` on malformed input.
pub fn parse_complex(token: &str) -> ComplexWeight {
    match try_parse_complex(token.trim()) {
        Some(value) => value,
        None => {
            debug!(token, "Malformed complex literal, using 0");
            ComplexWeight::new(0.0, 0.0)
        }
    }
}

fn try_parse_complex(token: &str) -> Option<ComplexWeight> {
    if token.is_empty() {
        return None;
    }

    // No imaginary marker: the whole token is the real part
    let Some(body) = token.strip_suffix('i') else {
        let re: f64 = token.parse().ok()?;
        return Some(ComplexWeight::new(re, 0.0));
    };

    // Sign that separates real and imaginary parts (skip exponent signs)
    let bytes = body.as_bytes();
    let split = body
        .char_indices()
        .skip(1)
        .filter(|&(i, c)| (c == '+' || c == '-') && !matches!(bytes[i - 1], b'e' | b'E'))
        .map(|(i, _)| i)
        .last();

    match split {
        None => {
            let im: f64 = body.trim().parse().ok()?;
            Some(ComplexWeight::new(0.0, im))
        }
        Some(at) => {
            let re: f64 = body[..at].trim().parse().ok()?;
            let im: f64 = body[at..].trim().parse().ok()?;
            Some(ComplexWeight::new(re, im))
        }
    }
}

/// Immutable beam codebook (one weight vector per beam).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Codebook {
    beams: Vec<BeamVector>,
}

impl Codebook {
    /// Wrap an in-memory weight matrix.
    pub fn from_matrix(beams: Vec<BeamVector>) -> Self {
        Self { beams }
    }

    /// Load a codebook file.
    ///
    /// A missing or empty file is a configuration error: no beam vector can
    /// be produced without it.
    pub fn load(path: &Path) -> BeamResult<Self> {
        if !path.exists() {
            return Err(BeamError::CodebookNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let codebook = Self::parse(&content);
        if codebook.is_empty() {
            return Err(BeamError::EmptyCodebook {
                path: path.to_path_buf(),
            });
        }

        info!(
            path = %path.display(),
            beams = codebook.len(),
            elements = codebook.num_elements(),
            "Loaded codebook"
        );
        Ok(codebook)
    }

    /// Parse codebook text (one beam per non-blank line).
    pub fn parse(text: &str) -> Self {
        let beams = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split(',').map(parse_complex).collect())
            .collect();
        Self { beams }
    }

    /// Kronecker DFT codebook for an `h_beams × v_beams` planar array.
    ///
    /// The array has one element per beam on each axis, so every vector has
    /// `h_beams * v_beams` entries with unit total power.
    pub fn kronecker_dft(h_beams: u16, v_beams: u16) -> Self {
        let h = h_beams.max(1) as usize;
        let v = v_beams.max(1) as usize;
        let norm = 1.0 / ((h * v) as f64).sqrt();

        let mut beams = Vec::with_capacity(h * v);
        for bv in 0..v {
            for bh in 0..h {
                let mut weights = Vec::with_capacity(h * v);
                for ev in 0..v {
                    for eh in 0..h {
                        let phase = -2.0
                            * PI
                            * ((bh * eh) as f64 / h as f64 + (bv * ev) as f64 / v as f64);
                        weights.push(ComplexWeight::from_polar(norm, phase));
                    }
                }
                beams.push(weights);
            }
        }
        Self { beams }
    }

    /// Serialize in the codebook text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for beam in &self.beams {
            let tokens: Vec<String> = beam.iter().map(format_complex).collect();
            let _ = writeln!(out, "{}", tokens.join(","));
        }
        out
    }

    /// Write the codebook to a file.
    pub fn write_to(&self, path: &Path) -> BeamResult<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Number of beams.
    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Number of antenna elements per beam (length of the first row).
    pub fn num_elements(&self) -> usize {
        self.beams.first().map_or(0, Vec::len)
    }

    /// Weight vector of one beam.
    pub fn vector(&self, id: BeamId) -> BeamResult<&BeamVector> {
        self.beams
            .get(id as usize)
            .ok_or(BeamError::BeamOutOfRange {
                index: id as usize,
                size: self.beams.len(),
            })
    }

    /// All beams in index order.
    pub fn beams(&self) -> &[BeamVector] {
        &self.beams
    }
}

fn format_complex(c: &ComplexWeight) -> String {
    if c.im.is_sign_negative() {
        format!("{}-{}i", c.re, -c.im)
    } else {
        format!("{}+{}i", c.re, c.im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> ComplexWeight {
        ComplexWeight::new(re, im)
    }

    #[test]
    fn test_parse_complex_forms() {
        assert_eq!(parse_complex("3+2i"), c(3.0, 2.0));
        assert_eq!(parse_complex("3-2i"), c(3.0, -2.0));
        assert_eq!(parse_complex("2i"), c(0.0, 2.0));
        assert_eq!(parse_complex("-2i"), c(0.0, -2.0));
        assert_eq!(parse_complex("5"), c(5.0, 0.0));
        assert_eq!(parse_complex("-0.5"), c(-0.5, 0.0));
        assert_eq!(parse_complex(" 0.25-0.75i "), c(0.25, -0.75));
    }

    #[test]
    fn test_parse_complex_exponent() {
        assert_eq!(parse_complex("1e-3+2i"), c(1e-3, 2.0));
        assert_eq!(parse_complex("-1.5e2-2.5E-1i"), c(-150.0, -0.25));
    }

    #[test]
    fn test_parse_complex_malformed() {
        assert_eq!(parse_complex("garbage"), c(0.0, 0.0));
        assert_eq!(parse_complex(""), c(0.0, 0.0));
        assert_eq!(parse_complex("i"), c(0.0, 0.0));
        assert_eq!(parse_complex("1+xi"), c(0.0, 0.0));
    }

    #[test]
    fn test_parse_codebook_text() {
        let cb = Codebook::parse("1,2i,3-1i\n0.5,bad,1\n\n");
        assert_eq!(cb.len(), 2);
        assert_eq!(cb.num_elements(), 3);
        assert_eq!(cb.vector(0).unwrap()[2], c(3.0, -1.0));
        assert_eq!(cb.vector(1).unwrap()[1], c(0.0, 0.0));
    }

    #[test]
    fn test_vector_out_of_range() {
        let cb = Codebook::parse("1,1\n");
        match cb.vector(1) {
            Err(BeamError::BeamOutOfRange { index, size }) => {
                assert_eq!(index, 1);
                assert_eq!(size, 1);
            }
            other => panic!("expected BeamOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_kronecker_dft_unit_power() {
        let cb = Codebook::kronecker_dft(16, 4);
        assert_eq!(cb.len(), 64);
        for beam in cb.beams() {
            assert_eq!(beam.len(), 64);
            let power: f64 = beam.iter().map(|w| w.norm_sqr()).sum();
            assert!((power - 1.0).abs() < 1e-9);
        }
        // Beam 0 is the broadside beam: all weights equal
        let first = cb.vector(0).unwrap();
        assert!(first.iter().all(|w| (w - first[0]).norm() < 1e-12));
    }

    #[test]
    fn test_kronecker_dft_orthogonal() {
        let cb = Codebook::kronecker_dft(8, 2);
        let a = cb.vector(1).unwrap();
        let b = cb.vector(9).unwrap();
        let inner: ComplexWeight = a.iter().zip(b).map(|(x, y)| x * y.conj()).sum();
        assert!(inner.norm() < 1e-9);
    }

    #[test]
    fn test_write_and_load() {
        let path = std::env::temp_dir().join("mmbeam_codebook_roundtrip.txt");
        let cb = Codebook::kronecker_dft(4, 1);
        cb.write_to(&path).unwrap();

        let loaded = Codebook::load(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        for (a, b) in cb.beams().iter().zip(loaded.beams()) {
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).norm() < 1e-12);
            }
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("mmbeam_does_not_exist_codebook.txt");
        let err = Codebook::load(&path).unwrap_err();
        assert!(matches!(err, BeamError::CodebookNotFound { .. }));
        assert!(err.is_fatal());
    }
}
