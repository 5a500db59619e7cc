//! Text rendering of matrices and fault results. Rounding happens here
//! only; the values held by the analysis are never modified.

use crate::dense::DenseMatrix;
use crate::fault::FaultResult;
use num_complex::Complex64;
use std::fmt;

// Beyond this f64 carries no further decimals.
const MAX_PRECISION: usize = 15;

pub fn round(x: f64, precision: usize) -> f64 {
    let scale = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    if !(x * scale).is_finite() {
        return x;
    }
    // adding 0.0 clears negative zero
    (x * scale).round() / scale + 0.0
}

/// `magnitude /_ angle°` with the angle in degrees.
pub fn format_polar(c: Complex64, precision: usize) -> String {
    format!(
        "{:.p$} /_ {:.p$}°",
        round(c.norm(), precision),
        round(c.arg().to_degrees(), precision),
        p = precision.min(MAX_PRECISION)
    )
}

pub fn format_rect(c: Complex64, precision: usize) -> String {
    let precision = precision.min(MAX_PRECISION);
    let (re, im) = (round(c.re, precision), round(c.im, precision));
    let sign = if im < 0.0 { '-' } else { '+' };
    format!("{:.p$}{}{:.p$}j", re, sign, im.abs(), p = precision)
}

/// Rounded matrix followed by its dimension.
pub fn format_matrix(m: &DenseMatrix, precision: usize) -> String {
    let cells: Vec<Vec<String>> = (0..m.dim())
        .map(|i| m.row(i).iter().map(|&c| format_rect(c, precision)).collect())
        .collect();
    let width = cells.iter().flatten().map(|s| s.len()).max().unwrap_or(0);

    let mut out = String::new();
    for row in &cells {
        let line: Vec<String> = row.iter().map(|s| format!("{:>w$}", s, w = width)).collect();
        out.push_str(&line.join("  "));
        out.push('\n');
    }
    out.push_str(&format!("{} x {}", m.dim(), m.dim()));
    out
}

/// Displays a fault result the way a protection study report lists it.
pub struct FaultReport<'a> {
    pub result: &'a FaultResult,
    pub precision: usize,
    pub base_mva: Option<f64>,
}

impl<'a> FaultReport<'a> {
    pub fn new(result: &'a FaultResult, precision: usize) -> Self {
        Self {
            result,
            precision,
            base_mva: None,
        }
    }

    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = Some(base_mva);
        self
    }
}

impl fmt::Display for FaultReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (r, p) = (self.result, self.precision.min(MAX_PRECISION));

        writeln!(f, "Bolted fault at bus {}", r.bus)?;
        writeln!(f, "Post-fault bus voltages:")?;
        for (id, v) in &r.voltages {
            writeln!(f, "{:>5}  {}", id, format_polar(*v, p))?;
        }
        writeln!(f, "Fault current:")?;
        writeln!(f, "       {}", format_polar(r.fault_current, p))?;
        if let Some(base_mva) = self.base_mva {
            writeln!(f, "       {:.p$} MVA", round(r.fault_mva(base_mva), p), p = p)?;
        }
        writeln!(f, "Branch fault currents:")?;
        for ((a, b), i) in &r.branch_currents {
            writeln!(f, "{:>5} {:>5}  {}", a, b, format_polar(*i, p))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn rounds_for_display_only() {
        let c = Complex64::new(0.0, -31.935483870967744);
        assert_eq!(format_polar(c, 4), "31.9355 /_ -90.0000°");
        assert_eq!(c.im, -31.935483870967744);
    }

    #[test]
    fn no_negative_zero() {
        assert_eq!(format_rect(Complex64::new(-0.00001, 0.5), 4), "0.0000+0.5000j");
    }

    #[test]
    fn huge_precision_is_clamped() {
        let c = Complex64::new(0.0, -31.935483870967744);
        let s = format_polar(c, 400);
        assert!(!s.contains("NaN"));
        assert!(s.starts_with("31.93548387096"));
        approx::assert_abs_diff_eq!(round(2.5e300, 400), 2.5e300);
    }

    #[test]
    fn matrix_has_dimension_line() {
        let m = DenseMatrix::identity(2);
        let s = format_matrix(&m, 2);
        assert!(s.ends_with("2 x 2"));
        assert!(s.starts_with("1.00+0.00j  0.00+0.00j\n"));
    }

    #[test]
    fn report_lists_everything() {
        let result = FaultResult {
            bus: 1,
            fault_current: Complex64::new(0.0, -10.0),
            voltages: BTreeMap::from([(1, Complex64::default()), (2, Complex64::new(0.5, 0.0))]),
            branch_currents: BTreeMap::from([((2, 1), Complex64::new(0.0, -5.0))]),
        };
        let text = FaultReport::new(&result, 4).with_base_mva(100.0).to_string();

        assert!(text.contains("Bolted fault at bus 1"));
        assert!(text.contains("10.0000 /_ -90.0000°"));
        assert!(text.contains("1000.0000 MVA"));
        assert!(text.contains("    2     1  5.0000 /_ -90.0000°"));
    }
}
