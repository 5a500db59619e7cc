use crate::dense::DenseMatrix;
use crate::error::{invalid, Result, SCError};
use num_complex::Complex64;

/// Bus impedance matrix with one external bus id per row.
///
/// All positions taken by the methods below are 1-based and refer to the
/// current dimension. Every method checks its preconditions and computes
/// the new matrix before replacing the old one, so a failed call leaves
/// the matrix untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ZBus {
    z: DenseMatrix,
    buses: Vec<usize>,
    next_id: usize,
}

impl ZBus {
    /// Generalized inverse of `y_bus`, rows labeled with `buses`.
    pub fn build(y_bus: &DenseMatrix, buses: &[usize], rcond: f64) -> Result<Self> {
        if buses.len() != y_bus.dim() {
            return invalid(format!(
                "{} bus ids for a {}x{} admittance matrix",
                buses.len(),
                y_bus.dim(),
                y_bus.dim()
            ));
        }
        let z = y_bus.pinv(rcond)?;
        log::debug!("Zbus: {}x{}", z.dim(), z.dim());
        Ok(Self {
            z,
            buses: buses.to_vec(),
            next_id: buses.iter().copied().max().unwrap_or(0) + 1,
        })
    }

    /// Wraps an existing impedance matrix, rows labeled `1..=n`.
    pub fn from_matrix(z: DenseMatrix) -> Self {
        let n = z.dim();
        Self {
            z,
            buses: (1..=n).collect(),
            next_id: n + 1,
        }
    }

    pub fn matrix(&self) -> &DenseMatrix {
        &self.z
    }

    pub fn dim(&self) -> usize {
        self.z.dim()
    }

    /// External bus id of each row.
    pub fn buses(&self) -> &[usize] {
        &self.buses
    }

    /// Converts a 1-based position to a row index.
    pub fn index(&self, pos: usize) -> Result<usize> {
        if pos == 0 || pos > self.dim() {
            return invalid(format!(
                "bus {} outside {}x{} impedance matrix",
                pos,
                self.dim(),
                self.dim()
            ));
        }
        Ok(pos - 1)
    }

    /// Adds a new bus tied to reference through `z_b`. Returns its id.
    pub fn grow_bus_to_ground(&mut self, z_b: Complex64) -> Result<usize> {
        check_finite(z_b)?;
        let n = self.dim();
        let mut z = self.z.clone();
        z.grow(1);
        z[(n, n)] = z_b;

        log::debug!("new bus {} to reference, Zb = {}", n + 1, z_b);
        Ok(self.commit(z))
    }

    /// Adds a new bus tied to bus `pos` through `z_b`. Returns its id.
    pub fn grow_bus_to_bus(&mut self, pos: usize, z_b: Complex64) -> Result<usize> {
        let k = self.index(pos)?;
        check_finite(z_b)?;
        let z = self.augmented_to_bus(k, z_b);

        log::debug!("new bus {} to bus {}, Zb = {}", self.dim() + 1, pos, z_b);
        Ok(self.commit(z))
    }

    /// Connects `z_b` between existing bus `pos` and reference.
    pub fn add_impedance_to_ground(&mut self, pos: usize, z_b: Complex64) -> Result<()> {
        let k = self.index(pos)?;
        check_finite(z_b)?;
        let n = self.dim();
        let aug = self.augmented_to_bus(k, z_b);
        let z = kron(&aug, n)?;

        log::debug!("Zb = {} from bus {} to reference", z_b, pos);
        self.z = z;
        Ok(())
    }

    /// Connects `z_b` between existing buses `pos_j` and `pos_k`.
    pub fn add_impedance_between(
        &mut self,
        pos_j: usize,
        pos_k: usize,
        z_b: Complex64,
    ) -> Result<()> {
        let j = self.index(pos_j)?;
        let k = self.index(pos_k)?;
        if j == k {
            return invalid(format!("self-connection at bus {}", pos_j));
        }
        check_finite(z_b)?;

        let n = self.dim();
        let mut aug = self.z.clone();
        aug.grow(1);
        for i in 0..n {
            aug[(i, n)] = self.z[(i, j)] - self.z[(i, k)];
            aug[(n, i)] = self.z[(j, i)] - self.z[(k, i)];
        }
        aug[(n, n)] = self.z[(j, j)] + self.z[(k, k)] - 2.0 * self.z[(j, k)] + z_b;
        let z = kron(&aug, n)?;

        log::debug!("Zb = {} between bus {} and bus {}", z_b, pos_j, pos_k);
        self.z = z;
        Ok(())
    }

    /// Eliminates bus `pos` by Kron reduction. Returns the removed bus id.
    pub fn kron_reduce(&mut self, pos: usize) -> Result<usize> {
        let p = self.index(pos)?;
        let z = kron(&self.z, p)?;

        let id = self.buses.remove(p);
        log::debug!("Kron reduction of bus {}: {}x{}", id, z.dim(), z.dim());
        self.z = z;
        Ok(id)
    }

    // Copy of the matrix with an extra row/column mirroring bus `k`.
    fn augmented_to_bus(&self, k: usize, z_b: Complex64) -> DenseMatrix {
        let n = self.dim();
        let mut aug = self.z.clone();
        aug.grow(1);
        for i in 0..n {
            aug[(i, n)] = self.z[(i, k)];
            aug[(n, i)] = self.z[(k, i)];
        }
        aug[(n, n)] = self.z[(k, k)] + z_b;
        aug
    }

    fn commit(&mut self, z: DenseMatrix) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.buses.push(id);
        self.z = z;
        id
    }
}

/// Schur complement of `z` with respect to row/column `p` (0-based).
pub fn kron(z: &DenseMatrix, p: usize) -> Result<DenseMatrix> {
    let n = z.dim();
    if p >= n {
        return invalid(format!("pivot {} outside {}x{} matrix", p + 1, n, n));
    }
    let d = z[(p, p)];
    if d.norm() == 0.0 || !d.is_finite() {
        return Err(SCError::SingularMatrix(format!(
            "pivot {} has diagonal {}",
            p + 1,
            d
        )));
    }

    let mut out = z.clone();
    for i in 0..n {
        let zi = z[(i, p)] / d;
        for j in 0..n {
            out[(i, j)] -= zi * z[(p, j)];
        }
    }
    out.shrink(p)?;
    Ok(out)
}

fn check_finite(z_b: Complex64) -> Result<()> {
    if !z_b.is_finite() {
        return invalid(format!("impedance {} is not finite", z_b));
    }
    Ok(())
}
