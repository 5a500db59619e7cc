use crate::dense::DenseMatrix;
use crate::error::{invalid, Result};
use crate::network::Network;
use num_complex::Complex64;

/// Builds the nodal admittance matrix.
///
/// Rows follow ascending bus id. Off-diagonal entries are the negated
/// branch admittances; each diagonal is the negated sum of its row's
/// off-diagonals plus the reciprocal of the bus shunt impedance, if any.
pub fn make_ybus(net: &Network) -> Result<DenseMatrix> {
    for (k, _) in net.connections() {
        let (a, b) = k.buses();
        for id in [a, b] {
            if net.bus(id).is_none() {
                return invalid(format!("connection {}-{} references unknown bus {}", a, b, id));
            }
        }
    }

    let ids = net.bus_ids();
    let nb = ids.len();
    let mut y_bus = DenseMatrix::zeros(nb);

    for (i, &bi) in ids.iter().enumerate() {
        let mut sum = Complex64::default();
        for (j, &bj) in ids.iter().enumerate() {
            if i == j {
                continue;
            }
            if let Some(c) = net.connection(bi, bj) {
                y_bus[(i, j)] = -c.admittance;
                sum += y_bus[(i, j)];
            }
        }
        y_bus[(i, i)] = -sum;

        if let Some(z_sh) = net.shunt(i) {
            y_bus[(i, i)] += z_sh.inv();
        }
    }
    log::debug!("Ybus: {}x{}", nb, nb);

    Ok(y_bus)
}
