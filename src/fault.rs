use crate::dense::DenseMatrix;
use crate::error::{invalid, Result, SCError};
use crate::network::Network;
use crate::scopt::SCOpt;
use crate::zbus::ZBus;
use num_complex::Complex64;
use std::collections::{BTreeMap, HashMap};

/// Outcome of a bolted three-phase fault. All maps are keyed by bus id.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultResult {
    /// Id of the faulted bus.
    pub bus: usize,
    /// Subtransient fault current I'' (p.u.).
    pub fault_current: Complex64,
    /// Post-fault bus voltages.
    pub voltages: BTreeMap<usize, Complex64>,
    /// Nonzero branch currents, from bus to bus. Both directions are present.
    pub branch_currents: BTreeMap<(usize, usize), Complex64>,
}

impl FaultResult {
    /// Short-circuit power in MVA.
    pub fn fault_mva(&self, base_mva: f64) -> f64 {
        self.fault_current.norm() * base_mva
    }
}

/// Prefault voltage of every active bus, in Zbus row order.
///
/// Registered buses use their magnitude and angle. Buses created by
/// growing the impedance matrix fall back to `derived`.
pub fn prefault_voltages(
    net: &Network,
    zbus: &ZBus,
    derived: &HashMap<usize, Complex64>,
) -> Result<Vec<Complex64>> {
    zbus.buses()
        .iter()
        .map(|&id| prefault_voltage(net, derived, id))
        .collect()
}

pub(crate) fn prefault_voltage(
    net: &Network,
    derived: &HashMap<usize, Complex64>,
    id: usize,
) -> Result<Complex64> {
    match (net.bus(id), derived.get(&id)) {
        (Some(b), _) => Ok(b.voltage()),
        (None, Some(v)) => Ok(*v),
        (None, None) => invalid(format!("no prefault voltage for bus {}", id)),
    }
}

/// Bolted fault at bus `pos` (1-based row of `zbus`).
///
/// The admittance matrix used for branch currents is the generalized
/// inverse of `zbus`, so topology edits applied to the impedance matrix
/// are reflected.
pub fn bolted_fault(
    zbus: &ZBus,
    pos: usize,
    v0: &[Complex64],
    opt: &SCOpt,
) -> Result<FaultResult> {
    zbus.index(pos)?;
    let y_now = zbus.matrix().pinv(opt.pinv_rcond)?;
    bolted_fault_with(zbus, pos, v0, &y_now, opt)
}

/// As [`bolted_fault`] but with a caller supplied admittance matrix.
pub fn bolted_fault_with(
    zbus: &ZBus,
    pos: usize,
    v0: &[Complex64],
    y_bus: &DenseMatrix,
    opt: &SCOpt,
) -> Result<FaultResult> {
    let f = zbus.index(pos)?;
    let nb = zbus.dim();
    if v0.len() != nb {
        return invalid(format!("{} prefault voltages for {} buses", v0.len(), nb));
    }
    if y_bus.dim() != nb {
        return invalid(format!(
            "{}x{} admittance matrix for {} buses",
            y_bus.dim(),
            y_bus.dim(),
            nb
        ));
    }
    let z = zbus.matrix();
    let ids = zbus.buses();

    let z_ff = z[(f, f)];
    if z_ff.norm() == 0.0 || !z_ff.is_finite() {
        return Err(SCError::SingularMatrix(format!(
            "bus {} has self-impedance {}",
            ids[f], z_ff
        )));
    }
    let i_f = v0[f] / z_ff;
    log::debug!("fault at bus {}: I'' = {}", ids[f], i_f);

    let v: Vec<Complex64> = (0..nb).map(|i| v0[i] - z[(i, f)] * i_f).collect();

    let mut branch_currents = BTreeMap::new();
    for i in 0..nb {
        for j in 0..nb {
            if i == j {
                continue;
            }
            // Ikm = (Vk - Vm) * Ykm
            let i_br = (v[i] - v[j]) * y_bus[(i, j)];
            if i_br.norm() > opt.zero_tol {
                branch_currents.insert((ids[i], ids[j]), i_br);
            }
        }
    }

    Ok(FaultResult {
        bus: ids[f],
        fault_current: i_f,
        voltages: ids.iter().copied().zip(v).collect(),
        branch_currents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn j(x: f64) -> Complex64 {
        Complex64::new(0.0, x)
    }

    fn sample() -> ZBus {
        let z = DenseMatrix::from_rows(&[
            vec![j(0.12), j(0.08), j(0.04)],
            vec![j(0.08), j(0.10), j(0.06)],
            vec![j(0.04), j(0.06), j(0.09)],
        ])
        .unwrap();
        ZBus::from_matrix(z)
    }

    #[test]
    fn fault_current_and_voltages() {
        let zb = sample();
        let v0 = vec![Complex64::new(1.0, 0.0); 3];
        let res = bolted_fault(&zb, 2, &v0, &SCOpt::default()).unwrap();

        assert_eq!(res.bus, 2);
        approx::assert_abs_diff_eq!(res.fault_current.im, -10.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(res.voltages[&2].norm(), 0.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(res.voltages[&1].re, 0.2, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(res.voltages[&3].re, 0.4, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(res.fault_mva(100.0), 1000.0, epsilon = 1e-6);
    }

    #[test]
    fn branch_currents_are_antisymmetric() {
        let zb = sample();
        let v0 = vec![Complex64::new(1.0, 0.0); 3];
        let res = bolted_fault(&zb, 1, &v0, &SCOpt::default()).unwrap();

        for (&(a, b), i_ab) in &res.branch_currents {
            let i_ba = res.branch_currents[&(b, a)];
            approx::assert_abs_diff_eq!((i_ab + i_ba).norm(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_self_impedance_is_singular() {
        let mut zb = sample();
        zb.grow_bus_to_ground(Complex64::default()).unwrap();
        let v0 = vec![Complex64::new(1.0, 0.0); 4];
        let y = DenseMatrix::zeros(4);

        let res = bolted_fault_with(&zb, 4, &v0, &y, &SCOpt::default());
        assert!(matches!(res, Err(SCError::SingularMatrix(_))));
    }

    #[test]
    fn bad_arguments() {
        let zb = sample();
        let opt = SCOpt::default();
        let v0 = vec![Complex64::new(1.0, 0.0); 3];

        assert!(matches!(bolted_fault(&zb, 0, &v0, &opt), Err(SCError::InvalidInput(_))));
        assert!(matches!(bolted_fault(&zb, 4, &v0, &opt), Err(SCError::InvalidInput(_))));
        assert!(matches!(bolted_fault(&zb, 1, &v0[..2], &opt), Err(SCError::InvalidInput(_))));
    }
}
