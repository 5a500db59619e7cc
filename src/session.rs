use crate::dense::DenseMatrix;
use crate::error::{invalid, Result, SCError};
use crate::fault::{
    bolted_fault, bolted_fault_with, prefault_voltage, prefault_voltages, FaultResult,
};
use crate::network::Network;
use crate::scopt::{Refresh, SCOpt};
use crate::ybus::make_ybus;
use crate::zbus::ZBus;
use num_complex::Complex64;
use std::collections::HashMap;

/// One short-circuit study: a network, its current impedance matrix and
/// the options used to analyse it.
///
/// Mutating calls take `&mut self`, fault queries take `&self`, so the
/// borrow checker keeps queries from overlapping a topology edit. Share a
/// session between threads behind an `RwLock` if edits and queries come
/// from different places.
pub struct ShortCircuit {
    net: Network,
    opt: SCOpt,
    y_bus: Option<DenseMatrix>,
    // Bus id of each row of `y_bus`.
    y_buses: Vec<usize>,
    zbus: Option<ZBus>,
    // Prefault voltages of buses created by growing Zbus.
    derived: HashMap<usize, Complex64>,
}

impl ShortCircuit {
    pub fn new(net: Network, opt: SCOpt) -> Self {
        Self {
            net,
            opt,
            y_bus: None,
            y_buses: Vec::new(),
            zbus: None,
            derived: HashMap::new(),
        }
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn opt(&self) -> &SCOpt {
        &self.opt
    }

    /// Admittance matrix from the last build or refresh.
    pub fn y_bus(&self) -> Option<&DenseMatrix> {
        self.y_bus.as_ref()
    }

    pub fn zbus(&self) -> Result<&ZBus> {
        self.zbus.as_ref().ok_or_else(not_built)
    }

    /// Assembles Ybus from the network and inverts it into a fresh Zbus.
    /// Any earlier topology edits are discarded.
    pub fn build(&mut self) -> Result<&ZBus> {
        let y_bus = make_ybus(&self.net)?;
        log::trace!("Ybus:\n{}", crate::report::format_matrix(&y_bus, self.opt.precision));
        let zbus = ZBus::build(&y_bus, &self.net.bus_ids(), self.opt.pinv_rcond)?;
        log::info!("Zbus built for {} buses", zbus.dim());

        self.y_bus = Some(y_bus);
        self.y_buses = zbus.buses().to_vec();
        self.derived.clear();
        Ok(self.zbus.insert(zbus))
    }

    /// Replaces the cached admittance matrix with the inverse of the
    /// current Zbus.
    pub fn refresh_admittance(&mut self) -> Result<()> {
        let zbus = self.zbus()?;
        let y_bus = zbus.matrix().pinv(self.opt.pinv_rcond)?;
        self.y_buses = zbus.buses().to_vec();
        self.y_bus = Some(y_bus);
        Ok(())
    }

    pub fn grow_bus_to_ground(&mut self, z_b: Complex64) -> Result<usize> {
        let zbus = self.zbus.as_mut().ok_or_else(not_built)?;
        let id = zbus.grow_bus_to_ground(z_b)?;
        self.derived.insert(id, Complex64::default());
        Ok(id)
    }

    pub fn grow_bus_to_bus(&mut self, pos: usize, z_b: Complex64) -> Result<usize> {
        let v = {
            let zbus = self.zbus()?;
            let k = zbus.index(pos)?;
            prefault_voltage(&self.net, &self.derived, zbus.buses()[k])?
        };
        let zbus = self.zbus.as_mut().ok_or_else(not_built)?;
        let id = zbus.grow_bus_to_bus(pos, z_b)?;
        self.derived.insert(id, v);
        Ok(id)
    }

    pub fn add_impedance_to_ground(&mut self, pos: usize, z_b: Complex64) -> Result<()> {
        let zbus = self.zbus.as_mut().ok_or_else(not_built)?;
        zbus.add_impedance_to_ground(pos, z_b)
    }

    pub fn add_impedance_between(
        &mut self,
        pos_j: usize,
        pos_k: usize,
        z_b: Complex64,
    ) -> Result<()> {
        let zbus = self.zbus.as_mut().ok_or_else(not_built)?;
        zbus.add_impedance_between(pos_j, pos_k, z_b)
    }

    pub fn kron_reduce(&mut self, pos: usize) -> Result<usize> {
        let zbus = self.zbus.as_mut().ok_or_else(not_built)?;
        let id = zbus.kron_reduce(pos)?;
        self.derived.remove(&id);
        Ok(id)
    }

    /// Prefault voltage of every active bus, keyed by bus id.
    pub fn prefault_voltages(&self) -> Result<Vec<(usize, Complex64)>> {
        let zbus = self.zbus()?;
        let v0 = prefault_voltages(&self.net, zbus, &self.derived)?;
        Ok(zbus.buses().iter().copied().zip(v0).collect())
    }

    /// Bolted fault at bus `pos` (1-based row of the current Zbus).
    pub fn fault(&self, pos: usize) -> Result<FaultResult> {
        let zbus = self.zbus()?;
        let v0 = prefault_voltages(&self.net, zbus, &self.derived)?;

        match self.opt.refresh {
            Refresh::EveryFault => bolted_fault(zbus, pos, &v0, &self.opt),
            Refresh::Manual => {
                let y_bus = self.y_bus.as_ref().ok_or_else(not_built)?;
                if self.y_buses != zbus.buses() {
                    return invalid(format!(
                        "admittance matrix covers buses {:?} but Zbus has {:?}, refresh it first",
                        self.y_buses,
                        zbus.buses()
                    ));
                }
                bolted_fault_with(zbus, pos, &v0, y_bus, &self.opt)
            }
        }
    }

    /// Bolted fault at every active bus in turn.
    pub fn fault_sweep(&self) -> Result<Vec<FaultResult>> {
        (1..=self.zbus()?.dim()).map(|pos| self.fault(pos)).collect()
    }
}

fn not_built() -> SCError {
    SCError::InvalidInput("impedance matrix has not been built".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{BusData, ConnectionData, ShuntData};

    fn j(x: f64) -> Complex64 {
        Complex64::new(0.0, x)
    }

    fn grounded(opt: SCOpt) -> ShortCircuit {
        let mut net = Network::new();
        for id in 1..=3 {
            net.add_bus(BusData { id, vm: 1.0, va: 0.0 }).unwrap();
        }
        net.add_connection(ConnectionData::with_impedance(1, 2, j(0.1))).unwrap();
        net.add_connection(ConnectionData::with_impedance(1, 3, j(0.2))).unwrap();
        net.add_connection(ConnectionData::with_impedance(2, 3, j(0.25))).unwrap();
        net.add_shunt(ShuntData { bus: 1, impedance: j(0.2) }).unwrap();
        net.add_shunt(ShuntData { bus: 3, impedance: j(0.4) }).unwrap();
        ShortCircuit::new(net, opt)
    }

    #[test]
    fn queries_need_a_build() {
        let sc = grounded(SCOpt::default());
        assert!(matches!(sc.fault(1), Err(SCError::InvalidInput(_))));
        assert!(sc.prefault_voltages().is_err());
    }

    #[test]
    fn grown_buses_get_prefault_voltages() {
        let mut sc = grounded(SCOpt::default());
        sc.build().unwrap();

        let g = sc.grow_bus_to_ground(j(0.5)).unwrap();
        let b = sc.grow_bus_to_bus(2, j(0.5)).unwrap();
        assert_eq!((g, b), (4, 5));

        let v0 = sc.prefault_voltages().unwrap();
        assert_eq!(v0[3], (4, Complex64::default()));
        assert_eq!(v0[4], (5, Complex64::new(1.0, 0.0)));

        assert_eq!(sc.kron_reduce(4).unwrap(), 4);
        let ids: Vec<usize> = sc
            .prefault_voltages()
            .unwrap()
            .iter()
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 5]);
    }

    #[test]
    fn manual_refresh_uses_cached_admittance() {
        let mut sc = grounded(SCOpt {
            refresh: Refresh::Manual,
            ..Default::default()
        });
        sc.build().unwrap();
        let before = sc.fault(2).unwrap();

        sc.add_impedance_between(1, 3, j(0.3)).unwrap();
        // Zbus changed, branch admittances did not.
        let stale = sc.fault(2).unwrap();
        assert_eq!(
            stale.branch_currents.keys().collect::<Vec<_>>(),
            before.branch_currents.keys().collect::<Vec<_>>()
        );

        sc.refresh_admittance().unwrap();
        let fresh = sc.fault(2).unwrap();
        let y = sc.y_bus().unwrap();
        // Tie 1-3 now carries 1/j0.2 + 1/j0.3.
        approx::assert_abs_diff_eq!(y[(0, 2)].im, 5.0 + 1.0 / 0.3, epsilon = 1e-6);
        assert_eq!(fresh.fault_current, stale.fault_current);
    }

    #[test]
    fn manual_refresh_detects_stale_dimension() {
        let mut sc = grounded(SCOpt {
            refresh: Refresh::Manual,
            ..Default::default()
        });
        sc.build().unwrap();
        sc.grow_bus_to_ground(j(0.5)).unwrap();
        assert!(matches!(sc.fault(1), Err(SCError::InvalidInput(_))));

        sc.refresh_admittance().unwrap();
        assert!(sc.fault(1).is_ok());
    }

    #[test]
    fn manual_refresh_detects_relabeled_rows() {
        let mut sc = grounded(SCOpt {
            refresh: Refresh::Manual,
            ..Default::default()
        });
        sc.build().unwrap();
        sc.grow_bus_to_ground(j(0.5)).unwrap();
        sc.kron_reduce(1).unwrap();

        // Same dimension as the cached matrix, different buses.
        assert_eq!(sc.zbus().unwrap().buses(), &[2, 3, 4]);
        assert!(matches!(sc.fault(1), Err(SCError::InvalidInput(_))));

        sc.refresh_admittance().unwrap();
        let res = sc.fault(1).unwrap();
        assert!(res.branch_currents.contains_key(&(2, 3)));
    }

    #[test]
    fn sweep_covers_every_bus() {
        let mut sc = grounded(SCOpt::default());
        sc.build().unwrap();
        let results = sc.fault_sweep().unwrap();

        assert_eq!(results.iter().map(|r| r.bus).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(results.iter().all(|r| r.fault_current.norm() > 0.0));
    }

    #[test]
    fn rebuild_discards_edits() {
        let mut sc = grounded(SCOpt::default());
        let original = sc.build().unwrap().clone();
        sc.grow_bus_to_ground(j(0.5)).unwrap();
        sc.add_impedance_to_ground(2, j(0.1)).unwrap();

        let rebuilt = sc.build().unwrap();
        assert_eq!(rebuilt.buses(), original.buses());
        assert!(rebuilt.matrix().max_abs_diff(original.matrix()) < 1e-12);
    }
}
