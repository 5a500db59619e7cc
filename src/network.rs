use crate::error::{invalid, Result};
use itertools::Itertools;
use num_complex::Complex64;
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;
use std::fmt;

/// Bus record as supplied by a data source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusData {
    pub id: usize,
    /// Voltage magnitude (p.u.).
    pub vm: f64,
    /// Voltage angle (degrees).
    pub va: f64,
}

/// Branch record. Exactly one of `impedance` and `admittance` must be set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConnectionData {
    pub from_bus: usize,
    pub to_bus: usize,
    pub impedance: Option<Complex64>,
    pub admittance: Option<Complex64>,
}

impl ConnectionData {
    pub fn with_impedance(from_bus: usize, to_bus: usize, z: Complex64) -> Self {
        Self {
            from_bus,
            to_bus,
            impedance: Some(z),
            admittance: None,
        }
    }

    pub fn with_admittance(from_bus: usize, to_bus: usize, y: Complex64) -> Self {
        Self {
            from_bus,
            to_bus,
            impedance: None,
            admittance: Some(y),
        }
    }
}

/// Shunt impedance from a bus to reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShuntData {
    pub bus: usize,
    pub impedance: Complex64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bus {
    pub id: usize,
    pub vm: f64,
    /// Angle in radians.
    pub va: f64,
}

impl Bus {
    pub fn voltage(&self) -> Complex64 {
        Complex64::from_polar(self.vm, self.va)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub impedance: Complex64,
    pub admittance: Complex64,
}

/// Undirected branch key, stored with the smaller bus id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchKey(usize, usize);

impl BranchKey {
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            BranchKey(a, b)
        } else {
            BranchKey(b, a)
        }
    }

    pub fn buses(&self) -> (usize, usize) {
        (self.0, self.1)
    }
}

/// Buses, branches and shunts of one analysis session.
#[derive(Debug, Clone, Default)]
pub struct Network {
    buses: BTreeMap<usize, Bus>,
    connections: HashMap<BranchKey, Connection>,
    // Positional, in ascending bus id order.
    shunts: Vec<Complex64>,
    // Placed by bus id; resolved to a position on lookup.
    shunts_by_id: BTreeMap<usize, Complex64>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bus(&mut self, data: BusData) -> Result<()> {
        if data.id == 0 {
            return invalid("bus ids are 1-based");
        }
        if self.buses.contains_key(&data.id) {
            return invalid(format!("bus {} already registered", data.id));
        }
        if !data.vm.is_finite() || !data.va.is_finite() {
            return invalid(format!("bus {} has a non-finite voltage", data.id));
        }
        self.buses.insert(
            data.id,
            Bus {
                id: data.id,
                vm: data.vm,
                va: data.va * PI / 180.0,
            },
        );
        Ok(())
    }

    pub fn add_connection(&mut self, data: ConnectionData) -> Result<()> {
        let (from, to) = (data.from_bus, data.to_bus);
        if from == to {
            return invalid(format!("self-connection at bus {}", from));
        }
        let finite = [data.impedance, data.admittance]
            .iter()
            .flatten()
            .all(|c| c.is_finite());
        if !finite {
            return invalid(format!("connection {}-{} is not finite", from, to));
        }
        let conn = match (data.impedance, data.admittance) {
            (Some(z), None) => {
                if z == Complex64::default() {
                    return invalid(format!("zero impedance between {} and {}", from, to));
                }
                Connection {
                    impedance: z,
                    admittance: z.inv(),
                }
            }
            (None, Some(y)) => {
                if y == Complex64::default() {
                    return invalid(format!("zero admittance between {} and {}", from, to));
                }
                Connection {
                    impedance: y.inv(),
                    admittance: y,
                }
            }
            (Some(_), Some(_)) => {
                return invalid(format!(
                    "connection {}-{} has both impedance and admittance",
                    from, to
                ))
            }
            (None, None) => {
                return invalid(format!(
                    "connection {}-{} has neither impedance nor admittance",
                    from, to
                ))
            }
        };
        if self.connections.insert(BranchKey::new(from, to), conn).is_some() {
            log::debug!("connection {}-{} replaced", from, to);
        }
        Ok(())
    }

    /// Replaces the positional shunt list. Entry `k` belongs to the
    /// `k`-th bus in ascending id order.
    pub fn set_shunts(&mut self, shunts: Vec<Complex64>) {
        self.shunts = shunts;
    }

    /// Sets the shunt impedance of a registered bus. It takes precedence
    /// over the positional list and follows the bus if buses with lower
    /// ids are registered later.
    pub fn add_shunt(&mut self, data: ShuntData) -> Result<()> {
        if !self.buses.contains_key(&data.bus) {
            return invalid(format!("shunt at unknown bus {}", data.bus));
        }
        if !data.impedance.is_finite() {
            return invalid(format!("shunt at bus {} is not finite", data.bus));
        }
        self.shunts_by_id.insert(data.bus, data.impedance);
        Ok(())
    }

    /// Shunt impedance of the bus at position `pos`. Missing entries and
    /// zero impedances both mean no shunt.
    pub fn shunt(&self, pos: usize) -> Option<Complex64> {
        self.buses
            .keys()
            .nth(pos)
            .and_then(|id| self.shunts_by_id.get(id))
            .or_else(|| self.shunts.get(pos))
            .copied()
            .filter(|z| *z != Complex64::default())
    }

    pub fn connection(&self, a: usize, b: usize) -> Option<&Connection> {
        self.connections.get(&BranchKey::new(a, b))
    }

    pub fn bus(&self, id: usize) -> Option<&Bus> {
        self.buses.get(&id)
    }

    /// Registered buses in ascending id order.
    pub fn buses(&self) -> impl Iterator<Item = &Bus> {
        self.buses.values()
    }

    pub fn bus_ids(&self) -> Vec<usize> {
        self.buses.keys().copied().collect()
    }

    pub fn connections(&self) -> impl Iterator<Item = (&BranchKey, &Connection)> {
        self.connections.iter()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Buses:")?;
        for b in self.buses() {
            writeln!(f, "{:>5}  {:>8.4} pu  {:>9.4} deg", b.id, b.vm, b.va * 180.0 / PI)?;
        }
        writeln!(f, "Connections:")?;
        for (k, c) in self.connections.iter().sorted_by_key(|(k, _)| **k) {
            let (a, b) = k.buses();
            writeln!(
                f,
                "{:>5} {:>5}  Z = {:.4}  Y = {:.4}",
                a, b, c.impedance, c.admittance
            )?;
        }
        Ok(())
    }
}
