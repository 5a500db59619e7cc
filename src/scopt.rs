use clap::ValueEnum;

/// When the admittance matrix used for branch currents is re-derived
/// from the impedance matrix.
#[derive(Debug, PartialEq, Copy, Clone, ValueEnum)]
pub enum Refresh {
    /// Invert the current Zbus inside every fault query.
    EveryFault = 0,
    /// Use the admittance matrix cached by the last build or explicit refresh.
    Manual = 1,
}

pub struct SCOpt {
    // System power base in MVA.
    pub base_mva: f64,

    // Singular values below `pinv_rcond` times the largest one are
    // treated as zero by the generalized inverse. Default value is 1e-12.
    pub pinv_rcond: f64,

    // Branch fault currents with magnitude at or below this are not reported.
    pub zero_tol: f64,

    // Decimals shown by the report formatting.
    pub precision: usize,

    pub refresh: Refresh,
}

impl Default for SCOpt {
    fn default() -> Self {
        Self {
            base_mva: 100.0,
            pinv_rcond: 1e-12,
            zero_tol: 1e-9,
            precision: 4,
            refresh: Refresh::EveryFault,
        }
    }
}
