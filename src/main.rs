use anyhow::{Context, Result};
use clap::Parser;
use num_complex::Complex64;
use powers_sc::report::{format_matrix, format_polar, FaultReport};
use powers_sc::{BusData, ConnectionData, Network, Refresh, SCOpt, ShortCircuit, ShuntData};

/// Symmetrical (three-phase) short-circuit analysis
#[derive(Parser)]
#[command(name = "powers-sc", version)]
struct Cli {
    /// Bus as ID:VM:VA (p.u., degrees)
    #[arg(long = "bus", value_parser = parse_bus, required = true)]
    buses: Vec<BusData>,

    /// Branch impedance as FROM-TO:R,X
    #[arg(long = "branch", value_parser = parse_branch)]
    branches: Vec<ConnectionData>,

    /// Shunt impedance to reference as ID:R,X
    #[arg(long = "shunt", value_parser = parse_shunt)]
    shunts: Vec<ShuntData>,

    /// Faulted bus (every bus when omitted)
    #[arg(long)]
    fault: Option<usize>,

    /// When branch admittances are re-derived from Zbus
    #[arg(long, value_enum, default_value = "every-fault")]
    refresh: Refresh,

    /// Decimals in printed results
    #[arg(long, default_value_t = 4)]
    precision: usize,

    /// System power base
    #[arg(long, default_value_t = 100.0)]
    base_mva: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut net = Network::new();
    for b in cli.buses {
        net.add_bus(b)?;
    }
    for c in cli.branches {
        net.add_connection(c)?;
    }
    for s in cli.shunts {
        net.add_shunt(s)?;
    }
    print!("{}", net);

    let opt = SCOpt {
        base_mva: cli.base_mva,
        precision: cli.precision,
        refresh: cli.refresh,
        ..Default::default()
    };
    let p = opt.precision;
    let mut sc = ShortCircuit::new(net, opt);

    let zbus = sc.build().context("building Zbus")?;
    println!("Zbus:\n{}", format_matrix(zbus.matrix(), p));

    println!("Prefault bus voltages:");
    for (id, v) in sc.prefault_voltages()? {
        println!("{:>5}  {}", id, format_polar(v, p));
    }

    let results = match cli.fault {
        Some(bus) => vec![sc.fault(bus).with_context(|| format!("fault at bus {}", bus))?],
        None => sc.fault_sweep()?,
    };
    for r in &results {
        println!();
        print!("{}", FaultReport::new(r, p).with_base_mva(sc.opt().base_mva));
    }

    Ok(())
}

fn parse_bus(s: &str) -> Result<BusData, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("expected ID:VM:VA, got '{}'", s));
    }
    Ok(BusData {
        id: parse_num(parts[0])?,
        vm: parse_num(parts[1])?,
        va: parse_num(parts[2])?,
    })
}

fn parse_branch(s: &str) -> Result<ConnectionData, String> {
    let (ends, z) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FROM-TO:R,X, got '{}'", s))?;
    let (from, to) = ends
        .split_once('-')
        .ok_or_else(|| format!("expected FROM-TO, got '{}'", ends))?;
    Ok(ConnectionData::with_impedance(
        parse_num(from)?,
        parse_num(to)?,
        parse_rx(z)?,
    ))
}

fn parse_shunt(s: &str) -> Result<ShuntData, String> {
    let (bus, z) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ID:R,X, got '{}'", s))?;
    Ok(ShuntData {
        bus: parse_num(bus)?,
        impedance: parse_rx(z)?,
    })
}

fn parse_rx(s: &str) -> Result<Complex64, String> {
    let (r, x) = s
        .split_once(',')
        .ok_or_else(|| format!("expected R,X, got '{}'", s))?;
    Ok(Complex64::new(parse_num(r)?, parse_num(x)?))
}

fn parse_num<T: std::str::FromStr>(s: &str) -> Result<T, String> {
    s.trim().parse().map_err(|_| format!("invalid number '{}'", s))
}
