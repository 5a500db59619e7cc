mod dense;
mod error;
pub mod fault;
mod network;
pub mod report;
mod scopt;
mod session;
mod ybus;
pub mod zbus;

pub use dense::*;
pub use error::*;
pub use fault::{bolted_fault, bolted_fault_with, FaultResult};
pub use network::*;
pub use scopt::*;
pub use session::*;
pub use ybus::*;
pub use zbus::ZBus;
