pub mod auth;
pub mod errors;
pub mod monitor;
pub mod probe;
pub mod routes;
pub mod settings;

pub use monitor::{ProxyHealthMonitor, ProxyList};
pub use probe::{AwcProbe, Probe, ProbeOutcome};
pub use settings::AppSettings;
