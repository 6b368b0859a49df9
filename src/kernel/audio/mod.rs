pub mod monitor;

pub use monitor::AmplitudeMonitor;
