pub mod geometry;
pub mod server;
pub mod visibility;
pub use geometry::{GeometryCache, MonitorGeometry};
pub use visibility::{StateSlot, Step, Thresholds, VisibilityMachine, VisibilityState, Zone};
