use parking_lot::Mutex;
use serde::Serialize;

/// Position and logical size of one output in the compositor's global
/// coordinate space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub label: String,
    pub valid: bool,
}

impl MonitorGeometry {
    pub fn new(label: impl Into<String>, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            label: label.into(),
            valid: true,
        }
    }

    /// Snapshot describing an output that is gone or was never known.
    pub fn invalid(label: impl Into<String>) -> Self {
        Self { label: label.into(), ..Self::default() }
    }

    /// Half-open containment: the right and bottom edges belong to the
    /// neighbouring output.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        let (px, py) = (i64::from(px), i64::from(py));
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        px >= x
            && px < x + i64::from(self.width)
            && py >= y
            && py < y + i64::from(self.height)
    }

    /// Pointer y relative to the top of this output, if the pointer is on it.
    pub fn relative_y(&self, px: i32, py: i32) -> Option<i32> {
        (self.valid && self.contains(px, py)).then(|| py - self.y)
    }
}

/// Lock-guarded snapshot of the owning output's geometry.
///
/// Written whole by the dispatch thread, copied out whole by the sampler, so
/// a reader never observes a half-updated rectangle.
#[derive(Debug, Default)]
pub struct GeometryCache(Mutex<MonitorGeometry>);

impl GeometryCache {
    pub fn new() -> Self { Self::default() }

    pub fn write(&self, geometry: MonitorGeometry) { *self.0.lock() = geometry; }

    pub fn invalidate(&self) {
        let mut guard = self.0.lock();
        let label = std::mem::take(&mut guard.label);
        *guard = MonitorGeometry::invalid(label);
    }

    /// Returns a copy of the snapshot, or `None` if there is no usable output.
    pub fn read(&self) -> Option<MonitorGeometry> {
        let snapshot = self.0.lock().clone();
        snapshot.valid.then_some(snapshot)
    }
}
