use serde::Deserialize;

use super::geometry::MonitorGeometry;

/// One entry of the compositor's `j/monitors` reply.
///
/// Only the fields the geometry provider needs are kept; everything else in
/// the reply is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorData {
    pub name: String,
    pub x: i32,
    pub y: i32,
    /// Mode width in physical pixels.
    pub width: i32,
    /// Mode height in physical pixels.
    pub height: i32,
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// wl_output transform, 0..=7. Odd values rotate by 90 or 270 degrees.
    #[serde(default)]
    pub transform: u8,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub disabled: bool,
}

fn default_scale() -> f64 { 1.0 }

impl MonitorData {
    /// Logical size in the same units the cursor position is reported in.
    pub fn logical_size(&self) -> (i32, i32) {
        let scale = if self.scale.is_finite() && self.scale > 0.0 { self.scale } else { 1.0 };
        let w = (f64::from(self.width) / scale).round() as i32;
        let h = (f64::from(self.height) / scale).round() as i32;
        if self.transform % 2 == 1 { (h, w) } else { (w, h) }
    }

    pub fn geometry(&self) -> MonitorGeometry {
        let (width, height) = self.logical_size();
        MonitorGeometry::new(self.name.clone(), self.x, self.y, width, height)
    }
}

/// Picks the monitor named `name`, or the focused one when no name is given.
pub fn select_monitor<'a>(
    monitors: &'a [MonitorData],
    name: Option<&str>,
) -> Option<&'a MonitorData> {
    let mut usable = monitors.iter().filter(|m| !m.disabled);
    match name {
        Some(name) => usable.find(|m| m.name == name),
        None => {
            let candidates: Vec<_> = usable.collect();
            candidates.iter().find(|m| m.focused).or_else(|| candidates.first()).copied()
        }
    }
}
