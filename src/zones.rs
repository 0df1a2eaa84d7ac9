//! Zone table and point-in-polygon membership index.
//!
//! Zones are named polygonal regions with an alert flag. The inference stage
//! asks "which zone, if any, contains this point" for every detection anchor;
//! zone editing tools mutate the table concurrently. The table is therefore
//! copy-on-write: readers take an `Arc` snapshot and writers swap in a fully
//! constructed replacement, so a `locate()` racing an `update()` sees either
//! the old polygon or the new one, never a mix of vertices.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::render::Renderer;
use crate::Frame;

// -------------------- Polygon --------------------

/// A simple polygon in pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<(f64, f64)>,
}

impl Polygon {
    /// Build a polygon. Fewer than 3 vertices is never admitted.
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(anyhow!(
                "polygon requires at least 3 vertices, got {}",
                vertices.len()
            ));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// Point containment by the even-odd (ray crossing) rule.
    ///
    /// Self-intersecting input is not rejected; it resolves by the same rule,
    /// so a region enclosed an even number of times counts as outside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Area centroid by the shoelace formula. Degenerate (zero-area) polygons
    /// fall back to the vertex mean.
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.vertices.len();
        let mut area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let (x0, y0) = self.vertices[i];
            let (x1, y1) = self.vertices[(i + 1) % n];
            let cross = x0 * y1 - x1 * y0;
            area += cross;
            cx += (x0 + x1) * cross;
            cy += (y0 + y1) * cross;
        }
        if area.abs() < f64::EPSILON {
            let sum = self
                .vertices
                .iter()
                .fold((0.0, 0.0), |acc, v| (acc.0 + v.0, acc.1 + v.1));
            return (sum.0 / n as f64, sum.1 / n as f64);
        }
        area *= 0.5;
        (cx / (6.0 * area), cy / (6.0 * area))
    }
}

// -------------------- Zone definitions --------------------

/// A named zone with its polygon, display color and alert flag.
#[derive(Clone, Debug)]
pub struct ZoneDefinition {
    pub id: String,
    pub name: String,
    pub polygon: Polygon,
    /// RGB display color for overlays.
    pub color: [u8; 3],
    /// Zones with alerts disabled are drawn but never matched by `locate`.
    pub alert_enabled: bool,
}

/// Persisted form of a zone: `zone_id -> {name, points, color, alert_enabled}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub color: [u8; 3],
    #[serde(default = "default_alert_enabled")]
    pub alert_enabled: bool,
}

fn default_alert_enabled() -> bool {
    true
}

type ZoneTable = Vec<Arc<ZoneDefinition>>;

// -------------------- Zone index --------------------

/// Membership index over the zone table.
///
/// `locate` answers first-match in insertion order: with overlapping zones
/// only the first enabled match ever surfaces.
pub struct ZoneIndex {
    table: RwLock<Arc<ZoneTable>>,
}

impl ZoneIndex {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Load zones from persisted records. Records with fewer than 3 points
    /// are skipped individually rather than failing the whole load.
    pub fn from_records(records: &BTreeMap<String, ZoneRecord>) -> Self {
        let index = Self::new();
        for (zone_id, record) in records {
            let points: Vec<(f64, f64)> = record.points.iter().map(|p| (p[0], p[1])).collect();
            if let Err(e) = index.add(
                zone_id,
                &record.name,
                points,
                record.color,
                record.alert_enabled,
            ) {
                log::warn!("skipping zone {}: {}", zone_id, e);
            }
        }
        index
    }

    /// Load the zone table from a JSON file. A missing file yields an empty
    /// index; the caller decides whether to fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read zone file {}: {}", path.display(), e))?;
        let records: BTreeMap<String, ZoneRecord> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid zone file {}: {}", path.display(), e))?;
        Ok(Self::from_records(&records))
    }

    /// Persist the current table as `zone_id -> record` JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let records = self.to_records();
        let json = serde_json::to_string_pretty(&records)?;
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn to_records(&self) -> BTreeMap<String, ZoneRecord> {
        let table = self.snapshot();
        table
            .iter()
            .map(|zone| {
                (
                    zone.id.clone(),
                    ZoneRecord {
                        name: zone.name.clone(),
                        points: zone
                            .polygon
                            .vertices()
                            .iter()
                            .map(|&(x, y)| [x, y])
                            .collect(),
                        color: zone.color,
                        alert_enabled: zone.alert_enabled,
                    },
                )
            })
            .collect()
    }

    /// Atomic snapshot of the zone table for lock-free iteration.
    pub fn snapshot(&self) -> Arc<ZoneTable> {
        self.table.read().expect("zone table lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// First enabled zone containing the point, in insertion order.
    pub fn locate(&self, x: f64, y: f64) -> Option<String> {
        let table = self.snapshot();
        for zone in table.iter() {
            if !zone.alert_enabled {
                continue;
            }
            if zone.polygon.contains(x, y) {
                return Some(zone.id.clone());
            }
        }
        None
    }

    /// Add a zone. Rejects duplicate ids and polygons with fewer than 3
    /// vertices.
    pub fn add(
        &self,
        id: &str,
        name: &str,
        points: Vec<(f64, f64)>,
        color: [u8; 3],
        alert_enabled: bool,
    ) -> Result<()> {
        let polygon = Polygon::new(points)?;
        let mut guard = self.table.write().expect("zone table lock poisoned");
        if guard.iter().any(|zone| zone.id == id) {
            return Err(anyhow!("zone {} already exists", id));
        }
        let mut next: ZoneTable = guard.as_ref().clone();
        next.push(Arc::new(ZoneDefinition {
            id: id.to_string(),
            name: name.to_string(),
            polygon,
            color,
            alert_enabled,
        }));
        *guard = Arc::new(next);
        Ok(())
    }

    /// Update fields of an existing zone. The replacement definition is fully
    /// constructed before it becomes visible, so concurrent `locate` calls
    /// never observe a partially updated polygon.
    pub fn update(
        &self,
        id: &str,
        points: Option<Vec<(f64, f64)>>,
        alert_enabled: Option<bool>,
        color: Option<[u8; 3]>,
    ) -> Result<()> {
        let polygon = points.map(Polygon::new).transpose()?;
        let mut guard = self.table.write().expect("zone table lock poisoned");
        let pos = guard
            .iter()
            .position(|zone| zone.id == id)
            .ok_or_else(|| anyhow!("unknown zone {}", id))?;
        let mut next: ZoneTable = guard.as_ref().clone();
        let current = &next[pos];
        next[pos] = Arc::new(ZoneDefinition {
            id: current.id.clone(),
            name: current.name.clone(),
            polygon: polygon.unwrap_or_else(|| current.polygon.clone()),
            color: color.unwrap_or(current.color),
            alert_enabled: alert_enabled.unwrap_or(current.alert_enabled),
        });
        *guard = Arc::new(next);
        Ok(())
    }

    /// Remove a zone. Rejects unknown ids.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut guard = self.table.write().expect("zone table lock poisoned");
        let pos = guard
            .iter()
            .position(|zone| zone.id == id)
            .ok_or_else(|| anyhow!("unknown zone {}", id))?;
        let mut next: ZoneTable = guard.as_ref().clone();
        next.remove(pos);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Draw every zone on the frame: semi-transparent fill, solid outline,
    /// name label at the polygon centroid.
    pub fn render(&self, frame: &mut Frame, renderer: &dyn Renderer) {
        let table = self.snapshot();
        for zone in table.iter() {
            let points = zone.polygon.vertices();
            renderer.fill_polygon(frame, points, zone.color, 0.3);
            renderer.draw_outline(frame, points, zone.color);
            let (cx, cy) = zone.polygon.centroid();
            renderer.draw_label(frame, &zone.name, cx as i32, cy as i32, [255, 255, 255]);
        }
    }
}

impl Default for ZoneIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]
    }

    #[test]
    fn polygon_rejects_degenerate_input() {
        assert!(Polygon::new(vec![(0.0, 0.0), (0.0, 1.0)]).is_err());
        assert!(Polygon::new(vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0)]).is_ok());
    }

    #[test]
    fn containment_inside_and_outside() {
        let polygon = Polygon::new(square()).unwrap();
        assert!(polygon.contains(5.0, 5.0));
        assert!(!polygon.contains(15.0, 15.0));
    }

    #[test]
    fn locate_honors_alert_enabled() {
        let index = ZoneIndex::new();
        index.add("z1", "Z", square(), [255, 0, 0], false).unwrap();
        assert_eq!(index.locate(5.0, 5.0), None);

        index.update("z1", None, Some(true), None).unwrap();
        assert_eq!(index.locate(5.0, 5.0), Some("z1".to_string()));
    }

    #[test]
    fn locate_returns_first_match_in_insertion_order() {
        let index = ZoneIndex::new();
        index.add("a", "A", square(), [255, 0, 0], true).unwrap();
        index.add("b", "B", square(), [0, 255, 0], true).unwrap();
        assert_eq!(index.locate(5.0, 5.0), Some("a".to_string()));
    }

    #[test]
    fn add_rejects_duplicates_and_short_polygons() {
        let index = ZoneIndex::new();
        assert!(index
            .add("z1", "Z", vec![(0.0, 0.0), (0.0, 1.0)], [0, 0, 255], true)
            .is_err());
        assert!(index
            .add(
                "z1",
                "Z",
                vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0)],
                [0, 0, 255],
                true
            )
            .is_ok());
        assert!(index.add("z1", "Z", square(), [0, 0, 255], true).is_err());
    }

    #[test]
    fn update_replaces_polygon_wholesale() {
        let index = ZoneIndex::new();
        index
            .add(
                "z1",
                "Z",
                vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0)],
                [0, 0, 255],
                true,
            )
            .unwrap();
        index
            .update(
                "z1",
                Some(vec![(0.0, 0.0), (0.0, 20.0), (20.0, 20.0)]),
                None,
                None,
            )
            .unwrap();
        // Only reachable through the new polygon.
        assert_eq!(index.locate(2.0, 15.0), Some("z1".to_string()));
        assert_eq!(index.locate(9.0, 9.5), None);
    }

    #[test]
    fn update_and_remove_reject_unknown_ids() {
        let index = ZoneIndex::new();
        assert!(index.update("missing", None, Some(true), None).is_err());
        assert!(index.remove("missing").is_err());
    }

    #[test]
    fn records_round_trip_skips_short_polygons() {
        let mut records = BTreeMap::new();
        records.insert(
            "ok".to_string(),
            ZoneRecord {
                name: "Ok".to_string(),
                points: vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0]],
                color: [0, 0, 255],
                alert_enabled: true,
            },
        );
        records.insert(
            "broken".to_string(),
            ZoneRecord {
                name: "Broken".to_string(),
                points: vec![[0.0, 0.0], [0.0, 10.0]],
                color: [0, 0, 255],
                alert_enabled: true,
            },
        );
        let index = ZoneIndex::from_records(&records);
        assert_eq!(index.len(), 1);
        assert!(index.to_records().contains_key("ok"));
    }

    #[test]
    fn centroid_of_square() {
        let polygon = Polygon::new(square()).unwrap();
        let (cx, cy) = polygon.centroid();
        assert!((cx - 5.0).abs() < 1e-9);
        assert!((cy - 5.0).abs() < 1e-9);
    }
}
