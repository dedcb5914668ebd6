//! Province adjacency graph (§3.5): an undirected multi-map built once from
//! the province-id bitmap by scanning 4-neighborhood (optionally 8-neighborhood)
//! borders, plus the straits/river crossings layered in from
//! `map/adjacencies.csv`. Feeds pathfinding, AI distance-tier BFS, and the
//! border-rendering pipeline.

use crate::bitmap::Bitmap;
use crate::definition::ProvinceRoster;
use crate::error::DataError;
use archon_pathfinding::{Graph, Neighbors};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A dense province index, matching the row order `ProvinceRoster` assigns.
/// Distinct from the simulation core's `ProvinceId`, which additionally
/// reserves 0 for "none" and is assembled by offsetting these indices by one.
pub type DenseProvinceId = u32;

#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    adjacencies: HashMap<DenseProvinceId, HashSet<DenseProvinceId>>,
    river_crossings: HashSet<(DenseProvinceId, DenseProvinceId)>,
}

impl AdjacencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_adjacency(&mut self, p1: DenseProvinceId, p2: DenseProvinceId) {
        self.adjacencies.entry(p1).or_default().insert(p2);
        self.adjacencies.entry(p2).or_default().insert(p1);
    }

    pub fn neighbors(&self, province: DenseProvinceId) -> Vec<DenseProvinceId> {
        self.adjacencies
            .get(&province)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn are_adjacent(&self, p1: DenseProvinceId, p2: DenseProvinceId) -> bool {
        self.adjacencies.get(&p1).map(|set| set.contains(&p2)).unwrap_or(false)
    }

    pub fn mark_river_crossing(&mut self, from: DenseProvinceId, to: DenseProvinceId) {
        self.river_crossings.insert((from, to));
        self.river_crossings.insert((to, from));
    }

    pub fn is_river_crossing(&self, from: DenseProvinceId, to: DenseProvinceId) -> bool {
        self.river_crossings.contains(&(from, to))
    }

    pub fn province_count(&self) -> usize {
        self.adjacencies.len()
    }
}

impl Neighbors<DenseProvinceId> for AdjacencyGraph {
    fn neighbors_of(&self, node: DenseProvinceId) -> Vec<DenseProvinceId> {
        self.neighbors(node)
    }
}

/// Movement-cost policy handed to `Graph` queries; distinct contexts (land
/// army, fleet, a particular map mode) weight the same adjacency graph
/// differently.
pub trait CostCalculator {
    fn calculate_cost(&self, from: DenseProvinceId, to: DenseProvinceId) -> u32;
    fn calculate_heuristic(&self, from: DenseProvinceId, target: DenseProvinceId) -> u32;
}

impl<C> Graph<DenseProvinceId, C> for AdjacencyGraph
where
    C: CostCalculator,
{
    fn neighbors(&self, node: DenseProvinceId, _context: &C) -> Vec<DenseProvinceId> {
        self.neighbors(node)
    }

    fn cost(&self, from: DenseProvinceId, to: DenseProvinceId, context: &C) -> u32 {
        context.calculate_cost(from, to)
    }

    fn heuristic(&self, from: DenseProvinceId, target: DenseProvinceId, context: &C) -> u32 {
        context.calculate_heuristic(from, target)
    }
}

/// A row from `map/adjacencies.csv`: `From;To;Type;Through;start_x;start_y;stop_x;stop_y;adjacency_rule_name;Comment`.
#[derive(Debug, Clone)]
pub struct StraitEntry {
    pub from: DenseProvinceId,
    pub to: DenseProvinceId,
    pub crossing_type: String,
    pub through: Option<DenseProvinceId>,
}

/// Parses `adjacencies.csv`, resolving its sparse `DefinitionId`s against
/// `roster` to produce dense province indices. Rows referencing an unknown
/// definition id are skipped.
pub fn load_adjacencies_csv(path: &Path, roster: &ProvinceRoster) -> Result<Vec<StraitEntry>, DataError> {
    let raw = std::fs::read(path).map_err(|e| DataError::FileIo {
        path: path.to_path_buf(),
        source: e,
    })?;
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .comment(Some(b'#'))
        .flexible(true)
        .has_headers(true)
        .from_reader(decoded.as_bytes());

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = result?;

        let Some(from_def) = record.get(0).and_then(|s| s.trim().parse::<u32>().ok()) else {
            continue;
        };
        let Some(to_def) = record.get(1).and_then(|s| s.trim().parse::<u32>().ok()) else {
            continue;
        };
        let (Some(from), Some(to)) = (
            roster.dense_index_of(crate::definition::DefinitionId(from_def)),
            roster.dense_index_of(crate::definition::DefinitionId(to_def)),
        ) else {
            continue;
        };

        let crossing_type = record.get(2).unwrap_or("").trim().to_string();
        let through = record.get(3).and_then(|s| {
            let s = s.trim();
            if s.is_empty() || s == "-1" {
                None
            } else {
                s.parse::<u32>()
                    .ok()
                    .and_then(|def| roster.dense_index_of(crate::definition::DefinitionId(def)))
            }
        });

        entries.push(StraitEntry {
            from: from as DenseProvinceId,
            to: to as DenseProvinceId,
            crossing_type,
            through: through.map(|t| t as DenseProvinceId),
        });
    }

    Ok(entries)
}

/// Builds the adjacency graph from `provinces.bmp` by scanning right/down
/// pixel neighbors, then layers in straits and river crossings from
/// `adjacencies.csv` if it's present.
pub fn build_adjacency_graph(
    provinces_bmp_path: &Path,
    adjacencies_csv_path: &Path,
    roster: &ProvinceRoster,
    diagonals: bool,
) -> Result<AdjacencyGraph, DataError> {
    let bitmap = Bitmap::load(provinces_bmp_path)?;
    let mut graph = adjacency_from_bitmap(&bitmap, roster, diagonals);

    if adjacencies_csv_path.exists() {
        let entries = load_adjacencies_csv(adjacencies_csv_path, roster)?;
        log::info!(target: "core_data_loading", "loaded {} strait entries", entries.len());
        let mut river_count = 0;
        for entry in &entries {
            graph.add_adjacency(entry.from, entry.to);
            if entry.crossing_type.eq_ignore_ascii_case("river") {
                graph.mark_river_crossing(entry.from, entry.to);
                river_count += 1;
            }
        }
        if river_count > 0 {
            log::info!(target: "core_data_loading", "detected {river_count} river crossings");
        }
    }

    Ok(graph)
}

fn adjacency_from_bitmap(bitmap: &Bitmap, roster: &ProvinceRoster, diagonals: bool) -> AdjacencyGraph {
    let mut graph = AdjacencyGraph::new();
    let width = bitmap.width;
    let height = bitmap.height;

    let mut offsets: Vec<(i64, i64)> = vec![(1, 0), (0, 1)];
    if diagonals {
        offsets.push((1, 1));
        offsets.push((1, -1));
    }

    for y in 0..height {
        for x in 0..width {
            let Some(&here) = roster.dense_index_of_color(bitmap.pixel(x, y)).map(|i| i as u32).as_ref() else {
                continue;
            };
            for &(dx, dy) in &offsets {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                let neighbor_color = bitmap.pixel(nx as u32, ny as u32);
                if let Some(there) = roster.dense_index_of_color(neighbor_color) {
                    let there = there as u32;
                    if there != here {
                        graph.add_adjacency(here, there);
                    }
                }
            }
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ProvinceRoster;

    fn roster_with(colors: &[(u8, u8, u8)]) -> ProvinceRoster {
        let lines: Vec<String> = colors
            .iter()
            .enumerate()
            .map(|(i, (r, g, b))| format!("{};{};{};{};P{}", i + 1, r, g, b, i))
            .collect();
        ProvinceRoster::parse(&lines.join("\n")).unwrap()
    }

    fn make_bmp(width: u32, height: u32, pixel_fn: impl Fn(u32, u32) -> (u8, u8, u8)) -> Vec<u8> {
        let row_stride = ((width as usize * 3 + 3) / 4) * 4;
        let pixel_data_size = row_stride * height as usize;
        let pixel_offset = 54u32;
        let file_size = pixel_offset + pixel_data_size as u32;

        let mut buf = Vec::with_capacity(file_size as usize);
        buf.extend_from_slice(b"BM");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&pixel_offset.to_le_bytes());
        buf.extend_from_slice(&40u32.to_le_bytes());
        buf.extend_from_slice(&(width as i32).to_le_bytes());
        buf.extend_from_slice(&(height as i32).to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&24u16.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&(pixel_data_size as u32).to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);

        for y in (0..height).rev() {
            let mut row = Vec::with_capacity(row_stride);
            for x in 0..width {
                let (r, g, b) = pixel_fn(x, y);
                row.push(b);
                row.push(g);
                row.push(r);
            }
            row.resize(row_stride, 0);
            buf.extend_from_slice(&row);
        }
        buf
    }

    #[test]
    fn test_adjacency_from_bitmap_two_provinces() {
        let roster = roster_with(&[(255, 0, 0), (0, 255, 0)]);
        let bytes = make_bmp(4, 1, |x, _| if x < 2 { (255, 0, 0) } else { (0, 255, 0) });
        let bitmap = Bitmap::parse(&bytes).unwrap();

        let graph = adjacency_from_bitmap(&bitmap, &roster, false);
        assert!(graph.are_adjacent(0, 1));
        assert!(graph.are_adjacent(1, 0));
    }

    #[test]
    fn test_no_self_adjacency() {
        let roster = roster_with(&[(1, 1, 1)]);
        let bytes = make_bmp(2, 2, |_, _| (1, 1, 1));
        let bitmap = Bitmap::parse(&bytes).unwrap();
        let graph = adjacency_from_bitmap(&bitmap, &roster, false);
        assert_eq!(graph.neighbors(0), Vec::<DenseProvinceId>::new());
    }

    #[test]
    fn test_diagonals_off_by_default() {
        let roster = roster_with(&[(255, 0, 0), (0, 0, 255)]);
        // Provinces touch only at a diagonal corner.
        let bytes = make_bmp(2, 2, |x, y| if x == 0 && y == 0 { (255, 0, 0) } else { (0, 0, 255) });
        let bitmap = Bitmap::parse(&bytes).unwrap();

        let graph_no_diag = adjacency_from_bitmap(&bitmap, &roster, false);
        assert!(!graph_no_diag.are_adjacent(0, 1));

        let graph_diag = adjacency_from_bitmap(&bitmap, &roster, true);
        assert!(graph_diag.are_adjacent(0, 1));
    }

    #[test]
    fn test_river_crossing_marking() {
        let mut graph = AdjacencyGraph::new();
        graph.add_adjacency(0, 1);
        assert!(!graph.is_river_crossing(0, 1));
        graph.mark_river_crossing(0, 1);
        assert!(graph.is_river_crossing(0, 1));
        assert!(graph.is_river_crossing(1, 0));
    }

    #[test]
    fn test_load_adjacencies_csv() {
        use std::io::Write;
        let roster = roster_with(&[(1, 1, 1), (2, 2, 2)]);
        let data = "From;To;Type;Through;start_x;start_y;stop_x;stop_y;adjacency_rule_name;Comment\n1;2;river;-1;0;0;0;0;;\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{data}").unwrap();

        let entries = load_adjacencies_csv(file.path(), &roster).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].from, 0);
        assert_eq!(entries[0].to, 1);
        assert_eq!(entries[0].crossing_type, "river");
    }

    #[test]
    fn test_bfs_distances_over_adjacency_graph() {
        use archon_pathfinding::bfs_distances;
        let mut graph = AdjacencyGraph::new();
        graph.add_adjacency(0, 1);
        graph.add_adjacency(1, 2);
        graph.add_adjacency(2, 3);

        let distances = bfs_distances(&graph, [0u32]);
        assert_eq!(distances[&0], 0);
        assert_eq!(distances[&1], 1);
        assert_eq!(distances[&2], 2);
        assert_eq!(distances[&3], 3);
    }
}
