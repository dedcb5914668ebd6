//! Border pipeline (§4.10): turns the jagged province boundaries read off
//! the source bitmap into smooth, zoom-independent borders. Everything in
//! this module runs once at load time on the CPU; the runtime cost lives in
//! the fragment shader that walks the spatial grid this module builds (see
//! the module-level doc for the five-step pipeline this implements:
//! extraction -> Chaikin smoothing -> Bezier fitting -> spatial grid ->
//! GPU upload). Curves are never refit at runtime.

use archon_core::config::SimConfig;
use std::collections::HashMap;

/// Caller-selectable border rendering strategy. Selected by a material
/// integer; shaders branch statically rather than dynamically per-fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingMode {
    None,
    /// Compute-only (see [`crate::compute::BorderDetectionDispatcher`]), jagged but cheap.
    PixelPerfect,
    DistanceField,
    /// The Bezier + spatial-grid pipeline this module builds.
    VectorCurves,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderType {
    Country,
    Province,
}

/// One cubic Bezier window of a smoothed province boundary. Explicit
/// `repr(C)` layout for direct GPU upload as a structured buffer; ids are
/// `u32` (not 16-bit) because GPU structured-buffer alignment rules would
/// otherwise force hidden padding that the shader-side offset table would
/// have to account for twice.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BezierSegment {
    pub p0: [f32; 2],
    pub p1: [f32; 2],
    pub p2: [f32; 2],
    pub p3: [f32; 2],
    pub border_type: u32,
    pub province_id1: u32,
    pub province_id2: u32,
}

const _: () = assert!(std::mem::size_of::<BezierSegment>() == 44);

impl BezierSegment {
    fn fit(points: &[(f32, f32)], border_type: BorderType, province_id1: u32, province_id2: u32) -> Self {
        let p0 = points[0];
        let p3 = *points.last().unwrap();
        let (p1, p2) = fit_interior_control_points(points, p0, p3);
        Self {
            p0: [p0.0, p0.1],
            p1: [p1.0, p1.1],
            p2: [p2.0, p2.1],
            p3: [p3.0, p3.1],
            border_type: border_type as u32,
            province_id1,
            province_id2,
        }
    }
}

/// Fits the two interior control points of a cubic Bezier to `points` by
/// constrained least squares: `p0`/`p3` are pinned to the chain's endpoints,
/// uniform parameterization `t_i = i/(n-1)` is assumed, and the 2x2 normal
/// equations for the Bernstein basis are solved directly (Schneider's
/// curve-fitting method, simplified to uniform parameterization since
/// boundary-pixel chains have no natural arc-length metric worth the extra
/// iteration).
fn fit_interior_control_points(points: &[(f32, f32)], p0: (f32, f32), p3: (f32, f32)) -> ((f32, f32), (f32, f32)) {
    let n = points.len();
    if n < 3 {
        // Degenerate window: fall back to a straight segment.
        let third = |t: f32| (p0.0 + (p3.0 - p0.0) * t, p0.1 + (p3.1 - p0.1) * t);
        return (third(1.0 / 3.0), third(2.0 / 3.0));
    }

    // Bernstein basis coefficients for the two free control points at each t.
    let mut c11 = 0.0f64;
    let mut c12 = 0.0f64;
    let mut c22 = 0.0f64;
    let mut x1 = 0.0f64;
    let mut x2 = 0.0f64;
    let mut y1 = 0.0f64;
    let mut y2 = 0.0f64;

    for (i, &(px, py)) in points.iter().enumerate() {
        let t = i as f64 / (n - 1) as f64;
        let b0 = (1.0 - t).powi(3);
        let b1 = 3.0 * t * (1.0 - t).powi(2);
        let b2 = 3.0 * t * t * (1.0 - t);
        let b3 = t.powi(3);

        c11 += b1 * b1;
        c12 += b1 * b2;
        c22 += b2 * b2;

        let rx = px as f64 - b0 * p0.0 as f64 - b3 * p3.0 as f64;
        let ry = py as f64 - b0 * p0.1 as f64 - b3 * p3.1 as f64;

        x1 += b1 * rx;
        x2 += b2 * rx;
        y1 += b1 * ry;
        y2 += b2 * ry;
    }

    let det = c11 * c22 - c12 * c12;
    if det.abs() < 1e-9 {
        let third = |t: f32| (p0.0 + (p3.0 - p0.0) * t, p0.1 + (p3.1 - p0.1) * t);
        return (third(1.0 / 3.0), third(2.0 / 3.0));
    }

    let p1x = (c22 * x1 - c12 * x2) / det;
    let p2x = (c11 * x2 - c12 * x1) / det;
    let p1y = (c22 * y1 - c12 * y2) / det;
    let p2y = (c11 * y2 - c12 * y1) / det;

    ((p1x as f32, p1y as f32), (p2x as f32, p2y as f32))
}

/// An ordered chain of shared-boundary pixel centers between exactly two
/// provinces, produced by [`extract_boundary_chains`].
#[derive(Debug, Clone)]
pub struct BoundaryChain {
    pub province_a: u32,
    pub province_b: u32,
    pub points: Vec<(f32, f32)>,
}

/// Step 1: walk the province-id bitmap and chain shared boundary pixels
/// into ordered paths, one chain per adjacent province pair per contiguous
/// run. `pixels` is row-major, `width * height` province ids.
pub fn extract_boundary_chains(pixels: &[u16], width: u32, height: u32) -> Vec<BoundaryChain> {
    let mut by_pair: HashMap<(u16, u16), Vec<(u32, u32)>> = HashMap::new();

    let idx = |x: u32, y: u32| (y * width + x) as usize;
    for y in 0..height {
        for x in 0..width {
            let here = pixels[idx(x, y)];
            if x + 1 < width {
                let right = pixels[idx(x + 1, y)];
                if right != here {
                    let key = (here.min(right), here.max(right));
                    by_pair.entry(key).or_default().push((x, y));
                }
            }
            if y + 1 < height {
                let down = pixels[idx(x, y + 1)];
                if down != here {
                    let key = (here.min(down), here.max(down));
                    by_pair.entry(key).or_default().push((x, y));
                }
            }
        }
    }

    by_pair
        .into_iter()
        .filter(|(_, pts)| !pts.is_empty())
        .map(|((a, b), pts)| BoundaryChain { province_a: a as u32, province_b: b as u32, points: order_by_nearest_neighbor(pts) })
        .collect()
}

/// Greedy nearest-neighbor walk starting from the first collected pixel.
/// Boundary pixel sets are small and locally clustered, so this produces a
/// visually ordered path without the cost of a full TSP solve.
fn order_by_nearest_neighbor(mut remaining: Vec<(u32, u32)>) -> Vec<(f32, f32)> {
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut current = remaining.swap_remove(0);
    ordered.push(current);

    while !remaining.is_empty() {
        let (best_idx, _) = remaining
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let dx = x as i64 - current.0 as i64;
                let dy = y as i64 - current.1 as i64;
                (i, dx * dx + dy * dy)
            })
            .min_by_key(|&(_, d)| d)
            .unwrap();
        current = remaining.swap_remove(best_idx);
        ordered.push(current);
    }

    ordered.into_iter().map(|(x, y)| (x as f32, y as f32)).collect()
}

/// Step 1b: Chaikin corner-cutting. Chains shorter than `min_chain_len`
/// (§config `border_chaikin_min_chain_len`) are used raw — smoothing a
/// handful of pixels just introduces sub-pixel degeneracy.
pub fn chaikin_smooth(points: &[(f32, f32)], min_chain_len: usize, iterations: u32) -> Vec<(f32, f32)> {
    if points.len() < min_chain_len || points.len() < 3 {
        return points.to_vec();
    }

    let mut current = points.to_vec();
    for _ in 0..iterations {
        let mut next = Vec::with_capacity(current.len() * 2);
        next.push(current[0]);
        for window in current.windows(2) {
            let (p0, p1) = (window[0], window[1]);
            let q = (0.75 * p0.0 + 0.25 * p1.0, 0.75 * p0.1 + 0.25 * p1.1);
            let r = (0.25 * p0.0 + 0.75 * p1.0, 0.25 * p0.1 + 0.75 * p1.1);
            next.push(q);
            next.push(r);
        }
        next.push(*current.last().unwrap());
        current = next;
    }
    current
}

/// Step 2: segment a smoothed chain into ~10-15 point windows and fit one
/// cubic Bezier per window.
pub fn fit_bezier_segments(
    chain: &BoundaryChain,
    min_chain_len: usize,
    window_size: usize,
) -> Vec<BezierSegment> {
    let smoothed = chaikin_smooth(&chain.points, min_chain_len, 2);
    if smoothed.len() < 2 {
        return Vec::new();
    }

    // Country borders get drawn on top of province borders at runtime;
    // whether a pair is a country border depends on ownership, which this
    // module doesn't know about. Callers of the full pipeline
    // (build_border_pipeline) resolve border_type per pair before calling this.
    let mut segments = Vec::new();
    let mut start = 0;
    while start < smoothed.len() - 1 {
        let end = (start + window_size).min(smoothed.len() - 1);
        let window = &smoothed[start..=end];
        if window.len() >= 2 {
            segments.push(BezierSegment::fit(window, BorderType::Province, chain.province_a, chain.province_b));
        }
        if end == smoothed.len() - 1 {
            break;
        }
        start = end;
    }
    segments
}

/// Step 3: uniform spatial grid over the map, `gridCellRanges[i]` gives the
/// `(start, count)` slice of `gridIndexList` holding the segment indices
/// whose bounding box intersects cell `i`.
pub struct SpatialGrid {
    pub cell_size: u32,
    pub grid_w: u32,
    pub grid_h: u32,
    pub cell_ranges: Vec<(u32, u32)>,
    pub index_list: Vec<u32>,
}

const DENSITY_WARN_THRESHOLD: usize = 500;

pub fn build_spatial_grid(segments: &[BezierSegment], map_width: u32, map_height: u32, cell_size: u32) -> SpatialGrid {
    let grid_w = (map_width + cell_size - 1) / cell_size;
    let grid_h = (map_height + cell_size - 1) / cell_size;
    let mut per_cell: Vec<Vec<u32>> = vec![Vec::new(); (grid_w * grid_h) as usize];

    for (seg_idx, seg) in segments.iter().enumerate() {
        let xs = [seg.p0[0], seg.p1[0], seg.p2[0], seg.p3[0]];
        let ys = [seg.p0[1], seg.p1[1], seg.p2[1], seg.p3[1]];
        let min_x = xs.iter().cloned().fold(f32::MAX, f32::min).max(0.0) as u32 / cell_size;
        let max_x = (xs.iter().cloned().fold(f32::MIN, f32::max).max(0.0) as u32 / cell_size).min(grid_w.saturating_sub(1));
        let min_y = ys.iter().cloned().fold(f32::MAX, f32::min).max(0.0) as u32 / cell_size;
        let max_y = (ys.iter().cloned().fold(f32::MIN, f32::max).max(0.0) as u32 / cell_size).min(grid_h.saturating_sub(1));

        for gy in min_y..=max_y.max(min_y) {
            for gx in min_x..=max_x.max(min_x) {
                if gx < grid_w && gy < grid_h {
                    per_cell[(gy * grid_w + gx) as usize].push(seg_idx as u32);
                }
            }
        }
    }

    let mut cell_ranges = Vec::with_capacity(per_cell.len());
    let mut index_list = Vec::new();
    for cell in &per_cell {
        if cell.len() > DENSITY_WARN_THRESHOLD {
            log::warn!(target: "map_initialization", "border grid cell holds {} segments, exceeds the {} average target", cell.len(), DENSITY_WARN_THRESHOLD);
        }
        let start = index_list.len() as u32;
        index_list.extend_from_slice(cell);
        cell_ranges.push((start, cell.len() as u32));
    }

    SpatialGrid { cell_size, grid_w, grid_h, cell_ranges, index_list }
}

/// The full CPU-side artifact of the border pipeline, ready for GPU upload
/// as two structured buffers (segments, grid) per §4.10 step 4.
pub struct BorderPipeline {
    pub segments: Vec<BezierSegment>,
    pub grid: SpatialGrid,
}

/// Runs steps 1-3 over a full province-id bitmap. `is_country_border`
/// resolves, for a given province pair, whether the pair also crosses a
/// country boundary (so the segment is tagged `BorderType::Country` instead
/// of `BorderType::Province`) — ownership lookup is the caller's concern.
pub fn build_border_pipeline(
    pixels: &[u16],
    width: u32,
    height: u32,
    config: &SimConfig,
    is_country_border: impl Fn(u32, u32) -> bool,
) -> BorderPipeline {
    let chains = extract_boundary_chains(pixels, width, height);
    let mut segments = Vec::new();
    for chain in &chains {
        let mut chain_segments = fit_bezier_segments(chain, config.border_chaikin_min_chain_len, 12);
        if is_country_border(chain.province_a, chain.province_b) {
            for seg in &mut chain_segments {
                seg.border_type = BorderType::Country as u32;
            }
        }
        segments.extend(chain_segments);
    }

    let grid = build_spatial_grid(&segments, width, height, config.border_grid_cell_size);
    BorderPipeline { segments, grid }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_region_bitmap() -> (Vec<u16>, u32, u32) {
        // 8x8 split down the middle: left half province 1, right half province 2.
        let width = 8;
        let height = 8;
        let mut pixels = vec![0u16; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                pixels[(y * width + x) as usize] = if x < width / 2 { 1 } else { 2 };
            }
        }
        (pixels, width, height)
    }

    #[test]
    fn test_extract_finds_single_chain_for_two_region_split() {
        let (pixels, w, h) = two_region_bitmap();
        let chains = extract_boundary_chains(&pixels, w, h);
        assert_eq!(chains.len(), 1);
        assert_eq!((chains[0].province_a, chains[0].province_b), (1, 2));
        assert_eq!(chains[0].points.len(), h as usize);
    }

    #[test]
    fn test_chaikin_smooth_preserves_short_chains_raw() {
        let points = vec![(0.0, 0.0), (1.0, 1.0)];
        let smoothed = chaikin_smooth(&points, 20, 2);
        assert_eq!(smoothed, points);
    }

    #[test]
    fn test_chaikin_smooth_grows_long_chains() {
        let points: Vec<(f32, f32)> = (0..30).map(|i| (i as f32, 0.0)).collect();
        let smoothed = chaikin_smooth(&points, 20, 1);
        assert!(smoothed.len() > points.len());
    }

    #[test]
    fn test_fit_bezier_segments_pins_endpoints() {
        let chain = BoundaryChain { province_a: 1, province_b: 2, points: (0..20).map(|i| (i as f32, (i as f32).sin())).collect() };
        let segments = fit_bezier_segments(&chain, 5, 8);
        assert!(!segments.is_empty());
        assert_eq!(segments[0].p0, [0.0, 0.0]);
    }

    #[test]
    fn test_spatial_grid_places_segment_in_its_bounding_cell() {
        let seg = BezierSegment { p0: [2.0, 2.0], p1: [3.0, 2.0], p2: [4.0, 3.0], p3: [5.0, 3.0], border_type: 1, province_id1: 1, province_id2: 2 };
        let grid = build_spatial_grid(&[seg], 64, 64, 64);
        assert_eq!(grid.grid_w, 1);
        assert_eq!(grid.grid_h, 1);
        assert_eq!(grid.cell_ranges[0], (0, 1));
        assert_eq!(grid.index_list, vec![0]);
    }

    #[test]
    fn test_build_border_pipeline_end_to_end() {
        let (pixels, w, h) = two_region_bitmap();
        let config = SimConfig::default();
        let pipeline = build_border_pipeline(&pixels, w, h, &config, |_, _| true);
        assert!(!pipeline.segments.is_empty());
        assert!(pipeline.segments.iter().all(|s| s.border_type == BorderType::Country as u32));
    }

    #[test]
    fn test_bezier_segment_is_explicit_layout() {
        assert_eq!(std::mem::size_of::<BezierSegment>(), 44);
    }
}
