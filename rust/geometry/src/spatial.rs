// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial index for radius and k-nearest point queries.
//!
//! Uses a grid-based spatial hash. Points are bucketed into cubic cells of
//! side `cell_size`; a radius query visits every cell overlapping the query
//! sphere's bounding cube. The index is immutable after build.

use nalgebra::Point3;
use rustc_hash::FxHashMap;

/// A query hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub point: Point3<f64>,
    pub distance: f64,
}

/// A spatial hash grid over a fixed point set. Point ids are slice indices.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    grid: FxHashMap<(i64, i64, i64), Vec<usize>>,
    points: Vec<Point3<f64>>,
    /// Diagonal of the point set's bounds; bounds k-nearest radius growth.
    extent: f64,
}

impl SpatialIndex {
    /// Builds an index over `points` with the given cell size.
    ///
    /// A non-positive or non-finite `cell_size` picks one from the point
    /// density (bounding diagonal / ∛n).
    pub fn build(points: &[Point3<f64>], cell_size: f64) -> Self {
        let (lo, hi) = bounds(points);
        let diagonal = (hi - lo).norm();
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            auto_cell_size(diagonal, points.len())
        };

        let mut index = Self {
            cell_size,
            grid: FxHashMap::default(),
            points: points.to_vec(),
            extent: diagonal,
        };
        for (id, p) in points.iter().enumerate() {
            let cell = index.cell_coords(p);
            index.grid.entry(cell).or_default().push(id);
        }
        index
    }

    /// Builds an index with an automatically chosen cell size.
    pub fn build_auto(points: &[Point3<f64>]) -> Self {
        Self::build(points, 0.0)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, id: usize) -> Option<Point3<f64>> {
        self.points.get(id).copied()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Finds all points within `radius` of `center`, in no particular order.
    ///
    /// `exclude` removes the querying point itself when it is indexed.
    pub fn query_radius(
        &self,
        center: &Point3<f64>,
        radius: f64,
        exclude: Option<usize>,
    ) -> Vec<Neighbor> {
        let mut result = Vec::new();
        if radius < 0.0 || !radius.is_finite() {
            return result;
        }
        let r_sq = radius * radius;
        let (x0, y0, z0) = self.cell_coords(&(center - nalgebra::Vector3::repeat(radius)));
        let (x1, y1, z1) = self.cell_coords(&(center + nalgebra::Vector3::repeat(radius)));

        let span = cell_span(x0, x1)
            .zip(cell_span(y0, y1))
            .zip(cell_span(z0, z1))
            .and_then(|((x, y), z)| x.checked_mul(y)?.checked_mul(z));
        let mut visit = |id: usize| {
            if Some(id) == exclude {
                return;
            }
            let p = self.points[id];
            let d_sq = (p - center).norm_squared();
            if d_sq <= r_sq {
                result.push(Neighbor {
                    id,
                    point: p,
                    distance: d_sq.sqrt(),
                });
            }
        };

        if span.map_or(true, |span| span > self.grid.len() as u128) {
            // Fewer occupied cells than cells in range: scan buckets directly
            for (&(cx, cy, cz), ids) in &self.grid {
                if (x0..=x1).contains(&cx) && (y0..=y1).contains(&cy) && (z0..=z1).contains(&cz) {
                    ids.iter().copied().for_each(&mut visit);
                }
            }
        } else {
            for cx in x0..=x1 {
                for cy in y0..=y1 {
                    for cz in z0..=z1 {
                        if let Some(ids) = self.grid.get(&(cx, cy, cz)) {
                            ids.iter().copied().for_each(&mut visit);
                        }
                    }
                }
            }
        }

        result
    }

    /// Finds up to `k` nearest points, sorted by distance (ties by id).
    ///
    /// Grows the search radius geometrically from one cell until at least
    /// `k` hits are found; every point closer than the k-th hit lies inside
    /// that radius, so the answer is exact.
    pub fn query_k_nearest(
        &self,
        center: &Point3<f64>,
        k: usize,
        exclude: Option<usize>,
    ) -> Vec<Neighbor> {
        if k == 0 || self.points.is_empty() {
            return Vec::new();
        }

        let mut radius = self.cell_size;
        let reach = self.extent + (center - self.points[0]).norm();
        let mut hits = loop {
            let hits = self.query_radius(center, radius, exclude);
            if hits.len() >= k || radius > reach {
                break hits;
            }
            radius *= 2.0;
        };

        sort_neighbors(&mut hits);
        hits.truncate(k);
        hits
    }

    fn cell_coords(&self, p: &Point3<f64>) -> (i64, i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }
}

/// Number of cells in `lo..=hi`, or `None` when it does not fit.
fn cell_span(lo: i64, hi: i64) -> Option<u128> {
    let cells = hi.checked_sub(lo)?.checked_add(1)?;
    u128::try_from(cells).ok()
}

/// Sorts hits by distance, then id, for deterministic consumers.
pub fn sort_neighbors(hits: &mut [Neighbor]) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
}

fn bounds(points: &[Point3<f64>]) -> (Point3<f64>, Point3<f64>) {
    let mut lo = Point3::new(f64::MAX, f64::MAX, f64::MAX);
    let mut hi = Point3::new(f64::MIN, f64::MIN, f64::MIN);
    for p in points {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    if points.is_empty() {
        (Point3::origin(), Point3::origin())
    } else {
        (lo, hi)
    }
}

fn auto_cell_size(diagonal: f64, n: usize) -> f64 {
    let size = diagonal / (n.max(1) as f64).cbrt();
    if size.is_finite() && size > 1e-9 {
        size
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, step: f64) -> Vec<Point3<f64>> {
        (0..n).map(|i| Point3::new(i as f64 * step, 0.0, 0.0)).collect()
    }

    #[test]
    fn radius_query_finds_exact_set() {
        let index = SpatialIndex::build(&line(10, 1.0), 0.5);
        let mut ids: Vec<_> = index
            .query_radius(&Point3::new(4.0, 0.0, 0.0), 1.5, None)
            .iter()
            .map(|n| n.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn radius_query_excludes_self() {
        let index = SpatialIndex::build(&line(5, 1.0), 1.0);
        let hits = index.query_radius(&Point3::new(2.0, 0.0, 0.0), 1.0, Some(2));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|n| n.id != 2));
        assert!(hits.iter().all(|n| (n.distance - 1.0).abs() < 1e-12));
    }

    #[test]
    fn large_radius_scans_occupied_cells() {
        let index = SpatialIndex::build(&line(4, 1.0), 0.01);
        let hits = index.query_radius(&Point3::new(0.0, 0.0, 0.0), 100.0, None);
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn huge_radius_with_tiny_cells_scans_occupied_cells() {
        let points = vec![
            Point3::new(-1.0e6, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0e6, 0.0, 0.0),
        ];
        let index = SpatialIndex::build(&points, 1.0e-9);
        let hits = index.query_radius(&Point3::origin(), 1.0e300, None);
        assert_eq!(hits.len(), 3);

        let hits = index.query_radius(&Point3::origin(), f64::MAX, Some(1));
        let mut ids: Vec<_> = hits.iter().map(|n| n.id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn k_nearest_sorted() {
        let index = SpatialIndex::build(&line(10, 1.0), 1.0);
        let hits = index.query_k_nearest(&Point3::new(0.0, 0.0, 0.0), 3, Some(0));
        let ids: Vec<_> = hits.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn k_nearest_more_than_available() {
        let index = SpatialIndex::build(&line(3, 5.0), 0.1);
        let hits = index.query_k_nearest(&Point3::new(100.0, 0.0, 0.0), 10, None);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, 2);
    }

    #[test]
    fn k_nearest_ties_by_id() {
        let points = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ];
        let index = SpatialIndex::build_auto(&points);
        let hits = index.query_k_nearest(&Point3::new(0.0, 0.0, 0.0), 2, Some(2));
        assert_eq!(hits.iter().map(|n| n.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn coincident_points_do_not_break_index() {
        let points = vec![Point3::new(1.0, 1.0, 1.0); 50];
        let index = SpatialIndex::build_auto(&points);
        assert_eq!(index.query_radius(&points[0], 0.0, Some(0)).len(), 49);
        assert_eq!(index.query_k_nearest(&points[0], 5, None).len(), 5);
    }

    #[test]
    fn empty_index() {
        let index = SpatialIndex::build_auto(&[]);
        assert!(index.is_empty());
        assert!(index
            .query_k_nearest(&Point3::origin(), 3, None)
            .is_empty());
        assert!(index.query_radius(&Point3::origin(), 1.0, None).is_empty());
    }
}
