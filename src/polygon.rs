//! Closed polarity-tagged contours and their scan conversion
//!
//! A [Polygon] is the unit of drawing: one or more closed subpaths in
//! device-pixel coordinates, a polarity, a stacking index, and a pixel
//! bounding box. Scan conversion is a single forward pass: the engine
//! asks each polygon for the filled x spans of one row at a time, in
//! strictly increasing row order, so no per-image edge table is ever
//! held in memory.

use std::cmp::max;
use std::cmp::min;

/// Whether a feature adds or removes coverage
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Polarity {
    Dark,
    Clear,
}
impl Default for Polarity {
    fn default() -> Polarity {
        Polarity::Dark
    }
}

/// Point in device-pixel coordinates
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn xy(x: f64, y: f64) -> Self {
        Vertex { x, y }
    }
}

/// Round half-up to an integer pixel coordinate
pub fn pixel_round(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// One edge of a monotonic chain, active over an inclusive row range
#[derive(Debug, Copy, Clone)]
struct ChainEdge {
    y_first: i64,
    y_last: i64,
    x0: f64,
    dxdy: f64,
}

impl ChainEdge {
    fn x_at(&self, row: i64) -> f64 {
        self.x0 + (row - self.y_first) as f64 * self.dxdy
    }
}

/// Remaining-edge table plus last-row state for the one-shot sweep
#[derive(Debug, Default)]
struct ScanCursor {
    edges: Vec<ChainEdge>,
    next_edge: usize,
    active: Vec<ChainEdge>,
    last_row: Option<i64>,
    xs: Vec<f64>,
    spans: Vec<(i64, i64)>,
}

/// A closed polarity-tagged contour set with precomputed pixel bounds
///
/// Subpaths fill under the even-odd rule, so a second subpath inside the
/// first acts as a hole. Vertices are stored relative to the pixel
/// offset; the bounding box fields are absolute image coordinates.
#[derive(Debug, Default)]
pub struct Polygon {
    /// Inclusive bounding box in image pixels
    pub pixel_min_x: i64,
    pub pixel_max_x: i64,
    pub pixel_min_y: i64,
    pub pixel_max_y: i64,
    /// Translation applied at draw time
    pub pixel_offset_x: i64,
    pub pixel_offset_y: i64,
    pub polarity: Polarity,
    /// Creation index; later features occlude or erase earlier ones
    pub stacking: u64,
    cursor: ScanCursor,
}

impl Polygon {
    /// Build a polygon from closed subpaths local to (offset_x, offset_y)
    ///
    /// Degenerate input (no vertices, or zero vertical extent after
    /// rounding) is legal and produces a polygon with no spans.
    pub fn new(
        contours: &[Vec<Vertex>],
        offset_x: f64,
        offset_y: f64,
        polarity: Polarity,
        stacking: u64,
    ) -> Self {
        let pixel_offset_x = pixel_round(offset_x);
        let pixel_offset_y = pixel_round(offset_y);
        let mut poly = Polygon {
            polarity,
            stacking,
            pixel_offset_x,
            pixel_offset_y,
            ..Default::default()
        };
        let mut bbox: Option<(i64, i64, i64, i64)> = None;
        for contour in contours {
            for v in contour {
                let px = pixel_round(v.x);
                let py = pixel_round(v.y);
                bbox = Some(match bbox {
                    None => (px, px, py, py),
                    Some((x1, x2, y1, y2)) => {
                        (min(x1, px), max(x2, px), min(y1, py), max(y2, py))
                    }
                });
            }
            poly.cursor.add_contour(contour);
        }
        let (x1, x2, y1, y2) = bbox.unwrap_or((0, 0, 0, 0));
        poly.pixel_min_x = x1 + pixel_offset_x;
        poly.pixel_max_x = x2 + pixel_offset_x;
        poly.pixel_min_y = y1 + pixel_offset_y;
        poly.pixel_max_y = y2 + pixel_offset_y;
        poly.cursor.finish();
        poly
    }

    /// Filled x spans of one image row, as inclusive (x1,x2) pixel pairs
    /// in image coordinates save for `pixel_offset_x`
    ///
    /// Single pass: rows must be within the polygon's vertical bounds and
    /// strictly increasing over the polygon's lifetime.
    pub fn next_row_spans(&mut self, row: i64) -> &[(i64, i64)] {
        debug_assert!(row >= self.pixel_min_y && row <= self.pixel_max_y);
        if let Some(last) = self.cursor.last_row {
            debug_assert!(row > last, "rows must strictly increase");
        }
        let local = row - self.pixel_offset_y;
        self.cursor.sweep(local)
    }
}

impl ScanCursor {
    /// Decompose one closed subpath into monotonic chain edges
    ///
    /// Vertex rows are rounded half-up first. Horizontal edges are
    /// excluded from intersection tests and join the chains on either
    /// side. Interior edge boundaries within a chain belong to the lower
    /// edge; the edge holding the chain's topmost row keeps it, so every
    /// row in a chain's inclusive vertical range intersects exactly once
    /// and shared rows never pair off twice.
    fn add_contour(&mut self, contour: &[Vertex]) {
        let n = contour.len();
        if n < 2 {
            return;
        }
        // walk-ordered non-horizontal edges: (x_lo, y_lo, x_hi, y_hi, ascending)
        let mut dirs = Vec::with_capacity(n);
        let mut segs = Vec::with_capacity(n);
        for i in 0..n {
            let a = contour[i];
            let b = contour[(i + 1) % n];
            let ya = pixel_round(a.y);
            let yb = pixel_round(b.y);
            if ya == yb {
                continue;
            }
            if yb > ya {
                segs.push((a.x, ya, b.x, yb));
                dirs.push(1i8);
            } else {
                segs.push((b.x, yb, a.x, ya));
                dirs.push(-1i8);
            }
        }
        let m = segs.len();
        for k in 0..m {
            let (x_lo, y_lo, x_hi, y_hi) = segs[k];
            // the edge at the top of its chain keeps the chain's last row
            let neighbor = if dirs[k] > 0 { (k + 1) % m } else { (k + m - 1) % m };
            let y_last = if dirs[neighbor] != dirs[k] { y_hi } else { y_hi - 1 };
            self.edges.push(ChainEdge {
                y_first: y_lo,
                y_last,
                x0: x_lo,
                dxdy: (x_hi - x_lo) / (y_hi - y_lo) as f64,
            });
        }
    }

    fn finish(&mut self) {
        self.edges.sort_by_key(|e| e.y_first);
    }

    fn sweep(&mut self, row: i64) -> &[(i64, i64)] {
        while self.next_edge < self.edges.len() && self.edges[self.next_edge].y_first <= row {
            let e = self.edges[self.next_edge];
            if e.y_last >= row {
                self.active.push(e);
            }
            self.next_edge += 1;
        }
        self.active.retain(|e| e.y_last >= row);
        self.last_row = Some(row);

        self.xs.clear();
        for e in &self.active {
            self.xs.push(e.x_at(row));
        }
        self.xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        debug_assert!(self.xs.len() % 2 == 0, "open contour at row {}", row);

        self.spans.clear();
        let mut i = 0;
        while i + 1 < self.xs.len() {
            // left edge pixel in, right edge pixel out
            let x1 = pixel_round(self.xs[i]);
            let x2 = pixel_round(self.xs[i + 1]) - 1;
            if x2 >= x1 {
                self.spans.push((x1, x2));
            }
            i += 2;
        }
        &self.spans
    }
}

/// Closed rectangle contour spanning x1..x2, y1..y2
pub fn rect_contour(x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<Vertex> {
    vec![
        Vertex::xy(x1, y1),
        Vertex::xy(x2, y1),
        Vertex::xy(x2, y2),
        Vertex::xy(x1, y2),
    ]
}
