//! Aperture shape definitions and contour synthesis
//!
//! Apertures are the named pad/tool shapes of RS-274X: standard circles,
//! rectangles, obrounds and regular polygons, plus user macros. A shape
//! is defined once, in gerber inches, and instantiated into closed
//! device-pixel contours on every flash. Growth is an outward offset of
//! the boundary in pixels; the offset is exact for circles and a simple
//! convex superset for the cornered shapes (see DESIGN.md).

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::config::RenderConfig;
use crate::polygon::Vertex;

/// Closed subpaths forming one even-odd fill unit (outline plus holes)
pub type ContourGroup = Vec<Vec<Vertex>>;

/// Chord sampling of a circular arc of pixel radius `radius` spanning
/// `sweep` radians, keeping chordal deviation under a quarter pixel
pub fn arc_segments(radius: f64, sweep: f64) -> usize {
    let r = radius.abs();
    let dev = 0.25;
    if r <= dev {
        return 4;
    }
    let step = 2.0 * (1.0 - dev / r).acos();
    let n = (sweep.abs() / step).ceil() as usize;
    n.max(4)
}

/// Append a CCW elliptical arc about (cx,cy), radii (rx,ry), from angle
/// a0 sweeping by `sweep` radians (negative sweeps clockwise)
pub fn push_arc(out: &mut Vec<Vertex>, cx: f64, cy: f64, rx: f64, ry: f64, a0: f64, sweep: f64) {
    let n = arc_segments(rx.max(ry), sweep);
    for i in 0..=n {
        let a = a0 + sweep * i as f64 / n as f64;
        out.push(Vertex::xy(cx + rx * a.cos(), cy + ry * a.sin()));
    }
}

fn circle_contour(rx: f64, ry: f64, cx: f64, cy: f64) -> Option<Vec<Vertex>> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let mut v = Vec::new();
    push_arc(&mut v, cx, cy, rx, ry, 0.0, 2.0 * PI);
    v.pop(); // closing vertex is implicit
    Some(v)
}

/// Hole subpath shared by the standard shapes; shrinks as the feature
/// grows and disappears at zero
fn hole_contour(hole: Option<f64>, grow: f64, ppx: f64, ppy: f64) -> Option<Vec<Vertex>> {
    let d = hole?;
    circle_contour(d / 2.0 * ppx - grow, d / 2.0 * ppy - grow, 0.0, 0.0)
}

fn rotate(points: &mut [Vertex], degrees: f64) {
    if degrees == 0.0 {
        return;
    }
    let a = degrees * PI / 180.0;
    let (s, c) = (a.sin(), a.cos());
    for p in points.iter_mut() {
        let (x, y) = (p.x, p.y);
        p.x = x * c - y * s;
        p.y = x * s + y * c;
    }
}

/// Macro parameter expression: numbers, $n variables, + - x /
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(usize),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn eval(&self, vars: &HashMap<usize, f64>) -> f64 {
        match self {
            Expr::Num(v) => *v,
            Expr::Var(n) => vars.get(n).copied().unwrap_or(0.0),
            Expr::Neg(e) => -e.eval(vars),
            Expr::Add(a, b) => a.eval(vars) + b.eval(vars),
            Expr::Sub(a, b) => a.eval(vars) - b.eval(vars),
            Expr::Mul(a, b) => a.eval(vars) * b.eval(vars),
            Expr::Div(a, b) => {
                let d = b.eval(vars);
                if d == 0.0 {
                    0.0
                } else {
                    a.eval(vars) / d
                }
            }
        }
    }

    /// Parse one macro expression, e.g. `$1x0.5+0.1`
    pub fn parse(s: &str) -> Result<Expr, String> {
        let mut p = ExprParser { s: s.as_bytes(), i: 0 };
        let e = p.sum()?;
        if p.i != p.s.len() {
            return Err(format!("trailing characters in expression '{}'", s));
        }
        Ok(e)
    }
}

struct ExprParser<'a> {
    s: &'a [u8],
    i: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<u8> {
        self.s.get(self.i).copied()
    }
    fn sum(&mut self) -> Result<Expr, String> {
        let mut lhs = self.product()?;
        while let Some(op) = self.peek() {
            match op {
                b'+' => {
                    self.i += 1;
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.product()?));
                }
                b'-' => {
                    self.i += 1;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(self.product()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }
    fn product(&mut self) -> Result<Expr, String> {
        let mut lhs = self.atom()?;
        while let Some(op) = self.peek() {
            match op {
                b'x' | b'X' => {
                    self.i += 1;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(self.atom()?));
                }
                b'/' => {
                    self.i += 1;
                    lhs = Expr::Div(Box::new(lhs), Box::new(self.atom()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }
    fn atom(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(b'-') => {
                self.i += 1;
                Ok(Expr::Neg(Box::new(self.atom()?)))
            }
            Some(b'+') => {
                self.i += 1;
                self.atom()
            }
            Some(b'(') => {
                self.i += 1;
                let e = self.sum()?;
                if self.peek() != Some(b')') {
                    return Err("unbalanced parenthesis".into());
                }
                self.i += 1;
                Ok(e)
            }
            Some(b'$') => {
                self.i += 1;
                let start = self.i;
                while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    self.i += 1;
                }
                if self.i == start {
                    return Err("expected variable number after $".into());
                }
                let n: usize = std::str::from_utf8(&self.s[start..self.i])
                    .unwrap()
                    .parse()
                    .map_err(|_| "bad variable number".to_string())?;
                Ok(Expr::Var(n))
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => {
                let start = self.i;
                while self
                    .peek()
                    .map_or(false, |c| c.is_ascii_digit() || c == b'.')
                {
                    self.i += 1;
                }
                std::str::from_utf8(&self.s[start..self.i])
                    .unwrap()
                    .parse()
                    .map(Expr::Num)
                    .map_err(|_| "bad number in expression".to_string())
            }
            _ => Err("empty expression term".into()),
        }
    }
}

/// One statement of an aperture macro body
#[derive(Debug, Clone, PartialEq)]
pub enum MacroStatement {
    /// `$n=expr` variable assignment
    Assign(usize, Expr),
    /// Primitive with its code and parameter expressions
    Primitive(u32, Vec<Expr>),
}

/// Parsed `%AM` template: statements evaluated per instantiation
#[derive(Debug, Clone, PartialEq)]
pub struct MacroTemplate {
    pub name: String,
    pub statements: Vec<MacroStatement>,
}

/// Standard or macro shape of one aperture, dimensions in gerber inches
#[derive(Debug, Clone, PartialEq)]
pub enum ApertureShape {
    Circle {
        diameter: f64,
        hole: Option<f64>,
    },
    Rect {
        w: f64,
        h: f64,
        hole: Option<f64>,
    },
    Obround {
        w: f64,
        h: f64,
        hole: Option<f64>,
    },
    Polygon {
        diameter: f64,
        vertices: u32,
        rotation: f64,
        hole: Option<f64>,
    },
    Macro {
        template: MacroTemplate,
        /// Parameters as written; dimensions among them are in gerber
        /// units so the definition-time unit factor rides along
        params: Vec<f64>,
        unit: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aperture {
    pub code: u32,
    pub shape: ApertureShape,
}

impl Aperture {
    /// Pen diameter in pixels when this aperture strokes a path
    ///
    /// Only circles stroke exactly; other shapes report their larger
    /// extent so the caller can warn and still draw something useful.
    pub fn stroke_width(&self, config: &RenderConfig) -> Option<f64> {
        let ppi = config.pixels_per_inch_x().abs().min(config.pixels_per_inch_y().abs());
        match &self.shape {
            ApertureShape::Circle { diameter, .. } => Some(diameter * ppi),
            ApertureShape::Rect { w, h, .. } | ApertureShape::Obround { w, h, .. } => {
                Some(w.max(*h) * ppi)
            }
            ApertureShape::Polygon { diameter, .. } => Some(diameter * ppi),
            ApertureShape::Macro { .. } => None,
        }
    }

    pub fn is_circle(&self) -> bool {
        match self.shape {
            ApertureShape::Circle { .. } => true,
            _ => false,
        }
    }

    /// Build the closed contours of one flash, centered at the origin,
    /// grown outward by `grow` pixels
    ///
    /// Standard shapes return one group (outline plus optional hole);
    /// a macro returns one group per primitive so overlapping dark
    /// primitives do not cancel under even-odd fill. `messages` collects
    /// advisories for unsupported macro primitives.
    pub fn instantiate(
        &self,
        grow: f64,
        config: &RenderConfig,
        messages: &mut Vec<String>,
    ) -> Vec<ContourGroup> {
        let ppx = config.pixels_per_inch_x();
        let ppy = config.pixels_per_inch_y();
        match &self.shape {
            ApertureShape::Circle { diameter, hole } => {
                let mut group = Vec::new();
                if let Some(c) =
                    circle_contour(diameter / 2.0 * ppx + grow, diameter / 2.0 * ppy + grow, 0.0, 0.0)
                {
                    group.push(c);
                    if let Some(h) = hole_contour(*hole, grow, ppx, ppy) {
                        group.push(h);
                    }
                }
                vec![group]
            }
            ApertureShape::Rect { w, h, hole } => {
                let hw = w / 2.0 * ppx + grow;
                let hh = h / 2.0 * ppy + grow;
                let mut group = Vec::new();
                if hw > 0.0 && hh > 0.0 {
                    group.push(vec![
                        Vertex::xy(-hw, -hh),
                        Vertex::xy(hw, -hh),
                        Vertex::xy(hw, hh),
                        Vertex::xy(-hw, hh),
                    ]);
                    if let Some(hc) = hole_contour(*hole, grow, ppx, ppy) {
                        group.push(hc);
                    }
                }
                vec![group]
            }
            ApertureShape::Obround { w, h, hole } => {
                let hw = w / 2.0 * ppx + grow;
                let hh = h / 2.0 * ppy + grow;
                let mut group = Vec::new();
                if hw > 0.0 && hh > 0.0 {
                    group.push(obround_contour(hw, hh));
                    if let Some(hc) = hole_contour(*hole, grow, ppx, ppy) {
                        group.push(hc);
                    }
                }
                vec![group]
            }
            ApertureShape::Polygon {
                diameter,
                vertices,
                rotation,
                hole,
            } => {
                let n = (*vertices).max(3) as usize;
                // offset each edge by grow, not each vertex
                let g = grow / (PI / n as f64).cos();
                let rx = diameter / 2.0 * ppx + g;
                let ry = diameter / 2.0 * ppy + g;
                let mut group = Vec::new();
                if rx > 0.0 && ry > 0.0 {
                    let mut v = Vec::with_capacity(n);
                    for i in 0..n {
                        let a = 2.0 * PI * i as f64 / n as f64;
                        v.push(Vertex::xy(rx * a.cos(), ry * a.sin()));
                    }
                    rotate(&mut v, *rotation);
                    group.push(v);
                    if let Some(hc) = hole_contour(*hole, grow, ppx, ppy) {
                        group.push(hc);
                    }
                }
                vec![group]
            }
            ApertureShape::Macro {
                template,
                params,
                unit,
            } => instantiate_macro(template, params, grow, ppx * unit, ppy * unit, messages),
        }
    }
}

/// Stadium outline: straight sides with semicircular caps on the
/// shorter axis
fn obround_contour(hw: f64, hh: f64) -> Vec<Vertex> {
    let mut v = Vec::new();
    if hw > hh {
        let cx = hw - hh;
        push_arc(&mut v, cx, 0.0, hh, hh, -PI / 2.0, PI);
        push_arc(&mut v, -cx, 0.0, hh, hh, PI / 2.0, PI);
    } else if hh > hw {
        let cy = hh - hw;
        push_arc(&mut v, 0.0, cy, hw, hw, 0.0, PI);
        push_arc(&mut v, 0.0, -cy, hw, hw, PI, PI);
    } else {
        push_arc(&mut v, 0.0, 0.0, hw, hw, 0.0, 2.0 * PI);
        v.pop();
    }
    v
}

fn instantiate_macro(
    template: &MacroTemplate,
    params: &[f64],
    grow: f64,
    ppx: f64,
    ppy: f64,
    messages: &mut Vec<String>,
) -> Vec<ContourGroup> {
    let mut vars: HashMap<usize, f64> = HashMap::new();
    for (i, p) in params.iter().enumerate() {
        vars.insert(i + 1, *p);
    }
    let mut groups = Vec::new();
    for stmt in &template.statements {
        match stmt {
            MacroStatement::Assign(n, expr) => {
                let v = expr.eval(&vars);
                vars.insert(*n, v);
            }
            MacroStatement::Primitive(code, exprs) => {
                let p: Vec<f64> = exprs.iter().map(|e| e.eval(&vars)).collect();
                if let Some(group) =
                    macro_primitive(template, *code, &p, grow, ppx, ppy, messages)
                {
                    if !group.is_empty() {
                        groups.push(group);
                    }
                }
            }
        }
    }
    groups
}

fn exposure_on(template: &MacroTemplate, p: &[f64], messages: &mut Vec<String>) -> bool {
    let on = p.first().copied().unwrap_or(1.0) != 0.0;
    if !on {
        messages.push(format!(
            "macro {}: exposure-off primitive not supported, skipped",
            template.name
        ));
    }
    on
}

/// Evaluate one macro primitive into a contour group
///
/// Growth is applied where the offset is well defined: circle radii and
/// line widths grow, outlines and polygons are left at their drawn size.
fn macro_primitive(
    template: &MacroTemplate,
    code: u32,
    p: &[f64],
    grow: f64,
    ppx: f64,
    ppy: f64,
    messages: &mut Vec<String>,
) -> Option<ContourGroup> {
    let get = |i: usize| p.get(i).copied().unwrap_or(0.0);
    match code {
        0 => None, // comment
        1 => {
            // circle: exposure, diameter, cx, cy[, rotation]
            if !exposure_on(template, p, messages) {
                return None;
            }
            let d = get(1);
            let c = circle_contour(
                d / 2.0 * ppx + grow,
                d / 2.0 * ppy + grow,
                get(2) * ppx,
                get(3) * ppy,
            )?;
            let mut c = c;
            rotate(&mut c, get(4));
            Some(vec![c])
        }
        20 | 2 => {
            // vector line: exposure, width, x1, y1, x2, y2, rotation
            if !exposure_on(template, p, messages) {
                return None;
            }
            let w = get(1) * ppx.min(ppy) + 2.0 * grow;
            if w <= 0.0 {
                return None;
            }
            let (x1, y1) = (get(2) * ppx, get(3) * ppy);
            let (x2, y2) = (get(4) * ppx, get(5) * ppy);
            let dx = x2 - x1;
            let dy = y2 - y1;
            let len = (dx * dx + dy * dy).sqrt();
            if len == 0.0 {
                return None;
            }
            let (nx, ny) = (-dy / len * w / 2.0, dx / len * w / 2.0);
            let mut v = vec![
                Vertex::xy(x1 + nx, y1 + ny),
                Vertex::xy(x1 - nx, y1 - ny),
                Vertex::xy(x2 - nx, y2 - ny),
                Vertex::xy(x2 + nx, y2 + ny),
            ];
            rotate(&mut v, get(6));
            Some(vec![v])
        }
        21 => {
            // center line: exposure, width, height, cx, cy, rotation
            if !exposure_on(template, p, messages) {
                return None;
            }
            let hw = get(1) / 2.0 * ppx + grow;
            let hh = get(2) / 2.0 * ppy + grow;
            if hw <= 0.0 || hh <= 0.0 {
                return None;
            }
            let (cx, cy) = (get(3) * ppx, get(4) * ppy);
            let mut v = vec![
                Vertex::xy(cx - hw, cy - hh),
                Vertex::xy(cx + hw, cy - hh),
                Vertex::xy(cx + hw, cy + hh),
                Vertex::xy(cx - hw, cy + hh),
            ];
            rotate(&mut v, get(5));
            Some(vec![v])
        }
        4 => {
            // outline: exposure, n, x0, y0, x1, y1 ... xn, yn, rotation
            if !exposure_on(template, p, messages) {
                return None;
            }
            let n = get(1) as usize;
            let mut v = Vec::with_capacity(n + 1);
            for i in 0..=n {
                v.push(Vertex::xy(get(2 + 2 * i) * ppx, get(3 + 2 * i) * ppy));
            }
            // the last coordinate pair repeats the start point
            if v.len() > 1 && v.first() == v.last() {
                v.pop();
            }
            rotate(&mut v, get(4 + 2 * n));
            Some(vec![v])
        }
        5 => {
            // polygon: exposure, n, cx, cy, diameter, rotation
            if !exposure_on(template, p, messages) {
                return None;
            }
            let n = (get(1) as usize).max(3);
            let (cx, cy) = (get(2) * ppx, get(3) * ppy);
            let rx = get(4) / 2.0 * ppx;
            let ry = get(4) / 2.0 * ppy;
            if rx <= 0.0 || ry <= 0.0 {
                return None;
            }
            let mut v = Vec::with_capacity(n);
            for i in 0..n {
                let a = 2.0 * PI * i as f64 / n as f64;
                v.push(Vertex::xy(cx + rx * a.cos(), cy + ry * a.sin()));
            }
            rotate(&mut v, get(5));
            Some(vec![v])
        }
        other => {
            messages.push(format!(
                "macro {}: primitive {} not supported, skipped",
                template.name, other
            ));
            None
        }
    }
}

/// Outcome of a `define` call; the parser maps `Identical` to an
/// advisory and `Conflict` to a fatal error
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DefineResult {
    Added,
    Identical,
    Conflict,
}

/// Named shape store built from `%AD` and `%AM` blocks
#[derive(Debug, Default)]
pub struct ApertureTable {
    apertures: HashMap<u32, Aperture>,
    macros: HashMap<String, MacroTemplate>,
}

impl ApertureTable {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn define(&mut self, aperture: Aperture) -> DefineResult {
        match self.apertures.get(&aperture.code) {
            Some(existing) if *existing == aperture => DefineResult::Identical,
            Some(_) => DefineResult::Conflict,
            None => {
                self.apertures.insert(aperture.code, aperture);
                DefineResult::Added
            }
        }
    }
    pub fn get(&self, code: u32) -> Option<&Aperture> {
        self.apertures.get(&code)
    }
    pub fn define_macro(&mut self, template: MacroTemplate) {
        self.macros.insert(template.name.clone(), template);
    }
    pub fn get_macro(&self, name: &str) -> Option<&MacroTemplate> {
        self.macros.get(name)
    }
    pub fn len(&self) -> usize {
        self.apertures.len()
    }
    pub fn is_empty(&self) -> bool {
        self.apertures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::{pixel_round, Polarity, Polygon};

    fn bounds(groups: &[ContourGroup]) -> (i64, i64, i64, i64) {
        let mut b = (i64::max_value(), i64::min_value(), i64::max_value(), i64::min_value());
        for g in groups {
            for c in g {
                for v in c {
                    b.0 = b.0.min(pixel_round(v.x));
                    b.1 = b.1.max(pixel_round(v.x));
                    b.2 = b.2.min(pixel_round(v.y));
                    b.3 = b.3.max(pixel_round(v.y));
                }
            }
        }
        b
    }

    fn unit_config() -> RenderConfig {
        RenderConfig {
            dpi: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn circle_nominal_bounds() {
        let ap = Aperture {
            code: 10,
            shape: ApertureShape::Circle {
                diameter: 100.0,
                hole: None,
            },
        };
        let mut msgs = Vec::new();
        let groups = ap.instantiate(0.0, &unit_config(), &mut msgs);
        let (x1, x2, y1, y2) = bounds(&groups);
        assert_eq!((x1, x2, y1, y2), (-50, 50, -50, 50));
        assert!(msgs.is_empty());
    }

    #[test]
    fn growth_is_monotonic() {
        let ap = Aperture {
            code: 11,
            shape: ApertureShape::Obround {
                w: 80.0,
                h: 40.0,
                hole: None,
            },
        };
        let cfg = unit_config();
        let mut msgs = Vec::new();
        let small = bounds(&ap.instantiate(2.0, &cfg, &mut msgs));
        let big = bounds(&ap.instantiate(7.0, &cfg, &mut msgs));
        assert!(big.0 < small.0 && big.1 > small.1);
        assert!(big.2 < small.2 && big.3 > small.3);
    }

    #[test]
    fn shrink_through_zero_is_empty() {
        let ap = Aperture {
            code: 12,
            shape: ApertureShape::Circle {
                diameter: 10.0,
                hole: None,
            },
        };
        let mut msgs = Vec::new();
        let groups = ap.instantiate(-6.0, &unit_config(), &mut msgs);
        assert!(groups.iter().all(|g| g.is_empty()));
    }

    #[test]
    fn hole_shrinks_as_feature_grows() {
        let ap = Aperture {
            code: 13,
            shape: ApertureShape::Circle {
                diameter: 100.0,
                hole: Some(20.0),
            },
        };
        let mut msgs = Vec::new();
        let grown = ap.instantiate(4.0, &unit_config(), &mut msgs);
        assert_eq!(grown[0].len(), 2);
        let (hx1, hx2, _, _) = bounds(&[vec![grown[0][1].clone()]]);
        assert_eq!((hx1, hx2), (-6, 6));
        // grown past the hole radius the hole vanishes
        let solid = ap.instantiate(11.0, &unit_config(), &mut msgs);
        assert_eq!(solid[0].len(), 1);
    }

    #[test]
    fn rect_flash_matches_nominal_box() {
        let ap = Aperture {
            code: 14,
            shape: ApertureShape::Rect {
                w: 100.0,
                h: 50.0,
                hole: None,
            },
        };
        let mut msgs = Vec::new();
        let groups = ap.instantiate(0.0, &unit_config(), &mut msgs);
        let poly = Polygon::new(&groups[0], 200.0, 300.0, Polarity::Dark, 0);
        assert_eq!((poly.pixel_min_x, poly.pixel_max_x), (150, 250));
        assert_eq!((poly.pixel_min_y, poly.pixel_max_y), (275, 325));
    }

    #[test]
    fn macro_expression_arithmetic() {
        let e = Expr::parse("$1x0.5+0.1").unwrap();
        let mut vars = HashMap::new();
        vars.insert(1, 4.0);
        assert!((e.eval(&vars) - 2.1).abs() < 1e-12);
        let e = Expr::parse("1-$2/2").unwrap();
        vars.insert(2, 1.0);
        assert!((e.eval(&vars) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn macro_primitives_are_separate_groups() {
        let template = MacroTemplate {
            name: "DONUT".into(),
            statements: vec![
                MacroStatement::Primitive(
                    1,
                    vec![
                        Expr::Num(1.0),
                        Expr::Var(1),
                        Expr::Num(0.0),
                        Expr::Num(0.0),
                    ],
                ),
                MacroStatement::Primitive(
                    1,
                    vec![
                        Expr::Num(1.0),
                        Expr::Var(2),
                        Expr::Num(0.0),
                        Expr::Num(0.0),
                    ],
                ),
            ],
        };
        let ap = Aperture {
            code: 15,
            shape: ApertureShape::Macro {
                template,
                params: vec![60.0, 30.0],
                unit: 1.0,
            },
        };
        let mut msgs = Vec::new();
        let groups = ap.instantiate(0.0, &unit_config(), &mut msgs);
        // overlapping dark circles stay separate so even-odd cannot cancel
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn redefinition_outcomes() {
        let mut table = ApertureTable::new();
        let a = Aperture {
            code: 10,
            shape: ApertureShape::Circle {
                diameter: 1.0,
                hole: None,
            },
        };
        assert_eq!(table.define(a.clone()), DefineResult::Added);
        assert_eq!(table.define(a.clone()), DefineResult::Identical);
        let b = Aperture {
            code: 10,
            shape: ApertureShape::Circle {
                diameter: 2.0,
                hole: None,
            },
        };
        assert_eq!(table.define(b), DefineResult::Conflict);
        assert!(table.get(11).is_none());
    }
}
