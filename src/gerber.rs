//! Gerber RS-274X document parsing
//!
//! One parse pass walks the command stream, resolves aperture
//! definitions, tracks the drawing state (position, aperture, polarity,
//! interpolation, units, coordinate format) and emits a polarity-tagged
//! [Polygon](../polygon/struct.Polygon.html) for every flash, stroke,
//! arc and region. Unsupported or deprecated commands become advisory
//! messages; structurally invalid input stops the parse with a fatal
//! error carrying the line number.
//!
//! # Example
//!
//!     use gerbrast::{parse, RenderConfig};
//!
//!     let gbr = "%FSLAX23Y23*%%MOIN*%%ADD10C,0.01*%D10*X100Y100D03*M02*";
//!     let doc = parse(gbr, &RenderConfig::default()).unwrap();
//!     assert_eq!(doc.polygons.len(), 1);

use std::f64::consts::PI;

use log::{debug, warn};

use crate::aperture::{
    push_arc, Aperture, ApertureShape, ApertureTable, ContourGroup, DefineResult, Expr,
    MacroStatement, MacroTemplate,
};
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::polygon::{Polarity, Polygon, Vertex};

/// Result of parsing one input stream
///
/// Polygons are sorted ascending by `pixel_min_y`, the precondition the
/// rasterizer's merge step relies on. `messages` holds the non-fatal
/// advisories accumulated along the way.
#[derive(Debug, Default)]
pub struct Document {
    pub polygons: Vec<Polygon>,
    /// Base polarity from `%IP`: true renders features dark on light
    pub image_polarity_dark: bool,
    pub messages: Vec<String>,
}

/// Parse one Gerber stream into a Document
///
/// `config` supplies dpi, axis scales and the grow distance; it must
/// have been validated by the caller.
pub fn parse(input: &str, config: &RenderConfig) -> Result<Document> {
    let mut parser = Parser::new(config);
    let mut lexer = Lexer::new(input);
    while let Some(cmd) = lexer.next_command()? {
        match cmd {
            Command::Word { line, text } => parser.word(line, &text)?,
            Command::Extended { line, blocks } => parser.extended(line, &blocks)?,
        }
        if parser.ended {
            break;
        }
    }
    parser.finish(lexer.line)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Interpolation {
    Linear,
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum QuadrantMode {
    Single,
    Multi,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ZeroOmission {
    Leading,
    Trailing,
}

/// `%FS` coordinate format: digit counts and zero suppression
#[derive(Debug, Copy, Clone)]
struct CoordFormat {
    integer: u32,
    decimal: u32,
    omission: ZeroOmission,
}

impl CoordFormat {
    /// Decode one coordinate field to gerber units
    fn value(&self, text: &str) -> Option<f64> {
        let (sign, digits) = match text.as_bytes().first()? {
            b'-' => (-1.0, &text[1..]),
            b'+' => (1.0, &text[1..]),
            _ => (1.0, text),
        };
        if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let raw: f64 = digits.parse().ok()?;
        let total = (self.integer + self.decimal) as usize;
        let scale = match self.omission {
            ZeroOmission::Leading => 10f64.powi(self.decimal as i32),
            ZeroOmission::Trailing => {
                let missing = total.saturating_sub(digits.len());
                10f64.powi(self.decimal as i32 - missing as i32)
            }
        };
        Some(sign * raw / scale)
    }
}

enum Command {
    Word { line: usize, text: String },
    Extended { line: usize, blocks: Vec<String> },
}

/// Splits the stream into `*`-terminated words and `%...%` blocks,
/// tracking line numbers for diagnostics
struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Lexer {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
        }
    }
    fn bump(&mut self) -> Option<u8> {
        let c = self.input.get(self.pos).copied()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }
    fn skip_space(&mut self) {
        while let Some(&c) = self.input.get(self.pos) {
            if c == b' ' || c == b'\t' || c == b'\r' || c == b'\n' {
                self.bump();
            } else {
                break;
            }
        }
    }
    fn next_command(&mut self) -> Result<Option<Command>> {
        self.skip_space();
        let start_line = self.line;
        let first = match self.input.get(self.pos).copied() {
            None => return Ok(None),
            Some(c) => c,
        };
        if first == b'%' {
            self.bump();
            let mut blocks = Vec::new();
            let mut cur = String::new();
            loop {
                match self.bump() {
                    None => {
                        return Err(Error::malformed(start_line, "unterminated % block"));
                    }
                    Some(b'%') => break,
                    Some(b'*') => {
                        blocks.push(cur.trim().to_string());
                        cur = String::new();
                    }
                    Some(c) if c == b'\r' || c == b'\n' => {}
                    Some(c) if !c.is_ascii() => {
                        return Err(Error::malformed(start_line, "non-ASCII byte in input"));
                    }
                    Some(c) => cur.push(c as char),
                }
            }
            if !cur.trim().is_empty() {
                return Err(Error::malformed(start_line, "unterminated command in % block"));
            }
            Ok(Some(Command::Extended {
                line: start_line,
                blocks,
            }))
        } else {
            let mut text = String::new();
            loop {
                match self.bump() {
                    None => {
                        return Err(Error::malformed(start_line, "unterminated command"));
                    }
                    Some(b'*') => break,
                    Some(c) if c == b' ' || c == b'\t' || c == b'\r' || c == b'\n' => {}
                    Some(c) if !c.is_ascii() => {
                        return Err(Error::malformed(start_line, "non-ASCII byte in input"));
                    }
                    Some(c) => text.push(c as char),
                }
            }
            Ok(Some(Command::Word {
                line: start_line,
                text,
            }))
        }
    }
}

/// Region accumulator for G36/G37: contours of the current region,
/// built from the centerline moves between the markers
#[derive(Debug, Default)]
struct RegionAccum {
    contours: Vec<Vec<Vertex>>,
    current: Vec<Vertex>,
}

impl RegionAccum {
    fn close_current(&mut self) {
        if self.current.len() >= 3 {
            self.contours.push(std::mem::replace(&mut self.current, Vec::new()));
        } else {
            self.current.clear();
        }
    }
}

struct Parser<'a> {
    config: &'a RenderConfig,
    table: ApertureTable,
    doc: Document,
    // drawing state
    x: f64,
    y: f64,
    aperture: Option<u32>,
    polarity: Polarity,
    interpolation: Interpolation,
    quadrant: QuadrantMode,
    inches_per_unit: Option<f64>,
    format: Option<CoordFormat>,
    region: Option<RegionAccum>,
    last_op: Option<u32>,
    stacking: u64,
    ended: bool,
    saw_end: bool,
}

impl<'a> Parser<'a> {
    fn new(config: &'a RenderConfig) -> Self {
        Parser {
            config,
            table: ApertureTable::new(),
            doc: Document {
                image_polarity_dark: true,
                ..Default::default()
            },
            x: 0.0,
            y: 0.0,
            aperture: None,
            polarity: Polarity::Dark,
            interpolation: Interpolation::Linear,
            quadrant: QuadrantMode::Multi,
            inches_per_unit: None,
            format: None,
            region: None,
            last_op: None,
            stacking: 0,
            ended: false,
            saw_end: false,
        }
    }

    fn advise(&mut self, line: usize, msg: String) {
        warn!("line {}: {}", line, msg);
        self.doc.messages.push(format!("line {}: {}", line, msg));
    }

    fn finish(mut self, line: usize) -> Result<Document> {
        if self.region.is_some() {
            return Err(Error::malformed(line, "region not closed before end of file"));
        }
        if !self.saw_end {
            self.advise(line, "missing M02 end of file".into());
        }
        self.doc.polygons.sort_by_key(|p| p.pixel_min_y);
        debug!(
            "parsed {} polygons, {} apertures, {} advisories",
            self.doc.polygons.len(),
            self.table.len(),
            self.doc.messages.len()
        );
        Ok(self.doc)
    }

    // -----------------------------------------------------------------
    // Extended (%...%) commands
    // -----------------------------------------------------------------

    fn extended(&mut self, line: usize, blocks: &[String]) -> Result<()> {
        let first = match blocks.first() {
            None => return Ok(()),
            Some(b) => b.as_str(),
        };
        if first.starts_with("AM") {
            return self.define_macro(line, blocks);
        }
        for block in blocks {
            self.extended_block(line, block)?;
        }
        Ok(())
    }

    fn extended_block(&mut self, line: usize, block: &str) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        let (code, rest) = block.split_at(block.len().min(2));
        match code {
            "FS" => self.format_spec(line, rest),
            "MO" => match rest {
                "IN" => {
                    self.inches_per_unit = Some(1.0);
                    Ok(())
                }
                "MM" => {
                    self.inches_per_unit = Some(1.0 / 25.4);
                    Ok(())
                }
                other => Err(Error::malformed(line, format!("unknown unit mode '{}'", other))),
            },
            "AD" => self.define_aperture(line, rest),
            "LP" => match rest {
                "D" => {
                    self.polarity = Polarity::Dark;
                    Ok(())
                }
                "C" => {
                    self.polarity = Polarity::Clear;
                    Ok(())
                }
                other => Err(Error::malformed(line, format!("unknown layer polarity '{}'", other))),
            },
            "IP" => match rest {
                "POS" => {
                    self.doc.image_polarity_dark = true;
                    Ok(())
                }
                "NEG" => {
                    self.doc.image_polarity_dark = false;
                    Ok(())
                }
                other => Err(Error::malformed(line, format!("unknown image polarity '{}'", other))),
            },
            "SF" | "SR" | "MI" | "OF" | "AS" | "IJ" | "IO" => {
                self.advise(line, format!("unsupported parameter %{}{}* ignored", code, rest));
                Ok(())
            }
            "IN" | "LN" => Ok(()), // image/layer names carry no geometry
            _ => {
                self.advise(line, format!("unknown parameter block '{}' ignored", block));
                Ok(())
            }
        }
    }

    fn format_spec(&mut self, line: usize, rest: &str) -> Result<()> {
        // e.g. LAX34Y34: omission, mode, then X and Y digit pairs
        let bytes = rest.as_bytes();
        let mut i = 0;
        let omission = match bytes.get(i) {
            Some(b'L') => {
                i += 1;
                ZeroOmission::Leading
            }
            Some(b'T') => {
                i += 1;
                ZeroOmission::Trailing
            }
            _ => {
                self.advise(line, "format spec without zero omission, assuming leading".into());
                ZeroOmission::Leading
            }
        };
        match bytes.get(i) {
            Some(b'A') => i += 1,
            Some(b'I') => {
                return Err(Error::malformed(line, "incremental coordinates are not supported"));
            }
            _ => {
                self.advise(line, "format spec without coordinate mode, assuming absolute".into());
            }
        }
        let take_pair = |i: &mut usize, axis: u8| -> Result<(u32, u32)> {
            if bytes.get(*i) != Some(&axis) {
                return Err(Error::malformed(
                    line,
                    format!("format spec missing {} digits", axis as char),
                ));
            }
            *i += 1;
            let ints = bytes.get(*i).and_then(|c| (*c as char).to_digit(10));
            let decs = bytes.get(*i + 1).and_then(|c| (*c as char).to_digit(10));
            *i += 2;
            match (ints, decs) {
                (Some(a), Some(b)) if b <= 9 => Ok((a, b)),
                _ => Err(Error::malformed(line, "unparsable format spec digits")),
            }
        };
        let (xi, xd) = take_pair(&mut i, b'X')?;
        let (yi, yd) = take_pair(&mut i, b'Y')?;
        if (xi, xd) != (yi, yd) {
            self.advise(line, "different X and Y formats, using X for both".into());
        }
        self.format = Some(CoordFormat {
            integer: xi,
            decimal: xd,
            omission,
        });
        Ok(())
    }

    fn define_aperture(&mut self, line: usize, rest: &str) -> Result<()> {
        // D<code><template>[,<modifiers>]
        let bytes = rest.as_bytes();
        if bytes.first() != Some(&b'D') {
            return Err(Error::malformed(line, "aperture definition missing D code"));
        }
        let mut i = 1;
        while bytes.get(i).map_or(false, |c| c.is_ascii_digit()) {
            i += 1;
        }
        let code: u32 = rest[1..i]
            .parse()
            .map_err(|_| Error::malformed(line, "unparsable aperture code"))?;
        if code < 10 {
            return Err(Error::malformed(line, format!("aperture code D{} below D10", code)));
        }
        let (name, params) = match rest[i..].find(',') {
            Some(k) => (&rest[i..i + k], Some(&rest[i + k + 1..])),
            None => (&rest[i..], None),
        };
        let mods: Vec<f64> = match params {
            None => Vec::new(),
            Some(p) => {
                let mut v = Vec::new();
                for field in p.split('X') {
                    let f: f64 = field.trim().parse().map_err(|_| {
                        Error::malformed(line, format!("unparsable aperture modifier '{}'", field))
                    })?;
                    v.push(f);
                }
                v
            }
        };
        let unit = self.inches_per_unit.unwrap_or_else(|| {
            // units may legally arrive late; inches is the classic default
            1.0
        });
        let get = |i: usize| mods.get(i).copied().map(|v| v * unit);
        let shape = match name {
            "C" => ApertureShape::Circle {
                diameter: get(0)
                    .ok_or_else(|| Error::malformed(line, "circle aperture without diameter"))?,
                hole: get(1),
            },
            "R" => ApertureShape::Rect {
                w: get(0).ok_or_else(|| Error::malformed(line, "rectangle aperture without width"))?,
                h: get(1)
                    .ok_or_else(|| Error::malformed(line, "rectangle aperture without height"))?,
                hole: get(2),
            },
            "O" => ApertureShape::Obround {
                w: get(0).ok_or_else(|| Error::malformed(line, "obround aperture without width"))?,
                h: get(1).ok_or_else(|| Error::malformed(line, "obround aperture without height"))?,
                hole: get(2),
            },
            "P" => ApertureShape::Polygon {
                diameter: get(0)
                    .ok_or_else(|| Error::malformed(line, "polygon aperture without diameter"))?,
                vertices: mods.get(1).copied().unwrap_or(3.0) as u32,
                rotation: mods.get(2).copied().unwrap_or(0.0),
                hole: get(3),
            },
            macro_name => {
                let template = self
                    .table
                    .get_macro(macro_name)
                    .cloned()
                    .ok_or_else(|| {
                        Error::malformed(line, format!("unknown aperture template '{}'", macro_name))
                    })?;
                ApertureShape::Macro {
                    template,
                    params: mods.clone(),
                    unit,
                }
            }
        };
        match self.table.define(Aperture { code, shape }) {
            DefineResult::Added => Ok(()),
            DefineResult::Identical => {
                self.advise(line, format!("aperture D{} redefined identically", code));
                Ok(())
            }
            DefineResult::Conflict => Err(Error::DuplicateAperture { code, line }),
        }
    }

    fn define_macro(&mut self, line: usize, blocks: &[String]) -> Result<()> {
        let name = blocks[0][2..].trim().to_string();
        if name.is_empty() {
            return Err(Error::malformed(line, "aperture macro without a name"));
        }
        let mut statements = Vec::new();
        for block in &blocks[1..] {
            if block.is_empty() {
                continue;
            }
            if let Some(eq) = block.find('=') {
                let var = block[..eq].trim();
                if !var.starts_with('$') {
                    return Err(Error::malformed(line, format!("bad macro assignment '{}'", block)));
                }
                let n: usize = var[1..]
                    .parse()
                    .map_err(|_| Error::malformed(line, "bad macro variable number"))?;
                let expr = Expr::parse(block[eq + 1..].trim())
                    .map_err(|e| Error::malformed(line, e))?;
                statements.push(MacroStatement::Assign(n, expr));
            } else {
                let mut fields = block.split(',');
                let code: u32 = fields
                    .next()
                    .unwrap_or("")
                    .trim()
                    .parse()
                    .map_err(|_| Error::malformed(line, "bad macro primitive code"))?;
                let mut exprs = Vec::new();
                for f in fields {
                    exprs.push(Expr::parse(f.trim()).map_err(|e| Error::malformed(line, e))?);
                }
                statements.push(MacroStatement::Primitive(code, exprs));
            }
        }
        self.table.define_macro(MacroTemplate { name, statements });
        Ok(())
    }

    // -----------------------------------------------------------------
    // Word commands
    // -----------------------------------------------------------------

    fn word(&mut self, line: usize, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if is_comment(text) {
            return Ok(());
        }
        let mut x = None;
        let mut y = None;
        let mut i_off = None;
        let mut j_off = None;
        let mut op = None;
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let letter = bytes[i] as char;
            i += 1;
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_digit() || bytes[i] == b'+' || bytes[i] == b'-' || bytes[i] == b'.')
            {
                i += 1;
            }
            let field = &text[start..i];
            match letter {
                'G' => self.g_code(line, field)?,
                'M' => {
                    let m: u32 = field
                        .parse()
                        .map_err(|_| Error::malformed(line, "unparsable M code"))?;
                    match m {
                        0 | 1 | 2 => {
                            self.saw_end = true;
                            self.ended = true;
                            return Ok(());
                        }
                        other => self.advise(line, format!("unknown code M{} ignored", other)),
                    }
                }
                'X' => x = Some(self.coordinate(line, field, true)?),
                'Y' => y = Some(self.coordinate(line, field, false)?),
                'I' => i_off = Some(self.coordinate(line, field, true)?),
                'J' => j_off = Some(self.coordinate(line, field, false)?),
                'D' => {
                    op = Some(
                        field
                            .parse::<u32>()
                            .map_err(|_| Error::malformed(line, "unparsable D code"))?,
                    )
                }
                other => {
                    return Err(Error::malformed(line, format!("unexpected character '{}'", other)));
                }
            }
        }
        if x.is_none() && y.is_none() && op.is_none() {
            return Ok(()); // bare mode command
        }
        let op = match op {
            Some(d) => Some(d),
            None => {
                // D codes are modal in legacy files
                if self.last_op.is_none() {
                    self.advise(line, "coordinates without operation code, treated as move".into());
                }
                self.last_op.or(Some(2))
            }
        };
        match op {
            Some(1) => {
                self.last_op = Some(1);
                self.interpolate(line, x, y, i_off, j_off)
            }
            Some(2) => {
                self.last_op = Some(2);
                self.move_to(x, y)
            }
            Some(3) => {
                self.last_op = Some(3);
                self.flash(line, x, y)
            }
            Some(d) if d >= 10 => {
                if self.table.get(d).is_none() {
                    return Err(Error::UndefinedAperture { code: d, line });
                }
                self.aperture = Some(d);
                Ok(())
            }
            Some(d) => Err(Error::malformed(line, format!("invalid operation code D{:02}", d))),
            None => Ok(()),
        }
    }

    fn g_code(&mut self, line: usize, field: &str) -> Result<()> {
        let g: u32 = field
            .parse()
            .map_err(|_| Error::malformed(line, "unparsable G code"))?;
        match g {
            1 => self.interpolation = Interpolation::Linear,
            2 => self.interpolation = Interpolation::Clockwise,
            3 => self.interpolation = Interpolation::CounterClockwise,
            36 => self.region = Some(RegionAccum::default()),
            37 => {
                let mut region = match self.region.take() {
                    None => return Err(Error::malformed(line, "G37 without matching G36")),
                    Some(r) => r,
                };
                region.close_current();
                self.emit_region(region);
            }
            54 => self.advise(line, "deprecated G54 aperture select prefix".into()),
            70 => {
                self.advise(line, "deprecated G70 unit selection".into());
                self.inches_per_unit = Some(1.0);
            }
            71 => {
                self.advise(line, "deprecated G71 unit selection".into());
                self.inches_per_unit = Some(1.0 / 25.4);
            }
            74 => self.quadrant = QuadrantMode::Single,
            75 => self.quadrant = QuadrantMode::Multi,
            90 => {} // absolute is the only supported mode
            91 => {
                return Err(Error::malformed(line, "incremental coordinates are not supported"));
            }
            other => self.advise(line, format!("unknown code G{:02} ignored", other)),
        }
        Ok(())
    }

    fn coordinate(&mut self, line: usize, field: &str, is_x: bool) -> Result<f64> {
        let format = self
            .format
            .ok_or_else(|| Error::malformed(line, "coordinate before %FS format spec"))?;
        let units = format
            .value(field)
            .ok_or_else(|| Error::malformed(line, format!("unparsable coordinate '{}'", field)))?;
        let inches = units * self.inches_per_unit.unwrap_or(1.0);
        Ok(if is_x {
            inches * self.config.pixels_per_inch_x()
        } else {
            inches * self.config.pixels_per_inch_y()
        })
    }

    fn move_to(&mut self, x: Option<f64>, y: Option<f64>) -> Result<()> {
        if let Some(region) = self.region.as_mut() {
            region.close_current();
        }
        self.apply_xy(x, y);
        if let Some(region) = self.region.as_mut() {
            region.current.push(Vertex::xy(self.x, self.y));
        }
        Ok(())
    }

    fn apply_xy(&mut self, x: Option<f64>, y: Option<f64>) {
        if let Some(x) = x {
            self.x = x;
        }
        if let Some(y) = y {
            self.y = y;
        }
    }

    fn push_polygon(&mut self, group: ContourGroup, offset_x: f64, offset_y: f64) {
        if group.is_empty() {
            return;
        }
        let stacking = self.stacking;
        self.stacking += 1;
        self.doc
            .polygons
            .push(Polygon::new(&group, offset_x, offset_y, self.polarity, stacking));
    }

    fn flash(&mut self, line: usize, x: Option<f64>, y: Option<f64>) -> Result<()> {
        if self.region.is_some() {
            return Err(Error::malformed(line, "flash inside a region"));
        }
        self.apply_xy(x, y);
        let code = self
            .aperture
            .ok_or_else(|| Error::malformed(line, "flash without a selected aperture"))?;
        let aperture = match self.table.get(code) {
            None => return Err(Error::UndefinedAperture { code, line }),
            Some(a) => a.clone(),
        };
        let mut msgs = Vec::new();
        let groups = aperture.instantiate(self.config.grow_pixels, self.config, &mut msgs);
        for m in msgs {
            self.advise(line, m);
        }
        let (fx, fy) = (self.x, self.y);
        for group in groups {
            self.push_polygon(group, fx, fy);
        }
        Ok(())
    }

    /// D01: a stroke, an arc, or a region segment depending on mode
    fn interpolate(
        &mut self,
        line: usize,
        x: Option<f64>,
        y: Option<f64>,
        i_off: Option<f64>,
        j_off: Option<f64>,
    ) -> Result<()> {
        let (x0, y0) = (self.x, self.y);
        self.apply_xy(x, y);
        let (x1, y1) = (self.x, self.y);

        if self.region.is_some() {
            return self.region_segment(line, x0, y0, x1, y1, i_off, j_off);
        }

        let code = self
            .aperture
            .ok_or_else(|| Error::malformed(line, "draw without a selected aperture"))?;
        let aperture = match self.table.get(code) {
            None => return Err(Error::UndefinedAperture { code, line }),
            Some(a) => a.clone(),
        };
        let width = match aperture.stroke_width(self.config) {
            Some(w) => w,
            None => {
                self.advise(line, format!("macro aperture D{} cannot stroke, using 1 pixel", code));
                1.0
            }
        };
        if !aperture.is_circle() {
            self.advise(
                line,
                format!("aperture D{} is not circular, stroked with a round pen", code),
            );
        }
        let width = width + 2.0 * self.config.grow_pixels;
        let width = if width <= 0.0 {
            self.advise(line, "zero-width stroke, using 1 pixel pen".into());
            1.0
        } else {
            width
        };

        match self.interpolation {
            Interpolation::Linear => {
                self.push_polygon(capsule(x0, y0, x1, y1, width / 2.0), 0.0, 0.0);
                Ok(())
            }
            Interpolation::Clockwise | Interpolation::CounterClockwise => {
                let ccw = self.interpolation == Interpolation::CounterClockwise;
                let (cx, cy) = self.arc_center(line, x0, y0, x1, y1, i_off, j_off, ccw)?;
                self.push_polygon(
                    arc_capsule(x0, y0, x1, y1, cx, cy, ccw, width / 2.0),
                    0.0,
                    0.0,
                );
                Ok(())
            }
        }
    }

    fn region_segment(
        &mut self,
        line: usize,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        i_off: Option<f64>,
        j_off: Option<f64>,
    ) -> Result<()> {
        match self.interpolation {
            Interpolation::Linear => {
                let region = self.region.as_mut().unwrap();
                if region.current.is_empty() {
                    region.current.push(Vertex::xy(x0, y0));
                }
                region.current.push(Vertex::xy(x1, y1));
                Ok(())
            }
            Interpolation::Clockwise | Interpolation::CounterClockwise => {
                let ccw = self.interpolation == Interpolation::CounterClockwise;
                let (cx, cy) = self.arc_center(line, x0, y0, x1, y1, i_off, j_off, ccw)?;
                let r = ((x0 - cx).powi(2) + (y0 - cy).powi(2)).sqrt();
                let a0 = (y0 - cy).atan2(x0 - cx);
                let sweep = arc_sweep(a0, (y1 - cy).atan2(x1 - cx), ccw, x0 == x1 && y0 == y1);
                let region = self.region.as_mut().unwrap();
                if region.current.is_empty() {
                    region.current.push(Vertex::xy(x0, y0));
                }
                push_arc(&mut region.current, cx, cy, r, r, a0, sweep);
                Ok(())
            }
        }
    }

    fn emit_region(&mut self, region: RegionAccum) {
        // each region contour is an independent fill so overlapping
        // contours do not cancel each other
        let contours = region.contours;
        for contour in contours {
            self.push_polygon(vec![contour], 0.0, 0.0);
        }
    }

    /// Resolve the arc center from the I/J offsets
    ///
    /// Multi-quadrant offsets are signed. Single-quadrant offsets are
    /// unsigned; the sign pair is the one that keeps the arc within a
    /// quarter turn in the commanded direction.
    fn arc_center(
        &mut self,
        line: usize,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        i_off: Option<f64>,
        j_off: Option<f64>,
        ccw: bool,
    ) -> Result<(f64, f64)> {
        let i = i_off.unwrap_or(0.0);
        let j = j_off.unwrap_or(0.0);
        if i_off.is_none() && j_off.is_none() {
            return Err(Error::malformed(line, "arc without I or J offsets"));
        }
        match self.quadrant {
            QuadrantMode::Multi => Ok((x0 + i, y0 + j)),
            QuadrantMode::Single => {
                let mut best: Option<(f64, (f64, f64))> = None;
                for &si in &[1.0, -1.0] {
                    for &sj in &[1.0, -1.0] {
                        let (cx, cy) = (x0 + si * i, y0 + sj * j);
                        let r0 = ((x0 - cx).powi(2) + (y0 - cy).powi(2)).sqrt();
                        let r1 = ((x1 - cx).powi(2) + (y1 - cy).powi(2)).sqrt();
                        let a0 = (y0 - cy).atan2(x0 - cx);
                        let a1 = (y1 - cy).atan2(x1 - cx);
                        let sweep = arc_sweep(a0, a1, ccw, false).abs();
                        if sweep > PI / 2.0 + 1e-6 {
                            continue;
                        }
                        let fit = (r0 - r1).abs();
                        if best.map_or(true, |(bf, _)| fit < bf) {
                            best = Some((fit, (cx, cy)));
                        }
                    }
                }
                match best {
                    Some((_, c)) => Ok(c),
                    None => Err(Error::malformed(line, "no valid single-quadrant arc center")),
                }
            }
        }
    }
}

/// G04 introduces a comment; a bare G4 does as well, but G40-G49 do not
fn is_comment(text: &str) -> bool {
    if text.starts_with("G04") {
        return true;
    }
    text.starts_with("G4") && !text.as_bytes().get(2).map_or(false, |c| c.is_ascii_digit())
}

/// Signed sweep from a0 to the end angle in the commanded direction;
/// a coincident start and end is a full turn when `full_ok`
fn arc_sweep(a0: f64, a1: f64, ccw: bool, full_ok: bool) -> f64 {
    let tau = 2.0 * PI;
    if ccw {
        let mut s = (a1 - a0) % tau;
        if s < 0.0 {
            s += tau;
        }
        if s == 0.0 && full_ok {
            s = tau;
        }
        s
    } else {
        let mut s = (a0 - a1) % tau;
        if s < 0.0 {
            s += tau;
        }
        if s == 0.0 && full_ok {
            s = tau;
        }
        -s
    }
}

/// Thick segment swept by a round pen: two parallel sides joined by
/// semicircular caps
fn capsule(x0: f64, y0: f64, x1: f64, y1: f64, r: f64) -> ContourGroup {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        // a dot: the pen outline alone
        let mut v = Vec::new();
        push_arc(&mut v, x0, y0, r, r, 0.0, 2.0 * PI);
        v.pop();
        return vec![v];
    }
    let a = dy.atan2(dx);
    let mut v = Vec::new();
    // cap past the far end, then back along the other side and around
    push_arc(&mut v, x1, y1, r, r, a - PI / 2.0, PI);
    push_arc(&mut v, x0, y0, r, r, a + PI / 2.0, PI);
    vec![v]
}

/// Thick arc swept by a round pen: outer arc, forward cap, inner arc,
/// start cap. A full turn becomes a ring of two subpaths.
fn arc_capsule(
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    cx: f64,
    cy: f64,
    ccw: bool,
    rp: f64,
) -> ContourGroup {
    let r0 = ((x0 - cx).powi(2) + (y0 - cy).powi(2)).sqrt();
    let a0 = (y0 - cy).atan2(x0 - cx);
    let a1 = (y1 - cy).atan2(x1 - cx);
    let full = x0 == x1 && y0 == y1;
    let sweep = arc_sweep(a0, a1, ccw, full);
    let outer = r0 + rp;
    let inner = (r0 - rp).max(0.0);

    if sweep.abs() >= 2.0 * PI - 1e-9 {
        let mut group = Vec::new();
        let mut vo = Vec::new();
        push_arc(&mut vo, cx, cy, outer, outer, 0.0, 2.0 * PI);
        vo.pop();
        group.push(vo);
        if inner > 0.0 {
            let mut vi = Vec::new();
            push_arc(&mut vi, cx, cy, inner, inner, 0.0, 2.0 * PI);
            vi.pop();
            group.push(vi);
        }
        return group;
    }

    let ae = a0 + sweep;
    let cap = if ccw { PI } else { -PI };
    let mut v = Vec::new();
    push_arc(&mut v, cx, cy, outer, outer, a0, sweep);
    push_arc(&mut v, x1, y1, rp, rp, ae, cap);
    push_arc(&mut v, cx, cy, inner, inner, ae, -sweep);
    push_arc(&mut v, x0, y0, rp, rp, a0 + cap, cap);
    vec![v]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RenderConfig {
        RenderConfig {
            dpi: 1000.0,
            ..Default::default()
        }
    }

    #[test]
    fn format_value_leading_omission() {
        let f = CoordFormat {
            integer: 2,
            decimal: 3,
            omission: ZeroOmission::Leading,
        };
        assert_eq!(f.value("1500"), Some(1.5));
        assert_eq!(f.value("-500"), Some(-0.5));
        assert_eq!(f.value("12x"), None);
    }

    #[test]
    fn format_value_trailing_omission() {
        let f = CoordFormat {
            integer: 2,
            decimal: 3,
            omission: ZeroOmission::Trailing,
        };
        // 15 is left-aligned in a 5 digit field: 15000 -> 15.0
        assert_eq!(f.value("15"), Some(15.0));
        assert_eq!(f.value("15000"), Some(15.0));
    }

    #[test]
    fn flash_produces_sorted_polygons() {
        let gbr = "%FSLAX23Y23*%\n%MOIN*%\n%ADD10C,0.1*%\nD10*\nX0Y2000D03*\nX0Y0D03*\nM02*\n";
        let doc = parse(gbr, &cfg()).unwrap();
        assert_eq!(doc.polygons.len(), 2);
        assert!(doc.polygons[0].pixel_min_y <= doc.polygons[1].pixel_min_y);
        // the later flash sorts first but keeps its higher stacking index
        assert_eq!(doc.polygons[0].stacking, 1);
    }

    #[test]
    fn undefined_aperture_is_fatal() {
        let gbr = "%FSLAX23Y23*%%MOIN*%D10*X0Y0D03*M02*";
        match parse(gbr, &cfg()) {
            Err(Error::UndefinedAperture { code: 10, .. }) => {}
            other => panic!("expected undefined aperture, got {:?}", other.map(|d| d.polygons.len())),
        }
    }

    #[test]
    fn incompatible_redefinition_is_fatal() {
        let gbr = "%FSLAX23Y23*%%MOIN*%%ADD10C,0.1*%%ADD10C,0.2*%M02*";
        match parse(gbr, &cfg()) {
            Err(Error::DuplicateAperture { code: 10, .. }) => {}
            other => panic!("expected duplicate aperture, got {:?}", other.map(|d| d.polygons.len())),
        }
    }

    #[test]
    fn unterminated_command_is_fatal() {
        let gbr = "%FSLAX23Y23*%%MOIN*%X100Y100";
        match parse(gbr, &cfg()) {
            Err(Error::Malformed { .. }) => {}
            other => panic!("expected malformed, got {:?}", other.map(|d| d.polygons.len())),
        }
    }

    #[test]
    fn deprecated_units_advise_and_apply() {
        let gbr = "%FSLAX23Y23*%G70*%ADD10C,0.1*%D10*X1000Y0D03*M02*";
        let doc = parse(gbr, &cfg()).unwrap();
        assert!(doc.messages.iter().any(|m| m.contains("G70")));
        // 1.000 inch at 1000 dpi
        assert_eq!(doc.polygons[0].pixel_offset_x, 1000);
    }

    #[test]
    fn image_polarity_negative() {
        let gbr = "%FSLAX23Y23*%%MOIN*%%IPNEG*%%ADD10C,0.1*%D10*X0Y0D03*M02*";
        let doc = parse(gbr, &cfg()).unwrap();
        assert!(!doc.image_polarity_dark);
    }

    #[test]
    fn clear_polarity_features() {
        let gbr = "%FSLAX23Y23*%%MOIN*%%ADD10C,0.1*%D10*X0Y0D03*%LPC*%X100Y0D03*M02*";
        let doc = parse(gbr, &cfg()).unwrap();
        let mut polarities: Vec<Polarity> = doc.polygons.iter().map(|p| p.polarity).collect();
        polarities.sort_by_key(|p| *p == Polarity::Dark);
        assert!(polarities.contains(&Polarity::Clear));
        assert!(polarities.contains(&Polarity::Dark));
    }

    #[test]
    fn region_fills_outline() {
        let gbr = "%FSLAX23Y23*%%MOIN*%G36*X0Y0D02*X1000Y0D01*X1000Y1000D01*X0Y1000D01*X0Y0D01*G37*M02*";
        let doc = parse(gbr, &cfg()).unwrap();
        assert_eq!(doc.polygons.len(), 1);
        let p = &doc.polygons[0];
        assert_eq!((p.pixel_min_x, p.pixel_max_x), (0, 1000));
        assert_eq!((p.pixel_min_y, p.pixel_max_y), (0, 1000));
    }

    #[test]
    fn stroke_covers_both_endpoints() {
        let gbr = "%FSLAX23Y23*%%MOIN*%%ADD10C,0.01*%D10*X0Y0D02*X1000Y0D01*M02*";
        let doc = parse(gbr, &cfg()).unwrap();
        assert_eq!(doc.polygons.len(), 1);
        let p = &doc.polygons[0];
        // 10 mil pen at 1000 dpi is a 10 pixel diameter
        assert!(p.pixel_min_x <= -4 && p.pixel_max_x >= 1004);
        assert!(p.pixel_min_y <= -4 && p.pixel_max_y >= 4);
    }

    #[test]
    fn full_circle_arc_makes_ring() {
        let gbr = "%FSLAX23Y23*%%MOIN*%%ADD10C,0.01*%D10*G75*X0Y0D02*G03X0Y0I100J0D01*M02*";
        let doc = parse(gbr, &cfg()).unwrap();
        assert_eq!(doc.polygons.len(), 1);
        let p = &doc.polygons[0];
        // centered at (100, 0) with radius 100 plus the pen
        assert!(p.pixel_min_x < 0 && p.pixel_max_x > 200);
    }

    #[test]
    fn region_not_closed_is_fatal() {
        let gbr = "%FSLAX23Y23*%%MOIN*%G36*X0Y0D02*X1000Y0D01*M02*";
        match parse(gbr, &cfg()) {
            Err(Error::Malformed { .. }) => {}
            other => panic!("expected malformed, got {:?}", other.map(|d| d.polygons.len())),
        }
    }
}
