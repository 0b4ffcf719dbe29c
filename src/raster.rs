//! Scanline rasterization of merged polygon sequences
//!
//! The engine merges every document's sorted polygon list into one
//! sequence ordered by `pixel_min_y`, sizes the image from the combined
//! bounding box plus the border, then sweeps the image a strip at a
//! time. Per row it admits polygons whose top edge has been reached,
//! drops the ones that ended, and composites each active polygon's row
//! spans into a packed 1-bit buffer, most significant bit leftmost.
//! Strips go to a [StripSink] in strictly increasing order, so peak
//! memory stays at one strip regardless of image height.

use std::cmp::max;
use std::cmp::min;

use log::debug;

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::gerber::Document;
use crate::polygon::{Polarity, Polygon};

/// How a span changes the bits it covers
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelOp {
    /// Bits set
    Set,
    /// Bits cleared
    Clear,
    /// Bits inverted, for overlay/cutout combination
    Invert,
}

/// Consumer of rendered strips; called in increasing strip order only
pub trait StripSink {
    /// Image dimensions, announced once before the first strip
    fn begin(&mut self, _width: usize, _height: usize) -> std::io::Result<()> {
        Ok(())
    }
    fn write_strip(&mut self, strip: usize, rows: usize, data: &[u8]) -> std::io::Result<()>;
}

/// Final geometry and area report of one render
#[derive(Debug, Clone)]
pub struct RenderSummary {
    pub width: u32,
    pub height: u32,
    pub dpi: f64,
    pub rows_per_strip: u32,
    pub strips: usize,
    pub bytes_per_scanline: usize,
    /// Image origin relative to the gerber coordinate origin
    pub origin_mm: (f64, f64),
    pub size_mm: (f64, f64),
    pub uncompressed_bytes: usize,
    /// Set bits over the whole image, when area counting is enabled
    pub dark_pixels: Option<u64>,
}

impl RenderSummary {
    pub fn dark_area_cm2(&self) -> Option<f64> {
        self.dark_pixels
            .map(|n| n as f64 * 2.54 * 2.54 / (self.dpi * self.dpi))
    }
    pub fn clear_area_cm2(&self) -> Option<f64> {
        self.dark_pixels.map(|n| {
            let total = self.width as f64 * self.height as f64;
            (total - n as f64) * 2.54 * 2.54 / (self.dpi * self.dpi)
        })
    }
}

// Partial-byte masks for MSB-first span filling. FILL_SINGLE is keyed
// by start bit + end bit * 8 and covers spans within one byte;
// FILL_FIRST runs from a start bit to the byte's end, FILL_LAST from
// the byte's start to an end bit.
#[rustfmt::skip]
const FILL_SINGLE: [u8; 64] = [
    0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xC0, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xE0, 0x60, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xF0, 0x70, 0x30, 0x10, 0x00, 0x00, 0x00, 0x00,
    0xF8, 0x78, 0x38, 0x18, 0x08, 0x00, 0x00, 0x00,
    0xFC, 0x7C, 0x3C, 0x1C, 0x0C, 0x04, 0x00, 0x00,
    0xFE, 0x7E, 0x3E, 0x1E, 0x0E, 0x06, 0x02, 0x00,
    0xFF, 0x7F, 0x3F, 0x1F, 0x0F, 0x07, 0x03, 0x01,
];
const FILL_FIRST: [u8; 8] = [0xFF, 0x7F, 0x3F, 0x1F, 0x0F, 0x07, 0x03, 0x01];
const FILL_LAST: [u8; 8] = [0x80, 0xC0, 0xE0, 0xF0, 0xF8, 0xFC, 0xFE, 0xFF];

/// Fill pixels x1..=x2 of one packed scanline
///
/// Both ends must be within the scanline. The three byte cases are
/// handled exactly: one partial byte, or two boundary bytes with whole
/// bytes bulk-filled between them.
pub fn horizontal_line(row: &mut [u8], x1: i64, x2: i64, op: PixelOp) {
    let (x1, x2) = if x1 > x2 { (x2, x1) } else { (x1, x2) };
    let b1 = (x1 & 7) as usize;
    let b2 = (x2 & 7) as usize;
    let i1 = (x1 >> 3) as usize;
    let i2 = (x2 >> 3) as usize;

    if i1 == i2 {
        let mask = FILL_SINGLE[b1 + (b2 << 3)];
        match op {
            PixelOp::Set => row[i1] |= mask,
            PixelOp::Clear => row[i1] &= !mask,
            PixelOp::Invert => row[i1] ^= mask,
        }
        return;
    }
    match op {
        PixelOp::Set => {
            row[i1] |= FILL_FIRST[b1];
            row[i2] |= FILL_LAST[b2];
            for b in &mut row[i1 + 1..i2] {
                *b = 0xFF;
            }
        }
        PixelOp::Clear => {
            row[i1] &= !FILL_FIRST[b1];
            row[i2] &= !FILL_LAST[b2];
            for b in &mut row[i1 + 1..i2] {
                *b = 0x00;
            }
        }
        PixelOp::Invert => {
            row[i1] ^= FILL_FIRST[b1];
            row[i2] ^= FILL_LAST[b2];
            for b in &mut row[i1 + 1..i2] {
                *b ^= 0xFF;
            }
        }
    }
}

/// Stable merge of two lists already sorted by `pixel_min_y`
fn merge_two(a: Vec<Polygon>, b: Vec<Polygon>) -> Vec<Polygon> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut ai = a.into_iter().peekable();
    let mut bi = b.into_iter().peekable();
    loop {
        let take_a = match (ai.peek(), bi.peek()) {
            (None, None) => break,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(pa), Some(pb)) => pa.pixel_min_y <= pb.pixel_min_y,
        };
        if take_a {
            out.push(ai.next().unwrap());
        } else {
            out.push(bi.next().unwrap());
        }
    }
    out
}

/// Merge every document's polygons into one globally ordered sequence
///
/// Stacking indices are re-based per document so a later overlay always
/// stacks above an earlier one, then the sorted lists merge stably.
pub fn merge_documents(documents: Vec<Document>) -> Vec<Polygon> {
    let mut merged: Vec<Polygon> = Vec::new();
    let mut base = 0u64;
    for doc in documents {
        let mut polygons = doc.polygons;
        for p in polygons.iter_mut() {
            p.stacking += base;
        }
        base += polygons.len() as u64;
        merged = if merged.is_empty() {
            polygons
        } else {
            merge_two(merged, polygons)
        };
    }
    merged
}

fn effective_op(polarity: Polarity, image_dark: bool) -> PixelOp {
    match (polarity, image_dark) {
        (Polarity::Dark, true) | (Polarity::Clear, false) => PixelOp::Set,
        _ => PixelOp::Clear,
    }
}

/// Render documents to packed strips
///
/// Documents composite as overlays in the order given; the base
/// polarity comes from the first document, inverted by the config
/// flag. Strips go to the sink in order; nothing is written if sizing
/// or allocation fails.
pub fn render<S: StripSink>(
    documents: Vec<Document>,
    config: &RenderConfig,
    sink: &mut S,
) -> Result<RenderSummary> {
    config.validate()?;
    let image_dark = match documents.first() {
        None => return Err(Error::EmptyImage),
        Some(doc) => doc.image_polarity_dark != config.invert_polarity,
    };
    let mut polygons = merge_documents(documents);
    if polygons.is_empty() {
        return Err(Error::EmptyImage);
    }

    let mut min_x = i64::max_value();
    let mut max_x = i64::min_value();
    let mut min_y = i64::max_value();
    let mut max_y = i64::min_value();
    for p in &polygons {
        min_x = min(min_x, p.pixel_min_x);
        max_x = max(max_x, p.pixel_max_x);
        min_y = min(min_y, p.pixel_min_y);
        max_y = max(max_y, p.pixel_max_y);
    }

    let border = config.border_pixels;
    let width = ((max_x - min_x) as f64 + 2.0 * border + 1.0).ceil() as usize;
    let height = ((max_y - min_y) as f64 + 2.0 * border + 1.0).ceil() as usize;
    let x_offset = border.floor() as i64 - min_x;
    let y_offset = border.floor() as i64;

    let strip_rows = match config.rows_per_strip as usize {
        0 => height,
        n if n > height => height,
        n => n,
    };
    let bytes_per_scanline = (width + 7) >> 3;
    let buffer_bytes = bytes_per_scanline * strip_rows;
    let mut buffer: Vec<u8> = Vec::new();
    buffer
        .try_reserve_exact(buffer_bytes)
        .map_err(|_| Error::Resource {
            needed: buffer_bytes,
        })?;
    buffer.resize(buffer_bytes, 0);

    // 256 entry look up table for counting set bits per byte
    let mut nbits = [0u8; 256];
    for (i, n) in nbits.iter_mut().enumerate() {
        *n = (i as u8).count_ones() as u8;
    }

    debug!(
        "render {} polygons into {}x{} pixels, {} rows per strip",
        polygons.len(),
        width,
        height,
        strip_rows
    );

    sink.begin(width, height)?;

    let blank = if image_dark { 0x00 } else { 0xFF };
    let max_pixel = width as i64 - 1;
    let mut next_poly = 0;
    let mut active: Vec<usize> = Vec::new();
    let mut dark_pixels = 0u64;
    let mut strip = 0;
    let mut row0 = 0usize;
    while row0 < height {
        let rows = min(strip_rows, height - row0);
        for b in buffer.iter_mut() {
            *b = blank;
        }
        for r in 0..rows {
            // polygon-space row of this image row
            let y = min_y - y_offset + (row0 + r) as i64;
            while next_poly < polygons.len() && polygons[next_poly].pixel_min_y <= y {
                let stacking = polygons[next_poly].stacking;
                let pos = active
                    .iter()
                    .position(|&i| polygons[i].stacking > stacking)
                    .unwrap_or_else(|| active.len());
                active.insert(pos, next_poly);
                next_poly += 1;
            }
            active.retain(|&i| polygons[i].pixel_max_y >= y);
            if active.is_empty() {
                continue;
            }
            let row_buf = &mut buffer[r * bytes_per_scanline..(r + 1) * bytes_per_scanline];
            for k in 0..active.len() {
                let poly = &mut polygons[active[k]];
                let op = effective_op(poly.polarity, image_dark);
                let shift = poly.pixel_offset_x + x_offset;
                for &(x1, x2) in poly.next_row_spans(y) {
                    let x1 = max(x1 + shift, 0);
                    let x2 = min(x2 + shift, max_pixel);
                    if x1 <= x2 {
                        horizontal_line(row_buf, x1, x2, op);
                    }
                }
            }
        }
        sink.write_strip(strip, rows, &buffer[..rows * bytes_per_scanline])?;
        if config.count_area {
            for &b in &buffer[..rows * bytes_per_scanline] {
                dark_pixels += u64::from(nbits[b as usize]);
            }
        }
        debug!("strip {} done, rows {}..{}", strip, row0, row0 + rows);
        strip += 1;
        row0 += rows;
    }

    let dpi = config.dpi;
    Ok(RenderSummary {
        width: width as u32,
        height: height as u32,
        dpi,
        rows_per_strip: strip_rows as u32,
        strips: strip,
        bytes_per_scanline,
        origin_mm: (
            (min_x - border.floor() as i64) as f64 / dpi * 25.4,
            (min_y - border.floor() as i64) as f64 / dpi * 25.4,
        ),
        size_mm: (width as f64 / dpi * 25.4, height as f64 / dpi * 25.4),
        uncompressed_bytes: bytes_per_scanline * height,
        dark_pixels: if config.count_area {
            Some(dark_pixels)
        } else {
            None
        },
    })
}
