//! Strip sinks and writing of PBM (Portable Bitmap Format) proofs
//!
//! The engine's packed strips are already PBM P4 raster rows: one bit
//! per pixel, most significant bit leftmost, rows padded to a byte.
//! Concatenating the strips after a `P4` header is a complete file, so
//! this module doubles as the reference persisted form for tests.
//!
//! See <https://en.wikipedia.org/wiki/Netpbm_format>

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::raster::StripSink;

/// In-memory sink collecting all strips, mostly for tests
#[derive(Debug, Default)]
pub struct StripStore {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
    strips: Vec<usize>,
}

impl StripStore {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }
    pub fn bytes_per_scanline(&self) -> usize {
        (self.width + 7) >> 3
    }
    /// One packed row of the assembled image
    pub fn row(&self, y: usize) -> &[u8] {
        let bps = self.bytes_per_scanline();
        &self.data[y * bps..(y + 1) * bps]
    }
    /// Test whether pixel (x,y) is set
    pub fn get(&self, x: usize, y: usize) -> bool {
        let byte = self.row(y)[x >> 3];
        byte & (0x80 >> (x & 7)) != 0
    }
    pub fn count_set(&self) -> u64 {
        self.data.iter().map(|b| u64::from(b.count_ones() as u8)).sum()
    }
}

impl StripSink for StripStore {
    fn begin(&mut self, width: usize, height: usize) -> io::Result<()> {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.strips.clear();
        Ok(())
    }
    fn write_strip(&mut self, strip: usize, rows: usize, data: &[u8]) -> io::Result<()> {
        debug_assert_eq!(strip, self.strips.len(), "strips must arrive in order");
        self.strips.push(rows);
        self.data.extend_from_slice(data);
        Ok(())
    }
}

/// Streams strips straight into a binary PBM file
pub struct PbmWriter<W: Write> {
    out: W,
}

impl PbmWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(PbmWriter {
            out: BufWriter::new(File::create(path)?),
        })
    }
}

impl<W: Write> PbmWriter<W> {
    pub fn new(out: W) -> Self {
        PbmWriter { out }
    }
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StripSink for PbmWriter<W> {
    fn begin(&mut self, width: usize, height: usize) -> io::Result<()> {
        write!(self.out, "P4\n{} {}\n", width, height)
    }
    fn write_strip(&mut self, _strip: usize, _rows: usize, data: &[u8]) -> io::Result<()> {
        self.out.write_all(data)
    }
}

/// Expand packed rows to one byte per pixel, set bits black (0)
pub fn unpack(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let bps = (width + 7) >> 3;
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = &data[y * bps..(y + 1) * bps];
        for x in 0..width {
            let set = row[x >> 3] & (0x80 >> (x & 7)) != 0;
            out.push(if set { 0x00 } else { 0xFF });
        }
    }
    out
}

pub fn read_file<P: AsRef<Path>>(filename: P) -> Result<(Vec<u8>, usize, usize), image::ImageError> {
    let img = image::open(filename)?.to_luma();
    let (w, h) = img.dimensions();
    let buf = img.into_raw();
    Ok((buf, w as usize, h as usize))
}

/// Save a packed raster as an 8-bit proof image
pub fn write_file<P: AsRef<Path>>(
    data: &[u8],
    width: usize,
    height: usize,
    filename: P,
) -> Result<(), std::io::Error> {
    let buf = unpack(data, width, height);
    image::save_buffer(filename, &buf, width as u32, height as u32, image::Gray(8))
}

pub fn img_diff<P: AsRef<Path>>(f1: P, f2: P) -> Result<bool, image::ImageError> {
    let (d1, w1, h1) = read_file(f1)?;
    let (d2, w2, h2) = read_file(f2)?;
    if w1 != w2 || h1 != h2 {
        return Ok(false);
    }
    let mut flag = true;
    for (i, (v1, v2)) in d1.iter().zip(d2.iter()).enumerate() {
        if v1 != v2 {
            println!("{} [{},{}]: {} {}", i, i % w1, i / w1, v1, v2);
            flag = false;
        }
    }
    Ok(flag)
}
