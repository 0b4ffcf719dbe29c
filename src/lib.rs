
/// How does this work
///    doc  = parse( gerber_text, config )      -- one per input file
///    seq  = merge_documents( docs )           -- sorted by pixel_min_y
///    render(docs, config, sink)
///      for each strip:
///        blank to background polarity
///        for each row:
///          admit polygons starting at row     -- PENDING -> ACTIVE
///          evict polygons past their extent   -- ACTIVE -> RETIRED
///          poly.next_row_spans(row)           -- even-odd x pairs
///            horizontal_line()                -- masked byte fills
///        sink.write_strip()                   -- packed 1-bit rows

pub mod aperture;
pub mod config;
pub mod error;
pub mod gerber;
pub mod pbm;
pub mod polygon;
pub mod raster;

pub use aperture::*;
pub use config::*;
pub use error::*;
pub use gerber::*;
pub use pbm::*;
pub use polygon::*;
pub use raster::*;
