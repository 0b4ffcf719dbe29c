
extern crate gerbrast;

use gerbrast::{merge_documents, parse, render};
use gerbrast::{Polarity, Polygon, RenderConfig, StripStore};
use gerbrast::polygon::rect_contour;

fn config_2400() -> RenderConfig {
    RenderConfig {
        dpi: 2400.0,
        count_area: true,
        ..Default::default()
    }
}

// 100x50 pixel rectangular aperture at 2400 dpi, in inches
const RECT_100X50: &str = "%FSLAX26Y26*%\n%MOIN*%\n%ADD10R,0.04166666666667X0.02083333333333*%\nD10*\nX0Y0D03*\nM02*\n";

#[test]
fn single_rect_flash_scenario() {
    let _ = env_logger::try_init();
    let config = config_2400();
    let doc = parse(RECT_100X50, &config).unwrap();
    assert_eq!(doc.polygons.len(), 1);

    let mut sink = StripStore::new();
    let summary = render(vec![doc], &config, &mut sink).unwrap();
    // inclusive bounding box rule adds one pixel per axis
    assert_eq!((summary.width, summary.height), (101, 51));
    assert_eq!(summary.strips, 1);
    assert_eq!(sink.strip_count(), 1);
    assert_eq!(summary.dark_pixels, Some(5100));
}

#[test]
fn dark_clear_stacking_scenario() {
    // dark rectangle with a later clear rectangle punched out of it
    let mut doc = gerbrast::Document {
        image_polarity_dark: true,
        ..Default::default()
    };
    doc.polygons.push(Polygon::new(
        &[rect_contour(0.0, 0.0, 100.0, 99.0)],
        0.0,
        0.0,
        Polarity::Dark,
        0,
    ));
    doc.polygons.push(Polygon::new(
        &[rect_contour(25.0, 25.0, 75.0, 74.0)],
        0.0,
        0.0,
        Polarity::Clear,
        1,
    ));
    doc.polygons.sort_by_key(|p| p.pixel_min_y);

    let config = RenderConfig {
        count_area: true,
        ..Default::default()
    };
    let mut sink = StripStore::new();
    let summary = render(vec![doc], &config, &mut sink).unwrap();
    assert_eq!(summary.dark_pixels, Some(10_000 - 2_500));
    // the clear hole really is clear
    assert!(!sink.get(50, 50));
    assert!(sink.get(10, 50));
}

#[test]
fn reversed_stacking_keeps_clear_under_dark() {
    // same geometry, clear drawn first: the dark rectangle wins
    let mut doc = gerbrast::Document {
        image_polarity_dark: true,
        ..Default::default()
    };
    doc.polygons.push(Polygon::new(
        &[rect_contour(25.0, 25.0, 75.0, 74.0)],
        0.0,
        0.0,
        Polarity::Clear,
        0,
    ));
    doc.polygons.push(Polygon::new(
        &[rect_contour(0.0, 0.0, 100.0, 99.0)],
        0.0,
        0.0,
        Polarity::Dark,
        1,
    ));
    doc.polygons.sort_by_key(|p| p.pixel_min_y);

    let config = RenderConfig {
        count_area: true,
        ..Default::default()
    };
    let mut sink = StripStore::new();
    let summary = render(vec![doc], &config, &mut sink).unwrap();
    assert_eq!(summary.dark_pixels, Some(10_000));
}

#[test]
fn identical_runs_are_byte_identical() {
    let config = config_2400();
    let mut first = StripStore::new();
    let mut second = StripStore::new();
    render(vec![parse(RECT_100X50, &config).unwrap()], &config, &mut first).unwrap();
    render(vec![parse(RECT_100X50, &config).unwrap()], &config, &mut second).unwrap();
    assert_eq!(first.data, second.data);
}

#[test]
fn polarity_inversion_complements_the_raster() {
    let config = config_2400();
    let inverted = RenderConfig {
        invert_polarity: true,
        ..config.clone()
    };
    let mut normal_sink = StripStore::new();
    let mut inverted_sink = StripStore::new();
    render(vec![parse(RECT_100X50, &config).unwrap()], &config, &mut normal_sink).unwrap();
    render(
        vec![parse(RECT_100X50, &inverted).unwrap()],
        &inverted,
        &mut inverted_sink,
    )
    .unwrap();
    assert_eq!(normal_sink.data.len(), inverted_sink.data.len());
    for (a, b) in normal_sink.data.iter().zip(inverted_sink.data.iter()) {
        assert_eq!(*a, !*b);
    }
}

#[test]
fn negative_image_polarity_sets_background() {
    let gbr = "%FSLAX26Y26*%\n%MOIN*%\n%IPNEG*%\n%ADD10R,0.04166666666667X0.02083333333333*%\nD10*\nX0Y0D03*\nM02*\n";
    let config = config_2400();
    let mut sink = StripStore::new();
    let summary = render(vec![parse(gbr, &config).unwrap()], &config, &mut sink).unwrap();
    // feature cleared out of an all-dark background
    assert!(!sink.get(50, 25));
    assert!(sink.get(100, 0));
    assert!(summary.dark_pixels.unwrap() < 5151);
}

#[test]
fn strip_size_does_not_change_pixels() {
    let config = config_2400();
    let small_strips = RenderConfig {
        rows_per_strip: 7,
        ..config.clone()
    };
    let mut whole = StripStore::new();
    let mut striped = StripStore::new();
    render(vec![parse(RECT_100X50, &config).unwrap()], &config, &mut whole).unwrap();
    let summary = render(
        vec![parse(RECT_100X50, &small_strips).unwrap()],
        &small_strips,
        &mut striped,
    )
    .unwrap();
    assert_eq!(summary.strips, (51 + 6) / 7);
    assert_eq!(whole.data, striped.data);
}

#[test]
fn two_documents_merge_sorted() {
    let config = config_2400();
    let upper = "%FSLAX26Y26*%%MOIN*%%ADD10C,0.01*%D10*X0Y100000D03*X0Y300000D03*M02*";
    let lower = "%FSLAX26Y26*%%MOIN*%%ADD11C,0.01*%D11*X0Y0D03*X0Y200000D03*M02*";
    let a = parse(upper, &config).unwrap();
    let b = parse(lower, &config).unwrap();
    let (na, nb) = (a.polygons.len(), b.polygons.len());
    let merged = merge_documents(vec![a, b]);
    assert_eq!(merged.len(), na + nb);
    for pair in merged.windows(2) {
        assert!(pair[0].pixel_min_y <= pair[1].pixel_min_y);
    }
}

#[test]
fn overlay_documents_composite_in_order() {
    let config = RenderConfig {
        count_area: true,
        ..Default::default()
    };
    // second overlay erases the middle of the first
    let mut dark = gerbrast::Document {
        image_polarity_dark: true,
        ..Default::default()
    };
    dark.polygons.push(Polygon::new(
        &[rect_contour(0.0, 0.0, 100.0, 99.0)],
        0.0,
        0.0,
        Polarity::Dark,
        0,
    ));
    let mut clear = gerbrast::Document {
        image_polarity_dark: true,
        ..Default::default()
    };
    clear.polygons.push(Polygon::new(
        &[rect_contour(25.0, 25.0, 75.0, 74.0)],
        0.0,
        0.0,
        Polarity::Clear,
        0,
    ));
    let mut sink = StripStore::new();
    let summary = render(vec![dark, clear], &config, &mut sink).unwrap();
    assert_eq!(summary.dark_pixels, Some(7_500));
}

#[test]
fn border_grows_image_only() {
    let config = config_2400();
    let bordered = RenderConfig {
        border_pixels: 16.0,
        ..config.clone()
    };
    let mut plain = StripStore::new();
    let mut framed = StripStore::new();
    let s1 = render(vec![parse(RECT_100X50, &config).unwrap()], &config, &mut plain).unwrap();
    let s2 = render(
        vec![parse(RECT_100X50, &bordered).unwrap()],
        &bordered,
        &mut framed,
    )
    .unwrap();
    assert_eq!(s2.width, s1.width + 32);
    assert_eq!(s2.height, s1.height + 32);
    assert_eq!(s2.dark_pixels, s1.dark_pixels);
    // border rows stay blank
    for x in 0..framed.width {
        assert!(!framed.get(x, 0));
        assert!(!framed.get(x, framed.height - 1));
    }
}

#[test]
fn summary_reports_physical_size() {
    let config = config_2400();
    let doc = parse(RECT_100X50, &config).unwrap();
    let mut sink = StripStore::new();
    let summary = render(vec![doc], &config, &mut sink).unwrap();
    let expect_w_mm = 101.0 / 2400.0 * 25.4;
    assert!((summary.size_mm.0 - expect_w_mm).abs() < 1e-9);
    assert_eq!(summary.bytes_per_scanline, (101 + 7) / 8);
    assert_eq!(summary.uncompressed_bytes, summary.bytes_per_scanline * 51);
    let area = summary.dark_area_cm2().unwrap();
    assert!((area - 5100.0 * 2.54 * 2.54 / (2400.0 * 2400.0)).abs() < 1e-9);
}

#[test]
fn advisories_do_not_block_rendering() {
    let gbr = "%FSLAX26Y26*%\n%MOIN*%\n%SRX2Y2I1.0J1.0*%\n%ADD10C,0.01*%\nD10*\nG99*\nX0Y0D03*\nM02*\n";
    let config = config_2400();
    let doc = parse(gbr, &config).unwrap();
    assert!(doc.messages.iter().any(|m| m.contains("SR")));
    assert!(doc.messages.iter().any(|m| m.contains("G99")));
    let mut sink = StripStore::new();
    assert!(render(vec![doc], &config, &mut sink).is_ok());
}

#[test]
fn config_errors_come_first() {
    let config = RenderConfig {
        dpi: 0.0,
        ..Default::default()
    };
    match config.validate() {
        Err(gerbrast::Error::Config { .. }) => {}
        other => panic!("expected config error, got {:?}", other),
    }
    let config = RenderConfig {
        border_pixels: -1.0,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}
