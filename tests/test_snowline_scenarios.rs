use chrono::NaiveDate;
use ndarray::Array2;
use snowline::core::{
    GlacierOverlay, SeriesAssembler, SlaPipeline, TerrainPreprocessor, TimeStep,
};
use snowline::io::SlaStore;
use snowline::types::{Aoi, Aspect, GridSpec, Polygon};

const ROWS: usize = 40;
const COLS: usize = 40;
const PIXEL: f64 = 500.0;

fn working_grid() -> GridSpec {
    GridSpec {
        epsg: 32642,
        origin_x: 0.0,
        origin_y: ROWS as f64 * PIXEL,
        pixel_size: PIXEL,
        rows: ROWS,
        cols: COLS,
    }
}

/// Radial distance from the grid center in pixels
fn center_distance(r: usize, c: usize) -> f32 {
    let dr = r as f32 - (ROWS as f32 - 1.0) / 2.0;
    let dc = c as f32 - (COLS as f32 - 1.0) / 2.0;
    (dr * dr + dc * dc).sqrt()
}

/// A conical mountain: 3600 m at the center, falling 40 m per pixel outward,
/// so every compass direction is represented on its flanks
fn cone_dem() -> Array2<f32> {
    Array2::from_shape_fn((ROWS, COLS), |(r, c)| 3600.0 - 40.0 * center_distance(r, c))
}

fn full_extent_aoi(name: &str) -> Aoi {
    Aoi {
        name: name.to_string(),
        polygon: Polygon::new(vec![
            (0.0, 0.0),
            (COLS as f64 * PIXEL, 0.0),
            (COLS as f64 * PIXEL, ROWS as f64 * PIXEL),
            (0.0, ROWS as f64 * PIXEL),
        ]),
    }
}

/// 100% snow inside the 3000-3100 m elevation band, bare ground elsewhere
fn ring_snow_raster(dem: &Array2<f32>) -> Array2<f32> {
    Array2::from_shape_fn((ROWS, COLS), |(r, c)| {
        let elev = dem[[r, c]];
        if (3000.0..=3100.0).contains(&elev) {
            100.0
        } else {
            0.0
        }
    })
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_snow_ring_yields_band_elevation_for_every_aspect() {
    let _ = env_logger::builder().is_test(true).try_init();

    let working = working_grid();
    let dem = cone_dem();
    let ctx = TerrainPreprocessor::new()
        .build_context(full_extent_aoi("ring-basin"), &dem, &working.clone(), &working)
        .unwrap();

    let fsc = ring_snow_raster(&dem);
    let estimate = SlaPipeline::new().run(&ctx, &fsc).unwrap();

    let cover = estimate.fsc.expect("fractional cover must be defined");
    assert!(cover < 0.9, "a thin ring cannot be snow-bound ({})", cover);
    assert!(cover > 0.1, "the ring must clear the snow-free cutoff ({})", cover);

    for aspect in Aspect::DIRECTIONAL {
        let stat = estimate.stats.get(aspect);
        let median = stat
            .median
            .unwrap_or_else(|| panic!("aspect {} missing from the estimate", aspect));
        // boundary pixels sit on both sides of the 3000-3100 m snow band
        assert!(
            (2900.0..=3200.0).contains(&median),
            "aspect {} estimate {} outside the snow band",
            aspect,
            median
        );
        assert!(stat.count >= 10, "aspect {} undersampled", aspect);
    }
}

#[test]
fn test_snow_ring_estimates_are_reproducible() {
    let working = working_grid();
    let dem = cone_dem();
    let ctx = TerrainPreprocessor::new()
        .build_context(full_extent_aoi("ring-basin"), &dem, &working.clone(), &working)
        .unwrap();
    let fsc = ring_snow_raster(&dem);

    let pipeline = SlaPipeline::new();
    let first = pipeline.run(&ctx, &fsc).unwrap();
    let second = pipeline.run(&ctx, &fsc).unwrap();
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.fsc, second.fsc);
}

#[test]
fn test_incremental_assembly_against_persisted_store() {
    let _ = env_logger::builder().is_test(true).try_init();

    let working = working_grid();
    let dem = cone_dem();
    let ctx = TerrainPreprocessor::new()
        .build_context(full_extent_aoi("Chirchik_16"), &dem, &working.clone(), &working)
        .unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let store = SlaStore::open(tmp.path());
    let assembler = SeriesAssembler::new();

    // season start: two decades computed from scratch (empty history)
    let fsc = ring_snow_raster(&dem);
    let early_steps = vec![
        TimeStep {
            date: date(2024, 4, 1),
            fsc: fsc.clone(),
        },
        TimeStep {
            date: date(2024, 4, 11),
            fsc: fsc.clone(),
        },
    ];
    let history = store.load("Chirchik_16").unwrap();
    assert!(history.is_empty());
    let series = assembler
        .assemble(&ctx, &history, &early_steps, date(2024, 4, 30))
        .unwrap();
    assert_eq!(series.len(), 2);
    store.append("Chirchik_16", &series).unwrap();

    // next visit: history ends at April 11, two newer decades arrive
    let later_steps = vec![
        TimeStep {
            date: date(2024, 4, 11),
            fsc: fsc.clone(),
        },
        TimeStep {
            date: date(2024, 4, 21),
            fsc: fsc.clone(),
        },
        TimeStep {
            date: date(2024, 5, 1),
            fsc: fsc.clone(),
        },
        TimeStep {
            date: date(2024, 5, 11),
            fsc,
        },
    ];
    let history = store.load("Chirchik_16").unwrap();
    assert_eq!(history.len(), 2);
    let series = assembler
        .assemble(&ctx, &history, &later_steps, date(2024, 5, 5))
        .unwrap();
    // history + the two new decades on or before the index date
    assert_eq!(series.len(), 4);
    assert!(series.windows(2).all(|w| w[0].date < w[1].date));
    // fresh entries ran through the same estimator as the persisted ones
    assert!(series[3].value().is_some());
    assert!((series[3].value().unwrap() - series[0].value().unwrap()).abs() < 1e-6);

    // repeating the assembly with unchanged inputs changes nothing
    let again = assembler
        .assemble(&ctx, &history, &later_steps, date(2024, 5, 5))
        .unwrap();
    assert_eq!(series, again);
}

#[test]
fn test_glacier_overlay_on_the_ring_scenario() {
    let working = working_grid();
    let dem = cone_dem();
    let pre = TerrainPreprocessor::new();
    let ctx = pre
        .build_context(full_extent_aoi("ring-basin"), &dem, &working.clone(), &working)
        .unwrap();
    let fine = pre.fine_products(&dem, &working).unwrap();

    let fsc = ring_snow_raster(&dem);
    let pipeline = SlaPipeline::new();
    let snow = pipeline.classifier.classify(&fsc, &ctx).unwrap();
    let boundary = pipeline.detector.detect(&snow);
    let estimate = pipeline.estimator.estimate(&ctx, &snow, &boundary);

    // glacier on the upper cone, straddling the snow line
    let glacier = Array2::from_shape_fn((ROWS, COLS), |(r, c)| center_distance(r, c) < 16.0);
    let metrics = GlacierOverlay::new()
        .metrics(&ctx, &estimate.stats, &snow, &glacier, &fine)
        .unwrap();

    let fsc_glacier = metrics.fsc.expect("glacier cover must be defined");
    assert!(fsc_glacier > 0.0 && fsc_glacier < 1.0);
    assert!(metrics.fsc_below_sl.is_some());
    let area = metrics.area_below_sl_km2.expect("area must be defined");
    assert!(area > 0.0);
    // below-SL is a strict subset of the ~800-pixel glacier footprint
    assert!(area < 800.0 * 0.25);
}
