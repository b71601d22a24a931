//! Command-line driver for the snow-line pipeline.
//!
//! Reads a fractional snow raster and a co-registered elevation raster,
//! estimates the snow-line altitude by aspect over the raster extent (or a
//! named basin from a store directory) and prints the record.

use anyhow::{bail, Context, Result};
use snowline::core::{SeriesAssembler, SlaPipeline, TerrainPreprocessor, TimeStep};
use snowline::io::{RasterIo, SlaStore};
use snowline::types::{Aoi, Aspect, Polygon};

fn usage() -> ! {
    eprintln!(
        "usage: slapipe <fsc.tif> <dem.tif> <YYYY-MM-DD> [--store DIR --basin NAME]\n\
         \n\
         <fsc.tif>    fractional snow cover (0-100) on the working grid\n\
         <dem.tif>    elevation raster, same CRS, integer factor finer or equal\n\
         <date>       acquisition date of the snow raster\n\
         --store DIR  persisted SLA store; the record is appended for --basin\n\
         --basin NAME basin name inside the store"
    );
    std::process::exit(2);
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        usage();
    }
    let fsc_path = &args[0];
    let dem_path = &args[1];
    let date = args[2]
        .parse::<chrono::NaiveDate>()
        .context("acquisition date must be YYYY-MM-DD")?;

    let mut store_dir = None;
    let mut basin = None;
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--store" if i + 1 < args.len() => {
                store_dir = Some(args[i + 1].clone());
                i += 2;
            }
            "--basin" if i + 1 < args.len() => {
                basin = Some(args[i + 1].clone());
                i += 2;
            }
            other => bail!("unknown argument: {}", other),
        }
    }

    let (fsc, working) =
        RasterIo::read_geotiff(fsc_path).context("failed to read the snow raster")?;
    let (dem, dem_grid) =
        RasterIo::read_geotiff(dem_path).context("failed to read the elevation raster")?;

    // without a basin polygon the AOI is the full working extent
    let bounds = working.bounds();
    let aoi = Aoi {
        name: basin.clone().unwrap_or_else(|| "extent".to_string()),
        polygon: Polygon::new(vec![
            (bounds.min_x, bounds.min_y),
            (bounds.max_x, bounds.min_y),
            (bounds.max_x, bounds.max_y),
            (bounds.min_x, bounds.max_y),
        ]),
    };

    let ctx = TerrainPreprocessor::new()
        .build_context(aoi, &dem, &dem_grid, &working)
        .context("terrain preprocessing failed")?;
    log::info!(
        "context ready: {} grid cells, elevation {:?}..{:?}",
        ctx.n_grid,
        ctx.fallback_min,
        ctx.fallback_max
    );

    let estimate = SlaPipeline::new()
        .run(&ctx, &fsc)
        .context("snow-line estimation failed")?;

    println!("date: {}", date);
    println!(
        "fractional snow cover: {}",
        estimate
            .fsc
            .map(|f| format!("{:.3}", f))
            .unwrap_or_else(|| "no data".to_string())
    );
    for aspect in Aspect::DIRECTIONAL {
        let stat = estimate.stats.get(aspect);
        match stat.median {
            Some(m) => println!("SLA {}: {:.0} m ({} samples)", aspect, m, stat.count),
            None => println!("SLA {}: no data", aspect),
        }
    }

    if let (Some(dir), Some(name)) = (store_dir, basin) {
        let store = SlaStore::open(dir);
        let history = store.load(&name)?;
        let steps = vec![TimeStep { date, fsc }];
        let series = SeriesAssembler::new().assemble(&ctx, &history, &steps, date)?;
        let appended = store.append(&name, &series)?;
        println!("appended {} record(s) to the store", appended);
    }

    Ok(())
}
