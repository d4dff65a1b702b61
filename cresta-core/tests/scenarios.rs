//! End-to-end scenarios exercising the full pipeline through the public
//! API.

mod common;

use common::MemorySource;
use cresta_core::{
    run_region, write_prominence_table, IslandTree, RegionOptions, TileCache, TileSource,
    TreeBuilder,
};

fn options(bounds: (f32, f32, f32, f32), min_prominence: f32) -> RegionOptions {
    RegionOptions {
        min_latitude: bounds.0,
        max_latitude: bounds.1,
        min_longitude: bounds.2,
        max_longitude: bounds.3,
        min_prominence,
        anti_prominence: false,
        bathymetry: false,
    }
}

#[test]
fn single_tile_summit_has_full_prominence() {
    // One summit amid cols and ridges; every saddle is false or basin, so
    // the summit is the landmass high point with prominence equal to its
    // elevation.
    let mut source = MemorySource::new(4);
    source.insert(
        0,
        0,
        &[
            &[1.0, 2.0, 3.0, 2.0, 1.0],
            &[2.0, 5.0, 4.0, 6.0, 2.0],
            &[3.0, 4.0, 9.0, 7.0, 3.0],
            &[2.0, 6.0, 4.0, 5.0, 2.0],
            &[1.0, 2.0, 3.0, 2.0, 1.0],
        ],
    );
    let cache = TileCache::new(source, 2);

    let summary =
        run_region(&cache, &options((0.0, 1.0, 0.0, 1.0), 0.5)).expect("tile has terrain");

    assert_eq!(summary.records.len(), 1);
    let record = &summary.records[0];
    assert_eq!(record.elevation, 9.0);
    assert_eq!(record.prominence, 9.0);

    let mut table = Vec::new();
    write_prominence_table(&summary.records, &mut table).expect("write to vec");
    assert_eq!(
        String::from_utf8(table).expect("utf8"),
        "0.5000,0.5000,9.00,0.0000,0.0000,9.00\n"
    );
}

#[test]
fn peaks_across_a_tile_seam_share_a_spliced_key_saddle() {
    let mut source = MemorySource::new(4);
    source.insert(
        0,
        0,
        &[
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 100.0, 50.0, 50.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
        ],
    );
    source.insert(
        0,
        1,
        &[
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[50.0, 50.0, 80.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
        ],
    );
    let cache = TileCache::new(source, 2);

    let summary =
        run_region(&cache, &options((0.0, 1.0, 0.0, 2.0), 20.0)).expect("both tiles load");

    assert_eq!(summary.records.len(), 2);
    let higher = summary
        .records
        .iter()
        .find(|record| record.elevation == 100.0)
        .expect("western summit");
    let lower = summary
        .records
        .iter()
        .find(|record| record.elevation == 80.0)
        .expect("eastern summit");

    assert_eq!(higher.prominence, 100.0);
    assert_eq!(lower.prominence, 30.0);
    // The key saddle lies on the shared edge at the spliced runoff.
    assert!((lower.saddle.longitude() - 1.0).abs() < 1e-6);
    assert!((lower.saddle.latitude() - 0.5).abs() < 1e-6);
}

#[test]
fn anti_prominence_measures_depression_depth() {
    let mut source = MemorySource::new(6);
    source.insert(
        0,
        0,
        &[
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, -50.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ],
    );
    let cache = TileCache::new(source, 2);

    let mut region_options = options((0.0, 1.0, 0.0, 1.0), 10.0);
    region_options.anti_prominence = true;
    let summary = run_region(&cache, &region_options).expect("tile has terrain");

    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].prominence, 50.0);
    assert_eq!(summary.records[0].elevation, -50.0);
}

#[test]
fn per_tile_trees_keep_runoffs_for_future_merges() {
    let mut source = MemorySource::new(4);
    source.insert(
        0,
        0,
        &[
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 100.0, 50.0, 50.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
        ],
    );
    let cache = TileCache::new(source, 2);

    let tile = cache
        .load_without_caching(cresta_core::TileKey::new(0.0, 0.0))
        .expect("tile exists");
    let coords = cache
        .source()
        .coordinate_system(cresta_core::TileKey::new(0.0, 0.0));
    let tree = TreeBuilder::new(&tile, coords).build();

    // Four corners plus the edge maximum on the eastern edge.
    assert!(tree.runoffs().len() >= 5);
    let island = IslandTree::build(&tree, false);
    assert_eq!(island.nodes()[1].prominence, Some(100.0));
}
