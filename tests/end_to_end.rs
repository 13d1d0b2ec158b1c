//! Full preparation + fishnet run over two synthetic wards.
//!
//! Coordinates are already planar (meters) and the identity projection is
//! used throughout, so the geometry is easy to reason about.

use std::fs::{self, File};

use rubeho::config::Config;
use rubeho::flagging::write_flagged_wards;
use rubeho::grid::{write_grid, GridMetadata};
use rubeho::pip::{load_flagged_wards, load_wards};
use rubeho::pipeline::{build_grid, prepare};
use rubeho::projection::CoordTransformer;
use rubeho::report::write_coverage_plan;
use rubeho::survey::load_program_locations;
use rubeho::{PipelineError, ProgramLocationType};

const WARDS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"ward_name": "Ward A", "dist_name": "District 1", "reg_name": "R1"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2000,0],[2000,2000],[0,2000],[0,0]]]}
        },
        {
            "type": "Feature",
            "properties": {"ward_name": "Ward B", "dist_name": "District 2", "reg_name": "R2"},
            "geometry": {"type": "Polygon", "coordinates": [[[2000,0],[4000,0],[4000,2000],[2000,2000],[2000,0]]]}
        },
        {
            "type": "Feature",
            "properties": {"ward_name": "Ward C", "dist_name": "District 3", "reg_name": "R3"},
            "geometry": {"type": "Polygon", "coordinates": [[[50000,0],[52000,0],[52000,2000],[50000,2000],[50000,0]]]}
        }
    ]
}"#;

const SURVEY: &str = "Village,Ward,District,ARR,REDD\n\
                      Kijiji,ward a,DISTRICT 1,Yes,\n\
                      Kijiji Kingine, Ward A ,District 1,,No\n\
                      Mbali,Ward Z,District 9,Yes,\n";

/// Same layout in WGS84 near Morogoro, about 2.2 km per ward side
const WARDS_LONLAT: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"ward_name": "Ward A", "dist_name": "District 1", "reg_name": "R1"},
            "geometry": {"type": "Polygon", "coordinates":
                [[[37.00,-7.02],[37.02,-7.02],[37.02,-7.00],[37.00,-7.00],[37.00,-7.02]]]}
        },
        {
            "type": "Feature",
            "properties": {"ward_name": "Ward B", "dist_name": "District 2", "reg_name": "R2"},
            "geometry": {"type": "Polygon", "coordinates":
                [[[37.02,-7.02],[37.04,-7.02],[37.04,-7.00],[37.02,-7.00],[37.02,-7.02]]]}
        },
        {
            "type": "Feature",
            "properties": {"ward_name": "Ward C", "dist_name": "District 3", "reg_name": "R3"},
            "geometry": {"type": "Polygon", "coordinates":
                [[[38.00,-7.02],[38.02,-7.02],[38.02,-7.00],[38.00,-7.00],[38.00,-7.02]]]}
        }
    ]
}"#;

fn setup() -> (tempfile::TempDir, Config) {
    setup_with(WARDS)
}

fn setup_with(ward_json: &str) -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let wards = dir.path().join("wards.geojson");
    let survey = dir.path().join("survey.csv");
    fs::write(&wards, ward_json).unwrap();
    fs::write(&survey, SURVEY).unwrap();

    let mut config = Config::default();
    config.paths.wards = wards;
    config.paths.survey = survey;
    config.paths.output_dir = dir.path().join("processed");
    (dir, config)
}

#[test]
fn test_two_ward_scenario() {
    let (_dir, config) = setup();
    let identity = CoordTransformer::identity();

    let wards = load_wards(&config.paths.wards, &config.boundaries).unwrap();
    let locations = load_program_locations(&config.paths.survey, &config.survey).unwrap();
    let preparation = prepare(&wards, &locations, &config, &identity).unwrap();

    assert!(preparation.adjacency.program_regions.contains("R1"));
    assert!(preparation.adjacency.adjacent_regions.contains("R2"));
    assert!(!preparation.adjacency.adjacent_regions.contains("R3"));
    assert_eq!(preparation.report.treatment.missing.len(), 1);

    // Ward A is both treatment and control in the survey; treatment wins
    assert_eq!(preparation.report.ambiguous().len(), 1);
    let ward_a = preparation
        .flagged
        .iter()
        .find(|w| w.ward.ward_name == "Ward A")
        .unwrap();
    assert!(ward_a.is_treatment);
    assert!(!ward_a.is_program_control);
    assert_eq!(ward_a.program_location_type, ProgramLocationType::Treatment);
    assert_eq!(preparation.flagged.len(), 2);

    let flagged_path = config.paths.flagged_wards();
    write_flagged_wards(&flagged_path, &preparation.flagged, &config.boundaries).unwrap();
    write_coverage_plan(&config.paths.coverage_plan(), &preparation.coverage_plan()).unwrap();

    // Fishnet from the file, the way the grid stage runs
    let flagged = load_flagged_wards(&flagged_path, &config.boundaries).unwrap();
    let cell_size = 1000.0;
    let cells = build_grid(&flagged, cell_size, &identity).unwrap();

    let treatment_cells = cells
        .iter()
        .filter(|c| {
            c.attributes.ward_name.as_deref() == Some("Ward A") && c.attributes.is_treatment_ward
        })
        .count();
    assert!(treatment_cells >= 4, "only {} treatment cells", treatment_cells);
    assert_eq!(cells.len(), 8);

    let metadata = GridMetadata::summarize(&cells, cell_size, 32737, 4326);
    let paths = write_grid(&config.paths.output_dir, &cells, &metadata, false).unwrap();
    assert!(paths.parquet.is_file());
    assert!(!paths.geojson.exists());

    let written: serde_json::Value =
        serde_json::from_reader(File::open(&paths.metadata).unwrap()).unwrap();
    assert_eq!(written["coverage"]["cells_in_treatment_wards"], 4);
    assert_eq!(written["cells_by_region"]["R2"]["total_cells"], 4);

    let plan: serde_json::Value =
        serde_json::from_reader(File::open(config.paths.coverage_plan()).unwrap()).unwrap();
    assert_eq!(plan["program_regions"][0], "R1");
    assert_eq!(plan["adjacent_regions"][0]["name"], "R2");
    assert_eq!(plan["adjacent_regions"][0]["directly_adjacent"], true);
    assert_eq!(
        plan["program_locations"]["missing_treatment_wards"][0],
        "WARD Z in DISTRICT 9"
    );
}

#[test]
fn test_utm_round_trip() {
    let (_dir, config) = setup_with(WARDS_LONLAT);
    let to_planar = CoordTransformer::new(4326, 32737).unwrap();

    let wards = load_wards(&config.paths.wards, &config.boundaries).unwrap();
    let locations = load_program_locations(&config.paths.survey, &config.survey).unwrap();
    let preparation = prepare(&wards, &locations, &config, &to_planar).unwrap();

    assert!(preparation.adjacency.program_regions.contains("R1"));
    assert!(preparation.adjacency.adjacent_regions.contains("R2"));
    assert!(!preparation.adjacency.adjacent_regions.contains("R3"));
    // 0.02 degrees is about 2.21 km at this latitude
    let area = preparation.coverage.program_area_km2;
    assert!(area > 4.6 && area < 5.2, "program area {} km2", area);

    // Flagged wards stay geographic
    let ward_a = preparation
        .flagged
        .iter()
        .find(|w| w.ward.ward_name == "Ward A")
        .unwrap();
    let bbox = ward_a.ward.bbox().unwrap();
    assert!((bbox.min_x - 37.0).abs() < 1e-9 && (bbox.max_y + 7.0).abs() < 1e-9);

    // 9 x 5 cells of 500 m cover both wards, 4 x 4 centroids fall in Ward A
    let cells = build_grid(&preparation.flagged, 500.0, &to_planar).unwrap();
    assert_eq!(cells.len(), 45);
    let treatment: Vec<_> = cells
        .iter()
        .filter(|c| c.attributes.is_treatment_ward)
        .collect();
    assert_eq!(treatment.len(), 16);
    for cell in &treatment {
        assert_eq!(cell.attributes.ward_name.as_deref(), Some("Ward A"));
    }

    for cell in &cells {
        for c in cell.geometry.exterior().coords() {
            assert!(c.x > 36.99 && c.x < 37.06, "lon {} of {}", c.x, cell.grid_id);
            assert!(c.y > -7.03 && c.y < -6.99, "lat {} of {}", c.y, cell.grid_id);
        }
    }
    let origin = cells[0].geometry.exterior().0[0];
    assert!((origin.x - 37.0).abs() < 1e-3, "origin lon {}", origin.x);
    assert!((origin.y + 7.02).abs() < 1e-3, "origin lat {}", origin.y);
}

#[test]
fn test_grid_is_reproducible() {
    let (_dir, config) = setup();
    let identity = CoordTransformer::identity();

    let wards = load_wards(&config.paths.wards, &config.boundaries).unwrap();
    let locations = load_program_locations(&config.paths.survey, &config.survey).unwrap();
    let preparation = prepare(&wards, &locations, &config, &identity).unwrap();

    let first = build_grid(&preparation.flagged, 500.0, &identity).unwrap();
    let second = build_grid(&preparation.flagged, 500.0, &identity).unwrap();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.grid_id, b.grid_id);
        assert_eq!(a.geometry, b.geometry);
        assert_eq!(a.attributes, b.attributes);
    }
}

#[test]
fn test_no_matches_is_fatal() {
    let (_dir, mut config) = setup();
    fs::write(&config.paths.survey, "Ward,District,ARR,REDD\nNowhere,None,Yes,\n").unwrap();
    config.paths.output_dir = config.paths.output_dir.join("never");

    let wards = load_wards(&config.paths.wards, &config.boundaries).unwrap();
    let locations = load_program_locations(&config.paths.survey, &config.survey).unwrap();
    let err = prepare(&wards, &locations, &config, &CoordTransformer::identity()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyRegionSet));
    assert!(!config.paths.output_dir.exists());
}
