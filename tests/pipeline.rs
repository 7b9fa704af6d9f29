//! Integration tests for the full inference pipeline.
//!
//! A synthetic four-way junction centered at (47.0, 19.0): vehicles arrive
//! from the south and turn east or west, or arrive from the west and turn
//! north. Every vehicle of a movement follows the same trace shifted by a
//! sub-meter offset.

use map_creator::{
    create_algorithm, AlgorithmConfig, Coordinate, DistanceMeasure, Ingress, Linkage, Map,
    MapSnapshot, Path, Point, Preprocessor, Processor, Representative, DEFAULT_MAX_LINKAGE,
};

const LINKAGES: [Linkage; 3] = [Linkage::Single, Linkage::Complete, Linkage::Average];

const REFERENCE: (f64, f64) = (47.0, 19.0);

const SOUTH_TO_EAST: [(f64, f64); 5] = [
    (46.998, 19.0),
    (46.999, 19.0),
    (47.0, 19.0),
    (47.0, 19.0015),
    (47.0004, 19.003),
];

const SOUTH_TO_WEST: [(f64, f64); 5] = [
    (46.998, 19.0),
    (46.999, 19.0),
    (47.0, 19.0),
    (47.0, 18.9985),
    (47.0004, 18.997),
];

const WEST_TO_NORTH: [(f64, f64); 5] = [
    (47.0, 18.997),
    (47.0, 18.9985),
    (47.0, 19.0),
    (47.001, 19.0),
    (47.002, 19.0003),
];

/// Stops short of the junction, so every split leaves an empty egress.
const SOUTHWEST_APPROACH: [(f64, f64); 3] = [
    (46.998, 18.998),
    (46.999, 18.999),
    (46.9995, 18.9995),
];

fn reference() -> Coordinate {
    Coordinate::new(REFERENCE.0, REFERENCE.1)
}

fn trace(id: &str, coords: &[(f64, f64)], offset: f64) -> Path {
    Path::from_points(coords.iter().enumerate().map(|(i, &(lat, lng))| {
        Point::at(id, Coordinate::new(lat, lng + offset), i as i64 * 1_000)
    }))
}

fn junction_traffic() -> Vec<Path> {
    vec![
        trace("se-0", &SOUTH_TO_EAST, 0.0),
        trace("se-1", &SOUTH_TO_EAST, 0.00001),
        trace("se-2", &SOUTH_TO_EAST, 0.00002),
        trace("sw-0", &SOUTH_TO_WEST, 0.00001),
        trace("sw-1", &SOUTH_TO_WEST, 0.0),
        trace("wn-0", &WEST_TO_NORTH, 0.0),
    ]
}

fn processor(config: AlgorithmConfig) -> Processor {
    let algorithm = create_algorithm(&config, reference(), DistanceMeasure::Dtw).unwrap();
    Processor::new(
        algorithm,
        Preprocessor::new(reference(), 0.5),
        DistanceMeasure::Dtw,
    )
}

fn first_position(path: &Path) -> Coordinate {
    path.points()[0].position
}

fn last_position(path: &Path) -> Coordinate {
    path.points().last().unwrap().position
}

fn from_south(ingress: &Ingress) -> bool {
    first_position(&ingress.path).latitude < 46.999
}

/// Check the expected junction structure regardless of ingress order.
fn assert_junction(map: &Map) {
    assert_eq!(map.reference_point, reference());
    assert_eq!(map.ingresses.len(), 2);

    let south = map.ingresses.iter().find(|i| from_south(i)).unwrap();
    let west = map.ingresses.iter().find(|i| !from_south(i)).unwrap();

    // Approaches end at the junction
    assert!(last_position(&south.path).distance(&reference()) < 0.01);
    assert!(last_position(&west.path).distance(&reference()) < 0.01);
    assert!(first_position(&west.path).longitude < 18.998);

    assert_eq!(south.egresses.len(), 2);
    let mut exits: Vec<f64> = south
        .egresses
        .iter()
        .map(|e| last_position(&e.path).longitude)
        .collect();
    exits.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert!(exits[0] < 18.998, "west exit, got {:?}", exits);
    assert!(exits[1] > 19.002, "east exit, got {:?}", exits);

    assert_eq!(west.egresses.len(), 1);
    assert!(last_position(&west.egresses[0].path).latitude > 47.001);
}

#[test]
fn test_dbscan_infers_junction() {
    let processor = processor(AlgorithmConfig::Dbscan {
        eps: 0.05,
        min_pts: 1,
        representative: Representative::Longest,
    });

    let map = processor.process(&junction_traffic());

    assert_junction(&map);
    // Discovery order follows input order
    assert!(from_south(&map.ingresses[0]));
    assert!(last_position(&map.ingresses[0].egresses[0].path).longitude > 19.002);
}

#[test]
fn test_hierarchical_infers_junction_for_every_linkage() {
    for linkage in LINKAGES {
        let processor = processor(AlgorithmConfig::Hierarchical {
            linkage,
            max_linkage: DEFAULT_MAX_LINKAGE,
        });
        assert_junction(&processor.process(&junction_traffic()));
    }
}

#[test]
fn test_hierarchical_merges_one_movement_driven_twice() {
    let traffic = vec![
        trace("se-0", &SOUTH_TO_EAST, 0.0),
        trace("se-1", &SOUTH_TO_EAST, 0.00001),
    ];

    for linkage in LINKAGES {
        let processor = processor(AlgorithmConfig::Hierarchical {
            linkage,
            max_linkage: DEFAULT_MAX_LINKAGE,
        });

        let mut aggregate = None;
        for _ in 0..3 {
            let map = processor.process(&traffic);
            assert_eq!(map.ingresses.len(), 1, "linkage {}", linkage);
            assert_eq!(map.egress_count(), 1, "linkage {}", linkage);
            aggregate = Some(processor.postprocess(aggregate, map));
        }

        let aggregate = aggregate.unwrap();
        assert_eq!(aggregate.ingresses.len(), 1);
        assert_eq!(aggregate.egress_count(), 1);
    }
}

#[test]
fn test_dense_cluster_requirement_drops_lone_movement() {
    let processor = processor(AlgorithmConfig::Dbscan {
        eps: 0.05,
        min_pts: 2,
        representative: Representative::Longest,
    });

    let map = processor.process(&junction_traffic());

    // The single west approach is noise
    assert_eq!(map.ingresses.len(), 1);
    assert!(from_south(&map.ingresses[0]));
    assert_eq!(map.ingresses[0].egresses.len(), 2);
}

#[test]
fn test_repeated_batches_grow_aggregate_only_with_new_structure() {
    let processor = processor(AlgorithmConfig::Dbscan {
        eps: 0.05,
        min_pts: 1,
        representative: Representative::Longest,
    });

    let south_only: Vec<Path> = junction_traffic().into_iter().take(5).collect();
    let first = processor.process(&south_only);
    assert_eq!(first.ingresses.len(), 1);

    let aggregate = processor.postprocess(None, first);
    let aggregate = processor.postprocess(Some(aggregate), processor.process(&south_only));
    assert_eq!(aggregate.ingresses.len(), 1);
    assert_eq!(aggregate.egress_count(), 2);

    let aggregate = processor.postprocess(Some(aggregate), processor.process(&junction_traffic()));
    assert_junction(&aggregate);
}

#[test]
fn test_snapshot_of_inferred_map() {
    let processor = processor(AlgorithmConfig::Dbscan {
        eps: 0.05,
        min_pts: 1,
        representative: Representative::Longest,
    });
    let map = processor.process(&junction_traffic());

    let snapshot = MapSnapshot::from_map(&map, 0.5);
    let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();

    assert_eq!(value["ref_point"]["latitude"], 47.0);
    assert_eq!(value["range"], 0.5);
    assert_eq!(value["ingresses"].as_array().unwrap().len(), 2);
    assert_eq!(
        value["ingresses"][0]["egresses"].as_array().unwrap().len(),
        2
    );
    assert!(value["ingresses"][0]["points"][0]["longitude"].is_number());
    assert!(value["ingresses"][0]["points"][0].get("heading").is_none());
}

#[test]
fn test_approach_only_traffic_does_not_grow_aggregate() {
    let traffic = vec![
        trace("a-0", &SOUTHWEST_APPROACH, 0.0),
        trace("a-1", &SOUTHWEST_APPROACH, 0.00001),
    ];
    let configs = [
        AlgorithmConfig::Dbscan {
            eps: 0.05,
            min_pts: 1,
            representative: Representative::Longest,
        },
        AlgorithmConfig::Hierarchical {
            linkage: Linkage::Average,
            max_linkage: DEFAULT_MAX_LINKAGE,
        },
        AlgorithmConfig::Greedy {
            diff_dist: 0.1,
            diff_head: 2.0,
            num_points: None,
        },
    ];

    for config in configs {
        let processor = processor(config.clone());
        let first = processor.process(&traffic);
        assert_eq!(first.ingresses.len(), 1, "{:?}", config);
        let egresses = first.egress_count();

        let mut aggregate = processor.postprocess(None, first);
        for _ in 0..5 {
            aggregate = processor.postprocess(Some(aggregate), processor.process(&traffic));
        }

        assert_eq!(aggregate.ingresses.len(), 1, "{:?}", config);
        assert_eq!(aggregate.egress_count(), egresses, "{:?}", config);
        assert!(aggregate.ingresses[0]
            .egresses
            .iter()
            .all(|e| e.path.is_empty()));
    }
}
