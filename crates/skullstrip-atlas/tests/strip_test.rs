use std::sync::Arc;

use skullstrip_atlas::{
    AtlasStripper, BrainStripper, HistoryCallback, MetricKind, ProgressTracker, RefinementConfig, RegistrationConfig,
    StripConfig, StripError,
};
use skullstrip_core::image::{ImageMetadata, Voxel, VoxelGrid};
use skullstrip_core::spatial::{Direction, Point, Spacing};

const SIZE: usize = 32;

/// Binary ellipsoid with physical centre `center` and semi-axes `radii` (mm).
fn ellipsoid<T: Voxel>(
    metadata: &ImageMetadata<3>,
    center: [f64; 3],
    radii: [f64; 3],
    inside: T,
    outside: T,
) -> VoxelGrid<T> {
    VoxelGrid::from_fn([SIZE; 3], metadata.clone(), |[i, j, k]| {
        let p = metadata.transform_continuous_index_to_physical_point(&Point::new([i as f64, j as f64, k as f64]));
        let d: f64 = (0..3).map(|a| ((p[a] - center[a]) / radii[a]).powi(2)).sum();
        if d <= 1.0 {
            inside
        } else {
            outside
        }
    })
}

fn unit_grid(origin: [f64; 3]) -> ImageMetadata<3> {
    ImageMetadata::new(Point::new(origin), Spacing::uniform(1.0), Direction::identity())
}

fn dice(a: &VoxelGrid<u8>, b: &VoxelGrid<u8>) -> f64 {
    let both = a.data().iter().zip(b.data()).filter(|(x, y)| **x != 0 && **y != 0).count();
    2.0 * both as f64 / (a.count_nonzero() + b.count_nonzero()) as f64
}

fn config(metric: MetricKind) -> StripConfig {
    StripConfig::new().with_registration(
        RegistrationConfig::new()
            .with_shrink_factors(vec![2, 1])
            .with_iterations(vec![30])
            .with_sampling_stride(2)
            .with_metric(metric),
    )
}

#[test]
fn test_strip_translated_atlas() {
    let patient_grid = unit_grid([0.0; 3]);
    let patient = ellipsoid(&patient_grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 800i16, 30);
    let truth = ellipsoid(&patient_grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 1u8, 0);

    let atlas = ellipsoid(&patient_grid, [18.0, 14.0, 16.0], [9.0, 8.0, 7.0], 500i16, 10);
    let label = ellipsoid(&patient_grid, [18.0, 14.0, 16.0], [9.0, 8.0, 7.0], 1u8, 0);

    let mask = AtlasStripper::new(config(MetricKind::MeanSquares))
        .strip(&patient, &atlas, &label, &ProgressTracker::new())
        .unwrap();

    assert!(mask.same_geometry(&patient));
    let score = dice(&mask, &truth);
    println!("Dice: {:.4}", score);
    assert!(score > 0.9, "Dice too low: {}", score);
}

#[test]
fn test_strip_atlas_on_offset_grid() {
    let patient_grid = unit_grid([0.0; 3]);
    let patient = ellipsoid(&patient_grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 1200i16, 100);
    let truth = ellipsoid(&patient_grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 1u8, 0);

    // Atlas stored on a grid shifted in physical space; the brain sits in the same place.
    let atlas_grid = unit_grid([-2.5, 1.0, 0.0]);
    let atlas = ellipsoid(&atlas_grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 300i16, 0);
    let label = ellipsoid(&atlas_grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 1u8, 0);

    let result = AtlasStripper::new(config(MetricKind::Correlation))
        .run(&patient, &atlas, &label, &ProgressTracker::new())
        .unwrap();

    let score = dice(&result.mask, &truth);
    assert!(score > 0.9, "Dice too low: {}", score);
    assert_eq!(result.registration.levels.len(), 2);
}

#[test]
fn test_oversized_atlas_label_is_trimmed_to_patient() {
    let grid = unit_grid([0.0; 3]);
    let patient = ellipsoid(&grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 900i16, 40);
    let truth = ellipsoid(&grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 1u8, 0);
    let atlas = patient.clone();
    // Label one voxel larger than the brain in every direction.
    let label = ellipsoid(&grid, [16.0, 16.0, 16.0], [10.0, 9.0, 8.0], 1u8, 0);

    let refined = AtlasStripper::new(config(MetricKind::MeanSquares))
        .strip(&patient, &atlas, &label, &ProgressTracker::new())
        .unwrap();
    let raw = AtlasStripper::new(config(MetricKind::MeanSquares).with_refinement(RefinementConfig::disabled()))
        .strip(&patient, &atlas, &label, &ProgressTracker::new())
        .unwrap();

    assert!(dice(&refined, &truth) > dice(&raw, &truth));
    assert!(dice(&refined, &truth) > 0.95);
}

#[test]
fn test_strip_is_deterministic() {
    let grid = unit_grid([0.0; 3]);
    let patient = ellipsoid(&grid, [15.0, 16.0, 17.0], [9.0, 8.0, 7.0], 700i16, 20);
    let atlas = ellipsoid(&grid, [17.0, 15.0, 16.0], [8.5, 8.0, 7.5], 400i16, 0);
    let label = ellipsoid(&grid, [17.0, 15.0, 16.0], [8.5, 8.0, 7.5], 1u8, 0);

    let stripper = AtlasStripper::new(config(MetricKind::MeanSquares));
    let first = stripper.run(&patient, &atlas, &label, &ProgressTracker::new()).unwrap();
    let second = stripper.run(&patient, &atlas, &label, &ProgressTracker::new()).unwrap();

    assert_eq!(first.mask, second.mask);
    assert_eq!(first.registration.parameters, second.registration.parameters);
}

#[test]
fn test_label_outside_patient_gives_empty_mask() {
    let grid = unit_grid([0.0; 3]);
    let patient = ellipsoid(&grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 900i16, 40);
    // The label marks only a background slab at the grid border.
    let atlas = patient.clone();
    let label = VoxelGrid::from_fn([SIZE; 3], grid.clone(), |[i, _, _]| u8::from(i == 0));

    let err = AtlasStripper::new(config(MetricKind::MeanSquares))
        .strip(&patient, &atlas, &label, &ProgressTracker::new())
        .unwrap_err();
    assert_eq!(err, StripError::EmptyMask);
}

#[test]
fn test_progress_is_reported() {
    let grid = unit_grid([0.0; 3]);
    let patient = ellipsoid(&grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 900i16, 40);
    let label = ellipsoid(&grid, [16.0, 16.0, 16.0], [9.0, 8.0, 7.0], 1u8, 0);
    let history = HistoryCallback::new();
    let tracker = ProgressTracker::new().with_callback(Arc::new(history.clone()));

    AtlasStripper::new(config(MetricKind::MeanSquares))
        .strip(&patient, &patient, &label, &tracker)
        .unwrap();

    let updates = history.get_history();
    assert!(!updates.is_empty());
    assert!(updates.windows(2).all(|w| w[0].fraction <= w[1].fraction));
    assert!(history.get_stages().iter().any(|s| s == "Label propagation"));
}
