use skullstrip_core::image::{ImageMetadata, VoxelGrid};
use skullstrip_core::spatial::{Direction, Point, Spacing};
use proptest::prelude::*;

const D: usize = 3;

fn make_rotation(angle_x: f64, angle_y: f64, angle_z: f64) -> Direction<D> {
    let rotation = nalgebra::Rotation3::from_euler_angles(angle_x, angle_y, angle_z);
    Direction(*rotation.matrix())
}

proptest! {
    #[test]
    fn test_coordinate_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let metadata = ImageMetadata::new(
            Point::<D>::new([ox, oy, oz]),
            Spacing::<D>::new([sx, sy, sz]),
            make_rotation(ax, ay, az),
        );
        let point = Point::<D>::new([px, py, pz]);

        let index = metadata
            .transform_physical_point_to_continuous_index(&point)
            .expect("rotations are invertible");
        let recovered = metadata.transform_continuous_index_to_physical_point(&index);

        prop_assert!((point[0] - recovered[0]).abs() < 1e-6, "X mismatch: {} vs {}", point[0], recovered[0]);
        prop_assert!((point[1] - recovered[1]).abs() < 1e-6, "Y mismatch: {} vs {}", point[1], recovered[1]);
        prop_assert!((point[2] - recovered[2]).abs() < 1e-6, "Z mismatch: {} vs {}", point[2], recovered[2]);
    }

    #[test]
    fn test_grid_and_metadata_agree(
        ox in -10.0f64..10.0,
        sx in 0.5f64..2.0,
        i in 0usize..4, j in 0usize..4, k in 0usize..4
    ) {
        let metadata = ImageMetadata::new(
            Point::<D>::new([ox, -ox, 2.0 * ox]),
            Spacing::<D>::new([sx, 1.0, sx * 2.0]),
            Direction::identity(),
        );
        let grid = VoxelGrid::from_elem([4, 4, 4], 0u8, metadata.clone());
        let index = Point::<D>::new([i as f64, j as f64, k as f64]);

        let from_grid = grid.index_to_physical_point(&index);
        let from_metadata = metadata.transform_continuous_index_to_physical_point(&index);
        prop_assert_eq!(from_grid, from_metadata);

        prop_assert!((from_grid[0] - (ox + i as f64 * sx)).abs() < 1e-9);
        prop_assert!((from_grid[2] - (2.0 * ox + k as f64 * sx * 2.0)).abs() < 1e-9);
    }
}

#[test]
fn test_rotated_axes_follow_direction_columns() {
    let direction = Direction::<D>(nalgebra::Matrix3::new(
        0.0, -1.0, 0.0,
        1.0, 0.0, 0.0,
        0.0, 0.0, 1.0,
    ));
    let metadata = ImageMetadata::new(Point::origin(), Spacing::uniform(2.0), direction);
    let point = metadata.transform_continuous_index_to_physical_point(&Point::new([1.0, 0.0, 0.0]));
    assert!((point[0] - 0.0).abs() < 1e-12);
    assert!((point[1] - 2.0).abs() < 1e-12);
}
