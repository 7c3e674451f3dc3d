use proptest::prelude::*;
use skullstrip_core::filter::apply_mask;
use skullstrip_core::image::{ImageMetadata, VoxelGrid};
use skullstrip_core::spatial::{Direction, Point, Spacing};

fn metadata(ox: f64, spacing: f64) -> ImageMetadata<3> {
    ImageMetadata::new(Point::new([ox, 0.0, -ox]), Spacing::uniform(spacing), Direction::identity())
}

proptest! {
    #[test]
    fn test_masked_voxel_is_patient_or_zero(
        values in prop::collection::vec(any::<i16>(), 60),
        mask_values in prop::collection::vec(any::<u8>(), 60),
        ox in -50.0f64..50.0,
        spacing in 0.2f64..3.0,
    ) {
        let size = [3, 4, 5];
        let image = VoxelGrid::from_fn(size, metadata(ox, spacing), |[i, j, k]| values[i + 3 * j + 12 * k]);
        let mask = VoxelGrid::from_fn(size, metadata(ox, spacing), |[i, j, k]| mask_values[i + 3 * j + 12 * k]);

        let masked = apply_mask(&image, &mask).expect("identical geometry");
        prop_assert!(masked.same_geometry(&image));
        for ((index, &m), (&p, &out)) in mask
            .data()
            .indexed_iter()
            .zip(image.data().iter().zip(masked.data().iter()))
        {
            let expected = if m != 0 { p } else { 0 };
            prop_assert_eq!(out, expected, "voxel {:?}", index);
        }
    }

    #[test]
    fn test_mismatched_origin_is_rejected(shift in 0.01f64..10.0) {
        let image = VoxelGrid::from_elem([2, 2, 2], 1i16, metadata(0.0, 1.0));
        let mask = VoxelGrid::from_elem([2, 2, 2], 1u8, metadata(shift, 1.0));
        prop_assert!(apply_mask(&image, &mask).is_err());
    }
}
