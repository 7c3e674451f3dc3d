//! The skull stripping pipeline.
//!
//! A run probes the patient header, dispatches on the stored component type
//! and executes the typed pipeline: load all three inputs, strip, mask and
//! write the two outputs. Every step finishes before the next one starts and
//! the first failure ends the run.

use std::fmt;
use std::path::Path;

use skullstrip_atlas::{BrainStripper, ProgressTracker};
use skullstrip_core::filter::apply_mask;
use skullstrip_core::image::{ComponentType, PixelShape, VoxelGrid};
use skullstrip_io::{ImageInfo, VolumeElement};
use tracing::{debug, info};

use crate::codec::VolumeCodec;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Progress of one run through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Probed,
    Loaded,
    Stripped,
    Masked,
    Written,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn successor(self) -> Self {
        match self {
            Self::Start => Self::Probed,
            Self::Probed => Self::Loaded,
            Self::Loaded => Self::Stripped,
            Self::Stripped => Self::Masked,
            Self::Masked => Self::Written,
            Self::Written => Self::Done,
            Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Probed => "probed",
            Self::Loaded => "loaded",
            Self::Stripped => "stripped",
            Self::Masked => "masked",
            Self::Written => "written",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State machine of a single run; records every state it passes through.
#[derive(Debug, Clone)]
pub struct RunState {
    history: Vec<PipelineState>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            history: vec![PipelineState::Start],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.history.last().copied().unwrap_or(PipelineState::Start)
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to the next state in the run order.
    pub fn advance(&mut self) -> PipelineState {
        let from = self.current();
        let to = from.successor();
        if to != from {
            debug!("Pipeline state {} -> {}", from, to);
            self.history.push(to);
        }
        to
    }

    /// Enter the absorbing failure state.
    pub fn fail(&mut self) {
        let from = self.current();
        if !from.is_terminal() {
            debug!("Pipeline state {} -> {}", from, PipelineState::Failed);
            self.history.push(PipelineState::Failed);
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub component: ComponentType,
    pub brain_voxels: usize,
    pub total_voxels: usize,
    pub states: Vec<PipelineState>,
}

/// Run the pipeline described by `config`.
pub fn run<C, S>(config: &PipelineConfig, codec: &C, stripper: &S, tracker: &ProgressTracker) -> Result<RunSummary>
where
    C: VolumeCodec,
    S: BrainStripper,
{
    let mut state = RunState::new();
    let result = run_stages(config, codec, stripper, tracker, &mut state);
    match &result {
        Ok(summary) => info!(
            "Brain mask written to {} ({} of {} voxels)",
            config.patient_mask.display(),
            summary.brain_voxels,
            summary.total_voxels
        ),
        Err(err) => {
            state.fail();
            debug!("Run failed during {} after states {:?}", err.stage(), state.history());
        }
    }
    result
}

fn run_stages<C, S>(
    config: &PipelineConfig,
    codec: &C,
    stripper: &S,
    tracker: &ProgressTracker,
    state: &mut RunState,
) -> Result<RunSummary>
where
    C: VolumeCodec,
    S: BrainStripper,
{
    let info = probe(codec, &config.patient_volume)?;
    state.advance();
    dispatch(&info, config, codec, stripper, tracker, state)
}

fn probe<C: VolumeCodec>(codec: &C, path: &Path) -> Result<ImageInfo> {
    let info = codec.probe(path).map_err(|source| PipelineError::Probe {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Patient volume {}: {} {} with size {:?}",
        path.display(),
        info.pixel,
        info.component,
        info.size
    );
    Ok(info)
}

/// Select the typed pipeline for the patient's stored pixel type.
///
/// Only scalar `short` volumes run; every other recognized type is refused
/// before any volume is decoded.
pub fn dispatch<C, S>(
    info: &ImageInfo,
    config: &PipelineConfig,
    codec: &C,
    stripper: &S,
    tracker: &ProgressTracker,
    state: &mut RunState,
) -> Result<RunSummary>
where
    C: VolumeCodec,
    S: BrainStripper,
{
    use ComponentType::*;

    match (info.component, info.pixel) {
        (Int16, PixelShape::Scalar) => run_typed::<i16, _, _>(config, codec, stripper, tracker, state),
        (Int16, PixelShape::Vector(_))
        | (UInt8 | Int8 | UInt16 | UInt32 | Int32 | UInt64 | Int64 | Float32 | Float64, _) => {
            Err(PipelineError::UnsupportedComponentType {
                component: info.component,
                pixel: info.pixel,
            })
        }
    }
}

/// The pipeline for patient volumes stored as `T`.
pub fn run_typed<T, C, S>(
    config: &PipelineConfig,
    codec: &C,
    stripper: &S,
    tracker: &ProgressTracker,
    state: &mut RunState,
) -> Result<RunSummary>
where
    T: VolumeElement,
    C: VolumeCodec,
    S: BrainStripper,
{
    let patient = load::<T, C>(codec, "patient", &config.patient_volume)?;
    let atlas = load::<i16, C>(codec, "atlas", &config.atlas_volume)?;
    let label = load::<u8, C>(codec, "atlas mask", &config.atlas_mask)?;
    state.advance();

    let mask = stripper.strip(&patient, &atlas, &label, tracker)?;
    state.advance();

    let masked = apply_mask(&patient, &mask)?;
    state.advance();

    save(codec, &mask, "brain mask", &config.patient_mask)?;
    save(codec, &masked, "masked patient", &config.patient_output)?;
    state.advance();
    state.advance();

    Ok(RunSummary {
        component: T::COMPONENT,
        brain_voxels: mask.count_nonzero(),
        total_voxels: mask.len(),
        states: state.history().to_vec(),
    })
}

fn load<T: VolumeElement, C: VolumeCodec>(codec: &C, role: &'static str, path: &Path) -> Result<VoxelGrid<T>> {
    let volume = codec.load::<T>(path).map_err(|source| PipelineError::Load {
        role,
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded {} volume {} with size {:?}", role, path.display(), volume.shape());
    Ok(volume)
}

fn save<T: VolumeElement, C: VolumeCodec>(
    codec: &C,
    grid: &VoxelGrid<T>,
    role: &'static str,
    path: &Path,
) -> Result<()> {
    codec.save(grid, path).map_err(|source| PipelineError::Write {
        role,
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {} volume {}", role, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use anyhow::anyhow;
    use skullstrip_atlas::StripError;
    use skullstrip_core::image::{ImageMetadata, Voxel};
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Codec serving fixed in-memory volumes and recording every access.
    struct MemoryCodec {
        info: ImageInfo,
        fail_load: Option<&'static str>,
        fail_save: Option<&'static str>,
        saved: RefCell<Vec<PathBuf>>,
        loaded: RefCell<Vec<PathBuf>>,
    }

    impl MemoryCodec {
        fn new(component: ComponentType, pixel: PixelShape) -> Self {
            Self {
                info: ImageInfo {
                    component,
                    pixel,
                    dimensions: 3,
                    size: vec![4, 4, 4],
                },
                fail_load: None,
                fail_save: None,
                saved: RefCell::new(Vec::new()),
                loaded: RefCell::new(Vec::new()),
            }
        }
    }

    impl VolumeCodec for MemoryCodec {
        fn probe(&self, _path: &Path) -> anyhow::Result<ImageInfo> {
            Ok(self.info.clone())
        }

        fn load<T: VolumeElement>(&self, path: &Path) -> anyhow::Result<VoxelGrid<T>> {
            self.loaded.borrow_mut().push(path.to_path_buf());
            if self.fail_load.is_some_and(|name| path.ends_with(name)) {
                return Err(anyhow!("corrupt payload"));
            }
            Ok(VoxelGrid::from_fn([4, 4, 4], ImageMetadata::default(), |[i, j, k]| {
                T::from_f64((i + j + k) as f64)
            }))
        }

        fn save<T: VolumeElement>(&self, _grid: &VoxelGrid<T>, path: &Path) -> anyhow::Result<()> {
            if self.fail_save.is_some_and(|name| path.ends_with(name)) {
                return Err(anyhow!("disk full"));
            }
            self.saved.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    /// Marks voxels with an even index sum as brain.
    struct Checkerboard;

    impl BrainStripper for Checkerboard {
        fn strip<T: Voxel>(
            &self,
            patient: &VoxelGrid<T>,
            _atlas: &VoxelGrid<i16>,
            _label: &VoxelGrid<u8>,
            _tracker: &ProgressTracker,
        ) -> skullstrip_atlas::Result<VoxelGrid<u8>> {
            Ok(VoxelGrid::from_fn(patient.shape(), patient.metadata().clone(), |[i, j, k]| {
                u8::from((i + j + k) % 2 == 0)
            }))
        }
    }

    /// Returns a mask on the wrong grid.
    struct Misaligned;

    impl BrainStripper for Misaligned {
        fn strip<T: Voxel>(
            &self,
            _patient: &VoxelGrid<T>,
            _atlas: &VoxelGrid<i16>,
            _label: &VoxelGrid<u8>,
            _tracker: &ProgressTracker,
        ) -> skullstrip_atlas::Result<VoxelGrid<u8>> {
            Ok(VoxelGrid::from_elem([2, 2, 2], 1u8, ImageMetadata::default()))
        }
    }

    struct Failing;

    impl BrainStripper for Failing {
        fn strip<T: Voxel>(
            &self,
            _patient: &VoxelGrid<T>,
            _atlas: &VoxelGrid<i16>,
            _label: &VoxelGrid<u8>,
            _tracker: &ProgressTracker,
        ) -> skullstrip_atlas::Result<VoxelGrid<u8>> {
            Err(StripError::EmptyMask)
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new("patient.nii", "atlas.mha", "label.mha", "mask.nii", "out.nii")
    }

    #[test]
    fn test_state_machine_order() {
        let mut state = RunState::new();
        for _ in 0..10 {
            state.advance();
        }
        state.fail();
        assert_eq!(
            state.history(),
            &[
                PipelineState::Start,
                PipelineState::Probed,
                PipelineState::Loaded,
                PipelineState::Stripped,
                PipelineState::Masked,
                PipelineState::Written,
                PipelineState::Done,
            ]
        );

        let mut failed = RunState::new();
        failed.advance();
        failed.fail();
        failed.advance();
        assert_eq!(failed.current(), PipelineState::Failed);
        assert_eq!(failed.history().len(), 3);
    }

    #[test]
    fn test_short_scalar_runs_to_done() {
        let codec = MemoryCodec::new(ComponentType::Int16, PixelShape::Scalar);
        let summary = run(&config(), &codec, &Checkerboard, &ProgressTracker::new()).unwrap();
        assert_eq!(summary.component, ComponentType::Int16);
        assert_eq!(summary.brain_voxels, 32);
        assert_eq!(summary.total_voxels, 64);
        assert_eq!(summary.states.last(), Some(&PipelineState::Done));
        assert_eq!(summary.states.len(), 7);
        assert_eq!(
            *codec.saved.borrow(),
            vec![PathBuf::from("mask.nii"), PathBuf::from("out.nii")]
        );
    }

    #[test]
    fn test_every_other_type_is_unsupported() {
        let shapes = [PixelShape::Scalar, PixelShape::Vector(3)];
        for component in ComponentType::ALL {
            for pixel in shapes {
                if component == ComponentType::Int16 && pixel == PixelShape::Scalar {
                    continue;
                }
                let codec = MemoryCodec::new(component, pixel);
                let err = run(&config(), &codec, &Checkerboard, &ProgressTracker::new()).unwrap_err();
                assert!(matches!(err, PipelineError::UnsupportedComponentType { .. }), "{:?}", err);
                assert!(codec.loaded.borrow().is_empty());
                assert!(codec.saved.borrow().is_empty());
            }
        }
    }

    #[test]
    fn test_load_failure_stops_before_writing() {
        let mut codec = MemoryCodec::new(ComponentType::Int16, PixelShape::Scalar);
        codec.fail_load = Some("atlas.mha");
        let err = run(&config(), &codec, &Checkerboard, &ProgressTracker::new()).unwrap_err();
        assert_eq!(err.stage(), Stage::Load);
        assert!(err.chain().ends_with("corrupt payload"));
        assert!(codec.saved.borrow().is_empty());
    }

    #[test]
    fn test_strip_and_mask_failures_write_nothing() {
        let codec = MemoryCodec::new(ComponentType::Int16, PixelShape::Scalar);
        let err = run(&config(), &codec, &Failing, &ProgressTracker::new()).unwrap_err();
        assert_eq!(err.stage(), Stage::Strip);

        let err = run(&config(), &codec, &Misaligned, &ProgressTracker::new()).unwrap_err();
        assert_eq!(err.stage(), Stage::Mask);
        assert!(matches!(err, PipelineError::MaskGeometryMismatch(_)));
        assert!(codec.saved.borrow().is_empty());
    }

    #[test]
    fn test_mask_is_kept_when_volume_write_fails() {
        let mut codec = MemoryCodec::new(ComponentType::Int16, PixelShape::Scalar);
        codec.fail_save = Some("out.nii");
        let err = run(&config(), &codec, &Checkerboard, &ProgressTracker::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Write { role: "masked patient", .. }));
        assert_eq!(*codec.saved.borrow(), vec![PathBuf::from("mask.nii")]);
    }
}
