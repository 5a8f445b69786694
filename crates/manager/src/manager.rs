//! The top-level facade: owns one backend and serves tensor views over its
//! export buffers.

use crate::backend::Backend;
use crate::error::ManagerError;
use crate::tensor::{Device, Tensor, TensorError, TensorMut};
use hideseek_assets::{AssetCatalog, LoadedCatalog, StorageKind};
use hideseek_common::export::resolve_image;
use hideseek_common::{CameraMode, Config, ExecMode, ExportSlot, ImageKind};
use hideseek_kernel::{EpisodeCounter, WorldInitTable};
use std::sync::Arc;
use tracing::{info, info_span, trace};

/// Batched hide & seek simulator.
///
/// Every view borrows the manager, so none can survive a `step()` or the
/// manager itself.
#[derive(Debug)]
pub struct Manager {
    // Declared first: the backend and its buffers go before the shared
    // tables they were built from.
    backend: Backend,
    config: Config,
    catalog: LoadedCatalog,
    episodes: Arc<EpisodeCounter>,
    steps: u64,
}

impl Manager {
    /// Validate `config`, load the catalog and build every world.
    pub fn new(config: Config) -> Result<Self, ManagerError> {
        let _span = info_span!(
            "manager_new",
            mode = ?config.exec_mode,
            worlds = config.num_worlds
        )
        .entered();
        config.validate()?;
        if config.exec_mode == ExecMode::Accelerator && !cfg!(feature = "accelerator") {
            return Err(ManagerError::AcceleratorUnavailable);
        }

        let storage = match config.exec_mode {
            ExecMode::HostParallel => StorageKind::Host,
            ExecMode::Accelerator => StorageKind::Accelerator,
        };
        let catalog = AssetCatalog::load(&config.data_dir, storage)?;
        let episodes = Arc::new(EpisodeCounter::new());
        let inits = WorldInitTable::build(
            config.num_worlds(),
            config.min_entities_per_world,
            config.max_entities_per_world,
            &episodes,
            &catalog.objects,
        );
        let render_assets = config
            .enable_render
            .then(|| Arc::clone(&catalog.render));
        let backend = Backend::construct(&config, inits, &catalog.objects, render_assets)?;

        info!(
            device = ?backend.device(),
            render = config.enable_render,
            "manager constructed"
        );
        Ok(Self {
            backend,
            config,
            catalog,
            episodes,
            steps: 0,
        })
    }

    /// Advance every world one tick. Blocks until all of them are done.
    pub fn step(&mut self) {
        let _span = tracing::trace_span!("step", step = self.steps).entered();
        self.backend.step();
        self.steps += 1;
        trace!(step = self.steps, "step complete");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn num_worlds(&self) -> usize {
        self.config.num_worlds()
    }

    pub fn device(&self) -> Device {
        self.backend.device()
    }

    pub fn camera_mode(&self) -> CameraMode {
        self.backend.camera_mode()
    }

    pub fn catalog(&self) -> &LoadedCatalog {
        &self.catalog
    }

    /// Steps taken since construction.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Episodes started so far across all worlds. Reads the device counter
    /// in accelerator mode.
    pub fn episodes_started(&self) -> Result<u32, ManagerError> {
        self.backend.episodes_started(&self.episodes)
    }

    fn export(&self, slot: ExportSlot) -> Tensor<'_> {
        Tensor::new(
            self.backend.buffer(slot),
            slot.element_type(),
            slot.shape(self.num_worlds()),
        )
    }

    fn export_mut(&mut self, slot: ExportSlot) -> TensorMut<'_> {
        let shape = slot.shape(self.num_worlds());
        TensorMut::new(self.backend.buffer_mut(slot), slot.element_type(), shape)
    }

    /// View of a raw registry slot.
    pub fn export_tensor(&self, slot: usize) -> Result<Tensor<'_>, TensorError> {
        let (element_type, shape) = hideseek_common::export::resolve(slot, self.num_worlds())
            .ok_or(TensorError::UnknownSlot(slot))?;
        let handle = self
            .backend
            .buffer_for_slot(slot)
            .ok_or(TensorError::UnknownSlot(slot))?;
        Ok(Tensor::new(handle, element_type, shape))
    }

    /// `[W, 3]` int32: `[should_reset, hiders, seekers]`.
    pub fn reset(&self) -> Tensor<'_> {
        self.export(ExportSlot::Reset)
    }

    pub fn done(&self) -> Tensor<'_> {
        self.export(ExportSlot::Done)
    }

    pub fn prep_counter(&self) -> Tensor<'_> {
        self.export(ExportSlot::PrepCounter)
    }

    /// `[W, A, 5]` int32: `[move_x, move_y, rotate, grab, lock]`.
    pub fn action(&self) -> Tensor<'_> {
        self.export(ExportSlot::Action)
    }

    pub fn reward(&self) -> Tensor<'_> {
        self.export(ExportSlot::Reward)
    }

    pub fn agent_type(&self) -> Tensor<'_> {
        self.export(ExportSlot::AgentType)
    }

    pub fn agent_mask(&self) -> Tensor<'_> {
        self.export(ExportSlot::AgentMask)
    }

    pub fn agent_data(&self) -> Tensor<'_> {
        self.export(ExportSlot::AgentData)
    }

    pub fn box_data(&self) -> Tensor<'_> {
        self.export(ExportSlot::BoxData)
    }

    pub fn ramp_data(&self) -> Tensor<'_> {
        self.export(ExportSlot::RampData)
    }

    pub fn visible_agents_mask(&self) -> Tensor<'_> {
        self.export(ExportSlot::VisibleAgentsMask)
    }

    pub fn visible_boxes_mask(&self) -> Tensor<'_> {
        self.export(ExportSlot::VisibleBoxesMask)
    }

    pub fn visible_ramps_mask(&self) -> Tensor<'_> {
        self.export(ExportSlot::VisibleRampsMask)
    }

    pub fn global_positions(&self) -> Tensor<'_> {
        self.export(ExportSlot::GlobalPositions)
    }

    pub fn lidar(&self) -> Tensor<'_> {
        self.export(ExportSlot::Lidar)
    }

    fn image(&self, kind: ImageKind) -> Result<Tensor<'_>, TensorError> {
        let handle = match kind {
            ImageKind::Depth => self.backend.depth_buffer(),
            ImageKind::Rgb => self.backend.color_buffer(),
        }
        .ok_or(TensorError::RenderingDisabled)?;
        let (element_type, shape) = resolve_image(
            kind,
            self.num_worlds(),
            self.config.render_width as usize,
            self.config.render_height as usize,
        );
        Ok(Tensor::new(handle, element_type, shape))
    }

    /// `[W, A, H, Wd, 1]` float32 distances. Errors unless rendering is on.
    pub fn depth(&self) -> Result<Tensor<'_>, TensorError> {
        self.image(ImageKind::Depth)
    }

    /// `[W, A, H, Wd, 4]` uint8 RGBA. Errors unless rendering is on.
    pub fn rgb(&self) -> Result<Tensor<'_>, TensorError> {
        self.image(ImageKind::Rgb)
    }

    /// Writable `reset` rows, read by the next `step()`.
    pub fn reset_tensor_mut(&mut self) -> TensorMut<'_> {
        self.export_mut(ExportSlot::Reset)
    }

    /// Writable `action` rows, read by the next `step()`.
    pub fn action_tensor_mut(&mut self) -> TensorMut<'_> {
        self.export_mut(ExportSlot::Action)
    }

    /// Host copy of a tensor's bytes. Accelerator tensors are read back.
    pub fn download(&self, tensor: &Tensor<'_>) -> Result<Vec<u8>, ManagerError> {
        self.backend.download(tensor.handle())
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        info!(steps = self.steps, device = ?self.backend.device(), "manager dropped");
    }
}
