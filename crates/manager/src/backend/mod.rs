//! Execution backends. Both run the same world graph and expose the same
//! export slots; they differ only in where the state lives.

#[cfg(feature = "accelerator")]
mod accelerator;
mod host;

#[cfg(feature = "accelerator")]
pub use accelerator::{AcceleratorBackend, CompileMode};
pub use host::HostBackend;

use crate::error::ManagerError;
use crate::tensor::{BufferHandle, BufferHandleMut, Device};
use hideseek_assets::{ObjectStore, RenderAssetTable};
use hideseek_common::{CameraMode, Config, ExecMode, ExportSlot};
use hideseek_kernel::{EpisodeCounter, WorldInit};
use std::sync::Arc;

#[derive(Debug)]
pub enum Backend {
    Host(HostBackend),
    #[cfg(feature = "accelerator")]
    Accelerator(AcceleratorBackend),
}

impl Backend {
    /// Build the backend named by `config.exec_mode` and run world
    /// construction. `render_assets` is `Some` only when rendering is on.
    pub fn construct(
        config: &Config,
        inits: Vec<WorldInit>,
        objects: &Arc<ObjectStore>,
        render_assets: Option<Arc<RenderAssetTable>>,
    ) -> Result<Self, ManagerError> {
        match config.exec_mode {
            ExecMode::HostParallel => Ok(Self::Host(HostBackend::new(config, inits, render_assets)?)),
            #[cfg(feature = "accelerator")]
            ExecMode::Accelerator => Ok(Self::Accelerator(AcceleratorBackend::new(
                config,
                &inits,
                objects,
                render_assets,
            )?)),
            #[cfg(not(feature = "accelerator"))]
            ExecMode::Accelerator => {
                let _ = objects;
                Err(ManagerError::AcceleratorUnavailable)
            }
        }
    }

    pub fn num_worlds(&self) -> usize {
        match self {
            Self::Host(b) => b.num_worlds(),
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => b.num_worlds(),
        }
    }

    pub fn device(&self) -> Device {
        match self {
            Self::Host(_) => Device::Host,
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => Device::Accelerator(b.device_id()),
        }
    }

    /// `Perspective` when rendering is on, otherwise `None`.
    pub fn camera_mode(&self) -> CameraMode {
        match self {
            Self::Host(b) => b.camera_mode(),
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => b.camera_mode(),
        }
    }

    /// Episodes claimed so far. Host worlds share `host_counter`; accelerator
    /// worlds count on the device.
    pub fn episodes_started(&self, host_counter: &EpisodeCounter) -> Result<u32, ManagerError> {
        match self {
            Self::Host(_) => Ok(host_counter.current()),
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => b.episode_counter(),
        }
    }

    /// One tick of every world. Returns once all of them have finished.
    pub fn step(&mut self) {
        match self {
            Self::Host(b) => b.step(),
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => b.step(),
        }
    }

    pub fn buffer(&self, slot: ExportSlot) -> BufferHandle<'_> {
        match self {
            Self::Host(b) => b.buffer(slot),
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => b.buffer(slot),
        }
    }

    /// `None` for indices outside the export table.
    pub fn buffer_for_slot(&self, slot: usize) -> Option<BufferHandle<'_>> {
        ExportSlot::from_index(slot).map(|slot| self.buffer(slot))
    }

    pub fn buffer_mut(&mut self, slot: ExportSlot) -> BufferHandleMut<'_> {
        match self {
            Self::Host(b) => b.buffer_mut(slot),
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => b.buffer_mut(slot),
        }
    }

    pub fn depth_buffer(&self) -> Option<BufferHandle<'_>> {
        match self {
            Self::Host(b) => b.depth_buffer(),
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => b.depth_buffer(),
        }
    }

    pub fn color_buffer(&self) -> Option<BufferHandle<'_>> {
        match self {
            Self::Host(b) => b.color_buffer(),
            #[cfg(feature = "accelerator")]
            Self::Accelerator(b) => b.color_buffer(),
        }
    }

    /// Host copy of a buffer's bytes, wherever it lives.
    pub fn download(&self, handle: BufferHandle<'_>) -> Result<Vec<u8>, ManagerError> {
        match handle {
            BufferHandle::Host(bytes) => Ok(bytes.to_vec()),
            #[cfg(feature = "accelerator")]
            BufferHandle::Device {
                buffer, offset, size, ..
            } => match self {
                Self::Accelerator(b) => b.read_back(buffer, offset, size),
                Self::Host(_) => Err(ManagerError::Readback(
                    "device buffer handed to the host backend".into(),
                )),
            },
        }
    }
}
