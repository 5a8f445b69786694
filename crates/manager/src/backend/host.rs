//! Host execution: every world ticks on a rayon pool, one world per task.

use crate::error::ManagerError;
use crate::tensor::{BufferHandle, BufferHandleMut};
use hideseek_assets::RenderAssetTable;
use hideseek_common::{CameraMode, Config, ExportSlot};
use hideseek_kernel::{HostExports, Sim, WorldInit};
use hideseek_render::{ColumnRaycaster, HostImages, RenderView, Renderer};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

struct HostRender {
    renderer: ColumnRaycaster,
    view: RenderView,
    images: HostImages,
}

pub struct HostBackend {
    pool: rayon::ThreadPool,
    sims: Vec<Sim>,
    exports: HostExports,
    render: Option<HostRender>,
}

impl HostBackend {
    pub fn new(
        config: &Config,
        inits: Vec<WorldInit>,
        render_assets: Option<Arc<RenderAssetTable>>,
    ) -> Result<Self, ManagerError> {
        let threads = config.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("hideseek-world-{i}"))
            .build()?;

        let mut exports = HostExports::new(inits.len());
        let sims = {
            let mut rows = exports.worlds_mut();
            pool.install(|| {
                inits
                    .into_par_iter()
                    .zip(rows.par_iter_mut())
                    .map(|(init, io)| Sim::new(init, io))
                    .collect::<Result<Vec<_>, _>>()
            })?
        };

        let render = render_assets.map(|assets| {
            let view = RenderView::new(
                config.render_width as usize,
                config.render_height as usize,
                CameraMode::from_render_flag(true),
            );
            HostRender {
                renderer: ColumnRaycaster::new(&assets, &view),
                view,
                images: HostImages::new(sims.len(), view),
            }
        });

        let mut backend = Self {
            pool,
            sims,
            exports,
            render,
        };
        backend.render_all();
        info!(
            worlds = backend.sims.len(),
            threads,
            render = backend.render.is_some(),
            "host backend ready"
        );
        Ok(backend)
    }

    pub fn num_worlds(&self) -> usize {
        self.sims.len()
    }

    pub fn camera_mode(&self) -> CameraMode {
        self.render.as_ref().map_or(CameraMode::None, |r| r.view.camera)
    }

    pub fn step(&mut self) {
        let sims = &mut self.sims;
        let mut rows = self.exports.worlds_mut();
        self.pool.install(|| {
            sims.par_iter_mut()
                .zip(rows.par_iter_mut())
                .for_each(|(sim, io)| sim.tick(io));
        });
        drop(rows);
        self.render_all();
    }

    fn render_all(&mut self) {
        let Some(render) = self.render.as_mut() else {
            return;
        };
        let sims = &self.sims;
        let renderer = &render.renderer;
        let view = &render.view;
        let mut rows = render.images.worlds_mut();
        self.pool.install(|| {
            sims.par_iter()
                .zip(rows.par_iter_mut())
                .for_each(|(sim, target)| renderer.render(sim, view, target));
        });
        debug!(worlds = sims.len(), "rendered views");
    }

    pub fn buffer(&self, slot: ExportSlot) -> BufferHandle<'_> {
        BufferHandle::Host(self.exports.slot_bytes(slot))
    }

    pub fn buffer_mut(&mut self, slot: ExportSlot) -> BufferHandleMut<'_> {
        BufferHandleMut::Host(self.exports.slot_bytes_mut(slot))
    }

    pub fn depth_buffer(&self) -> Option<BufferHandle<'_>> {
        self.render
            .as_ref()
            .map(|r| BufferHandle::Host(r.images.depth_bytes()))
    }

    pub fn color_buffer(&self) -> Option<BufferHandle<'_>> {
        self.render
            .as_ref()
            .map(|r| BufferHandle::Host(r.images.rgb_bytes()))
    }
}

impl std::fmt::Debug for HostBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBackend")
            .field("worlds", &self.sims.len())
            .field("threads", &self.pool.current_num_threads())
            .field("render", &self.render.is_some())
            .finish()
    }
}
