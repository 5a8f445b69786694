//! Accelerator execution: the world graph compiled to wgpu compute shaders.
//!
//! All world state lives in device buffers. A tick is one blocking submit of
//! the step kernel (and the render kernel when enabled); exports stay on the
//! device and are read back only on request.

use crate::error::ManagerError;
use crate::tensor::{BufferHandle, BufferHandleMut};
use bytemuck::{Pod, Zeroable};
use hideseek_assets::{ObjectStore, RenderAssetTable};
use hideseek_common::consts::{MAX_AGENTS, MAX_BOXES, MAX_RAMPS};
use hideseek_common::{CameraMode, Config, ExportSlot, NUM_EXPORTED_BUFFERS, ObjectId};
use hideseek_kernel::WorldInit;
use std::sync::Arc;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

const WORLD_GRAPH_WGSL: &str = include_str!("world_graph.wgsl");
const WORKGROUP_SIZE: u32 = 64;
const MAX_GROUPS_PER_DIM: u32 = 65_535;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GpuParams {
    num_worlds: u32,
    min_entities: u32,
    max_entities: u32,
    render_enabled: u32,
    render_width: u32,
    render_height: u32,
    _pad: [u32; 2],
    /// Word offset of each export slot, four per vec4.
    offsets: [[u32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GpuObject {
    half: [f32; 4],
    color: [f32; 4],
    inv_mass: f32,
    mu_d: f32,
    render_height: f32,
    _pad: f32,
}

// World-state mirrors below are written and read by the shader only.
#[allow(dead_code)]
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GpuAgent {
    pos: [f32; 2],
    vel: [f32; 2],
    yaw: f32,
    team: u32,
    alive: u32,
    grabbed: i32,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GpuBody {
    pos: [f32; 2],
    vel: [f32; 2],
    half: [f32; 2],
    yaw: f32,
    object: u32,
    inv_mass: f32,
    mu_d: f32,
    locked: i32,
    _pad: u32,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GpuWorld {
    rng: u32,
    episode: u32,
    step: u32,
    num_boxes: u32,
    num_ramps: u32,
    _pad: [u32; 3],
    agents: [GpuAgent; MAX_AGENTS],
    bodies: [GpuBody; MAX_BOXES + MAX_RAMPS],
}

/// How the world graph is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    Optimized,
    /// Validation layers and labelled shader objects.
    Debug,
}

impl CompileMode {
    pub fn from_debug_flag(debug_compile: bool) -> Self {
        if debug_compile {
            Self::Debug
        } else {
            Self::Optimized
        }
    }

    fn instance_flags(self) -> wgpu::InstanceFlags {
        match self {
            Self::Debug => wgpu::InstanceFlags::debugging(),
            Self::Optimized => wgpu::InstanceFlags::empty(),
        }
    }

    fn shader_label(self) -> &'static str {
        match self {
            Self::Debug => "world_graph (debug)",
            Self::Optimized => "world_graph",
        }
    }
}

/// Word offset of every export slot inside the packed exports buffer, and
/// the total word count. Every exported element is four bytes wide. `None`
/// when the batch cannot be addressed with 32-bit word offsets.
pub fn export_layout(num_worlds: usize) -> Option<([u32; NUM_EXPORTED_BUFFERS], u32)> {
    let mut offsets = [0u32; NUM_EXPORTED_BUFFERS];
    let mut total = 0u32;
    for slot in ExportSlot::ALL {
        debug_assert_eq!(slot.element_type().size_bytes(), 4);
        offsets[slot.index()] = total;
        let words = u32::try_from(slot.per_world_len().checked_mul(num_worlds)?).ok()?;
        total = total.checked_add(words)?;
    }
    Some((offsets, total))
}

/// Workgroup grid covering `invocations`, folded into y past the per-dimension
/// limit.
fn dispatch_grid(invocations: u32) -> (u32, u32) {
    let groups = invocations.div_ceil(WORKGROUP_SIZE).max(1);
    let x = groups.min(MAX_GROUPS_PER_DIM);
    (x, groups.div_ceil(x))
}

/// Sizes of every batch-scaled device buffer, checked against the adapter
/// before anything is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferPlan {
    offsets: [u32; NUM_EXPORTED_BUFFERS],
    export_bytes: u64,
    world_bytes: u64,
    /// Bytes per image target and column invocations per launch, when
    /// rendering.
    images: Option<(u64, u32)>,
}

impl BufferPlan {
    fn new(
        num_worlds: usize,
        render: Option<(u32, u32)>,
        limits: &wgpu::Limits,
    ) -> Result<Self, ManagerError> {
        let limit = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        let check = |buffer: &'static str, size: Option<u64>| match size {
            Some(size) if size <= limit => Ok(size),
            size => Err(ManagerError::DeviceLimit {
                buffer,
                size: size.unwrap_or(u64::MAX),
                limit,
            }),
        };

        let Some((offsets, export_words)) = export_layout(num_worlds) else {
            return Err(ManagerError::DeviceLimit {
                buffer: "exports",
                size: u64::MAX,
                limit,
            });
        };
        let export_bytes = check("exports", Some(u64::from(export_words) * 4))?;
        let world_bytes = check(
            "worlds",
            (num_worlds as u64).checked_mul(std::mem::size_of::<GpuWorld>() as u64),
        )?;

        let images = match render {
            Some((width, height)) => {
                let views = (num_worlds as u64).checked_mul(MAX_AGENTS as u64);
                let columns = views.and_then(|v| v.checked_mul(u64::from(width)));
                let bytes = columns
                    .and_then(|c| c.checked_mul(u64::from(height)))
                    .and_then(|p| p.checked_mul(4));
                check("depth", bytes)?;
                let bytes = check("rgb", bytes)?;
                // Columns fit in u32 once the byte check passes.
                let columns = columns
                    .and_then(|c| u32::try_from(c).ok())
                    .ok_or(ManagerError::DeviceLimit {
                        buffer: "depth",
                        size: bytes,
                        limit,
                    })?;
                Some((bytes, columns))
            }
            None => None,
        };

        Ok(Self {
            offsets,
            export_bytes,
            world_bytes,
            images,
        })
    }
}

fn object_table(objects: &ObjectStore, render: Option<&RenderAssetTable>) -> Vec<GpuObject> {
    (0..ObjectId::COUNT as u32)
        .map(ObjectId)
        .map(|id| {
            let physics = objects.get(id);
            let half = physics.map_or(glam::Vec3::ZERO, |o| o.aabb.half_extents());
            let asset = render.and_then(|r| r.get(id));
            GpuObject {
                half: [half.x, half.y, half.z, 0.0],
                color: asset.map_or([1.0, 0.0, 1.0, 1.0], |a| a.base_color),
                inv_mass: physics.map_or(0.0, |o| o.metadata.inv_mass),
                mu_d: physics.map_or(0.0, |o| o.metadata.mu_d),
                render_height: asset.map_or(2.0, |a| a.mesh.height()),
                _pad: 0.0,
            }
        })
        .collect()
}

struct RenderTargets {
    depth: wgpu::Buffer,
    rgb: wgpu::Buffer,
    /// Column invocations per launch.
    columns: u32,
}

pub struct AcceleratorBackend {
    device_id: u32,
    device: wgpu::Device,
    queue: wgpu::Queue,
    num_worlds: usize,
    exports: wgpu::Buffer,
    offsets: [u32; NUM_EXPORTED_BUFFERS],
    episode_counter: wgpu::Buffer,
    render: Option<RenderTargets>,
    bind_group: wgpu::BindGroup,
    step_pipeline: wgpu::ComputePipeline,
    render_pipeline: wgpu::ComputePipeline,
    // Kept alive for the bind group.
    _buffers: [wgpu::Buffer; 3],
}

impl AcceleratorBackend {
    pub fn new(
        config: &Config,
        inits: &[WorldInit],
        objects: &Arc<ObjectStore>,
        render_assets: Option<Arc<RenderAssetTable>>,
    ) -> Result<Self, ManagerError> {
        let mode = CompileMode::from_debug_flag(config.debug_compile);
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: mode.instance_flags(),
            ..Default::default()
        });
        let adapter = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .nth(config.device_id as usize)
            .ok_or(ManagerError::NoAdapter {
                device_id: config.device_id,
            })?;
        let adapter_info = adapter.get_info();
        let num_worlds = config.num_worlds();
        let plan = BufferPlan::new(
            num_worlds,
            render_assets
                .as_ref()
                .map(|_| (config.render_width, config.render_height)),
            &adapter.limits(),
        )?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("hideseek_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;
        info!(
            device_id = config.device_id,
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            mode = ?mode,
            "accelerator device opened"
        );

        let mut packed_offsets = [[0u32; 4]; 4];
        for (i, offset) in plan.offsets.iter().enumerate() {
            packed_offsets[i / 4][i % 4] = *offset;
        }
        let (min_entities, max_entities) = inits
            .first()
            .map_or((0, 0), |init| (init.min_entities, init.max_entities));
        let params = GpuParams {
            num_worlds: num_worlds as u32,
            min_entities,
            max_entities,
            render_enabled: render_assets.is_some() as u32,
            render_width: config.render_width,
            render_height: config.render_height,
            _pad: [0; 2],
            offsets: packed_offsets,
        };

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let exports = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("exports"),
            size: plan.export_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let worlds = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("worlds"),
            size: plan.world_bytes,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let object_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("objects"),
            contents: bytemuck::cast_slice(&object_table(objects, render_assets.as_deref())),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let first_episode = inits.first().map_or(0, |init| init.episodes.current());
        let episode_counter = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("episode_counter"),
            contents: bytemuck::bytes_of(&first_episode),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        let image_buffer = |label: &str, bytes: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: bytes.max(4),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let render = plan.images.map(|(bytes, columns)| RenderTargets {
            depth: image_buffer("depth", bytes),
            rgb: image_buffer("rgb", bytes),
            columns,
        });
        let dummy_depth;
        let dummy_rgb;
        let (depth_target, rgb_target) = match &render {
            Some(targets) => (&targets.depth, &targets.rgb),
            None => {
                dummy_depth = image_buffer("depth_unused", 0);
                dummy_rgb = image_buffer("rgb_unused", 0);
                (&dummy_depth, &dummy_rgb)
            }
        };

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("world_graph_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, false),
                storage(2, false),
                storage(3, true),
                storage(4, false),
                storage(5, false),
                storage(6, false),
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("world_graph_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: exports.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: worlds.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: object_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: episode_counter.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: depth_target.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: rgb_target.as_entire_binding(),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(mode.shader_label()),
            source: wgpu::ShaderSource::Wgsl(WORLD_GRAPH_WGSL.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("world_graph_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let init_pipeline = pipeline("init_worlds");
        let step_pipeline = pipeline("step_worlds");
        let render_pipeline = pipeline("render_views");
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            return Err(ManagerError::DeviceSetup(err.to_string()));
        }

        let backend = Self {
            device_id: config.device_id,
            device,
            queue,
            num_worlds,
            exports,
            offsets: plan.offsets,
            episode_counter,
            render,
            bind_group,
            step_pipeline,
            render_pipeline,
            _buffers: [params_buffer, worlds, object_buffer],
        };
        backend.launch(&[&init_pipeline]);
        info!(
            worlds = num_worlds,
            export_bytes = plan.export_bytes,
            render = backend.render.is_some(),
            "accelerator backend ready"
        );
        Ok(backend)
    }

    /// Record the world kernels in `pipelines`, followed by the render kernel
    /// when enabled, then submit and wait.
    fn launch(&self, pipelines: &[&wgpu::ComputePipeline]) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("world_graph_tick"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("world_graph"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.bind_group, &[]);
            let (x, y) = dispatch_grid(self.num_worlds as u32);
            for pipeline in pipelines {
                pass.set_pipeline(pipeline);
                pass.dispatch_workgroups(x, y, 1);
            }
            if let Some(render) = &self.render {
                let (x, y) = dispatch_grid(render.columns);
                pass.set_pipeline(&self.render_pipeline);
                pass.dispatch_workgroups(x, y, 1);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }

    pub fn num_worlds(&self) -> usize {
        self.num_worlds
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn camera_mode(&self) -> CameraMode {
        CameraMode::from_render_flag(self.render.is_some())
    }

    pub fn step(&mut self) {
        self.launch(&[&self.step_pipeline]);
    }

    fn slot_range(&self, slot: ExportSlot) -> (u64, u64) {
        let offset = self.offsets[slot.index()] as u64 * 4;
        let size = (slot.per_world_len() * self.num_worlds) as u64 * 4;
        (offset, size)
    }

    pub fn buffer(&self, slot: ExportSlot) -> BufferHandle<'_> {
        let (offset, size) = self.slot_range(slot);
        BufferHandle::Device {
            buffer: &self.exports,
            offset,
            size,
            device_id: self.device_id,
        }
    }

    pub fn buffer_mut(&mut self, slot: ExportSlot) -> BufferHandleMut<'_> {
        let (offset, size) = self.slot_range(slot);
        BufferHandleMut::Device {
            buffer: &self.exports,
            queue: &self.queue,
            offset,
            size,
            device_id: self.device_id,
        }
    }

    fn image_handle<'a>(&'a self, buffer: &'a wgpu::Buffer) -> BufferHandle<'a> {
        BufferHandle::Device {
            buffer,
            offset: 0,
            size: buffer.size(),
            device_id: self.device_id,
        }
    }

    pub fn depth_buffer(&self) -> Option<BufferHandle<'_>> {
        self.render.as_ref().map(|r| self.image_handle(&r.depth))
    }

    pub fn color_buffer(&self) -> Option<BufferHandle<'_>> {
        self.render.as_ref().map(|r| self.image_handle(&r.rgb))
    }

    /// Copy a device range into host memory.
    pub fn read_back(&self, buffer: &wgpu::Buffer, offset: u64, size: u64) -> Result<Vec<u8>, ManagerError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, offset, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| ManagerError::Readback(e.to_string()))?
            .map_err(|e| ManagerError::Readback(e.to_string()))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        debug!(offset, size, "read back device range");
        Ok(bytes)
    }

    /// Current value of the device-side episode counter.
    pub fn episode_counter(&self) -> Result<u32, ManagerError> {
        let bytes = self.read_back(&self.episode_counter, 0, 4)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }
}

impl Drop for AcceleratorBackend {
    fn drop(&mut self) {
        self.exports.destroy();
        if let Some(render) = &self.render {
            render.depth.destroy();
            render.rgb.destroy();
        }
        debug!(device_id = self.device_id, "accelerator buffers released");
    }
}

impl std::fmt::Debug for AcceleratorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceleratorBackend")
            .field("device_id", &self.device_id)
            .field("worlds", &self.num_worlds)
            .field("render", &self.render.is_some())
            .finish()
    }
}
