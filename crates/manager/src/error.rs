use hideseek_assets::AssetError;
use hideseek_common::ConfigError;
use hideseek_kernel::KernelError;

/// Construction-time failures. A manager either builds completely or not at
/// all.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("asset loading failed: {0}")]
    Asset(#[from] AssetError),
    #[error("world construction failed: {0}")]
    Kernel(#[from] KernelError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("accelerator execution requested but this build has no accelerator support")]
    AcceleratorUnavailable,
    #[error("no accelerator adapter with index {device_id}")]
    NoAdapter { device_id: u32 },
    #[cfg(feature = "accelerator")]
    #[error("failed to open accelerator device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    /// A device buffer would exceed the adapter's binding or allocation
    /// limit. `size` is `u64::MAX` when the byte count itself overflows.
    #[error("{buffer} buffer needs {size} bytes but the device allows {limit}")]
    DeviceLimit {
        buffer: &'static str,
        size: u64,
        limit: u64,
    },
    #[error("accelerator setup rejected by device: {0}")]
    DeviceSetup(String),
    #[error("accelerator readback failed: {0}")]
    Readback(String),
}
