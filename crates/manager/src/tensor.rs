//! Typed, shaped views over backend-owned export buffers.
//!
//! A [`Tensor`] borrows the manager immutably and a [`TensorMut`] borrows it
//! mutably, so no view can outlive or overlap a `step()`.

use hideseek_common::ElementType;

/// Where a tensor's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Host,
    /// Accelerator adapter index.
    Accelerator(u32),
}

/// Backend storage for one export.
#[derive(Debug, Clone, Copy)]
pub enum BufferHandle<'a> {
    Host(&'a [u8]),
    #[cfg(feature = "accelerator")]
    Device {
        buffer: &'a wgpu::Buffer,
        /// Byte offset of the export inside `buffer`.
        offset: u64,
        size: u64,
        device_id: u32,
    },
}

impl BufferHandle<'_> {
    pub fn device(&self) -> Device {
        match self {
            Self::Host(_) => Device::Host,
            #[cfg(feature = "accelerator")]
            Self::Device { device_id, .. } => Device::Accelerator(*device_id),
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Host(bytes) => bytes.len(),
            #[cfg(feature = "accelerator")]
            Self::Device { size, .. } => *size as usize,
        }
    }
}

/// Two handles are equal when they name the same storage.
impl PartialEq for BufferHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Host(a), Self::Host(b)) => std::ptr::eq(*a, *b),
            #[cfg(feature = "accelerator")]
            (
                Self::Device {
                    buffer: a,
                    offset: ao,
                    size: asz,
                    device_id: ad,
                },
                Self::Device {
                    buffer: b,
                    offset: bo,
                    size: bsz,
                    device_id: bd,
                },
            ) => std::ptr::eq(*a, *b) && ao == bo && asz == bsz && ad == bd,
            #[cfg(feature = "accelerator")]
            _ => false,
        }
    }
}

/// Mutable backend storage for a writable export.
#[derive(Debug)]
pub enum BufferHandleMut<'a> {
    Host(&'a mut [u8]),
    #[cfg(feature = "accelerator")]
    Device {
        buffer: &'a wgpu::Buffer,
        queue: &'a wgpu::Queue,
        offset: u64,
        size: u64,
        device_id: u32,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TensorError {
    #[error("rendering is disabled; depth and rgb are unavailable")]
    RenderingDisabled,
    #[error("tensor lives on {device:?} and has no host address")]
    NotHostAddressable { device: Device },
    #[error("tensor holds {actual:?}, requested {requested:?}")]
    ElementTypeMismatch {
        actual: ElementType,
        requested: ElementType,
    },
    #[error("expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("buffer is not aligned for its element type")]
    Misaligned,
    #[error("no export slot {0}")]
    UnknownSlot(usize),
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for f32 {}
    impl Sealed for u8 {}
}

/// Rust types that export elements can be viewed as.
pub trait TensorElement: sealed::Sealed + bytemuck::Pod {
    const ELEMENT_TYPE: ElementType;
}

impl TensorElement for i32 {
    const ELEMENT_TYPE: ElementType = ElementType::Int32;
}

impl TensorElement for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::Float32;
}

impl TensorElement for u8 {
    const ELEMENT_TYPE: ElementType = ElementType::UInt8;
}

fn check_type<T: TensorElement>(actual: ElementType) -> Result<(), TensorError> {
    if T::ELEMENT_TYPE == actual {
        Ok(())
    } else {
        Err(TensorError::ElementTypeMismatch {
            actual,
            requested: T::ELEMENT_TYPE,
        })
    }
}

/// Read-only export view.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<'a> {
    handle: BufferHandle<'a>,
    element_type: ElementType,
    shape: Vec<usize>,
}

impl<'a> Tensor<'a> {
    pub fn new(handle: BufferHandle<'a>, element_type: ElementType, shape: Vec<usize>) -> Self {
        Self {
            handle,
            element_type,
            shape,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn device(&self) -> Device {
        self.handle.device()
    }

    pub fn handle(&self) -> BufferHandle<'a> {
        self.handle
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Host address of the first element. `None` for accelerator tensors.
    pub fn host_ptr(&self) -> Option<*const u8> {
        match self.handle {
            BufferHandle::Host(bytes) => Some(bytes.as_ptr()),
            #[cfg(feature = "accelerator")]
            BufferHandle::Device { .. } => None,
        }
    }

    pub fn as_bytes(&self) -> Result<&'a [u8], TensorError> {
        match self.handle {
            BufferHandle::Host(bytes) => Ok(bytes),
            #[cfg(feature = "accelerator")]
            BufferHandle::Device { .. } => Err(TensorError::NotHostAddressable {
                device: self.device(),
            }),
        }
    }

    /// Flat, row-major elements.
    pub fn as_slice<T: TensorElement>(&self) -> Result<&'a [T], TensorError> {
        check_type::<T>(self.element_type)?;
        let bytes = self.as_bytes()?;
        bytemuck::try_cast_slice(bytes).map_err(|_| TensorError::Misaligned)
    }
}

/// Writable export view.
#[derive(Debug)]
pub struct TensorMut<'a> {
    handle: BufferHandleMut<'a>,
    element_type: ElementType,
    shape: Vec<usize>,
}

impl<'a> TensorMut<'a> {
    pub fn new(handle: BufferHandleMut<'a>, element_type: ElementType, shape: Vec<usize>) -> Self {
        Self {
            handle,
            element_type,
            shape,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn device(&self) -> Device {
        match &self.handle {
            BufferHandleMut::Host(_) => Device::Host,
            #[cfg(feature = "accelerator")]
            BufferHandleMut::Device { device_id, .. } => Device::Accelerator(*device_id),
        }
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Flat, row-major elements, writable in place. Host tensors only.
    pub fn as_mut_slice<T: TensorElement>(&mut self) -> Result<&mut [T], TensorError> {
        check_type::<T>(self.element_type)?;
        match &mut self.handle {
            BufferHandleMut::Host(bytes) => {
                bytemuck::try_cast_slice_mut(bytes).map_err(|_| TensorError::Misaligned)
            }
            #[cfg(feature = "accelerator")]
            BufferHandleMut::Device { device_id, .. } => Err(TensorError::NotHostAddressable {
                device: Device::Accelerator(*device_id),
            }),
        }
    }

    /// Overwrite the whole tensor. Works on every device; accelerator writes
    /// land before the next step.
    pub fn copy_from_slice<T: TensorElement>(&mut self, data: &[T]) -> Result<(), TensorError> {
        check_type::<T>(self.element_type)?;
        if data.len() != self.num_elements() {
            return Err(TensorError::LengthMismatch {
                expected: self.num_elements(),
                actual: data.len(),
            });
        }
        match &mut self.handle {
            BufferHandleMut::Host(bytes) => bytes.copy_from_slice(bytemuck::cast_slice(data)),
            #[cfg(feature = "accelerator")]
            BufferHandleMut::Device {
                buffer, queue, offset, ..
            } => queue.write_buffer(buffer, *offset, bytemuck::cast_slice(data)),
        }
        Ok(())
    }

    /// Set every element to `value`.
    pub fn fill<T: TensorElement>(&mut self, value: T) -> Result<(), TensorError> {
        let data = vec![value; self.num_elements()];
        self.copy_from_slice(&data)
    }
}
