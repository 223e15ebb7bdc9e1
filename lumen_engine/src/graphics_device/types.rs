/// Backend-agnostic GPU handle and value types
///
/// Handles are thin wrappers around the backend's raw 64-bit object handle.
/// The core never interprets them; the backend converts them back to its
/// native types.

use bitflags::bitflags;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw backend handle value
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// CPU-waitable completion fence
    FenceHandle
);
gpu_handle!(
    /// GPU-to-GPU binary semaphore
    SemaphoreHandle
);
gpu_handle!(
    /// Command recording context (a command buffer and the pool it came from)
    CommandContextHandle
);
gpu_handle!(
    /// Image object
    ImageHandle
);
gpu_handle!(
    /// View onto an image
    ImageViewHandle
);
gpu_handle!(
    /// Descriptor pool
    DescriptorPoolHandle
);
gpu_handle!(
    /// Compiled descriptor set layout
    DescriptorSetLayoutHandle
);
gpu_handle!(
    /// Raw descriptor set (see `descriptor::DescriptorSet` for the tracked form)
    DescriptorSetHandle
);
gpu_handle!(
    /// Pipeline object
    PipelineHandle
);
gpu_handle!(
    /// Pipeline layout object
    PipelineLayoutHandle
);

/// Two-dimensional extent in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero (minimized window, empty target)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Image layout state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents are discarded
    Undefined,
    /// Any access, used for compute writes
    General,
    ColorAttachmentOptimal,
    DepthAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    /// Ready for presentation
    PresentSrc,
}

impl ImageLayout {
    /// Aspect an image in this layout is accessed through
    pub fn aspect(self) -> ImageAspect {
        match self {
            ImageLayout::DepthAttachmentOptimal => ImageAspect::DEPTH,
            ImageLayout::DepthStencilAttachmentOptimal => ImageAspect::DEPTH | ImageAspect::STENCIL,
            _ => ImageAspect::COLOR,
        }
    }
}

/// Image formats used by draw targets and swapchains
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    D32_SFLOAT,
}

/// Sampling filter for blits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

bitflags! {
    /// Pipeline stages a barrier or semaphore wait refers to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const COMPUTE_SHADER = 1 << 1;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 2;
        const TRANSFER = 1 << 3;
        const BOTTOM_OF_PIPE = 1 << 4;
        const ALL_GRAPHICS = 1 << 5;
        const ALL_COMMANDS = 1 << 6;
    }

    /// Memory access types covered by a barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ = 1 << 0;
        const SHADER_WRITE = 1 << 1;
        const TRANSFER_READ = 1 << 2;
        const TRANSFER_WRITE = 1 << 3;
        const MEMORY_READ = 1 << 4;
        const MEMORY_WRITE = 1 << 5;
    }

    /// Image aspects a barrier or copy applies to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }

    /// Shader stages a descriptor binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }

    /// Ways an image will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const STORAGE = 1 << 2;
        const COLOR_ATTACHMENT = 1 << 3;
        const SAMPLED = 1 << 4;
    }
}
