//! Descriptor set pooling
//!
//! `ResourcePool` hands out descriptor sets from one fixed-capacity device
//! pool. Capacity per descriptor kind is derived from a ratio table, and
//! every set carries the pool generation it was allocated under so a set
//! kept across `reset_all` is caught instead of silently aliasing a new one.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::{
    DescriptorBinding, DescriptorKind, DescriptorLayoutDesc, DescriptorPoolHandle,
    DescriptorPoolSize, DescriptorSetHandle, DescriptorSetLayoutHandle, GraphicsDevice,
    GpuResource, ImageViewHandle, ShaderStageFlags,
};

/// Share of a pool reserved for one descriptor kind
///
/// `ratio` descriptors of `kind` are reserved per set of pool capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSizeRatio {
    pub kind: DescriptorKind,
    pub ratio: f32,
}

impl PoolSizeRatio {
    pub fn new(kind: DescriptorKind, ratio: f32) -> Self {
        Self { kind, ratio }
    }
}

// ============================================================================
// Layouts
// ============================================================================

/// Accumulates bindings for a descriptor set layout
#[derive(Debug, Clone, Default)]
pub struct LayoutBuilder {
    bindings: Vec<DescriptorBinding>,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    /// Add a single-descriptor binding
    pub fn add_binding(&mut self, binding: u32, kind: DescriptorKind) -> &mut Self {
        self.bindings.push(DescriptorBinding { binding, kind, count: 1 });
        self
    }

    /// Drop every binding added so far
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Snapshot the bindings into a layout description visible to `visibility`
    ///
    /// The builder is left untouched and can build again.
    pub fn build(&self, visibility: ShaderStageFlags) -> DescriptorLayoutDesc {
        DescriptorLayoutDesc {
            bindings: self.bindings.clone(),
            visibility,
        }
    }

    /// Build and compile the layout on the device
    pub fn create(
        &self,
        device: &mut dyn GraphicsDevice,
        visibility: ShaderStageFlags,
    ) -> Result<DescriptorSetLayout> {
        DescriptorSetLayout::create(device, self.build(visibility))
    }
}

/// Compiled descriptor set layout with the description it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetLayout {
    handle: DescriptorSetLayoutHandle,
    desc: DescriptorLayoutDesc,
}

impl DescriptorSetLayout {
    pub fn create(device: &mut dyn GraphicsDevice, desc: DescriptorLayoutDesc) -> Result<Self> {
        let handle = device.create_descriptor_set_layout(&desc)?;
        Ok(Self { handle, desc })
    }

    pub fn handle(&self) -> DescriptorSetLayoutHandle {
        self.handle
    }

    pub fn desc(&self) -> &DescriptorLayoutDesc {
        &self.desc
    }

    /// Descriptors of each kind one set of this layout consumes
    fn kind_usage(&self) -> FxHashMap<DescriptorKind, u32> {
        let mut usage = FxHashMap::default();
        for binding in &self.desc.bindings {
            *usage.entry(binding.kind).or_insert(0) += binding.count;
        }
        usage
    }
}

impl From<&DescriptorSetLayout> for GpuResource {
    fn from(layout: &DescriptorSetLayout) -> Self {
        GpuResource::DescriptorSetLayout(layout.handle)
    }
}

// ============================================================================
// Sets
// ============================================================================

/// Descriptor set tagged with the pool generation it was allocated under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSet {
    pub handle: DescriptorSetHandle,
    pub layout: DescriptorSetLayoutHandle,
    pub generation: u64,
}

// ============================================================================
// Pool
// ============================================================================

/// Fixed-capacity descriptor set allocator
#[derive(Debug)]
pub struct ResourcePool {
    pool: DescriptorPoolHandle,
    max_sets: u32,
    kind_capacity: FxHashMap<DescriptorKind, u32>,
    kind_live: FxHashMap<DescriptorKind, u32>,
    live_sets: u32,
    generation: u64,
}

impl ResourcePool {
    /// Create the device pool
    ///
    /// Each kind gets `ceil(ratio * max_sets)` descriptors; repeated kinds add up.
    ///
    /// # Errors
    ///
    /// `InitializationFailed` for zero `max_sets` or a ratio that is not a
    /// positive finite number; device allocation errors are passed through.
    pub fn initialize(
        device: &mut dyn GraphicsDevice,
        max_sets: u32,
        ratios: &[PoolSizeRatio],
    ) -> Result<Self> {
        if max_sets == 0 {
            return Err(Error::InitializationFailed(
                "Descriptor pool needs at least one set".to_string(),
            ));
        }

        let mut kind_capacity: FxHashMap<DescriptorKind, u32> = FxHashMap::default();
        for ratio in ratios {
            if !ratio.ratio.is_finite() || ratio.ratio <= 0.0 {
                return Err(Error::InitializationFailed(format!(
                    "Invalid descriptor ratio {} for {:?}",
                    ratio.ratio, ratio.kind
                )));
            }
            let count = (ratio.ratio as f64 * max_sets as f64).ceil() as u32;
            *kind_capacity.entry(ratio.kind).or_insert(0) += count;
        }

        let mut sizes: Vec<DescriptorPoolSize> = kind_capacity
            .iter()
            .map(|(&kind, &count)| DescriptorPoolSize { kind, count })
            .collect();
        sizes.sort_by_key(|size| size.kind);

        let pool = device.create_descriptor_pool(max_sets, &sizes)?;

        crate::engine_debug!(
            "lumen::ResourcePool",
            "Descriptor pool created: {} sets, {:?}",
            max_sets,
            sizes
        );

        Ok(Self {
            pool,
            max_sets,
            kind_capacity,
            kind_live: FxHashMap::default(),
            live_sets: 0,
            generation: 0,
        })
    }

    /// Allocate one set for `layout`
    ///
    /// Capacity is checked before the device is called, so exhaustion is
    /// reported the same way on every backend.
    pub fn allocate(
        &mut self,
        device: &mut dyn GraphicsDevice,
        layout: &DescriptorSetLayout,
    ) -> Result<DescriptorSet> {
        if self.live_sets >= self.max_sets {
            return Err(Error::PoolExhausted(format!(
                "{} of {} sets in use",
                self.live_sets, self.max_sets
            )));
        }

        let usage = layout.kind_usage();
        for (&kind, &needed) in &usage {
            let live = self.kind_live.get(&kind).copied().unwrap_or(0);
            let capacity = self.kind_capacity(kind);
            if live + needed > capacity {
                return Err(Error::PoolExhausted(format!(
                    "{:?}: {} in use, {} requested, capacity {}",
                    kind, live, needed, capacity
                )));
            }
        }

        let handle = device.allocate_descriptor_set(self.pool, layout.handle())?;

        self.live_sets += 1;
        for (kind, needed) in usage {
            *self.kind_live.entry(kind).or_insert(0) += needed;
        }

        Ok(DescriptorSet {
            handle,
            layout: layout.handle(),
            generation: self.generation,
        })
    }

    /// Return every set to the pool
    ///
    /// Sets allocated before the call are invalid afterwards; `validate`
    /// rejects them. Capacity is unchanged.
    pub fn reset_all(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        device.reset_descriptor_pool(self.pool)?;
        self.generation += 1;
        self.live_sets = 0;
        self.kind_live.clear();
        crate::engine_trace!(
            "lumen::ResourcePool",
            "Descriptor pool reset, generation {}",
            self.generation
        );
        Ok(())
    }

    /// Check that `set` was allocated under the current generation
    pub fn validate(&self, set: &DescriptorSet) -> Result<()> {
        if set.generation != self.generation {
            return Err(Error::StaleDescriptorSet {
                set_generation: set.generation,
                pool_generation: self.generation,
            });
        }
        Ok(())
    }

    /// Point a storage-image binding of a live set at `view`
    pub fn write_storage_image(
        &self,
        device: &mut dyn GraphicsDevice,
        set: &DescriptorSet,
        binding: u32,
        view: ImageViewHandle,
    ) -> Result<()> {
        self.validate(set)?;
        device.write_storage_image(set.handle, binding, view);
        Ok(())
    }

    /// Release the device pool; the GPU must no longer use any of its sets
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.destroy_resource(GpuResource::DescriptorPool(self.pool));
    }

    /// Device pool handle, for deferred release
    pub fn handle(&self) -> DescriptorPoolHandle {
        self.pool
    }

    /// Maximum number of live sets
    pub fn capacity(&self) -> u32 {
        self.max_sets
    }

    pub fn live_sets(&self) -> u32 {
        self.live_sets
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Descriptors of `kind` the pool can hold (0 for kinds without a ratio)
    pub fn kind_capacity(&self, kind: DescriptorKind) -> u32 {
        self.kind_capacity.get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
