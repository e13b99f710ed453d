// One-shot compute pass that fills the geometry buffer at startup.

use anyhow::{Context, Result};
use ash::vk;
use super::VulkanDevice;

/// Dimensions of the geometry-generation dispatch. Each invocation emits
/// `verts_per_invocation` vertices of 4 f32 into its slice of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeGrid {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub verts_per_invocation: u32,
}

/// Components per generated vertex (vec4 position)
pub const VERTEX_WIDTH: u32 = 4;

impl ComputeGrid {
    pub fn invocations(&self) -> u32 {
        self.width * self.height * self.depth
    }

    pub fn vertex_count(&self) -> u32 {
        self.verts_per_invocation * self.invocations()
    }

    pub fn buffer_size(&self) -> vk::DeviceSize {
        self.vertex_count() as vk::DeviceSize
            * VERTEX_WIDTH as vk::DeviceSize
            * std::mem::size_of::<f32>() as vk::DeviceSize
    }
}

/// Dispatch the generation pass on the compute queue and block until it
/// drains. The blocking wait is required: the buffer's contents are not
/// safe to release to the graphics family until the queue is idle.
pub fn dispatch(
    device: &VulkanDevice,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    descriptor_set: vk::DescriptorSet,
    grid: ComputeGrid,
) -> Result<()> {
    log::info!(
        "Dispatching compute grid {}x{}x{} ({} vertices)",
        grid.width,
        grid.height,
        grid.depth,
        grid.vertex_count()
    );

    device
        .submit_one_shot(
            device.compute_transient_pool,
            device.compute_queue,
            |cmd| unsafe {
                device
                    .device
                    .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, pipeline);
                device.device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::COMPUTE,
                    layout,
                    0,
                    &[descriptor_set],
                    &[],
                );
                device
                    .device
                    .cmd_dispatch(cmd, grid.width, grid.height, grid.depth);
            },
        )
        .context("Compute dispatch failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_vertex_count_matches_dispatch_dimensions() {
        let grid = ComputeGrid {
            width: 32,
            height: 32,
            depth: 32,
            verts_per_invocation: 15,
        };
        assert_eq!(grid.invocations(), 32 * 32 * 32);
        assert_eq!(grid.vertex_count(), 491_520);
    }

    #[test]
    fn buffer_size_is_four_floats_per_vertex() {
        let grid = ComputeGrid {
            width: 32,
            height: 32,
            depth: 32,
            verts_per_invocation: 15,
        };
        assert_eq!(grid.buffer_size(), 491_520 * 4 * 4);
    }

    #[test]
    fn degenerate_grid_is_empty() {
        let grid = ComputeGrid {
            width: 0,
            height: 8,
            depth: 8,
            verts_per_invocation: 15,
        };
        assert_eq!(grid.vertex_count(), 0);
        assert_eq!(grid.buffer_size(), 0);
    }
}
