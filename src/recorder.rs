// One-time command buffer recording, one buffer per swapchain image.
//
// The scene is static: the same geometry, pipeline and descriptor bindings
// every frame. Recording once up front and resubmitting the same buffers
// trades all flexibility for zero per-frame recording cost.

use anyhow::Result;
use ash::vk;

use crate::backend::{ComputeGrid, VulkanDevice};

/// Parameters of the single non-indexed draw issued per command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawCall {
    /// Draw every vertex the compute grid generated, as one instance
    pub fn for_grid(grid: &ComputeGrid) -> Self {
        Self {
            vertex_count: grid.vertex_count(),
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }
    }
}

/// Everything a recorded frame binds, fixed for the application lifetime
pub struct ScenePass {
    pub render_pass: vk::RenderPass,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub vertex_buffer: vk::Buffer,
    pub clear_color: [f32; 4],
}

/// Record the full set of per-image command buffers.
///
/// `descriptor_sets` holds either one shared set or one set per image
/// (the per-image-uniforms configuration); anything else is a setup bug.
/// `command_buffers` must match the framebuffer count exactly.
/// The one-buffer-per-image invariant, checked before any recording starts
fn check_binding_counts(
    command_buffers: usize,
    framebuffers: usize,
    descriptor_sets: usize,
) -> Result<()> {
    if command_buffers != framebuffers {
        anyhow::bail!(
            "Command buffer count {} does not match framebuffer count {}",
            command_buffers,
            framebuffers
        );
    }
    if descriptor_sets != 1 && descriptor_sets != framebuffers {
        anyhow::bail!(
            "Expected 1 or {} descriptor sets, got {}",
            framebuffers,
            descriptor_sets
        );
    }
    Ok(())
}

pub fn record_command_buffers(
    device: &VulkanDevice,
    scene: &ScenePass,
    framebuffers: &[vk::Framebuffer],
    descriptor_sets: &[vk::DescriptorSet],
    command_buffers: &[vk::CommandBuffer],
    draw: DrawCall,
) -> Result<()> {
    check_binding_counts(
        command_buffers.len(),
        framebuffers.len(),
        descriptor_sets.len(),
    )?;

    let clear_values = [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: scene.clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ];

    for (i, &cmd) in command_buffers.iter().enumerate() {
        let descriptor_set = if descriptor_sets.len() == 1 {
            descriptor_sets[0]
        } else {
            descriptor_sets[i]
        };

        let begin_info = vk::CommandBufferBeginInfo::builder();

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(scene.render_pass)
            .framebuffer(framebuffers[i])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: scene.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.device.begin_command_buffer(cmd, &begin_info)?;

            device.device.cmd_begin_render_pass(
                cmd,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );

            device
                .device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, scene.pipeline);

            device
                .device
                .cmd_bind_vertex_buffers(cmd, 0, &[scene.vertex_buffer], &[0]);

            device.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                scene.pipeline_layout,
                0,
                &[descriptor_set],
                &[],
            );

            device.device.cmd_draw(
                cmd,
                draw.vertex_count,
                draw.instance_count,
                draw.first_vertex,
                draw.first_instance,
            );

            device.device.cmd_end_render_pass(cmd);
            device.device.end_command_buffer(cmd)?;
        }
    }

    log::info!(
        "Recorded {} command buffers ({} vertices each)",
        command_buffers.len(),
        draw.vertex_count
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_call_covers_the_whole_generated_buffer() {
        let grid = ComputeGrid {
            width: 32,
            height: 32,
            depth: 32,
            verts_per_invocation: 15,
        };
        let draw = DrawCall::for_grid(&grid);
        assert_eq!(draw.vertex_count, 491_520);
        assert_eq!(draw.instance_count, 1);
        assert_eq!(draw.first_vertex, 0);
        assert_eq!(draw.first_instance, 0);
    }

    #[test]
    fn one_command_buffer_per_swapchain_image() {
        for image_count in 1..=8 {
            assert!(check_binding_counts(image_count, image_count, 1).is_ok());
            assert!(check_binding_counts(image_count, image_count, image_count).is_ok());
        }
        // Mismatched buffer count is a fatal setup error, not a draw-time one
        assert!(check_binding_counts(2, 3, 1).is_err());
        assert!(check_binding_counts(3, 3, 2).is_err());
    }

    #[test]
    fn draw_call_scales_with_grid() {
        let grid = ComputeGrid {
            width: 4,
            height: 2,
            depth: 1,
            verts_per_invocation: 3,
        };
        assert_eq!(DrawCall::for_grid(&grid).vertex_count, 24);
    }
}
