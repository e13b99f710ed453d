// Queue-family ownership transfer for the generated geometry buffer.
//
// A buffer created with EXCLUSIVE sharing belongs to one queue family at a
// time. Moving it from the compute family to the graphics family takes a
// release barrier submitted on the source queue followed by a matching
// acquire barrier on the destination queue, with the source guaranteed
// drained in between. Happens exactly once per buffer, at startup.

use anyhow::{Context, Result};
use ash::vk;
use super::VulkanDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Release,
    Acquire,
}

/// One half of the barrier pair, including the queue it must be submitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierStep {
    pub side: Side,
    pub src_family: u32,
    pub dst_family: u32,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

/// Build the ordered release/acquire pair for moving a compute-written
/// buffer to the graphics family. Both steps carry the same family pair;
/// submission order is the order of the returned array.
pub fn transfer_steps(src_family: u32, dst_family: u32) -> [BarrierStep; 2] {
    [
        BarrierStep {
            side: Side::Release,
            src_family,
            dst_family,
            src_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
            dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            src_access: vk::AccessFlags::SHADER_WRITE,
            // Destination access is ignored by a release barrier
            dst_access: vk::AccessFlags::empty(),
        },
        BarrierStep {
            side: Side::Acquire,
            src_family,
            dst_family,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::ALL_GRAPHICS,
            // Source access is ignored by an acquire barrier
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
        },
    ]
}

/// Submission seam: the real implementation records and submits against a
/// queue; tests substitute a recorder to observe ordering.
pub trait BarrierSubmitter {
    fn submit(&mut self, step: &BarrierStep) -> Result<()>;
}

/// Run the transfer steps in order through a submitter.
pub fn execute(steps: &[BarrierStep], submitter: &mut dyn BarrierSubmitter) -> Result<()> {
    for step in steps {
        submitter.submit(step)?;
    }
    Ok(())
}

/// Submits each barrier as a one-shot command buffer on the transient pool
/// of the queue that owns that side, waiting the queue idle before the next
/// step runs.
struct DeviceSubmitter<'a> {
    device: &'a VulkanDevice,
    buffer: vk::Buffer,
}

impl BarrierSubmitter for DeviceSubmitter<'_> {
    fn submit(&mut self, step: &BarrierStep) -> Result<()> {
        let (pool, queue) = match step.side {
            Side::Release => (self.device.compute_transient_pool, self.device.compute_queue),
            Side::Acquire => (
                self.device.graphics_transient_pool,
                self.device.graphics_queue,
            ),
        };

        let barrier = vk::BufferMemoryBarrier::builder()
            .src_access_mask(step.src_access)
            .dst_access_mask(step.dst_access)
            .src_queue_family_index(step.src_family)
            .dst_queue_family_index(step.dst_family)
            .buffer(self.buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .build();

        self.device.submit_one_shot(pool, queue, |cmd| unsafe {
            self.device.device.cmd_pipeline_barrier(
                cmd,
                step.src_stage,
                step.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        })
    }
}

/// Move `buffer` from the compute queue family to the graphics queue
/// family. Must be called exactly once per buffer, after the compute queue
/// has drained. A no-op when both operations share one family.
pub fn transfer_buffer_ownership(device: &VulkanDevice, buffer: vk::Buffer) -> Result<()> {
    if device.compute_queue_family == device.graphics_queue_family {
        log::info!("Compute and graphics share a queue family; no ownership transfer needed");
        return Ok(());
    }

    log::info!(
        "Transferring buffer ownership: family {} -> {}",
        device.compute_queue_family,
        device.graphics_queue_family
    );

    let steps = transfer_steps(device.compute_queue_family, device.graphics_queue_family);
    let mut submitter = DeviceSubmitter { device, buffer };
    execute(&steps, &mut submitter).context("Buffer ownership transfer failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSubmitter {
        submitted: Vec<BarrierStep>,
    }

    impl BarrierSubmitter for RecordingSubmitter {
        fn submit(&mut self, step: &BarrierStep) -> Result<()> {
            self.submitted.push(*step);
            Ok(())
        }
    }

    #[test]
    fn release_is_submitted_before_acquire() {
        let steps = transfer_steps(1, 0);
        let mut queue = RecordingSubmitter { submitted: vec![] };
        execute(&steps, &mut queue).unwrap();

        assert_eq!(queue.submitted.len(), 2);
        assert_eq!(queue.submitted[0].side, Side::Release);
        assert_eq!(queue.submitted[1].side, Side::Acquire);
    }

    #[test]
    fn both_barriers_reference_the_same_family_pair() {
        let [release, acquire] = transfer_steps(2, 0);
        assert_eq!(release.src_family, 2);
        assert_eq!(release.dst_family, 0);
        assert_eq!(acquire.src_family, release.src_family);
        assert_eq!(acquire.dst_family, release.dst_family);
    }

    #[test]
    fn release_sources_compute_and_acquire_targets_graphics() {
        let [release, acquire] = transfer_steps(1, 0);
        assert_eq!(release.src_stage, vk::PipelineStageFlags::COMPUTE_SHADER);
        assert_eq!(release.src_access, vk::AccessFlags::SHADER_WRITE);
        assert_eq!(acquire.dst_stage, vk::PipelineStageFlags::ALL_GRAPHICS);
        assert_eq!(acquire.dst_access, vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
    }

    #[test]
    fn failed_release_stops_the_transfer() {
        struct FailingSubmitter {
            calls: usize,
        }
        impl BarrierSubmitter for FailingSubmitter {
            fn submit(&mut self, _step: &BarrierStep) -> Result<()> {
                self.calls += 1;
                anyhow::bail!("device lost")
            }
        }

        let steps = transfer_steps(1, 0);
        let mut queue = FailingSubmitter { calls: 0 };
        assert!(execute(&steps, &mut queue).is_err());
        // The acquire must never be issued after a failed release
        assert_eq!(queue.calls, 1);
    }
}
