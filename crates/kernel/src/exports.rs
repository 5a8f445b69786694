//! Host-resident export buffers.
//!
//! One contiguous buffer per export slot, world-major, sized from the export
//! table. Worlds step against disjoint per-world views of every buffer.

use hideseek_common::ExportSlot;

/// Every exported buffer for a batch of worlds.
#[derive(Debug, Clone)]
pub struct HostExports {
    num_worlds: usize,
    reset: Vec<i32>,
    done: Vec<i32>,
    prep_counter: Vec<i32>,
    action: Vec<i32>,
    reward: Vec<f32>,
    agent_type: Vec<i32>,
    agent_mask: Vec<f32>,
    agent_data: Vec<f32>,
    box_data: Vec<f32>,
    ramp_data: Vec<f32>,
    visible_agents_mask: Vec<f32>,
    visible_boxes_mask: Vec<f32>,
    visible_ramps_mask: Vec<f32>,
    global_positions: Vec<f32>,
    lidar: Vec<f32>,
}

/// One world's rows of every export buffer.
#[derive(Debug)]
pub struct WorldExports<'a> {
    pub reset: &'a mut [i32],
    pub done: &'a mut [i32],
    pub prep_counter: &'a mut [i32],
    pub action: &'a mut [i32],
    pub reward: &'a mut [f32],
    pub agent_type: &'a mut [i32],
    pub agent_mask: &'a mut [f32],
    pub agent_data: &'a mut [f32],
    pub box_data: &'a mut [f32],
    pub ramp_data: &'a mut [f32],
    pub visible_agents_mask: &'a mut [f32],
    pub visible_boxes_mask: &'a mut [f32],
    pub visible_ramps_mask: &'a mut [f32],
    pub global_positions: &'a mut [f32],
    pub lidar: &'a mut [f32],
}

fn zeroed<T: Default + Clone>(slot: ExportSlot, num_worlds: usize) -> Vec<T> {
    vec![T::default(); num_worlds * slot.per_world_len()]
}

impl HostExports {
    /// Zero-filled buffers for `num_worlds` worlds.
    pub fn new(num_worlds: usize) -> Self {
        use ExportSlot::*;
        Self {
            num_worlds,
            reset: zeroed(Reset, num_worlds),
            done: zeroed(Done, num_worlds),
            prep_counter: zeroed(PrepCounter, num_worlds),
            action: zeroed(Action, num_worlds),
            reward: zeroed(Reward, num_worlds),
            agent_type: zeroed(AgentType, num_worlds),
            agent_mask: zeroed(AgentMask, num_worlds),
            agent_data: zeroed(AgentData, num_worlds),
            box_data: zeroed(BoxData, num_worlds),
            ramp_data: zeroed(RampData, num_worlds),
            visible_agents_mask: zeroed(VisibleAgentsMask, num_worlds),
            visible_boxes_mask: zeroed(VisibleBoxesMask, num_worlds),
            visible_ramps_mask: zeroed(VisibleRampsMask, num_worlds),
            global_positions: zeroed(GlobalPositions, num_worlds),
            lidar: zeroed(Lidar, num_worlds),
        }
    }

    pub fn num_worlds(&self) -> usize {
        self.num_worlds
    }

    /// Raw bytes of a slot's buffer.
    pub fn slot_bytes(&self, slot: ExportSlot) -> &[u8] {
        use ExportSlot::*;
        match slot {
            Reset => bytemuck::cast_slice(&self.reset),
            Done => bytemuck::cast_slice(&self.done),
            PrepCounter => bytemuck::cast_slice(&self.prep_counter),
            Action => bytemuck::cast_slice(&self.action),
            Reward => bytemuck::cast_slice(&self.reward),
            AgentType => bytemuck::cast_slice(&self.agent_type),
            AgentMask => bytemuck::cast_slice(&self.agent_mask),
            AgentData => bytemuck::cast_slice(&self.agent_data),
            BoxData => bytemuck::cast_slice(&self.box_data),
            RampData => bytemuck::cast_slice(&self.ramp_data),
            VisibleAgentsMask => bytemuck::cast_slice(&self.visible_agents_mask),
            VisibleBoxesMask => bytemuck::cast_slice(&self.visible_boxes_mask),
            VisibleRampsMask => bytemuck::cast_slice(&self.visible_ramps_mask),
            GlobalPositions => bytemuck::cast_slice(&self.global_positions),
            Lidar => bytemuck::cast_slice(&self.lidar),
        }
    }

    /// Mutable raw bytes of a slot's buffer.
    pub fn slot_bytes_mut(&mut self, slot: ExportSlot) -> &mut [u8] {
        use ExportSlot::*;
        match slot {
            Reset => bytemuck::cast_slice_mut(&mut self.reset),
            Done => bytemuck::cast_slice_mut(&mut self.done),
            PrepCounter => bytemuck::cast_slice_mut(&mut self.prep_counter),
            Action => bytemuck::cast_slice_mut(&mut self.action),
            Reward => bytemuck::cast_slice_mut(&mut self.reward),
            AgentType => bytemuck::cast_slice_mut(&mut self.agent_type),
            AgentMask => bytemuck::cast_slice_mut(&mut self.agent_mask),
            AgentData => bytemuck::cast_slice_mut(&mut self.agent_data),
            BoxData => bytemuck::cast_slice_mut(&mut self.box_data),
            RampData => bytemuck::cast_slice_mut(&mut self.ramp_data),
            VisibleAgentsMask => bytemuck::cast_slice_mut(&mut self.visible_agents_mask),
            VisibleBoxesMask => bytemuck::cast_slice_mut(&mut self.visible_boxes_mask),
            VisibleRampsMask => bytemuck::cast_slice_mut(&mut self.visible_ramps_mask),
            GlobalPositions => bytemuck::cast_slice_mut(&mut self.global_positions),
            Lidar => bytemuck::cast_slice_mut(&mut self.lidar),
        }
    }

    /// Split every buffer into per-world views, in world order.
    pub fn worlds_mut(&mut self) -> Vec<WorldExports<'_>> {
        use ExportSlot::*;
        let mut reset = self.reset.chunks_mut(Reset.per_world_len());
        let mut done = self.done.chunks_mut(Done.per_world_len());
        let mut prep_counter = self.prep_counter.chunks_mut(PrepCounter.per_world_len());
        let mut action = self.action.chunks_mut(Action.per_world_len());
        let mut reward = self.reward.chunks_mut(Reward.per_world_len());
        let mut agent_type = self.agent_type.chunks_mut(AgentType.per_world_len());
        let mut agent_mask = self.agent_mask.chunks_mut(AgentMask.per_world_len());
        let mut agent_data = self.agent_data.chunks_mut(AgentData.per_world_len());
        let mut box_data = self.box_data.chunks_mut(BoxData.per_world_len());
        let mut ramp_data = self.ramp_data.chunks_mut(RampData.per_world_len());
        let mut visible_agents_mask = self
            .visible_agents_mask
            .chunks_mut(VisibleAgentsMask.per_world_len());
        let mut visible_boxes_mask = self
            .visible_boxes_mask
            .chunks_mut(VisibleBoxesMask.per_world_len());
        let mut visible_ramps_mask = self
            .visible_ramps_mask
            .chunks_mut(VisibleRampsMask.per_world_len());
        let mut global_positions = self
            .global_positions
            .chunks_mut(GlobalPositions.per_world_len());
        let mut lidar = self.lidar.chunks_mut(Lidar.per_world_len());

        std::iter::from_fn(|| {
            Some(WorldExports {
                reset: reset.next()?,
                done: done.next()?,
                prep_counter: prep_counter.next()?,
                action: action.next()?,
                reward: reward.next()?,
                agent_type: agent_type.next()?,
                agent_mask: agent_mask.next()?,
                agent_data: agent_data.next()?,
                box_data: box_data.next()?,
                ramp_data: ramp_data.next()?,
                visible_agents_mask: visible_agents_mask.next()?,
                visible_boxes_mask: visible_boxes_mask.next()?,
                visible_ramps_mask: visible_ramps_mask.next()?,
                global_positions: global_positions.next()?,
                lidar: lidar.next()?,
            })
        })
        .collect()
    }

    /// A single world's views. `None` when out of range.
    pub fn world_mut(&mut self, world: usize) -> Option<WorldExports<'_>> {
        self.worlds_mut().into_iter().nth(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_match_registry_sizes() {
        let exports = HostExports::new(3);
        for slot in ExportSlot::ALL {
            let total: usize = slot.shape(3).iter().product();
            assert_eq!(
                exports.slot_bytes(slot).len(),
                total * slot.element_type().size_bytes(),
                "{}",
                slot.name()
            );
        }
    }

    #[test]
    fn world_views_are_disjoint_rows() {
        let mut exports = HostExports::new(2);
        {
            let mut worlds = exports.worlds_mut();
            assert_eq!(worlds.len(), 2);
            worlds[1].reward.fill(2.0);
            worlds[0].done[0] = 7;
        }
        let reward: &[f32] = bytemuck::cast_slice(exports.slot_bytes(ExportSlot::Reward));
        let per_world = ExportSlot::Reward.per_world_len();
        assert!(reward[..per_world].iter().all(|&r| r == 0.0));
        assert!(reward[per_world..].iter().all(|&r| r == 2.0));
        let done: &[i32] = bytemuck::cast_slice(exports.slot_bytes(ExportSlot::Done));
        assert_eq!(done, &[7, 0]);
    }

    #[test]
    fn world_mut_out_of_range() {
        let mut exports = HostExports::new(1);
        assert!(exports.world_mut(0).is_some());
        assert!(exports.world_mut(1).is_none());
    }
}
