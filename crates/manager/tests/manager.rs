use hideseek_common::consts::{EPISODE_LEN, MAX_AGENTS, PREP_PERIOD};
use hideseek_common::{CameraMode, NUM_EXPORTED_BUFFERS, resolve_image, ImageKind};
use hideseek_manager::{Config, Device, ElementType, ExecMode, ExportSlot, Manager, ManagerError, TensorError};

fn host_config(num_worlds: u32) -> Config {
    Config {
        exec_mode: ExecMode::HostParallel,
        num_worlds,
        min_entities_per_world: 1,
        max_entities_per_world: 10,
        worker_threads: Some(2),
        ..Config::default()
    }
}

#[test]
fn construct_and_drop_without_stepping() {
    let manager = Manager::new(host_config(3)).unwrap();
    assert_eq!(manager.num_worlds(), 3);
    assert_eq!(manager.steps(), 0);
    drop(manager);
}

#[test]
fn host_mode_ignores_device_id() {
    let config = Config {
        device_id: 3,
        enable_render: true,
        render_width: 4,
        render_height: 2,
        ..host_config(2)
    };
    let manager = Manager::new(config).unwrap();
    assert_eq!(manager.device(), Device::Host);
    assert_eq!(manager.reward().device(), Device::Host);
    assert_eq!(manager.depth().unwrap().device(), Device::Host);
    assert_eq!(manager.rgb().unwrap().device(), Device::Host);
}

#[test]
fn reward_is_zero_before_first_step() {
    let mut manager = Manager::new(host_config(4)).unwrap();
    let reward = manager.reward();
    assert_eq!(reward.shape(), &[4, MAX_AGENTS, 1]);
    assert_eq!(reward.element_type(), ElementType::Float32);
    assert_eq!(reward.device(), Device::Host);
    assert!(reward.as_slice::<f32>().unwrap().iter().all(|&r| r == 0.0));

    manager.step();
    assert_eq!(manager.reward().shape(), &[4, MAX_AGENTS, 1]);
    // Still inside the preparation period.
    assert!(manager.reward().as_slice::<f32>().unwrap().iter().all(|&r| r == 0.0));
}

#[test]
fn every_export_leads_with_world_count() {
    let manager = Manager::new(host_config(5)).unwrap();
    let a = MAX_AGENTS;
    let expected: [(&str, Vec<usize>); NUM_EXPORTED_BUFFERS] = [
        ("reset", vec![5, 3]),
        ("done", vec![5, 1]),
        ("prepCounter", vec![5, 1]),
        ("action", vec![5, a, 5]),
        ("reward", vec![5, a, 1]),
        ("agentType", vec![5, a, 1]),
        ("agentMask", vec![5, a, 1]),
        ("agentData", vec![5, a, a - 1, 4]),
        ("boxData", vec![5, a, 9, 7]),
        ("rampData", vec![5, a, 2, 5]),
        ("visibleAgentsMask", vec![5, a, a - 1, 1]),
        ("visibleBoxesMask", vec![5, a, 9, 1]),
        ("visibleRampsMask", vec![5, a, 2, 1]),
        ("globalPositions", vec![5, 9 + 2 + a, 2]),
        ("lidar", vec![5, a, 30]),
    ];
    let views = [
        manager.reset(),
        manager.done(),
        manager.prep_counter(),
        manager.action(),
        manager.reward(),
        manager.agent_type(),
        manager.agent_mask(),
        manager.agent_data(),
        manager.box_data(),
        manager.ramp_data(),
        manager.visible_agents_mask(),
        manager.visible_boxes_mask(),
        manager.visible_ramps_mask(),
        manager.global_positions(),
        manager.lidar(),
    ];
    for (slot, ((name, shape), view)) in expected.iter().zip(&views).enumerate() {
        assert_eq!(ExportSlot::from_index(slot).unwrap().name(), *name);
        assert_eq!(view.shape(), shape.as_slice(), "{name}");
        assert_eq!(view.handle().size_bytes(), view.num_elements() * view.element_type().size_bytes());
        assert_eq!(&manager.export_tensor(slot).unwrap(), view, "{name}");
    }
    assert_eq!(
        manager.export_tensor(NUM_EXPORTED_BUFFERS),
        Err(TensorError::UnknownSlot(NUM_EXPORTED_BUFFERS))
    );
}

#[test]
fn repeated_accessors_agree() {
    let mut manager = Manager::new(host_config(2)).unwrap();
    manager.step();
    assert_eq!(manager.lidar(), manager.lidar());
    assert_eq!(manager.agent_data(), manager.agent_data());
    assert_eq!(manager.lidar().host_ptr(), manager.lidar().host_ptr());
}

#[test]
fn wrong_element_type_is_refused() {
    let manager = Manager::new(host_config(1)).unwrap();
    assert_eq!(
        manager.done().as_slice::<f32>(),
        Err(TensorError::ElementTypeMismatch {
            actual: ElementType::Int32,
            requested: ElementType::Float32,
        })
    );
}

#[test]
fn images_error_with_rendering_disabled() {
    let mut manager = Manager::new(host_config(2)).unwrap();
    assert_eq!(manager.camera_mode(), CameraMode::None);
    for _ in 0..2 {
        assert_eq!(manager.depth(), Err(TensorError::RenderingDisabled));
        assert_eq!(manager.rgb(), Err(TensorError::RenderingDisabled));
        manager.step();
    }
}

#[test]
fn rendered_images_have_view_shape() {
    let config = Config {
        enable_render: true,
        render_width: 8,
        render_height: 6,
        ..host_config(2)
    };
    let mut manager = Manager::new(config).unwrap();
    assert_eq!(manager.camera_mode(), CameraMode::Perspective);
    manager.step();

    let depth = manager.depth().unwrap();
    let rgb = manager.rgb().unwrap();
    assert_eq!(depth.shape(), resolve_image(ImageKind::Depth, 2, 8, 6).1.as_slice());
    assert_eq!(depth.shape(), &[2, MAX_AGENTS, 6, 8, 1]);
    assert_eq!(rgb.shape(), &[2, MAX_AGENTS, 6, 8, 4]);
    assert_eq!(rgb.element_type(), ElementType::UInt8);

    // Default teams: agent 0 of world 0 is active and sees something.
    let pixels = 8 * 6;
    let depth = depth.as_slice::<f32>().unwrap();
    assert!(depth[..pixels].iter().all(|&d| d > 0.0));
    assert_eq!(rgb.as_slice::<u8>().unwrap().len(), 2 * MAX_AGENTS * pixels * 4);
}

#[test]
fn counters_progress_monotonically() {
    let mut manager = Manager::new(host_config(2)).unwrap();
    let read = |m: &Manager| {
        (
            m.done().as_slice::<i32>().unwrap().to_vec(),
            m.prep_counter().as_slice::<i32>().unwrap().to_vec(),
        )
    };
    let (done, prep) = read(&manager);
    assert_eq!(done, vec![0, 0]);
    assert_eq!(prep, vec![PREP_PERIOD as i32; 2]);

    let mut last_prep = prep;
    for tick in 1..=EPISODE_LEN {
        manager.step();
        let (done, prep) = read(&manager);
        for w in 0..2 {
            assert!(prep[w] >= 0);
            assert!(prep[w] <= last_prep[w], "tick {tick}");
            assert_eq!(done[w], i32::from(tick >= EPISODE_LEN), "tick {tick}");
        }
        last_prep = prep;
    }

    // The finished episode resets automatically on the next step.
    manager.step();
    let (done, prep) = read(&manager);
    assert_eq!(done, vec![0, 0]);
    assert_eq!(prep, vec![PREP_PERIOD as i32 - 1; 2]);
    assert_eq!(manager.episodes_started().unwrap(), 4);
}

#[test]
fn reset_requests_are_consumed() {
    let mut manager = Manager::new(host_config(3)).unwrap();
    assert_eq!(manager.episodes_started().unwrap(), 3);
    manager.step();

    let mut reset = manager.reset_tensor_mut();
    reset.copy_from_slice(&[0, 0, 0, 1, 3, 1, 0, 0, 0]).unwrap();
    manager.step();

    assert_eq!(manager.episodes_started().unwrap(), 4);
    let reset = manager.reset().as_slice::<i32>().unwrap().to_vec();
    assert_eq!(reset[3], 0);
    let mask = manager.agent_mask().as_slice::<f32>().unwrap().to_vec();
    let world1 = &mask[MAX_AGENTS..2 * MAX_AGENTS];
    assert_eq!(world1, &[1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    let types = manager.agent_type().as_slice::<i32>().unwrap().to_vec();
    assert_eq!(&types[MAX_AGENTS..MAX_AGENTS + 4], &[0, 0, 0, 1]);
    assert_eq!(manager.prep_counter().as_slice::<i32>().unwrap()[1], PREP_PERIOD as i32 - 1);
}

#[test]
fn actions_are_writable_in_place() {
    let mut manager = Manager::new(host_config(2)).unwrap();
    {
        let mut action = manager.action_tensor_mut();
        assert_eq!(action.shape(), &[2, MAX_AGENTS, 5]);
        action.fill(5i32).unwrap();
        action.as_mut_slice::<i32>().unwrap()[0] = 10;
    }
    let action = manager.action().as_slice::<i32>().unwrap().to_vec();
    assert_eq!(action[0], 10);
    assert!(action[1..].iter().all(|&a| a == 5));

    let before = manager.global_positions().as_slice::<f32>().unwrap().to_vec();
    manager.step();
    let after = manager.global_positions().as_slice::<f32>().unwrap();
    assert_eq!(before.len(), after.len());
}

#[test]
fn invalid_config_is_rejected() {
    let config = Config {
        min_entities_per_world: 5,
        max_entities_per_world: 2,
        ..host_config(1)
    };
    assert!(matches!(Manager::new(config), Err(ManagerError::Config(_))));
    assert!(matches!(Manager::new(host_config(0)), Err(ManagerError::Config(_))));
}

#[test]
fn missing_data_dir_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().join("nowhere"),
        ..host_config(1)
    };
    assert!(matches!(Manager::new(config), Err(ManagerError::Asset(_))));
}

#[test]
fn malformed_hull_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    for entry in std::fs::read_dir(hideseek_common::config::default_data_dir()).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
    }
    std::fs::write(dir.path().join("cube_collision.obj"), "v 0 0 0\nf 1 2 3\n").unwrap();

    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..host_config(1)
    };
    assert!(matches!(Manager::new(config), Err(ManagerError::Asset(_))));
}

#[cfg(not(feature = "accelerator"))]
#[test]
fn accelerator_requires_feature() {
    let config = Config {
        exec_mode: ExecMode::Accelerator,
        ..host_config(1)
    };
    assert!(matches!(Manager::new(config), Err(ManagerError::AcceleratorUnavailable)));
}

#[cfg(feature = "accelerator")]
mod accelerator {
    use super::*;

    fn try_manager(config: Config) -> Option<Manager> {
        match Manager::new(config) {
            Ok(manager) => Some(manager),
            Err(ManagerError::NoAdapter { .. } | ManagerError::RequestDevice(_)) => {
                eprintln!("no accelerator adapter; skipping");
                None
            }
            Err(err) => panic!("accelerator construction failed: {err}"),
        }
    }

    fn accel_config(num_worlds: u32) -> Config {
        Config {
            exec_mode: ExecMode::Accelerator,
            ..host_config(num_worlds)
        }
    }

    #[test]
    fn device_tensors_are_tagged_and_not_host_addressable() {
        let Some(mut manager) = try_manager(accel_config(4)) else {
            return;
        };
        let reward = manager.reward();
        assert_eq!(reward.shape(), &[4, MAX_AGENTS, 1]);
        assert_eq!(reward.device(), Device::Accelerator(0));
        assert!(reward.host_ptr().is_none());
        assert_eq!(
            reward.as_slice::<f32>(),
            Err(TensorError::NotHostAddressable {
                device: Device::Accelerator(0)
            })
        );

        let bytes = manager.download(&reward).unwrap();
        let rewards: &[f32] = bytemuck::cast_slice(&bytes);
        assert!(rewards.iter().all(|&r| r == 0.0));

        manager.step();
        assert_eq!(manager.reward().shape(), &[4, MAX_AGENTS, 1]);
    }

    #[test]
    fn device_counters_and_resets() {
        let Some(mut manager) = try_manager(accel_config(2)) else {
            return;
        };
        manager.step();
        manager.step();
        let prep = manager.download(&manager.prep_counter()).unwrap();
        assert_eq!(bytemuck::cast_slice::<u8, i32>(&prep), &[PREP_PERIOD as i32 - 2; 2]);

        manager
            .reset_tensor_mut()
            .copy_from_slice(&[1, 1, 1, 0, 0, 0])
            .unwrap();
        manager.step();
        assert_eq!(manager.episodes_started().unwrap(), 3);
        let reset = manager.download(&manager.reset()).unwrap();
        assert_eq!(bytemuck::cast_slice::<u8, i32>(&reset)[0], 0);
        let mask = manager.download(&manager.agent_mask()).unwrap();
        assert_eq!(
            &bytemuck::cast_slice::<u8, f32>(&mask)[..MAX_AGENTS],
            &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn device_rendering_exposes_images() {
        let config = Config {
            enable_render: true,
            render_width: 8,
            render_height: 8,
            debug_compile: true,
            ..accel_config(1)
        };
        let Some(manager) = try_manager(config) else {
            return;
        };
        let depth = manager.depth().unwrap();
        assert_eq!(depth.shape(), &[1, MAX_AGENTS, 8, 8, 1]);
        let bytes = manager.download(&depth).unwrap();
        let depth: &[f32] = bytemuck::cast_slice(&bytes);
        assert!(depth[..64].iter().all(|&d| d > 0.0));
    }

    fn schema(manager: &Manager) -> Vec<(&'static str, Vec<usize>, ElementType)> {
        let named = [
            ("reset", manager.reset()),
            ("done", manager.done()),
            ("prep_counter", manager.prep_counter()),
            ("action", manager.action()),
            ("reward", manager.reward()),
            ("agent_type", manager.agent_type()),
            ("agent_mask", manager.agent_mask()),
            ("agent_data", manager.agent_data()),
            ("box_data", manager.box_data()),
            ("ramp_data", manager.ramp_data()),
            ("visible_agents_mask", manager.visible_agents_mask()),
            ("visible_boxes_mask", manager.visible_boxes_mask()),
            ("visible_ramps_mask", manager.visible_ramps_mask()),
            ("global_positions", manager.global_positions()),
            ("lidar", manager.lidar()),
            ("depth", manager.depth().unwrap()),
            ("rgb", manager.rgb().unwrap()),
        ];
        named
            .into_iter()
            .map(|(name, tensor)| (name, tensor.shape().to_vec(), tensor.element_type()))
            .collect()
    }

    #[test]
    fn both_backends_expose_the_same_schema() {
        let host_config = Config {
            enable_render: true,
            render_width: 8,
            render_height: 6,
            ..host_config(3)
        };
        let Some(device) = try_manager(Config {
            exec_mode: ExecMode::Accelerator,
            ..host_config.clone()
        }) else {
            return;
        };
        let host = Manager::new(host_config).unwrap();

        let host_schema = schema(&host);
        assert_eq!(host_schema.len(), NUM_EXPORTED_BUFFERS + 2);
        assert_eq!(host_schema, schema(&device));

        let host_rgb = host.rgb().unwrap();
        let device_rgb = device.rgb().unwrap();
        assert_eq!(host_rgb.as_bytes().unwrap().len(), 3 * MAX_AGENTS * 6 * 8 * 4);
        assert_eq!(
            host_rgb.handle().size_bytes(),
            device_rgb.handle().size_bytes()
        );
        assert_eq!(
            device.download(&device_rgb).unwrap().len(),
            host_rgb.as_bytes().unwrap().len()
        );
    }

    #[test]
    fn oversized_render_batch_is_refused() {
        // 1000 worlds of 512x512 views need more than 4 GiB per image
        // target, past any storage binding limit.
        let config = Config {
            enable_render: true,
            render_width: 512,
            render_height: 512,
            ..accel_config(1000)
        };
        match Manager::new(config) {
            Err(ManagerError::NoAdapter { .. } | ManagerError::RequestDevice(_)) => {
                eprintln!("no accelerator adapter; skipping");
            }
            Err(ManagerError::DeviceLimit { buffer, size, limit }) => {
                assert_eq!(buffer, "depth");
                assert!(size > limit);
            }
            Err(err) => panic!("expected a device limit error, got {err}"),
            Ok(_) => panic!("oversized render batch was accepted"),
        }
    }
}
