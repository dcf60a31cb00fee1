//! End-to-end boot attempts against the simulated board

mod common;

use common::{Event, ImageBuilder, Part, position, rig};
use fsbl::boot::{ERROR_STATUS_REGISTER, FSBL_COMPLETED};
use fsbl::cpu::{CpuId, DeviceId, ExecState};
use fsbl::image::atf::{ATF_MAGIC, FLAG_CPU_SHIFT};
use fsbl::platform::Platform;
use fsbl::platform::sim::{SIM_ATF_PARAMS_ADDRESS, SimPlatform};
use fsbl::platform::zynqmp::{apu, crl_apb, csu, efuse, pmu_global, rpu};
use fsbl::{BootOutcome, Fsbl, FsblConfig};

const QSPI32: u32 = 0x2;

fn board(cluster_id: u64) -> SimPlatform {
    let mut sim = SimPlatform::new().with_cluster_id(cluster_id);
    sim.preset(crl_apb::BOOT_MODE_USER, QSPI32);
    sim
}

fn config() -> FsblConfig {
    FsblConfig {
        poll_budget: 16,
        early_handoff: true,
        force_encryption: true,
        ..FsblConfig::default()
    }
}

#[test]
fn r5_boot_releases_a53_and_exits_to_own_application() {
    let image = ImageBuilder::new()
        .part(Part::ps(CpuId::A53_0, 0x20_0000))
        .part(Part {
            exec: 0x100,
            ..Part::ps(CpuId::None, 0x0)
        })
        .build();
    let mut sim = board(0x100);
    sim.preset(rpu::GLBL_CNTL, rpu::GLBL_CNTL_SLSPLIT);
    let (mut board, mut flash, events) = rig(sim, image);

    let outcome = Fsbl::new(&mut board, &mut flash, config()).run();

    assert_eq!(
        outcome,
        BootOutcome::Exit {
            address: 0x100,
            exec_state: ExecState::Aarch64
        }
    );
    let loads: Vec<_> = events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Load { dest, .. } => Some(*dest),
            _ => None,
        })
        .collect();
    // own partition lands in the global TCM alias
    assert_eq!(loads, [0x20_0000, 0xFFE0_0000]);

    assert_eq!(board.sim.read32(apu::rvbar_low(0)), 0x20_0000);
    assert_eq!(board.sim.read32(ERROR_STATUS_REGISTER), FSBL_COMPLETED);
    assert_eq!(
        board.sim.read32(pmu_global::GLOB_GEN_STORAGE6),
        SIM_ATF_PARAMS_ADDRESS
    );

    let atf = board.sim.atf_params().copied().unwrap();
    assert_eq!(atf.magic, ATF_MAGIC);
    assert_eq!(atf.entries().len(), 1);
    assert_eq!(atf.entries()[0].entry_point, 0x20_0000);
    assert_eq!(atf.entries()[0].flags >> FLAG_CPU_SHIFT, 0);
}

#[test]
fn corrupted_image_header_table_falls_back() {
    let image = ImageBuilder::new()
        .part(Part::ps(CpuId::A53_0, 0x10_0000))
        .corrupt_iht()
        .build();
    let (mut board, mut flash, events) = rig(board(0), image);

    let outcome = Fsbl::new(&mut board, &mut flash, config()).run();

    assert_eq!(outcome, BootOutcome::Restart { multiboot: 1 });
    assert_eq!(board.sim.read32(ERROR_STATUS_REGISTER), 0x2011);
    assert_eq!(board.sim.read32(csu::MULTI_BOOT), 1);
    assert!(
        !events
            .borrow()
            .iter()
            .any(|event| matches!(event, Event::Load { .. }))
    );
}

#[test]
fn r5_target_is_released_before_later_partitions_load() {
    let image = ImageBuilder::new()
        .part(Part::ps(CpuId::R5_1, 0x0))
        .part(Part::ps(CpuId::A53_0, 0x10_0000))
        .build();
    let (mut board, mut flash, events) = rig(board(0), image);

    let outcome = Fsbl::new(&mut board, &mut flash, config()).run();

    assert!(matches!(
        outcome,
        BootOutcome::Exit {
            address: 0x10_0000,
            ..
        }
    ));

    let r5_load = position(&events, |event| {
        matches!(event, Event::Load { dest: 0xFFE9_0000, .. })
    })
    .unwrap();
    let r5_release = position(&events, |event| {
        matches!(event, Event::Write(addr, value)
            if *addr == rpu::RPU_1_CFG && value & rpu::CFG_NCPUHALT != 0)
    })
    .unwrap();
    let a53_load = position(&events, |event| {
        matches!(event, Event::Load { dest: 0x10_0000, .. })
    })
    .unwrap();
    let released = position(&events, |event| *event == Event::DeviceReleased).unwrap();

    assert!(r5_load < r5_release);
    assert!(r5_release < a53_load);
    assert!(a53_load < released);
    // the core is released once
    assert_eq!(
        events
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Write(addr, value)
                if *addr == rpu::RPU_1_CFG && value & rpu::CFG_NCPUHALT != 0))
            .count(),
        1
    );
}

#[test]
fn without_early_handoff_r5_waits_for_the_final_pass() {
    let image = ImageBuilder::new()
        .part(Part::ps(CpuId::R5_1, 0x0))
        .part(Part::ps(CpuId::A53_0, 0x10_0000))
        .build();
    let (mut board, mut flash, events) = rig(board(0), image);
    let config = FsblConfig {
        early_handoff: false,
        ..config()
    };

    Fsbl::new(&mut board, &mut flash, config).run();

    let r5_release = position(&events, |event| {
        matches!(event, Event::Write(addr, value)
            if *addr == rpu::RPU_1_CFG && value & rpu::CFG_NCPUHALT != 0)
    })
    .unwrap();
    let released = position(&events, |event| *event == Event::DeviceReleased).unwrap();
    assert!(released < r5_release);
}

#[test]
fn jtag_boot_completes_without_loading() {
    let mut sim = board(0);
    sim.preset(crl_apb::BOOT_MODE_USER, 0x0);
    let (mut board, mut flash, events) = rig(sim, Vec::new());

    let outcome = Fsbl::new(&mut board, &mut flash, config()).run();

    assert_eq!(outcome, BootOutcome::Idle);
    assert_eq!(board.sim.read32(ERROR_STATUS_REGISTER), FSBL_COMPLETED);
    assert!(
        events
            .borrow()
            .iter()
            .all(|event| matches!(event, Event::Write(..)))
    );
}

#[test]
fn power_up_timeout_fails_stage4() {
    let image = ImageBuilder::new()
        .part(Part::ps(CpuId::A53_1, 0x20_0000))
        .build();
    let mut sim = board(0);
    sim.pin(pmu_global::REQ_PWRUP_STATUS, 0xFFFF_FFFF);
    let (mut board, mut flash, _) = rig(sim, image);

    let outcome = Fsbl::new(&mut board, &mut flash, config()).run();

    assert_eq!(outcome, BootOutcome::Restart { multiboot: 1 });
    assert_eq!(board.sim.read32(ERROR_STATUS_REGISTER), 0x4031);
}

#[test]
fn fused_off_core_is_rejected() {
    let image = ImageBuilder::new()
        .part(Part::ps(CpuId::A53_2, 0x20_0000))
        .build();
    let mut sim = board(0);
    sim.preset(efuse::IPDISABLE, efuse::IPDISABLE_CG);
    let (mut board, mut flash, _) = rig(sim, image);

    Fsbl::new(&mut board, &mut flash, config()).run();

    assert_eq!(board.sim.read32(ERROR_STATUS_REGISTER), 0x4030);
}

#[test]
fn unencrypted_partition_with_enc_only_fuse() {
    let image = ImageBuilder::new()
        .part(Part::ps(CpuId::A53_0, 0x20_0000))
        .build();
    let mut sim = board(0);
    sim.preset(efuse::SEC_CTRL, efuse::SEC_CTRL_ENC_ONLY);
    let (mut board, mut flash, _) = rig(sim, image);

    let outcome = Fsbl::new(&mut board, &mut flash, config()).run();

    assert_eq!(outcome, BootOutcome::Restart { multiboot: 1 });
    assert_eq!(board.sim.read32(ERROR_STATUS_REGISTER), 0x302A);
}

#[test]
fn apu_only_reset_reloads_only_a53_partitions() {
    let image = ImageBuilder::new()
        .part(Part::ps(CpuId::R5_0, 0x0))
        .part(Part::ps(CpuId::A53_0, 0x10_0000))
        .build();
    let mut sim = board(0);
    sim.preset(pmu_global::GLOB_GEN_STORAGE4, pmu_global::APU_ONLY_RESET);
    let (mut board, mut flash, events) = rig(sim, image);

    let outcome = Fsbl::new(&mut board, &mut flash, config()).run();

    assert!(matches!(outcome, BootOutcome::Exit { address: 0x10_0000, .. }));
    let loads: Vec<_> = events
        .borrow()
        .iter()
        .filter(|event| matches!(event, Event::Load { .. }))
        .copied()
        .collect();
    assert_eq!(loads.len(), 1);
    assert!(matches!(loads[0], Event::Load { dest: 0x10_0000, .. }));
}

#[test]
fn fallback_stops_at_the_configured_cap() {
    let image = ImageBuilder::new().corrupt_iht().build();
    let mut sim = board(0);
    sim.preset(csu::MULTI_BOOT, 3);
    let (mut board, mut flash, _) = rig(sim, image);
    let config = FsblConfig {
        max_fallback_attempts: Some(3),
        ..config()
    };

    let outcome = Fsbl::new(&mut board, &mut flash, config).run();

    // multiboot 3 points past the end of the flash
    assert_eq!(outcome, BootOutcome::Halt { status: 0x2010 });
    assert_eq!(board.sim.read32(csu::MULTI_BOOT), 3);
}

#[test]
fn pl_bitstream_without_staging_address_is_not_copied() {
    let image = ImageBuilder::new()
        .part(Part {
            device: DeviceId::Pl,
            ..Part::ps(CpuId::None, 0xFFFF_FFFF)
        })
        .part(Part::ps(CpuId::A53_0, 0x10_0000))
        .build();
    let (mut board, mut flash, events) = rig(board(0), image);

    let mut fsbl = Fsbl::new(&mut board, &mut flash, config());
    let outcome = fsbl.run();

    assert!(matches!(outcome, BootOutcome::Exit { address: 0x10_0000, .. }));
    assert_eq!(
        fsbl.instance()
            .image_header_table()
            .map(|iht| iht.partition_count),
        Some(3)
    );
    assert_eq!(
        events
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Load { .. }))
            .count(),
        1
    );
}

#[test]
fn entry_point_outside_every_region_is_never_handed_off() {
    let image = ImageBuilder::new()
        .part(Part {
            exec: 0x9000_0000,
            ..Part::ps(CpuId::A53_0, 0x20_0000)
        })
        .build();
    let (mut board, mut flash, events) = rig(board(0), image);

    let outcome = Fsbl::new(&mut board, &mut flash, config()).run();

    assert_eq!(outcome, BootOutcome::Restart { multiboot: 1 });
    assert_eq!(board.sim.read32(ERROR_STATUS_REGISTER), 0x302C);
    assert!(
        !events
            .borrow()
            .iter()
            .any(|event| matches!(event, Event::Load { .. }))
    );
}
