//! Integration tests for board handle construction and teardown
//!
//! Covers:
//! - Successful construction of every model
//! - Rollback after failures at each acquisition step
//! - Idempotent teardown through `exit` and `Drop`
//! - Per-handle debug output

use std::cell::RefCell;
use std::rc::Rc;

use carrier_a201::layout::{self, CTRL_REG_SIZE};
use carrier_a201::*;
use carrier_platform::{BusType, MapDescriptor, PhysAddr, PlatformError, Resource};
use carrier_platform_mock::{Call, MockPlatform, MOCK_A16_BASE};

const BASE: u32 = 0x0040_0000;

fn a201_desc() -> MapDescriptor {
    MapDescriptor::new()
        .with_u32("PHYS_ADDR", BASE)
        .with_binary("IRQ_VECTOR", &[1, 2, 3, 4])
        .with_binary("IRQ_LEVEL", &[5, 5, 5, 5])
}

fn init<'p>(
    platform: &'p MockPlatform,
    desc: &mut MapDescriptor,
    model: BoardModel,
) -> Result<Board<&'p MockPlatform>> {
    Board::init(platform, desc, model.into(), BoardOptions::default())
}

/// Four slots, physical base, everything optional left out
#[test]
fn test_four_slot_board() {
    let platform = MockPlatform::new();
    let board = init(&platform, &mut a201_desc(), BoardModel::A201).unwrap();

    assert!(board.is_granted());
    for slot in 0..4 {
        assert!(board.is_mapped(slot), "slot {} not mapped", slot);
    }
    assert_eq!(board.get_stat(2, StatCode::IrqVector), Ok(StatValue::Value(3)));
    assert_eq!(board.get_stat(2, StatCode::IrqPriority), Ok(StatValue::Value(0)));

    // One grant covering all four control register pairs
    let base = PhysAddr::new(u64::from(BASE));
    let expected: Vec<Resource> = (0..4)
        .map(|slot| Resource::mem(layout::ctrl_reg_addr(base, slot), CTRL_REG_SIZE))
        .collect();
    assert_eq!(
        platform.calls()[0],
        Call::Assign {
            bus: BusType::Vme,
            bus_nbr: 0,
            resources: expected
        }
    );
    assert_eq!(platform.map_count(), 4);
    assert_eq!(platform.live_mappings(), 4);

    // Construction leaves the hardware alone
    assert_eq!(platform.register_access_count(), 0);
}

#[test]
fn test_slot_counts_per_model() {
    for (model, vectors) in [
        (BoardModel::A201, &[1u8, 2, 3, 4][..]),
        (BoardModel::B202, &[1, 2][..]),
        (BoardModel::B201, &[1][..]),
    ] {
        let platform = MockPlatform::new();
        let mut desc = MapDescriptor::new()
            .with_u32("PHYS_ADDR", BASE)
            .with_binary("IRQ_VECTOR", vectors)
            .with_binary("IRQ_LEVEL", vectors);

        let board = init(&platform, &mut desc, model).unwrap();
        assert_eq!(board.slot_count() as usize, vectors.len());
        assert_eq!(platform.map_count(), vectors.len());
        assert!(!board.is_mapped(board.slot_count()));
    }
}

/// Nothing is acquired when no address source is configured
#[test]
fn test_no_address_acquires_nothing() {
    let platform = MockPlatform::new();
    let mut desc = a201_desc();
    desc.remove("PHYS_ADDR");

    let err = init(&platform, &mut desc, BoardModel::A201).err();
    assert_eq!(err, Some(BoardError::NoAddress));
    assert_eq!(platform.map_count(), 0);
    assert_eq!(platform.unmap_count(), 0);
    assert!(platform.calls().is_empty());
}

#[test]
fn test_missing_irq_config_acquires_nothing() {
    let platform = MockPlatform::new();
    let mut desc = a201_desc();
    desc.remove("IRQ_VECTOR");

    let err = init(&platform, &mut desc, BoardModel::A201).err();
    assert!(matches!(err, Some(BoardError::Descriptor(e)) if e.is_key_not_found()));
    assert!(platform.calls().is_empty());
}

/// A failed mapping at slot k unmaps exactly slots 0..k
#[test]
fn test_mapping_rollback_at_each_slot() {
    let base = PhysAddr::new(u64::from(BASE));

    for k in 0..4u32 {
        let platform = MockPlatform::new();
        platform.fail_map_at(layout::ctrl_reg_addr(base, k));

        let err = init(&platform, &mut a201_desc(), BoardModel::A201).err();
        assert!(
            matches!(err, Some(BoardError::Mapping { slot, .. }) if slot == k),
            "slot {}: {:?}",
            k,
            err
        );

        // Slots k+1.. were never attempted
        let mapped: Vec<PhysAddr> = platform
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::Map { phys, .. } => Some(*phys),
                _ => None,
            })
            .collect();
        let attempted: Vec<PhysAddr> =
            (0..=k).map(|slot| layout::ctrl_reg_addr(base, slot)).collect();
        assert_eq!(mapped, attempted);

        // Every successful mapping, and nothing else, was removed again
        assert_eq!(platform.unmap_count(), k as usize);
        assert_eq!(platform.live_mappings(), 0);
        assert_eq!(platform.unassign_count(), 1);
    }
}

#[test]
fn test_rollback_order() {
    let platform = MockPlatform::new().with_bus_windows();
    platform.fail_map_call(2);
    let mut desc = MapDescriptor::new()
        .with_u32("VME_A16_ADDR", 0x4000)
        .with_u32("VME_DATA_WIDTH", 1)
        .with_binary("IRQ_VECTOR", &[1, 2, 3, 4])
        .with_binary("IRQ_LEVEL", &[5, 5, 5, 5]);

    assert!(init(&platform, &mut desc, BoardModel::A201).is_err());

    // Mappings first, then the grant, then the translation window
    let calls = platform.calls();
    let unmaps: Vec<usize> = (0..calls.len()).filter(|&i| calls[i].is_unmap()).collect();
    let unassign = calls
        .iter()
        .position(|c| matches!(c, Call::Unassign { .. }))
        .unwrap();
    let window = calls
        .iter()
        .position(|c| matches!(c, Call::ReleaseWindow(_)))
        .unwrap();

    assert_eq!(unmaps.len(), 2);
    assert!(unmaps.iter().all(|&i| i < unassign));
    assert!(unassign < window);
    assert_eq!(window, calls.len() - 1);

    // Resources were requested at the translated address
    let base = PhysAddr::new(MOCK_A16_BASE + 0x4000);
    assert!(matches!(
        &calls[1],
        Call::Assign { resources, .. } if resources[0].phys() == layout::ctrl_reg_addr(base, 0)
    ));
}

#[test]
fn test_assignment_failure() {
    let platform = MockPlatform::new();
    platform.fail_assign(PlatformError::Conflict {
        addr: PhysAddr::new(0x0040_0100),
    });

    let err = init(&platform, &mut a201_desc(), BoardModel::A201).err();
    assert!(matches!(
        err,
        Some(BoardError::ResourceAssignment(PlatformError::Conflict { .. }))
    ));

    // Never granted, so never released
    assert_eq!(platform.map_count(), 0);
    assert_eq!(platform.unassign_count(), 0);
}

#[test]
fn test_exit_releases_once() {
    let platform = MockPlatform::new();
    let board = init(&platform, &mut a201_desc(), BoardModel::A201).unwrap();

    board.exit();

    // exit plus the drop at the end of exit: still only one release each
    assert_eq!(platform.unmap_count(), 4);
    assert_eq!(platform.unassign_count(), 1);
    assert_eq!(platform.live_mappings(), 0);
}

#[test]
fn test_drop_without_exit() {
    let platform = MockPlatform::new();
    {
        let _board = init(&platform, &mut a201_desc(), BoardModel::A201).unwrap();
    }
    assert_eq!(platform.live_mappings(), 0);
    assert_eq!(platform.unassign_count(), 1);
}

#[test]
fn test_teardown_failures_are_not_escalated() {
    let platform = MockPlatform::new();
    let board = init(&platform, &mut a201_desc(), BoardModel::A201).unwrap();

    platform.fail_unmap(PlatformError::Os(0x1f));
    board.exit();

    // Every slot was still attempted and the grant still released
    assert_eq!(platform.unmap_count(), 4);
    assert_eq!(platform.unassign_count(), 1);
}

#[test]
fn test_brd_init_exit_are_noops() {
    let platform = MockPlatform::new();
    let mut board = init(&platform, &mut a201_desc(), BoardModel::A201).unwrap();
    platform.clear_calls();

    assert_eq!(board.brd_init(), Ok(()));
    assert_eq!(board.brd_exit(), Ok(()));
    assert!(platform.calls().is_empty());
}

#[derive(Clone, Default)]
struct Capture(Rc<RefCell<Vec<(log::Level, String)>>>);

impl DebugSink for Capture {
    fn write(&self, level: log::Level, board: &str, args: std::fmt::Arguments<'_>) {
        self.0.borrow_mut().push((level, format!("{}: {}", board, args)));
    }
}

#[test]
fn test_debug_output_is_per_handle() {
    let platform = MockPlatform::new();
    let capture = Capture::default();
    let mut desc = a201_desc().with_u32("DEBUG_LEVEL", 0x8001);

    let mut board = Board::init(
        &platform,
        &mut desc,
        BoardModel::A201.into(),
        BoardOptions {
            sink: Box::new(capture.clone()),
        },
    )
    .unwrap();
    assert_eq!(board.debug_level(), DebugLevel::LEV1 | DebugLevel::ERROR);
    assert!(capture.0.borrow().iter().all(|(_, msg)| msg.starts_with("A201: ")));

    // Silence everything at run time
    board.set_stat(0, StatCode::DebugLevel, 0).unwrap();
    let before = capture.0.borrow().len();
    let _ = board.set_m_iface(9, AddrMode::A08, DataMode::D16);
    assert_eq!(capture.0.borrow().len(), before);
}

#[test]
fn test_init_error_is_logged() {
    let platform = MockPlatform::new();
    let capture = Capture::default();
    let mut desc = MapDescriptor::new();

    let result = Board::init(
        &platform,
        &mut desc,
        BoardModel::B201.into(),
        BoardOptions {
            sink: Box::new(capture.clone()),
        },
    );
    assert!(result.is_err());

    let log = capture.0.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].0, log::Level::Error);
    assert!(log[0].1.starts_with("B201: "));
}

#[test]
fn test_register_traces_at_lev3() {
    let platform = MockPlatform::new();
    let capture = Capture::default();
    let mut desc = a201_desc().with_u32("DEBUG_LEVEL", DebugLevel::LEV3.bits());

    let mut board = Board::init(
        &platform,
        &mut desc,
        BoardModel::A201.into(),
        BoardOptions {
            sink: Box::new(capture.clone()),
        },
    )
    .unwrap();
    assert!(capture.0.borrow().is_empty());

    // One trace per register write: vector, then control
    board.irq_enable(1, true).unwrap();
    {
        let log = capture.0.borrow();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|(level, _)| *level == log::Level::Trace));
        assert!(log[0].1.ends_with("<- 0x0002"));
        assert!(log[1].1.ends_with("<- 0x0015"));
    }

    board.clr_m_iface(1).unwrap();
    assert_eq!(capture.0.borrow().len(), 4);
}

/// Slot arrays are read after the bus address is translated; a missing
/// array gives the translation window back
#[test]
fn test_missing_irq_level_releases_window() {
    let platform = MockPlatform::new().with_bus_windows();
    let mut desc = MapDescriptor::new()
        .with_u32("VME_A24_ADDR", 0x0010_0000)
        .with_u32("VME_DATA_WIDTH", 3)
        .with_binary("IRQ_VECTOR", &[1, 2, 3, 4]);

    let err = init(&platform, &mut desc, BoardModel::A201).err();
    assert!(matches!(err, Some(BoardError::Descriptor(e)) if e.is_key_not_found()));

    let calls = platform.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], Call::Translate { addr: 0x0010_0000, .. }));
    assert!(matches!(calls[1], Call::ReleaseWindow(_)));
    assert_eq!(platform.assign_count(), 0);
    assert_eq!(platform.map_count(), 0);
}
