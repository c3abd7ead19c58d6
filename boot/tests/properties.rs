//! Property tests for the invariants in the swap-decision engine's spec.
//!
//! These exercise the pure, flash-free parts of the engine (trailer offset
//! math and the decision table) against randomised and exhaustively
//! enumerated inputs, plus a power-loss simulation against a real
//! [`simflash::SimDevice`].

use boot::{
    set_pending_multi, swap_type_multi, DefaultSlotIds, Flag, Magic, SwapState, SwapType,
    TrailerLayout,
};
use proptest::prelude::*;
use simflash::SimDevice;
use storage::FlashArea;

const MAGIC_VALUES: [Magic; 3] = [Magic::Good, Magic::Unset, Magic::Bad];
const FLAG_VALUES: [Flag; 3] = [Flag::Set, Flag::Unset, Flag::Bad];

fn state(magic: Magic, copy_done: Flag, image_ok: Flag) -> SwapState {
    SwapState {
        magic,
        swap_type: SwapType::None,
        copy_done,
        image_ok,
        image_num: 0,
    }
}

// Exercises the decision table the same way boot::swap does internally, by
// going through the public entry point against a pair of states supplied
// via the primary-state hook and a flash-backed secondary.
fn decide(primary: SwapState, secondary: SwapState) -> SwapType {
    struct Hook(SwapState);
    impl boot::PrimaryStateHook for Hook {
        fn primary_state(&self, _image_index: u8) -> Option<Result<SwapState, boot::BootError>> {
            Some(Ok(self.0))
        }
    }

    const A: usize = 8;
    let device = SimDevice::new(4096, A, 0xFF);
    let layout = TrailerLayout::<A>::new(4096).unwrap();

    // Program the secondary's trailer to match `secondary` exactly.
    let mut area = device.open(1).unwrap();
    match secondary.magic {
        Magic::Good => layout.write_magic(&mut area).unwrap(),
        Magic::Unset => {}
        Magic::Bad => area.write(layout.magic_off, &[0x00; 8]).unwrap(),
    }
    if secondary.image_ok == Flag::Set {
        layout.write_image_ok(&mut area).unwrap();
    } else if secondary.image_ok == Flag::Bad {
        layout.write_flag(&mut area, layout.image_ok_off, 0x42).unwrap();
    }
    storage::close(area);

    swap_type_multi::<_, DefaultSlotIds, _, A>(&device, &Hook(primary), &layout, 0)
}

#[test]
fn offset_monotonicity() {
    fn check<const A: usize>() {
        for extra in 0..64u32 {
            let size = 16 + 3 * (A as u32) + extra;
            let layout = TrailerLayout::<A>::new(size).unwrap();
            assert!(layout.swap_info_off < layout.copy_done_off);
            assert!(layout.copy_done_off < layout.image_ok_off);
            assert!(layout.image_ok_off < layout.magic_off);
            assert!(layout.magic_off < size);
        }
    }

    check::<4>();
    check::<8>();
    check::<16>();
    check::<32>();
    check::<64>();
}

#[test]
fn table_priority_secondary_good_always_wins() {
    for &primary_magic in &MAGIC_VALUES {
        for &primary_ok in &FLAG_VALUES {
            for &primary_cd in &FLAG_VALUES {
                let primary = state(primary_magic, primary_cd, primary_ok);

                let secondary = state(Magic::Good, Flag::Unset, Flag::Unset);
                assert_eq!(decide(primary, secondary), SwapType::Test);

                let secondary = state(Magic::Good, Flag::Unset, Flag::Set);
                assert_eq!(decide(primary, secondary), SwapType::Perm);
            }
        }
    }
}

#[test]
fn revert_precondition_is_exact() {
    for &primary_magic in &MAGIC_VALUES {
        for &secondary_magic in &MAGIC_VALUES {
            for &primary_ok in &FLAG_VALUES {
                for &secondary_ok in &FLAG_VALUES {
                    for &primary_cd in &FLAG_VALUES {
                        let mut primary = state(primary_magic, primary_cd, primary_ok);
                        primary.image_ok = primary_ok;
                        let mut secondary = state(secondary_magic, Flag::Unset, secondary_ok);
                        secondary.image_ok = secondary_ok;

                        let expect_revert = primary_magic == Magic::Good
                            && secondary_magic == Magic::Unset
                            && primary_ok == Flag::Unset
                            && primary_cd == Flag::Set;

                        let got = decide(primary, secondary);
                        if expect_revert {
                            assert_eq!(got, SwapType::Revert);
                        } else {
                            assert_ne!(got, SwapType::Revert);
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn erased_slot_canonical_form() {
    const A: usize = 8;
    let device = SimDevice::new(4096, A, 0xFF);
    let layout = TrailerLayout::<A>::new(4096).unwrap();
    let mut area = device.open(0).unwrap();
    let decoded = layout.read_swap_state(&mut area).unwrap();
    assert_eq!(decoded, SwapState::ERASED);
}

proptest! {
    // Every prefix of set_pending's write sequence (magic; image-ok if
    // permanent; swap-info) must decode to a decision in {None, Test, Perm}
    // -- never Revert or Panic.
    #[test]
    fn power_loss_prefixes_are_safe(permanent in any::<bool>(), stop_after in 0usize..=3) {
        const A: usize = 8;
        let device = SimDevice::new(4096, A, 0xFF);
        let layout = TrailerLayout::<A>::new(4096).unwrap();
        let mut area = device.open(1).unwrap();

        // Replay the write sequence set_pending_multi uses, truncated after
        // `stop_after` steps.
        let steps_for: u8 = if permanent { 3 } else { 2 };
        let stop_after = stop_after.min(steps_for as usize);

        if stop_after >= 1 {
            layout.write_magic(&mut area).unwrap();
        }
        if permanent && stop_after >= 2 {
            layout.write_image_ok(&mut area).unwrap();
        }
        let swap_info_step = if permanent { 3 } else { 2 };
        if stop_after >= swap_info_step {
            let swap_type = if permanent { SwapType::Perm } else { SwapType::Test };
            layout.write_swap_info(&mut area, swap_type, 0).unwrap();
        }
        storage::close(area);

        let result = swap_type_multi::<_, DefaultSlotIds, _, A>(&device, &(), &layout, 0);
        prop_assert!(matches!(result, SwapType::None | SwapType::Test | SwapType::Perm));
    }

    // set_pending_multi run twice, for any permanence flag, leaves the
    // slot byte-for-byte identical to running it once.
    #[test]
    fn set_pending_is_idempotent(permanent in any::<bool>()) {
        const A: usize = 8;
        let device = SimDevice::new(4096, A, 0xFF);
        let layout = TrailerLayout::<A>::new(4096).unwrap();

        set_pending_multi::<_, DefaultSlotIds, A>(&device, &layout, 0, permanent).unwrap();
        let once = device.snapshot(1);
        set_pending_multi::<_, DefaultSlotIds, A>(&device, &layout, 0, permanent).unwrap();
        prop_assert_eq!(device.snapshot(1), once);
    }
}
