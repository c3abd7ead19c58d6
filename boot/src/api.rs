//! Application-facing API: `set_pending` and `set_confirmed`.
//!
//! Both functions write the secondary or primary trailer in an order chosen
//! so that every intermediate, power-loss-truncated state is still a legal
//! input to the decision table: `set_pending` writes magic before
//! image-ok, and image-ok before swap-info, so a crash after any prefix of
//! that sequence leaves the pair reading as `None`, `Test`, or `Perm` -
//! never `Revert` or `Panic`.

use storage::{FlashArea, FlashDevice};

use crate::swap::{DefaultSlotIds, SlotIds};
use crate::trailer::{Magic, SwapType, TrailerLayout};
use crate::BootError;

/// Queue the secondary image of pair `image_index` for a one-shot test
/// (`permanent = false`) or a permanent install (`permanent = true`).
///
/// Idempotent: calling this twice in a row leaves the slot in the same
/// state as calling it once.
pub fn set_pending_multi<D, S, const A: usize>(
    device: &D,
    layout: &TrailerLayout<A>,
    image_index: u8,
    permanent: bool,
) -> Result<(), BootError>
where
    D: FlashDevice,
    S: SlotIds,
{
    let mut area = device.open(S::secondary_id(image_index)).map_err(|_| BootError::Flash)?;

    let result = (|| -> Result<(), BootError> {
        let state = layout.read_swap_state(&mut area)?;
        match state.magic {
            // Already scheduled; nothing further to write.
            Magic::Good => Ok(()),
            Magic::Unset => {
                layout.write_magic(&mut area)?;
                if permanent {
                    layout.write_image_ok(&mut area)?;
                }
                let swap_type = if permanent { SwapType::Perm } else { SwapType::Test };
                layout.write_swap_info(&mut area, swap_type, 0)
            }
            Magic::Bad => {
                // Erase to permit a future upgrade attempt. The source this
                // is modelled on ignores the erase's own result; we follow
                // suit rather than invent a second failure mode here.
                let size = area.size();
                let _ = area.erase(0, size);
                Err(BootError::BadImage)
            }
        }
    })();

    storage::close(area);
    result
}

/// Mark the currently-running primary image of pair `image_index` as
/// accepted, preventing the next boot from reverting it.
///
/// Does not check `copy_done`, so out-of-band-programmed images can be
/// confirmed too. Idempotent.
pub fn set_confirmed_multi<D, S, const A: usize>(
    device: &D,
    layout: &TrailerLayout<A>,
    image_index: u8,
) -> Result<(), BootError>
where
    D: FlashDevice,
    S: SlotIds,
{
    let mut area = device.open(S::primary_id(image_index)).map_err(|_| BootError::Flash)?;

    let result = (|| -> Result<(), BootError> {
        let state = layout.read_swap_state(&mut area)?;
        match state.magic {
            Magic::Unset => return Ok(()),
            Magic::Bad => return Err(BootError::BadVector),
            Magic::Good => {}
        }
        if state.image_ok != crate::trailer::Flag::Unset {
            return Ok(());
        }
        layout.write_image_ok(&mut area)
    })();

    storage::close(area);
    result
}

/// `set_pending_multi` for image pair 0, using [`DefaultSlotIds`].
pub fn set_pending<D, const A: usize>(device: &D, layout: &TrailerLayout<A>, permanent: bool) -> Result<(), BootError>
where
    D: FlashDevice,
{
    set_pending_multi::<D, DefaultSlotIds, A>(device, layout, 0, permanent)
}

/// `set_confirmed_multi` for image pair 0, using [`DefaultSlotIds`].
pub fn set_confirmed<D, const A: usize>(device: &D, layout: &TrailerLayout<A>) -> Result<(), BootError>
where
    D: FlashDevice,
{
    set_confirmed_multi::<D, DefaultSlotIds, A>(device, layout, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simflash::SimDevice;
    use storage::FlashDevice;

    const A: usize = 8;

    fn fresh() -> (SimDevice, TrailerLayout<A>) {
        let device = SimDevice::new(4096, A, 0xFF);
        let layout = TrailerLayout::<A>::new(4096).unwrap();
        (device, layout)
    }

    #[test]
    fn set_pending_test_then_confirm_is_idempotent() {
        let (device, layout) = fresh();
        set_pending_multi::<_, DefaultSlotIds, A>(&device, &layout, 0, false).unwrap();
        let snapshot = device.snapshot(DefaultSlotIds::secondary_id(0));

        set_pending_multi::<_, DefaultSlotIds, A>(&device, &layout, 0, false).unwrap();
        assert_eq!(device.snapshot(DefaultSlotIds::secondary_id(0)), snapshot);
    }

    #[test]
    fn set_pending_permanent_writes_image_ok_before_swap_info() {
        let (device, layout) = fresh();
        set_pending_multi::<_, DefaultSlotIds, A>(&device, &layout, 0, true).unwrap();

        let mut area = device.open(DefaultSlotIds::secondary_id(0)).unwrap();
        let state = layout.read_swap_state(&mut area).unwrap();
        assert_eq!(state.magic, Magic::Good);
        assert_eq!(state.image_ok, crate::trailer::Flag::Set);
        assert_eq!(state.swap_type, SwapType::Perm);
    }

    #[test]
    fn set_confirmed_is_idempotent_and_ignores_copy_done() {
        let (device, layout) = fresh();
        set_confirmed_multi::<_, DefaultSlotIds, A>(&device, &layout, 0).unwrap();
        let snapshot = device.snapshot(DefaultSlotIds::primary_id(0));

        // Unset primary: no bytes written.
        assert!(snapshot.iter().all(|&b| b == 0xFF));

        let mut area = device.open(DefaultSlotIds::primary_id(0)).unwrap();
        layout.write_magic(&mut area).unwrap();
        storage::close(area);

        set_confirmed_multi::<_, DefaultSlotIds, A>(&device, &layout, 0).unwrap();
        let after_first = device.snapshot(DefaultSlotIds::primary_id(0));
        set_confirmed_multi::<_, DefaultSlotIds, A>(&device, &layout, 0).unwrap();
        assert_eq!(device.snapshot(DefaultSlotIds::primary_id(0)), after_first);
    }
}
