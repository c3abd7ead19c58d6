//! Decision table and swap-decision engine.
//!
//! Given the decoded trailer state of both slots of an image pair, exactly
//! one of a handful of patterns applies; the first matching row, in
//! declared order, wins. The secondary slot's state takes priority over the
//! primary's because a staged image is a new user intent that supersedes
//! whatever the primary inherited from a previous boot.

use storage::{FlashDevice, FlashError};

use crate::trailer::{read_swap_state_by_id, Flag, Magic, SwapState, SwapType, TrailerLayout};
use crate::BootError;

/// Resolves the flash-area ids of an image pair from its `image_index`.
///
/// The core does not own this mapping: on a real device it comes from the
/// partition table. The default numbering (`2n`, `2n+1`) is enough for a
/// single image pair; multi-image callers implement their own type.
pub trait SlotIds {
    fn primary_id(image_index: u8) -> u8 {
        image_index * 2
    }
    fn secondary_id(image_index: u8) -> u8 {
        image_index * 2 + 1
    }
}

/// The default single-pair numbering: primary `2n`, secondary `2n+1`.
pub struct DefaultSlotIds;
impl SlotIds for DefaultSlotIds {}

/// Lets a caller short-circuit the primary-slot read with a value it
/// already has in hand (e.g. cached from an earlier step of the boot
/// sequence). Returning `None` falls through to reading the flash backend.
pub trait PrimaryStateHook {
    fn primary_state(&self, image_index: u8) -> Option<Result<SwapState, BootError>>;
}

/// The hook that always declines, giving the default flash-backed read.
impl PrimaryStateHook for () {
    fn primary_state(&self, _image_index: u8) -> Option<Result<SwapState, BootError>> {
        None
    }
}

#[derive(Copy, Clone)]
enum MagicPattern {
    Any,
    NotGood,
    Exact(Magic),
}

impl MagicPattern {
    fn matches(self, value: Magic) -> bool {
        match self {
            MagicPattern::Any => true,
            MagicPattern::NotGood => value != Magic::Good,
            MagicPattern::Exact(expected) => expected == value,
        }
    }
}

#[derive(Copy, Clone)]
enum FlagPattern {
    Any,
    Exact(Flag),
}

impl FlagPattern {
    fn matches(self, value: Flag) -> bool {
        match self {
            FlagPattern::Any => true,
            FlagPattern::Exact(expected) => expected == value,
        }
    }
}

struct Row {
    primary_magic: MagicPattern,
    secondary_magic: MagicPattern,
    primary_image_ok: FlagPattern,
    secondary_image_ok: FlagPattern,
    primary_copy_done: FlagPattern,
    result: SwapType,
}

/// The decision table, in priority order. See spec §4.3.
const TABLE: [Row; 3] = [
    // 1: secondary staged, not yet confirmed -> one-shot test.
    Row {
        primary_magic: MagicPattern::Any,
        secondary_magic: MagicPattern::Exact(Magic::Good),
        primary_image_ok: FlagPattern::Any,
        secondary_image_ok: FlagPattern::Exact(Flag::Unset),
        primary_copy_done: FlagPattern::Any,
        result: SwapType::Test,
    },
    // 2: secondary staged and pre-confirmed -> permanent install.
    Row {
        primary_magic: MagicPattern::Any,
        secondary_magic: MagicPattern::Exact(Magic::Good),
        primary_image_ok: FlagPattern::Any,
        secondary_image_ok: FlagPattern::Exact(Flag::Set),
        primary_copy_done: FlagPattern::Any,
        result: SwapType::Perm,
    },
    // 3: a swap completed but the new primary never confirmed itself.
    Row {
        primary_magic: MagicPattern::Exact(Magic::Good),
        secondary_magic: MagicPattern::Exact(Magic::Unset),
        primary_image_ok: FlagPattern::Exact(Flag::Unset),
        secondary_image_ok: FlagPattern::Any,
        primary_copy_done: FlagPattern::Exact(Flag::Set),
        result: SwapType::Revert,
    },
];

fn decide(primary: SwapState, secondary: SwapState) -> SwapType {
    for row in TABLE.iter() {
        if row.primary_magic.matches(primary.magic)
            && row.secondary_magic.matches(secondary.magic)
            && row.primary_image_ok.matches(primary.image_ok)
            && row.secondary_image_ok.matches(secondary.image_ok)
            && row.primary_copy_done.matches(primary.copy_done)
        {
            return match row.result {
                SwapType::Test | SwapType::Perm | SwapType::Revert => row.result,
                // Table corruption: a row names a type it isn't allowed to.
                _ => SwapType::Panic,
            };
        }
    }
    SwapType::None
}

/// Decide the swap operation for image pair `image_index`.
///
/// `hook` is consulted for the primary slot's state first; if it declines,
/// the primary is read from `device`. The secondary is always read from
/// `device`; if `device` reports the secondary id doesn't exist, the
/// canonical erased state is substituted rather than treated as a failure.
/// Any other failure on either slot yields [`SwapType::Panic`].
pub fn swap_type_multi<D, S, H, const A: usize>(
    device: &D,
    hook: &H,
    layout: &TrailerLayout<A>,
    image_index: u8,
) -> SwapType
where
    D: FlashDevice,
    S: SlotIds,
    H: PrimaryStateHook,
{
    let primary = match hook.primary_state(image_index) {
        Some(Ok(state)) => state,
        Some(Err(_)) => return SwapType::Panic,
        None => match read_swap_state_by_id(device, S::primary_id(image_index), layout) {
            Ok(state) => state,
            Err(_) => return SwapType::Panic,
        },
    };

    let secondary = match device.open(S::secondary_id(image_index)) {
        Ok(mut area) => {
            let result = layout.read_swap_state(&mut area);
            storage::close(area);
            match result {
                Ok(state) => state,
                Err(_) => return SwapType::Panic,
            }
        }
        Err(FlashError::NoSuchArea) => SwapState::ERASED,
        Err(_) => return SwapType::Panic,
    };

    decide(primary, secondary)
}

/// `swap_type_multi` for image pair 0, using [`DefaultSlotIds`].
pub fn swap_type<D, H, const A: usize>(device: &D, hook: &H, layout: &TrailerLayout<A>) -> SwapType
where
    D: FlashDevice,
    H: PrimaryStateHook,
{
    swap_type_multi::<D, DefaultSlotIds, H, A>(device, hook, layout, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trailer::SwapState;

    fn state(magic: Magic, copy_done: Flag, image_ok: Flag) -> SwapState {
        SwapState {
            magic,
            swap_type: SwapType::None,
            copy_done,
            image_ok,
            image_num: 0,
        }
    }

    #[test]
    fn secondary_good_always_wins() {
        for primary_magic in [Magic::Good, Magic::Unset, Magic::Bad] {
            let primary = state(primary_magic, Flag::Set, Flag::Set);
            let secondary = state(Magic::Good, Flag::Unset, Flag::Unset);
            assert_eq!(decide(primary, secondary), SwapType::Test);

            let secondary = state(Magic::Good, Flag::Unset, Flag::Set);
            assert_eq!(decide(primary, secondary), SwapType::Perm);
        }
    }

    #[test]
    fn revert_needs_exact_preconditions() {
        let primary = state(Magic::Good, Flag::Set, Flag::Unset);
        let secondary = state(Magic::Unset, Flag::Unset, Flag::Unset);
        assert_eq!(decide(primary, secondary), SwapType::Revert);

        // copy_done not yet set: not a revert.
        let primary = state(Magic::Good, Flag::Unset, Flag::Unset);
        assert_eq!(decide(primary, secondary), SwapType::None);

        // image_ok already set: already confirmed, not a revert.
        let primary = state(Magic::Good, Flag::Set, Flag::Set);
        assert_eq!(decide(primary, secondary), SwapType::None);
    }

    #[test]
    fn erased_pair_is_none() {
        assert_eq!(decide(SwapState::ERASED, SwapState::ERASED), SwapType::None);
    }
}
