//! Image-trailer state machine and swap-decision engine.
//!
//! This crate answers one question on every boot: given the trailer of a
//! primary slot and a secondary slot, what swap (if any) must the
//! bootloader perform before handing control to an image? It also gives
//! application firmware the two operations it needs to drive that
//! decision: [`set_pending`] to stage an update, and [`set_confirmed`] to
//! accept one that just booted.
//!
//! ```text
//! +---------------+-----------------+-----------------------------------+
//! | primary       | secondary       | swap_type
//! +---------------+-----------------+-----------------------------------+
//! | any           | magic Good,     | Test   (one-shot: revert unless
//! |               | image_ok Unset  |         confirmed after booting)
//! | any           | magic Good,     | Perm   (pre-confirmed: no revert)
//! |               | image_ok Set    |
//! | magic Good,   | magic Unset     | Revert (swap completed, the new
//! | copy_done Set,|                 |         primary never confirmed)
//! | image_ok Unset|                 |
//! | anything else                   | None
//! +---------------+-----------------+-----------------------------------+
//! ```
//!
//! The actual image copy/swap I/O, cryptographic verification, and the
//! flash driver itself are all external collaborators - see the `storage`
//! crate for the capability this crate depends on.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod api;
mod swap;
mod trailer;

pub use api::{set_confirmed, set_confirmed_multi, set_pending, set_pending_multi};
pub use swap::{swap_type, swap_type_multi, DefaultSlotIds, PrimaryStateHook, SlotIds};
pub use trailer::{
    buffer_is_erased, buffer_is_filled, read_swap_state_by_id, Flag, Magic, SwapState, SwapType,
    TrailerLayout, FLAG_SET, MAGIC,
};

/// Error taxonomy for the public API. The decision engine does not use this
/// type directly: `swap_type_multi` returns [`SwapType::Panic`] rather than
/// an `Err`, since its return type already has a slot for "no coherent
/// decision".
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    /// An underlying flash operation failed, or the area reported
    /// `align() == 0`.
    Flash,
    /// A trailer was observed in `Bad` state where coherence was expected.
    BadImage,
    /// `set_confirmed` found `magic == Bad` on the primary.
    BadVector,
    /// The caller asked to write more bytes than a trailer field allows.
    Invalid,
}

impl core::fmt::Display for BootError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            BootError::Flash => "flash operation failed",
            BootError::BadImage => "secondary trailer corrupt",
            BootError::BadVector => "primary trailer corrupt",
            BootError::Invalid => "trailer write exceeds field capacity",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BootError {}

pub type Result<T> = core::result::Result<T, BootError>;
