//! Trailer codec and state reader.
//!
//! The trailer is a fixed-layout suffix of a slot, laid out from high
//! address to low:
//!
//! +-----------+------------------------------------------------+
//! | offset    | field
//! +-----------+------------------------------------------------+
//! | S-16      | magic (16 bytes)
//! | S-16-A    | image-ok (1 byte, padded to A)
//! | S-16-2A   | copy-done (1 byte, padded to A)
//! | S-16-3A   | swap-info (1 byte, padded to A)
//! +-----------+------------------------------------------------+
//!
//! where `S` is the slot size and `A` is the platform's max write alignment.
//! Each field gets its own aligned block so that programming one never
//! re-programs another: many flash parts forbid a partial re-program within
//! an already-written aligned unit.
//!
//! A freshly erased slot decodes to
//! `{magic: Unset, swap_type: None, copy_done: Unset, image_ok: Unset, image_num: 0}`.

use storage::FlashArea;

use crate::BootError;

/// The 16-byte constant that marks a slot's trailer as programmed.
///
/// Four little-endian 32-bit words, `0xf395c277 0x7fefd260 0x0f505235
/// 0x8079b62c`, in that order.
pub const MAGIC: [u8; 16] = [
    0x77, 0xc2, 0x95, 0xf3, 0x60, 0xd2, 0xef, 0x7f, 0x35, 0x52, 0x50, 0x0f, 0x2c, 0xb6, 0x79, 0x80,
];

/// The single byte value a programmed flag reads back as.
pub const FLAG_SET: u8 = 0x01;

/// Semantic value of the trailer's magic field.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Magic {
    /// Bytes equal [`MAGIC`].
    Good,
    /// Bytes equal the erased value.
    Unset,
    /// Anything else.
    Bad,
}

/// Semantic value of a one-byte trailer flag (image-ok, copy-done).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flag {
    /// Byte equals [`FLAG_SET`].
    Set,
    /// Byte equals the erased value.
    Unset,
    /// Anything else.
    Bad,
}

/// The swap operation the bootloader must perform, or the engine's
/// diagnostic results.
///
/// Only `None`, `Test`, `Perm` and `Revert` are ever persisted in a
/// swap-info byte; `Fail` and `Panic` exist for the engine to report that it
/// could not reach a coherent decision and are never written to flash.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwapType {
    None,
    Test,
    Perm,
    Revert,
    Fail,
    Panic,
}

impl SwapType {
    /// The 4-bit code this type is persisted as, or `None` for the
    /// engine-only variants that are never written.
    pub fn persisted_code(self) -> Option<u8> {
        match self {
            SwapType::None => Some(0),
            SwapType::Test => Some(1),
            SwapType::Perm => Some(2),
            SwapType::Revert => Some(3),
            SwapType::Fail | SwapType::Panic => None,
        }
    }

    /// Decode a 4-bit swap-info code. Codes above `Revert` normalise to
    /// `None` per spec: the caller is expected to also reset `image_num`
    /// to `0` in that case.
    pub fn from_persisted_code(code: u8) -> SwapType {
        match code & 0xF {
            0 => SwapType::None,
            1 => SwapType::Test,
            2 => SwapType::Perm,
            3 => SwapType::Revert,
            _ => SwapType::None,
        }
    }
}

/// Decoded snapshot of one slot's trailer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwapState {
    pub magic: Magic,
    pub swap_type: SwapType,
    pub copy_done: Flag,
    pub image_ok: Flag,
    pub image_num: u8,
}

impl SwapState {
    /// The state a fully-erased slot decodes to.
    pub const ERASED: SwapState = SwapState {
        magic: Magic::Unset,
        swap_type: SwapType::None,
        copy_done: Flag::Unset,
        image_ok: Flag::Unset,
        image_num: 0,
    };
}

/// `true` iff `len > 0` and every one of the first `len` bytes of `buf`
/// equals `fill`. A missing buffer, or `len == 0`, is never considered
/// filled.
pub fn buffer_is_filled(buf: Option<&[u8]>, fill: u8, len: usize) -> bool {
    match buf {
        Some(b) if len > 0 && b.len() >= len => b[..len].iter().all(|&byte| byte == fill),
        _ => false,
    }
}

/// [`buffer_is_filled`] against `area`'s erased-byte value.
pub fn buffer_is_erased<FA: FlashArea>(area: &FA, buf: Option<&[u8]>, len: usize) -> bool {
    buffer_is_filled(buf, area.erased_val(), len)
}

fn round_up(n: usize, align: usize) -> usize {
    if align == 0 {
        0
    } else {
        (n + align - 1) / align * align
    }
}

/// Byte offsets of the four trailer fields within a slot of size `slot_size`,
/// for a platform whose max write alignment is the const generic `A`.
///
/// `A` is a compile-time, power-of-two constant shared by every slot on a
/// given platform; `slot_size` varies per slot and is supplied at
/// construction time.
#[derive(Debug, Copy, Clone)]
pub struct TrailerLayout<const A: usize> {
    pub slot_size: u32,
    pub magic_off: u32,
    pub image_ok_off: u32,
    pub copy_done_off: u32,
    pub swap_info_off: u32,
}

impl<const A: usize> TrailerLayout<A> {
    /// Compute the trailer layout for a slot of `slot_size` bytes.
    ///
    /// Fails with [`BootError::Invalid`] if the slot is too small to hold
    /// `16 + 3*A` bytes of trailer.
    pub fn new(slot_size: u32) -> Result<Self, BootError> {
        let align = A as u32;
        let trailer_size = align
            .checked_mul(3)
            .and_then(|v| v.checked_add(16))
            .ok_or(BootError::Invalid)?;
        if slot_size < trailer_size {
            return Err(BootError::Invalid);
        }
        let magic_off = slot_size - 16;
        let image_ok_off = magic_off - align;
        let copy_done_off = image_ok_off - align;
        let swap_info_off = copy_done_off - align;
        Ok(TrailerLayout {
            slot_size,
            magic_off,
            image_ok_off,
            copy_done_off,
            swap_info_off,
        })
    }

    /// Write `payload` at `off`, rounding its length up to the area's actual
    /// write alignment and padding the remainder of the `A`-byte stack
    /// buffer with the erased value. Refuses with [`BootError::Invalid`] if
    /// the rounded length would not fit in one `A`-byte block.
    fn write_trailer<FA: FlashArea>(&self, area: &mut FA, off: u32, payload: &[u8]) -> Result<(), BootError> {
        let align = area.align();
        if align == 0 {
            return Err(BootError::Flash);
        }
        let rounded = round_up(payload.len(), align);
        if rounded > A {
            return Err(BootError::Invalid);
        }
        let mut buf = [area.erased_val(); A];
        buf[..payload.len()].copy_from_slice(payload);
        area.write(off, &buf[..rounded]).map_err(|_| BootError::Flash)
    }

    /// Write the 16-byte magic constant.
    ///
    /// Unlike the one-byte flags, the magic field is not routed through the
    /// `A`-sized padded buffer in [`write_trailer`](Self::write_trailer):
    /// its own size is fixed at 16 bytes by the layout (it sits at the very
    /// end of the slot, not in one of the `A`-byte blocks below it), so
    /// padding it out to `A` would both be pointless and, for `A < 16`,
    /// impossible. This does mean the scheme only fits devices whose actual
    /// write granularity is at most 16 bytes; a device that needs a bigger
    /// write unit can't aligned-write exactly the last 16 bytes of a slot
    /// without either overrunning it or clobbering the image-ok block below
    /// it, and needs a different trailer shape than this one.
    pub fn write_magic<FA: FlashArea>(&self, area: &mut FA) -> Result<(), BootError> {
        let align = area.align();
        if align == 0 || align > 16 {
            return Err(BootError::Flash);
        }
        area.write(self.magic_off, &MAGIC).map_err(|_| BootError::Flash)
    }

    /// Write a one-byte flag at `off`.
    pub fn write_flag<FA: FlashArea>(&self, area: &mut FA, off: u32, value: u8) -> Result<(), BootError> {
        self.write_trailer(area, off, &[value])
    }

    /// Write `FLAG_SET` at the image-ok offset.
    pub fn write_image_ok<FA: FlashArea>(&self, area: &mut FA) -> Result<(), BootError> {
        self.write_flag(area, self.image_ok_off, FLAG_SET)
    }

    /// Pack `(image_num, swap_type)` and write it at the swap-info offset.
    /// `swap_type` must be one of the persisted variants.
    pub fn write_swap_info<FA: FlashArea>(
        &self,
        area: &mut FA,
        swap_type: SwapType,
        image_num: u8,
    ) -> Result<(), BootError> {
        let code = swap_type.persisted_code().ok_or(BootError::Invalid)?;
        let info = ((image_num & 0xF) << 4) | (code & 0xF);
        self.write_flag(area, self.swap_info_off, info)
    }

    /// Read a one-byte flag from `off`.
    pub fn read_flag<FA: FlashArea>(&self, area: &mut FA, off: u32) -> Result<Flag, BootError> {
        let mut buf = [0u8; 1];
        area.read(off, &mut buf).map_err(|_| BootError::Flash)?;
        let erased = area.erased_val();
        Ok(if buf[0] == erased {
            Flag::Unset
        } else if buf[0] == FLAG_SET {
            Flag::Set
        } else {
            Flag::Bad
        })
    }

    /// Decode the full trailer of `area` into a [`SwapState`].
    pub fn read_swap_state<FA: FlashArea>(&self, area: &mut FA) -> Result<SwapState, BootError> {
        let mut magic_buf = [0u8; 16];
        area.read(self.magic_off, &mut magic_buf).map_err(|_| BootError::Flash)?;
        let erased = area.erased_val();
        let magic = if buffer_is_erased(area, Some(&magic_buf), 16) {
            Magic::Unset
        } else if magic_buf == MAGIC {
            Magic::Good
        } else {
            Magic::Bad
        };

        let mut info_buf = [0u8; 1];
        area.read(self.swap_info_off, &mut info_buf).map_err(|_| BootError::Flash)?;
        let (swap_type, image_num) = if info_buf[0] == erased {
            (SwapType::None, 0)
        } else {
            let code = info_buf[0] & 0xF;
            let num = (info_buf[0] >> 4) & 0xF;
            // A code of exactly 0 is a legal `None` with a real image_num
            // (e.g. a pre-staged but not-yet-armed slot); only codes past
            // `Revert` force image_num back to 0.
            if code > 3 {
                (SwapType::None, 0)
            } else {
                (SwapType::from_persisted_code(code), num)
            }
        };

        let copy_done = self.read_flag(area, self.copy_done_off)?;
        let image_ok = self.read_flag(area, self.image_ok_off)?;

        Ok(SwapState {
            magic,
            swap_type,
            copy_done,
            image_ok,
            image_num,
        })
    }
}

/// Open `id` on `device`, read its trailer, and close the slot on every exit
/// path.
pub fn read_swap_state_by_id<D, const A: usize>(
    device: &D,
    id: u8,
    layout: &TrailerLayout<A>,
) -> Result<SwapState, BootError>
where
    D: storage::FlashDevice,
{
    let mut area = device.open(id).map_err(|_| BootError::Flash)?;
    let result = layout.read_swap_state(&mut area);
    storage::close(area);
    result
}
