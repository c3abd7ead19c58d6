//! Flash-area capability.
//!
//! This crate has no opinion about swap state, trailers, or images; it only
//! describes the contract a NOR-flash-like storage region must satisfy for
//! the `boot` crate to treat it as a slot. A "flash area" is opened by a
//! numeric id, read and written at whatever alignment it reports, and
//! closed when the caller is done with it.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

/// Errors a flash-area backend can report.
///
/// `NoSuchArea` is distinguished from the other variants because the swap
/// engine treats "this id doesn't exist" as meaningfully different from a
/// generic I/O failure: a missing secondary slot is how a single-image
/// device tells the core there is nothing staged.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// The requested area id is not known to the backend.
    NoSuchArea,
    /// `offset`/`length` is not a multiple of the area's alignment.
    NotAligned,
    /// `offset`/`length` falls outside the area.
    OutOfBounds,
    /// The backend reported a hardware or I/O failure.
    Io,
}

pub type Result<T> = core::result::Result<T, FlashError>;

/// A single, already-opened flash region: one slot's worth of storage.
///
/// Every method operates in area-relative offsets (`0` is the first byte of
/// the area, not of the device). `write` requires `off` and `buf.len()` to
/// be multiples of `align()`; violating that contract is a caller bug and
/// backends are free to return `NotAligned`.
pub trait FlashArea {
    /// Stable identifier this area was opened with.
    fn id(&self) -> u8;
    /// Total usable bytes in the area.
    fn size(&self) -> u32;
    /// Absolute device offset of byte 0 of the area. Diagnostics only.
    fn base_off(&self) -> u32;
    /// Minimum write granularity, in bytes. `0` is reserved as an error
    /// sentinel by callers that treat `align() == 0` as `FlashError::Io`.
    fn align(&self) -> usize;
    /// The byte value this backend's unprogrammed flash reads back as.
    fn erased_val(&self) -> u8;

    /// Copy `buf.len()` bytes starting at `off` into `buf`.
    fn read(&mut self, off: u32, buf: &mut [u8]) -> Result<()>;
    /// Program `buf` at `off`. `off` and `buf.len()` must be aligned.
    fn write(&mut self, off: u32, buf: &[u8]) -> Result<()>;
    /// Erase `len` bytes starting at `off`. Granularity is backend-defined.
    fn erase(&mut self, off: u32, len: u32) -> Result<()>;
}

/// Resolves flash-area ids to open handles.
///
/// Implementations own whatever backing store the `Area` type reads and
/// writes (a byte buffer in tests, a flash peripheral on target). `open`
/// returning `Ok` hands exclusive ownership of the area to the caller for
/// the duration of the call; dropping the returned `Area` is the `close`.
pub trait FlashDevice {
    type Area: FlashArea;

    /// Obtain a handle to the area named by `id`.
    fn open(&self, id: u8) -> Result<Self::Area>;
}

/// Release a flash-area handle. Equivalent to `drop(area)`; spelled out
/// because spec-level callers expect an explicit close step, and because it
/// gives call sites a place to hang a doc comment about ordering.
pub fn close<A: FlashArea>(area: A) {
    drop(area);
}

/// Validate an aligned, in-bounds read.
pub fn check_read<A: FlashArea>(area: &A, off: u32, len: u32) -> Result<()> {
    check_bounds(area, off, len)
}

/// Validate an aligned, in-bounds write.
pub fn check_write<A: FlashArea>(area: &A, off: u32, len: u32) -> Result<()> {
    let align = area.align();
    if align == 0 {
        return Err(FlashError::Io);
    }
    if off as usize % align != 0 || len as usize % align != 0 {
        return Err(FlashError::NotAligned);
    }
    check_bounds(area, off, len)
}

/// Validate an in-bounds erase range.
pub fn check_erase<A: FlashArea>(area: &A, off: u32, len: u32) -> Result<()> {
    check_bounds(area, off, len)
}

fn check_bounds<A: FlashArea>(area: &A, off: u32, len: u32) -> Result<()> {
    let size = area.size();
    if len > size || off > size - len {
        return Err(FlashError::OutOfBounds);
    }
    Ok(())
}
