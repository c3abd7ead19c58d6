//! Simulated flash.
//!
//! An in-memory [`storage::FlashDevice`] used by `boot`'s tests. Every area
//! is a plain byte buffer; `write`/`erase` go through the same alignment
//! and bounds checks a real NOR backend would enforce, so a test that
//! writes mis-aligned data fails the same way it would on target.

pub mod styles;

use std::cell::RefCell;
use std::rc::Rc;

use storage::{check_erase, check_read, check_write, FlashArea, FlashDevice, FlashError, Result};

struct Inner {
    slot_size: u32,
    align: usize,
    erased_val: u8,
    slots: Vec<Vec<u8>>,
}

/// A device holding some number of same-sized flash areas, indexed `0..n`.
#[derive(Clone)]
pub struct SimDevice {
    inner: Rc<RefCell<Inner>>,
}

impl SimDevice {
    /// A two-area device (ids `0` and `1`), both erased, sized `slot_size`.
    pub fn new(slot_size: usize, align: usize, erased_val: u8) -> SimDevice {
        SimDevice::with_areas(2, slot_size, align, erased_val)
    }

    /// A device with `count` areas. Used to simulate a missing secondary
    /// slot: build with `count = 1` and opening id `1` reports
    /// [`FlashError::NoSuchArea`].
    pub fn with_areas(count: usize, slot_size: usize, align: usize, erased_val: u8) -> SimDevice {
        let slots = (0..count).map(|_| vec![erased_val; slot_size]).collect();
        SimDevice {
            inner: Rc::new(RefCell::new(Inner {
                slot_size: slot_size as u32,
                align,
                erased_val,
                slots,
            })),
        }
    }

    /// Copy of area `id`'s current bytes, for comparing snapshots in tests.
    pub fn snapshot(&self, id: u8) -> Vec<u8> {
        self.inner.borrow().slots[id as usize].clone()
    }

    /// Directly overwrite bytes in area `id`, bypassing alignment checks.
    /// Used to set up corrupt or pre-staged trailers in tests.
    pub fn poke(&self, id: u8, off: usize, bytes: &[u8]) {
        let mut inner = self.inner.borrow_mut();
        inner.slots[id as usize][off..off + bytes.len()].copy_from_slice(bytes);
    }
}

impl FlashDevice for SimDevice {
    type Area = SimArea;

    fn open(&self, id: u8) -> Result<SimArea> {
        let inner = self.inner.borrow();
        if id as usize >= inner.slots.len() {
            return Err(FlashError::NoSuchArea);
        }
        Ok(SimArea {
            inner: self.inner.clone(),
            id,
            size: inner.slot_size,
            align: inner.align,
            erased_val: inner.erased_val,
        })
    }
}

/// A single opened area of a [`SimDevice`].
pub struct SimArea {
    inner: Rc<RefCell<Inner>>,
    id: u8,
    size: u32,
    align: usize,
    erased_val: u8,
}

impl FlashArea for SimArea {
    fn id(&self) -> u8 {
        self.id
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn base_off(&self) -> u32 {
        self.id as u32 * self.size
    }

    fn align(&self) -> usize {
        self.align
    }

    fn erased_val(&self) -> u8 {
        self.erased_val
    }

    fn read(&mut self, off: u32, buf: &mut [u8]) -> Result<()> {
        check_read(self, off, buf.len() as u32)?;
        let inner = self.inner.borrow();
        let slot = &inner.slots[self.id as usize];
        let start = off as usize;
        buf.copy_from_slice(&slot[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, off: u32, buf: &[u8]) -> Result<()> {
        check_write(self, off, buf.len() as u32)?;
        let mut inner = self.inner.borrow_mut();
        let slot = &mut inner.slots[self.id as usize];
        let start = off as usize;
        slot[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn erase(&mut self, off: u32, len: u32) -> Result<()> {
        check_erase(self, off, len)?;
        let erased_val = self.erased_val;
        let mut inner = self.inner.borrow_mut();
        let slot = &mut inner.slots[self.id as usize];
        let start = off as usize;
        for b in &mut slot[start..start + len as usize] {
            *b = erased_val;
        }
        Ok(())
    }
}
