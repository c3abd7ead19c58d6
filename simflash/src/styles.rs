//! Flash styles.
//!
//! Various microcontrollers have very different write alignments. These are
//! the shapes `boot`'s tests exercise the trailer codec and decision engine
//! against, modelled after real device families.

/// The write alignment and slot capacity of one flash style.
pub struct AreaLayout {
    pub write_size: usize,
    pub capacity: usize,
}

/// STM32F4-style: small write alignment, large sectors.
pub static STM32F: AreaLayout = AreaLayout { write_size: 8, capacity: 128 * 1024 };

/// K64-style: small write alignment, small uniform sectors.
pub static K64: AreaLayout = AreaLayout { write_size: 8, capacity: 4 * 1024 };

/// External SPI-flash style: large write alignment.
pub static EXT: AreaLayout = AreaLayout { write_size: 256, capacity: 4 * 1024 };

/// Page-style, based on the LPC55S69: write alignment equals sector size.
pub static LPC: AreaLayout = AreaLayout { write_size: 512, capacity: 128 * 1024 };

/// Large-write style, based on the STM32H745.
pub static STM32H: AreaLayout = AreaLayout { write_size: 32, capacity: 128 * 1024 };
