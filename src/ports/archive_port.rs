//! Durable daily archive port trait.
//!
//! Only the archiver writes through this port, and a single process is
//! assumed to own the underlying store.

use crate::domain::archive::ArchiveRecord;
use crate::domain::error::PricedashError;

pub trait ArchivePort {
    /// Every stored record, ascending by date.
    fn read_records(&self) -> Result<Vec<ArchiveRecord>, PricedashError>;

    /// Appends one record. Must return `PricedashError::ArchiveConflict` when a
    /// record for the same date is already stored.
    fn append(&self, record: &ArchiveRecord) -> Result<(), PricedashError>;
}
