//! Intraday feed port trait.

use crate::domain::error::PricedashError;
use crate::domain::loader::RawRow;

pub trait FeedPort {
    /// All rows currently in the feed, in source order.
    fn read_rows(&self) -> Result<Vec<RawRow>, PricedashError>;
}
