//! Port traits: the seams between the domain and the outside world.

pub mod archive_port;
pub mod clock_port;
pub mod config_port;
pub mod feed_port;
pub mod report_store_port;
