//! Domain types for Stockpile

pub mod bar;
pub mod earnings;
pub mod interval;

pub use bar::PriceBar;
pub use earnings::EarningsEvent;
pub use interval::{BarInterval, FetchWindow};

