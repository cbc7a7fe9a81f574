//! Pure text heuristics shared by every HTML-based source.
//!
//! Nothing in here touches the network or a DOM; inputs are the flattened
//! text of one product container (or its title) and outputs are plain values.

pub mod brand;
pub mod price;
pub mod unit;

pub use brand::infer_brand;
pub use price::{extract_price, format_amount, parse_amount, PriceExtraction, Saving};
pub use unit::{extract_quantity, Quantity, Unit};
