//! Types that represent the core data model, such as `ReceiptRecord` and `Category`.
mod amount;
mod category;
mod date;
mod image;
mod publication;
mod receipt;

pub use amount::{Amount, AmountError};
pub use category::{Categories, Category, ALL_CATEGORIES};
pub use date::{parse_date, serial_date, sheet_date, Period};
pub use image::{ImageInput, ImageKind};
pub use publication::{PublicationKey, SheetColumns};
pub use receipt::{ContentHash, ExtractedReceipt, ReceiptRecord};
