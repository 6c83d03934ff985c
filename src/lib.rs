pub mod extract;
pub mod form;
pub mod panic_handler;
pub mod render;
pub mod settings;

pub use extract::{ExtractionEngine, ExtractionStatus, FieldKey, FieldRegistry};
pub use form::InvoiceForm;
