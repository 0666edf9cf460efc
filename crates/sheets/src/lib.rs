//! Registration intake: the spreadsheet row sink and the recorder that
//! reports whether a lead was saved.

pub mod client;
pub mod recorder;

pub use client::{GoogleSheetsClient, RowSink, SheetsError};
pub use recorder::{confirmation_message, RecordOutcome, RegistrationRecorder, SHEET_HEADER};
