//! Input formats for file sources
//!
//! Formats decide **how** a file is decoded into rows; storage clients decide
//! **where** the bytes come from. Every format plugs into the task through
//! [`ReaderFactory`](crate::traits::reader::ReaderFactory).
//!
//! | Format | Reader | Header | Delimiter |
//! |--------|--------|--------|-----------|
//! | CSV | [`CsvDataReader`] | first record | configurable |

pub mod csv;

pub use csv::{CsvDataReader, CsvReaderFactory, DEFAULT_DELIMITER};
