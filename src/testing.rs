//! Test helpers for code built on flatbeam.
//!
//! - **Mock I/O**: temporary files and directories, sources that deliver data in small chunks
//! - **Fixtures**: record pools and input builders for common layouts
//! - **Assertions**: record comparisons with readable failure messages
//!
//! ```
//! use flatbeam::parser::{FixLenParser, ParserSettings};
//! use flatbeam::testing::*;
//!
//! let mut parser = FixLenParser::new(type_a(), ParserSettings::default()).unwrap();
//! parser
//!     .set_data_source(Box::new(ChunkedSource::new(b"abcdefgABCDEFG".to_vec(), 3)))
//!     .unwrap();
//! let records = collect_records(&mut parser).unwrap();
//! assert_texts(&records, &[&["abc", "defg"], &["ABC", "DEFG"]]);
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_io;

pub use assertions::*;
pub use fixtures::*;
pub use mock_io::*;
