//! Reusable Adapter Components
//!
//! Building blocks shared by every venue codec.
//!
//! | Component | Primary Operation |
//! |-----------|-------------------|
//! | Parsing Utils | Lenient JSON field extraction and numeric conversion |
//! | Symbol helpers | Wire-format to canonical symbol mapping |
//! | Subscription builder | Method/params/id request construction |

pub mod parsing_utils;

pub use parsing_utils::*;
