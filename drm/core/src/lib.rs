#![allow(clippy::doc_overindented_list_items)]

mod constants;
mod error;
mod header;
mod types;

pub mod utils;

pub use self::constants::WIDEVINE_SYSTEM_ID;
pub use self::error::{ContentKeyError, HeaderError, ParseError};
pub use self::header::ContentHeader;
pub use self::types::{ContentKey, KeyType, normalize_kid};
pub use self::utils::{eq_ignore_ascii_case, trim_ascii};
