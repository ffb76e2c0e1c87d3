pub mod serde;

pub use serde::encoding::{Decode, Encode, EncodingError};
