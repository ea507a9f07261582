//! ASIC chain access: the 9-bit word codec, BM13xx command frames and the
//! data port they travel over.

pub mod bm13xx;
pub mod port;
pub mod word;

pub use port::AsicPort;
pub use word::{decode_words, encode_words};
