//! Wire format types for each provider protocol

pub mod google;
pub mod openai;
