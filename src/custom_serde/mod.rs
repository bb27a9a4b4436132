mod u32_string_serde;
mod u64_string_serde;

pub use self::{u32_string_serde::U32StringSerde, u64_string_serde::U64StringSerde};
