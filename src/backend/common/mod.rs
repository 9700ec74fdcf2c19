pub(crate) mod constants;
pub mod dtos;
pub mod error;
