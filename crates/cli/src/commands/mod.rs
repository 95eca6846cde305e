pub mod peek;
pub mod serve;
pub mod sessions;
