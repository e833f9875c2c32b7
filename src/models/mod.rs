pub mod assignment;
pub mod constraints;
pub mod member;
pub mod snapshot;
pub mod task;
