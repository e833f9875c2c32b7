pub mod availability_repository;
pub mod member_repository;
pub mod task_repository;
