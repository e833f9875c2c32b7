pub mod assignment_optimizer;
pub mod assignment_scoring;
pub mod assignment_service;
pub mod availability;
pub mod schedule_utils;
pub mod workload_tracker;
