pub mod remote;
pub mod task;
