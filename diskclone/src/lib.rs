pub mod copy;
pub mod job;
pub mod logging;
pub mod remote;
pub mod storage;
