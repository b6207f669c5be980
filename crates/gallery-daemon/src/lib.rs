pub mod server;
pub mod storage;
pub mod telemetry;

mod form;
