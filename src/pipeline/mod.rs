// Pure transformations shared by both flows: no I/O, no store access

pub mod call_log;
pub mod classify;
pub mod reconcile;
pub mod timestamp;
