mod scheduler;

pub use scheduler::{AdmissionScheduler, DEFAULT_CEILING};
