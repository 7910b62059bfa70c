//! Platform helpers below the port adapters.

pub mod task_pin;
