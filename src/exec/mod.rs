// src/exec/mod.rs

pub mod args;
pub mod backend;
pub mod executor;
pub mod expand;
pub mod platform;
pub mod process;

pub use args::{ToolCommand, build_test_args};
pub use backend::{ExecutorRunner, PackageRunner};
pub use executor::Executor;
pub use process::{ProcessHandle, ProcessOutput, SpawnRequest, teardown, terminate};
