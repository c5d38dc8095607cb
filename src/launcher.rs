//! Dependency setup and supervision of the development services.

pub mod deps;
pub mod supervisor;

pub use deps::{dependencies_present, install_dependencies, install_stages, InstallStage};
pub use supervisor::{
    shutdown_signal, LaunchReport, Readiness, ServiceExit, ServiceSpec, StartupGate, Supervisor,
};
