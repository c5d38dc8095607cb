//! The launcher command.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use termcolor::Color;

use crate::cli::CommonArgs;
use crate::config::{ProjectConfig, ServiceConfig};
use crate::launcher::{
    dependencies_present, install_dependencies, install_stages, shutdown_signal, ServiceSpec,
    StartupGate, Supervisor,
};
use crate::report::{banner, say, Reporter, Tag, Tone};
use crate::utils::preflight::{check_tools, Tool};

/// Starts the server and client development services.
#[derive(Parser, Debug)]
#[command(name = "rdw-start", version)]
#[command(about = "Starts the Remote Desktop Web development services", long_about = None)]
pub struct StartCommand {
    /// Installs dependencies before starting, even when they look present.
    #[arg(short, long)]
    pub install: bool,

    /// Only checks prerequisites.
    #[arg(long)]
    pub check_only: bool,

    /// Shared options.
    #[command(flatten)]
    pub common: CommonArgs,
}

impl StartCommand {
    /// Executes the launcher and returns the process exit code.
    pub async fn execute(self) -> ExitCode {
        let reporter = Arc::new(Reporter::new(self.common.debug));

        let code = match self.run(&reporter).await {
            Ok(code) => code,
            Err(e) => {
                let _ = reporter.critical("Unexpected launcher error", Some(&e));
                ExitCode::FAILURE
            }
        };

        reporter.summarize();
        code
    }

    async fn run(&self, reporter: &Arc<Reporter>) -> Result<ExitCode> {
        banner("Remote Desktop Web", "Development launcher");

        let root = self.common.project_root()?;
        let config = ProjectConfig::load(&root)?;
        let services = &config.services;

        let tools = [
            Tool::node(&services.runtime),
            Tool::npm(&services.package_manager),
        ];
        if !check_tools(&tools) {
            say(
                Tone::Failure,
                "\n❌ Prerequisites not met. Install the missing tools and try again.",
            );
            return Ok(ExitCode::FAILURE);
        }

        if self.check_only {
            say(Tone::Success, "\n✅ All prerequisites are installed");
            return Ok(ExitCode::SUCCESS);
        }

        let stages = install_stages(&root, &services.server.dir, &services.client.dir);
        if self.install || !dependencies_present(&stages) {
            if !self.install {
                say(Tone::Warning, "\n⚠️  Dependencies are missing");
            }
            let installed = install_dependencies(
                &services.package_manager,
                &services.install_args,
                &stages,
                reporter,
            )
            .await;
            if !installed {
                say(
                    Tone::Failure,
                    "❌ Could not install dependencies. Fix the errors above and try again.",
                );
                return Ok(ExitCode::FAILURE);
            }
        }

        let server = service_spec(
            &root,
            &services.package_manager,
            &services.server,
            Color::Green,
        );
        let client = service_spec(
            &root,
            &services.package_manager,
            &services.client,
            Color::Cyan,
        );

        let supervisor = Supervisor::from_config(reporter.clone(), &config.startup);
        let gate = StartupGate::from_config(&config.startup);
        let report = supervisor
            .run(server, client, &gate, shutdown_signal())
            .await;

        tracing::debug!(?report, "Launcher finished");
        if report.failures() > 0 {
            Ok(ExitCode::FAILURE)
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn service_spec(
    root: &Path,
    package_manager: &str,
    service: &ServiceConfig,
    color: Color,
) -> ServiceSpec {
    ServiceSpec {
        name: service.name.clone(),
        tag: Tag::new(service.name.to_uppercase(), color),
        program: package_manager.to_string(),
        args: service.args.clone(),
        dir: root.join(&service.dir),
        url: service.url.clone(),
    }
}
