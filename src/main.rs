use std::process::ExitCode;

use clap::Parser;
use rdw_dev::StartCommand;

#[tokio::main]
async fn main() -> ExitCode {
    let command = StartCommand::parse();
    rdw_dev::init_tracing(command.common.debug);
    command.execute().await
}
