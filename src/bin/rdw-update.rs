use std::process::ExitCode;

use clap::Parser;
use rdw_dev::UpdateCommand;

#[tokio::main]
async fn main() -> ExitCode {
    let command = UpdateCommand::parse();
    rdw_dev::init_tracing(command.common.debug);
    command.execute().await
}
