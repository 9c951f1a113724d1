use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    brokerflow_cli::run().await
}
