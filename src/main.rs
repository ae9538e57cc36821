use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match clavi::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("clavi: {error}");
            ExitCode::FAILURE
        }
    }
}
