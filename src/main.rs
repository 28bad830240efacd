use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    callboard_lib::init_logging();

    let offline = std::env::args().skip(1).any(|arg| arg == "--offline");
    match callboard_lib::run(offline).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}\n{}", e, e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
