use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Dropping the run future on a signal releases any clone workspace it owns.
    let result = tokio::select! {
        result = threatscope::cli::run() => result,
        _ = shutdown_signal() => {
            eprintln!("\nInterrupted, cleaning up...");
            return ExitCode::from(threatscope::errors::EXIT_INTERRUPTED);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(threatscope::errors::get_exit_code(&e))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
