// src/main.rs

use dropgate::build::BuildStatus;
use dropgate::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(BuildStatus::Completed) => {}
        Ok(status) => {
            eprintln!("dropgate: build ended {status:?}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("dropgate error: {err:?}");
            std::process::exit(2);
        }
    }
}

async fn run_main() -> anyhow::Result<BuildStatus> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
