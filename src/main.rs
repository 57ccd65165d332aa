use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::future::pending;
use steam_idler::{Args, ConsolePrompt, Idler, Outcome, Settings, VentConnector};
use tokio::signal::ctrl_c;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::from(Args::parse());
    let interrupt = async {
        if let Err(e) = ctrl_c().await {
            error!(error = %e, "can't listen for ctrl-c");
            pending::<()>().await;
        }
    };

    let mut idler = Idler::new(VentConnector, ConsolePrompt::default(), settings);
    match idler.run(StdRng::from_entropy(), interrupt).await? {
        Outcome::Finished { cycles } => info!(cycles, "done idling"),
        // the connection and stdin tasks would otherwise keep the runtime alive
        Outcome::Interrupted => std::process::exit(0),
    }
    Ok(())
}
