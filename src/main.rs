use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;

use chat_relay::{Cli, Config, Server, logging};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    logging::init(cli.verbose);

    if let Err(e) = serve(Config::from(&cli)).await {
        eprintln!("chat-relay: {e:#}");
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> Result<()> {
    let server = Server::bind(&config).with_context(|| format!("cannot listen on {}", config.addr))?;

    server.run().await?;

    Ok(())
}
