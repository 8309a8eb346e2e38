use std::path::Path;

use clap::Parser;
use log::info;

use tabdash::api::DashApi;
use tabdash::conf::Config;
use tabdash::core::{CliArgs, setup_logging};
use tabdash::service::DashService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = CliArgs::parse();
    info!(args = args; "tabdash started");

    let config = Config::load(args.config.as_deref().map(Path::new))?;
    let addr = config.server.addr();
    let service = DashService::new(config)?;

    DashApi::new(service).serve(&addr).await?;
    Ok(())
}
