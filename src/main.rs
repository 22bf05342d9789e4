use dictrace::{bridge, config::Settings, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    logging::init_logging(&settings.log_level);

    bridge::run(&settings.socket_path).await?;
    Ok(())
}
