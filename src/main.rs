use ytdl_relay::{error, settings::Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let settings = Settings::from_env()?;
  error::init_tracing(&settings)?;

  if let Err(e) = ytdl_relay::run(settings).await {
    tracing::error!(error = %e, "ytdl-relay stopped");
    return Err(e);
  }
  Ok(())
}
