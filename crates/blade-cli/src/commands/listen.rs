//! `blade listen`: print server events until interrupted.

use anyhow::Result;
use tracing::info;

use blade_client::SessionOptions;

pub async fn run(options: SessionOptions) -> Result<()> {
    let (session, _status) = super::open(options).await?;
    info!("listening for events, ctrl-c to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
        }
        closed = session.wait_for(|s| s.channel.closed()) => {
            closed?;
            anyhow::bail!("connection closed by server");
        }
    }

    session.disconnect()?;
    Ok(())
}
