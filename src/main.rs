mod app;
mod commands;
mod config;
mod devices;
mod logging;
mod permissions;
mod playback;
mod recording;
mod screen;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    app::run().await
}
