use anyhow::Context;
use clap::Parser;
use crosshatch::app::{self, DemoOptions};
use crosshatch::{CrosshatchConfig, init_logging};

fn main() -> anyhow::Result<()> {
    let options = DemoOptions::parse();

    let mut config = CrosshatchConfig::load_or_default();
    config.merge_with_env();
    init_logging(config.logging.clone());

    log::info!(
        "starting crosshatch with paper '{}' and assets in {}",
        config.hatch.paper,
        config.assets.root.display()
    );

    app::run(config, options).context("crosshatch demo failed")
}
