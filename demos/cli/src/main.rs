use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use changelog_api::decode_response;
use changelog_core::{
    DisplayMode, MemoryWatermarkStore, ResolvedTheme, Theme, WatermarkStore, WidgetConfig,
};
use changelog_ui::{generate_styles, Controller, MemoryTarget, StyleOptions};

const PREVIEW_KEY: &str = "pk_preview";

#[derive(Parser, Debug)]
#[command(
    name = "changelog-cli",
    about = "Render the changelog widget for a saved API response."
)]
struct Args {
    /// JSON file holding a changelog response body.
    #[arg(short, long)]
    input: PathBuf,

    /// card, popup or trigger.
    #[arg(long, default_value = "popup")]
    mode: String,

    /// light, dark or auto.
    #[arg(long, default_value = "light")]
    theme: String,

    /// Last-seen timestamp (epoch ms) to render unread state against.
    #[arg(long)]
    watermark: Option<i64>,

    /// Render the panel as if the reader had opened it.
    #[arg(long)]
    open: bool,

    /// Print the generated stylesheet before the markup.
    #[arg(long)]
    css: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let body = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read {:?}", args.input))?;

    let mut config = WidgetConfig::new(PREVIEW_KEY);
    config.mode = DisplayMode::parse(&args.mode)
        .with_context(|| format!("unknown mode {:?}", args.mode))?;
    config.theme =
        Theme::parse(&args.theme).with_context(|| format!("unknown theme {:?}", args.theme))?;

    let store = match args.watermark {
        Some(watermark) => MemoryWatermarkStore::with_watermark(PREVIEW_KEY, watermark),
        None => MemoryWatermarkStore::new(),
    };

    let mut controller = Controller::new(config, MemoryTarget::new(), store);
    let Some(ticket) = controller.init() else {
        bail!("preview target failed to mount");
    };
    controller.complete_load(ticket, decode_response(200, &body));
    if let Some(error) = &controller.state().error {
        bail!("could not decode {:?}: {error}", args.input);
    }

    let unread = controller.unread_count();
    if args.open {
        controller.open();
    }

    if args.css {
        let theme = controller.theme().unwrap_or(ResolvedTheme::Light);
        let config = controller.config();
        println!(
            "{}",
            generate_styles(&StyleOptions {
                color: &config.color,
                z_index: config.z_index,
                theme,
            })
        );
    }
    println!("{}", controller.target().html);

    eprintln!(
        "entries: {}, unread before render: {unread}, stored watermark: {:?}",
        controller.state().entries.len(),
        controller.store().load(PREVIEW_KEY)?
    );
    Ok(())
}
