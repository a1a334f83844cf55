pub mod color;
pub mod config;
pub mod error;
pub mod info;
pub mod interaction;
pub mod legend;
pub mod loader;
pub mod matcher;
pub mod renderer;
pub mod server;
pub mod style;
pub mod surface;
pub mod types;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::color::ColorScale;
use crate::config::AppConfig;
use crate::interaction::PointerEvent;
use crate::loader::DataLoader;
use crate::renderer::MapRenderer;
use crate::surface::headless::{HeadlessSurface, Viewport};
use crate::surface::raster::RasterSurface;
use crate::surface::Capabilities;
use crate::types::LatLng;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the choropleth overlay tiles
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the datasets, tiles and zone lookup API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Hover (or click) the zone at a coordinate and print the info panel
    Inspect {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Click instead of hover, fitting the view to the zone
        #[arg(long)]
        click: bool,
        /// Browser user agent, used to detect legacy rendering engines
        #[arg(long)]
        user_agent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { config } => {
            info!("Rendering map with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;
            let loader = DataLoader::from_config(&app_config.data)?;

            let mut renderer = MapRenderer::new(
                RasterSurface::new(),
                app_config.map.clone(),
                app_config.style,
                ColorScale::density(),
            );
            renderer.init();
            if let Err(err) = renderer.draw_zones(&loader, &app_config.data).await {
                error!(error = %err, "Zone boundaries not rendered");
                return Err(anyhow::Error::new(err).context("Failed to render zone boundaries"));
            }

            let written = renderer.into_surface().write_tiles(&app_config.output)?;
            println!(
                "Wrote {} tiles to {:?}",
                written, app_config.output.tile_dir
            );
        }
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;
            let loader = DataLoader::from_config(&app_config.data)?;

            server::start_server(app_config, loader).await?;
        }
        Commands::Inspect {
            config,
            lat,
            lon,
            click,
            user_agent,
        } => {
            let app_config = AppConfig::load_from_file(&config)?;
            let loader = DataLoader::from_config(&app_config.data)?;

            let capabilities = user_agent
                .as_deref()
                .map(Capabilities::from_user_agent)
                .unwrap_or_default();
            let mut renderer = MapRenderer::new(
                HeadlessSurface::with_capabilities(capabilities),
                app_config.map.clone(),
                app_config.style,
                ColorScale::density(),
            );
            renderer.init();
            if let Err(err) = renderer.draw_zones(&loader, &app_config.data).await {
                error!(error = %err, "Zone boundaries not rendered");
                return Err(anyhow::Error::new(err).context("Failed to render zone boundaries"));
            }

            let position = LatLng::new(lat, lon);
            let Some(layer) = renderer.surface().layer_at(position) else {
                println!("{}", renderer.info().render_text());
                println!("No zone at {}, {}", lat, lon);
                return Ok(());
            };

            let event = if click {
                PointerEvent::click(layer)
            } else {
                PointerEvent::enter(layer)
            };
            renderer.dispatch(event);

            println!("{}", renderer.info().render_text());
            if let Some(overlay) = renderer.surface().overlay(layer) {
                println!(
                    "Style: fill {} ({}), stroke {} weight {}",
                    overlay.style.fill_color, overlay.style.fill_opacity, overlay.style.color, overlay.style.weight
                );
            }
            match &renderer.surface().viewport {
                Some(Viewport::Bounds(bounds)) => println!(
                    "View: fit to [{}, {}] - [{}, {}]",
                    bounds.min().y,
                    bounds.min().x,
                    bounds.max().y,
                    bounds.max().x
                ),
                Some(Viewport::Centered { center, zoom }) => {
                    println!("View: {}, {} at zoom {}", center.lat, center.lng, zoom)
                }
                None => {}
            }
        }
    }

    Ok(())
}
