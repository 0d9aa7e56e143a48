//! Hello triangle
//!
//! Opens an 800x600 window and draws a single triangle until the window is
//! closed. Settings are read from `triangle.toml` in the working directory
//! when it exists.

use std::process::ExitCode;

use triangle_engine::{AppConfig, Application, RenderResult};

const CONFIG_PATH: &str = "triangle.toml";

fn run() -> RenderResult<()> {
    let config = AppConfig::load_or_default(CONFIG_PATH)?;
    config.validate()?;

    let mut app = Application::new(config);
    app.run()?;

    log::info!("Drew {} frames", app.frames_drawn());
    Ok(())
}

fn main() -> ExitCode {
    triangle_engine::logging::init();
    log::info!("Hello Vulkan Triangle!");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
