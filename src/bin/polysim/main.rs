//! polysim - terminal front-panel simulator for the polyctl control core.
//!
//! Runs the full control loop against in-memory stand-ins for the hardware
//! drivers: the computer keyboard plays the keybed, a background thread is
//! the step-timer interrupt, and the render sink feeds the voice display
//! instead of DACs.
//!
//! Run with: cargo run --bin polysim

mod app;
mod ui;

use app::App;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let mut terminal = ratatui::init();
    let result = App::new().run(&mut terminal);
    ratatui::restore();
    result
}
