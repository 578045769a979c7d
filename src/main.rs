mod cli;
mod config;
mod error;
mod logging;
mod materialize;
mod outline;
mod presets;
mod runner;
mod tree;

fn main() -> anyhow::Result<()> {
    let app = cli::parse();
    logging::init(app.verbose);
    runner::run(app)
}
