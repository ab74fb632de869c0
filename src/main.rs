mod cli;
mod logging;
mod runner;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
