use anyhow::Result;
use random_cat::{config::Config, init_logger, server::RandomCatServer};

fn main() -> Result<()> {
    init_logger();

    RandomCatServer::new(Config::server()).start()
}
