use anyhow::Result;
use random_cat::{config::Config, function::FunctionHost, init_logger};

fn main() -> Result<()> {
    init_logger();

    FunctionHost::new(Config::function()).start()
}
