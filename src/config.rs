use dotenv::dotenv;
use std::env::var;

pub static DEFAULT_SERVER_PORT: u16 = 80;
pub static DEFAULT_FUNCTION_PORT: u16 = 3000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
}

impl Config {
    /// Standalone server: `PORT`, defaulting to 80.
    pub fn server() -> Self {
        Self::from_env("PORT", DEFAULT_SERVER_PORT)
    }

    /// Function host: the port the Functions runtime hands to custom handlers.
    pub fn function() -> Self {
        Self::from_env("FUNCTIONS_CUSTOMHANDLER_PORT", DEFAULT_FUNCTION_PORT)
    }

    fn from_env(key: &str, default_port: u16) -> Self {
        dotenv().ok();

        Self {
            port: parse_port(var(key).ok().as_deref()).unwrap_or(default_port),
        }
    }
}

fn parse_port(value: Option<&str>) -> Option<u16> {
    value.and_then(|port| port.trim().parse::<u16>().ok())
}
