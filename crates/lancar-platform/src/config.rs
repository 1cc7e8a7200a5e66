use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub http_addr: String,
    pub company_name: String,
    pub seed_demo: bool,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr.to_string());
        let company_name =
            std::env::var("COMPANY_NAME").unwrap_or_else(|_| "PT Lancar Sejahtera".to_string());
        let seed_demo = match std::env::var("SEED_DEMO") {
            Ok(value) => value
                .trim()
                .parse::<bool>()
                .context("SEED_DEMO must be true or false")?,
            Err(_) => true,
        };

        Ok(Self {
            http_addr,
            company_name,
            seed_demo,
        })
    }
}
