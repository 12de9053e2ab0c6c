use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.backend_url {
            Some(url) => println!("  backend-url: {url}"),
            None => println!("  backend-url: (unset, demo mode only)"),
        }
        match self.connect_timeout_secs {
            Some(secs) => println!("  connect-timeout: {secs}s"),
            None => println!("  connect-timeout: (default)"),
        }
        println!(
            "  demo pacing: {}ms total, at most {}ms per token",
            self.demo.total_budget().as_millis(),
            self.demo.max_token_delay().as_millis()
        );
    }
}
