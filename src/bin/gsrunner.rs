//! gsrunner Binary
//!
//! Runs the bootstrap sequence and reports what it resolved. Useful for
//! checking a config file and registry file before deploying a service.

use gsrunner::{exit_on_error, Runner};
use std::time::Duration;
use tracing::info;

fn main() {
    let runner = match Runner::new("gsrunner")
        .seconds(
            "linger",
            "gsrunner.linger",
            0,
            "seconds to stay up after startup",
        )
        .and_then(|runner| runner.flag_string("lookup", "gsrunner.lookup", "", "service name to resolve"))
    {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    exit_on_error(runner.run(|runner| {
        let settings = runner.settings();
        info!(
            keys = settings.len(),
            services = runner.registry().len(),
            "startup complete"
        );

        let lookup = settings.string("gsrunner.lookup", "");
        if !lookup.is_empty() {
            match runner.registry().id_of(&lookup) {
                Some(id) => println!("{}={}", lookup, id),
                None => anyhow::bail!("service not registered: {}", lookup),
            }
        }

        let linger = settings.seconds("gsrunner.linger", Duration::ZERO);
        if !linger.is_zero() {
            std::thread::sleep(linger);
        }
        Ok(())
    }));
}
