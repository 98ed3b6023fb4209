//! Race checker runner

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use race_checker::{Driver, Expectation, HarnessConfig, RaceError, RaceTest, RACES};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Race test to run (repeatable); all tests when omitted
    #[clap(short, long = "test")]
    tests: Vec<String>,
    /// List the known race tests and exit
    #[clap(short, long)]
    list: bool,
    /// Print the reports as JSON on stdout
    #[clap(long)]
    json: bool,
    /// Largest step count to try per fixture
    #[clap(long)]
    max_steps: Option<usize>,
    /// How long one single-step may take before the child counts as blocked
    #[clap(long)]
    step_timeout_ms: Option<u64>,
    /// Step counts to try past the first terminal one
    #[clap(long)]
    overshoot: Option<usize>,
}

impl Args {
    fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        if let Some(max_steps) = self.max_steps {
            config = config.with_max_steps(max_steps);
        }
        if let Some(ms) = self.step_timeout_ms {
            config = config.with_step_timeout(Duration::from_millis(ms));
        }
        if let Some(overshoot) = self.overshoot {
            config = config.with_overshoot(overshoot);
        }
        config
    }

    fn selected(&self) -> Result<Vec<&'static RaceTest>> {
        if self.tests.is_empty() {
            return Ok(RACES.iter().collect());
        }
        let tests = self
            .tests
            .iter()
            .map(|name| {
                race_checker::races::find(name).ok_or_else(|| RaceError::UnknownTest(name.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tests)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list {
        for test in RACES.iter() {
            let kind = match test.expectation {
                Expectation::Safe => "safe",
                Expectation::Unsafe => "unsafe",
            };
            println!("{:<18} {:<7} {}", test.name, kind, test.description);
        }
        return Ok(());
    }

    let tests = args.selected()?;
    let mut driver = Driver::new(args.config());
    let reports = race_checker::run_all(&mut driver, &tests);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if !race_checker::all_passed(&reports) {
        log::error!("race check failed");
        std::process::exit(1);
    }
    Ok(())
}
