//! Binix Shields - replay a page and print its tracker statistics
//!
//! Usage: `binix-shields [FIXTURE.json] [--config CONFIG.json]`

use binix_shields::channel::{SecurityToken, host_channel};
use binix_shields::host::StatsCollector;
use binix_shields::page::PageFixture;
use binix_shields::shields::ResourceType;
use binix_shields::{NAME, Result, ShieldsConfig, ShieldsError, TrackingProtectionStats, VERSION};
use std::env;
use std::rc::Rc;

struct Args {
    fixture: Option<String>,
    config: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        fixture: None,
        config: None,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| ShieldsError::Config("--config needs a path".into()))?;
                args.config = Some(path);
            }
            _ if args.fixture.is_none() => args.fixture = Some(arg),
            _ => return Err(ShieldsError::Config(format!("unexpected argument '{}'", arg))),
        }
    }
    Ok(args)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("{}: {}", NAME, e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => ShieldsConfig::load(path)?,
        None => ShieldsConfig::default(),
    };
    let fixture = match &args.fixture {
        Some(path) => PageFixture::load(path)?,
        None => PageFixture::demo(),
    };

    println!("{} v{}", NAME, VERSION);
    println!("page: {}", fixture.url);

    let window = fixture.build()?;
    let (sender, mut receiver) = host_channel();
    let mut collector = StatsCollector::new(config.message_handler.clone());

    let stats = TrackingProtectionStats::new(
        Rc::clone(&window),
        Rc::new(sender),
        SecurityToken::generate()?,
        config,
    );
    stats.set_enabled(true)?;
    fixture.replay(&window);
    stats.set_enabled(false)?;

    collector.drain(&mut receiver);
    let Some(page) = collector.page(window.location().as_str()) else {
        println!("no blocked resources");
        return Ok(());
    };

    for resource_type in [ResourceType::Script, ResourceType::Image, ResourceType::XmlHttpRequest] {
        println!("{:>16}: {}", resource_type.as_str(), page.count(resource_type));
    }
    for (url, resource_type) in page.resources() {
        println!("  [{}] {}", resource_type, url);
    }
    Ok(())
}
