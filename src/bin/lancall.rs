//! LAN call endpoint
//!
//! Usage: `lancall <server|client> <peer-ip>`
//!
//! Both endpoints run the same binary with mirrored roles: the server
//! listens on the base ports and sends to base+1, the client the other
//! way around, so two instances can share one machine over 127.0.0.1.

use std::net::IpAddr;
use std::process;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lancall::config::{CallConfig, CallRole};
use lancall::session::CallSession;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (role, peer_ip) = match parse_args() {
        Some(parsed) => parsed,
        None => {
            eprintln!("Usage: lancall <server|client> <peer-ip>");
            process::exit(1);
        }
    };

    let config = CallConfig::load(role, peer_ip)?;
    let mut session = CallSession::start(config)?;
    session.run_cli()?;
    session.shutdown();
    Ok(())
}

fn parse_args() -> Option<(CallRole, IpAddr)> {
    let mut args = std::env::args().skip(1);
    let role = CallRole::parse(&args.next()?)?;
    let peer_ip = args.next()?.parse().ok()?;
    Some((role, peer_ip))
}
