//! PTP client status monitor
//!
//! Usage:
//!   cargo run --example ptp_status                      # multicast, default interface
//!   cargo run --example ptp_status -- eth0              # multicast on eth0
//!   cargo run --example ptp_status -- --server 10.0.0.5:319
//!
//! Binding the standard ports 319/320 usually needs elevated privileges.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use ptp_client::protocol::ptp::format_clock_time;
use ptp_client::{PtpClientConfig, PtpClientHandle};

fn config_from_args() -> Result<PtpClientConfig, Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(PtpClientConfig::default()),
        Some("--server") => {
            let server: SocketAddr = args.next().ok_or("--server needs an address")?.parse()?;
            let bind = match server {
                SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                SocketAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
            };
            Ok(PtpClientConfig::unicast(bind, server))
        }
        Some(interface) => Ok(PtpClientConfig::default().interface(interface)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ptp_client=info".parse()?),
        )
        .init();

    let client = PtpClientHandle::start(config_from_args()?).await?;
    if let Some(interface) = client.interface() {
        println!("Using interface {} ({})", interface.name, interface.address);
    }

    let status = client.status();
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = status.snapshot();
                println!("Clock time: {}", format_clock_time(client.clock().now()));
                println!("{snapshot}");
                println!("{}", serde_json::to_string(&snapshot)?);
                println!();
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
