use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use dhtrpc::{rpc::Application, Bytes, Contact, Dht, Packet, Payload};
use tracing::{info, Level};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on, an ephemeral port if omitted.
    #[arg(short, long)]
    port: Option<u16>,
    /// Address of a peer to bootstrap from, can be repeated.
    #[arg(short, long)]
    contact: Vec<SocketAddr>,
    /// Message to broadcast once bootstrapped.
    #[arg(short, long)]
    broadcast: Option<String>,
    /// Print debug logs, including every packet sent and received.
    #[arg(short, long)]
    verbose: bool,
}

/// Echoes custom commands and prints broadcasts.
#[derive(Debug)]
struct Chat;

impl Application for Chat {
    fn on_custom_command(&mut self, packet: &Packet) -> Option<Bytes> {
        match packet.payload() {
            Payload::Custom(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn on_broadcast(&mut self, packet: &Packet) {
        if let Payload::Broadcast(value) = packet.payload() {
            println!(
                "{} says: {}",
                packet.sender(),
                String::from_utf8_lossy(value)
            );
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_thread_names(true)
        .init();

    let mut builder = Dht::builder().application(Chat);

    if let Some(port) = cli.port {
        builder = builder.port(port);
    }

    for address in cli.contact {
        builder = builder.add_contact(Contact::from_address(address));
    }

    let mut dht = builder.build().expect("Failed to create DHT node");

    let info = dht.info().expect("DHT node was shutdown");
    info!(id = %info.id(), address = ?info.local_addr(), "DHT node is running! Press Ctrl+C to stop.");

    let (tx_interrupted, rx_interrupted) = mpsc::channel();

    ctrlc::set_handler(move || {
        let _ = tx_interrupted.send(());
    })
    .expect("Error setting Ctrl-C handler");

    let mut broadcast = cli.broadcast;

    loop {
        match rx_interrupted.recv_timeout(Duration::from_secs(5)) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        let info = dht.info().expect("DHT node was shutdown");

        info!(
            routing_table_size = info.routing_table_size(),
            pending_requests = info.pending_requests(),
            seen_broadcasts = info.seen_broadcasts(),
            "Node status"
        );

        if info.routing_table_size() > 0 {
            if let Some(message) = broadcast.take() {
                let message_hash = dht
                    .broadcast(Bytes::from(message))
                    .expect("DHT node was shutdown");

                info!(?message_hash, "Broadcast sent");
            }
        }
    }

    println!("\nShutting down...");
    dht.shutdown();
}
