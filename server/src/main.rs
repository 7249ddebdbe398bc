use clap::Parser;
use log::{error, info};
use tokio::time::{interval, Duration, MissedTickBehavior};

use server::clock::SystemClock;
use server::server::GameServer;
use server::transport::UdpTransport;

/// Binds the UDP transport and drives the server core at a fixed tick
/// rate. Fatal tick errors abandon the offending batch and keep ticking.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Tick rate (simulation steps per second)
        #[clap(short, long, default_value = "30")]
        tick_rate: u32,
    }

    env_logger::init();
    let args = Args::parse();

    let address = format!("{}:{}", args.host, args.port);
    let transport = UdpTransport::bind(&address).await?;
    let mut game = GameServer::new(transport, SystemClock::new());

    let mut ticker = interval(Duration::from_secs_f32(1.0 / args.tick_rate as f32));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    ticker.tick().await;

    info!("server ticking at {} Hz", args.tick_rate);

    loop {
        ticker.tick().await;
        if let Err(e) = game.single_step() {
            error!("tick aborted: {}", e);
        }
    }
}
