//! textsync CLI entrypoint.
//!
//! Boots a process as either the Coordinator (the authority that
//! linearizes and fans out patches) or a Participant (a single upstream
//! connection to a Coordinator). The editor integration that would drive
//! `onLocalTextChanged`/replay `EditorCommand`s is out of scope ;
//! this binary only wires up the convergence engine and its transport, and
//! idles until interrupted.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use textsync_core::{ClockSource, PeerRole, SystemTimeSource};
use textsync_session::{connect, listen, EngineHandle};
use tracing::info;

/// textsync command line arguments.
#[derive(Parser, Debug)]
#[command(name = "textsync")]
#[command(about = "Star-topology text synchronization Coordinator/Participant")]
struct Args {
	/// Display name for this peer, used only in logs.
	#[arg(short, long, default_value = "peer")]
	name: String,

	/// Verbose logging.
	#[arg(short, long)]
	verbose: bool,

	#[command(subcommand)]
	role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
	/// Run as the Coordinator: the authority that linearizes and fans out.
	Coordinator {
		/// Address to listen on, e.g. `0.0.0.0:4500`.
		#[arg(short, long)]
		listen: SocketAddr,

		/// Initial document text; a Coordinator takes it from configuration
		/// rather than fetching it from anywhere.
		#[arg(short, long, default_value = "")]
		text: String,
	},
	/// Run as a Participant: a single upstream connection to a Coordinator.
	Participant {
		/// Coordinator address to dial, e.g. `127.0.0.1:4500`.
		#[arg(short, long)]
		connect: SocketAddr,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_max_level(if args.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::INFO
		})
		.init();

	// The startup clock exchange is fatal on failure ; the real
	// NTP round trip is out of scope , so this binary ships the
	// in-scope `SystemTimeSource` fallback, which never fails.
	let clock = ClockSource::connect(&SystemTimeSource, &args.name)
		.expect("SystemTimeSource never reports a clock error");

	match args.role {
		Role::Coordinator { listen: addr, text } => {
			info!(name = %args.name, %addr, "starting coordinator");
			let engine = EngineHandle::spawn(args.name, PeerRole::coordinator(), clock);
			engine.set_local_text(text).await;

			let bound = listen(addr, engine).await?;
			info!(addr = %bound.local_addr(), "coordinator listening");

			tokio::signal::ctrl_c().await?;
			info!("shutting down");
		}
		Role::Participant { connect: addr } => {
			info!(name = %args.name, %addr, "starting participant");
			let engine = EngineHandle::spawn(args.name, PeerRole::participant(), clock);

			let link = connect(addr, engine.clone()).await?;
			let text = link.get_text().await?;
			engine.set_local_text(text).await;
			engine.set_upstream(Some(link)).await;
			info!("seeded from coordinator; awaiting local edits and force patches");

			tokio::signal::ctrl_c().await?;
			info!("shutting down");
		}
	}

	Ok(())
}
