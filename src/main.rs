use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use confdb::server::ConfigServer;
use confdb::ConfigStore;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(long, default_value = "127.0.0.1:9400")]
    addr: String,

    /// Durable audit-trail sink, one line per recorded event.
    #[clap(long, default_value = "changes_config.log")]
    history_log: PathBuf,
}

fn main() {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(async_main());
}

async fn async_main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,confdb=info");
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    println!("--- confdb Configuration Store ---");
    println!("History log: {}", args.history_log.display());

    // One store per process, injected into every adapter. No singleton.
    let store = Arc::new(ConfigStore::open(&args.history_log));

    let addr = args.addr.clone();
    let server_store = store.clone();
    tokio::spawn(async move {
        let server = ConfigServer::new(server_store);
        server.run(&addr).await;
    });

    println!("confdb listening on {}", args.addr);
    println!("Node is Ready.");

    tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl-c");
    println!("Shutting down.");
}
