#[tokio::main]
async fn main() {
    if let Err(e) = handoff::run().await {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
