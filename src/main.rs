#[tokio::main]
async fn main() {
    if let Err(e) = eventdesk_backend::run().await {
        eprintln!("eventdesk-backend failed: {}", e);
        std::process::exit(1);
    }
}
