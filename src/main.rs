#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(error) = pomocycle::run().await {
        eprintln!("pomocycle: {error}");
        std::process::exit(1);
    }
}
