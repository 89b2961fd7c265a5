#[tokio::main]
async fn main() {
    if let Err(e) = medsim_lib::run().await {
        eprintln!("medsim: {e}");
        std::process::exit(1);
    }
}
