use rental_moderation_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("rental moderation error: {err}");
        std::process::exit(1);
    }
}
