#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_portal::run().await {
        eprintln!("exam-portal fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
