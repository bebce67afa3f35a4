/// Describe an image with any configured provider.
///
/// ```text
/// OPENAI_API_KEY=... cargo run --example describe_image -- path/to/chart.png
/// ```
use seer::{VisionModel, image::ImageInput, providers::openai};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: describe_image <image path>"))?;

    let model = openai::Client::from_env()?.vision_model(openai::GPT_4O_MINI);
    let image = ImageInput::from_path(&path)?;

    // Errors come back in the text itself
    let response = model.describe(&image, Some(1024)).await;
    if response.is_error() {
        anyhow::bail!("{}", response.text);
    }

    println!("{response}");
    Ok(())
}
