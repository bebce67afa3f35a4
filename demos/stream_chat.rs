/// Stream an image-grounded answer from a provider picked at runtime.
///
/// ```text
/// cargo run --example stream_chat -- Ollama llava http://localhost:11434 path/to/photo.jpg
/// ```
use seer::{
    GenerationConfig, Turn,
    image::ImageInput,
    providers::{self, ProviderConfig},
    streaming::stream_to_stdout,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [provider, model_name, base_url, path] = args.as_slice() else {
        anyhow::bail!("usage: stream_chat <provider> <model> <base url> <image path>");
    };

    let key = std::env::var("SEER_API_KEY").unwrap_or_default();
    let config = ProviderConfig::new(provider, &key, model_name)
        .base_url(base_url)
        .lang("English");
    let model = providers::build(&config)?;

    let image_b64 = ImageInput::from_path(path)?.to_base64()?;
    let history = [Turn::user("What is in this picture?")];

    let mut stream = model.chat_streamly(
        "Be precise and concise. ",
        &history,
        &GenerationConfig::new().temperature(0.5).max_tokens(512),
        &image_b64,
    );
    let total_tokens = stream_to_stdout(&mut stream).await?;
    println!("Tokens used: {total_tokens}");

    Ok(())
}
