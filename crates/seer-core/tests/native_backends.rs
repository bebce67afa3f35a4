use futures::StreamExt;
use httpmock::{Method::POST, MockServer};
use serde_json::json;

use seer_core::{
    GenerationConfig, StreamChunk, Turn, VisionModel,
    image::ImageInput,
    providers::{self, ProviderConfig, gemini, nvidia, ollama, qwen},
    streaming::collect_stream,
};

fn fixture() -> ImageInput {
    let pixels = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
    ImageInput::from(image::DynamicImage::ImageRgb8(pixels))
}

#[tokio::test]
async fn ollama_describe_sums_eval_counts() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_includes("\"num_predict\":300")
                .body_includes("\"stream\":false");
            then.status(200).json_body(json!({
                "model": "llava",
                "response": " A red square. ",
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 30,
                "eval_count": 5
            }));
        })
        .await;

    let model = ollama::Client::new(&server.base_url())
        .unwrap()
        .vision_model(ollama::LLAVA);
    let response = model.describe(&fixture(), Some(300)).await;

    mock.assert_async().await;
    assert_eq!(response.into_parts(), ("A red square.".to_string(), 35));
}

#[tokio::test]
async fn ollama_streams_ndjson() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/chat")
                .body_includes("\"keep_alive\":-1")
                .body_includes("\"images\":[\"QUJD\"]");
            then.status(200)
                .header("content-type", "application/x-ndjson")
                .body(concat!(
                    "{\"message\":{\"role\":\"assistant\",\"content\":\"It \"},\"done\":false}\n",
                    "{\"message\":{\"role\":\"assistant\",\"content\":\"is red\"},\"done\":false}\n",
                    "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"done_reason\":\"length\",\"prompt_eval_count\":20,\"eval_count\":4}\n",
                ));
        })
        .await;

    let model = ollama::Client::builder()
        .base_url(&server.base_url())
        .language("English")
        .build()
        .unwrap()
        .vision_model(ollama::LLAVA);
    let chunks: Vec<StreamChunk> = model
        .chat_streamly("", &[Turn::user("color?")], &GenerationConfig::default(), "QUJD")
        .collect()
        .await;

    assert_eq!(
        chunks,
        vec![
            StreamChunk::Partial("It ".into()),
            StreamChunk::Partial("It is red".into()),
            StreamChunk::Partial("It is red...\nFor the content length reason, it stopped, continue?".into()),
            StreamChunk::Done(24),
        ]
    );
}

#[tokio::test]
async fn gemini_chat_uses_model_role_and_key_param() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-1.5-flash:generateContent")
                .query_param("key", "G")
                .body_includes("\"role\":\"model\"")
                .body_includes("\"inlineData\"");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Red."}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 260, "candidatesTokenCount": 2, "totalTokenCount": 262}
            }));
        })
        .await;

    let model = gemini::Client::builder("G")
        .base_url(&server.base_url())
        .build()
        .unwrap()
        .vision_model(gemini::GEMINI_1_5_FLASH);
    let response = model
        .chat(
            "",
            &[Turn::user("hi"), Turn::assistant("hello"), Turn::user("color?")],
            &GenerationConfig::default(),
            "QUJD",
        )
        .await;

    mock.assert_async().await;
    assert_eq!(response.into_parts(), ("Red.".to_string(), 262));
}

#[tokio::test]
async fn gemini_stream_reads_sse() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-1.5-flash:streamGenerateContent")
                .query_param("alt", "sse");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(concat!(
                    "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Re\"}]}}],\"usageMetadata\":{\"promptTokenCount\":260,\"totalTokenCount\":260}}\r\n\r\n",
                    "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"d.\"}]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":260,\"candidatesTokenCount\":2,\"totalTokenCount\":262}}\r\n\r\n",
                ));
        })
        .await;

    let model = gemini::Client::builder("G")
        .base_url(&server.base_url())
        .build()
        .unwrap()
        .vision_model(gemini::GEMINI_1_5_FLASH);
    let response = collect_stream(model.chat_streamly(
        "",
        &[Turn::user("color?")],
        &GenerationConfig::default(),
        "QUJD",
    ))
    .await;

    assert_eq!(response.into_parts(), ("Red.".to_string(), 262));
}

#[tokio::test]
async fn gemini_transport_error_hides_key() {
    let model = gemini::Client::builder("SUPERSECRETKEY")
        .base_url("http://127.0.0.1:1")
        .build()
        .unwrap()
        .vision_model(gemini::GEMINI_1_5_FLASH);

    let response = model.describe(&fixture(), Some(64)).await;
    assert!(response.is_error());
    assert!(!response.text.contains("SUPERSECRETKEY"));
    assert_eq!(response.total_tokens, 0);

    let response = collect_stream(model.chat_streamly(
        "",
        &[Turn::user("hi")],
        &GenerationConfig::default(),
        "QUJD",
    ))
    .await;
    assert!(response.text.contains("**ERROR**: "));
    assert!(!response.text.contains("SUPERSECRETKEY"));
}

#[tokio::test]
async fn qwen_describes_images_it_cannot_decode() {
    // 1x1 GIF, a format the image codec is not built with
    const GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0xff, 0xff,
        0xff, 0x00, 0x00, 0x00, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
    ];

    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/services/aigc/multimodal-generation/generation")
                .body_includes("data:image/jpeg;base64,R0lGODlh");
            then.status(200).json_body(json!({
                "output": {"choices": [{
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": [{"text": "a gif"}]}
                }]},
                "usage": {"total_tokens": 5}
            }));
        })
        .await;

    let model = qwen::Client::builder("DS")
        .base_url(&server.base_url())
        .build()
        .unwrap()
        .vision_model(qwen::QWEN_VL_MAX);
    let response = model.describe(&ImageInput::from(GIF), None).await;

    mock.assert_async().await;
    assert_eq!(response.into_parts(), ("a gif".to_string(), 5));
}

#[tokio::test]
async fn qwen_error_body_becomes_marker() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/services/aigc/multimodal-generation/generation")
                .header("Authorization", "Bearer DS");
            then.status(200).json_body(json!({
                "code": "InvalidParameter",
                "message": "image format is illegal",
                "request_id": "r-1"
            }));
        })
        .await;

    let model = qwen::Client::builder("DS")
        .base_url(&server.base_url())
        .build()
        .unwrap()
        .vision_model(qwen::QWEN_VL_MAX);
    let response = model
        .chat("", &[Turn::user("hi")], &GenerationConfig::default(), "QUJD")
        .await;

    assert_eq!(
        response.text,
        "**ERROR**: InvalidParameter: image format is illegal"
    );
    assert_eq!(response.total_tokens, 0);
}

#[tokio::test]
async fn qwen_chat_answer() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/services/aigc/multimodal-generation/generation")
                .body_includes("data:image/jpeg;base64,QUJD");
            then.status(200).json_body(json!({
                "output": {"choices": [{
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": [{"text": "A chart."}]}
                }]},
                "usage": {"input_tokens": 1200, "output_tokens": 3}
            }));
        })
        .await;

    let model = qwen::Client::builder("DS")
        .base_url(&server.base_url())
        .build()
        .unwrap()
        .vision_model(qwen::QWEN_VL_MAX);
    let response = model
        .chat("", &[Turn::user("what?")], &GenerationConfig::default(), "QUJD")
        .await;

    assert_eq!(response.into_parts(), ("A chart.".to_string(), 1203));
}

#[tokio::test]
async fn nvidia_routes_by_model_name() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/community/llava16-34b")
                .header("accept", "application/json")
                .body_includes("<img src=\\\"data:image/jpeg;base64,");
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": "A square"}, "finish_reason": "stop"}],
                "usage": {"total_tokens": 17}
            }));
        })
        .await;

    let model = nvidia::Client::builder("NV")
        .base_url(&server.base_url())
        .build()
        .unwrap()
        .vision_model(nvidia::LLAVA_V1_6_34B)
        .unwrap();
    let response = model.describe(&fixture(), None).await;

    mock.assert_async().await;
    assert_eq!(response.into_parts(), ("A square".to_string(), 17));
}

#[tokio::test]
async fn config_built_model_talks_to_server() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": "done"}, "finish_reason": "stop"}],
                "usage": {"total_tokens": 5}
            }));
        })
        .await;

    let config = ProviderConfig::new("LM-Studio", "", "llava-v1.5").base_url(&server.base_url());
    let model = providers::build(&config).unwrap();
    let response = model
        .chat("", &[Turn::user("go")], &GenerationConfig::default(), "QUJD")
        .await;

    assert_eq!(model.provider_name(), "lmstudio");
    assert_eq!(response.into_parts(), ("done".to_string(), 5));
}
