//! Instruction texts and the history transform applied before every chat request.

use crate::{
    error::VisionError,
    image::IMAGE_MEDIA_TYPE,
    language::Language,
    message::Turn,
};

/// Which describe instruction a backend sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptKind {
    /// Exhaustive extraction of charts, tables and any visible text.
    #[default]
    ChartExtraction,
    /// Short description of who, what, where and when.
    SceneDescription,
}

const CHART_EXTRACTION_ZH: &str = "回答使用繁體中文，你將會收到一張圖片，其中可能包含圖表、數據或其他視覺資訊。你的任務是：
1. 識別並列出圖片中的所有資訊，包括但不限於標題、軸標籤、圖例、數據點、年份、比例和圖表名稱。
2. 注重細節，確保每個可見數據點或文字內容都被提取出來。請列出圖表中每個數據值（如果有）。
3. 分段整理資訊，如標題、圖例、橫軸和縱軸的標籤和單位、具體的數據點（按年份）等。
4. 不要加入推測性或解釋性內容，僅列出圖片中所能直接觀察到的資訊。
5. 輸出的語言必須與圖片中的語言一致。如果圖片中的文字為中文，輸出也必須為中文；如果為英文，輸出也必須為英文。";

const CHART_EXTRACTION_EN: &str = "You will receive an image that may contain charts, data, or other visual information. Your task is to:
1. Identify and list all the information in the image, including but not limited to titles, axis labels, legends, data points, years, scales, and chart names.
2. Pay attention to detail to ensure that every visible data point or text content is extracted. Please list the data values for each year (if any) shown in the chart.
3. Organize the information into sections, such as titles, legends, labels and units of the horizontal and vertical axes, specific data points (by year), etc.
4. Do not add speculative or interpretative content; only list the information that can be directly observed in the image.
5. The output language must match the language in the image. If the text in the image is in Chinese, the output must also be in Chinese; if it is in English, the output must also be in English.";

const SCENE_DESCRIPTION_ZH: &str =
    "请用中文详细描述一下图中的内容，比如时间，地点，人物，事情，人物心情等，如果有数据请提取出数据。";

const SCENE_DESCRIPTION_EN: &str = "Please describe the content of this picture, like where, when, who, what happen. If it has number data, please extract them out.";

/// The describe instruction for a prompt kind, one fixed text per language.
pub fn instruction(kind: PromptKind, language: Language) -> &'static str {
    match (kind, language) {
        (PromptKind::ChartExtraction, Language::Chinese) => CHART_EXTRACTION_ZH,
        (PromptKind::ChartExtraction, Language::English) => CHART_EXTRACTION_EN,
        (PromptKind::SceneDescription, Language::Chinese) => SCENE_DESCRIPTION_ZH,
        (PromptKind::SceneDescription, Language::English) => SCENE_DESCRIPTION_EN,
    }
}

/// `data:` url for a base64 encoded image.
pub fn data_url(b64: &str) -> String {
    format!("data:{IMAGE_MEDIA_TYPE};base64,{b64}")
}

/// Inline html image tag, for backends that only accept text content.
pub fn inline_img_tag(b64: &str) -> String {
    format!(r#"<img src="{}"/>"#, data_url(b64))
}

/// Build the outgoing conversation for a chat request.
///
/// The history must end with a user turn. A non-empty `system` is not sent as its own turn;
/// instead the last turn becomes `system + last + "user query: " + last`. The caller's turns are
/// left untouched.
pub fn prepare_history(system: &str, history: &[Turn]) -> Result<Vec<Turn>, VisionError> {
    let Some(last) = history.last() else {
        return Err(VisionError::InvalidHistory(
            "conversation history is empty".into(),
        ));
    };
    if !last.is_user() {
        return Err(VisionError::InvalidHistory(format!(
            "last turn must come from the user, got {}",
            last.role
        )));
    }

    let mut outgoing = history.to_vec();
    if !system.is_empty()
        && let Some(last) = outgoing.last_mut()
    {
        last.content = format!("{system}{content}user query: {content}", content = last.content);
    }
    Ok(outgoing)
}
