//! Chat prompts for facts generation

use super::llm_client::ChatMessage;
use facts_common::config::PromptSettings;
use facts_common::models::TrackMetadata;

const UNKNOWN: &str = "unknown";

const MALFORMED_RETRY_NOTE: &str =
    "Предыдущий ответ был в неверном формате. Верни только JSON-объект без ``` и без пояснений.";

/// `[system, user]` conversation for one format attempt (1-based)
pub fn build_messages(
    prompt: &PromptSettings,
    metadata: &TrackMetadata,
    event_type: &str,
    attempt: u32,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(prompt, attempt)),
        ChatMessage::user(user_prompt(prompt, metadata, event_type)),
    ]
}

pub fn system_prompt(prompt: &PromptSettings, attempt: u32) -> String {
    let mut text = format!(
        "Ты генерируешь один интересный факт о треке и возвращаешь строго один JSON-объект без Markdown и лишнего текста.\n\
         Формат: {{\"formatVersion\":{version},\"lang\":\"{lang}\",\"short\":\"...\",\"full\":\"...\",\"sources\":[{{\"title\":\"...\",\"url\":\"...\"}}]}}.\n\
         Типы полей: formatVersion:int, lang:string, short:string, full:string, sources:array<{{title,url}}> из 1..{max} элементов.\n\
         Каждый url должен начинаться с http:// или https://.\n",
        version = prompt.format_version,
        lang = prompt.lang,
        max = prompt.max_sources,
    );

    if attempt > 1 {
        text.push_str(MALFORMED_RETRY_NOTE);
    }
    text
}

pub fn user_prompt(prompt: &PromptSettings, metadata: &TrackMetadata, event_type: &str) -> String {
    format!(
        "Сгенерируй один проверяемый факт о треке.\n\
         title=\"{title}\"; artist=\"{artist}\"; year={year}; durationMs={duration}; explicit={explicit}; eventType={event_type}; lang={lang}.\n\
         Если нет достоверной информации, напиши, что достоверный факт не найден, но сохрани формат.\n",
        title = escape_quoted(text_or_unknown(metadata.title.as_deref())),
        artist = escape_quoted(text_or_unknown(metadata.artist.as_deref())),
        year = value_or_unknown(metadata.year),
        duration = value_or_unknown(metadata.duration_ms),
        explicit = value_or_unknown(metadata.explicit),
        event_type = text_or_unknown(Some(event_type)),
        lang = prompt.lang,
    )
}

fn text_or_unknown(value: Option<&str>) -> &str {
    match value {
        Some(text) if !text.trim().is_empty() => text,
        _ => UNKNOWN,
    }
}

/// Escape a value placed inside `"..."` so it cannot close the attribute
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn value_or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| UNKNOWN.to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_contract() {
        let prompt = PromptSettings::default();
        let text = system_prompt(&prompt, 1);

        assert!(text.contains("\"formatVersion\":1"));
        assert!(text.contains("\"lang\":\"ru\""));
        assert!(text.contains("1..3"));
        assert!(!text.contains(MALFORMED_RETRY_NOTE));
    }

    #[test]
    fn test_retry_attempt_adds_malformed_note() {
        let text = system_prompt(&PromptSettings::default(), 2);
        assert!(text.ends_with(MALFORMED_RETRY_NOTE));
    }

    #[test]
    fn test_user_prompt_renders_missing_values_as_unknown() {
        let metadata = TrackMetadata {
            title: Some("  ".to_string()),
            artist: Some("Artist".to_string()),
            ..Default::default()
        };

        let text = user_prompt(&PromptSettings::default(), &metadata, "created");

        assert!(text.contains("title=\"unknown\""));
        assert!(text.contains("artist=\"Artist\""));
        assert!(text.contains("year=unknown"));
        assert!(text.contains("durationMs=unknown"));
        assert!(text.contains("explicit=unknown"));
        assert!(text.contains("eventType=created"));
        assert!(text.contains("lang=ru"));
    }

    #[test]
    fn test_user_prompt_renders_values() {
        let metadata = TrackMetadata {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            year: Some(1999),
            duration_ms: Some(215_000),
            explicit: Some(true),
            ..Default::default()
        };

        let text = user_prompt(&PromptSettings::default(), &metadata, "refresh");

        assert!(text.contains("year=1999"));
        assert!(text.contains("durationMs=215000"));
        assert!(text.contains("explicit=true"));
    }

    #[test]
    fn test_user_prompt_escapes_quotes_in_text_values() {
        let metadata = TrackMetadata {
            title: Some("Say \"Hi\"\nnow".to_string()),
            artist: Some("AC\\DC".to_string()),
            ..Default::default()
        };

        let text = user_prompt(&PromptSettings::default(), &metadata, "created");

        assert!(text.contains(r#"title="Say \"Hi\"\nnow";"#), "{}", text);
        assert!(text.contains(r#"artist="AC\\DC";"#), "{}", text);
    }

    #[test]
    fn test_build_messages_roles() {
        let messages = build_messages(&PromptSettings::default(), &TrackMetadata::default(), "updated", 1);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }
}
