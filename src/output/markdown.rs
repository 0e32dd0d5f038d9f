//! Markdown rendering of topics
//!
//! Rendering is a pure function from a topic to a text block; the block is
//! appended to the topic's monthly document.

use crate::crawler::{AttachmentRef, Body, MediaRef, RecordKind, Topic};

/// Separator written after every topic block
pub const BLOCK_SEPARATOR: &str = "\n---\n\n";

/// Renders a topic as a markdown block, separator included
///
/// # Example
///
/// ```
/// use zsxq_harvest::crawler::Topic;
/// use zsxq_harvest::output::render_topic;
///
/// let topic: Topic = serde_json::from_str(r#"{
///     "topic_id": 1,
///     "type": "talk",
///     "create_time": "2024-01-15T10:20:30.456+0800",
///     "talk": {"owner": {"name": "alice"}, "text": "hello"}
/// }"#).unwrap();
///
/// let block = render_topic(&topic);
/// assert!(block.starts_with("## 2024-01-15T10:20:30.456+0800-alice-talk"));
/// ```
pub fn render_topic(topic: &Topic) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "## {}-{}-{}",
        topic.create_time,
        topic.author(),
        topic.kind
    ));
    lines.push(String::new());

    match topic.record_kind() {
        RecordKind::Post => {
            if let Some(talk) = &topic.talk {
                render_post(talk, &mut lines);
            }
        }
        RecordKind::QuestionAnswer => {
            if let Some(question) = &topic.question {
                render_section(question, "Question", &mut lines);
            }
            if let Some(answer) = &topic.answer {
                render_section(answer, "Answer", &mut lines);
            }
        }
        RecordKind::Other => {}
    }

    let mut block = lines.join("\n");
    block.push_str(BLOCK_SEPARATOR);
    block
}

fn render_post(talk: &Body, lines: &mut Vec<String>) {
    let text = talk.text();
    if !text.is_empty() {
        lines.push(String::new());
        // user text must not open new headings
        lines.push(text.replace('#', "-"));
        lines.push(String::new());
    }
    render_media(talk, "###", "Images", "Files", lines);
}

fn render_section(body: &Body, title: &str, lines: &mut Vec<String>) {
    let text = body.text();
    if !text.is_empty() {
        lines.push(format!(
            "### {} ({})",
            title,
            body.owner_name().unwrap_or("unknown")
        ));
        lines.push(String::new());
        lines.push(text.replace('#', "-"));
        lines.push(String::new());
    }
    render_media(
        body,
        "####",
        &format!("{} images", title),
        &format!("{} files", title),
        lines,
    );
}

fn render_media(
    body: &Body,
    level: &str,
    images_title: &str,
    files_title: &str,
    lines: &mut Vec<String>,
) {
    if !body.images.is_empty() {
        lines.push(format!("{} {}", level, images_title));
        lines.push(String::new());
        for image in &body.images {
            let media = MediaRef::from_image(image);
            lines.push(format!("![image](../{})", media.relative_path()));
            lines.push(String::new());
        }
    }

    if !body.files.is_empty() {
        lines.push(format!("{} {}", level, files_title));
        lines.push(String::new());
        for file in &body.files {
            let attachment = AttachmentRef::from_file(file);
            lines.push(format!(
                "- [{}](../{})",
                attachment.name,
                attachment.relative_path()
            ));
        }
        lines.push(String::new());
    }
}
