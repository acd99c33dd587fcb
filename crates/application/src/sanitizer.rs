use domain::{ChatMessage, DisplayName};

/// 用户输入清洗（外部协作者）。
///
/// 返回空字符串表示输入清洗后没有可用内容。
pub trait TextSanitizer: Send + Sync {
    fn sanitize_name(&self, raw: &str) -> String;

    fn sanitize_message(&self, raw: &str) -> String;
}

/// 默认清洗实现：去除控制字符、首尾空白，HTML 转义，按字符数截断。
///
/// 截断发生在转义之后，且不会把实体切成两半，因此结果长度不超过上限。
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlSanitizer;

impl TextSanitizer for HtmlSanitizer {
    fn sanitize_name(&self, raw: &str) -> String {
        clean(raw, DisplayName::MAX_CHARS, false)
    }

    fn sanitize_message(&self, raw: &str) -> String {
        clean(raw, ChatMessage::MAX_TEXT_CHARS, true)
    }
}

fn clean(raw: &str, max_chars: usize, keep_newlines: bool) -> String {
    let normalized = raw.replace("\r\n", "\n");
    let filtered: String = normalized
        .chars()
        .filter(|c| !c.is_control() || (keep_newlines && *c == '\n'))
        .collect();

    let mut out = String::with_capacity(filtered.len());
    let mut used = 0;
    let mut buf = [0u8; 4];
    for c in filtered.trim().chars() {
        let piece: &str = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            '\'' => "&#39;",
            _ => c.encode_utf8(&mut buf),
        };
        let width = piece.chars().count();
        if used + width > max_chars {
            break;
        }
        out.push_str(piece);
        used += width;
    }

    out.trim_end().to_owned()
}
