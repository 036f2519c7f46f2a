//! Plain-text and HTML rendering of the extracted records
//!
//! Everything here is a pure function of the records, the captured CSS
//! and a date string, so identical inputs render byte-identical output.

use chrono::{DateTime, Local, Locale};

use crate::extract::{CommentaryRecord, ScriptureRecord};

/// Section label for the scripture part of the digest.
pub const SECTION_SCRIPTURE: &str = "말씀";
/// Section label for the commentary part of the digest.
pub const SECTION_COMMENTARY: &str = "해설";

/// Footer line appended to every generated document.
pub const FOOTER_NOTE: &str = "본 메일은 자동으로 발송되었습니다.";

/// Base stylesheet for the generated document; the CSS captured from the
/// site is appended after it so site rules win on conflicts.
const BASE_STYLE: &str = r#"body {
    font-family: 'Malgun Gothic', Arial, sans-serif;
    line-height: 1.6;
    color: #333;
    max-width: 800px;
    margin: 0 auto;
    padding: 20px;
}
.header {
    text-align: center;
    margin-bottom: 30px;
    border-bottom: 1px solid #16a085;
    padding-bottom: 10px;
}
.section-title {
    font-size: 24px;
    font-weight: bold;
    margin-top: 30px;
    margin-bottom: 20px;
    color: #2c3e50;
    border-bottom: 2px solid #16a085;
    padding-bottom: 10px;
}
.bible-header {
    margin-bottom: 20px;
    font-size: 16px;
    color: #555;
    border-bottom: 1px solid #eee;
    padding-bottom: 10px;
}
.bible-info {
    font-size: 18px;
    font-weight: bold;
    color: #2c3e50;
    line-height: 1.7;
    background-color: #f5f9f8;
    padding: 15px;
    border-left: 4px solid #16a085;
    border-radius: 4px;
}
.bible-content {
    margin-bottom: 30px;
    font-size: 18px;
    line-height: 1.8;
}
.bible-verse {
    margin-bottom: 15px;
}
.verse-number {
    font-weight: bold;
    margin-right: 10px;
    color: #16a085;
}
.verse-text {
    display: inline;
}
.explanation-wrapper {
    background-color: #f9f9f9;
    padding: 20px;
    border-radius: 5px;
    margin-bottom: 30px;
}
.explanation-title {
    font-size: 22px;
    font-weight: bold;
    color: #2c3e50;
    margin-bottom: 20px;
}
.explanation-section {
    margin-bottom: 20px;
}
.explanation-subtitle {
    font-size: 18px;
    font-weight: bold;
    color: #16a085;
    margin-bottom: 10px;
}
.explanation-content {
    line-height: 1.8;
}
.explanation-info {
    font-style: italic;
    color: #7f8c8d;
    margin-top: 15px;
    font-size: 14px;
}
.footer {
    margin-top: 30px;
    text-align: center;
    font-size: 14px;
    color: #7f8c8d;
    border-top: 1px solid #16a085;
    padding-top: 10px;
}"#;

/// Long-form date used in the document header and upload descriptions,
/// e.g. `2025년 01월 01일 (수요일)`.
pub fn display_date(now: DateTime<Local>) -> String {
    now.format_localized("%Y년 %m월 %d일 (%A)", Locale::ko_KR)
        .to_string()
}

/// Email subject for the day's digest.
pub fn subject(now: DateTime<Local>) -> String {
    format!(
        "[매일성경] 오늘의 말씀 - {}",
        now.format_localized("%Y-%m-%d (%A)", Locale::ko_KR)
    )
}

/// Compact date used in artifact file names, e.g. `20250101`.
pub fn file_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d").to_string()
}

/// Timestamp used in screenshot file names, e.g. `20250101_063000`.
pub fn time_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Plain-text scripture section: header, blank line, `<num>. <text>`
/// per verse.
pub fn scripture_text(record: &ScriptureRecord) -> String {
    let verses = record
        .verses
        .iter()
        .map(|v| format!("{}. {}", v.number, v.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n{}", record.header, verses)
}

/// Plain-text commentary section: title, blank line, subtitle/content
/// pairs each followed by a blank line, then the trailing info.
pub fn commentary_text(record: &CommentaryRecord) -> String {
    let mut out = format!("{}\n\n", record.title);
    for section in &record.sections {
        out.push_str(&format!("{}\n{}\n\n", section.subtitle, section.content));
    }
    out.push_str(&record.info);
    out
}

/// The ordered labeled sections making up the plain-text digest.
pub fn digest_sections(
    scripture: &ScriptureRecord,
    commentary: &CommentaryRecord,
) -> Vec<(&'static str, String)> {
    vec![
        (SECTION_SCRIPTURE, scripture_text(scripture)),
        (SECTION_COMMENTARY, commentary_text(commentary)),
    ]
}

/// Render the labeled sections as the text artifact saved to disk.
pub fn text_artifact(sections: &[(&str, String)]) -> String {
    let mut out = String::new();
    for (label, body) in sections {
        out.push_str(&format!("===== {} =====\n\n{}\n\n", label, body));
    }
    out
}

fn scripture_html(record: &ScriptureRecord) -> String {
    let mut html = String::from("<div class=\"bible-header\">");
    html.push_str(&format!(
        "<div class=\"bible-info\">{}</div>",
        record.header.replace('\n', "<br>")
    ));
    html.push_str("</div>");

    html.push_str("<div class=\"bible-content\">");
    for verse in &record.verses {
        html.push_str(&format!(
            "<div class=\"bible-verse\"><span class=\"verse-number\">{}</span><span class=\"verse-text\">{}</span></div>",
            verse.number, verse.text
        ));
    }
    html.push_str("</div>");
    html
}

fn commentary_html(record: &CommentaryRecord) -> String {
    let mut html = String::from("<div class=\"explanation-wrapper\">");
    html.push_str(&format!(
        "<h2 class=\"explanation-title\">{}</h2>",
        record.title
    ));

    for section in &record.sections {
        let content = section
            .content
            .replace("\n\n", "<br><br>")
            .replace('\n', "<br>");
        html.push_str("<div class=\"explanation-section\">");
        html.push_str(&format!(
            "<h3 class=\"explanation-subtitle\">{}</h3>",
            section.subtitle
        ));
        html.push_str(&format!(
            "<div class=\"explanation-content\">{}</div>",
            content
        ));
        html.push_str("</div>");
    }

    html.push_str(&format!(
        "<div class=\"explanation-info\">{}</div>",
        record.info
    ));
    html.push_str("</div>");
    html
}

/// Render the self-contained HTML document: fixed template (localized
/// date header, base style, footer), the two content blocks, and the
/// captured site CSS embedded verbatim.
pub fn render_document(
    scripture: &ScriptureRecord,
    commentary: &CommentaryRecord,
    css: &str,
    display_date: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>오늘의 말씀 - {date}</title>
    <style>
{base_style}
/* 사이트에서 추출한 스타일 */
{css}
    </style>
</head>
<body>
    <div class="header">
        <h1>오늘의 말씀 - {date}</h1>
    </div>

    <div class="bible-wrapper">
        <h1 class="section-title">{scripture_label}</h1>
        {scripture}
    </div>
    <div class="explanation-container">
        <h1 class="section-title">{commentary_label}</h1>
        {commentary}
    </div>

    <div class="footer">
        <p>{footer}</p>
    </div>
</body>
</html>
"#,
        date = display_date,
        base_style = BASE_STYLE,
        css = css,
        scripture_label = SECTION_SCRIPTURE,
        scripture = scripture_html(scripture),
        commentary_label = SECTION_COMMENTARY,
        commentary = commentary_html(commentary),
        footer = FOOTER_NOTE,
    )
}
