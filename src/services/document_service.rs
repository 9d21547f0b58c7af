use chrono::{DateTime, Utc};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::services::storage_service::{StorageService, StoredFile};

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 56;
const BODY_WRAP: usize = 88;
/// Courier glyphs are 0.6em wide; at 7pt that is 118 columns between margins.
const MONO_WRAP: usize = 118;

/// Facts printed on the proof-of-submission document.
#[derive(Debug, Clone)]
pub struct SummaryFacts {
    pub job_title: String,
    pub company_name: String,
    pub applicant_name: String,
    pub email: String,
    pub phone: String,
    pub message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub tracking_token: String,
    pub tracking_url: String,
    pub resume_reference: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Title(String),
    Heading(String),
    Body(String),
    Mono(String),
    Gap,
}

impl Line {
    fn font(&self) -> (&'static str, i64) {
        match self {
            Line::Title(_) => ("F2", 20),
            Line::Heading(_) => ("F2", 13),
            Line::Body(_) => ("F1", 10),
            Line::Mono(_) => ("F3", 7),
            Line::Gap => ("F1", 10),
        }
    }

    fn leading(&self) -> i64 {
        match self {
            Line::Title(_) => 30,
            Line::Heading(_) => 20,
            Line::Body(_) => 14,
            Line::Mono(_) => 12,
            Line::Gap => 10,
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Line::Title(t) | Line::Heading(t) | Line::Body(t) | Line::Mono(t) => Some(t),
            Line::Gap => None,
        }
    }
}

fn summary_lines(facts: &SummaryFacts) -> Vec<Line> {
    let mut lines = vec![
        Line::Title("Application Summary".into()),
        Line::Body(format!(
            "Submitted {}",
            facts.submitted_at.format("%Y-%m-%d %H:%M UTC")
        )),
        Line::Gap,
        Line::Heading("Job".into()),
    ];
    push_wrapped(&mut lines, &format!("Position: {}", facts.job_title));
    push_wrapped(&mut lines, &format!("Company: {}", facts.company_name));

    lines.push(Line::Gap);
    lines.push(Line::Heading("Applicant".into()));
    push_wrapped(&mut lines, &format!("Name: {}", facts.applicant_name));
    push_wrapped(&mut lines, &format!("Email: {}", facts.email));
    push_wrapped(&mut lines, &format!("Phone: {}", facts.phone));

    if let Some(message) = facts.message.as_deref() {
        lines.push(Line::Gap);
        lines.push(Line::Heading("Message".into()));
        for paragraph in message.lines() {
            if paragraph.trim().is_empty() {
                lines.push(Line::Gap);
            } else {
                push_wrapped(&mut lines, paragraph);
            }
        }
    }

    lines.push(Line::Gap);
    lines.push(Line::Heading("Track your application".into()));
    lines.push(Line::Body(
        "Open the address below and enter the email you applied with:".into(),
    ));
    // Broken only after URL delimiters; the lines concatenate back to the URL.
    for chunk in wrap_url(&facts.tracking_url, MONO_WRAP) {
        lines.push(Line::Mono(chunk));
    }
    lines.push(Line::Body(format!("Tracking token: {}", facts.tracking_token)));
    lines
}

fn push_wrapped(lines: &mut Vec<Line>, text: &str) {
    for chunk in wrap(text, BODY_WRAP) {
        lines.push(Line::Body(chunk));
    }
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            out.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

fn wrap_url(url: &str, width: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut segment = String::new();
    for c in url.chars() {
        segment.push(c);
        if matches!(c, '/' | '?' | '&' | '=') {
            segments.push(std::mem::take(&mut segment));
        }
    }
    if !segment.is_empty() {
        segments.push(segment);
    }

    let mut out = Vec::new();
    let mut current = String::new();
    for segment in segments {
        if !current.is_empty()
            && current.chars().count() + segment.chars().count() > width
        {
            out.push(std::mem::take(&mut current));
        }
        current.push_str(&segment);
        while current.chars().count() > width {
            let rest: String = current.chars().skip(width).collect();
            let head: String = current.chars().take(width).collect();
            out.push(head);
            current = rest;
        }
    }
    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

/// Splits lines into per-page content streams, starting a new page when the
/// next line would cross the bottom margin.
fn paginate(lines: &[Line]) -> Vec<String> {
    let top = PAGE_HEIGHT - MARGIN;
    let mut pages = Vec::new();
    let mut content = String::new();
    let mut y = top;

    for line in lines {
        let leading = line.leading();
        if y - leading < MARGIN && y != top {
            pages.push(std::mem::take(&mut content));
            y = top;
        }
        y -= leading;
        if let Some(text) = line.text() {
            let (font, size) = line.font();
            content.push_str(&format!(
                "BT\n/{} {} Tf\n{} {} Td\n({}) Tj\nET\n",
                font,
                size,
                MARGIN,
                y,
                escape_pdf_string(text)
            ));
        }
    }
    if !content.is_empty() || pages.is_empty() {
        pages.push(content);
    }
    pages
}

/// WinAnsi-safe string literal body. Latin-1 characters become octal
/// escapes; anything outside Latin-1 becomes '?'.
fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii() && !c.is_control() => out.push(c),
            c if ('\u{a0}'..='\u{ff}').contains(&c) => {
                out.push_str(&format!("\\{:03o}", c as u32))
            }
            _ => out.push('?'),
        }
    }
    out
}

fn font(base: &str) -> Object {
    Object::Dictionary(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Renders the fixed-layout summary as PDF bytes.
pub fn render_summary_pdf(facts: &SummaryFacts) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));
    let mono_id = doc.add_object(font("Courier"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
            "F3" => mono_id,
        },
    });

    let mut page_ids: Vec<ObjectId> = Vec::new();
    for content in paginate(&summary_lines(facts)) {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(format!("Application: {}", facts.job_title)),
        "Producer" => Object::string_literal("jobboard-backend"),
        "ResumeReference" => Object::string_literal(facts.resume_reference.clone()),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| Error::RenderFailure(e.to_string()))?;
    Ok(buffer)
}

#[derive(Debug, Clone)]
pub struct DocumentService {
    storage: StorageService,
}

impl DocumentService {
    pub fn new(storage: StorageService) -> Self {
        Self { storage }
    }

    /// Renders the summary off the async workers and stores it under a name
    /// derived from the tracking token. Any failure here is a `RenderFailure`.
    pub async fn render_and_store(&self, facts: SummaryFacts) -> Result<StoredFile> {
        let token = facts.tracking_token.clone();
        let pdf = tokio::task::spawn_blocking(move || render_summary_pdf(&facts))
            .await
            .map_err(|e| Error::RenderFailure(format!("render task aborted: {}", e)))??;

        self.storage
            .store_summary(&token, &pdf)
            .await
            .map_err(|e| Error::RenderFailure(format!("could not persist summary: {}", e)))
    }
}
