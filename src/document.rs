//! PDF snapshots of submissions, attached to notification emails.
//!
//! A [Document] is a title plus labelled sections in a fixed order. Missing
//! optional values render as [PLACEHOLDER] so every document for a given
//! kind of record has the same shape.

use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};

use crate::models::application::Application;
use crate::models::contact::ContactMessage;
use crate::util::display_time;

pub const PLACEHOLDER: &str = "N/A";

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;

const TITLE_SIZE: f32 = 18.0;
const LABEL_SIZE: f32 = 12.0;
const VALUE_SIZE: f32 = 11.0;
const LINE_SPACING: f32 = 1.2;

/// Helvetica averages a little over half an em per character.
const AVERAGE_GLYPH_WIDTH: f32 = 0.52;

const REGULAR: Name<'static> = Name(b"F1");
const BOLD: Name<'static> = Name(b"F2");

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: &'static str,
    pub sections: Vec<Section>,
}

fn or_placeholder(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| PLACEHOLDER.to_owned())
}

impl Document {
    pub fn for_application(app: &Application) -> Self {
        let sections = vec![
            ("Full Name", app.full_name.clone()),
            ("Email Address", app.email.clone()),
            ("Address", app.address.clone()),
            ("Postcode", app.postcode.clone()),
            ("Phone Number", app.phone.clone()),
            ("Emergency Contact Name", app.emergency_name.clone()),
            ("Emergency Contact Phone", app.emergency_phone.clone()),
            ("Role", app.role.clone()),
            ("Food Hygiene Certificate", or_placeholder(&app.food_hygiene_certificate)),
            ("Certificate Brought", or_placeholder(&app.food_hygiene_certificate_bring)),
            ("Availability", app.availability.clone()),
            (
                "Relevant Qualifications, Skills & Experience",
                or_placeholder(&app.experience),
            ),
            ("Support Needs", or_placeholder(&app.support_needs)),
            ("Why would you like to work here?", or_placeholder(&app.why_work_here)),
            (
                "How did you first find out about this volunteer role?",
                or_placeholder(&app.how_did_you_find_out),
            ),
            ("Nationality / Visa Status", or_placeholder(&app.nationality_visa)),
            ("Referee 1 Name", or_placeholder(&app.referee1_name)),
            ("Referee 1 Address", or_placeholder(&app.referee1_address)),
            ("Referee 1 Postcode", or_placeholder(&app.referee1_postcode)),
            ("Referee 1 Email", or_placeholder(&app.referee1_email)),
            ("Referee 1 Phone", or_placeholder(&app.referee1_phone)),
            ("Referee 1 Relationship", or_placeholder(&app.referee1_relationship)),
            ("Referee 2 Name", or_placeholder(&app.referee2_name)),
            ("Referee 2 Address", or_placeholder(&app.referee2_address)),
            ("Referee 2 Postcode", or_placeholder(&app.referee2_postcode)),
            ("Referee 2 Email", or_placeholder(&app.referee2_email)),
            ("Referee 2 Phone", or_placeholder(&app.referee2_phone)),
            ("Referee 2 Relationship", or_placeholder(&app.referee2_relationship)),
            ("Signature", or_placeholder(&app.signature)),
            ("Signature Date", or_placeholder(&app.signature_date)),
            ("Submitted", display_time(app.created_at)),
        ];

        Self::new("Volunteer Application", sections)
    }

    pub fn for_contact(message: &ContactMessage) -> Self {
        let sections = vec![
            ("Name", message.name.clone()),
            ("Email", message.email.clone()),
            ("Phone", or_placeholder(&message.phone)),
            ("Subject", or_placeholder(&message.subject)),
            ("Message", message.message.clone()),
            ("Submitted", display_time(message.created_at)),
        ];

        Self::new("Contact Message", sections)
    }

    fn new(title: &'static str, sections: Vec<(&'static str, String)>) -> Self {
        Self {
            title,
            sections: sections
                .into_iter()
                .map(|(label, value)| Section {
                    // a blank value would leave a hole in the layout
                    value: if value.trim().is_empty() {
                        PLACEHOLDER.to_owned()
                    } else {
                        value
                    },
                    label,
                })
                .collect(),
        }
    }

    pub fn value_of(&self, label: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|section| section.label == label)
            .map(|section| section.value.as_str())
    }

    /// Render the document as a standalone PDF.
    pub fn to_pdf(&self) -> Vec<u8> {
        let mut layout = Layout::new();

        let title_width = text_width(self.title, TITLE_SIZE);
        layout.line(
            BOLD,
            TITLE_SIZE,
            ((PAGE_WIDTH - title_width) / 2.0).max(MARGIN),
            self.title,
        );
        layout.skip(TITLE_SIZE * 1.5);

        for section in &self.sections {
            for line in wrap(section.label, LABEL_SIZE) {
                layout.line(BOLD, LABEL_SIZE, MARGIN, &line);
            }
            for line in wrap(&section.value, VALUE_SIZE) {
                layout.line(REGULAR, VALUE_SIZE, MARGIN, &line);
            }
            layout.skip(VALUE_SIZE * 0.75);
        }

        layout.finish(self.title)
    }
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVERAGE_GLYPH_WIDTH
}

/// Break text into lines that fit between the margins.
fn wrap(text: &str, size: f32) -> Vec<String> {
    let max_chars = ((PAGE_WIDTH - 2.0 * MARGIN) / (size * AVERAGE_GLYPH_WIDTH)) as usize;
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_owned();
            while word.chars().count() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let split = word
                    .char_indices()
                    .nth(max_chars)
                    .map_or(word.len(), |(index, _)| index);
                let rest = word.split_off(split);
                lines.push(word);
                word = rest;
            }

            let needed = line.chars().count() + word.chars().count() + usize::from(!line.is_empty());
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Text in the standard fonts is WinAnsi-encoded; anything outside
/// Latin-1 can't be shown and becomes `?`.
fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ if c == '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

struct Layout {
    pages: Vec<Content>,
    cursor: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Content::new()],
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn skip(&mut self, height: f32) {
        self.cursor -= height;
    }

    fn line(&mut self, font: Name<'_>, size: f32, x: f32, text: &str) {
        let height = size * LINE_SPACING;
        if self.cursor - height < MARGIN {
            self.pages.push(Content::new());
            self.cursor = PAGE_HEIGHT - MARGIN;
        }
        self.cursor -= height;

        let content = self.pages.last_mut().expect("layout always has a page");
        content.begin_text();
        content.set_font(font, size);
        content.next_line(x, self.cursor);
        content.show(Str(&encode(text)));
        content.end_text();
    }

    fn finish(self, title: &str) -> Vec<u8> {
        let catalog_id = Ref::new(1);
        let page_tree_id = Ref::new(2);
        let regular_id = Ref::new(3);
        let bold_id = Ref::new(4);
        let info_id = Ref::new(5);
        let first_page = 6;

        let page_count = self.pages.len() as i32;
        let page_ids: Vec<Ref> = (0..page_count)
            .map(|index| Ref::new(first_page + index * 2))
            .collect();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(page_tree_id);
        pdf.pages(page_tree_id)
            .kids(page_ids.iter().copied())
            .count(page_count);
        pdf.type1_font(regular_id)
            .base_font(Name(b"Helvetica"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        pdf.type1_font(bold_id)
            .base_font(Name(b"Helvetica-Bold"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        pdf.document_info(info_id).title(pdf_writer::TextStr(title));

        for (page_id, content) in page_ids.into_iter().zip(self.pages) {
            let content_id = Ref::new(page_id.get() + 1);

            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
            page.parent(page_tree_id);
            page.contents(content_id);
            page.resources()
                .fonts()
                .pair(REGULAR, regular_id)
                .pair(BOLD, bold_id);
            page.finish();

            pdf.stream(content_id, &content.finish());
        }

        pdf.finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::models::application::NewApplication;

    fn bare_application() -> Application {
        NewApplication {
            full_name: "Ada Lovelace".to_owned(),
            email: "ada@example.org".to_owned(),
            address: "12 Analytical Row".to_owned(),
            postcode: "NW1 2AB".to_owned(),
            phone: "07700 900123".to_owned(),
            emergency_name: "Charles Babbage".to_owned(),
            emergency_phone: "07700 900456".to_owned(),
            role: "Front of House".to_owned(),
            availability: "Weekday mornings".to_owned(),
            experience: None,
            support_needs: None,
            why_work_here: None,
            how_did_you_find_out: None,
            nationality_visa: None,
            food_hygiene_certificate: None,
            food_hygiene_certificate_bring: None,
            referee1_name: None,
            referee1_address: None,
            referee1_postcode: None,
            referee1_email: None,
            referee1_phone: None,
            referee1_relationship: None,
            referee2_name: None,
            referee2_address: None,
            referee2_postcode: None,
            referee2_email: None,
            referee2_phone: None,
            referee2_relationship: None,
            referee_name: None,
            referee_email: None,
            referee_relationship: None,
            signature: None,
            signature_date: None,
            consent: true,
        }
        .into_application(Uuid::nil(), datetime!(2026-05-01 09:30 UTC))
    }

    #[test]
    fn missing_optional_fields_get_placeholders() {
        let document = Document::for_application(&bare_application());

        assert_eq!(document.sections.len(), 31);
        for label in [
            "Food Hygiene Certificate",
            "Support Needs",
            "Referee 2 Relationship",
            "Signature Date",
        ] {
            assert_eq!(document.value_of(label), Some(PLACEHOLDER), "{label}");
        }
        assert!(document
            .sections
            .iter()
            .all(|section| !section.value.is_empty()));
        assert_eq!(document.value_of("Submitted"), Some("2026-05-01 09:30 UTC"));
    }

    #[test]
    fn section_order_is_stable() {
        let mut full = bare_application();
        full.experience = Some("Ran a soup kitchen".to_owned());
        full.signature = Some("A. Lovelace".to_owned());

        let labels = |document: Document| {
            document
                .sections
                .into_iter()
                .map(|section| section.label)
                .collect::<Vec<_>>()
        };

        assert_eq!(
            labels(Document::for_application(&bare_application())),
            labels(Document::for_application(&full))
        );
    }

    #[test]
    fn pdf_contains_every_section() {
        let pdf = Document::for_application(&bare_application()).to_pdf();
        let text = String::from_utf8_lossy(&pdf);

        assert!(pdf.starts_with(b"%PDF-"));
        assert!(text.contains("(Volunteer Application)"));
        assert!(text.contains("(Ada Lovelace)"));
        assert_eq!(text.matches("(N/A)").count(), 21);
    }

    #[test]
    fn rendering_is_deterministic() {
        let document = Document::for_application(&bare_application());

        assert_eq!(document.to_pdf(), document.to_pdf());
    }

    #[test]
    fn long_messages_spill_onto_more_pages() {
        let message = ContactMessage {
            id: Uuid::nil(),
            name: "Grace Hopper".to_owned(),
            email: "grace@example.org".to_owned(),
            phone: None,
            subject: None,
            message: "Lorem ipsum dolor sit amet. ".repeat(400),
            created_at: datetime!(2026-05-01 09:30 UTC),
        };

        let pdf = Document::for_contact(&message).to_pdf();
        let text = String::from_utf8_lossy(&pdf);

        assert!(text.contains("/Count 3") || text.contains("/Count 4"));
    }

    #[test]
    fn wrapping_respects_the_margins() {
        let lines = wrap(&"word ".repeat(100), VALUE_SIZE);

        assert!(lines.len() > 1);
        assert!(lines
            .iter()
            .all(|line| text_width(line, VALUE_SIZE) <= PAGE_WIDTH - 2.0 * MARGIN));
    }
}
