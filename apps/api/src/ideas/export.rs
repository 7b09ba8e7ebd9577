//! Renders a stored idea into a Word (`.docx`) document.
//!
//! The document is first built as an ordered list of blocks, then packaged as a
//! minimal OOXML archive: content types, package relationships, the main
//! document part and a small style sheet for the title and headings.

use std::io::{Cursor, Write};

use chrono::SecondsFormat;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::models::idea::IdeaRecord;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const FILENAME_MAX_CHARS: usize = 60;
const FILENAME_PLACEHOLDER: &str = "project";
const NO_RECOMMENDATIONS: &str = "No recommendations saved for this idea.";

const NEXT_STEPS: [&str; 4] = [
    "1) Create a repo/folder locally (e.g., in VSCode).",
    "2) Copy these recommendations into README.md or project plan.",
    "3) Start implementing modules one-by-one and commit often.",
    "4) Iterate with the AI to refine next steps as you progress.",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Title(String),
    Heading(String),
    Paragraph(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdeaDocument {
    pub blocks: Vec<Block>,
}

/// Looks an idea up by its numeric id.
pub fn find_idea(ideas: &[IdeaRecord], idea_id: u64) -> Option<&IdeaRecord> {
    ideas.iter().find(|i| i.id.as_number() == Some(idea_id))
}

/// Filesystem-safe download name derived from the idea text.
pub fn export_filename(idea_text: &str) -> String {
    let kept: String = idea_text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-'))
        .collect();
    let base = match kept.trim() {
        "" => FILENAME_PLACEHOLDER,
        trimmed => trimmed,
    };
    let stem: String = base.replace(' ', "_").chars().take(FILENAME_MAX_CHARS).collect();
    format!("{stem}.docx")
}

impl IdeaDocument {
    pub fn from_idea(idea: &IdeaRecord) -> Self {
        let mut blocks = vec![
            Block::Title(format!("Project: {}", idea.idea)),
            Block::Paragraph(format!("Submitted by: {}", idea.user)),
            Block::Paragraph(format!("Sector: {}", idea.sector)),
            Block::Paragraph(format!("Preferred Language: {}", idea.language)),
        ];
        if let Some(created_at) = idea.created_at {
            blocks.push(Block::Paragraph(format!(
                "Created At: {}",
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
            )));
        }

        blocks.push(Block::Heading("AI Recommendations".to_string()));
        if idea.recommendations.is_empty() {
            blocks.push(Block::Paragraph(NO_RECOMMENDATIONS.to_string()));
        } else {
            blocks.extend(
                idea.recommendations
                    .lines()
                    .map(|line| Block::Paragraph(line.to_string())),
            );
        }

        blocks.push(Block::Heading("Next Steps (Suggested)".to_string()));
        blocks.extend(NEXT_STEPS.iter().map(|s| Block::Paragraph(s.to_string())));

        Self { blocks }
    }

    /// Paragraphs under the "AI Recommendations" heading.
    #[cfg(test)]
    pub fn recommendation_paragraphs(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .skip_while(|b| !matches!(b, Block::Heading(h) if h == "AI Recommendations"))
            .skip(1)
            .map_while(|b| match b {
                Block::Paragraph(p) => Some(p.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn to_docx(&self) -> Result<Vec<u8>, ExportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let parts: [(&str, String); 5] = [
            ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
            ("_rels/.rels", PACKAGE_RELS_XML.to_string()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.to_string()),
            ("word/styles.xml", STYLES_XML.to_string()),
            ("word/document.xml", self.document_xml()),
        ];
        for (name, body) in parts {
            zip.start_file(name, options)?;
            zip.write_all(body.as_bytes())?;
        }

        Ok(zip.finish()?.into_inner())
    }

    fn document_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>",
        );
        for block in &self.blocks {
            let (style, text) = match block {
                Block::Title(t) => (Some("Title"), t),
                Block::Heading(t) => (Some("Heading1"), t),
                Block::Paragraph(t) => (None, t),
            };
            xml.push_str("<w:p>");
            if let Some(style) = style {
                xml.push_str(&format!("<w:pPr><w:pStyle w:val=\"{style}\"/></w:pPr>"));
            }
            xml.push_str("<w:r><w:t xml:space=\"preserve\">");
            xml.push_str(&escape_xml(text));
            xml.push_str("</w:t></w:r></w:p>");
        }
        xml.push_str("<w:sectPr/></w:body></w:document>");
        xml
    }
}

/// Escapes markup characters and drops characters XML 1.0 cannot carry.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || matches!(c, '\u{FFFE}' | '\u{FFFF}') => {}
            c => out.push(c),
        }
    }
    out
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:sz w:val="22"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="48"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style></w:styles>"#;
