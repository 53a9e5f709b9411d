use log::debug;
use lopdf::content::Content;
use lopdf::{Document, Encoding, Object, ObjectId};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read PDF file")]
    Load(#[source] lopdf::Error),
    #[error("Failed to read PDF file (no pages)")]
    NoPages,
    #[error("Failed to read PDF file (page {page})")]
    Page {
        page: u32,
        #[source]
        source: lopdf::Error,
    },
}

/// Extracts the plain text of a PDF, page by page in page order.
///
/// Every text-showing operation on a page is one text item. Items are
/// joined by single spaces, and pages are joined the same way; no
/// page-boundary markers are inserted.
pub fn extract_text(bytes: &[u8]) -> Result<String, ParseError> {
    let doc = Document::load_mem(bytes).map_err(ParseError::Load)?;
    let page_ids = doc.get_pages();
    if page_ids.is_empty() {
        return Err(ParseError::NoPages);
    }

    let mut pages = Vec::new();
    // get_pages is keyed by page number, so iteration is in page order
    for (page_num, page_id) in page_ids {
        let items = page_items(&doc, page_id).map_err(|source| ParseError::Page { page: page_num, source })?;
        pages.push(items);
    }

    debug!("extracted text from {} PDF page(s)", pages.len());
    Ok(join_pages(&pages))
}

fn page_items(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<String>> {
    let encodings: BTreeMap<Vec<u8>, Encoding> = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .filter_map(|(name, font)| match font.get_font_encoding(doc) {
            Ok(encoding) => Some((name, encoding)),
            Err(e) => {
                debug!("skipping font encoding {}: {}", String::from_utf8_lossy(&name), e);
                None
            }
        })
        .collect();
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut items = Vec::new();
    let mut encoding = None;
    for op in &content.operations {
        match op.operator.as_str() {
            "Tf" => {
                encoding = op
                    .operands
                    .first()
                    .and_then(|font| font.as_name().ok())
                    .and_then(|name| encodings.get(name));
            }
            "Tj" | "TJ" | "'" | "\"" => {
                let mut item = String::new();
                collect_strings(&mut item, encoding, &op.operands)?;
                items.push(item);
            }
            _ => {}
        }
    }
    Ok(text_items(items))
}

fn collect_strings(out: &mut String, encoding: Option<&Encoding>, operands: &[Object]) -> lopdf::Result<()> {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => match encoding {
                Some(encoding) => out.push_str(&Document::decode_text(encoding, bytes)?),
                None => out.push_str(&String::from_utf8_lossy(bytes)),
            },
            Object::Array(parts) => collect_strings(out, encoding, parts)?,
            // a wide negative kern inside TJ stands for a word gap
            Object::Integer(kern) if *kern < -100 => out.push(' '),
            Object::Real(kern) if *kern < -100.0 => out.push(' '),
            _ => {}
        }
    }
    Ok(())
}

fn text_items(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn join_pages(pages: &[Vec<String>]) -> String {
    pages
        .iter()
        .filter(|items| !items.is_empty())
        .map(|items| items.join(" "))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// Builds a PDF with one page per entry; each page is a list of
    /// text-showing operations placed side by side on one line.
    fn build_pdf(pages: &[Vec<Operation>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for shows in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
            ];
            for show in shows {
                operations.push(show.clone());
                operations.push(Operation::new("Td", vec![60.into(), 0.into()]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn show(text: &str) -> Operation {
        Operation::new("Tj", vec![Object::string_literal(text)])
    }

    #[test]
    fn test_two_pages_joined_with_single_space() {
        let pdf = build_pdf(&[vec![show("Hello")], vec![show("World")]]);
        assert_eq!(extract_text(&pdf).unwrap(), "Hello World");
    }

    #[test]
    fn test_items_on_one_line_joined_with_single_space() {
        let pdf = build_pdf(&[vec![show("Hello"), show("World")]]);
        assert_eq!(extract_text(&pdf).unwrap(), "Hello World");

        let pdf = build_pdf(&[vec![show("Jane"), show(" Doe "), show("   ")], vec![show("Rust")]]);
        assert_eq!(extract_text(&pdf).unwrap(), "Jane Doe Rust");
    }

    #[test]
    fn test_kerned_array_is_one_item() {
        let kerned = Operation::new(
            "TJ",
            vec![Object::Array(vec![
                Object::string_literal("Sen"),
                (-20).into(),
                Object::string_literal("ior"),
                (-250).into(),
                Object::string_literal("Engineer"),
            ])],
        );
        let pdf = build_pdf(&[vec![kerned, show("Rust")]]);
        assert_eq!(extract_text(&pdf).unwrap(), "Senior Engineer Rust");
    }

    #[test]
    fn test_empty_pages_contribute_nothing() {
        let pdf = build_pdf(&[vec![], vec![show("only")], vec![show("  ")]]);
        assert_eq!(extract_text(&pdf).unwrap(), "only");
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn test_garbage_bytes_are_a_parse_error() {
        let result = extract_text(b"this is not a pdf");
        assert!(matches!(result, Err(ParseError::Load(_))));
        assert_eq!(result.unwrap_err().to_string(), "Failed to read PDF file");
    }

    #[test]
    fn test_empty_input_is_a_parse_error() {
        assert!(extract_text(&[]).is_err());
    }
}
