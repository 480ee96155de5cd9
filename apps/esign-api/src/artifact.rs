//! Validation of the submitted document artifact

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lopdf::Document;
use sha2::{Digest, Sha256};

use crate::error::{ApiError, Stage};

/// A decoded, parseable PDF ready to be stored
#[derive(Debug, Clone)]
pub struct DocumentArtifact {
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`
    pub hash: String,
    pub page_count: usize,
}

/// Decode base64 (optionally a `data:` URL) and check the result is a PDF
/// with at least one page
pub fn decode_pdf(pdf_base64: &str) -> Result<DocumentArtifact, ApiError> {
    let encoded = match pdf_base64.split_once("base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => pdf_base64,
    };

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiError::stage(Stage::Artifact, format!("Invalid PDF base64: {}", e)))?;

    let doc = Document::load_mem(&bytes)
        .map_err(|e| ApiError::stage(Stage::Artifact, format!("Document is not a valid PDF: {}", e)))?;

    let page_count = doc.get_pages().len();
    if page_count == 0 {
        return Err(ApiError::stage(Stage::Artifact, "Document has no pages"));
    }

    let hash = hex::encode(Sha256::digest(&bytes));
    Ok(DocumentArtifact {
        bytes,
        hash,
        page_count,
    })
}

#[cfg(test)]
pub(crate) fn sample_pdf() -> Vec<u8> {
    use lopdf::{dictionary, Object};

    let mut doc = Document::with_version("1.7");
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
    });
    if let Ok(page) = doc.get_object_mut(page_id) {
        if let Ok(dict) = page.as_dict_mut() {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
