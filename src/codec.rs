//! Property-list document codec.
//!
//! A document is decoded once into a [`PropertyDocument`], which remembers the
//! [`EncodingKind`] it was read in. Encoding always uses that pinned kind so a
//! binary document is never silently rewritten as XML (or the other way
//! around); restorers reject documents whose serialization variant changed
//! even when the content is identical.

use std::io::Cursor;

use plist::{Dictionary, Value};
use serde::Serialize;

use crate::{Error, Result};

/// Magic prefix of a binary property list.
pub const BINARY_MAGIC: &[u8] = b"bplist00";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialization variant of a property-list document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingKind {
    /// Compact `bplist00` encoding
    Binary,
    /// XML markup encoding
    Textual,
}

impl EncodingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingKind::Binary => "binary",
            EncodingKind::Textual => "textual",
        }
    }
}

impl std::fmt::Display for EncodingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decoded property-list document together with its original encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDocument {
    root: Dictionary,
    encoding: EncodingKind,
}

impl PropertyDocument {
    pub fn new(root: Dictionary, encoding: EncodingKind) -> Self {
        Self { root, encoding }
    }

    /// The encoding detected when the document was decoded.
    pub fn encoding(&self) -> EncodingKind {
        self.encoding
    }

    pub fn root(&self) -> &Dictionary {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Dictionary {
        &mut self.root
    }
}

/// Inspect the leading bytes of a document and decide how it is encoded.
///
/// Anything that is not a binary property list is assumed to be XML; whether
/// it actually is markup is checked by [`decode`].
pub fn detect(bytes: &[u8]) -> Result<EncodingKind> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::UnrecognizedFormat("document is empty".to_string()));
    }
    if bytes.starts_with(BINARY_MAGIC) {
        Ok(EncodingKind::Binary)
    } else {
        Ok(EncodingKind::Textual)
    }
}

/// Decode `bytes` as a document of the given encoding.
///
/// The root must be a dictionary.
pub fn decode(bytes: &[u8], kind: EncodingKind) -> Result<PropertyDocument> {
    let value = match kind {
        EncodingKind::Binary => {
            if !bytes.starts_with(BINARY_MAGIC) {
                return Err(Error::UnrecognizedFormat(
                    "missing bplist00 signature".to_string(),
                ));
            }
            Value::from_reader(Cursor::new(bytes))
                .map_err(|e| Error::MalformedDocument(e.to_string()))?
        }
        EncodingKind::Textual => {
            if !looks_like_markup(bytes) {
                return Err(Error::UnrecognizedFormat(
                    "neither a binary property list nor XML markup".to_string(),
                ));
            }
            Value::from_reader_xml(bytes).map_err(|e| Error::MalformedDocument(e.to_string()))?
        }
    };

    match value {
        Value::Dictionary(root) => Ok(PropertyDocument::new(root, kind)),
        _ => Err(Error::MalformedDocument(
            "root object is not a dictionary".to_string(),
        )),
    }
}

/// Detect the encoding of `bytes` and decode them.
pub fn decode_detected(bytes: &[u8]) -> Result<PropertyDocument> {
    let kind = detect(bytes)?;
    decode(bytes, kind)
}

/// Encode a document using the given encoding.
///
/// Textual output matches Apple's serializer, which ends the document with a
/// newline after `</plist>`.
pub fn encode(doc: &PropertyDocument, kind: EncodingKind) -> Result<Vec<u8>> {
    let value = Value::Dictionary(doc.root.clone());
    let mut buf = Vec::new();
    match kind {
        EncodingKind::Binary => value.to_writer_binary(&mut buf),
        EncodingKind::Textual => value.to_writer_xml(&mut buf),
    }
    .map_err(|e| Error::MalformedDocument(format!("cannot encode {} document: {}", kind, e)))?;
    if kind == EncodingKind::Textual && !buf.ends_with(b"\n") {
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Encode a document in the encoding it was decoded from.
pub fn encode_pinned(doc: &PropertyDocument) -> Result<Vec<u8>> {
    encode(doc, doc.encoding)
}

fn looks_like_markup(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'<')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        INFO_XML, MANIFEST_XML, PLISTLIB_INFO_XML, PLISTLIB_MANIFEST_BINARY, canonical,
    };

    #[test]
    fn test_detect_binary_magic() {
        let bytes = canonical(INFO_XML, EncodingKind::Binary);
        assert!(bytes.starts_with(BINARY_MAGIC));
        assert_eq!(detect(&bytes).unwrap(), EncodingKind::Binary);
    }

    #[test]
    fn test_detect_textual() {
        assert_eq!(
            detect(INFO_XML.as_bytes()).unwrap(),
            EncodingKind::Textual
        );
    }

    #[test]
    fn test_detect_empty_is_unrecognized() {
        assert!(matches!(detect(b""), Err(Error::UnrecognizedFormat(_))));
        assert!(matches!(
            detect(b" \n\t"),
            Err(Error::UnrecognizedFormat(_))
        ));
    }

    #[test]
    fn test_detect_does_not_validate_text() {
        // Plain text is only rejected once decoding is attempted
        assert_eq!(detect(b"hello").unwrap(), EncodingKind::Textual);
        assert!(matches!(
            decode(b"hello", EncodingKind::Textual),
            Err(Error::UnrecognizedFormat(_))
        ));
    }

    #[test]
    fn test_decode_textual_fixture() {
        let doc = decode(MANIFEST_XML.as_bytes(), EncodingKind::Textual).unwrap();
        assert_eq!(doc.encoding(), EncodingKind::Textual);
        let lockdown = doc.root().get("Lockdown").unwrap().as_dictionary().unwrap();
        assert_eq!(
            lockdown.get("ProductVersion").unwrap().as_string(),
            Some("18.6.2")
        );
        assert_eq!(doc.root().get("WasPasscodeSet"), Some(&Value::Boolean(true)));
        assert_eq!(doc.root().get("SystemDomainsVersion"), Some(&Value::Real(24.5)));
        assert_eq!(
            doc.root().get("Salt"),
            Some(&Value::Data(vec![0xde, 0xad, 0xbe, 0xef]))
        );
    }

    #[test]
    fn test_decode_preserves_key_order() {
        let doc = decode(MANIFEST_XML.as_bytes(), EncodingKind::Textual).unwrap();
        let keys: Vec<&str> = doc.root().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "IsEncrypted",
                "Lockdown",
                "SystemDomainsVersion",
                "Version",
                "WasPasscodeSet",
                "Salt"
            ]
        );
    }

    #[test]
    fn test_decode_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(INFO_XML.as_bytes());
        let doc = decode_detected(&bytes).unwrap();
        assert_eq!(doc.encoding(), EncodingKind::Textual);
    }

    #[test]
    fn test_decode_unbalanced_markup_is_malformed() {
        let bytes = b"<?xml version=\"1.0\"?><plist version=\"1.0\"><dict><key>a</key>";
        assert!(matches!(
            decode(bytes, EncodingKind::Textual),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_decode_truncated_binary_is_malformed() {
        let bytes = canonical(INFO_XML, EncodingKind::Binary);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            decode(truncated, EncodingKind::Binary),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_decode_non_dictionary_root() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<array>
	<string>a</string>
</array>
</plist>
"#;
        let err = decode(xml.as_bytes(), EncodingKind::Textual).unwrap_err();
        assert!(err.to_string().contains("not a dictionary"));
    }

    #[test]
    fn test_round_trip_identity_textual() {
        // Written by hand and by Python's plistlib, not by this crate
        for original in [INFO_XML.as_bytes(), PLISTLIB_INFO_XML] {
            let doc = decode_detected(original).unwrap();
            assert_eq!(doc.encoding(), EncodingKind::Textual);
            let encoded = encode_pinned(&doc).unwrap();
            assert_eq!(
                String::from_utf8_lossy(&encoded),
                String::from_utf8_lossy(original)
            );
        }
    }

    #[test]
    fn test_textual_output_ends_with_newline() {
        let doc = decode(MANIFEST_XML.as_bytes(), EncodingKind::Textual).unwrap();
        let encoded = encode(&doc, EncodingKind::Textual).unwrap();
        assert!(encoded.ends_with(b"</plist>\n"));
    }

    #[test]
    fn test_round_trip_identity_binary() {
        for fixture in [INFO_XML, MANIFEST_XML] {
            let original = canonical(fixture, EncodingKind::Binary);
            let doc = decode_detected(&original).unwrap();
            assert_eq!(doc.encoding(), EncodingKind::Binary);
            assert_eq!(encode_pinned(&doc).unwrap(), original);
        }
    }

    #[test]
    fn test_foreign_binary_keeps_content() {
        // Other writers lay out the object table differently, so only the
        // content survives a re-encode; unchanged documents are never rewritten
        let doc = decode_detected(PLISTLIB_MANIFEST_BINARY).unwrap();
        assert_eq!(doc.encoding(), EncodingKind::Binary);
        let lockdown = doc.root().get("Lockdown").unwrap().as_dictionary().unwrap();
        assert_eq!(
            lockdown.get("BuildVersion").unwrap().as_string(),
            Some("22G100")
        );

        let encoded = encode_pinned(&doc).unwrap();
        assert!(encoded.starts_with(BINARY_MAGIC));
        assert_eq!(decode_detected(&encoded).unwrap(), doc);
    }

    #[test]
    fn test_encoding_is_pinned_per_document() {
        let binary = decode_detected(&canonical(INFO_XML, EncodingKind::Binary)).unwrap();
        let textual = decode_detected(INFO_XML.as_bytes()).unwrap();

        assert!(encode_pinned(&binary).unwrap().starts_with(BINARY_MAGIC));
        assert!(encode_pinned(&textual).unwrap().starts_with(b"<?xml"));
        // Same content either way
        assert_eq!(binary.root(), textual.root());
    }

    #[test]
    fn test_encoding_kind_display() {
        assert_eq!(EncodingKind::Binary.to_string(), "binary");
        assert_eq!(EncodingKind::Textual.to_string(), "textual");
    }
}
