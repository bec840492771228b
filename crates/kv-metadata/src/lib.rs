//! Mint-form metadata: validation, document building, and the data-URI codec.
//!
//! Metadata travels as `data:application/json;base64,<payload>` so a token is
//! self-contained without an external metadata host.

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use kv_api_types::{MintRequest, Rarity};
use serde::{Deserialize, Serialize};

pub const DATA_URI_PREFIX: &str = "data:application/json;base64,";
pub const PLACEHOLDER_BASE_URL: &str = "https://via.placeholder.com/400x400";

pub const NAME_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataAttribute {
    pub trait_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataDocument {
    pub name: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<MetadataAttribute>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Checks every mint-form field and accumulates all violations instead of
/// stopping at the first one.
pub fn validate(request: &MintRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if request.name.trim().is_empty() {
        errors.push(FieldError {
            field: "name",
            message: "Name is required".to_owned(),
        });
    } else if request.name.chars().count() > NAME_MAX_CHARS {
        errors.push(FieldError {
            field: "name",
            message: format!("Name must be less than {NAME_MAX_CHARS} characters"),
        });
    }

    if request.description.trim().is_empty() {
        errors.push(FieldError {
            field: "description",
            message: "Description is required".to_owned(),
        });
    } else if request.description.chars().count() > DESCRIPTION_MAX_CHARS {
        errors.push(FieldError {
            field: "description",
            message: format!("Description must be less than {DESCRIPTION_MAX_CHARS} characters"),
        });
    }

    if request.rarity.trim().is_empty() {
        errors.push(FieldError {
            field: "rarity",
            message: "Rarity is required".to_owned(),
        });
    } else if Rarity::parse(&request.rarity).is_none() {
        errors.push(FieldError {
            field: "rarity",
            message: "Rarity must be one of Common, Rare, Epic, Legendary".to_owned(),
        });
    }

    errors
}

/// Builds the self-contained metadata document for a mint request. The image
/// falls back to a generated placeholder when the form left it empty.
pub fn build_metadata(request: &MintRequest) -> MetadataDocument {
    let image = request
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| placeholder_image_url(request.name.trim()));

    MetadataDocument {
        name: request.name.trim().to_owned(),
        description: request.description.trim().to_owned(),
        image,
        attributes: vec![
            MetadataAttribute {
                trait_type: "Rarity".to_owned(),
                value: request.rarity.trim().to_owned(),
            },
            MetadataAttribute {
                trait_type: "Collection".to_owned(),
                value: "Kuverse".to_owned(),
            },
            MetadataAttribute {
                trait_type: "Creator".to_owned(),
                value: "Kuverse Platform".to_owned(),
            },
        ],
    }
}

pub fn encode_token_uri(document: &MetadataDocument) -> Result<String> {
    let json = serde_json::to_vec(document).context("serialize metadata document")?;
    Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(json)))
}

pub fn decode_token_uri(token_uri: &str) -> Result<MetadataDocument> {
    let payload = token_uri
        .strip_prefix(DATA_URI_PREFIX)
        .ok_or_else(|| anyhow!("not a base64 JSON data URI"))?;
    let json = STANDARD
        .decode(payload)
        .context("decode metadata payload base64")?;
    serde_json::from_slice(&json).context("parse metadata document JSON")
}

/// Generated placeholder image for a token with no caller-supplied art.
pub fn placeholder_image_url(name: &str) -> String {
    format!("{PLACEHOLDER_BASE_URL}?text={}", encode_uri_component(name))
}

/// Rarity-colored variant used for mock-minted token URIs.
pub fn rarity_placeholder_url(name: &str, rarity: Rarity) -> String {
    format!(
        "{PLACEHOLDER_BASE_URL}/{}?text={}",
        rarity.placeholder_color(),
        encode_uri_component(name)
    )
}

/// Percent-encodes with the same unreserved set as JS `encodeURIComponent`,
/// so generated URLs match ones the browser front-end produced.
pub fn encode_uri_component(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for byte in input.as_bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => output.push(*byte as char),
            _ => output.push_str(&format!("%{byte:02X}")),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, description: &str, rarity: &str) -> MintRequest {
        MintRequest {
            name: name.to_owned(),
            description: description.to_owned(),
            rarity: rarity.to_owned(),
            image_url: None,
        }
    }

    #[test]
    fn validate_accepts_complete_request() {
        assert!(validate(&request("Ace", "Test card", "Rare")).is_empty());
    }

    #[test]
    fn validate_accumulates_every_violation() {
        let errors = validate(&request("", "", ""));
        let fields: Vec<&str> = errors.iter().map(|error| error.field).collect();
        assert_eq!(fields, vec!["name", "description", "rarity"]);
        assert_eq!(errors[0].message, "Name is required");
        assert_eq!(errors[1].message, "Description is required");
        assert_eq!(errors[2].message, "Rarity is required");
    }

    #[test]
    fn validate_enforces_length_limits() {
        let errors = validate(&request(
            &"n".repeat(NAME_MAX_CHARS + 1),
            &"d".repeat(DESCRIPTION_MAX_CHARS + 1),
            "Epic",
        ));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Name must be less than 100 characters");
        assert_eq!(
            errors[1].message,
            "Description must be less than 500 characters"
        );
    }

    #[test]
    fn validate_rejects_unknown_rarity() {
        let errors = validate(&request("Ace", "Test card", "Mythic"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "rarity");
    }

    #[test]
    fn token_uri_round_trip_preserves_document() -> anyhow::Result<()> {
        let document = build_metadata(&request("Ace", "Test card", "Rare"));
        let encoded = encode_token_uri(&document)?;
        assert!(encoded.starts_with(DATA_URI_PREFIX));
        assert_eq!(decode_token_uri(&encoded)?, document);
        Ok(())
    }

    #[test]
    fn decode_rejects_non_data_uri() {
        assert!(decode_token_uri("https://example.com/metadata.json").is_err());
    }

    #[test]
    fn build_metadata_carries_kuverse_attributes() {
        let document = build_metadata(&request("Ace", "Test card", "Rare"));
        assert_eq!(document.attributes.len(), 3);
        assert_eq!(document.attributes[0].trait_type, "Rarity");
        assert_eq!(document.attributes[0].value, "Rare");
        assert_eq!(document.attributes[1].value, "Kuverse");
        assert_eq!(document.attributes[2].value, "Kuverse Platform");
    }

    #[test]
    fn build_metadata_prefers_caller_image() {
        let mut req = request("Ace", "Test card", "Rare");
        req.image_url = Some("https://example.com/ace.png".to_owned());
        assert_eq!(build_metadata(&req).image, "https://example.com/ace.png");
    }

    #[test]
    fn placeholder_url_encodes_name() {
        let url = placeholder_image_url("My Awesome NFT");
        assert_eq!(
            url,
            "https://via.placeholder.com/400x400?text=My%20Awesome%20NFT"
        );
    }

    #[test]
    fn rarity_placeholder_uses_rarity_color() {
        let url = rarity_placeholder_url("Ace", Rarity::Rare);
        assert!(url.contains("1E90FF"));
        assert!(url.contains("text=Ace"));
    }

    #[test]
    fn uri_component_matches_js_unreserved_set() {
        assert_eq!(encode_uri_component("a-b_c.d!e~f*g'h(i)j"), "a-b_c.d!e~f*g'h(i)j");
        assert_eq!(encode_uri_component("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_uri_component("émoji"), "%C3%A9moji");
    }
}
