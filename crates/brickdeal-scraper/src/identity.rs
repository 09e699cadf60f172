//! Set-identity resolution for Amazon-style pages: derives the catalog set
//! number and display name from the page, with an external catalog lookup as
//! the last resort.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use brickdeal_core::is_catalog_set_id;

use crate::normalize::clean_listing_title;
use crate::structured::str_field;

static PRODUCT_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)id=["']productTitle["'][^>]*>(.*?)</span>"#).expect("valid regex")
});
static PAGE_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("valid regex"));
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,6}\b").expect("valid regex"));
static MODEL_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:item )?model number[^0-9]*([0-9]{4,6})").expect("valid regex")
});

static OG_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)property=["']og:image["'][^>]*content=["']([^"']+)["']"#)
        .expect("valid regex")
});
static TWITTER_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)name=["']twitter:image["'][^>]*content=["']([^"']+)["']"#)
        .expect("valid regex")
});
static LANDING_HIRES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)id=["']landingImage["'][^>]*data-old-hires=["']([^"']+)["']"#)
        .expect("valid regex")
});
static LANDING_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)id=["']landingImage["'][^>]*src=["']([^"']+)["']"#).expect("valid regex")
});
static DYNAMIC_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)data-a-dynamic-image=["']([^"']+)["']"#).expect("valid regex")
});

/// Result of identity resolution. Partial results are valid: a name without
/// a set id still updates the display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetIdentity {
    pub set_id: Option<String>,
    pub name: Option<String>,
}

/// External catalog lookup used when the page itself yields no set number.
/// Failures are "not found", never fatal.
#[allow(async_fn_in_trait)] // consumed generically, never as a trait object
pub trait CatalogLookup {
    async fn find_set_id_by_name(&self, name: &str) -> Option<String>;
}

/// Lookup that always misses, for channels and tests that never need one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatalogLookup;

impl CatalogLookup for NoCatalogLookup {
    async fn find_set_id_by_name(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Catalog lookup backed by LEGO.com search results: searches for the name
/// and scans result links shaped `/en-us/product/<slug>-<setId>`.
#[derive(Debug, Clone)]
pub struct LegoCatalogLookup {
    client: reqwest::Client,
    base_url: String,
}

static PRODUCT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/en-us/product/[A-Za-z0-9\-]*-(\d{4,6})\b").expect("valid regex")
});

impl LegoCatalogLookup {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, "https://www.lego.com")
    }

    /// Base-URL override for tests pointing at a local mock server.
    #[must_use]
    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl CatalogLookup for LegoCatalogLookup {
    async fn find_set_id_by_name(&self, name: &str) -> Option<String> {
        let url = format!("{}/en-us/search", self.base_url);
        let response = match self.client.get(&url).query(&[("q", name)]).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(status = %r.status(), "catalog search returned non-success");
                return None;
            }
            Err(err) => {
                tracing::debug!(error = %err, "catalog search failed");
                return None;
            }
        };
        let html = response.text().await.ok()?;

        PRODUCT_LINK_RE
            .captures_iter(&html)
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str().to_owned())
            .find(|id| is_catalog_set_id(id))
    }
}

/// Display title: the product-title widget first, the page `<title>` second,
/// both stripped of markup and retailer boilerplate.
#[must_use]
pub fn extract_product_title(html: &str) -> Option<String> {
    for re in [&*PRODUCT_TITLE_RE, &*PAGE_TITLE_RE] {
        if let Some(m) = re.captures(html).and_then(|c| c.get(1)) {
            let title = clean_listing_title(m.as_str());
            if !title.is_empty() {
                return Some(title);
            }
        }
    }
    None
}

/// Finds the most plausible catalog set number in free text: 4-6 digit
/// tokens, years rejected, 5-digit preferred over 4-digit over 6-digit, and
/// the last occurrence within a length class wins (later tokens in retail
/// titles tend to be the model number, earlier ones the piece count).
#[must_use]
pub fn extract_set_id_from_text(text: &str) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    for m in TOKEN_RE.find_iter(text) {
        let token = m.as_str();
        if is_catalog_set_id(token) && !seen.contains(&token) {
            seen.push(token);
        }
    }
    for len in [5usize, 4, 6] {
        if let Some(hit) = seen.iter().rev().find(|t| t.len() == len) {
            return Some((*hit).to_owned());
        }
    }
    None
}

/// In-page identity extraction: title tokens, then structured names, then a
/// "model number" label in the raw text.
#[must_use]
pub fn extract_identity(html: &str, nodes: &[Value]) -> SetIdentity {
    let title = extract_product_title(html);

    if let Some(title) = &title {
        if let Some(set_id) = extract_set_id_from_text(title) {
            return SetIdentity {
                set_id: Some(set_id),
                name: Some(title.clone()),
            };
        }
    }

    let names: Vec<String> = nodes
        .iter()
        .filter_map(|node| str_field(node, "name"))
        .map(str::to_owned)
        .collect();
    for name in &names {
        if let Some(set_id) = extract_set_id_from_text(name) {
            return SetIdentity {
                set_id: Some(set_id),
                name: Some(clean_listing_title(name)),
            };
        }
    }

    if let Some(m) = MODEL_NUMBER_RE.captures(html).and_then(|c| c.get(1)) {
        if is_catalog_set_id(m.as_str()) {
            return SetIdentity {
                set_id: Some(m.as_str().to_owned()),
                name: title,
            };
        }
    }

    SetIdentity {
        set_id: None,
        name: title.or_else(|| names.first().cloned()),
    }
}

/// Full resolution: in-page extraction plus the external catalog fallback
/// when the page names the product family but carries no usable number.
pub async fn resolve_identity<C: CatalogLookup>(
    html: &str,
    nodes: &[Value],
    catalog: &C,
) -> SetIdentity {
    let extracted = extract_identity(html, nodes);
    if extracted.set_id.is_some() {
        return extracted;
    }

    if let Some(name) = &extracted.name {
        if name.to_lowercase().contains("lego") {
            if let Some(found) = catalog.find_set_id_by_name(name).await {
                if is_catalog_set_id(&found) {
                    return SetIdentity {
                        set_id: Some(found),
                        name: extracted.name,
                    };
                }
            }
        }
    }

    extracted
}

/// Best product image on the page, in confidence order: structured `image`
/// fields, Open Graph and Twitter meta tags, then Amazon's landing-image
/// element and its dynamic-image JSON attribute.
#[must_use]
pub fn extract_image_url(html: &str, nodes: &[Value]) -> Option<String> {
    for node in nodes {
        if let Some(url) = image_from_node(node) {
            return Some(url);
        }
    }

    for re in [&*OG_IMAGE_RE, &*TWITTER_IMAGE_RE, &*LANDING_HIRES_RE, &*LANDING_SRC_RE] {
        if let Some(m) = re.captures(html).and_then(|c| c.get(1)) {
            let url = m.as_str().trim();
            if !url.is_empty() {
                return Some(url.to_owned());
            }
        }
    }

    if let Some(m) = DYNAMIC_IMAGE_RE.captures(html).and_then(|c| c.get(1)) {
        return first_dynamic_image_key(m.as_str());
    }

    None
}

/// Structured `image` fields come in three shapes: a bare string, an array
/// of strings, or an `ImageObject` with a `url`.
fn image_from_node(node: &Value) -> Option<String> {
    let image = node.get("image")?;
    match image {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_owned())
        }
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        Value::Object(_) => str_field(image, "url").map(str::to_owned),
        _ => None,
    }
}

/// The `data-a-dynamic-image` attribute is an HTML-escaped JSON object whose
/// keys are image URLs; any key will do.
fn first_dynamic_image_key(raw: &str) -> Option<String> {
    let unescaped = raw.replace("&quot;", "\"");
    let parsed: Value = serde_json::from_str(&unescaped).ok()?;
    parsed
        .as_object()
        .and_then(|map| map.keys().next())
        .map(String::clone)
}
