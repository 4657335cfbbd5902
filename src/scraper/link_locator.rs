use crate::error::{PriceError, Result};
use crate::scraper::dom::html_to_package;
use crate::scraper::xpath::PatternEvaluator;
use regex::Regex;
use std::sync::LazyLock;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Factory, Value, XPath};
use tracing::debug;
use url::Url;

static RE_STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).expect("valid literal regex"));
static RE_FUNCTION_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_.\-]*(?::[A-Za-z_][A-Za-z0-9_.\-]*)?)\s*\(")
        .expect("valid function call regex")
});

/// Functions the XPath engine registers, node-type tests and operator
/// keywords that may precede a parenthesis. `id()` and `lang()` are part of
/// XPath 1.0 but the engine does not provide them.
const BUILTIN_NAMES: &[&str] = &[
    "last", "position", "count", "local-name", "namespace-uri", "name", "string", "concat",
    "starts-with", "contains", "substring-before", "substring-after", "substring",
    "string-length", "normalize-space", "translate", "boolean", "not", "true", "false",
    "number", "sum", "floor", "ceiling", "round", "node", "text", "comment",
    "processing-instruction", "and", "or", "div", "mod",
];

/// Function names called by an XPath expression, string literals excluded.
fn called_functions(query: &str) -> Vec<String> {
    let stripped = RE_STRING_LITERAL.replace_all(query, "''");
    RE_FUNCTION_CALL
        .captures_iter(&stripped)
        .map(|caps| {
            let full = &caps[1];
            full.rsplit(':').next().unwrap_or(full).to_string()
        })
        .collect()
}

// ── Link locator ──────────────────────────────────────────────────────────────

/// Finds the document download link in the listing page.
#[derive(Debug, Clone)]
pub struct LinkLocator {
    // XPath is not Send, so only the validated text is kept and compiled per lookup.
    query: String,
    evaluator: PatternEvaluator,
}

impl LinkLocator {
    pub fn new(query: &str, evaluator: PatternEvaluator) -> Result<Self> {
        for name in called_functions(query) {
            if !BUILTIN_NAMES.contains(&name.as_str()) {
                evaluator.resolve_function(&name)?;
            }
        }
        let locator = Self {
            query: query.to_string(),
            evaluator,
        };
        locator.compile()?;
        Ok(locator)
    }

    pub fn evaluator(&self) -> &PatternEvaluator {
        &self.evaluator
    }

    fn compile(&self) -> Result<XPath> {
        Factory::new()
            .build(&self.query)
            .map_err(|e| PriceError::InvalidQuery(format!("'{}': {}", self.query, e)))?
            .ok_or_else(|| PriceError::InvalidQuery(format!("'{}' is empty", self.query)))
    }

    /// Raw `href` of the first node the query selects, or `None` when nothing
    /// matches.
    pub fn locate(&self, html: &str) -> Result<Option<String>> {
        let xpath = self.compile()?;
        let package = html_to_package(html);
        let doc = package.as_document();
        let context = self.evaluator.context();

        let value = xpath
            .evaluate(&context, doc.root())
            .map_err(|e| PriceError::InvalidQuery(format!("'{}': {}", self.query, e)))?;

        let nodes = match value {
            Value::Nodeset(nodes) => nodes,
            other => {
                return Err(PriceError::InvalidQuery(format!(
                    "'{}' must select nodes, got {:?}",
                    self.query, other
                )));
            }
        };

        let Some(node) = nodes.document_order_first() else {
            debug!("Query {:?} matched nothing", self.query);
            return Ok(None);
        };

        let href = match node {
            Node::Element(element) => element.attribute_value("href"),
            Node::Attribute(attribute) => Some(attribute.value()),
            _ => None,
        };

        match href.map(str::trim) {
            Some(href) if !href.is_empty() => Ok(Some(href.to_string())),
            _ => Err(PriceError::MalformedDocument(format!(
                "node matched by '{}' has no href",
                self.query
            ))),
        }
    }

    /// Like [`locate`](Self::locate), with the link resolved against the page URL.
    pub fn locate_url(&self, html: &str, page_url: &Url) -> Result<Option<Url>> {
        let Some(href) = self.locate(html)? else {
            return Ok(None);
        };
        page_url.join(&href).map(Some).map_err(|e| {
            PriceError::MalformedDocument(format!("failed to resolve link '{href}': {e}"))
        })
    }
}
