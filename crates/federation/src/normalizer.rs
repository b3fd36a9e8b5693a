//! JSON-LD expansion of incoming documents.
//!
//! The inbox never reads compacted JSON directly. A [`Normalizer`] expands the
//! document into a flat list of nodes whose keys are full IRIs, so `"type":
//! "Follow"` and `"@type": "as:Follow"` both arrive as
//! `https://www.w3.org/ns/activitystreams#Follow`.
//!
//! [`ActivityStreamsNormalizer`] knows the ActivityStreams 2.0 and security
//! contexts from a bundled term table. Other remote contexts are resolved
//! through a [`DocumentLoader`] when one is configured and rejected otherwise.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::loader::DocumentLoader;
use crate::vocab::{AS_CONTEXT, AS_NS, SEC_NS, SECURITY_CONTEXTS};

/// Upper bound on distinct remote contexts fetched for one document.
const MAX_REMOTE_CONTEXTS: usize = 16;

/// Upper bound on remote contexts importing other remote contexts.
const MAX_CONTEXT_DEPTH: usize = 8;

/// `@context` values of loaded remote context documents, by IRI.
type RemoteContexts = HashMap<String, Value>;

/// Errors produced while expanding a document.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("unsupported remote context: {0}")]
    UnsupportedContext(String),

    #[error("invalid context: {0}")]
    InvalidContext(String),

    #[error("could not load remote context {iri}: {reason}")]
    ContextLoad { iri: String, reason: String },

    #[error("invalid {keyword} value: {value}")]
    InvalidKeywordValue { keyword: &'static str, value: Value },
}

/// Expands a compacted JSON-LD document into an ordered list of nodes.
#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Expand `document` into its nodes, in document order.
    async fn expand(&self, document: Value) -> Result<Vec<Value>, NormalizeError>;
}

#[derive(Debug, Clone)]
struct Term {
    iri: String,
    id_coerced: bool,
}

/// Active context: term definitions plus the default vocabulary.
#[derive(Debug, Clone, Default)]
struct Context {
    terms: HashMap<String, Term>,
    vocab: Option<String>,
}

const AS_TYPES: &[&str] = &[
    "Accept",
    "Activity",
    "Add",
    "Announce",
    "Application",
    "Arrive",
    "Article",
    "Audio",
    "Block",
    "Collection",
    "CollectionPage",
    "Create",
    "Delete",
    "Dislike",
    "Document",
    "Event",
    "Flag",
    "Follow",
    "Group",
    "Hashtag",
    "Ignore",
    "Image",
    "IntransitiveActivity",
    "Invite",
    "Join",
    "Leave",
    "Like",
    "Link",
    "Listen",
    "Mention",
    "Move",
    "Note",
    "Object",
    "Offer",
    "OrderedCollection",
    "OrderedCollectionPage",
    "Organization",
    "Page",
    "Person",
    "Place",
    "Profile",
    "Question",
    "Read",
    "Reject",
    "Relationship",
    "Remove",
    "Service",
    "TentativeAccept",
    "TentativeReject",
    "Tombstone",
    "Travel",
    "Undo",
    "Update",
    "Video",
    "View",
];

/// Properties whose string values are node references.
const AS_ID_PROPERTIES: &[&str] = &[
    "actor",
    "alsoKnownAs",
    "anyOf",
    "attachment",
    "attributedTo",
    "audience",
    "bcc",
    "bto",
    "cc",
    "closed",
    "context",
    "current",
    "describes",
    "endpoints",
    "first",
    "followers",
    "following",
    "formerType",
    "generator",
    "href",
    "icon",
    "image",
    "inReplyTo",
    "instrument",
    "items",
    "last",
    "liked",
    "likes",
    "location",
    "movedTo",
    "next",
    "oauthAuthorizationEndpoint",
    "oauthTokenEndpoint",
    "object",
    "oneOf",
    "orderedItems",
    "origin",
    "outbox",
    "partOf",
    "prev",
    "preview",
    "provideClientKey",
    "proxyUrl",
    "relationship",
    "replies",
    "result",
    "sharedInbox",
    "shares",
    "signClientKey",
    "streams",
    "subject",
    "tag",
    "target",
    "to",
    "uploadMedia",
    "url",
];

/// Properties whose values are literals.
const AS_VALUE_PROPERTIES: &[&str] = &[
    "accuracy",
    "altitude",
    "content",
    "contentMap",
    "deleted",
    "duration",
    "endTime",
    "height",
    "hreflang",
    "latitude",
    "longitude",
    "manuallyApprovesFollowers",
    "mediaType",
    "name",
    "nameMap",
    "preferredUsername",
    "published",
    "radius",
    "rel",
    "sensitive",
    "source",
    "startIndex",
    "startTime",
    "summary",
    "summaryMap",
    "totalItems",
    "units",
    "updated",
    "width",
];

/// Security vocabulary: (term, local name, id-coerced).
const SEC_TERMS: &[(&str, &str, bool)] = &[
    ("CryptographicKey", "Key", false),
    ("Key", "Key", false),
    ("RsaSignature2017", "RsaSignature2017", false),
    ("created", "created", false),
    ("creator", "creator", true),
    ("nonce", "nonce", false),
    ("owner", "owner", true),
    ("publicKey", "publicKey", true),
    ("publicKeyPem", "publicKeyPem", false),
    ("signature", "signature", false),
    ("signatureAlgorithm", "signingAlgorithm", false),
    ("signatureValue", "signatureValue", false),
];

fn keyword_aliases(context: &mut Context) {
    for (term, keyword) in [("id", "@id"), ("type", "@type")] {
        context.define(term, keyword, false);
    }
}

static ACTIVITY_STREAMS: Lazy<Context> = Lazy::new(|| {
    let mut context = Context {
        vocab: Some("_:".to_string()),
        ..Context::default()
    };
    keyword_aliases(&mut context);
    context.define("as", AS_NS, false);
    context.define("ldp", "http://www.w3.org/ns/ldp#", false);
    context.define("xsd", "http://www.w3.org/2001/XMLSchema#", false);

    for name in AS_TYPES.iter().chain(AS_VALUE_PROPERTIES) {
        context.define(name, &format!("{AS_NS}{name}"), false);
    }
    for name in AS_ID_PROPERTIES {
        context.define(name, &format!("{AS_NS}{name}"), true);
    }
    context.define("inbox", "http://www.w3.org/ns/ldp#inbox", true);
    context
});

static SECURITY: Lazy<Context> = Lazy::new(|| {
    let mut context = Context::default();
    keyword_aliases(&mut context);
    context.define("sec", SEC_NS, false);
    context.define("dc", "http://purl.org/dc/terms/", false);
    for (term, local, coerced) in SEC_TERMS {
        context.define(term, &format!("{SEC_NS}{local}"), *coerced);
    }
    context
});

fn is_activity_streams_context(iri: &str) -> bool {
    let iri = iri.strip_suffix(".jsonld").unwrap_or(iri);
    iri == AS_CONTEXT || iri == "http://www.w3.org/ns/activitystreams"
}

fn bundled(iri: &str) -> Option<&'static Context> {
    if is_activity_streams_context(iri) {
        Some(&*ACTIVITY_STREAMS)
    } else if SECURITY_CONTEXTS.contains(&iri) {
        Some(&*SECURITY)
    } else {
        None
    }
}

/// Push every remote IRI named by a `@context` value.
fn context_iris(local: &Value, out: &mut Vec<String>) {
    match local {
        Value::String(iri) => out.push(iri.clone()),
        Value::Array(entries) => {
            for entry in entries {
                context_iris(entry, out);
            }
        }
        _ => {}
    }
}

/// Push the remote IRIs of every `@context` in a document, nested ones included.
fn document_context_iris(document: &Value, out: &mut Vec<String>) {
    match document {
        Value::Object(map) => {
            for (key, value) in map {
                if key == "@context" {
                    context_iris(value, out);
                } else {
                    document_context_iris(value, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                document_context_iris(item, out);
            }
        }
        _ => {}
    }
}

impl Context {
    fn define(&mut self, term: &str, iri: &str, id_coerced: bool) {
        self.terms.insert(
            term.to_string(),
            Term {
                iri: iri.to_string(),
                id_coerced,
            },
        );
    }

    fn merge(&mut self, other: &Self) {
        for (term, definition) in &other.terms {
            self.terms.insert(term.clone(), definition.clone());
        }
        if other.vocab.is_some() {
            self.vocab.clone_from(&other.vocab);
        }
    }

    fn define_all(&mut self, definitions: &Map<String, Value>) -> Result<(), NormalizeError> {
        for (term, definition) in definitions {
            match (term.as_str(), definition) {
                ("@vocab", Value::String(vocab)) => {
                    self.vocab = Some(self.expand_iri(vocab));
                }
                ("@vocab", Value::Null) => self.vocab = None,
                // Base IRIs and default languages do not change node keys.
                ("@base" | "@language" | "@version", _) => {}
                (_, Value::Null) => {
                    self.terms.remove(term);
                }
                (_, Value::String(iri)) => {
                    let iri = self.expand_iri(iri);
                    self.define(term, &iri, false);
                }
                (_, Value::Object(expanded)) => {
                    let iri = match expanded.get("@id") {
                        Some(Value::String(iri)) => self.expand_iri(iri),
                        _ => self.expand_key(term).ok_or_else(|| {
                            NormalizeError::InvalidContext(format!("term {term} has no IRI"))
                        })?,
                    };
                    let coerced = expanded.get("@type").and_then(Value::as_str) == Some("@id");
                    self.define(term, &iri, coerced);
                }
                (_, other) => {
                    return Err(NormalizeError::InvalidContext(format!(
                        "term {term} defined as {other}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Expand a compact IRI (`as:Follow`) or return the value unchanged.
    fn expand_iri(&self, value: &str) -> String {
        if let Some((prefix, suffix)) = value.split_once(':')
            && !suffix.starts_with("//")
            && let Some(term) = self.terms.get(prefix)
        {
            return format!("{}{suffix}", term.iri);
        }
        value.to_string()
    }

    /// Expand a property key. Undefined terms without a vocabulary are dropped.
    fn expand_key(&self, key: &str) -> Option<String> {
        if key.starts_with('@') {
            return Some(key.to_string());
        }
        if let Some(term) = self.terms.get(key) {
            return Some(term.iri.clone());
        }
        if key.contains(':') {
            return Some(self.expand_iri(key));
        }
        self.vocab.as_ref().map(|vocab| format!("{vocab}{key}"))
    }

    /// Expand a type name relative to the vocabulary.
    fn expand_type(&self, value: &str) -> String {
        if let Some(term) = self.terms.get(value) {
            return term.iri.clone();
        }
        if value.contains(':') {
            return self.expand_iri(value);
        }
        match &self.vocab {
            Some(vocab) => format!("{vocab}{value}"),
            None => value.to_string(),
        }
    }

    fn is_id_coerced(&self, key: &str) -> bool {
        self.terms.get(key).is_some_and(|term| term.id_coerced)
    }
}

/// Expander for ActivityStreams documents.
///
/// A document without `@context` is read with the ActivityStreams context.
/// Without a loader only the bundled contexts are known.
#[derive(Clone, Default)]
pub struct ActivityStreamsNormalizer {
    loader: Option<Arc<dyn DocumentLoader>>,
}

impl fmt::Debug for ActivityStreamsNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityStreamsNormalizer")
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

impl ActivityStreamsNormalizer {
    #[must_use]
    pub const fn new() -> Self {
        Self { loader: None }
    }

    /// Resolve contexts other than the bundled ones through `loader`.
    #[must_use]
    pub fn with_loader(loader: Arc<dyn DocumentLoader>) -> Self {
        Self {
            loader: Some(loader),
        }
    }

    /// Expand using the bundled contexts only.
    pub fn expand_document(&self, document: &Value) -> Result<Vec<Value>, NormalizeError> {
        Expander::default().expand_document(document)
    }

    /// Fetch every remote context the document needs, transitively.
    async fn load_contexts(&self, document: &Value) -> Result<RemoteContexts, NormalizeError> {
        let mut remotes = RemoteContexts::new();
        let Some(loader) = &self.loader else {
            return Ok(remotes);
        };

        let mut pending = Vec::new();
        document_context_iris(document, &mut pending);

        while let Some(iri) = pending.pop() {
            if bundled(&iri).is_some() || remotes.contains_key(&iri) {
                continue;
            }
            if remotes.len() >= MAX_REMOTE_CONTEXTS {
                return Err(NormalizeError::InvalidContext(format!(
                    "more than {MAX_REMOTE_CONTEXTS} remote contexts"
                )));
            }

            let loaded = loader.load(&iri).await?;
            let Some(context) = loaded.get("@context") else {
                return Err(NormalizeError::InvalidContext(format!(
                    "{iri} has no @context"
                )));
            };
            context_iris(context, &mut pending);
            remotes.insert(iri, context.clone());
        }
        Ok(remotes)
    }
}

#[async_trait]
impl Normalizer for ActivityStreamsNormalizer {
    async fn expand(&self, document: Value) -> Result<Vec<Value>, NormalizeError> {
        let remotes = self.load_contexts(&document).await?;
        Expander { remotes: &remotes }.expand_document(&document)
    }
}

/// One expansion run over a fixed set of loaded remote contexts.
#[derive(Clone, Copy)]
struct Expander<'a> {
    remotes: &'a RemoteContexts,
}

impl Default for Expander<'_> {
    fn default() -> Self {
        static EMPTY: Lazy<RemoteContexts> = Lazy::new(RemoteContexts::new);
        Self { remotes: &EMPTY }
    }
}

impl Expander<'_> {
    fn expand_document(self, document: &Value) -> Result<Vec<Value>, NormalizeError> {
        let base = &*ACTIVITY_STREAMS;
        match document {
            Value::Object(map) => {
                let context = match map.get("@context") {
                    Some(local) => self.extend(base, local, 0)?,
                    None => base.clone(),
                };
                match map.get("@graph") {
                    Some(graph) => self.expand_top_level(&context, graph),
                    None => Ok(self
                        .expand_node(&context, map)?
                        .map(Value::Object)
                        .into_iter()
                        .collect()),
                }
            }
            Value::Array(_) => self.expand_top_level(base, document),
            other => Err(NormalizeError::InvalidDocument(format!(
                "expected an object or an array, got {other}"
            ))),
        }
    }

    /// Apply a local `@context` value on top of `active`.
    fn extend(
        self,
        active: &Context,
        local: &Value,
        depth: usize,
    ) -> Result<Context, NormalizeError> {
        let mut context = active.clone();
        match local {
            Value::Null => context = Context::default(),
            Value::String(iri) => {
                if let Some(known) = bundled(iri) {
                    context.merge(known);
                } else if let Some(remote) = self.remotes.get(iri) {
                    if depth >= MAX_CONTEXT_DEPTH {
                        return Err(NormalizeError::InvalidContext(format!(
                            "remote context {iri} nests too deeply"
                        )));
                    }
                    context = self.extend(&context, remote, depth + 1)?;
                } else {
                    return Err(NormalizeError::UnsupportedContext(iri.clone()));
                }
            }
            Value::Array(entries) => {
                for entry in entries {
                    context = self.extend(&context, entry, depth)?;
                }
            }
            Value::Object(definitions) => {
                // The second pass resolves prefixes defined later in the same object.
                context.define_all(definitions)?;
                context.define_all(definitions)?;
            }
            other => {
                return Err(NormalizeError::InvalidContext(other.to_string()));
            }
        }
        Ok(context)
    }

    fn expand_top_level(
        self,
        context: &Context,
        nodes: &Value,
    ) -> Result<Vec<Value>, NormalizeError> {
        let items = match nodes {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };

        let mut expanded = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(map) = item else {
                return Err(NormalizeError::InvalidDocument(format!(
                    "top-level item is not an object: {item}"
                )));
            };
            if let Some(node) = self.expand_node(context, map)? {
                expanded.push(Value::Object(node));
            }
        }
        Ok(expanded)
    }

    /// Expand one node object. Returns `None` if nothing survives expansion.
    fn expand_node(
        self,
        context: &Context,
        map: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, NormalizeError> {
        let local;
        let context = match map.get("@context") {
            Some(definition) => {
                local = self.extend(context, definition, 0)?;
                &local
            }
            None => context,
        };

        let mut node = Map::new();
        for (key, value) in map {
            if key == "@context" {
                continue;
            }
            let Some(expanded_key) = context.expand_key(key) else {
                continue;
            };

            match expanded_key.as_str() {
                "@id" => match value {
                    Value::Null => {}
                    Value::String(id) => {
                        node.insert("@id".to_string(), Value::String(context.expand_iri(id)));
                    }
                    other => {
                        return Err(NormalizeError::InvalidKeywordValue {
                            keyword: "@id",
                            value: other.clone(),
                        });
                    }
                },
                "@type" => {
                    let types = expand_types(context, value)?;
                    append(&mut node, "@type", types);
                }
                keyword if keyword.starts_with('@') => {
                    node.insert(keyword.to_string(), value.clone());
                }
                property => {
                    if value.is_null() {
                        continue;
                    }
                    let mut values = Vec::new();
                    self.expand_value(context, context.is_id_coerced(key), value, &mut values)?;
                    append(&mut node, property, values);
                }
            }
        }

        Ok((!node.is_empty()).then_some(node))
    }

    fn expand_value(
        self,
        context: &Context,
        id_coerced: bool,
        value: &Value,
        out: &mut Vec<Value>,
    ) -> Result<(), NormalizeError> {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    self.expand_value(context, id_coerced, item, out)?;
                }
            }
            Value::Object(map) if map.contains_key("@value") => out.push(value.clone()),
            Value::Object(map) => {
                if let Some(node) = self.expand_node(context, map)? {
                    out.push(Value::Object(node));
                }
            }
            Value::String(s) if id_coerced => {
                let mut reference = Map::new();
                reference.insert("@id".to_string(), Value::String(context.expand_iri(s)));
                out.push(Value::Object(reference));
            }
            literal => {
                let mut wrapped = Map::new();
                wrapped.insert("@value".to_string(), literal.clone());
                out.push(Value::Object(wrapped));
            }
        }
        Ok(())
    }
}

fn expand_types(context: &Context, value: &Value) -> Result<Vec<Value>, NormalizeError> {
    let invalid = || NormalizeError::InvalidKeywordValue {
        keyword: "@type",
        value: value.clone(),
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(name) => Ok(vec![Value::String(context.expand_type(name))]),
        Value::Array(names) => names
            .iter()
            .map(|name| {
                name.as_str()
                    .map(|name| Value::String(context.expand_type(name)))
                    .ok_or_else(invalid)
            })
            .collect(),
        _ => Err(invalid()),
    }
}

fn append(node: &mut Map<String, Value>, key: &str, values: Vec<Value>) {
    match node.get_mut(key) {
        Some(Value::Array(existing)) => existing.extend(values),
        _ => {
            node.insert(key.to_string(), Value::Array(values));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::vocab;
    use serde_json::json;

    fn expand(document: &Value) -> Vec<Value> {
        ActivityStreamsNormalizer::new()
            .expand_document(document)
            .unwrap()
    }

    #[test]
    fn test_expand_follow() {
        let nodes = expand(&json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "@type": "Follow",
            "id": "https://activities.example.org/1",
            "actor": "https://sally.example.org",
            "object": {
                "summary": "Follow request",
                "type": "Inbox",
                "id": "https://www.example.org/inbox",
                "attributedTo": "https://john.example.org"
            }
        }));

        assert_eq!(
            nodes,
            vec![json!({
                "@type": [vocab::FOLLOW],
                "@id": "https://activities.example.org/1",
                (vocab::ACTOR): [{"@id": "https://sally.example.org"}],
                (vocab::OBJECT): [{
                    "https://www.w3.org/ns/activitystreams#summary": [{"@value": "Follow request"}],
                    "@type": ["_:Inbox"],
                    "@id": "https://www.example.org/inbox",
                    "https://www.w3.org/ns/activitystreams#attributedTo": [{"@id": "https://john.example.org"}]
                }]
            })]
        );
    }

    #[test]
    fn test_null_values_are_dropped() {
        let nodes = expand(&json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "type": "Follow",
            "id": null,
            "summary": null
        }));
        assert_eq!(nodes, vec![json!({"@type": [vocab::FOLLOW]})]);
    }

    #[test]
    fn test_empty_id_survives() {
        let nodes = expand(&json!({"type": "Create", "id": ""}));
        assert_eq!(nodes[0]["@id"], json!(""));
    }

    #[test]
    fn test_compact_and_absolute_iris() {
        let nodes = expand(&json!({
            "@context": ["https://www.w3.org/ns/activitystreams"],
            "type": ["as:Create", "https://example.org/ns#Custom"],
            "to": "as:Public",
            "https://example.org/ns#flag": true
        }));
        let node = &nodes[0];

        assert_eq!(
            node["@type"],
            json!([vocab::CREATE, "https://example.org/ns#Custom"])
        );
        assert_eq!(
            node["https://www.w3.org/ns/activitystreams#to"],
            json!([{"@id": "https://www.w3.org/ns/activitystreams#Public"}])
        );
        assert_eq!(node["https://example.org/ns#flag"], json!([{"@value": true}]));
    }

    #[test]
    fn test_arrays_are_flattened() {
        let nodes = expand(&json!({
            "type": "Create",
            "cc": [["https://a.example"], "https://b.example", null]
        }));
        assert_eq!(
            nodes[0]["https://www.w3.org/ns/activitystreams#cc"],
            json!([{"@id": "https://a.example"}, {"@id": "https://b.example"}])
        );
    }

    #[test]
    fn test_security_context_and_inline_terms() {
        let nodes = expand(&json!({
            "@context": [
                "https://www.w3.org/ns/activitystreams",
                "https://w3id.org/security/v1",
                {
                    "toot": "http://joinmastodon.org/ns#",
                    "featured": {"@id": "toot:featured", "@type": "@id"},
                    "discoverable": "toot:discoverable"
                }
            ],
            "type": "Update",
            "publicKey": {"owner": "https://sally.example.org", "publicKeyPem": "PEM"},
            "featured": "https://sally.example.org/featured",
            "discoverable": true
        }));
        let node = &nodes[0];

        assert_eq!(
            node["https://w3id.org/security#publicKey"],
            json!([{
                "https://w3id.org/security#owner": [{"@id": "https://sally.example.org"}],
                "https://w3id.org/security#publicKeyPem": [{"@value": "PEM"}]
            }])
        );
        assert_eq!(
            node["http://joinmastodon.org/ns#featured"],
            json!([{"@id": "https://sally.example.org/featured"}])
        );
        assert_eq!(
            node["http://joinmastodon.org/ns#discoverable"],
            json!([{"@value": true}])
        );
    }

    #[test]
    fn test_unknown_remote_context_is_rejected() {
        let err = ActivityStreamsNormalizer::new()
            .expand_document(&json!({
                "@context": "https://contexts.example.org/unknown",
                "type": "Create"
            }))
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedContext(_)));
        assert_eq!(
            err.to_string(),
            "unsupported remote context: https://contexts.example.org/unknown"
        );
    }

    #[test]
    fn test_graph_and_array_documents() {
        let graph = expand(&json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "@graph": [
                {"type": "Create", "id": "https://a.example/1"},
                {"type": "Delete", "id": "https://a.example/2"}
            ]
        }));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph[1]["@type"], json!([vocab::DELETE]));

        let array = expand(&json!([
            {"type": "Read", "id": "https://a.example/3"},
            {"type": "Update", "id": "https://a.example/4"}
        ]));
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["@id"], json!("https://a.example/3"));
    }

    #[test]
    fn test_invalid_documents() {
        let normalizer = ActivityStreamsNormalizer::new();
        assert!(matches!(
            normalizer.expand_document(&json!("just a string")),
            Err(NormalizeError::InvalidDocument(_))
        ));
        assert!(matches!(
            normalizer.expand_document(&json!([1, 2])),
            Err(NormalizeError::InvalidDocument(_))
        ));
        assert!(matches!(
            normalizer.expand_document(&json!({"type": "Create", "id": 7})),
            Err(NormalizeError::InvalidKeywordValue { keyword: "@id", .. })
        ));
        assert!(matches!(
            normalizer.expand_document(&json!({"type": {"nested": true}})),
            Err(NormalizeError::InvalidKeywordValue { keyword: "@type", .. })
        ));
    }

    #[test]
    fn test_undefined_terms_without_vocab_are_dropped() {
        let nodes = expand(&json!({
            "@context": [null, {"name": "https://schema.org/name"}],
            "name": "relay",
            "nickname": "ferry"
        }));
        assert_eq!(
            nodes,
            vec![json!({"https://schema.org/name": [{"@value": "relay"}]})]
        );
    }

    #[tokio::test]
    async fn test_normalizer_trait() {
        let normalizer: &dyn Normalizer = &ActivityStreamsNormalizer::new();
        let nodes = normalizer
            .expand(json!({"type": "Create", "id": "https://a.example/1"}))
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
    }

    /// Serves fixed context documents and fails for anything else.
    struct StaticLoader(HashMap<String, Value>);

    #[async_trait]
    impl DocumentLoader for StaticLoader {
        async fn load(&self, iri: &str) -> Result<Arc<Value>, NormalizeError> {
            self.0
                .get(iri)
                .cloned()
                .map(Arc::new)
                .ok_or_else(|| NormalizeError::ContextLoad {
                    iri: iri.to_string(),
                    reason: "not found".to_string(),
                })
        }
    }

    fn static_normalizer(documents: &[(&str, Value)]) -> ActivityStreamsNormalizer {
        let documents = documents
            .iter()
            .map(|(iri, document)| ((*iri).to_string(), document.clone()))
            .collect();
        ActivityStreamsNormalizer::with_loader(Arc::new(StaticLoader(documents)))
    }

    fn litepub_context() -> Value {
        json!({
            "@context": [
                "https://www.w3.org/ns/activitystreams",
                "https://w3id.org/security/v1",
                {
                    "toot": "http://joinmastodon.org/ns#",
                    "Emoji": "toot:Emoji",
                    "sensitive": "as:sensitive"
                }
            ]
        })
    }

    fn emoji_note(context_iri: &str) -> Value {
        json!({
            "@context": [
                "https://www.w3.org/ns/activitystreams",
                context_iri,
                {"@language": "und"}
            ],
            "type": "Note",
            "id": "https://a.example/notes/1",
            "sensitive": false,
            "tag": [{"type": "Emoji", "name": ":ferry:"}]
        })
    }

    #[tokio::test]
    async fn test_remote_context_is_loaded() {
        let iri = "https://a.example/schemas/litepub-0.1.jsonld";
        let normalizer = static_normalizer(&[(iri, litepub_context())]);

        let nodes = normalizer.expand(emoji_note(iri)).await.unwrap();

        assert_eq!(nodes[0]["@type"], json!([format!("{AS_NS}Note")]));
        assert_eq!(
            nodes[0][format!("{AS_NS}sensitive")],
            json!([{"@value": false}])
        );
        assert_eq!(
            nodes[0][format!("{AS_NS}tag")][0]["@type"],
            json!(["http://joinmastodon.org/ns#Emoji"])
        );
    }

    #[tokio::test]
    async fn test_remote_context_load_failure() {
        let err = static_normalizer(&[])
            .expand(emoji_note("https://a.example/missing.jsonld"))
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::ContextLoad { .. }));

        // Without a loader the same document is rejected up front.
        let err = ActivityStreamsNormalizer::new()
            .expand(emoji_note("https://a.example/missing.jsonld"))
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedContext(_)));
    }

    #[tokio::test]
    async fn test_remote_context_without_context_key() {
        let iri = "https://a.example/not-a-context.json";
        let err = static_normalizer(&[(iri, json!({"type": "Note"}))])
            .expand(emoji_note(iri))
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidContext(_)));
    }

    #[tokio::test]
    async fn test_self_referencing_context_is_bounded() {
        let iri = "https://a.example/loop.jsonld";
        let err = static_normalizer(&[(iri, json!({"@context": iri}))])
            .expand(emoji_note(iri))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nests too deeply"));
    }

    #[tokio::test]
    async fn test_remote_contexts_are_fetched_once_over_http() {
        use crate::loader::CachingDocumentLoader;
        use axum::{Json, Router, extract::State, routing::get};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/schemas/litepub-0.1.jsonld",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(litepub_context())
                }),
            )
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let loader =
            CachingDocumentLoader::with_timeout(Duration::from_secs(5), "ferry-test").unwrap();
        let normalizer = ActivityStreamsNormalizer::with_loader(Arc::new(loader));
        let iri = format!("http://{addr}/schemas/litepub-0.1.jsonld");

        for _ in 0..2 {
            let nodes = normalizer.expand(emoji_note(&iri)).await.unwrap();
            assert_eq!(
                nodes[0][format!("{AS_NS}tag")][0]["@type"],
                json!(["http://joinmastodon.org/ns#Emoji"])
            );
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
