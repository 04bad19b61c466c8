//! # Method Vocabularies
//!
//! Each protocol family has a fixed method set, and every verb in every set
//! has exactly one classification: safe or mutating.
//!
//! The control API, the command channel and the static collaborators all
//! use the generic HTTP vocabulary; the three file-synchronization
//! protocols extend it with their own verbs.

use std::fmt;

use axum::http::Method;

pub const METHOD_MKCOL: &str = "MKCOL";
pub const METHOD_COPY: &str = "COPY";
pub const METHOD_MOVE: &str = "MOVE";
pub const METHOD_LOCK: &str = "LOCK";
pub const METHOD_UNLOCK: &str = "UNLOCK";
pub const METHOD_PROPFIND: &str = "PROPFIND";
pub const METHOD_PROPPATCH: &str = "PROPPATCH";
pub const METHOD_REPORT: &str = "REPORT";

pub const HTTP_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE",
];

pub const WEBDAV_METHODS: &[&str] = &[
    "OPTIONS",
    "HEAD",
    "GET",
    "POST",
    "PUT",
    "DELETE",
    METHOD_MKCOL,
    METHOD_COPY,
    METHOD_MOVE,
    METHOD_LOCK,
    METHOD_UNLOCK,
    METHOD_PROPFIND,
    METHOD_PROPPATCH,
];

pub const CALDAV_METHODS: &[&str] = &[
    "OPTIONS",
    "HEAD",
    "GET",
    "POST",
    "PUT",
    "DELETE",
    METHOD_MKCOL,
    METHOD_COPY,
    METHOD_MOVE,
    METHOD_PROPFIND,
    METHOD_PROPPATCH,
    METHOD_REPORT,
];

pub const CARDDAV_METHODS: &[&str] = CALDAV_METHODS;

/// Read-only verbs for static collaborator roots
pub const READ_METHODS: &[&str] = &["GET", "HEAD"];

/// Verbs that mutate state on the file-synchronization protocols
const DAV_MUTATING: &[&str] = &[
    "POST",
    "PUT",
    "DELETE",
    METHOD_MKCOL,
    METHOD_COPY,
    METHOD_MOVE,
    METHOD_LOCK,
    METHOD_UNLOCK,
    METHOD_PROPPATCH,
];

/// Verbs that mutate state on generic HTTP branches
const HTTP_MUTATING: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

pub const WEBDAV_PREFIX: &str = "/webdav";
pub const CALDAV_PREFIX: &str = "/caldav";
pub const CARDDAV_PREFIX: &str = "/carddav";
pub const CALDAV_WELL_KNOWN: &str = "/.well-known/caldav";
pub const CARDDAV_WELL_KNOWN: &str = "/.well-known/carddav";

/// Path roots that select a non-generic vocabulary
const FAMILY_PREFIXES: &[(&str, ProtocolFamily)] = &[
    (WEBDAV_PREFIX, ProtocolFamily::WebDav),
    (CALDAV_PREFIX, ProtocolFamily::CalDav),
    (CARDDAV_PREFIX, ProtocolFamily::CardDav),
    (CALDAV_WELL_KNOWN, ProtocolFamily::CalDav),
    (CARDDAV_WELL_KNOWN, ProtocolFamily::CardDav),
];

/// Classification of a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodClass {
    Safe,
    Mutating,
}

impl MethodClass {
    pub fn is_mutating(&self) -> bool {
        matches!(self, MethodClass::Mutating)
    }
}

/// A method vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFamily {
    /// Plain HTTP: control API, command channel, static collaborators
    Generic,
    /// Remote filesystem
    WebDav,
    /// Calendars
    CalDav,
    /// Contacts
    CardDav,
}

impl ProtocolFamily {
    pub const ALL: [ProtocolFamily; 4] = [
        ProtocolFamily::Generic,
        ProtocolFamily::WebDav,
        ProtocolFamily::CalDav,
        ProtocolFamily::CardDav,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProtocolFamily::Generic => "http",
            ProtocolFamily::WebDav => "webdav",
            ProtocolFamily::CalDav => "caldav",
            ProtocolFamily::CardDav => "carddav",
        }
    }

    /// The family's full method set
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            ProtocolFamily::Generic => HTTP_METHODS,
            ProtocolFamily::WebDav => WEBDAV_METHODS,
            ProtocolFamily::CalDav => CALDAV_METHODS,
            ProtocolFamily::CardDav => CARDDAV_METHODS,
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods().contains(&method.as_str())
    }

    /// Classify `method`, or `None` if the verb is not in this family
    pub fn classify(&self, method: &Method) -> Option<MethodClass> {
        if !self.allows(method) {
            return None;
        }

        let mutating = match self {
            ProtocolFamily::Generic => HTTP_MUTATING,
            _ => DAV_MUTATING,
        };

        if mutating.contains(&method.as_str()) {
            Some(MethodClass::Mutating)
        } else {
            Some(MethodClass::Safe)
        }
    }

    /// Value for `Access-Control-Allow-Methods` / `Allow`
    pub fn allow_header(&self) -> String {
        self.methods().join(", ")
    }

    /// Longest-prefix match of `path` against the protocol roots
    pub fn from_path(path: &str) -> ProtocolFamily {
        FAMILY_PREFIXES
            .iter()
            .filter(|(prefix, _)| path_matches_prefix(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, family)| *family)
            .unwrap_or(ProtocolFamily::Generic)
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Segment-aware prefix test: `/webdav` matches `/webdav` and `/webdav/x`, not `/webdavx`
pub fn path_matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Parse a verb string, including protocol extension verbs
pub fn method(name: &str) -> Option<Method> {
    Method::from_bytes(name.as_bytes()).ok()
}
