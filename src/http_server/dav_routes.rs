//! File-synchronization protocol branches.
//!
//! `/webdav`, `/caldav` and `/carddav` require Administrator. The two
//! well-known discovery paths are public but still use the calendar and
//! contacts vocabularies, so the read-only gate applies to them too.

use std::sync::Arc;

use super::backend::{ProtocolBackend, Unavailable};
use super::branch::Branch;
use crate::auth::RoleSet;
use crate::policy::methods::{
    CALDAV_PREFIX, CALDAV_WELL_KNOWN, CARDDAV_PREFIX, CARDDAV_WELL_KNOWN, WEBDAV_PREFIX,
};
use crate::policy::ProtocolFamily;

/// External protocol implementations
#[derive(Clone)]
pub struct DavBackends {
    pub webdav: Arc<dyn ProtocolBackend>,
    pub caldav: Arc<dyn ProtocolBackend>,
    pub carddav: Arc<dyn ProtocolBackend>,
}

impl Default for DavBackends {
    fn default() -> Self {
        Self {
            webdav: Unavailable::new("webdav"),
            caldav: Unavailable::new("caldav"),
            carddav: Unavailable::new("carddav"),
        }
    }
}

pub fn dav_branches(backends: &DavBackends) -> Vec<Branch> {
    vec![
        Branch::new(
            "webdav",
            WEBDAV_PREFIX,
            ProtocolFamily::WebDav,
            RoleSet::ADMINISTRATOR,
            Arc::clone(&backends.webdav),
        ),
        Branch::new(
            "caldav",
            CALDAV_PREFIX,
            ProtocolFamily::CalDav,
            RoleSet::ADMINISTRATOR,
            Arc::clone(&backends.caldav),
        ),
        Branch::new(
            "caldav-discovery",
            CALDAV_WELL_KNOWN,
            ProtocolFamily::CalDav,
            RoleSet::ANY,
            Arc::clone(&backends.caldav),
        ),
        Branch::new(
            "carddav",
            CARDDAV_PREFIX,
            ProtocolFamily::CardDav,
            RoleSet::ADMINISTRATOR,
            Arc::clone(&backends.carddav),
        ),
        Branch::new(
            "carddav-discovery",
            CARDDAV_WELL_KNOWN,
            ProtocolFamily::CardDav,
            RoleSet::ANY,
            Arc::clone(&backends.carddav),
        ),
    ]
}
