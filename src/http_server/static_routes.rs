//! Static collaborator branches and upload.
//!
//! | prefix                  | roles          | root                    |
//! |-------------------------|----------------|-------------------------|
//! | `/stage`, `/appearance` | any            | working dir             |
//! | `/widgets` .. `/public` | any            | data dir                |
//! | `/snippets`             | any            | data dir                |
//! | `/export`               | authenticated  | temp dir                |
//! | `/assets`               | authenticated  | data dir, root denied   |
//! | `/history`              | Administrator  | workspace dir           |
//! | `/repo/diff`            | Administrator  | temp dir                |
//! | `/upload` (POST)        | Administrator  | data dir `assets/`      |

use std::path::Path;
use std::sync::Arc;

use super::backend::{ProtocolBackend, StaticDir, StaticFile};
use super::branch::Branch;
use super::config::GatewayConfig;
use crate::auth::RoleSet;
use crate::policy::methods::READ_METHODS;
use crate::policy::ProtocolFamily;

const DATA_ROOTS: &[&str] = &["widgets", "plugins", "emojis", "templates", "public", "snippets"];

/// Fixed files served from `stage/`: (url, file)
const STAGE_FILES: &[(&str, &str)] = &[
    ("/favicon.ico", "icon.png"),
    ("/manifest.json", "manifest.webmanifest"),
    ("/manifest.webmanifest", "manifest.webmanifest"),
    ("/service-worker.js", "service-worker.js"),
];

fn dir_branch(name: &'static str, prefix: &str, root: &Path, requirement: RoleSet) -> Branch {
    Branch::new(
        name,
        prefix,
        ProtocolFamily::Generic,
        requirement,
        Arc::new(StaticDir::new(prefix, root)),
    )
    .methods(READ_METHODS)
}

pub fn static_branches(config: &GatewayConfig) -> Vec<Branch> {
    let mut branches = vec![
        dir_branch(
            "stage",
            "/stage",
            &config.working_dir.join("stage"),
            RoleSet::ANY,
        ),
        dir_branch(
            "appearance",
            "/appearance",
            &config.working_dir.join("appearance"),
            RoleSet::ANY,
        ),
        dir_branch(
            "export",
            "/export",
            &config.temp_dir.join("export"),
            RoleSet::AUTHENTICATED,
        ),
        dir_branch(
            "history",
            "/history",
            &config.workspace_dir.join("history"),
            RoleSet::ADMINISTRATOR,
        ),
        dir_branch(
            "repo-diff",
            "/repo/diff",
            &config.temp_dir.join("repo").join("diff"),
            RoleSet::ADMINISTRATOR,
        ),
        Branch::new(
            "assets",
            "/assets",
            ProtocolFamily::Generic,
            RoleSet::AUTHENTICATED,
            Arc::new(StaticDir::new("/assets", config.data_dir.join("assets")).deny_root()),
        )
        .methods(READ_METHODS),
    ];

    for &name in DATA_ROOTS {
        let prefix = format!("/{}", name);
        branches.push(dir_branch(name, &prefix, &config.data_dir.join(name), RoleSet::ANY));
    }

    for &(url, file) in STAGE_FILES {
        branches.push(
            Branch::new(
                "stage-file",
                url,
                ProtocolFamily::Generic,
                RoleSet::ANY,
                Arc::new(StaticFile::new(config.stage_path(file))),
            )
            .methods(READ_METHODS),
        );
    }

    branches
}

/// `POST /upload`: Administrator, read-only gated
pub fn upload_branch(backend: Arc<dyn ProtocolBackend>) -> Branch {
    Branch::new(
        "upload",
        "/upload",
        ProtocolFamily::Generic,
        RoleSet::ADMINISTRATOR,
        backend,
    )
    .methods(&["POST"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_server::branch::BranchTable;

    #[test]
    fn test_static_requirements() {
        let table = static_branches(&GatewayConfig::default())
            .into_iter()
            .fold(BranchTable::new(), BranchTable::with);

        assert_eq!(table.select("/assets/a.png").unwrap().requirement(), RoleSet::AUTHENTICATED);
        assert_eq!(table.select("/history/x").unwrap().requirement(), RoleSet::ADMINISTRATOR);
        assert_eq!(table.select("/widgets/w/index.html").unwrap().requirement(), RoleSet::ANY);
        assert_eq!(table.select("/favicon.ico").unwrap().name(), "stage-file");
        assert!(table.select("/repo/other").is_none());
    }
}
