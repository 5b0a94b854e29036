//! Owned-entitlement resolution
//!
//! Licenses arrive as one snapshot, package metadata then attributes
//! app ids to each license, and app metadata fills in titles. A license
//! exposes its games only once every referenced app id is resolved;
//! the cache is ready once no package or app lookups are outstanding.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vapor_wire::proto::entitlements::{ClientLicenseList, ProductInfoResponse};
use vapor_wire::vdf::{self, KeyValues};

use crate::readiness::Readiness;

/// Flag combination marking entries that are neither owned nor free
const PSEUDO_LICENSE_FLAGS: u32 = 520;

/// Product category parsed from app metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppKind {
    Game,
    Dlc,
    Other(String),
}

impl AppKind {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "game" => Self::Game,
            "dlc" => Self::Dlc,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Resolved product metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub app_id: u32,
    pub title: String,
    pub kind: AppKind,
    /// Owning app, present for DLC entries
    pub parent: Option<u32>,
}

/// One entitlement, keyed by package id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    pub package_id: u32,
    /// Granted through family sharing rather than owned by this account
    pub shared: bool,
    /// Token echoed into the package-info lookup
    pub access_token: u64,
    /// App ids attributed by package metadata
    pub app_ids: HashSet<u32>,
}

/// Package lookup the caller should issue next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageRequest {
    pub package_id: u32,
    pub access_token: u64,
}

#[derive(Debug, Default)]
struct Inner {
    started: bool,
    licenses: HashMap<u32, License>,
    apps: HashMap<u32, App>,
    pending_packages: HashSet<u32>,
    pending_apps: HashSet<u32>,
}

impl Inner {
    /// Packages whose app ids are all present in the app map. An empty
    /// app-id set counts as unresolved, its metadata has not arrived.
    fn resolved_packages(&self) -> HashSet<u32> {
        self.licenses
            .values()
            .filter(|license| {
                !license.app_ids.is_empty()
                    && license
                        .app_ids
                        .iter()
                        .all(|app_id| self.apps.contains_key(app_id))
            })
            .map(|license| license.package_id)
            .collect()
    }

    fn is_ready(&self) -> bool {
        self.started && self.pending_packages.is_empty() && self.pending_apps.is_empty()
    }
}

/// Licenses plus the product metadata needed to expose them as games
#[derive(Debug, Default)]
pub struct GamesCache {
    inner: RwLock<Inner>,
    readiness: Readiness,
}

impl GamesCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports an entitlement snapshot and returns the package lookups
    /// still needed.
    ///
    /// Pseudo licenses (package id 0 or the unidentified-entry flag
    /// combination) are skipped. Packages already resolved are not
    /// requested again; a snapshot whose package id set differs from
    /// the cached one resets the cache first.
    pub fn import_licenses(
        &self,
        own_account_id: u32,
        list: &ClientLicenseList,
    ) -> Vec<PackageRequest> {
        let mut incoming = Vec::new();
        for license in &list.licenses {
            let package_id = license.package_id.unwrap_or_default();
            let flags = license.flags.unwrap_or_default();
            if package_id == 0 || flags == PSEUDO_LICENSE_FLAGS {
                continue;
            }
            let shared = license.owner_id.unwrap_or_default() != own_account_id;
            incoming.push((package_id, shared, license.access_token.unwrap_or_default()));
        }

        let mut inner = self.inner.write();
        let incoming_ids: HashSet<u32> = incoming.iter().map(|(id, _, _)| *id).collect();
        let cached_ids: HashSet<u32> = inner.licenses.keys().copied().collect();
        if inner.started && incoming_ids != cached_ids {
            info!(
                "license set changed ({} cached, {} incoming), resetting",
                cached_ids.len(),
                incoming_ids.len()
            );
            *inner = Inner::default();
        }
        inner.started = true;

        let resolved = inner.resolved_packages();
        let mut requests = Vec::new();
        for (package_id, shared, access_token) in incoming {
            if resolved.contains(&package_id) {
                continue;
            }
            inner
                .licenses
                .entry(package_id)
                .or_insert_with(|| License {
                    package_id,
                    shared,
                    access_token,
                    app_ids: HashSet::new(),
                });
            if inner.pending_packages.insert(package_id) {
                requests.push(PackageRequest {
                    package_id,
                    access_token,
                });
            }
        }
        debug!(
            "imported {} licenses, {} packages to look up",
            incoming_ids.len(),
            requests.len()
        );

        let ready = inner.is_ready();
        drop(inner);
        self.readiness.publish(ready);
        requests
    }

    /// Applies a package/app metadata batch and returns the app ids
    /// that still need a lookup.
    ///
    /// Package buffers carry binary key-values behind a four-byte
    /// length prefix; app buffers carry text key-values with a trailing
    /// NUL. Malformed buffers are logged and dropped but still clear
    /// their outstanding entry.
    pub fn import_product_info(&self, response: &ProductInfoResponse) -> Vec<u32> {
        let mut inner = self.inner.write();
        let mut apps_to_request = Vec::new();

        for package in &response.packages {
            let package_id = package.packageid.unwrap_or_default();
            inner.pending_packages.remove(&package_id);
            let Some(app_ids) = parse_package_apps(package_id, package.buffer.as_deref()) else {
                continue;
            };
            for app_id in &app_ids {
                if !inner.apps.contains_key(app_id) && inner.pending_apps.insert(*app_id) {
                    apps_to_request.push(*app_id);
                }
            }
            if let Some(license) = inner.licenses.get_mut(&package_id) {
                license.app_ids.extend(app_ids);
            } else {
                warn!("package {package_id} does not match any license");
            }
        }
        for package_id in &response.unknown_packageids {
            warn!("package {package_id} unknown to the backend");
            inner.pending_packages.remove(package_id);
        }

        for app in &response.apps {
            let app_id = app.appid.unwrap_or_default();
            inner.pending_apps.remove(&app_id);
            if let Some(parsed) = parse_app(app_id, app.buffer.as_deref()) {
                inner.apps.insert(app_id, parsed);
            }
        }
        for app_id in &response.unknown_appids {
            warn!("app {app_id} unknown to the backend");
            inner.pending_apps.remove(app_id);
        }

        let ready = inner.is_ready();
        drop(inner);
        self.readiness.publish(ready);
        apps_to_request
    }

    /// Games owned by this account.
    #[must_use]
    pub fn owned_games(&self) -> Vec<App> {
        self.apps_matching(false, &AppKind::Game)
    }

    /// DLC attached to owned licenses.
    #[must_use]
    pub fn dlcs(&self) -> Vec<App> {
        self.apps_matching(false, &AppKind::Dlc)
    }

    /// Games reachable through family sharing.
    #[must_use]
    pub fn shared_games(&self) -> Vec<App> {
        self.apps_matching(true, &AppKind::Game)
    }

    fn apps_matching(&self, shared: bool, kind: &AppKind) -> Vec<App> {
        let inner = self.inner.read();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for license in inner.licenses.values().filter(|l| l.shared == shared) {
            for app_id in &license.app_ids {
                let Some(app) = inner.apps.get(app_id) else {
                    warn!(
                        "app {app_id} of package {} is not resolved yet",
                        license.package_id
                    );
                    continue;
                };
                if app.kind == *kind && seen.insert(*app_id) {
                    out.push(app.clone());
                }
            }
        }
        out.sort_by_key(|app| app.app_id);
        out
    }

    #[must_use]
    pub fn app(&self, app_id: u32) -> Option<App> {
        self.inner.read().apps.get(&app_id).cloned()
    }

    #[must_use]
    pub fn package_ids(&self) -> HashSet<u32> {
        self.inner.read().licenses.keys().copied().collect()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    #[must_use]
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.readiness.subscribe()
    }

    /// Blocks until every license resolves to titled apps.
    pub async fn wait_ready(&self) {
        self.readiness.wait().await;
    }
}

fn parse_package_apps(package_id: u32, buffer: Option<&[u8]>) -> Option<Vec<u32>> {
    let Some(buffer) = buffer else {
        warn!("package {package_id} arrived without a body");
        return None;
    };
    // The first four bytes repeat the package id.
    let Some(payload) = buffer.get(4..) else {
        warn!("package {package_id} body is shorter than its prefix");
        return None;
    };
    let parsed = match vdf::parse_binary(payload) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("dropping malformed package {package_id}: {err}");
            return None;
        }
    };
    let key = package_id.to_string();
    let app_ids = parsed
        .get_path(&[&key, "appids"])
        .map(|appids| {
            appids
                .entries()
                .iter()
                .filter_map(|(_, value)| value.as_int())
                .filter_map(|id| u32::try_from(id).ok())
                .collect()
        })
        .unwrap_or_default();
    Some(app_ids)
}

fn parse_app(app_id: u32, buffer: Option<&[u8]>) -> Option<App> {
    let Some(buffer) = buffer else {
        warn!("app {app_id} arrived without a body");
        return None;
    };
    let text_len = buffer.len().saturating_sub(1);
    let text = String::from_utf8_lossy(&buffer[..text_len]);
    let parsed = match vdf::parse_text(&text) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("dropping malformed app {app_id}: {err}");
            return None;
        }
    };
    let title = parsed
        .get_path(&["appinfo", "common", "name"])
        .and_then(KeyValues::as_str);
    let kind = parsed
        .get_path(&["appinfo", "common", "type"])
        .and_then(KeyValues::as_str);
    let (title, kind) = match (title, kind) {
        (Some(title), Some(kind)) => (title.to_string(), AppKind::parse(kind)),
        _ => {
            warn!("app {app_id} metadata lacks a common section");
            ("unknown".to_string(), AppKind::Other("unknown".to_string()))
        }
    };
    let parent = if kind == AppKind::Dlc {
        parsed
            .get_path(&["appinfo", "extended", "dlcforappid"])
            .and_then(KeyValues::as_int)
            .and_then(|id| u32::try_from(id).ok())
    } else {
        None
    };
    Some(App {
        app_id,
        title,
        kind,
        parent,
    })
}
