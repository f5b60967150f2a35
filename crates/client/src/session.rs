//! Durable visitor sessions and variant resolution.
//!
//! A session survives page loads through two redundant client-side stores:
//! a primary file-backed store with a sliding 30-day expiry, and a secondary
//! in-memory cache as fallback when the primary is cleared. If neither store
//! is available the manager degrades to a non-persistent session scoped to
//! the single page load; downstream aggregation must not treat those as
//! real experiment samples.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use woothee::parser::Parser;

use atomic_write_file::AtomicWriteFile;
use split_core::limits::SESSION_TTL_DAYS;
use split_core::{Attribution, DeviceClass, Error, Result, Session, Variant};

use crate::variant::VariantOverrides;

/// A keyed client-side session store.
pub trait SessionStore: Send + Sync {
    /// Load the session for a page, if present and unexpired.
    fn load(&self, page_id: &str) -> Option<Session>;

    /// Persist the session, refreshing its sliding expiry.
    fn save(&self, session: &Session) -> Result<()>;
}

/// On-disk session envelope carrying the sliding expiry.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    session: Session,
    expires_at: DateTime<Utc>,
}

/// Primary store: one JSON file per page, written atomically.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self, page_id: &str) -> PathBuf {
        let safe: String = page_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        self.dir.join(format!("session-{}.json", safe))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, page_id: &str) -> Option<Session> {
        let bytes = fs::read(self.file_path(page_id)).ok()?;
        let stored: StoredSession = serde_json::from_slice(&bytes).ok()?;

        if stored.expires_at < Utc::now() {
            return None;
        }
        Some(stored.session)
    }

    fn save(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::internal(format!("session dir: {}", e)))?;

        let path = self.file_path(&session.page_id);
        let mut file = AtomicWriteFile::options()
            .open(&path)
            .map_err(|e| Error::internal(format!("open {}: {}", path.display(), e)))?;

        let stored = StoredSession {
            session: session.clone(),
            expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
        };
        let data = serde_json::to_string(&stored)?;
        writeln!(file, "{data}").map_err(|e| Error::internal(format!("write session: {}", e)))?;
        file.commit()
            .map_err(|e| Error::internal(format!("commit session: {}", e)))?;

        Ok(())
    }
}

/// Secondary store: in-memory cache with a 30-day idle window.
pub struct CacheSessionStore {
    cache: moka::sync::Cache<String, Session>,
}

impl CacheSessionStore {
    pub fn new() -> Self {
        Self {
            cache: moka::sync::Cache::builder()
                .max_capacity(10_000)
                .time_to_idle(std::time::Duration::from_secs(
                    SESSION_TTL_DAYS as u64 * 24 * 60 * 60,
                ))
                .build(),
        }
    }
}

impl Default for CacheSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for CacheSessionStore {
    fn load(&self, page_id: &str) -> Option<Session> {
        self.cache.get(page_id)
    }

    fn save(&self, session: &Session) -> Result<()> {
        self.cache
            .insert(session.page_id.clone(), session.clone());
        Ok(())
    }
}

/// What the manager knows about the visitor at first contact.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub page_id: String,
    pub user_agent: String,
    /// Entry URL carrying attribution query parameters, when known.
    pub entry_url: Option<String>,
}

impl PageContext {
    pub fn new(page_id: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            user_agent: user_agent.into(),
            entry_url: None,
        }
    }

    pub fn with_entry_url(mut self, entry_url: impl Into<String>) -> Self {
        self.entry_url = Some(entry_url.into());
        self
    }
}

/// Produces durable sessions and stable per-component variant choices.
pub struct SessionManager {
    primary: Option<Box<dyn SessionStore>>,
    fallback: Option<Box<dyn SessionStore>>,
    ua_parser: Parser,
}

impl SessionManager {
    pub fn new(
        primary: Option<Box<dyn SessionStore>>,
        fallback: Option<Box<dyn SessionStore>>,
    ) -> Self {
        Self {
            primary,
            fallback,
            ua_parser: Parser::new(),
        }
    }

    /// File-backed primary store plus in-memory fallback cache.
    pub fn with_default_stores(dir: impl AsRef<Path>) -> Self {
        Self::new(
            Some(Box::new(FileSessionStore::new(dir.as_ref().to_path_buf()))),
            Some(Box::new(CacheSessionStore::new())),
        )
    }

    /// Manager with no durable store: every session is ephemeral.
    pub fn without_stores() -> Self {
        Self::new(None, None)
    }

    /// Returns the visitor's session for this page, creating one on first
    /// contact. Reloading refreshes the sliding expiry window.
    pub fn get_or_create(&self, ctx: &PageContext) -> Session {
        if let Some(mut session) = self.load_existing(&ctx.page_id) {
            session.touch();
            self.persist(&session);
            return session;
        }

        let device = DeviceClass::from_user_agent(&ctx.user_agent);
        let browser = self.browser_label(&ctx.user_agent);

        if self.primary.is_none() && self.fallback.is_none() {
            warn!(page_id = %ctx.page_id, "no durable session store available, issuing non-persistent session");
            let mut session = Session::ephemeral(&ctx.page_id, device, browser);
            session.attribution = entry_attribution(ctx);
            return session;
        }

        let mut session = Session::new(&ctx.page_id, device, browser);
        session.attribution = entry_attribution(ctx);
        self.persist(&session);
        session
    }

    /// Resolves the variant for a component, in precedence order:
    /// per-component override, global override, persisted assignment,
    /// fresh 50/50 draw (written back immediately).
    pub fn variant_for(
        &self,
        session: &mut Session,
        component_id: &str,
        overrides: &VariantOverrides,
    ) -> Variant {
        if let Some(variant) = overrides.component(component_id) {
            session.assign(component_id, variant, true);
            self.persist(session);
            return variant;
        }

        if let Some(variant) = overrides.global() {
            session.assign(component_id, variant, true);
            self.persist(session);
            return variant;
        }

        if let Some(existing) = session.assignment(component_id) {
            return existing.variant;
        }

        let variant = if rand::random::<bool>() { Variant::A } else { Variant::B };
        session.assign(component_id, variant, false);
        self.persist(session);
        variant
    }

    fn load_existing(&self, page_id: &str) -> Option<Session> {
        for store in [self.primary.as_deref(), self.fallback.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Some(session) = store.load(page_id) {
                if !session.is_expired() {
                    return Some(session);
                }
            }
        }
        None
    }

    /// Saves to every available store. Storage failures are logged and
    /// swallowed; tracking must never break the host page.
    fn persist(&self, session: &Session) {
        if !session.persistent {
            return;
        }

        for store in [self.primary.as_deref(), self.fallback.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = store.save(session) {
                debug!(session_id = %session.id, error = %e, "session store write failed");
            }
        }
    }

    fn browser_label(&self, user_agent: &str) -> String {
        self.ua_parser
            .parse(user_agent)
            .map(|r| r.name)
            .filter(|name| !name.is_empty() && *name != "UNKNOWN")
            .unwrap_or("unknown")
            .to_string()
    }
}

/// Attribution fields from the entry request parameters, if present.
fn entry_attribution(ctx: &PageContext) -> Attribution {
    let Some(entry_url) = &ctx.entry_url else {
        return Attribution::default();
    };
    let Ok(parsed) = url::Url::parse(entry_url) else {
        return Attribution::default();
    };

    let mut attribution = Attribution::default();
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "utm_source" | "source" => attribution.source = Some(value.into_owned()),
            "utm_campaign" | "campaign" => attribution.campaign = Some(value.into_owned()),
            _ => {}
        }
    }
    attribution
}
