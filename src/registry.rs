//! Backend registry and resource-string resolver.
//!
//! A [`Registry`] maps resource-string prefixes to backend constructors. It
//! is an explicit object the caller builds during program startup — there is
//! no load-time static registration, so the table is complete before the
//! first resolution and never mutated afterwards.
//!
//! Resolution is longest-prefix match over leading characters. A resource
//! string that matches no registered prefix at all fails with "no suitable
//! backend". Two prefixes matching with equal length are ordered by
//! priority (higher wins); a remaining tie goes to the earlier
//! registration. The rule is deterministic and documented here because the
//! historical behavior left it to scan order.
//!
//! # Resource strings
//!
//! `"<category>/<family>/<backend-tag>[/<deviceIndex>]"`, for example
//! `/cpu/self/ref` or `/gpu/wgpu/ref/1`. The trailing integer selects a
//! device ordinal and defaults to 0 when omitted or malformed.

use crate::backend::BackendInit;
use crate::error::{Error, Result};

/// Upper bound on registered backends.
pub const MAX_BACKENDS: usize = 32;

/// A caller-supplied backend address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    raw: String,
}

impl Resource {
    /// Wraps a resource string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The full resource string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parses the device ordinal that may trail the matched prefix as
    /// `/<integer>`. Absent or malformed suffixes select device 0.
    pub fn device_ordinal(&self, prefix_len: usize) -> usize {
        let rest = match self.raw.get(prefix_len..) {
            Some(rest) => rest,
            None => return 0,
        };
        let Some(rest) = rest.strip_prefix('/') else {
            return 0;
        };
        // Leading digits only, like atoi; "/1/extra" still selects 1.
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(0)
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One registered backend.
pub struct BackendEntry {
    prefix: String,
    priority: u32,
    init: BackendInit,
}

impl BackendEntry {
    /// The prefix matched against resource strings.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Tie-break priority; higher wins an equal-length match.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// The backend constructor.
    pub fn init(&self) -> BackendInit {
        self.init
    }
}

impl core::fmt::Debug for BackendEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BackendEntry")
            .field("prefix", &self.prefix)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Process-level table of available backends.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<BackendEntry>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in backends.
    pub fn with_builtins() -> Result<Self> {
        let mut reg = Self::new();
        crate::backends::register_all(&mut reg)?;
        Ok(reg)
    }

    /// Appends a backend entry. Fails with a resource error once
    /// [`MAX_BACKENDS`] entries exist.
    pub fn register(
        &mut self,
        prefix: impl Into<String>,
        priority: u32,
        init: BackendInit,
    ) -> Result<()> {
        if self.entries.len() >= MAX_BACKENDS {
            return Err(Error::resource("too many backends"));
        }
        self.entries.push(BackendEntry {
            prefix: prefix.into(),
            priority,
            init,
        });
        Ok(())
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selects the backend for `resource` by longest-prefix match.
    ///
    /// An entry matches when its whole prefix is a leading substring of the
    /// resource string; the longest such prefix wins, priority breaks equal
    /// lengths, registration order breaks equal priorities. No match is a
    /// configuration error.
    pub fn resolve(&self, resource: &str) -> Result<&BackendEntry> {
        let mut best: Option<&BackendEntry> = None;
        for entry in &self.entries {
            if entry.prefix.is_empty() || !resource.starts_with(entry.prefix.as_str()) {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    entry.prefix.len() > b.prefix.len()
                        || (entry.prefix.len() == b.prefix.len() && entry.priority > b.priority)
                }
            };
            if better {
                best = Some(entry);
            }
        }
        best.ok_or_else(|| {
            Error::config(format!("no suitable backend for resource '{resource}'"))
        })
    }
}
