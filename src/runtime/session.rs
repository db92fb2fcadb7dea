//! Compilation session: owns the arena, scope stack, and diagnostics,
//! and drives the simplify and emit passes over one compilation unit.

use tracing::{debug, info};

use crate::blob::{BlobSource, FsBlobSource};
use crate::boot::BootDescriptor;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::ir::{Arena, NodeId};
use crate::nv::NvList;
use crate::runtime::scope::ScopeStack;
use crate::runtime::simplify::EvalContext;
use crate::srcpos::SrcPos;

/// Default cap on expression-evaluation nesting.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Knobs for a [`Session`].
pub struct SessionConfig {
    /// Command-line constant definitions
    pub defines: NvList,
    /// Provider for include-binary payloads
    pub blobs: Box<dyn BlobSource>,
    /// Cap on expression-evaluation nesting
    pub max_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            defines: NvList::new(),
            blobs: Box::new(FsBlobSource::new(".")),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One compilation session.
///
/// The arena is public so a front end can build the statement tree in
/// place before calling [`Session::process`].
pub struct Session {
    /// Node arena for the whole session
    pub arena: Arena,
    /// Scope stack; empty between runs
    pub scopes: ScopeStack,
    /// Diagnostic sink
    pub diagnostics: Diagnostics,
    pub(crate) defines: NvList,
    pub(crate) blobs: Box<dyn BlobSource>,
    pub(crate) depth: usize,
    pub(crate) max_depth: usize,
}

impl Session {
    /// Creates a session with default settings.
    pub fn new() -> Self {
        Session::with_config(SessionConfig::default())
    }

    /// Creates a session from explicit settings.
    pub fn with_config(config: SessionConfig) -> Self {
        Session {
            arena: Arena::new(),
            scopes: ScopeStack::new(),
            diagnostics: Diagnostics::new(),
            defines: config.defines,
            blobs: config.blobs,
            depth: 0,
            max_depth: config.max_depth,
        }
    }

    /// Compiles one unit: simplifies the tree rooted at `root`, emits
    /// it, and returns the boot descriptor.
    ///
    /// Fails with [`Error::CompileFailed`] when any error-severity
    /// diagnostic was reported along the way.
    pub fn process(&mut self, root: NodeId) -> Result<BootDescriptor> {
        debug!(nodes = self.arena.len(), "simplifying");
        let simplified = self.simplify(Some(root), EvalContext::Any);

        debug!("emitting");
        let boot = simplified.and_then(|root| self.emit_root(root));

        let errors = self.diagnostics.error_count();
        if errors > 0 {
            return Err(Error::CompileFailed { errors });
        }
        let boot = boot.ok_or(Error::NoBootDescriptor)?;

        info!(
            reserves = boot.reserves.len(),
            warnings = self.diagnostics.warning_count(),
            "compilation finished"
        );
        Ok(boot)
    }

    /// Reports an error diagnostic at the given node's position.
    pub(crate) fn error_at(&mut self, id: NodeId, err: Error) {
        let pos = self.arena[id].pos.clone();
        self.diagnostics.error(&pos, err);
    }

    /// Reports a warning diagnostic at the given node's position.
    pub(crate) fn warn_at(&mut self, id: NodeId, err: Error) {
        let pos = self.arena[id].pos.clone();
        self.diagnostics.warn(&pos, err);
    }

    /// Tracks one level of expression nesting; reports the overflow
    /// exactly once, at the node where the limit is first crossed.
    pub(crate) fn enter(&mut self, id: NodeId) -> bool {
        self.depth += 1;
        if self.depth == self.max_depth + 1 {
            self.error_at(
                id,
                Error::TooDeep {
                    limit: self.max_depth,
                },
            );
        }
        self.depth <= self.max_depth
    }

    /// Undoes one [`Session::enter`].
    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Position of a node, for diagnostics outside the arena borrow.
    pub(crate) fn pos_of(&self, id: NodeId) -> SrcPos {
        self.arena[id].pos.clone()
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
