//! The user-macro resolution service, consumed rather than implemented here
//! (§6), plus the per-test macro cache and the variable-substitution pass
//! that happens after macro expansion.

use indexmap::IndexMap;

use crate::model::VariableScope;

/// Whether a macro expansion is allowed to reveal secret values. Secrets are
/// resolved for values placed on the wire (`Unmasked`) but redacted for
/// anything that might end up in a log line (`Masked`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroMode {
    Masked,
    Unmasked,
}

/// External collaborator that resolves `{$MACRO}`-style references against a
/// host's configured macros. Implementations typically hold a handle into
/// the config store's user-macro tables; this engine never parses macro
/// syntax itself, it only calls through this trait.
pub trait MacroResolver {
    fn substitute(&self, text: &str, hostid: u64, mode: MacroMode) -> Result<String, String>;
}

/// A resolver that performs no substitution, for tests and for hosts with no
/// macros configured.
pub struct NoopMacroResolver;

impl MacroResolver for NoopMacroResolver {
    fn substitute(&self, text: &str, _hostid: u64, _mode: MacroMode) -> Result<String, String> {
        Ok(text.to_string())
    }
}

/// Per-test, insertion-order cache of resolved macros so repeated lookups of
/// the same macro within one test's steps don't re-invoke the resolver.
/// Mirrors `httptest.macros` / `httptest_remove_macros()` in the original
/// implementation: populated lazily, dropped whole at test teardown.
#[derive(Debug, Default)]
pub struct MacroCache {
    entries: IndexMap<(String, bool), String>,
}

impl MacroCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `text` against `hostid`, consulting the cache first. Only
    /// whole-string lookups are cached (mirroring the original, which keys
    /// on the unexpanded text), which is sufficient because step templates
    /// repeat verbatim across identical field rows.
    pub fn resolve(
        &mut self,
        resolver: &dyn MacroResolver,
        text: &str,
        hostid: u64,
        mode: MacroMode,
    ) -> Result<String, String> {
        let key = (text.to_string(), mode == MacroMode::Unmasked);
        if let Some(cached) = self.entries.get(&key) {
            return Ok(cached.clone());
        }
        let resolved = resolver.substitute(text, hostid, mode)?;
        self.entries.insert(key, resolved.clone());
        Ok(resolved)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Replaces variable sigils in `text` with their captured values from
/// `scope`. Per the data-model invariant (§3), variable *names* are never
/// macro-expanded or nested-variable-expanded; only the raw text handed to
/// this function is searched for references, using the literal
/// `{variable_name}` sigil the config store stores variables under.
pub fn substitute_variables(scope: &VariableScope, text: &str) -> String {
    let mut out = text.to_string();
    for (name, value) in scope.iter() {
        let sigil = format!("{{{name}}}");
        if out.contains(&sigil) {
            out = out.replace(&sigil, value);
        }
    }
    out
}
