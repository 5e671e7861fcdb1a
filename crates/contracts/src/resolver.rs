use crate::{ExpandError, MacroAllowlist, MacroTable};

/// Macro substitution engine for URL templates.
///
/// Only macros named in the allowlist may be substituted; any other
/// placeholder is left as written.
#[trait_variant::make(VariableResolver: Send)]
pub trait LocalVariableResolver {
    /// Substitute every allowed macro, awaiting deferred resolvers.
    async fn expand_async(
        &self,
        template: &str,
        macros: &MacroTable,
        allowlist: &MacroAllowlist,
    ) -> Result<String, ExpandError>;

    /// Substitute without suspending. Used for error beacons.
    fn expand_sync(&self, template: &str, macros: &MacroTable, allowlist: &MacroAllowlist)
        -> String;
}
