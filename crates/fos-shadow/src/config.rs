//! Shadow DOM Configuration

/// Shadow layer configuration options
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    /// Reserved element kind upgraded to a slot on first sight
    pub slot_tag: String,

    /// Light-child attribute naming the target slot
    pub slot_attribute: String,

    /// Host attribute carrying the shadow's unique identity
    pub host_id_attribute: String,

    /// Skip rewriting a slot whose native children already match
    /// its assignment (identity and order)
    pub skip_unchanged_slots: bool,

    /// Install `slot { display: contents; }` in the document head on first attach
    pub install_slot_style: bool,

    /// Rewrite `<style>` elements in shadows with host-scoped selectors
    pub scope_styles: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            slot_tag: "slot".to_string(),
            slot_attribute: "slot".to_string(),
            host_id_attribute: "shadow-host-id".to_string(),
            skip_unchanged_slots: true,
            install_slot_style: true,
            scope_styles: true,
        }
    }
}
