//! Diesel schema for plugin lifecycle persistence.

diesel::table! {
    /// One activation record per plugin.
    plugin_activations (plugin_id) {
        /// Plugin identifier.
        #[max_length = 100]
        plugin_id -> Varchar,
        /// Whether the plugin is loaded at boot.
        is_active -> Bool,
        /// Last activation timestamp.
        activated_at -> Nullable<Timestamptz>,
        /// Actor who last activated the plugin.
        activated_by -> Nullable<Uuid>,
        /// Last deactivation timestamp.
        deactivated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Generic key/value status flags.
    plugin_status_flags (key) {
        /// Flag key.
        #[max_length = 255]
        key -> Varchar,
        /// Serialized flag value.
        value -> Text,
        /// Last write timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Cached catalog presentation for installed plugins.
    plugin_catalog_cache (plugin_id) {
        /// Plugin identifier.
        #[max_length = 100]
        plugin_id -> Varchar,
        /// Icon reference.
        icon -> Nullable<Text>,
        /// Catalog categories as a JSONB array.
        categories -> Jsonb,
        /// Price in minor currency units.
        price_cents -> Int8,
        /// Release phase (`stable`, `beta`, `alpha`, `deprecated`).
        #[max_length = 50]
        phase -> Varchar,
        /// Refresh timestamp.
        cached_at -> Timestamptz,
    }
}
