//! Static registry of RTC vendors

use std::collections::BTreeMap;

/// A vendor's callout endpoint and the publisher macros it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorDefinition {
    /// URL template
    pub url: String,
    /// Macro names a publisher may set for this vendor
    pub macros: Vec<String>,
    pub error_reporting_url: Option<String>,
    /// Keep targeting keys as returned instead of suffixing `_<vendor>`
    pub disable_key_append: bool,
}

impl VendorDefinition {
    pub fn new(url: impl Into<String>, macros: &[&str]) -> Self {
        Self {
            url: url.into(),
            macros: macros.iter().map(|m| m.to_string()).collect(),
            error_reporting_url: None,
            disable_key_append: false,
        }
    }

    pub fn with_error_reporting_url(mut self, url: impl Into<String>) -> Self {
        self.error_reporting_url = Some(url.into());
        self
    }

    pub fn with_disable_key_append(mut self, disable: bool) -> Self {
        self.disable_key_append = disable;
        self
    }

    pub fn accepts_macro(&self, name: &str) -> bool {
        self.macros.iter().any(|m| m == name)
    }
}

/// Vendor lookup by name.
///
/// Lookups lowercase the requested name; registry keys are matched as stored.
#[derive(Debug, Clone, Default)]
pub struct VendorRegistry {
    vendors: BTreeMap<String, VendorDefinition>,
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vendors shipped with the runtime
    pub fn builtin() -> Self {
        Self::new()
            .with_vendor(
                "aps",
                VendorDefinition::new(
                    "https://aax.amazon-adsystem.com/e/dtb/bid?src=PUB_ID&pubid=PUB_ID&amp=1\
                     &u=CANONICAL_URL&slots=ATTR(data-slot)&pj=PARAMS\
                     &gdpr=CONSENT_METADATA(gdprApplies)&gdpr_consent=CONSENT_STRING",
                    &["PUB_ID", "PARAMS"],
                )
                .with_disable_key_append(true),
            )
            .with_vendor(
                "criteo",
                VendorDefinition::new(
                    "https://bidder.criteo.com/amp/rtc?zid=ZONE_ID&nid=NETWORK_ID\
                     &psubid=PUBLISHER_SUB_ID&lir=LINE_ITEM_RANGES&w=ATTR(width)\
                     &h=ATTR(height)&slot=ATTR(data-slot)&timeout=TIMEOUT&href=HREF",
                    &["ZONE_ID", "NETWORK_ID", "PUBLISHER_SUB_ID", "LINE_ITEM_RANGES"],
                )
                .with_disable_key_append(true),
            )
            .with_vendor(
                "medianet",
                VendorDefinition::new(
                    "https://amprtc.media.net/rtb/getrtc?cid=CID&w=ATTR(width)&h=ATTR(height)\
                     &slot=ATTR(data-slot)&tgt=TGT&curl=CANONICAL_URL&to=TIMEOUT&purl=HREF",
                    &["CID"],
                )
                .with_error_reporting_url(
                    "https://qsearch-a.akamaihd.net/log?logid=kfk&evtid=projectevents\
                     &project=amprtc_error&error=ERROR_TYPE&rd=HREF",
                )
                .with_disable_key_append(true),
            )
            .with_vendor(
                "prebidappnexus",
                VendorDefinition::new(
                    "https://prebid.adnxs.com/pbs/v1/openrtb2/amp?tag_id=PLACEMENT_ID\
                     &w=ATTR(width)&h=ATTR(height)&slot=ATTR(data-slot)&targeting=TGT\
                     &curl=CANONICAL_URL&timeout=TIMEOUT&adcid=ADCID&purl=HREF",
                    &["PLACEMENT_ID"],
                )
                .with_disable_key_append(true),
            )
    }

    pub fn with_vendor(mut self, name: impl Into<String>, definition: VendorDefinition) -> Self {
        self.vendors.insert(name.into(), definition);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&VendorDefinition> {
        self.vendors.get(&name.to_lowercase())
    }

    /// Registered names in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VendorDefinition)> {
        self.vendors.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = VendorRegistry::builtin();
        assert_eq!(registry.len(), 4);
        for (name, def) in registry.iter() {
            assert_eq!(name, name.to_lowercase());
            assert!(def.url.starts_with("https://"), "{name}: {}", def.url);
            assert!(!def.macros.is_empty());
        }
        // Continuation lines must not leak whitespace into templates.
        assert!(registry.iter().all(|(_, def)| !def.url.contains(' ')));
    }

    #[test]
    fn test_lookup_lowercases_request_only() {
        let registry = VendorRegistry::new()
            .with_vendor("fakevendor", VendorDefinition::new("https://fake.test/", &["SLOT_ID"]))
            .with_vendor("MixedCase", VendorDefinition::new("https://mixed.test/", &[]));

        assert!(registry.lookup("FakeVendor").is_some());
        assert!(registry.lookup("fakevendor").is_some());
        assert!(registry.lookup("MixedCase").is_none());
        assert!(registry.lookup("unknown").is_none());
    }

    #[test]
    fn test_accepts_macro() {
        let def = VendorDefinition::new("https://fake.test/", &["SLOT_ID", "PAGE_ID"]);
        assert!(def.accepts_macro("SLOT_ID"));
        assert!(!def.accepts_macro("slot_id"));
    }
}
