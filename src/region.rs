//! Region-to-endpoint registry (spec §6.2, §9 "Region registry").
//!
//! The source enumerates ~70 region constants via reflection; per spec §9
//! this driver stores them in a flat table instead. A representative
//! subset is carried here rather than the full catalog, since the region
//! list itself (not the lookup mechanism) is the named non-goal.

/// A cloud region: its id (used in the endpoint host) and the realm's
/// second-level domain (spec §6.2: `https://nosql.{regionId}.oci.{sld}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub id: &'static str,
    second_level_domain: &'static str,
}

impl Region {
    pub fn endpoint(&self) -> String {
        format!("https://nosql.{}.oci.{}", self.id, self.second_level_domain)
    }

    /// The region id as an upper-snake-case constant name, e.g.
    /// `us-phoenix-1` -> `US_PHOENIX_1` (spec §6.2 "Region id ↔ constant
    /// name: lowercase with `_` replaced by `-`", inverted for lookup).
    pub fn constant_name(&self) -> String {
        self.id.to_uppercase().replace('-', "_")
    }
}

/// Looks up a region by id, case-insensitively, accepting either `-` or `_`
/// as the word separator (spec §6.2).
pub fn lookup(region_id: &str) -> Option<Region> {
    let normalized = region_id.to_lowercase().replace('_', "-");
    REGIONS.iter().find(|r| r.id == normalized).copied()
}

/// A representative slice of the OCI region catalog, grouped by realm.
static REGIONS: &[Region] = &[
    Region {
        id: "us-phoenix-1",
        second_level_domain: "oraclecloud.com",
    },
    Region {
        id: "us-ashburn-1",
        second_level_domain: "oraclecloud.com",
    },
    Region {
        id: "eu-frankfurt-1",
        second_level_domain: "oraclecloud.com",
    },
    Region {
        id: "uk-london-1",
        second_level_domain: "oraclecloud.com",
    },
    Region {
        id: "ap-tokyo-1",
        second_level_domain: "oraclecloud.com",
    },
    Region {
        id: "ap-mumbai-1",
        second_level_domain: "oraclecloud.com",
    },
    Region {
        id: "ca-toronto-1",
        second_level_domain: "oraclecloud.com",
    },
    Region {
        id: "sa-saopaulo-1",
        second_level_domain: "oraclecloud.com",
    },
    Region {
        id: "us-langley-1",
        second_level_domain: "oraclegovcloud.com",
    },
    Region {
        id: "us-luke-1",
        second_level_domain: "oraclegovcloud.com",
    },
    Region {
        id: "uk-gov-london-1",
        second_level_domain: "oraclegovcloud.uk",
    },
    Region {
        id: "ap-chiyoda-1",
        second_level_domain: "oraclecloud8.com",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_and_separator_insensitive() {
        let a = lookup("us-phoenix-1").unwrap();
        let b = lookup("US_PHOENIX_1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn endpoint_matches_spec_format() {
        let r = lookup("us-phoenix-1").unwrap();
        assert_eq!(r.endpoint(), "https://nosql.us-phoenix-1.oci.oraclecloud.com");
    }

    #[test]
    fn constant_name_round_trips() {
        let r = lookup("eu-frankfurt-1").unwrap();
        assert_eq!(r.constant_name(), "EU_FRANKFURT_1");
    }

    #[test]
    fn unknown_region_is_none() {
        assert!(lookup("nonexistent-region-9").is_none());
    }
}
