// ── Object kind registry ──
//
// Each kind declares, as data, where it lives on the device and what it
// depends on. The graph orders kinds from `depends_on` and objects from
// their references, so adding a kind never touches the orchestrator.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Every kind of object a session can stage.
///
/// Declaration order is the tie-breaker when the dependency relation
/// leaves several kinds ready at once.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ObjectKind {
    ManagementProfile,
    Interface,
    Zone,
    VirtualRouter,
    StaticRoute,
    Rulebase,
    NatRule,
    SecurityRule,
}

/// Registry entry for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    /// REST resource path, or `None` when the kind has no entry of its own.
    pub resource: Option<&'static str>,
    /// Whether entries live under `location=vsys`.
    pub vsys_scoped: bool,
    /// Kinds that must exist before this one is created.
    pub depends_on: &'static [ObjectKind],
    /// Owning kind for contained objects; `None` for top-level kinds.
    pub parent: Option<ObjectKind>,
}

impl ObjectKind {
    pub const fn spec(self) -> KindSpec {
        match self {
            Self::ManagementProfile => KindSpec {
                resource: Some("Network/InterfaceManagementNetworkProfiles"),
                vsys_scoped: false,
                depends_on: &[],
                parent: None,
            },
            Self::Interface => KindSpec {
                resource: Some("Network/EthernetInterfaces"),
                vsys_scoped: false,
                depends_on: &[Self::ManagementProfile],
                parent: None,
            },
            Self::Zone => KindSpec {
                resource: Some("Network/Zones"),
                vsys_scoped: true,
                depends_on: &[Self::Interface],
                parent: None,
            },
            Self::VirtualRouter => KindSpec {
                resource: Some("Network/VirtualRouters"),
                vsys_scoped: false,
                depends_on: &[Self::Interface],
                parent: None,
            },
            // Embedded in the router's `routing-table`.
            Self::StaticRoute => KindSpec {
                resource: None,
                vsys_scoped: false,
                depends_on: &[Self::VirtualRouter, Self::Interface],
                parent: Some(Self::VirtualRouter),
            },
            // NAT to-zones are resolved through the router's routes.
            Self::Rulebase => KindSpec {
                resource: None,
                vsys_scoped: true,
                depends_on: &[Self::Zone, Self::VirtualRouter],
                parent: None,
            },
            Self::NatRule => KindSpec {
                resource: Some("Policies/NATRules"),
                vsys_scoped: true,
                depends_on: &[Self::Rulebase, Self::Zone, Self::Interface],
                parent: Some(Self::Rulebase),
            },
            Self::SecurityRule => KindSpec {
                resource: Some("Policies/SecurityRules"),
                vsys_scoped: true,
                depends_on: &[Self::Rulebase, Self::Zone],
                parent: Some(Self::Rulebase),
            },
        }
    }

    pub fn depends_on(self) -> &'static [ObjectKind] {
        self.spec().depends_on
    }

    /// Top-level kinds are created by their own call; contained kinds
    /// travel inside their parent.
    pub fn is_top_level(self) -> bool {
        self.spec().parent.is_none()
    }

    pub fn is_rule(self) -> bool {
        matches!(self, Self::NatRule | Self::SecurityRule)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn display_and_parse_are_kebab_case() {
        assert_eq!(ObjectKind::VirtualRouter.to_string(), "virtual-router");
        assert_eq!(ObjectKind::from_str("nat-rule").unwrap(), ObjectKind::NatRule);
    }

    #[test]
    fn contained_kinds_name_their_parent() {
        for kind in ObjectKind::iter() {
            if let Some(parent) = kind.spec().parent {
                assert!(parent.is_top_level(), "{kind} nested under contained {parent}");
                assert!(
                    kind.depends_on().contains(&parent),
                    "{kind} must depend on its parent {parent}"
                );
            }
        }
    }

    #[test]
    fn rules_are_vsys_scoped() {
        assert!(ObjectKind::NatRule.spec().vsys_scoped);
        assert!(ObjectKind::SecurityRule.spec().vsys_scoped);
        assert!(!ObjectKind::Interface.spec().vsys_scoped);
    }
}
