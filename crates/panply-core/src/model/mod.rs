// ── Config object model ──
//
// Plain data with serde derives. Constructors validate only the object's
// own attributes; cross-object references are resolved by the graph (in
// strict mode) or by the device at create time.

mod kind;
mod network;
mod policy;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use kind::{KindSpec, ObjectKind};
pub use network::{
    AddressAssignment, EthernetInterface, ManagementProfile, NetworkMode, NextHop, StaticRoute,
    VirtualRouter, Zone,
};
pub use policy::{
    DestinationTranslation, InspectionProfiles, NatRule, NatType, Rule, RuleAction, Rulebase,
    SecurityRule, SourceTranslation,
};

use crate::error::CoreError;

/// Identity of a staged object: kind plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// A by-name reference from one object to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Object holding the reference (a child for contained objects).
    pub from: ObjectRef,
    /// Attribute the name appears in (e.g. `to_zones`).
    pub field: &'static str,
    pub target: ObjectRef,
}

impl Reference {
    pub(crate) fn new(
        from: &ObjectRef,
        field: &'static str,
        kind: ObjectKind,
        name: &str,
    ) -> Self {
        Self {
            from: from.clone(),
            field,
            target: ObjectRef::new(kind, name),
        }
    }
}

/// Any object that can be staged on a device session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConfigObject {
    ManagementProfile(ManagementProfile),
    Interface(EthernetInterface),
    Zone(Zone),
    VirtualRouter(VirtualRouter),
    StaticRoute(StaticRoute),
    Rulebase(Rulebase),
    NatRule(NatRule),
    SecurityRule(SecurityRule),
}

impl ConfigObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::ManagementProfile(_) => ObjectKind::ManagementProfile,
            Self::Interface(_) => ObjectKind::Interface,
            Self::Zone(_) => ObjectKind::Zone,
            Self::VirtualRouter(_) => ObjectKind::VirtualRouter,
            Self::StaticRoute(_) => ObjectKind::StaticRoute,
            Self::Rulebase(_) => ObjectKind::Rulebase,
            Self::NatRule(_) => ObjectKind::NatRule,
            Self::SecurityRule(_) => ObjectKind::SecurityRule,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ManagementProfile(o) => &o.name,
            Self::Interface(o) => &o.name,
            Self::Zone(o) => &o.name,
            Self::VirtualRouter(o) => &o.name,
            Self::StaticRoute(o) => &o.name,
            Self::Rulebase(o) => &o.name,
            Self::NatRule(o) => &o.name,
            Self::SecurityRule(o) => &o.name,
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.kind(), self.name())
    }

    /// Check the object's own required attributes (children included).
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::ManagementProfile(o) => o.validate(),
            Self::Interface(o) => o.validate(),
            Self::Zone(o) => o.validate(),
            Self::VirtualRouter(o) => o.validate(),
            Self::StaticRoute(o) => o.validate(),
            Self::Rulebase(o) => o.validate(),
            Self::NatRule(o) => o.validate(),
            Self::SecurityRule(o) => o.validate(),
        }
    }

    /// Name references held by this object and its children.
    pub fn references(&self) -> Vec<Reference> {
        let from = self.object_ref();
        match self {
            Self::ManagementProfile(_) | Self::Rulebase(_) => {
                self.children().iter().flat_map(ConfigObject::references).collect()
            }
            Self::Interface(o) => o.references(&from),
            Self::Zone(o) => o.references(&from),
            Self::VirtualRouter(o) => {
                let mut refs = o.references(&from);
                refs.extend(self.children().iter().flat_map(ConfigObject::references));
                refs
            }
            Self::StaticRoute(o) => o.references(&from),
            Self::NatRule(o) => o.references(&from),
            Self::SecurityRule(o) => o.references(&from),
        }
    }

    /// Owned children, in declared order.
    pub fn children(&self) -> Vec<ConfigObject> {
        match self {
            Self::VirtualRouter(vr) => vr
                .routes
                .iter()
                .cloned()
                .map(ConfigObject::StaticRoute)
                .collect(),
            Self::Rulebase(rb) => rb.rules.iter().cloned().map(ConfigObject::from).collect(),
            _ => Vec::new(),
        }
    }

    /// Attach a child to this object's exclusive ownership.
    pub fn attach(&mut self, child: ConfigObject) -> Result<(), CoreError> {
        let parent = self.object_ref();
        match (self, child) {
            (Self::VirtualRouter(vr), Self::StaticRoute(route)) => vr.add_route(route),
            (Self::Rulebase(rb), Self::NatRule(rule)) => rb.add(Rule::Nat(rule)),
            (Self::Rulebase(rb), Self::SecurityRule(rule)) => rb.add(Rule::Security(rule)),
            (_, child) => Err(CoreError::validation(format!(
                "{parent} cannot contain {}",
                child.object_ref()
            ))),
        }
    }

    /// Render the device entry for this object.
    ///
    /// Contained objects render to the fragment their parent embeds; a
    /// rulebase renders a summary of its rules, which are sent one by one.
    pub fn to_entry(&self) -> Value {
        match self {
            Self::ManagementProfile(o) => o.to_entry(),
            Self::Interface(o) => o.to_entry(),
            Self::Zone(o) => o.to_entry(),
            Self::VirtualRouter(o) => o.to_entry(),
            Self::StaticRoute(o) => o.to_entry(),
            Self::Rulebase(o) => json!({
                "@name": o.name,
                "nat": o.nat_rules().map(|r| r.name.as_str()).collect::<Vec<_>>(),
                "security": o.security_rules().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            }),
            Self::NatRule(o) => o.to_entry(),
            Self::SecurityRule(o) => o.to_entry(),
        }
    }
}

impl From<Rule> for ConfigObject {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::Nat(r) => Self::NatRule(r),
            Rule::Security(r) => Self::SecurityRule(r),
        }
    }
}

macro_rules! impl_from_object {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for ConfigObject {
                fn from(object: $ty) -> Self {
                    Self::$variant(object)
                }
            }
        )*
    };
}

impl_from_object!(
    ManagementProfile(ManagementProfile),
    Interface(EthernetInterface),
    Zone(Zone),
    VirtualRouter(VirtualRouter),
    StaticRoute(StaticRoute),
    Rulebase(Rulebase),
    NatRule(NatRule),
    SecurityRule(SecurityRule),
);

// ── Entry rendering helpers ──────────────────────────────────────────

pub(crate) fn members<S: AsRef<str>>(items: &[S]) -> Value {
    json!({ "member": items.iter().map(AsRef::as_ref).collect::<Vec<_>>() })
}

pub(crate) fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

pub(crate) fn require_name(kind: ObjectKind, name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::validation(format!("{kind} requires a name")));
    }
    Ok(())
}

pub(crate) fn require_non_empty<S: AsRef<str>>(
    owner: &ObjectRef,
    field: &str,
    items: &[S],
) -> Result<(), CoreError> {
    if items.is_empty() || items.iter().any(|i| i.as_ref().trim().is_empty()) {
        return Err(CoreError::validation(format!(
            "{owner} requires at least one non-empty {field}"
        )));
    }
    Ok(())
}
