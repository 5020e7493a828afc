// ── Policy objects ──
//
// NAT and security rules and the rulebase that owns them. Rule order
// within each type is significant: the device evaluates top-down.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{ObjectKind, ObjectRef, Reference, members, require_name, require_non_empty, yes_no};
use crate::error::CoreError;

/// Zone and address wildcard.
pub const ANY: &str = "any";

fn any() -> Vec<String> {
    vec![ANY.to_owned()]
}

fn application_default() -> Vec<String> {
    vec!["application-default".to_owned()]
}

fn strings(items: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    items.into_iter().map(Into::into).collect()
}

fn zone_references(from: &ObjectRef, field: &'static str, zones: &[String]) -> Vec<Reference> {
    zones
        .iter()
        .filter(|z| z.as_str() != ANY)
        .map(|z| Reference::new(from, field, ObjectKind::Zone, z))
        .collect()
}

// ── Security rules ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Allow,
    Deny,
    Drop,
}

impl RuleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Drop => "drop",
        }
    }
}

/// Security profiles attached to an allow rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionProfiles {
    pub virus: Option<String>,
    pub spyware: Option<String>,
    pub vulnerability: Option<String>,
}

impl InspectionProfiles {
    /// The device's `default` profile for every inspection type.
    pub fn defaults() -> Self {
        Self {
            virus: Some("default".into()),
            spyware: Some("default".into()),
            vulnerability: Some("default".into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.virus.is_none() && self.spyware.is_none() && self.vulnerability.is_none()
    }

    fn to_entry(&self) -> Value {
        let mut profiles = Map::new();
        for (key, value) in [
            ("virus", &self.virus),
            ("spyware", &self.spyware),
            ("vulnerability", &self.vulnerability),
        ] {
            if let Some(name) = value {
                profiles.insert(key.into(), json!({ "member": [name] }));
            }
        }
        json!({ "profiles": profiles })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub name: String,
    pub from_zones: Vec<String>,
    pub to_zones: Vec<String>,
    #[serde(default = "any")]
    pub sources: Vec<String>,
    #[serde(default = "any")]
    pub destinations: Vec<String>,
    #[serde(default = "any")]
    pub applications: Vec<String>,
    #[serde(default = "application_default")]
    pub services: Vec<String>,
    #[serde(default)]
    pub action: RuleAction,
    #[serde(default)]
    pub log_start: bool,
    #[serde(default = "log_end_default")]
    pub log_end: bool,
    #[serde(default)]
    pub profiles: InspectionProfiles,
    pub description: Option<String>,
}

fn log_end_default() -> bool {
    true
}

impl SecurityRule {
    /// Rule matching any source/destination/application on the
    /// application-default services between the given zones.
    pub fn new(
        name: impl Into<String>,
        from_zones: impl IntoIterator<Item = impl Into<String>>,
        to_zones: impl IntoIterator<Item = impl Into<String>>,
        action: RuleAction,
    ) -> Result<Self, CoreError> {
        let rule = Self {
            name: name.into(),
            from_zones: strings(from_zones),
            to_zones: strings(to_zones),
            sources: any(),
            destinations: any(),
            applications: any(),
            services: application_default(),
            action,
            log_start: false,
            log_end: true,
            profiles: InspectionProfiles::default(),
            description: None,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sources = strings(sources);
        self
    }

    pub fn destinations(mut self, destinations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.destinations = strings(destinations);
        self
    }

    pub fn applications(mut self, applications: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.applications = strings(applications);
        self
    }

    pub fn services(mut self, services: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.services = strings(services);
        self
    }

    pub fn logging(mut self, log_start: bool, log_end: bool) -> Self {
        self.log_start = log_start;
        self.log_end = log_end;
        self
    }

    pub fn with_profiles(mut self, profiles: InspectionProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_name(ObjectKind::SecurityRule, &self.name)?;
        let me = ObjectRef::new(ObjectKind::SecurityRule, &self.name);
        require_non_empty(&me, "from-zone", &self.from_zones)?;
        require_non_empty(&me, "to-zone", &self.to_zones)?;
        require_non_empty(&me, "source", &self.sources)?;
        require_non_empty(&me, "destination", &self.destinations)?;
        require_non_empty(&me, "application", &self.applications)?;
        require_non_empty(&me, "service", &self.services)
    }

    pub(crate) fn references(&self, from: &ObjectRef) -> Vec<Reference> {
        let mut refs = zone_references(from, "from_zones", &self.from_zones);
        refs.extend(zone_references(from, "to_zones", &self.to_zones));
        refs
    }

    pub fn to_entry(&self) -> Value {
        let mut entry = json!({
            "@name": self.name,
            "from": members(&self.from_zones),
            "to": members(&self.to_zones),
            "source": members(&self.sources),
            "destination": members(&self.destinations),
            "source-user": members(&[ANY]),
            "category": members(&[ANY]),
            "application": members(&self.applications),
            "service": members(&self.services),
            "action": self.action.as_str(),
            "log-start": yes_no(self.log_start),
            "log-end": yes_no(self.log_end),
        });
        if let Value::Object(map) = &mut entry {
            if !self.profiles.is_empty() {
                map.insert("profile-setting".into(), self.profiles.to_entry());
            }
            if let Some(description) = &self.description {
                map.insert("description".into(), json!(description));
            }
        }
        entry
    }
}

// ── NAT rules ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NatType {
    #[default]
    Ipv4,
    Nat64,
    Nptv6,
}

impl NatType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Nat64 => "nat64",
            Self::Nptv6 => "nptv6",
        }
    }
}

/// Source NAT, always dynamic IP and port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceTranslation {
    /// Translate to the egress interface's own address.
    InterfaceAddress { interface: String },
    /// Translate to a pool of addresses.
    TranslatedAddress { addresses: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationTranslation {
    pub address: String,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRule {
    pub name: String,
    #[serde(default)]
    pub nat_type: NatType,
    pub from_zones: Vec<String>,
    pub to_zones: Vec<String>,
    #[serde(default = "any")]
    pub sources: Vec<String>,
    #[serde(default = "any")]
    pub destinations: Vec<String>,
    #[serde(default = "any_service")]
    pub service: String,
    /// Egress interface constraint (`to-interface`).
    pub to_interface: Option<String>,
    pub source_translation: Option<SourceTranslation>,
    pub destination_translation: Option<DestinationTranslation>,
    pub description: Option<String>,
}

fn any_service() -> String {
    ANY.to_owned()
}

impl NatRule {
    /// IPv4 rule matching any source, destination and service, with no
    /// translation until one is set.
    pub fn new(
        name: impl Into<String>,
        from_zones: impl IntoIterator<Item = impl Into<String>>,
        to_zones: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, CoreError> {
        let rule = Self {
            name: name.into(),
            nat_type: NatType::Ipv4,
            from_zones: strings(from_zones),
            to_zones: strings(to_zones),
            sources: any(),
            destinations: any(),
            service: any_service(),
            to_interface: None,
            source_translation: None,
            destination_translation: None,
            description: None,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sources = strings(sources);
        self
    }

    pub fn destinations(mut self, destinations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.destinations = strings(destinations);
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn to_interface(mut self, interface: impl Into<String>) -> Self {
        self.to_interface = Some(interface.into());
        self
    }

    pub fn source_translation(mut self, translation: SourceTranslation) -> Self {
        self.source_translation = Some(translation);
        self
    }

    pub fn destination_translation(mut self, address: impl Into<String>, port: Option<u16>) -> Self {
        self.destination_translation = Some(DestinationTranslation {
            address: address.into(),
            port,
        });
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_name(ObjectKind::NatRule, &self.name)?;
        let me = ObjectRef::new(ObjectKind::NatRule, &self.name);
        require_non_empty(&me, "from-zone", &self.from_zones)?;
        require_non_empty(&me, "to-zone", &self.to_zones)?;
        require_non_empty(&me, "source", &self.sources)?;
        require_non_empty(&me, "destination", &self.destinations)?;
        if self.service.trim().is_empty() {
            return Err(CoreError::validation(format!("{me} requires a service")));
        }
        match &self.source_translation {
            Some(SourceTranslation::InterfaceAddress { interface }) if interface.trim().is_empty() => {
                return Err(CoreError::validation(format!(
                    "{me}: source translation interface is empty"
                )));
            }
            Some(SourceTranslation::TranslatedAddress { addresses }) => {
                require_non_empty(&me, "translated address", addresses)?;
            }
            _ => {}
        }
        if let Some(dnat) = &self.destination_translation {
            if dnat.address.trim().is_empty() {
                return Err(CoreError::validation(format!(
                    "{me}: destination translation address is empty"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn references(&self, from: &ObjectRef) -> Vec<Reference> {
        let mut refs = zone_references(from, "from_zones", &self.from_zones);
        refs.extend(zone_references(from, "to_zones", &self.to_zones));
        if let Some(interface) = &self.to_interface {
            refs.push(Reference::new(from, "to_interface", ObjectKind::Interface, interface));
        }
        if let Some(SourceTranslation::InterfaceAddress { interface }) = &self.source_translation {
            refs.push(Reference::new(
                from,
                "source_translation",
                ObjectKind::Interface,
                interface,
            ));
        }
        refs
    }

    pub fn to_entry(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("@name".into(), json!(self.name));
        entry.insert("nat-type".into(), json!(self.nat_type.as_str()));
        entry.insert("from".into(), members(&self.from_zones));
        entry.insert("to".into(), members(&self.to_zones));
        entry.insert("source".into(), members(&self.sources));
        entry.insert("destination".into(), members(&self.destinations));
        entry.insert("service".into(), json!(self.service));
        if let Some(interface) = &self.to_interface {
            entry.insert("to-interface".into(), json!(interface));
        }
        match &self.source_translation {
            Some(SourceTranslation::InterfaceAddress { interface }) => {
                entry.insert(
                    "source-translation".into(),
                    json!({ "dynamic-ip-and-port": { "interface-address": { "interface": interface } } }),
                );
            }
            Some(SourceTranslation::TranslatedAddress { addresses }) => {
                entry.insert(
                    "source-translation".into(),
                    json!({ "dynamic-ip-and-port": { "translated-address": members(addresses) } }),
                );
            }
            None => {}
        }
        if let Some(dnat) = &self.destination_translation {
            let mut translation = Map::new();
            translation.insert("translated-address".into(), json!(dnat.address));
            if let Some(port) = dnat.port {
                translation.insert("translated-port".into(), json!(port));
            }
            entry.insert("destination-translation".into(), Value::Object(translation));
        }
        if let Some(description) = &self.description {
            entry.insert("description".into(), json!(description));
        }
        Value::Object(entry)
    }
}

// ── Rulebase ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Rule {
    Nat(NatRule),
    Security(SecurityRule),
}

impl Rule {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Nat(_) => ObjectKind::NatRule,
            Self::Security(_) => ObjectKind::SecurityRule,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Nat(r) => &r.name,
            Self::Security(r) => &r.name,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::Nat(r) => r.validate(),
            Self::Security(r) => r.validate(),
        }
    }

    pub fn to_entry(&self) -> Value {
        match self {
            Self::Nat(r) => r.to_entry(),
            Self::Security(r) => r.to_entry(),
        }
    }
}

/// Ordered NAT and security rules. Order is kept per rule type exactly as
/// declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rulebase {
    #[serde(default = "rulebase_name")]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn rulebase_name() -> String {
    "rulebase".to_owned()
}

impl Rulebase {
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let rulebase = Self {
            name: name.into(),
            rules: Vec::new(),
        };
        rulebase.validate()?;
        Ok(rulebase)
    }

    /// Append a rule. Names are unique per rule type.
    pub fn add(&mut self, rule: Rule) -> Result<(), CoreError> {
        rule.validate()?;
        if self
            .rules
            .iter()
            .any(|r| r.kind() == rule.kind() && r.name() == rule.name())
        {
            return Err(CoreError::validation(format!(
                "duplicate {} '{}' in rulebase '{}'",
                rule.kind(),
                rule.name(),
                self.name
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn nat_rules(&self) -> impl Iterator<Item = &NatRule> {
        self.rules.iter().filter_map(|r| match r {
            Rule::Nat(n) => Some(n),
            Rule::Security(_) => None,
        })
    }

    pub fn security_rules(&self) -> impl Iterator<Item = &SecurityRule> {
        self.rules.iter().filter_map(|r| match r {
            Rule::Security(s) => Some(s),
            Rule::Nat(_) => None,
        })
    }

    /// Declared rule names of one type, in order.
    pub fn rule_names(&self, kind: ObjectKind) -> Vec<String> {
        self.rules
            .iter()
            .filter(|r| r.kind() == kind)
            .map(|r| r.name().to_owned())
            .collect()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_name(ObjectKind::Rulebase, &self.name)?;
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate()?;
            if self.rules[..i]
                .iter()
                .any(|r| r.kind() == rule.kind() && r.name() == rule.name())
            {
                return Err(CoreError::validation(format!(
                    "duplicate {} '{}' in rulebase '{}'",
                    rule.kind(),
                    rule.name(),
                    self.name
                )));
            }
        }
        Ok(())
    }
}
