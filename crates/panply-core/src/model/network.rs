// ── Network objects ──
//
// Management profiles, ethernet interfaces, zones, virtual routers and
// their static routes.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{ObjectKind, ObjectRef, Reference, members, require_name, yes_no};
use crate::error::CoreError;

/// Interface/zone operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkMode {
    #[default]
    Layer3,
    Layer2,
    VirtualWire,
    Tap,
}

impl NetworkMode {
    /// Key the device uses for this mode inside interface and zone entries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Layer3 => "layer3",
            Self::Layer2 => "layer2",
            Self::VirtualWire => "virtual-wire",
            Self::Tap => "tap",
        }
    }
}

// ── Management profile ───────────────────────────────────────────────

/// Management services an interface answers on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementProfile {
    pub name: String,
    #[serde(default)]
    pub ping: bool,
    #[serde(default)]
    pub ssh: bool,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub http: bool,
}

impl ManagementProfile {
    /// A profile that permits nothing until services are enabled.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let profile = Self {
            name: name.into(),
            ..Self::default()
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn ping(mut self, enabled: bool) -> Self {
        self.ping = enabled;
        self
    }

    pub fn ssh(mut self, enabled: bool) -> Self {
        self.ssh = enabled;
        self
    }

    pub fn https(mut self, enabled: bool) -> Self {
        self.https = enabled;
        self
    }

    pub fn http(mut self, enabled: bool) -> Self {
        self.http = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_name(ObjectKind::ManagementProfile, &self.name)
    }

    pub fn to_entry(&self) -> Value {
        json!({
            "@name": self.name,
            "ping": yes_no(self.ping),
            "ssh": yes_no(self.ssh),
            "https": yes_no(self.https),
            "http": yes_no(self.http),
        })
    }
}

// ── Ethernet interface ───────────────────────────────────────────────

/// How a layer3 interface gets its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AddressAssignment {
    /// Fixed addresses in CIDR form (`10.0.2.10/24`).
    Static { addresses: Vec<String> },
    /// DHCP client, optionally installing the offered default route.
    Dhcp { create_default_route: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetInterface {
    pub name: String,
    #[serde(default)]
    pub mode: NetworkMode,
    pub management_profile: Option<String>,
    pub addressing: Option<AddressAssignment>,
    pub comment: Option<String>,
}

impl EthernetInterface {
    pub fn new(
        name: impl Into<String>,
        mode: NetworkMode,
        addressing: Option<AddressAssignment>,
    ) -> Result<Self, CoreError> {
        let interface = Self {
            name: name.into(),
            mode,
            management_profile: None,
            addressing,
            comment: None,
        };
        interface.validate()?;
        Ok(interface)
    }

    /// Layer3 interface with a DHCP client.
    pub fn dhcp(name: impl Into<String>, create_default_route: bool) -> Result<Self, CoreError> {
        Self::new(
            name,
            NetworkMode::Layer3,
            Some(AddressAssignment::Dhcp {
                create_default_route,
            }),
        )
    }

    pub fn with_management_profile(mut self, profile: impl Into<String>) -> Self {
        self.management_profile = Some(profile.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ObjectKind::Interface, &self.name)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_name(ObjectKind::Interface, &self.name)?;
        let me = self.object_ref();
        let layer3 = self.mode == NetworkMode::Layer3;

        match &self.addressing {
            Some(AddressAssignment::Dhcp { .. }) if !layer3 => {
                return Err(CoreError::validation(format!(
                    "{me}: DHCP requires layer3 mode, not {}",
                    self.mode.as_str()
                )));
            }
            Some(AddressAssignment::Static { addresses }) => {
                if !layer3 {
                    return Err(CoreError::validation(format!(
                        "{me}: static addresses require layer3 mode, not {}",
                        self.mode.as_str()
                    )));
                }
                if let Some(bad) = addresses.iter().find(|a| a.parse::<IpNet>().is_err()) {
                    return Err(CoreError::validation(format!(
                        "{me}: '{bad}' is not an address in CIDR form"
                    )));
                }
            }
            _ => {}
        }

        match self.management_profile.as_deref() {
            Some(profile) if profile.trim().is_empty() => Err(CoreError::validation(format!(
                "{me}: management profile name is empty"
            ))),
            Some(_) if !layer3 => Err(CoreError::validation(format!(
                "{me}: a management profile requires layer3 mode"
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn references(&self, from: &ObjectRef) -> Vec<Reference> {
        self.management_profile
            .iter()
            .map(|p| Reference::new(from, "management_profile", ObjectKind::ManagementProfile, p))
            .collect()
    }

    pub fn to_entry(&self) -> Value {
        let mut mode = Map::new();
        if let Some(profile) = &self.management_profile {
            mode.insert("interface-management-profile".into(), json!(profile));
        }
        match &self.addressing {
            Some(AddressAssignment::Dhcp {
                create_default_route,
            }) => {
                mode.insert(
                    "dhcp-client".into(),
                    json!({
                        "enable": "yes",
                        "create-default-route": yes_no(*create_default_route),
                    }),
                );
            }
            Some(AddressAssignment::Static { addresses }) => {
                let entries: Vec<Value> = addresses.iter().map(|a| json!({ "@name": a })).collect();
                mode.insert("ip".into(), json!({ "entry": entries }));
            }
            None => {}
        }

        let mut entry = Map::new();
        entry.insert("@name".into(), json!(self.name));
        entry.insert(self.mode.as_str().into(), Value::Object(mode));
        if let Some(comment) = &self.comment {
            entry.insert("comment".into(), json!(comment));
        }
        Value::Object(entry)
    }
}

// ── Zone ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    #[serde(default)]
    pub mode: NetworkMode,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

impl Zone {
    pub fn new(
        name: impl Into<String>,
        mode: NetworkMode,
        interfaces: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, CoreError> {
        let zone = Self {
            name: name.into(),
            mode,
            interfaces: interfaces.into_iter().map(Into::into).collect(),
        };
        zone.validate()?;
        Ok(zone)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_name(ObjectKind::Zone, &self.name)?;
        if self.interfaces.iter().any(|i| i.trim().is_empty()) {
            return Err(CoreError::validation(format!(
                "zone '{}' lists an empty interface name",
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn references(&self, from: &ObjectRef) -> Vec<Reference> {
        self.interfaces
            .iter()
            .map(|i| Reference::new(from, "interfaces", ObjectKind::Interface, i))
            .collect()
    }

    pub fn to_entry(&self) -> Value {
        json!({
            "@name": self.name,
            "network": { self.mode.as_str(): members(&self.interfaces) },
        })
    }
}

// ── Virtual router and static routes ─────────────────────────────────

/// Where a static route forwards matching traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum NextHop {
    IpAddress(String),
    NextVr(String),
    Discard,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub name: String,
    /// Destination prefix in CIDR form.
    pub destination: String,
    pub nexthop: NextHop,
    /// Egress interface.
    pub interface: String,
    pub metric: Option<u16>,
}

impl StaticRoute {
    pub fn new(
        name: impl Into<String>,
        destination: impl Into<String>,
        nexthop: NextHop,
        interface: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let route = Self {
            name: name.into(),
            destination: destination.into(),
            nexthop,
            interface: interface.into(),
            metric: None,
        };
        route.validate()?;
        Ok(route)
    }

    pub fn with_metric(mut self, metric: u16) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_name(ObjectKind::StaticRoute, &self.name)?;
        let me = ObjectRef::new(ObjectKind::StaticRoute, &self.name);

        if self.destination.parse::<IpNet>().is_err() {
            return Err(CoreError::validation(format!(
                "{me}: destination '{}' is not a CIDR prefix",
                self.destination
            )));
        }
        match &self.nexthop {
            NextHop::IpAddress(ip) if ip.parse::<IpAddr>().is_err() => {
                return Err(CoreError::validation(format!(
                    "{me}: next hop '{ip}' is not an IP address"
                )));
            }
            NextHop::NextVr(vr) if vr.trim().is_empty() => {
                return Err(CoreError::validation(format!(
                    "{me}: next-vr next hop is empty"
                )));
            }
            _ => {}
        }
        if self.interface.trim().is_empty() {
            return Err(CoreError::validation(format!(
                "{me} requires an egress interface"
            )));
        }
        Ok(())
    }

    pub(crate) fn references(&self, from: &ObjectRef) -> Vec<Reference> {
        let mut refs = vec![Reference::new(
            from,
            "interface",
            ObjectKind::Interface,
            &self.interface,
        )];
        if let NextHop::NextVr(vr) = &self.nexthop {
            refs.push(Reference::new(from, "nexthop", ObjectKind::VirtualRouter, vr));
        }
        refs
    }

    pub fn to_entry(&self) -> Value {
        let nexthop = match &self.nexthop {
            NextHop::IpAddress(ip) => Some(json!({ "ip-address": ip })),
            NextHop::NextVr(vr) => Some(json!({ "next-vr": vr })),
            NextHop::Discard => Some(json!({ "discard": {} })),
            NextHop::None => None,
        };

        let mut entry = Map::new();
        entry.insert("@name".into(), json!(self.name));
        entry.insert("destination".into(), json!(self.destination));
        entry.insert("interface".into(), json!(self.interface));
        if let Some(nexthop) = nexthop {
            entry.insert("nexthop".into(), nexthop);
        }
        if let Some(metric) = self.metric {
            entry.insert("metric".into(), json!(metric));
        }
        Value::Object(entry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualRouter {
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Owned static routes, in declared order.
    #[serde(default)]
    pub routes: Vec<StaticRoute>,
}

impl VirtualRouter {
    pub fn new(
        name: impl Into<String>,
        interfaces: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, CoreError> {
        let vr = Self {
            name: name.into(),
            interfaces: interfaces.into_iter().map(Into::into).collect(),
            routes: Vec::new(),
        };
        vr.validate()?;
        Ok(vr)
    }

    /// Take ownership of a route. Route names are unique per router.
    pub fn add_route(&mut self, route: StaticRoute) -> Result<(), CoreError> {
        route.validate()?;
        if self.routes.iter().any(|r| r.name == route.name) {
            return Err(CoreError::validation(format!(
                "duplicate static-route '{}' in virtual-router '{}'",
                route.name, self.name
            )));
        }
        self.routes.push(route);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_name(ObjectKind::VirtualRouter, &self.name)?;
        if self.interfaces.iter().any(|i| i.trim().is_empty()) {
            return Err(CoreError::validation(format!(
                "virtual-router '{}' lists an empty interface name",
                self.name
            )));
        }
        for (i, route) in self.routes.iter().enumerate() {
            route.validate()?;
            if self.routes[..i].iter().any(|r| r.name == route.name) {
                return Err(CoreError::validation(format!(
                    "duplicate static-route '{}' in virtual-router '{}'",
                    route.name, self.name
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn references(&self, from: &ObjectRef) -> Vec<Reference> {
        self.interfaces
            .iter()
            .map(|i| Reference::new(from, "interfaces", ObjectKind::Interface, i))
            .collect()
    }

    /// Router entry with its routes embedded in the routing table.
    pub fn to_entry(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("@name".into(), json!(self.name));
        entry.insert("interface".into(), members(&self.interfaces));
        if !self.routes.is_empty() {
            let routes: Vec<Value> = self.routes.iter().map(StaticRoute::to_entry).collect();
            entry.insert(
                "routing-table".into(),
                json!({ "ip": { "static-route": { "entry": routes } } }),
            );
        }
        Value::Object(entry)
    }
}
