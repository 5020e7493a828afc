// ── Two-zone topology ──
//
// The firewall layout applied to a freshly deployed VM-Series: an untrust
// interface facing the internet, a trust interface facing the tester
// host, and the NAT and security rules between them.

use crate::error::CoreError;
use crate::inputs::DeviceInputs;
use crate::model::{
    ConfigObject, EthernetInterface, InspectionProfiles, ManagementProfile, NatRule, NetworkMode,
    NextHop, Rule, RuleAction, Rulebase, SecurityRule, SourceTranslation, StaticRoute,
    VirtualRouter, Zone,
};

pub const PING_PROFILE: &str = "allow-ping";
pub const UNTRUST_INTERFACE: &str = "ethernet1/1";
pub const TRUST_INTERFACE: &str = "ethernet1/2";
pub const UNTRUST_ZONE: &str = "untrust";
pub const TRUST_ZONE: &str = "trust";
pub const VIRTUAL_ROUTER: &str = "default";
pub const DEFAULT_ROUTE: &str = "default-out";
pub const RULEBASE: &str = "rulebase";

/// Top-level objects of the two-zone layout, children attached.
///
/// Declared zones-before-interfaces; the graph puts them in creation order.
pub fn two_zone(inputs: &DeviceInputs) -> Result<Vec<ConfigObject>, CoreError> {
    let fw_untrust_ip = inputs.untrust_private_ip.to_string();

    let allow_ping = ManagementProfile::new(PING_PROFILE)?.ping(true);

    let untrust_zone = Zone::new(UNTRUST_ZONE, NetworkMode::Layer3, [UNTRUST_INTERFACE])?;
    let trust_zone = Zone::new(TRUST_ZONE, NetworkMode::Layer3, [TRUST_INTERFACE])?;

    let eth1 = EthernetInterface::dhcp(UNTRUST_INTERFACE, true)?.with_management_profile(PING_PROFILE);
    let eth2 = EthernetInterface::dhcp(TRUST_INTERFACE, false)?.with_management_profile(PING_PROFILE);

    let mut vr = VirtualRouter::new(VIRTUAL_ROUTER, [UNTRUST_INTERFACE, TRUST_INTERFACE])?;
    vr.add_route(StaticRoute::new(
        DEFAULT_ROUTE,
        "0.0.0.0/0",
        NextHop::IpAddress(inputs.untrust_gateway.to_string()),
        UNTRUST_INTERFACE,
    )?)?;

    let mut rulebase = Rulebase::new(RULEBASE)?;
    rulebase.add(Rule::Nat(
        NatRule::new("NAT2Ubuntu", [UNTRUST_ZONE], [UNTRUST_ZONE])?
            .destinations([fw_untrust_ip.as_str()])
            .destination_translation(inputs.tester_private_ip.to_string(), None),
    ))?;
    rulebase.add(Rule::Nat(
        NatRule::new("NAT2External", [TRUST_ZONE], [UNTRUST_ZONE])?.source_translation(
            SourceTranslation::TranslatedAddress {
                addresses: vec![fw_untrust_ip.clone()],
            },
        ),
    ))?;
    rulebase.add(Rule::Security(
        SecurityRule::new("AllowManagement", [UNTRUST_ZONE], [TRUST_ZONE], RuleAction::Allow)?
            .destinations([fw_untrust_ip.as_str()])
            .applications(["ping", "ssh"])
            .logging(false, true),
    ))?;
    rulebase.add(Rule::Security(
        SecurityRule::new("AllowExternal", [TRUST_ZONE], [UNTRUST_ZONE], RuleAction::Allow)?
            .logging(false, true)
            .with_profiles(InspectionProfiles::defaults()),
    ))?;

    Ok(vec![
        allow_ping.into(),
        untrust_zone.into(),
        trust_zone.into(),
        eth1.into(),
        eth2.into(),
        vr.into(),
        rulebase.into(),
    ])
}
