// ── Run inputs ──
//
// The values an apply run needs from the infrastructure stage, resolved
// and checked before anything touches the device.

use std::net::IpAddr;

use secrecy::SecretString;
use tracing::debug;

use crate::derive::first_usable_host;
use crate::error::CoreError;
use crate::state::StateProvider;

/// State keys an apply run requires.
pub mod keys {
    pub const MGMT_PUBLIC_IP: &str = "vmseries_mgmt_public_ip";
    pub const UNTRUST_SUBNET_CIDR: &str = "untrust_subnet_cidr";
    pub const UNTRUST_PRIVATE_IP: &str = "vmseries_untrust_private_ip";
    pub const TESTER_PRIVATE_IP: &str = "ubuntu_tester_private_ip";
    pub const ADMIN_PASSWORD: &str = "admin_password";

    /// Every required key, in resolution order.
    pub const REQUIRED: [&str; 5] = [
        MGMT_PUBLIC_IP,
        UNTRUST_SUBNET_CIDR,
        UNTRUST_PRIVATE_IP,
        TESTER_PRIVATE_IP,
        ADMIN_PASSWORD,
    ];
}

/// Resolved, validated run inputs.
#[derive(Debug, Clone)]
pub struct DeviceInputs {
    /// Management address (IP or host; may carry a scheme).
    pub mgmt_address: String,
    pub untrust_subnet: String,
    /// Firewall's private address on the untrust subnet.
    pub untrust_private_ip: IpAddr,
    /// Private address of the host behind the trust zone.
    pub tester_private_ip: IpAddr,
    pub admin_password: SecretString,
    /// First usable host of the untrust subnet.
    pub untrust_gateway: IpAddr,
}

impl DeviceInputs {
    /// Resolve every required key, failing on the first one missing.
    pub fn resolve(provider: &dyn StateProvider) -> Result<Self, CoreError> {
        for key in keys::REQUIRED {
            provider.require(key)?;
        }

        let mgmt_address = provider.require_str(keys::MGMT_PUBLIC_IP)?;
        let untrust_subnet = provider.require_str(keys::UNTRUST_SUBNET_CIDR)?;
        let untrust_private_ip = parse_ip(provider, keys::UNTRUST_PRIVATE_IP)?;
        let tester_private_ip = parse_ip(provider, keys::TESTER_PRIVATE_IP)?;
        let admin_password = SecretString::from(provider.require_str(keys::ADMIN_PASSWORD)?);
        let untrust_gateway = first_usable_host(&untrust_subnet)?;

        debug!(
            source = provider.source(),
            mgmt = %mgmt_address,
            gateway = %untrust_gateway,
            "inputs resolved"
        );

        Ok(Self {
            mgmt_address,
            untrust_subnet,
            untrust_private_ip,
            tester_private_ip,
            admin_password,
            untrust_gateway,
        })
    }
}

fn parse_ip(provider: &dyn StateProvider, key: &str) -> Result<IpAddr, CoreError> {
    let raw = provider.require_str(key)?;
    raw.parse().map_err(|e| CoreError::InvalidInput {
        key: key.to_owned(),
        reason: format!("'{raw}' is not an IP address: {e}"),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::state::StaticState;

    pub(crate) fn sample_state() -> StaticState {
        StaticState::from_pairs(
            "test",
            [
                (keys::MGMT_PUBLIC_IP, "203.0.113.10"),
                (keys::UNTRUST_SUBNET_CIDR, "10.0.1.0/24"),
                (keys::UNTRUST_PRIVATE_IP, "10.0.1.10"),
                (keys::TESTER_PRIVATE_IP, "10.0.2.20"),
                (keys::ADMIN_PASSWORD, "s3cret"),
            ],
        )
    }

    #[test]
    fn resolves_and_derives_gateway() {
        let inputs = DeviceInputs::resolve(&sample_state()).unwrap();
        assert_eq!(inputs.untrust_gateway.to_string(), "10.0.1.1");
        assert_eq!(inputs.tester_private_ip.to_string(), "10.0.2.20");
        assert_eq!(inputs.admin_password.expose_secret(), "s3cret");
    }

    #[test]
    fn missing_password_is_named() {
        let mut state = StaticState::new("test");
        for key in &keys::REQUIRED[..4] {
            state.insert(*key, "10.0.1.0/24");
        }
        let err = DeviceInputs::resolve(&state).unwrap_err();
        assert!(
            matches!(err, CoreError::InputMissing { ref key, .. } if key == keys::ADMIN_PASSWORD),
            "{err:?}"
        );
    }

    #[test]
    fn first_missing_key_wins() {
        let err = DeviceInputs::resolve(&StaticState::new("empty")).unwrap_err();
        assert!(
            matches!(err, CoreError::InputMissing { ref key, .. } if key == keys::MGMT_PUBLIC_IP),
            "{err:?}"
        );
    }

    #[test]
    fn private_ip_must_parse() {
        let mut state = sample_state();
        state.insert(keys::TESTER_PRIVATE_IP, "ubuntu-tester");
        let err = DeviceInputs::resolve(&state).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }), "{err:?}");
    }
}
