//! Conversion of /etc/network/interfaces text into a version 1 network
//! configuration.

use ipnet::IpNet;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use tracing::warn;

use crate::errors::Error;

#[derive(Debug, Default)]
struct Stanza {
    name: String,
    method: String,
    address: Option<String>,
    netmask: Option<String>,
    gateway: Option<String>,
    broadcast: Option<String>,
    hwaddress: Option<String>,
    mtu: Option<u32>,
    nameservers: Vec<String>,
    search: Vec<String>,
}

enum Current {
    Nothing,
    Iface(usize),
    Ignored,
}

/// Logical lines with comments dropped and `\` continuations joined.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    for raw in text.lines() {
        let line = raw.trim();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#')) {
            continue;
        }
        match line.strip_suffix('\\') {
            Some(head) => {
                pending.push_str(head);
                pending.push(' ');
            }
            None => {
                pending.push_str(line);
                lines.push(std::mem::take(&mut pending));
            }
        }
    }
    if !pending.trim().is_empty() {
        lines.push(pending);
    }
    lines
}

fn validate_address(address: &str) -> Result<(), Error> {
    if address.contains('/') {
        address.parse::<IpNet>()?;
    } else {
        address
            .parse::<std::net::IpAddr>()
            .map_err(|_| Error::EniConversion(format!("invalid address {}", address)))?;
    }
    Ok(())
}

fn validate_netmask(netmask: &str) -> Result<(), Error> {
    let invalid = || Error::EniConversion(format!("invalid netmask {}", netmask));
    // inet6 stanzas give the prefix length directly
    if let Ok(prefix) = netmask.parse::<u8>() {
        return if prefix <= 128 { Ok(()) } else { Err(invalid()) };
    }
    let bits = u32::from(netmask.parse::<Ipv4Addr>().map_err(|_| invalid())?);
    if bits.leading_ones() == bits.count_ones() {
        Ok(())
    } else {
        Err(invalid())
    }
}

fn set_option(stanza: &mut Stanza, option: &str, args: &[&str]) -> Result<(), Error> {
    let value = args.join(" ");
    match option {
        "address" => {
            validate_address(&value)?;
            stanza.address = Some(value);
        }
        "netmask" => {
            validate_netmask(&value)?;
            stanza.netmask = Some(value);
        }
        "gateway" => stanza.gateway = Some(value),
        "broadcast" => stanza.broadcast = Some(value),
        "hwaddress" => {
            // "hwaddress ether 00:11:22:33:44:55" or just the address
            let mac = match args {
                ["ether", mac, ..] => mac,
                [mac, ..] => mac,
                [] => return Err(Error::EniConversion("empty hwaddress".into())),
            };
            stanza.hwaddress = Some(mac.to_lowercase());
        }
        "mtu" => {
            let mtu = value
                .parse()
                .map_err(|_| Error::EniConversion(format!("invalid mtu {}", value)))?;
            stanza.mtu = Some(mtu);
        }
        "dns-nameservers" => stanza.nameservers.extend(args.iter().map(|s| s.to_string())),
        "dns-search" => stanza.search.extend(args.iter().map(|s| s.to_string())),
        _ => {}
    }
    Ok(())
}

fn parse(text: &str) -> Result<(Vec<Stanza>, BTreeSet<String>), Error> {
    let mut stanzas: Vec<Stanza> = Vec::new();
    let mut auto = BTreeSet::new();
    let mut current = Current::Nothing;

    for line in logical_lines(text) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&keyword, args)) = tokens.split_first() else {
            continue;
        };
        match keyword {
            "auto" | "allow-auto" | "allow-hotplug" => {
                auto.extend(args.iter().map(|s| s.to_string()));
                current = Current::Nothing;
            }
            "iface" => {
                let [name, family, method, ..] = args else {
                    return Err(Error::EniConversion(format!("incomplete stanza '{}'", line)));
                };
                if *family != "inet" && *family != "inet6" {
                    return Err(Error::EniConversion(format!(
                        "unsupported address family {} for {}",
                        family, name
                    )));
                }
                stanzas.push(Stanza {
                    name: name.to_string(),
                    method: method.to_string(),
                    ..Stanza::default()
                });
                current = Current::Iface(stanzas.len() - 1);
            }
            "source" | "source-directory" | "mapping" => {
                warn!("network-interfaces: skipping '{}'", line);
                current = Current::Ignored;
            }
            option => match current {
                Current::Iface(index) => set_option(&mut stanzas[index], option, args)?,
                Current::Ignored => {}
                Current::Nothing => {
                    return Err(Error::EniConversion(format!(
                        "option {} outside of an iface stanza",
                        option
                    )));
                }
            },
        }
    }
    Ok((stanzas, auto))
}

fn build_subnet(stanza: &Stanza, auto: bool) -> Result<Value, Error> {
    let mut subnet = Map::new();
    subnet.insert("type".into(), json!(stanza.method));
    let control = if auto { "auto" } else { "manual" };
    subnet.insert("control".into(), json!(control));
    if stanza.method == "static" {
        let address = stanza.address.as_ref().ok_or_else(|| {
            Error::EniConversion(format!("static stanza {} has no address", stanza.name))
        })?;
        subnet.insert("address".into(), json!(address));
    }
    let copied = [
        ("netmask", &stanza.netmask),
        ("gateway", &stanza.gateway),
        ("broadcast", &stanza.broadcast),
    ];
    for (key, value) in copied {
        if let Some(value) = value {
            subnet.insert(key.into(), json!(value));
        }
    }
    if !stanza.nameservers.is_empty() {
        subnet.insert("dns_nameservers".into(), json!(stanza.nameservers));
    }
    if !stanza.search.is_empty() {
        subnet.insert("dns_search".into(), json!(stanza.search));
    }
    Ok(Value::Object(subnet))
}

pub fn convert(text: &str) -> Result<Value, Error> {
    let (stanzas, auto) = parse(text)?;

    // Aliases like eth0:1 become additional subnets of eth0
    let mut devices: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();
    for stanza in &stanzas {
        let device_name = stanza.name.split(':').next().unwrap_or(&stanza.name);
        let device = devices.entry(device_name).or_insert_with(|| {
            let mut device = Map::new();
            device.insert("type".into(), json!("physical"));
            device.insert("name".into(), json!(device_name));
            device.insert("subnets".into(), json!([]));
            device
        });
        if let Some(mac) = &stanza.hwaddress {
            device.insert("mac_address".into(), json!(mac));
        }
        if let Some(mtu) = stanza.mtu {
            device.insert("mtu".into(), json!(mtu));
        }
        let subnet = build_subnet(stanza, auto.contains(&stanza.name))?;
        if let Some(Value::Array(subnets)) = device.get_mut("subnets") {
            subnets.push(subnet);
        }
    }

    let config: Vec<Value> = devices.into_values().map(Value::Object).collect();
    Ok(json!({"version": 1, "config": config}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_dhcp_interface() {
        let config = convert("iface eth0 inet dhcp").unwrap();
        assert_eq!(
            config,
            json!({
                "version": 1,
                "config": [{
                    "type": "physical",
                    "name": "eth0",
                    "subnets": [{"type": "dhcp", "control": "manual"}],
                }],
            })
        );
    }

    #[test]
    fn static_interface_with_dns() {
        let text = r#"
# The primary network interface
auto lo
iface lo inet loopback

auto ens192
iface ens192 inet static
    address 192.168.10.20
    netmask 255.255.255.0
    gateway 192.168.10.1
    hwaddress ether 00:50:56:AB:CD:EF
    mtu 9000
    dns-nameservers 192.168.10.2 \
        192.168.10.3
    dns-search example.com
"#;
        let config = convert(text).unwrap();
        assert_eq!(
            config,
            json!({
                "version": 1,
                "config": [
                    {
                        "type": "physical",
                        "name": "ens192",
                        "subnets": [{
                            "type": "static",
                            "control": "auto",
                            "address": "192.168.10.20",
                            "netmask": "255.255.255.0",
                            "gateway": "192.168.10.1",
                            "dns_nameservers": ["192.168.10.2", "192.168.10.3"],
                            "dns_search": ["example.com"],
                        }],
                        "mac_address": "00:50:56:ab:cd:ef",
                        "mtu": 9000,
                    },
                    {
                        "type": "physical",
                        "name": "lo",
                        "subnets": [{"type": "loopback", "control": "auto"}],
                    },
                ],
            })
        );
    }

    #[test]
    fn aliases_and_families_share_a_device() {
        let text = "auto eth0\n\
                    iface eth0 inet static\n  address 10.0.0.5/24\n\
                    iface eth0:1 inet static\n  address 10.0.1.5/24\n\
                    iface eth0 inet6 dhcp\n";
        let config = convert(text).unwrap();
        let subnets = config["config"][0]["subnets"].as_array().unwrap();
        assert_eq!(config["config"].as_array().unwrap().len(), 1);
        assert_eq!(subnets.len(), 3);
        assert_eq!(subnets[0]["address"], json!("10.0.0.5/24"));
        assert_eq!(subnets[1]["control"], json!("manual"));
        assert_eq!(subnets[2]["type"], json!("dhcp"));
    }

    #[test]
    fn source_directives_are_skipped() {
        let text = "source /etc/network/interfaces.d/*\niface eth0 inet dhcp\n";
        let config = convert(text).unwrap();
        assert_eq!(config["config"][0]["name"], json!("eth0"));
    }

    #[test]
    fn empty_text_has_no_devices() {
        assert_eq!(convert("\n# nothing\n").unwrap(), json!({"version": 1, "config": []}));
    }

    #[test]
    fn conversion_errors() {
        let cases = [
            "address 10.0.0.1",
            "iface eth0 inet",
            "iface eth0 ipx static",
            "iface eth0 inet static\n  address 10.0.0.300",
            "iface eth0 inet static\n  address 10.0.0.1\n  netmask 255.0.255.0",
            "iface eth0 inet static\n  gateway 10.0.0.1",
            "iface eth0 inet dhcp\n  mtu big",
        ];
        for case in cases {
            assert!(convert(case).is_err(), "expected error for {:?}", case);
        }
        assert!(matches!(
            convert("iface eth0 inet static\n  address 10.0.0.1/99"),
            Err(Error::ParseNetwork(_))
        ));
    }
}
