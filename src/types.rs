//! Value types produced by the report decoder.
//!
//! Every type here is built once by [`crate::parser`] and then only read.
//! The derived views (open/closed ports, addresses of one kind) are computed
//! on demand from the stored collections and never stored twice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Ipv4,
    Ipv6,
    Mac,
}

impl AddressKind {
    /// Maps an `addrtype` attribute value. Unknown kinds yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ipv4" => Some(AddressKind::Ipv4),
            "ipv6" => Some(AddressKind::Ipv6),
            "mac" => Some(AddressKind::Mac),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressKind::Ipv4 => "ipv4",
            AddressKind::Ipv6 => "ipv6",
            AddressKind::Mac => "mac",
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    address: String,
    kind: AddressKind,
    vendor: String,
}

impl Address {
    pub fn new(address: impl Into<String>, kind: AddressKind, vendor: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            kind,
            vendor: vendor.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Empty when the report did not name a vendor.
    pub fn vendor(&self) -> &str {
        &self.vendor
    }
}

/// Addresses of one host, keyed by the address string.
///
/// Inserting an address whose string is already present replaces the stored
/// value in place, so the last occurrence in the document wins while the
/// position of the first occurrence is kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Addresses(Vec<Address>);

impl Addresses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced address, if any.
    pub fn insert(&mut self, address: Address) -> Option<Address> {
        match self.0.iter_mut().find(|a| a.address == address.address) {
            Some(slot) => Some(std::mem::replace(slot, address)),
            None => {
                self.0.push(address);
                None
            }
        }
    }

    pub fn get(&self, address: &str) -> Option<&Address> {
        self.0.iter().find(|a| a.address == address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Address> {
        self.0.iter()
    }

    pub fn of_kind(&self, kind: AddressKind) -> impl Iterator<Item = &Address> {
        self.0.iter().filter(move |a| a.kind == kind)
    }
}

impl FromIterator<Address> for Addresses {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut addresses = Addresses::new();
        for address in iter {
            addresses.insert(address);
        }
        addresses
    }
}

impl<'a> IntoIterator for &'a Addresses {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hostname {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl Hostname {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Origin of the name as reported, e.g. `user` or `PTR`.
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// Service fingerprint of a port. `None` means the report did not say.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    name: Option<String>,
    product: Option<String>,
    version: Option<String>,
}

impl Service {
    pub fn new(name: Option<String>, product: Option<String>, version: Option<String>) -> Self {
        Self { name, product, version }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// Structured output of a script: positional values, a flat key/value map,
/// or named tables of key/value maps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ScriptElements {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Tables(BTreeMap<String, BTreeMap<String, String>>),
}

impl Default for ScriptElements {
    fn default() -> Self {
        ScriptElements::Map(BTreeMap::new())
    }
}

impl ScriptElements {
    pub fn is_empty(&self) -> bool {
        match self {
            ScriptElements::List(values) => values.is_empty(),
            ScriptElements::Map(map) => map.is_empty(),
            ScriptElements::Tables(tables) => tables.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScriptElements::List(values) => values.len(),
            ScriptElements::Map(map) => map.len(),
            ScriptElements::Tables(tables) => tables.len(),
        }
    }

    /// Value of a flat keyed element.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            ScriptElements::Map(map) => map.get(key).map(String::as_str),
            _ => None,
        }
    }

    pub fn table(&self, key: &str) -> Option<&BTreeMap<String, String>> {
        match self {
            ScriptElements::Tables(tables) => tables.get(key),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Script {
    id: String,
    output: String,
    #[serde(default)]
    elements: ScriptElements,
}

impl Script {
    pub fn new(id: impl Into<String>, output: impl Into<String>, elements: ScriptElements) -> Self {
        Self {
            id: id.into(),
            output: output.into(),
            elements,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn elements(&self) -> &ScriptElements {
        &self.elements
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
}

impl PortState {
    /// Only `open` and `closed` resolve; `filtered` and friends do not.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(PortState::Open),
            "closed" => Some(PortState::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    number: u16,
    protocol: String,
    state: PortState,
    service: Service,
    #[serde(default)]
    scripts: Vec<Script>,
}

impl Port {
    pub fn new(number: u16, protocol: impl Into<String>, state: PortState, service: Service) -> Self {
        Self {
            number,
            protocol: protocol.into(),
            state,
            service,
            scripts: Vec::new(),
        }
    }

    /// Attaches the scripts that ran against this port.
    pub fn with_scripts(mut self, scripts: Vec<Script>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == PortState::Closed
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Up,
    Down,
    Unknown,
    Skipped,
}

impl HostState {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(HostState::Up),
            "down" => Some(HostState::Down),
            "unknown" => Some(HostState::Unknown),
            "skipped" => Some(HostState::Skipped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Up => "up",
            HostState::Down => "down",
            HostState::Unknown => "unknown",
            HostState::Skipped => "skipped",
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Host {
    addresses: Addresses,
    state: HostState,
    hostnames: Vec<Hostname>,
    ports: Vec<Port>,
    #[serde(default)]
    scripts: Vec<Script>,
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    os_accuracy: Option<u8>,
}

impl Host {
    pub fn new(
        addresses: Addresses,
        state: HostState,
        hostnames: Vec<Hostname>,
        ports: Vec<Port>,
    ) -> Self {
        Self {
            addresses,
            state,
            hostnames,
            ports,
            scripts: Vec::new(),
            os: None,
            os_accuracy: None,
        }
    }

    /// Attaches host-level scripts.
    pub fn with_scripts(mut self, scripts: Vec<Script>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Records the best OS match. Name and accuracy are kept as reported,
    /// either may be missing.
    pub fn with_os(mut self, name: Option<String>, accuracy: Option<u8>) -> Self {
        self.os = name;
        self.os_accuracy = accuracy;
        self
    }

    pub fn addresses(&self) -> &Addresses {
        &self.addresses
    }

    pub fn ipv4_addresses(&self) -> Vec<&Address> {
        self.addresses.of_kind(AddressKind::Ipv4).collect()
    }

    pub fn ipv6_addresses(&self) -> Vec<&Address> {
        self.addresses.of_kind(AddressKind::Ipv6).collect()
    }

    pub fn mac_addresses(&self) -> Vec<&Address> {
        self.addresses.of_kind(AddressKind::Mac).collect()
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn hostnames(&self) -> &[Hostname] {
        &self.hostnames
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn open_ports(&self) -> Vec<&Port> {
        self.ports.iter().filter(|p| p.is_open()).collect()
    }

    pub fn closed_ports(&self) -> Vec<&Port> {
        self.ports.iter().filter(|p| p.is_closed()).collect()
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn os(&self) -> Option<&str> {
        self.os.as_deref()
    }

    pub fn os_accuracy(&self) -> Option<u8> {
        self.os_accuracy
    }

    /// First address, preferring IPv4, used to label the host.
    pub fn primary_address(&self) -> Option<&Address> {
        self.addresses
            .of_kind(AddressKind::Ipv4)
            .next()
            .or_else(|| self.addresses.of_kind(AddressKind::Ipv6).next())
            .or_else(|| self.addresses.iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(number: u16, state: PortState) -> Port {
        Port::new(number, "tcp", state, Service::default())
    }

    #[test]
    fn test_addresses_overwrite_keeps_first_position() {
        let mut addresses = Addresses::new();
        assert!(addresses.insert(Address::new("10.0.0.1", AddressKind::Ipv4, "")).is_none());
        addresses.insert(Address::new("00:11:22:33:44:55", AddressKind::Mac, "Old"));

        let replaced = addresses.insert(Address::new("10.0.0.1", AddressKind::Ipv4, "Acme"));
        assert_eq!(replaced.map(|a| a.vendor().to_string()), Some(String::new()));

        assert_eq!(addresses.len(), 2);
        let first = addresses.iter().next().unwrap();
        assert_eq!(first.address(), "10.0.0.1");
        assert_eq!(first.vendor(), "Acme");
    }

    #[test]
    fn test_address_partitions_cover_all_addresses() {
        let addresses: Addresses = vec![
            Address::new("10.0.0.1", AddressKind::Ipv4, ""),
            Address::new("fe80::1", AddressKind::Ipv6, ""),
            Address::new("00:C0:49:00:11:22", AddressKind::Mac, "U.S. Robotics"),
        ]
        .into_iter()
        .collect();
        let host = Host::new(addresses, HostState::Up, Vec::new(), Vec::new());

        let ipv4 = host.ipv4_addresses();
        let ipv6 = host.ipv6_addresses();
        let mac = host.mac_addresses();
        assert_eq!(ipv4.len() + ipv6.len() + mac.len(), host.addresses().len());
        assert!(ipv4.iter().all(|a| a.kind() == AddressKind::Ipv4));
        assert!(mac.iter().all(|a| a.kind() == AddressKind::Mac));
        assert_eq!(host.primary_address().map(Address::address), Some("10.0.0.1"));
    }

    #[test]
    fn test_port_partitions_are_disjoint() {
        let ports = vec![
            port(22, PortState::Open),
            port(23, PortState::Closed),
            port(80, PortState::Open),
        ];
        let host = Host::new(Addresses::new(), HostState::Up, Vec::new(), ports);

        let open: Vec<u16> = host.open_ports().iter().map(|p| p.number()).collect();
        let closed: Vec<u16> = host.closed_ports().iter().map(|p| p.number()).collect();
        assert_eq!(open, vec![22, 80]);
        assert_eq!(closed, vec![23]);
        assert_eq!(open.len() + closed.len(), host.ports().len());
    }

    #[test]
    fn test_states_parse() {
        assert_eq!(PortState::parse("open"), Some(PortState::Open));
        assert_eq!(PortState::parse("filtered"), None);
        assert_eq!(HostState::parse("down"), Some(HostState::Down));
        assert_eq!(HostState::parse(""), None);
        assert_eq!(AddressKind::parse("mac"), Some(AddressKind::Mac));
        assert_eq!(AddressKind::parse("ipx"), None);
    }

    #[test]
    fn test_script_elements_accessors() {
        let mut versions = BTreeMap::new();
        versions.insert("min".to_string(), "1".to_string());
        let mut tables = BTreeMap::new();
        tables.insert("versions".to_string(), versions);
        let elements = ScriptElements::Tables(tables);

        assert_eq!(elements.len(), 1);
        assert_eq!(elements.table("versions").and_then(|t| t.get("min")).map(String::as_str), Some("1"));
        assert_eq!(elements.get("versions"), None);
        assert!(ScriptElements::default().is_empty());
    }

    #[test]
    fn test_host_serializes_os_pair() {
        let host = Host::new(Addresses::new(), HostState::Up, Vec::new(), Vec::new())
            .with_os(Some("Linux 2.6".to_string()), Some(93));
        let json = serde_json::to_value(&host).unwrap();
        assert_eq!(json["os"], "Linux 2.6");
        assert_eq!(json["os_accuracy"], 93);
        assert_eq!(json["state"], "up");
    }
}
