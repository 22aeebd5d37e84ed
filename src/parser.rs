//! Decoder for nmap XML reports (`-oX`).
//!
//! Each `parse_*` function handles one sub-tree shape and they compose
//! bottom-up into the host list. Decoding is best-effort per record: an element
//! missing an attribute it cannot do without is skipped (or, for hosts without
//! a status and ports without a resolvable state, dropped entirely) instead of
//! failing the document. The one hard failure is a script that claims to carry
//! structured output but exposes neither `<elem>` nor `<table>` children.

use crate::types::{
    Address, AddressKind, Addresses, Host, HostState, Hostname, Port, PortState, Script,
    ScriptElements, Service,
};
use crate::{Result, ScanError};
use log::{debug, warn};
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::BTreeMap;
use std::path::Path;

/// Records removed from the output because they could not be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub hosts_dropped: usize,
    pub ports_dropped: usize,
}

impl DecodeStats {
    pub fn is_clean(&self) -> bool {
        self.hosts_dropped == 0 && self.ports_dropped == 0
    }
}

/// Reads and decodes a report file.
pub fn parse_output_file<P: AsRef<Path>>(path: P) -> Result<Vec<Host>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ScanError::ReportNotFound(path.to_path_buf()));
    }

    debug!("Parsing report {}", path.display());
    let xml = std::fs::read_to_string(path)?;
    parse_str(&xml)
}

pub fn parse_str(xml: &str) -> Result<Vec<Host>> {
    let document = tokenize(xml)?;
    parse_document(&document)
}

/// Tokenizes report text. Reports carry a `<!DOCTYPE nmaprun>` declaration,
/// so DTDs must be allowed.
pub fn tokenize(xml: &str) -> Result<Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(xml, options)?)
}

pub fn parse_document(document: &Document<'_>) -> Result<Vec<Host>> {
    parse_document_with_stats(document).map(|(hosts, _)| hosts)
}

/// Decodes every `<host>` of the document in order.
pub fn parse_document_with_stats(document: &Document<'_>) -> Result<(Vec<Host>, DecodeStats)> {
    let mut stats = DecodeStats::default();
    let mut hosts = Vec::new();

    for node in children(document.root_element(), "host") {
        match decode_host(node, &mut stats)? {
            Some(host) => hosts.push(host),
            None => stats.hosts_dropped += 1,
        }
    }

    if !stats.is_clean() {
        warn!(
            "Dropped {} hosts and {} ports that could not be decoded",
            stats.hosts_dropped, stats.ports_dropped
        );
    }
    debug!("Decoded {} hosts", hosts.len());

    Ok((hosts, stats))
}

/// Decodes a single `<host>` element. `Ok(None)` means the host has no usable
/// status and was left out.
pub fn parse_host(node: Node<'_, '_>) -> Result<Option<Host>> {
    decode_host(node, &mut DecodeStats::default())
}

fn decode_host(node: Node<'_, '_>, stats: &mut DecodeStats) -> Result<Option<Host>> {
    let Some(state) = child(node, "status").and_then(|status| required(status, "state")) else {
        debug!("Dropping host without status");
        return Ok(None);
    };
    let Some(state) = HostState::parse(state) else {
        debug!("Dropping host with unrecognised state `{}`", state);
        return Ok(None);
    };

    let addresses = parse_addresses(node);
    let hostnames = child(node, "hostnames").map(parse_hostnames).unwrap_or_default();
    let ports = match child(node, "ports") {
        Some(ports) => decode_ports(ports, stats)?,
        None => Vec::new(),
    };

    let mut host = Host::new(addresses, state, hostnames, ports);

    if let Some(hostscript) = child(node, "hostscript") {
        host = host.with_scripts(parse_scripts(hostscript)?);
    }
    if let Some(osmatch) = child(node, "os").and_then(|os| child(os, "osmatch")) {
        let (name, accuracy) = parse_os_match(osmatch);
        host = host.with_os(name, accuracy);
    }

    Ok(Some(host))
}

/// Collects the `<address>` children of a host, keyed by address string.
pub fn parse_addresses(host: Node<'_, '_>) -> Addresses {
    let mut addresses = Addresses::new();

    for node in children(host, "address") {
        let Some(addr) = required(node, "addr") else { continue };
        let kind = match node.attribute("addrtype") {
            Some(value) => match AddressKind::parse(value) {
                Some(kind) => kind,
                None => {
                    debug!("Skipping address {} of unknown type `{}`", addr, value);
                    continue;
                }
            },
            None => AddressKind::Ipv4,
        };
        let vendor = node.attribute("vendor").unwrap_or_default();

        if addresses.insert(Address::new(addr, kind, vendor)).is_some() {
            debug!("Address {} listed twice, keeping the later entry", addr);
        }
    }

    addresses
}

pub fn parse_hostnames(hostnames: Node<'_, '_>) -> Vec<Hostname> {
    children(hostnames, "hostname")
        .filter_map(|node| {
            let name = required(node, "name")?;
            let kind = required(node, "type")?;
            Some(Hostname::new(name, kind))
        })
        .collect()
}

/// Decodes the `<port>` children of a `<ports>` element.
pub fn parse_ports(ports: Node<'_, '_>) -> Result<Vec<Port>> {
    decode_ports(ports, &mut DecodeStats::default())
}

fn decode_ports(ports: Node<'_, '_>, stats: &mut DecodeStats) -> Result<Vec<Port>> {
    let mut decoded = Vec::new();

    for node in children(ports, "port") {
        let service = child(node, "service").map(parse_service).unwrap_or_default();

        let Some(state) = child(node, "state").and_then(|state| required(state, "state")) else {
            debug!("Dropping port without state");
            stats.ports_dropped += 1;
            continue;
        };
        let Some(state) = PortState::parse(state) else {
            debug!("Dropping port in unresolvable state `{}`", state);
            stats.ports_dropped += 1;
            continue;
        };
        let Some(number) = required(node, "portid").and_then(|id| id.parse::<u16>().ok()) else {
            debug!("Dropping port with missing or invalid portid");
            stats.ports_dropped += 1;
            continue;
        };
        let protocol = node.attribute("protocol").unwrap_or_default();

        let mut port = Port::new(number, protocol, state, service);
        if child(node, "script").is_some() {
            port = port.with_scripts(parse_scripts(node)?);
        }
        decoded.push(port);
    }

    Ok(decoded)
}

pub fn parse_service(service: Node<'_, '_>) -> Service {
    let owned = |name: &str| service.attribute(name).map(str::to_string);
    Service::new(owned("name"), owned("product"), owned("version"))
}

/// Decodes the `<script>` children of a port or `<hostscript>` element.
pub fn parse_scripts(parent: Node<'_, '_>) -> Result<Vec<Script>> {
    let mut scripts = Vec::new();

    for node in children(parent, "script") {
        let Some(id) = required(node, "id") else { continue };
        let Some(output) = required(node, "output") else { continue };

        let elements = if child(node, "elem").is_some() || child(node, "table").is_some() {
            parse_script_elements(node)?
        } else {
            ScriptElements::default()
        };
        scripts.push(Script::new(id, output, elements));
    }

    Ok(scripts)
}

/// Decodes the structured output of one `<script>` element.
///
/// Tables take precedence: when the script has `<table>` children only those
/// are read, each keyed by its `key` attribute. Otherwise the script's own
/// `<elem>` children become a positional list, or a key/value map when any of
/// them is keyed. In a map, unkeyed elements take the next free integer index
/// (`"0"`, `"1"`, ...).
pub fn parse_script_elements(script: Node<'_, '_>) -> Result<ScriptElements> {
    if child(script, "table").is_some() {
        let mut tables = BTreeMap::new();
        for table in children(script, "table") {
            let Some(key) = required(table, "key") else { continue };
            if child(table, "elem").is_none() {
                debug!("Skipping table `{}` without elements", key);
                continue;
            }
            tables.insert(key.to_string(), collect_elems(table).entries);
        }
        return Ok(ScriptElements::Tables(tables));
    }

    if child(script, "elem").is_none() {
        let id = script.attribute("id").unwrap_or_default();
        return Err(ScanError::MalformedScript { id: id.to_string() });
    }

    let elems = collect_elems(script);
    if elems.has_keys {
        Ok(ScriptElements::Map(elems.entries))
    } else {
        Ok(ScriptElements::List(elems.positional))
    }
}

pub fn parse_os_match(osmatch: Node<'_, '_>) -> (Option<String>, Option<u8>) {
    let name = osmatch.attribute("name").map(str::to_string);
    let accuracy = osmatch.attribute("accuracy").and_then(|value| {
        let accuracy = value.parse::<u8>().ok().filter(|a| *a <= 100);
        if accuracy.is_none() {
            debug!("Ignoring OS accuracy `{}`", value);
        }
        accuracy
    });
    (name, accuracy)
}

#[derive(Default)]
struct ElemSet {
    positional: Vec<String>,
    /// Every decoded element, unkeyed ones under their index.
    entries: BTreeMap<String, String>,
    has_keys: bool,
}

fn collect_elems(parent: Node<'_, '_>) -> ElemSet {
    let mut elems = ElemSet::default();
    let mut next_index = 0usize;

    for elem in children(parent, "elem") {
        let text = elem.text().unwrap_or_default().to_string();
        if elem.attributes().next().is_none() {
            elems.entries.insert(next_index.to_string(), text.clone());
            elems.positional.push(text);
            next_index += 1;
        } else if let Some(key) = elem.attribute("key") {
            // Integer keys move the next free index past them.
            if let Ok(index) = key.parse::<usize>() {
                next_index = next_index.max(index.saturating_add(1));
            }
            elems.entries.insert(key.to_string(), text);
            elems.has_keys = true;
        } else {
            debug!("Skipping <elem> without key");
        }
    }

    elems
}

/// Looks up an attribute the element cannot be decoded without. `None` tells
/// the caller to skip the element.
fn required<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    let value = node.attribute(name);
    if value.is_none() {
        debug!("Skipping <{}> without `{}`", node.tag_name().name(), name);
    }
    value
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn children<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |n| n.has_tag_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(hosts: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<!DOCTYPE nmaprun>\n<nmaprun scanner=\"nmap\">{}</nmaprun>",
            hosts
        )
    }

    fn single_host(body: &str) -> Host {
        let hosts = parse_str(&report(&format!("<host>{}</host>", body))).unwrap();
        assert_eq!(hosts.len(), 1);
        hosts.into_iter().next().unwrap()
    }

    const UP: &str = r#"<status state="up" reason="syn-ack"/>"#;

    #[test]
    fn test_host_without_status_is_dropped() {
        let xml = report(&format!(
            r#"<host><address addr="10.0.0.1" addrtype="ipv4"/></host>
               <host>{UP}<address addr="10.0.0.2" addrtype="ipv4"/></host>
               <host><status reason="no-response"/></host>"#
        ));
        let document = tokenize(&xml).unwrap();
        let (hosts, stats) = parse_document_with_stats(&document).unwrap();

        assert_eq!(hosts.len(), 1);
        assert!(hosts[0].addresses().contains("10.0.0.2"));
        assert_eq!(stats.hosts_dropped, 2);
    }

    #[test]
    fn test_hosts_keep_document_order() {
        let xml = report(&format!(
            r#"<host>{UP}<address addr="10.0.0.3"/></host>
               <host><status state="down"/><address addr="10.0.0.1"/></host>"#
        ));
        let hosts = parse_str(&xml).unwrap();
        assert_eq!(hosts[0].primary_address().unwrap().address(), "10.0.0.3");
        assert_eq!(hosts[1].state(), HostState::Down);
    }

    #[test]
    fn test_duplicate_addresses_last_wins() {
        let host = single_host(&format!(
            r#"{UP}
               <address addr="00:C0:49:00:11:22" addrtype="mac"/>
               <address addr="10.0.0.1" addrtype="ipv4"/>
               <address addr="00:C0:49:00:11:22" addrtype="mac" vendor="U.S. Robotics"/>
               <address addrtype="ipv4"/>"#
        ));

        assert_eq!(host.addresses().len(), 2);
        let mac = host.mac_addresses();
        assert_eq!(mac.len(), 1);
        assert_eq!(mac[0].vendor(), "U.S. Robotics");
        assert_eq!(host.ipv4_addresses()[0].vendor(), "");
    }

    #[test]
    fn test_address_type_defaults_and_unknowns() {
        let host = single_host(&format!(
            r#"{UP}<address addr="10.0.0.1"/><address addr="x" addrtype="ipx"/><address addr="::1" addrtype="ipv6"/>"#
        ));
        assert_eq!(host.ipv4_addresses().len(), 1);
        assert_eq!(host.ipv6_addresses().len(), 1);
        assert!(!host.addresses().contains("x"));
    }

    #[test]
    fn test_hostnames_missing_attributes_are_skipped() {
        let host = single_host(&format!(
            r#"{UP}<hostnames>
                 <hostname name="williamdurand.fr" type="user"/>
                 <hostname name="no-type.example"/>
                 <hostname type="PTR"/>
                 <hostname name="pages.github.com" type="PTR"/>
               </hostnames>"#
        ));
        let names: Vec<(&str, &str)> = host.hostnames().iter().map(|h| (h.name(), h.kind())).collect();
        assert_eq!(names, vec![("williamdurand.fr", "user"), ("pages.github.com", "PTR")]);
    }

    #[test]
    fn test_absent_subtrees_are_empty() {
        let host = single_host(UP);
        assert!(host.hostnames().is_empty());
        assert!(host.ports().is_empty());
        assert!(host.scripts().is_empty());
        assert_eq!(host.os(), None);
        assert_eq!(host.os_accuracy(), None);
    }

    #[test]
    fn test_ports_without_resolvable_state_are_dropped() {
        let xml = report(&format!(
            r#"<host>{UP}<ports>
                 <port protocol="tcp" portid="22"><state state="open"/><service name="ssh"/></port>
                 <port protocol="tcp" portid="23"><service name="telnet"/></port>
                 <port protocol="tcp" portid="25"><state reason="reset"/></port>
                 <port protocol="tcp" portid="80"><state state="filtered"/></port>
                 <port protocol="tcp" portid="113"><state state="closed"/></port>
                 <port protocol="tcp" portid="99999"><state state="open"/></port>
               </ports></host>"#
        ));
        let document = tokenize(&xml).unwrap();
        let (hosts, stats) = parse_document_with_stats(&document).unwrap();
        let host = &hosts[0];

        let numbers: Vec<u16> = host.ports().iter().map(|p| p.number()).collect();
        assert_eq!(numbers, vec![22, 113]);
        assert_eq!(host.open_ports().len() + host.closed_ports().len(), host.ports().len());
        assert_eq!(stats.ports_dropped, 4);
    }

    #[test]
    fn test_service_fields_are_independent() {
        let host = single_host(&format!(
            r#"{UP}<ports>
                 <port protocol="tcp" portid="22"><state state="open"/>
                   <service name="ssh" product="OpenSSH" version="5.1p1 Debian 5github8"/></port>
                 <port protocol="tcp" portid="80"><state state="open"/><service name="http" product="nginx"/></port>
                 <port protocol="udp" portid="53"><state state="open"/></port>
               </ports>"#
        ));
        let ports = host.ports();
        assert_eq!(ports[0].service().version(), Some("5.1p1 Debian 5github8"));
        assert_eq!(ports[1].service().product(), Some("nginx"));
        assert_eq!(ports[1].service().version(), None);
        assert_eq!(ports[2].protocol(), "udp");
        assert_eq!(ports[2].service(), &Service::default());
    }

    #[test]
    fn test_os_match_name_and_accuracy() {
        let host = single_host(&format!(
            r#"{UP}<os><osmatch name="Cisco SRP 521W WAP (Linux 2.6)" accuracy="93" line="1"/>
                       <osmatch name="Other" accuracy="90"/></os>"#
        ));
        assert_eq!(host.os(), Some("Cisco SRP 521W WAP (Linux 2.6)"));
        assert_eq!(host.os_accuracy(), Some(93));
    }

    #[test]
    fn test_os_fields_set_independently() {
        let name_only = single_host(&format!(r#"{UP}<os><osmatch name="Linux"/></os>"#));
        assert_eq!(name_only.os(), Some("Linux"));
        assert_eq!(name_only.os_accuracy(), None);

        let bad_accuracy = single_host(&format!(r#"{UP}<os><osmatch name="Linux" accuracy="140"/></os>"#));
        assert_eq!(bad_accuracy.os_accuracy(), None);

        let no_match = single_host(&format!(r#"{UP}<os><portused state="open"/></os>"#));
        assert_eq!(no_match.os(), None);
    }

    #[test]
    fn test_script_tables() {
        let host = single_host(&format!(
            r#"{UP}<ports><port protocol="tcp" portid="443"><state state="open"/>
                 <script id="ssl-enum" output="TLS">
                   <table key="versions"><elem key="min">TLSv1.0</elem><elem key="max">TLSv1.2</elem></table>
                   <table key="empty"></table>
                   <table><elem key="lost">x</elem></table>
                 </script>
               </port></ports>"#
        ));
        let script = &host.ports()[0].scripts()[0];
        assert_eq!(script.id(), "ssl-enum");

        let elements = script.elements();
        assert_eq!(elements.len(), 1);
        let versions = elements.table("versions").unwrap();
        assert_eq!(versions.get("min").map(String::as_str), Some("TLSv1.0"));
        assert_eq!(versions.get("max").map(String::as_str), Some("TLSv1.2"));
    }

    #[test]
    fn test_script_flat_elements() {
        let host = single_host(&format!(
            r#"{UP}<hostscript>
                 <script id="keyed" output="k"><elem key="a">1</elem><elem key="b">2</elem></script>
                 <script id="positional" output="p"><elem>one</elem><elem>two</elem></script>
                 <script id="plain" output="nothing structured"/>
                 <script id="no-output"/>
               </hostscript>"#
        ));
        let scripts = host.scripts();
        assert_eq!(scripts.len(), 3);

        assert_eq!(scripts[0].elements().get("a"), Some("1"));
        assert_eq!(scripts[0].elements().get("b"), Some("2"));
        assert_eq!(scripts[0].elements().len(), 2);
        assert_eq!(
            scripts[1].elements(),
            &ScriptElements::List(vec!["one".to_string(), "two".to_string()])
        );
        assert!(scripts[2].elements().is_empty());
    }

    #[test]
    fn test_unkeyed_elements_next_to_keyed_ones_are_indexed() {
        let host = single_host(&format!(
            r#"{UP}<hostscript>
                 <script id="mixed" output="m"><elem key="a">1</elem><elem>first</elem><elem key="b">2</elem><elem>second</elem></script>
                 <script id="numbered" output="n"><elem key="3">three</elem><elem>after</elem></script>
               </hostscript>"#
        ));
        let mixed = host.scripts()[0].elements();
        assert_eq!(mixed.len(), 4);
        assert_eq!(mixed.get("a"), Some("1"));
        assert_eq!(mixed.get("0"), Some("first"));
        assert_eq!(mixed.get("b"), Some("2"));
        assert_eq!(mixed.get("1"), Some("second"));

        let numbered = host.scripts()[1].elements();
        assert_eq!(numbered.get("3"), Some("three"));
        assert_eq!(numbered.get("4"), Some("after"));
    }

    #[test]
    fn test_unkeyed_elements_in_table_are_indexed() {
        let host = single_host(&format!(
            r#"{UP}<ports><port protocol="tcp" portid="80"><state state="open"/>
                 <script id="http-methods" output="GET HEAD">
                   <table key="Supported Methods"><elem>GET</elem><elem>HEAD</elem></table>
                 </script>
               </port></ports>"#
        ));
        let methods = host.ports()[0].scripts()[0]
            .elements()
            .table("Supported Methods")
            .unwrap();
        let expected: BTreeMap<String, String> = [("0", "GET"), ("1", "HEAD")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(methods, &expected);
    }

    #[test]
    fn test_script_without_elements_is_malformed() {
        let xml = report(r#"<script id="broken" output="x"/>"#);
        let document = tokenize(&xml).unwrap();
        let script = document
            .root_element()
            .children()
            .find(|n| n.has_tag_name("script"))
            .unwrap();

        match parse_script_elements(script) {
            Err(ScanError::MalformedScript { id }) => assert_eq!(id, "broken"),
            other => panic!("expected MalformedScript, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_document_is_an_xml_error() {
        let result = parse_str(&format!("<nmaprun><host>{UP}</host>"));
        assert!(matches!(result, Err(ScanError::Xml(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = parse_output_file("/nonexistent/report.xml");
        assert!(matches!(result, Err(ScanError::ReportNotFound(_))));
    }
}
