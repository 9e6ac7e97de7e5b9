//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
/// URI of the standard OPC UA namespace, always index zero.
pub const OPC_UA_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

/// Ordered namespace URI table. Indices are stable once assigned.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    uris: Vec<String>,
}

impl NamespaceTable {
    /// Table seeded with the standard namespace and the server's own URI.
    pub fn new(application_uri: &str) -> Self {
        Self {
            uris: vec![OPC_UA_NAMESPACE_URI.to_owned(), application_uri.to_owned()],
        }
    }

    /// Register `uri`, returning the existing index if already present.
    pub fn register(&mut self, uri: &str) -> u16 {
        if let Some(index) = self.index_of(uri) {
            return index;
        }
        self.uris.push(uri.to_owned());
        (self.uris.len() - 1) as u16
    }

    pub fn index_of(&self, uri: &str) -> Option<u16> {
        self.uris.iter().position(|u| u == uri).map(|i| i as u16)
    }

    pub fn uri(&self, index: u16) -> Option<&str> {
        self.uris.get(usize::from(index)).map(String::as_str)
    }

    pub fn contains_index(&self, index: u16) -> bool {
        usize::from(index) < self.uris.len()
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_stable() {
        let mut table = NamespaceTable::new("urn:test");
        let types = table.register("http://se.com/BuildingAutomation/");
        let instances = table.register("http://se.com/OPCUAServer/");
        assert_eq!((types, instances), (2, 3));
        assert_eq!(table.register("http://se.com/BuildingAutomation/"), 2);
        assert_eq!(table.uri(0), Some(OPC_UA_NAMESPACE_URI));
        assert!(!table.contains_index(4));
    }
}
