//! Field dictionary - element id to name/semantics lookup

use contracts::{ElementId, SparseIdMap};

/// How a field's value should be rendered beyond its plain type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantic {
    Plain,
    /// IP protocol number
    Protocol,
    /// TCP control bits
    TcpFlags,
}

/// Dictionary entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub semantic: Semantic,
}

/// Element id -> definition
#[derive(Debug, Clone, Default)]
pub struct FieldDictionary {
    defs: SparseIdMap<FieldDef>,
}

/// Common IANA IPFIX elements
const IANA_ELEMENTS: &[(ElementId, &str, Semantic)] = &[
    (1, "octetDeltaCount", Semantic::Plain),
    (2, "packetDeltaCount", Semantic::Plain),
    (4, "protocolIdentifier", Semantic::Protocol),
    (5, "ipClassOfService", Semantic::Plain),
    (6, "tcpControlBits", Semantic::TcpFlags),
    (7, "sourceTransportPort", Semantic::Plain),
    (8, "sourceIPv4Address", Semantic::Plain),
    (10, "ingressInterface", Semantic::Plain),
    (11, "destinationTransportPort", Semantic::Plain),
    (12, "destinationIPv4Address", Semantic::Plain),
    (14, "egressInterface", Semantic::Plain),
    (27, "sourceIPv6Address", Semantic::Plain),
    (28, "destinationIPv6Address", Semantic::Plain),
    (56, "sourceMacAddress", Semantic::Plain),
    (80, "destinationMacAddress", Semantic::Plain),
    (82, "interfaceName", Semantic::Plain),
    (136, "flowEndReason", Semantic::Plain),
    (150, "flowStartSeconds", Semantic::Plain),
    (151, "flowEndSeconds", Semantic::Plain),
    (152, "flowStartMilliseconds", Semantic::Plain),
    (153, "flowEndMilliseconds", Semantic::Plain),
];

impl FieldDictionary {
    /// Empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Dictionary preloaded with the common IANA elements
    pub fn iana() -> Self {
        let mut dict = Self::new();
        for &(id, name, semantic) in IANA_ELEMENTS {
            dict.insert(id, name, semantic);
        }
        dict
    }

    /// Add or replace an entry
    pub fn insert(&mut self, id: ElementId, name: impl Into<String>, semantic: Semantic) {
        self.defs.insert(
            id,
            FieldDef {
                name: name.into(),
                semantic,
            },
        );
    }

    pub fn get(&self, id: ElementId) -> Option<&FieldDef> {
        self.defs.get(id)
    }

    /// Name of an element, or its numeric id when unknown
    pub fn name_of(&self, id: ElementId) -> String {
        match self.defs.get(id) {
            Some(def) => def.name.clone(),
            None => format!("e0id{id}"),
        }
    }

    /// Entries in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &FieldDef)> + '_ {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
