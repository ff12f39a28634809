//! OVF environment documents, as handed to the guest in `guestinfo.ovfEnv`.
//!
//! Only the `PropertySection` children of the root `Environment` are of
//! interest: every child of such a section carries an `oe:key` / `oe:value`
//! attribute pair which becomes a flat property. Sections nested in an
//! `Entity` describe other virtual machines of a vApp and are skipped.

use roxmltree::{Document, Node};

pub const OVF_ENV_NS: &str = "http://schemas.dmtf.org/ovf/environment/1";
const PROPERTY_SECTION: &str = "PropertySection";

#[derive(thiserror::Error, Debug)]
pub enum OvfError {
    #[error("{0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{element}> at {position} has no {attribute} attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
        position: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvfProperty {
    pub key: String,
    pub value: String,
}

/// Properties in first-seen key order. Re-inserting a key replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OvfProperties {
    entries: Vec<OvfProperty>,
}

impl OvfProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.value = value,
            None => self.entries.push(OvfProperty { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OvfProperty> {
        self.entries.iter()
    }
}

impl IntoIterator for OvfProperties {
    type Item = OvfProperty;
    type IntoIter = std::vec::IntoIter<OvfProperty>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn property_attribute<'a>(
    doc: &Document,
    node: &Node<'a, '_>,
    attribute: &'static str,
) -> Result<&'a str, OvfError> {
    node.attribute((OVF_ENV_NS, attribute))
        .ok_or_else(|| OvfError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute,
            position: doc.text_pos_at(node.range().start).to_string(),
        })
}

pub fn parse(xml: &str) -> Result<OvfProperties, OvfError> {
    let mut properties = OvfProperties::new();
    if xml.is_empty() {
        return Ok(properties);
    }

    let doc = Document::parse(xml)?;
    let sections = doc
        .root_element()
        .children()
        .filter(|node| node.has_tag_name((OVF_ENV_NS, PROPERTY_SECTION)));
    for section in sections {
        for property in section.children().filter(Node::is_element) {
            let key = property_attribute(&doc, &property, "key")?;
            let value = property_attribute(&doc, &property, "value")?;
            properties.insert(key, value);
        }
    }
    Ok(properties)
}
