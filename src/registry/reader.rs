//! Reader for the office suite's registry XML (`oor:component-data`).
//!
//! A registry file declares the `oor` namespace on its root element and
//! contains one or more `component-data` elements:
//!
//! ```xml
//! <oor:data xmlns:oor="http://openoffice.org/2001/registry">
//!   <oor:component-data oor:name="Filter" oor:package="org.openoffice.TypeDetection">
//!     <node oor:name="Filters">
//!       <node oor:name="Impress MS PowerPoint 2007 XML">
//!         <prop oor:name="Flags"><value>IMPORT EXPORT ALIEN</value></prop>
//!       </node>
//!     </node>
//!   </oor:component-data>
//! </oor:data>
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

/// Component and node names of the filter table.
pub const FILTER_TABLE: (&str, &str) = ("Filter", "Filters");

/// Component and node names of the type table.
pub const TYPE_TABLE: (&str, &str) = ("Types", "Types");

/// Properties of one registry entry: prop name to value text.
pub type Entry = BTreeMap<String, Option<String>>;

/// Registry entries keyed by their `oor:name`.
pub type ComponentTable = BTreeMap<String, Entry>;

/// Errors from reading registry files.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to read registry file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse registry file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: quick_xml::Error,
    },
}

#[derive(Debug, Default)]
struct Attr {
    namespace: Option<Vec<u8>>,
    name: String,
    value: String,
}

#[derive(Debug, Default)]
struct Element {
    namespace: Option<Vec<u8>>,
    name: String,
    attributes: Vec<Attr>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, namespace: &[u8], name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Children without a namespace and with the given local name.
    fn plain_children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.namespace.is_none() && c.name == name)
    }

    /// This element and all of its descendants in document order.
    fn descendants_and_self(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut pending = vec![self];
        while let Some(current) = pending.pop() {
            out.push(current);
            pending.extend(current.children.iter().rev());
        }
        out
    }
}

fn owned_namespace(ns: ResolveResult) -> Option<Vec<u8>> {
    match ns {
        ResolveResult::Bound(ns) => Some(ns.into_inner().to_vec()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

fn start_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<Vec<u8>>,
    start: &BytesStart<'_>,
) -> Element {
    let attributes = start
        .attributes()
        .flatten()
        .map(|attr| {
            let (ns, local) = reader.resolve_attribute(attr.key);
            Attr {
                namespace: owned_namespace(ns),
                name: String::from_utf8_lossy(local.as_ref()).into_owned(),
                value: attr
                    .unescape_value()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned()),
            }
        })
        .collect();

    Element {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        ..Element::default()
    }
}

fn parse_document(content: &str) -> Result<Option<Element>, quick_xml::Error> {
    let mut reader = NsReader::from_str(content);
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        let ns = owned_namespace(ns);

        match event {
            Event::Start(ref e) => {
                stack.push(start_element(&reader, ns, e));
            }
            Event::Empty(ref e) => {
                let element = start_element(&reader, ns, e);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(Some(element)),
                }
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    continue;
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(Some(element)),
                }
            }
            Event::Text(ref t) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(ref c) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Extract one component table from registry XML text.
///
/// Returns an empty table when the root element carries no namespace.
///
/// # Errors
///
/// Returns an error if the XML is malformed.
pub fn parse_component(
    content: &str,
    component: &str,
    node: &str,
) -> Result<ComponentTable, quick_xml::Error> {
    let mut table = ComponentTable::new();

    let Some(root) = parse_document(content)? else {
        return Ok(table);
    };
    let Some(oor) = root.namespace.clone() else {
        return Ok(table);
    };

    let components = root.descendants_and_self().into_iter().filter(|e| {
        e.namespace.as_deref() == Some(oor.as_slice())
            && e.name == "component-data"
            && e.attr(&oor, "name") == Some(component)
    });

    for component_data in components {
        let Some(group) = component_data
            .plain_children("node")
            .find(|n| n.attr(&oor, "name") == Some(node))
        else {
            continue;
        };

        for entry_node in group.plain_children("node") {
            let Some(name) = entry_node.attr(&oor, "name") else {
                continue;
            };

            let mut entry = Entry::new();
            for prop in entry_node.plain_children("prop") {
                let Some(prop_name) = prop.attr(&oor, "name") else {
                    continue;
                };
                let value = prop
                    .plain_children("value")
                    .next()
                    .map(|v| v.text.clone())
                    .filter(|text| !text.is_empty());
                entry.insert(prop_name.to_string(), value);
            }
            table.insert(name.to_string(), entry);
        }
    }

    Ok(table)
}

/// Read one component table from a registry file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_component(
    path: &Path,
    component: &str,
    node: &str,
) -> Result<ComponentTable, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|e| RegistryError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(path = %path.display(), component, node, "Reading registry");

    parse_component(&content, component, node).map_err(|e| RegistryError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read and merge a component table from several files.
///
/// Entries from later files replace same-named entries from earlier ones.
///
/// # Errors
///
/// Returns the first read or parse error.
pub fn read_merged<P: AsRef<Path>>(
    paths: &[P],
    (component, node): (&str, &str),
) -> Result<ComponentTable, RegistryError> {
    let mut merged = ComponentTable::new();
    for path in paths {
        merged.extend(read_component(path.as_ref(), component, node)?);
    }
    Ok(merged)
}
