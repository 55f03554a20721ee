// src/solver/xml.rs

//! Selections document reading and writing
//!
//! Documents are attribute-only XML, so both directions go through a small
//! element tree: parse events into [`Element`]s, then map them onto the
//! selection types (and the reverse when writing). Attribute order is fixed,
//! which makes writing a parsed document reproduce it byte for byte.

use super::{Selection, Selections};
use crate::error::{Error, Result};
use crate::hash::{DigestAlgorithm, ManifestDigest};
use crate::model::{Binding, Command, Dependency, EnvMode, ImplSource, Importance};
use crate::version::{ImplVersion, Restriction};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Namespace of selections documents
pub const XMLNS: &str = "http://zero-install.sourceforge.net/2004/injector/interface";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attrs.push((key.to_string(), value.into()));
        self
    }

    fn opt_attr(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.attr(key, v),
            None => self,
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            Error::ParseError(format!("<{}> is missing the {:?} attribute", self.name, key))
        })
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::ParseError(format!("selections XML: {}", e))
}

// Writing

pub(crate) fn write_selections(selections: &Selections) -> Result<String> {
    let mut root = Element::new("selections")
        .attr("xmlns", XMLNS)
        .attr("interface", selections.interface.as_str())
        .opt_attr("command", selections.command.as_deref());
    root.children = selections.iter().map(selection_element).collect();

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_error)?;
    write_element(&mut writer, &root)?;

    let mut text = String::from_utf8(writer.into_inner()).map_err(xml_error)?;
    text.push('\n');
    Ok(text)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
        return Ok(());
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_error)?;
    Ok(())
}

fn selection_element(selection: &Selection) -> Element {
    let mut element = Element::new("selection")
        .attr("interface", selection.interface.as_str())
        .attr("id", selection.id.as_str())
        .attr("version", selection.version.as_str())
        .attr("from-feed", selection.from_feed.as_str())
        .attr("stability", selection.stability.name())
        .opt_attr("os", selection.os.as_deref())
        .opt_attr("machine", selection.machine.as_deref());

    match &selection.source {
        ImplSource::Digests(digests) => {
            if !digests.is_empty() {
                let mut digest_element = Element::new("manifest-digest");
                for digest in digests {
                    digest_element = digest_element.attr(digest.algorithm.name(), digest.value.as_str());
                }
                element.children.push(digest_element);
            }
        }
        ImplSource::LocalPath(path) => {
            element = element.attr("local-path", path.to_string_lossy());
        }
        ImplSource::Package { package_id, installed } => {
            element = element
                .attr("package", package_id.as_str())
                .attr("installed", installed.to_string());
        }
    }

    element.children.extend(selection.bindings.iter().map(binding_element));
    element.children.extend(selection.requires.iter().map(dependency_element));
    element.children.extend(selection.commands.iter().map(command_element));
    element
}

fn binding_element(binding: &Binding) -> Element {
    match binding {
        Binding::Environment {
            name,
            insert,
            value,
            mode,
            separator,
            default,
        } => Element::new("environment")
            .attr("name", name.as_str())
            .opt_attr("insert", insert.as_deref())
            .opt_attr("value", value.as_deref())
            .attr("mode", mode.name())
            .opt_attr("separator", separator.as_deref())
            .opt_attr("default", default.as_deref()),
        Binding::ExecutableInVar { name, command } => Element::new("executable-in-var")
            .attr("name", name.as_str())
            .opt_attr("command", command.as_deref()),
        Binding::ExecutableInPath { name, command } => Element::new("executable-in-path")
            .attr("name", name.as_str())
            .opt_attr("command", command.as_deref()),
    }
}

fn dependency_element(dependency: &Dependency) -> Element {
    let mut element = Element::new("requires").attr("interface", dependency.interface.as_str());
    if dependency.importance != Importance::Essential {
        element = element.attr("importance", dependency.importance.name());
    }
    for restriction in &dependency.restrictions {
        let version = match restriction {
            Restriction::Range { not_before, before } => Element::new("version")
                .opt_attr("not-before", not_before.as_ref().map(ImplVersion::as_str))
                .opt_attr("before", before.as_ref().map(ImplVersion::as_str)),
            Restriction::Expression { expression } => {
                Element::new("version").attr("expression", expression.to_string())
            }
        };
        element.children.push(version);
    }
    element.children.extend(dependency.bindings.iter().map(binding_element));
    element
}

fn command_element(command: &Command) -> Element {
    let mut element = Element::new("command")
        .attr("name", command.name.as_str())
        .opt_attr("path", command.path.as_deref());
    element.children.extend(command.requires.iter().map(dependency_element));
    element.children.extend(command.bindings.iter().map(binding_element));
    element
}

// Reading

pub(crate) fn parse_selections(xml: &str) -> Result<Selections> {
    let root = parse_tree(xml)?;
    if root.name != "selections" {
        return Err(Error::ParseError(format!(
            "expected <selections>, found <{}>",
            root.name
        )));
    }

    let mut selections = BTreeMap::new();
    for element in root.children_named("selection") {
        let selection = parse_selection(element)?;
        selections.insert(selection.interface.clone(), Some(selection));
    }

    Ok(Selections {
        interface: root.require("interface")?.to_string(),
        command: root.get("command").map(str::to_string),
        selections,
        ready: true,
        notes: Vec::new(),
    })
}

fn parse_tree(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => stack.push(element_from(&e)?),
            Event::Empty(e) => {
                let element = element_from(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_error("unbalanced end tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(xml_error("unexpected end of document"));
    }
    root.ok_or_else(|| xml_error("empty document"))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(xml_error("more than one root element"));
    }
    Ok(())
}

fn element_from(start: &BytesStart<'_>) -> Result<Element> {
    let name = std::str::from_utf8(start.local_name().as_ref())
        .map_err(xml_error)?
        .to_string();
    let mut element = Element::new(&name);
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let raw_key = attr.key.as_ref();
        if raw_key == b"xmlns" || raw_key.starts_with(b"xmlns:") {
            continue;
        }
        let key = std::str::from_utf8(attr.key.local_name().as_ref())
            .map_err(xml_error)?
            .to_string();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

fn parse_selection(element: &Element) -> Result<Selection> {
    let source = if let Some(path) = element.get("local-path") {
        ImplSource::LocalPath(PathBuf::from(path))
    } else if let Some(package_id) = element.get("package") {
        ImplSource::Package {
            package_id: package_id.to_string(),
            installed: element.get("installed") == Some("true"),
        }
    } else {
        let mut digests = Vec::new();
        for digest_element in element.children_named("manifest-digest") {
            for (algorithm, value) in &digest_element.attrs {
                let algorithm: DigestAlgorithm = algorithm.parse()?;
                digests.push(ManifestDigest::new(algorithm, value.as_str())?);
            }
        }
        ImplSource::Digests(digests)
    };

    Ok(Selection {
        interface: element.require("interface")?.to_string(),
        id: element.require("id")?.to_string(),
        version: element.require("version")?.parse()?,
        from_feed: element.require("from-feed")?.to_string(),
        stability: element.get("stability").unwrap_or("testing").parse()?,
        os: element.get("os").map(str::to_string),
        machine: element.get("machine").map(str::to_string),
        source,
        bindings: parse_bindings(element)?,
        requires: element
            .children_named("requires")
            .map(parse_dependency)
            .collect::<Result<_>>()?,
        commands: element
            .children_named("command")
            .map(parse_command)
            .collect::<Result<_>>()?,
    })
}

fn parse_bindings(element: &Element) -> Result<Vec<Binding>> {
    let mut bindings = Vec::new();
    for child in &element.children {
        let binding = match child.name.as_str() {
            "environment" => Binding::Environment {
                name: child.require("name")?.to_string(),
                insert: child.get("insert").map(str::to_string),
                value: child.get("value").map(str::to_string),
                mode: child.get("mode").map(str::parse::<EnvMode>).transpose()?.unwrap_or_default(),
                separator: child.get("separator").map(str::to_string),
                default: child.get("default").map(str::to_string),
            },
            "executable-in-var" => Binding::ExecutableInVar {
                name: child.require("name")?.to_string(),
                command: child.get("command").map(str::to_string),
            },
            "executable-in-path" => Binding::ExecutableInPath {
                name: child.require("name")?.to_string(),
                command: child.get("command").map(str::to_string),
            },
            _ => continue,
        };
        bindings.push(binding);
    }
    Ok(bindings)
}

fn parse_dependency(element: &Element) -> Result<Dependency> {
    let importance = match element.get("importance") {
        None | Some("essential") => Importance::Essential,
        Some("recommended") => Importance::Recommended,
        Some(other) => return Err(xml_error(format!("unknown importance {:?}", other))),
    };
    let mut restrictions = Vec::new();
    for version in element.children_named("version") {
        let restriction = match version.get("expression") {
            Some(expression) => Restriction::expression(expression)?,
            None => Restriction::range(version.get("not-before"), version.get("before"))?,
        };
        restrictions.push(restriction);
    }
    Ok(Dependency {
        interface: element.require("interface")?.to_string(),
        importance,
        restrictions,
        bindings: parse_bindings(element)?,
    })
}

fn parse_command(element: &Element) -> Result<Command> {
    Ok(Command {
        name: element.require("name")?.to_string(),
        path: element.get("path").map(str::to_string),
        requires: element
            .children_named("requires")
            .map(parse_dependency)
            .collect::<Result<_>>()?,
        bindings: parse_bindings(element)?,
    })
}
