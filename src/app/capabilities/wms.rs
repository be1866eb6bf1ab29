//! WMS 1.3.0 capability parsing

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::models::{Capabilities, LayerRecord, ServiceMetadata};
use super::xml::{
    check_root, local_name, missing_root, path_ends_with, preferred_format, xml_error,
};
use crate::app::catalog::ServiceType;
use crate::constants::services;
use crate::errors::CapabilitiesResult;

const ROOT_ELEMENTS: &[&str] = &["WMS_Capabilities", "WMT_MS_Capabilities"];

/// Layer under construction; CRS and styles are inherited from the parent layer
#[derive(Debug, Default, Clone)]
struct LayerFrame {
    order: usize,
    name: Option<String>,
    title: String,
    crs: Vec<String>,
    styles: Vec<String>,
}

impl LayerFrame {
    fn child_of(parent: Option<&LayerFrame>, order: usize) -> Self {
        match parent {
            Some(parent) => Self {
                order,
                crs: parent.crs.clone(),
                styles: parent.styles.clone(),
                ..Default::default()
            },
            None => Self {
                order,
                ..Default::default()
            },
        }
    }
}

/// Parse a WMS capability document
///
/// Only named layers are returned, in document order. `base_url` is embedded
/// in each connection string and should carry no query.
///
/// # Errors
///
/// Returns `CapabilitiesError::Xml` for malformed documents and
/// `CapabilitiesError::UnexpectedDocument` when the root element is not a WMS
/// capabilities root (service exception reports included).
pub fn parse_wms_document(xml: &str, base_url: &str) -> CapabilitiesResult<Capabilities> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut service = ServiceMetadata::default();
    let mut getmap_formats: Vec<String> = Vec::new();
    let mut open_layers: Vec<LayerFrame> = Vec::new();
    let mut named_layers: Vec<LayerFrame> = Vec::new();
    let mut layer_count = 0;
    let mut root_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if path.is_empty() {
                    check_root(&name, ROOT_ELEMENTS, "WMS")?;
                    root_seen = true;
                }
                if name == "Layer" {
                    open_layers.push(LayerFrame::child_of(open_layers.last(), layer_count));
                    layer_count += 1;
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if path.is_empty() {
                    check_root(&local_name(&e), ROOT_ELEMENTS, "WMS")?;
                    root_seen = true;
                }
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("Layer") {
                    if let Some(frame) = open_layers.pop() {
                        if frame.name.is_some() {
                            named_layers.push(frame);
                        }
                    }
                }
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| xml_error(reader.buffer_position(), e))?
                    .trim()
                    .to_string();
                if value.is_empty() {
                    continue;
                }

                if path_ends_with(&path, &["Service", "Title"]) {
                    service.title = value;
                } else if path_ends_with(&path, &["Service", "Abstract"]) {
                    service.abstract_text = value;
                } else if path_ends_with(&path, &["ContactPersonPrimary", "ContactOrganization"]) {
                    service.provider = value;
                } else if path_ends_with(&path, &["Request", "GetMap", "Format"]) {
                    getmap_formats.push(value);
                } else if let Some(frame) = open_layers.last_mut() {
                    if path_ends_with(&path, &["Layer", "Name"]) {
                        frame.name = Some(value);
                    } else if path_ends_with(&path, &["Layer", "Title"]) {
                        frame.title = value;
                    } else if path_ends_with(&path, &["Layer", "CRS"])
                        || path_ends_with(&path, &["Layer", "SRS"])
                    {
                        for crs in value.split_whitespace() {
                            if !frame.crs.iter().any(|c| c == crs) {
                                frame.crs.push(crs.to_string());
                            }
                        }
                    } else if path_ends_with(&path, &["Layer", "Style", "Name"]) {
                        frame.styles.push(value);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(reader.buffer_position(), e)),
            _ => {}
        }
    }

    if !root_seen {
        return Err(missing_root("WMS"));
    }

    named_layers.sort_by_key(|frame| frame.order);
    let format = preferred_format(&getmap_formats);
    let mut seen = HashSet::new();
    let layers = named_layers
        .into_iter()
        .filter_map(|frame| {
            let name = frame.name?;
            if !seen.insert(name.clone()) {
                return None;
            }
            let crs = preferred_crs(&frame.crs);
            Some(LayerRecord {
                connection_string: wms_connection_string(base_url, &name, &crs, &format),
                title: frame.title,
                reference_system: crs,
                format: format.clone(),
                style: frame.styles.into_iter().next(),
                service_type: ServiceType::Wms,
                dimensions: Default::default(),
                name,
            })
        })
        .collect();

    Ok(Capabilities {
        service_type: ServiceType::Wms,
        base_url: base_url.to_string(),
        service,
        layers,
    })
}

/// EPSG:3857, then EPSG:4326, then the first advertised CRS
pub fn preferred_crs(offered: &[String]) -> String {
    [services::PREFERRED_CRS, services::FALLBACK_CRS]
        .into_iter()
        .find(|wanted| offered.iter().any(|crs| crs.eq_ignore_ascii_case(wanted)))
        .map(str::to_string)
        .or_else(|| offered.first().cloned())
        .unwrap_or_else(|| services::FALLBACK_CRS.to_string())
}

/// Raster provider URI for a WMS layer
pub fn wms_connection_string(base_url: &str, layer: &str, crs: &str, format: &str) -> String {
    format!(
        "url={}?&service=WMS&version={}&request=GetMap&layers={}&styles=&crs={}&format={}",
        base_url,
        services::WMS_VERSION,
        layer,
        crs,
        format
    )
}
