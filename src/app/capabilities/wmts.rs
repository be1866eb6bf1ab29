//! WMTS 1.0.0 capability parsing

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use super::models::{Capabilities, LayerRecord, ServiceMetadata};
use super::xml::{
    check_root, local_name, missing_root, path_ends_with, preferred_format, xml_error,
};
use crate::app::catalog::ServiceType;
use crate::constants::services;
use crate::errors::CapabilitiesResult;

const ROOT_ELEMENTS: &[&str] = &["Capabilities"];

#[derive(Debug, Default)]
struct DimensionFrame {
    identifier: Option<String>,
    values: Vec<String>,
}

#[derive(Debug, Default)]
struct LayerFrame {
    identifier: Option<String>,
    title: Option<String>,
    formats: Vec<String>,
    styles: Vec<String>,
    tile_matrix_sets: Vec<String>,
    dimensions: BTreeMap<String, Vec<String>>,
    dimension: Option<DimensionFrame>,
}

impl LayerFrame {
    fn close_dimension(&mut self) {
        let Some(dimension) = self.dimension.take() else {
            return;
        };
        match dimension.identifier {
            Some(identifier) if !dimension.values.is_empty() => {
                self.dimensions.insert(identifier, dimension.values);
            }
            Some(identifier) => debug!("Ignoring dimension '{}' without values", identifier),
            None => {}
        }
    }

    fn into_record(self, base_url: &str) -> Option<LayerRecord> {
        let name = self.identifier.filter(|id| !id.is_empty())?;
        let tile_matrix_set = self
            .tile_matrix_sets
            .into_iter()
            .next()
            .unwrap_or_else(|| services::DEFAULT_TILE_MATRIX_SET.to_string());
        let format = preferred_format(&self.formats);

        Some(LayerRecord {
            connection_string: wmts_connection_string(base_url, &name, &tile_matrix_set, &format),
            title: self.title.unwrap_or_else(|| name.clone()),
            reference_system: tile_matrix_set,
            format,
            style: self.styles.into_iter().next(),
            service_type: ServiceType::Wmts,
            dimensions: self.dimensions,
            name,
        })
    }
}

/// Parse a WMTS capability document
///
/// Layers without an identifier are skipped. Dimensions that enumerate no
/// values are dropped from the layer entirely.
///
/// # Errors
///
/// Returns `CapabilitiesError::Xml` for malformed documents and
/// `CapabilitiesError::UnexpectedDocument` when the root element is not
/// `Capabilities`.
pub fn parse_wmts_document(xml: &str, base_url: &str) -> CapabilitiesResult<Capabilities> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut service = ServiceMetadata::default();
    let mut layer: Option<LayerFrame> = None;
    let mut layers = Vec::new();
    let mut root_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if path.is_empty() {
                    check_root(&name, ROOT_ELEMENTS, "WMTS")?;
                    root_seen = true;
                }
                if name == "Layer" && path_ends_with(&path, &["Contents"]) {
                    layer = Some(LayerFrame::default());
                } else if name == "Dimension" && path_ends_with(&path, &["Contents", "Layer"]) {
                    if let Some(frame) = layer.as_mut() {
                        frame.dimension = Some(DimensionFrame::default());
                    }
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if path.is_empty() {
                    check_root(&local_name(&e), ROOT_ELEMENTS, "WMTS")?;
                    root_seen = true;
                }
            }
            Ok(Event::End(_)) => {
                let closed = path.pop();
                match closed.as_deref() {
                    Some("Dimension") if path_ends_with(&path, &["Contents", "Layer"]) => {
                        if let Some(frame) = layer.as_mut() {
                            frame.close_dimension();
                        }
                    }
                    Some("Layer") if path_ends_with(&path, &["Contents"]) => {
                        if let Some(record) = layer.take().and_then(|f| f.into_record(base_url)) {
                            layers.push(record);
                        }
                    }
                    _ => {}
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

                if path_ends_with(&path, &["ServiceIdentification", "Title"]) {
                    service.title = value;
                } else if path_ends_with(&path, &["ServiceIdentification", "Abstract"]) {
                    service.abstract_text = value;
                } else if path_ends_with(&path, &["ServiceProvider", "ProviderName"]) {
                    service.provider = value;
                } else if let Some(frame) = layer.as_mut() {
                    assign_layer_text(frame, &path, value);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(reader.buffer_position(), e)),
            _ => {}
        }
    }

    if !root_seen {
        return Err(missing_root("WMTS"));
    }

    Ok(Capabilities {
        service_type: ServiceType::Wmts,
        base_url: base_url.to_string(),
        service,
        layers,
    })
}

fn assign_layer_text(frame: &mut LayerFrame, path: &[String], value: String) {
    if path_ends_with(path, &["Contents", "Layer", "Identifier"]) {
        frame.identifier = Some(value);
    } else if path_ends_with(path, &["Contents", "Layer", "Title"]) {
        frame.title.get_or_insert(value);
    } else if path_ends_with(path, &["Contents", "Layer", "Format"]) {
        frame.formats.push(value);
    } else if path_ends_with(path, &["Layer", "Style", "Identifier"]) {
        frame.styles.push(value);
    } else if path_ends_with(path, &["Layer", "TileMatrixSetLink", "TileMatrixSet"]) {
        frame.tile_matrix_sets.push(value);
    } else if let Some(dimension) = frame.dimension.as_mut() {
        if path_ends_with(path, &["Dimension", "Identifier"]) {
            dimension.identifier = Some(value);
        } else if path_ends_with(path, &["Dimension", "Value"]) {
            dimension.values.push(value);
        }
    }
}

/// Raster provider URI for a WMTS layer
pub fn wmts_connection_string(base_url: &str, layer: &str, tile_matrix_set: &str, format: &str) -> String {
    format!(
        "contextualWMSLegend=0&crs={tms}&dpiMode=7&format={format}&layers={layer}&styles=&tileMatrixSet={tms}&url={base_url}",
        tms = tile_matrix_set,
        format = format,
        layer = layer,
        base_url = base_url,
    )
}
