//! Interactive map rendering.
//!
//! Produces a single self-contained HTML page: a Leaflet map with one
//! marker per location, an area-derived circle overlay, and two cascading
//! selectors (category, then attribute) that drive the popup contents.
//! The wide table places the markers; the long table feeds the
//! per-attribute lookup embedded in the page as JSON.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::config::MapConfig;
use crate::core::table::{Table, TableError};
use crate::processors::melt::Category;

/// Errors that can occur during map rendering.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error writing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no locations with usable coordinates")]
    NoMarkers,

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// One map marker, taken from a wide-table row.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub code: String,
    pub name: String,
    pub biome: String,
    pub lat: f64,
    pub lon: f64,
    /// Circle radius in meters; `None` when the area is missing or
    /// non-positive (the circle is skipped, the marker stays).
    pub radius_m: Option<f64>,
}

/// Attribute names available under one category, in first-seen order.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryAttributes {
    pub name: String,
    pub attributes: Vec<String>,
}

/// Everything the page needs, embedded as one JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct MapPayload {
    pub markers: Vec<Marker>,
    pub categories: Vec<CategoryAttributes>,
    /// category -> attribute -> code -> display value. Absent entries
    /// render as an explicit "no data" in the popup.
    pub lookup: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
}

/// Circle radius in meters for an ecoregion area.
///
/// Treats the area as a disc: `radius = sqrt(area_km2 * 1_000_000 / pi)`.
/// Returns `None` for missing, non-finite, or non-positive areas so the
/// caller can skip the overlay instead of drawing a degenerate circle.
pub fn radius_from_area(area_km2: f64) -> Option<f64> {
    if !area_km2.is_finite() || area_km2 <= 0.0 {
        return None;
    }
    Some((area_km2 * 1_000_000.0 / PI).sqrt())
}

/// Build the embedded payload from the wide and long tables.
///
/// Rows without a usable coordinate pair are skipped with a warning; a
/// wide table yielding no markers at all is an error.
pub fn build_payload(wide: &Table, long: &Table) -> Result<MapPayload> {
    let code_idx = wide.require_column("code")?;
    let name_idx = wide.require_column("ecoregion_name")?;
    let biome_idx = wide.require_column("biome")?;
    let lon_idx = wide.require_column("longitude")?;
    let lat_idx = wide.require_column("latitude")?;
    let area_idx = wide.require_column("area_km2")?;

    let mut markers = Vec::with_capacity(wide.n_rows());
    for row in wide.rows() {
        let code = row[code_idx].to_key();
        let (lat, lon) = match (row[lat_idx].as_f64(), row[lon_idx].as_f64()) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                warn!("location '{}' has no usable coordinates, skipping marker", code);
                continue;
            }
        };
        let radius_m = match row[area_idx].as_f64() {
            Some(area) => {
                let radius = radius_from_area(area);
                if radius.is_none() {
                    warn!("location '{}' has non-positive area {}, skipping circle", code, area);
                }
                radius
            }
            None => {
                warn!("location '{}' has no area value, skipping circle", code);
                None
            }
        };
        markers.push(Marker {
            code,
            name: row[name_idx].to_string(),
            biome: row[biome_idx].to_string(),
            lat,
            lon,
            radius_m,
        });
    }
    if markers.is_empty() {
        return Err(RenderError::NoMarkers);
    }

    let long_code = long.require_column("code")?;
    let long_category = long.require_column("category")?;
    let long_attribute = long.require_column("attribute")?;
    let long_value = long.require_column("value")?;

    let mut categories: Vec<CategoryAttributes> = Category::ALL
        .iter()
        .map(|c| CategoryAttributes {
            name: c.label().to_string(),
            attributes: Vec::new(),
        })
        .collect();
    let mut lookup: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>> =
        BTreeMap::new();

    for row in long.rows() {
        let category = row[long_category].to_string();
        let attribute = row[long_attribute].to_string();

        if let Some(entry) = categories.iter_mut().find(|c| c.name == category) {
            if !entry.attributes.contains(&attribute) {
                entry.attributes.push(attribute.clone());
            }
        } else {
            warn!("long row with unknown category '{}'", category);
            continue;
        }

        // Missing values stay absent from the lookup; the page shows an
        // explicit "no data" for absent entries.
        if row[long_value].is_missing() {
            continue;
        }
        lookup
            .entry(category)
            .or_default()
            .entry(attribute)
            .or_default()
            .insert(row[long_code].to_key(), row[long_value].to_string());
    }

    Ok(MapPayload {
        markers,
        categories,
        lookup,
    })
}

/// Minimal HTML attribute/text escaping.
fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the payload into the full HTML page.
pub fn render_html(payload: &MapPayload, config: &MapConfig) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(MAP_TEMPLATE
        .replace("__TITLE__", &escape_html(&config.title))
        .replace("__TILE_URL__", &escape_html(&config.tile_url))
        .replace("__ATTRIBUTION__", &config.attribution)
        .replace("__ZOOM__", &config.zoom.to_string())
        .replace("__CIRCLE_COLOR__", &escape_html(&config.circle_color))
        .replace("__CIRCLE_OPACITY__", &config.circle_opacity.to_string())
        .replace("__PAYLOAD__", &json))
}

/// Write the page, overwriting any previous render.
pub fn write_map(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RenderError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    fs::write(path, html).map_err(|e| RenderError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>__TITLE__</title>
  <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.css"
    crossorigin="anonymous" referrerpolicy="no-referrer" />
  <script src="https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.js"
    crossorigin="anonymous" referrerpolicy="no-referrer"></script>
  <style>
    html, body { height: 100%; margin: 0; font-family: system-ui, sans-serif; }
    #map { position: absolute; inset: 0; }
    #controls {
      position: absolute; top: 12px; right: 12px; z-index: 1000;
      background: rgba(255, 255, 255, 0.95); border-radius: 8px;
      padding: 10px 12px; box-shadow: 0 2px 10px rgba(0, 0, 0, 0.25);
      display: flex; flex-direction: column; gap: 6px; min-width: 220px;
    }
    #controls label { font-size: 11px; text-transform: uppercase; color: #555; }
    #controls select { padding: 4px 6px; font-size: 13px; }
  </style>
</head>
<body>
  <div id="map"></div>
  <div id="controls">
    <label for="category">Category</label>
    <select id="category"></select>
    <label for="attribute">Attribute</label>
    <select id="attribute"></select>
  </div>
  <script>
    const DATA = __PAYLOAD__;

    const map = L.map('map');
    L.tileLayer('__TILE_URL__', {
      maxZoom: 18,
      attribution: '__ATTRIBUTION__'
    }).addTo(map);

    const esc = (s) => String(s)
      .replace(/&/g, '&amp;').replace(/</g, '&lt;')
      .replace(/>/g, '&gt;').replace(/"/g, '&quot;');

    const markers = [];
    DATA.markers.forEach((m) => {
      const marker = L.marker([m.lat, m.lon]).addTo(map);
      markers.push({ meta: m, marker: marker });
      if (m.radius_m !== null) {
        L.circle([m.lat, m.lon], {
          radius: m.radius_m,
          color: '__CIRCLE_COLOR__',
          weight: 1,
          fillOpacity: __CIRCLE_OPACITY__
        }).addTo(map);
      }
    });

    if (markers.length > 0) {
      const bounds = L.latLngBounds(markers.map((x) => [x.meta.lat, x.meta.lon]));
      map.fitBounds(bounds.pad(0.2));
    } else {
      map.setView([0, 0], __ZOOM__);
    }

    const categorySelect = document.getElementById('category');
    const attributeSelect = document.getElementById('attribute');

    DATA.categories.forEach((c) => {
      const option = document.createElement('option');
      option.value = c.name;
      option.textContent = c.name;
      categorySelect.appendChild(option);
    });

    // Repopulating always resets the selection to the first attribute of
    // the chosen category, so the attribute selector can never keep a
    // value from the previous category.
    function populateAttributes() {
      const entry = DATA.categories.find((c) => c.name === categorySelect.value);
      attributeSelect.innerHTML = '';
      const attributes = entry ? entry.attributes : [];
      attributes.forEach((a) => {
        const option = document.createElement('option');
        option.value = a;
        option.textContent = a;
        attributeSelect.appendChild(option);
      });
      attributeSelect.selectedIndex = attributes.length > 0 ? 0 : -1;
    }

    function refreshPopups() {
      const category = categorySelect.value;
      const attribute = attributeSelect.value;
      const values = (DATA.lookup[category] || {})[attribute] || {};
      markers.forEach(({ meta, marker }) => {
        const has = Object.prototype.hasOwnProperty.call(values, meta.code);
        const value = has ? values[meta.code] : 'no data';
        marker.bindPopup(
          '<b>' + esc(meta.name) + '</b><br>' +
          'Biome: ' + esc(meta.biome) + '<br>' +
          'Code: ' + esc(meta.code) + '<br>' +
          esc(attribute) + ': ' + esc(value)
        );
      });
    }

    categorySelect.addEventListener('change', () => {
      populateAttributes();
      refreshPopups();
    });
    attributeSelect.addEventListener('change', refreshPopups);

    populateAttributes();
    refreshPopups();
  </script>
</body>
</html>
"#;
