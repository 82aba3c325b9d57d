//! Water system datasheet parsing.
//!
//! The datasheet is a stack of loosely structured tables. Each section is
//! located by a label somewhere inside its table (`Population Served`,
//! `Last Survey Date`, `System Type Options`, `All Water System Contacts`,
//! `(Active Sources)`) and read row by row.

use std::sync::LazyLock;

use ccr_map_water_models::{ContactAddress, SourceFacility, SystemMetadata};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::EnrichError;
use crate::normalize::{collapse, normalize_html};

static SOURCE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[SG]\d+[A-Z]?$").expect("valid regex"));

struct Selectors {
    tr: Selector,
    td: Selector,
}

/// Parses a raw datasheet page. The `folder_name` and `error` fields are
/// left for the caller.
///
/// # Errors
///
/// Returns [`EnrichError::Selector`] if a built-in selector fails to parse.
pub fn parse_datasheet(raw_html: &str) -> Result<SystemMetadata, EnrichError> {
    let html = normalize_html(raw_html);
    let document = Html::parse_document(&html);
    let sel = Selectors {
        tr: crate::parse_selector("tr")?,
        td: crate::parse_selector("td")?,
    };

    let (population, connections) = population(&document, &sel);

    Ok(SystemMetadata {
        folder_name: None,
        population,
        connections,
        county: county(&document, &sel),
        system_type: system_type(&document, &sel),
        addresses: contacts(&document, &sel),
        sources: sources(&document, &sel),
        error: None,
    })
}

/// Maps a source type code to its description.
#[must_use]
pub fn source_type_description(code: &str) -> &'static str {
    match code {
        "G" => "Groundwater",
        "S" => "Surface Water",
        "GU" => "Groundwater u/ Influence",
        _ => "Unknown",
    }
}

fn population(document: &Html, sel: &Selectors) -> (Option<u64>, Option<u64>) {
    let Some(table) =
        table_with_text(document, |t| t.contains("Population") && t.contains("Served"))
    else {
        return (None, None);
    };

    for row in table.select(&sel.tr) {
        let cells = cells(row, sel);
        if cells.len() < 3 {
            continue;
        }
        let served = text_of(cells[1]);
        if !served.is_empty() && served.chars().all(|c| c.is_ascii_digit()) {
            return (served.parse().ok(), parse_count(&text_of(cells[2])));
        }
    }
    (None, None)
}

fn county(document: &Html, sel: &Selectors) -> Option<String> {
    let label = document
        .select(&sel.td)
        .find(|td| text_of(*td) == "Last Survey Date")?;
    let table = enclosing_table(label)?;
    let row = table.select(&sel.tr).nth(1)?;
    let county = text_of(*cells(row, sel).last()?);
    (!county.is_empty()).then_some(county)
}

fn system_type(document: &Html, sel: &Selectors) -> Option<String> {
    let table = table_with_text(document, |t| t.contains("System Type Options"))?;
    let row = table.select(&sel.tr).nth(1)?;
    let system_type = text_of(row);
    (!system_type.is_empty()).then_some(system_type)
}

fn contacts(document: &Html, sel: &Selectors) -> Vec<ContactAddress> {
    let Some(table) = table_with_text(document, |t| t.contains("All Water System Contacts"))
    else {
        return Vec::new();
    };

    let mut addresses: Vec<ContactAddress> = Vec::new();
    for row in table.select(&sel.tr) {
        let cells = cells(row, sel);
        if cells.len() < 2 {
            continue;
        }

        let type_text = text_of(cells[0]);
        let role = type_text
            .split('-')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        // First line is the contact's name; the rest is the address.
        let lines = text_pieces(cells[1]);
        if lines.len() < 2 {
            continue;
        }
        let address = collapse(&lines[1..].join(" "));
        if address.is_empty() {
            continue;
        }

        if let Some(existing) = addresses.iter_mut().find(|a| a.address == address) {
            existing.seen_count += 1;
            if !existing.roles.contains(&role) {
                existing.roles.push(role);
            }
        } else {
            addresses.push(ContactAddress {
                address,
                seen_count: 1,
                roles: vec![role],
            });
        }
    }
    addresses
}

fn sources(document: &Html, sel: &Selectors) -> Vec<SourceFacility> {
    let Some(table) = table_with_text(document, |t| t.contains("(Active Sources)")) else {
        return Vec::new();
    };

    let mut sources = Vec::new();
    let mut current: Option<SourceFacility> = None;
    let mut expect_summary = false;
    let mut expect_gps = false;

    for row in table.select(&sel.tr) {
        let cells = cells(row, sel);
        let text = text_of(row);

        if let Some(first) = cells.first()
            && SOURCE_ID_RE.is_match(&text_of(*first))
        {
            if let Some(done) = current.take() {
                sources.push(done);
            }
            let field = |i: usize| cells.get(i).map(|c| text_of(*c)).unwrap_or_default();
            let type_code = field(3);
            current = Some(SourceFacility {
                id: field(0),
                name: field(1),
                type_desc: source_type_description(&type_code).to_string(),
                type_code,
                status: field(2),
                ..SourceFacility::default()
            });
            continue;
        }

        if text.contains("Source Summary") && text.contains("Drill Date") {
            expect_summary = true;
            continue;
        }
        if expect_summary
            && cells.len() >= 2
            && let Some(source) = current.as_mut()
        {
            source.drill_date = non_empty(text_of(cells[0]));
            source.aquifer_or_river = non_empty(text_of(cells[1]));
            expect_summary = false;
            continue;
        }

        if text.contains("GPS Latitude") {
            expect_gps = true;
            continue;
        }
        if expect_gps
            && cells.len() >= 3
            && let Some(source) = current.as_mut()
        {
            let latitude = text_of(cells[0]);
            let longitude = text_of(cells[1]);
            if is_coordinate(&latitude) && is_coordinate(&longitude) {
                source.latitude = Some(latitude);
                source.longitude = Some(longitude);
                source.elevation = non_empty(text_of(cells[2]));
            }
            expect_gps = false;
        }
    }

    if let Some(done) = current {
        sources.push(done);
    }
    sources
}

/// Zero coordinates are placeholders on the datasheet.
fn is_coordinate(value: &str) -> bool {
    value.parse::<f64>().is_ok_and(|v| v.abs() > f64::EPSILON)
}

fn parse_count(value: &str) -> Option<u64> {
    value.replace(',', "").trim().parse().ok()
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// The nearest table enclosing the first text node that satisfies
/// `matches`.
fn table_with_text(document: &Html, matches: impl Fn(&str) -> bool) -> Option<ElementRef<'_>> {
    document
        .tree
        .root()
        .descendants()
        .find(|node| node.value().as_text().is_some_and(|text| matches(&**text)))
        .and_then(|node| {
            node.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "table")
        })
}

fn enclosing_table(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

fn cells<'a>(row: ElementRef<'a>, sel: &Selectors) -> Vec<ElementRef<'a>> {
    row.select(&sel.td).collect()
}

fn text_pieces(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse(&text_pieces(element).join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASHEET: &str = r#"
<html><body>
<table>
  <tr><td>Water System No.</td><td>TX0010001</td></tr>
</table>
<table>
  <tr><td>Last Survey Date</td><td>Surveyor</td><td>Region</td><td>County</td></tr>
  <tr><td>01/02/2023</td><td>SMITH</td><td>07</td><td>ANDERSON</td></tr>
</table>
<table>
  <tr><th>System Type Options</th></tr>
  <tr><td>C</td><td>Community</td></tr>
</table>
<table>
  <tr><td>Population<br>Served</td><td>Population</td><td>Connections</td></tr>
  <tr><td>RESIDENTIAL</td><td>2500</td><td>1,040</td></tr>
</table>
<table>
  <tr><th colspan="2">All Water System Contacts</th></tr>
  <tr><td>AC - Administrative Contact</td><td><div>JANE DOE</div><div>PO BOX 12</div><div>PALESTINE, TX 75801</div></td></tr>
  <tr><td>OW - Owner</td><td><div>CITY OF PALESTINE</div><div>PO BOX 12</div><div>PALESTINE, TX 75801</div></td></tr>
  <tr><td>TC&nbsp;- Technical Contact</td><td><div>JOHN ROE</div><div>504 N QUEEN ST</div><div>PALESTINE,  TX 75801</div></td></tr>
  <tr><td>FC - Financial Contact</td><td><div>NOBODY</div></td></tr>
</table>
<table>
  <tr><th>Sources (Active Sources)</th></tr>
  <tr><td>G0010001A</td><td>WELL 1</td><td>A</td><td>G</td></tr>
  <tr><td>Source Summary</td><td>Drill Date</td></tr>
  <tr><td>05/01/1970</td><td>CARRIZO</td></tr>
  <tr><td>GPS Latitude</td><td>GPS Longitude</td><td>Elevation</td></tr>
  <tr><td>31.7621</td><td>-95.6308</td><td>410</td></tr>
  <tr><td>S0010001B</td><td>LAKE INTAKE</td><td>A</td><td>S</td></tr>
  <tr><td>GPS Latitude</td><td>GPS Longitude</td><td>Elevation</td></tr>
  <tr><td>0.0</td><td>0.0</td><td>0</td></tr>
</table>
</body></html>
"#;

    #[test]
    fn parses_population_and_connections() {
        let meta = parse_datasheet(DATASHEET).unwrap();
        assert_eq!(meta.population, Some(2500));
        assert_eq!(meta.connections, Some(1040));
    }

    #[test]
    fn parses_county_and_system_type() {
        let meta = parse_datasheet(DATASHEET).unwrap();
        assert_eq!(meta.county.as_deref(), Some("ANDERSON"));
        assert_eq!(meta.system_type.as_deref(), Some("C Community"));
    }

    #[test]
    fn deduplicates_contact_addresses() {
        let meta = parse_datasheet(DATASHEET).unwrap();
        assert_eq!(meta.addresses.len(), 2);

        let po_box = &meta.addresses[0];
        assert_eq!(po_box.address, "PO BOX 12 PALESTINE, TX 75801");
        assert_eq!(po_box.seen_count, 2);
        assert_eq!(po_box.roles, vec!["AC", "OW"]);

        assert_eq!(meta.addresses[1].address, "504 N QUEEN ST PALESTINE, TX 75801");
        assert_eq!(meta.addresses[1].roles, vec!["TC"]);
    }

    #[test]
    fn parses_sources_and_discards_zero_coordinates() {
        let meta = parse_datasheet(DATASHEET).unwrap();
        assert_eq!(meta.sources.len(), 2);

        let well = &meta.sources[0];
        assert_eq!(well.id, "G0010001A");
        assert_eq!(well.name, "WELL 1");
        assert_eq!(well.status, "A");
        assert_eq!(well.type_code, "G");
        assert_eq!(well.type_desc, "Groundwater");
        assert_eq!(well.drill_date.as_deref(), Some("05/01/1970"));
        assert_eq!(well.aquifer_or_river.as_deref(), Some("CARRIZO"));
        assert_eq!(well.latitude.as_deref(), Some("31.7621"));
        assert_eq!(well.longitude.as_deref(), Some("-95.6308"));
        assert_eq!(well.elevation.as_deref(), Some("410"));

        let intake = &meta.sources[1];
        assert_eq!(intake.type_desc, "Surface Water");
        assert_eq!(intake.latitude, None);
        assert_eq!(intake.longitude, None);
    }

    #[test]
    fn empty_page_yields_empty_metadata() {
        let meta = parse_datasheet("<html><body><p>nothing</p></body></html>").unwrap();
        assert_eq!(meta, SystemMetadata::default());
    }

    #[test]
    fn describes_source_types() {
        assert_eq!(source_type_description("GU"), "Groundwater u/ Influence");
        assert_eq!(source_type_description("X"), "Unknown");
    }
}
