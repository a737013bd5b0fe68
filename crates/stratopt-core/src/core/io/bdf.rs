use crate::core::io::traits::ModelFile;
use crate::core::models::element::{Element, ElementKind};
use crate::core::models::ids::PropertyId;
use crate::core::models::model::{Material, ModelError, StructuralModel};
use crate::core::models::property::{Ply, Property, PropertyData};
use nalgebra::Point3;
use phf::{phf_map, phf_set};
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Number of `DIMi` fields for each `PBARL` cross-section type.
static PBARL_DIMENSIONS: phf::Map<&'static str, usize> = phf_map! {
    "ROD" => 1,
    "TUBE" => 2,
    "TUBE2" => 2,
    "BAR" => 2,
    "HEXA" => 3,
    "BOX" => 4,
    "CHAN" => 4,
    "CHAN1" => 4,
    "CHAN2" => 4,
    "CROSS" => 4,
    "H" => 4,
    "HAT" => 4,
    "I1" => 4,
    "L" => 4,
    "T" => 4,
    "T1" => 4,
    "T2" => 4,
    "Z" => 4,
    "HAT1" => 5,
    "BOX1" => 6,
    "I" => 6,
    "DBOX" => 10,
};

/// Property cards that are recognized as properties but never tuned.
static OPAQUE_PROPERTY_CARDS: phf::Set<&'static str> = phf_set! {
    "PBAR", "PBARN1", "PBEAM", "PBEAML", "PBUSH", "PBUSHT", "PCOMPG", "PDAMP",
    "PELAS", "PFAST", "PGAP", "PMASS", "PROD", "PSHEAR", "PSOLID", "PTUBE",
    "PVISC", "PWELD",
};

/// One logical bulk-data entry, in file order.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkEntry {
    /// Lines re-emitted exactly as read (comments, untouched cards).
    Verbatim(Vec<String>),
    /// A tunable property card, rewritten when its tunable value changes.
    Property {
        id: PropertyId,
        card: String,
        /// Data fields after the card name, trimmed.
        fields: Vec<String>,
        /// Index into `fields` of the tunable attribute.
        tunable_field: usize,
        original: f64,
        lines: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BdfMetadata {
    /// Executive and case control lines, up to and including `BEGIN BULK`.
    pub header: Vec<String>,
    pub entries: Vec<BulkEntry>,
    /// `ENDDATA` and anything after it.
    pub trailer: Vec<String>,
}

#[derive(Debug, Error)]
pub enum BdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: BdfParseErrorKind },
    #[error("Invalid model on line {line}: {source}")]
    Model {
        line: usize,
        #[source]
        source: ModelError,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BdfParseErrorKind {
    #[error("{card} field {field} is not a valid integer (value: '{value}')")]
    InvalidInt {
        card: String,
        field: usize,
        value: String,
    },
    #[error("{card} field {field} is not a valid real (value: '{value}')")]
    InvalidReal {
        card: String,
        field: usize,
        value: String,
    },
    #[error("{card} is missing required field {field}")]
    MissingField { card: String, field: usize },
}

/// Parses a Nastran real, including the implicit-exponent forms `7.85-9` and `1.+3`.
pub fn parse_real(raw: &str) -> Option<f64> {
    let text = raw.trim().replace(['D', 'd'], "E");
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    if text.contains(['E', 'e']) {
        return None;
    }
    let split = text
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '+' || c == '-')
        .map(|(i, _)| i)?;
    format!("{}E{}", &text[..split], &text[split..]).parse().ok()
}

/// Formats a real for a free-field card: always carries a decimal point and fits 16 columns.
pub fn format_real(value: f64) -> String {
    let shortest = format!("{value:?}");
    if !shortest.contains(['e', 'E']) && shortest.len() <= 16 {
        return shortest;
    }
    let scientific = format!("{value:.8E}");
    match scientific.split_once('E') {
        Some((mantissa, exponent)) => {
            let mantissa = mantissa.trim_end_matches('0');
            format!("{mantissa}E{exponent}")
        }
        None => scientific,
    }
}

/// Fills every non-blank `PCOMP` ply group with its material and thickness,
/// so a blank field never inherits a rewritten value from the ply above it.
fn spell_out_plies(fields: &mut Vec<String>, plies: &[Ply]) {
    let mut plies = plies.iter();
    let mut index = 8;
    while index < fields.len() {
        let end = (index + 4).min(fields.len());
        if fields[index..end].iter().any(|f| !f.is_empty()) {
            let Some(ply) = plies.next() else { break };
            if fields.len() < index + 2 {
                fields.resize(index + 2, String::new());
            }
            fields[index] = ply.material_id.to_string();
            fields[index + 1] = format_real(ply.thickness);
        }
        index += 4;
    }
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 16);
    for c in line.chars() {
        if c == '\t' {
            let pad = 8 - out.chars().count() % 8;
            out.extend(std::iter::repeat_n(' ', pad));
        } else {
            out.push(c);
        }
    }
    out
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("").trim()
}

fn strip_comment(line: &str) -> &str {
    match line.find('$') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn is_continuation(line: &str) -> bool {
    match line.chars().next() {
        Some('+') | Some('*') | Some(',') => true,
        Some(' ') => {
            let data = strip_comment(line);
            if data.contains(',') {
                data.trim_start().starts_with(',')
            } else {
                !data.trim().is_empty() && slice_and_trim(data, 0, 8).is_empty()
            }
        }
        _ => false,
    }
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('$')
}

fn is_begin_bulk(line: &str) -> bool {
    line.trim_start().to_ascii_uppercase().starts_with("BEGIN BULK")
}

fn is_enddata(line: &str) -> bool {
    line.trim_start().to_ascii_uppercase().starts_with("ENDDATA")
}

/// Splits one physical line into its head field and data fields.
fn split_line(line: &str, first: bool, last: bool) -> (String, Vec<String>) {
    let data = expand_tabs(strip_comment(line));
    let (head, mut fields, large) = if data.contains(',') {
        let mut parts = data.split(',');
        let head = parts.next().unwrap_or("").trim().to_string();
        let large = if first {
            head.ends_with('*')
        } else {
            head.starts_with('*')
        };
        let fields: Vec<String> = parts.map(|p| p.trim().to_string()).collect();
        (head, fields, large)
    } else {
        let head = slice_and_trim(&data, 0, 8).to_string();
        let large = if first {
            head.ends_with('*')
        } else {
            head.starts_with('*')
        };
        let (count, width) = if large { (4, 16) } else { (8, 8) };
        let fields = (0..count)
            .map(|i| slice_and_trim(&data, 8 + i * width, 8 + (i + 1) * width).to_string())
            .collect();
        (head, fields, large)
    };

    if !last {
        let capacity = if large { 4 } else { 8 };
        fields.resize(capacity, String::new());
    }
    (head, fields)
}

struct RawCard {
    line: usize,
    name: String,
    fields: Vec<String>,
    lines: Vec<String>,
}

impl RawCard {
    fn from_lines(line: usize, lines: Vec<String>) -> Self {
        let mut name = String::new();
        let mut fields = Vec::new();
        let count = lines.len();
        for (i, physical) in lines.iter().enumerate() {
            let (head, data) = split_line(physical, i == 0, i + 1 == count);
            if i == 0 {
                name = head.trim_end_matches('*').to_ascii_uppercase();
            }
            fields.extend(data);
        }
        Self {
            line,
            name,
            fields,
            lines,
        }
    }

    fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    fn parse_error(&self, kind: BdfParseErrorKind) -> BdfError {
        BdfError::Parse {
            line: self.line,
            kind,
        }
    }

    /// Nastran numbers the card name as field 1.
    fn field_number(index: usize) -> usize {
        index + 2
    }

    fn opt_int(&self, index: usize) -> Result<Option<u32>, BdfError> {
        let raw = self.field(index);
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<u32>().map(Some).map_err(|_| {
            self.parse_error(BdfParseErrorKind::InvalidInt {
                card: self.name.clone(),
                field: Self::field_number(index),
                value: raw.to_string(),
            })
        })
    }

    fn int(&self, index: usize) -> Result<u32, BdfError> {
        self.opt_int(index)?.ok_or_else(|| self.missing(index))
    }

    fn opt_real(&self, index: usize) -> Result<Option<f64>, BdfError> {
        let raw = self.field(index);
        if raw.is_empty() {
            return Ok(None);
        }
        parse_real(raw).map(Some).ok_or_else(|| {
            self.parse_error(BdfParseErrorKind::InvalidReal {
                card: self.name.clone(),
                field: Self::field_number(index),
                value: raw.to_string(),
            })
        })
    }

    fn real_or(&self, index: usize, default: f64) -> Result<f64, BdfError> {
        Ok(self.opt_real(index)?.unwrap_or(default))
    }

    fn real(&self, index: usize) -> Result<f64, BdfError> {
        self.opt_real(index)?.ok_or_else(|| self.missing(index))
    }

    fn missing(&self, index: usize) -> BdfError {
        self.parse_error(BdfParseErrorKind::MissingField {
            card: self.name.clone(),
            field: Self::field_number(index),
        })
    }
}

pub struct BdfFile;

impl BdfFile {
    fn apply_card(
        model: &mut StructuralModel,
        card: RawCard,
    ) -> Result<BulkEntry, BdfError> {
        let line = card.line;
        let model_err = |source: ModelError| BdfError::Model { line, source };

        match card.name.as_str() {
            "GRID" => {
                let id = card.int(0)?;
                let position = Point3::new(
                    card.real_or(2, 0.0)?,
                    card.real_or(3, 0.0)?,
                    card.real_or(4, 0.0)?,
                );
                model.add_node(id, position).map_err(model_err)?;
            }
            "CQUAD4" | "CTRIA3" | "CBAR" | "CBUSH" => {
                let kind = ElementKind::from_card(&card.name);
                let id = card.int(0)?;
                let property_id = card.opt_int(1)?.unwrap_or(id);
                let count = kind.node_count().unwrap_or(0);
                let mut nodes = Vec::with_capacity(count);
                for i in 0..count {
                    match card.opt_int(2 + i)? {
                        Some(node) => nodes.push(node),
                        // CBUSH may be grounded at its second end.
                        None if kind == ElementKind::Bush && i > 0 => {}
                        None => return Err(card.missing(2 + i)),
                    }
                }
                model
                    .add_element(Element::new(id, kind, Some(property_id), nodes))
                    .map_err(model_err)?;
            }
            "CONM2" => {
                let id = card.int(0)?;
                let node = card.int(1)?;
                let mass = card.real_or(3, 0.0)?;
                model
                    .add_element(Element::point_mass(id, node, mass))
                    .map_err(model_err)?;
            }
            "MAT1" => {
                let id = card.int(0)?;
                let density = card.real_or(4, 0.0)?;
                model
                    .add_material(Material { id, density })
                    .map_err(model_err)?;
            }
            "PSHELL" => {
                let id = card.int(0)?;
                let material_id = match card.opt_int(1)? {
                    Some(mid) => mid,
                    None => card.int(3)?,
                };
                let thickness = card.real(2)?;
                let nsm = card.real_or(7, 0.0)?;
                model
                    .add_property(Property::new(
                        id,
                        PropertyData::Shell {
                            material_id,
                            thickness,
                            nsm,
                        },
                    ))
                    .map_err(model_err)?;
                return Ok(Self::property_entry(id, card, 2, thickness));
            }
            "PCOMP" => {
                let id = card.int(0)?;
                let nsm = card.real_or(2, 0.0)?;
                let mut plies: Vec<Ply> = Vec::new();
                let mut index = 8;
                while index < card.fields.len() {
                    let group_blank = (index..index + 4).all(|i| card.field(i).is_empty());
                    if !group_blank {
                        let previous = plies.last();
                        let material_id = match (card.opt_int(index)?, previous) {
                            (Some(mid), _) => mid,
                            (None, Some(prev)) => prev.material_id,
                            (None, None) => return Err(card.missing(index)),
                        };
                        let thickness = match (card.opt_real(index + 1)?, previous) {
                            (Some(t), _) => t,
                            (None, Some(prev)) => prev.thickness,
                            (None, None) => return Err(card.missing(index + 1)),
                        };
                        let theta = card.real_or(index + 2, 0.0)?;
                        plies.push(Ply {
                            material_id,
                            thickness,
                            theta,
                        });
                    }
                    index += 4;
                }
                let first_thickness = plies.first().map(|p| p.thickness);
                model
                    .add_property(Property::new(id, PropertyData::Composite { plies, nsm }))
                    .map_err(model_err)?;
                if let Some(original) = first_thickness {
                    return Ok(Self::property_entry(id, card, 9, original));
                }
            }
            "PBARL" => {
                let id = card.int(0)?;
                let material_id = card.int(1)?;
                let section = card.field(3).to_ascii_uppercase();
                let dim_count = PBARL_DIMENSIONS.get(section.as_str()).copied().unwrap_or_else(
                    || {
                        card.fields[8.min(card.fields.len())..]
                            .iter()
                            .take_while(|f| !f.is_empty())
                            .count()
                    },
                );
                let mut dimensions = Vec::with_capacity(dim_count);
                for i in 0..dim_count {
                    dimensions.push(card.real(8 + i)?);
                }
                let nsm = card.real_or(8 + dim_count, 0.0)?;
                let first_dimension = dimensions.first().copied();
                model
                    .add_property(Property::new(
                        id,
                        PropertyData::BarSection {
                            material_id,
                            section,
                            dimensions,
                            nsm,
                        },
                    ))
                    .map_err(model_err)?;
                if let Some(original) = first_dimension {
                    return Ok(Self::property_entry(id, card, 8, original));
                }
            }
            name if OPAQUE_PROPERTY_CARDS.contains(name) => {
                let id = card.int(0)?;
                model
                    .add_property(Property::new(
                        id,
                        PropertyData::Unsupported {
                            card: name.to_string(),
                        },
                    ))
                    .map_err(model_err)?;
            }
            _ => {}
        }
        Ok(BulkEntry::Verbatim(card.lines))
    }

    fn property_entry(id: PropertyId, card: RawCard, tunable_field: usize, original: f64) -> BulkEntry {
        BulkEntry::Property {
            id,
            card: card.name,
            fields: card.fields,
            tunable_field,
            original,
            lines: card.lines,
        }
    }

    fn write_free_field(
        writer: &mut impl Write,
        card: &str,
        fields: &[String],
    ) -> io::Result<()> {
        let used = fields
            .iter()
            .rposition(|f| !f.is_empty())
            .map_or(0, |last| last + 1);
        let chunks: Vec<&[String]> = fields[..used].chunks(8).collect();
        if chunks.is_empty() {
            return writeln!(writer, "{card}");
        }
        for (i, chunk) in chunks.iter().enumerate() {
            let head = if i == 0 { card } else { "+" };
            write!(writer, "{head}")?;
            for field in chunk.iter() {
                write!(writer, ",{field}")?;
            }
            if i + 1 < chunks.len() {
                write!(writer, ",+")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

impl ModelFile for BdfFile {
    type Metadata = BdfMetadata;
    type Error = BdfError;

    fn read_from(
        reader: &mut impl BufRead,
    ) -> Result<(StructuralModel, Self::Metadata), Self::Error> {
        let mut all_lines = Vec::new();
        for line in reader.lines() {
            all_lines.push(line?);
        }

        let mut metadata = BdfMetadata::default();
        let mut model = StructuralModel::new();

        let bulk_start = match all_lines.iter().position(|l| is_begin_bulk(l)) {
            Some(pos) => {
                metadata.header = all_lines[..=pos].to_vec();
                pos + 1
            }
            None => 0,
        };

        let mut index = bulk_start;
        while index < all_lines.len() {
            let line = &all_lines[index];
            if is_enddata(line) {
                metadata.trailer = all_lines[index..].to_vec();
                break;
            }
            if is_comment_or_blank(line) {
                metadata
                    .entries
                    .push(BulkEntry::Verbatim(vec![line.clone()]));
                index += 1;
                continue;
            }

            let start = index;
            index += 1;
            while index < all_lines.len() && is_continuation(&all_lines[index]) {
                index += 1;
            }
            let card = RawCard::from_lines(start + 1, all_lines[start..index].to_vec());
            let entry = Self::apply_card(&mut model, card)?;
            metadata.entries.push(entry);
        }

        Ok((model, metadata))
    }

    fn write_to(
        model: &StructuralModel,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        for line in &metadata.header {
            writeln!(writer, "{line}")?;
        }

        for entry in &metadata.entries {
            match entry {
                BulkEntry::Verbatim(lines) => {
                    for line in lines {
                        writeln!(writer, "{line}")?;
                    }
                }
                BulkEntry::Property {
                    id,
                    card,
                    fields,
                    tunable_field,
                    original,
                    lines,
                } => {
                    let current = model.property(*id).and_then(|p| p.tunable_value());
                    match current {
                        Some(value) if value.to_bits() != original.to_bits() => {
                            let mut fields = fields.clone();
                            if fields.len() <= *tunable_field {
                                fields.resize(tunable_field + 1, String::new());
                            }
                            fields[*tunable_field] = format_real(value);
                            if let Some(PropertyData::Composite { plies, .. }) =
                                model.property(*id).map(|p| &p.data)
                            {
                                spell_out_plies(&mut fields, plies);
                            }
                            Self::write_free_field(writer, card, &fields)?;
                        }
                        _ => {
                            for line in lines {
                                writeln!(writer, "{line}")?;
                            }
                        }
                    }
                }
            }
        }

        if metadata.trailer.is_empty() {
            if !metadata.header.is_empty() {
                writeln!(writer, "ENDDATA")?;
            }
        } else {
            for line in &metadata.trailer {
                writeln!(writer, "{line}")?;
            }
        }
        Ok(())
    }
}
