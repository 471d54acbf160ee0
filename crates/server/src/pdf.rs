//! AcroForm filling and template authoring on top of lopdf.
//!
//! Filling binds submission values into the template's existing form fields by full field
//! name. Nothing outside the form tree is rewritten, so the body text and fonts of the template
//! survive untouched. Output is a pure function of the template bytes and the values.

use std::collections::{BTreeMap, BTreeSet};

use leadsign_core::config::PdfMode;
use leadsign_core::form::{field_definitions, FieldDefinition, FieldKind};
use leadsign_core::pipeline::DocumentFiller;
use leadsign_core::{FillError, FillFailure, FilledDocument, FormSubmission};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

const FORM_FONT: &str = "Helv";
const FLATTEN_FONT: &str = "LsHelv";
const DEFAULT_FONT_SIZE: f32 = 9.0;
const READ_ONLY_BIT: i64 = 1;
const MAX_TREE_DEPTH: usize = 32;

pub struct LopdfFiller {
    mode: PdfMode,
}

impl LopdfFiller {
    pub fn new(mode: PdfMode) -> Self {
        Self { mode }
    }
}

impl DocumentFiller for LopdfFiller {
    fn fill(
        &self,
        template: &[u8],
        submission: &FormSubmission,
    ) -> Result<FilledDocument, FillFailure> {
        let mut doc = Document::load_mem(template)
            .map_err(|error| FillFailure::TemplateParse(error.to_string()))?;
        let acroform_id = ensure_acroform(&mut doc).map_err(parse_failure)?;
        let fields = collect_fields(&doc, acroform_id).map_err(parse_failure)?;

        let mut issues = Vec::new();
        let mut bound = Vec::new();
        for definition in field_definitions() {
            let Some(raw) = submission.get(definition.name) else {
                continue;
            };
            let Some(field) = fields.terminals.get(definition.name) else {
                issues.push(FillError::UnknownTemplateField { field: definition.name.to_string() });
                continue;
            };
            let Some(value) = bind_value(definition, raw, field.max_len, &mut issues) else {
                continue;
            };
            set_field_value(&mut doc, field, &value).map_err(render_failure)?;
            bound.push((field, value));
        }

        match self.mode {
            PdfMode::Live => keep_editable(&mut doc, acroform_id, &fields),
            PdfMode::Flatten => flatten(&mut doc, &fields, &bound),
        }
        .map_err(render_failure)?;

        debug!(
            event_name = "pdf.filled",
            mode = ?self.mode,
            bound = bound.len(),
            issues = issues.len(),
            "template filled"
        );

        Ok(FilledDocument { bytes: serialize(&mut doc)?, issues })
    }
}

/// Replaces the widgets on page one with one text field per schema placement.
pub fn add_form_fields(template: &[u8]) -> Result<Vec<u8>, FillFailure> {
    let mut doc = Document::load_mem(template)
        .map_err(|error| FillFailure::TemplateParse(error.to_string()))?;
    let page_id = doc
        .get_pages()
        .get(&1)
        .copied()
        .ok_or_else(|| FillFailure::TemplateParse("template has no pages".to_string()))?;

    let mut annots = Vec::new();
    for annot in page_annots(&doc, page_id) {
        if !is_widget(&doc, &annot) {
            annots.push(annot);
        }
    }

    let font_id = doc.add_object(helvetica());
    let mut fields = Vec::new();
    for definition in field_definitions() {
        let rect = definition.placement.to_pdf_rect();
        let widget = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(definition.name),
            "TU" => Object::string_literal(definition.label),
            "V" => Object::string_literal(""),
            "DA" => Object::string_literal(format!("/{FORM_FONT} {DEFAULT_FONT_SIZE} Tf 0 g")),
            "Rect" => rect.iter().map(|n| Object::Real(*n)).collect::<Vec<_>>(),
            "F" => Object::Integer(4),
            "P" => page_id,
        };
        let widget_id = doc.add_object(widget);
        annots.push(Object::Reference(widget_id));
        fields.push(Object::Reference(widget_id));
    }

    page_dict_mut(&mut doc, page_id).map_err(render_failure)?.set("Annots", annots);

    let acroform = dictionary! {
        "Fields" => fields,
        "DA" => Object::string_literal(format!("/{FORM_FONT} 0 Tf 0 g")),
        "DR" => dictionary! { "Font" => dictionary! { FORM_FONT => font_id } },
        "NeedAppearances" => true,
    };
    let acroform_id = doc.add_object(acroform);
    catalog_mut(&mut doc).map_err(render_failure)?.set("AcroForm", acroform_id);

    doc.prune_objects();
    serialize(&mut doc)
}

/// Terminal field with the widgets that display it.
#[derive(Clone, Debug)]
struct TemplateField {
    id: ObjectId,
    widgets: Vec<ObjectId>,
    max_len: Option<usize>,
}

#[derive(Debug, Default)]
struct FieldTree {
    terminals: BTreeMap<String, TemplateField>,
    nodes: Vec<ObjectId>,
}

impl FieldTree {
    fn all_widgets(&self) -> BTreeSet<ObjectId> {
        self.terminals.values().flat_map(|field| field.widgets.iter().copied()).collect()
    }
}

fn bind_value(
    definition: &FieldDefinition,
    raw: &str,
    max_len: Option<usize>,
    issues: &mut Vec<FillError>,
) -> Option<String> {
    match definition.kind {
        FieldKind::Text => Some(match max_len {
            Some(limit) => raw.chars().take(limit).collect(),
            None => raw.to_string(),
        }),
        FieldKind::SingleChoice | FieldKind::MultiChoice => {
            if raw.trim().is_empty() {
                return None;
            }
            let resolved = definition.resolve_value(raw);
            if resolved.is_none() {
                issues.push(FillError::InvalidChoiceValue {
                    field: definition.name.to_string(),
                    value: raw.to_string(),
                });
            }
            resolved
        }
    }
}

fn parse_failure(error: lopdf::Error) -> FillFailure {
    FillFailure::TemplateParse(error.to_string())
}

fn render_failure(error: lopdf::Error) -> FillFailure {
    FillFailure::Render(error.to_string())
}

fn serialize(doc: &mut Document) -> Result<Vec<u8>, FillFailure> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|error| FillFailure::Render(error.to_string()))?;
    Ok(bytes)
}

fn helvetica() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }
}

fn root_id(doc: &Document) -> lopdf::Result<ObjectId> {
    doc.trailer.get(b"Root")?.as_reference()
}

fn catalog_mut(doc: &mut Document) -> lopdf::Result<&mut Dictionary> {
    let id = root_id(doc)?;
    doc.get_object_mut(id)?.as_dict_mut()
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<&mut Dictionary> {
    doc.get_object_mut(page_id)?.as_dict_mut()
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> =
                rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// PDF text string: literal for ASCII, UTF-16BE with a byte order mark otherwise.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn page_annots(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| resolve(doc, annots))
        .and_then(|annots| annots.as_array().ok())
        .cloned()
        .unwrap_or_default()
}

fn is_widget(doc: &Document, annot: &Object) -> bool {
    resolve(doc, annot)
        .and_then(|object| object.as_dict().ok())
        .and_then(|dict| dict.get(b"Subtype").ok())
        .and_then(|subtype| subtype.as_name().ok())
        .is_some_and(|name| name == b"Widget")
}

/// Makes sure the catalog points at an indirect AcroForm that lists every field, rebuilding
/// `/Fields` from page widgets when a template only carries annotations.
fn ensure_acroform(doc: &mut Document) -> lopdf::Result<ObjectId> {
    let existing = doc.get_dictionary(root_id(doc)?)?.get(b"AcroForm").ok().cloned();
    let acroform_id = match existing {
        Some(Object::Reference(id)) => id,
        Some(Object::Dictionary(inline)) => doc.add_object(inline),
        _ => doc.add_object(Dictionary::new()),
    };
    catalog_mut(doc)?.set("AcroForm", acroform_id);

    let has_fields = doc
        .get_dictionary(acroform_id)?
        .get(b"Fields")
        .ok()
        .and_then(|fields| resolve(doc, fields))
        .and_then(|fields| fields.as_array().ok())
        .is_some_and(|fields| !fields.is_empty());
    let has_resources = doc.get_dictionary(acroform_id)?.has(b"DR");

    let rebuilt = if has_fields { None } else { Some(fields_from_widgets(doc)) };
    let font_id = if has_resources { None } else { Some(doc.add_object(helvetica())) };

    let acroform = doc.get_object_mut(acroform_id)?.as_dict_mut()?;
    if let Some(fields) = rebuilt {
        acroform.set("Fields", fields.into_iter().map(Object::Reference).collect::<Vec<_>>());
    }
    if let Some(font_id) = font_id {
        acroform.set("DR", dictionary! { "Font" => dictionary! { FORM_FONT => font_id } });
        if !acroform.has(b"DA") {
            acroform.set("DA", Object::string_literal(format!("/{FORM_FONT} 0 Tf 0 g")));
        }
    }
    Ok(acroform_id)
}

/// Top-level fields owning the widgets found in page annotations, in page order.
fn fields_from_widgets(doc: &Document) -> Vec<ObjectId> {
    let mut roots = Vec::new();
    for page_id in doc.get_pages().into_values() {
        for annot in page_annots(doc, page_id) {
            let Object::Reference(widget_id) = annot else {
                continue;
            };
            if !is_widget(doc, &annot) {
                continue;
            }
            let root = field_root(doc, widget_id);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
    }
    roots
}

fn field_root(doc: &Document, widget_id: ObjectId) -> ObjectId {
    let mut current = widget_id;
    for _ in 0..MAX_TREE_DEPTH {
        let parent = doc
            .get_dictionary(current)
            .ok()
            .and_then(|dict| dict.get(b"Parent").ok())
            .and_then(|parent| parent.as_reference().ok());
        match parent {
            Some(parent_id) => current = parent_id,
            None => break,
        }
    }
    current
}

fn collect_fields(doc: &Document, acroform_id: ObjectId) -> lopdf::Result<FieldTree> {
    let mut tree = FieldTree::default();
    let roots: Vec<ObjectId> = doc
        .get_dictionary(acroform_id)?
        .get(b"Fields")
        .ok()
        .and_then(|fields| resolve(doc, fields))
        .and_then(|fields| fields.as_array().ok())
        .map(|fields| fields.iter().filter_map(|field| field.as_reference().ok()).collect())
        .unwrap_or_default();

    for id in roots {
        walk_field(doc, id, None, None, 0, &mut tree);
    }
    Ok(tree)
}

fn walk_field(
    doc: &Document,
    id: ObjectId,
    parent_name: Option<&str>,
    inherited_max_len: Option<usize>,
    depth: usize,
    tree: &mut FieldTree,
) {
    if depth > MAX_TREE_DEPTH || tree.nodes.contains(&id) {
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        return;
    };
    tree.nodes.push(id);

    let partial = dict.get(b"T").ok().and_then(|t| t.as_str().ok()).map(decode_text);
    let name = match (parent_name, partial) {
        (Some(parent), Some(partial)) => format!("{parent}.{partial}"),
        (None, Some(partial)) => partial,
        (Some(parent), None) => parent.to_string(),
        (None, None) => return,
    };
    let max_len = dict
        .get(b"MaxLen")
        .ok()
        .and_then(|value| value.as_i64().ok())
        .and_then(|value| usize::try_from(value).ok())
        .or(inherited_max_len);

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .ok()
        .and_then(|kids| resolve(doc, kids))
        .and_then(|kids| kids.as_array().ok())
        .map(|kids| kids.iter().filter_map(|kid| kid.as_reference().ok()).collect())
        .unwrap_or_default();

    let (named_kids, widget_kids): (Vec<ObjectId>, Vec<ObjectId>) =
        kids.into_iter().partition(|kid| {
            doc.get_dictionary(*kid).map(|kid| kid.has(b"T")).unwrap_or(false)
        });

    for kid in named_kids {
        walk_field(doc, kid, Some(&name), max_len, depth + 1, tree);
    }

    let widgets = if widget_kids.is_empty() {
        if dict.has(b"Rect") {
            vec![id]
        } else {
            Vec::new()
        }
    } else {
        tree.nodes.extend(widget_kids.iter().copied());
        widget_kids
    };
    if !widgets.is_empty() || !dict.has(b"Kids") {
        tree.terminals.insert(name, TemplateField { id, widgets, max_len });
    }
}

fn set_field_value(doc: &mut Document, field: &TemplateField, value: &str) -> lopdf::Result<()> {
    doc.get_object_mut(field.id)?.as_dict_mut()?.set("V", text_string(value));
    for widget in &field.widgets {
        doc.get_object_mut(*widget)?.as_dict_mut()?.remove(b"AP");
    }
    Ok(())
}

fn keep_editable(
    doc: &mut Document,
    acroform_id: ObjectId,
    fields: &FieldTree,
) -> lopdf::Result<()> {
    doc.get_object_mut(acroform_id)?.as_dict_mut()?.set("NeedAppearances", true);
    for id in &fields.nodes {
        let Ok(dict) = doc.get_object_mut(*id).and_then(Object::as_dict_mut) else {
            continue;
        };
        if let Ok(flags) = dict.get(b"Ff").and_then(Object::as_i64) {
            dict.set("Ff", Object::Integer(flags & !READ_ONLY_BIT));
        }
    }
    Ok(())
}

/// Draws bound values into the page content and drops the interactive form.
fn flatten(
    doc: &mut Document,
    fields: &FieldTree,
    bound: &[(&TemplateField, String)],
) -> lopdf::Result<()> {
    let mut widget_pages = BTreeMap::new();
    for (_, page_id) in doc.get_pages() {
        for annot in page_annots(doc, page_id) {
            if let Object::Reference(annot_id) = annot {
                widget_pages.insert(annot_id, page_id);
            }
        }
    }

    let mut drawings: BTreeMap<ObjectId, Vec<Operation>> = BTreeMap::new();
    for (field, value) in bound {
        if value.trim().is_empty() {
            continue;
        }
        for widget in &field.widgets {
            let Some(page_id) = widget_pages.get(widget).copied() else {
                continue;
            };
            let widget_dict = doc.get_dictionary(*widget)?;
            let Some(rect) = widget_rect(widget_dict) else {
                continue;
            };
            let size = font_size(widget_dict, doc.get_dictionary(field.id).ok());
            drawings.entry(page_id).or_default().extend(text_operations(rect, size, value));
        }
    }

    if !drawings.is_empty() {
        let font_id = doc.add_object(helvetica());
        for (page_id, operations) in drawings {
            draw_on_page(doc, page_id, font_id, operations)?;
        }
    }

    let widgets = fields.all_widgets();
    for page_id in doc.get_pages().into_values() {
        let annots = page_annots(doc, page_id);
        if annots.is_empty() {
            continue;
        }
        let kept: Vec<Object> = annots
            .into_iter()
            .filter(|annot| !matches!(annot, Object::Reference(id) if widgets.contains(id)))
            .collect();
        let page = page_dict_mut(doc, page_id)?;
        if kept.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", kept);
        }
    }

    catalog_mut(doc)?.remove(b"AcroForm");
    doc.prune_objects();
    Ok(())
}

fn widget_rect(widget: &Dictionary) -> Option<[f32; 4]> {
    let rect = widget.get(b"Rect").ok()?.as_array().ok()?;
    let values: Vec<f32> = rect.iter().filter_map(number).collect();
    let [x0, y0, x1, y1] = <[f32; 4]>::try_from(values).ok()?;
    Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

/// Font size from the widget's (or field's) `/DA`; auto-size `0` falls back to the default.
fn font_size(widget: &Dictionary, field: Option<&Dictionary>) -> f32 {
    let appearance = widget
        .get(b"DA")
        .ok()
        .or_else(|| field.and_then(|field| field.get(b"DA").ok()))
        .and_then(|da| da.as_str().ok())
        .map(|da| String::from_utf8_lossy(da).into_owned())
        .unwrap_or_default();
    let tokens: Vec<&str> = appearance.split_whitespace().collect();
    tokens
        .windows(2)
        .find(|pair| pair[1] == "Tf")
        .and_then(|pair| pair[0].parse::<f32>().ok())
        .filter(|size| *size > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE)
}

fn text_operations(rect: [f32; 4], size: f32, value: &str) -> Vec<Operation> {
    let [x0, y0, _, y1] = rect;
    let baseline = y0 + ((y1 - y0) - size).max(0.0) / 2.0 + size * 0.2;
    let encoded: Vec<u8> =
        value.chars().map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?')).collect();
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FLATTEN_FONT.as_bytes().to_vec()), Object::Real(size)],
        ),
        Operation::new("Td", vec![Object::Real(x0 + 2.0), Object::Real(baseline)]),
        Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

/// Page resources as a standalone dictionary, resolving inheritance from the page tree.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let Ok(node) = doc.get_dictionary(current) else {
            break;
        };
        if let Some(resources) = node
            .get(b"Resources")
            .ok()
            .and_then(|resources| resolve(doc, resources))
            .and_then(|resources| resources.as_dict().ok())
        {
            return resources.clone();
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    Dictionary::new()
}

fn draw_on_page(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    operations: Vec<Operation>,
) -> lopdf::Result<()> {
    let mut resources = effective_resources(doc, page_id);
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|fonts| resolve(doc, fonts))
        .and_then(|fonts| fonts.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    fonts.set(FLATTEN_FONT, font_id);
    resources.set("Font", fonts);

    let mut existing = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Array(streams)) => streams.clone(),
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        _ => Vec::new(),
    };

    let mut drawing = vec![Operation::new("Q", vec![]), Operation::new("q", vec![])];
    drawing.extend(operations);
    drawing.push(Operation::new("Q", vec![]));
    let encoded = Content { operations: drawing }.encode()?;

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let draw_id = doc.add_object(Stream::new(Dictionary::new(), encoded));
    let mut contents = vec![Object::Reference(save_id)];
    contents.append(&mut existing);
    contents.push(Object::Reference(draw_id));

    let page = page_dict_mut(doc, page_id)?;
    page.set("Resources", resources);
    page.set("Contents", contents);
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, ObjectId, Stream};

    /// One blank letter page with a line of body text and no form.
    pub fn blank_page() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal("Mutual Non-Disclosure Agreement")],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(dictionary! {}, content.encode().expect("encode")));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    pub fn save(mut doc: Document) -> Vec<u8> {
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save fixture");
        bytes
    }

    /// Blank page authored with the full schema.
    pub fn nda_template() -> Vec<u8> {
        let (doc, _) = blank_page();
        super::add_form_fields(&save(doc)).expect("author template")
    }

    /// Text widgets for `names` that live only in the page annotations, optionally with
    /// `/MaxLen` and a read-only flag.
    pub fn annots_only_template(names: &[(&str, Option<i64>)]) -> Vec<u8> {
        let (mut doc, page_id) = blank_page();
        let mut annots = Vec::new();
        for (index, (name, max_len)) in names.iter().enumerate() {
            let top = 700.0 - index as f32 * 20.0;
            let mut widget = dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Tx",
                "T" => Object::string_literal(*name),
                "Ff" => Object::Integer(1),
                "DA" => Object::string_literal("/Helv 9 Tf 0 g"),
                "Rect" => vec![
                    Object::Real(100.0),
                    Object::Real(top - 12.0),
                    Object::Real(300.0),
                    Object::Real(top),
                ],
                "P" => page_id,
            };
            if let Some(limit) = max_len {
                widget.set("MaxLen", Object::Integer(*limit));
            }
            annots.push(Object::Reference(doc.add_object(widget)));
        }
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .expect("page")
            .set("Annots", annots);
        save(doc)
    }

    pub fn catalog(doc: &Document) -> &lopdf::Dictionary {
        let root = super::root_id(doc).expect("root");
        doc.get_dictionary(root).expect("catalog")
    }

    pub fn read_form(bytes: &[u8]) -> std::collections::BTreeMap<String, String> {
        let doc = Document::load_mem(bytes).expect("load output");
        let acroform_id =
            catalog(&doc).get(b"AcroForm").and_then(Object::as_reference).expect("acroform");
        let tree = super::collect_fields(&doc, acroform_id).expect("fields");
        tree.terminals
            .iter()
            .map(|(name, field)| {
                let value = doc
                    .get_dictionary(field.id)
                    .ok()
                    .and_then(|dict| dict.get(b"V").ok())
                    .and_then(|v| v.as_str().ok())
                    .map(super::decode_text)
                    .unwrap_or_default();
                (name.clone(), value)
            })
            .collect()
    }
}
