//! NDA form schema.
//!
//! Every fillable field the signing workflow knows about is declared once here. The PDF
//! filler binds values by these names, template authoring places widgets from the
//! `placement` rectangles, and the viewer renders its inputs from the same list.

use serde::Serialize;

/// US-letter page width in PDF points.
pub const PAGE_WIDTH: f32 = 612.0;
/// US-letter page height in PDF points.
pub const PAGE_HEIGHT: f32 = 792.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    SingleChoice,
    MultiChoice,
}

/// Widget rectangle in top-left page coordinates (y grows downwards).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Placement {
    pub x0: f32,
    pub y0_top: f32,
    pub x1: f32,
    pub y1_top: f32,
}

impl Placement {
    const fn new(x0: f32, y0_top: f32, x1: f32, y1_top: f32) -> Self {
        Self { x0, y0_top, x1, y1_top }
    }

    /// Rectangle as `[llx, lly, urx, ury]` in PDF user space on a letter page.
    pub fn to_pdf_rect(self) -> [f32; 4] {
        [self.x0, PAGE_HEIGHT - self.y1_top, self.x1, PAGE_HEIGHT - self.y0_top]
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct FieldDefinition {
    /// Exact AcroForm field name in the template.
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub options: &'static [&'static str],
    /// Alternate submission keys accepted for this field.
    pub aliases: &'static [&'static str],
    /// Must be non-empty before a fill is attempted.
    pub required: bool,
    /// Counted by the viewer's "requirements left" indicator.
    pub checklist: bool,
    pub placement: Placement,
}

impl FieldDefinition {
    pub fn matches_key(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }

    /// Canonical value to bind for `raw`, or `None` when `raw` is not an allowed choice.
    ///
    /// Choice matching ignores surrounding whitespace and ASCII case. Multi-choice values
    /// are comma separated and every member has to match.
    pub fn resolve_value(&self, raw: &str) -> Option<String> {
        match self.kind {
            FieldKind::Text => Some(raw.to_string()),
            FieldKind::SingleChoice => self.match_option(raw).map(str::to_string),
            FieldKind::MultiChoice => {
                self.resolve_multi(raw).map(|selected| selected.join(", "))
            }
        }
    }

    /// Selected options of a multi-choice value, in submission order without duplicates.
    pub fn resolve_multi(&self, raw: &str) -> Option<Vec<&'static str>> {
        let mut selected: Vec<&'static str> = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let option = self.match_option(part)?;
            if !selected.contains(&option) {
                selected.push(option);
            }
        }
        (!selected.is_empty()).then_some(selected)
    }

    fn match_option(&self, raw: &str) -> Option<&'static str> {
        let wanted = raw.trim();
        self.options.iter().copied().find(|option| option.eq_ignore_ascii_case(wanted))
    }
}

const YES_NO: &[&str] = &["Yes", "No"];

#[rustfmt::skip]
const FIELD_DEFINITIONS: &[FieldDefinition] = &[
    text("ref_id", "Reference #", &["reference_id"], false, true, Placement::new(45.0, 113.0, 108.0, 127.0)),
    text("listing_id", "Listing #", &[], false, true, Placement::new(120.0, 113.0, 200.0, 127.0)),
    text("listing_name", "Listing name", &[], false, true, Placement::new(287.0, 113.0, 585.0, 127.0)),
    FieldDefinition {
        name: "govt_affiliation",
        label: "Government affiliation",
        kind: FieldKind::SingleChoice,
        options: YES_NO,
        aliases: &[],
        required: false,
        checklist: false,
        placement: Placement::new(352.0, 403.0, 420.0, 414.0),
    },
    text("govt_explain", "Affiliation details", &[], false, false, Placement::new(420.0, 403.0, 550.0, 414.0)),
    text("name", "Name (print clearly)", &[], true, true, Placement::new(250.0, 452.0, 345.0, 462.0)),
    text("signature", "Signature", &[], false, true, Placement::new(416.0, 452.0, 552.0, 462.0)),
    text("street_address", "Street address", &[], false, false, Placement::new(180.0, 476.0, 320.0, 486.0)),
    text("city", "City", &[], false, false, Placement::new(404.0, 476.0, 450.0, 486.0)),
    text("state", "State", &[], false, false, Placement::new(452.0, 476.0, 473.0, 486.0)),
    text("zip", "Zip", &["zip_code"], false, false, Placement::new(475.0, 476.0, 552.0, 486.0)),
    text("email", "Email", &[], true, true, Placement::new(80.0, 506.0, 288.0, 516.0)),
    text("cell", "Cell #", &["phone"], false, true, Placement::new(430.0, 506.0, 520.0, 516.0)),
    FieldDefinition {
        name: "will_manage",
        label: "I will manage the business",
        kind: FieldKind::SingleChoice,
        options: YES_NO,
        aliases: &[],
        required: false,
        checklist: false,
        placement: Placement::new(227.0, 525.0, 350.0, 537.0),
    },
    FieldDefinition {
        name: "other_deciders",
        label: "Other deciders",
        kind: FieldKind::SingleChoice,
        options: &["None", "Spouse", "Partner", "Investors", "Family"],
        aliases: &[],
        required: false,
        checklist: false,
        placement: Placement::new(185.0, 539.0, 350.0, 550.0),
    },
    FieldDefinition {
        name: "industry_experience",
        label: "Industry experience",
        kind: FieldKind::SingleChoice,
        options: YES_NO,
        aliases: &[],
        required: false,
        checklist: false,
        placement: Placement::new(168.0, 561.0, 280.0, 573.0),
    },
    FieldDefinition {
        name: "timeframe",
        label: "Timeframe to purchase",
        kind: FieldKind::SingleChoice,
        options: &["ASAP", "0 to 3 Months", "3 to 6 Months", "6 to 12 Months", "12+ Months"],
        aliases: &["purchase_timeframe"],
        required: false,
        checklist: false,
        placement: Placement::new(413.0, 561.0, 553.0, 573.0),
    },
    text("liquid_assets", "Liquid assets", &[], false, false, Placement::new(203.0, 599.0, 340.0, 611.0)),
    text("real_estate", "Real estate", &[], false, false, Placement::new(443.0, 599.0, 520.0, 611.0)),
    text("retirement_401k", "401K, SEP, SIMPLE, Roth, IRA", &[], false, false, Placement::new(182.0, 616.0, 340.0, 628.0)),
    FieldDefinition {
        name: "funds_for_business",
        label: "Funds for this business",
        kind: FieldKind::SingleChoice,
        options: &["Cash", "SBA Loan", "Seller Financing", "Investor Funds", "Other"],
        aliases: &[],
        required: false,
        checklist: false,
        placement: Placement::new(500.0, 616.0, 593.0, 628.0),
    },
    text("partner_name", "Partner's name", &[], false, false, Placement::new(216.0, 631.0, 285.0, 645.0)),
    FieldDefinition {
        name: "using",
        label: "I'm using",
        kind: FieldKind::MultiChoice,
        options: &["Broker", "Attorney", "Accountant", "Advisor"],
        aliases: &[],
        required: false,
        checklist: false,
        placement: Placement::new(358.0, 631.0, 458.0, 645.0),
    },
];

const fn text(
    name: &'static str,
    label: &'static str,
    aliases: &'static [&'static str],
    required: bool,
    checklist: bool,
    placement: Placement,
) -> FieldDefinition {
    FieldDefinition {
        name,
        label,
        kind: FieldKind::Text,
        options: &[],
        aliases,
        required,
        checklist,
        placement,
    }
}

/// All NDA fields in template order.
pub fn field_definitions() -> &'static [FieldDefinition] {
    FIELD_DEFINITIONS
}

pub fn find_field(name: &str) -> Option<&'static FieldDefinition> {
    FIELD_DEFINITIONS.iter().find(|field| field.name == name)
}

/// Schema field a submission key binds to, by template name or alias.
pub fn field_for_key(key: &str) -> Option<&'static FieldDefinition> {
    FIELD_DEFINITIONS.iter().find(|field| field.matches_key(key))
}
