//! Record types and their field tables.

use serde::Serialize;

/// One of the flat business entities stored in the `records` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Drilling,
    Blasting,
    Loading,
    Transport,
    Attendance,
    Fuel,
    Safety,
    Inventory,
    Dispatch,
    Account,
    Permit,
    Stock,
    CrusherProduction,
    EbReport,
    JcbOperation,
    Sale,
    Customer,
    Media,
}

impl RecordKind {
    pub const ALL: [Self; 18] = [
        Self::Drilling,
        Self::Blasting,
        Self::Loading,
        Self::Transport,
        Self::Attendance,
        Self::Fuel,
        Self::Safety,
        Self::Inventory,
        Self::Dispatch,
        Self::Account,
        Self::Permit,
        Self::Stock,
        Self::CrusherProduction,
        Self::EbReport,
        Self::JcbOperation,
        Self::Sale,
        Self::Customer,
        Self::Media,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drilling => "drilling",
            Self::Blasting => "blasting",
            Self::Loading => "loading",
            Self::Transport => "transport",
            Self::Attendance => "attendance",
            Self::Fuel => "fuel",
            Self::Safety => "safety",
            Self::Inventory => "inventory",
            Self::Dispatch => "dispatch",
            Self::Account => "account",
            Self::Permit => "permit",
            Self::Stock => "stock",
            Self::CrusherProduction => "crusher_production",
            Self::EbReport => "eb_report",
            Self::JcbOperation => "jcb_operation",
            Self::Sale => "sale",
            Self::Customer => "customer",
            Self::Media => "media",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    /// Human label used for navigation and form titles.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Drilling => "Drilling",
            Self::Blasting => "Blasting",
            Self::Loading => "Loading",
            Self::Transport => "Transport",
            Self::Attendance => "Attendance",
            Self::Fuel => "Fuel",
            Self::Safety => "Safety",
            Self::Inventory => "Inventory",
            Self::Dispatch => "Dispatch",
            Self::Account => "Accounts",
            Self::Permit => "Permits",
            Self::Stock => "Stock",
            Self::CrusherProduction => "Crusher Production",
            Self::EbReport => "EB Reports",
            Self::JcbOperation => "JCB Operations",
            Self::Sale => "Sales",
            Self::Customer => "Customers",
            Self::Media => "Media",
        }
    }

    /// Whether rows of this kind go through the pending/approved/rejected workflow.
    #[must_use]
    pub fn requires_approval(self) -> bool {
        !matches!(self, Self::Customer | Self::Media)
    }

    /// Field whose value is copied into `records.record_date` for filtering.
    #[must_use]
    pub fn date_field(self) -> Option<&'static str> {
        match self {
            Self::Customer | Self::Media => None,
            Self::Permit => Some("issued_on"),
            _ => Some("date"),
        }
    }

    #[must_use]
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Drilling => DRILLING,
            Self::Blasting => BLASTING,
            Self::Loading => LOADING,
            Self::Transport => TRANSPORT,
            Self::Attendance => ATTENDANCE,
            Self::Fuel => FUEL,
            Self::Safety => SAFETY,
            Self::Inventory => INVENTORY,
            Self::Dispatch => DISPATCH,
            Self::Account => ACCOUNT,
            Self::Permit => PERMIT,
            Self::Stock => STOCK,
            Self::CrusherProduction => CRUSHER_PRODUCTION,
            Self::EbReport => EB_REPORT,
            Self::JcbOperation => JCB_OPERATION,
            Self::Sale => SALE,
            Self::Customer => CUSTOMER,
            Self::Media => MEDIA,
        }
    }

    #[must_use]
    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Names of values computed at submit time.
    #[must_use]
    pub fn derived_fields(self) -> &'static [&'static str] {
        match self {
            Self::Drilling => &["total_meters", "working_hours"],
            Self::Blasting => &["powder_factor"],
            Self::Loading => &["loaded_volume_m3"],
            Self::Transport => &["total_tons"],
            Self::Attendance => &["hours_worked"],
            Self::Fuel => &["fuel_cost"],
            Self::Inventory => &["total_value"],
            Self::Permit => &["validity_days"],
            Self::Stock => &["closing_tons"],
            Self::CrusherProduction => &["running_hours", "output_per_hour", "yield_percent"],
            Self::EbReport => &["units_consumed", "amount"],
            Self::JcbOperation => &["hours", "amount"],
            Self::Sale => &["total_amount"],
            Self::Safety | Self::Dispatch | Self::Account | Self::Customer | Self::Media => &[],
        }
    }

    /// Numeric schema fields followed by derived values; the columns a summary totals.
    #[must_use]
    pub fn numeric_fields(self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = self
            .fields()
            .iter()
            .filter(|f| matches!(f.ty, FieldType::Number | FieldType::Integer))
            .map(|f| f.name)
            .collect();
        for name in self.derived_fields() {
            if !out.contains(name) {
                out.push(name);
            }
        }
        out
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    LongText,
    Number,
    Integer,
    Date,
    Time,
    Choice { options: &'static [&'static str] },
    Reference { kind: RecordKind },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub ty: FieldType,
    pub required: bool,
    /// Set by the server (e.g. upload metadata); rejected in submissions.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub system: bool,
}

const fn req(name: &'static str, label: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, label, ty, required: true, system: false }
}

const fn opt(name: &'static str, label: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, label, ty, required: false, system: false }
}

const fn sys(name: &'static str, label: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, label, ty, required: false, system: true }
}

const SHIFTS: &[&str] = &["day", "night", "general"];
const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];
const ENTRY_TYPES: &[&str] = &["credit", "debit"];
const PAYMENT_STATUSES: &[&str] = &["paid", "unpaid", "partial"];

use FieldType::{Date, Integer, LongText, Number, Text, Time};

const DRILLING: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("location", "Bench / location", Text),
    opt("machine_id", "Machine", Text),
    opt("operator", "Operator", Text),
    req("holes_drilled", "Holes drilled", Integer),
    req("hole_depth_m", "Hole depth (m)", Number),
    opt("diameter_mm", "Diameter (mm)", Number),
    opt("start_time", "Start time", Time),
    opt("end_time", "End time", Time),
    opt("notes", "Notes", LongText),
];

const BLASTING: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("location", "Bench / location", Text),
    req("holes_charged", "Holes charged", Integer),
    req("explosive_kg", "Explosive (kg)", Number),
    opt("detonators", "Detonators", Integer),
    opt("blast_volume_m3", "Blast volume (m³)", Number),
    opt("supervisor", "Supervisor", Text),
    opt("notes", "Notes", LongText),
];

const LOADING: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("machine_id", "Machine", Text),
    req("material", "Material", Text),
    req("trips", "Trips", Integer),
    opt("bucket_capacity_m3", "Bucket capacity (m³)", Number),
    opt("operator", "Operator", Text),
    opt("notes", "Notes", LongText),
];

const TRANSPORT: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("vehicle_no", "Vehicle number", Text),
    opt("driver", "Driver", Text),
    opt("source", "Source", Text),
    req("destination", "Destination", Text),
    req("trips", "Trips", Integer),
    req("tons_per_trip", "Tons per trip", Number),
    opt("notes", "Notes", LongText),
];

const ATTENDANCE: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("employee_name", "Employee", Text),
    opt("shift", "Shift", FieldType::Choice { options: SHIFTS }),
    req("check_in", "Check in", Time),
    opt("check_out", "Check out", Time),
    opt("notes", "Notes", LongText),
];

const FUEL: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("vehicle_no", "Vehicle / machine", Text),
    req("litres", "Litres", Number),
    opt("rate_per_litre", "Rate per litre", Number),
    opt("meter_reading", "Meter reading", Number),
    opt("notes", "Notes", LongText),
];

const SAFETY: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("location", "Location", Text),
    req("incident_type", "Incident type", Text),
    req("severity", "Severity", FieldType::Choice { options: SEVERITIES }),
    req("description", "Description", LongText),
    opt("action_taken", "Action taken", LongText),
];

const INVENTORY: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("item_name", "Item", Text),
    opt("category", "Category", Text),
    req("quantity", "Quantity", Number),
    req("unit", "Unit", Text),
    opt("unit_cost", "Unit cost", Number),
];

const DISPATCH: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("customer_id", "Customer", FieldType::Reference { kind: RecordKind::Customer }),
    req("vehicle_no", "Vehicle number", Text),
    req("material", "Material", Text),
    req("quantity_tons", "Quantity (t)", Number),
    opt("challan_no", "Challan number", Text),
    opt("destination", "Destination", Text),
];

const ACCOUNT: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("description", "Description", Text),
    opt("category", "Category", Text),
    req("entry_type", "Entry type", FieldType::Choice { options: ENTRY_TYPES }),
    req("amount", "Amount", Number),
];

const PERMIT: &[FieldSpec] = &[
    req("permit_no", "Permit number", Text),
    req("permit_type", "Permit type", Text),
    req("issued_on", "Issued on", Date),
    req("valid_until", "Valid until", Date),
    opt("quantity_allowed", "Quantity allowed (t)", Number),
    opt("authority", "Issuing authority", Text),
];

const STOCK: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("material", "Material", Text),
    req("opening_tons", "Opening stock (t)", Number),
    opt("produced_tons", "Produced (t)", Number),
    opt("dispatched_tons", "Dispatched (t)", Number),
];

const CRUSHER_PRODUCTION: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("crusher_id", "Crusher", Text),
    opt("material", "Material", Text),
    req("start_time", "Start time", Time),
    req("end_time", "End time", Time),
    req("input_tons", "Input (t)", Number),
    req("output_tons", "Output (t)", Number),
];

const EB_REPORT: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("meter_no", "Meter number", Text),
    req("opening_reading", "Opening reading", Number),
    req("closing_reading", "Closing reading", Number),
    opt("rate_per_unit", "Rate per unit", Number),
];

const JCB_OPERATION: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("machine_id", "Machine", Text),
    opt("operator", "Operator", Text),
    req("start_time", "Start time", Time),
    req("end_time", "End time", Time),
    opt("work_description", "Work description", LongText),
    opt("rate_per_hour", "Rate per hour", Number),
];

const SALE: &[FieldSpec] = &[
    req("date", "Date", Date),
    req("customer_id", "Customer", FieldType::Reference { kind: RecordKind::Customer }),
    req("material", "Material", Text),
    req("quantity_tons", "Quantity (t)", Number),
    req("rate_per_ton", "Rate per ton", Number),
    opt("invoice_no", "Invoice number", Text),
    opt("payment_status", "Payment status", FieldType::Choice { options: PAYMENT_STATUSES }),
];

const CUSTOMER: &[FieldSpec] = &[
    req("name", "Name", Text),
    opt("phone", "Phone", Text),
    opt("email", "Email", Text),
    opt("address", "Address", LongText),
    opt("gst_no", "GST number", Text),
];

const MEDIA: &[FieldSpec] = &[
    req("title", "Title", Text),
    opt("description", "Description", LongText),
    sys("file_name", "File name", Text),
    sys("content_type", "Content type", Text),
    sys("size_bytes", "Size (bytes)", Integer),
    sys("storage_key", "Storage key", Text),
];
