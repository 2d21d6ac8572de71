//! Core types for the board.
//!
//! Serialized field and variant names follow the documents already stored
//! in the hosted collection (`postura`, `subprefeitura`, `"Obras"`, ...).

use crate::error::{RequiredField, ValidationError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Store-assigned document identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    /// Generate a fresh 20-character identifier.
    ///
    /// Mixes wall-clock nanoseconds, a process-wide counter and the caller's
    /// salt through SHA-256.
    pub fn generate(salt: &[u8]) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut hasher = Sha256::new();
        hasher.update(nanos.to_le_bytes());
        hasher.update(ID_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        hasher.update(salt);
        let digest = hasher.finalize();
        RecordId(hex::encode(&digest[..10]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A label that does not name any known category, kind or region.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown label: {0}")]
pub struct UnknownLabel(pub String);

/// Civic category ("postura") of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Obras")]
    Works,
    #[serde(rename = "MPL")]
    Mpl,
    #[serde(rename = "Atividades")]
    Activities,
    #[serde(rename = "Ambulantes")]
    StreetVendors,
    #[serde(rename = "Publicidade")]
    Advertising,
    #[serde(rename = "Área Pública")]
    PublicArea,
    #[serde(rename = "POP")]
    Pop,
    #[serde(rename = "Defesa Civil")]
    CivilDefense,
    #[serde(rename = "Outras")]
    Other,
}

impl Category {
    /// Every storable category, in display order.
    pub const ALL: [Category; 9] = [
        Category::Works,
        Category::Mpl,
        Category::Activities,
        Category::StreetVendors,
        Category::Advertising,
        Category::PublicArea,
        Category::Pop,
        Category::CivilDefense,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Works => "Obras",
            Category::Mpl => "MPL",
            Category::Activities => "Atividades",
            Category::StreetVendors => "Ambulantes",
            Category::Advertising => "Publicidade",
            Category::PublicArea => "Área Pública",
            Category::Pop => "POP",
            Category::CivilDefense => "Defesa Civil",
            Category::Other => "Outras",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Works
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Content kind of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "Dica")]
    Tip,
    #[serde(rename = "Resumo")]
    Summary,
    #[serde(rename = "Risco")]
    RiskAlert,
    #[serde(rename = "Documento")]
    Document,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Tip, Kind::Summary, Kind::RiskAlert, Kind::Document];

    /// Stored name.
    pub fn code(self) -> &'static str {
        match self {
            Kind::Tip => "Dica",
            Kind::Summary => "Resumo",
            Kind::RiskAlert => "Risco",
            Kind::Document => "Documento",
        }
    }

    /// Human-facing name.
    pub fn label(self) -> &'static str {
        match self {
            Kind::Tip => "Dica Prática",
            Kind::Summary => "Resumo",
            Kind::RiskAlert => "Risco / Alerta",
            Kind::Document => "Documento",
        }
    }
}

impl Default for Kind {
    fn default() -> Self {
        Kind::Summary
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Kind {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.code() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// A filter over an enumerated field: everything, or one exact value.
///
/// `All` only exists here; it is never a field value of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Selection<T> {
    All,
    Only(T),
}

pub type CategoryFilter = Selection<Category>;
pub type KindFilter = Selection<Kind>;

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T: PartialEq> Selection<T> {
    /// Whether `value` passes this selection.
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(expected) => expected == value,
        }
    }

    pub fn only(&self) -> Option<&T> {
        match self {
            Selection::All => None,
            Selection::Only(value) => Some(value),
        }
    }
}

impl<T> From<T> for Selection<T> {
    fn from(value: T) -> Self {
        Selection::Only(value)
    }
}

const ALL_CATEGORIES_LABEL: &str = "Todas";

/// Stored value of the kind filter's "All" option.
const ALL_KINDS_VALUE: &str = "Todas";

impl Selection<Category> {
    pub fn label(&self) -> &'static str {
        match self {
            Selection::All => ALL_CATEGORIES_LABEL,
            Selection::Only(category) => category.label(),
        }
    }
}

impl FromStr for Selection<Category> {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALL_CATEGORIES_LABEL {
            Ok(Selection::All)
        } else {
            s.parse().map(Selection::Only)
        }
    }
}

impl Selection<Kind> {
    pub fn label(&self) -> &'static str {
        match self {
            Selection::All => "Todos os Tipos",
            Selection::Only(kind) => kind.label(),
        }
    }
}

impl FromStr for Selection<Kind> {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALL_KINDS_VALUE {
            Ok(Selection::All)
        } else {
            s.parse().map(Selection::Only)
        }
    }
}

/// Identifier of an organizational unit ("subprefeitura").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        UnitId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Centro,
    Norte,
    Sul,
    Leste,
    Oeste,
}

/// Administrative division that owns records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    pub id: UnitId,
    pub name: String,
    pub region: Region,
}

impl OrganizationalUnit {
    pub fn new(id: impl Into<String>, name: impl Into<String>, region: Region) -> Self {
        Self {
            id: UnitId::new(id),
            name: name.into(),
            region,
        }
    }

    /// The deployment's unit.
    pub fn penha() -> Self {
        Self::new("penha", "Subprefeitura Penha", Region::Leste)
    }
}

impl Default for OrganizationalUnit {
    fn default() -> Self {
        Self::penha()
    }
}

/// A persisted record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Assigned by the store on creation.
    pub id: RecordId,

    #[serde(rename = "postura")]
    pub category: Category,

    /// Owning unit.
    #[serde(rename = "subprefeitura")]
    pub unit: UnitId,

    #[serde(rename = "type")]
    pub kind: Kind,

    pub title: String,

    #[serde(rename = "content")]
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// File name only; no content is stored.
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,

    /// Set once at creation.
    pub created_at: Timestamp,
}

impl Record {
    /// Attach a store-assigned id to a creation payload.
    pub fn from_new(id: RecordId, new: NewRecord) -> Self {
        Self {
            id,
            category: new.category,
            unit: new.unit,
            kind: new.kind,
            title: new.title,
            body: new.body,
            address: new.address,
            author: new.author,
            attachment_name: new.attachment_name,
            created_at: new.created_at,
        }
    }
}

/// Creation payload: a record without its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    #[serde(rename = "postura")]
    pub category: Category,

    #[serde(rename = "subprefeitura")]
    pub unit: UnitId,

    #[serde(rename = "type")]
    pub kind: Kind,

    pub title: String,

    #[serde(rename = "content")]
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,

    pub created_at: Timestamp,
}

/// Where a draft came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftOrigin {
    /// Not persisted yet.
    New,
    /// Loaded from a persisted record; carries what an update must keep.
    Existing { id: RecordId, created_at: Timestamp },
}

/// A record being created or modified, before it reaches the store.
///
/// Carries no organizational unit: the repository stamps its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Draft {
    pub origin: DraftOrigin,
    pub category: Category,
    pub kind: Kind,
    pub title: String,
    pub body: String,
    pub address: Option<String>,
    pub author: Option<String>,
    pub attachment_name: Option<String>,
}

impl Draft {
    pub fn new(
        category: Category,
        kind: Kind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            origin: DraftOrigin::New,
            category,
            kind,
            title: title.into(),
            body: body.into(),
            address: None,
            author: None,
            attachment_name: None,
        }
    }

    /// Seed an update draft from a persisted record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            origin: DraftOrigin::Existing {
                id: record.id.clone(),
                created_at: record.created_at,
            },
            category: record.category,
            kind: record.kind,
            title: record.title.clone(),
            body: record.body.clone(),
            address: record.address.clone(),
            author: record.author.clone(),
            attachment_name: record.attachment_name.clone(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>) -> Self {
        self.attachment_name = Some(name.into());
        self
    }

    pub fn id(&self) -> Option<&RecordId> {
        match &self.origin {
            DraftOrigin::New => None,
            DraftOrigin::Existing { id, .. } => Some(id),
        }
    }

    /// Check the required fields. Any text counts, whitespace included.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.title.is_empty() {
            missing.push(RequiredField::Title);
        }
        if self.body.is_empty() {
            missing.push(RequiredField::Body);
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }

    /// Turn empty optional fields into absent ones.
    pub fn normalized(mut self) -> Self {
        self.address = normalize_optional(self.address);
        self.author = normalize_optional(self.author);
        self.attachment_name = normalize_optional(self.attachment_name);
        self
    }

    pub(crate) fn into_new_record(self, unit: UnitId, created_at: Timestamp) -> NewRecord {
        NewRecord {
            category: self.category,
            unit,
            kind: self.kind,
            title: self.title,
            body: self.body,
            address: self.address,
            author: self.author,
            attachment_name: self.attachment_name,
            created_at,
        }
    }
}

/// Empty text counts as absent.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Change to one optional field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldPatch<T> {
    /// Leave the stored value alone.
    Keep,
    Set(T),
    /// Remove the stored value.
    Clear,
}

impl<T> Default for FieldPatch<T> {
    fn default() -> Self {
        FieldPatch::Keep
    }
}

impl<T: Clone + PartialEq> FieldPatch<T> {
    /// Patch that turns `current` into `desired`.
    pub fn between(current: &Option<T>, desired: &Option<T>) -> Self {
        if current == desired {
            return FieldPatch::Keep;
        }
        Self::overwrite(desired)
    }

    /// Patch that makes the field equal `desired`, whatever it held.
    pub fn overwrite(desired: &Option<T>) -> Self {
        match desired {
            Some(value) => FieldPatch::Set(value.clone()),
            None => FieldPatch::Clear,
        }
    }

    pub fn apply(&self, slot: &mut Option<T>) {
        match self {
            FieldPatch::Keep => {}
            FieldPatch::Set(value) => *slot = Some(value.clone()),
            FieldPatch::Clear => *slot = None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldPatch::Keep)
    }
}

/// Partial update of a stored record.
///
/// `None` / [`FieldPatch::Keep`] leave a field untouched. There is no way to
/// express a change to the id or creation time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub category: Option<Category>,
    pub unit: Option<UnitId>,
    pub kind: Option<Kind>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub address: FieldPatch<String>,
    pub author: FieldPatch<String>,
    pub attachment_name: FieldPatch<String>,
}

impl RecordPatch {
    /// Only the fields where `draft` differs from `current`.
    pub fn between(current: &Record, draft: &Draft) -> Self {
        fn changed<T: PartialEq + Clone>(current: &T, desired: &T) -> Option<T> {
            (current != desired).then(|| desired.clone())
        }

        Self {
            category: changed(&current.category, &draft.category),
            unit: None,
            kind: changed(&current.kind, &draft.kind),
            title: changed(&current.title, &draft.title),
            body: changed(&current.body, &draft.body),
            address: FieldPatch::between(&current.address, &draft.address),
            author: FieldPatch::between(&current.author, &draft.author),
            attachment_name: FieldPatch::between(&current.attachment_name, &draft.attachment_name),
        }
    }

    /// Every draft field, for when the stored version is unknown.
    pub fn from_draft(draft: &Draft) -> Self {
        Self {
            category: Some(draft.category),
            unit: None,
            kind: Some(draft.kind),
            title: Some(draft.title.clone()),
            body: Some(draft.body.clone()),
            address: FieldPatch::overwrite(&draft.address),
            author: FieldPatch::overwrite(&draft.author),
            attachment_name: FieldPatch::overwrite(&draft.attachment_name),
        }
    }

    pub fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.unit.is_none()
            && self.kind.is_none()
            && self.title.is_none()
            && self.body.is_none()
            && self.address.is_keep()
            && self.author.is_keep()
            && self.attachment_name.is_keep()
    }

    pub fn apply_to(&self, record: &mut Record) {
        if let Some(category) = self.category {
            record.category = category;
        }
        if let Some(unit) = &self.unit {
            record.unit = unit.clone();
        }
        if let Some(kind) = self.kind {
            record.kind = kind;
        }
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(body) = &self.body {
            record.body = body.clone();
        }
        self.address.apply(&mut record.address);
        self.author.apply(&mut record.author);
        self.attachment_name.apply(&mut record.attachment_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record {
            id: RecordId::new("abc"),
            category: Category::Works,
            unit: UnitId::new("penha"),
            kind: Kind::Tip,
            title: "Calçada quebrada".into(),
            body: "Rua sem acessibilidade".into(),
            address: Some("Rua A, 10".into()),
            author: Some("Ana".into()),
            attachment_name: None,
            created_at: Timestamp(1_700_000_000_000),
        }
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = RecordId::generate(b"x");
        let b = RecordId::generate(b"x");
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 20);
    }

    #[test]
    fn test_category_labels_roundtrip() {
        for category in Category::ALL {
            assert_eq!(category.label().parse::<Category>().unwrap(), category);
        }
        assert!("Todas".parse::<Category>().is_err());
        assert_eq!("Todas".parse::<CategoryFilter>().unwrap(), Selection::All);
        assert_eq!(
            "Defesa Civil".parse::<CategoryFilter>().unwrap(),
            Selection::Only(Category::CivilDefense)
        );
    }

    #[test]
    fn test_kind_codes_and_labels() {
        assert_eq!("Risco".parse::<Kind>().unwrap(), Kind::RiskAlert);
        assert_eq!(Kind::RiskAlert.label(), "Risco / Alerta");
        assert_eq!(KindFilter::All.label(), "Todos os Tipos");
        assert_eq!("Todas".parse::<KindFilter>().unwrap(), Selection::All);
    }

    #[test]
    fn test_record_wire_shape() {
        let record = sample_record();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["postura"], "Obras");
        assert_eq!(value["subprefeitura"], "penha");
        assert_eq!(value["type"], "Dica");
        assert_eq!(value["content"], "Rua sem acessibilidade");
        assert_eq!(value["createdAt"], 1_700_000_000_000i64);
        assert!(value.get("fileName").is_none());

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_draft_validation() {
        let draft = Draft::new(Category::Works, Kind::Tip, "", "");
        let err = draft.validate().unwrap_err();
        assert_eq!(err.missing, vec![RequiredField::Title, RequiredField::Body]);

        let draft = Draft::new(Category::Works, Kind::Tip, "t", "b");
        assert!(draft.validate().is_ok());

        let draft = Draft::new(Category::Works, Kind::Tip, "   ", "\n");
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_normalized_drops_empty_optionals() {
        let draft = Draft::new(Category::Works, Kind::Tip, "t", "b")
            .with_address("")
            .with_author("   ")
            .with_attachment("planta.pdf")
            .normalized();
        assert_eq!(draft.address, None);
        assert_eq!(draft.author.as_deref(), Some("   "));
        assert_eq!(draft.attachment_name.as_deref(), Some("planta.pdf"));
    }

    #[test]
    fn test_patch_between_only_changed_fields() {
        let record = sample_record();
        let mut draft = Draft::from_record(&record);
        draft.title = "Calçada consertada".into();
        draft.author = None;

        let patch = RecordPatch::between(&record, &draft);
        assert_eq!(patch.title.as_deref(), Some("Calçada consertada"));
        assert_eq!(patch.body, None);
        assert_eq!(patch.category, None);
        assert_eq!(patch.author, FieldPatch::Clear);
        assert_eq!(patch.address, FieldPatch::Keep);

        let mut updated = record.clone();
        patch.apply_to(&mut updated);
        assert_eq!(updated.title, "Calçada consertada");
        assert_eq!(updated.author, None);
        assert_eq!(updated.address, record.address);
        assert_eq!(updated.created_at, record.created_at);
    }

    #[test]
    fn test_unchanged_draft_gives_empty_patch() {
        let record = sample_record();
        let patch = RecordPatch::between(&record, &Draft::from_record(&record));
        assert!(patch.is_empty());
        assert!(!patch.with_unit(UnitId::new("penha")).is_empty());
    }
}
