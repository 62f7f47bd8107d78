use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DefaultOnNull};
use strum::{Display, EnumIter, EnumString};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Opaque identifier assigned by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub public_id: String,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum PropertyCategory {
    Residential,
    Commercial,
    Land,
}

/// Dashboard sections, one per collection the API exposes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Section {
    Appointments,
    Properties,
    Reviews,
    Enquiries,
    Admins,
    Contractors,
    TitleSearches,
}

impl Section {
    pub fn title(&self) -> &'static str {
        match self {
            Section::Appointments => "Appointments",
            Section::Properties => "Property Verification",
            Section::Reviews => "Reviews",
            Section::Enquiries => "Enquiries",
            Section::Admins => "Admins",
            Section::Contractors => "Contractors",
            Section::TitleSearches => "Title Searches",
        }
    }

    /// Singular noun used in notifications ("Property accepted successfully").
    pub fn noun(&self) -> &'static str {
        match self {
            Section::Appointments => "Appointment",
            Section::Properties => "Property",
            Section::Reviews => "Review",
            Section::Enquiries => "Enquiry",
            Section::Admins => "Admin",
            Section::Contractors => "Contractor",
            Section::TitleSearches => "Title search request",
        }
    }

    /// Whether records of this section carry a property type.
    pub fn has_category(&self) -> bool {
        matches!(self, Section::Properties | Section::TitleSearches)
    }
}

/// Common surface of every record the dashboard lists.
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    const SECTION: Section;

    fn id(&self) -> &RecordId;

    fn category(&self) -> Option<PropertyCategory> {
        None
    }

    /// One-line human label for tables and confirmation prompts.
    fn label(&self) -> String;

    fn created_at(&self) -> Option<&str> {
        None
    }

    fn attachments(&self) -> &[Attachment] {
        &[]
    }

    /// Key/value lines for the detail pane.
    fn details(&self) -> Vec<(&'static str, String)>;
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleSearchRequest {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(rename = "propertyType", default)]
    pub property_type: Option<PropertyCategory>,
    #[serde(rename = "PropertyCity", default)]
    pub property_city: String,
    #[serde(rename = "PropertyState", default)]
    pub property_state: String,
    #[serde(rename = "propertyAddress", default)]
    pub property_address: String,
    #[serde(rename = "PropertyRegistrationNumber", default)]
    pub registration_number: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "ContactFullName", default)]
    pub contact_full_name: String,
    #[serde(rename = "ContactEmail", default)]
    pub contact_email: String,
    #[serde(rename = "ContactPhone", default)]
    pub contact_phone: String,
    #[serde(rename = "ContactNotes", default)]
    pub contact_notes: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(rename = "propertyDocuments", default)]
    pub property_documents: Vec<Attachment>,
}

impl Record for TitleSearchRequest {
    const SECTION: Section = Section::TitleSearches;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn category(&self) -> Option<PropertyCategory> {
        self.property_type
    }

    fn label(&self) -> String {
        format!(
            "{}, {}, {}",
            self.property_address, self.property_city, self.property_state
        )
    }

    fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    fn attachments(&self) -> &[Attachment] {
        &self.property_documents
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Request ID", self.id.to_string()),
            ("Property Type", display_category(self.property_type)),
            ("City", self.property_city.clone()),
            ("State", self.property_state.clone()),
            ("Address", self.property_address.clone()),
            ("Reg. No", or_dash(self.registration_number.as_deref())),
            ("Requested On", display_timestamp(self.created_at.as_deref())),
            ("Full Name", self.contact_full_name.clone()),
            ("Email", self.contact_email.clone()),
            ("Phone", self.contact_phone.clone()),
            ("Notes", or_dash(self.contact_notes.as_deref())),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Record for Appointment {
    const SECTION: Section = Section::Appointments;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn label(&self) -> String {
        match (&self.date, &self.time) {
            (Some(date), Some(time)) => format!("{} on {date} at {time}", self.name),
            (Some(date), None) => format!("{} on {date}", self.name),
            _ => self.name.clone(),
        }
    }

    fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Appointment ID", self.id.to_string()),
            ("Name", self.name.clone()),
            ("Email", self.email.clone()),
            ("Phone", self.phone.clone()),
            ("Date", or_dash(self.date.as_deref())),
            ("Time", or_dash(self.time.as_deref())),
            ("Message", or_dash(self.message.as_deref())),
        ]
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyListing {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(default)]
    pub title: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(rename = "propertyType", default)]
    pub property_type: Option<PropertyCategory>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(rename = "ownerName", default)]
    pub owner_name: Option<String>,
    #[serde(rename = "ownerContact", default)]
    pub owner_contact: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Attachment>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Record for PropertyListing {
    const SECTION: Section = Section::Properties;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn category(&self) -> Option<PropertyCategory> {
        self.property_type
    }

    fn label(&self) -> String {
        if self.location.is_empty() {
            self.title.clone()
        } else {
            format!("{} ({})", self.title, self.location)
        }
    }

    fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    fn attachments(&self) -> &[Attachment] {
        &self.images
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Property ID", self.id.to_string()),
            ("Title", self.title.clone()),
            ("Type", display_category(self.property_type)),
            ("Location", self.location.clone()),
            (
                "Price",
                self.price
                    .map(|price| format!("{price:.0}"))
                    .unwrap_or_else(|| "-".into()),
            ),
            ("Owner", or_dash(self.owner_name.as_deref())),
            ("Owner Contact", or_dash(self.owner_contact.as_deref())),
            ("Description", or_dash(self.description.as_deref())),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Record for Review {
    const SECTION: Section = Section::Reviews;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn label(&self) -> String {
        match self.rating {
            Some(rating) => format!("{} ({rating}/5)", self.name),
            None => self.name.clone(),
        }
    }

    fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Review ID", self.id.to_string()),
            ("Name", self.name.clone()),
            (
                "Rating",
                self.rating
                    .map(|rating| rating.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            ("Comment", self.comment.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enquiry {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Record for Enquiry {
    const SECTION: Section = Section::Enquiries;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Enquiry ID", self.id.to_string()),
            ("Name", self.name.clone()),
            ("Email", self.email.clone()),
            ("Phone", or_dash(self.phone.as_deref())),
            ("Message", self.message.clone()),
        ]
    }
}

/// Admin account as listed by the API. The password hash is never read.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAccount {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(rename = "adminId", default)]
    pub admin_id: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(rename = "buyersId", default)]
    pub buyers: Vec<RecordId>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(rename = "sellersId", default)]
    pub sellers: Vec<RecordId>,
}

impl Record for AdminAccount {
    const SECTION: Section = Section::Admins;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn label(&self) -> String {
        self.admin_id.clone()
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Record ID", self.id.to_string()),
            ("Admin ID", self.admin_id.clone()),
            ("Buyers", self.buyers.len().to_string()),
            ("Sellers", self.sellers.len().to_string()),
        ]
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contractor {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(rename = "companyName", default)]
    pub company_name: Option<String>,
    #[serde(rename = "licenseNumber", default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub documents: Vec<Attachment>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Record for Contractor {
    const SECTION: Section = Section::Contractors;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn label(&self) -> String {
        match &self.company_name {
            Some(company) if !company.is_empty() => format!("{} ({company})", self.name),
            _ => self.name.clone(),
        }
    }

    fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    fn attachments(&self) -> &[Attachment] {
        &self.documents
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Contractor ID", self.id.to_string()),
            ("Name", self.name.clone()),
            ("Email", self.email.clone()),
            ("Phone", or_dash(self.phone.as_deref())),
            ("Company", or_dash(self.company_name.as_deref())),
            ("License", or_dash(self.license_number.as_deref())),
            ("Verified", if self.verified { "yes" } else { "no" }.into()),
        ]
    }
}

pub fn display_category(category: Option<PropertyCategory>) -> String {
    category
        .map(|category| category.to_string())
        .unwrap_or_else(|| "-".into())
}

/// Renders an RFC 3339 timestamp as `YYYY-MM-DD HH:MM`, or the raw text when
/// it does not parse.
pub fn display_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "-".into();
    };
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .and_then(|dt| {
            dt.format(time::macros::format_description!(
                "[year]-[month]-[day] [hour]:[minute]"
            ))
            .ok()
        })
        .unwrap_or_else(|| raw.to_string())
}

fn or_dash(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => "-".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn title_search_request_decodes_wire_names() {
        let raw = r#"{
            "_id": "ab1234",
            "propertyType": "Commercial",
            "PropertyCity": "Pune",
            "PropertyState": "MH",
            "propertyAddress": "12 MG Road",
            "createdAt": "2024-03-05T10:15:00Z",
            "ContactFullName": "Asha",
            "ContactEmail": "asha@example.com",
            "ContactPhone": "99999",
            "propertyDocuments": [{"url": "https://cdn/x.pdf", "public_id": "docs/x"}]
        }"#;
        let request: TitleSearchRequest = serde_json::from_str(raw).expect("decode");
        assert_eq!(request.id.as_str(), "ab1234");
        assert_eq!(request.category(), Some(PropertyCategory::Commercial));
        assert_eq!(request.attachments().len(), 1);
        assert!(request.registration_number.is_none());
    }

    #[test]
    fn unknown_property_type_decodes_as_none() {
        let raw = r#"{"_id": "p1", "title": "Villa", "propertyType": "Castle"}"#;
        let listing: PropertyListing = serde_json::from_str(raw).expect("decode");
        assert_eq!(listing.property_type, None);
        assert!(listing.images.is_empty());
    }

    #[test]
    fn admin_password_is_ignored_and_null_lists_default() {
        let raw = r#"{"_id": "a1", "adminId": "root", "password": "hash", "buyersId": null}"#;
        let admin: AdminAccount = serde_json::from_str(raw).expect("decode");
        assert_eq!(admin.admin_id, "root");
        assert!(admin.buyers.is_empty());
    }

    #[test]
    fn section_parses_kebab_case() {
        assert_eq!(
            Section::from_str("title-searches").expect("section"),
            Section::TitleSearches
        );
        assert_eq!(Section::Contractors.to_string(), "contractors");
    }

    #[test]
    fn only_listings_and_title_searches_have_categories() {
        let typed: Vec<Section> = Section::iter().filter(Section::has_category).collect();
        assert_eq!(typed, vec![Section::Properties, Section::TitleSearches]);
    }

    #[test]
    fn timestamps_render_compactly() {
        assert_eq!(
            display_timestamp(Some("2024-03-05T10:15:00Z")),
            "2024-03-05 10:15"
        );
        assert_eq!(display_timestamp(Some("yesterday")), "yesterday");
        assert_eq!(display_timestamp(None), "-");
    }
}
