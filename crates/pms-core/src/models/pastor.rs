//! Pastor records and the edit form that produces them.
//!
//! `Pastor` is the nested record the API stores. `PastorForm` is the flat
//! state an editing screen works with; `from_record` prefills it and
//! `to_payload` reshapes it back into the nested record for submission.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{ApiError, Attachment, Payload};

/// Employment status used when the form leaves it blank
pub const DEFAULT_EMPLOYMENT_STATUS: &str = "Full-time";

/// A field the API may return either as one text block or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    pub fn join(&self, separator: &str) -> String {
        match self {
            TextOrList::Text(text) => text.clone(),
            TextOrList::List(items) => items.join(separator),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyInfo {
    #[serde(default)]
    pub spouse_name: Option<String>,
    #[serde(default)]
    pub wedding_anniversary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub ordination_date: Option<String>,
    #[serde(default)]
    pub employment_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationTraining {
    #[serde(default)]
    pub degrees: Option<TextOrList>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsGifts {
    #[serde(default)]
    pub spiritual_gifts: Option<TextOrList>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pastor {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub birthdate: Option<String>,
    /// URL of the stored photograph
    #[serde(default)]
    pub photograph: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub local_government: Option<String>,
    #[serde(default)]
    pub home_town: Option<String>,
    #[serde(default)]
    pub residential_address: Option<String>,
    #[serde(default)]
    pub family_info: Option<FamilyInfo>,
    #[serde(default)]
    pub professional_info: Option<ProfessionalInfo>,
    #[serde(default)]
    pub education_training: Option<EducationTraining>,
    #[serde(default)]
    pub skills_gifts: Option<SkillsGifts>,
    #[serde(default)]
    pub children: Vec<Child>,
    #[serde(default)]
    pub past_postings: Option<Value>,
    #[serde(default)]
    pub planted_parish_links: Option<Value>,
    #[serde(default)]
    pub appointments: Option<Value>,
}

impl Pastor {
    pub fn title(&self) -> Option<&str> {
        self.professional_info
            .as_ref()
            .and_then(|p| p.title.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Title and name as shown in lists
    pub fn display_name(&self) -> String {
        match self.title() {
            Some(title) => format!("{} {}", title, self.full_name),
            None => self.full_name.clone(),
        }
    }

    /// Case-insensitive match against name and title
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.full_name.to_lowercase().contains(&term)
            || self
                .title()
                .map(|t| t.to_lowercase().contains(&term))
                .unwrap_or(false)
    }
}

/// Flat editing state for one pastor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastorForm {
    pub full_name: String,
    pub title: String,
    pub birthdate: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub ordination_date: String,
    pub employment_status: String,
    pub spouse: String,
    /// One child per line
    pub children: String,
    pub anniversary: String,
    pub spiritual_gifts: String,
    /// One degree per line
    pub education: String,
    pub photograph: Option<Attachment>,
}

impl Default for PastorForm {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            title: String::new(),
            birthdate: String::new(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            ordination_date: String::new(),
            employment_status: DEFAULT_EMPLOYMENT_STATUS.to_string(),
            spouse: String::new(),
            children: String::new(),
            anniversary: String::new(),
            spiritual_gifts: String::new(),
            education: String::new(),
            photograph: None,
        }
    }
}

#[derive(Serialize)]
struct PastorPayload<'a> {
    full_name: &'a str,
    birthdate: Option<&'a str>,
    phone: &'a str,
    email: &'a str,
    residential_address: &'a str,
    family_info: FamilyPayload<'a>,
    professional_info: ProfessionalPayload<'a>,
    education_training: EducationPayload<'a>,
    skills_gifts: GiftsPayload<'a>,
    children: Vec<Child>,
}

#[derive(Serialize)]
struct FamilyPayload<'a> {
    spouse_name: &'a str,
    wedding_anniversary: Option<&'a str>,
}

#[derive(Serialize)]
struct ProfessionalPayload<'a> {
    title: &'a str,
    ordination_date: Option<&'a str>,
    employment_status: &'a str,
}

#[derive(Serialize)]
struct EducationPayload<'a> {
    degrees: &'a str,
}

#[derive(Serialize)]
struct GiftsPayload<'a> {
    spiritual_gifts: &'a str,
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

impl PastorForm {
    /// Prefill the form from a stored record
    pub fn from_record(pastor: &Pastor) -> Self {
        let family = pastor.family_info.clone().unwrap_or_default();
        let professional = pastor.professional_info.clone().unwrap_or_default();

        Self {
            full_name: pastor.full_name.clone(),
            title: professional.title.unwrap_or_default(),
            birthdate: pastor.birthdate.clone().unwrap_or_default(),
            phone: pastor.phone.clone().unwrap_or_default(),
            email: pastor.email.clone().unwrap_or_default(),
            address: pastor.residential_address.clone().unwrap_or_default(),
            ordination_date: professional.ordination_date.unwrap_or_default(),
            employment_status: professional
                .employment_status
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_EMPLOYMENT_STATUS.to_string()),
            spouse: family.spouse_name.unwrap_or_default(),
            children: pastor
                .children
                .iter()
                .map(|c| c.name.as_str())
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            anniversary: family.wedding_anniversary.unwrap_or_default(),
            spiritual_gifts: pastor
                .skills_gifts
                .as_ref()
                .and_then(|s| s.spiritual_gifts.as_ref())
                .map(|g| g.join(", "))
                .unwrap_or_default(),
            education: pastor
                .education_training
                .as_ref()
                .and_then(|e| e.degrees.as_ref())
                .map(|d| d.join("\n"))
                .unwrap_or_default(),
            photograph: None,
        }
    }

    /// Children names, one per non-blank line
    pub fn child_names(&self) -> Vec<Child> {
        self.children
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| Child {
                name: name.to_string(),
            })
            .collect()
    }

    /// Reshape into the nested record the API expects.
    ///
    /// A selected photograph makes the payload multipart when sent.
    pub fn to_payload(&self) -> Result<Payload, ApiError> {
        let employment_status = non_empty(&self.employment_status).unwrap_or(DEFAULT_EMPLOYMENT_STATUS);
        let record = PastorPayload {
            full_name: &self.full_name,
            birthdate: non_empty(&self.birthdate),
            phone: &self.phone,
            email: &self.email,
            residential_address: &self.address,
            family_info: FamilyPayload {
                spouse_name: &self.spouse,
                wedding_anniversary: non_empty(&self.anniversary),
            },
            professional_info: ProfessionalPayload {
                title: &self.title,
                ordination_date: non_empty(&self.ordination_date),
                employment_status,
            },
            education_training: EducationPayload {
                degrees: self.education.trim(),
            },
            skills_gifts: GiftsPayload {
                spiritual_gifts: self.spiritual_gifts.trim(),
            },
            children: self.child_names(),
        };

        Ok(Payload::from_record(&record)?.attach("photograph", self.photograph.clone()))
    }
}
