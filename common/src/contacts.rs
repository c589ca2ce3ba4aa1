// Contact creation rules and CSV import/export

use crate::billing::BillingService;
use crate::db::repositories::ContactRepository;
use crate::errors::{BillingError, DatabaseError, ServiceError, ValidationError};
use crate::models::{Contact, ContactStatus, UsageMetric};
use chrono::Utc;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email pattern");
}

/// Column order used by both import and export
pub const CSV_HEADERS: [&str; 6] = ["first_name", "last_name", "email", "phone", "company", "job_title"];

/// Fields accepted when creating a contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewContact {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub status: Option<ContactStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Lowercased, trimmed email; `None` when blank
pub fn normalize_email(email: Option<&str>) -> Option<String> {
    non_empty(email).map(|e| e.to_lowercase())
}

fn validate(input: &NewContact) -> Result<(), ValidationError> {
    if input.first_name.trim().is_empty() {
        return Err(ValidationError::MissingField("first_name".to_string()));
    }
    if let Some(email) = normalize_email(input.email.as_deref()) {
        if !EMAIL_RE.is_match(&email) {
            return Err(ValidationError::invalid("email", format!("{} is not an email address", email)));
        }
    }
    Ok(())
}

pub fn build_contact(org_id: Uuid, owner_id: Option<Uuid>, input: NewContact) -> Result<Contact, ValidationError> {
    validate(&input)?;
    let now = Utc::now();
    Ok(Contact {
        id: Uuid::new_v4(),
        org_id,
        first_name: input.first_name.trim().to_string(),
        last_name: non_empty(input.last_name.as_deref()),
        email: normalize_email(input.email.as_deref()),
        phone: non_empty(input.phone.as_deref()),
        company: non_empty(input.company.as_deref()),
        job_title: non_empty(input.job_title.as_deref()),
        status: input.status.unwrap_or(ContactStatus::Lead),
        tags: input.tags,
        notes: non_empty(input.notes.as_deref()),
        owner_id,
        created_at: now,
        updated_at: now,
    })
}

/// Parse an import file into rows; a row without first_name becomes `Err(line)`
/// Rows an import would actually insert: parsed rows whose email is new to the
/// organization and to the file, plus rows without an email
pub fn new_contact_count(rows: &[Result<NewContact, usize>], existing: &HashSet<String>) -> i64 {
    let mut in_file = HashSet::new();
    rows.iter()
        .filter_map(|row| row.as_ref().ok())
        .filter(|input| match normalize_email(input.email.as_deref()) {
            Some(email) => !existing.contains(&email) && in_file.insert(email),
            None => true,
        })
        .count() as i64
}

pub fn parse_csv(data: &[u8]) -> Result<Vec<Result<NewContact, usize>>, ValidationError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ValidationError::invalid("file", format!("Failed to read CSV header: {}", e)))?
        .clone();
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let columns: Vec<Option<usize>> = CSV_HEADERS.iter().map(|h| position(h)).collect();

    if columns[0].is_none() {
        return Err(ValidationError::MissingField("first_name column".to_string()));
    }

    let cell = |record: &StringRecord, column: usize| -> Option<String> {
        columns[column].and_then(|i| non_empty(record.get(i)))
    };

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "Unreadable CSV row");
                rows.push(Err(line));
                continue;
            }
        };

        match cell(&record, 0) {
            Some(first_name) => rows.push(Ok(NewContact {
                first_name,
                last_name: cell(&record, 1),
                email: cell(&record, 2),
                phone: cell(&record, 3),
                company: cell(&record, 4),
                job_title: cell(&record, 5),
                ..NewContact::default()
            })),
            None => rows.push(Err(line)),
        }
    }
    Ok(rows)
}

/// Serialize contacts with the import header row
pub fn write_csv(contacts: &[Contact]) -> Result<String, ValidationError> {
    let mut buffer = Vec::new();
    {
        let mut writer = WriterBuilder::new().from_writer(&mut buffer);
        let fail = |e: csv::Error| ValidationError::invalid("export", format!("Failed to write CSV: {}", e));

        writer.write_record(CSV_HEADERS).map_err(fail)?;
        for contact in contacts {
            writer
                .write_record([
                    contact.first_name.as_str(),
                    contact.last_name.as_deref().unwrap_or(""),
                    contact.email.as_deref().unwrap_or(""),
                    contact.phone.as_deref().unwrap_or(""),
                    contact.company.as_deref().unwrap_or(""),
                    contact.job_title.as_deref().unwrap_or(""),
                ])
                .map_err(fail)?;
        }
        writer
            .flush()
            .map_err(|e| ValidationError::invalid("export", format!("Failed to flush CSV: {}", e)))?;
    }
    String::from_utf8(buffer).map_err(|e| ValidationError::invalid("export", e.to_string()))
}

#[derive(Clone)]
pub struct ContactService {
    contacts: ContactRepository,
    billing: BillingService,
}

impl ContactService {
    pub fn new(contacts: ContactRepository, billing: BillingService) -> Self {
        Self { contacts, billing }
    }

    async fn ensure_capacity(&self, org_id: Uuid, additional: i64) -> Result<(), ServiceError> {
        let check = self.billing.check_usage(org_id, UsageMetric::Contacts, additional).await?;
        if !check.allowed {
            return Err(BillingError::LimitExceeded {
                metric: UsageMetric::Contacts.to_string(),
                used: check.used,
                limit: check.limit.unwrap_or_default(),
            }
            .into());
        }
        Ok(())
    }

    /// Create a contact; the email must be unique within the organization
    #[instrument(skip(self, input))]
    pub async fn create(&self, org_id: Uuid, owner_id: Option<Uuid>, input: NewContact) -> Result<Contact, ServiceError> {
        let contact = build_contact(org_id, owner_id, input)?;

        if let Some(email) = &contact.email {
            if self.contacts.exists_by_email(org_id, email).await? {
                return Err(DatabaseError::DuplicateKey(format!("Contact with email {} already exists", email)).into());
            }
        }
        self.ensure_capacity(org_id, 1).await?;

        self.contacts.create(&contact).await?;
        Ok(contact)
    }

    /// Replace a contact's editable fields; owner and timestamps are kept
    #[instrument(skip(self, input))]
    pub async fn update(&self, org_id: Uuid, id: Uuid, input: NewContact) -> Result<Contact, ServiceError> {
        let existing = self
            .contacts
            .find_by_id(org_id, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Contact {}", id)))?;

        let mut contact = build_contact(org_id, existing.owner_id, input)?;
        contact.id = existing.id;
        contact.created_at = existing.created_at;

        if let Some(email) = &contact.email {
            if existing.email.as_deref() != Some(email.as_str())
                && self.contacts.exists_by_email(org_id, email).await?
            {
                return Err(DatabaseError::DuplicateKey(format!("Contact with email {} already exists", email)).into());
            }
        }

        self.contacts.update(&contact).await?;
        Ok(contact)
    }

    /// Import rows; blank first names fail, known emails are skipped
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn import_csv(&self, org_id: Uuid, owner_id: Option<Uuid>, data: &[u8]) -> Result<ImportSummary, ServiceError> {
        let rows = parse_csv(data)?;
        let mut summary = ImportSummary::default();

        let mut seen: HashSet<String> = self.contacts.list_emails(org_id).await?.into_iter().collect();
        self.ensure_capacity(org_id, new_contact_count(&rows, &seen)).await?;

        for row in rows {
            let input = match row {
                Ok(input) => input,
                Err(line) => {
                    warn!(line, "Skipping CSV row without first_name");
                    summary.failed += 1;
                    continue;
                }
            };

            let contact = match build_contact(org_id, owner_id, input) {
                Ok(contact) => contact,
                Err(e) => {
                    warn!(error = %e, "Rejected imported contact");
                    summary.failed += 1;
                    continue;
                }
            };

            if let Some(email) = &contact.email {
                if !seen.insert(email.clone()) {
                    summary.skipped += 1;
                    continue;
                }
            }

            match self.contacts.create(&contact).await {
                Ok(()) => summary.imported += 1,
                Err(DatabaseError::DuplicateKey(_)) => summary.skipped += 1,
                Err(e) => {
                    warn!(error = %e, "Failed to insert imported contact");
                    summary.failed += 1;
                }
            }
        }

        info!(
            org_id = %org_id,
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            "Contact import finished"
        );
        Ok(summary)
    }

    #[instrument(skip(self))]
    pub async fn export_csv(&self, org_id: Uuid) -> Result<String, ServiceError> {
        let contacts = self.contacts.list_all(org_id).await?;
        Ok(write_csv(&contacts)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_flags_rows_without_first_name() {
        let data = b"first_name,last_name,email,phone,company,job_title\n\
Ada,Lovelace,ADA@Example.com,,Analytical,Engineer\n\
,Nobody,nobody@example.com,,,\n\
Grace,Hopper,,,Navy,\n";
        let rows = parse_csv(data).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().first_name, "Ada");
        assert_eq!(rows[1], Err(3));
        assert!(rows[2].as_ref().unwrap().email.is_none());
    }

    #[test]
    fn test_new_contact_count_ignores_known_and_repeated_emails() {
        let data = b"first_name,email\n\
Ada,ada@example.com\n\
Grace,GRACE@example.com\n\
Grace,grace@example.com\n\
Alan,\n\
,ghost@example.com\n";
        let rows = parse_csv(data).unwrap();
        let existing: HashSet<String> = ["ada@example.com".to_string()].into_iter().collect();

        // grace once, Alan without email; Ada is known and the blank name fails
        assert_eq!(new_contact_count(&rows, &existing), 2);
    }

    #[test]
    fn test_reimporting_known_contacts_needs_no_capacity() {
        let data = b"first_name,email\nAda,ada@example.com\nGrace,grace@example.com\n";
        let rows = parse_csv(data).unwrap();
        let existing: HashSet<String> = ["ada@example.com".to_string(), "grace@example.com".to_string()]
            .into_iter()
            .collect();
        assert_eq!(new_contact_count(&rows, &existing), 0);
    }

    #[test]
    fn test_parse_csv_accepts_reordered_headers() {
        let data = b"email,first_name\nx@y.io,Xavier\n";
        let rows = parse_csv(data).unwrap();
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.first_name, "Xavier");
        assert_eq!(row.email.as_deref(), Some("x@y.io"));
        assert!(row.company.is_none());
    }

    #[test]
    fn test_parse_csv_requires_first_name_column() {
        assert!(parse_csv(b"name,email\nA,a@b.c\n").is_err());
    }

    #[test]
    fn test_build_contact_normalizes_email() {
        let contact = build_contact(
            Uuid::new_v4(),
            None,
            NewContact {
                first_name: "  Ada ".to_string(),
                email: Some(" ADA@Example.COM ".to_string()),
                ..NewContact::default()
            },
        )
        .unwrap();
        assert_eq!(contact.first_name, "Ada");
        assert_eq!(contact.email.as_deref(), Some("ada@example.com"));
        assert_eq!(contact.status, ContactStatus::Lead);
    }

    #[test]
    fn test_build_contact_rejects_bad_email() {
        let result = build_contact(
            Uuid::new_v4(),
            None,
            NewContact {
                first_name: "Ada".to_string(),
                email: Some("not-an-email".to_string()),
                ..NewContact::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_export_then_import_keeps_columns() {
        let contact = build_contact(
            Uuid::new_v4(),
            None,
            NewContact {
                first_name: "Ada".to_string(),
                last_name: Some("Lovelace, Countess".to_string()),
                email: Some("ada@example.com".to_string()),
                ..NewContact::default()
            },
        )
        .unwrap();

        let csv = write_csv(&[contact]).unwrap();
        assert!(csv.starts_with("first_name,last_name,email,phone,company,job_title\n"));

        let rows = parse_csv(csv.as_bytes()).unwrap();
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.last_name.as_deref(), Some("Lovelace, Countess"));
    }
}
