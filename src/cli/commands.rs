use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

use crate::api::{ActionKind, ApiClient, ApiError};
use crate::app::actions::{failure_notification, ActionDispatcher, Notification, RecordAction};
use crate::app::state::RowView;
use crate::app::App;
use crate::form::{PendingFile, TitleSearchFields, TitleSearchSession};
use crate::model::{
    display_category, AdminAccount, Appointment, Contractor, Enquiry, PropertyCategory,
    PropertyListing, Record, RecordId, Review, Section, TitleSearchRequest,
};
use crate::search::{project_refs, CategoryFilter, FilterCriteria};
use crate::session::Session;

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Section to list (appointments, properties, reviews, enquiries, admins, contractors, title-searches)
    pub section: Section,
    /// Property type filter (Residential, Commercial, Land or all)
    #[arg(long = "type", default_value = "all")]
    pub category: CategoryFilter,
    /// Case-sensitive identifier substring
    #[arg(long)]
    pub id: Option<String>,
    /// Limit the number of records printed
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Section the record belongs to
    pub section: Section,
    /// Record identifier
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Bearer token issued by the admin login endpoint
    pub token: String,
}

#[derive(Args, Debug, Clone)]
pub struct TitleSearchArgs {
    #[arg(long)]
    pub address: String,
    #[arg(long)]
    pub city: String,
    #[arg(long)]
    pub state: String,
    /// Residential, Commercial or Land
    #[arg(long = "type")]
    pub category: PropertyCategory,
    #[arg(long)]
    pub registration_number: Option<String>,
    /// Contact full name
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub notes: Option<String>,
    /// Supporting document; repeat for several files
    #[arg(long = "document")]
    pub documents: Vec<PathBuf>,
}

pub fn run_dashboard(app: &mut App) -> Result<()> {
    app.run()
}

pub async fn list_records(api: &ApiClient, args: &ListArgs) -> Result<String> {
    let criteria = FilterCriteria::new(args.category, args.id.clone().unwrap_or_default());
    let (total, rows) = match args.section {
        Section::Appointments => fetch_rows::<Appointment>(api, &criteria).await,
        Section::Properties => fetch_rows::<PropertyListing>(api, &criteria).await,
        Section::Reviews => fetch_rows::<Review>(api, &criteria).await,
        Section::Enquiries => fetch_rows::<Enquiry>(api, &criteria).await,
        Section::Admins => fetch_rows::<AdminAccount>(api, &criteria).await,
        Section::Contractors => fetch_rows::<Contractor>(api, &criteria).await,
        Section::TitleSearches => fetch_rows::<TitleSearchRequest>(api, &criteria).await,
    }
    .with_context(|| format!("listing {}", args.section))?;
    Ok(format_rows(args.section, &rows, total, args.limit))
}

async fn fetch_rows<R>(
    api: &ApiClient,
    criteria: &FilterCriteria,
) -> Result<(usize, Vec<RowView>), ApiError>
where
    R: Record + DeserializeOwned,
{
    let records = api.list::<R>().await?;
    let rows = project_refs(&records, criteria)
        .into_iter()
        .map(RowView::from_record)
        .collect();
    Ok((records.len(), rows))
}

fn format_rows(section: Section, rows: &[RowView], total: usize, limit: usize) -> String {
    if rows.is_empty() {
        return if total == 0 {
            format!("No {} found.\n", section.title().to_lowercase())
        } else {
            format!("No matches among {total} record(s).\n")
        };
    }
    let id_width = rows
        .iter()
        .map(|row| row.id.as_str().len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for row in rows.iter().take(limit) {
        let mut line = format!("{:<id_width$}  ", row.id.as_str());
        if row.category.is_some() {
            let _ = write!(&mut line, "{:<11} ", display_category(row.category));
        }
        line.push_str(&row.label);
        if row.created != "-" {
            let _ = write!(&mut line, "  ({})", row.created);
        }
        if row.attachments > 0 {
            let _ = write!(&mut line, "  [{} doc(s)]", row.attachments);
        }
        let _ = writeln!(&mut out, "{line}");
    }
    let shown = rows.len().min(limit);
    let _ = writeln!(&mut out, "\n{shown} of {} shown ({total} total)", rows.len());
    out
}

/// Sends one record action and reports the server's verdict.
pub async fn record_action(api: &ApiClient, kind: ActionKind, args: &RecordArgs) -> Result<String> {
    let action = RecordAction::new(args.section, kind);
    let id = RecordId::new(args.id.trim());
    if id.as_str().is_empty() {
        bail!("record id cannot be empty");
    }
    let dispatcher = ActionDispatcher::new(api);
    match dispatcher.confirm(action, &id).await {
        Ok(_) => {
            tracing::info!(%action, %id, "action confirmed");
            Ok(format_notification(&Notification::success(action.success_text())))
        }
        Err(err) => {
            tracing::warn!(%action, %id, %err, "action failed");
            bail!(failure_notification(action, &err).text)
        }
    }
}

fn format_notification(notification: &Notification) -> String {
    let marker = if notification.is_error() { "✗" } else { "✓" };
    format!("{marker} {}\n", notification.text)
}

pub fn login(session: &mut Session, args: &LoginArgs) -> Result<String> {
    session.login(&args.token)?;
    Ok(match session.profile() {
        Some(profile) => format!("Signed in as {}.\n", profile.display_name()),
        None => "Token stored.\n".to_string(),
    })
}

pub fn logout(session: &mut Session) -> Result<String> {
    let was_signed_in = session.is_authenticated();
    session.logout()?;
    Ok(if was_signed_in {
        "Signed out.\n".to_string()
    } else {
        "No stored session.\n".to_string()
    })
}

pub fn whoami(session: &Session, now: OffsetDateTime) -> String {
    if !session.is_authenticated() {
        return "Not signed in.\n".to_string();
    }
    let Some(profile) = session.profile() else {
        return "Signed in with an opaque token.\n".to_string();
    };
    let mut out = format!("Signed in as {}", profile.display_name());
    if let Some(id) = profile.id.as_deref() {
        let _ = write!(&mut out, " (id {id})");
    }
    if profile.is_expired_at(now) {
        out.push_str(" (token expired; run `estatedesk login` again)");
    }
    out.push('\n');
    out
}

pub fn build_title_search(args: &TitleSearchArgs) -> Result<(TitleSearchSession, usize)> {
    let fields = TitleSearchFields {
        property_address: args.address.clone(),
        property_city: args.city.clone(),
        property_state: args.state.clone(),
        property_type: Some(args.category),
        registration_number: args.registration_number.clone().unwrap_or_default(),
        contact_full_name: args.name.clone(),
        contact_email: args.email.clone(),
        contact_phone: args.phone.clone(),
        contact_notes: args.notes.clone().unwrap_or_default(),
    };
    let mut session = TitleSearchSession::new(fields);
    let files = args
        .documents
        .iter()
        .map(|path| PendingFile::from_path(path))
        .collect::<Result<Vec<_>>>()?;
    let offered = files.len();
    let added = session.add_files(files);
    Ok((session, offered - added))
}

pub async fn submit_title_search(api: &ApiClient, args: &TitleSearchArgs) -> Result<String> {
    let (mut session, skipped) = build_title_search(args)?;
    let submission = session.begin_submit().context("validating title search request")?;
    let attached = submission.files.len();
    let result = api.submit_title_search(submission).await;
    session
        .finish_submit(result.is_ok())
        .context("closing title search submission")?;
    let receipt = match result {
        Ok(receipt) => receipt,
        Err(err) => {
            let text = err
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Failed to submit title search request: {err}"));
            bail!(text)
        }
    };
    tracing::info!(request_id = %receipt.request_id, attached, "title search submitted");
    let mut out = format!(
        "Title search request submitted. Request ID: {}\n",
        receipt.request_id
    );
    let _ = writeln!(&mut out, "{attached} document(s) attached");
    if skipped > 0 {
        let _ = writeln!(&mut out, "{skipped} duplicate document(s) skipped");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::api::RequestBody;
    use crate::storage::MemoryStateStore;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use std::sync::Arc;
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    fn title_search_args(documents: Vec<PathBuf>) -> TitleSearchArgs {
        TitleSearchArgs {
            address: "12 MG Road".into(),
            city: "Pune".into(),
            state: "MH".into(),
            category: PropertyCategory::Commercial,
            registration_number: None,
            name: "Asha".into(),
            email: "asha@example.com".into(),
            phone: "99999".into(),
            notes: None,
            documents,
        }
    }

    #[tokio::test]
    async fn cli_list_filters_by_type_and_id() -> TestResult {
        let transport = ScriptedTransport::new();
        transport.reply(
            200,
            r#"{"success":true,"property_verify":[
                {"_id":"ab12","title":"Corner plot","propertyType":"Land"},
                {"_id":"cd34","title":"Office","propertyType":"Commercial"},
                {"_id":"ab99","title":"Shop","propertyType":"Commercial"}
            ]}"#,
        );
        let api = ApiClient::new(transport.clone());
        let args = ListArgs {
            section: Section::Properties,
            category: CategoryFilter::Only(PropertyCategory::Commercial),
            id: Some("ab".into()),
            limit: 10,
        };

        let output = list_records(&api, &args).await?;
        assert!(output.contains("ab99"));
        assert!(output.contains("Shop"));
        assert!(!output.contains("ab12"));
        assert!(!output.contains("cd34"));
        assert!(output.contains("1 of 1 shown (3 total)"));
        Ok(())
    }

    #[tokio::test]
    async fn cli_list_without_token_reports_auth() {
        let transport = ScriptedTransport::new();
        let api = ApiClient::new(transport.clone());
        let args = ListArgs {
            section: Section::Admins,
            category: CategoryFilter::All,
            id: None,
            limit: 10,
        };
        let err = list_records(&api, &args).await.expect_err("auth required");
        assert!(format!("{err:#}").contains("no authorization token found"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn cli_action_prints_success_and_fails_with_server_message() -> TestResult {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"success":true}"#);
        transport.reply(200, r#"{"success":false,"message":"locked"}"#);
        let api = ApiClient::new(transport.clone());
        let args = RecordArgs {
            section: Section::Properties,
            id: "p1".into(),
        };

        let output = record_action(&api, ActionKind::Accept, &args).await?;
        assert_eq!(output, "✓ Property accepted successfully\n");

        let err = record_action(&api, ActionKind::Reject, &args)
            .await
            .expect_err("rejected by server");
        assert_eq!(err.to_string(), "locked");
        Ok(())
    }

    #[tokio::test]
    async fn cli_unsupported_action_is_refused() {
        let transport = ScriptedTransport::new();
        let api = ApiClient::new(transport.clone());
        let args = RecordArgs {
            section: Section::Reviews,
            id: "r1".into(),
        };
        let err = record_action(&api, ActionKind::Delete, &args)
            .await
            .expect_err("unsupported");
        assert_eq!(err.to_string(), "reviews does not support delete");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn cli_title_search_sends_documents_once() -> TestResult {
        let temp = TempDir::new()?;
        let deed = temp.path().join("deed.pdf");
        std::fs::write(&deed, b"%PDF-1.4")?;
        let transport = ScriptedTransport::new();
        transport.reply(201, r#"{"requestId":"TS-42"}"#);
        let api = ApiClient::new(transport.clone());

        let args = title_search_args(vec![deed.clone(), deed]);
        let output = submit_title_search(&api, &args).await?;

        assert!(output.contains("Request ID: TS-42"));
        assert!(output.contains("1 duplicate document(s) skipped"));
        let requests = transport.requests();
        assert_eq!(requests[0].path(), "/api/title-search/create-request");
        match &requests[0].body {
            RequestBody::Multipart(submission) => {
                assert_eq!(submission.files.len(), 1);
                assert_eq!(submission.files[0].field, "Documents");
                assert_eq!(submission.field("propertyType"), Some("Commercial"));
            }
            RequestBody::Empty => panic!("expected multipart body"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn cli_title_search_validates_before_sending() {
        let transport = ScriptedTransport::new();
        let api = ApiClient::new(transport.clone());
        let mut args = title_search_args(Vec::new());
        args.email = "not-an-email".into();

        let err = submit_title_search(&api, &args)
            .await
            .expect_err("invalid email");
        assert!(format!("{err:#}").contains("ContactEmail is not a valid email address"));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn cli_login_whoami_logout() -> TestResult {
        let mut session = Session::restore(Arc::new(MemoryStateStore::new()))?;
        assert_eq!(whoami(&session, OffsetDateTime::UNIX_EPOCH), "Not signed in.\n");

        let claims = URL_SAFE_NO_PAD.encode(r#"{"id":"65f0","adminId":"root","exp":100}"#);
        let token = format!("h.{claims}.s");
        let output = login(&mut session, &LoginArgs { token })?;
        assert_eq!(output, "Signed in as root.\n");

        let fresh = whoami(&session, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(fresh, "Signed in as root (id 65f0)\n");
        let stale = whoami(&session, OffsetDateTime::from_unix_timestamp(500)?);
        assert!(stale.contains("token expired"));

        assert_eq!(logout(&mut session)?, "Signed out.\n");
        assert_eq!(logout(&mut session)?, "No stored session.\n");
        Ok(())
    }

    #[test]
    fn empty_listing_messages() {
        assert_eq!(
            format_rows(Section::Contractors, &[], 0, 10),
            "No contractors found.\n"
        );
        assert_eq!(
            format_rows(Section::Contractors, &[], 4, 10),
            "No matches among 4 record(s).\n"
        );
    }
}
