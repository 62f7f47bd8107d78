use std::collections::{HashMap, HashSet, VecDeque};

use strum::IntoEnumIterator;

use crate::api::{ActionKind, ApiClient, ApiError};
use crate::app::actions::{
    failure_notification, ActionDispatcher, ActionError, Decision, MutationOutcome, Notification,
    RecordAction,
};
use crate::model::{
    display_timestamp, AdminAccount, Appointment, Attachment, Contractor, Enquiry,
    PropertyCategory, PropertyListing, Record, RecordId, Review, Section, TitleSearchRequest,
};
use crate::search::{filter_chips, parse_filter, project_refs, FilterCriteria};
use crate::session::AdminProfile;

const NOTIFICATION_HISTORY: usize = 50;
const DECISION_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Table,
    Detail,
}

/// One table row of the active section.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: RecordId,
    pub category: Option<PropertyCategory>,
    pub label: String,
    pub created: String,
    pub attachments: usize,
}

impl RowView {
    pub fn from_record<R: Record>(record: &R) -> Self {
        Self {
            id: record.id().clone(),
            category: record.category(),
            label: record.label(),
            created: display_timestamp(record.created_at()),
            attachments: record.attachments().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDetail {
    pub heading: String,
    pub fields: Vec<(&'static str, String)>,
    pub attachments: Vec<Attachment>,
}

impl RecordDetail {
    fn from_record<R: Record>(record: &R) -> Self {
        Self {
            heading: record.label(),
            fields: record.details(),
            attachments: record.attachments().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    NotLoaded,
    Loaded(usize),
    Failed(String),
}

/// Last successfully fetched collection of every section.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub appointments: Vec<Appointment>,
    pub properties: Vec<PropertyListing>,
    pub reviews: Vec<Review>,
    pub enquiries: Vec<Enquiry>,
    pub admins: Vec<AdminAccount>,
    pub contractors: Vec<Contractor>,
    pub title_searches: Vec<TitleSearchRequest>,
}

impl Collections {
    pub fn len(&self, section: Section) -> usize {
        match section {
            Section::Appointments => self.appointments.len(),
            Section::Properties => self.properties.len(),
            Section::Reviews => self.reviews.len(),
            Section::Enquiries => self.enquiries.len(),
            Section::Admins => self.admins.len(),
            Section::Contractors => self.contractors.len(),
            Section::TitleSearches => self.title_searches.len(),
        }
    }

    pub fn rows(&self, section: Section, criteria: &FilterCriteria) -> Vec<RowView> {
        match section {
            Section::Appointments => rows_of(&self.appointments, criteria),
            Section::Properties => rows_of(&self.properties, criteria),
            Section::Reviews => rows_of(&self.reviews, criteria),
            Section::Enquiries => rows_of(&self.enquiries, criteria),
            Section::Admins => rows_of(&self.admins, criteria),
            Section::Contractors => rows_of(&self.contractors, criteria),
            Section::TitleSearches => rows_of(&self.title_searches, criteria),
        }
    }

    pub fn detail(&self, section: Section, id: &RecordId) -> Option<RecordDetail> {
        match section {
            Section::Appointments => detail_of(&self.appointments, id),
            Section::Properties => detail_of(&self.properties, id),
            Section::Reviews => detail_of(&self.reviews, id),
            Section::Enquiries => detail_of(&self.enquiries, id),
            Section::Admins => detail_of(&self.admins, id),
            Section::Contractors => detail_of(&self.contractors, id),
            Section::TitleSearches => detail_of(&self.title_searches, id),
        }
    }
}

fn rows_of<R: Record>(items: &[R], criteria: &FilterCriteria) -> Vec<RowView> {
    project_refs(items, criteria)
        .into_iter()
        .map(RowView::from_record)
        .collect()
}

fn detail_of<R: Record>(items: &[R], id: &RecordId) -> Option<RecordDetail> {
    items
        .iter()
        .find(|record| record.id() == id)
        .map(RecordDetail::from_record)
}

/// Result of one dashboard refresh. Every section settles on its own.
#[derive(Debug)]
pub struct FetchReport {
    pub appointments: Result<Vec<Appointment>, ApiError>,
    pub properties: Result<Vec<PropertyListing>, ApiError>,
    pub reviews: Result<Vec<Review>, ApiError>,
    pub enquiries: Result<Vec<Enquiry>, ApiError>,
    pub admins: Result<Vec<AdminAccount>, ApiError>,
    pub contractors: Result<Vec<Contractor>, ApiError>,
    pub title_searches: Result<Vec<TitleSearchRequest>, ApiError>,
}

pub async fn fetch_all(api: &ApiClient) -> FetchReport {
    let (appointments, properties, reviews, enquiries, admins, contractors, title_searches) = tokio::join!(
        api.list::<Appointment>(),
        api.list::<PropertyListing>(),
        api.list::<Review>(),
        api.list::<Enquiry>(),
        api.list::<AdminAccount>(),
        api.list::<Contractor>(),
        api.list::<TitleSearchRequest>(),
    );
    FetchReport {
        appointments,
        properties,
        reviews,
        enquiries,
        admins,
        contractors,
        title_searches,
    }
}

/// Filter line being typed; `previous` is restored on cancel.
#[derive(Debug, Clone, Default)]
pub struct FilterInput {
    pub buffer: String,
    pub error: Option<String>,
    previous: FilterCriteria,
}

/// Action awaiting the admin's go-ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAction {
    pub action: RecordAction,
    pub id: RecordId,
    pub label: String,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Confirm(PreparedAction),
    Reviewed,
    Profile,
    Help,
}

pub struct DashboardState {
    pub active: Section,
    pub selected: usize,
    pub focus: FocusPane,
    pub signed_in: bool,
    pub profile: Option<AdminProfile>,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
    pub filter_input: Option<FilterInput>,
    collections: Collections,
    load: HashMap<Section, LoadStatus>,
    filters: HashMap<Section, FilterCriteria>,
    pending: HashSet<(Section, RecordId)>,
    decisions: VecDeque<Decision>,
    notifications: VecDeque<Notification>,
}

impl DashboardState {
    pub fn new(active: Section) -> Self {
        Self {
            active,
            selected: 0,
            focus: FocusPane::Table,
            signed_in: false,
            profile: None,
            status_message: None,
            overlay: None,
            filter_input: None,
            collections: Collections::default(),
            load: HashMap::new(),
            filters: HashMap::new(),
            pending: HashSet::new(),
            decisions: VecDeque::new(),
            notifications: VecDeque::new(),
        }
    }

    pub fn sections(&self) -> Vec<Section> {
        Section::iter().collect()
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    pub fn collections_mut(&mut self) -> &mut Collections {
        &mut self.collections
    }

    pub fn load_status(&self, section: Section) -> LoadStatus {
        self.load
            .get(&section)
            .cloned()
            .unwrap_or(LoadStatus::NotLoaded)
    }

    pub fn admin_name(&self) -> Option<&str> {
        self.profile.as_ref().map(AdminProfile::display_name)
    }

    /// Review decisions taken this session, newest first.
    pub fn decisions(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().rev()
    }

    pub fn record_decision(&mut self, decision: Decision) {
        if self.decisions.len() == DECISION_HISTORY {
            self.decisions.pop_front();
        }
        self.decisions.push_back(decision);
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn latest_notification(&self) -> Option<&Notification> {
        self.notifications.back()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn push_notification(&mut self, notification: Notification) {
        if self.notifications.len() == NOTIFICATION_HISTORY {
            self.notifications.pop_front();
        }
        self.status_message = Some(notification.text.clone());
        self.notifications.push_back(notification);
    }

    // Sections and selection

    pub fn set_section(&mut self, section: Section) {
        if self.active == section {
            return;
        }
        self.active = section;
        self.selected = 0;
        self.filter_input = None;
        self.focus = FocusPane::Table;
    }

    /// Moves to the neighbouring tab, wrapping around.
    pub fn step_section(&mut self, delta: isize) -> Section {
        let sections = self.sections();
        let len = sections.len() as isize;
        let current = sections
            .iter()
            .position(|section| *section == self.active)
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.set_section(sections[next]);
        self.active
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Table => FocusPane::Detail,
            FocusPane::Detail => FocusPane::Table,
        };
    }

    pub fn rows(&self) -> Vec<RowView> {
        self.collections.rows(self.active, self.filter())
    }

    pub fn selected_row(&self) -> Option<RowView> {
        self.rows().into_iter().nth(self.selected)
    }

    pub fn selected_detail(&self) -> Option<RecordDetail> {
        let row = self.selected_row()?;
        self.collections.detail(self.active, &row.id)
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.rows().len() as isize;
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len - 1);
        self.selected = next as usize;
    }

    pub fn select_last(&mut self) {
        self.selected = self.rows().len().saturating_sub(1);
    }

    fn normalize_selection(&mut self) {
        let len = self.rows().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    // Filtering

    pub fn filter(&self) -> &FilterCriteria {
        static NONE: once_cell::sync::Lazy<FilterCriteria> =
            once_cell::sync::Lazy::new(FilterCriteria::default);
        self.filters.get(&self.active).unwrap_or(&*NONE)
    }

    pub fn set_filter(&mut self, criteria: FilterCriteria) {
        self.filters.insert(self.active, criteria);
        self.normalize_selection();
    }

    pub fn filter_chips(&self) -> Vec<String> {
        filter_chips(self.filter())
    }

    pub fn cycle_category(&mut self) {
        if !self.active.has_category() {
            self.set_status_message(Some(format!(
                "{} have no property type",
                self.active.title()
            )));
            return;
        }
        let mut criteria = self.filter().clone();
        criteria.category = criteria.category.cycle();
        self.set_status_message(Some(format!("Showing {}", criteria.category.label())));
        self.set_filter(criteria);
    }

    pub fn clear_filter(&mut self) {
        self.filters.remove(&self.active);
        self.normalize_selection();
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter_input.is_some()
    }

    pub fn begin_filter(&mut self) {
        let previous = self.filter().clone();
        let buffer = filter_chips(&previous)
            .into_iter()
            .map(|chip| chip.replacen("id~", "", 1))
            .collect::<Vec<_>>()
            .join(" ");
        self.filter_input = Some(FilterInput {
            buffer,
            error: None,
            previous,
        });
    }

    pub fn push_filter_char(&mut self, ch: char) {
        if let Some(input) = self.filter_input.as_mut() {
            input.buffer.push(ch);
        }
        self.apply_filter_input();
    }

    pub fn pop_filter_char(&mut self) {
        if let Some(input) = self.filter_input.as_mut() {
            input.buffer.pop();
        }
        self.apply_filter_input();
    }

    pub fn commit_filter(&mut self) {
        self.filter_input = None;
    }

    pub fn cancel_filter(&mut self) {
        if let Some(input) = self.filter_input.take() {
            self.set_filter(input.previous);
        }
    }

    fn apply_filter_input(&mut self) {
        let Some(input) = self.filter_input.as_mut() else {
            return;
        };
        match parse_filter(&input.buffer) {
            Ok(criteria) => {
                input.error = None;
                self.set_filter(criteria);
            }
            Err(err) => input.error = Some(err.to_string()),
        }
    }

    // Fetching

    pub fn apply_fetch(&mut self, report: FetchReport) {
        let FetchReport {
            appointments,
            properties,
            reviews,
            enquiries,
            admins,
            contractors,
            title_searches,
        } = report;
        settle(&mut self.load, &mut self.collections.appointments, appointments);
        settle(&mut self.load, &mut self.collections.properties, properties);
        settle(&mut self.load, &mut self.collections.reviews, reviews);
        settle(&mut self.load, &mut self.collections.enquiries, enquiries);
        settle(&mut self.load, &mut self.collections.admins, admins);
        settle(&mut self.load, &mut self.collections.contractors, contractors);
        settle(&mut self.load, &mut self.collections.title_searches, title_searches);
        self.normalize_selection();

        let failed = self
            .load
            .values()
            .filter(|status| matches!(status, LoadStatus::Failed(_)))
            .count();
        let message = if failed == 0 {
            "Dashboard refreshed".to_string()
        } else {
            format!("Refreshed with {failed} section(s) unavailable")
        };
        self.set_status_message(Some(message));
    }

    // Actions

    /// Checks that the selected record can take `kind` right now.
    pub fn prepare_action(&self, kind: ActionKind) -> Result<PreparedAction, ActionError> {
        let action = RecordAction::new(self.active, kind);
        if !action.is_supported() {
            return Err(ActionError::Unsupported {
                section: self.active,
                kind,
            });
        }
        let row = self.selected_row().ok_or(ActionError::NoSelection)?;
        if self.is_pending(self.active, &row.id) {
            return Err(ActionError::Busy { id: row.id });
        }
        Ok(PreparedAction {
            action,
            id: row.id,
            label: row.label,
        })
    }

    pub fn is_pending(&self, section: Section, id: &RecordId) -> bool {
        self.pending.contains(&(section, id.clone()))
    }

    /// Claims the record for an in-flight action; false when it is taken.
    pub fn begin_pending(&mut self, section: Section, id: &RecordId) -> bool {
        self.pending.insert((section, id.clone()))
    }

    pub fn finish_pending(&mut self, section: Section, id: &RecordId) {
        self.pending.remove(&(section, id.clone()));
    }

    pub fn open_confirm(&mut self, prepared: PreparedAction) {
        self.set_status_message(Some(format!(
            "{} '{}'? Enter confirm • Esc cancel",
            capitalize(&prepared.action.kind.to_string()),
            prepared.label
        )));
        self.overlay = Some(OverlayState::Confirm(prepared));
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn confirm_overlay(&self) -> Option<&PreparedAction> {
        match self.overlay.as_ref() {
            Some(OverlayState::Confirm(prepared)) => Some(prepared),
            _ => None,
        }
    }

    /// Runs the action against the server and folds the verdict into the
    /// dashboard.
    pub async fn perform(
        &mut self,
        dispatcher: &ActionDispatcher<'_>,
        prepared: &PreparedAction,
    ) -> Notification {
        let PreparedAction { action, id, .. } = prepared;
        if !self.begin_pending(action.section, id) {
            let notification =
                failure_notification(*action, &ActionError::Busy { id: id.clone() });
            self.push_notification(notification.clone());
            return notification;
        }

        let kind = action.kind;
        let collections = &mut self.collections;
        let (notification, decision) = match action.section {
            Section::Appointments => {
                summarize(dispatcher.perform(kind, &mut collections.appointments, id).await)
            }
            Section::Properties => {
                summarize(dispatcher.perform(kind, &mut collections.properties, id).await)
            }
            Section::Reviews => summarize(dispatcher.perform(kind, &mut collections.reviews, id).await),
            Section::Enquiries => {
                summarize(dispatcher.perform(kind, &mut collections.enquiries, id).await)
            }
            Section::Admins => summarize(dispatcher.perform(kind, &mut collections.admins, id).await),
            Section::Contractors => {
                summarize(dispatcher.perform(kind, &mut collections.contractors, id).await)
            }
            Section::TitleSearches => {
                summarize(dispatcher.perform(kind, &mut collections.title_searches, id).await)
            }
        };

        self.finish_pending(action.section, id);
        if let Some(decision) = decision {
            self.record_decision(decision);
        }
        self.normalize_selection();
        self.push_notification(notification.clone());
        notification
    }
}

fn settle<R: Record>(
    load: &mut HashMap<Section, LoadStatus>,
    slot: &mut Vec<R>,
    result: Result<Vec<R>, ApiError>,
) {
    match result {
        Ok(records) => {
            tracing::debug!(section = %R::SECTION, count = records.len(), "section loaded");
            load.insert(R::SECTION, LoadStatus::Loaded(records.len()));
            *slot = records;
        }
        Err(err) => {
            tracing::warn!(section = %R::SECTION, %err, "section fetch failed");
            load.insert(R::SECTION, LoadStatus::Failed(err.to_string()));
        }
    }
}

fn summarize<R>(outcome: MutationOutcome<R>) -> (Notification, Option<Decision>) {
    let notification = outcome.notification().clone();
    let decision = outcome.decision().cloned();
    (notification, decision)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
