//! Editing session for one quote.
//!
//! Every mutating call validates its input, applies the edit, and recomputes
//! `total_amount` before returning, so callers only ever observe the
//! pre-edit document (on error) or the fully recomputed one.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::client::Client;
use crate::domain::project::Project;
use crate::domain::quote::{
    ItemId, Quote, QuoteItem, QuoteSection, QuoteStatus, SectionId, NEW_SECTION_TITLE,
};
use crate::domain::rates::RateTable;
use crate::errors::DomainError;
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::pricing::{quote_total, resolve_rates, unpriced_roles, QuotePricing};
use crate::sanitize::{sanitize_text, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};

const DUPLICATE_SECTION_SUFFIX: &str = " (Copie)";

pub struct QuoteEditor<G = UuidIdGenerator> {
    quote: Quote,
    client: Option<Client>,
    project: Option<Project>,
    rates: RateTable,
    unpriced: BTreeSet<String>,
    ids: G,
}

impl<G: IdGenerator> QuoteEditor<G> {
    /// Opens a session. The rate context must match the quote's selection;
    /// anything else is treated as no selection for that level.
    pub fn open(quote: Quote, client: Option<Client>, project: Option<Project>, ids: G) -> Self {
        let client = client.filter(|client| quote.client_id.as_ref() == Some(&client.id));
        let project = project.filter(|project| quote.project_id.as_ref() == Some(&project.id));

        let mut editor = Self {
            quote,
            client,
            project,
            rates: RateTable::new(),
            unpriced: BTreeSet::new(),
            ids,
        };
        editor.refresh_rates();
        editor
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn into_quote(self) -> Quote {
        self.quote
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn pricing(&self) -> QuotePricing {
        QuotePricing::compute(&self.quote, &self.rates)
    }

    /// Roles used by the quote that the current rate table cannot price.
    pub fn unpriced_roles(&self) -> &BTreeSet<String> {
        &self.unpriced
    }

    /// Changing client always clears the project selection.
    pub fn select_client(&mut self, client: Option<Client>) {
        self.quote.client_id = client.as_ref().map(|client| client.id.clone());
        self.quote.project_id = None;
        self.client = client;
        self.project = None;
        self.refresh_rates();
    }

    pub fn select_project(&mut self, project: Option<Project>) -> Result<(), DomainError> {
        if let Some(project) = &project {
            let client = self.client.as_ref().ok_or(DomainError::MissingSelection("client"))?;
            if !project.belongs_to(&client.id) {
                return Err(DomainError::InvariantViolation(format!(
                    "project `{}` does not belong to client `{}`",
                    project.id, client.id
                )));
            }
        }

        self.quote.project_id = project.as_ref().map(|project| project.id.clone());
        self.project = project;
        self.refresh_rates();
        Ok(())
    }

    /// Replaces the stored client/project records after their rate tables
    /// were edited elsewhere. Records with other ids are ignored.
    pub fn reload_rate_sources(&mut self, client: Option<Client>, project: Option<Project>) {
        if let Some(client) = client.filter(|client| self.quote.client_id.as_ref() == Some(&client.id))
        {
            self.client = Some(client);
        }
        if let Some(project) =
            project.filter(|project| self.quote.project_id.as_ref() == Some(&project.id))
        {
            self.project = Some(project);
        }
        self.refresh_rates();
    }

    pub fn set_status(&mut self, status: QuoteStatus) {
        self.quote.status = status;
    }

    pub fn set_vat(&mut self, has_vat: bool) {
        self.quote.has_vat = has_vat;
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.quote.notes = notes.filter(|notes| !notes.trim().is_empty());
    }

    pub fn add_section(&mut self) -> SectionId {
        let section = QuoteSection::with_empty_item(NEW_SECTION_TITLE, &self.ids);
        let section_id = section.id.clone();
        self.quote.sections.push(section);
        self.recompute();
        section_id
    }

    pub fn delete_section(&mut self, section_id: &SectionId) -> Result<(), DomainError> {
        let position = self.position_of_section(section_id)?;
        self.quote.sections.remove(position);
        self.recompute();
        Ok(())
    }

    pub fn rename_section(&mut self, section_id: &SectionId, title: &str) -> Result<(), DomainError> {
        self.quote.section_mut(section_id)?.title = sanitize_text(title, TITLE_MAX_CHARS);
        Ok(())
    }

    /// Deep copy inserted right after the source, with fresh ids.
    pub fn duplicate_section(&mut self, section_id: &SectionId) -> Result<SectionId, DomainError> {
        let position = self.position_of_section(section_id)?;
        let mut copy = self.quote.sections[position].clone_with_new_ids(&self.ids);
        copy.title = format!("{}{DUPLICATE_SECTION_SUFFIX}", copy.title);
        let copy_id = copy.id.clone();

        self.quote.sections.insert(position + 1, copy);
        self.recompute();
        Ok(copy_id)
    }

    pub fn move_section(&mut self, from: usize, to: usize) -> Result<(), DomainError> {
        move_within(&mut self.quote.sections, from, to)?;
        self.recompute();
        Ok(())
    }

    pub fn add_item(&mut self, section_id: &SectionId) -> Result<ItemId, DomainError> {
        let item = QuoteItem::empty(ItemId(self.ids.next_id()));
        let item_id = item.id.clone();
        self.quote.section_mut(section_id)?.items.push(item);
        self.recompute();
        Ok(item_id)
    }

    pub fn delete_item(&mut self, section_id: &SectionId, item_id: &ItemId) -> Result<(), DomainError> {
        let section = self.quote.section_mut(section_id)?;
        let position = section.item_position(item_id).ok_or_else(|| DomainError::UnknownItem {
            section: section_id.clone(),
            item: item_id.clone(),
        })?;
        section.items.remove(position);
        self.recompute();
        Ok(())
    }

    pub fn set_item_description(
        &mut self,
        section_id: &SectionId,
        item_id: &ItemId,
        description: &str,
    ) -> Result<(), DomainError> {
        self.quote.item_mut(section_id, item_id)?.description =
            sanitize_text(description, DESCRIPTION_MAX_CHARS);
        Ok(())
    }

    /// Zero days removes the role from the item.
    pub fn set_item_days(
        &mut self,
        section_id: &SectionId,
        item_id: &ItemId,
        role: &str,
        days: Decimal,
    ) -> Result<(), DomainError> {
        self.quote.item_mut(section_id, item_id)?.set_days(role, days)?;
        self.recompute();
        Ok(())
    }

    /// Copy inserted right after the source item, with a fresh id.
    pub fn duplicate_item(
        &mut self,
        section_id: &SectionId,
        item_id: &ItemId,
    ) -> Result<ItemId, DomainError> {
        let section = self.quote.section_mut(section_id)?;
        let position = section.item_position(item_id).ok_or_else(|| DomainError::UnknownItem {
            section: section_id.clone(),
            item: item_id.clone(),
        })?;
        let copy = section.items[position].clone_with_new_id(&self.ids);
        let copy_id = copy.id.clone();
        section.items.insert(position + 1, copy);
        self.recompute();
        Ok(copy_id)
    }

    pub fn move_item(
        &mut self,
        section_id: &SectionId,
        from: usize,
        to: usize,
    ) -> Result<(), DomainError> {
        move_within(&mut self.quote.section_mut(section_id)?.items, from, to)?;
        self.recompute();
        Ok(())
    }

    /// Validates the selection, sanitizes free text, stamps `updated_at`, and
    /// returns the record to hand to persistence.
    pub fn prepare_save(&mut self, now: DateTime<Utc>) -> Result<Quote, DomainError> {
        self.quote.require_selection()?;

        for section in &mut self.quote.sections {
            section.title = sanitize_text(&section.title, TITLE_MAX_CHARS);
            for item in &mut section.items {
                item.description = sanitize_text(&item.description, DESCRIPTION_MAX_CHARS);
            }
        }
        self.quote.updated_at = now;
        self.recompute();

        Ok(self.quote.clone())
    }

    fn position_of_section(&self, section_id: &SectionId) -> Result<usize, DomainError> {
        self.quote
            .section_position(section_id)
            .ok_or_else(|| DomainError::UnknownSection(section_id.clone()))
    }

    fn refresh_rates(&mut self) {
        self.rates = resolve_rates(self.client.as_ref(), self.project.as_ref());
        self.recompute();
    }

    fn recompute(&mut self) {
        self.quote.total_amount = quote_total(&self.quote, &self.rates);

        let unpriced = unpriced_roles(&self.quote, &self.rates);
        let newly_unpriced = unpriced.difference(&self.unpriced).cloned().collect::<Vec<_>>();
        if !newly_unpriced.is_empty() {
            warn!(
                event_name = "quote.editor.unpriced_roles",
                quote_id = %self.quote.id,
                roles = ?newly_unpriced,
                "roles without a daily rate are counted at 0"
            );
        }
        self.unpriced = unpriced;

        debug!(
            event_name = "quote.editor.recomputed",
            quote_id = %self.quote.id,
            total_amount = %self.quote.total_amount,
            "quote totals recomputed"
        );
    }
}

fn move_within<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), DomainError> {
    let len = items.len();
    if from >= len || to >= len {
        return Err(DomainError::InvalidMove { from, to, len });
    }
    let moved = items.remove(from);
    items.insert(to, moved);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::QuoteEditor;
    use crate::domain::client::{Client, ClientId};
    use crate::domain::project::{Project, ProjectId};
    use crate::domain::quote::Quote;
    use crate::domain::rates::RateTable;
    use crate::errors::DomainError;
    use crate::ids::SequentialIdGenerator;
    use crate::pricing::quote_total;

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn rates(pairs: &[(&str, &str)]) -> RateTable {
        RateTable::try_from_pairs(pairs.iter().map(|(role, rate)| (*role, dec(rate))))
            .expect("valid rate table")
    }

    fn client() -> Client {
        Client {
            id: ClientId("c1".to_string()),
            name: "Alice Dupont".to_string(),
            company_name: "Acme".to_string(),
            email: "alice@acme.test".to_string(),
            address: String::new(),
            default_rates: rates(&[("Dev", "500"), ("Design", "600")]),
        }
    }

    fn project() -> Project {
        Project {
            id: ProjectId("p1".to_string()),
            client_id: ClientId("c1".to_string()),
            name: "Site".to_string(),
            description: None,
            specific_rates: rates(&[("Dev", "550")]),
        }
    }

    fn editor() -> QuoteEditor<SequentialIdGenerator> {
        let ids = SequentialIdGenerator::new("seed");
        let quote = Quote::draft(&ids, "DEV-2026-0001", 30, Utc::now());
        let mut editor = QuoteEditor::open(quote, None, None, SequentialIdGenerator::new("e"));
        editor.select_client(Some(client()));
        editor.select_project(Some(project())).expect("project belongs to client");
        editor
    }

    #[test]
    fn edits_keep_total_in_sync() {
        let mut editor = editor();
        let section_id = editor.quote().sections[0].id.clone();
        let item_id = editor.quote().sections[0].items[0].id.clone();

        editor.set_item_days(&section_id, &item_id, "Dev", dec("2")).expect("dev days");
        editor.set_item_days(&section_id, &item_id, "Design", dec("0.5")).expect("design days");
        assert_eq!(editor.quote().total_amount, dec("1400"));

        let copy = editor.duplicate_item(&section_id, &item_id).expect("duplicate");
        assert_eq!(editor.quote().total_amount, dec("2800"));

        editor.set_item_days(&section_id, &copy, "Dev", Decimal::ZERO).expect("clear dev");
        assert_eq!(editor.quote().total_amount, dec("1700"));

        editor.delete_item(&section_id, &copy).expect("delete");
        assert_eq!(editor.quote().total_amount, dec("1400"));
        assert_eq!(editor.quote().total_amount, quote_total(editor.quote(), editor.rates()));
    }

    #[test]
    fn changing_client_clears_project_and_rates() {
        let mut editor = editor();
        let section_id = editor.quote().sections[0].id.clone();
        let item_id = editor.quote().sections[0].items[0].id.clone();
        editor.set_item_days(&section_id, &item_id, "Dev", dec("1")).expect("dev days");
        assert_eq!(editor.quote().total_amount, dec("550"));

        editor.select_client(Some(client()));
        assert!(editor.quote().project_id.is_none());
        assert_eq!(editor.quote().total_amount, dec("500"));

        editor.select_client(None);
        assert_eq!(editor.quote().total_amount, Decimal::ZERO);
        assert!(editor.unpriced_roles().contains("Dev"));
    }

    #[test]
    fn project_requires_matching_client() {
        let ids = SequentialIdGenerator::new("seed");
        let quote = Quote::draft(&ids, "DEV-2026-0001", 30, Utc::now());
        let mut editor = QuoteEditor::open(quote, None, None, SequentialIdGenerator::new("e"));

        assert_eq!(
            editor.select_project(Some(project())).unwrap_err(),
            DomainError::MissingSelection("client")
        );

        let mut other = client();
        other.id = ClientId("c2".to_string());
        editor.select_client(Some(other));
        assert!(matches!(
            editor.select_project(Some(project())),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn rate_table_edits_propagate_after_reload() {
        let mut editor = editor();
        let section_id = editor.quote().sections[0].id.clone();
        let item_id = editor.quote().sections[0].items[0].id.clone();
        editor.set_item_days(&section_id, &item_id, "Design", dec("2")).expect("design days");
        assert_eq!(editor.quote().total_amount, dec("1200"));

        let mut repriced = client();
        repriced.default_rates.set("Design", dec("650")).expect("rate");
        editor.reload_rate_sources(Some(repriced), None);

        assert_eq!(editor.quote().total_amount, dec("1300"));
    }

    #[test]
    fn duplicate_section_is_inserted_after_source_with_fresh_ids() {
        let mut editor = editor();
        let section_id = editor.quote().sections[0].id.clone();
        let item_id = editor.quote().sections[0].items[0].id.clone();
        editor.rename_section(&section_id, "Build").expect("rename");
        editor.set_item_days(&section_id, &item_id, "Dev", dec("1")).expect("dev days");
        editor.add_section();

        let copy_id = editor.duplicate_section(&section_id).expect("duplicate");
        let sections = &editor.quote().sections;

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].id, copy_id);
        assert_eq!(sections[1].title, "Build (Copie)");
        assert_ne!(sections[1].items[0].id, item_id);
        assert_eq!(sections[1].items[0].details, sections[0].items[0].details);
        assert_eq!(editor.quote().total_amount, dec("1100"));
    }

    #[test]
    fn sections_and_items_reorder_without_changing_totals() {
        let mut editor = editor();
        let first = editor.quote().sections[0].id.clone();
        let first_item = editor.quote().sections[0].items[0].id.clone();
        editor.set_item_days(&first, &first_item, "Dev", dec("1")).expect("dev days");
        let second = editor.add_section();
        let extra = editor.add_item(&first).expect("add item");

        editor.move_section(1, 0).expect("move section");
        assert_eq!(editor.quote().sections[0].id, second);

        editor.move_item(&first, 1, 0).expect("move item");
        assert_eq!(editor.quote().sections[1].items[0].id, extra);
        assert_eq!(editor.quote().total_amount, dec("550"));

        assert_eq!(
            editor.move_section(0, 5).unwrap_err(),
            DomainError::InvalidMove { from: 0, to: 5, len: 2 }
        );
    }

    #[test]
    fn failed_edits_leave_document_untouched() {
        let mut editor = editor();
        let section_id = editor.quote().sections[0].id.clone();
        let item_id = editor.quote().sections[0].items[0].id.clone();
        editor.set_item_days(&section_id, &item_id, "Dev", dec("1")).expect("dev days");
        let before = editor.quote().clone();

        assert!(editor.set_item_days(&section_id, &item_id, "Dev", dec("-2")).is_err());
        assert!(editor.set_item_days(&section_id, &item_id, "  ", dec("2")).is_err());
        assert!(editor.delete_section(&crate::domain::quote::SectionId("x".into())).is_err());

        assert_eq!(editor.quote(), &before);
    }

    #[test]
    fn prepare_save_sanitizes_and_stamps() {
        let mut editor = editor();
        let section_id = editor.quote().sections[0].id.clone();
        let item_id = editor.quote().sections[0].items[0].id.clone();
        editor.quote.sections[0].title = "  <Phase>   1 ".to_string();
        editor
            .set_item_description(&section_id, &item_id, "Landing   page")
            .expect("description");

        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let saved = editor.prepare_save(now).expect("save");

        assert_eq!(saved.sections[0].title, "Phase 1");
        assert_eq!(saved.sections[0].items[0].description, "Landing page");
        assert_eq!(saved.updated_at, now);
    }

    #[test]
    fn prepare_save_requires_client_and_project() {
        let ids = SequentialIdGenerator::new("seed");
        let quote = Quote::draft(&ids, "DEV-2026-0001", 30, Utc::now());
        let mut editor = QuoteEditor::open(quote, None, None, SequentialIdGenerator::new("e"));

        assert_eq!(
            editor.prepare_save(Utc::now()).unwrap_err(),
            DomainError::MissingSelection("client")
        );

        editor.select_client(Some(client()));
        assert_eq!(
            editor.prepare_save(Utc::now()).unwrap_err(),
            DomainError::MissingSelection("project")
        );
    }

    #[test]
    fn recompute_is_idempotent_across_edit_sequences() {
        let mut editor = editor();
        let section_id = editor.quote().sections[0].id.clone();
        let item_id = editor.quote().sections[0].items[0].id.clone();

        for (role, days) in [("Dev", "1.25"), ("Design", "0.1"), ("Ghost", "2"), ("Dev", "0.5")] {
            editor.set_item_days(&section_id, &item_id, role, dec(days)).expect("days");
            let added = editor.add_section();
            let added_item = editor.quote().sections.last().unwrap().items[0].id.clone();
            editor.set_item_days(&added, &added_item, role, dec(days)).expect("days");

            let cached = editor.quote().total_amount;
            assert_eq!(cached, quote_total(editor.quote(), editor.rates()));
            editor.recompute();
            assert_eq!(editor.quote().total_amount, cached);
        }
    }
}
