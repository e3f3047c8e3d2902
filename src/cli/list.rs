use anyhow::{anyhow, bail, Result};

use crate::manager::Manager;
use crate::models::Contact;
use crate::query::{DetailField, Filter, MatchFlag, SortDirection, SortOrder};
use crate::request::{Request, RequestState};

/// Contact data prepared for list display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactListRow {
    pub id: String,
    pub display_name: String,
    pub title_and_org: Option<String>,
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub location: Option<String>,
}

impl ContactListRow {
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            id: contact
                .id
                .as_ref()
                .map(|id| id.local_id.clone())
                .unwrap_or_default(),
            display_name: contact.display_label_or_default().to_string(),
            title_and_org: contact.organizations.iter().find_map(|o| o.title_at_name()),
            primary_email: contact.primary_email().map(str::to_string),
            primary_phone: contact.primary_phone().map(str::to_string),
            location: contact.primary_location(),
        }
    }

    pub fn format(&self) -> String {
        let mut parts = vec![self.display_name.clone()];
        parts.extend(self.title_and_org.clone());
        parts.extend(self.primary_email.clone());
        parts.extend(self.primary_phone.clone());
        parts.extend(self.location.clone());
        format!("{:<24} {}", self.id, parts.join(" · "))
    }
}

/// Filter matching `query` against label, email and phone.
pub fn search_filter(query: Option<&str>) -> Filter {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        None => Filter::Default,
        Some(q) => Filter::Union(vec![
            Filter::detail(DetailField::DisplayLabel, q, MatchFlag::Contains),
            Filter::detail(DetailField::Email, q, MatchFlag::Contains),
            Filter::detail(DetailField::Phone, q, MatchFlag::Contains),
        ]),
    }
}

pub fn sort_orders(sort: Option<&str>, order: &str) -> Result<Vec<SortOrder>> {
    let field = match sort {
        None => DetailField::DisplayLabel,
        Some(s) => DetailField::parse(s).ok_or_else(|| anyhow!("unknown sort field: {}", s))?,
    };
    let direction =
        SortDirection::parse(order).ok_or_else(|| anyhow!("unknown sort order: {}", order))?;
    let mut sort_order = SortOrder::new(field);
    sort_order.direction = direction;
    Ok(vec![sort_order])
}

pub async fn run_list(
    manager: &Manager,
    sort: Option<String>,
    order: String,
    search: Option<String>,
) -> Result<()> {
    let request = Request::fetch(
        search_filter(search.as_deref()),
        sort_orders(sort.as_deref(), &order)?,
    );
    manager.start_request(&request);
    if request.wait_finished().await != RequestState::Finished {
        bail!("fetch request did not finish");
    }

    let contacts = request.results().contacts;
    if contacts.is_empty() {
        println!("No contacts found.");
        return Ok(());
    }
    for contact in &contacts {
        println!("{}", ContactListRow::from_contact(contact).format());
    }
    println!("\n{} contact(s)", contacts.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailAddress, Organization};

    #[test]
    fn test_row_from_contact() {
        let mut contact = Contact::new();
        contact.display_label = Some("Jane Doe".to_string());
        contact.email_addresses.push(EmailAddress::new("jane@example.com"));
        contact.organizations.push(Organization::new("Acme"));

        let row = ContactListRow::from_contact(&contact);
        assert_eq!(row.display_name, "Jane Doe");
        assert_eq!(row.title_and_org.as_deref(), Some("Acme"));
        assert_eq!(row.primary_email.as_deref(), Some("jane@example.com"));
        assert!(row.primary_phone.is_none());
        assert!(row.format().contains("Jane Doe · Acme · jane@example.com"));
    }

    #[test]
    fn test_sort_orders_parse() {
        let orders = sort_orders(Some("email"), "desc").unwrap();
        assert_eq!(orders[0].field, DetailField::Email);
        assert_eq!(orders[0].direction, SortDirection::Descending);

        assert!(sort_orders(Some("shoe size"), "asc").is_err());
        assert!(sort_orders(None, "sideways").is_err());
    }

    #[test]
    fn test_search_filter() {
        assert_eq!(search_filter(None), Filter::Default);
        assert_eq!(search_filter(Some("  ")), Filter::Default);

        let mut contact = Contact::new();
        contact.display_label = Some("Jane Doe".to_string());
        assert!(search_filter(Some("jane")).matches(&contact));
        assert!(!search_filter(Some("bob")).matches(&contact));
    }
}
